//! Command effects. Each handler reads and mutates the world through
//! `store.tx` and talks to players through the bus; none of them touch actor
//! state directly except the room change, which is acknowledged by the actor.

use log::debug;

use super::commands::{CommandValue, HELP_TEXT};
use super::dispatch::{CommandContext, CommandError};
use crate::markup::{escape, Modifiers, Segment};
use crate::messaging::Content;
use crate::world::{
    Direction, ItemRecord, MoveOutcome, PlayerRecord, Presence, Resolution, RoomRecord,
};

pub async fn run(command: CommandValue, ctx: CommandContext) -> Result<(), CommandError> {
    match command {
        CommandValue::Look { target: None } => look_room(&ctx).await,
        CommandValue::Look {
            target: Some(target),
        } => look_at(&ctx, &target).await,
        CommandValue::Move { direction } => go(&ctx, direction).await,
        CommandValue::Say { text } => say(&ctx, &text),
        CommandValue::Emote { text } => emote(&ctx, &text),
        CommandValue::Tell { target, text } => tell(&ctx, &target, &text),
        CommandValue::Get { item } => get(&ctx, &item).await,
        CommandValue::Drop { item } => drop_item(&ctx, &item).await,
        CommandValue::Inventory => inventory(&ctx).await,
        CommandValue::Who => who(&ctx),
        CommandValue::Help => help(&ctx),
    }
}

/// A consistent view of the player's surroundings.
struct RoomView {
    room: RoomRecord,
    items: Vec<ItemRecord>,
    others: Vec<String>,
}

async fn room_view(ctx: &CommandContext) -> Result<RoomView, CommandError> {
    let view = ctx
        .store
        .tx(|tx| {
            let player = tx.get_player(&ctx.player_id)?;
            let room = tx.get_room(&player.current_room)?;
            let items = tx.inventory_items(&room.inventory_id)?;
            let mut others = Vec::new();
            for id in room.occupants.iter().filter(|id| **id != ctx.player_id) {
                if let Some(other) = tx.find_player(id)? {
                    others.push(describe_presence(&other));
                }
            }
            others.sort();
            Ok(RoomView {
                room,
                items,
                others,
            })
        })
        .await?;
    Ok(view)
}

fn describe_presence(player: &PlayerRecord) -> String {
    match player.presence {
        Presence::Away => format!("{} (away)", player.display_name),
        _ => player.display_name.clone(),
    }
}

fn render_room(view: &RoomView) -> String {
    let mut out = format!(
        "<yellow:b>{}</>\n{}",
        escape(&view.room.name),
        escape(&view.room.description)
    );
    let exits: Vec<&str> = view.room.exits.keys().map(|d| d.name()).collect();
    if exits.is_empty() {
        out.push_str("\n<green>There are no obvious exits.</>");
    } else {
        out.push_str(&format!("\n<green>Exits:</> {}", exits.join(", ")));
    }
    if !view.items.is_empty() {
        let names: Vec<String> = view.items.iter().map(|i| escape(&i.name)).collect();
        out.push_str(&format!("\n<cyan>You see:</> {}", names.join(", ")));
    }
    if !view.others.is_empty() {
        let names: Vec<String> = view.others.iter().map(|n| escape(n)).collect();
        out.push_str(&format!("\n<magenta>Also here:</> {}", names.join(", ")));
    }
    out
}

async fn look_room(ctx: &CommandContext) -> Result<(), CommandError> {
    let view = room_view(ctx).await?;
    ctx.notify(render_room(&view))?;
    Ok(())
}

async fn look_at(ctx: &CommandContext, term: &str) -> Result<(), CommandError> {
    let resolution = ctx
        .store
        .tx(|tx| {
            let player = tx.get_player(&ctx.player_id)?;
            let room = tx.get_room(&player.current_room)?;
            match tx.find_item_by_name_prefix(&room.inventory_id, term)? {
                Resolution::NoMatch => tx.find_item_by_name_prefix(&player.inventory_id, term),
                other => Ok(other),
            }
        })
        .await?;
    match resolution {
        Resolution::Found(item) => {
            ctx.notify(format!(
                "<b>{}</>\n{}",
                escape(&item.name),
                escape(&item.description)
            ))?;
        }
        Resolution::NoMatch => {
            ctx.notify(Content::Plain(format!("You don't see \"{}\" here.", term)))?;
        }
        Resolution::Ambiguous(names) => {
            ctx.notify(which_one(term, &names))?;
        }
    }
    Ok(())
}

fn which_one(term: &str, names: &[String]) -> Content {
    Content::Plain(format!("Which \"{}\" do you mean: {}?", term, names.join(", ")))
}

/// Where someone who walked `direction` appears to come from.
fn arrival_side(direction: Direction) -> String {
    match direction {
        Direction::Up => "below".to_string(),
        Direction::Down => "above".to_string(),
        other => format!("the {}", other.opposite().name()),
    }
}

async fn go(ctx: &CommandContext, direction: Direction) -> Result<(), CommandError> {
    let (name, outcome) = ctx
        .store
        .tx(|tx| {
            let name = tx.get_player(&ctx.player_id)?.display_name;
            let outcome = tx.move_player(&ctx.player_id, direction)?;
            Ok((name, outcome))
        })
        .await?;

    let (from, to) = match outcome {
        MoveOutcome::NoExit => {
            ctx.notify(Content::Plain(format!(
                "You can't go {} from here.",
                direction.name()
            )))?;
            return Ok(());
        }
        MoveOutcome::Moved { from, to } => (from, to),
    };

    // Room traffic must follow the player before anyone is told about it.
    if !ctx.actor.change_room(to.id.clone()).await {
        return Err(CommandError::Internal(format!(
            "actor for {} stopped during move",
            ctx.player_id
        )));
    }
    debug!(
        target: "livemud::commands",
        "{} moved {} from {} to {}",
        ctx.player_id,
        direction.name(),
        from,
        to.id
    );

    let name = escape(&name);
    ctx.tell_room(&from, format!("<yellow>{}</> leaves {}.", name, direction.name()))?;
    ctx.tell_room(
        &to.id,
        format!("<yellow>{}</> arrives from {}.", name, arrival_side(direction)),
    )?;
    look_room(ctx).await
}

fn say(ctx: &CommandContext, text: &str) -> Result<(), CommandError> {
    let player = ctx.store.get_player(&ctx.player_id)?;
    let text = escape(text);
    ctx.notify(format!("<cyan>You say,</> \"{}\"", text))?;
    ctx.tell_room(
        &player.current_room,
        format!("<cyan>{} says,</> \"{}\"", escape(&player.display_name), text),
    )?;
    Ok(())
}

fn emote(ctx: &CommandContext, text: &str) -> Result<(), CommandError> {
    let player = ctx.store.get_player(&ctx.player_id)?;
    ctx.bus.send_to_room(
        &player.current_room,
        format!("<i>{} {}</>", escape(&player.display_name), escape(text)),
        None,
    )?;
    Ok(())
}

fn tell(ctx: &CommandContext, target: &str, text: &str) -> Result<(), CommandError> {
    let recipient = match ctx.store.get_player(target) {
        Ok(player) if player.presence != Presence::Offline => player,
        Ok(_) => return not_online(ctx, target),
        Err(e) if e.is_not_found() => return not_online(ctx, target),
        Err(e) => return Err(e.into()),
    };
    let sender = ctx.store.get_player(&ctx.player_id)?;
    let text = escape(text);
    ctx.bus.send_to_player(
        &recipient.id,
        format!(
            "<magenta>{} tells you,</> \"{}\"",
            escape(&sender.display_name),
            text
        ),
    )?;
    ctx.notify(format!(
        "<magenta>You tell {},</> \"{}\"",
        escape(&recipient.display_name),
        text
    ))?;
    Ok(())
}

fn not_online(ctx: &CommandContext, target: &str) -> Result<(), CommandError> {
    ctx.notify(Content::Plain(format!(
        "No player named \"{}\" is online.",
        target
    )))?;
    Ok(())
}

enum Transfer {
    Moved { item: ItemRecord, room: String },
    Missing,
    Ambiguous(Vec<String>),
}

async fn get(ctx: &CommandContext, term: &str) -> Result<(), CommandError> {
    let (name, transfer) = ctx
        .store
        .tx(|tx| {
            let player = tx.get_player(&ctx.player_id)?;
            let room = tx.get_room(&player.current_room)?;
            let transfer = match tx.find_item_by_name_prefix(&room.inventory_id, term)? {
                Resolution::Found(item) => Transfer::Moved {
                    item: tx.move_item(&item.id, &player.inventory_id)?,
                    room: room.id,
                },
                Resolution::NoMatch => Transfer::Missing,
                Resolution::Ambiguous(names) => Transfer::Ambiguous(names),
            };
            Ok((player.display_name, transfer))
        })
        .await?;

    match transfer {
        Transfer::Moved { item, room } => {
            let item_name = escape(&item.name);
            ctx.notify(format!("You pick up {}.", item_name))?;
            ctx.tell_room(&room, format!("{} picks up {}.", escape(&name), item_name))?;
        }
        Transfer::Missing => {
            ctx.notify(Content::Plain(format!("You don't see \"{}\" here.", term)))?;
        }
        Transfer::Ambiguous(names) => {
            ctx.notify(which_one(term, &names))?;
        }
    }
    Ok(())
}

async fn drop_item(ctx: &CommandContext, term: &str) -> Result<(), CommandError> {
    let (name, transfer) = ctx
        .store
        .tx(|tx| {
            let player = tx.get_player(&ctx.player_id)?;
            let room = tx.get_room(&player.current_room)?;
            let transfer = match tx.find_item_by_name_prefix(&player.inventory_id, term)? {
                Resolution::Found(item) => Transfer::Moved {
                    item: tx.move_item(&item.id, &room.inventory_id)?,
                    room: room.id,
                },
                Resolution::NoMatch => Transfer::Missing,
                Resolution::Ambiguous(names) => Transfer::Ambiguous(names),
            };
            Ok((player.display_name, transfer))
        })
        .await?;

    match transfer {
        Transfer::Moved { item, room } => {
            let item_name = escape(&item.name);
            ctx.notify(format!("You drop {}.", item_name))?;
            ctx.tell_room(&room, format!("{} drops {}.", escape(&name), item_name))?;
        }
        Transfer::Missing => {
            ctx.notify(Content::Plain(format!("You aren't carrying \"{}\".", term)))?;
        }
        Transfer::Ambiguous(names) => {
            ctx.notify(which_one(term, &names))?;
        }
    }
    Ok(())
}

async fn inventory(ctx: &CommandContext) -> Result<(), CommandError> {
    let items = ctx
        .store
        .tx(|tx| {
            let player = tx.get_player(&ctx.player_id)?;
            tx.inventory_items(&player.inventory_id)
        })
        .await?;
    if items.is_empty() {
        ctx.notify(Content::Plain("You are empty-handed.".to_string()))?;
    } else {
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        ctx.notify(Content::Plain(format!(
            "You are carrying: {}.",
            names.join(", ")
        )))?;
    }
    Ok(())
}

fn who(ctx: &CommandContext) -> Result<(), CommandError> {
    let players = ctx.store.online_players()?;
    let names: Vec<String> = players.iter().map(describe_presence).collect();
    ctx.notify(Content::Plain(format!(
        "Online ({}): {}",
        names.len(),
        names.join(", ")
    )))?;
    Ok(())
}

fn help(ctx: &CommandContext) -> Result<(), CommandError> {
    let heading = Segment {
        modifiers: Modifiers {
            bold: true,
            italic: false,
        },
        ..Segment::plain("Commands\n")
    };
    ctx.notify(vec![heading, Segment::plain(HELP_TEXT)])?;
    Ok(())
}
