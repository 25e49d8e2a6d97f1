/// Two players racing for the only sword in the room: exactly one wins, and
/// the sword ends up in exactly one inventory.
mod common;

use common::{join, settings, test_engine, Client};
use livemud::engine::Engine;
use livemud::world::START_ROOM_ID;

const PICKED: &str = "You pick up rusty sword.";
const MISSING: &str = "You don't see \"sword\" here.";

/// The issuing player's own answer, skipping room notices about the other.
async fn answer(client: &mut Client) -> String {
    loop {
        let text = client.expect("sword").await;
        if text == PICKED || text == MISSING {
            return text;
        }
    }
}

async fn carried(engine: &Engine, inventory_id: &str) -> Vec<String> {
    engine
        .store()
        .tx(|tx| tx.get_inventory(inventory_id))
        .await
        .unwrap()
        .items
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_player_gets_the_sword() {
    let (_dir, engine) = test_engine(settings());
    let mut ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;
    ann.expect("Bob has arrived.").await;

    ann.send(&engine, "get sword");
    bob.send(&engine, "get sword");

    let results = [answer(&mut ann).await, answer(&mut bob).await];
    assert_eq!(results.iter().filter(|r| *r == PICKED).count(), 1, "{:?}", results);
    assert_eq!(results.iter().filter(|r| *r == MISSING).count(), 1, "{:?}", results);

    let mut holders = Vec::new();
    for id in ["ann", "bob"] {
        let player = engine.store().get_player(id).unwrap();
        if carried(&engine, &player.inventory_id)
            .await
            .contains(&"rusty_sword".to_string())
        {
            holders.push(player.inventory_id);
        }
    }
    assert_eq!(holders.len(), 1);

    let room = engine.store().get_room(START_ROOM_ID).unwrap();
    assert!(!carried(&engine, &room.inventory_id)
        .await
        .contains(&"rusty_sword".to_string()));
    let sword = engine.store().get_item("rusty_sword").unwrap();
    assert_eq!(sword.inventory_id, holders[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn the_loser_can_still_pick_it_up_after_a_drop() {
    let (_dir, engine) = test_engine(settings());
    let mut ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;

    ann.send(&engine, "get sword");
    ann.expect(PICKED).await;
    bob.expect("Ann picks up rusty sword.").await;

    ann.send(&engine, "drop sword");
    ann.expect("You drop rusty sword.").await;
    bob.expect("Ann drops rusty sword.").await;

    bob.send(&engine, "take rusty");
    bob.expect(PICKED).await;
    assert_eq!(
        engine.store().get_item("rusty_sword").unwrap().inventory_id,
        "player:bob"
    );
}
