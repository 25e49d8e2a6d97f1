//! Command grammars: pure functions from one line of input to a typed command.
//!
//! Grammars are tried in [`GRAMMARS`] order and the first match wins. The
//! shortcut forms (`'hello`, `:waves`) come first so that a leading
//! punctuation character is never read as part of a verb.

use crate::world::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    Look { target: Option<String> },
    Move { direction: Direction },
    Say { text: String },
    Emote { text: String },
    Tell { target: String, text: String },
    Get { item: String },
    Drop { item: String },
    Inventory,
    Who,
    Help,
}

impl CommandValue {
    /// Stable name used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CommandValue::Look { .. } => "look",
            CommandValue::Move { .. } => "move",
            CommandValue::Say { .. } => "say",
            CommandValue::Emote { .. } => "emote",
            CommandValue::Tell { .. } => "tell",
            CommandValue::Get { .. } => "get",
            CommandValue::Drop { .. } => "drop",
            CommandValue::Inventory => "inventory",
            CommandValue::Who => "who",
            CommandValue::Help => "help",
        }
    }
}

pub type Grammar = fn(&str) -> Option<CommandValue>;

pub const GRAMMARS: &[(&str, Grammar)] = &[
    ("say", parse_say),
    ("emote", parse_emote),
    ("tell", parse_tell),
    ("move", parse_move),
    ("look", parse_look),
    ("get", parse_get),
    ("drop", parse_drop),
    ("inventory", parse_inventory),
    ("who", parse_who),
    ("help", parse_help),
];

pub fn parse(input: &str) -> Option<CommandValue> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    GRAMMARS.iter().find_map(|(_, grammar)| grammar(input))
}

/// Lower-cased first word and the trimmed remainder.
fn split_verb(input: &str) -> (String, &str) {
    match input.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_lowercase(), rest.trim()),
        None => (input.to_lowercase(), ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn parse_say(input: &str) -> Option<CommandValue> {
    if let Some(rest) = input.strip_prefix('\'').or_else(|| input.strip_prefix('"')) {
        return non_empty(rest).map(|text| CommandValue::Say { text });
    }
    let (verb, rest) = split_verb(input);
    if verb != "say" {
        return None;
    }
    non_empty(rest).map(|text| CommandValue::Say { text })
}

fn parse_emote(input: &str) -> Option<CommandValue> {
    if let Some(rest) = input.strip_prefix(':') {
        return non_empty(rest).map(|text| CommandValue::Emote { text });
    }
    let (verb, rest) = split_verb(input);
    if verb != "emote" && verb != "me" {
        return None;
    }
    non_empty(rest).map(|text| CommandValue::Emote { text })
}

fn parse_tell(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    if verb != "tell" {
        return None;
    }
    let (target, text) = rest.split_once(char::is_whitespace)?;
    Some(CommandValue::Tell {
        target: target.to_lowercase(),
        text: non_empty(text)?,
    })
}

fn parse_move(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    if verb == "go" || verb == "move" {
        return Direction::parse(rest).map(|direction| CommandValue::Move { direction });
    }
    if !rest.is_empty() {
        return None;
    }
    Direction::parse(&verb).map(|direction| CommandValue::Move { direction })
}

fn parse_look(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    if verb != "look" && verb != "l" {
        return None;
    }
    let rest = rest.strip_prefix("at ").map(str::trim).unwrap_or(rest);
    Some(CommandValue::Look {
        target: non_empty(rest),
    })
}

fn parse_get(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    if verb != "get" && verb != "take" {
        return None;
    }
    non_empty(rest).map(|item| CommandValue::Get { item })
}

fn parse_drop(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    if verb != "drop" {
        return None;
    }
    non_empty(rest).map(|item| CommandValue::Drop { item })
}

fn parse_inventory(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    (rest.is_empty() && matches!(verb.as_str(), "inventory" | "inv" | "i"))
        .then_some(CommandValue::Inventory)
}

fn parse_who(input: &str) -> Option<CommandValue> {
    let (verb, rest) = split_verb(input);
    (rest.is_empty() && verb == "who").then_some(CommandValue::Who)
}

fn parse_help(input: &str) -> Option<CommandValue> {
    let (verb, _) = split_verb(input);
    (verb == "help" || verb == "?").then_some(CommandValue::Help)
}

/// Body of `help`, sent as plain text.
pub const HELP_TEXT: &str = concat!(
    "  look [thing]       look around, or at something\n",
    "  go <dir>, n, s...  move (north, south, east, west, up, down, ne, nw, se, sw)\n",
    "  say <text>, 'text  talk to the room\n",
    "  emote <text>, :x   act something out\n",
    "  tell <who> <text>  talk privately\n",
    "  get <item>         pick something up\n",
    "  drop <item>        put something down\n",
    "  inventory, i       see what you carry\n",
    "  who                see who is online",
);
