//! Player name and input validation for the front end.

use std::collections::HashSet;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 20;

/// Longest input line accepted from a client, in bytes.
pub const MAX_INPUT_BYTES: usize = 512;

/// Player name validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Name is too short (minimum 2 characters)")]
    TooShort,

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name must start with a letter")]
    MustStartWithLetter,

    #[error("Name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("That name is reserved")]
    Reserved,
}

/// A validated name: `id` is the lower-cased storage key, `display` keeps
/// the player's capitalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerName {
    pub id: String,
    pub display: String,
}

fn reserved_names() -> HashSet<&'static str> {
    [
        // Staff-sounding names
        "admin", "administrator", "root", "system", "sysop", "operator", "server",
        "guest", "anonymous", "someone", "everyone",
        // Command words, which would make "tell" and targets confusing
        "look", "go", "say", "emote", "tell", "get", "take", "drop", "inventory", "inv",
        "who", "help", "quit",
        // Directions
        "north", "south", "east", "west", "up", "down",
        "northeast", "northwest", "southeast", "southwest",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a player name. Letters, digits, `_` and `-` only, starting with
/// a letter; surrounding whitespace is ignored.
pub fn validate_player_name(name: &str) -> Result<PlayerName, UsernameError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len < MIN_NAME_LEN {
        return Err(UsernameError::TooShort);
    }
    if len > MAX_NAME_LEN {
        return Err(UsernameError::TooLong { max: MAX_NAME_LEN });
    }

    let invalid: String = trimmed
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        .collect();
    if !invalid.is_empty() {
        let mut chars: Vec<char> = invalid.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        return Err(UsernameError::InvalidCharacters {
            chars: chars.into_iter().collect(),
        });
    }

    if !trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(UsernameError::MustStartWithLetter);
    }

    let id = trimmed.to_ascii_lowercase();
    if reserved_names().contains(id.as_str()) {
        return Err(UsernameError::Reserved);
    }

    Ok(PlayerName {
        id,
        display: trimmed.to_string(),
    })
}

/// Strip control characters and cap an input line at [`MAX_INPUT_BYTES`]
/// without splitting a character.
pub fn sanitize_input(line: &str) -> String {
    let mut out = String::with_capacity(line.len().min(MAX_INPUT_BYTES));
    for ch in line.chars().filter(|c| !c.is_control()) {
        if out.len() + ch.len_utf8() > MAX_INPUT_BYTES {
            break;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_name_validation() {
        let ok = validate_player_name("  Ann_Marie ").unwrap();
        assert_eq!(ok.id, "ann_marie");
        assert_eq!(ok.display, "Ann_Marie");

        assert_eq!(validate_player_name("a"), Err(UsernameError::TooShort));
        assert_eq!(
            validate_player_name(&"a".repeat(21)),
            Err(UsernameError::TooLong { max: 20 })
        );
        assert_eq!(
            validate_player_name("9lives"),
            Err(UsernameError::MustStartWithLetter)
        );
        assert_eq!(
            validate_player_name("bad name!"),
            Err(UsernameError::InvalidCharacters { chars: " !".into() })
        );
        assert_eq!(validate_player_name("Admin"), Err(UsernameError::Reserved));
        assert_eq!(validate_player_name("north"), Err(UsernameError::Reserved));
    }

    #[test]
    fn markup_characters_are_rejected_in_names() {
        assert!(matches!(
            validate_player_name("<red>x</>"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn test_input_sanitization() {
        assert_eq!(sanitize_input("  say hi\x07\r"), "say hi");
        let long = "é".repeat(400);
        let out = sanitize_input(&long);
        assert!(out.len() <= MAX_INPUT_BYTES);
        assert_eq!(out.chars().count(), MAX_INPUT_BYTES / 2);
    }
}
