//! Fixed color palette for styled text.
//!
//! Tag names are lower-case and hyphenated (`bright-red`, `dark-gray`). Every
//! color maps to an xterm-256 index so terminal front ends can render it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    /// Uncolored text; whatever the sink considers its foreground.
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
    DarkGray,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
    Orange,
    Pink,
    Purple,
    Brown,
    Gold,
    Silver,
    Teal,
    Navy,
    Maroon,
    Olive,
    Lime,
    Aqua,
    Violet,
    Indigo,
    Crimson,
    Coral,
    Salmon,
    Khaki,
    Beige,
    Turquoise,
}

impl Color {
    /// Every palette entry, `Default` first.
    pub const ALL: [Color; 38] = [
        Color::Default,
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
        Color::Gray,
        Color::DarkGray,
        Color::BrightRed,
        Color::BrightGreen,
        Color::BrightYellow,
        Color::BrightBlue,
        Color::BrightMagenta,
        Color::BrightCyan,
        Color::BrightWhite,
        Color::Orange,
        Color::Pink,
        Color::Purple,
        Color::Brown,
        Color::Gold,
        Color::Silver,
        Color::Teal,
        Color::Navy,
        Color::Maroon,
        Color::Olive,
        Color::Lime,
        Color::Aqua,
        Color::Violet,
        Color::Indigo,
        Color::Crimson,
        Color::Coral,
        Color::Salmon,
        Color::Khaki,
        Color::Beige,
        Color::Turquoise,
    ];

    /// Tag name used in markup, e.g. `bright-red`.
    pub fn name(self) -> &'static str {
        match self {
            Color::Default => "default",
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
            Color::Magenta => "magenta",
            Color::Cyan => "cyan",
            Color::White => "white",
            Color::Gray => "gray",
            Color::DarkGray => "dark-gray",
            Color::BrightRed => "bright-red",
            Color::BrightGreen => "bright-green",
            Color::BrightYellow => "bright-yellow",
            Color::BrightBlue => "bright-blue",
            Color::BrightMagenta => "bright-magenta",
            Color::BrightCyan => "bright-cyan",
            Color::BrightWhite => "bright-white",
            Color::Orange => "orange",
            Color::Pink => "pink",
            Color::Purple => "purple",
            Color::Brown => "brown",
            Color::Gold => "gold",
            Color::Silver => "silver",
            Color::Teal => "teal",
            Color::Navy => "navy",
            Color::Maroon => "maroon",
            Color::Olive => "olive",
            Color::Lime => "lime",
            Color::Aqua => "aqua",
            Color::Violet => "violet",
            Color::Indigo => "indigo",
            Color::Crimson => "crimson",
            Color::Coral => "coral",
            Color::Salmon => "salmon",
            Color::Khaki => "khaki",
            Color::Beige => "beige",
            Color::Turquoise => "turquoise",
        }
    }

    /// Look up a color by its tag name. Names are matched exactly (lower-case).
    pub fn from_name(name: &str) -> Option<Color> {
        Color::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// xterm-256 foreground index, `None` for [`Color::Default`].
    pub fn xterm_index(self) -> Option<u8> {
        let idx = match self {
            Color::Default => return None,
            Color::Black => 0,
            Color::Red => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Blue => 4,
            Color::Magenta => 5,
            Color::Cyan => 6,
            Color::White => 7,
            Color::DarkGray => 8,
            Color::BrightRed => 9,
            Color::BrightGreen => 10,
            Color::BrightYellow => 11,
            Color::BrightBlue => 12,
            Color::BrightMagenta => 13,
            Color::BrightCyan => 14,
            Color::BrightWhite => 15,
            Color::Gray => 245,
            Color::Orange => 208,
            Color::Pink => 218,
            Color::Purple => 93,
            Color::Brown => 130,
            Color::Gold => 220,
            Color::Silver => 250,
            Color::Teal => 30,
            Color::Navy => 17,
            Color::Maroon => 52,
            Color::Olive => 100,
            Color::Lime => 118,
            Color::Aqua => 51,
            Color::Violet => 177,
            Color::Indigo => 54,
            Color::Crimson => 161,
            Color::Coral => 209,
            Color::Salmon => 210,
            Color::Khaki => 186,
            Color::Beige => 230,
            Color::Turquoise => 44,
        };
        Some(idx)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for color in Color::ALL {
            assert_eq!(Color::from_name(color.name()), Some(color));
        }
    }

    #[test]
    fn lookup_is_case_sensitive_and_hyphenated() {
        assert_eq!(Color::from_name("bright-red"), Some(Color::BrightRed));
        assert_eq!(Color::from_name("Red"), None);
        assert_eq!(Color::from_name("bright_red"), None);
    }

    #[test]
    fn palette_has_37_named_colors() {
        let named = Color::ALL.iter().filter(|c| **c != Color::Default).count();
        assert_eq!(named, 37);
    }
}
