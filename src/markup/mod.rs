//! # Markup
//!
//! A tiny inline markup language for colorizing game output:
//!
//! ```text
//! <red:b>Danger</> the <cyan>old well</> is <i>very</> deep \<3
//! ```
//!
//! - `<name>...</>` opens a tag; the close is always the generic `</>`.
//! - `name` is a palette color (`bright-red`), a modifier (`b`, `i`), or several
//!   joined with `:` (`<red:b:i>`).
//! - Nested tags inherit color and modifiers from their parent. An inner color
//!   replaces the color but keeps the modifiers, and vice versa.
//! - Literal `<`, `>` and `\` are written with a backslash. An unescaped `<` is
//!   always the start of a tag; [`escape`] produces safe markup from raw text.
//!
//! Parsing fails closed with a typed [`MarkupError`]. Code that embeds
//! end-user text should use [`escape`] or fall back with [`parse_or_plain`].

pub mod color;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use color::Color;
pub use parser::{flatten, parse, parse_tree, MarkupError, MarkupNode, MAX_DEPTH};

/// Style modifier that can be applied on top of a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Bold,
    Italic,
}

/// The subset of [`Modifier`]s active on a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub bold: bool,
    pub italic: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        bold: false,
        italic: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.bold && !self.italic
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Bold => self.bold,
            Modifier::Italic => self.italic,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Modifier> {
        let bold = self.bold.then_some(Modifier::Bold);
        let italic = self.italic.then_some(Modifier::Italic);
        bold.into_iter().chain(italic)
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<T: IntoIterator<Item = Modifier>>(iter: T) -> Self {
        let mut mods = Modifiers::NONE;
        for m in iter {
            match m {
                Modifier::Bold => mods.bold = true,
                Modifier::Italic => mods.italic = true,
            }
        }
        mods
    }
}

/// A run of text sharing one color and one set of modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub color: Color,
    pub modifiers: Modifiers,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: Color::Default,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn is_unstyled(&self) -> bool {
        self.color == Color::Default && self.modifiers.is_empty()
    }
}

/// Escape raw text so it renders literally inside markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if matches!(ch, '<' | '>' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Parse markup, or treat the whole string as unstyled text when it is not
/// valid markup.
pub fn parse_or_plain(text: &str) -> Vec<Segment> {
    match parse(text) {
        Ok(segments) => segments,
        Err(e) => {
            log::debug!("markup fallback to plain text: {}", e);
            let mut out = Vec::new();
            parser::push_segment(&mut out, text, Color::Default, Modifiers::NONE);
            out
        }
    }
}

/// Concatenated text of all segments, styling stripped.
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// Render segments back to canonical markup. Parsing the result yields the
/// same segments.
pub fn to_markup(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        if seg.is_unstyled() {
            out.push_str(&escape(&seg.text));
            continue;
        }
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if seg.color != Color::Default {
            parts.push(seg.color.name());
        }
        if seg.modifiers.bold {
            parts.push("b");
        }
        if seg.modifiers.italic {
            parts.push("i");
        }
        out.push('<');
        out.push_str(&parts.join(":"));
        out.push('>');
        out.push_str(&escape(&seg.text));
        out.push_str("</>");
    }
    out
}

/// Render segments with ANSI SGR sequences for terminal sinks.
pub fn to_ansi(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        if seg.is_unstyled() {
            out.push_str(&seg.text);
            continue;
        }
        let mut codes: Vec<String> = Vec::new();
        if seg.modifiers.bold {
            codes.push("1".into());
        }
        if seg.modifiers.italic {
            codes.push("3".into());
        }
        if let Some(idx) = seg.color.xterm_index() {
            codes.push(format!("38;5;{}", idx));
        }
        out.push_str(&format!("\x1b[{}m{}\x1b[0m", codes.join(";"), seg.text));
    }
    out
}
