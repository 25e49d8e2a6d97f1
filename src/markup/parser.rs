//! Markup parser: text -> [`MarkupNode`] tree -> flattened [`Segment`]s.
//!
//! Grammar (informal):
//!
//! ```text
//! markup  := (text | escape | tag)*
//! escape  := '\' any-char
//! tag     := '<' name (':' name)* '>' markup '</>'
//! name    := color | 'b' | 'bold' | 'i' | 'italic'
//! ```
//!
//! An unescaped `<` always starts a tag; there is no guessing. A `>` outside a
//! tag is literal. The parser keeps an explicit stack of open tags and refuses
//! input nested deeper than [`MAX_DEPTH`].

use thiserror::Error;

use super::color::Color;
use super::{Modifiers, Segment};

/// Maximum number of simultaneously open tags.
pub const MAX_DEPTH: usize = 16;

/// Markup syntax errors. Positions are byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unclosed tag <{tag}> opened at {position}")]
    UnclosedTag { tag: String, position: usize },

    #[error("unknown color '{name}' at {position}")]
    UnknownColor { name: String, position: usize },

    #[error("unknown modifier '{name}' at {position}")]
    UnknownModifier { name: String, position: usize },

    #[error("unexpected </> at {position}")]
    UnexpectedClose { position: usize },

    #[error("closing tags are always </>, found named close at {position}")]
    NamedClose { position: usize },

    #[error("tag starting at {position} is never terminated with '>'")]
    UnterminatedTag { position: usize },

    #[error("empty tag name at {position}")]
    EmptyTag { position: usize },

    #[error("tag at {position} names more than one color")]
    MultipleColors { position: usize },

    #[error("dangling escape at end of input")]
    DanglingEscape,

    #[error("tags nested deeper than {max} at {position}")]
    TooDeep { max: usize, position: usize },
}

/// Parsed markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Text(String),
    Color(Color, Vec<MarkupNode>),
    Bold(Vec<MarkupNode>),
    Italic(Vec<MarkupNode>),
}

/// Resolved contents of one opening tag.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagSpec {
    raw: String,
    color: Option<Color>,
    bold: bool,
    italic: bool,
}

impl TagSpec {
    fn parse(raw: &str, position: usize) -> Result<TagSpec, MarkupError> {
        if raw.is_empty() {
            return Err(MarkupError::EmptyTag { position });
        }
        if raw.starts_with('/') {
            return Err(MarkupError::NamedClose { position });
        }
        let mut spec = TagSpec {
            raw: raw.to_string(),
            color: None,
            bold: false,
            italic: false,
        };
        for part in raw.split(':') {
            match part {
                "" => return Err(MarkupError::EmptyTag { position }),
                "b" | "bold" => spec.bold = true,
                "i" | "italic" => spec.italic = true,
                other => match Color::from_name(other) {
                    Some(color) => {
                        if spec.color.is_some() {
                            return Err(MarkupError::MultipleColors { position });
                        }
                        spec.color = Some(color);
                    }
                    None if other.chars().count() == 1 => {
                        return Err(MarkupError::UnknownModifier {
                            name: other.to_string(),
                            position,
                        })
                    }
                    None => {
                        return Err(MarkupError::UnknownColor {
                            name: other.to_string(),
                            position,
                        })
                    }
                },
            }
        }
        Ok(spec)
    }

    /// Wrap `children` so that color is outermost, then bold, then italic.
    fn into_node(self, children: Vec<MarkupNode>) -> MarkupNode {
        let mut children = children;
        if self.italic {
            children = vec![MarkupNode::Italic(children)];
        }
        if self.bold {
            children = vec![MarkupNode::Bold(children)];
        }
        match self.color {
            Some(color) => MarkupNode::Color(color, children),
            // Without a color the tag always carries a modifier, so exactly
            // one wrapper node is left.
            None => children
                .pop()
                .unwrap_or_else(|| MarkupNode::Text(String::new())),
        }
    }
}

struct Frame {
    spec: TagSpec,
    opened_at: usize,
    children: Vec<MarkupNode>,
}

fn flush_text(buf: &mut String, target: &mut Vec<MarkupNode>) {
    if !buf.is_empty() {
        target.push(MarkupNode::Text(std::mem::take(buf)));
    }
}

/// Parse markup into a tree.
pub fn parse_tree(input: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut root: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut buf = String::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, escaped)) => buf.push(escaped),
                None => return Err(MarkupError::DanglingEscape),
            },
            '<' => {
                let target = match stack.last_mut() {
                    Some(frame) => &mut frame.children,
                    None => &mut root,
                };
                flush_text(&mut buf, target);

                let rest = &input[pos + 1..];
                if rest.starts_with("/>") {
                    chars.next();
                    chars.next();
                    let Some(frame) = stack.pop() else {
                        return Err(MarkupError::UnexpectedClose { position: pos });
                    };
                    let node = frame.spec.into_node(frame.children);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root.push(node),
                    }
                    continue;
                }

                let Some(end) = rest.find(|c: char| c == '>' || c == '<' || c == '\n') else {
                    return Err(MarkupError::UnterminatedTag { position: pos });
                };
                if rest.as_bytes()[end] != b'>' {
                    return Err(MarkupError::UnterminatedTag { position: pos });
                }
                let spec = TagSpec::parse(&rest[..end], pos)?;
                if stack.len() >= MAX_DEPTH {
                    return Err(MarkupError::TooDeep {
                        max: MAX_DEPTH,
                        position: pos,
                    });
                }
                // Skip the tag name and the closing '>'.
                while let Some(&(next_pos, _)) = chars.peek() {
                    if next_pos > pos + 1 + end {
                        break;
                    }
                    chars.next();
                }
                stack.push(Frame {
                    spec,
                    opened_at: pos,
                    children: Vec::new(),
                });
            }
            other => buf.push(other),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::UnclosedTag {
            tag: open.spec.raw,
            position: open.opened_at,
        });
    }
    flush_text(&mut buf, &mut root);
    Ok(root)
}

/// Flatten a tree into styled runs. Adjacent runs sharing a style are merged
/// and empty runs are dropped.
pub fn flatten(nodes: &[MarkupNode]) -> Vec<Segment> {
    let mut out = Vec::new();
    flatten_into(nodes, Color::Default, Modifiers::default(), &mut out);
    out
}

fn flatten_into(nodes: &[MarkupNode], color: Color, mods: Modifiers, out: &mut Vec<Segment>) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => push_segment(out, text, color, mods),
            MarkupNode::Color(inner, children) => flatten_into(children, *inner, mods, out),
            MarkupNode::Bold(children) => flatten_into(
                children,
                color,
                Modifiers {
                    bold: true,
                    ..mods
                },
                out,
            ),
            MarkupNode::Italic(children) => flatten_into(
                children,
                color,
                Modifiers {
                    italic: true,
                    ..mods
                },
                out,
            ),
        }
    }
}

pub(crate) fn push_segment(out: &mut Vec<Segment>, text: &str, color: Color, modifiers: Modifiers) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut() {
        if last.color == color && last.modifiers == modifiers {
            last.text.push_str(text);
            return;
        }
    }
    out.push(Segment {
        text: text.to_string(),
        color,
        modifiers,
    });
}

/// Parse markup straight to segments.
pub fn parse(input: &str) -> Result<Vec<Segment>, MarkupError> {
    Ok(flatten(&parse_tree(input)?))
}
