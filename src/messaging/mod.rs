//! Game messages and the topic-based publish/subscribe bus.
//!
//! Everything that reaches a player is a [`Message`]: an immutable, uniquely
//! identified list of styled [`Segment`]s. Producers hand the bus any
//! [`Content`] (markup, plain text, prepared segments or a finished message)
//! and it is normalized before fan-out.

pub mod bus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::markup::{self, MarkupError, Segment};

pub use bus::{Bus, Exclude, Subscriber, SubscriberId, Topic};

/// Immutable message delivered to players. Identity is the `id`; two values
/// with the same id are the same message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            segments,
        }
    }

    /// Unstyled message; never fails.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::new(Vec::new());
        }
        Self::new(vec![Segment::plain(text)])
    }

    pub fn markup(text: &str) -> Result<Self, MarkupError> {
        Ok(Self::new(markup::parse(text)?))
    }

    /// Text content with styling stripped.
    pub fn text(&self) -> String {
        markup::plain_text(&self.segments)
    }
}

/// Anything the bus accepts as message content.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Authored markup; parse errors are reported to the sender.
    Markup(String),
    /// Raw text rendered verbatim.
    Plain(String),
    /// Pre-parsed section.
    Section(Vec<Segment>),
    /// A finished message; its id is preserved.
    Message(Message),
}

impl Content {
    pub fn into_message(self) -> Result<Message, MarkupError> {
        match self {
            Content::Markup(text) => Message::markup(&text),
            Content::Plain(text) => Ok(Message::plain(text)),
            Content::Section(segments) => Ok(Message::new(segments)),
            Content::Message(message) => Ok(message),
        }
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Markup(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Markup(value)
    }
}

impl From<Vec<Segment>> for Content {
    fn from(value: Vec<Segment>) -> Self {
        Content::Section(value)
    }
}

impl From<Message> for Content {
    fn from(value: Message) -> Self {
        Content::Message(value)
    }
}
