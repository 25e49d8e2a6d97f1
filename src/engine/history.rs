//! Bounded, id-deduplicated message history owned by one player actor.
//!
//! The durable form is a one-byte format tag followed by the bincode-encoded
//! message list. A tag mismatch (or an undecodable body) wipes the history
//! rather than guessing at an old layout.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use uuid::Uuid;

use crate::messaging::Message;

/// Bump whenever [`Message`] or its segments change shape.
pub const HISTORY_FORMAT_VERSION: u8 = 1;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    messages: VecDeque<Arc<Message>>,
    ids: HashSet<Uuid>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// Append a message, evicting the oldest when full. Returns `false` if a
    /// message with the same id is already held.
    pub fn push(&mut self, message: Arc<Message>) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            if let Some(evicted) = self.messages.pop_front() {
                self.ids.remove(&evicted.id);
            }
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.messages.iter()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().map(|m| (**m).clone()).collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        let messages: Vec<&Message> = self.messages.iter().map(|m| m.as_ref()).collect();
        let body = bincode::serialize(&messages)?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(HISTORY_FORMAT_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Rebuild a history from its durable form. `None` means the stored
    /// bytes are from another format and must be discarded.
    pub fn decode(bytes: &[u8], capacity: usize) -> Option<History> {
        let (&version, body) = bytes.split_first()?;
        if version != HISTORY_FORMAT_VERSION {
            return None;
        }
        let messages: Vec<Message> = bincode::deserialize(body).ok()?;
        let mut history = History::new(capacity);
        for message in messages {
            history.push(Arc::new(message));
        }
        Some(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> Arc<Message> {
        Arc::new(Message::plain(text))
    }

    #[test]
    fn duplicate_ids_never_grow_history() {
        let mut history = History::new(100);
        let m = msg("once");
        assert!(history.push(Arc::clone(&m)));
        assert!(!history.push(Arc::clone(&m)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn keeps_most_recent_in_arrival_order() {
        let mut history = History::new(100);
        for i in 0..150 {
            history.push(msg(&format!("m{}", i)));
        }
        assert_eq!(history.len(), 100);
        let texts: Vec<String> = history.snapshot().iter().map(|m| m.text()).collect();
        let expected: Vec<String> = (50..150).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn evicted_ids_can_be_seen_again() {
        let mut history = History::new(2);
        let first = msg("a");
        history.push(Arc::clone(&first));
        history.push(msg("b"));
        history.push(msg("c"));
        assert!(!history.contains(&first.id));
        assert!(history.push(first));
    }

    #[test]
    fn durable_form_round_trips_and_rejects_other_versions() {
        let mut history = History::new(10);
        history.push(Arc::new(Message::markup("<red>hi</>").unwrap()));
        history.push(msg("there"));
        let bytes = history.encode().unwrap();

        let restored = History::decode(&bytes, 10).unwrap();
        assert_eq!(restored.snapshot(), history.snapshot());

        let mut stale = bytes.clone();
        stale[0] = HISTORY_FORMAT_VERSION.wrapping_add(1);
        assert!(History::decode(&stale, 10).is_none());
        assert!(History::decode(&[], 10).is_none());
        assert!(History::decode(&[HISTORY_FORMAT_VERSION, 0xff], 10).is_none());
    }
}
