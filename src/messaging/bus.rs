//! Topic-based publish/subscribe.
//!
//! Three topic families exist: `player:<id>`, `room:<id>` and `global`.
//! A subscriber is anything with a mailbox ([`Subscriber`]); in practice the
//! player actor. Publishing takes the read lock only long enough to collect
//! the recipients, then delivers outside the lock.
//!
//! Room changes go through [`Bus::resubscribe`], which swaps both
//! subscriptions under one write lock so a publisher never observes the
//! subscriber in both rooms or in neither.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace};

use super::{Content, Message};
use crate::markup::MarkupError;

/// Subscription channel key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Player(String),
    Room(String),
    Global,
}

impl Topic {
    pub fn player(id: &str) -> Self {
        Topic::Player(id.to_string())
    }

    pub fn room(id: &str) -> Self {
        Topic::Room(id.to_string())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Player(id) => write!(f, "player:{}", id),
            Topic::Room(id) => write!(f, "room:{}", id),
            Topic::Global => f.write_str("global"),
        }
    }
}

/// Opaque identity of one subscriber instance (one actor incarnation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

impl SubscriberId {
    pub fn next() -> Self {
        SubscriberId(NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Mailbox the bus delivers into. `deliver` returns `false` once the mailbox
/// is closed; the bus then drops the subscription.
pub trait Subscriber: Send + Sync {
    fn deliver(&self, message: Arc<Message>) -> bool;
}

/// Who not to deliver a room message to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclude {
    /// A specific subscriber handle, usually the originating actor.
    Subscriber(SubscriberId),
    /// A player id; resolved to that player's current subscriber if connected.
    Player(String),
}

impl From<SubscriberId> for Exclude {
    fn from(value: SubscriberId) -> Self {
        Exclude::Subscriber(value)
    }
}

type TopicMap = HashMap<Topic, HashMap<SubscriberId, Arc<dyn Subscriber>>>;

#[derive(Default)]
pub struct Bus {
    topics: RwLock<TopicMap>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TopicMap> {
        self.topics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TopicMap> {
        self.topics.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe `id` to `topic`. Subscribing twice is a no-op.
    pub fn subscribe(&self, topic: Topic, id: SubscriberId, subscriber: Arc<dyn Subscriber>) {
        trace!("bus subscribe {} -> {}", id.as_u64(), topic);
        self.write().entry(topic).or_default().insert(id, subscriber);
    }

    /// Remove `id` from `topic`. Unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriberId) {
        trace!("bus unsubscribe {} -x {}", id.as_u64(), topic);
        let mut topics = self.write();
        Self::remove_locked(&mut topics, topic, id);
    }

    /// Move `id` from one topic to another in a single step.
    pub fn resubscribe(
        &self,
        from: &Topic,
        to: Topic,
        id: SubscriberId,
        subscriber: Arc<dyn Subscriber>,
    ) {
        debug!("bus resubscribe {} {} -> {}", id.as_u64(), from, to);
        let mut topics = self.write();
        Self::remove_locked(&mut topics, from, id);
        topics.entry(to).or_default().insert(id, subscriber);
    }

    /// Drop every subscription held by `id`.
    pub fn unsubscribe_all(&self, id: SubscriberId) {
        let mut topics = self.write();
        topics.retain(|_, subs| {
            subs.remove(&id);
            !subs.is_empty()
        });
    }

    fn remove_locked(topics: &mut TopicMap, topic: &Topic, id: SubscriberId) {
        if let Some(subs) = topics.get_mut(topic) {
            subs.remove(&id);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
    }

    pub fn is_subscribed(&self, topic: &Topic, id: SubscriberId) -> bool {
        self.read()
            .get(topic)
            .map(|subs| subs.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.read().get(topic).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Current subscribers of `player:<id>`, i.e. the live actor for that player.
    pub fn player_subscribers(&self, player_id: &str) -> Vec<SubscriberId> {
        self.read()
            .get(&Topic::player(player_id))
            .map(|subs| subs.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn send_to_player(
        &self,
        player_id: &str,
        content: impl Into<Content>,
    ) -> Result<usize, MarkupError> {
        self.publish(&Topic::player(player_id), content.into(), None)
    }

    pub fn send_to_room(
        &self,
        room_id: &str,
        content: impl Into<Content>,
        exclude: Option<Exclude>,
    ) -> Result<usize, MarkupError> {
        self.publish(&Topic::room(room_id), content.into(), exclude)
    }

    pub fn broadcast_global(&self, content: impl Into<Content>) -> Result<usize, MarkupError> {
        self.publish(&Topic::Global, content.into(), None)
    }

    /// Normalize `content` and deliver it to every subscriber of `topic`
    /// except the excluded ones. Returns the number of deliveries.
    pub fn publish(
        &self,
        topic: &Topic,
        content: Content,
        exclude: Option<Exclude>,
    ) -> Result<usize, MarkupError> {
        let message = Arc::new(content.into_message()?);

        let excluded: Vec<SubscriberId> = match exclude {
            None => Vec::new(),
            Some(Exclude::Subscriber(id)) => vec![id],
            // Not connected means nothing to filter.
            Some(Exclude::Player(player_id)) => self.player_subscribers(&player_id),
        };

        let recipients: Vec<(SubscriberId, Arc<dyn Subscriber>)> = match self.read().get(topic) {
            Some(subs) => subs
                .iter()
                .filter(|(id, _)| !excluded.contains(id))
                .map(|(id, sub)| (*id, Arc::clone(sub)))
                .collect(),
            None => Vec::new(),
        };

        let mut delivered = 0usize;
        let mut closed = Vec::new();
        for (id, sub) in recipients {
            if sub.deliver(Arc::clone(&message)) {
                delivered += 1;
            } else {
                closed.push(id);
            }
        }
        if !closed.is_empty() {
            debug!("bus pruning {} closed subscriber(s) from {}", closed.len(), topic);
            let mut topics = self.write();
            for id in closed {
                Self::remove_locked(&mut topics, topic, id);
            }
        }
        trace!("bus publish {} delivered={}", topic, delivered);
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelSub(mpsc::UnboundedSender<Arc<Message>>);

    impl Subscriber for ChannelSub {
        fn deliver(&self, message: Arc<Message>) -> bool {
            self.0.send(message).is_ok()
        }
    }

    fn sub() -> (SubscriberId, Arc<dyn Subscriber>, mpsc::UnboundedReceiver<Arc<Message>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SubscriberId::next(), Arc::new(ChannelSub(tx)), rx)
    }

    #[test]
    fn topic_display_uses_family_prefixes() {
        assert_eq!(Topic::player("ann").to_string(), "player:ann");
        assert_eq!(Topic::room("square").to_string(), "room:square");
        assert_eq!(Topic::Global.to_string(), "global");
    }

    #[test]
    fn room_send_honors_subscriber_exclusion() {
        let bus = Bus::new();
        let (a, a_sub, mut a_rx) = sub();
        let (b, b_sub, mut b_rx) = sub();
        let (c, c_sub, mut c_rx) = sub();
        for (id, s) in [(a, a_sub), (b, b_sub), (c, c_sub)] {
            bus.subscribe(Topic::room("hall"), id, s);
        }

        let n = bus.send_to_room("hall", "hello", Some(a.into())).unwrap();
        assert_eq!(n, 2);
        assert!(a_rx.try_recv().is_err());
        assert_eq!(b_rx.try_recv().unwrap().text(), "hello");
        assert_eq!(c_rx.try_recv().unwrap().text(), "hello");
    }

    #[test]
    fn exclude_by_player_id_resolves_through_player_topic() {
        let bus = Bus::new();
        let (a, a_sub, mut a_rx) = sub();
        let (b, b_sub, mut b_rx) = sub();
        bus.subscribe(Topic::player("ann"), a, Arc::clone(&a_sub));
        bus.subscribe(Topic::room("hall"), a, a_sub);
        bus.subscribe(Topic::room("hall"), b, b_sub);

        bus.send_to_room("hall", "x", Some(Exclude::Player("ann".into()))).unwrap();
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());

        // Unknown player: delivered unfiltered.
        let n = bus
            .send_to_room("hall", "y", Some(Exclude::Player("ghost".into())))
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let bus = Bus::new();
        let (a, a_sub, mut rx) = sub();
        bus.subscribe(Topic::Global, a, Arc::clone(&a_sub));
        bus.subscribe(Topic::Global, a, a_sub);
        assert_eq!(bus.broadcast_global("once").unwrap(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        bus.unsubscribe(&Topic::Global, a);
        bus.unsubscribe(&Topic::Global, a);
        assert_eq!(bus.subscriber_count(&Topic::Global), 0);
    }

    #[test]
    fn resubscribe_moves_between_rooms() {
        let bus = Bus::new();
        let (a, a_sub, _rx) = sub();
        bus.subscribe(Topic::room("one"), a, Arc::clone(&a_sub));
        bus.resubscribe(&Topic::room("one"), Topic::room("two"), a, a_sub);
        assert!(!bus.is_subscribed(&Topic::room("one"), a));
        assert!(bus.is_subscribed(&Topic::room("two"), a));
    }

    #[test]
    fn closed_mailboxes_are_pruned() {
        let bus = Bus::new();
        let (a, a_sub, rx) = sub();
        bus.subscribe(Topic::Global, a, a_sub);
        drop(rx);
        assert_eq!(bus.broadcast_global("gone").unwrap(), 0);
        assert_eq!(bus.subscriber_count(&Topic::Global), 0);
    }

    #[test]
    fn unsubscribe_all_clears_every_topic() {
        let bus = Bus::new();
        let (a, a_sub, _rx) = sub();
        bus.subscribe(Topic::Global, a, Arc::clone(&a_sub));
        bus.subscribe(Topic::player("ann"), a, Arc::clone(&a_sub));
        bus.subscribe(Topic::room("hall"), a, a_sub);
        bus.unsubscribe_all(a);
        assert!(bus.player_subscribers("ann").is_empty());
        assert_eq!(bus.subscriber_count(&Topic::room("hall")), 0);
    }

    #[test]
    fn invalid_markup_is_not_published() {
        let bus = Bus::new();
        assert!(bus.broadcast_global("<red>unclosed").is_err());
    }
}
