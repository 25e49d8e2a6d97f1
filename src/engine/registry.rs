//! Player id -> live actor map with atomic start-or-attach.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::session::ActorHandle;
use crate::messaging::SubscriberId;

#[derive(Default)]
pub struct Registry {
    actors: DashMap<String, ActorHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live actor for `player_id`, calling `start` to create one
    /// if none exists. The check and the insert happen under the same shard
    /// lock, so racing callers all get the same instance. `start` must not
    /// touch the registry. The flag is true when this call started it.
    pub fn ensure_started<F>(&self, player_id: &str, start: F) -> (ActorHandle, bool)
    where
        F: FnOnce() -> ActorHandle,
    {
        match self.actors.entry(player_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_alive() {
                    return (occupied.get().clone(), false);
                }
                // Mailbox closed without deregistering (the task panicked).
                let handle = start();
                occupied.insert(handle.clone());
                (handle, true)
            }
            Entry::Vacant(vacant) => {
                let handle = start();
                vacant.insert(handle.clone());
                (handle, true)
            }
        }
    }

    pub fn get(&self, player_id: &str) -> Option<ActorHandle> {
        self.actors
            .get(player_id)
            .map(|entry| entry.value().clone())
            .filter(ActorHandle::is_alive)
    }

    /// True while an actor that closed its mailbox still holds the entry,
    /// i.e. it is handing late traffic to a successor.
    pub fn is_stopping(&self, player_id: &str) -> bool {
        self.actors
            .get(player_id)
            .map_or(false, |entry| !entry.value().is_alive())
    }

    /// Remove the entry only if it still belongs to `instance`; a successor
    /// that already took the slot is left alone.
    pub fn remove_instance(&self, player_id: &str, instance: SubscriberId) -> bool {
        self.actors
            .remove_if(player_id, |_, handle| handle.instance() == instance)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn handles(&self) -> Vec<ActorHandle> {
        self.actors.iter().map(|entry| entry.value().clone()).collect()
    }
}
