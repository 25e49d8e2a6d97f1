//! World operations. Every method runs inside the caller's [`WorldTx`], so a
//! command composes several of them into one serializable unit.

use log::trace;

use super::errors::WorldError;
use super::resolver::{self, Resolution};
use super::tx::WorldTx;
use super::types::{
    DespawnReason, Direction, InventoryRecord, ItemRecord, PlayerRecord, Presence, RoomRecord,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Moved { from: String, to: RoomRecord },
    NoExit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnOutcome {
    pub player: PlayerRecord,
    /// False when the previous despawn was restart-caused.
    pub announce: bool,
}

impl<'a> WorldTx<'a> {
    pub fn get_player(&mut self, id: &str) -> Result<PlayerRecord, WorldError> {
        self.get(id)
    }

    pub fn find_player(&mut self, id: &str) -> Result<Option<PlayerRecord>, WorldError> {
        self.find(id)
    }

    pub fn put_player(&mut self, mut player: PlayerRecord) -> Result<(), WorldError> {
        player.touch();
        self.put(player)
    }

    pub fn get_room(&mut self, id: &str) -> Result<RoomRecord, WorldError> {
        self.get(id)
    }

    pub fn put_room(&mut self, room: RoomRecord) -> Result<(), WorldError> {
        self.put(room)
    }

    pub fn get_item(&mut self, id: &str) -> Result<ItemRecord, WorldError> {
        self.get(id)
    }

    pub fn put_item(&mut self, item: ItemRecord) -> Result<(), WorldError> {
        self.put(item)
    }

    pub fn get_inventory(&mut self, id: &str) -> Result<InventoryRecord, WorldError> {
        self.get(id)
    }

    pub fn put_inventory(&mut self, inventory: InventoryRecord) -> Result<(), WorldError> {
        self.put(inventory)
    }

    /// Items held by an inventory, in inventory order.
    pub fn inventory_items(&mut self, inventory_id: &str) -> Result<Vec<ItemRecord>, WorldError> {
        let inventory = self.get_inventory(inventory_id)?;
        inventory
            .items
            .iter()
            .map(|item_id| self.get_item(item_id))
            .collect()
    }

    /// Create a player (and its inventory) unless one already exists.
    pub fn create_player(
        &mut self,
        id: &str,
        display_name: &str,
        start_room: &str,
    ) -> Result<PlayerRecord, WorldError> {
        if let Some(existing) = self.find_player(id)? {
            return Ok(existing);
        }
        // Fail early rather than strand the player in a missing room.
        self.get_room(start_room)?;
        let player = PlayerRecord::new(id, display_name, start_room);
        self.put_inventory(InventoryRecord::for_player(&player))?;
        self.put_player(player.clone())?;
        Ok(player)
    }

    pub fn move_player(
        &mut self,
        player_id: &str,
        direction: Direction,
    ) -> Result<MoveOutcome, WorldError> {
        let mut player = self.get_player(player_id)?;
        let mut from = self.get_room(&player.current_room)?;
        let Some(target_id) = from.exits.get(&direction).cloned() else {
            return Ok(MoveOutcome::NoExit);
        };
        let mut to = self.get_room(&target_id)?;

        from.occupants.retain(|id| id != player_id);
        if !to.occupants.iter().any(|id| id == player_id) {
            to.occupants.push(player_id.to_string());
        }
        player.current_room = to.id.clone();

        trace!(
            "move {} {} from {} to {}",
            player_id,
            direction.name(),
            from.id,
            to.id
        );
        let from_id = from.id.clone();
        self.put_room(from)?;
        self.put_room(to.clone())?;
        self.put_player(player)?;
        Ok(MoveOutcome::Moved { from: from_id, to })
    }

    pub fn find_item_by_name_prefix(
        &mut self,
        inventory_id: &str,
        term: &str,
    ) -> Result<Resolution, WorldError> {
        let items = self.inventory_items(inventory_id)?;
        Ok(resolver::resolve(&items, term))
    }

    /// Move an item between inventories. The item must currently be listed
    /// in the inventory its record points at.
    pub fn move_item(
        &mut self,
        item_id: &str,
        destination_inventory: &str,
    ) -> Result<ItemRecord, WorldError> {
        let mut item = self.get_item(item_id)?;
        if item.inventory_id == destination_inventory {
            return Ok(item);
        }
        let mut source = self.get_inventory(&item.inventory_id)?;
        let mut destination = self.get_inventory(destination_inventory)?;

        let before = source.items.len();
        source.items.retain(|id| id != item_id);
        if source.items.len() == before {
            return Err(WorldError::Invalid(format!(
                "item {} not listed in {}",
                item_id, source.id
            )));
        }
        destination.items.push(item_id.to_string());
        item.inventory_id = destination.id.clone();

        self.put_inventory(source)?;
        self.put_inventory(destination)?;
        self.put_item(item.clone())?;
        Ok(item)
    }

    /// Bring a player online in its current room.
    pub fn spawn_player(&mut self, player_id: &str) -> Result<SpawnOutcome, WorldError> {
        let mut player = self.get_player(player_id)?;
        let announce = player.presence == Presence::Offline
            && !player
                .last_despawn_reason
                .map(DespawnReason::suppresses_arrival)
                .unwrap_or(false);

        let mut room = self.get_room(&player.current_room)?;
        if !room.occupants.iter().any(|id| id == player_id) {
            room.occupants.push(player_id.to_string());
            self.put_room(room)?;
        }

        player.presence = Presence::Online;
        player.last_despawn_reason = None;
        self.put_player(player.clone())?;
        Ok(SpawnOutcome { player, announce })
    }

    /// Take a player offline, recording why.
    pub fn despawn_player(
        &mut self,
        player_id: &str,
        reason: DespawnReason,
    ) -> Result<PlayerRecord, WorldError> {
        let mut player = self.get_player(player_id)?;
        if let Some(mut room) = self.find::<RoomRecord>(&player.current_room)? {
            let before = room.occupants.len();
            room.occupants.retain(|id| id != player_id);
            if room.occupants.len() != before {
                self.put_room(room)?;
            }
        }
        player.presence = Presence::Offline;
        player.last_despawn_reason = Some(reason);
        self.put_player(player.clone())?;
        Ok(player)
    }

    pub fn set_presence(
        &mut self,
        player_id: &str,
        presence: Presence,
    ) -> Result<PlayerRecord, WorldError> {
        let mut player = self.get_player(player_id)?;
        if player.presence != presence {
            player.presence = presence;
            self.put_player(player.clone())?;
        }
        Ok(player)
    }
}

#[cfg(test)]
mod tests {
    use crate::world::seed::{MARKET_ID, START_ROOM_ID};
    use crate::world::{Direction, MoveOutcome, Presence, Resolution, WorldStoreBuilder};
    use crate::world::types::DespawnReason;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_player_updates_occupants_on_both_sides() {
        let dir = TempDir::new().unwrap();
        let store = WorldStoreBuilder::new(dir.path()).open().unwrap();
        store.create_player("ann", "Ann", START_ROOM_ID).await.unwrap();
        store.spawn_player("ann").await.unwrap();

        let outcome = store
            .tx(|tx| tx.move_player("ann", Direction::North))
            .await
            .unwrap();
        match outcome {
            MoveOutcome::Moved { from, to } => {
                assert_eq!(from, START_ROOM_ID);
                assert_eq!(to.id, MARKET_ID);
                assert!(to.occupants.contains(&"ann".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
        let square = store.get_room(START_ROOM_ID).unwrap();
        assert!(!square.occupants.contains(&"ann".to_string()));
        assert_eq!(store.get_player("ann").unwrap().current_room, MARKET_ID);

        let blocked = store
            .tx(|tx| tx.move_player("ann", Direction::West))
            .await
            .unwrap();
        assert_eq!(blocked, MoveOutcome::NoExit);
    }

    #[tokio::test]
    async fn move_item_transfers_between_inventories() {
        let dir = TempDir::new().unwrap();
        let store = WorldStoreBuilder::new(dir.path()).open().unwrap();
        let player = store.create_player("bob", "Bob", START_ROOM_ID).await.unwrap();
        let room_inv = store.get_room(START_ROOM_ID).unwrap().inventory_id;

        let inv_id = player.inventory_id.clone();
        let moved = store
            .tx(|tx| {
                let Resolution::Found(item) = tx.find_item_by_name_prefix(&room_inv, "sword")? else {
                    panic!("sword missing");
                };
                tx.move_item(&item.id, &inv_id)
            })
            .await
            .unwrap();
        assert_eq!(moved.inventory_id, player.inventory_id);

        let carried = store.tx(|tx| tx.inventory_items(&inv_id)).await.unwrap();
        assert_eq!(carried.len(), 1);
        let left = store
            .tx(|tx| tx.find_item_by_name_prefix(&room_inv, "sword"))
            .await
            .unwrap();
        assert_eq!(left, Resolution::NoMatch);
    }

    #[tokio::test]
    async fn restart_despawn_suppresses_next_arrival_only() {
        let dir = TempDir::new().unwrap();
        let store = WorldStoreBuilder::new(dir.path()).open().unwrap();
        store.create_player("cy", "Cy", START_ROOM_ID).await.unwrap();

        assert!(store.spawn_player("cy").await.unwrap().announce);
        store.despawn_player("cy", DespawnReason::ServerShutdown).await.unwrap();
        assert!(!store.spawn_player("cy").await.unwrap().announce);
        store.despawn_player("cy", DespawnReason::Timeout).await.unwrap();
        let outcome = store.spawn_player("cy").await.unwrap();
        assert!(outcome.announce);
        assert_eq!(outcome.player.presence, Presence::Online);
        assert_eq!(outcome.player.last_despawn_reason, None);

        // Already online: a second spawn is silent.
        assert!(!store.spawn_player("cy").await.unwrap().announce);
    }
}
