use std::path::{Path, PathBuf};

use log::{debug, info};

use super::errors::WorldError;
use super::ops::{MoveOutcome, SpawnOutcome};
use super::resolver::Resolution;
use super::seed::canonical_world_seed;
use super::tx::{self, decode_record, RetryPolicy, WorldTx};
use super::types::{
    DespawnReason, Direction, InventoryRecord, ItemRecord, PlayerRecord, Presence, Record,
    RoomRecord,
};

const TREE_WORLD: &str = "world";
const TREE_HISTORY: &str = "history";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct WorldStoreBuilder {
    path: PathBuf,
    ensure_world_seed: bool,
    policy: RetryPolicy,
}

impl WorldStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ensure_world_seed: true,
            policy: RetryPolicy::default(),
        }
    }

    /// Opt out of seeding the canonical world during initialization (useful for targeted tests).
    pub fn without_world_seed(mut self) -> Self {
        self.ensure_world_seed = false;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn open(self) -> Result<WorldStore, WorldError> {
        WorldStore::open_with_options(self.path, self.ensure_world_seed, self.policy)
    }
}

/// Sled-backed world state plus the per-actor message logs.
pub struct WorldStore {
    _db: sled::Db,
    world: sled::Tree,
    history: sled::Tree,
    policy: RetryPolicy,
}

impl WorldStore {
    /// Open (or create) the store rooted at `path`, seeding the canonical
    /// world when no rooms exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WorldError> {
        Self::open_with_options(path, true, RetryPolicy::default())
    }

    fn open_with_options<P: AsRef<Path>>(
        path: P,
        seed_world: bool,
        policy: RetryPolicy,
    ) -> Result<Self, WorldError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let world = db.open_tree(TREE_WORLD)?;
        let history = db.open_tree(TREE_HISTORY)?;
        let store = Self {
            _db: db,
            world,
            history,
            policy,
        };

        if seed_world {
            store.seed_world_if_needed()?;
        }

        Ok(store)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `f` at serializable isolation, retrying on conflict. See [`tx::run`].
    pub async fn tx<T, F>(&self, f: F) -> Result<T, WorldError>
    where
        F: FnMut(&mut WorldTx<'_>) -> Result<T, WorldError>,
    {
        tx::run(&self.world, &self.policy, f).await
    }

    fn snapshot<R: Record>(&self, id: &str) -> Result<R, WorldError> {
        let Some(bytes) = self.world.get(R::key(id))? else {
            return Err(WorldError::NotFound(format!("{}: {}", R::PREFIX, id)));
        };
        decode_record(&bytes)
    }

    fn scan<R: Record>(&self) -> Result<Vec<R>, WorldError> {
        let prefix = format!("{}:", R::PREFIX);
        let mut records = Vec::new();
        for entry in self.world.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            records.push(decode_record(&bytes)?);
        }
        Ok(records)
    }

    /// Committed player state, outside any transaction.
    pub fn get_player(&self, id: &str) -> Result<PlayerRecord, WorldError> {
        self.snapshot(id)
    }

    pub fn get_room(&self, id: &str) -> Result<RoomRecord, WorldError> {
        self.snapshot(id)
    }

    pub fn get_item(&self, id: &str) -> Result<ItemRecord, WorldError> {
        self.snapshot(id)
    }

    pub fn list_players(&self) -> Result<Vec<PlayerRecord>, WorldError> {
        self.scan()
    }

    /// Players whose presence is online or away.
    pub fn online_players(&self) -> Result<Vec<PlayerRecord>, WorldError> {
        let mut players: Vec<PlayerRecord> = self
            .scan::<PlayerRecord>()?
            .into_iter()
            .filter(|p| p.presence != Presence::Offline)
            .collect();
        players.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(players)
    }

    pub fn count_rooms(&self) -> Result<usize, WorldError> {
        Ok(self.world.scan_prefix(b"rooms:").count())
    }

    /// Install the canonical world when no rooms exist. Returns rooms written.
    pub fn seed_world_if_needed(&self) -> Result<usize, WorldError> {
        if self.count_rooms()? > 0 {
            return Ok(0);
        }
        let seed = canonical_world_seed();
        let mut batch = sled::Batch::default();
        for room in &seed.rooms {
            batch.insert(RoomRecord::key(&room.id), bincode::serialize(room)?);
        }
        for inventory in &seed.inventories {
            batch.insert(InventoryRecord::key(&inventory.id), bincode::serialize(inventory)?);
        }
        for item in &seed.items {
            batch.insert(ItemRecord::key(&item.id), bincode::serialize(item)?);
        }
        self.world.apply_batch(batch)?;
        self.world.flush()?;
        info!("seeded world with {} rooms", seed.rooms.len());
        Ok(seed.rooms.len())
    }

    pub async fn create_player(
        &self,
        id: &str,
        display_name: &str,
        start_room: &str,
    ) -> Result<PlayerRecord, WorldError> {
        self.tx(|tx| tx.create_player(id, display_name, start_room))
            .await
    }

    pub async fn spawn_player(&self, id: &str) -> Result<SpawnOutcome, WorldError> {
        self.tx(|tx| tx.spawn_player(id)).await
    }

    pub async fn despawn_player(
        &self,
        id: &str,
        reason: DespawnReason,
    ) -> Result<PlayerRecord, WorldError> {
        self.tx(|tx| tx.despawn_player(id, reason)).await
    }

    pub async fn set_presence(
        &self,
        id: &str,
        presence: Presence,
    ) -> Result<PlayerRecord, WorldError> {
        self.tx(|tx| tx.set_presence(id, presence)).await
    }

    pub async fn move_player(
        &self,
        id: &str,
        direction: Direction,
    ) -> Result<MoveOutcome, WorldError> {
        self.tx(|tx| tx.move_player(id, direction)).await
    }

    pub async fn find_item_by_name_prefix(
        &self,
        inventory_id: &str,
        term: &str,
    ) -> Result<Resolution, WorldError> {
        self.tx(|tx| tx.find_item_by_name_prefix(inventory_id, term))
            .await
    }

    pub async fn move_item(
        &self,
        item_id: &str,
        destination_inventory: &str,
    ) -> Result<ItemRecord, WorldError> {
        self.tx(|tx| tx.move_item(item_id, destination_inventory))
            .await
    }

    /// Mark every player not already offline as offline with `reason`.
    /// Returns the ids touched.
    pub async fn despawn_stale_players(
        &self,
        reason: DespawnReason,
    ) -> Result<Vec<String>, WorldError> {
        let stale: Vec<String> = self
            .online_players()?
            .into_iter()
            .map(|p| p.id)
            .collect();
        for id in &stale {
            self.despawn_player(id, reason).await?;
        }
        if !stale.is_empty() {
            info!("despawned {} stale players ({})", stale.len(), reason);
        }
        Ok(stale)
    }

    pub fn read_actor_log(&self, player_id: &str) -> Result<Option<Vec<u8>>, WorldError> {
        Ok(self.history.get(player_id.as_bytes())?.map(|v| v.to_vec()))
    }

    pub fn write_actor_log(&self, player_id: &str, bytes: Vec<u8>) -> Result<(), WorldError> {
        self.history.insert(player_id.as_bytes(), bytes)?;
        self.history.flush()?;
        debug!("flushed message log for {}", player_id);
        Ok(())
    }

    pub fn clear_actor_log(&self, player_id: &str) -> Result<(), WorldError> {
        self.history.remove(player_id.as_bytes())?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), WorldError> {
        self.world.flush()?;
        self.history.flush()?;
        Ok(())
    }
}
