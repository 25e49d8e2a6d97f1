//! World model: rooms, exits, players, items and inventories in sled, and the
//! serializable transaction wrapper every mutation goes through.
//!
//! ```ignore
//! let store = WorldStoreBuilder::new("./data/world").open()?;
//! let outcome = store.tx(|tx| tx.move_player("ann", Direction::North)).await?;
//! ```

pub mod errors;
pub mod ops;
pub mod resolver;
pub mod seed;
pub mod storage;
pub mod tx;
pub mod types;

pub use errors::WorldError;
pub use ops::{MoveOutcome, SpawnOutcome};
pub use resolver::Resolution;
pub use seed::START_ROOM_ID;
pub use storage::{WorldStore, WorldStoreBuilder};
pub use tx::{RetryPolicy, WorldTx};
pub use types::{
    DespawnReason, Direction, InventoryOwner, InventoryRecord, ItemRecord, PlayerRecord, Presence,
    Record, RoomRecord,
};
