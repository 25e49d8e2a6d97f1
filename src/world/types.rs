use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const ROOM_SCHEMA_VERSION: u8 = 1;
pub const ITEM_SCHEMA_VERSION: u8 = 1;
pub const INVENTORY_SCHEMA_VERSION: u8 = 1;

/// A keyed, versioned record stored in the world tree as `<prefix>:<id>`.
pub trait Record: Serialize + DeserializeOwned {
    /// Key prefix and entity label used in errors.
    const PREFIX: &'static str;
    const SCHEMA_VERSION: u8;

    fn record_id(&self) -> &str;
    fn schema_version(&self) -> u8;
    fn set_schema_version(&mut self, version: u8);

    fn key(id: &str) -> Vec<u8> {
        format!("{}:{}", Self::PREFIX, id).into_bytes()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Direction {
    /// Parse a direction name or its short alias (`n`, `ne`, `u`, ...).
    pub fn parse(word: &str) -> Option<Direction> {
        let dir = match word.to_ascii_lowercase().as_str() {
            "n" | "north" => Direction::North,
            "s" | "south" => Direction::South,
            "e" | "east" => Direction::East,
            "w" | "west" => Direction::West,
            "u" | "up" => Direction::Up,
            "d" | "down" => Direction::Down,
            "ne" | "northeast" => Direction::Northeast,
            "nw" | "northwest" => Direction::Northwest,
            "se" | "southeast" => Direction::Southeast,
            "sw" | "southwest" => Direction::Southwest,
            _ => return None,
        };
        Some(dir)
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Northeast => "northeast",
            Direction::Northwest => "northwest",
            Direction::Southeast => "southeast",
            Direction::Southwest => "southwest",
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Northeast => Direction::Southwest,
            Direction::Northwest => Direction::Southeast,
            Direction::Southeast => Direction::Northwest,
            Direction::Southwest => Direction::Northeast,
        }
    }
}

/// Connectivity status as the rest of the world sees it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Away,
    Offline,
}

/// Why a player went offline. Chosen by whoever triggers the despawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DespawnReason {
    ServerStart,
    ServerShutdown,
    Timeout,
    Quit,
}

impl DespawnReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DespawnReason::ServerStart => "server_start",
            DespawnReason::ServerShutdown => "server_shutdown",
            DespawnReason::Timeout => "timeout",
            DespawnReason::Quit => "quit",
        }
    }

    /// Restart-caused despawns hide the next "has arrived" notice.
    pub fn suppresses_arrival(self) -> bool {
        matches!(self, DespawnReason::ServerStart | DespawnReason::ServerShutdown)
    }
}

impl std::fmt::Display for DespawnReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub id: String,
    pub display_name: String,
    pub current_room: String,
    pub inventory_id: String,
    pub presence: Presence,
    #[serde(default)]
    pub last_despawn_reason: Option<DespawnReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(id: &str, display_name: &str, starting_room: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            current_room: starting_room.to_string(),
            inventory_id: format!("player:{}", id),
            presence: Presence::Offline,
            last_despawn_reason: None,
            created_at: now,
            updated_at: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub exits: BTreeMap<Direction, String>,
    pub inventory_id: String,
    /// Ids of players currently present (online or away).
    #[serde(default)]
    pub occupants: Vec<String>,
    pub schema_version: u8,
}

impl RoomRecord {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            exits: BTreeMap::new(),
            inventory_id: format!("room:{}", id),
            occupants: Vec::new(),
            schema_version: ROOM_SCHEMA_VERSION,
        }
    }

    pub fn with_exit(mut self, direction: Direction, to: &str) -> Self {
        self.exits.insert(direction, to.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub inventory_id: String,
    pub schema_version: u8,
}

impl ItemRecord {
    pub fn new(id: &str, name: &str, description: &str, inventory_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            inventory_id: inventory_id.to_string(),
            schema_version: ITEM_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InventoryOwner {
    Room(String),
    Player(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRecord {
    pub id: String,
    pub owner: InventoryOwner,
    pub items: Vec<String>,
    pub schema_version: u8,
}

impl InventoryRecord {
    pub fn new(id: &str, owner: InventoryOwner) -> Self {
        Self {
            id: id.to_string(),
            owner,
            items: Vec::new(),
            schema_version: INVENTORY_SCHEMA_VERSION,
        }
    }

    pub fn for_room(room: &RoomRecord) -> Self {
        Self::new(&room.inventory_id, InventoryOwner::Room(room.id.clone()))
    }

    pub fn for_player(player: &PlayerRecord) -> Self {
        Self::new(&player.inventory_id, InventoryOwner::Player(player.id.clone()))
    }
}

macro_rules! impl_record {
    ($ty:ty, $prefix:literal, $version:expr) => {
        impl Record for $ty {
            const PREFIX: &'static str = $prefix;
            const SCHEMA_VERSION: u8 = $version;

            fn record_id(&self) -> &str {
                &self.id
            }
            fn schema_version(&self) -> u8 {
                self.schema_version
            }
            fn set_schema_version(&mut self, version: u8) {
                self.schema_version = version;
            }
        }
    };
}

impl_record!(PlayerRecord, "players", PLAYER_SCHEMA_VERSION);
impl_record!(RoomRecord, "rooms", ROOM_SCHEMA_VERSION);
impl_record!(ItemRecord, "items", ITEM_SCHEMA_VERSION);
impl_record!(InventoryRecord, "inventories", INVENTORY_SCHEMA_VERSION);
