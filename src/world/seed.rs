//! The small canonical world installed into an empty store.

use super::types::{Direction, InventoryRecord, ItemRecord, RoomRecord};

pub const START_ROOM_ID: &str = "town_square";
pub const MARKET_ID: &str = "market";
pub const OLD_WELL_ID: &str = "old_well";

pub struct WorldSeed {
    pub rooms: Vec<RoomRecord>,
    pub inventories: Vec<InventoryRecord>,
    pub items: Vec<ItemRecord>,
}

pub fn canonical_world_seed() -> WorldSeed {
    let square = RoomRecord::new(
        START_ROOM_ID,
        "Town Square",
        "Cobblestones ring a dry fountain. Lanes lead north to the market, \
         and a rope ladder drops down into the old well.",
    )
    .with_exit(Direction::North, MARKET_ID)
    .with_exit(Direction::Down, OLD_WELL_ID);

    let market = RoomRecord::new(
        MARKET_ID,
        "Market",
        "Empty stalls lean against each other. The square lies south.",
    )
    .with_exit(Direction::South, START_ROOM_ID);

    let well = RoomRecord::new(
        OLD_WELL_ID,
        "Bottom of the Old Well",
        "Damp stone and a circle of sky far above.",
    )
    .with_exit(Direction::Up, START_ROOM_ID);

    let items = vec![
        ItemRecord::new(
            "rusty_sword",
            "rusty sword",
            "Pitted, but it still holds an edge.",
            &square.inventory_id,
        ),
        ItemRecord::new(
            "brass_lantern",
            "brass lantern",
            "A dented lantern with a little oil left.",
            &market.inventory_id,
        ),
        ItemRecord::new(
            "loaf_of_bread",
            "loaf of bread",
            "Yesterday's, and hard as a brick.",
            &well.inventory_id,
        ),
    ];

    let rooms = vec![square, market, well];
    let inventories = rooms
        .iter()
        .map(|room| {
            let mut inventory = InventoryRecord::for_room(room);
            inventory.items = items
                .iter()
                .filter(|item| item.inventory_id == room.inventory_id)
                .map(|item| item.id.clone())
                .collect();
            inventory
        })
        .collect();

    WorldSeed {
        rooms,
        inventories,
        items,
    }
}
