//! The fixed depth-0 town layout.
//!
//! The town is a walled outdoor square: open ground, six solid buildings
//! each pierced by one walkable entrance marker, and a single staircase down
//! into the dungeon. It has no staircase up, so a session entering depth 0
//! lands the player on the down staircase.

use crate::game::{MapGrid, Position, ShopKind, TileKind};

/// Town width in tiles.
pub const TOWN_WIDTH: u32 = 60;
/// Town height in tiles.
pub const TOWN_HEIGHT: u32 = 24;

/// Building footprint width.
const BUILDING_WIDTH: i32 = 10;
/// Building footprint height.
const BUILDING_HEIGHT: i32 = 6;

/// Builds the town grid. The layout is fixed; only its population varies
/// between sessions.
pub fn town_map() -> MapGrid {
    let mut grid = MapGrid::new(TOWN_WIDTH, TOWN_HEIGHT, TileKind::Floor);

    // Perimeter wall.
    for x in 0..TOWN_WIDTH as i32 {
        grid.set_tile(Position::new(x, 0), TileKind::Wall);
        grid.set_tile(Position::new(x, TOWN_HEIGHT as i32 - 1), TileKind::Wall);
    }
    for y in 0..TOWN_HEIGHT as i32 {
        grid.set_tile(Position::new(0, y), TileKind::Wall);
        grid.set_tile(Position::new(TOWN_WIDTH as i32 - 1, y), TileKind::Wall);
    }

    // Two rows of three buildings facing the central street, entrances
    // toward the middle.
    let shops = ShopKind::all();
    for (i, &shop) in shops.iter().enumerate() {
        let column = (i % 3) as i32;
        let top_row = i < 3;
        let x = 6 + column * 19;
        let y = if top_row { 3 } else { TOWN_HEIGHT as i32 - 3 - BUILDING_HEIGHT };
        place_building(&mut grid, shop, Position::new(x, y), top_row);
    }

    let center = Position::new(TOWN_WIDTH as i32 / 2, TOWN_HEIGHT as i32 / 2);
    grid.set_tile(center, TileKind::StairsDown);
    grid
}

/// Carves one solid building with its entrance marker on the street side.
fn place_building(grid: &mut MapGrid, shop: ShopKind, top_left: Position, top_row: bool) {
    for dy in 0..BUILDING_HEIGHT {
        for dx in 0..BUILDING_WIDTH {
            grid.set_tile(top_left + Position::new(dx, dy), TileKind::Wall);
        }
    }
    let door_y = if top_row { BUILDING_HEIGHT - 1 } else { 0 };
    let entrance = top_left + Position::new(BUILDING_WIDTH / 2, door_y);
    grid.set_tile(entrance, TileKind::Shop(shop));
}
