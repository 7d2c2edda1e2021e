//! Procedural level generation.
//!
//! Depth 0 is the fixed town layout; every other depth is carved by one of
//! two interchangeable generators selected by depth: rooms and corridors in
//! the upper dungeon, cellular-automata caves below
//! [`config::CAVE_DEPTH_THRESHOLD`]. Whatever the carver, a finished grid
//! holds its stairs, is fully connected across walkable and door tiles, and
//! (outside the town) has mineral veins threaded through its rock.
//!
//! Generators draw all randomness from the caller's generator, so a session
//! seed reproduces the same level.

pub mod caves;
pub mod rooms;
pub mod town;

pub use caves::CaveGenerator;
pub use rooms::{Room, RoomCorridorGenerator};

use crate::game::{Actor, ContentCatalog, MapGrid, Position, TileKind};
use crate::{config, WarrenError, WarrenResult};
use pathfinding::prelude::bfs_reach;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tuning knobs for one generation run.
///
/// [`GenerationConfig::new`] derives the room and smoothing parameters from
/// the grid dimensions; [`GenerationConfig::for_depth`] additionally draws
/// the dimensions themselves from the depth-scaled size window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Grid width in tiles.
    pub width: u32,
    /// Grid height in tiles.
    pub height: u32,
    /// Dungeon depth the level is generated for.
    pub depth: i32,
    /// Smallest room side length.
    pub min_room_size: u32,
    /// Largest room side length.
    pub max_room_size: u32,
    /// Room proposals per run; rejected proposals are not retried.
    pub max_rooms: u32,
    /// Minimum Manhattan distance between placed doors.
    pub min_door_spacing: u32,
    /// Chance an entrance door is hidden in the wall face.
    pub secret_door_chance: f64,
    /// Chance a non-secret entrance door starts closed.
    pub closed_door_chance: f64,
    /// Chance a cave tile seeds as wall before smoothing.
    pub initial_wall_chance: f64,
    /// Smoothing passes for the cave carver.
    pub ca_iterations: u32,
    /// A floor tile with more wall neighbors than this becomes wall.
    pub birth_limit: u32,
    /// A wall tile with fewer wall neighbors than this becomes floor.
    pub death_limit: u32,
}

impl GenerationConfig {
    /// Configuration for a grid of the given size.
    ///
    /// Room count scales with area, capped at 15..50; rooms grow on maps
    /// wider than 200 or taller than 100 tiles; cave smoothing runs
    /// `(w + h) / 50` passes clamped to 4..8.
    pub fn new(width: u32, height: u32, depth: i32) -> Self {
        let max_rooms = ((width * height) / 400).clamp(15, 50);
        let (min_room_size, max_room_size) = if width > 200 || height > 100 {
            (8, 12)
        } else {
            (6, 10)
        };
        let ca_iterations = ((width + height) / 50).clamp(4, 8);
        Self {
            width,
            height,
            depth,
            min_room_size,
            max_room_size,
            max_rooms,
            min_door_spacing: 3,
            secret_door_chance: 0.10,
            closed_door_chance: 0.15,
            initial_wall_chance: 0.45,
            ca_iterations,
            birth_limit: 4,
            death_limit: 3,
        }
    }

    /// Configuration with dimensions drawn from the depth-scaled window.
    ///
    /// The window widens with `depth / 25` inside the configured bounds;
    /// depths past [`config::LARGE_DEPTH_THRESHOLD`] unlock the oversized
    /// ceilings.
    pub fn for_depth(depth: i32, rng: &mut StdRng) -> Self {
        let dungeon_level = (depth / config::DEPTH_PER_DUNGEON_LEVEL).max(0) as u32;
        let (width, height) = if depth >= config::LARGE_DEPTH_THRESHOLD {
            let max_width = (200 + dungeon_level * 10)
                .clamp(config::MAX_MAP_WIDTH, config::MAX_LARGE_MAP_WIDTH);
            let max_height = (50 + dungeon_level * 5)
                .clamp(config::MAX_MAP_HEIGHT, config::MAX_LARGE_MAP_HEIGHT);
            (
                rng.gen_range(config::MAX_MAP_WIDTH..=max_width),
                rng.gen_range(config::MAX_MAP_HEIGHT..=max_height),
            )
        } else {
            let max_width =
                (80 + dungeon_level * 5).clamp(config::MIN_MAP_WIDTH, config::MAX_MAP_WIDTH);
            let max_height =
                (25 + dungeon_level * 2).clamp(config::MIN_MAP_HEIGHT, config::MAX_MAP_HEIGHT);
            (
                rng.gen_range(config::MIN_MAP_WIDTH..=max_width),
                rng.gen_range(config::MIN_MAP_HEIGHT..=max_height),
            )
        };
        Self::new(width, height, depth)
    }

    /// A small grid for fast tests.
    pub fn for_testing(depth: i32) -> Self {
        Self::new(60, 40, depth)
    }
}

/// A level carver.
///
/// Both carvers return a grid that passes [`validate_grid`]: stairs placed,
/// every walkable or door tile reachable from every other.
pub trait Generator {
    /// Carves a full level onto a fresh grid.
    ///
    /// # Errors
    ///
    /// Returns an error when the run produced no usable floor, which only
    /// happens with degenerate configurations.
    fn generate(&self, cfg: &GenerationConfig, rng: &mut StdRng) -> WarrenResult<MapGrid>;

    /// Checks the finished grid against the generation contract.
    fn validate(&self, grid: &MapGrid) -> WarrenResult<()> {
        validate_grid(grid)
    }

    /// Generator name for logging.
    fn generator_type(&self) -> &'static str;
}

/// Generates the level for `depth`: the town at depth 0, a carved dungeon
/// with mineral veins everywhere else.
pub fn generate_level(depth: i32, rng: &mut StdRng) -> WarrenResult<MapGrid> {
    if depth == 0 {
        return Ok(town::town_map());
    }
    let cfg = GenerationConfig::for_depth(depth, rng);
    let mut grid = if depth <= config::CAVE_DEPTH_THRESHOLD {
        let carver = RoomCorridorGenerator::new();
        log::debug!(
            "carving {}x{} level at depth {depth} with {}",
            cfg.width,
            cfg.height,
            carver.generator_type()
        );
        carver.generate(&cfg, rng)?
    } else {
        let carver = CaveGenerator::new();
        log::debug!(
            "carving {}x{} level at depth {depth} with {}",
            cfg.width,
            cfg.height,
            carver.generator_type()
        );
        carver.generate(&cfg, rng)?
    };
    add_mineral_veins(&mut grid, depth, rng);
    Ok(grid)
}

// ----------------------------------------------------------------------
// Connectivity
// ----------------------------------------------------------------------

/// Whether every connective tile (floor, stairs, doors of any kind, town
/// markers) is reachable from every other by 4-directional steps.
pub fn is_fully_connected(grid: &MapGrid) -> bool {
    let Some(start) = grid
        .positions()
        .find(|&pos| grid.tile(pos).is_some_and(TileKind::is_connective))
    else {
        return false;
    };
    let total = grid
        .positions()
        .filter(|&pos| grid.tile(pos).is_some_and(TileKind::is_connective))
        .count();
    reachable_from(grid, start).len() == total
}

/// Every connective tile reachable from `start` by 4-directional steps.
pub(crate) fn reachable_from(grid: &MapGrid, start: Position) -> Vec<Position> {
    bfs_reach(start, |&pos| {
        pos.cardinal_adjacent_positions()
            .into_iter()
            .filter(|&next| grid.tile(next).is_some_and(TileKind::is_connective))
            .collect::<Vec<_>>()
    })
    .collect()
}

/// The generation post-conditions shared by both carvers: one up staircase,
/// one down staircase, and a single connected walkable region.
pub fn validate_grid(grid: &MapGrid) -> WarrenResult<()> {
    let ups = grid.find_tiles(TileKind::StairsUp).len();
    let downs = grid.find_tiles(TileKind::StairsDown).len();
    if ups != 1 || downs != 1 {
        return Err(WarrenError::GenerationFailed(format!(
            "expected one staircase each way, got {ups} up and {downs} down"
        )));
    }
    if !is_fully_connected(grid) {
        return Err(WarrenError::GenerationFailed(
            "level floor is not fully connected".to_string(),
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Shared carving helpers
// ----------------------------------------------------------------------

/// A uniformly random interior floor tile, or `None` when the grid has no
/// floor away from the border.
pub(crate) fn random_floor_tile(grid: &MapGrid, rng: &mut StdRng) -> Option<Position> {
    let floors: Vec<Position> = grid
        .positions()
        .filter(|pos| {
            pos.x > 0
                && pos.y > 0
                && (pos.x as u32) < grid.width - 1
                && (pos.y as u32) < grid.height - 1
                && grid.tile(*pos) == Some(TileKind::Floor)
        })
        .collect();
    if floors.is_empty() {
        None
    } else {
        Some(floors[rng.gen_range(0..floors.len())])
    }
}

/// Whether a wall tile sits between two floor tiles on opposite sides, the
/// requirement for hiding a secret door in it.
pub(crate) fn bridges_floor(grid: &MapGrid, pos: Position) -> bool {
    let floor = |dx: i32, dy: i32| {
        grid.tile(pos + Position::new(dx, dy)) == Some(TileKind::Floor)
    };
    (floor(-1, 0) && floor(1, 0)) || (floor(0, -1) && floor(0, 1))
}

// ----------------------------------------------------------------------
// Mineral veins
// ----------------------------------------------------------------------

/// Threads quartz and magma clusters through the level's rock.
///
/// Vein count scales with depth and with map area relative to the smallest
/// standard map. Clusters only overwrite plain wall, so they never touch the
/// carved floor plan.
pub fn add_mineral_veins(grid: &mut MapGrid, depth: i32, rng: &mut StdRng) {
    if depth <= 0 {
        return;
    }
    let base = (depth / 2).max(3) as f64;
    let area_scale = (grid.width * grid.height) as f64
        / (config::MIN_MAP_WIDTH * config::MIN_MAP_HEIGHT) as f64;
    let quartz = (base * area_scale * rng.gen_range(0.8..1.2)) as u32;
    let magma = (base * area_scale * rng.gen_range(1.0..1.5)) as u32;
    log::debug!("seeding {quartz} quartz and {magma} magma veins");

    for _ in 0..quartz {
        let size = rng.gen_range(3..=6);
        place_vein(grid, TileKind::QuartzVein, size, rng);
    }
    for _ in 0..magma {
        let size = rng.gen_range(4..=8);
        place_vein(grid, TileKind::MagmaVein, size, rng);
    }
}

/// Picks a random wall tile and grows one cluster from it. Gives up quietly
/// when the map has almost no wall left to pick.
fn place_vein(grid: &mut MapGrid, vein: TileKind, size: u32, rng: &mut StdRng) {
    for _ in 0..100 {
        let pos = Position::new(
            rng.gen_range(1..grid.width as i32 - 1),
            rng.gen_range(1..grid.height as i32 - 1),
        );
        if grid.tile(pos) == Some(TileKind::Wall) {
            grow_vein(grid, vein, pos, size, rng);
            return;
        }
    }
}

/// Random walk from `start`, converting wall tiles until the cluster reaches
/// `size` or walks itself into a corner.
fn grow_vein(grid: &mut MapGrid, vein: TileKind, start: Position, size: u32, rng: &mut StdRng) {
    grid.set_tile(start, vein);
    let mut current = start;
    let mut placed = 1;

    while placed < size {
        let mut steps = [(0, 1), (0, -1), (1, 0), (-1, 0)];
        // Fisher-Yates so the walk has no directional bias.
        for i in (1..steps.len()).rev() {
            steps.swap(i, rng.gen_range(0..=i));
        }
        let mut moved = false;
        for (dx, dy) in steps {
            let next = current + Position::new(dx, dy);
            if next.x <= 0
                || next.y <= 0
                || next.x as u32 >= grid.width - 1
                || next.y as u32 >= grid.height - 1
            {
                continue;
            }
            if grid.tile(next) == Some(TileKind::Wall) {
                grid.set_tile(next, vein);
                current = next;
                placed += 1;
                moved = true;
                break;
            }
        }
        if !moved {
            break;
        }
    }
}

// ----------------------------------------------------------------------
// Population
// ----------------------------------------------------------------------

/// Populates a freshly generated level from the catalog's spawn pools.
///
/// Town levels draw 4..8 residents from the depth-0 pool; dungeon levels
/// draw `5..(10 + depth/25)` hostile creatures. Each attempt rolls a
/// template uniformly and accepts it with its depth-drifted spawn chance,
/// then claims a random open floor tile, so a level never stacks two spawns.
pub fn populate_level(
    grid: &MapGrid,
    catalog: &ContentCatalog,
    depth: i32,
    player_position: Position,
    rng: &mut StdRng,
) -> Vec<Actor> {
    let mut open: Vec<Position> = grid
        .positions()
        .filter(|&pos| {
            grid.tile(pos).is_some_and(TileKind::is_open_floor) && pos != player_position
        })
        .collect();
    if open.is_empty() {
        log::warn!("no open floor to spawn on at depth {depth}");
        return Vec::new();
    }

    let dungeon_level = (depth / config::DEPTH_PER_DUNGEON_LEVEL).max(1);
    let (target, pool): (u32, Vec<_>) = if depth == 0 {
        let pool = catalog
            .creatures()
            .filter(|t| t.spawn.is_some_and(|s| s.native_depth == 0))
            .collect();
        (rng.gen_range(4..=8), pool)
    } else {
        let pool = catalog.creatures().filter(|t| t.hostile).collect();
        (rng.gen_range(5..=(10 + dungeon_level) as u32), pool)
    };
    if pool.is_empty() {
        log::warn!("catalog has no spawnable templates for depth {depth}");
        return Vec::new();
    }

    let mut actors = Vec::new();
    let max_attempts = target * 5;
    let mut attempts = 0;
    while !open.is_empty() && (actors.len() as u32) < target && attempts < max_attempts {
        attempts += 1;
        let template = pool[rng.gen_range(0..pool.len())];
        let chance = template.spawn_chance(depth);
        if chance <= 0.0 || rng.gen_range(0.0..100.0) > chance {
            continue;
        }
        let spot = open.swap_remove(rng.gen_range(0..open.len()));
        let actor = catalog.spawn_creature(&template.id, spot, dungeon_level, rng);
        log::debug!(
            "spawned {} at ({}, {}) with chance {chance:.1}",
            actor.name,
            spot.x,
            spot.y
        );
        actors.push(actor);
    }
    actors
}
