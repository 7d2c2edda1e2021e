//! # Warren
//!
//! The simulation core of a turn-based dungeon crawler: procedural level
//! generation, field-of-view, actor AI, and deterministic combat, with no
//! rendering or input layer attached.
//!
//! ## Architecture Overview
//!
//! The crate is organized around a handful of cooperating pieces:
//!
//! - **Level Session**: owns one generated level, its visibility state, the
//!   player, and every live creature; resolves one turn at a time
//! - **Level Generator**: room-and-corridor and cellular-automata carvers
//!   that always produce connected, stair-linked maps
//! - **Visibility Engine**: Bresenham line-of-sight over a tri-state
//!   fog-of-war grid
//! - **Actor Model**: template-driven creatures plus a stat-based player
//!   character, both plain serializable data
//! - **Combat Resolver**: d20-style strike resolution as pure functions
//!
//! A host (terminal UI, test harness, bot) feeds [`Command`] values into a
//! [`LevelSession`] and renders the grids, actor list, and event log the
//! session exposes after each turn.
//!
//! ## Determinism
//!
//! Every session owns a single seeded random number generator. Given the same
//! seed, the same content catalog, and the same command sequence, generation,
//! spawning, and combat replay identically.

pub mod game;
pub mod generation;

// Core module re-exports
pub use game::*;
pub use generation::*;

// Explicit re-exports for the types hosts touch most often
pub use game::{
    // From actors
    Actor,
    ActorTemplate,
    // From state
    ActionOutcome,
    // From ai
    AiBehavior,
    ClassKind,
    Command,
    // From catalog
    ContentCatalog,
    Dice,
    // From effects
    EffectKind,
    EffectSet,
    ItemTemplate,
    LevelSession,
    // From world
    MapGrid,
    Player,
    Position,
    SessionState,
    SpellTemplate,
    Stats,
    TileKind,
    TimeOfDay,
    Visibility,
    VisibilityGrid,
};

pub use generation::{CaveGenerator, GenerationConfig, Generator, Room, RoomCorridorGenerator};

/// Core error type for the simulation.
#[derive(thiserror::Error, Debug)]
pub enum WarrenError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Session state is invalid
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the crate.
pub type WarrenResult<T> = Result<T, WarrenError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tuning constants.
pub mod config {
    /// Smallest generated dungeon width in tiles
    pub const MIN_MAP_WIDTH: u32 = 100;

    /// Largest ordinary dungeon width in tiles
    pub const MAX_MAP_WIDTH: u32 = 300;

    /// Smallest generated dungeon height in tiles
    pub const MIN_MAP_HEIGHT: u32 = 65;

    /// Largest ordinary dungeon height in tiles
    pub const MAX_MAP_HEIGHT: u32 = 120;

    /// Depth at which oversized dungeon dimensions unlock
    pub const LARGE_DEPTH_THRESHOLD: i32 = 100;

    /// Width ceiling for oversized dungeons
    pub const MAX_LARGE_MAP_WIDTH: u32 = 500;

    /// Height ceiling for oversized dungeons
    pub const MAX_LARGE_MAP_HEIGHT: u32 = 200;

    /// Depth divisor mapping raw depth to a creature-scaling dungeon level
    pub const DEPTH_PER_DUNGEON_LEVEL: i32 = 25;

    /// Deepest depth carved with rooms and corridors; below this, caves
    pub const CAVE_DEPTH_THRESHOLD: i32 = 375;

    /// Length of one full day/night cycle in world turns
    pub const DAY_NIGHT_CYCLE: u64 = 200;

    /// Maximum retained event-log entries
    pub const EVENT_LOG_CAP: usize = 50;

    /// Turns between recall activation and the teleport firing
    pub const RECALL_DELAY_TURNS: u32 = 20;

    /// Consumed turns between automatic searches while search mode is on
    pub const SEARCH_INTERVAL: u64 = 3;

    /// Consumed turns between repeated encumbrance warnings
    pub const OVERWEIGHT_WARNING_INTERVAL: u64 = 50;

    /// Default cap on live same-template clones
    pub const DEFAULT_CLONE_CAP: u32 = 24;

    /// Default creature detection range in tiles
    pub const DEFAULT_DETECTION_RANGE: i32 = 5;

    /// Default percent chance a wounded creature breaks and flees
    pub const DEFAULT_FLEE_CHANCE: u32 = 50;

    /// Creature updates consumed per AI action
    pub const MOVE_COUNTER_THRESHOLD: u8 = 2;

    /// Mana cost of a creature spell
    pub const CREATURE_CAST_COST: i32 = 5;

    /// Player inventory slot cap
    pub const INVENTORY_CAP: usize = 22;

    /// Carry capacity before encumbrance, plus per-strength headroom
    pub const WEIGHT_CAPACITY_BASE: u32 = 3000;

    /// Additional carry capacity per point of strength
    pub const WEIGHT_CAPACITY_PER_STR: u32 = 100;

    /// Unlit vision radius
    pub const BASE_LIGHT_RADIUS: i32 = 1;
}
