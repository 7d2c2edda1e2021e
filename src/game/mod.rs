//! # Game Module
//!
//! Runtime state of a dungeon level and everything that lives on it.
//!
//! This module contains the simulation building blocks:
//! - Level session, command surface, and the turn engine
//! - Tile, visibility, and grid representation
//! - Template-driven actors, the player character, and status effects
//! - Field-of-view, AI decisions, and combat resolution

pub mod actors;
pub mod ai;
pub mod catalog;
pub mod combat;
pub mod effects;
pub mod fov;
pub mod state;
pub mod world;

pub use actors::*;
pub use ai::*;
pub use catalog::*;
pub use combat::*;
pub use effects::*;
pub use fov::*;
pub use state::*;
pub use world::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 2D coordinate on a level grid.
///
/// # Examples
///
/// ```
/// use warren::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
///
/// let adjacent = pos.adjacent_positions();
/// assert_eq!(adjacent.len(), 8); // All 8 surrounding positions
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the origin position (0, 0).
    pub fn origin() -> Self {
        Self::new(0, 0)
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use warren::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Calculates the Euclidean distance to another position.
    pub fn euclidean_distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// True when the other position is within one step, diagonals included.
    ///
    /// # Examples
    ///
    /// ```
    /// use warren::Position;
    ///
    /// assert!(Position::new(4, 4).touches(Position::new(5, 5)));
    /// assert!(!Position::new(4, 4).touches(Position::new(6, 4)));
    /// ```
    pub fn touches(self, other: Position) -> bool {
        self != other && self.euclidean_distance(other) <= 1.5
    }

    /// One greedy step toward the target: each axis moves by its sign of the
    /// remaining delta, so diagonal closing is allowed.
    pub fn step_toward(self, target: Position) -> Position {
        Position::new(
            self.x + (target.x - self.x).signum(),
            self.y + (target.y - self.y).signum(),
        )
    }

    /// One greedy step directly away from the target.
    pub fn step_away(self, target: Position) -> Position {
        Position::new(
            self.x - (target.x - self.x).signum(),
            self.y - (target.y - self.y).signum(),
        )
    }

    /// Returns all 8 adjacent positions (including diagonals).
    pub fn adjacent_positions(self) -> Vec<Position> {
        vec![
            Position::new(self.x - 1, self.y - 1), // NW
            Position::new(self.x, self.y - 1),     // N
            Position::new(self.x + 1, self.y - 1), // NE
            Position::new(self.x - 1, self.y),     // W
            Position::new(self.x + 1, self.y),     // E
            Position::new(self.x - 1, self.y + 1), // SW
            Position::new(self.x, self.y + 1),     // S
            Position::new(self.x + 1, self.y + 1), // SE
        ]
    }

    /// Returns only the 4 cardinal adjacent positions (no diagonals).
    pub fn cardinal_adjacent_positions(self) -> Vec<Position> {
        vec![
            Position::new(self.x, self.y - 1), // N
            Position::new(self.x, self.y + 1), // S
            Position::new(self.x - 1, self.y), // W
            Position::new(self.x + 1, self.y), // E
        ]
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Unique identifier for live actors.
pub type ActorId = Uuid;

/// Creates a new unique actor ID.
pub fn new_actor_id() -> ActorId {
    Uuid::new_v4()
}
