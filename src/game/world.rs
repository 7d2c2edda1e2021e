//! Tile vocabulary, fog-of-war states, and the level grids.
//!
//! A level is two parallel rectangular arrays: a [`MapGrid`] of immutable-ish
//! terrain and a [`VisibilityGrid`] of per-tile fog-of-war. Both are plain
//! serializable data; all behavior lives in the session and the generators.

use crate::game::Position;
use serde::{Deserialize, Serialize};

/// The six town buildings, each owning one walkable entrance marker tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShopKind {
    GeneralStore,
    Temple,
    Tavern,
    Armoury,
    WeaponSmith,
    MagicShop,
}

impl ShopKind {
    /// Digit glyph marking the building entrance on the town map.
    pub const fn marker(self) -> char {
        match self {
            ShopKind::GeneralStore => '1',
            ShopKind::Temple => '2',
            ShopKind::Tavern => '3',
            ShopKind::Armoury => '4',
            ShopKind::WeaponSmith => '5',
            ShopKind::MagicShop => '6',
        }
    }

    /// Sign text for the event log when the player steps on the entrance.
    pub const fn name(self) -> &'static str {
        match self {
            ShopKind::GeneralStore => "General Store",
            ShopKind::Temple => "Temple",
            ShopKind::Tavern => "Tavern",
            ShopKind::Armoury => "Armoury",
            ShopKind::WeaponSmith => "Weapon Smith",
            ShopKind::MagicShop => "Magic Shop",
        }
    }

    /// All six buildings in town-layout order.
    pub const fn all() -> [ShopKind; 6] {
        [
            ShopKind::GeneralStore,
            ShopKind::Temple,
            ShopKind::Tavern,
            ShopKind::Armoury,
            ShopKind::WeaponSmith,
            ShopKind::MagicShop,
        ]
    }
}

/// Terrain of a single grid cell.
///
/// An undiscovered [`TileKind::SecretDoor`] renders with the wall glyph and
/// blocks sight exactly like rock; searching converts it to
/// [`TileKind::SecretDoorFound`], which behaves like an ordinary open passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Wall,
    Floor,
    StairsUp,
    StairsDown,
    DoorOpen,
    DoorClosed,
    SecretDoor,
    SecretDoorFound,
    QuartzVein,
    MagmaVein,
    Shop(ShopKind),
}

impl TileKind {
    /// Display glyph for this tile.
    ///
    /// # Examples
    ///
    /// ```
    /// use warren::TileKind;
    ///
    /// assert_eq!(TileKind::StairsDown.symbol(), '>');
    /// // A hidden door is indistinguishable from the wall around it.
    /// assert_eq!(TileKind::SecretDoor.symbol(), TileKind::Wall.symbol());
    /// ```
    pub const fn symbol(self) -> char {
        match self {
            TileKind::Wall => '#',
            TileKind::Floor => '.',
            TileKind::StairsUp => '<',
            TileKind::StairsDown => '>',
            TileKind::DoorOpen => '/',
            TileKind::DoorClosed => '+',
            TileKind::SecretDoor => '#',
            TileKind::SecretDoorFound => 's',
            TileKind::QuartzVein => '%',
            TileKind::MagmaVein => '~',
            TileKind::Shop(kind) => kind.marker(),
        }
    }

    /// Whether a line of sight ends at this tile.
    ///
    /// All wall-like rock is opaque, including mineral veins and doors still
    /// hidden inside the wall face.
    pub const fn blocks_sight(self) -> bool {
        matches!(
            self,
            TileKind::Wall | TileKind::SecretDoor | TileKind::QuartzVein | TileKind::MagmaVein
        )
    }

    /// Solid rock: walls and the mineral veins threaded through them.
    pub const fn is_rock(self) -> bool {
        matches!(self, TileKind::Wall | TileKind::QuartzVein | TileKind::MagmaVein)
    }

    /// Whether the player can step onto this tile.
    pub const fn is_walkable(self) -> bool {
        matches!(
            self,
            TileKind::Floor
                | TileKind::StairsUp
                | TileKind::StairsDown
                | TileKind::DoorOpen
                | TileKind::SecretDoorFound
                | TileKind::Shop(_)
        )
    }

    /// Plain open ground, the only terrain creatures step onto.
    pub const fn is_open_floor(self) -> bool {
        matches!(self, TileKind::Floor)
    }

    /// Tiles that connect floor regions for reachability purposes; every
    /// door counts, discovered or not.
    pub const fn is_connective(self) -> bool {
        !self.is_rock()
    }

    /// Rock a dig action can remove.
    pub const fn is_diggable(self) -> bool {
        self.is_rock()
    }

    pub const fn is_stairs(self) -> bool {
        matches!(self, TileKind::StairsUp | TileKind::StairsDown)
    }
}

/// Per-tile fog-of-war state.
///
/// The variants order by how much the player currently knows, so comparisons
/// like `visibility >= Visibility::Remembered` read naturally.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Visibility {
    #[default]
    Unseen,
    Remembered,
    Visible,
}

/// Day/night phase of the world clock; meaningful only outdoors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    /// Phase for a world-time value: the first half of each cycle is day.
    ///
    /// # Examples
    ///
    /// ```
    /// use warren::TimeOfDay;
    ///
    /// assert_eq!(TimeOfDay::from_world_time(0), TimeOfDay::Day);
    /// assert_eq!(TimeOfDay::from_world_time(150), TimeOfDay::Night);
    /// assert_eq!(TimeOfDay::from_world_time(200), TimeOfDay::Day);
    /// ```
    pub fn from_world_time(time: u64) -> Self {
        if time % crate::config::DAY_NIGHT_CYCLE < crate::config::DAY_NIGHT_CYCLE / 2 {
            TimeOfDay::Day
        } else {
            TimeOfDay::Night
        }
    }
}

/// Rectangular terrain grid, indexed `[y][x]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapGrid {
    pub width: u32,
    pub height: u32,
    tiles: Vec<Vec<TileKind>>,
}

impl MapGrid {
    /// Creates a grid with every tile set to `fill`.
    pub fn new(width: u32, height: u32, fill: TileKind) -> Self {
        Self {
            width,
            height,
            tiles: vec![vec![fill; width as usize]; height as usize],
        }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Tile at `pos`, or `None` outside the grid.
    pub fn tile(&self, pos: Position) -> Option<TileKind> {
        if self.in_bounds(pos) {
            Some(self.tiles[pos.y as usize][pos.x as usize])
        } else {
            None
        }
    }

    /// Overwrites the tile at `pos`; returns false when out of bounds.
    pub fn set_tile(&mut self, pos: Position, kind: TileKind) -> bool {
        if self.in_bounds(pos) {
            self.tiles[pos.y as usize][pos.x as usize] = kind;
            true
        } else {
            false
        }
    }

    /// Every position in the grid, row by row.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        let width = self.width as i32;
        (0..self.height as i32).flat_map(move |y| (0..width).map(move |x| Position::new(x, y)))
    }

    /// All positions holding exactly `kind`.
    pub fn find_tiles(&self, kind: TileKind) -> Vec<Position> {
        self.positions()
            .filter(|&pos| self.tile(pos) == Some(kind))
            .collect()
    }

    /// First position holding exactly `kind`, scanning row by row.
    pub fn first_tile(&self, kind: TileKind) -> Option<Position> {
        self.positions().find(|&pos| self.tile(pos) == Some(kind))
    }

    /// Renders the bare terrain as one string per row.
    pub fn render_rows(&self) -> Vec<String> {
        self.tiles
            .iter()
            .map(|row| row.iter().map(|tile| tile.symbol()).collect())
            .collect()
    }
}

/// Fog-of-war grid parallel to a [`MapGrid`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityGrid {
    pub width: u32,
    pub height: u32,
    cells: Vec<Vec<Visibility>>,
}

impl VisibilityGrid {
    /// Creates a grid with every cell unseen.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![vec![Visibility::Unseen; width as usize]; height as usize],
        }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Cell state at `pos`; anything outside the grid reads as unseen.
    pub fn get(&self, pos: Position) -> Visibility {
        if self.in_bounds(pos) {
            self.cells[pos.y as usize][pos.x as usize]
        } else {
            Visibility::Unseen
        }
    }

    pub fn set(&mut self, pos: Position, state: Visibility) {
        if self.in_bounds(pos) {
            self.cells[pos.y as usize][pos.x as usize] = state;
        }
    }

    /// Fades every currently visible cell to remembered.
    pub fn downgrade_visible(&mut self) {
        for row in &mut self.cells {
            for cell in row {
                if *cell == Visibility::Visible {
                    *cell = Visibility::Remembered;
                }
            }
        }
    }

    /// Marks the whole grid visible (outdoor daylight).
    pub fn reveal_all(&mut self) {
        for row in &mut self.cells {
            for cell in row {
                *cell = Visibility::Visible;
            }
        }
    }

    /// Raises every sight-blocking tile to at least remembered. Outdoors at
    /// night the wall line stays on the map even beyond lamplight.
    pub fn remember_walls(&mut self, grid: &MapGrid) {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let pos = Position::new(x, y);
                let blocks = grid.tile(pos).is_some_and(|tile| tile.blocks_sight());
                if blocks && self.get(pos) == Visibility::Unseen {
                    self.set(pos, Visibility::Remembered);
                }
            }
        }
    }

    /// Number of cells currently in `state`.
    pub fn count(&self, state: Visibility) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|&&cell| cell == state).count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_door_reads_as_wall() {
        assert_eq!(TileKind::SecretDoor.symbol(), '#');
        assert!(TileKind::SecretDoor.blocks_sight());
        assert!(!TileKind::SecretDoor.is_walkable());
        assert!(TileKind::SecretDoorFound.is_walkable());
        assert!(!TileKind::SecretDoorFound.blocks_sight());
    }

    #[test]
    fn test_veins_are_opaque_rock() {
        for vein in [TileKind::QuartzVein, TileKind::MagmaVein] {
            assert!(vein.blocks_sight());
            assert!(vein.is_rock());
            assert!(vein.is_diggable());
            assert!(!vein.is_connective());
        }
    }

    #[test]
    fn test_player_walkability_covers_doors_and_shops() {
        assert!(TileKind::DoorOpen.is_walkable());
        assert!(!TileKind::DoorClosed.is_walkable());
        assert!(TileKind::Shop(ShopKind::Tavern).is_walkable());
        assert!(TileKind::StairsUp.is_walkable());
        assert!(!TileKind::Shop(ShopKind::Tavern).is_open_floor());
    }

    #[test]
    fn test_closed_and_secret_doors_still_connect_regions() {
        assert!(TileKind::DoorClosed.is_connective());
        assert!(TileKind::SecretDoor.is_connective());
        assert!(!TileKind::Wall.is_connective());
    }

    #[test]
    fn test_visibility_ordering() {
        assert!(Visibility::Visible > Visibility::Remembered);
        assert!(Visibility::Remembered > Visibility::Unseen);
    }

    #[test]
    fn test_time_of_day_cycle() {
        assert_eq!(TimeOfDay::from_world_time(99), TimeOfDay::Day);
        assert_eq!(TimeOfDay::from_world_time(100), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_world_time(199), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_world_time(250), TimeOfDay::Day);
    }

    #[test]
    fn test_grid_bounds_and_access() {
        let mut grid = MapGrid::new(4, 3, TileKind::Wall);
        assert!(grid.in_bounds(Position::new(3, 2)));
        assert!(!grid.in_bounds(Position::new(4, 2)));
        assert!(!grid.in_bounds(Position::new(-1, 0)));

        assert!(grid.set_tile(Position::new(1, 1), TileKind::Floor));
        assert_eq!(grid.tile(Position::new(1, 1)), Some(TileKind::Floor));
        assert_eq!(grid.tile(Position::new(9, 9)), None);
        assert!(!grid.set_tile(Position::new(9, 9), TileKind::Floor));
    }

    #[test]
    fn test_find_tiles() {
        let mut grid = MapGrid::new(5, 5, TileKind::Floor);
        grid.set_tile(Position::new(2, 2), TileKind::StairsDown);
        grid.set_tile(Position::new(4, 0), TileKind::StairsUp);

        assert_eq!(grid.find_tiles(TileKind::StairsDown), vec![Position::new(2, 2)]);
        assert_eq!(grid.first_tile(TileKind::StairsUp), Some(Position::new(4, 0)));
        assert_eq!(grid.find_tiles(TileKind::DoorOpen), Vec::new());
    }

    #[test]
    fn test_render_rows_uses_symbols() {
        let mut grid = MapGrid::new(3, 2, TileKind::Wall);
        grid.set_tile(Position::new(1, 0), TileKind::Floor);
        grid.set_tile(Position::new(2, 1), TileKind::StairsDown);
        assert_eq!(grid.render_rows(), vec!["#.#".to_string(), "##>".to_string()]);
    }

    #[test]
    fn test_visibility_downgrade_and_walls() {
        let mut grid = MapGrid::new(3, 1, TileKind::Floor);
        grid.set_tile(Position::new(2, 0), TileKind::Wall);

        let mut vis = VisibilityGrid::new(3, 1);
        vis.set(Position::new(0, 0), Visibility::Visible);
        vis.downgrade_visible();
        assert_eq!(vis.get(Position::new(0, 0)), Visibility::Remembered);

        vis.remember_walls(&grid);
        assert_eq!(vis.get(Position::new(2, 0)), Visibility::Remembered);
        assert_eq!(vis.get(Position::new(1, 0)), Visibility::Unseen);
    }

    #[test]
    fn test_reveal_all() {
        let mut vis = VisibilityGrid::new(2, 2);
        vis.reveal_all();
        assert_eq!(vis.count(Visibility::Visible), 4);
    }
}
