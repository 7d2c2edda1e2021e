//! The cellular-automata cave carver used for the deep dungeon.
//!
//! A noise field of wall and floor is smoothed by a few birth/death passes,
//! then every floor pocket except the largest is filled back in, which is
//! what actually guarantees the connectivity contract; the smoothing rule
//! alone cannot.

use crate::game::{MapGrid, Position, TileKind};
use crate::generation::{bridges_floor, random_floor_tile, GenerationConfig, Generator};
use crate::{WarrenError, WarrenResult};
use pathfinding::prelude::bfs_reach;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashSet;

/// Carver producing organic cave systems.
#[derive(Debug, Clone, Default)]
pub struct CaveGenerator;

impl CaveGenerator {
    pub fn new() -> Self {
        Self
    }

    /// One smoothing pass over the interior. The border row and column stay
    /// wall forever.
    fn smooth(&self, grid: &MapGrid, cfg: &GenerationConfig) -> MapGrid {
        let mut next = grid.clone();
        for y in 1..grid.height as i32 - 1 {
            for x in 1..grid.width as i32 - 1 {
                let pos = Position::new(x, y);
                let walls = pos
                    .adjacent_positions()
                    .into_iter()
                    .filter(|&n| grid.tile(n) == Some(TileKind::Wall))
                    .count() as u32;
                match grid.tile(pos) {
                    Some(TileKind::Wall) if walls < cfg.death_limit => {
                        next.set_tile(pos, TileKind::Floor);
                    }
                    Some(TileKind::Floor) if walls > cfg.birth_limit => {
                        next.set_tile(pos, TileKind::Wall);
                    }
                    _ => {}
                }
            }
        }
        next
    }
}

impl Generator for CaveGenerator {
    fn generate(&self, cfg: &GenerationConfig, rng: &mut StdRng) -> WarrenResult<MapGrid> {
        let mut grid = MapGrid::new(cfg.width, cfg.height, TileKind::Wall);
        for y in 1..cfg.height as i32 - 1 {
            for x in 1..cfg.width as i32 - 1 {
                if !rng.gen_bool(cfg.initial_wall_chance) {
                    grid.set_tile(Position::new(x, y), TileKind::Floor);
                }
            }
        }

        for _ in 0..cfg.ca_iterations {
            grid = self.smooth(&grid, cfg);
        }

        keep_largest_region(&mut grid);

        let up = random_floor_tile(&grid, rng).ok_or_else(|| {
            WarrenError::GenerationFailed("cave smoothing left no floor".to_string())
        })?;
        grid.set_tile(up, TileKind::StairsUp);
        let down = random_floor_tile(&grid, rng).ok_or_else(|| {
            WarrenError::GenerationFailed("cave has no second floor tile for stairs".to_string())
        })?;
        grid.set_tile(down, TileKind::StairsDown);

        seed_cave_secret_doors(&mut grid, rng);

        self.validate(&grid)?;
        Ok(grid)
    }

    fn generator_type(&self) -> &'static str {
        "CaveGenerator"
    }
}

/// Fills every floor pocket except the largest back to wall.
fn keep_largest_region(grid: &mut MapGrid) {
    let mut unvisited: HashSet<Position> = grid.find_tiles(TileKind::Floor).into_iter().collect();
    let mut largest: Vec<Position> = Vec::new();

    while let Some(&start) = unvisited.iter().next() {
        let region: Vec<Position> = bfs_reach(start, |&pos| {
            pos.cardinal_adjacent_positions()
                .into_iter()
                .filter(|&next| grid.tile(next) == Some(TileKind::Floor))
                .collect::<Vec<_>>()
        })
        .collect();
        for pos in &region {
            unvisited.remove(pos);
        }
        if region.len() > largest.len() {
            largest = region;
        }
    }

    let keep: HashSet<Position> = largest.into_iter().collect();
    let orphans: Vec<Position> = grid
        .find_tiles(TileKind::Floor)
        .into_iter()
        .filter(|pos| !keep.contains(pos))
        .collect();
    if !orphans.is_empty() {
        log::debug!("filling {} orphaned cave tiles", orphans.len());
    }
    for pos in orphans {
        grid.set_tile(pos, TileKind::Wall);
    }
}

/// Hides a few secret doors in wall tiles that bridge two floor passages.
fn seed_cave_secret_doors(grid: &mut MapGrid, rng: &mut StdRng) {
    let target = rng.gen_range(2..=5);
    let mut seeded = 0;
    for _ in 0..100 {
        if seeded >= target {
            break;
        }
        let pos = Position::new(
            rng.gen_range(1..grid.width as i32 - 1),
            rng.gen_range(1..grid.height as i32 - 1),
        );
        if grid.tile(pos) == Some(TileKind::Wall) && bridges_floor(grid, pos) {
            grid.set_tile(pos, TileKind::SecretDoor);
            seeded += 1;
        }
    }
    if seeded > 0 {
        log::debug!("seeded {seeded} cave secret doors");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_generated_cave_meets_contract() {
        let generator = CaveGenerator::new();
        for seed in [2, 31, 77] {
            let mut rng = StdRng::seed_from_u64(seed);
            let cfg = GenerationConfig::for_testing(400);
            let grid = generator.generate(&cfg, &mut rng).unwrap();

            assert_eq!(grid.find_tiles(TileKind::StairsUp).len(), 1);
            assert_eq!(grid.find_tiles(TileKind::StairsDown).len(), 1);
            assert!(crate::generation::is_fully_connected(&grid));
        }
    }

    #[test]
    fn test_border_stays_wall() {
        let generator = CaveGenerator::new();
        let mut rng = StdRng::seed_from_u64(8);
        let cfg = GenerationConfig::for_testing(400);
        let grid = generator.generate(&cfg, &mut rng).unwrap();

        for x in 0..grid.width as i32 {
            assert_eq!(grid.tile(Position::new(x, 0)), Some(TileKind::Wall));
            assert_eq!(
                grid.tile(Position::new(x, grid.height as i32 - 1)),
                Some(TileKind::Wall)
            );
        }
        for y in 0..grid.height as i32 {
            assert_eq!(grid.tile(Position::new(0, y)), Some(TileKind::Wall));
            assert_eq!(
                grid.tile(Position::new(grid.width as i32 - 1, y)),
                Some(TileKind::Wall)
            );
        }
    }

    #[test]
    fn test_keep_largest_region_fills_pockets() {
        let mut grid = MapGrid::new(9, 5, TileKind::Wall);
        // A 4-tile pocket and a separate 2-tile pocket.
        for x in 1..5 {
            grid.set_tile(Position::new(x, 1), TileKind::Floor);
        }
        grid.set_tile(Position::new(6, 3), TileKind::Floor);
        grid.set_tile(Position::new(7, 3), TileKind::Floor);

        keep_largest_region(&mut grid);
        assert_eq!(grid.find_tiles(TileKind::Floor).len(), 4);
        assert_eq!(grid.tile(Position::new(6, 3)), Some(TileKind::Wall));
        assert_eq!(grid.tile(Position::new(1, 1)), Some(TileKind::Floor));
    }

    #[test]
    fn test_secret_doors_bridge_floor() {
        let generator = CaveGenerator::new();
        let mut rng = StdRng::seed_from_u64(19);
        let cfg = GenerationConfig::for_testing(400);
        let grid = generator.generate(&cfg, &mut rng).unwrap();

        for pos in grid.find_tiles(TileKind::SecretDoor) {
            assert!(bridges_floor(&grid, pos), "secret door at {pos:?} bridges nothing");
        }
    }
}
