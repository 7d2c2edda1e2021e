//! End-to-end checks on the level generation pipeline: both carvers, the
//! town, mineral veins, and determinism, driven through the public API the
//! way a session host uses it.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use warren::generation::town::town_map;
use warren::{
    add_mineral_veins, config, generate_level, is_fully_connected, validate_grid, CaveGenerator,
    GenerationConfig, Generator, Position, RoomCorridorGenerator, ShopKind, TileKind,
};

fn tile_row(grid: &warren::MapGrid) -> Vec<TileKind> {
    grid.positions().filter_map(|pos| grid.tile(pos)).collect()
}

#[test]
fn test_room_depths_produce_valid_levels() {
    for depth in [1, 25, 99, 200, 375] {
        let mut rng = StdRng::seed_from_u64(depth as u64);
        let grid = generate_level(depth, &mut rng).unwrap();

        validate_grid(&grid).unwrap();
        assert!(grid.width >= config::MIN_MAP_WIDTH);
        assert!(grid.height >= config::MIN_MAP_HEIGHT);
        if depth < config::LARGE_DEPTH_THRESHOLD {
            assert!(grid.width <= config::MAX_MAP_WIDTH, "depth {depth}");
            assert!(grid.height <= config::MAX_MAP_HEIGHT, "depth {depth}");
        } else {
            assert!(grid.width <= config::MAX_LARGE_MAP_WIDTH);
            assert!(grid.height <= config::MAX_LARGE_MAP_HEIGHT);
        }

        let veins = grid.find_tiles(TileKind::QuartzVein).len()
            + grid.find_tiles(TileKind::MagmaVein).len();
        assert!(veins > 0, "depth {depth} has no mineral veins");
    }
}

#[test]
fn test_cave_depths_produce_valid_levels() {
    for depth in [376, 400, 450] {
        let mut rng = StdRng::seed_from_u64(depth as u64);
        let grid = generate_level(depth, &mut rng).unwrap();

        validate_grid(&grid).unwrap();
        let veins = grid.find_tiles(TileKind::QuartzVein).len()
            + grid.find_tiles(TileKind::MagmaVein).len();
        assert!(veins > 0, "depth {depth} has no mineral veins");
    }
}

#[test]
fn test_depth_zero_is_the_fixed_town() {
    let mut rng = StdRng::seed_from_u64(99);
    let grid = generate_level(0, &mut rng).unwrap();
    let reference = town_map();

    assert_eq!(grid.width, reference.width);
    assert_eq!(grid.height, reference.height);
    assert_eq!(tile_row(&grid), tile_row(&reference));

    assert_eq!(grid.find_tiles(TileKind::StairsDown).len(), 1);
    assert!(grid.find_tiles(TileKind::StairsUp).is_empty());
    assert!(grid.find_tiles(TileKind::QuartzVein).is_empty());
    assert!(grid.find_tiles(TileKind::MagmaVein).is_empty());
    for shop in ShopKind::all() {
        assert_eq!(grid.find_tiles(TileKind::Shop(shop)).len(), 1);
    }
    assert!(is_fully_connected(&grid));
}

#[test]
fn test_same_seed_reproduces_the_level() {
    for depth in [25, 400] {
        let mut a = StdRng::seed_from_u64(123);
        let mut b = StdRng::seed_from_u64(123);
        let first = generate_level(depth, &mut a).unwrap();
        let second = generate_level(depth, &mut b).unwrap();

        assert_eq!(first.width, second.width);
        assert_eq!(first.height, second.height);
        assert_eq!(tile_row(&first), tile_row(&second));
    }
}

#[test]
fn test_veins_leave_the_carved_plan_alone() {
    let cfg = GenerationConfig::for_testing(50);
    let mut rng = StdRng::seed_from_u64(14);
    let mut grid = RoomCorridorGenerator::new().generate(&cfg, &mut rng).unwrap();

    let floors = grid.find_tiles(TileKind::Floor).len();
    let up = grid.find_tiles(TileKind::StairsUp);
    let down = grid.find_tiles(TileKind::StairsDown);

    add_mineral_veins(&mut grid, 50, &mut rng);

    assert_eq!(grid.find_tiles(TileKind::Floor).len(), floors);
    assert_eq!(grid.find_tiles(TileKind::StairsUp), up);
    assert_eq!(grid.find_tiles(TileKind::StairsDown), down);
    assert!(is_fully_connected(&grid));
}

#[test]
fn test_discovered_secret_doors_stay_connective() {
    // Revealing a secret door must not be what connectivity depends on:
    // the hidden tile already counts as walkable for validation.
    let cfg = GenerationConfig::for_testing(25);
    let mut rng = StdRng::seed_from_u64(41);
    let mut grid = RoomCorridorGenerator::new().generate(&cfg, &mut rng).unwrap();

    for pos in grid.find_tiles(TileKind::SecretDoor) {
        grid.set_tile(pos, TileKind::SecretDoorFound);
    }
    assert!(is_fully_connected(&grid));
}

fn border_is_wall(grid: &warren::MapGrid) -> bool {
    let w = grid.width as i32;
    let h = grid.height as i32;
    (0..w).all(|x| {
        grid.tile(Position::new(x, 0)) == Some(TileKind::Wall)
            && grid.tile(Position::new(x, h - 1)) == Some(TileKind::Wall)
    }) && (0..h).all(|y| {
        grid.tile(Position::new(0, y)) == Some(TileKind::Wall)
            && grid.tile(Position::new(w - 1, y)) == Some(TileKind::Wall)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_room_carver_meets_contract(
        seed in 0u64..10_000,
        width in 50u32..=90,
        height in 35u32..=60,
    ) {
        let cfg = GenerationConfig::new(width, height, 25);
        let mut rng = StdRng::seed_from_u64(seed);
        let grid = RoomCorridorGenerator::new().generate(&cfg, &mut rng).unwrap();

        prop_assert_eq!(grid.find_tiles(TileKind::StairsUp).len(), 1);
        prop_assert_eq!(grid.find_tiles(TileKind::StairsDown).len(), 1);
        prop_assert!(is_fully_connected(&grid));
        prop_assert!(border_is_wall(&grid));
    }

    #[test]
    fn prop_cave_carver_meets_contract(
        seed in 0u64..10_000,
        width in 45u32..=70,
        height in 35u32..=55,
    ) {
        let cfg = GenerationConfig::new(width, height, 400);
        let mut rng = StdRng::seed_from_u64(seed);
        let grid = CaveGenerator::new().generate(&cfg, &mut rng).unwrap();

        prop_assert_eq!(grid.find_tiles(TileKind::StairsUp).len(), 1);
        prop_assert_eq!(grid.find_tiles(TileKind::StairsDown).len(), 1);
        prop_assert!(is_fully_connected(&grid));
        prop_assert!(border_is_wall(&grid));
    }

    #[test]
    fn prop_veins_stay_off_the_border(seed in 0u64..10_000, depth in 1i32..=450) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut grid = warren::MapGrid::new(50, 40, TileKind::Wall);
        add_mineral_veins(&mut grid, depth, &mut rng);

        prop_assert!(border_is_wall(&grid));
    }
}
