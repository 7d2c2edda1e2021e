//! Headless demo shell for the simulation core.
//!
//! Generates a level, walks a scripted explorer around it for a fixed number
//! of turns, and prints the final map, actor list, and event log. Useful for
//! eyeballing generation output and for exercising the whole turn cascade
//! without a UI.

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use warren::{ClassKind, Command, ContentCatalog, LevelSession, Player, Visibility, WarrenResult};

/// Command line arguments for the warren demo.
#[derive(Parser, Debug)]
#[command(name = "warren")]
#[command(about = "Turn-based dungeon crawler simulation core demo")]
#[command(version)]
struct Args {
    /// Session seed; the same seed replays the same level and combat
    #[arg(short, long, default_value_t = 7)]
    seed: u64,

    /// Depth to generate (0 is the town)
    #[arg(short, long, default_value_t = 25)]
    depth: i32,

    /// Number of explorer steps to run
    #[arg(short, long, default_value_t = 60)]
    turns: u32,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> WarrenResult<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    log::info!(
        "warren v{}: seed {}, depth {}, {} turns",
        warren::VERSION,
        args.seed,
        args.depth,
        args.turns
    );

    let catalog = Arc::new(ContentCatalog::builtin());
    let mut player = Player::new("Explorer", ClassKind::Warrior);
    player.known_spells.push("glow".to_string());
    let mut session = LevelSession::new(catalog, player, args.depth, args.seed)?;
    log::info!(
        "generated {}x{} level with {} creatures",
        session.grid().width,
        session.grid().height,
        session.actors().len()
    );

    // The explorer is not part of the session, so it rolls its own dice.
    let mut explorer = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    for _ in 0..args.turns {
        if session.is_game_over() {
            log::info!("the explorer died after {} world turns", session.time());
            break;
        }
        let dx = explorer.gen_range(-1..=1);
        let dy = explorer.gen_range(-1..=1);
        let outcome = session.execute(Command::Move { dx, dy });
        if !outcome.consumed {
            session.execute(Command::Wait);
        }
    }

    println!(
        "\n=== depth {} after {} world turns ({:?}) ===",
        session.depth(),
        session.time(),
        session.time_of_day()
    );
    for row in session.render_rows() {
        println!("{row}");
    }

    println!("\n--- creatures ---");
    for actor in session.actors().iter().filter(|actor| actor.is_alive()) {
        let lit = session.visibility().get(actor.position) == Visibility::Visible;
        println!(
            "{} '{}' at ({}, {}) hp {}/{}{}",
            actor.glyph,
            actor.name,
            actor.position.x,
            actor.position.y,
            actor.hp,
            actor.max_hp,
            if lit { " (visible)" } else { "" }
        );
    }

    println!("\n--- event log ---");
    for line in session.log() {
        println!("{line}");
    }

    let player = session.player();
    println!(
        "\n{} the {:?}: level {}, hp {}/{}, mana {}/{}, {} gold",
        player.name,
        player.class,
        player.level,
        player.hp,
        player.max_hp,
        player.mana,
        player.max_mana,
        player.gold
    );
    Ok(())
}
