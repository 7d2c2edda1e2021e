//! Per-creature behavior: the closed state machine and its decision ladder.
//!
//! [`decide`] is pure: it looks at one creature and a read-only view of the
//! level and names the single step the creature wants to take. The session
//! applies the decision, so all mutation (movement, combat, theft, logging)
//! stays in one place and the ladder itself is easy to test.

use crate::config;
use crate::game::{Actor, BehaviorOverride, MapGrid, Position};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Non-lethal town characters, distinguished only by their pestering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreetKind {
    Beggar,
    Drunk,
    Fool,
}

/// The behavior tag driving a creature's turn, mutually exclusive at any
/// instant. Status effects may override it (see
/// [`EffectSet::behavior_override`](crate::game::EffectSet::behavior_override)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AiBehavior {
    /// Never acts unless struck.
    #[default]
    Passive,
    /// Drifts one random step at a time.
    Wander,
    /// Closes on the player and attacks with spell, ranged, or melee.
    Aggressive,
    /// Aggressive, but regroups with same-pack members when isolated.
    Pack,
    /// Approaches to steal gold, then runs.
    Thief,
    /// Approaches to pester the player; never harms anyone.
    Street(StreetKind),
}

/// Read-only view of the level a creature consults when deciding.
pub struct AiContext<'a> {
    pub grid: &'a MapGrid,
    pub player_position: Position,
    pub player_gold: u32,
    /// Tiles occupied by other live creatures.
    pub occupied: &'a HashSet<Position>,
    /// Positions of living same-pack members, excluding the deciding actor.
    pub pack_mates: &'a [Position],
}

/// The single step a creature wants to take this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiDecision {
    Wait,
    MoveTo(Position),
    /// Melee the player (caller verified adjacency).
    Melee,
    /// Fire the built-in ranged attack at the player.
    Ranged,
    /// Cast one of the creature's spells.
    Cast,
    /// Adjacent theft attempt.
    Steal,
    /// Adjacent street-character interaction.
    Mingle,
}

/// Plans one creature's step. The caller has already handled sleep, the
/// flee trigger, and move-counter gating; this function only ranks what an
/// awake, ready creature does next.
pub fn decide(actor: &Actor, ctx: &AiContext, rng: &mut StdRng) -> AiDecision {
    let distance = actor.position.euclidean_distance(ctx.player_position);

    match actor.effects.behavior_override() {
        Some(BehaviorOverride::Asleep) | Some(BehaviorOverride::Paralyzed) => {
            return AiDecision::Wait
        }
        Some(BehaviorOverride::Fleeing) => return flee_step(actor, ctx, distance),
        Some(BehaviorOverride::Confused) => return random_step(actor, ctx, rng),
        None => {}
    }

    match actor.behavior {
        AiBehavior::Passive => AiDecision::Wait,
        AiBehavior::Wander => random_step(actor, ctx, rng),
        AiBehavior::Aggressive => aggressive_plan(actor, ctx, distance, rng),
        AiBehavior::Pack => pack_plan(actor, ctx, distance),
        AiBehavior::Thief => thief_plan(actor, ctx, distance),
        AiBehavior::Street(_) => street_plan(actor, ctx, distance),
    }
}

/// Whether a creature may step onto `pos`: plain floor, nobody standing
/// there, and not the player's tile.
fn can_step(ctx: &AiContext, pos: Position) -> bool {
    ctx.grid.tile(pos).is_some_and(|tile| tile.is_open_floor())
        && !ctx.occupied.contains(&pos)
        && pos != ctx.player_position
}

fn step_or_wait(ctx: &AiContext, next: Position) -> AiDecision {
    if can_step(ctx, next) {
        AiDecision::MoveTo(next)
    } else {
        AiDecision::Wait
    }
}

/// A drifting step: one random delta, wasted when it lands on anything but
/// open free floor.
fn random_step(actor: &Actor, ctx: &AiContext, rng: &mut StdRng) -> AiDecision {
    let dx = rng.gen_range(-1..=1);
    let dy = rng.gen_range(-1..=1);
    if dx == 0 && dy == 0 {
        return AiDecision::Wait;
    }
    step_or_wait(ctx, actor.position + Position::new(dx, dy))
}

/// Runs straight away from the player while the player is close enough to
/// matter; beyond detection range the creature just cowers.
fn flee_step(actor: &Actor, ctx: &AiContext, distance: f64) -> AiDecision {
    if distance <= actor.detection_range as f64 {
        step_or_wait(ctx, actor.position.step_away(ctx.player_position))
    } else {
        AiDecision::Wait
    }
}

fn approach(actor: &Actor, ctx: &AiContext, target: Position) -> AiDecision {
    step_or_wait(ctx, actor.position.step_toward(target))
}

fn aggressive_plan(
    actor: &Actor,
    ctx: &AiContext,
    distance: f64,
    rng: &mut StdRng,
) -> AiDecision {
    if distance > actor.detection_range as f64 {
        return AiDecision::Wait;
    }

    let can_cast = !actor.spells.is_empty() && actor.mana >= config::CREATURE_CAST_COST;
    if can_cast && distance <= 6.0 && rng.gen_bool(0.3) {
        return AiDecision::Cast;
    }
    if let Some(ranged) = &actor.ranged {
        if distance > 1.5 && distance <= ranged.range as f64 {
            return AiDecision::Ranged;
        }
    }
    if distance <= 1.5 {
        return AiDecision::Melee;
    }
    approach(actor, ctx, ctx.player_position)
}

/// Pack members fight like aggressives while backed up, and fall back
/// toward the nearest living packmate when cut off alone. Unlike
/// [`aggressive_plan`] they never cast or shoot; the pack presses in with
/// teeth only.
fn pack_plan(actor: &Actor, ctx: &AiContext, distance: f64) -> AiDecision {
    if distance > actor.detection_range as f64 {
        return AiDecision::Wait;
    }

    let backup_nearby = ctx
        .pack_mates
        .iter()
        .any(|mate| actor.position.euclidean_distance(*mate) <= 3.0);

    if distance <= 1.5 {
        return AiDecision::Melee;
    }
    if backup_nearby && distance <= 4.0 {
        return approach(actor, ctx, ctx.player_position);
    }
    if !backup_nearby {
        let nearest_mate = ctx.pack_mates.iter().copied().min_by(|a, b| {
            let da = actor.position.euclidean_distance(*a);
            let db = actor.position.euclidean_distance(*b);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        return match nearest_mate {
            Some(mate) => approach(actor, ctx, mate),
            None => approach(actor, ctx, ctx.player_position),
        };
    }
    approach(actor, ctx, ctx.player_position)
}

fn thief_plan(actor: &Actor, ctx: &AiContext, distance: f64) -> AiDecision {
    if distance > actor.detection_range as f64 {
        return AiDecision::Wait;
    }
    if distance <= 1.5 {
        return AiDecision::Steal;
    }
    approach(actor, ctx, ctx.player_position)
}

fn street_plan(actor: &Actor, ctx: &AiContext, distance: f64) -> AiDecision {
    if distance > actor.detection_range as f64 {
        return AiDecision::Wait;
    }
    if distance <= 1.5 {
        return AiDecision::Mingle;
    }
    approach(actor, ctx, ctx.player_position)
}
