//! Combat resolution: d20 strikes, experience awards, and death drops.
//!
//! Everything here is a pure function of actor snapshots and the session
//! RNG; the session composes log lines and applies the results. The raw d20
//! is split out in [`resolve_strike`] so the edge rules (natural 1, natural
//! 20, darkness) are testable without steering the RNG.

use crate::game::{ActorTemplate, Dice};
use rand::rngs::StdRng;
use rand::Rng;

/// How a successful strike rolls its damage.
#[derive(Debug, Clone, PartialEq)]
pub enum DamageRoll {
    /// Weapon dice plus a flat bonus; critical hits double the dice count.
    Dice { dice: Dice, bonus: i32 },
    /// Fixed damage; critical hits double it.
    Flat(i32),
}

impl DamageRoll {
    /// Rolls the damage, never below 1.
    pub fn roll(&self, critical: bool, rng: &mut StdRng) -> i32 {
        match self {
            DamageRoll::Dice { dice, bonus } => {
                let dice = if critical { dice.doubled() } else { *dice };
                (dice.roll(rng) + bonus).max(1)
            }
            DamageRoll::Flat(amount) => {
                let base = (*amount).max(1);
                if critical {
                    base * 2
                } else {
                    base
                }
            }
        }
    }
}

/// Outcome of one attack roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    /// The raw d20 before modifiers.
    pub natural: i32,
    /// Roll plus modifiers, after any darkness penalty.
    pub total: i32,
    pub hit: bool,
    pub critical: bool,
    /// Damage dealt; zero on a miss.
    pub damage: i32,
}

/// Rolls the d20 and resolves the attack.
pub fn strike(
    to_hit: i32,
    armor_class: i32,
    damage: &DamageRoll,
    in_darkness: bool,
    rng: &mut StdRng,
) -> Strike {
    let natural = rng.gen_range(1..=20);
    resolve_strike(natural, to_hit, armor_class, damage, in_darkness, rng)
}

/// Resolves an attack for a known d20 result.
///
/// A natural 1 always misses and a natural 20 always hits critically,
/// whatever the modifiers say; fighting an unlit defender costs a flat 2 on
/// the total.
pub fn resolve_strike(
    natural: i32,
    to_hit: i32,
    armor_class: i32,
    damage: &DamageRoll,
    in_darkness: bool,
    rng: &mut StdRng,
) -> Strike {
    let penalty = if in_darkness { 2 } else { 0 };
    let total = natural + to_hit - penalty;
    let critical = natural == 20;
    let hit = natural != 1 && (critical || total >= armor_class);
    let damage = if hit { damage.roll(critical, rng) } else { 0 };
    Strike { natural, total, hit, critical, damage }
}

/// Experience awarded for killing a creature of the given level. Levels past
/// the table extrapolate linearly.
pub fn xp_reward(level: i32) -> u64 {
    match level.max(0) {
        0 => 50,
        1 => 200,
        2 => 450,
        3 => 700,
        4 => 1_100,
        5 => 1_800,
        6 => 2_300,
        7 => 2_900,
        8 => 3_900,
        9 => 5_000,
        10 => 5_900,
        11 => 7_200,
        12 => 8_400,
        13 => 10_000,
        14 => 11_500,
        15 => 13_000,
        16 => 15_000,
        17 => 18_000,
        18 => 20_000,
        19 => 22_000,
        20 => 25_000,
        beyond => 25_000 + (beyond as u64 - 20) * 3_000,
    }
}

/// Rolls a dead creature's purse and drop table.
pub fn roll_drops(template: &ActorTemplate, level: i32, rng: &mut StdRng) -> (u32, Vec<String>) {
    let level = level.max(1) as u32;
    let low = template.gold_min_mult * level;
    let high = template.gold_max_mult * level;
    let gold = if high > low { rng.gen_range(low..=high) } else { low };

    let items = template
        .drops
        .iter()
        .filter(|entry| rng.gen_range(1..=100u32) <= entry.chance)
        .map(|entry| entry.item.clone())
        .collect();

    (gold, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::DropEntry;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    #[test]
    fn test_natural_one_always_misses() {
        let mut rng = rng();
        let damage = DamageRoll::Flat(5);
        let strike = resolve_strike(1, 100, 10, &damage, false, &mut rng);
        assert!(!strike.hit);
        assert_eq!(strike.damage, 0);
    }

    #[test]
    fn test_natural_twenty_always_crits() {
        let mut rng = rng();
        let damage = DamageRoll::Flat(5);
        let strike = resolve_strike(20, -100, 50, &damage, false, &mut rng);
        assert!(strike.hit);
        assert!(strike.critical);
        assert_eq!(strike.damage, 10);
    }

    #[test]
    fn test_meets_armor_class_exactly() {
        let mut rng = rng();
        let damage = DamageRoll::Flat(3);
        let strike = resolve_strike(10, 3, 13, &damage, false, &mut rng);
        assert!(strike.hit);
        assert_eq!(strike.total, 13);

        let strike = resolve_strike(10, 2, 13, &damage, false, &mut rng);
        assert!(!strike.hit);
    }

    #[test]
    fn test_darkness_penalty_turns_hit_into_miss() {
        let mut rng = rng();
        let damage = DamageRoll::Flat(3);
        let lit = resolve_strike(10, 3, 13, &damage, false, &mut rng);
        assert!(lit.hit);

        let dark = resolve_strike(10, 3, 13, &damage, true, &mut rng);
        assert!(!dark.hit);
        assert_eq!(dark.total, 11);
    }

    #[test]
    fn test_damage_floors_at_one() {
        let mut rng = rng();
        let weak = DamageRoll::Dice { dice: Dice::new(1, 4), bonus: -10 };
        assert_eq!(weak.roll(false, &mut rng), 1);

        let flat = DamageRoll::Flat(-3);
        assert_eq!(flat.roll(false, &mut rng), 1);
        assert_eq!(flat.roll(true, &mut rng), 2);
    }

    #[test]
    fn test_critical_doubles_dice_count() {
        let mut rng = rng();
        let damage = DamageRoll::Dice { dice: Dice::new(2, 1), bonus: 0 };
        assert_eq!(damage.roll(false, &mut rng), 2);
        assert_eq!(damage.roll(true, &mut rng), 4);
    }

    #[test]
    fn test_xp_table_and_extrapolation() {
        assert_eq!(xp_reward(0), 50);
        assert_eq!(xp_reward(1), 200);
        assert_eq!(xp_reward(10), 5_900);
        assert_eq!(xp_reward(20), 25_000);
        assert_eq!(xp_reward(21), 28_000);
        assert_eq!(xp_reward(25), 40_000);
        assert_eq!(xp_reward(-3), 50);
    }

    #[test]
    fn test_drop_chances_at_extremes() {
        let template = ActorTemplate {
            drops: vec![
                DropEntry { item: "always".to_string(), chance: 100 },
                DropEntry { item: "never".to_string(), chance: 0 },
            ],
            gold_min_mult: 2,
            gold_max_mult: 4,
            ..ActorTemplate::new("rat", "giant rat", 'r')
        };

        let mut rng = rng();
        for _ in 0..50 {
            let (gold, items) = roll_drops(&template, 3, &mut rng);
            assert!((6..=12).contains(&gold));
            assert_eq!(items, vec!["always".to_string()]);
        }
    }

    #[test]
    fn test_goldless_template_drops_nothing() {
        let template = ActorTemplate::new("wisp", "wisp", 'w');
        let (gold, items) = roll_drops(&template, 5, &mut rng());
        assert_eq!(gold, 0);
        assert!(items.is_empty());
    }

    #[test]
    fn test_strike_rolls_stay_in_range() {
        let mut rng = rng();
        let damage = DamageRoll::Dice { dice: Dice::new(1, 6), bonus: 0 };
        for _ in 0..100 {
            let result = strike(2, 12, &damage, false, &mut rng);
            assert!((1..=20).contains(&result.natural));
            if result.hit {
                assert!(result.damage >= 1);
            } else {
                assert_eq!(result.damage, 0);
            }
        }
    }
}
