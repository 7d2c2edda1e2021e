//! The content catalog: read-only creature, item, and spell templates.
//!
//! A catalog is built explicitly (from JSON or the built-in sample set) and
//! handed to each session; nothing in the crate reaches for global content
//! state. Missing identifiers are tolerated everywhere: the factory
//! substitutes an inert placeholder and logs a warning instead of failing.

use crate::game::{Actor, ActorTemplate, Dice, EffectKind, Position};
use crate::WarrenResult;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Item categories, driving which commands accept an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Weapon,
    Armor,
    Light,
    Potion,
    Scroll,
    Food,
    Misc,
}

/// What consuming an item does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UseEffect {
    Heal { amount: i32 },
    RestoreMana { amount: i32 },
    CurePoison,
}

/// Rider damage on an enchanted weapon, rolled on every hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponEffect {
    pub name: String,
    pub damage: Dice,
}

/// A burning light source: radius while lit and fuel in turns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    pub radius: i32,
    pub duration: i32,
}

/// Static definition of an item kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: String,
    pub name: String,
    pub category: ItemKind,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub damage: Option<Dice>,
    #[serde(default)]
    pub defense_bonus: i32,
    #[serde(default)]
    pub light: Option<LightSource>,
    #[serde(default)]
    pub effect: Option<UseEffect>,
    /// Spell released when the item is a scroll.
    #[serde(default)]
    pub scroll_spell: Option<String>,
    #[serde(default)]
    pub weapon_effect: Option<WeaponEffect>,
}

impl ItemTemplate {
    pub fn new(id: &str, name: &str, category: ItemKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            weight: 0,
            damage: None,
            defense_bonus: 0,
            light: None,
            effect: None,
            scroll_spell: None,
            weapon_effect: None,
        }
    }
}

/// What a spell does when it lands. A teleport range above 1000 is read as
/// word-of-recall rather than a spatial jump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpellEffect {
    Bolt { damage: Dice },
    AreaBolt { damage: Dice },
    Heal { amount: i32 },
    Light { radius: i32, duration: i32 },
    Teleport { range: i32 },
    Buff { effect: EffectKind, duration: u32 },
    Debuff { effect: EffectKind, duration: u32 },
    Cleanse { effect: EffectKind },
}

/// Static definition of a castable spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellTemplate {
    pub id: String,
    pub name: String,
    pub effect: SpellEffect,
    pub mana_cost: i32,
    /// Percent failure chance before stat and level adjustments.
    pub base_failure: i32,
    pub min_level: i32,
}

/// The read-only template store a session draws from.
///
/// Tables are ordered maps so spawn pools iterate deterministically under a
/// seeded RNG.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentCatalog {
    creatures: BTreeMap<String, ActorTemplate>,
    items: BTreeMap<String, ItemTemplate>,
    spells: BTreeMap<String, SpellTemplate>,
}

impl ContentCatalog {
    /// An empty catalog; sessions run fine on it, they just spawn nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog from its JSON form.
    pub fn from_json_str(json: &str) -> WarrenResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> WarrenResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn add_creature(&mut self, template: ActorTemplate) {
        self.creatures.insert(template.id.clone(), template);
    }

    pub fn add_item(&mut self, template: ItemTemplate) {
        self.items.insert(template.id.clone(), template);
    }

    pub fn add_spell(&mut self, template: SpellTemplate) {
        self.spells.insert(template.id.clone(), template);
    }

    pub fn creature(&self, id: &str) -> Option<&ActorTemplate> {
        self.creatures.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&ItemTemplate> {
        self.items.get(id)
    }

    pub fn spell(&self, id: &str) -> Option<&SpellTemplate> {
        self.spells.get(id)
    }

    /// All creature templates in id order.
    pub fn creatures(&self) -> impl Iterator<Item = &ActorTemplate> {
        self.creatures.values()
    }

    /// Stamps out a live creature, falling back to an inert placeholder when
    /// the id is unknown.
    pub fn spawn_creature(
        &self,
        id: &str,
        position: Position,
        level: i32,
        rng: &mut StdRng,
    ) -> Actor {
        match self.creatures.get(id) {
            Some(template) => Actor::from_template(template, position, level, rng),
            None => {
                log::warn!("unknown creature template '{id}', substituting a placeholder");
                Actor::placeholder(id, position)
            }
        }
    }

    /// Carried weight of an item; unknown ids weigh nothing.
    pub fn item_weight(&self, id: &str) -> u32 {
        self.items.get(id).map_or(0, |item| item.weight)
    }

    /// Display name of an item; unknown ids fall back to the raw id.
    pub fn item_name(&self, id: &str) -> String {
        self.items
            .get(id)
            .map_or_else(|| id.to_string(), |item| item.name.clone())
    }

    /// A small self-contained content set for tests and the demo binary.
    pub fn builtin() -> Self {
        use crate::game::{AiBehavior, DropEntry, RangedAttack, SpawnProfile, StreetKind};

        let mut catalog = Self::new();

        // Dungeon creatures.
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Aggressive,
            hostile: true,
            hp_base: 3,
            hp_per_level: 2,
            attack_base: 2,
            attack_per_level: 1,
            flee_chance: 65,
            gold_min_mult: 0,
            gold_max_mult: 2,
            spawn: Some(SpawnProfile {
                native_depth: 25,
                base_chance: 95.0,
                per_depth: -0.4,
            }),
            ..ActorTemplate::new("giant_rat", "giant rat", 'r')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Wander,
            hostile: true,
            hp_base: 2,
            hp_per_level: 1,
            attack_base: 1,
            attack_per_level: 1,
            flee_chance: 80,
            spawn: Some(SpawnProfile {
                native_depth: 25,
                base_chance: 80.0,
                per_depth: -0.3,
            }),
            ..ActorTemplate::new("cave_bat", "cave bat", 'b')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Aggressive,
            hostile: true,
            hp_base: 5,
            hp_per_level: 3,
            attack_base: 3,
            attack_per_level: 1,
            defense_base: 1,
            gold_min_mult: 1,
            gold_max_mult: 4,
            drops: vec![
                DropEntry { item: "rusty_dagger".to_string(), chance: 25 },
                DropEntry { item: "healing_draught".to_string(), chance: 10 },
            ],
            spawn: Some(SpawnProfile {
                native_depth: 50,
                base_chance: 85.0,
                per_depth: -0.5,
            }),
            ..ActorTemplate::new("kobold", "kobold", 'k')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Aggressive,
            hostile: true,
            hp_base: 4,
            hp_per_level: 2,
            attack_base: 2,
            attack_per_level: 1,
            ranged: Some(RangedAttack {
                name: "sling stone".to_string(),
                damage: Dice::new(1, 4),
                range: 5,
            }),
            gold_min_mult: 1,
            gold_max_mult: 3,
            spawn: Some(SpawnProfile {
                native_depth: 60,
                base_chance: 70.0,
                per_depth: -0.5,
            }),
            ..ActorTemplate::new("kobold_slinger", "kobold slinger", 'k')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Pack,
            hostile: true,
            hp_base: 4,
            hp_per_level: 2,
            attack_base: 3,
            attack_per_level: 1,
            pack_id: Some("jackals".to_string()),
            flee_chance: 40,
            spawn: Some(SpawnProfile {
                native_depth: 40,
                base_chance: 75.0,
                per_depth: -0.4,
            }),
            ..ActorTemplate::new("jackal", "jackal", 'j')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Aggressive,
            hostile: true,
            hp_base: 6,
            hp_per_level: 3,
            attack_base: 2,
            attack_per_level: 1,
            clone_rate: 0.08,
            clone_cap: 12,
            fear_immune: true,
            flee_chance: 0,
            spawn: Some(SpawnProfile {
                native_depth: 75,
                base_chance: 60.0,
                per_depth: -0.3,
            }),
            ..ActorTemplate::new("gray_ooze", "gray ooze", 'O')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Thief,
            hostile: true,
            hp_base: 6,
            hp_per_level: 2,
            attack_base: 2,
            attack_per_level: 1,
            flee_chance: 90,
            gold_min_mult: 2,
            gold_max_mult: 6,
            drops: vec![DropEntry { item: "healing_draught".to_string(), chance: 15 }],
            spawn: Some(SpawnProfile {
                native_depth: 75,
                base_chance: 50.0,
                per_depth: -0.3,
            }),
            ..ActorTemplate::new("cutpurse", "cutpurse", 'p')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Aggressive,
            hostile: true,
            hp_base: 8,
            hp_per_level: 4,
            attack_base: 4,
            attack_per_level: 2,
            defense_base: 2,
            defense_per_level: 1,
            fear_immune: true,
            flee_chance: 0,
            sleeps_during_day: true,
            spawn: Some(SpawnProfile {
                native_depth: 100,
                base_chance: 70.0,
                per_depth: -0.3,
            }),
            ..ActorTemplate::new("skeleton", "skeleton", 'Z')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Aggressive,
            hostile: true,
            hp_base: 7,
            hp_per_level: 3,
            attack_base: 3,
            attack_per_level: 1,
            spells: vec!["spark".to_string()],
            mana: 15,
            gold_min_mult: 2,
            gold_max_mult: 5,
            drops: vec![
                DropEntry { item: "mana_philter".to_string(), chance: 20 },
                DropEntry { item: "scroll_of_sparks".to_string(), chance: 10 },
            ],
            spawn: Some(SpawnProfile {
                native_depth: 125,
                base_chance: 55.0,
                per_depth: -0.25,
            }),
            ..ActorTemplate::new("acolyte_of_dusk", "acolyte of dusk", 'a')
        });

        // Town residents.
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Street(StreetKind::Beggar),
            sleeps_during_night: true,
            hp_base: 4,
            spawn: Some(SpawnProfile {
                native_depth: 0,
                base_chance: 100.0,
                per_depth: -100.0,
            }),
            ..ActorTemplate::new("beggar", "beggar", 'B')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Street(StreetKind::Drunk),
            sleeps_during_day: true,
            hp_base: 5,
            spawn: Some(SpawnProfile {
                native_depth: 0,
                base_chance: 100.0,
                per_depth: -100.0,
            }),
            ..ActorTemplate::new("drunk", "drunk", 'D')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Street(StreetKind::Fool),
            hp_base: 4,
            spawn: Some(SpawnProfile {
                native_depth: 0,
                base_chance: 100.0,
                per_depth: -100.0,
            }),
            ..ActorTemplate::new("village_fool", "village fool", 'F')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Wander,
            hp_base: 2,
            spawn: Some(SpawnProfile {
                native_depth: 0,
                base_chance: 100.0,
                per_depth: -100.0,
            }),
            ..ActorTemplate::new("alley_cat", "alley cat", 'c')
        });
        catalog.add_creature(ActorTemplate {
            behavior: AiBehavior::Passive,
            mercenary: true,
            hp_base: 20,
            hp_per_level: 5,
            attack_base: 6,
            attack_per_level: 2,
            defense_base: 3,
            fear_immune: true,
            flee_chance: 0,
            spawn: Some(SpawnProfile {
                native_depth: 0,
                base_chance: 100.0,
                per_depth: -100.0,
            }),
            ..ActorTemplate::new("town_guard", "town guard", 'G')
        });

        // Items.
        catalog.add_item(ItemTemplate {
            weight: 10,
            damage: Some(Dice::new(1, 4)),
            ..ItemTemplate::new("rusty_dagger", "Rusty Dagger", ItemKind::Weapon)
        });
        catalog.add_item(ItemTemplate {
            weight: 30,
            damage: Some(Dice::new(1, 6)),
            ..ItemTemplate::new("short_sword", "Short Sword", ItemKind::Weapon)
        });
        catalog.add_item(ItemTemplate {
            weight: 40,
            damage: Some(Dice::new(1, 8)),
            weapon_effect: Some(WeaponEffect {
                name: "Flame".to_string(),
                damage: Dice::new(1, 4),
            }),
            ..ItemTemplate::new("flame_brand", "Flame Brand", ItemKind::Weapon)
        });
        catalog.add_item(ItemTemplate {
            weight: 120,
            defense_bonus: 2,
            ..ItemTemplate::new("leather_armor", "Leather Armor", ItemKind::Armor)
        });
        catalog.add_item(ItemTemplate {
            weight: 300,
            defense_bonus: 4,
            ..ItemTemplate::new("chain_mail", "Chain Mail", ItemKind::Armor)
        });
        catalog.add_item(ItemTemplate {
            weight: 20,
            light: Some(LightSource { radius: 5, duration: 100 }),
            ..ItemTemplate::new("torch", "Torch", ItemKind::Light)
        });
        catalog.add_item(ItemTemplate {
            weight: 60,
            light: Some(LightSource { radius: 7, duration: 200 }),
            ..ItemTemplate::new("lantern", "Lantern", ItemKind::Light)
        });
        catalog.add_item(ItemTemplate {
            weight: 8,
            effect: Some(UseEffect::Heal { amount: 10 }),
            ..ItemTemplate::new("healing_draught", "Healing Draught", ItemKind::Potion)
        });
        catalog.add_item(ItemTemplate {
            weight: 8,
            effect: Some(UseEffect::RestoreMana { amount: 10 }),
            ..ItemTemplate::new("mana_philter", "Mana Philter", ItemKind::Potion)
        });
        catalog.add_item(ItemTemplate {
            weight: 8,
            effect: Some(UseEffect::CurePoison),
            ..ItemTemplate::new("antidote", "Antidote", ItemKind::Potion)
        });
        catalog.add_item(ItemTemplate {
            weight: 2,
            scroll_spell: Some("spark".to_string()),
            ..ItemTemplate::new("scroll_of_sparks", "Scroll of Sparks", ItemKind::Scroll)
        });
        catalog.add_item(ItemTemplate {
            weight: 2,
            scroll_spell: Some("word_of_recall".to_string()),
            ..ItemTemplate::new("scroll_of_recall", "Scroll of Recall", ItemKind::Scroll)
        });
        catalog.add_item(ItemTemplate {
            weight: 12,
            ..ItemTemplate::new("dry_ration", "Dry Ration", ItemKind::Food)
        });

        // Spells.
        catalog.add_spell(SpellTemplate {
            id: "spark".to_string(),
            name: "Spark".to_string(),
            effect: SpellEffect::Bolt { damage: Dice::new(1, 8) },
            mana_cost: 3,
            base_failure: 25,
            min_level: 1,
        });
        catalog.add_spell(SpellTemplate {
            id: "flame_lash".to_string(),
            name: "Flame Lash".to_string(),
            effect: SpellEffect::Bolt { damage: Dice::new(3, 6) },
            mana_cost: 8,
            base_failure: 35,
            min_level: 3,
        });
        catalog.add_spell(SpellTemplate {
            id: "ember_burst".to_string(),
            name: "Ember Burst".to_string(),
            effect: SpellEffect::AreaBolt { damage: Dice::new(2, 6) },
            mana_cost: 10,
            base_failure: 40,
            min_level: 5,
        });
        catalog.add_spell(SpellTemplate {
            id: "mend_wounds".to_string(),
            name: "Mend Wounds".to_string(),
            effect: SpellEffect::Heal { amount: 12 },
            mana_cost: 4,
            base_failure: 20,
            min_level: 1,
        });
        catalog.add_spell(SpellTemplate {
            id: "glow".to_string(),
            name: "Glow".to_string(),
            effect: SpellEffect::Light { radius: 6, duration: 120 },
            mana_cost: 2,
            base_failure: 10,
            min_level: 1,
        });
        catalog.add_spell(SpellTemplate {
            id: "blink".to_string(),
            name: "Blink".to_string(),
            effect: SpellEffect::Teleport { range: 8 },
            mana_cost: 6,
            base_failure: 30,
            min_level: 2,
        });
        catalog.add_spell(SpellTemplate {
            id: "word_of_recall".to_string(),
            name: "Word of Recall".to_string(),
            effect: SpellEffect::Teleport { range: 9_999 },
            mana_cost: 15,
            base_failure: 25,
            min_level: 5,
        });
        catalog.add_spell(SpellTemplate {
            id: "blessing".to_string(),
            name: "Blessing".to_string(),
            effect: SpellEffect::Buff { effect: EffectKind::Blessed, duration: 30 },
            mana_cost: 5,
            base_failure: 20,
            min_level: 2,
        });
        catalog.add_spell(SpellTemplate {
            id: "hex".to_string(),
            name: "Hex".to_string(),
            effect: SpellEffect::Debuff { effect: EffectKind::Cursed, duration: 25 },
            mana_cost: 5,
            base_failure: 30,
            min_level: 2,
        });
        catalog.add_spell(SpellTemplate {
            id: "purify".to_string(),
            name: "Purify".to_string(),
            effect: SpellEffect::Cleanse { effect: EffectKind::Poisoned },
            mana_cost: 4,
            base_failure: 15,
            min_level: 1,
        });

        catalog
    }
}
