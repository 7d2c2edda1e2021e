//! Creature templates, live creatures, and the player character.
//!
//! A creature is stamped out of an [`ActorTemplate`] when a level is
//! populated: static data stays in the template, and everything a turn can
//! mutate lives on the [`Actor`]. Both sides are plain serializable data so a
//! host can persist a session wholesale.

use crate::config;
use crate::game::{new_actor_id, ActorId, AiBehavior, EffectSet, Position};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dice expression in `NdM` form, rolled against the session RNG.
///
/// Flat damage values are carried as `Nd1`, which keeps the critical-hit
/// rule uniform: doubling the dice count doubles a flat value too.
///
/// # Examples
///
/// ```
/// use warren::Dice;
///
/// let dice: Dice = "2d6".parse().unwrap();
/// assert_eq!(dice.count, 2);
/// assert_eq!(dice.sides, 6);
/// assert_eq!(dice.to_string(), "2d6");
///
/// let flat: Dice = "3".parse().unwrap();
/// assert_eq!(flat.to_string(), "3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dice {
    pub count: u32,
    pub sides: u32,
}

impl Dice {
    pub const fn new(count: u32, sides: u32) -> Self {
        Self { count, sides }
    }

    /// Rolls every die and sums the results.
    pub fn roll(self, rng: &mut StdRng) -> i32 {
        if self.sides <= 1 {
            return self.count as i32;
        }
        (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides as i32))
            .sum()
    }

    /// The same dice with the count doubled, for critical hits.
    pub const fn doubled(self) -> Self {
        Self::new(self.count * 2, self.sides)
    }

    /// Largest possible roll.
    pub const fn max_roll(self) -> i32 {
        (self.count * if self.sides > 1 { self.sides } else { 1 }) as i32
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sides <= 1 {
            write!(f, "{}", self.count)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

impl FromStr for Dice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if let Some((count, sides)) = text.split_once(['d', 'D']) {
            let count: u32 = count
                .parse()
                .map_err(|_| format!("bad dice count in '{text}'"))?;
            let sides: u32 = sides
                .parse()
                .map_err(|_| format!("bad dice sides in '{text}'"))?;
            if sides == 0 {
                return Err(format!("zero-sided dice in '{text}'"));
            }
            Ok(Dice::new(count, sides))
        } else {
            let flat: u32 = text
                .parse()
                .map_err(|_| format!("bad dice expression '{text}'"))?;
            Ok(Dice::new(flat, 1))
        }
    }
}

impl TryFrom<String> for Dice {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dice> for String {
    fn from(dice: Dice) -> String {
        dice.to_string()
    }
}

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Strength,
    Intellect,
    Wisdom,
    Dexterity,
    Constitution,
    Charisma,
}

/// A full ability-score block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: i32,
    pub intellect: i32,
    pub wisdom: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub charisma: i32,
}

impl Stats {
    /// Every score set to the same value.
    pub const fn uniform(score: i32) -> Self {
        Self {
            strength: score,
            intellect: score,
            wisdom: score,
            dexterity: score,
            constitution: score,
            charisma: score,
        }
    }

    pub fn get(&self, kind: StatKind) -> i32 {
        match kind {
            StatKind::Strength => self.strength,
            StatKind::Intellect => self.intellect,
            StatKind::Wisdom => self.wisdom,
            StatKind::Dexterity => self.dexterity,
            StatKind::Constitution => self.constitution,
            StatKind::Charisma => self.charisma,
        }
    }

    /// Ability modifier for a raw score, rounding toward negative infinity
    /// so that a score of 9 gives -1, not 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use warren::Stats;
    ///
    /// assert_eq!(Stats::modifier(10), 0);
    /// assert_eq!(Stats::modifier(16), 3);
    /// assert_eq!(Stats::modifier(9), -1);
    /// assert_eq!(Stats::modifier(7), -2);
    /// ```
    pub fn modifier(score: i32) -> i32 {
        (score - 10).div_euclid(2)
    }

    pub fn modifier_of(&self, kind: StatKind) -> i32 {
        Self::modifier(self.get(kind))
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::uniform(10)
    }
}

/// Player class archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Warrior,
    Mage,
    Priest,
    Rogue,
    Ranger,
    Paladin,
}

impl ClassKind {
    pub const fn name(self) -> &'static str {
        match self {
            ClassKind::Warrior => "Warrior",
            ClassKind::Mage => "Mage",
            ClassKind::Priest => "Priest",
            ClassKind::Rogue => "Rogue",
            ClassKind::Ranger => "Ranger",
            ClassKind::Paladin => "Paladin",
        }
    }

    /// The ability score this class casts from; `None` for non-casters.
    pub const fn casting_stat(self) -> Option<StatKind> {
        match self {
            ClassKind::Mage => Some(StatKind::Intellect),
            ClassKind::Priest => Some(StatKind::Wisdom),
            ClassKind::Ranger => Some(StatKind::Wisdom),
            ClassKind::Paladin => Some(StatKind::Wisdom),
            ClassKind::Warrior | ClassKind::Rogue => None,
        }
    }

    /// Classes that strike from the shadows double damage on targets that
    /// have not noticed them yet.
    pub const fn is_stealthy(self) -> bool {
        matches!(self, ClassKind::Rogue)
    }
}

/// Equipment slots on the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Armor,
    Light,
}

impl EquipSlot {
    pub const fn name(self) -> &'static str {
        match self {
            EquipSlot::Weapon => "weapon",
            EquipSlot::Armor => "armor",
            EquipSlot::Light => "light",
        }
    }
}

/// What the player currently has equipped, by item id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub weapon: Option<String>,
    pub armor: Option<String>,
    pub light: Option<String>,
}

impl Equipment {
    pub fn get(&self, slot: EquipSlot) -> Option<&String> {
        match slot {
            EquipSlot::Weapon => self.weapon.as_ref(),
            EquipSlot::Armor => self.armor.as_ref(),
            EquipSlot::Light => self.light.as_ref(),
        }
    }

    /// Empties the slot, returning what was in it.
    pub fn take(&mut self, slot: EquipSlot) -> Option<String> {
        match slot {
            EquipSlot::Weapon => self.weapon.take(),
            EquipSlot::Armor => self.armor.take(),
            EquipSlot::Light => self.light.take(),
        }
    }

    /// Fills the slot, returning whatever it displaced.
    pub fn put(&mut self, slot: EquipSlot, item: String) -> Option<String> {
        match slot {
            EquipSlot::Weapon => self.weapon.replace(item),
            EquipSlot::Armor => self.armor.replace(item),
            EquipSlot::Light => self.light.replace(item),
        }
    }

    /// All equipped item ids.
    pub fn items(&self) -> impl Iterator<Item = &String> {
        [self.weapon.as_ref(), self.armor.as_ref(), self.light.as_ref()]
            .into_iter()
            .flatten()
    }
}

/// A creature's built-in ranged attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangedAttack {
    pub name: String,
    pub damage: Dice,
    pub range: u32,
}

/// Where in the dungeon a template naturally occurs, and how sharply its
/// spawn chance falls off away from that depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnProfile {
    pub native_depth: i32,
    pub base_chance: f64,
    pub per_depth: f64,
}

/// One entry of a creature's drop table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEntry {
    pub item: String,
    /// Percent chance, rolled once on death.
    pub chance: u32,
}

fn default_detection() -> i32 {
    config::DEFAULT_DETECTION_RANGE
}

fn default_flee_chance() -> u32 {
    config::DEFAULT_FLEE_CHANCE
}

fn default_clone_cap() -> u32 {
    config::DEFAULT_CLONE_CAP
}

fn default_hp_base() -> i32 {
    1
}

/// Static definition of a creature kind, as stored in the content catalog.
///
/// Stat fields scale linearly with the creature's level, which is derived
/// from the depth it spawns at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorTemplate {
    pub id: String,
    pub name: String,
    pub glyph: char,
    #[serde(default)]
    pub behavior: AiBehavior,
    #[serde(default)]
    pub hostile: bool,
    /// Turns hostile-aggressive the first time the player attacks it.
    #[serde(default)]
    pub mercenary: bool,
    #[serde(default = "default_hp_base")]
    pub hp_base: i32,
    #[serde(default)]
    pub hp_per_level: i32,
    #[serde(default)]
    pub attack_base: i32,
    #[serde(default)]
    pub attack_per_level: i32,
    #[serde(default)]
    pub defense_base: i32,
    #[serde(default)]
    pub defense_per_level: i32,
    #[serde(default = "default_detection")]
    pub detection_range: i32,
    #[serde(default = "default_flee_chance")]
    pub flee_chance: u32,
    #[serde(default)]
    pub fear_immune: bool,
    #[serde(default)]
    pub drops: Vec<DropEntry>,
    /// Gold carried scales with level: `gold_min_mult * level ..= gold_max_mult * level`.
    #[serde(default)]
    pub gold_min_mult: u32,
    #[serde(default)]
    pub gold_max_mult: u32,
    #[serde(default)]
    pub ranged: Option<RangedAttack>,
    #[serde(default)]
    pub spells: Vec<String>,
    #[serde(default)]
    pub mana: i32,
    #[serde(default)]
    pub clone_rate: f64,
    #[serde(default = "default_clone_cap")]
    pub clone_cap: u32,
    #[serde(default)]
    pub pack_id: Option<String>,
    #[serde(default)]
    pub sleeps_during_day: bool,
    #[serde(default)]
    pub sleeps_during_night: bool,
    #[serde(default)]
    pub spawn: Option<SpawnProfile>,
}

impl ActorTemplate {
    /// A minimal template; callers fill in the rest with struct update
    /// syntax.
    pub fn new(id: &str, name: &str, glyph: char) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            glyph,
            behavior: AiBehavior::default(),
            hostile: false,
            mercenary: false,
            hp_base: default_hp_base(),
            hp_per_level: 0,
            attack_base: 0,
            attack_per_level: 0,
            defense_base: 0,
            defense_per_level: 0,
            detection_range: default_detection(),
            flee_chance: default_flee_chance(),
            fear_immune: false,
            drops: Vec::new(),
            gold_min_mult: 0,
            gold_max_mult: 0,
            ranged: None,
            spells: Vec::new(),
            mana: 0,
            clone_rate: 0.0,
            clone_cap: default_clone_cap(),
            pack_id: None,
            sleeps_during_day: false,
            sleeps_during_night: false,
            spawn: None,
        }
    }

    pub fn hp_at(&self, level: i32) -> i32 {
        (self.hp_base + level * self.hp_per_level).max(1)
    }

    pub fn attack_at(&self, level: i32) -> i32 {
        (self.attack_base + level * self.attack_per_level).max(0)
    }

    pub fn defense_at(&self, level: i32) -> i32 {
        (self.defense_base + level * self.defense_per_level).max(0)
    }

    /// Percent chance this template is accepted when rolled for a level at
    /// `depth`. Templates without a spawn profile always accept.
    pub fn spawn_chance(&self, depth: i32) -> f64 {
        match self.spawn {
            None => 100.0,
            Some(profile) => {
                let drift = (depth - profile.native_depth).abs() as f64;
                (profile.base_chance + drift * profile.per_depth).clamp(0.0, 100.0)
            }
        }
    }
}

/// A live creature on the current level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub template_id: String,
    pub name: String,
    pub glyph: char,
    pub position: Position,
    pub level: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub behavior: AiBehavior,
    pub hostile: bool,
    pub mercenary: bool,
    pub detection_range: i32,
    pub flee_chance: u32,
    pub fear_immune: bool,
    pub ranged: Option<RangedAttack>,
    pub spells: Vec<String>,
    pub mana: i32,
    pub max_mana: i32,
    pub clone_rate: f64,
    pub clone_cap: u32,
    pub pack_id: Option<String>,
    pub sleeps_during_day: bool,
    pub sleeps_during_night: bool,
    /// Asleep by schedule, as opposed to the `Asleep` status effect.
    pub naturally_asleep: bool,
    pub aware_of_player: bool,
    pub provoked: bool,
    /// Counts session updates; the actor acts when it reaches the threshold.
    pub move_counter: u8,
    pub effects: EffectSet,
}

impl Actor {
    /// Stamps a live creature out of a template at the given level.
    ///
    /// The move counter starts at a random phase so creatures spawned
    /// together do not all step on the same turns.
    pub fn from_template(
        template: &ActorTemplate,
        position: Position,
        level: i32,
        rng: &mut StdRng,
    ) -> Self {
        let level = level.max(1);
        Self {
            id: new_actor_id(),
            template_id: template.id.clone(),
            name: template.name.clone(),
            glyph: template.glyph,
            position,
            level,
            hp: template.hp_at(level),
            max_hp: template.hp_at(level),
            attack: template.attack_at(level),
            defense: template.defense_at(level),
            behavior: template.behavior,
            hostile: template.hostile,
            mercenary: template.mercenary,
            detection_range: template.detection_range,
            flee_chance: template.flee_chance,
            fear_immune: template.fear_immune,
            ranged: template.ranged.clone(),
            spells: template.spells.clone(),
            mana: template.mana,
            max_mana: template.mana,
            clone_rate: template.clone_rate,
            clone_cap: template.clone_cap,
            pack_id: template.pack_id.clone(),
            sleeps_during_day: template.sleeps_during_day,
            sleeps_during_night: template.sleeps_during_night,
            naturally_asleep: false,
            aware_of_player: false,
            provoked: false,
            move_counter: rng.gen_range(0..config::MOVE_COUNTER_THRESHOLD),
            effects: EffectSet::new(),
        }
    }

    /// Inert stand-in for a template id the catalog does not know: one hit
    /// point, passive, and harmless.
    pub fn placeholder(template_id: &str, position: Position) -> Self {
        Self {
            id: new_actor_id(),
            template_id: template_id.to_string(),
            name: "strange presence".to_string(),
            glyph: '?',
            position,
            level: 1,
            hp: 1,
            max_hp: 1,
            attack: 0,
            defense: 0,
            behavior: AiBehavior::Passive,
            hostile: false,
            mercenary: false,
            detection_range: 0,
            flee_chance: 0,
            fear_immune: true,
            ranged: None,
            spells: Vec::new(),
            mana: 0,
            max_mana: 0,
            clone_rate: 0.0,
            clone_cap: config::DEFAULT_CLONE_CAP,
            pack_id: None,
            sleeps_during_day: false,
            sleeps_during_night: false,
            naturally_asleep: false,
            aware_of_player: false,
            provoked: false,
            move_counter: 0,
            effects: EffectSet::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Asleep for any reason, schedule or effect.
    pub fn is_asleep(&self) -> bool {
        self.naturally_asleep || self.effects.has(crate::game::EffectKind::Asleep)
    }

    /// Applies damage; non-positive amounts do nothing. Returns true when
    /// this blow killed the creature.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if amount <= 0 {
            return false;
        }
        self.hp -= amount;
        if self.hp <= 0 {
            self.hp = 0;
            true
        } else {
            false
        }
    }

    /// Restores health up to the maximum; returns the amount actually
    /// restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 || self.hp >= self.max_hp {
            return 0;
        }
        let healed = amount.min(self.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    pub fn effective_attack(&self) -> i32 {
        self.attack + self.effects.attack_modifier()
    }

    pub fn effective_defense(&self) -> i32 {
        self.defense + self.effects.defense_modifier()
    }

    /// Threshold an attack roll must reach to hit this creature.
    pub fn armor_class(&self) -> i32 {
        10 + self.effective_defense()
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub class: ClassKind,
    pub stats: Stats,
    pub level: i32,
    pub xp: u64,
    pub next_level_xp: u64,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub position: Position,
    pub gold: u32,
    pub inventory: Vec<String>,
    pub equipment: Equipment,
    pub base_light_radius: i32,
    pub light_radius: i32,
    pub light_duration: i32,
    pub known_spells: Vec<String>,
    pub effects: EffectSet,
    /// Deepest dungeon depth reached, the target of a recall cast in town.
    #[serde(default)]
    pub deepest_depth: i32,
}

impl Player {
    /// XP needed to advance from `level` to the next; zero past the cap.
    pub fn xp_threshold(level: i32) -> u64 {
        match level {
            1 => 300,
            2 => 900,
            3 => 2_700,
            4 => 6_500,
            5 => 14_000,
            6 => 23_000,
            7 => 34_000,
            8 => 48_000,
            9 => 64_000,
            10 => 85_000,
            11 => 100_000,
            12 => 120_000,
            13 => 140_000,
            14 => 165_000,
            15 => 195_000,
            16 => 225_000,
            17 => 265_000,
            18 => 305_000,
            19 => 355_000,
            _ => 0,
        }
    }

    /// A fresh level-1 character with an even stat line.
    pub fn new(name: &str, class: ClassKind) -> Self {
        let stats = Stats::default();
        let con_mod = Stats::modifier(stats.constitution);
        let max_hp = (10 + (con_mod * 2).max(0)).max(1);
        let mut player = Self {
            name: name.to_string(),
            class,
            stats,
            level: 1,
            xp: 0,
            next_level_xp: Self::xp_threshold(1),
            hp: max_hp,
            max_hp,
            mana: 0,
            max_mana: 0,
            position: Position::origin(),
            gold: 0,
            inventory: Vec::new(),
            equipment: Equipment::default(),
            base_light_radius: config::BASE_LIGHT_RADIUS,
            light_radius: config::BASE_LIGHT_RADIUS,
            light_duration: 0,
            known_spells: Vec::new(),
            effects: EffectSet::new(),
            deepest_depth: 0,
        };
        player.max_mana = player.base_mana_pool();
        player.mana = player.max_mana;
        player
    }

    pub fn modifier(&self, kind: StatKind) -> i32 {
        self.stats.modifier_of(kind)
    }

    /// Modifier of the class casting stat; zero for non-casters.
    pub fn casting_modifier(&self) -> i32 {
        self.class
            .casting_stat()
            .map_or(0, |stat| self.stats.modifier_of(stat))
    }

    /// To-hit bonus that grows with experience.
    pub fn proficiency_bonus(&self) -> i32 {
        2 + (self.level - 1) / 4
    }

    /// Size of the mana pool at the current level; zero for non-casters.
    pub fn base_mana_pool(&self) -> i32 {
        match self.class.casting_stat() {
            None => 0,
            Some(stat) => {
                let modifier = self.stats.modifier_of(stat);
                (5 + modifier * self.level.max(1)).max(0)
            }
        }
    }

    /// Adds experience and resolves any level-ups it pays for. Returns the
    /// number of levels gained.
    pub fn gain_xp(&mut self, amount: u64) -> u32 {
        if amount == 0 {
            return 0;
        }
        self.xp += amount;
        let mut gained = 0;
        while self.next_level_xp > 0 && self.xp >= self.next_level_xp {
            self.xp -= self.next_level_xp;
            self.level += 1;
            self.next_level_xp = Self::xp_threshold(self.level);
            self.on_level_up();
            gained += 1;
        }
        gained
    }

    fn on_level_up(&mut self) {
        let con_mod = Stats::modifier(self.stats.constitution);
        let hp_gain = (6 + con_mod).max(4);
        self.max_hp += hp_gain;
        self.hp = self.max_hp;
        self.max_mana = self.base_mana_pool();
        self.mana = self.max_mana;
    }

    /// Applies damage; non-positive amounts do nothing. Returns true when
    /// the blow was lethal.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if amount <= 0 {
            return false;
        }
        self.hp -= amount;
        if self.hp <= 0 {
            self.hp = 0;
            true
        } else {
            false
        }
    }

    /// Restores health up to the maximum; returns the amount actually
    /// restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 || self.hp >= self.max_hp {
            return 0;
        }
        let healed = amount.min(self.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    /// Restores mana up to the pool cap; returns the amount restored.
    pub fn restore_mana(&mut self, amount: i32) -> i32 {
        if amount <= 0 || self.mana >= self.max_mana {
            return 0;
        }
        let restored = amount.min(self.max_mana - self.mana);
        self.mana += restored;
        restored
    }

    pub fn spend_mana(&mut self, cost: i32) -> bool {
        if cost > self.mana {
            return false;
        }
        self.mana -= cost;
        true
    }

    /// Passive per-turn mana trickle; zero for non-casters or a full pool.
    pub fn regenerate_mana(&mut self) -> i32 {
        if self.class.casting_stat().is_none() {
            return 0;
        }
        let gain = 1 + (self.casting_modifier().div_euclid(2)).max(0);
        self.restore_mana(gain)
    }

    /// Weight the character can carry before slowing down.
    pub fn carry_capacity(&self) -> u32 {
        config::WEIGHT_CAPACITY_BASE
            + config::WEIGHT_CAPACITY_PER_STR * self.stats.strength.max(0) as u32
    }

    pub fn is_overweight(&self, carried_weight: u32) -> bool {
        carried_weight > self.carry_capacity()
    }

    /// Percent the character is slowed by excess load, capped at 100.
    pub fn overweight_percent(&self, carried_weight: u32) -> u32 {
        let capacity = self.carry_capacity();
        if carried_weight <= capacity || capacity == 0 {
            return 0;
        }
        (((carried_weight - capacity) * 100) / capacity).min(100)
    }
}
