//! # Level Session Module
//!
//! One playable level and everything on it: terrain, fog-of-war, the player,
//! live creatures, ground piles, and the rolling event log.
//!
//! A [`LevelSession`] is the coordination point for the whole simulation. A
//! host feeds it [`Command`] values; each call resolves the player's action,
//! and when the action consumed a turn, runs the end-of-turn cascade (mana
//! regeneration, status-effect ticks, the recall countdown, creature AI, and
//! a visibility recompute) before returning. The session is strictly
//! synchronous and owns a single seeded generator, so a fixed seed and a
//! fixed command sequence replay identically.

use crate::game::ai::{self, AiContext, AiDecision};
use crate::game::{combat, fov};
use crate::{
    config, generation, Actor, ActorId, AiBehavior, ContentCatalog, DamageRoll, Dice, EffectKind,
    EquipSlot, ItemKind, ItemTemplate, MapGrid, Player, Position, SpellEffect, SpellTemplate,
    StatKind, StreetKind, TileKind, TimeOfDay, UseEffect, Visibility, VisibilityGrid, WarrenError,
    WarrenResult,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// Loose gold and items resting on one tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundPile {
    /// Coins, merged across every drop on this tile.
    #[serde(default)]
    pub gold: u32,
    /// Item ids in the order they landed.
    #[serde(default)]
    pub items: Vec<String>,
}

impl GroundPile {
    pub fn is_empty(&self) -> bool {
        self.gold == 0 && self.items.is_empty()
    }
}

/// Everything a host can ask the session to do.
///
/// Commands that fail their preconditions (a blocked bump, an unknown spell,
/// a bad inventory index, no adjacent door) cost no time; see
/// [`LevelSession::execute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Step one tile, or bump-attack a hostile standing there. Deltas are
    /// clamped to a single step on each axis.
    Move { dx: i32, dy: i32 },
    /// Strike an adjacent actor, hostile or not.
    Attack { target: ActorId },
    /// Drink, eat, or read inventory slot `index`.
    UseItem { index: usize },
    /// Wield or wear inventory slot `index`.
    Equip { index: usize },
    /// Remove whatever sits in `slot`.
    Unequip { slot: EquipSlot },
    /// Cast a known spell, at a chosen actor where one is wanted.
    CastSpell { spell: String, target: Option<ActorId> },
    /// Open the first closed door in a cardinally adjacent tile.
    OpenDoor,
    /// Close the first open door in a cardinally adjacent tile.
    CloseDoor,
    /// Tunnel through the first cardinally adjacent rock face.
    Dig,
    /// Flip persistent search mode on or off.
    ToggleSearch,
    /// Examine the surrounding tiles for secrets right now.
    Search,
    /// Take the first item from the pile underfoot.
    PickUp,
    /// Put inventory slot `index` on the ground.
    DropItem { index: usize },
    /// Stand still for a turn.
    Wait,
}

/// What [`LevelSession::execute`] did with a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether world time advanced.
    pub consumed: bool,
    /// Why the command was rejected, when it was.
    pub reason: Option<String>,
}

impl ActionOutcome {
    /// An action that consumed a turn.
    pub fn turn() -> Self {
        Self { consumed: true, reason: None }
    }

    /// An action that happened but cost no time, like toggling search mode.
    pub fn free() -> Self {
        Self { consumed: false, reason: None }
    }

    /// A rejected action, with the reason a host can show.
    pub fn ignored(reason: impl Into<String>) -> Self {
        Self { consumed: false, reason: Some(reason.into()) }
    }
}

/// Serializable snapshot of a [`LevelSession`].
///
/// Everything but the content catalog and the live generator goes in;
/// [`LevelSession::import`] reseeds the generator from the stored seed, so a
/// resumed session is deterministic without replaying the interrupted draw
/// sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub depth: i32,
    pub time: u64,
    pub seed: u64,
    pub grid: MapGrid,
    pub visibility: VisibilityGrid,
    pub player: Player,
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub ground: Vec<(Position, GroundPile)>,
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default)]
    pub recall_active: bool,
    #[serde(default)]
    pub recall_timer: u32,
    #[serde(default)]
    pub recall_depth: i32,
    #[serde(default)]
    pub pending_travel: Option<i32>,
    #[serde(default)]
    pub searching: bool,
    #[serde(default)]
    pub search_timer: u64,
    #[serde(default)]
    pub last_overweight_warning: u64,
}

/// One live level, advanced one command at a time.
#[derive(Debug)]
pub struct LevelSession {
    /// Shared read-only template store.
    catalog: Arc<ContentCatalog>,
    /// Dungeon depth of this level; 0 is the town.
    depth: i32,
    /// World turns elapsed.
    time: u64,
    /// Seed the session's generator started from.
    seed: u64,
    rng: StdRng,
    grid: MapGrid,
    visibility: VisibilityGrid,
    player: Player,
    actors: Vec<Actor>,
    ground: BTreeMap<Position, GroundPile>,
    log: VecDeque<String>,
    recall_active: bool,
    recall_timer: u32,
    recall_depth: i32,
    /// Depth the host should move the player to, set when a recall fires.
    pending_travel: Option<i32>,
    searching: bool,
    search_timer: u64,
    last_overweight_warning: u64,
}

impl LevelSession {
    /// Generates a level for `depth`, places the player at its entrance, and
    /// populates it from the catalog's spawn pools.
    ///
    /// The player lands on the up staircase where one exists, otherwise the
    /// down staircase, otherwise the first open floor tile.
    ///
    /// # Errors
    ///
    /// Returns an error when generation fails or the level has no tile the
    /// player could land on.
    pub fn new(
        catalog: Arc<ContentCatalog>,
        mut player: Player,
        depth: i32,
        seed: u64,
    ) -> WarrenResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let grid = generation::generate_level(depth, &mut rng)?;
        let entry = grid
            .first_tile(TileKind::StairsUp)
            .or_else(|| grid.first_tile(TileKind::StairsDown))
            .or_else(|| grid.first_tile(TileKind::Floor))
            .ok_or_else(|| WarrenError::GenerationFailed("level has no landing tile".into()))?;
        player.position = entry;
        player.deepest_depth = player.deepest_depth.max(depth);

        let actors = generation::populate_level(&grid, &catalog, depth, entry, &mut rng);
        let visibility = VisibilityGrid::new(grid.width, grid.height);

        let mut session = Self {
            catalog,
            depth,
            time: 0,
            seed,
            rng,
            grid,
            visibility,
            player,
            actors,
            ground: BTreeMap::new(),
            log: VecDeque::new(),
            recall_active: false,
            recall_timer: 0,
            recall_depth: 0,
            pending_travel: None,
            searching: false,
            search_timer: 0,
            last_overweight_warning: 0,
        };
        session.update_sleep_schedules();
        session.update_fov();
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_world_time(self.time)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn grid(&self) -> &MapGrid {
        &self.grid
    }

    pub fn visibility(&self) -> &VisibilityGrid {
        &self.visibility
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Mutable player access for hosts that grant gear, spells, or gold
    /// outside the command surface.
    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    pub fn ground(&self) -> &BTreeMap<Position, GroundPile> {
        &self.ground
    }

    /// The rolling event log, oldest entry first.
    pub fn log(&self) -> &VecDeque<String> {
        &self.log
    }

    pub fn is_game_over(&self) -> bool {
        self.player.hp <= 0
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn is_recalling(&self) -> bool {
        self.recall_active
    }

    /// Depth a fired recall wants the player moved to. Stays set until the
    /// host builds the next session.
    pub fn pending_travel(&self) -> Option<i32> {
        self.pending_travel
    }

    /// Total weight of the inventory plus everything equipped.
    pub fn carried_weight(&self) -> u32 {
        self.player
            .inventory
            .iter()
            .chain(self.player.equipment.items())
            .map(|id| self.catalog.item_weight(id))
            .sum()
    }

    /// Stamps a creature from the catalog into the level. Unknown template
    /// ids produce an inert placeholder.
    pub fn spawn_actor(&mut self, template_id: &str, position: Position, level: i32) -> ActorId {
        let actor = self
            .catalog
            .spawn_creature(template_id, position, level, &mut self.rng);
        let id = actor.id;
        self.actors.push(actor);
        id
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    /// Resolves one player command.
    ///
    /// When the command consumed a turn, the full end-of-turn cascade runs
    /// before this returns: world time advances, the player's mana and
    /// status effects tick, the recall countdown and search mode advance,
    /// every creature takes its update, and visibility is recomputed.
    pub fn execute(&mut self, command: Command) -> ActionOutcome {
        if self.is_game_over() {
            return ActionOutcome::ignored("You are dead.");
        }
        let outcome = match command {
            Command::Move { dx, dy } => self.handle_move(dx, dy),
            Command::Attack { target } => self.handle_attack(target),
            Command::UseItem { index } => self.handle_use_item(index),
            Command::Equip { index } => self.handle_equip(index),
            Command::Unequip { slot } => self.handle_unequip(slot),
            Command::CastSpell { ref spell, target } => self.handle_cast(spell, target),
            Command::OpenDoor => self.handle_open_door(),
            Command::CloseDoor => self.handle_close_door(),
            Command::Dig => self.handle_dig(),
            Command::ToggleSearch => self.handle_toggle_search(),
            Command::Search => {
                self.perform_search(true);
                ActionOutcome::turn()
            }
            Command::PickUp => self.handle_pick_up(),
            Command::DropItem { index } => self.handle_drop(index),
            Command::Wait => ActionOutcome::turn(),
        };
        if outcome.consumed {
            self.end_turn();
        }
        outcome
    }

    fn handle_move(&mut self, dx: i32, dy: i32) -> ActionOutcome {
        let target = self.player.position + Position::new(dx.signum(), dy.signum());

        if let Some(idx) = self.actor_index_at(target) {
            if self.actors[idx].hostile {
                self.player_attack(idx);
                return ActionOutcome::turn();
            }
            return ActionOutcome::ignored(format!("{} is in the way.", self.actors[idx].name));
        }

        match self.grid.tile(target) {
            Some(TileKind::DoorClosed) => {
                self.grid.set_tile(target, TileKind::DoorOpen);
                self.update_fov();
                self.log_event("You open the door.");
                ActionOutcome::turn()
            }
            Some(tile) if tile.is_walkable() => {
                self.player.position = target;
                self.tick_light();
                self.collect_ground_gold();
                self.update_fov();
                ActionOutcome::turn()
            }
            _ => ActionOutcome::ignored("The way is blocked."),
        }
    }

    fn handle_attack(&mut self, target: ActorId) -> ActionOutcome {
        let Some(idx) = self.live_actor_index(target) else {
            return ActionOutcome::ignored("Nothing there to attack.");
        };
        if !self.actors[idx].position.touches(self.player.position) {
            return ActionOutcome::ignored("Too far away to attack.");
        }
        self.player_attack(idx);
        ActionOutcome::turn()
    }

    fn handle_use_item(&mut self, index: usize) -> ActionOutcome {
        let Some(item_id) = self.player.inventory.get(index).cloned() else {
            return ActionOutcome::ignored("No such item.");
        };
        let Some(item) = self.catalog.item(&item_id).cloned() else {
            let reason = format!("You can't use {item_id} that way.");
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        };
        match item.category {
            ItemKind::Potion => self.drink_potion(index, &item),
            ItemKind::Food => self.eat_food(index, &item),
            ItemKind::Scroll => self.read_scroll(index, &item),
            _ => {
                let reason = format!("You can't use {} that way.", item.name);
                self.log_event(reason.clone());
                ActionOutcome::ignored(reason)
            }
        }
    }

    fn drink_potion(&mut self, index: usize, item: &ItemTemplate) -> ActionOutcome {
        match item.effect {
            Some(UseEffect::Heal { amount }) => {
                let healed = self.player.heal(amount);
                self.log_event(format!("You drink {}. (+{healed} HP)", item.name));
            }
            Some(UseEffect::RestoreMana { amount }) => {
                let restored = self.player.restore_mana(amount);
                self.log_event(format!("You drink {}. (+{restored} mana)", item.name));
            }
            Some(UseEffect::CurePoison) => {
                if self.player.effects.remove(EffectKind::Poisoned) {
                    self.log_event(format!("You drink {}. The poison is cured!", item.name));
                } else {
                    self.log_event(format!("You drink {}. Nothing happens.", item.name));
                }
            }
            None => {
                self.log_event(format!("You drink {}. Nothing happens.", item.name));
            }
        }
        self.player.inventory.remove(index);
        ActionOutcome::turn()
    }

    fn eat_food(&mut self, index: usize, item: &ItemTemplate) -> ActionOutcome {
        match item.effect {
            Some(UseEffect::Heal { amount }) => {
                let healed = self.player.heal(amount);
                self.log_event(format!("You eat {}. (+{healed} HP)", item.name));
            }
            _ => {
                self.log_event(format!("You eat {}. Tasty!", item.name));
            }
        }
        self.player.inventory.remove(index);
        ActionOutcome::turn()
    }

    /// Reading a scroll releases its linked spell with no mana cost and no
    /// failure roll.
    fn read_scroll(&mut self, index: usize, item: &ItemTemplate) -> ActionOutcome {
        let Some(spell) = item
            .scroll_spell
            .as_deref()
            .and_then(|id| self.catalog.spell(id))
            .cloned()
        else {
            let reason = format!("You can't use {} that way.", item.name);
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        };
        self.log_event(format!("You read the {}! {} activates!", item.name, spell.name));
        let target = self.default_spell_target(&spell);
        self.apply_spell_effect(&spell, target);
        self.grant_xp(1);
        self.player.inventory.remove(index);
        ActionOutcome::turn()
    }

    fn handle_equip(&mut self, index: usize) -> ActionOutcome {
        let Some(item_id) = self.player.inventory.get(index).cloned() else {
            return ActionOutcome::ignored("No such item.");
        };
        let Some(item) = self.catalog.item(&item_id).cloned() else {
            return ActionOutcome::ignored(format!("You can't equip {item_id}."));
        };
        let slot = match item.category {
            ItemKind::Weapon => EquipSlot::Weapon,
            ItemKind::Armor => EquipSlot::Armor,
            ItemKind::Light => EquipSlot::Light,
            _ => {
                let reason = format!("You can't equip {}.", item.name);
                self.log_event(reason.clone());
                return ActionOutcome::ignored(reason);
            }
        };
        self.player.inventory.remove(index);
        if let Some(previous) = self.player.equipment.put(slot, item_id) {
            self.player.inventory.push(previous);
        }
        if slot == EquipSlot::Light {
            if let Some(light) = item.light {
                self.player.light_radius = light.radius;
                self.player.light_duration = light.duration;
            }
        }
        self.log_event(format!("Equipped {}", item.name));
        ActionOutcome::turn()
    }

    fn handle_unequip(&mut self, slot: EquipSlot) -> ActionOutcome {
        let Some(item_id) = self.player.equipment.take(slot) else {
            return ActionOutcome::ignored(format!("Nothing equipped as {}.", slot.name()));
        };
        if slot == EquipSlot::Light {
            self.player.light_radius = self.player.base_light_radius;
            self.player.light_duration = 0;
        }
        let name = self.catalog.item_name(&item_id);
        self.player.inventory.push(item_id);
        self.log_event(format!("Unequipped {name}"));
        ActionOutcome::turn()
    }

    fn handle_cast(&mut self, spell_id: &str, target: Option<ActorId>) -> ActionOutcome {
        let Some(spell) = self.catalog.spell(spell_id).cloned() else {
            self.log_event("Unknown spell.");
            return ActionOutcome::ignored("Unknown spell.");
        };
        if !self
            .player
            .known_spells
            .iter()
            .any(|known| known.as_str() == spell_id)
        {
            self.log_event("You don't know that spell.");
            return ActionOutcome::ignored("You don't know that spell.");
        }
        if self.player.class.casting_stat().is_none() {
            let reason = format!("Your class cannot cast {}.", spell.name);
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        }
        if self.player.level < spell.min_level {
            let reason = format!("You are not experienced enough to cast {}.", spell.name);
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        }
        if !self.player.spend_mana(spell.mana_cost) {
            let reason = format!("You lack the mana for {}.", spell.name);
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        }

        // Stat and experience shave the failure chance; it never leaves the
        // 5..=95 band.
        let failure = (spell.base_failure
            - 3 * self.player.casting_modifier()
            - (self.player.level - spell.min_level))
            .clamp(5, 95);
        if self.rng.gen_range(1..=100) <= failure {
            self.player.effects.apply(EffectKind::Confused, 3);
            self.log_event(format!("You failed to cast {}!", spell.name));
            return ActionOutcome::turn();
        }

        self.log_event(format!("You cast {}!", spell.name));
        let target = target.or_else(|| self.default_spell_target(&spell));
        self.apply_spell_effect(&spell, target);
        self.grant_xp(spell.min_level.max(1) as u64);
        ActionOutcome::turn()
    }

    fn handle_open_door(&mut self) -> ActionOutcome {
        for pos in self.player.position.cardinal_adjacent_positions() {
            if self.grid.tile(pos) == Some(TileKind::DoorClosed) {
                self.grid.set_tile(pos, TileKind::DoorOpen);
                self.update_fov();
                self.log_event("Opened door.");
                return ActionOutcome::turn();
            }
        }
        ActionOutcome::ignored("No door there.")
    }

    fn handle_close_door(&mut self) -> ActionOutcome {
        for pos in self.player.position.cardinal_adjacent_positions() {
            if self.grid.tile(pos) == Some(TileKind::DoorOpen) {
                self.grid.set_tile(pos, TileKind::DoorClosed);
                self.update_fov();
                self.log_event("Closed door.");
                return ActionOutcome::turn();
            }
        }
        ActionOutcome::ignored("No door there.")
    }

    fn handle_dig(&mut self) -> ActionOutcome {
        for pos in self.player.position.cardinal_adjacent_positions() {
            if self.grid.tile(pos).is_some_and(TileKind::is_diggable) {
                self.grid.set_tile(pos, TileKind::Floor);
                self.update_fov();
                self.log_event("Dug through rock.");
                return ActionOutcome::turn();
            }
        }
        ActionOutcome::ignored("Nothing to dig here.")
    }

    fn handle_toggle_search(&mut self) -> ActionOutcome {
        self.searching = !self.searching;
        if self.searching {
            self.search_timer = 0;
            self.log_event("Begin searching.");
        } else {
            self.log_event("Stop searching.");
        }
        ActionOutcome::free()
    }

    fn handle_pick_up(&mut self) -> ActionOutcome {
        let pos = self.player.position;
        let Some(item_id) = self
            .ground
            .get(&pos)
            .and_then(|pile| pile.items.first().cloned())
        else {
            self.log_event("There is nothing here to pick up.");
            return ActionOutcome::ignored("There is nothing here to pick up.");
        };
        let name = self.catalog.item_name(&item_id);
        if self.player.inventory.len() >= config::INVENTORY_CAP {
            let reason = format!(
                "You cannot pick up {name}: Your backpack is full ({} item limit).",
                config::INVENTORY_CAP
            );
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        }
        let new_weight = self.carried_weight() + self.catalog.item_weight(&item_id);
        let capacity = self.player.carry_capacity();
        if new_weight > capacity {
            let reason = format!(
                "You cannot pick up {name}: That item would put you over your weight limit \
                 ({new_weight}/{capacity})."
            );
            self.log_event(reason.clone());
            return ActionOutcome::ignored(reason);
        }
        let emptied = match self.ground.get_mut(&pos) {
            Some(pile) => {
                pile.items.remove(0);
                pile.is_empty()
            }
            None => false,
        };
        if emptied {
            self.ground.remove(&pos);
        }
        self.player.inventory.push(item_id);
        self.log_event(format!("You pick up {name}."));
        ActionOutcome::turn()
    }

    fn handle_drop(&mut self, index: usize) -> ActionOutcome {
        let Some(item_id) = self.player.inventory.get(index).cloned() else {
            return ActionOutcome::ignored("No such item.");
        };
        let name = self.catalog.item_name(&item_id);
        if !self.place_ground_item(item_id, self.player.position, true) {
            self.log_event("There is no space to drop that.");
            return ActionOutcome::ignored("There is no space to drop that.");
        }
        self.player.inventory.remove(index);
        self.log_event(format!("You drop {name}."));
        ActionOutcome::turn()
    }

    // ------------------------------------------------------------------
    // Player combat
    // ------------------------------------------------------------------

    /// One player swing at the actor at `idx`. A sleeping target is woken
    /// first, then the strike resolves in the same action.
    fn player_attack(&mut self, idx: usize) {
        if self.actors[idx].is_asleep() {
            self.wake_actor(idx);
            let name = self.actors[idx].name.clone();
            self.log_event(format!("You wake up {name}!"));
        }

        let in_darkness = self.tile_in_darkness(self.actors[idx].position);
        if in_darkness {
            self.log_event("Attacking in darkness! (-2 to hit)");
        }

        let strength = self.player.modifier(StatKind::Strength);
        let to_hit = strength + self.player.proficiency_bonus();
        let armor_class = self.actors[idx].armor_class();
        let weapon = self
            .player
            .equipment
            .get(EquipSlot::Weapon)
            .and_then(|id| self.catalog.item(id))
            .cloned();
        let dice = weapon
            .as_ref()
            .and_then(|item| item.damage)
            .unwrap_or(Dice { count: 0, sides: 1 });
        let damage = DamageRoll::Dice { dice, bonus: strength };

        let result = combat::strike(to_hit, armor_class, &damage, in_darkness, &mut self.rng);
        let name = self.actors[idx].name.clone();
        if !result.hit {
            self.log_event(format!("You miss {name}."));
            return;
        }

        let mut total = result.damage;
        // Elemental riders roll separately and are never doubled by a crit.
        if let Some(effect) = weapon.as_ref().and_then(|item| item.weapon_effect.as_ref()) {
            let bonus = effect.damage.roll(&mut self.rng);
            if bonus > 0 {
                total += bonus;
                self.log_event(format!("{} damage! (+{bonus})", effect.name));
            }
        }
        if self.player.class.is_stealthy() && !self.actors[idx].aware_of_player {
            total = (total as f64 * 2.0) as i32;
            self.log_event("Backstab! (2.0x damage)");
        }
        self.actors[idx].aware_of_player = true;

        let died = self.actors[idx].take_damage(total);
        if result.critical {
            self.log_event(format!("Crit! Hit {name} for {total} dmg!"));
        } else {
            self.log_event(format!("Hit {name} for {total} dmg."));
        }
        if died {
            let levels = self.handle_actor_death(idx);
            self.log_event(format!("{name} defeated!"));
            if levels > 0 {
                self.log_event("You feel more experienced!");
            }
        } else {
            self.provoke(idx);
        }
    }

    /// Surviving a player attack turns thieves and mercenaries hostile.
    fn provoke(&mut self, idx: usize) {
        if self.actors[idx].hostile && !matches!(self.actors[idx].behavior, AiBehavior::Thief) {
            return;
        }
        let name = self.actors[idx].name.clone();
        if matches!(self.actors[idx].behavior, AiBehavior::Thief) {
            if !self.actors[idx].hostile {
                self.actors[idx].hostile = true;
            }
            self.actors[idx].behavior = AiBehavior::Aggressive;
            self.log_event(format!("{name} becomes hostile!"));
        } else if self.actors[idx].mercenary && !self.actors[idx].provoked {
            self.actors[idx].provoked = true;
            self.actors[idx].hostile = true;
            self.actors[idx].behavior = AiBehavior::Aggressive;
            self.log_event(format!("{name} is provoked!"));
        }
    }

    fn wake_actor(&mut self, idx: usize) {
        let actor = &mut self.actors[idx];
        actor.naturally_asleep = false;
        actor.effects.remove(EffectKind::Asleep);
        actor.aware_of_player = true;
    }

    /// A tile is dark when it is outside the player's lit field of view.
    /// Daytime town streets are never dark.
    fn tile_in_darkness(&self, pos: Position) -> bool {
        if self.depth == 0 && self.time_of_day() == TimeOfDay::Day {
            return false;
        }
        self.visibility.get(pos) < Visibility::Visible
    }

    fn player_armor_class(&self) -> i32 {
        let armor_bonus = self
            .player
            .equipment
            .get(EquipSlot::Armor)
            .and_then(|id| self.catalog.item(id))
            .map_or(0, |item| item.defense_bonus);
        10 + self.player.modifier(StatKind::Dexterity) + armor_bonus
    }

    fn damage_player(&mut self, amount: i32) {
        if self.player.take_damage(amount) {
            self.log_event("You have been slain!");
        }
    }

    // ------------------------------------------------------------------
    // Spells
    // ------------------------------------------------------------------

    /// Bolts fired without an explicit target seek the nearest visible
    /// hostile; everything else resolves untargeted.
    fn default_spell_target(&self, spell: &SpellTemplate) -> Option<ActorId> {
        match spell.effect {
            SpellEffect::Bolt { .. } => self.nearest_visible_hostile(),
            _ => None,
        }
    }

    fn nearest_visible_hostile(&self) -> Option<ActorId> {
        self.actors
            .iter()
            .filter(|actor| {
                actor.is_alive()
                    && actor.hostile
                    && self.visibility.get(actor.position) == Visibility::Visible
            })
            .min_by(|a, b| {
                let da = a.position.euclidean_distance(self.player.position);
                let db = b.position.euclidean_distance(self.player.position);
                da.total_cmp(&db)
            })
            .map(|actor| actor.id)
    }

    /// Applies one spell's effect. Shared by casting and scroll reading.
    fn apply_spell_effect(&mut self, spell: &SpellTemplate, target: Option<ActorId>) {
        match spell.effect.clone() {
            SpellEffect::Bolt { damage } => {
                let Some(idx) = target.and_then(|id| self.live_actor_index(id)) else {
                    self.log_event(format!("{} fizzles.", spell.name));
                    return;
                };
                let amount = damage.roll(&mut self.rng);
                let name = self.actors[idx].name.clone();
                self.log_event(format!("{name} takes {amount} spell damage!"));
                if self.actors[idx].take_damage(amount) {
                    let levels = self.handle_actor_death(idx);
                    self.log_event(format!("{name} is defeated!"));
                    if levels > 0 {
                        self.log_event("You feel more experienced!");
                    }
                }
            }
            SpellEffect::AreaBolt { damage } => {
                let targets: Vec<ActorId> = self
                    .actors
                    .iter()
                    .filter(|actor| {
                        actor.is_alive()
                            && actor.hostile
                            && self.visibility.get(actor.position) == Visibility::Visible
                    })
                    .map(|actor| actor.id)
                    .collect();
                if targets.is_empty() {
                    self.log_event(format!("{} echoes through the empty dungeon.", spell.name));
                    return;
                }
                let mut killed = 0;
                let mut levels = 0;
                for id in targets {
                    let Some(idx) = self.live_actor_index(id) else { continue };
                    let amount = damage.roll(&mut self.rng);
                    let name = self.actors[idx].name.clone();
                    self.log_event(format!("{name} takes {amount} physical damage!"));
                    if self.actors[idx].take_damage(amount) {
                        levels += self.handle_actor_death(idx);
                        killed += 1;
                    }
                }
                if killed > 0 {
                    self.log_event(format!("{} defeats {killed} enemies!", spell.name));
                }
                if levels > 0 {
                    self.log_event("You feel more experienced!");
                }
            }
            SpellEffect::Heal { amount } => {
                let healed = self.player.heal(amount);
                self.log_event(format!("You feel better. (+{healed} HP)"));
            }
            SpellEffect::Light { radius, duration } => {
                self.player.light_radius = self.player.light_radius.max(radius);
                self.player.light_duration = self.player.light_duration.max(duration);
                self.update_fov();
            }
            SpellEffect::Teleport { range } => {
                if range > 1000 {
                    self.activate_recall();
                } else {
                    self.blink(range);
                }
            }
            SpellEffect::Buff { effect, duration } => {
                self.player.effects.apply(effect, duration);
                self.log_event(format!("You feel {}.", effect.name().to_lowercase()));
            }
            SpellEffect::Debuff { effect, duration } => {
                let Some(idx) = target.and_then(|id| self.live_actor_index(id)) else {
                    self.log_event(format!("{} needs a target.", spell.name));
                    return;
                };
                self.actors[idx].effects.apply(effect, duration);
                let name = self.actors[idx].name.clone();
                self.log_event(format!("{name} is affected by {}!", spell.name));
            }
            SpellEffect::Cleanse { effect } => {
                if self.player.effects.remove(effect) {
                    self.log_event(format!("The {} effect is removed!", effect.name()));
                } else {
                    self.log_event(format!("You don't have the {} effect.", effect.name()));
                }
            }
        }
    }

    /// A short random jump to open floor. Twenty placement attempts, then
    /// the spell is wasted.
    fn blink(&mut self, range: i32) {
        let range = range.max(1);
        for _ in 0..20 {
            let dx = self.rng.gen_range(-range..=range);
            let dy = self.rng.gen_range(-range..=range);
            let target = self.player.position + Position::new(dx, dy);
            let open = self.grid.tile(target).is_some_and(TileKind::is_open_floor)
                && self.actor_index_at(target).is_none();
            if open {
                self.player.position = target;
                self.log_event("Phase through space!");
                self.update_fov();
                return;
            }
        }
        self.log_event("Teleport fails!");
    }

    fn activate_recall(&mut self) {
        if self.recall_active {
            self.log_event("You are already recalling!");
            return;
        }
        if self.depth > 0 {
            self.recall_depth = 0;
            self.log_event("You begin to recall to the surface...");
        } else if self.player.deepest_depth > 0 {
            self.recall_depth = self.player.deepest_depth;
            self.log_event(format!(
                "You begin to recall to dungeon level {}...",
                self.player.deepest_depth
            ));
        } else {
            self.log_event("You have not visited the dungeon yet!");
            return;
        }
        self.recall_active = true;
        self.recall_timer = 0;
    }

    fn execute_recall(&mut self) {
        self.recall_active = false;
        self.recall_timer = 0;
        self.pending_travel = Some(self.recall_depth);
        self.log_event("The world spins around you...");
        self.log_event(format!("You are recalled! (Target depth: {})", self.recall_depth));
    }

    // ------------------------------------------------------------------
    // Deaths and ground items
    // ------------------------------------------------------------------

    /// Removes a dead actor, pays out experience, and scatters its drops.
    /// Returns the player levels gained; the "defeated" line and any level-up
    /// announcement are the caller's to log.
    fn handle_actor_death(&mut self, idx: usize) -> u32 {
        let actor = self.actors.remove(idx);
        let xp = combat::xp_reward(actor.level);
        let levels = self.player.gain_xp(xp);
        self.log_event(format!("You gain {xp} XP."));

        if let Some(template) = self.catalog.creature(&actor.template_id).cloned() {
            let (gold, items) = combat::roll_drops(&template, actor.level, &mut self.rng);
            if gold > 0 {
                self.place_ground_gold(gold, actor.position);
                self.log_event(format!("{} drops {gold} gold.", actor.name));
            }
            for item_id in items {
                let name = self.catalog.item_name(&item_id);
                if self.place_ground_item(item_id, actor.position, false) {
                    self.log_event(format!("{} drops a {name}.", actor.name));
                }
            }
        }
        levels
    }

    /// Nearest tile that can hold a ground pile: in bounds, not wall-like,
    /// nobody standing on it, and (usually) not the player's own tile.
    /// Searches outward breadth-first from `origin`.
    fn find_ground_tile(&self, origin: Position, allow_player_tile: bool) -> Option<Position> {
        let placeable = |pos: Position| {
            self.grid.tile(pos).is_some_and(|tile| !tile.blocks_sight())
                && self.actor_index_at(pos).is_none()
                && (allow_player_tile || pos != self.player.position)
        };
        if placeable(origin) {
            return Some(origin);
        }
        let deltas = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (-1, 1), (1, -1), (1, 1)];
        let mut visited = HashSet::from([origin]);
        let mut queue = VecDeque::from([origin]);
        while let Some(current) = queue.pop_front() {
            for (dx, dy) in deltas {
                let next = current + Position::new(dx, dy);
                if !visited.insert(next) || !self.grid.in_bounds(next) {
                    continue;
                }
                if placeable(next) {
                    return Some(next);
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn place_ground_item(
        &mut self,
        item_id: String,
        origin: Position,
        allow_player_tile: bool,
    ) -> bool {
        match self.find_ground_tile(origin, allow_player_tile) {
            Some(pos) => {
                self.ground.entry(pos).or_default().items.push(item_id);
                true
            }
            None => false,
        }
    }

    fn place_ground_gold(&mut self, amount: u32, origin: Position) -> bool {
        match self.find_ground_tile(origin, false) {
            Some(pos) => {
                self.ground.entry(pos).or_default().gold += amount;
                true
            }
            None => false,
        }
    }

    /// Gold underfoot is collected on arrival; items wait for a pick-up.
    fn collect_ground_gold(&mut self) {
        let pos = self.player.position;
        let gold = match self.ground.get_mut(&pos) {
            Some(pile) if pile.gold > 0 => {
                let gold = pile.gold;
                pile.gold = 0;
                gold
            }
            _ => 0,
        };
        if gold > 0 {
            self.player.gold += gold;
            self.log_event(format!("You pick up {gold} gold."));
        }
        if self.ground.get(&pos).is_some_and(GroundPile::is_empty) {
            self.ground.remove(&pos);
        }
    }

    // ------------------------------------------------------------------
    // End of turn
    // ------------------------------------------------------------------

    fn end_turn(&mut self) {
        self.time += 1;
        self.player.regenerate_mana();

        for kind in self.player.effects.tick() {
            self.log_event(format!("{} effect wore off.", kind.name()));
        }

        if self.recall_active {
            self.recall_timer += 1;
            let remaining = config::RECALL_DELAY_TURNS.saturating_sub(self.recall_timer);
            if remaining == 0 {
                self.execute_recall();
            } else if remaining % 5 == 0 {
                self.log_event(format!("Recall in {remaining} turns..."));
            }
        }

        let carried = self.carried_weight();
        if self.player.is_overweight(carried)
            && self.time - self.last_overweight_warning >= config::OVERWEIGHT_WARNING_INTERVAL
        {
            let percent = self.player.overweight_percent(carried);
            self.log_event(format!("You are burdened by your load ({percent}% slower)."));
            self.last_overweight_warning = self.time;
        }

        if self.searching {
            self.search_timer += 1;
            if self.search_timer >= config::SEARCH_INTERVAL {
                self.search_timer = 0;
                self.perform_search(false);
            }
        }

        self.update_sleep_schedules();
        self.update_actors();
        self.update_fov();
    }

    /// Puts schedule sleepers down and wakes everyone out of their sleeping
    /// phase. A creature that has noticed the player stays awake.
    fn update_sleep_schedules(&mut self) {
        let time_of_day = self.time_of_day();
        for actor in &mut self.actors {
            let wants_sleep = match time_of_day {
                TimeOfDay::Day => actor.sleeps_during_day,
                TimeOfDay::Night => actor.sleeps_during_night,
            };
            if wants_sleep {
                if !actor.aware_of_player {
                    actor.naturally_asleep = true;
                }
            } else {
                actor.naturally_asleep = false;
            }
        }
    }

    /// One AI pass over a stable snapshot of actor ids. Clones spawned
    /// during the pass join the roster at the end; if the player dies, the
    /// rest of the pass is abandoned.
    fn update_actors(&mut self) {
        let ids: Vec<ActorId> = self.actors.iter().map(|actor| actor.id).collect();
        let mut occupied: HashSet<Position> = self
            .actors
            .iter()
            .filter(|actor| actor.is_alive())
            .map(|actor| actor.position)
            .collect();
        let mut pending_clones: Vec<Actor> = Vec::new();

        for id in ids {
            if self.is_game_over() {
                break;
            }
            let Some(idx) = self.live_actor_index(id) else { continue };

            // Creature effect expiry is silent.
            self.actors[idx].effects.tick();

            let asleep = self.actors[idx].is_asleep();
            if !asleep {
                self.try_clone(idx, &mut occupied, &mut pending_clones);
            }
            if asleep {
                continue;
            }

            // Morale break at a quarter health.
            let actor = &self.actors[idx];
            if actor.hostile
                && !actor.fear_immune
                && actor.hp * 4 < actor.max_hp
                && !actor.effects.has(EffectKind::Fleeing)
                && self.rng.gen_range(1..=100) <= actor.flee_chance as i32
            {
                self.actors[idx].effects.apply(EffectKind::Fleeing, 10);
                let name = self.actors[idx].name.clone();
                self.log_event(format!("{name} looks terrified and tries to flee!"));
            }

            // Creatures act on every second update.
            self.actors[idx].move_counter += 1;
            if self.actors[idx].move_counter < config::MOVE_COUNTER_THRESHOLD {
                continue;
            }
            self.actors[idx].move_counter = 0;

            let distance = self.actors[idx]
                .position
                .euclidean_distance(self.player.position);
            if matches!(self.actors[idx].behavior, AiBehavior::Aggressive | AiBehavior::Pack)
                && distance <= self.actors[idx].detection_range as f64
            {
                self.actors[idx].aware_of_player = true;
            }

            let pack_mates: Vec<Position> = match self.actors[idx].pack_id.clone() {
                Some(pack) => self
                    .actors
                    .iter()
                    .filter(|other| {
                        other.id != id
                            && other.is_alive()
                            && other.pack_id.as_deref() == Some(pack.as_str())
                    })
                    .map(|other| other.position)
                    .collect(),
                None => Vec::new(),
            };
            let context = AiContext {
                grid: &self.grid,
                player_position: self.player.position,
                player_gold: self.player.gold,
                occupied: &occupied,
                pack_mates: &pack_mates,
            };
            let decision = ai::decide(&self.actors[idx], &context, &mut self.rng);

            match decision {
                AiDecision::Wait => {}
                AiDecision::MoveTo(next) => {
                    occupied.remove(&self.actors[idx].position);
                    self.actors[idx].position = next;
                    occupied.insert(next);
                }
                AiDecision::Melee => self.creature_melee(idx),
                AiDecision::Ranged => self.creature_ranged(idx),
                AiDecision::Cast => self.creature_cast(idx),
                AiDecision::Steal => self.creature_steal(idx),
                AiDecision::Mingle => self.creature_mingle(idx),
            }
        }

        self.actors.append(&mut pending_clones);
    }

    /// Splitter roll. The split lands on a free adjacent floor tile and is
    /// only announced when that tile is currently visible.
    fn try_clone(
        &mut self,
        idx: usize,
        occupied: &mut HashSet<Position>,
        pending: &mut Vec<Actor>,
    ) {
        let rate = self.actors[idx].clone_rate;
        if rate <= 0.0 || !self.rng.gen_bool(rate.min(1.0)) {
            return;
        }
        let template_id = self.actors[idx].template_id.clone();
        let live = self
            .actors
            .iter()
            .filter(|actor| actor.is_alive() && actor.template_id == template_id)
            .count()
            + pending
                .iter()
                .filter(|actor| actor.template_id == template_id)
                .count();
        if live as u32 >= self.actors[idx].clone_cap {
            return;
        }
        let spots: Vec<Position> = self.actors[idx]
            .position
            .adjacent_positions()
            .into_iter()
            .filter(|&pos| {
                self.grid.tile(pos).is_some_and(TileKind::is_open_floor)
                    && !occupied.contains(&pos)
                    && pos != self.player.position
            })
            .collect();
        if spots.is_empty() {
            return;
        }
        let spot = spots[self.rng.gen_range(0..spots.len())];
        let level = self.actors[idx].level;
        let aware = self.actors[idx].aware_of_player;
        let mut clone = self
            .catalog
            .spawn_creature(&template_id, spot, level, &mut self.rng);
        clone.aware_of_player = aware;
        occupied.insert(spot);
        if self.visibility.get(spot) == Visibility::Visible {
            self.log_event(format!("{} splits and another appears!", clone.name));
        }
        pending.push(clone);
    }

    // ------------------------------------------------------------------
    // Creature actions
    // ------------------------------------------------------------------

    fn creature_melee(&mut self, idx: usize) {
        let in_darkness = self.tile_in_darkness(self.player.position);
        let to_hit = self.actors[idx].effective_attack();
        let base = (self.actors[idx].attack / 2).max(1);
        let damage = DamageRoll::Flat(base);
        let result = combat::strike(
            to_hit,
            self.player_armor_class(),
            &damage,
            in_darkness,
            &mut self.rng,
        );
        let name = self.actors[idx].name.clone();
        if !result.hit {
            self.log_event(format!("{name} misses."));
            return;
        }
        if result.critical {
            self.log_event(format!("Crit! {name} hits for {} dmg!", result.damage));
        } else {
            self.log_event(format!("{name} hits for {} dmg.", result.damage));
        }
        self.damage_player(result.damage);
    }

    fn creature_ranged(&mut self, idx: usize) {
        let Some(ranged) = self.actors[idx].ranged.clone() else { return };
        let in_darkness = self.tile_in_darkness(self.player.position);
        let damage = DamageRoll::Dice { dice: ranged.damage, bonus: 0 };
        let result = combat::strike(
            self.actors[idx].effective_attack(),
            self.player_armor_class(),
            &damage,
            in_darkness,
            &mut self.rng,
        );
        let name = self.actors[idx].name.clone();
        if !result.hit {
            self.log_event(format!("{name}'s {} misses!", ranged.name));
            return;
        }
        if result.critical {
            self.log_event(format!(
                "Crit! {name}'s {} hits for {} dmg!",
                ranged.name, result.damage
            ));
        } else {
            self.log_event(format!("{name}'s {} hits for {} dmg!", ranged.name, result.damage));
        }
        self.damage_player(result.damage);
    }

    fn creature_cast(&mut self, idx: usize) {
        let spells = self.actors[idx].spells.clone();
        if spells.is_empty() || self.actors[idx].mana < config::CREATURE_CAST_COST {
            return;
        }
        let spell_id = &spells[self.rng.gen_range(0..spells.len())];
        let Some(spell) = self.catalog.spell(spell_id).cloned() else { return };
        self.actors[idx].mana -= config::CREATURE_CAST_COST;
        let name = self.actors[idx].name.clone();
        match spell.effect {
            SpellEffect::Bolt { .. } | SpellEffect::AreaBolt { .. } => {
                let amount = self.rng.gen_range(3..=10);
                self.log_event(format!("{name} casts {}!", spell.name));
                self.log_event(format!("The spell hits you for {amount} damage!"));
                self.damage_player(amount);
            }
            SpellEffect::Heal { .. } => {
                let amount = self.rng.gen_range(5..=15);
                let healed = self.actors[idx].heal(amount);
                if healed > 0 {
                    self.log_event(format!("{name} casts {} and heals {healed} HP!", spell.name));
                }
            }
            _ => {
                self.log_event(format!("{name} casts {}!", spell.name));
            }
        }
    }

    /// An adjacent theft attempt. Success or not, the thief bolts.
    fn creature_steal(&mut self, idx: usize) {
        let name = self.actors[idx].name.clone();
        if self.player.gold > 0 && self.rng.gen_bool(0.5) {
            let stolen = self.rng.gen_range(1..=10u32).min(self.player.gold);
            self.player.gold -= stolen;
            self.log_event(format!("{name} steals {stolen} gold!"));
        } else {
            self.log_event(format!("{name} tries to steal from you but fails!"));
        }
        self.actors[idx].effects.apply(EffectKind::Fleeing, 20);
    }

    fn creature_mingle(&mut self, idx: usize) {
        let AiBehavior::Street(kind) = self.actors[idx].behavior else { return };
        let name = self.actors[idx].name.clone();
        match kind {
            StreetKind::Beggar => {
                if self.player.gold > 0 && self.rng.gen_bool(0.6) {
                    let stolen = self.rng.gen_range(1..=5u32).min(self.player.gold);
                    self.player.gold -= stolen;
                    self.log_event(format!("{name} snatches {stolen} gold!"));
                } else if self.player.gold > 0 {
                    self.log_event(format!("{name} pleads."));
                } else {
                    self.log_event(format!("{name} sighs."));
                }
            }
            StreetKind::Drunk => {
                let roll: f64 = self.rng.gen();
                if roll < 0.4 {
                    self.log_event(format!("{name} urges you to party."));
                } else if self.player.gold > 0 && roll < 0.8 {
                    self.log_event(format!("{name} asks for ale money."));
                } else {
                    self.log_event(format!("{name} sings."));
                }
            }
            StreetKind::Fool => {
                self.log_event(format!("{name} babbles."));
            }
        }
    }

    // ------------------------------------------------------------------
    // Light, searching, visibility
    // ------------------------------------------------------------------

    /// Light sources burn down one tick per step taken, not per turn.
    fn tick_light(&mut self) {
        if self.player.light_duration > 0 {
            self.player.light_duration -= 1;
            if self.player.light_duration == 0 {
                self.player.light_radius = self.player.base_light_radius;
                self.log_event("Your light source has expired!");
            }
        }
    }

    /// Reveals undiscovered secret doors in the eight surrounding tiles.
    /// Automatic sweeps stay quiet when they find nothing.
    fn perform_search(&mut self, manual: bool) {
        let mut found = 0;
        for pos in self.player.position.adjacent_positions() {
            if self.grid.tile(pos) == Some(TileKind::SecretDoor) {
                self.grid.set_tile(pos, TileKind::SecretDoorFound);
                found += 1;
            }
        }
        if found == 1 {
            self.log_event("Found a secret door!");
        } else if found > 1 {
            self.log_event(format!("Found {found} secret door(s)!"));
        } else if manual {
            self.log_event("Find nothing.");
        }
        if found > 0 {
            self.update_fov();
        }
    }

    /// Recomputes fog-of-war. Daytime town is fully lit; town nights keep
    /// the street plan remembered.
    fn update_fov(&mut self) {
        if self.depth == 0 {
            match self.time_of_day() {
                TimeOfDay::Day => {
                    self.visibility.reveal_all();
                }
                TimeOfDay::Night => {
                    fov::update_visibility(
                        &mut self.visibility,
                        &self.grid,
                        self.player.position,
                        self.player.light_radius,
                    );
                    self.visibility.remember_walls(&self.grid);
                }
            }
            return;
        }
        fov::update_visibility(
            &mut self.visibility,
            &self.grid,
            self.player.position,
            self.player.light_radius,
        );
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn grant_xp(&mut self, amount: u64) {
        if self.player.gain_xp(amount) > 0 {
            self.log_event("You feel more experienced!");
        }
    }

    fn live_actor_index(&self, id: ActorId) -> Option<usize> {
        self.actors
            .iter()
            .position(|actor| actor.id == id && actor.is_alive())
    }

    fn actor_index_at(&self, pos: Position) -> Option<usize> {
        self.actors
            .iter()
            .position(|actor| actor.is_alive() && actor.position == pos)
    }

    fn log_event(&mut self, message: impl Into<String>) {
        if self.log.len() == config::EVENT_LOG_CAP {
            self.log.pop_front();
        }
        self.log.push_back(message.into());
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Composes a plain-text frame: terrain under remembered fog, ground
    /// piles and creatures where visible, the player on top.
    pub fn render_rows(&self) -> Vec<String> {
        let mut rows: Vec<Vec<char>> = (0..self.grid.height as i32)
            .map(|y| {
                (0..self.grid.width as i32)
                    .map(|x| {
                        let pos = Position::new(x, y);
                        match self.visibility.get(pos) {
                            Visibility::Unseen => ' ',
                            _ => self.grid.tile(pos).map_or(' ', TileKind::symbol),
                        }
                    })
                    .collect()
            })
            .collect();

        for (pos, pile) in &self.ground {
            if self.visibility.get(*pos) == Visibility::Visible {
                rows[pos.y as usize][pos.x as usize] = if pile.gold > 0 { '$' } else { '*' };
            }
        }
        for actor in &self.actors {
            if actor.is_alive() && self.visibility.get(actor.position) == Visibility::Visible {
                rows[actor.position.y as usize][actor.position.x as usize] = actor.glyph;
            }
        }
        let player = self.player.position;
        if self.grid.in_bounds(player) {
            rows[player.y as usize][player.x as usize] = '@';
        }
        rows.into_iter().map(|row| row.into_iter().collect()).collect()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Snapshots the session as plain data.
    pub fn export(&self) -> SessionState {
        SessionState {
            depth: self.depth,
            time: self.time,
            seed: self.seed,
            grid: self.grid.clone(),
            visibility: self.visibility.clone(),
            player: self.player.clone(),
            actors: self.actors.clone(),
            ground: self
                .ground
                .iter()
                .map(|(pos, pile)| (*pos, pile.clone()))
                .collect(),
            log: self.log.iter().cloned().collect(),
            recall_active: self.recall_active,
            recall_timer: self.recall_timer,
            recall_depth: self.recall_depth,
            pending_travel: self.pending_travel,
            searching: self.searching,
            search_timer: self.search_timer,
            last_overweight_warning: self.last_overweight_warning,
        }
    }

    /// Rebuilds a session from a snapshot and a catalog handle.
    ///
    /// Snapshot positions are not trusted: anyone standing out of bounds or
    /// inside rock is recentered onto the nearest legal tile, with a warning,
    /// rather than poisoning every later pass.
    pub fn import(state: SessionState, catalog: Arc<ContentCatalog>) -> Self {
        let mut session = Self {
            catalog,
            depth: state.depth,
            time: state.time,
            seed: state.seed,
            rng: StdRng::seed_from_u64(state.seed),
            grid: state.grid,
            visibility: state.visibility,
            player: state.player,
            actors: state.actors,
            ground: state.ground.into_iter().collect(),
            log: VecDeque::from(state.log),
            recall_active: state.recall_active,
            recall_timer: state.recall_timer,
            recall_depth: state.recall_depth,
            pending_travel: state.pending_travel,
            searching: state.searching,
            search_timer: state.search_timer,
            last_overweight_warning: state.last_overweight_warning,
        };
        session.normalize_positions();
        session
    }

    /// Recenters any imported actor or player standing on an illegal tile.
    fn normalize_positions(&mut self) {
        let mut corrected = false;
        if !self
            .grid
            .tile(self.player.position)
            .is_some_and(TileKind::is_walkable)
        {
            if let Some(fixed) = self.nearest_legal_tile(self.player.position, true) {
                log::warn!(
                    "player stood on an illegal tile ({}, {}), recentered to ({}, {})",
                    self.player.position.x,
                    self.player.position.y,
                    fixed.x,
                    fixed.y
                );
                self.player.position = fixed;
                corrected = true;
            }
        }
        for idx in 0..self.actors.len() {
            let pos = self.actors[idx].position;
            if self.grid.tile(pos).is_some_and(TileKind::is_open_floor) {
                continue;
            }
            if let Some(fixed) = self.nearest_legal_tile(pos, false) {
                log::warn!(
                    "{} stood on an illegal tile ({}, {}), recentered to ({}, {})",
                    self.actors[idx].name,
                    pos.x,
                    pos.y,
                    fixed.x,
                    fixed.y
                );
                self.actors[idx].position = fixed;
                corrected = true;
            }
        }
        if corrected {
            self.update_fov();
        }
    }

    /// The unoccupied legal tile closest to `origin` by Manhattan distance.
    /// Players may stand on any walkable tile; creatures only on open floor.
    fn nearest_legal_tile(&self, origin: Position, for_player: bool) -> Option<Position> {
        let clamped = Position::new(
            origin.x.clamp(0, self.grid.width as i32 - 1),
            origin.y.clamp(0, self.grid.height as i32 - 1),
        );
        self.grid
            .positions()
            .filter(|&pos| {
                let legal = self.grid.tile(pos).is_some_and(if for_player {
                    TileKind::is_walkable
                } else {
                    TileKind::is_open_floor
                });
                legal
                    && self.actor_index_at(pos).is_none()
                    && (for_player || pos != self.player.position)
            })
            .min_by_key(|pos| pos.manhattan_distance(clamped))
    }

    /// Serializes the session snapshot to pretty JSON.
    pub fn to_json(&self) -> WarrenResult<String> {
        serde_json::to_string_pretty(&self.export()).map_err(WarrenError::from)
    }

    /// Deserializes a session from JSON produced by [`Self::to_json`].
    pub fn from_json(json: &str, catalog: Arc<ContentCatalog>) -> WarrenResult<Self> {
        let state: SessionState = serde_json::from_str(json).map_err(WarrenError::from)?;
        Ok(Self::import(state, catalog))
    }

    /// Writes the session snapshot to a file.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn save_to_file(&self, path: &Path) -> WarrenResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a session snapshot back from a file.
    pub fn load_from_file(path: &Path, catalog: Arc<ContentCatalog>) -> WarrenResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActorTemplate, ClassKind};

    /// A lit room: floor from (1,1) to (10,8) inside a wall border, the
    /// player standing at (5,5).
    fn test_session_with(catalog: Arc<ContentCatalog>, depth: i32) -> LevelSession {
        let mut grid = MapGrid::new(12, 10, TileKind::Wall);
        for y in 1..9 {
            for x in 1..11 {
                grid.set_tile(Position::new(x, y), TileKind::Floor);
            }
        }
        let mut player = Player::new("Tess", ClassKind::Warrior);
        player.position = Position::new(5, 5);
        let mut session = LevelSession {
            catalog,
            depth,
            time: 0,
            seed: 7,
            rng: StdRng::seed_from_u64(7),
            grid,
            visibility: VisibilityGrid::new(12, 10),
            player,
            actors: Vec::new(),
            ground: BTreeMap::new(),
            log: VecDeque::new(),
            recall_active: false,
            recall_timer: 0,
            recall_depth: 0,
            pending_travel: None,
            searching: false,
            search_timer: 0,
            last_overweight_warning: 0,
        };
        session.update_fov();
        session
    }

    fn test_session() -> LevelSession {
        test_session_with(Arc::new(ContentCatalog::builtin()), 1)
    }

    fn log_contains(session: &LevelSession, needle: &str) -> bool {
        session.log().iter().any(|line| line.contains(needle))
    }

    #[test]
    fn test_wait_advances_time() {
        let mut session = test_session();
        let outcome = session.execute(Command::Wait);
        assert!(outcome.consumed);
        assert_eq!(session.time(), 1);
    }

    #[test]
    fn test_move_into_wall_costs_nothing() {
        let mut session = test_session();
        session.player.position = Position::new(1, 1);
        let outcome = session.execute(Command::Move { dx: -1, dy: 0 });
        assert!(!outcome.consumed);
        assert!(outcome.reason.is_some());
        assert_eq!(session.time(), 0);
        assert_eq!(session.player().position, Position::new(1, 1));
    }

    #[test]
    fn test_move_collects_gold_underfoot() {
        let mut session = test_session();
        session
            .ground
            .insert(Position::new(6, 5), GroundPile { gold: 25, items: Vec::new() });
        let outcome = session.execute(Command::Move { dx: 1, dy: 0 });
        assert!(outcome.consumed);
        assert_eq!(session.player().position, Position::new(6, 5));
        assert_eq!(session.player().gold, 25);
        assert!(session.ground().is_empty());
        assert!(log_contains(&session, "You pick up 25 gold."));
    }

    #[test]
    fn test_bump_attack_resolves_one_swing() {
        let mut session = test_session();
        let id = session.spawn_actor("giant_rat", Position::new(6, 5), 1);
        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].aware_of_player = true;

        let outcome = session.execute(Command::Move { dx: 1, dy: 0 });
        assert!(outcome.consumed);
        assert_eq!(session.player().position, Position::new(5, 5));
        let swings = session
            .log()
            .iter()
            .filter(|line| {
                line.starts_with("Hit ")
                    || line.starts_with("Crit! Hit ")
                    || line.starts_with("You miss ")
            })
            .count();
        assert_eq!(swings, 1);
    }

    #[test]
    fn test_bump_into_nonhostile_is_blocked() {
        let mut session = test_session();
        session.spawn_actor("beggar", Position::new(6, 5), 1);
        let outcome = session.execute(Command::Move { dx: 1, dy: 0 });
        assert!(!outcome.consumed);
        assert_eq!(outcome.reason.as_deref(), Some("beggar is in the way."));
        assert_eq!(session.time(), 0);
        assert_eq!(session.player().position, Position::new(5, 5));
    }

    #[test]
    fn test_attacking_sleeper_wakes_it_and_strikes() {
        let mut session = test_session();
        let id = session.spawn_actor("skeleton", Position::new(6, 5), 1);
        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].naturally_asleep = true;

        let outcome = session.execute(Command::Attack { target: id });
        assert!(outcome.consumed);
        assert!(log_contains(&session, "You wake up skeleton!"));
        let actor = session.actor(id).unwrap();
        assert!(!actor.naturally_asleep);
        assert!(actor.aware_of_player);
        // The wake does not eat the action: the swing resolves right after.
        let swings = session
            .log()
            .iter()
            .filter(|line| {
                line.starts_with("Hit skeleton")
                    || line.starts_with("Crit! Hit skeleton")
                    || line.starts_with("You miss skeleton")
                    || line.starts_with("skeleton defeated")
            })
            .count();
        assert!(swings >= 1);
    }

    #[test]
    fn test_attack_out_of_reach_costs_nothing() {
        let mut session = test_session();
        let id = session.spawn_actor("giant_rat", Position::new(9, 5), 1);
        let outcome = session.execute(Command::Attack { target: id });
        assert!(!outcome.consumed);
        assert_eq!(outcome.reason.as_deref(), Some("Too far away to attack."));
        assert_eq!(session.time(), 0);
    }

    #[test]
    fn test_open_and_close_door() {
        let mut session = test_session();
        let door = Position::new(6, 5);
        session.grid.set_tile(door, TileKind::DoorClosed);

        let outcome = session.execute(Command::OpenDoor);
        assert!(outcome.consumed);
        assert_eq!(session.grid().tile(door), Some(TileKind::DoorOpen));
        assert!(log_contains(&session, "Opened door."));

        let outcome = session.execute(Command::CloseDoor);
        assert!(outcome.consumed);
        assert_eq!(session.grid().tile(door), Some(TileKind::DoorClosed));
        assert!(log_contains(&session, "Closed door."));
    }

    #[test]
    fn test_bump_opens_closed_door() {
        let mut session = test_session();
        let door = Position::new(6, 5);
        session.grid.set_tile(door, TileKind::DoorClosed);
        let outcome = session.execute(Command::Move { dx: 1, dy: 0 });
        assert!(outcome.consumed);
        assert_eq!(session.grid().tile(door), Some(TileKind::DoorOpen));
        assert_eq!(session.player().position, Position::new(5, 5));
        assert!(log_contains(&session, "You open the door."));
    }

    #[test]
    fn test_dig_through_adjacent_rock() {
        let mut session = test_session();
        session.player.position = Position::new(1, 1);
        let outcome = session.execute(Command::Dig);
        assert!(outcome.consumed);
        assert_eq!(session.grid().tile(Position::new(1, 0)), Some(TileKind::Floor));
        assert!(log_contains(&session, "Dug through rock."));
    }

    #[test]
    fn test_dig_with_no_rock_costs_nothing() {
        let mut session = test_session();
        let outcome = session.execute(Command::Dig);
        assert!(!outcome.consumed);
        assert_eq!(session.time(), 0);
    }

    #[test]
    fn test_manual_search_reveals_secret_door() {
        let mut session = test_session();
        let secret = Position::new(6, 6);
        session.grid.set_tile(secret, TileKind::SecretDoor);
        let outcome = session.execute(Command::Search);
        assert!(outcome.consumed);
        assert_eq!(session.grid().tile(secret), Some(TileKind::SecretDoorFound));
        assert!(log_contains(&session, "Found a secret door!"));
    }

    #[test]
    fn test_manual_search_reports_nothing() {
        let mut session = test_session();
        let outcome = session.execute(Command::Search);
        assert!(outcome.consumed);
        assert!(log_contains(&session, "Find nothing."));
    }

    #[test]
    fn test_search_mode_sweeps_every_third_turn() {
        let mut session = test_session();
        let secret = Position::new(6, 6);
        session.grid.set_tile(secret, TileKind::SecretDoor);

        let outcome = session.execute(Command::ToggleSearch);
        assert!(!outcome.consumed);
        assert!(session.is_searching());
        assert_eq!(session.time(), 0);

        session.execute(Command::Wait);
        session.execute(Command::Wait);
        assert_eq!(session.grid().tile(secret), Some(TileKind::SecretDoor));
        session.execute(Command::Wait);
        assert_eq!(session.grid().tile(secret), Some(TileKind::SecretDoorFound));
    }

    #[test]
    fn test_pickup_and_drop_round_trip() {
        let mut session = test_session();
        let here = Position::new(5, 5);
        session.ground.insert(
            here,
            GroundPile { gold: 0, items: vec!["dry_ration".to_string()] },
        );

        let outcome = session.execute(Command::PickUp);
        assert!(outcome.consumed);
        assert_eq!(session.player().inventory, vec!["dry_ration".to_string()]);
        assert!(session.ground().is_empty());
        assert!(log_contains(&session, "You pick up Dry Ration."));

        let outcome = session.execute(Command::DropItem { index: 0 });
        assert!(outcome.consumed);
        assert!(session.player().inventory.is_empty());
        assert_eq!(
            session.ground().get(&here).map(|pile| pile.items.clone()),
            Some(vec!["dry_ration".to_string()])
        );
        assert!(log_contains(&session, "You drop Dry Ration."));
    }

    #[test]
    fn test_pickup_with_nothing_underfoot() {
        let mut session = test_session();
        let outcome = session.execute(Command::PickUp);
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "There is nothing here to pick up."));
    }

    #[test]
    fn test_full_backpack_blocks_pickup() {
        let mut session = test_session();
        session.player.inventory = vec!["dry_ration".to_string(); config::INVENTORY_CAP];
        session.ground.insert(
            Position::new(5, 5),
            GroundPile { gold: 0, items: vec!["torch".to_string()] },
        );
        let outcome = session.execute(Command::PickUp);
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "Your backpack is full (22 item limit)."));
        assert_eq!(session.player().inventory.len(), config::INVENTORY_CAP);
    }

    #[test]
    fn test_weight_limit_blocks_pickup() {
        let mut catalog = ContentCatalog::builtin();
        catalog.add_item(ItemTemplate {
            weight: 10_000,
            ..ItemTemplate::new("anvil", "Iron Anvil", ItemKind::Misc)
        });
        let mut session = test_session_with(Arc::new(catalog), 1);
        session.ground.insert(
            Position::new(5, 5),
            GroundPile { gold: 0, items: vec!["anvil".to_string()] },
        );
        let outcome = session.execute(Command::PickUp);
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "over your weight limit (10000/4000)."));
        assert!(session.player().inventory.is_empty());
    }

    #[test]
    fn test_equip_light_source_raises_radius() {
        let mut session = test_session();
        session.player.inventory.push("torch".to_string());
        let base = session.player().base_light_radius;

        let outcome = session.execute(Command::Equip { index: 0 });
        assert!(outcome.consumed);
        assert!(log_contains(&session, "Equipped Torch"));
        assert_eq!(session.player().light_radius, 5);
        assert_eq!(session.player().light_duration, 100);
        assert!(session.player().light_radius > base);

        let outcome = session.execute(Command::Unequip { slot: EquipSlot::Light });
        assert!(outcome.consumed);
        assert!(log_contains(&session, "Unequipped Torch"));
        assert_eq!(session.player().light_radius, base);
        assert_eq!(session.player().light_duration, 0);
        assert_eq!(session.player().inventory, vec!["torch".to_string()]);
    }

    #[test]
    fn test_equip_swaps_occupied_slot() {
        let mut session = test_session();
        session.player.inventory =
            vec!["rusty_dagger".to_string(), "short_sword".to_string()];
        session.execute(Command::Equip { index: 0 });
        session.execute(Command::Equip { index: 0 });
        assert_eq!(
            session.player().equipment.get(EquipSlot::Weapon),
            Some(&"short_sword".to_string())
        );
        assert_eq!(session.player().inventory, vec!["rusty_dagger".to_string()]);
    }

    #[test]
    fn test_healing_potion_heals_and_is_consumed() {
        let mut session = test_session();
        session.player.hp = 1;
        session.player.inventory.push("healing_draught".to_string());
        let outcome = session.execute(Command::UseItem { index: 0 });
        assert!(outcome.consumed);
        assert!(session.player().hp > 1);
        assert!(session.player().inventory.is_empty());
        assert!(log_contains(&session, "You drink Healing Draught."));
    }

    #[test]
    fn test_unusable_item_costs_nothing() {
        let mut session = test_session();
        session.player.inventory.push("rusty_dagger".to_string());
        let outcome = session.execute(Command::UseItem { index: 0 });
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "You can't use Rusty Dagger that way."));
        assert_eq!(session.player().inventory.len(), 1);
    }

    #[test]
    fn test_cast_unknown_spell_costs_nothing() {
        let mut session = test_session();
        let outcome = session.execute(Command::CastSpell {
            spell: "meteor_swarm".to_string(),
            target: None,
        });
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "Unknown spell."));
    }

    #[test]
    fn test_cast_unlearned_spell_costs_nothing() {
        let mut session = test_session();
        let outcome = session.execute(Command::CastSpell {
            spell: "spark".to_string(),
            target: None,
        });
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "You don't know that spell."));
    }

    #[test]
    fn test_noncaster_cannot_cast() {
        let mut session = test_session();
        session.player.known_spells.push("spark".to_string());
        let outcome = session.execute(Command::CastSpell {
            spell: "spark".to_string(),
            target: None,
        });
        assert!(!outcome.consumed);
        assert!(log_contains(&session, "Your class cannot cast Spark."));
        assert_eq!(session.player().mana, session.player().max_mana);
    }

    #[test]
    fn test_cast_consumes_turn_and_mana_either_way() {
        let mut session = test_session();
        let mut player = Player::new("Imris", ClassKind::Mage);
        player.position = Position::new(5, 5);
        player.known_spells.push("spark".to_string());
        session.player = player;
        assert!(session.player().mana >= 3);

        let outcome = session.execute(Command::CastSpell {
            spell: "spark".to_string(),
            target: None,
        });
        assert!(outcome.consumed);
        assert_eq!(session.time(), 1);
        assert!(
            log_contains(&session, "You cast Spark!")
                || log_contains(&session, "You failed to cast Spark!")
        );
    }

    #[test]
    fn test_bolt_effect_damages_target() {
        let mut session = test_session();
        let id = session.spawn_actor("skeleton", Position::new(6, 5), 3);
        let hp_before = session.actor(id).unwrap().hp;
        let spell = session.catalog().spell("spark").unwrap().clone();
        session.apply_spell_effect(&spell, Some(id));
        let hp_after = session.actor(id).map_or(0, |actor| actor.hp);
        assert!(hp_after < hp_before);
        assert!(log_contains(&session, "spell damage!"));
    }

    #[test]
    fn test_bolt_without_target_fizzles() {
        let mut session = test_session();
        let spell = session.catalog().spell("spark").unwrap().clone();
        session.apply_spell_effect(&spell, None);
        assert!(log_contains(&session, "Spark fizzles."));
    }

    #[test]
    fn test_area_bolt_in_empty_room_echoes() {
        let mut session = test_session();
        let spell = session.catalog().spell("ember_burst").unwrap().clone();
        session.apply_spell_effect(&spell, None);
        assert!(log_contains(&session, "Ember Burst echoes through the empty dungeon."));
    }

    #[test]
    fn test_cleanse_removes_named_effect() {
        let mut session = test_session();
        session.player.effects.apply(EffectKind::Poisoned, 10);
        let spell = session.catalog().spell("purify").unwrap().clone();
        session.apply_spell_effect(&spell, None);
        assert!(!session.player().effects.has(EffectKind::Poisoned));
        assert!(log_contains(&session, "The Poison effect is removed!"));

        session.apply_spell_effect(&spell, None);
        assert!(log_contains(&session, "You don't have the Poison effect."));
    }

    #[test]
    fn test_recall_fires_after_twenty_turns() {
        let mut session = test_session();
        let spell = session.catalog().spell("word_of_recall").unwrap().clone();
        session.apply_spell_effect(&spell, None);
        assert!(session.is_recalling());
        assert!(log_contains(&session, "You begin to recall to the surface..."));

        for _ in 0..19 {
            session.execute(Command::Wait);
        }
        assert!(session.is_recalling());
        assert!(log_contains(&session, "Recall in 5 turns..."));

        session.execute(Command::Wait);
        assert!(!session.is_recalling());
        assert_eq!(session.pending_travel(), Some(0));
        assert!(log_contains(&session, "You are recalled! (Target depth: 0)"));
    }

    #[test]
    fn test_recall_in_unvisited_town_refuses() {
        let mut session = test_session_with(Arc::new(ContentCatalog::builtin()), 0);
        let spell = session.catalog().spell("word_of_recall").unwrap().clone();
        session.apply_spell_effect(&spell, None);
        assert!(!session.is_recalling());
        assert!(log_contains(&session, "You have not visited the dungeon yet!"));
    }

    #[test]
    fn test_fear_immune_never_breaks() {
        let mut session = test_session();
        let id = session.spawn_actor("skeleton", Position::new(9, 2), 1);
        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].aware_of_player = true;
        session.actors[idx].hp = 1;
        for _ in 0..30 {
            session.execute(Command::Wait);
        }
        assert!(!log_contains(&session, "looks terrified"));
    }

    #[test]
    fn test_wounded_creature_breaks_at_quarter_health() {
        let mut catalog = ContentCatalog::builtin();
        catalog.add_creature(ActorTemplate {
            hostile: true,
            behavior: AiBehavior::Aggressive,
            hp_base: 20,
            flee_chance: 100,
            ..ActorTemplate::new("craven_rat", "craven rat", 'r')
        });
        let mut session = test_session_with(Arc::new(catalog), 1);
        let id = session.spawn_actor("craven_rat", Position::new(8, 3), 1);
        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].aware_of_player = true;

        // Above the quarter-health threshold nothing happens.
        session.execute(Command::Wait);
        assert!(!session.actor(id).unwrap().effects.has(EffectKind::Fleeing));

        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].hp = 4;
        session.execute(Command::Wait);
        assert!(session.actor(id).unwrap().effects.has(EffectKind::Fleeing));
        assert!(log_contains(&session, "craven rat looks terrified and tries to flee!"));
    }

    #[test]
    fn test_thief_adjacent_attempts_theft_and_flees() {
        let mut session = test_session();
        session.player.gold = 100;
        let id = session.spawn_actor("cutpurse", Position::new(6, 5), 1);
        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].move_counter = 1;

        session.execute(Command::Wait);
        assert!(
            log_contains(&session, "steals") || log_contains(&session, "tries to steal")
        );
        assert!(session.actor(id).unwrap().effects.has(EffectKind::Fleeing));
        assert!(session.player().gold <= 100);
    }

    #[test]
    fn test_surviving_thief_turns_hostile() {
        let mut session = test_session();
        let id = session.spawn_actor("cutpurse", Position::new(6, 5), 1);
        let idx = session.live_actor_index(id).unwrap();
        session.actors[idx].hp = 50;
        session.actors[idx].max_hp = 50;
        assert!(!session.actor(id).unwrap().hostile);

        // Swing until a hit lands; the thief may bolt between misses, so
        // keep the player adjacent.
        let mut swings = 0;
        while !session.actor(id).unwrap().hostile {
            let thief = session.actor(id).unwrap().position;
            session.player.position = Position::new(thief.x - 1, thief.y);
            session.execute(Command::Attack { target: id });
            swings += 1;
            assert!(swings < 50, "no swing ever landed");
        }

        let thief = session.actor(id).unwrap();
        assert_eq!(thief.behavior, AiBehavior::Aggressive);
        assert!(log_contains(&session, "cutpurse becomes hostile!"));
    }

    #[test]
    fn test_splitter_clones_up_to_cap() {
        let mut catalog = ContentCatalog::builtin();
        catalog.add_creature(ActorTemplate {
            clone_rate: 1.0,
            clone_cap: 3,
            ..ActorTemplate::new("mitosis_blob", "mitosis blob", 'b')
        });
        let mut session = test_session_with(Arc::new(catalog), 1);
        session.player.light_radius = 8;
        session.update_fov();
        session.spawn_actor("mitosis_blob", Position::new(8, 3), 1);

        for _ in 0..10 {
            session.execute(Command::Wait);
        }
        let blobs = session
            .actors()
            .iter()
            .filter(|actor| actor.template_id == "mitosis_blob")
            .count();
        assert_eq!(blobs, 3);
        assert!(log_contains(&session, "splits and another appears!"));
    }

    #[test]
    fn test_town_daylight_reveals_everything() {
        let mut session = test_session_with(Arc::new(ContentCatalog::builtin()), 0);
        let total = (session.grid().width * session.grid().height) as usize;
        assert_eq!(session.visibility().count(Visibility::Visible), total);

        session.time = 150;
        session.update_fov();
        assert!(session.visibility().count(Visibility::Visible) < total);
    }

    #[test]
    fn test_overweight_warning_on_cooldown() {
        let mut catalog = ContentCatalog::builtin();
        catalog.add_item(ItemTemplate {
            weight: 10_000,
            ..ItemTemplate::new("anvil", "Iron Anvil", ItemKind::Misc)
        });
        let mut session = test_session_with(Arc::new(catalog), 1);
        session.player.inventory.push("anvil".to_string());

        for _ in 0..49 {
            session.execute(Command::Wait);
        }
        assert!(!log_contains(&session, "burdened"));
        session.execute(Command::Wait);
        assert!(log_contains(&session, "You are burdened by your load"));
    }

    #[test]
    fn test_commands_after_death_are_ignored() {
        let mut session = test_session();
        session.player.hp = 0;
        let outcome = session.execute(Command::Wait);
        assert!(!outcome.consumed);
        assert_eq!(outcome.reason.as_deref(), Some("You are dead."));
    }

    #[test]
    fn test_event_log_stays_bounded() {
        let mut session = test_session();
        for turn in 0..(config::EVENT_LOG_CAP + 25) {
            session.log_event(format!("entry {turn}"));
        }
        assert_eq!(session.log().len(), config::EVENT_LOG_CAP);
        assert_eq!(session.log().front().map(String::as_str), Some("entry 25"));
    }

    #[test]
    fn test_render_rows_places_player_glyph() {
        let session = test_session();
        let rows = session.render_rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[5].chars().nth(5), Some('@'));
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let mut session = test_session();
        session.spawn_actor("giant_rat", Position::new(7, 4), 2);
        session.ground.insert(
            Position::new(3, 3),
            GroundPile { gold: 12, items: vec!["torch".to_string()] },
        );
        session.execute(Command::Wait);

        let json = session.to_json().unwrap();
        let restored =
            LevelSession::from_json(&json, Arc::new(ContentCatalog::builtin())).unwrap();
        assert_eq!(restored.depth(), session.depth());
        assert_eq!(restored.time(), session.time());
        assert_eq!(restored.seed(), session.seed());
        assert_eq!(restored.player().position, session.player().position);
        assert_eq!(restored.actors().len(), session.actors().len());
        assert_eq!(restored.ground(), session.ground());
        assert_eq!(restored.log(), session.log());
    }

    #[test]
    fn test_import_recenters_illegal_positions() {
        let mut session = test_session();
        let id = session.spawn_actor("giant_rat", Position::new(7, 4), 1);
        let mut state = session.export();
        state.player.position = Position::new(500, 500);
        if let Some(actor) = state.actors.iter_mut().find(|actor| actor.id == id) {
            actor.position = Position::new(0, 0); // border wall
        }

        let restored = LevelSession::import(state, Arc::new(ContentCatalog::builtin()));
        let player = restored.player().position;
        assert!(restored.grid().in_bounds(player));
        assert!(restored.grid().tile(player).is_some_and(TileKind::is_walkable));
        assert_eq!(restored.visibility().get(player), Visibility::Visible);

        let rat = restored.actor(id).unwrap().position;
        assert!(restored.grid().tile(rat).is_some_and(TileKind::is_open_floor));
        assert_ne!(rat, player);
    }

    #[test]
    fn test_save_and_load_file() {
        let mut session = test_session();
        session.execute(Command::Wait);
        let file = tempfile::NamedTempFile::new().unwrap();
        session.save_to_file(file.path()).unwrap();
        let restored =
            LevelSession::load_from_file(file.path(), Arc::new(ContentCatalog::builtin()))
                .unwrap();
        assert_eq!(restored.time(), 1);
    }
}
