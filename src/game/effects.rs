//! Time-limited status effects and the behavior overrides they impose.
//!
//! Every effect is a closed enum variant with a fixed stat/behavior payload,
//! so the turn engine can match on them exhaustively. An actor owns its
//! effects outright in an [`EffectSet`]; nothing else holds references to
//! them.

use serde::{Deserialize, Serialize};

/// Transient state that preempts an actor's normal behavior for as long as
/// the causing effect lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorOverride {
    /// No action at all; the actor is skipped.
    Asleep,
    /// No action at all, but the actor counts as awake.
    Paralyzed,
    /// Runs from its target instead of following its behavior tag.
    Fleeing,
    /// Staggers one random step instead of acting deliberately.
    Confused,
}

/// Identity of a status effect, with its whole mechanical payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Blessed,
    Hasted,
    Protected,
    Slowed,
    Fleeing,
    Asleep,
    Fear,
    Cursed,
    Confused,
    Blind,
    Paralyzed,
    Poisoned,
}

impl EffectKind {
    /// Display name used in event-log lines.
    pub const fn name(self) -> &'static str {
        match self {
            EffectKind::Blessed => "Blessed",
            EffectKind::Hasted => "Hasted",
            EffectKind::Protected => "Protected",
            EffectKind::Slowed => "Slowed",
            EffectKind::Fleeing => "Fleeing",
            EffectKind::Asleep => "Asleep",
            EffectKind::Fear => "Fear",
            EffectKind::Cursed => "Cursed",
            EffectKind::Confused => "Confused",
            EffectKind::Blind => "Blindness",
            EffectKind::Paralyzed => "Paralysis",
            EffectKind::Poisoned => "Poison",
        }
    }

    /// Flat to-hit delta while the effect is active.
    pub const fn attack_modifier(self) -> i32 {
        match self {
            EffectKind::Blessed => 2,
            EffectKind::Fear => -2,
            EffectKind::Cursed => -3,
            EffectKind::Confused => -2,
            EffectKind::Blind => -4,
            _ => 0,
        }
    }

    /// Flat defense delta while the effect is active.
    pub const fn defense_modifier(self) -> i32 {
        match self {
            EffectKind::Blessed => 5,
            EffectKind::Protected => 3,
            EffectKind::Fear => -2,
            EffectKind::Cursed => -3,
            EffectKind::Blind => -4,
            _ => 0,
        }
    }

    /// Flat speed delta while the effect is active.
    pub const fn speed_modifier(self) -> i32 {
        match self {
            EffectKind::Hasted => 2,
            EffectKind::Slowed => -2,
            _ => 0,
        }
    }

    /// Behavior override imposed by this effect, if any.
    pub const fn behavior(self) -> Option<BehaviorOverride> {
        match self {
            EffectKind::Asleep => Some(BehaviorOverride::Asleep),
            EffectKind::Paralyzed => Some(BehaviorOverride::Paralyzed),
            EffectKind::Fleeing => Some(BehaviorOverride::Fleeing),
            EffectKind::Confused => Some(BehaviorOverride::Confused),
            _ => None,
        }
    }
}

/// One effect attached to an actor, counting down in whole turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub kind: EffectKind,
    pub remaining: u32,
}

/// The set of effects currently on one actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectSet {
    effects: Vec<ActiveEffect>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an effect for `duration` turns. Reapplying keeps the longer of
    /// the old and new remaining durations. Returns true when the effect was
    /// not previously present.
    pub fn apply(&mut self, kind: EffectKind, duration: u32) -> bool {
        if duration == 0 {
            return false;
        }
        if let Some(existing) = self.effects.iter_mut().find(|e| e.kind == kind) {
            existing.remaining = existing.remaining.max(duration);
            false
        } else {
            self.effects.push(ActiveEffect { kind, remaining: duration });
            true
        }
    }

    /// Counts one turn off every effect, removing and returning the kinds
    /// that just expired, in application order.
    pub fn tick(&mut self) -> Vec<EffectKind> {
        let mut expired = Vec::new();
        for effect in &mut self.effects {
            effect.remaining = effect.remaining.saturating_sub(1);
            if effect.remaining == 0 {
                expired.push(effect.kind);
            }
        }
        self.effects.retain(|e| e.remaining > 0);
        expired
    }

    pub fn has(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    /// Removes the effect outright; true when it was present.
    pub fn remove(&mut self, kind: EffectKind) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.kind != kind);
        self.effects.len() != before
    }

    /// Remaining duration of an effect, zero when absent.
    pub fn remaining(&self, kind: EffectKind) -> u32 {
        self.effects
            .iter()
            .find(|e| e.kind == kind)
            .map_or(0, |e| e.remaining)
    }

    pub fn attack_modifier(&self) -> i32 {
        self.effects.iter().map(|e| e.kind.attack_modifier()).sum()
    }

    pub fn defense_modifier(&self) -> i32 {
        self.effects.iter().map(|e| e.kind.defense_modifier()).sum()
    }

    pub fn speed_modifier(&self) -> i32 {
        self.effects.iter().map(|e| e.kind.speed_modifier()).sum()
    }

    /// The single override in force, by severity: sleep beats paralysis
    /// beats flight beats confusion.
    pub fn behavior_override(&self) -> Option<BehaviorOverride> {
        let priorities = [
            BehaviorOverride::Asleep,
            BehaviorOverride::Paralyzed,
            BehaviorOverride::Fleeing,
            BehaviorOverride::Confused,
        ];
        priorities
            .into_iter()
            .find(|&wanted| self.effects.iter().any(|e| e.kind.behavior() == Some(wanted)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
