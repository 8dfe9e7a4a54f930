use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::GridPos;

/// Sense never reaches further than this many cells.
pub const MAX_REVEAL_RADIUS: f32 = 32.0;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityType {
    Phase,
    Possess,
    Sense,
    SpeedBoost,
}

impl AbilityType {
    pub const ALL: [AbilityType; 4] = [
        AbilityType::Phase,
        AbilityType::Possess,
        AbilityType::Sense,
        AbilityType::SpeedBoost,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AbilityType::Phase => "phase",
            AbilityType::Possess => "possess",
            AbilityType::Sense => "sense",
            AbilityType::SpeedBoost => "speed_boost",
        }
    }
}

/// Variant state carried by each ability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbilityEffect {
    /// Walls stop blocking the ghost while active. The caller enforces it.
    Phase,
    Possess {
        possessed_object_id: Option<String>,
    },
    /// Revealed cells stay revealed after the ability ends.
    Sense {
        reveal_radius: f32,
        revealed: HashSet<GridPos>,
    },
    SpeedBoost {
        speed_multiplier: f32,
    },
}

/// Per-level tuning override, as written in level JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbilityConfig {
    pub ability: AbilityType,
    #[serde(default)]
    pub max_charges: Option<u32>,
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub recharge_ms: Option<u64>,
    #[serde(default)]
    pub reveal_radius: Option<f32>,
    #[serde(default)]
    pub speed_multiplier: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ability {
    pub max_charges: u32,
    pub charges: u32,
    pub cooldown_ms: u64,
    pub duration_ms: u64,
    pub is_active: bool,
    pub activated_at: Option<u64>,
    pub last_charge_regen_at: u64,
    /// One charge returns per interval while below `max_charges`. `None`
    /// disables regeneration.
    pub recharge_ms: Option<u64>,
    pub effect: AbilityEffect,
}

fn clamp_reveal_radius(radius: f32) -> f32 {
    if radius.is_finite() {
        radius.clamp(0.0, MAX_REVEAL_RADIUS)
    } else {
        0.0
    }
}

impl Ability {
    fn with_effect(max_charges: u32, cooldown_ms: u64, duration_ms: u64, effect: AbilityEffect) -> Self {
        Self {
            max_charges,
            charges: max_charges,
            cooldown_ms,
            duration_ms,
            is_active: false,
            activated_at: None,
            last_charge_regen_at: 0,
            recharge_ms: None,
            effect,
        }
    }

    pub fn phase(max_charges: u32, cooldown_ms: u64, duration_ms: u64) -> Self {
        Self::with_effect(max_charges, cooldown_ms, duration_ms, AbilityEffect::Phase)
    }

    pub fn possess(max_charges: u32, cooldown_ms: u64, duration_ms: u64) -> Self {
        Self::with_effect(
            max_charges,
            cooldown_ms,
            duration_ms,
            AbilityEffect::Possess {
                possessed_object_id: None,
            },
        )
    }

    pub fn sense(max_charges: u32, cooldown_ms: u64, duration_ms: u64, reveal_radius: f32) -> Self {
        Self::with_effect(
            max_charges,
            cooldown_ms,
            duration_ms,
            AbilityEffect::Sense {
                reveal_radius: clamp_reveal_radius(reveal_radius),
                revealed: HashSet::new(),
            },
        )
    }

    /// Non-positive multipliers fall back to 1.0.
    pub fn speed_boost(max_charges: u32, cooldown_ms: u64, duration_ms: u64, speed_multiplier: f32) -> Self {
        let speed_multiplier = if speed_multiplier.is_finite() && speed_multiplier > 0.0 {
            speed_multiplier
        } else {
            1.0
        };
        Self::with_effect(
            max_charges,
            cooldown_ms,
            duration_ms,
            AbilityEffect::SpeedBoost { speed_multiplier },
        )
    }

    /// Stock tuning for each ability.
    pub fn from_type(ability: AbilityType) -> Self {
        match ability {
            AbilityType::Phase => Self::phase(3, 5000, 3000),
            AbilityType::Possess => Self::possess(2, 8000, 10_000),
            AbilityType::Sense => Self::sense(3, 10_000, 5000, 3.0),
            AbilityType::SpeedBoost => Self::speed_boost(3, 6000, 4000, 1.5),
        }
    }

    pub fn from_config(config: &AbilityConfig) -> Self {
        let mut ability = Self::from_type(config.ability);
        if let Some(max) = config.max_charges {
            ability.max_charges = max;
            ability.charges = max;
        }
        if let Some(ms) = config.cooldown_ms {
            ability.cooldown_ms = ms;
        }
        if let Some(ms) = config.duration_ms {
            ability.duration_ms = ms;
        }
        ability.recharge_ms = config.recharge_ms.filter(|ms| *ms > 0);
        if let Some(radius) = config.reveal_radius {
            ability.set_reveal_radius(radius);
        }
        if let Some(multiplier) = config.speed_multiplier {
            ability.set_speed_multiplier(multiplier);
        }
        ability
    }

    pub fn ability_type(&self) -> AbilityType {
        match self.effect {
            AbilityEffect::Phase => AbilityType::Phase,
            AbilityEffect::Possess { .. } => AbilityType::Possess,
            AbilityEffect::Sense { .. } => AbilityType::Sense,
            AbilityEffect::SpeedBoost { .. } => AbilityType::SpeedBoost,
        }
    }

    /// Spend a charge and open the active window. Fails only when no charge
    /// is left; activating an active ability restarts its window.
    pub fn activate(&mut self, now: u64) -> bool {
        if self.charges == 0 {
            return false;
        }
        if self.charges == self.max_charges {
            self.last_charge_regen_at = now;
        }
        self.charges -= 1;
        self.is_active = true;
        self.activated_at = Some(now);
        true
    }

    /// Advance timers. Returns true when the active window ended on this call.
    pub fn update(&mut self, now: u64) -> bool {
        self.regenerate(now);
        let Some(start) = self.activated_at else {
            return false;
        };
        if self.is_active && now.saturating_sub(start) >= self.duration_ms {
            self.deactivate();
            return true;
        }
        false
    }

    /// End the active window early. Returns false if it was not active.
    pub fn deactivate(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        if let AbilityEffect::Possess {
            possessed_object_id,
        } = &mut self.effect
        {
            *possessed_object_id = None;
        }
        true
    }

    fn regenerate(&mut self, now: u64) {
        let Some(interval) = self.recharge_ms.filter(|ms| *ms > 0) else {
            return;
        };
        if self.charges >= self.max_charges {
            self.last_charge_regen_at = now;
            return;
        }
        let gained = now.saturating_sub(self.last_charge_regen_at) / interval;
        if gained == 0 {
            return;
        }
        let gained = gained.min(u64::from(self.max_charges - self.charges)) as u32;
        self.charges += gained;
        self.last_charge_regen_at += u64::from(gained) * interval;
    }

    /// Cooldown runs from the last activation.
    pub fn cooldown_remaining(&self, now: u64) -> u64 {
        match self.activated_at {
            Some(start) => start.saturating_add(self.cooldown_ms).saturating_sub(now),
            None => 0,
        }
    }

    pub fn is_on_cooldown(&self, now: u64) -> bool {
        self.cooldown_remaining(now) > 0
    }

    pub fn remaining_duration(&self, now: u64) -> u64 {
        match (self.is_active, self.activated_at) {
            (true, Some(start)) => start.saturating_add(self.duration_ms).saturating_sub(now),
            _ => 0,
        }
    }

    pub fn grants_wall_pass(&self) -> bool {
        self.is_active && self.effect == AbilityEffect::Phase
    }

    /// Take control of an object. Only a running Possess ability can.
    pub fn possess_object(&mut self, object_id: &str) -> bool {
        match &mut self.effect {
            AbilityEffect::Possess {
                possessed_object_id,
            } if self.is_active => {
                *possessed_object_id = Some(object_id.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn possessed_object_id(&self) -> Option<&str> {
        match &self.effect {
            AbilityEffect::Possess {
                possessed_object_id,
            } => possessed_object_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_possessing(&self) -> bool {
        self.is_active && self.possessed_object_id().is_some()
    }

    /// Mark one cell revealed. Works in or out of the active window.
    pub fn reveal_position(&mut self, pos: GridPos) -> bool {
        match &mut self.effect {
            AbilityEffect::Sense { revealed, .. } => revealed.insert(pos),
            _ => false,
        }
    }

    /// Reveal every cell of a `width` x `height` grid within `reveal_radius`
    /// of `center` while active. Returns the cells revealed for the first
    /// time, row-major.
    pub fn reveal_around(&mut self, center: GridPos, width: usize, height: usize) -> Vec<GridPos> {
        if !self.is_active {
            return Vec::new();
        }
        let AbilityEffect::Sense {
            reveal_radius,
            revealed,
        } = &mut self.effect
        else {
            return Vec::new();
        };
        let reach = reveal_radius.floor() as i64;
        let limit = f64::from(*reveal_radius).powi(2);
        let (cx, cy) = (i64::from(center.x), i64::from(center.y));
        let (max_x, max_y) = (width as i64 - 1, height as i64 - 1);
        let mut fresh = Vec::new();
        for y in (cy - reach).max(0)..=(cy + reach).min(max_y) {
            for x in (cx - reach).max(0)..=(cx + reach).min(max_x) {
                let (dx, dy) = (x - cx, y - cy);
                if (dx * dx + dy * dy) as f64 > limit {
                    continue;
                }
                let pos = GridPos::new(x as i32, y as i32);
                if revealed.insert(pos) {
                    fresh.push(pos);
                }
            }
        }
        fresh
    }

    pub fn is_revealed(&self, pos: GridPos) -> bool {
        match &self.effect {
            AbilityEffect::Sense { revealed, .. } => revealed.contains(&pos),
            _ => false,
        }
    }

    pub fn revealed_positions(&self) -> Option<&HashSet<GridPos>> {
        match &self.effect {
            AbilityEffect::Sense { revealed, .. } => Some(revealed),
            _ => None,
        }
    }

    pub fn reveal_radius(&self) -> Option<f32> {
        match self.effect {
            AbilityEffect::Sense { reveal_radius, .. } => Some(reveal_radius),
            _ => None,
        }
    }

    /// Radii past `MAX_REVEAL_RADIUS` are capped.
    pub fn set_reveal_radius(&mut self, radius: f32) -> bool {
        match &mut self.effect {
            AbilityEffect::Sense { reveal_radius, .. } if radius.is_finite() && radius >= 0.0 => {
                *reveal_radius = clamp_reveal_radius(radius);
                true
            }
            _ => false,
        }
    }

    pub fn speed_multiplier(&self) -> Option<f32> {
        match self.effect {
            AbilityEffect::SpeedBoost { speed_multiplier } => Some(speed_multiplier),
            _ => None,
        }
    }

    /// Rejects non-positive (and non-finite) values, keeping the old one.
    pub fn set_speed_multiplier(&mut self, multiplier: f32) -> bool {
        match &mut self.effect {
            AbilityEffect::SpeedBoost { speed_multiplier } if multiplier.is_finite() && multiplier > 0.0 => {
                *speed_multiplier = multiplier;
                true
            }
            _ => false,
        }
    }

    /// The multiplier while boosting, otherwise 1.0.
    pub fn effective_multiplier(&self) -> f32 {
        match self.speed_multiplier() {
            Some(m) if self.is_active => m,
            _ => 1.0,
        }
    }

    /// Back to the level-start state: full charges, idle, nothing revealed.
    pub fn reset(&mut self) {
        self.charges = self.max_charges;
        self.is_active = false;
        self.activated_at = None;
        self.last_charge_regen_at = 0;
        match &mut self.effect {
            AbilityEffect::Possess {
                possessed_object_id,
            } => *possessed_object_id = None,
            AbilityEffect::Sense { revealed, .. } => revealed.clear(),
            AbilityEffect::Phase | AbilityEffect::SpeedBoost { .. } => {}
        }
    }
}

/// One ability per type for the lifetime of a level.
#[derive(Clone, Debug, Serialize)]
pub struct AbilitySystem {
    abilities: HashMap<AbilityType, Ability>,
}

impl Default for AbilitySystem {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl AbilitySystem {
    /// Stock abilities of every type, with per-level overrides applied.
    pub fn new(overrides: &[AbilityConfig]) -> Self {
        let mut abilities: HashMap<AbilityType, Ability> = AbilityType::ALL
            .into_iter()
            .map(|t| (t, Ability::from_type(t)))
            .collect();
        for config in overrides {
            abilities.insert(config.ability, Ability::from_config(config));
        }
        Self { abilities }
    }

    /// Replaces the ability of the same type.
    pub fn insert(&mut self, ability: Ability) {
        self.abilities.insert(ability.ability_type(), ability);
    }

    pub fn get(&self, ability: AbilityType) -> Option<&Ability> {
        self.abilities.get(&ability)
    }

    pub fn get_mut(&mut self, ability: AbilityType) -> Option<&mut Ability> {
        self.abilities.get_mut(&ability)
    }

    pub fn activate(&mut self, ability: AbilityType, now: u64) -> bool {
        self.abilities
            .get_mut(&ability)
            .is_some_and(|a| a.activate(now))
    }

    /// Like `activate`, but refuses while the ability is running or cooling
    /// down.
    pub fn try_activate(&mut self, ability: AbilityType, now: u64) -> bool {
        match self.abilities.get_mut(&ability) {
            Some(a) if !a.is_active && !a.is_on_cooldown(now) => a.activate(now),
            _ => false,
        }
    }

    pub fn deactivate(&mut self, ability: AbilityType) -> bool {
        self.abilities
            .get_mut(&ability)
            .is_some_and(Ability::deactivate)
    }

    /// Advance every ability; returns the ones whose window just ended.
    pub fn update(&mut self, now: u64) -> Vec<AbilityType> {
        AbilityType::ALL
            .into_iter()
            .filter(|t| self.abilities.get_mut(t).is_some_and(|a| a.update(now)))
            .collect()
    }

    pub fn is_active(&self, ability: AbilityType) -> bool {
        self.abilities.get(&ability).is_some_and(|a| a.is_active)
    }

    pub fn active_types(&self) -> Vec<AbilityType> {
        AbilityType::ALL
            .into_iter()
            .filter(|t| self.is_active(*t))
            .collect()
    }

    pub fn can_phase(&self) -> bool {
        self.get(AbilityType::Phase)
            .is_some_and(Ability::grants_wall_pass)
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.get(AbilityType::SpeedBoost)
            .map_or(1.0, Ability::effective_multiplier)
    }

    pub fn reset_all(&mut self) {
        for ability in self.abilities.values_mut() {
            ability.reset();
        }
    }
}
