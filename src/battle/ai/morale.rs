//! Morale state machine, commander rally, and trait/scar offsets
//!
//! Status is always recomputed from the value; nothing stores it separately.
//! Each tick a unit's value moves by the sum of the delta terms below and is
//! clamped to [0, 100].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::constants::*;
use crate::battle::events::{BattleEventType, EventSink};
use crate::battle::hex::HexCoord;
use crate::battle::snapshot::{UnitTrait, UnitView, Weather};
use crate::core::types::{TeamId, Tick, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MoraleStatus {
    Steady,
    Shaken,
    Wavering,
    Routing,
}

impl MoraleStatus {
    /// Pure function of the morale value
    pub fn from_value(value: f32) -> Self {
        if value < ROUTING_BELOW {
            MoraleStatus::Routing
        } else if value < WAVERING_BELOW {
            MoraleStatus::Wavering
        } else if value < SHAKEN_BELOW {
            MoraleStatus::Shaken
        } else {
            MoraleStatus::Steady
        }
    }
}

/// Everything that feeds one unit's per-tick delta
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoraleInputs {
    /// Fraction of max hp lost since last tick
    pub hp_lost_fraction: f32,
    pub allies_nearby: usize,
    pub ranged_hit_recently: bool,
    pub in_cover: bool,
    /// 0.0 to 1.0, strongest commander/standard-bearer aura in reach
    pub aura_strength: f32,
    /// Holding a Ram or Ladder task
    pub siege_focus: bool,
    pub weather: Weather,
    /// Summed fear from recent terror events nearby
    pub terror: f32,
}

pub fn damage_penalty(hp_lost_fraction: f32) -> f32 {
    if hp_lost_fraction >= HEAVY_DAMAGE_FRACTION {
        HEAVY_DAMAGE_PENALTY
    } else if hp_lost_fraction >= MEDIUM_DAMAGE_FRACTION {
        MEDIUM_DAMAGE_PENALTY
    } else if hp_lost_fraction > 0.0 {
        LIGHT_DAMAGE_PENALTY
    } else {
        0.0
    }
}

/// Cold, heat and heavy precipitation each cost 2
pub fn weather_penalty(weather: &Weather) -> f32 {
    let mut penalty = 0.0;
    if weather.temperature_c < COLD_BELOW_C {
        penalty += WEATHER_PENALTY;
    }
    if weather.temperature_c > HEAT_ABOVE_C {
        penalty += WEATHER_PENALTY;
    }
    if weather.precipitation > HEAVY_PRECIPITATION {
        penalty += WEATHER_PENALTY;
    }
    penalty
}

pub fn morale_delta(value: f32, inputs: &MoraleInputs) -> f32 {
    let reversion = (MORALE_BASELINE - value) * MORALE_REVERSION_RATE;
    let allies = (inputs.allies_nearby as f32 * ALLY_BONUS_PER_UNIT).min(ALLY_BONUS_CAP);
    let ranged = if inputs.ranged_hit_recently { RANGED_HIT_PENALTY } else { 0.0 };
    let cover = if inputs.in_cover { COVER_BONUS } else { 0.0 };
    let focus = if inputs.siege_focus { SIEGE_TASK_FOCUS_BONUS } else { 0.0 };

    reversion
        + damage_penalty(inputs.hp_lost_fraction)
        + allies
        + ranged
        + cover
        + AURA_BONUS * inputs.aura_strength.clamp(0.0, 1.0)
        + focus
        + weather_penalty(&inputs.weather)
        - inputs.terror.max(0.0)
}

/// Strongest aura at `position`, linear falloff reaching zero at `radius`
pub fn aura_strength(position: HexCoord, sources: &[HexCoord], radius: u32) -> f32 {
    if radius == 0 {
        return 0.0;
    }
    sources
        .iter()
        .map(|s| (1.0 - position.distance(s) as f32 / radius as f32).max(0.0))
        .fold(0.0, f32::max)
}

/// Fear from terror events within radius 3, fading with distance
pub fn terror_pressure(position: HexCoord, terror: &[(HexCoord, f32)]) -> f32 {
    terror
        .iter()
        .filter(|(origin, _)| position.distance(origin) <= TERROR_RADIUS)
        .map(|(origin, strength)| {
            strength * (1.0 - position.distance(origin) as f32 / (TERROR_RADIUS + 1) as f32)
        })
        .sum()
}

/// Ticks a freshly routed unit spends before it can regroup
pub fn regroup_ticks(value: f32) -> u32 {
    (REGROUP_BASE_TICKS + ((REGROUP_REFERENCE_VALUE - value) / 10.0).round()).max(0.0) as u32
}

/// Additive offset from unit traits and commander leadership
pub fn trait_offset(traits: &[UnitTrait], leadership: f32) -> f32 {
    let from_traits: f32 = traits
        .iter()
        .map(|t| match t {
            UnitTrait::Fear => FEAR_OFFSET,
            UnitTrait::Discipline => DISCIPLINE_OFFSET,
            UnitTrait::Inspiration => INSPIRATION_OFFSET,
            UnitTrait::StandardBearer => 0.0,
        })
        .sum();
    from_traits + (leadership.clamp(0.0, 1.0) - 0.5) * 2.0 * LEADERSHIP_SPAN
}

/// A lingering mark on the field (a massacre, a burnt line) that unsettles
/// nearby units until it fades
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scar {
    pub hex: HexCoord,
    pub steps_left: u32,
    pub radius: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScarField {
    scars: Vec<Scar>,
}

impl ScarField {
    pub fn add(&mut self, hex: HexCoord, steps: u32, radius: u32) {
        if steps > 0 {
            self.scars.push(Scar {
                hex,
                steps_left: steps,
                radius,
            });
        }
    }

    /// One step of decay; fully faded scars are dropped
    pub fn decay(&mut self) {
        for scar in &mut self.scars {
            scar.steps_left = scar.steps_left.saturating_sub(1);
        }
        self.scars.retain(|s| s.steps_left > 0);
    }

    pub fn offset_at(&self, hex: HexCoord) -> f32 {
        self.scars
            .iter()
            .filter(|s| s.hex.distance(&hex) <= s.radius)
            .map(|s| s.steps_left as f32 * SCAR_OFFSET_PER_STEP)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.scars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scars.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoraleState {
    pub value: f32,
    pub last_shock_tick: Option<Tick>,
    /// Tick the unit first broke, if ever
    pub routed_at: Option<Tick>,
    pub regroup_timer: u32,
    /// Trait + scar offset currently folded into `value`
    pub offset: f32,
    /// Hit points seen last tick, for the damage band
    pub last_hp: f32,
}

impl MoraleState {
    pub fn new(base: f32, offset: f32, hp: f32) -> Self {
        Self {
            value: (base + offset).clamp(0.0, MORALE_MAX),
            last_shock_tick: None,
            routed_at: None,
            regroup_timer: 0,
            offset,
            last_hp: hp,
        }
    }

    pub fn status(&self) -> MoraleStatus {
        MoraleStatus::from_value(self.value)
    }

    /// Replace the folded-in offset, moving the value by the difference
    pub fn refresh_offset(&mut self, offset: f32) {
        self.value = (self.value + offset - self.offset).clamp(0.0, MORALE_MAX);
        self.offset = offset;
    }

    /// Apply one tick's delta and advance the rout timer
    pub fn apply(&mut self, delta: f32, tick: Tick) -> (MoraleStatus, MoraleStatus) {
        let before = self.status();
        self.value = (self.value + delta).clamp(0.0, MORALE_MAX);
        let after = self.status();

        if after == MoraleStatus::Routing {
            if self.routed_at.is_none() {
                self.routed_at = Some(tick);
                self.regroup_timer = regroup_ticks(self.value);
            } else if before == MoraleStatus::Routing {
                self.regroup_timer = self.regroup_timer.saturating_sub(1);
            }
        }
        if after > before {
            self.last_shock_tick = Some(tick);
        }
        (before, after)
    }
}

/// Aggregate morale picture for tooling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoraleSummary {
    pub units: usize,
    pub average: f32,
    pub steady: usize,
    pub shaken: usize,
    pub wavering: usize,
    pub routing: usize,
    pub last_rally: Option<Tick>,
    pub scars: usize,
}

/// Morale for every friendly unit of one runtime
#[derive(Debug, Clone, Default)]
pub struct MoraleBook {
    states: BTreeMap<UnitId, MoraleState>,
    scars: ScarField,
    last_rally: Option<Tick>,
}

impl MoraleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: UnitId) -> Option<&MoraleState> {
        self.states.get(&id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn scars(&self) -> &ScarField {
        &self.scars
    }

    pub fn scars_mut(&mut self) -> &mut ScarField {
        &mut self.scars
    }

    /// Start tracking a unit at its base value
    pub fn attach(&mut self, unit: &UnitView, leadership: f32) {
        let offset = trait_offset(&unit.traits, leadership) + self.scars.offset_at(unit.position);
        self.states
            .insert(unit.id, MoraleState::new(MORALE_BASELINE, offset, unit.stats.hp));
    }

    /// Drop units that have left the battle
    pub fn retain(&mut self, mut keep: impl FnMut(UnitId) -> bool) {
        self.states.retain(|id, _| keep(*id));
    }

    /// Recompute trait and scar offsets for the given units
    pub fn refresh_offsets(&mut self, units: &[&UnitView], leadership: f32) {
        for unit in units {
            if let Some(state) = self.states.get_mut(&unit.id) {
                let offset =
                    trait_offset(&unit.traits, leadership) + self.scars.offset_at(unit.position);
                state.refresh_offset(offset);
            }
        }
    }

    /// Fraction of max hp lost since the last update; also records current hp
    pub fn take_hp_loss(&mut self, unit: &UnitView) -> f32 {
        let Some(state) = self.states.get_mut(&unit.id) else {
            return 0.0;
        };
        let lost = (state.last_hp - unit.stats.hp).max(0.0);
        state.last_hp = unit.stats.hp.max(0.0);
        if unit.stats.max_hp > 0.0 {
            lost / unit.stats.max_hp
        } else {
            0.0
        }
    }

    /// Apply one tick to a unit, emitting `MoraleShock` when its status worsens
    pub fn update(
        &mut self,
        unit: UnitId,
        inputs: &MoraleInputs,
        team: TeamId,
        tick: Tick,
        sink: &mut impl EventSink,
    ) -> Option<MoraleStatus> {
        let state = self.states.get_mut(&unit)?;
        let delta = morale_delta(state.value, inputs);
        let (before, after) = state.apply(delta, tick);
        if after > before {
            sink.emit(
                tick,
                BattleEventType::MoraleShock {
                    team,
                    unit,
                    status: after,
                    value: state.value,
                },
                format!("unit {} is now {:?}", unit.0, after),
            );
        }
        Some(after)
    }

    pub fn non_steady_fraction(&self) -> f32 {
        if self.states.is_empty() {
            return 0.0;
        }
        let shaken = self
            .states
            .values()
            .filter(|s| s.status() != MoraleStatus::Steady)
            .count();
        shaken as f32 / self.states.len() as f32
    }

    pub fn rally_ready(&self, tick: Tick) -> bool {
        self.last_rally
            .map_or(true, |last| tick >= last + RALLY_COOLDOWN_TICKS)
    }

    /// Commander rally: boost every tracked unit within `radius`
    ///
    /// Needs the cooldown to have elapsed, a commander on the field, and
    /// either a collapsed lane or `trigger_fraction` of units shaken or worse.
    /// Returns the boosted units when a rally happened.
    #[allow(clippy::too_many_arguments)]
    pub fn try_rally(
        &mut self,
        tick: Tick,
        lane_collapsed: bool,
        commander: Option<HexCoord>,
        positions: &[(UnitId, HexCoord)],
        boost: f32,
        radius: u32,
        trigger_fraction: f32,
        team: TeamId,
        sink: &mut impl EventSink,
    ) -> Option<Vec<UnitId>> {
        let origin = commander?;
        if !self.rally_ready(tick) {
            return None;
        }
        if !lane_collapsed && self.non_steady_fraction() < trigger_fraction {
            return None;
        }

        let boosted: Vec<UnitId> = positions
            .iter()
            .filter(|(id, at)| self.states.contains_key(id) && at.distance(&origin) <= radius)
            .map(|(id, _)| *id)
            .collect();
        if boosted.is_empty() {
            return None;
        }

        for id in &boosted {
            if let Some(state) = self.states.get_mut(id) {
                state.value = (state.value + boost).clamp(0.0, MORALE_MAX);
            }
        }
        self.last_rally = Some(tick);
        tracing::info!(tick, units = boosted.len(), "commander rallied the line");
        sink.emit(
            tick,
            BattleEventType::Rally {
                team,
                origin,
                units: boosted.clone(),
            },
            format!("rally lifts {} units", boosted.len()),
        );
        Some(boosted)
    }

    pub fn summary(&self) -> MoraleSummary {
        let mut summary = MoraleSummary {
            units: self.states.len(),
            last_rally: self.last_rally,
            scars: self.scars.len(),
            ..Default::default()
        };
        for state in self.states.values() {
            summary.average += state.value;
            match state.status() {
                MoraleStatus::Steady => summary.steady += 1,
                MoraleStatus::Shaken => summary.shaken += 1,
                MoraleStatus::Wavering => summary.wavering += 1,
                MoraleStatus::Routing => summary.routing += 1,
            }
        }
        if summary.units > 0 {
            summary.average /= summary.units as f32;
        }
        summary
    }
}
