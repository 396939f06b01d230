//! Fixed formula constants - the numbers the decision rules are defined by
//!
//! Tunables that hosts may reasonably change live in `core::config`.

// Influence spread
pub const INFLUENCE_FALLOFF: f32 = 0.85;
pub const THREAT_RADIUS: u32 = 6;
pub const SUPPORT_RADIUS: u32 = 4;

// Lane health
pub const LANE_COLLAPSE_CASUALTIES: u32 = 2;
pub const LANE_COLLAPSE_DANGER: f32 = 6.0;
pub const LANE_COLLAPSE_LOST_GROUND: u32 = 1;
pub const LANE_PRESSURE_PER_ENEMY: f32 = 0.5;
pub const LANE_PRESSURE_RADIUS: u32 = 2;

// Split plan
pub const SPLIT_RISK_THRESHOLD: f32 = 60.0;
pub const SPLIT_BASE_SHARE: f32 = 0.25;

// Siege
pub const ARMOR_MITIGATION: f32 = 0.5;
pub const MAX_SECONDARY_WALLS: usize = 2;
pub const RAM_DPS_FACTOR: f32 = 1.0;
pub const SAP_DPS_FACTOR: f32 = 0.6;
pub const BOMB_DPS_FACTOR: f32 = 1.5;

// Morale bands and baseline
pub const MORALE_MAX: f32 = 100.0;
pub const MORALE_BASELINE: f32 = 60.0;
pub const MORALE_REVERSION_RATE: f32 = 0.02;
pub const ROUTING_BELOW: f32 = 10.0;
pub const WAVERING_BELOW: f32 = 30.0;
pub const SHAKEN_BELOW: f32 = 60.0;

// Morale delta terms
pub const HEAVY_DAMAGE_FRACTION: f32 = 0.2;
pub const MEDIUM_DAMAGE_FRACTION: f32 = 0.1;
pub const HEAVY_DAMAGE_PENALTY: f32 = -12.0;
pub const MEDIUM_DAMAGE_PENALTY: f32 = -6.0;
pub const LIGHT_DAMAGE_PENALTY: f32 = -2.0;
pub const ALLY_RADIUS: u32 = 2;
pub const ALLY_BONUS_PER_UNIT: f32 = 0.6;
pub const ALLY_BONUS_CAP: f32 = 4.0;
pub const RANGED_HIT_WINDOW: usize = 5;
pub const RANGED_HIT_PENALTY: f32 = -2.5;
pub const COVER_BONUS: f32 = 1.5;
pub const AURA_BONUS: f32 = 6.0;
pub const SIEGE_TASK_FOCUS_BONUS: f32 = 2.0;
pub const WEATHER_PENALTY: f32 = -2.0;
pub const COLD_BELOW_C: f32 = 0.0;
pub const HEAT_ABOVE_C: f32 = 30.0;
pub const HEAVY_PRECIPITATION: f32 = 0.7;
pub const TERROR_RADIUS: u32 = 3;
pub const TERROR_MEMORY_TICKS: u64 = 3;

// Routing and rally
pub const REGROUP_BASE_TICKS: f32 = 3.0;
pub const REGROUP_REFERENCE_VALUE: f32 = 80.0;
pub const RALLY_COOLDOWN_TICKS: u64 = 5;

// Trait and scar offsets
pub const FEAR_OFFSET: f32 = -8.0;
pub const DISCIPLINE_OFFSET: f32 = 6.0;
pub const INSPIRATION_OFFSET: f32 = 4.0;
pub const LEADERSHIP_SPAN: f32 = 10.0;
pub const SCAR_OFFSET_PER_STEP: f32 = -0.5;

// Counter-play signal thresholds
pub const FLANK_SIGNAL: f32 = 0.4;
pub const VOLLEY_SIGNAL: f32 = 0.4;
pub const PUSH_SIGNAL: f32 = 0.5;
pub const COLLAPSE_SIGNAL: f32 = 0.3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_morale_bands_ordered() {
        assert!(ROUTING_BELOW < WAVERING_BELOW);
        assert!(WAVERING_BELOW < SHAKEN_BELOW);
        assert!(SHAKEN_BELOW <= MORALE_MAX);
    }

    #[test]
    fn test_threat_reaches_further_than_support() {
        assert!(THREAT_RADIUS > SUPPORT_RADIUS);
        assert!(INFLUENCE_FALLOFF > 0.0 && INFLUENCE_FALLOFF < 1.0);
    }

    #[test]
    fn test_damage_penalties_banded() {
        assert!(HEAVY_DAMAGE_PENALTY < MEDIUM_DAMAGE_PENALTY);
        assert!(MEDIUM_DAMAGE_PENALTY < LIGHT_DAMAGE_PENALTY);
    }
}
