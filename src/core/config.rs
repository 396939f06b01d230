//! Engine configuration with documented tunables
//!
//! Only tunables live here. Fixed formula constants (falloff, radii, morale
//! bands) are in `battle::constants`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};

/// Influence field ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceConfig {
    /// Per-tick decay factor applied to every channel, in (0, 1)
    pub decay_factor: f32,
    /// Scale applied to an enemy unit's atk before spreading threat
    pub threat_scale: f32,
    /// Scale applied to a friendly unit's def before spreading support
    pub support_scale: f32,
    /// Goal pull written at the primary lane frontier each tick
    pub lane_intent_weight: f32,
    /// Goal pull written at the current breach target each tick
    pub siege_intent_weight: f32,
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.9,
            threat_scale: 0.1,
            support_scale: 0.1,
            lane_intent_weight: 1.0,
            siege_intent_weight: 2.0,
        }
    }
}

/// Lane geometry and health evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Hexes from anchor to frontier along the facing
    pub depth: u32,
    /// Lateral offset of the Left/Right lanes from the anchor
    pub spread: u32,
    /// Goal waypoints sampled per lane
    pub waypoints: usize,
    /// Ticks between lane health evaluations
    pub health_interval: u64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            depth: 12,
            spread: 4,
            waypoints: 4,
            health_interval: 5,
        }
    }
}

/// Siege planning and task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiegeConfig {
    /// Prefer a gate over walls when one stands
    pub prefer_gate: bool,
    /// Ticks between forced replans
    pub regroup_interval: u32,
    /// Chance that each spare wall receives a secondary Ladder/Bomb task
    pub secondary_task_chance: f32,
    /// Progress a Ladder task gains per tick while its unit is adjacent
    pub ladder_progress_per_tick: f32,
    /// Expansion limit for a single A* search
    pub path_node_limit: usize,
}

impl Default for SiegeConfig {
    fn default() -> Self {
        Self {
            prefer_gate: true,
            regroup_interval: 8,
            secondary_task_chance: 0.5,
            ladder_progress_per_tick: 0.25,
            path_node_limit: 4096,
        }
    }
}

/// Morale rally and modifier refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoraleConfig {
    /// Flat boost granted by a rally
    pub rally_boost: f32,
    /// Radius around the commander that a rally reaches
    pub rally_radius: u32,
    /// Fraction of non-Steady units that allows a rally
    pub rally_trigger_fraction: f32,
    /// Commander / standard-bearer aura radius
    pub aura_radius: u32,
    /// Ticks between trait/scar offset refreshes
    pub modifier_refresh_interval: u64,
    /// Steps a fresh scar lasts
    pub scar_steps: u32,
    /// Radius of a scar's effect
    pub scar_radius: u32,
}

impl Default for MoraleConfig {
    fn default() -> Self {
        Self {
            rally_boost: 12.0,
            rally_radius: 4,
            rally_trigger_fraction: 0.4,
            aura_radius: 4,
            modifier_refresh_interval: 10,
            scar_steps: 6,
            scar_radius: 2,
        }
    }
}

/// Counter-play observation window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Rolling window length in ticks
    pub window: usize,
    /// Observed ticks required before the style vector is frozen
    pub learn_after: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            learn_after: 12,
        }
    }
}

/// Debug overlay emission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Ticks between overlay events; 0 disables them
    pub interval: u64,
    /// Number of highest-danger hexes carried per overlay
    pub hot_spots: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            hot_spots: 3,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub influence: InfluenceConfig,
    pub lanes: LaneConfig,
    pub siege: SiegeConfig,
    pub morale: MoraleConfig,
    pub learner: LearnerConfig,
    pub overlay: OverlayConfig,
}

impl EngineConfig {
    /// Parse from TOML text; missing sections fall back to defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: EngineConfig = toml::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Clamp values that would break the tick pipeline
    fn sanitize(&mut self) {
        if !(self.influence.decay_factor > 0.0 && self.influence.decay_factor < 1.0) {
            self.influence.decay_factor = InfluenceConfig::default().decay_factor;
        }
        self.lanes.waypoints = self.lanes.waypoints.max(1);
        self.lanes.depth = self.lanes.depth.max(1);
        self.lanes.health_interval = self.lanes.health_interval.max(1);
        self.siege.regroup_interval = self.siege.regroup_interval.max(1);
        self.siege.secondary_task_chance = self.siege.secondary_task_chance.clamp(0.0, 1.0);
        self.learner.window = self.learner.window.max(1);
        self.learner.learn_after = self.learner.learn_after.clamp(1, self.learner.window);
        self.morale.modifier_refresh_interval = self.morale.modifier_refresh_interval.max(1);
    }
}
