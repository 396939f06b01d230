//! Influence field - decaying per-hex threat/support/cover/hazard/intent
//!
//! Cells are created lazily on first write and never evicted; a missing cell
//! reads as all zeros. Danger and pull are derived only through `score_hex`.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::constants::{INFLUENCE_FALLOFF, SUPPORT_RADIUS, THREAT_RADIUS};
use crate::battle::hex::HexCoord;
use crate::core::types::Tick;

/// Five scalar channels for one hex
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCell {
    pub threat: f32,
    pub support: f32,
    pub cover: f32,
    pub hazard: f32,
    pub intent: f32,
}

impl FieldCell {
    fn scale(&mut self, factor: f32) {
        self.threat *= factor;
        self.support *= factor;
        self.cover *= factor;
        self.hazard *= factor;
        self.intent *= factor;
    }
}

/// Derived score of one hex
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HexScore {
    pub danger: f32,
    pub pull: f32,
}

impl HexScore {
    /// Net attractiveness used by lane scoring
    pub fn net(&self) -> f32 {
        self.pull - self.danger
    }
}

#[derive(Debug, Clone, Default)]
pub struct InfluenceField {
    cells: AHashMap<HexCoord, FieldCell>,
    tick: Tick,
    seed: u64,
    last_decay: Option<Tick>,
}

impl InfluenceField {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of decays applied so far
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Raw cell, zero if never written
    pub fn cell(&self, hex: HexCoord) -> FieldCell {
        self.cells.get(&hex).copied().unwrap_or_default()
    }

    fn cell_mut(&mut self, hex: HexCoord) -> &mut FieldCell {
        self.cells.entry(hex).or_default()
    }

    /// Multiply every channel of every cell by `factor`
    pub fn decay(&mut self, factor: f32) {
        for cell in self.cells.values_mut() {
            cell.scale(factor);
        }
        self.tick += 1;
    }

    /// Decay once for `tick`; later calls for the same or an earlier tick do nothing
    pub fn decay_for_tick(&mut self, tick: Tick, factor: f32) -> bool {
        if self.last_decay.is_some_and(|last| tick <= last) {
            return false;
        }
        self.decay(factor);
        self.last_decay = Some(tick);
        true
    }

    /// Spread `power * falloff^d` to every hex within the threat radius
    pub fn add_threat(&mut self, origin: HexCoord, power: f32) {
        self.spread(origin, power, THREAT_RADIUS, |cell, v| cell.threat += v);
    }

    /// Spread `power * falloff^d` to every hex within the support radius
    pub fn add_support(&mut self, origin: HexCoord, power: f32) {
        self.spread(origin, power, SUPPORT_RADIUS, |cell, v| cell.support += v);
    }

    fn spread(&mut self, origin: HexCoord, power: f32, radius: u32, apply: impl Fn(&mut FieldCell, f32)) {
        for hex in origin.hexes_in_range(radius) {
            let d = origin.distance(&hex) as i32;
            let value = power * INFLUENCE_FALLOFF.powi(d);
            apply(self.cell_mut(hex), value);
        }
    }

    pub fn add_cover(&mut self, hex: HexCoord, strength: f32) {
        self.cell_mut(hex).cover += strength;
    }

    pub fn add_hazard(&mut self, hex: HexCoord, strength: f32) {
        self.cell_mut(hex).hazard += strength;
    }

    /// Flat goal pull, separate from threat/support
    pub fn add_intent(&mut self, hex: HexCoord, weight: f32) {
        self.cell_mut(hex).intent += weight;
    }

    /// danger = max(0, threat - support) + hazard - cover; pull = intent
    pub fn score_hex(&self, hex: HexCoord) -> HexScore {
        let cell = self.cell(hex);
        HexScore {
            danger: (cell.threat - cell.support).max(0.0) + cell.hazard - cell.cover,
            pull: cell.intent,
        }
    }

    pub fn danger(&self, hex: HexCoord) -> f32 {
        self.score_hex(hex).danger
    }
}
