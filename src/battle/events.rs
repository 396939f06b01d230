//! Shared battle event log
//!
//! The host appends observations (hits, deaths, moves, terror, siege strikes);
//! the engine appends its decisions using a small fixed vocabulary. Rendering
//! and replay consume the same ordered log.

use serde::{Deserialize, Serialize};

use crate::battle::ai::counterplay::{Maneuver, StyleVector};
use crate::battle::ai::lanes::LaneId;
use crate::battle::ai::morale::MoraleStatus;
use crate::battle::hex::HexCoord;
use crate::core::types::{SegmentId, TeamId, Tick, UnitId};

/// Why the primary lane changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneSwitchReason {
    /// Lane scores (pull - danger - pressure) favoured another lane
    Score,
    /// Periodic health evaluation demoted the old lane
    Health,
}

/// A high-danger hex carried on an overlay event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotSpot {
    pub hex: HexCoord,
    pub danger: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BattleEventType {
    // Observations appended by the host
    UnitHit {
        attacker: UnitId,
        target: UnitId,
        ranged: bool,
        flanking: bool,
    },
    UnitKilled {
        unit: UnitId,
        team: TeamId,
        position: HexCoord,
    },
    UnitMoved {
        unit: UnitId,
        team: TeamId,
        from: HexCoord,
        to: HexCoord,
    },
    Terror {
        origin: HexCoord,
        strength: f32,
    },
    SegmentStruck {
        segment: SegmentId,
        dps: f32,
    },

    // Decisions appended by the engine
    LaneSwitch {
        team: TeamId,
        from: Option<LaneId>,
        to: LaneId,
        reason: LaneSwitchReason,
    },
    Breach {
        team: TeamId,
        segment: SegmentId,
        hex: HexCoord,
    },
    MoraleShock {
        team: TeamId,
        unit: UnitId,
        status: MoraleStatus,
        value: f32,
    },
    Rally {
        team: TeamId,
        origin: HexCoord,
        units: Vec<UnitId>,
    },
    CounterLearned {
        team: TeamId,
        style: StyleVector,
    },
    SuppressionAssign {
        team: TeamId,
        unit: UnitId,
        target: UnitId,
    },
    Overlay {
        team: TeamId,
        primary: Option<LaneId>,
        maneuver: Maneuver,
        hot_spots: Vec<HotSpot>,
    },
}

impl BattleEventType {
    /// True for entries the host reports, false for engine decisions
    pub fn is_observation(&self) -> bool {
        matches!(
            self,
            BattleEventType::UnitHit { .. }
                | BattleEventType::UnitKilled { .. }
                | BattleEventType::UnitMoved { .. }
                | BattleEventType::Terror { .. }
                | BattleEventType::SegmentStruck { .. }
        )
    }
}

/// Log entry for battle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleEvent {
    pub tick: Tick,
    pub event_type: BattleEventType,
    pub description: String,
}

/// Destination for engine decisions
pub trait EventSink {
    fn emit(&mut self, tick: Tick, event_type: BattleEventType, description: String);
}

/// Ordered, append-only event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleEventLog {
    pub events: Vec<BattleEvent>,
}

impl BattleEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event_type: BattleEventType, description: String, tick: Tick) {
        self.events.push(BattleEvent {
            tick,
            event_type,
            description,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entries appended at or after `cursor`
    pub fn since(&self, cursor: usize) -> &[BattleEvent] {
        &self.events[cursor.min(self.events.len())..]
    }

    /// The last `n` `UnitHit` entries, most recent last
    ///
    /// Siege strikes and other observations never push a hit out of the window.
    pub fn recent_hits(&self, n: usize) -> Vec<&BattleEvent> {
        let mut recent: Vec<&BattleEvent> = self
            .events
            .iter()
            .rev()
            .filter(|e| matches!(e.event_type, BattleEventType::UnitHit { .. }))
            .take(n)
            .collect();
        recent.reverse();
        recent
    }
}

impl EventSink for BattleEventLog {
    fn emit(&mut self, tick: Tick, event_type: BattleEventType, description: String) {
        self.push(event_type, description, tick);
    }
}
