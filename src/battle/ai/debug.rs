//! Read-only introspection for tooling
//!
//! Every function here takes `&AiRuntime` and returns owned, serializable
//! data. Nothing mutates the runtime.

use serde::{Deserialize, Serialize};

use crate::battle::ai::counterplay::{CounterWeights, Maneuver, StyleVector};
use crate::battle::ai::lanes::{LaneHealth, LaneId, SplitPlan};
use crate::battle::ai::morale::MoraleSummary;
use crate::battle::ai::runtime::AiRuntime;
use crate::battle::ai::siege::{SegmentKind, SiegeTask};
use crate::battle::ai::tasks::Assignment;
use crate::battle::hex::HexCoord;
use crate::core::types::{SegmentId, TeamId, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneView {
    pub id: LaneId,
    pub frontier: HexCoord,
    pub pressure: f32,
    pub score: f32,
    pub health: Option<LaneHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneSnapshot {
    pub primary: Option<LaneId>,
    pub lanes: Vec<LaneView>,
    pub collapsed: Vec<LaneId>,
    pub split: Option<SplitPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStatus {
    pub id: SegmentId,
    pub kind: SegmentKind,
    pub hp: f32,
    pub breached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiegeSnapshot {
    pub tasks: Vec<SiegeTask>,
    pub assignments: Vec<Assignment>,
    pub escorts: Vec<(UnitId, UnitId)>,
    pub suppression: Vec<(UnitId, UnitId)>,
    pub segments: Vec<SegmentStatus>,
    pub blocked_cells: usize,
    pub blocked_edges: usize,
    pub regroup_countdown: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub observed_ticks: u64,
    pub style: Option<StyleVector>,
    pub weights: Option<CounterWeights>,
    pub maneuver: Maneuver,
}

/// Everything at once, e.g. for a JSON dump at battle end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub team: TeamId,
    pub lanes: LaneSnapshot,
    pub siege: SiegeSnapshot,
    pub morale: MoraleSummary,
    pub counter: CounterSnapshot,
}

pub fn lane_snapshot(runtime: &AiRuntime) -> LaneSnapshot {
    let lanes = runtime
        .lanes()
        .iter()
        .map(|lane| LaneView {
            id: lane.id,
            frontier: lane.frontier,
            pressure: lane.pressure,
            score: lane.score(runtime.field()),
            health: runtime
                .lane_health()
                .iter()
                .find(|h| h.lane == lane.id)
                .copied(),
        })
        .collect();
    LaneSnapshot {
        primary: runtime.primary_lane(),
        lanes,
        collapsed: runtime.collapsed_lanes().to_vec(),
        split: runtime.split_plan(),
    }
}

pub fn siege_snapshot(runtime: &AiRuntime) -> SiegeSnapshot {
    let grid = runtime.siege();
    SiegeSnapshot {
        tasks: runtime.tasks().to_vec(),
        assignments: runtime.assignments().to_vec(),
        escorts: runtime.escorts().iter().map(|(a, b)| (*a, *b)).collect(),
        suppression: runtime.suppression().iter().map(|(a, b)| (*a, *b)).collect(),
        segments: grid
            .segments()
            .map(|s| SegmentStatus {
                id: s.id,
                kind: s.kind,
                hp: s.hp,
                breached: grid.is_breached(s.id),
            })
            .collect(),
        blocked_cells: grid.blocked_cell_count(),
        blocked_edges: grid.blocked_edge_count(),
        regroup_countdown: runtime.regroup_countdown(),
    }
}

pub fn morale_summary(runtime: &AiRuntime) -> MoraleSummary {
    runtime.morale().summary()
}

pub fn counter_snapshot(runtime: &AiRuntime) -> CounterSnapshot {
    CounterSnapshot {
        observed_ticks: runtime.observer().observed_ticks(),
        style: runtime.observer().learned().copied(),
        weights: runtime.counter_weights().cloned(),
        maneuver: runtime.maneuver(),
    }
}

pub fn runtime_snapshot(runtime: &AiRuntime) -> RuntimeSnapshot {
    RuntimeSnapshot {
        team: runtime.team(),
        lanes: lane_snapshot(runtime),
        siege: siege_snapshot(runtime),
        morale: morale_summary(runtime),
        counter: counter_snapshot(runtime),
    }
}
