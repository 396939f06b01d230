//! Battlefield intelligence for AI-controlled factions
//!
//! Architecture: one `AiRuntime` per faction drives the per-tick pipeline.
//! - `influence` scores hexes, `lanes` turns scores into advance corridors
//! - `siege` and `tasks` plan and staff breaches
//! - `morale` and `counterplay` adjust units and maneuver choice
//! - `debug` exposes read-only snapshots for tooling

pub mod counterplay;
pub mod debug;
pub mod influence;
pub mod lanes;
pub mod morale;
pub mod runtime;
pub mod siege;
pub mod tasks;

pub use counterplay::{
    choose_maneuver, CounterAdjustedScorer, CounterWeights, Maneuver, ManeuverScorer,
    PersonalityScorer, Playbook, StyleObserver, StyleVector, TickSignals,
};
pub use debug::{runtime_snapshot, RuntimeSnapshot};
pub use influence::{FieldCell, HexScore, InfluenceField};
pub use lanes::{
    compute_split_plan, evaluate_lane_health, make_lanes, pick_primary_lane, Lane, LaneHealth,
    LaneId, SplitPlan,
};
pub use morale::{MoraleBook, MoraleState, MoraleStatus, MoraleSummary};
pub use runtime::{tick_runtime, AiRuntime};
pub use siege::{Segment, SegmentKind, SiegeGrid, SiegePlanner, SiegeTask, TaskKind};
pub use tasks::{assign_tasks, Assignment};
