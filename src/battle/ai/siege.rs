//! Siege grid and breach planner
//!
//! The grid owns every registered wall, gate and tower. A segment's blocked
//! edges and cells are present in the derived sets exactly while it stands;
//! destruction removes them at once and fires a single `Breach` event.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::constants::{
    ARMOR_MITIGATION, BOMB_DPS_FACTOR, MAX_SECONDARY_WALLS, RAM_DPS_FACTOR, SAP_DPS_FACTOR,
};
use crate::battle::events::{BattleEventType, EventSink};
use crate::battle::hex::{HexCoord, HexEdge};
use crate::battle::pathfinding::Passability;
use crate::core::error::{EngineError, Result};
use crate::core::rng::BattleRng;
use crate::core::types::{SegmentId, TaskId, TeamId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Wall,
    Gate,
    Tower,
}

/// A destructible structure piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub kind: SegmentKind,
    pub hex: HexCoord,
    pub hp: f32,
    pub max_hp: f32,
    pub armor: f32,
    #[serde(default)]
    pub blocked_edges: Vec<HexEdge>,
    #[serde(default)]
    pub blocked_cells: Vec<HexCoord>,
}

impl Segment {
    /// Segment blocking its own cell
    pub fn new(id: SegmentId, kind: SegmentKind, hex: HexCoord, hp: f32, armor: f32) -> Self {
        Self {
            id,
            kind,
            hex,
            hp,
            max_hp: hp,
            armor,
            blocked_edges: Vec::new(),
            blocked_cells: vec![hex],
        }
    }

    pub fn with_edges(mut self, edges: Vec<HexEdge>) -> Self {
        self.blocked_edges = edges;
        self
    }

    pub fn alive(&self) -> bool {
        self.hp > 0.0
    }
}

/// Result of one damage application
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    pub effective: f32,
    pub hp: f32,
    pub destroyed: bool,
}

/// Effective damage after armor: `max(0, dps - armor * 0.5)`
pub fn effective_damage(dps: f32, armor: f32) -> f32 {
    (dps - armor * ARMOR_MITIGATION).max(0.0)
}

#[derive(Debug, Clone)]
pub struct SiegeGrid {
    team: TeamId,
    segments: BTreeMap<SegmentId, Segment>,
    blocked_edges: AHashMap<HexEdge, u32>,
    blocked_cells: AHashMap<HexCoord, u32>,
    breached: BTreeSet<SegmentId>,
}

impl SiegeGrid {
    pub fn new(team: TeamId) -> Self {
        Self {
            team,
            segments: BTreeMap::new(),
            blocked_edges: AHashMap::new(),
            blocked_cells: AHashMap::new(),
            breached: BTreeSet::new(),
        }
    }

    /// Register a segment; ids already known are ignored
    pub fn register(&mut self, mut segment: Segment) -> bool {
        if self.segments.contains_key(&segment.id) {
            return false;
        }
        segment.hp = segment.hp.max(0.0);
        if segment.alive() {
            for edge in &segment.blocked_edges {
                *self.blocked_edges.entry(*edge).or_insert(0) += 1;
            }
            for cell in &segment.blocked_cells {
                *self.blocked_cells.entry(*cell).or_insert(0) += 1;
            }
        } else {
            // Arrived already destroyed; there is nothing left to breach
            self.breached.insert(segment.id);
        }
        self.segments.insert(segment.id, segment);
        true
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    /// All segments in id order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn alive_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values().filter(|s| s.alive())
    }

    pub fn is_breached(&self, id: SegmentId) -> bool {
        self.breached.contains(&id)
    }

    /// Apply `dps` to a segment, emitting `Breach` the first time it falls
    ///
    /// Unknown or already destroyed segments are left alone and report `None`.
    pub fn damage_segment(
        &mut self,
        id: SegmentId,
        dps: f32,
        tick: Tick,
        sink: &mut impl EventSink,
    ) -> Option<DamageReport> {
        let segment = self.segments.get_mut(&id)?;
        if !segment.alive() {
            return None;
        }

        let effective = effective_damage(dps, segment.armor);
        segment.hp = (segment.hp - effective).max(0.0);
        let report = DamageReport {
            effective,
            hp: segment.hp,
            destroyed: !segment.alive(),
        };

        if report.destroyed {
            let segment = segment.clone();
            self.remove_blocks(&segment);
            if self.breached.insert(id) {
                tracing::info!(segment = id.0, kind = ?segment.kind, tick, "segment breached");
                sink.emit(
                    tick,
                    BattleEventType::Breach {
                        team: self.team,
                        segment: id,
                        hex: segment.hex,
                    },
                    format!("{:?} {} breached", segment.kind, id.0),
                );
            }
        }
        Some(report)
    }

    /// Take down a segment whose `Breach` another grid already logged
    ///
    /// Nothing is emitted. Returns true when this grid still held the segment.
    pub fn acknowledge_breach(&mut self, id: SegmentId) -> bool {
        let Some(segment) = self.segments.get_mut(&id) else {
            return false;
        };
        if !self.breached.insert(id) {
            return false;
        }
        let standing = segment.alive();
        segment.hp = 0.0;
        if standing {
            let segment = segment.clone();
            self.remove_blocks(&segment);
        }
        true
    }

    fn remove_blocks(&mut self, segment: &Segment) {
        for edge in &segment.blocked_edges {
            release(&mut self.blocked_edges, edge);
        }
        for cell in &segment.blocked_cells {
            release(&mut self.blocked_cells, cell);
        }
    }

    pub fn blocked_cell_count(&self) -> usize {
        self.blocked_cells.len()
    }

    pub fn blocked_edge_count(&self) -> usize {
        self.blocked_edges.len()
    }

    /// Recompute the derived sets from live segments and compare
    pub fn verify_invariants(&self) -> Result<()> {
        let mut edges: AHashMap<HexEdge, u32> = AHashMap::new();
        let mut cells: AHashMap<HexCoord, u32> = AHashMap::new();
        for segment in self.alive_segments() {
            for edge in &segment.blocked_edges {
                *edges.entry(*edge).or_insert(0) += 1;
            }
            for cell in &segment.blocked_cells {
                *cells.entry(*cell).or_insert(0) += 1;
            }
        }
        if edges != self.blocked_edges {
            return Err(EngineError::Invariant(
                "blocked edges out of sync with live segments".into(),
            ));
        }
        if cells != self.blocked_cells {
            return Err(EngineError::Invariant(
                "blocked cells out of sync with live segments".into(),
            ));
        }
        if let Some(dead) = self.segments.values().find(|s| !s.alive() && !self.breached.contains(&s.id)) {
            return Err(EngineError::Invariant(format!(
                "segment {} destroyed without breach record",
                dead.id.0
            )));
        }
        Ok(())
    }
}

fn release<K: std::hash::Hash + Eq>(counts: &mut AHashMap<K, u32>, key: &K) {
    if let Some(n) = counts.get_mut(key) {
        *n -= 1;
        if *n == 0 {
            counts.remove(key);
        }
    }
}

impl Passability for SiegeGrid {
    fn is_cell_blocked(&self, cell: HexCoord) -> bool {
        self.blocked_cells.contains_key(&cell)
    }

    fn is_edge_blocked(&self, a: HexCoord, b: HexCoord) -> bool {
        self.blocked_edges.contains_key(&HexEdge::new(a, b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Ram,
    Sap,
    Ladder,
    Bomb,
}

impl TaskKind {
    /// Fraction of the worker's atk applied to the target each tick
    pub fn dps_factor(&self) -> f32 {
        match self {
            TaskKind::Ram => RAM_DPS_FACTOR,
            TaskKind::Sap => SAP_DPS_FACTOR,
            TaskKind::Bomb => BOMB_DPS_FACTOR,
            TaskKind::Ladder => 0.0,
        }
    }

    /// Ram and Ladder crews draw courage from their work
    pub fn steadies_crew(&self) -> bool {
        matches!(self, TaskKind::Ram | TaskKind::Ladder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiegeTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub target: SegmentId,
    /// 0.0 to 1.0
    pub progress: f32,
}

impl SiegeTask {
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Issues task ids and builds breach plans
#[derive(Debug, Clone, Default)]
pub struct SiegePlanner {
    next_task_id: u32,
}

impl SiegePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn task(&mut self, kind: TaskKind, target: SegmentId) -> SiegeTask {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        SiegeTask {
            id,
            kind,
            target,
            progress: 0.0,
        }
    }

    /// Build a breach plan; the first task is the primary
    ///
    /// Preferred gate -> Ram; else lowest-armor wall -> Sap; else any standing
    /// segment -> Bomb. Up to two more walls may draw a Ladder or Bomb task,
    /// gated by `secondary_chance` rolls on `rng`.
    pub fn plan_breach<'a>(
        &mut self,
        segments: impl IntoIterator<Item = &'a Segment>,
        gate_preferred: bool,
        secondary_chance: f32,
        rng: &mut BattleRng,
    ) -> Vec<SiegeTask> {
        let standing: Vec<&Segment> = segments.into_iter().filter(|s| s.alive()).collect();
        let mut walls: Vec<&Segment> = standing
            .iter()
            .copied()
            .filter(|s| s.kind == SegmentKind::Wall)
            .collect();
        walls.sort_by_key(|s| (OrderedFloat(s.armor), OrderedFloat(s.hp), s.id));

        let gate = standing
            .iter()
            .copied()
            .filter(|s| s.kind == SegmentKind::Gate)
            .min_by_key(|s| (OrderedFloat(s.hp), s.id));

        let primary = match (gate, walls.first()) {
            (Some(gate), _) if gate_preferred => Some((TaskKind::Ram, gate.id)),
            (_, Some(wall)) => Some((TaskKind::Sap, wall.id)),
            _ => standing
                .iter()
                .min_by_key(|s| (OrderedFloat(s.hp), s.id))
                .map(|s| (TaskKind::Bomb, s.id)),
        };

        let Some((kind, target)) = primary else {
            return Vec::new();
        };
        let mut tasks = vec![self.task(kind, target)];

        for wall in walls
            .iter()
            .filter(|w| w.id != target)
            .take(MAX_SECONDARY_WALLS)
        {
            if rng.gen::<f32>() < secondary_chance {
                let kind = if rng.gen::<bool>() {
                    TaskKind::Ladder
                } else {
                    TaskKind::Bomb
                };
                tasks.push(self.task(kind, wall.id));
            }
        }

        tracing::debug!(tasks = tasks.len(), primary = ?kind, target = target.0, "breach planned");
        tasks
    }
}
