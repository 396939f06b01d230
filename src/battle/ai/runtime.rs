//! Per-faction AI runtime and the tick pipeline
//!
//! One `AiRuntime` per controlled faction, owned by the battle session and
//! handed the snapshot once per tick. A tick runs to completion: decay and
//! re-ingest the field, re-score lanes, update siege work, update morale,
//! feed the learner, then write intents and events back.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

use crate::battle::ai::counterplay::{
    choose_maneuver, CounterWeights, Maneuver, ManeuverScorer, PersonalityScorer, StyleObserver,
    TickSignals,
};
use crate::battle::ai::influence::InfluenceField;
use crate::battle::ai::lanes::{
    compute_split_plan, evaluate_lane_health, healthiest_lane, lane_of_hex, make_lanes,
    pick_primary_lane_excluding, Lane, LaneCounters, LaneHealth, LaneId, SplitPlan,
};
use crate::battle::ai::morale::{aura_strength, terror_pressure, MoraleBook, MoraleInputs, MoraleStatus};
use crate::battle::ai::siege::{SiegeGrid, SiegePlanner, SiegeTask, TaskKind};
use crate::battle::ai::tasks::{assign_escorts, assign_suppression, assign_tasks, Assignment};
use crate::battle::constants::{
    ALLY_RADIUS, LANE_PRESSURE_PER_ENEMY, LANE_PRESSURE_RADIUS, RANGED_HIT_WINDOW, TERROR_MEMORY_TICKS,
};
use crate::battle::events::{BattleEvent, BattleEventType, EventSink, HotSpot, LaneSwitchReason};
use crate::battle::hex::HexCoord;
use crate::battle::pathfinding::{find_path, reaches, Passability};
use crate::battle::snapshot::{BattleSnapshot, CommanderPersonality, Intent, UnitTrait, UnitView};
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::core::rng::{BattleRng, RngStream};
use crate::core::types::{SegmentId, TaskId, TeamId, Tick, UnitId};

#[derive(Debug, Clone)]
pub struct AiRuntime {
    team: TeamId,
    config: EngineConfig,
    rng: BattleRng,
    field: InfluenceField,
    anchor: HexCoord,

    lanes: Vec<Lane>,
    primary: Option<LaneId>,
    health: Vec<LaneHealth>,
    collapsed: Vec<LaneId>,
    counters: LaneCounters,
    last_health_eval: Tick,
    health_hold: bool,
    split: Option<SplitPlan>,

    siege: SiegeGrid,
    planner: SiegePlanner,
    tasks: Vec<SiegeTask>,
    assignments: Vec<Assignment>,
    regroup_countdown: u32,
    breach_pending: bool,
    escorts: BTreeMap<UnitId, UnitId>,
    suppression: BTreeMap<UnitId, UnitId>,

    morale: MoraleBook,
    leadership: f32,
    terror: Vec<(Tick, HexCoord, f32)>,
    scars_changed: bool,

    observer: StyleObserver,
    counter_weights: Option<CounterWeights>,
    maneuver: Maneuver,

    cursor: usize,
    last_tick: Option<Tick>,
}

impl AiRuntime {
    /// Attach a runtime for `team` to a battle
    ///
    /// Lanes come from the faction's anchor and facing; a team without a
    /// faction entry gets no lanes and only tracks morale and siege state.
    pub fn attach(team: TeamId, battle_seed: u64, config: EngineConfig, snapshot: &BattleSnapshot) -> Self {
        let rng = BattleRng::for_stream(battle_seed, u64::from(team.0), RngStream::Tactical);
        let faction = snapshot.faction(team);
        let (anchor, lanes) = match faction {
            Some(f) => (
                f.anchor,
                make_lanes(
                    f.anchor,
                    f.facing,
                    config.lanes.depth,
                    config.lanes.spread,
                    config.lanes.waypoints,
                ),
            ),
            None => (HexCoord::default(), Vec::new()),
        };
        let leadership = faction
            .and_then(|f| f.commander.as_ref())
            .map_or(0.5, |c| c.personality.leadership);

        let mut morale = MoraleBook::new();
        for unit in snapshot.units.iter().filter(|u| u.team == team && u.alive()) {
            morale.attach(unit, leadership);
        }
        let mut siege = SiegeGrid::new(team);
        for segment in &snapshot.siege {
            siege.register(segment.clone());
        }

        tracing::info!(
            team = team.0,
            lanes = lanes.len(),
            segments = snapshot.siege.len(),
            "ai runtime attached"
        );

        Self {
            team,
            rng: rng.clone(),
            field: InfluenceField::new(rng.seed()),
            anchor,
            lanes,
            primary: None,
            health: Vec::new(),
            collapsed: Vec::new(),
            counters: LaneCounters::default(),
            last_health_eval: snapshot.tick,
            health_hold: false,
            split: None,
            siege,
            planner: SiegePlanner::new(),
            tasks: Vec::new(),
            assignments: Vec::new(),
            regroup_countdown: config.siege.regroup_interval.max(1),
            breach_pending: false,
            escorts: BTreeMap::new(),
            suppression: BTreeMap::new(),
            morale,
            leadership,
            terror: Vec::new(),
            scars_changed: false,
            observer: StyleObserver::new(config.learner.window, config.learner.learn_after as u64),
            counter_weights: None,
            maneuver: Maneuver::Hold,
            cursor: snapshot.events.len(),
            last_tick: None,
            config,
        }
    }

    /// Run one tick with the commander-personality scoring hook
    pub fn tick(&mut self, snapshot: &mut BattleSnapshot) {
        let personality = snapshot
            .faction(self.team)
            .and_then(|f| f.commander.as_ref())
            .map(|c| c.personality)
            .unwrap_or_else(CommanderPersonality::default);
        self.tick_with_scorer(snapshot, &PersonalityScorer { personality });
    }

    /// Run one tick, wrapping the host's own maneuver scorer
    ///
    /// A second call for the same or an earlier tick does nothing.
    pub fn tick_with_scorer(&mut self, snapshot: &mut BattleSnapshot, scorer: &dyn ManeuverScorer) {
        let tick = snapshot.tick;
        if self.last_tick.is_some_and(|last| tick <= last) {
            return;
        }
        self.last_tick = Some(tick);

        let fresh = snapshot.events.since(self.cursor);
        let observations: Vec<BattleEvent> = fresh
            .iter()
            .filter(|e| e.event_type.is_observation())
            .cloned()
            .collect();
        let announced: Vec<SegmentId> = fresh
            .iter()
            .filter_map(|e| match e.event_type {
                BattleEventType::Breach { segment, .. } => Some(segment),
                _ => None,
            })
            .collect();
        let (friendly, enemies): (Vec<UnitView>, Vec<UnitView>) =
            snapshot.units.iter().cloned().partition(|u| u.team == self.team);

        self.ingest_observations(&observations, &announced, tick, &mut snapshot.events);
        self.refresh_field(snapshot);
        self.update_lanes(snapshot);
        self.update_siege(snapshot, &friendly);
        self.update_support(snapshot, &friendly, &enemies);
        let routed = self.update_morale(snapshot, &friendly);
        self.update_learner(snapshot, &observations, routed);

        let playbook = snapshot.opponent_of(self.team).and_then(|f| f.playbook);
        self.maneuver = choose_maneuver(scorer, self.counter_weights.as_ref(), playbook);
        self.write_intents(snapshot, &friendly, &enemies);
        self.emit_overlay(snapshot);

        self.cursor = snapshot.events.len();
        debug_assert!(self.verify_invariants().is_ok());
    }

    fn ingest_observations(
        &mut self,
        observations: &[BattleEvent],
        announced: &[SegmentId],
        tick: Tick,
        sink: &mut impl EventSink,
    ) {
        self.scars_changed = !self.morale.scars().is_empty();
        self.morale.scars_mut().decay();

        // Another runtime already logged these; mirror them before any strike lands
        for segment in announced {
            if self.siege.acknowledge_breach(*segment) {
                tracing::debug!(team = self.team.0, segment = segment.0, "breach mirrored");
                self.breach_pending = true;
            }
        }

        for event in observations {
            match &event.event_type {
                BattleEventType::UnitKilled { team, position, .. } if *team == self.team => {
                    if let Some(lane) = lane_of_hex(&self.lanes, *position) {
                        self.counters.record_casualty(lane);
                    }
                    self.morale.scars_mut().add(
                        *position,
                        self.config.morale.scar_steps,
                        self.config.morale.scar_radius,
                    );
                    self.scars_changed = true;
                }
                BattleEventType::UnitMoved { team, from, to, .. } if *team == self.team => {
                    let retreat = lane_of_hex(&self.lanes, *from)
                        .and_then(|id| self.lanes.iter().find(|l| l.id == id))
                        .filter(|lane| to.distance(&lane.frontier) > from.distance(&lane.frontier))
                        .map(|lane| lane.id);
                    if let Some(lane) = retreat {
                        self.counters.record_lost_ground(lane);
                    }
                }
                BattleEventType::Terror { origin, strength } => {
                    self.terror.push((event.tick, *origin, *strength));
                }
                BattleEventType::SegmentStruck { segment, dps } => {
                    if let Some(report) = self.siege.damage_segment(*segment, *dps, tick, &mut *sink) {
                        self.breach_pending |= report.destroyed;
                    }
                }
                _ => {}
            }
        }
        self.terror.retain(|(at, _, _)| at + TERROR_MEMORY_TICKS > tick);
    }

    fn refresh_field(&mut self, snapshot: &BattleSnapshot) {
        let cfg = &self.config.influence;
        self.field.decay_for_tick(snapshot.tick, cfg.decay_factor);

        for unit in snapshot.units.iter().filter(|u| u.alive()) {
            if unit.team == self.team {
                self.field
                    .add_support(unit.position, unit.stats.def * cfg.support_scale * unit.hp_fraction());
            } else {
                self.field
                    .add_threat(unit.position, unit.stats.atk * cfg.threat_scale * unit.hp_fraction());
            }
        }
        for cell in &snapshot.terrain {
            self.field.add_cover(cell.hex, cell.cover);
            self.field.add_hazard(cell.hex, cell.hazard);
        }
        if let Some(lane) = self.primary.and_then(|id| self.lanes.iter().find(|l| l.id == id)) {
            self.field.add_intent(lane.frontier_goal(), cfg.lane_intent_weight);
        }
        if let Some(target) = self.tasks.first().and_then(|t| self.siege.segment(t.target)) {
            self.field.add_intent(target.hex, cfg.siege_intent_weight);
        }
    }

    fn update_lanes(&mut self, snapshot: &mut BattleSnapshot) {
        if self.lanes.is_empty() {
            return;
        }
        let tick = snapshot.tick;

        let enemies: Vec<HexCoord> = snapshot
            .units
            .iter()
            .filter(|u| u.team != self.team && u.alive())
            .map(|u| u.position)
            .collect();
        for lane in &mut self.lanes {
            let near = enemies
                .iter()
                .filter(|e| lane.distance_to(**e) <= LANE_PRESSURE_RADIUS)
                .count();
            lane.pressure = near as f32 * LANE_PRESSURE_PER_ENEMY;
        }

        let health_due = tick >= self.last_health_eval + self.config.lanes.health_interval.max(1);
        let mut lost_primary = false;
        if health_due {
            self.health = evaluate_lane_health(&self.field, &self.lanes, &self.counters);
            self.collapsed = self.health.iter().filter(|h| h.collapsed).map(|h| h.lane).collect();
            self.counters = LaneCounters::default();
            self.last_health_eval = tick;
            self.health_hold = false;
            if !self.collapsed.is_empty() {
                tracing::debug!(team = self.team.0, collapsed = ?self.collapsed, "lanes collapsed");
            }
            lost_primary = self.primary.is_some_and(|p| self.collapsed.contains(&p));
        }

        // A health reassignment stands until the next evaluation
        let (next, reason) = if lost_primary {
            self.health_hold = true;
            (healthiest_lane(&self.lanes, &self.health), LaneSwitchReason::Health)
        } else if self.health_hold {
            (self.primary, LaneSwitchReason::Health)
        } else {
            (
                pick_primary_lane_excluding(&self.field, &self.lanes, &self.collapsed),
                LaneSwitchReason::Score,
            )
        };

        let Some(next) = next else {
            return;
        };
        let previous = self.primary;
        if previous != Some(next) {
            self.primary = Some(next);
            tracing::info!(team = self.team.0, from = ?previous, to = ?next, ?reason, "primary lane switched");
            snapshot.events.emit(
                tick,
                BattleEventType::LaneSwitch {
                    team: self.team,
                    from: previous,
                    to: next,
                    reason,
                },
                format!("primary lane -> {:?}", next),
            );
        }
        if previous != Some(next) || health_due {
            let risk = snapshot
                .faction(self.team)
                .and_then(|f| f.commander.as_ref())
                .map_or(0.0, |c| c.personality.risk);
            self.split = Some(compute_split_plan(
                &self.field,
                &self.lanes,
                next,
                &self.collapsed,
                risk,
                &mut self.rng,
            ));
        }
    }

    fn update_siege(&mut self, snapshot: &mut BattleSnapshot, friendly: &[UnitView]) {
        let tick = snapshot.tick;
        for segment in &snapshot.siege {
            if self.siege.segment(segment.id).is_none() {
                self.siege.register(segment.clone());
            }
        }
        if !snapshot.faction(self.team).is_some_and(|f| f.besieging) {
            self.tasks.clear();
            self.assignments.clear();
            return;
        }

        let mut breached = std::mem::take(&mut self.breach_pending);
        let ladder_rate = self.config.siege.ladder_progress_per_tick;

        for assignment in &self.assignments {
            let Some(unit) = friendly.iter().find(|u| u.id == assignment.unit && u.alive()) else {
                continue;
            };
            let Some(task) = self.tasks.iter_mut().find(|t| t.id == assignment.task) else {
                continue;
            };
            let (hex, max_hp) = match self.siege.segment(task.target) {
                Some(s) if s.alive() => (s.hex, s.max_hp),
                _ => continue,
            };
            if task.is_complete() || unit.position.distance(&hex) > 1 {
                continue;
            }

            if task.kind == TaskKind::Ladder {
                task.progress = (task.progress + ladder_rate).min(1.0);
                continue;
            }
            let dps = unit.stats.atk * task.kind.dps_factor();
            snapshot.events.emit(
                tick,
                BattleEventType::SegmentStruck {
                    segment: task.target,
                    dps,
                },
                format!("unit {} works {:?} on segment {}", unit.id.0, task.kind, task.target.0),
            );
            if let Some(report) = self.siege.damage_segment(task.target, dps, tick, &mut snapshot.events) {
                if max_hp > 0.0 {
                    task.progress = (1.0 - report.hp / max_hp).clamp(0.0, 1.0);
                }
                breached |= report.destroyed;
            }
        }

        let siege = &self.siege;
        self.tasks
            .retain(|t| siege.segment(t.target).is_some_and(|s| s.alive()));
        let tasks = &self.tasks;
        let routing = &self.morale;
        self.assignments.retain(|a| {
            tasks.iter().any(|t| t.id == a.task)
                && friendly.iter().any(|u| u.id == a.unit && u.alive())
                && routing
                    .get(a.unit)
                    .map_or(true, |s| s.status() != MoraleStatus::Routing)
        });

        self.regroup_countdown = self.regroup_countdown.saturating_sub(1);
        let regroup = self.regroup_countdown == 0;
        if self.tasks.is_empty() || breached || regroup {
            self.tasks = self.planner.plan_breach(
                self.siege.alive_segments(),
                self.config.siege.prefer_gate,
                self.config.siege.secondary_task_chance,
                &mut self.rng,
            );
            self.assignments.clear();
            self.regroup_countdown = self.config.siege.regroup_interval.max(1);
            tracing::debug!(
                team = self.team.0,
                tasks = self.tasks.len(),
                breached,
                regroup,
                "siege replanned"
            );
        }

        let taken: BTreeSet<UnitId> = self.assignments.iter().map(|a| a.unit).collect();
        let covered: BTreeSet<TaskId> = self.assignments.iter().map(|a| a.task).collect();
        let open: Vec<SiegeTask> = self
            .tasks
            .iter()
            .filter(|t| !covered.contains(&t.id))
            .copied()
            .collect();
        if !open.is_empty() {
            let fresh = assign_tasks(&open, friendly.iter().filter(|u| !taken.contains(&u.id)));
            if !fresh.is_empty() {
                tracing::debug!(team = self.team.0, assigned = fresh.len(), "siege tasks assigned");
            }
            self.assignments.extend(fresh);
        }
    }

    fn update_support(&mut self, snapshot: &mut BattleSnapshot, friendly: &[UnitView], enemies: &[UnitView]) {
        let tick = snapshot.tick;
        let mut taken: BTreeSet<UnitId> = self.assignments.iter().map(|a| a.unit).collect();

        let workers: Vec<(UnitId, HexCoord, TaskKind)> = self
            .assignments
            .iter()
            .filter_map(|a| {
                let task = self.tasks.iter().find(|t| t.id == a.task)?;
                let unit = friendly.iter().find(|u| u.id == a.unit)?;
                Some((unit.id, unit.position, task.kind))
            })
            .collect();
        let wards: Vec<(UnitId, HexCoord)> = workers
            .iter()
            .filter(|(_, _, kind)| matches!(kind, TaskKind::Ram | TaskKind::Sap | TaskKind::Ladder))
            .map(|(id, at, _)| (*id, *at))
            .collect();
        self.escorts = assign_escorts(&wards, friendly, &mut taken).into_iter().collect();

        let worker_hexes: Vec<HexCoord> = workers.iter().map(|(_, at, _)| *at).collect();
        let next: BTreeMap<UnitId, UnitId> =
            assign_suppression(friendly, enemies, &worker_hexes, &mut taken, &self.siege)
                .into_iter()
                .collect();
        for (unit, target) in &next {
            if self.suppression.get(unit) != Some(target) {
                snapshot.events.emit(
                    tick,
                    BattleEventType::SuppressionAssign {
                        team: self.team,
                        unit: *unit,
                        target: *target,
                    },
                    format!("unit {} suppresses unit {}", unit.0, target.0),
                );
            }
        }
        self.suppression = next;
    }

    /// Returns true when a unit broke this tick
    fn update_morale(&mut self, snapshot: &mut BattleSnapshot, friendly: &[UnitView]) -> bool {
        let tick = snapshot.tick;
        let living: Vec<&UnitView> = friendly.iter().filter(|u| u.alive()).collect();
        let alive: BTreeSet<UnitId> = living.iter().map(|u| u.id).collect();

        self.morale.retain(|id| alive.contains(&id));
        for unit in &living {
            if !self.morale.contains(unit.id) {
                self.morale.attach(unit, self.leadership);
            }
        }
        let refresh = self.config.morale.modifier_refresh_interval;
        if self.scars_changed || (refresh > 0 && tick % refresh == 0) {
            self.morale.refresh_offsets(&living, self.leadership);
        }

        let commander = snapshot.commander_position(self.team);
        let mut sources: Vec<HexCoord> = commander.into_iter().collect();
        sources.extend(
            living
                .iter()
                .filter(|u| u.has_trait(UnitTrait::StandardBearer))
                .map(|u| u.position),
        );
        let ranged_targets: BTreeSet<UnitId> = snapshot
            .events
            .recent_hits(RANGED_HIT_WINDOW)
            .iter()
            .filter_map(|e| match e.event_type {
                BattleEventType::UnitHit {
                    target, ranged: true, ..
                } => Some(target),
                _ => None,
            })
            .collect();
        let terror: Vec<(HexCoord, f32)> = self.terror.iter().map(|(_, at, s)| (*at, *s)).collect();
        let focused: BTreeSet<UnitId> = self
            .assignments
            .iter()
            .filter(|a| {
                self.tasks
                    .iter()
                    .any(|t| t.id == a.task && t.kind.steadies_crew())
            })
            .map(|a| a.unit)
            .collect();

        let mut routed = false;
        for unit in &living {
            let allies = living
                .iter()
                .filter(|o| o.id != unit.id && o.position.distance(&unit.position) <= ALLY_RADIUS)
                .count();
            let inputs = MoraleInputs {
                hp_lost_fraction: self.morale.take_hp_loss(unit),
                allies_nearby: allies,
                ranged_hit_recently: ranged_targets.contains(&unit.id),
                in_cover: snapshot
                    .terrain_at(unit.position)
                    .is_some_and(|t| t.cover > 0.0),
                aura_strength: aura_strength(unit.position, &sources, self.config.morale.aura_radius),
                siege_focus: focused.contains(&unit.id),
                weather: snapshot.weather,
                terror: terror_pressure(unit.position, &terror),
            };
            let before = self.morale.get(unit.id).map(|s| s.status());
            let after = self
                .morale
                .update(unit.id, &inputs, self.team, tick, &mut snapshot.events);
            if after == Some(MoraleStatus::Routing) && before != Some(MoraleStatus::Routing) {
                routed = true;
            }
        }

        let positions: Vec<(UnitId, HexCoord)> = living.iter().map(|u| (u.id, u.position)).collect();
        let m = &self.config.morale;
        self.morale.try_rally(
            tick,
            !self.collapsed.is_empty(),
            commander,
            &positions,
            m.rally_boost,
            m.rally_radius,
            m.rally_trigger_fraction,
            self.team,
            &mut snapshot.events,
        );

        for unit in snapshot.units.iter_mut().filter(|u| u.team == self.team) {
            if let Some(state) = self.morale.get(unit.id) {
                unit.morale = state.value;
                unit.morale_status = state.status();
            }
        }
        routed
    }

    fn update_learner(&mut self, snapshot: &mut BattleSnapshot, observations: &[BattleEvent], routed: bool) {
        let units = &snapshot.units;
        let mut signals = TickSignals::from_events(observations, self.team, self.anchor, |id| {
            units.iter().find(|u| u.id == id).map(|u| u.team)
        });
        signals.collapse |= routed;

        if let Some(style) = self.observer.observe(signals) {
            let weights = CounterWeights::from_style(&style);
            tracing::info!(
                team = self.team.0,
                flank = style.flank_rate,
                volley = style.volley_rate,
                push = style.push_rate,
                collapse = style.collapse_rate,
                "opponent style learned"
            );
            snapshot.events.emit(
                snapshot.tick,
                BattleEventType::CounterLearned {
                    team: self.team,
                    style,
                },
                format!("learned {} counter adjustments", weights.deltas.len()),
            );
            self.counter_weights = Some(weights);
        }
    }

    /// Nearest open hex beside `target` that `from` can actually reach
    fn approach_hex(&self, from: HexCoord, target: HexCoord) -> HexCoord {
        let mut candidates: Vec<HexCoord> = target
            .neighbors()
            .into_iter()
            .filter(|h| !self.siege.is_cell_blocked(*h) && !self.siege.is_edge_blocked(*h, target))
            .collect();
        candidates.sort_by_key(|h| (h.distance(&from), *h));
        let limit = self.config.siege.path_node_limit;
        candidates
            .iter()
            .copied()
            .find(|h| reaches(&find_path(&self.siege, from, *h, limit), *h))
            .or_else(|| candidates.first().copied())
            .unwrap_or(target)
    }

    fn write_intents(&self, snapshot: &mut BattleSnapshot, friendly: &[UnitView], enemies: &[UnitView]) {
        let mut intents: BTreeMap<UnitId, Intent> = BTreeMap::new();

        for assignment in &self.assignments {
            let Some(unit) = friendly.iter().find(|u| u.id == assignment.unit) else {
                continue;
            };
            let Some(task) = self.tasks.iter().find(|t| t.id == assignment.task) else {
                continue;
            };
            let Some(segment) = self.siege.segment(task.target) else {
                continue;
            };
            let intent = if task.kind == TaskKind::Ladder && task.is_complete() {
                Intent::MoveTo { hex: segment.hex }
            } else {
                Intent::SiegeWork {
                    task: task.id,
                    kind: task.kind,
                    segment: task.target,
                    approach: self.approach_hex(unit.position, segment.hex),
                }
            };
            intents.insert(unit.id, intent);
        }
        for (escort, ward) in &self.escorts {
            intents.entry(*escort).or_insert(Intent::Escort { unit: *ward });
        }
        for (unit, target) in &self.suppression {
            intents.entry(*unit).or_insert(Intent::Suppress { target: *target });
        }
        for unit in friendly.iter().filter(|u| u.alive()) {
            let routing = self
                .morale
                .get(unit.id)
                .is_some_and(|s| s.status() == MoraleStatus::Routing);
            if routing {
                intents.insert(unit.id, Intent::Regroup { toward: self.anchor });
            }
        }

        self.write_lane_intents(&mut intents, friendly, enemies);

        for unit in snapshot.units.iter_mut().filter(|u| u.team == self.team) {
            if let Some(intent) = intents.get(&unit.id) {
                unit.intent = Some(*intent);
            }
        }
    }

    /// Free units follow the primary lane, or the secondary one when split
    fn write_lane_intents(
        &self,
        intents: &mut BTreeMap<UnitId, Intent>,
        friendly: &[UnitView],
        enemies: &[UnitView],
    ) {
        let Some(primary) = self.primary.and_then(|id| self.lane(id)) else {
            return;
        };
        let mut free: Vec<&UnitView> = friendly
            .iter()
            .filter(|u| u.alive() && !intents.contains_key(&u.id))
            .collect();
        free.sort_by_key(|u| u.id);

        let mut secondary_units = BTreeSet::new();
        let secondary = self
            .split
            .and_then(|plan| plan.secondary.zip(Some(plan.secondary_share)))
            .and_then(|(id, share)| self.lane(id).map(|lane| (lane, share)));
        if let Some((lane, share)) = secondary {
            let count = (free.len() as f32 * share).floor() as usize;
            let mut nearest = free.clone();
            nearest.sort_by_key(|u| (lane.distance_to(u.position), u.id));
            secondary_units.extend(nearest.iter().take(count).map(|u| u.id));
        }

        for unit in free {
            let lane = match secondary {
                Some((lane, _)) if secondary_units.contains(&unit.id) => lane,
                _ => primary,
            };
            let adjacent_enemy = enemies
                .iter()
                .filter(|e| e.alive() && e.position.distance(&unit.position) <= 1)
                .min_by_key(|e| (e.position.distance(&unit.position), e.id));

            let intent = match (self.maneuver, adjacent_enemy) {
                (Maneuver::Hold, _) => Intent::Hold { at: unit.position },
                (Maneuver::Reserve, _) => Intent::MoveTo {
                    hex: lane.goals.first().copied().unwrap_or(lane.anchor),
                },
                (_, Some(enemy)) => Intent::Attack { target: enemy.id },
                (maneuver, None) => {
                    let last = lane.goals.len().saturating_sub(1);
                    let hex = lane
                        .goals
                        .get(maneuver.advance_depth().min(last))
                        .copied()
                        .unwrap_or(lane.frontier);
                    Intent::MoveTo { hex }
                }
            };
            intents.insert(unit.id, intent);
        }
    }

    fn emit_overlay(&self, snapshot: &mut BattleSnapshot) {
        let interval = self.config.overlay.interval;
        if interval == 0 || snapshot.tick % interval != 0 || self.lanes.is_empty() {
            return;
        }
        let goals: BTreeSet<HexCoord> = self.lanes.iter().flat_map(|l| l.goals.iter().copied()).collect();
        let mut hot_spots: Vec<HotSpot> = goals
            .into_iter()
            .map(|hex| HotSpot {
                hex,
                danger: self.field.danger(hex),
            })
            .collect();
        hot_spots.sort_by_key(|s| (Reverse(OrderedFloat(s.danger)), s.hex));
        hot_spots.truncate(self.config.overlay.hot_spots);

        snapshot.events.emit(
            snapshot.tick,
            BattleEventType::Overlay {
                team: self.team,
                primary: self.primary,
                maneuver: self.maneuver,
                hot_spots,
            },
            format!("overlay: {:?} via {:?}", self.maneuver, self.primary),
        );
    }

    /// Check the runtime's structural invariants; failures are bugs
    pub fn verify_invariants(&self) -> Result<()> {
        self.siege.verify_invariants()?;

        let mut units = BTreeSet::new();
        let mut tasks = BTreeSet::new();
        for assignment in &self.assignments {
            if !units.insert(assignment.unit) {
                return Err(EngineError::Invariant(format!(
                    "unit {} holds two tasks",
                    assignment.unit.0
                )));
            }
            if !tasks.insert(assignment.task) {
                return Err(EngineError::Invariant(format!(
                    "task {} assigned twice",
                    assignment.task.0
                )));
            }
            if !self.tasks.iter().any(|t| t.id == assignment.task) {
                return Err(EngineError::Invariant(format!(
                    "assignment to unknown task {}",
                    assignment.task.0
                )));
            }
        }
        if let Some(primary) = self.primary {
            if self.lane(primary).is_none() {
                return Err(EngineError::Invariant(format!("primary lane {:?} missing", primary)));
            }
        }
        Ok(())
    }

    fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == id)
    }

    pub fn team(&self) -> TeamId {
        self.team
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn field(&self) -> &InfluenceField {
        &self.field
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn primary_lane(&self) -> Option<LaneId> {
        self.primary
    }

    pub fn lane_health(&self) -> &[LaneHealth] {
        &self.health
    }

    pub fn collapsed_lanes(&self) -> &[LaneId] {
        &self.collapsed
    }

    pub fn split_plan(&self) -> Option<SplitPlan> {
        self.split
    }

    pub fn siege(&self) -> &SiegeGrid {
        &self.siege
    }

    pub fn tasks(&self) -> &[SiegeTask] {
        &self.tasks
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn escorts(&self) -> &BTreeMap<UnitId, UnitId> {
        &self.escorts
    }

    pub fn suppression(&self) -> &BTreeMap<UnitId, UnitId> {
        &self.suppression
    }

    pub fn regroup_countdown(&self) -> u32 {
        self.regroup_countdown
    }

    pub fn morale(&self) -> &MoraleBook {
        &self.morale
    }

    pub fn observer(&self) -> &StyleObserver {
        &self.observer
    }

    pub fn counter_weights(&self) -> Option<&CounterWeights> {
        self.counter_weights.as_ref()
    }

    pub fn maneuver(&self) -> Maneuver {
        self.maneuver
    }
}

/// Tick a faction that may have no runtime attached; absent means no-op
pub fn tick_runtime(runtime: Option<&mut AiRuntime>, snapshot: &mut BattleSnapshot) {
    if let Some(runtime) = runtime {
        runtime.tick(snapshot);
    }
}
