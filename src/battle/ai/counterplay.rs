//! Counter-play learning and maneuver scoring
//!
//! `StyleObserver` keeps a rolling window of per-tick opponent signals and
//! freezes a `StyleVector` once enough ticks have been seen. The frozen style
//! becomes `CounterWeights`, which together with the static playbook matrix
//! adjust whatever `ManeuverScorer` the host provides.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::battle::constants::{COLLAPSE_SIGNAL, FLANK_SIGNAL, PUSH_SIGNAL, VOLLEY_SIGNAL};
use crate::battle::events::{BattleEvent, BattleEventType};
use crate::battle::hex::HexCoord;
use crate::battle::snapshot::CommanderPersonality;
use crate::core::types::{TeamId, UnitId};

/// Army-level stance the runtime picks each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Maneuver {
    Hold,
    RefuseFlank,
    Advance,
    Charge,
    Shieldwall,
    Skirmish,
    Reserve,
}

impl Maneuver {
    pub const ALL: [Maneuver; 7] = [
        Maneuver::Hold,
        Maneuver::RefuseFlank,
        Maneuver::Advance,
        Maneuver::Charge,
        Maneuver::Shieldwall,
        Maneuver::Skirmish,
        Maneuver::Reserve,
    ];

    /// How many lane goals past the first free units push toward
    pub fn advance_depth(&self) -> usize {
        match self {
            Maneuver::Charge => usize::MAX,
            Maneuver::Advance | Maneuver::Skirmish => 2,
            Maneuver::RefuseFlank | Maneuver::Shieldwall => 1,
            Maneuver::Hold | Maneuver::Reserve => 0,
        }
    }
}

/// Rolling summary of how the opponent fights, each rate in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleVector {
    pub flank_rate: f32,
    pub volley_rate: f32,
    pub push_rate: f32,
    pub collapse_rate: f32,
}

/// Opponent behaviour extracted from one tick of observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSignals {
    pub hits_taken: u32,
    pub flanking_hits: u32,
    pub ranged_hits: u32,
    pub enemy_moves: u32,
    pub pushing_moves: u32,
    /// A friendly unit died or broke this tick
    pub collapse: bool,
}

impl TickSignals {
    /// Tally host observations from the point of view of `team`
    ///
    /// `team_of` resolves the team of a hit target. A push is an enemy move
    /// that ends closer to `anchor` than it started.
    pub fn from_events<'a>(
        events: impl IntoIterator<Item = &'a BattleEvent>,
        team: TeamId,
        anchor: HexCoord,
        team_of: impl Fn(UnitId) -> Option<TeamId>,
    ) -> Self {
        let mut signals = TickSignals::default();
        for event in events {
            match &event.event_type {
                BattleEventType::UnitHit {
                    target,
                    ranged,
                    flanking,
                    ..
                } if team_of(*target) == Some(team) => {
                    signals.hits_taken += 1;
                    signals.flanking_hits += u32::from(*flanking);
                    signals.ranged_hits += u32::from(*ranged);
                }
                BattleEventType::UnitMoved { team: mover, from, to, .. } if *mover != team => {
                    signals.enemy_moves += 1;
                    if to.distance(&anchor) < from.distance(&anchor) {
                        signals.pushing_moves += 1;
                    }
                }
                BattleEventType::UnitKilled { team: victim, .. } if *victim == team => {
                    signals.collapse = true;
                }
                _ => {}
            }
        }
        signals
    }
}

fn ratio(num: u32, den: u32) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

/// Rolling observer that freezes its style after `learn_after` ticks
#[derive(Debug, Clone)]
pub struct StyleObserver {
    window: usize,
    learn_after: u64,
    samples: VecDeque<TickSignals>,
    observed: u64,
    learned: Option<StyleVector>,
}

impl StyleObserver {
    pub fn new(window: usize, learn_after: u64) -> Self {
        Self {
            window: window.max(1),
            learn_after: learn_after.max(1),
            samples: VecDeque::new(),
            observed: 0,
            learned: None,
        }
    }

    pub fn observed_ticks(&self) -> u64 {
        self.observed
    }

    pub fn learned(&self) -> Option<&StyleVector> {
        self.learned.as_ref()
    }

    /// Style of the current window, whether or not it has been frozen
    pub fn current_style(&self) -> StyleVector {
        let mut total = TickSignals::default();
        let mut collapses = 0;
        for s in &self.samples {
            total.hits_taken += s.hits_taken;
            total.flanking_hits += s.flanking_hits;
            total.ranged_hits += s.ranged_hits;
            total.enemy_moves += s.enemy_moves;
            total.pushing_moves += s.pushing_moves;
            collapses += u32::from(s.collapse);
        }
        StyleVector {
            flank_rate: ratio(total.flanking_hits, total.hits_taken),
            volley_rate: ratio(total.ranged_hits, total.hits_taken),
            push_rate: ratio(total.pushing_moves, total.enemy_moves),
            collapse_rate: ratio(collapses, self.samples.len() as u32),
        }
    }

    /// Record one tick; returns the style on the tick it gets frozen
    pub fn observe(&mut self, signals: TickSignals) -> Option<StyleVector> {
        if self.learned.is_some() {
            return None;
        }
        self.samples.push_back(signals);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
        self.observed += 1;

        if self.observed >= self.learn_after {
            let style = self.current_style();
            self.learned = Some(style);
            return Some(style);
        }
        None
    }
}

/// Additive score deltas per maneuver, plus optional minimum scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterWeights {
    pub deltas: BTreeMap<Maneuver, f32>,
    /// Adjusted scores below these are never chosen; empty unless set by the host
    #[serde(default)]
    pub thresholds: BTreeMap<Maneuver, f32>,
}

impl CounterWeights {
    fn bump(&mut self, maneuver: Maneuver, amount: f32) {
        *self.deltas.entry(maneuver).or_insert(0.0) += amount;
    }

    /// Fixed per-signal counter rules
    pub fn from_style(style: &StyleVector) -> Self {
        let mut weights = CounterWeights::default();
        if style.flank_rate > FLANK_SIGNAL {
            weights.bump(Maneuver::Hold, 0.3);
            weights.bump(Maneuver::RefuseFlank, 0.5);
        }
        if style.volley_rate > VOLLEY_SIGNAL {
            weights.bump(Maneuver::Shieldwall, 0.4);
            weights.bump(Maneuver::Charge, 0.3);
        }
        if style.push_rate > PUSH_SIGNAL {
            weights.bump(Maneuver::Hold, 0.4);
            weights.bump(Maneuver::Reserve, 0.2);
        }
        if style.collapse_rate > COLLAPSE_SIGNAL {
            weights.bump(Maneuver::Reserve, 0.3);
            weights.bump(Maneuver::Advance, -0.2);
        }
        weights
    }

    pub fn delta(&self, maneuver: Maneuver) -> f32 {
        self.deltas.get(&maneuver).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Known opponent doctrines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Playbook {
    Skirmish,
    Shock,
    Turtle,
    Envelop,
}

impl Playbook {
    /// Static counter matrix: multiplier on a maneuver's score against this playbook
    pub fn multiplier(&self, maneuver: Maneuver) -> f32 {
        use Maneuver as M;
        match (self, maneuver) {
            (Playbook::Skirmish, M::Charge) => 1.3,
            (Playbook::Skirmish, M::Advance) => 1.2,
            (Playbook::Skirmish, M::Shieldwall) => 1.1,
            (Playbook::Skirmish, M::Skirmish) => 0.8,
            (Playbook::Skirmish, M::Hold) => 0.9,

            (Playbook::Shock, M::Shieldwall) => 1.3,
            (Playbook::Shock, M::Hold) => 1.2,
            (Playbook::Shock, M::Reserve) => 1.1,
            (Playbook::Shock, M::Charge) => 0.8,

            (Playbook::Turtle, M::Skirmish) => 1.3,
            (Playbook::Turtle, M::Reserve) => 1.1,
            (Playbook::Turtle, M::Advance) => 0.9,
            (Playbook::Turtle, M::Charge) => 0.7,

            (Playbook::Envelop, M::RefuseFlank) => 1.3,
            (Playbook::Envelop, M::Reserve) => 1.2,
            (Playbook::Envelop, M::Hold) => 1.1,
            (Playbook::Envelop, M::Advance) => 0.8,

            _ => 1.0,
        }
    }
}

/// Scoring hook owned by the host AI
pub trait ManeuverScorer {
    fn score(&self, maneuver: Maneuver) -> f32;
}

/// Default hook: scores maneuvers from the commander's temperament
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalityScorer {
    pub personality: CommanderPersonality,
}

impl ManeuverScorer for PersonalityScorer {
    fn score(&self, maneuver: Maneuver) -> f32 {
        let aggression = self.personality.aggression.clamp(0.0, 1.0);
        let caution = self.personality.caution.clamp(0.0, 1.0);
        match maneuver {
            Maneuver::Hold => 0.2 + caution * 0.8,
            Maneuver::RefuseFlank => caution * 0.6,
            Maneuver::Advance => 0.2 + aggression * 0.8,
            Maneuver::Charge => aggression - caution * 0.3,
            Maneuver::Shieldwall => caution * 0.7,
            Maneuver::Skirmish => (1.0 - aggression) * 0.5,
            Maneuver::Reserve => caution * 0.5,
        }
    }
}

/// Wraps a host scorer with learned counter-weights and the playbook matrix
pub struct CounterAdjustedScorer<'a, S: ManeuverScorer + ?Sized> {
    pub inner: &'a S,
    pub weights: Option<&'a CounterWeights>,
    pub playbook: Option<Playbook>,
}

impl<'a, S: ManeuverScorer + ?Sized> CounterAdjustedScorer<'a, S> {
    pub fn new(inner: &'a S, weights: Option<&'a CounterWeights>, playbook: Option<Playbook>) -> Self {
        Self {
            inner,
            weights,
            playbook,
        }
    }

    fn allowed(&self, maneuver: Maneuver, score: f32) -> bool {
        self.weights
            .and_then(|w| w.thresholds.get(&maneuver))
            .map_or(true, |min| score >= *min)
    }
}

impl<S: ManeuverScorer + ?Sized> ManeuverScorer for CounterAdjustedScorer<'_, S> {
    fn score(&self, maneuver: Maneuver) -> f32 {
        let delta = self.weights.map_or(0.0, |w| w.delta(maneuver));
        let mult = self.playbook.map_or(1.0, |p| p.multiplier(maneuver));
        (self.inner.score(maneuver) + delta) * mult
    }
}

/// Highest-scoring maneuver, earlier entries of `Maneuver::ALL` winning ties
pub fn choose_maneuver<S: ManeuverScorer + ?Sized>(
    inner: &S,
    weights: Option<&CounterWeights>,
    playbook: Option<Playbook>,
) -> Maneuver {
    let scorer = CounterAdjustedScorer::new(inner, weights, playbook);
    let mut best: Option<(Maneuver, f32)> = None;
    for maneuver in Maneuver::ALL {
        let score = scorer.score(maneuver);
        if !scorer.allowed(maneuver, score) {
            continue;
        }
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((maneuver, score));
        }
    }
    best.map_or(Maneuver::Hold, |(m, _)| m)
}
