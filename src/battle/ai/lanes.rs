//! Lane partitioner - three advance corridors from a formation anchor
//!
//! Lane shape is fixed once derived. Per tick only pressure and the primary
//! selection change; health is re-evaluated on a slower cadence.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::ai::influence::InfluenceField;
use crate::battle::constants::{
    LANE_COLLAPSE_CASUALTIES, LANE_COLLAPSE_DANGER, LANE_COLLAPSE_LOST_GROUND,
    SPLIT_BASE_SHARE, SPLIT_RISK_THRESHOLD,
};
use crate::battle::hex::{HexCoord, HexDirection};
use crate::core::rng::BattleRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LaneId {
    Left,
    Center,
    Right,
}

impl LaneId {
    pub fn all() -> [LaneId; 3] {
        [LaneId::Left, LaneId::Center, LaneId::Right]
    }

    fn index(&self) -> usize {
        match self {
            LaneId::Left => 0,
            LaneId::Center => 1,
            LaneId::Right => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    pub anchor: HexCoord,
    pub frontier: HexCoord,
    /// Ordered anchor -> frontier; the last goal is the frontier
    pub goals: Vec<HexCoord>,
    pub pressure: f32,
}

impl Lane {
    /// Furthest goal, scored when picking the primary lane
    pub fn frontier_goal(&self) -> HexCoord {
        self.goals.last().copied().unwrap_or(self.frontier)
    }

    /// `pull - danger - pressure` at the furthest goal
    pub fn score(&self, field: &InfluenceField) -> f32 {
        field.score_hex(self.frontier_goal()).net() - self.pressure
    }

    /// Distance from `hex` to the nearest goal of this lane
    pub fn distance_to(&self, hex: HexCoord) -> u32 {
        self.goals
            .iter()
            .map(|g| g.distance(&hex))
            .min()
            .unwrap_or_else(|| self.anchor.distance(&hex))
    }
}

/// Derive Left/Center/Right lanes from an anchor and facing
///
/// Each lane runs from the anchor to its own frontier `depth` hexes ahead;
/// the flank lanes are displaced `spread` hexes sideways at the frontier.
pub fn make_lanes(
    anchor: HexCoord,
    facing: HexDirection,
    depth: u32,
    spread: u32,
    waypoints: usize,
) -> Vec<Lane> {
    let ahead = anchor.step(facing, depth as i32);
    // Mirror images about the facing axis, so all frontiers sit `depth` away
    let left = facing.rotate(2);
    let right = facing.rotate(-2);
    let waypoints = waypoints.max(1);

    LaneId::all()
        .into_iter()
        .map(|id| {
            let frontier = match id {
                LaneId::Left => ahead.step(left, spread as i32),
                LaneId::Center => ahead,
                LaneId::Right => ahead.step(right, spread as i32),
            };
            let goals = (1..=waypoints)
                .map(|i| anchor.lerp(&frontier, i as f64 / waypoints as f64))
                .collect();
            Lane {
                id,
                anchor,
                frontier,
                goals,
                pressure: 0.0,
            }
        })
        .collect()
}

/// Index of the maximum, Center winning exact ties, otherwise list order
fn argmax_center_preferred(lanes: &[Lane], mut key: impl FnMut(&Lane) -> Option<f32>) -> Option<LaneId> {
    let mut best: Option<(LaneId, f32)> = lanes
        .iter()
        .find(|l| l.id == LaneId::Center)
        .and_then(|l| key(l).map(|s| (l.id, s)));

    for lane in lanes {
        let Some(score) = key(lane) else {
            continue;
        };
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((lane.id, score)),
        }
    }
    best.map(|(id, _)| id)
}

/// Lane with the highest `pull - danger - pressure` at its furthest goal
pub fn pick_primary_lane(field: &InfluenceField, lanes: &[Lane]) -> Option<LaneId> {
    pick_primary_lane_excluding(field, lanes, &[])
}

/// As `pick_primary_lane`, ignoring lanes in `excluded` (e.g. collapsed)
pub fn pick_primary_lane_excluding(
    field: &InfluenceField,
    lanes: &[Lane],
    excluded: &[LaneId],
) -> Option<LaneId> {
    argmax_center_preferred(lanes, |lane| {
        (!excluded.contains(&lane.id)).then(|| lane.score(field))
    })
}

/// Lane a hex belongs to: the one with the nearest goal
pub fn lane_of_hex(lanes: &[Lane], hex: HexCoord) -> Option<LaneId> {
    argmax_center_preferred(lanes, |lane| Some(-(lane.distance_to(hex) as f32)))
}

/// Event-log counters gathered between health evaluations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneCounters {
    pub casualties: [u32; 3],
    pub lost_ground: [u32; 3],
}

impl LaneCounters {
    pub fn record_casualty(&mut self, lane: LaneId) {
        self.casualties[lane.index()] += 1;
    }

    pub fn record_lost_ground(&mut self, lane: LaneId) {
        self.lost_ground[lane.index()] += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneHealth {
    pub lane: LaneId,
    pub casualties: u32,
    pub lost_ground: u32,
    pub danger_avg: f32,
    pub collapsed: bool,
}

impl LaneHealth {
    pub fn priority(&self) -> f32 {
        if self.collapsed {
            -1.0
        } else {
            1.0 - (self.danger_avg * 0.1).min(1.0) - self.lost_ground as f32 * 0.1
        }
    }
}

/// Derive per-lane health from counters and the field
pub fn evaluate_lane_health(field: &InfluenceField, lanes: &[Lane], counters: &LaneCounters) -> Vec<LaneHealth> {
    lanes
        .iter()
        .map(|lane| {
            let casualties = counters.casualties[lane.id.index()];
            let lost_ground = counters.lost_ground[lane.id.index()];
            let danger_avg = if lane.goals.is_empty() {
                0.0
            } else {
                lane.goals.iter().map(|g| field.danger(*g)).sum::<f32>() / lane.goals.len() as f32
            };
            let collapsed = casualties >= LANE_COLLAPSE_CASUALTIES
                || (danger_avg > LANE_COLLAPSE_DANGER && lost_ground > LANE_COLLAPSE_LOST_GROUND);
            LaneHealth {
                lane: lane.id,
                casualties,
                lost_ground,
                danger_avg,
                collapsed,
            }
        })
        .collect()
}

/// Highest-priority lane under the given health
pub fn healthiest_lane(lanes: &[Lane], health: &[LaneHealth]) -> Option<LaneId> {
    argmax_center_preferred(lanes, |lane| {
        health.iter().find(|h| h.lane == lane.id).map(|h| h.priority())
    })
}

/// Primary lane plus an optional secondary thrust
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub primary: LaneId,
    pub secondary: Option<LaneId>,
    /// Fraction of free units sent down the secondary lane
    pub secondary_share: f32,
}

/// Decide whether a risk-taking commander opens a second lane
///
/// Below or at the risk threshold no secondary lane is ever chosen.
pub fn compute_split_plan(
    field: &InfluenceField,
    lanes: &[Lane],
    primary: LaneId,
    collapsed: &[LaneId],
    commander_risk: f32,
    rng: &mut BattleRng,
) -> SplitPlan {
    let mut plan = SplitPlan {
        primary,
        secondary: None,
        secondary_share: 0.0,
    };
    if commander_risk <= SPLIT_RISK_THRESHOLD {
        return plan;
    }

    let mut excluded = collapsed.to_vec();
    excluded.push(primary);
    let Some(candidate) = pick_primary_lane_excluding(field, lanes, &excluded) else {
        return plan;
    };

    let chance = ((commander_risk - SPLIT_RISK_THRESHOLD) / 40.0).clamp(0.0, 1.0);
    if rng.gen::<f32>() < chance {
        plan.secondary = Some(candidate);
        plan.secondary_share = SPLIT_BASE_SHARE + 0.25 * chance;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lanes() -> Vec<Lane> {
        make_lanes(HexCoord::new(0, 0), HexDirection::East, 12, 4, 4)
    }

    #[test]
    fn test_make_lanes_shape() {
        let lanes = lanes();
        assert_eq!(lanes.len(), 3);
        assert_eq!(lanes[0].id, LaneId::Left);
        assert_eq!(lanes[1].id, LaneId::Center);
        for lane in &lanes {
            assert_eq!(lane.goals.len(), 4);
            assert_eq!(lane.frontier_goal(), lane.frontier);
            // Goals march away from the anchor
            for pair in lane.goals.windows(2) {
                assert!(lane.anchor.distance(&pair[0]) <= lane.anchor.distance(&pair[1]));
            }
        }
        assert_eq!(lanes[1].frontier, HexCoord::new(12, 0));
        assert_ne!(lanes[0].frontier, lanes[2].frontier);
    }

    #[test]
    fn test_empty_field_prefers_center() {
        let field = InfluenceField::new(0);
        assert_eq!(pick_primary_lane(&field, &lanes()), Some(LaneId::Center));
    }

    #[test]
    fn test_no_lanes_no_primary() {
        let field = InfluenceField::new(0);
        assert_eq!(pick_primary_lane(&field, &[]), None);
    }

    #[test]
    fn test_danger_moves_primary() {
        let lanes = lanes();
        let mut field = InfluenceField::new(0);
        field.add_hazard(lanes[1].frontier_goal(), 5.0);
        field.add_intent(lanes[2].frontier_goal(), 1.0);
        assert_eq!(pick_primary_lane(&field, &lanes), Some(LaneId::Right));
    }

    #[test]
    fn test_left_beats_right_on_tie() {
        let lanes = lanes();
        let mut field = InfluenceField::new(0);
        field.add_intent(lanes[0].frontier_goal(), 2.0);
        field.add_intent(lanes[2].frontier_goal(), 2.0);
        assert_eq!(pick_primary_lane(&field, &lanes), Some(LaneId::Left));
    }

    #[test]
    fn test_pressure_counts_against_lane() {
        let mut lanes = lanes();
        let field = InfluenceField::new(0);
        lanes[1].pressure = 1.0;
        assert_eq!(pick_primary_lane(&field, &lanes), Some(LaneId::Left));
    }

    #[test]
    fn test_collapse_by_casualties() {
        let lanes = lanes();
        let field = InfluenceField::new(0);
        let mut counters = LaneCounters::default();
        counters.record_casualty(LaneId::Center);
        counters.record_casualty(LaneId::Center);

        let health = evaluate_lane_health(&field, &lanes, &counters);
        assert!(health[1].collapsed);
        assert_eq!(health[1].priority(), -1.0);
        assert!(!health[0].collapsed);
        assert_eq!(healthiest_lane(&lanes, &health), Some(LaneId::Left));
    }

    #[test]
    fn test_collapse_by_danger_and_lost_ground() {
        let lanes = lanes();
        let mut field = InfluenceField::new(0);
        for g in &lanes[2].goals {
            field.add_hazard(*g, 8.0);
        }
        let mut counters = LaneCounters::default();
        counters.record_lost_ground(LaneId::Right);
        let health = evaluate_lane_health(&field, &lanes, &counters);
        assert!(!health[2].collapsed, "one step back is not a collapse");

        counters.record_lost_ground(LaneId::Right);
        let health = evaluate_lane_health(&field, &lanes, &counters);
        assert!(health[2].collapsed);
    }

    #[test]
    fn test_lane_of_hex() {
        let lanes = lanes();
        assert_eq!(lane_of_hex(&lanes, lanes[0].frontier), Some(LaneId::Left));
        assert_eq!(lane_of_hex(&lanes, lanes[2].frontier), Some(LaneId::Right));
        assert_eq!(lane_of_hex(&lanes, HexCoord::new(0, 0)), Some(LaneId::Center));
    }

    #[test]
    fn test_split_plan_opens_secondary_for_reckless_commander() {
        let lanes = lanes();
        let field = InfluenceField::new(0);
        let mut rng = BattleRng::new(5);
        let plan = compute_split_plan(&field, &lanes, LaneId::Center, &[], 100.0, &mut rng);
        assert_eq!(plan.secondary, Some(LaneId::Left));
        assert!(plan.secondary_share > 0.0);
    }

    proptest! {
        #[test]
        fn prop_no_split_below_risk_threshold(seed in any::<u64>(), risk in 0.0f32..=60.0) {
            let lanes = lanes();
            let field = InfluenceField::new(seed);
            let mut rng = BattleRng::new(seed);
            let plan = compute_split_plan(&field, &lanes, LaneId::Center, &[], risk, &mut rng);
            prop_assert!(plan.secondary.is_none());
        }

        #[test]
        fn prop_primary_maximizes_score(d0 in 0.0f32..10.0, d1 in 0.0f32..10.0, d2 in 0.0f32..10.0) {
            let lanes = lanes();
            let mut field = InfluenceField::new(0);
            for (lane, d) in lanes.iter().zip([d0, d1, d2]) {
                field.add_hazard(lane.frontier_goal(), d);
            }
            let primary = pick_primary_lane(&field, &lanes).unwrap();
            let best = lanes.iter().find(|l| l.id == primary).unwrap().score(&field);
            for lane in &lanes {
                prop_assert!(lane.score(&field) <= best);
            }
        }
    }
}
