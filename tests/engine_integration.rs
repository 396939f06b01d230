//! Engine integration tests: two runtimes sharing one battle snapshot

use battle_intel::battle::ai::*;
use battle_intel::battle::*;
use battle_intel::core::types::{CultureId, SegmentId, TeamId, Tick, UnitId};
use battle_intel::core::EngineConfig;

fn faction(team: u8, anchor: HexCoord, facing: HexDirection, besieging: bool) -> FactionView {
    FactionView {
        team: TeamId(team),
        culture: CultureId::new(if team == 0 { "imperial" } else { "highland" }),
        playbook: None,
        anchor,
        facing,
        commander: Some(CommanderView {
            unit: None,
            position: anchor,
            personality: CommanderPersonality::default(),
        }),
        besieging,
    }
}

fn siege_battle() -> BattleSnapshot {
    let mut archer = UnitView::new(UnitId(4), TeamId(0), HexCoord::new(-1, 0), UnitRole::Skirmisher);
    archer.stats.range = 6;
    BattleSnapshot {
        tick: 0,
        units: vec![
            UnitView::new(UnitId(1), TeamId(0), HexCoord::new(0, 0), UnitRole::Siege),
            UnitView::new(UnitId(2), TeamId(0), HexCoord::new(1, 0), UnitRole::Shield),
            UnitView::new(UnitId(3), TeamId(0), HexCoord::new(0, 1), UnitRole::Infantry),
            archer,
            UnitView::new(UnitId(10), TeamId(1), HexCoord::new(4, 0), UnitRole::Infantry),
            UnitView::new(UnitId(11), TeamId(1), HexCoord::new(8, 1), UnitRole::Shield),
        ],
        siege: vec![
            Segment::new(SegmentId(1), SegmentKind::Gate, HexCoord::new(6, 0), 80.0, 5.0),
            Segment::new(SegmentId(2), SegmentKind::Wall, HexCoord::new(6, -1), 120.0, 20.0),
        ],
        factions: vec![
            faction(0, HexCoord::new(0, 0), HexDirection::East, true),
            faction(1, HexCoord::new(10, 0), HexDirection::West, false),
        ],
        ..Default::default()
    }
}

fn runtimes(snapshot: &BattleSnapshot, seed: u64) -> (AiRuntime, AiRuntime) {
    (
        AiRuntime::attach(TeamId(0), seed, EngineConfig::default(), snapshot),
        AiRuntime::attach(TeamId(1), seed, EngineConfig::default(), snapshot),
    )
}

fn run_tick(snapshot: &mut BattleSnapshot, attackers: &mut AiRuntime, defenders: &mut AiRuntime, tick: Tick) {
    snapshot.tick = tick;
    attackers.tick(snapshot);
    defenders.tick(snapshot);
}

fn count(snapshot: &BattleSnapshot, pred: impl Fn(&BattleEventType) -> bool) -> usize {
    snapshot
        .events
        .events
        .iter()
        .filter(|e| pred(&e.event_type))
        .count()
}

#[test]
fn test_breach_flow_across_runtimes() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 11);

    for tick in 1..=2 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }
    assert_eq!(attackers.tasks()[0].kind, TaskKind::Ram);
    assert_eq!(attackers.tasks()[0].target, SegmentId(1));
    assert!(defenders.tasks().is_empty());

    for tick in 3..=6 {
        snapshot.events.push(
            BattleEventType::SegmentStruck {
                segment: SegmentId(1),
                dps: 200.0,
            },
            "catapult stone".into(),
            tick,
        );
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }

    let breaches = count(&snapshot, |e| {
        matches!(e, BattleEventType::Breach { segment, .. } if *segment == SegmentId(1))
    });
    assert_eq!(breaches, 1);
    assert!(attackers.siege().is_breached(SegmentId(1)));
    assert!(defenders.siege().is_breached(SegmentId(1)));
    assert_eq!(attackers.tasks()[0].kind, TaskKind::Sap);
    assert_eq!(attackers.tasks()[0].target, SegmentId(2));
    assert!(attackers.verify_invariants().is_ok());
    assert!(defenders.verify_invariants().is_ok());
}

#[test]
fn test_breach_announced_once_whoever_ticks_first() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 11);
    snapshot.tick = 1;
    defenders.tick(&mut snapshot);
    attackers.tick(&mut snapshot);

    snapshot.events.push(
        BattleEventType::SegmentStruck {
            segment: SegmentId(1),
            dps: 200.0,
        },
        "catapult stone".into(),
        2,
    );
    snapshot.tick = 2;
    defenders.tick(&mut snapshot);
    attackers.tick(&mut snapshot);

    let breaches = count(&snapshot, |e| {
        matches!(e, BattleEventType::Breach { segment, .. } if *segment == SegmentId(1))
    });
    assert_eq!(breaches, 1);
    assert!(attackers.siege().is_breached(SegmentId(1)));
    assert!(attackers.tasks().iter().all(|t| t.target != SegmentId(1)));
    assert!(attackers.verify_invariants().is_ok());
}

fn kill(snapshot: &mut BattleSnapshot, unit: UnitId, at: HexCoord, tick: Tick) {
    if let Some(view) = snapshot.units.iter_mut().find(|u| u.id == unit) {
        view.stats.hp = 0.0;
    }
    snapshot.events.push(
        BattleEventType::UnitKilled {
            unit,
            team: TeamId(0),
            position: at,
        },
        format!("unit {} falls", unit.0),
        tick,
    );
}

fn lane_switches(snapshot: &BattleSnapshot, team: TeamId) -> Vec<(Tick, Option<LaneId>, LaneId, LaneSwitchReason)> {
    snapshot
        .events
        .events
        .iter()
        .filter_map(|e| match e.event_type {
            BattleEventType::LaneSwitch {
                team: t,
                from,
                to,
                reason,
            } if t == team => Some((e.tick, from, to, reason)),
            _ => None,
        })
        .collect()
}

fn rally_ticks(snapshot: &BattleSnapshot, team: TeamId) -> Vec<Tick> {
    snapshot
        .events
        .events
        .iter()
        .filter(|e| matches!(e.event_type, BattleEventType::Rally { team: t, .. } if t == team))
        .map(|e| e.tick)
        .collect()
}

#[test]
fn test_collapsed_lane_reassigns_primary_and_rallies() {
    let mut snapshot = siege_battle();
    snapshot.units.push(UnitView::new(UnitId(5), TeamId(0), HexCoord::new(1, 1), UnitRole::Infantry));
    snapshot.units.push(UnitView::new(UnitId(6), TeamId(0), HexCoord::new(-1, 1), UnitRole::Infantry));
    let (mut attackers, mut defenders) = runtimes(&snapshot, 13);

    for tick in 1..=4 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }
    assert!(rally_ticks(&snapshot, TeamId(0)).is_empty());
    let first = attackers.primary_lane().unwrap();
    let frontier = attackers.lanes().iter().find(|l| l.id == first).unwrap().frontier;

    // Two casualties in the primary lane collapse it at the tick-5 evaluation
    kill(&mut snapshot, UnitId(2), frontier, 5);
    kill(&mut snapshot, UnitId(3), frontier, 5);
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 5);

    assert_eq!(attackers.collapsed_lanes(), &[first]);
    let second = attackers.primary_lane().unwrap();
    assert_ne!(second, first);
    let switches = lane_switches(&snapshot, TeamId(0));
    assert_eq!(
        switches.last(),
        Some(&(5, Some(first), second, LaneSwitchReason::Health))
    );
    assert_eq!(rally_ticks(&snapshot, TeamId(0)), vec![5]);

    // The lane stays collapsed but the rally waits out its cooldown, and
    // the score pick does not undo the health reassignment
    for tick in 6..=9 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
        assert_eq!(attackers.primary_lane(), Some(second));
    }
    assert_eq!(attackers.collapsed_lanes(), &[first]);
    assert_eq!(rally_ticks(&snapshot, TeamId(0)), vec![5]);
    assert_eq!(lane_switches(&snapshot, TeamId(0)).len(), switches.len());

    // A fresh collapse once the cooldown has elapsed rallies again
    let frontier = attackers.lanes().iter().find(|l| l.id == second).unwrap().frontier;
    kill(&mut snapshot, UnitId(5), frontier, 10);
    kill(&mut snapshot, UnitId(6), frontier, 10);
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 10);

    assert_eq!(attackers.collapsed_lanes(), &[second]);
    assert_ne!(attackers.primary_lane(), Some(second));
    let last = lane_switches(&snapshot, TeamId(0)).last().copied().unwrap();
    assert_eq!((last.0, last.1, last.3), (10, Some(second), LaneSwitchReason::Health));
    assert_eq!(rally_ticks(&snapshot, TeamId(0)), vec![5, 10]);
}

#[test]
fn test_health_checks_do_not_flap_primary() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 11);
    for tick in 1..=40 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }

    for team in [TeamId(0), TeamId(1)] {
        let switches = lane_switches(&snapshot, team);
        assert!(!switches.is_empty());
        assert!(switches.iter().all(|s| s.3 == LaneSwitchReason::Score));
        for pair in switches.windows(2) {
            let undone = pair[1].0 == pair[0].0 + 1 && pair[0].1 == Some(pair[1].2);
            assert!(!undone, "team {} switched back at tick {}", team.0, pair[1].0);
        }
    }
}

#[test]
fn test_skirmisher_suppresses_visible_enemy() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 3);
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 1);

    assert_eq!(attackers.suppression().get(&UnitId(4)), Some(&UnitId(10)));
    assert_eq!(
        snapshot.unit(UnitId(4)).unwrap().intent,
        Some(Intent::Suppress { target: UnitId(10) })
    );
    let assigned = count(&snapshot, |e| {
        matches!(e, BattleEventType::SuppressionAssign { unit, .. } if *unit == UnitId(4))
    });
    assert_eq!(assigned, 1);

    // Same target next tick is not announced again
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 2);
    let assigned = count(&snapshot, |e| {
        matches!(e, BattleEventType::SuppressionAssign { unit, .. } if *unit == UnitId(4))
    });
    assert_eq!(assigned, 1);
}

#[test]
fn test_counter_learned_once_per_side() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 5);
    for tick in 1..=25 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }
    for team in [TeamId(0), TeamId(1)] {
        let learned = count(&snapshot, |e| {
            matches!(e, BattleEventType::CounterLearned { team: t, .. } if *t == team)
        });
        assert_eq!(learned, 1);
    }
    assert!(attackers.observer().learned().is_some());
    assert!(attackers.counter_weights().is_some());
}

#[test]
fn test_overlay_cadence() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 5);
    for tick in 1..=30 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }
    let overlays: Vec<&BattleEvent> = snapshot
        .events
        .events
        .iter()
        .filter(|e| matches!(e.event_type, BattleEventType::Overlay { team, .. } if team == TeamId(0)))
        .collect();
    assert_eq!(overlays.len(), 3);
    assert_eq!(
        overlays.iter().map(|e| e.tick).collect::<Vec<_>>(),
        vec![10, 20, 30]
    );
    for event in overlays {
        if let BattleEventType::Overlay { hot_spots, .. } = &event.event_type {
            assert!(hot_spots.len() <= 3);
            assert!(hot_spots.windows(2).all(|w| w[0].danger >= w[1].danger));
        }
    }
}

#[test]
fn test_every_unit_gets_morale_written_back() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 9);
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 1);

    assert_eq!(attackers.morale().summary().units, 4);
    assert_eq!(defenders.morale().summary().units, 2);
    for unit in &snapshot.units {
        assert_eq!(unit.morale_status, MoraleStatus::from_value(unit.morale));
    }
}

#[test]
fn test_dead_units_drop_out() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 9);
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 1);

    let position = snapshot.unit(UnitId(3)).unwrap().position;
    if let Some(unit) = snapshot.units.iter_mut().find(|u| u.id == UnitId(3)) {
        unit.stats.hp = 0.0;
    }
    snapshot.events.push(
        BattleEventType::UnitKilled {
            unit: UnitId(3),
            team: TeamId(0),
            position,
        },
        "unit 3 falls".into(),
        2,
    );
    run_tick(&mut snapshot, &mut attackers, &mut defenders, 2);

    assert!(!attackers.morale().contains(UnitId(3)));
    assert!(attackers.assignments().iter().all(|a| a.unit != UnitId(3)));
    assert_eq!(attackers.morale().scars().len(), 1);
}

#[test]
fn test_debug_snapshot_is_serializable() {
    let mut snapshot = siege_battle();
    let (mut attackers, mut defenders) = runtimes(&snapshot, 2);
    for tick in 1..=3 {
        run_tick(&mut snapshot, &mut attackers, &mut defenders, tick);
    }
    let view = runtime_snapshot(&attackers);
    assert_eq!(view.team, TeamId(0));
    assert_eq!(view.lanes.lanes.len(), 3);
    assert_eq!(view.siege.segments.len(), 2);
    let json = serde_json::to_string(&view).unwrap();
    assert!(json.contains("\"siege\""));
}

#[test]
fn test_reference_config_loads() {
    let config = EngineConfig::load("data/engine/default.toml").unwrap();
    assert!(config.influence.decay_factor > 0.0 && config.influence.decay_factor < 1.0);
    assert!(EngineConfig::load("data/engine/missing.toml").is_err());
}
