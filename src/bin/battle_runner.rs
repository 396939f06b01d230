//! Headless Battle Runner
//!
//! Runs a scripted siege between two AI runtimes and prints the event log.
//! The host loop here is crude: units step one hex toward their
//! intent and trade blows with adjacent or suppressed enemies.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use battle_intel::autoresolve::{ArmyStats, BattleSummary, CoefficientBook, Estimate};
use battle_intel::battle::ai::{runtime_snapshot, tick_runtime, AiRuntime, RuntimeSnapshot};
use battle_intel::battle::ai::{Playbook, Segment, SegmentKind};
use battle_intel::battle::events::{BattleEventLog, BattleEventType};
use battle_intel::battle::hex::{HexCoord, HexDirection};
use battle_intel::battle::snapshot::{
    BattleSnapshot, CommanderPersonality, CommanderView, FactionView, Intent, TerrainCell,
    UnitRole, UnitTrait, UnitView, Weather,
};
use battle_intel::core::types::{CultureId, SegmentId, TeamId, Tick, UnitId};
use battle_intel::core::{BattleRng, EngineConfig, RngStream};
use clap::Parser;
use rand::Rng;
use serde::Serialize;

const ATTACKERS: TeamId = TeamId(0);
const DEFENDERS: TeamId = TeamId(1);

/// Headless Battle Runner - scripted siege between two AI runtimes
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run a scripted siege and print the engine's event log")]
struct Args {
    /// Battle seed for deterministic runs
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Maximum ticks before the battle is called
    #[arg(long, default_value_t = 200)]
    ticks: Tick,

    /// Engine config TOML (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coefficient book JSON, read before and written after the battle
    #[arg(long)]
    book: Option<PathBuf>,

    /// Attacker commander risk (0-100); above 60 the advance may split
    #[arg(long, default_value_t = 70.0)]
    risk: f32,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,
}

#[derive(Serialize)]
struct RunnerReport<'a> {
    seed: u64,
    ticks: Tick,
    winner: Option<TeamId>,
    estimate: Estimate,
    attackers: RuntimeSnapshot,
    defenders: RuntimeSnapshot,
    events: &'a BattleEventLog,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Warning: {}", e);
            eprintln!("Using default engine config");
            EngineConfig::default()
        }),
        None => EngineConfig::default(),
    };
    let mut book = load_book(args.book.as_ref());

    let mut snapshot = scripted_siege(args.risk);
    let initial_units = snapshot.units.clone();
    let cultures = (culture_of(&snapshot, ATTACKERS), culture_of(&snapshot, DEFENDERS));
    let attacker_stats = army_stats(&initial_units, ATTACKERS);
    let defender_stats = army_stats(&initial_units, DEFENDERS);
    let estimate = book.estimate(
        (&cultures.0, &attacker_stats),
        (&cultures.1, &defender_stats),
        args.seed,
    );

    let mut attackers = AiRuntime::attach(ATTACKERS, args.seed, config.clone(), &snapshot);
    let mut defenders = AiRuntime::attach(DEFENDERS, args.seed, config, &snapshot);
    let mut host = Host::new(args.seed);

    let mut winner = None;
    let mut fought = 0;
    for tick in 1..=args.ticks {
        snapshot.tick = tick;
        tick_runtime(Some(&mut attackers), &mut snapshot);
        tick_runtime(Some(&mut defenders), &mut snapshot);
        host.step(&mut snapshot);
        fought = tick;

        winner = decided(&snapshot);
        if winner.is_some() {
            break;
        }
    }

    let summary = BattleSummary {
        rounds: fought as u32,
        dealt_by_a: host.dealt(ATTACKERS),
        dealt_by_b: host.dealt(DEFENDERS),
    };
    book.record_outcome(
        (&cultures.0, &attacker_stats),
        (&cultures.1, &defender_stats),
        &summary,
        args.seed,
    );
    save_book(args.book.as_ref(), &book);

    let report = RunnerReport {
        seed: args.seed,
        ticks: fought,
        winner,
        estimate,
        attackers: runtime_snapshot(&attackers),
        defenders: runtime_snapshot(&defenders),
        events: &snapshot.events,
    };

    match args.format.as_str() {
        "text" => print_text(&report),
        "json" => print_json(&report),
        other => {
            eprintln!("Unknown format '{}', defaulting to json", other);
            print_json(&report);
        }
    }
}

fn print_json(report: &RunnerReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize report: {}", e),
    }
}

fn print_text(report: &RunnerReport) {
    println!("Siege Result");
    println!("============");
    println!("Seed: {}", report.seed);
    println!("Ticks: {}", report.ticks);
    match report.winner {
        Some(team) => println!("Winner: team {}", team.0),
        None => println!("Winner: undecided"),
    }
    println!(
        "Estimate: {:?} after {} rounds",
        report.estimate.outcome, report.estimate.rounds
    );
    println!();
    for event in &report.events.events {
        println!("  [{}] {}", event.tick, event.description);
    }
}

fn load_book(path: Option<&PathBuf>) -> CoefficientBook {
    let Some(path) = path else {
        return CoefficientBook::new();
    };
    let loaded = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| CoefficientBook::from_json(&json).map_err(|e| e.to_string()));
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load coefficient book {:?}: {}", path, e);
        eprintln!("Starting with an empty book");
        CoefficientBook::new()
    })
}

fn save_book(path: Option<&PathBuf>, book: &CoefficientBook) {
    let Some(path) = path else {
        return;
    };
    let written = book
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
    if let Err(e) = written {
        eprintln!("Warning: Failed to write coefficient book {:?}: {}", path, e);
    }
}

fn culture_of(snapshot: &BattleSnapshot, team: TeamId) -> CultureId {
    snapshot
        .faction(team)
        .map(|f| f.culture.clone())
        .unwrap_or_else(|| CultureId::new("unknown"))
}

fn army_stats(units: &[UnitView], team: TeamId) -> ArmyStats {
    units
        .iter()
        .filter(|u| u.team == team)
        .fold(ArmyStats { atk: 0.0, def: 0.0, hp: 0.0, range: 0.0 }, |acc, u| ArmyStats {
            atk: acc.atk + u.stats.atk,
            def: acc.def + u.stats.def,
            hp: acc.hp + u.stats.hp,
            range: acc.range.max(u.stats.range as f32),
        })
}

fn decided(snapshot: &BattleSnapshot) -> Option<TeamId> {
    let alive = |team: TeamId| snapshot.units.iter().any(|u| u.team == team && u.alive());
    match (alive(ATTACKERS), alive(DEFENDERS)) {
        (true, false) => Some(ATTACKERS),
        (false, true) => Some(DEFENDERS),
        _ => None,
    }
}

fn unit(id: u32, team: TeamId, q: i32, r: i32, role: UnitRole, atk: f32, def: f32) -> UnitView {
    let mut view = UnitView::new(UnitId(id), team, HexCoord::new(q, r), role);
    view.stats.atk = atk;
    view.stats.def = def;
    if role == UnitRole::Skirmisher {
        view.stats.range = 5;
    }
    view
}

/// Attackers in the west, a gated wall at q = 8, defenders behind it
fn scripted_siege(risk: f32) -> BattleSnapshot {
    let mut units = vec![
        unit(1, ATTACKERS, 0, 0, UnitRole::Siege, 14.0, 8.0),
        unit(2, ATTACKERS, 0, -2, UnitRole::Siege, 14.0, 8.0),
        unit(3, ATTACKERS, 1, 0, UnitRole::Shield, 10.0, 18.0),
        unit(4, ATTACKERS, 1, -1, UnitRole::Shield, 10.0, 18.0),
        unit(5, ATTACKERS, 0, 1, UnitRole::Infantry, 16.0, 10.0),
        unit(6, ATTACKERS, 0, 2, UnitRole::Infantry, 16.0, 10.0),
        unit(7, ATTACKERS, 1, 2, UnitRole::Infantry, 16.0, 10.0),
        unit(8, ATTACKERS, -1, 0, UnitRole::Skirmisher, 12.0, 6.0),
        unit(9, ATTACKERS, -1, 1, UnitRole::Skirmisher, 12.0, 6.0),
        unit(10, ATTACKERS, -2, 1, UnitRole::Commander, 8.0, 12.0),
        unit(20, DEFENDERS, 10, 0, UnitRole::Infantry, 15.0, 12.0),
        unit(21, DEFENDERS, 10, -1, UnitRole::Infantry, 15.0, 12.0),
        unit(22, DEFENDERS, 11, 1, UnitRole::Shield, 10.0, 18.0),
        unit(23, DEFENDERS, 10, 2, UnitRole::Skirmisher, 12.0, 6.0),
        unit(24, DEFENDERS, 12, 0, UnitRole::Commander, 8.0, 12.0),
    ];
    units[9].traits.push(UnitTrait::Inspiration);
    units[12].traits.push(UnitTrait::Discipline);

    let mut siege = vec![Segment::new(SegmentId(1), SegmentKind::Gate, HexCoord::new(8, 0), 80.0, 5.0)];
    for (i, r) in [-3, -2, -1, 1, 2, 3].into_iter().enumerate() {
        siege.push(Segment::new(
            SegmentId(2 + i as u32),
            SegmentKind::Wall,
            HexCoord::new(8, r),
            120.0,
            20.0,
        ));
    }
    siege.push(Segment::new(SegmentId(10), SegmentKind::Tower, HexCoord::new(9, -4), 150.0, 25.0));

    let terrain = (-3..=3)
        .map(|r| TerrainCell {
            hex: HexCoord::new(9, r),
            cover: 0.6,
            hazard: 0.0,
        })
        .chain([TerrainCell {
            hex: HexCoord::new(5, 3),
            cover: 0.0,
            hazard: 0.8,
        }])
        .collect();

    BattleSnapshot {
        tick: 0,
        units,
        terrain,
        siege,
        factions: vec![
            FactionView {
                team: ATTACKERS,
                culture: CultureId::new("imperial"),
                playbook: Some(Playbook::Shock),
                anchor: HexCoord::new(0, 0),
                facing: HexDirection::East,
                commander: Some(CommanderView {
                    unit: Some(UnitId(10)),
                    position: HexCoord::new(-2, 1),
                    personality: CommanderPersonality {
                        aggression: 0.7,
                        risk,
                        ..Default::default()
                    },
                }),
                besieging: true,
            },
            FactionView {
                team: DEFENDERS,
                culture: CultureId::new("highland"),
                playbook: Some(Playbook::Turtle),
                anchor: HexCoord::new(11, 0),
                facing: HexDirection::West,
                commander: Some(CommanderView {
                    unit: Some(UnitId(24)),
                    position: HexCoord::new(12, 0),
                    personality: CommanderPersonality {
                        caution: 0.8,
                        ..Default::default()
                    },
                }),
                besieging: false,
            },
        ],
        weather: Weather {
            temperature_c: 4.0,
            precipitation: 0.3,
        },
        events: BattleEventLog::new(),
    }
}

/// Crude movement and combat resolution standing in for a real battle engine
struct Host {
    rng: BattleRng,
    cursor: usize,
    dealt: BTreeMap<TeamId, f32>,
}

impl Host {
    fn new(seed: u64) -> Self {
        Self {
            rng: BattleRng::for_stream(seed, 2, RngStream::Tactical),
            cursor: 0,
            dealt: BTreeMap::new(),
        }
    }

    fn dealt(&self, team: TeamId) -> f32 {
        self.dealt.get(&team).copied().unwrap_or(0.0)
    }

    fn step(&mut self, snapshot: &mut BattleSnapshot) {
        let tick = snapshot.tick;
        self.open_breaches(snapshot);

        let mut blocked: BTreeSet<HexCoord> = snapshot
            .siege
            .iter()
            .filter(|s| s.alive())
            .flat_map(|s| s.blocked_cells.iter().copied())
            .collect();
        blocked.extend(snapshot.units.iter().filter(|u| u.alive()).map(|u| u.position));

        for i in 0..snapshot.units.len() {
            let view = &snapshot.units[i];
            if !view.alive() {
                continue;
            }
            let Some(intent) = view.intent else {
                continue;
            };
            match intent {
                Intent::Attack { target } => self.strike(snapshot, i, target, false, tick),
                Intent::Suppress { target } => self.strike(snapshot, i, target, true, tick),
                Intent::MoveTo { hex } => self.advance(snapshot, i, hex, &mut blocked, true, tick),
                Intent::Regroup { toward } => self.advance(snapshot, i, toward, &mut blocked, false, tick),
                Intent::SiegeWork { approach, .. } => {
                    self.advance(snapshot, i, approach, &mut blocked, false, tick)
                }
                Intent::Escort { unit } => {
                    if let Some(goal) = snapshot.unit(unit).map(|u| u.position) {
                        self.advance(snapshot, i, goal, &mut blocked, false, tick);
                    }
                }
                Intent::Hold { .. } => {}
            }
        }
        self.cursor = snapshot.events.len();
    }

    /// Mirror engine-reported breaches onto the host's structures
    fn open_breaches(&mut self, snapshot: &mut BattleSnapshot) {
        let breached: Vec<SegmentId> = snapshot
            .events
            .since(self.cursor)
            .iter()
            .filter_map(|e| match e.event_type {
                BattleEventType::Breach { segment, .. } => Some(segment),
                _ => None,
            })
            .collect();
        for segment in snapshot.siege.iter_mut().filter(|s| breached.contains(&s.id)) {
            segment.hp = 0.0;
        }
    }

    fn advance(
        &mut self,
        snapshot: &mut BattleSnapshot,
        index: usize,
        goal: HexCoord,
        blocked: &mut BTreeSet<HexCoord>,
        may_climb: bool,
        tick: Tick,
    ) {
        let from = snapshot.units[index].position;
        if from == goal {
            return;
        }
        let here = from.distance(&goal);
        let next = from
            .neighbors()
            .into_iter()
            .filter(|n| n.distance(&goal) < here)
            .find(|n| !blocked.contains(n) || (may_climb && *n == goal));
        let Some(to) = next else {
            return;
        };
        blocked.remove(&from);
        blocked.insert(to);
        let view = &mut snapshot.units[index];
        view.position = to;
        let (unit, team) = (view.id, view.team);
        snapshot.events.push(
            BattleEventType::UnitMoved { unit, team, from, to },
            format!("Unit {} moved to ({},{})", unit.0, to.q, to.r),
            tick,
        );
    }

    fn strike(&mut self, snapshot: &mut BattleSnapshot, index: usize, target: UnitId, ranged: bool, tick: Tick) {
        let attacker = snapshot.units[index].clone();
        let Some(t) = snapshot.units.iter().position(|u| u.id == target && u.alive()) else {
            return;
        };
        let defender = &snapshot.units[t];
        let distance = attacker.position.distance(&defender.position);
        let reach = if ranged { attacker.stats.range.max(1) } else { 1 };
        if distance > reach {
            return;
        }
        let facing_away = snapshot
            .faction(defender.team)
            .map(|f| f.facing.opposite().offset())
            .is_some_and(|back| defender.position + back == attacker.position);
        let roll: f32 = self.rng.gen_range(0.8..1.2);
        let damage = (attacker.stats.atk * roll - defender.stats.def * 0.5).max(1.0);

        let defender = &mut snapshot.units[t];
        defender.stats.hp = (defender.stats.hp - damage).max(0.0);
        let killed = !defender.alive();
        let (victim_team, victim_pos) = (defender.team, defender.position);
        *self.dealt.entry(attacker.team).or_insert(0.0) += damage;

        snapshot.events.push(
            BattleEventType::UnitHit {
                attacker: attacker.id,
                target,
                ranged,
                flanking: facing_away,
            },
            format!("Unit {} hit unit {} for {:.1}", attacker.id.0, target.0, damage),
            tick,
        );
        if killed {
            snapshot.events.push(
                BattleEventType::UnitKilled {
                    unit: target,
                    team: victim_team,
                    position: victim_pos,
                },
                format!("Unit {} destroyed", target.0),
                tick,
            );
            if attacker.role == UnitRole::Cavalry || attacker.has_trait(UnitTrait::Fear) {
                snapshot.events.push(
                    BattleEventType::Terror {
                        origin: victim_pos,
                        strength: 10.0,
                    },
                    format!("Unit {} spreads terror", attacker.id.0),
                    tick,
                );
            }
        }
    }
}
