//! Typed views of the battle state the host hands the engine each tick
//!
//! The host owns these values. The engine reads them and writes back only
//! unit intents, unit morale, and event log entries.

use serde::{Deserialize, Serialize};

use crate::battle::ai::counterplay::Playbook;
use crate::battle::ai::morale::MoraleStatus;
use crate::battle::ai::siege::{Segment, TaskKind};
use crate::battle::events::BattleEventLog;
use crate::battle::hex::{HexCoord, HexDirection};
use crate::core::types::{CultureId, SegmentId, TaskId, TeamId, Tick, UnitId};

/// Battlefield role, drives task assignment priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    Siege,
    Shield,
    Infantry,
    Skirmisher,
    Cavalry,
    Commander,
}

impl UnitRole {
    /// Rank for siege task assignment; `None` means never assigned
    pub fn task_priority(&self) -> Option<u8> {
        match self {
            UnitRole::Siege => Some(0),
            UnitRole::Shield => Some(1),
            UnitRole::Infantry => Some(2),
            UnitRole::Skirmisher => Some(3),
            UnitRole::Cavalry | UnitRole::Commander => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitTrait {
    Fear,
    Discipline,
    Inspiration,
    StandardBearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub atk: f32,
    pub def: f32,
    pub range: u32,
    pub hp: f32,
    pub max_hp: f32,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self {
            atk: 10.0,
            def: 10.0,
            range: 1,
            hp: 100.0,
            max_hp: 100.0,
        }
    }
}

/// What the engine wants a unit to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Hold { at: HexCoord },
    MoveTo { hex: HexCoord },
    Attack { target: UnitId },
    Escort { unit: UnitId },
    Suppress { target: UnitId },
    SiegeWork {
        task: TaskId,
        kind: TaskKind,
        segment: SegmentId,
        approach: HexCoord,
    },
    Regroup { toward: HexCoord },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub id: UnitId,
    pub team: TeamId,
    pub position: HexCoord,
    pub role: UnitRole,
    pub stats: UnitStats,
    #[serde(default)]
    pub traits: Vec<UnitTrait>,
    pub morale: f32,
    pub morale_status: MoraleStatus,
    #[serde(default)]
    pub intent: Option<Intent>,
}

impl UnitView {
    pub fn new(id: UnitId, team: TeamId, position: HexCoord, role: UnitRole) -> Self {
        Self {
            id,
            team,
            position,
            role,
            stats: UnitStats::default(),
            traits: Vec::new(),
            morale: 60.0,
            morale_status: MoraleStatus::Steady,
            intent: None,
        }
    }

    pub fn alive(&self) -> bool {
        self.stats.hp > 0.0
    }

    pub fn hp_fraction(&self) -> f32 {
        if self.stats.max_hp <= 0.0 {
            0.0
        } else {
            (self.stats.hp / self.stats.max_hp).clamp(0.0, 1.0)
        }
    }

    pub fn has_trait(&self, t: UnitTrait) -> bool {
        self.traits.contains(&t)
    }
}

/// Terrain modifiers for one hex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainCell {
    pub hex: HexCoord,
    pub cover: f32,
    pub hazard: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommanderPersonality {
    /// 0.0 (defensive) to 1.0 (aggressive)
    pub aggression: f32,
    /// 0.0 (reckless) to 1.0 (cautious)
    pub caution: f32,
    /// 0.0 to 1.0, shifts the starting morale of the army
    pub leadership: f32,
    /// 0 to 100; above 60 the commander will split the advance
    pub risk: f32,
}

impl Default for CommanderPersonality {
    fn default() -> Self {
        Self {
            aggression: 0.5,
            caution: 0.5,
            leadership: 0.5,
            risk: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommanderView {
    /// The unit the commander rides with, if any
    pub unit: Option<UnitId>,
    pub position: HexCoord,
    pub personality: CommanderPersonality,
}

/// Per-faction battle setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionView {
    pub team: TeamId,
    pub culture: CultureId,
    #[serde(default)]
    pub playbook: Option<Playbook>,
    /// Formation anchor lanes are derived from
    pub anchor: HexCoord,
    pub facing: HexDirection,
    #[serde(default)]
    pub commander: Option<CommanderView>,
    /// This side is assaulting the fortifications and plans breaches
    #[serde(default)]
    pub besieging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature_c: f32,
    /// 0.0 to 1.0
    pub precipitation: f32,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            temperature_c: 15.0,
            precipitation: 0.0,
        }
    }
}

/// Everything the engine sees in one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub tick: Tick,
    pub units: Vec<UnitView>,
    #[serde(default)]
    pub terrain: Vec<TerrainCell>,
    #[serde(default)]
    pub siege: Vec<Segment>,
    #[serde(default)]
    pub factions: Vec<FactionView>,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub events: BattleEventLog,
}

impl BattleSnapshot {
    pub fn unit(&self, id: UnitId) -> Option<&UnitView> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn faction(&self, team: TeamId) -> Option<&FactionView> {
        self.factions.iter().find(|f| f.team == team)
    }

    /// First faction that is not `team`
    pub fn opponent_of(&self, team: TeamId) -> Option<&FactionView> {
        self.factions.iter().find(|f| f.team != team)
    }

    pub fn terrain_at(&self, hex: HexCoord) -> Option<&TerrainCell> {
        self.terrain.iter().find(|t| t.hex == hex)
    }

    /// Where the team's commander currently stands, if there is one
    pub fn commander_position(&self, team: TeamId) -> Option<HexCoord> {
        let commander = self.faction(team)?.commander.as_ref()?;
        match commander.unit {
            Some(id) => self.unit(id).filter(|u| u.alive()).map(|u| u.position),
            None => Some(commander.position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_priority_order() {
        let siege = UnitRole::Siege.task_priority().unwrap();
        let shield = UnitRole::Shield.task_priority().unwrap();
        let infantry = UnitRole::Infantry.task_priority().unwrap();
        let skirm = UnitRole::Skirmisher.task_priority().unwrap();
        assert!(siege < shield && shield < infantry && infantry < skirm);
        assert!(UnitRole::Cavalry.task_priority().is_none());
    }

    #[test]
    fn test_dead_commander_has_no_position() {
        let mut rider = UnitView::new(UnitId(1), TeamId(0), HexCoord::new(2, 2), UnitRole::Commander);
        rider.stats.hp = 0.0;
        let snapshot = BattleSnapshot {
            units: vec![rider],
            factions: vec![FactionView {
                team: TeamId(0),
                culture: CultureId::new("imperial"),
                playbook: None,
                anchor: HexCoord::new(0, 0),
                facing: HexDirection::East,
                commander: Some(CommanderView {
                    unit: Some(UnitId(1)),
                    position: HexCoord::new(2, 2),
                    personality: CommanderPersonality::default(),
                }),
                besieging: false,
            }],
            ..Default::default()
        };
        assert_eq!(snapshot.commander_position(TeamId(0)), None);
    }

    #[test]
    fn test_hp_fraction_clamped() {
        let mut unit = UnitView::new(UnitId(1), TeamId(0), HexCoord::default(), UnitRole::Infantry);
        unit.stats.hp = -5.0;
        assert_eq!(unit.hp_fraction(), 0.0);
        assert!(!unit.alive());
    }
}
