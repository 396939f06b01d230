//! Siege task assignment plus the escort and suppression passes that follow it

use std::cmp::Reverse;
use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::ai::morale::MoraleStatus;
use crate::battle::ai::siege::SiegeTask;
use crate::battle::hex::HexCoord;
use crate::battle::pathfinding::{has_line_of_sight, Passability};
use crate::battle::snapshot::{UnitRole, UnitView};
use crate::core::types::{TaskId, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub task: TaskId,
    pub unit: UnitId,
}

fn available(unit: &UnitView) -> bool {
    unit.alive() && unit.morale_status != MoraleStatus::Routing
}

/// Greedy matching of tasks to units
///
/// Candidates are ordered by role (Siege > Shield > Infantry > Skirmisher),
/// then morale descending, then id. Each task in order takes the next
/// candidate; tasks left without one stay unassigned.
pub fn assign_tasks<'a>(
    tasks: &[SiegeTask],
    units: impl IntoIterator<Item = &'a UnitView>,
) -> Vec<Assignment> {
    let mut candidates: Vec<(u8, &UnitView)> = units
        .into_iter()
        .filter(|u| available(u))
        .filter_map(|u| u.role.task_priority().map(|p| (p, u)))
        .collect();
    candidates.sort_by_key(|(p, u)| (*p, Reverse(OrderedFloat(u.morale)), u.id));

    tasks
        .iter()
        .zip(candidates)
        .map(|(task, (_, unit))| Assignment {
            task: task.id,
            unit: unit.id,
        })
        .collect()
}

/// Nearest free Shield unit for each ward
///
/// Returns `(escort, ward)` pairs; `taken` is extended with every escort.
pub fn assign_escorts(
    wards: &[(UnitId, HexCoord)],
    units: &[UnitView],
    taken: &mut BTreeSet<UnitId>,
) -> Vec<(UnitId, UnitId)> {
    let mut pairs = Vec::new();
    for (ward, at) in wards {
        let escort = units
            .iter()
            .filter(|u| u.role == UnitRole::Shield && available(u) && !taken.contains(&u.id))
            .min_by_key(|u| (u.position.distance(at), u.id));
        if let Some(escort) = escort {
            taken.insert(escort.id);
            pairs.push((escort.id, *ward));
        }
    }
    pairs
}

/// Point free ranged skirmishers at visible enemies
///
/// Targets nearest the siege workers come first; without workers the
/// skirmisher's own nearest target is used. Returns `(unit, target)` pairs.
pub fn assign_suppression(
    units: &[UnitView],
    enemies: &[UnitView],
    workers: &[HexCoord],
    taken: &mut BTreeSet<UnitId>,
    pass: &impl Passability,
) -> Vec<(UnitId, UnitId)> {
    let mut pairs = Vec::new();
    for unit in units
        .iter()
        .filter(|u| u.role == UnitRole::Skirmisher && u.stats.range >= 2 && available(u))
    {
        if taken.contains(&unit.id) {
            continue;
        }
        let target = enemies
            .iter()
            .filter(|e| e.alive())
            .filter(|e| unit.position.distance(&e.position) <= unit.stats.range)
            .filter(|e| has_line_of_sight(pass, unit.position, e.position))
            .min_by_key(|e| {
                let near_worker = workers
                    .iter()
                    .map(|w| w.distance(&e.position))
                    .min()
                    .unwrap_or(0);
                (near_worker, unit.position.distance(&e.position), e.id)
            });
        if let Some(target) = target {
            taken.insert(unit.id);
            pairs.push((unit.id, target.id));
        }
    }
    pairs
}
