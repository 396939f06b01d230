//! A* pathfinding and line of sight over the six-neighbor hex grid
//!
//! Blocked cells and blocked edges come from a `Passability` view, normally
//! the siege grid. Every step costs 1, so the cube-distance heuristic is both
//! admissible and consistent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::battle::hex::HexCoord;

/// Read-only view of what blocks movement and sight
pub trait Passability {
    fn is_cell_blocked(&self, cell: HexCoord) -> bool;
    fn is_edge_blocked(&self, a: HexCoord, b: HexCoord) -> bool;
}

/// Open plain with nothing blocked
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl Passability for OpenField {
    fn is_cell_blocked(&self, _cell: HexCoord) -> bool {
        false
    }

    fn is_edge_blocked(&self, _a: HexCoord, _b: HexCoord) -> bool {
        false
    }
}

/// Node in the A* open set
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathNode {
    coord: HexCoord,
    f_cost: u32,
    g_cost: u32,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; prefer deeper nodes, then coord, on ties
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| self.g_cost.cmp(&other.g_cost))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether one step between adjacent cells is allowed
fn can_step(pass: &impl Passability, from: HexCoord, to: HexCoord) -> bool {
    !pass.is_cell_blocked(to) && !pass.is_edge_blocked(from, to)
}

/// Find a path using A*
///
/// Returns the full path from `start` to `goal` inclusive. When no path
/// exists within `node_limit` expansions the result is `[start]`; callers
/// must check `reaches(&path, goal)` rather than the length alone.
pub fn find_path(
    pass: &impl Passability,
    start: HexCoord,
    goal: HexCoord,
    node_limit: usize,
) -> Vec<HexCoord> {
    if start == goal {
        return vec![start];
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<HexCoord, HexCoord> = AHashMap::new();
    let mut g_scores: AHashMap<HexCoord, u32> = AHashMap::new();
    let mut expanded = 0usize;

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        f_cost: start.distance(&goal),
        g_cost: 0,
    });

    while let Some(current) = open_set.pop() {
        if current.coord == goal {
            return reconstruct_path(&came_from, current.coord);
        }

        let current_g = g_scores.get(&current.coord).copied().unwrap_or(u32::MAX);
        if current.g_cost > current_g {
            // Stale heap entry
            continue;
        }

        expanded += 1;
        if expanded > node_limit {
            break;
        }

        for neighbor in current.coord.neighbors() {
            if !can_step(pass, current.coord, neighbor) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    coord: neighbor,
                    f_cost: tentative_g + neighbor.distance(&goal),
                    g_cost: tentative_g,
                });
            }
        }
    }

    vec![start]
}

/// Did this path actually arrive at `goal`?
pub fn reaches(path: &[HexCoord], goal: HexCoord) -> bool {
    path.last() == Some(&goal)
}

/// Reconstruct path from came_from map
fn reconstruct_path(came_from: &AHashMap<HexCoord, HexCoord>, mut current: HexCoord) -> Vec<HexCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Straight-line sight check
///
/// Walks the rounded cube line and fails on any blocked edge between
/// consecutive cells or any blocked cell strictly between the endpoints.
pub fn has_line_of_sight(pass: &impl Passability, from: HexCoord, to: HexCoord) -> bool {
    let line = from.line_to(&to);
    let last = line.len().saturating_sub(1);

    for (i, pair) in line.windows(2).enumerate() {
        if pass.is_edge_blocked(pair[0], pair[1]) {
            return false;
        }
        // pair[1] is an interior cell unless it is the target
        if i + 1 < last && pass.is_cell_blocked(pair[1]) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;
    use proptest::prelude::*;

    use crate::battle::hex::HexEdge;

    #[derive(Default)]
    struct Blocks {
        cells: AHashSet<HexCoord>,
        edges: AHashSet<HexEdge>,
    }

    impl Passability for Blocks {
        fn is_cell_blocked(&self, cell: HexCoord) -> bool {
            self.cells.contains(&cell)
        }

        fn is_edge_blocked(&self, a: HexCoord, b: HexCoord) -> bool {
            self.edges.contains(&HexEdge::new(a, b))
        }
    }

    #[test]
    fn test_pathfind_straight_line() {
        let start = HexCoord::new(0, 0);
        let goal = HexCoord::new(5, 0);

        let path = find_path(&OpenField, start, goal, 1000);

        assert_eq!(path.first(), Some(&start));
        assert!(reaches(&path, goal));
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_pathfind_around_obstacle() {
        let mut blocks = Blocks::default();
        blocks.cells.insert(HexCoord::new(2, 0));
        blocks.cells.insert(HexCoord::new(3, 0));

        let path = find_path(&blocks, HexCoord::new(0, 0), HexCoord::new(5, 0), 1000);

        assert!(reaches(&path, HexCoord::new(5, 0)));
        assert!(!path.contains(&HexCoord::new(2, 0)));
        assert!(!path.contains(&HexCoord::new(3, 0)));
    }

    #[test]
    fn test_pathfind_respects_blocked_edge() {
        let mut blocks = Blocks::default();
        let a = HexCoord::new(0, 0);
        let b = HexCoord::new(1, 0);
        blocks.edges.insert(HexEdge::new(a, b));

        let path = find_path(&blocks, a, b, 1000);

        assert!(reaches(&path, b));
        assert_eq!(path.len(), 3, "must detour through a shared neighbor");
    }

    #[test]
    fn test_pathfind_no_path_returns_start() {
        let mut blocks = Blocks::default();
        let goal = HexCoord::new(5, 5);
        for neighbor in goal.neighbors() {
            blocks.cells.insert(neighbor);
        }

        let start = HexCoord::new(0, 0);
        let path = find_path(&blocks, start, goal, 2000);

        assert_eq!(path, vec![start]);
        assert!(!reaches(&path, goal));
    }

    #[test]
    fn test_pathfind_same_start_goal() {
        let start = HexCoord::new(5, 5);
        let path = find_path(&OpenField, start, start, 10);
        assert_eq!(path, vec![start]);
        assert!(reaches(&path, start));
    }

    #[test]
    fn test_los_open() {
        assert!(has_line_of_sight(&OpenField, HexCoord::new(0, 0), HexCoord::new(6, -2)));
    }

    #[test]
    fn test_los_blocked_by_cell() {
        let mut blocks = Blocks::default();
        blocks.cells.insert(HexCoord::new(2, 0));
        assert!(!has_line_of_sight(&blocks, HexCoord::new(0, 0), HexCoord::new(4, 0)));
        // Endpoints themselves do not block
        assert!(has_line_of_sight(&blocks, HexCoord::new(0, 0), HexCoord::new(2, 0)));
    }

    #[test]
    fn test_los_blocked_by_edge() {
        let mut blocks = Blocks::default();
        blocks
            .edges
            .insert(HexEdge::new(HexCoord::new(1, 0), HexCoord::new(2, 0)));
        assert!(!has_line_of_sight(&blocks, HexCoord::new(0, 0), HexCoord::new(3, 0)));
    }

    proptest! {
        #[test]
        fn prop_open_path_length_is_distance(q in -12i32..12, r in -12i32..12) {
            let start = HexCoord::new(0, 0);
            let goal = HexCoord::new(q, r);
            let path = find_path(&OpenField, start, goal, 10_000);
            prop_assert!(reaches(&path, goal));
            prop_assert_eq!(path.len() as u32, start.distance(&goal) + 1);
        }
    }
}
