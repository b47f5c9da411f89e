//! Pathfinding substrate.
//!
//! Two searches live here:
//!
//! - `find_land_path` — A* over land for corridor planning (world
//!   generation and the autonomous builder). Delegates to
//!   `pathfinding::prelude::astar` with successors enumerated N, E, S, W.
//! - `build_road_flow_field` — deterministic multi-source Dijkstra/BFS over
//!   the road grid. The heap is ordered lexicographically by
//!   `(cost, steps, index, owner)`, which is the engine's single global
//!   tie-break rule; every derived field inherits its determinism from it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use pathfinding::prelude::astar;

use crate::grid::{NEIGHBORS4, Overlay, Point, Terrain, World};
use crate::roads::{mask_usable, tile_travel_time_milli};

// Corridor planner step costs. Reusing an existing road is slightly cheaper
// than breaking new ground, water is much dearer than either so bridges only
// appear when the detour is long.
const COST_LAND: u32 = 10;
const COST_ROAD: u32 = 7;
const COST_WATER: u32 = 55;

#[derive(Debug, Clone, Copy)]
pub struct LandPathConfig {
    /// Allow the path to run along existing road tiles.
    pub allow_roads: bool,
    /// Allow the path to cross water (i.e. plan bridges).
    pub allow_bridges: bool,
}

impl Default for LandPathConfig {
    fn default() -> Self {
        Self {
            allow_roads: true,
            allow_bridges: false,
        }
    }
}

fn step_cost(world: &World, x: i32, y: i32, cfg: &LandPathConfig) -> Option<u32> {
    let t = world.at(x, y);
    if t.terrain == Terrain::Water {
        if !cfg.allow_bridges {
            return None;
        }
        return Some(COST_WATER);
    }
    match t.overlay {
        Overlay::None => Some(COST_LAND),
        Overlay::Road => {
            if cfg.allow_roads {
                Some(COST_ROAD)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A* corridor between two tiles. Returns the path including both
/// endpoints, or `None` when the endpoints are not connected under the
/// given rules. Endpoints themselves only need to be in bounds.
pub fn find_land_path(world: &World, from: Point, to: Point, cfg: &LandPathConfig) -> Option<Vec<Point>> {
    if !world.in_bounds(from.x, from.y) || !world.in_bounds(to.x, to.y) {
        return None;
    }

    let successors = |p: &Point| {
        let mut out = Vec::with_capacity(4);
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (p.x + dx, p.y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            // The goal is always enterable so corridors can terminate on
            // any target (e.g. an existing hub or edge tile).
            if nx == to.x && ny == to.y {
                out.push((Point::new(nx, ny), COST_LAND));
                continue;
            }
            if let Some(c) = step_cost(world, nx, ny, cfg) {
                out.push((Point::new(nx, ny), c));
            }
        }
        out
    };

    let heuristic =
        |p: &Point| ((p.x - to.x).unsigned_abs() + (p.y - to.y).unsigned_abs()) * COST_ROAD;

    astar(&from, successors, heuristic, |p| *p == to).map(|(path, _cost)| path)
}

/// Result of a multi-source road-grid search. All vectors are `w*h`;
/// unreachable or non-road tiles hold `-1`.
#[derive(Debug, Clone, Default)]
pub struct RoadFlowField {
    pub w: i32,
    pub h: i32,
    /// Accumulated travel cost in milli-steps.
    pub cost: Vec<i32>,
    /// Number of road edges along the chosen route.
    pub dist: Vec<i32>,
    /// Source label (position in the source list) that reached each tile.
    /// Empty unless `compute_owner` was requested.
    pub owner: Vec<i32>,
}

impl RoadFlowField {
    pub fn unreachable(w: i32, h: i32) -> Self {
        let n = (w.max(0) as usize) * (h.max(0) as usize);
        Self {
            w,
            h,
            cost: vec![-1; n],
            dist: vec![-1; n],
            owner: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoadFlowFieldConfig {
    /// Restrict traversal to roads connected to the map edge.
    pub require_outside_connection: bool,
    /// Weight edges by road-class travel time instead of unit steps.
    pub use_travel_time: bool,
    /// Record which source settled each tile.
    pub compute_owner: bool,
}

/// Multi-source Dijkstra (or BFS when `use_travel_time` is false) over the
/// road grid.
///
/// - `sources` are linear indices of road tiles; non-road or masked-out
///   entries are skipped. Source order only influences the owner label and
///   only through the global tie-break.
/// - `extra_cost_milli`, when present, adds a per-tile penalty on entering a
///   road tile (congestion-aware reassignment).
/// - `source_start_cost_milli`, when present, is aligned with `sources` and
///   seeds each source at a nonzero cost (capacity-aware job penalties).
pub fn build_road_flow_field(
    world: &World,
    sources: &[i32],
    cfg: &RoadFlowFieldConfig,
    road_to_edge: Option<&[u8]>,
    extra_cost_milli: Option<&[i32]>,
    source_start_cost_milli: Option<&[i32]>,
) -> RoadFlowField {
    let w = world.width();
    let h = world.height();
    let mut out = RoadFlowField::unreachable(w, h);
    let n = out.cost.len();
    if n == 0 {
        return out;
    }
    if cfg.compute_owner {
        out.owner = vec![-1; n];
    }

    let mask_ok = cfg.require_outside_connection && mask_usable(road_to_edge, n);
    let extra_ok = extra_cost_milli.is_some_and(|e| e.len() == n);

    let passable = |idx: usize| -> bool {
        if world.tile_at_index(idx).overlay != Overlay::Road {
            return false;
        }
        if mask_ok && road_to_edge.unwrap()[idx] == 0 {
            return false;
        }
        true
    };

    let enter_cost = |idx: usize| -> i64 {
        let base = if cfg.use_travel_time {
            i64::from(tile_travel_time_milli(world.tile_at_index(idx)))
        } else {
            1000
        };
        let extra = if extra_ok {
            i64::from(extra_cost_milli.unwrap()[idx].max(0))
        } else {
            0
        };
        base + extra
    };

    // Heap entries ordered by (cost, steps, tile index, owner). Reverse for
    // a min-heap.
    let mut heap: BinaryHeap<Reverse<(i64, i32, i32, i32)>> = BinaryHeap::new();
    let mut best: Vec<i64> = vec![i64::MAX; n];

    let offsets_ok = source_start_cost_milli.is_some_and(|o| o.len() == sources.len());

    for (owner, &src) in sources.iter().enumerate() {
        if src < 0 || src as usize >= n {
            continue;
        }
        let idx = src as usize;
        if !passable(idx) {
            continue;
        }
        let start = if offsets_ok {
            i64::from(source_start_cost_milli.unwrap()[owner].max(0))
        } else {
            0
        };
        heap.push(Reverse((start, 0, src, owner as i32)));
    }

    while let Some(Reverse((cost, steps, idx_i32, owner))) = heap.pop() {
        let idx = idx_i32 as usize;
        if best[idx] != i64::MAX {
            continue; // already settled
        }
        best[idx] = cost;
        out.cost[idx] = cost.min(i64::from(i32::MAX)) as i32;
        out.dist[idx] = steps;
        if cfg.compute_owner {
            out.owner[idx] = owner;
        }

        let x = idx_i32 % w;
        let y = idx_i32 / w;
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (x + dx, y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            let ni = world.idx(nx, ny);
            if best[ni] != i64::MAX || !passable(ni) {
                continue;
            }
            heap.push(Reverse((
                cost + enter_cost(ni),
                steps + 1,
                ni as i32,
                owner,
            )));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_row_road(w: i32, h: i32, y: i32) -> World {
        let mut world = World::new(w, h, 1);
        for x in 0..w {
            world.set_road(x, y);
        }
        world
    }

    #[test]
    fn test_land_path_straight() {
        let world = World::new(10, 10, 1);
        let path =
            find_land_path(&world, Point::new(1, 1), Point::new(5, 1), &LandPathConfig::default())
                .unwrap();
        assert_eq!(path.first().copied(), Some(Point::new(1, 1)));
        assert_eq!(path.last().copied(), Some(Point::new(5, 1)));
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_land_path_routes_around_water() {
        let mut world = World::new(9, 9, 1);
        // Vertical lake with a gap at the bottom.
        for y in 0..8 {
            world.at_mut(4, y).terrain = Terrain::Water;
        }
        let path =
            find_land_path(&world, Point::new(1, 1), Point::new(7, 1), &LandPathConfig::default())
                .unwrap();
        assert!(path.iter().all(|p| world.at(p.x, p.y).terrain != Terrain::Water));
        assert!(path.iter().any(|p| p.y == 8));
    }

    #[test]
    fn test_land_path_unreachable_without_bridges() {
        let mut world = World::new(9, 5, 1);
        for y in 0..5 {
            world.at_mut(4, y).terrain = Terrain::Water;
        }
        let cfg = LandPathConfig::default();
        assert!(find_land_path(&world, Point::new(1, 2), Point::new(7, 2), &cfg).is_none());

        let bridged = LandPathConfig {
            allow_bridges: true,
            ..cfg
        };
        assert!(find_land_path(&world, Point::new(1, 2), Point::new(7, 2), &bridged).is_some());
    }

    #[test]
    fn test_flow_field_costs_and_steps() {
        let world = world_with_row_road(8, 4, 2);
        let src = world.idx(0, 2) as i32;
        let field = build_road_flow_field(
            &world,
            &[src],
            &RoadFlowFieldConfig {
                use_travel_time: true,
                ..RoadFlowFieldConfig::default()
            },
            None,
            None,
            None,
        );
        assert_eq!(field.cost[world.idx(0, 2)], 0);
        assert_eq!(field.dist[world.idx(0, 2)], 0);
        assert_eq!(field.cost[world.idx(3, 2)], 3000);
        assert_eq!(field.dist[world.idx(3, 2)], 3);
        // Non-road tiles stay unreachable.
        assert_eq!(field.cost[world.idx(3, 0)], -1);
    }

    #[test]
    fn test_flow_field_extra_cost() {
        let world = world_with_row_road(8, 3, 1);
        let src = world.idx(0, 1) as i32;
        let mut extra = vec![0i32; world.len()];
        extra[world.idx(2, 1)] = 500;
        let cfg = RoadFlowFieldConfig {
            use_travel_time: true,
            ..RoadFlowFieldConfig::default()
        };
        let field = build_road_flow_field(&world, &[src], &cfg, None, Some(&extra), None);
        assert_eq!(field.cost[world.idx(2, 1)], 2500);
        assert_eq!(field.cost[world.idx(3, 1)], 3500);
    }

    #[test]
    fn test_flow_field_source_order_independent_costs() {
        let mut world = World::new(10, 10, 1);
        for x in 0..10 {
            world.set_road(x, 4);
        }
        for y in 0..10 {
            world.set_road(5, y);
        }
        let a = world.idx(0, 4) as i32;
        let b = world.idx(5, 0) as i32;
        let c = world.idx(9, 4) as i32;
        let cfg = RoadFlowFieldConfig {
            use_travel_time: true,
            compute_owner: true,
            ..RoadFlowFieldConfig::default()
        };
        let f1 = build_road_flow_field(&world, &[a, b, c], &cfg, None, None, None);
        let f2 = build_road_flow_field(&world, &[c, a, b], &cfg, None, None, None);
        assert_eq!(f1.cost, f2.cost);
        assert_eq!(f1.dist, f2.dist);
    }

    #[test]
    fn test_flow_field_respects_outside_mask() {
        let mut world = World::new(8, 8, 1);
        // Island road, not edge-connected.
        for x in 2..6 {
            world.set_road(x, 3);
        }
        let mask = crate::roads::compute_roads_connected_to_edge(&world);
        let src = world.idx(2, 3) as i32;
        let cfg = RoadFlowFieldConfig {
            require_outside_connection: true,
            use_travel_time: true,
            ..RoadFlowFieldConfig::default()
        };
        let field = build_road_flow_field(&world, &[src], &cfg, Some(&mask), None, None);
        assert!(field.cost.iter().all(|&c| c == -1));
    }

    #[test]
    fn test_adding_a_source_never_increases_cost() {
        let world = world_with_row_road(12, 3, 1);
        let a = world.idx(0, 1) as i32;
        let b = world.idx(11, 1) as i32;
        let cfg = RoadFlowFieldConfig {
            use_travel_time: true,
            ..RoadFlowFieldConfig::default()
        };
        let one = build_road_flow_field(&world, &[a], &cfg, None, None, None);
        let two = build_road_flow_field(&world, &[a, b], &cfg, None, None, None);
        for i in 0..world.len() {
            if one.cost[i] >= 0 {
                assert!(two.cost[i] >= 0 && two.cost[i] <= one.cost[i]);
            }
        }
    }
}
