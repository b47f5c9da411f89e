//! Road graph primitives.
//!
//! The road network is never materialized as an edge list; the grid itself
//! is the adjacency structure (4-connected, no diagonals). This module
//! provides the travel-time lookup, the outside-connection mask, and the
//! deterministic facility-to-road adjacency pick shared by every subsystem.

use std::collections::VecDeque;

use crate::config::{bridge_travel_time_milli, road_travel_time_milli};
use crate::grid::{NEIGHBORS4, Overlay, Point, Terrain, Tile, World};

/// Travel time across one road tile in milli-steps, bridge-aware.
#[inline]
pub fn tile_travel_time_milli(tile: &Tile) -> i32 {
    if tile.terrain == Terrain::Water {
        bridge_travel_time_milli(tile.level)
    } else {
        road_travel_time_milli(tile.level)
    }
}

/// Mark every road tile connected (through roads, 4-neighborhood) to a road
/// tile on the map edge. Output is a `w*h` mask of 0/1.
///
/// Computed once per tick and threaded through all consumers of the
/// outside-connection rule.
pub fn compute_roads_connected_to_edge(world: &World) -> Vec<u8> {
    let w = world.width();
    let h = world.height();
    let n = world.len();
    let mut mask = vec![0u8; n];
    if n == 0 {
        return mask;
    }

    let mut queue = VecDeque::new();

    // Seed with edge road tiles in row-major order.
    for y in 0..h {
        for x in 0..w {
            if x != 0 && y != 0 && x != w - 1 && y != h - 1 {
                continue;
            }
            if world.at(x, y).overlay != Overlay::Road {
                continue;
            }
            let i = world.idx(x, y);
            if mask[i] == 0 {
                mask[i] = 1;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (x + dx, y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            if world.at(nx, ny).overlay != Overlay::Road {
                continue;
            }
            let ni = world.idx(nx, ny);
            if mask[ni] == 0 {
                mask[ni] = 1;
                queue.push_back((nx, ny));
            }
        }
    }

    mask
}

#[inline]
pub fn mask_usable(mask: Option<&[u8]>, n: usize) -> bool {
    mask.is_some_and(|m| m.len() == n)
}

/// Pick the road tile adjacent to `(x, y)`, scanning N, E, S, W and taking
/// the first valid hit. When a road-to-edge mask is supplied, only
/// outside-connected roads qualify.
pub fn pick_adjacent_road_tile(
    world: &World,
    road_to_edge: Option<&[u8]>,
    x: i32,
    y: i32,
) -> Option<Point> {
    let use_mask = mask_usable(road_to_edge, world.len());
    for (dx, dy) in NEIGHBORS4 {
        let (nx, ny) = (x + dx, y + dy);
        if !world.in_bounds(nx, ny) {
            continue;
        }
        if world.at(nx, ny).overlay != Overlay::Road {
            continue;
        }
        if use_mask {
            let idx = world.idx(nx, ny);
            if road_to_edge.unwrap()[idx] == 0 {
                continue;
            }
        }
        return Some(Point::new(nx, ny));
    }
    None
}

/// Same pick but returning the linear index.
pub fn pick_adjacent_road_index(
    world: &World,
    road_to_edge: Option<&[u8]>,
    x: i32,
    y: i32,
) -> Option<usize> {
    pick_adjacent_road_tile(world, road_to_edge, x, y).map(|p| world.idx(p.x, p.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn road_line(world: &mut World, x0: i32, x1: i32, y: i32) {
        for x in x0..=x1 {
            world.set_road(x, y);
        }
    }

    #[test]
    fn test_edge_mask_requires_edge_contact() {
        let mut world = World::new(8, 8, 1);
        // Interior loop, never touches the edge.
        road_line(&mut world, 2, 5, 3);
        let mask = compute_roads_connected_to_edge(&world);
        assert!(mask.iter().all(|&m| m == 0));

        // Extend to the west edge; the whole component lights up.
        road_line(&mut world, 0, 2, 3);
        let mask = compute_roads_connected_to_edge(&world);
        for x in 0..=5 {
            assert_eq!(mask[world.idx(x, 3)], 1);
        }
    }

    #[test]
    fn test_edge_mask_ignores_disconnected_components() {
        let mut world = World::new(8, 8, 1);
        road_line(&mut world, 0, 3, 1); // touches edge
        road_line(&mut world, 5, 6, 5); // island
        let mask = compute_roads_connected_to_edge(&world);
        assert_eq!(mask[world.idx(3, 1)], 1);
        assert_eq!(mask[world.idx(5, 5)], 0);
    }

    #[test]
    fn test_adjacent_pick_is_north_first() {
        let mut world = World::new(5, 5, 1);
        world.set_road(2, 1); // N of (2,2)
        world.set_road(3, 2); // E of (2,2)
        let p = pick_adjacent_road_tile(&world, None, 2, 2).unwrap();
        assert_eq!((p.x, p.y), (2, 1));
    }

    #[test]
    fn test_adjacent_pick_respects_mask() {
        let mut world = World::new(5, 5, 1);
        world.set_road(2, 1);
        world.set_road(3, 2);
        // Mask that only admits (3,2).
        let mut mask = vec![0u8; world.len()];
        let i = world.idx(3, 2);
        mask[i] = 1;
        let p = pick_adjacent_road_tile(&world, Some(&mask), 2, 2).unwrap();
        assert_eq!((p.x, p.y), (3, 2));
        assert!(pick_adjacent_road_tile(&world, Some(&mask), 0, 0).is_none());
    }

    #[test]
    fn test_bridge_travel_time() {
        let mut world = World::new(3, 3, 1);
        world.at_mut(1, 1).terrain = Terrain::Water;
        world.set_road(1, 1);
        world.set_road(1, 0);
        let bridge = tile_travel_time_milli(world.at(1, 1));
        let street = tile_travel_time_milli(world.at(1, 0));
        assert!(bridge > street);
    }
}
