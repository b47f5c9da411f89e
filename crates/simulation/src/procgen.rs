//! Procedural world generation.
//!
//! Pipeline: fBm terrain + classification, per-tile variation stamp, hub
//! selection, road carving between hubs (A* corridor with a wiggly greedy
//! fallback for disconnected land), a guaranteed outside connection, then
//! zone/park seeding along the carved roads. Every random draw comes from
//! the world-seeded [`SimRng`], so `(w, h, seed, cfg)` fully determines the
//! result.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::districts::assign_districts;
use crate::grid::{NEIGHBORS4, Overlay, Point, Terrain, World};
use crate::pathfind::{LandPathConfig, find_land_path};
use crate::rng::{SimRng, hash_coords32};
use crate::value_noise::fbm2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ProcGenConfig {
    /// Sample-space scale applied to tile coordinates before the fBm call.
    pub terrain_scale: f32,
    /// Heights below this classify as water.
    pub water_level: f32,
    /// Heights below this (and above water) classify as sand.
    pub sand_level: f32,

    /// Number of town centers to scatter and connect.
    pub hubs: i32,
    /// Extra random hub-to-hub connections carved for loops.
    pub extra_connections: i32,

    /// Probability that an empty road-adjacent tile seeds a zone.
    pub zone_chance: f32,
    /// Probability that an empty road-adjacent tile becomes a park
    /// (checked before the zone roll).
    pub park_chance: f32,
}

impl Default for ProcGenConfig {
    fn default() -> Self {
        Self {
            terrain_scale: 0.08,
            water_level: 0.35,
            sand_level: 0.42,
            hubs: 4,
            extra_connections: 2,
            zone_chance: 0.22,
            park_chance: 0.06,
        }
    }
}

fn random_land(rng: &mut SimRng, world: &World) -> Point {
    let w = world.width();
    let h = world.height();
    for _ in 0..10_000 {
        let x = rng.range_i32(0, w - 1);
        let y = rng.range_i32(0, h - 1);
        if world.is_buildable(x, y) {
            return Point::new(x, y);
        }
    }
    Point::new(w / 2, h / 2)
}

/// Nearest buildable border tile. A small random tie-break keeps edge
/// connections from always hugging the same corner, while staying
/// deterministic for a given seed.
fn closest_buildable_edge(rng: &mut SimRng, world: &World, from: Point) -> Point {
    let w = world.width();
    let h = world.height();
    let mut best = from;
    let mut best_dist = i32::MAX;

    let consider = |rng: &mut SimRng, x: i32, y: i32, best: &mut Point, best_dist: &mut i32| {
        if !world.is_buildable(x, y) {
            return;
        }
        let d = (x - from.x).abs() + (y - from.y).abs();
        if d < *best_dist {
            *best_dist = d;
            *best = Point::new(x, y);
        } else if d == *best_dist && rng.chance(0.25) {
            *best = Point::new(x, y);
        }
    };

    for x in 0..w {
        consider(rng, x, 0, &mut best, &mut best_dist);
        if h > 1 {
            consider(rng, x, h - 1, &mut best, &mut best_dist);
        }
    }
    for y in 1..h - 1 {
        consider(rng, 0, y, &mut best, &mut best_dist);
        if w > 1 {
            consider(rng, w - 1, y, &mut best, &mut best_dist);
        }
    }

    best
}

#[inline]
fn sign(v: i32) -> i32 {
    (v > 0) as i32 - (v < 0) as i32
}

/// Legacy greedy carver, used only when A* reports the endpoints
/// disconnected. Wiggles deterministically in the RNG.
fn carve_road_wiggle(world: &mut World, rng: &mut SimRng, a: Point, b: Point) {
    let mut p = a;
    let max_steps = world.width() * world.height() * 2;

    world.set_road(p.x, p.y);

    for _ in 0..max_steps {
        if p.x == b.x && p.y == b.y {
            break;
        }

        let dx = b.x - p.x;
        let dy = b.y - p.y;
        let mut sx = sign(dx);
        let mut sy = sign(dy);

        // Occasional sideways drift for organic-looking roads.
        if rng.chance(0.08) {
            if rng.chance(0.5) {
                if sx == 0 {
                    sx = if rng.chance(0.5) { 1 } else { -1 };
                }
            } else if sy == 0 {
                sy = if rng.chance(0.5) { 1 } else { -1 };
            }
        }

        let step_x = if sx != 0 && sy != 0 {
            // Bias towards the axis with more distance remaining.
            let adx = dx.abs() as f32;
            let ady = dy.abs() as f32;
            rng.next_f01() < adx / (adx + ady)
        } else {
            sx != 0
        };

        let try_step = |world: &mut World, p: &mut Point, nx: i32, ny: i32| -> bool {
            if !world.in_bounds(nx, ny) {
                return false;
            }
            let t = world.at(nx, ny);
            if t.terrain == Terrain::Water {
                return false;
            }
            *p = Point::new(nx, ny);
            world.set_road(p.x, p.y);
            true
        };

        if step_x {
            let (nx, ny) = (p.x + sx, p.y);
            if try_step(world, &mut p, nx, ny) {
                continue;
            }
            if sy != 0 {
                let (nx, ny) = (p.x, p.y + sy);
                if try_step(world, &mut p, nx, ny) {
                    continue;
                }
            }
        } else {
            let (nx, ny) = (p.x, p.y + sy);
            if try_step(world, &mut p, nx, ny) {
                continue;
            }
            if sx != 0 {
                let (nx, ny) = (p.x + sx, p.y);
                if try_step(world, &mut p, nx, ny) {
                    continue;
                }
            }
        }

        // Blocked; try a random adjacent land tile.
        let mut moved = false;
        for _ in 0..4 {
            let k = rng.range_i32(0, 3) as usize;
            let (dx, dy) = NEIGHBORS4[k];
            let (nx, ny) = (p.x + dx, p.y + dy);
            if try_step(world, &mut p, nx, ny) {
                moved = true;
                break;
            }
        }
        if !moved {
            break;
        }
    }
}

fn carve_road(world: &mut World, rng: &mut SimRng, a: Point, b: Point) {
    let cfg = LandPathConfig {
        allow_roads: true,
        allow_bridges: false,
    };
    if let Some(path) = find_land_path(world, a, b, &cfg) {
        for p in path {
            world.set_road(p.x, p.y);
        }
        return;
    }
    carve_road_wiggle(world, rng, a, b);
}

/// Generate a world from `(width, height, seed, cfg)`.
pub fn generate_world(width: i32, height: i32, seed: u64, cfg: &ProcGenConfig) -> World {
    let mut world = World::new(width, height, seed);
    let mut rng = SimRng::new(seed);
    let noise_seed = seed as u32;

    // --- Terrain ---
    for y in 0..height {
        for x in 0..width {
            let nx = (x as f32 - width as f32 * 0.5) * cfg.terrain_scale;
            let ny = (y as f32 - height as f32 * 0.5) * cfg.terrain_scale;
            let e = fbm2(nx, ny, noise_seed, 6, 2.0, 0.5);

            let t = world.at_mut(x, y);
            t.height = e;
            t.variation = (hash_coords32(x, y, noise_seed) & 0xFF) as u8;
            t.terrain = if e < cfg.water_level {
                Terrain::Water
            } else if e < cfg.sand_level {
                Terrain::Sand
            } else {
                Terrain::Grass
            };
        }
    }

    // --- Hubs ---
    let hubs = cfg.hubs.max(2);
    let mut hub_pts = Vec::with_capacity(hubs as usize);
    for _ in 0..hubs {
        hub_pts.push(random_land(&mut rng, &world));
    }

    assign_districts(&mut world, &hub_pts);

    // --- Connect hubs: a chain, then extra loops ---
    for i in 1..hub_pts.len() {
        carve_road(&mut world, &mut rng, hub_pts[i - 1], hub_pts[i]);
    }
    for _ in 0..cfg.extra_connections.max(0) {
        let a = rng.range_i32(0, hubs - 1) as usize;
        let b = rng.range_i32(0, hubs - 1) as usize;
        if a == b {
            continue;
        }
        carve_road(&mut world, &mut rng, hub_pts[a], hub_pts[b]);
    }

    // --- Guarantee an outside connection ---
    if let Some(&first) = hub_pts.first() {
        let edge = closest_buildable_edge(&mut rng, &world, first);
        carve_road(&mut world, &mut rng, first, edge);
    }

    // --- Seed zones and parks along the carved roads ---
    for y in 0..height {
        for x in 0..width {
            if world.at(x, y).overlay != Overlay::Road {
                continue;
            }
            for (dx, dy) in NEIGHBORS4 {
                let (nx, ny) = (x + dx, y + dy);
                if !world.is_empty_land(nx, ny) {
                    continue;
                }

                let r = rng.next_f01();
                if r < cfg.park_chance {
                    world.set_overlay(Overlay::Park, nx, ny);
                    continue;
                }
                if r < cfg.park_chance + cfg.zone_chance {
                    let z = rng.next_f01();
                    let zone = if z < 0.65 {
                        Overlay::Residential
                    } else if z < 0.85 {
                        Overlay::Commercial
                    } else {
                        Overlay::Industrial
                    };
                    world.set_overlay(zone, nx, ny);

                    // Some initial variety in levels.
                    if rng.chance(0.12) {
                        world.at_mut(nx, ny).level = 2;
                    }
                    if rng.chance(0.04) {
                        world.at_mut(nx, ny).level = 3;
                    }
                }
            }
        }
    }

    world
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_world;
    use crate::roads::compute_roads_connected_to_edge;

    #[test]
    fn test_generation_deterministic() {
        let cfg = ProcGenConfig::default();
        let a = generate_world(32, 24, 123, &cfg);
        let b = generate_world(32, 24, 123, &cfg);
        assert_eq!(hash_world(&a, true), hash_world(&b, true));
    }

    #[test]
    fn test_different_seeds_differ() {
        let cfg = ProcGenConfig::default();
        let a = generate_world(32, 24, 1, &cfg);
        let b = generate_world(32, 24, 2, &cfg);
        assert_ne!(hash_world(&a, false), hash_world(&b, false));
    }

    #[test]
    fn test_terrain_classification_matches_thresholds() {
        let cfg = ProcGenConfig::default();
        let world = generate_world(24, 24, 7, &cfg);
        for t in world.tiles() {
            match t.terrain {
                Terrain::Water => assert!(t.height < cfg.water_level),
                Terrain::Sand => {
                    assert!(t.height >= cfg.water_level && t.height < cfg.sand_level);
                }
                Terrain::Grass => assert!(t.height >= cfg.sand_level),
            }
        }
    }

    #[test]
    fn test_world_has_outside_connection() {
        let cfg = ProcGenConfig::default();
        let world = generate_world(32, 32, 5, &cfg);
        let mask = compute_roads_connected_to_edge(&world);
        assert!(mask.iter().any(|&m| m == 1));
    }

    #[test]
    fn test_roads_avoid_water() {
        let cfg = ProcGenConfig::default();
        let world = generate_world(48, 48, 11, &cfg);
        for t in world.tiles() {
            if t.overlay == Overlay::Road {
                // The generator never plans bridges.
                assert_ne!(t.terrain, Terrain::Water);
            }
        }
    }

    #[test]
    fn test_zones_only_on_land_and_levels_in_range() {
        let cfg = ProcGenConfig::default();
        let world = generate_world(40, 40, 9, &cfg);
        let mut zones = 0;
        for t in world.tiles() {
            if t.overlay.is_zone() {
                zones += 1;
                assert_ne!(t.terrain, Terrain::Water);
                assert!((1..=3).contains(&t.level));
                assert_eq!(t.occupants, 0);
            }
        }
        assert!(zones > 0, "default config should seed some zones");
    }

    #[test]
    fn test_road_masks_consistent_after_generation() {
        let world = generate_world(32, 32, 3, &ProcGenConfig::default());
        for y in 0..world.height() {
            for x in 0..world.width() {
                let t = world.at(x, y);
                if t.overlay == Overlay::Road {
                    assert_eq!(t.road_mask(), world.computed_road_mask(x, y));
                } else {
                    assert_eq!(t.road_mask(), 0);
                }
            }
        }
    }
}
