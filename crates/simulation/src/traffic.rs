//! Commute traffic assignment.
//!
//! Residents on residential tiles are demand; job capacity on commercial and
//! industrial tiles is supply. The baseline mode is all-or-nothing: every
//! resident routes to the nearest reachable job destination on the
//! travel-time-weighted road grid. Congestion-aware mode splits demand over
//! a fixed number of incremental passes, re-pricing road tiles with a BPR
//! curve between passes. Capacity-aware mode additionally penalizes
//! destinations as they over-fill and re-fits the assignment.
//!
//! Flow accumulation follows the Dijkstra potential downhill, so the routed
//! paths are exactly the shortest paths the field describes and inherit its
//! tie-breaking.

use crate::config::road_capacity;
use crate::grid::{NEIGHBORS4, Overlay, Terrain, World};
use crate::pathfind::{RoadFlowField, RoadFlowFieldConfig, build_road_flow_field};
use crate::roads::{mask_usable, pick_adjacent_road_index, tile_travel_time_milli};
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy)]
pub struct TrafficConfig {
    pub require_outside_connection: bool,

    /// Multi-pass congestion-aware routing for commute estimates.
    pub congestion_aware_routing: bool,
    /// Number of incremental assignment passes; 1 is classic all-or-nothing.
    pub congestion_iterations: i32,
    /// BPR curve: t = t0 * (1 + alpha * (v/c)^beta).
    pub congestion_alpha: f32,
    pub congestion_beta: f32,
    pub congestion_capacity_scale: f32,
    pub congestion_ratio_clamp: f32,
    /// Base per-tile vehicle capacity for a street; higher classes scale up.
    pub road_tile_capacity: i32,

    /// Soft destination capacity constraints via per-source penalties.
    pub capacity_aware_jobs: bool,
    pub job_assignment_iterations: i32,
    /// Penalty scale in milli travel-time units (1000 ~= one street tile).
    pub job_penalty_base_milli: i32,

    /// A road tile counts as congested at this volume/capacity ratio.
    pub congested_ratio_threshold: f32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            congestion_aware_routing: false,
            congestion_iterations: 4,
            congestion_alpha: 0.15,
            congestion_beta: 4.0,
            congestion_capacity_scale: 1.0,
            congestion_ratio_clamp: 3.0,
            road_tile_capacity: 28,
            capacity_aware_jobs: false,
            job_assignment_iterations: 6,
            job_penalty_base_milli: 8000,
            congested_ratio_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrafficResult {
    pub w: i32,
    pub h: i32,

    /// Per-road-tile commute flow (saturating).
    pub road_traffic: Vec<u16>,
    pub max_traffic: i32,

    pub commuters: i32,
    pub commuters_unreachable: i32,

    /// Mean commute length in road steps over reachable commuters.
    pub avg_commute_steps: f32,
    /// Weighted 95th percentile of commute steps.
    pub p95_commute_steps: f32,
    /// Mean commute travel time in street-step equivalents.
    pub avg_commute_time: f32,

    /// Share of loaded road tiles at or above the congested ratio, in [0,1].
    pub congestion01: f32,
    pub congested_road_tiles: i32,
}

struct Resident {
    road_idx: usize,
    occupants: i32,
}

/// BPR-style extra entry cost per road tile for the current flow.
fn congestion_extra_cost(world: &World, cfg: &TrafficConfig, flow: &[i64]) -> Vec<i32> {
    let n = world.len();
    let mut extra = vec![0i32; n];
    let cap_scale = cfg.congestion_capacity_scale.max(0.01);

    for idx in 0..n {
        let t = world.tile_at_index(idx);
        if t.overlay != Overlay::Road || flow[idx] <= 0 {
            continue;
        }
        let base = tile_travel_time_milli(t) as f32;
        let cap = (road_capacity(cfg.road_tile_capacity, t.level) as f32 * cap_scale).max(1.0);
        let ratio = (flow[idx] as f32 / cap).clamp(0.0, cfg.congestion_ratio_clamp.max(0.0));
        let mult = 1.0 + cfg.congestion_alpha * ratio.powf(cfg.congestion_beta);
        extra[idx] = (((mult - 1.0) * base).round() as i32).max(0);
    }
    extra
}

/// Walk the field downhill from `start`, adding `amount` of flow to every
/// tile on the route (start included). Returns the owner label at the start
/// tile, or -1.
pub(crate) fn route_downhill(
    world: &World,
    field: &RoadFlowField,
    start: usize,
    amount: i64,
    flow: &mut [i64],
) {
    let w = field.w;
    if field.cost.get(start).copied().unwrap_or(-1) < 0 {
        return;
    }

    let mut cur = start;
    for _ in 0..flow.len() {
        flow[cur] += amount;

        let cx = (cur as i32) % w;
        let cy = (cur as i32) / w;
        let cur_key = (field.cost[cur], field.dist[cur]);

        let mut best: Option<(i32, i32, usize)> = None;
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (cx + dx, cy + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            let ni = world.idx(nx, ny);
            let c = field.cost[ni];
            if c < 0 {
                continue;
            }
            let key = (c, field.dist[ni]);
            if key >= cur_key {
                continue;
            }
            let cand = (c, field.dist[ni], ni);
            if best.map_or(true, |b| cand < b) {
                best = Some(cand);
            }
        }

        match best {
            Some((_, _, ni)) => cur = ni,
            None => break, // reached a source
        }
    }
}

/// Compute the commute assignment for a world.
pub fn compute_traffic(
    world: &World,
    cfg: &TrafficConfig,
    road_to_edge: Option<&[u8]>,
    zone_access: Option<&ZoneAccessMap>,
) -> TrafficResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = TrafficResult {
        w,
        h,
        road_traffic: vec![0; n],
        ..TrafficResult::default()
    };
    if n == 0 {
        return out;
    }

    // Outside-connection mask and zone access, cached or rebuilt.
    let mask_owned;
    let mask: Option<&[u8]> = if cfg.require_outside_connection {
        if mask_usable(road_to_edge, n) {
            road_to_edge
        } else {
            mask_owned = crate::roads::compute_roads_connected_to_edge(world);
            Some(&mask_owned)
        }
    } else {
        None
    };

    let zam_owned;
    let zam: &ZoneAccessMap = match zone_access {
        Some(z) if z.w == w && z.h == h && z.road_idx.len() == n => z,
        _ => {
            zam_owned = build_zone_access_map(world, mask);
            &zam_owned
        }
    };

    let access_road_for = |x: i32, y: i32, idx: usize| -> Option<usize> {
        let ridx = zam.road_idx[idx];
        if ridx >= 0 {
            return Some(ridx as usize);
        }
        pick_adjacent_road_index(world, mask, x, y)
    };

    // --- Job destinations: access road -> capacity ---
    let mut job_cap_on_road = vec![0i64; n];
    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            let t = world.at(x, y);
            if !matches!(t.overlay, Overlay::Commercial | Overlay::Industrial) {
                continue;
            }
            if t.terrain == Terrain::Water {
                continue;
            }
            let cap = crate::grid::capacity_for_tile(t);
            if cap <= 0 {
                continue;
            }
            if let Some(r) = access_road_for(x, y, idx) {
                job_cap_on_road[r] += i64::from(cap);
            }
        }
    }
    let sources: Vec<i32> = (0..n)
        .filter(|&i| job_cap_on_road[i] > 0)
        .map(|i| i as i32)
        .collect();

    // --- Residents ---
    let mut residents: Vec<Resident> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || t.occupants == 0 {
                continue;
            }
            let occ = i32::from(t.occupants);
            out.commuters += occ;
            match access_road_for(x, y, idx) {
                Some(r) => residents.push(Resident {
                    road_idx: r,
                    occupants: occ,
                }),
                None => out.commuters_unreachable += occ,
            }
        }
    }

    if sources.is_empty() || residents.is_empty() {
        out.commuters_unreachable = out.commuters;
        return out;
    }

    let fcfg = RoadFlowFieldConfig {
        require_outside_connection: cfg.require_outside_connection,
        use_travel_time: true,
        compute_owner: true,
    };

    let passes = if cfg.congestion_aware_routing {
        cfg.congestion_iterations.max(1)
    } else {
        1
    };
    let job_rounds = if cfg.capacity_aware_jobs {
        cfg.job_assignment_iterations.max(1)
    } else {
        1
    };

    let mut penalties = vec![0i32; sources.len()];
    let mut flow = vec![0i64; n];
    let mut last_field = RoadFlowField::unreachable(w, h);

    for round in 0..job_rounds {
        flow.iter_mut().for_each(|v| *v = 0);
        let mut routed = vec![0i64; sources.len()];

        for pass in 0..passes {
            let extra = if cfg.congestion_aware_routing && pass > 0 {
                Some(congestion_extra_cost(world, cfg, &flow))
            } else {
                None
            };
            let offsets = if cfg.capacity_aware_jobs {
                Some(penalties.as_slice())
            } else {
                None
            };
            last_field = build_road_flow_field(
                world,
                &sources,
                &fcfg,
                mask,
                extra.as_deref(),
                offsets,
            );

            for res in &residents {
                let occ = i64::from(res.occupants);
                // Pass k carries its incremental share of the demand.
                let portion = occ * i64::from(pass + 1) / i64::from(passes)
                    - occ * i64::from(pass) / i64::from(passes);
                if portion <= 0 {
                    continue;
                }
                if last_field.cost[res.road_idx] < 0 {
                    continue;
                }
                route_downhill(world, &last_field, res.road_idx, portion, &mut flow);
                let owner = last_field.owner[res.road_idx];
                if owner >= 0 {
                    routed[owner as usize] += portion;
                }
            }
        }

        // Re-price over-filled destinations for the next fitting round.
        if cfg.capacity_aware_jobs && round + 1 < job_rounds {
            for (s, routed_demand) in routed.iter().enumerate() {
                let cap = job_cap_on_road[sources[s] as usize].max(1);
                let overfill = ((routed_demand - cap).max(0) as f32) / cap as f32;
                let add = (cfg.job_penalty_base_milli as f32 * overfill).round() as i32;
                penalties[s] = (penalties[s] + add.max(0)).min(1_000_000);
            }
        }
    }

    // --- Summaries from the final field ---
    let mut unreachable = out.commuters_unreachable;
    let mut samples: Vec<(i32, i32)> = Vec::with_capacity(residents.len());
    let mut sum_steps = 0f64;
    let mut sum_milli = 0f64;
    let mut reachable_pop = 0i64;

    for res in &residents {
        let c = last_field.cost[res.road_idx];
        if c < 0 {
            unreachable += res.occupants;
            continue;
        }
        let steps = last_field.dist[res.road_idx];
        reachable_pop += i64::from(res.occupants);
        sum_steps += f64::from(steps) * f64::from(res.occupants);
        sum_milli += f64::from(c) * f64::from(res.occupants);
        samples.push((steps, res.occupants));
    }
    out.commuters_unreachable = unreachable;

    if reachable_pop > 0 {
        out.avg_commute_steps = (sum_steps / reachable_pop as f64) as f32;
        out.avg_commute_time = (sum_milli / reachable_pop as f64 / 1000.0) as f32;

        samples.sort_unstable();
        let target = (reachable_pop as f64 * 0.95).ceil() as i64;
        let mut acc = 0i64;
        for (steps, occ) in samples {
            acc += i64::from(occ);
            if acc >= target {
                out.p95_commute_steps = steps as f32;
                break;
            }
        }
    }

    // --- Flow → per-tile result + congestion summary ---
    let cap_scale = cfg.congestion_capacity_scale.max(0.01);
    let mut loaded_tiles = 0i32;
    let mut ratio_sum = 0f64;
    for idx in 0..n {
        let v = flow[idx];
        if v <= 0 {
            continue;
        }
        out.road_traffic[idx] = v.min(i64::from(u16::MAX)) as u16;
        out.max_traffic = out.max_traffic.max(v.min(i64::from(i32::MAX)) as i32);

        let t = world.tile_at_index(idx);
        let cap = (road_capacity(cfg.road_tile_capacity, t.level) as f32 * cap_scale).max(1.0);
        let ratio = v as f32 / cap;
        loaded_tiles += 1;
        ratio_sum += f64::from(ratio.min(1.0));
        if ratio >= cfg.congested_ratio_threshold {
            out.congested_road_tiles += 1;
        }
    }
    if loaded_tiles > 0 {
        out.congestion01 = (ratio_sum / f64::from(loaded_tiles)) as f32;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    /// Straight street with homes on the west end and jobs on the east end.
    fn commuter_world(pop: u8) -> World {
        let mut world = World::new(16, 5, 1);
        for x in 0..16 {
            world.set_road(x, 2);
        }
        for x in 1..4 {
            world.set_overlay(Overlay::Residential, x, 1);
            world.at_mut(x, 1).occupants = pop;
        }
        for x in 12..15 {
            world.set_overlay(Overlay::Commercial, x, 3);
            world.at_mut(x, 3).level = 3;
        }
        world
    }

    #[test]
    fn test_flow_accumulates_along_corridor() {
        let world = commuter_world(10);
        let cfg = TrafficConfig {
            require_outside_connection: false,
            ..TrafficConfig::default()
        };
        let res = compute_traffic(&world, &cfg, None, None);
        assert_eq!(res.commuters, 30);
        assert_eq!(res.commuters_unreachable, 0);
        // The middle of the corridor carries all three households.
        assert!(res.road_traffic[world.idx(8, 2)] >= 30);
        assert!(res.avg_commute_steps > 0.0);
        assert!(res.p95_commute_steps >= res.avg_commute_steps);
    }

    #[test]
    fn test_no_jobs_means_unreachable_commuters() {
        let mut world = World::new(8, 5, 1);
        for x in 0..8 {
            world.set_road(x, 2);
        }
        world.set_overlay(Overlay::Residential, 2, 1);
        world.at_mut(2, 1).occupants = 9;
        let cfg = TrafficConfig {
            require_outside_connection: false,
            ..TrafficConfig::default()
        };
        let res = compute_traffic(&world, &cfg, None, None);
        assert_eq!(res.commuters, 9);
        assert_eq!(res.commuters_unreachable, 9);
        assert_eq!(res.max_traffic, 0);
    }

    #[test]
    fn test_congestion_aware_never_faster() {
        let world = commuter_world(200);
        let base = TrafficConfig {
            require_outside_connection: false,
            ..TrafficConfig::default()
        };
        let congested = TrafficConfig {
            congestion_aware_routing: true,
            ..base
        };
        let off = compute_traffic(&world, &base, None, None);
        let on = compute_traffic(&world, &congested, None, None);
        assert!(on.avg_commute_time >= off.avg_commute_time);
    }

    #[test]
    fn test_deterministic() {
        let world = commuter_world(60);
        let cfg = TrafficConfig {
            require_outside_connection: false,
            congestion_aware_routing: true,
            capacity_aware_jobs: true,
            ..TrafficConfig::default()
        };
        let a = compute_traffic(&world, &cfg, None, None);
        let b = compute_traffic(&world, &cfg, None, None);
        assert_eq!(a.road_traffic, b.road_traffic);
        assert_eq!(a.avg_commute_time, b.avg_commute_time);
    }

    #[test]
    fn test_outside_connection_rule_blocks_island() {
        // Island network: homes and jobs connected to each other but not to
        // the map edge.
        let mut world = World::new(12, 12, 1);
        for x in 3..9 {
            world.set_road(x, 5);
        }
        world.set_overlay(Overlay::Residential, 3, 4);
        world.at_mut(3, 4).occupants = 8;
        world.set_overlay(Overlay::Commercial, 8, 6);

        let open = TrafficConfig {
            require_outside_connection: false,
            ..TrafficConfig::default()
        };
        let strict = TrafficConfig {
            require_outside_connection: true,
            ..TrafficConfig::default()
        };
        let res_open = compute_traffic(&world, &open, None, None);
        let res_strict = compute_traffic(&world, &strict, None, None);
        assert_eq!(res_open.commuters_unreachable, 0);
        assert_eq!(res_strict.commuters_unreachable, 8);
    }

    #[test]
    fn test_occupants_drive_volume() {
        let light = compute_traffic(
            &commuter_world(5),
            &TrafficConfig {
                require_outside_connection: false,
                ..TrafficConfig::default()
            },
            None,
            None,
        );
        let heavy = compute_traffic(
            &commuter_world(50),
            &TrafficConfig {
                require_outside_connection: false,
                ..TrafficConfig::default()
            },
            None,
            None,
        );
        assert!(heavy.max_traffic > light.max_traffic);
    }
}
