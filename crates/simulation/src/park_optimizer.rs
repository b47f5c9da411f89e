//! Greedy park placement planner.
//!
//! Aggregates zone demand onto access roads, seeds the search with the
//! existing parks' access roads, then repeatedly picks the road tile that
//! maximizes demand x distance-to-nearest-park and claims an adjacent empty
//! tile for the new park. Planning never mutates the world; `apply` is a
//! separate step.

use crate::grid::{NEIGHBORS4, Overlay, Point, Terrain, World};
use crate::isochrone::{IsochroneWeightMode, RoadIsochroneConfig, build_road_isochrone_field};
use crate::roads::{compute_roads_connected_to_edge, mask_usable, pick_adjacent_road_tile};
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParkDemandMode {
    /// Every eligible zone tile contributes weight 1.
    Tiles,
    /// Eligible zone tiles contribute their occupant count.
    #[default]
    Occupants,
}

#[derive(Debug, Clone, Copy)]
pub struct ParkOptimizerConfig {
    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,
    pub demand_mode: ParkDemandMode,

    pub include_residential: bool,
    pub include_commercial: bool,
    pub include_industrial: bool,

    /// How many parks to propose.
    pub parks_to_add: i32,

    /// When > 0, score with `max(0, cost - target)` so demand beyond the
    /// target service level is prioritized. Milli-steps.
    pub target_cost_milli: i32,
}

impl Default for ParkOptimizerConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            weight_mode: IsochroneWeightMode::TravelTime,
            demand_mode: ParkDemandMode::Occupants,
            include_residential: true,
            include_commercial: true,
            include_industrial: true,
            parks_to_add: 10,
            target_cost_milli: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParkPlacement {
    /// Where the park goes.
    pub park_tile: Point,
    /// The road tile whose demand this placement serves.
    pub access_road: Point,
    pub demand_weight: u64,
    /// Distance to the nearest pre-existing park source; -1 when there was
    /// none.
    pub cost_milli_before: i32,
    /// Ranking score (higher is better).
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ParkOptimizerResult {
    pub w: i32,
    pub h: i32,
    pub existing_parks: i32,
    pub total_demand_weight: u64,
    /// In greedy selection order.
    pub placements: Vec<ParkPlacement>,
}

fn demand_weight(t: &crate::grid::Tile, cfg: &ParkOptimizerConfig) -> u64 {
    let included = match t.overlay {
        Overlay::Residential => cfg.include_residential,
        Overlay::Commercial => cfg.include_commercial,
        Overlay::Industrial => cfg.include_industrial,
        _ => false,
    };
    if !included {
        return 0;
    }
    match cfg.demand_mode {
        ParkDemandMode::Tiles => 1,
        ParkDemandMode::Occupants => u64::from(t.occupants),
    }
}

fn effective_cost(cost_milli: i32, target_cost_milli: i32) -> i32 {
    if target_cost_milli <= 0 || cost_milli <= 0 {
        return cost_milli;
    }
    (cost_milli - target_cost_milli).max(0)
}

/// Suggest park placements without mutating the world.
pub fn suggest_park_placements(
    world: &World,
    cfg: &ParkOptimizerConfig,
    zone_access: Option<&ZoneAccessMap>,
    road_to_edge: Option<&[u8]>,
) -> ParkOptimizerResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = ParkOptimizerResult {
        w,
        h,
        ..ParkOptimizerResult::default()
    };
    if n == 0 || cfg.parks_to_add <= 0 {
        return out;
    }

    let mask_owned;
    let mask: Option<&[u8]> = if cfg.require_outside_connection {
        if mask_usable(road_to_edge, n) {
            road_to_edge
        } else {
            mask_owned = compute_roads_connected_to_edge(world);
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

    // --- Demand aggregation: zone tiles onto their access road ---
    let mut demand_on_road = vec![0u64; n];
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            let wgt = demand_weight(t, cfg);
            if wgt == 0 {
                continue;
            }
            let ridx = zam.road_idx[world.idx(x, y)];
            if ridx < 0 {
                continue;
            }
            demand_on_road[ridx as usize] += wgt;
            out.total_demand_weight += wgt;
        }
    }
    if out.total_demand_weight == 0 {
        return out;
    }

    // --- Existing park sources ---
    let mut sources: Vec<i32> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Park || t.terrain == Terrain::Water {
                continue;
            }
            out.existing_parks += 1;
            if let Some(road) = pick_adjacent_road_tile(world, mask, x, y) {
                sources.push(world.idx(road.x, road.y) as i32);
            }
        }
    }
    sources.sort_unstable();
    sources.dedup();

    // --- Candidate park tile per road tile: first empty buildable neighbor ---
    let can_place = |x: i32, y: i32| -> bool {
        world.in_bounds(x, y)
            && world.at(x, y).terrain != Terrain::Water
            && world.at(x, y).overlay == Overlay::None
    };
    let mut candidate_park_tile = vec![-1i32; n];
    for y in 0..h {
        for x in 0..w {
            if world.at(x, y).overlay != Overlay::Road {
                continue;
            }
            let ridx = world.idx(x, y);
            if let Some(m) = mask {
                if m[ridx] == 0 {
                    continue;
                }
            }
            for (dx, dy) in NEIGHBORS4 {
                let (nx, ny) = (x + dx, y + dy);
                if can_place(nx, ny) {
                    candidate_park_tile[ridx] = world.idx(nx, ny) as i32;
                    break;
                }
            }
        }
    }

    // Deterministic "big cost" for road tiles unreachable from any park
    // (also used when there are no parks yet).
    let unreachable_penalty = (w + h + 8) * 1000;

    let icfg = RoadIsochroneConfig {
        require_outside_connection: cfg.require_outside_connection,
        weight_mode: cfg.weight_mode,
        compute_owner: false,
    };

    let mut used_park_tile = vec![false; n];
    let mut cur_sources = sources;

    for _ in 0..cfg.parks_to_add {
        let field = if cur_sources.is_empty() {
            None
        } else {
            Some(build_road_isochrone_field(world, &cur_sources, &icfg, mask, None))
        };

        let mut best_road = -1i32;
        let mut best_cost = -1i32;
        let mut best_demand = 0u64;
        let mut best_score = -1.0f64;

        for ridx in 0..n {
            let dmd = demand_on_road[ridx];
            if dmd == 0 {
                continue;
            }
            let park_idx = candidate_park_tile[ridx];
            if park_idx < 0 || used_park_tile[park_idx as usize] {
                continue;
            }

            let raw_cost = match &field {
                Some(f) => {
                    let c = f.cost_milli[ridx];
                    if c < 0 { unreachable_penalty } else { c }
                }
                None => unreachable_penalty,
            };
            let score =
                f64::from(effective_cost(raw_cost, cfg.target_cost_milli)) * dmd as f64;

            let better = score > best_score
                || (score == best_score && best_road >= 0 && (ridx as i32) < best_road);
            if better {
                best_score = score;
                best_road = ridx as i32;
                best_cost = field.as_ref().map_or(-1, |f| f.cost_milli[ridx]);
                best_demand = dmd;
            }
        }

        if best_road < 0 {
            break;
        }
        let park_idx = candidate_park_tile[best_road as usize];
        if park_idx < 0 {
            break;
        }
        used_park_tile[park_idx as usize] = true;

        out.placements.push(ParkPlacement {
            park_tile: Point::new(park_idx % w, park_idx / w),
            access_road: Point::new(best_road % w, best_road / w),
            demand_weight: best_demand,
            cost_milli_before: best_cost,
            score: best_score,
        });

        // The new park's access road becomes a source for later picks.
        cur_sources.push(best_road);
    }

    out
}

/// Apply suggested placements. Does not charge money or refresh stats.
pub fn apply_park_placements(world: &mut World, placements: &[ParkPlacement]) {
    for p in placements {
        world.set_overlay(Overlay::Park, p.park_tile.x, p.park_tile.y);
    }
}
