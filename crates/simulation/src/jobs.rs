//! Job accessibility fields.
//!
//! Two per-tile scores in [0, 1] consumed by the crime model and reporting:
//! `job_access01` decays with travel time to the nearest job destination,
//! `job_opportunity01` additionally scales with how well the citywide job
//! supply covers the population.

use crate::grid::{Overlay, Terrain, World, capacity_for_tile};
use crate::isochrone::{
    RoadIsochroneConfig, TileAccessCostConfig, build_road_isochrone_field,
    build_tile_access_cost_field,
};
use crate::roads::pick_adjacent_road_index;
use crate::zone_access::ZoneAccessMap;

#[derive(Debug, Clone, Copy)]
pub struct JobOpportunityConfig {
    pub require_outside_connection: bool,
    /// Cost at which access drops to ~0.5.
    pub access_half_life_milli: i32,
    /// Access fades to zero approaching this cost.
    pub access_max_cost_milli: i32,
    /// Walk cost when mapping a road cost onto a parcel.
    pub access_step_cost_milli: i32,
}

impl Default for JobOpportunityConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            access_half_life_milli: 9000,
            access_max_cost_milli: 40000,
            access_step_cost_milli: 1000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobOpportunityResult {
    pub w: i32,
    pub h: i32,
    pub job_access01: Vec<f32>,
    pub job_opportunity01: Vec<f32>,
    pub jobs_capacity: i32,
    pub population: i32,
}

fn access_curve(cost_milli: i32, half_life: f32, max_cost: f32) -> f32 {
    if cost_milli < 0 {
        return 0.0;
    }
    let c = cost_milli as f32;
    let score = 1.0 / (1.0 + c / half_life);
    let fade = 1.0 - ((c - 0.70 * max_cost) / (0.30 * max_cost)).clamp(0.0, 1.0);
    (score * fade).clamp(0.0, 1.0)
}

pub fn compute_job_opportunity(
    world: &World,
    cfg: &JobOpportunityConfig,
    road_to_edge: Option<&[u8]>,
    zone_access: Option<&ZoneAccessMap>,
) -> JobOpportunityResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = JobOpportunityResult {
        w,
        h,
        job_access01: vec![0.0; n],
        job_opportunity01: vec![0.0; n],
        ..JobOpportunityResult::default()
    };
    if n == 0 {
        return out;
    }

    // Gather job destination access roads and the global supply/demand.
    let mut is_source = vec![false; n];
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            match t.overlay {
                Overlay::Residential => {
                    out.population = out.population.saturating_add(i32::from(t.occupants));
                }
                Overlay::Commercial | Overlay::Industrial => {
                    if t.terrain == Terrain::Water {
                        continue;
                    }
                    let cap = capacity_for_tile(t);
                    if cap <= 0 {
                        continue;
                    }
                    out.jobs_capacity = out.jobs_capacity.saturating_add(cap);
                    let idx = world.idx(x, y);
                    let road = zone_access
                        .and_then(|z| {
                            let r = z.road_idx.get(idx).copied().unwrap_or(-1);
                            (r >= 0).then_some(r as usize)
                        })
                        .or_else(|| pick_adjacent_road_index(world, road_to_edge, x, y));
                    if let Some(r) = road {
                        is_source[r] = true;
                    }
                }
                _ => {}
            }
        }
    }

    let sources: Vec<i32> = (0..n).filter(|&i| is_source[i]).map(|i| i as i32).collect();
    if sources.is_empty() {
        return out;
    }

    let rcfg = RoadIsochroneConfig {
        require_outside_connection: cfg.require_outside_connection,
        ..RoadIsochroneConfig::default()
    };
    let field = build_road_isochrone_field(world, &sources, &rcfg, road_to_edge, None);

    let tcfg = TileAccessCostConfig {
        access_step_cost_milli: cfg.access_step_cost_milli.max(0),
        ..TileAccessCostConfig::default()
    };
    let costs = build_tile_access_cost_field(world, &field, &tcfg, road_to_edge, zone_access);

    let half_life = (cfg.access_half_life_milli.max(1)) as f32;
    let max_cost = (cfg.access_max_cost_milli.max(1)) as f32;

    // Citywide coverage: how much of the population the job supply could
    // absorb, independent of distance.
    let coverage = if out.population > 0 {
        (out.jobs_capacity as f32 / out.population as f32).clamp(0.0, 1.0)
    } else {
        1.0
    };

    for i in 0..n {
        let access = access_curve(costs[i], half_life, max_cost);
        out.job_access01[i] = access;
        out.job_opportunity01[i] = (access * coverage).clamp(0.0, 1.0);
    }

    out
}
