//! Crime risk model.
//!
//! Per-tile risk in [0,1] built from land-use bases, occupant density,
//! economic stress (job access shortfalls), activity proxies (commute and
//! freight flow, noise), suppressed by police accessibility and shaped by a
//! final response curve. Deliberately a gameplay heuristic, not a claim of
//! real-world predictive validity.

use crate::goods::GoodsResult;
use crate::grid::{Overlay, World};
use crate::isochrone::{
    IsochroneWeightMode, RoadIsochroneConfig, TileAccessCostConfig, build_road_isochrone_field,
    build_tile_access_cost_field,
};
use crate::jobs::JobOpportunityResult;
use crate::noise_pollution::NoiseResult;
use crate::roads::{compute_roads_connected_to_edge, mask_usable, pick_adjacent_road_index};
use crate::traffic::TrafficResult;
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};
use crate::config::road_capacity;
use crate::roads::tile_travel_time_milli;

#[derive(Debug, Clone, Copy)]
pub struct CrimeConfig {
    pub enabled: bool,
    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,
    pub access_step_cost_milli: i32,

    /// Police response curve: cost == half_life → access ~0.5; access fades
    /// to zero approaching max_cost.
    pub response_half_life_cost_milli: i32,
    pub response_max_cost_milli: i32,

    /// risk *= (1 - suppression * police_access01)
    pub police_suppression_strength: f32,

    // Congestion-aware response routing.
    pub congestion_costs: bool,
    pub road_tile_capacity: i32,
    pub congestion_alpha: f32,
    pub congestion_beta: f32,
    pub congestion_capacity_scale: f32,
    pub congestion_ratio_clamp: f32,

    // Base risk by land use.
    pub base_none: f32,
    pub base_road: f32,
    pub base_residential: f32,
    pub base_commercial: f32,
    pub base_industrial: f32,
    pub base_park: f32,
    pub base_service: f32,

    /// Added per zone level above 1.
    pub level_boost: f32,

    pub occupants_weight: f32,
    pub job_access_weight: f32,
    pub job_opportunity_weight: f32,
    pub traffic_opportunity_weight: f32,
    pub goods_traffic_weight: f32,
    pub noise_weight: f32,

    /// Final output curve; < 1 expands high-risk differences.
    pub risk_curve_exp: f32,
}

impl Default for CrimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_outside_connection: true,
            weight_mode: IsochroneWeightMode::TravelTime,
            access_step_cost_milli: 1000,
            response_half_life_cost_milli: 12_000,
            response_max_cost_milli: 45_000,
            police_suppression_strength: 0.45,
            congestion_costs: true,
            road_tile_capacity: 28,
            congestion_alpha: 0.15,
            congestion_beta: 4.0,
            congestion_capacity_scale: 1.0,
            congestion_ratio_clamp: 3.0,
            base_none: 0.15,
            base_road: 0.30,
            base_residential: 0.22,
            base_commercial: 0.45,
            base_industrial: 0.55,
            base_park: 0.25,
            base_service: 0.12,
            level_boost: 0.06,
            occupants_weight: 0.18,
            job_access_weight: 0.16,
            job_opportunity_weight: 0.06,
            traffic_opportunity_weight: 0.10,
            goods_traffic_weight: 0.08,
            noise_weight: 0.10,
            risk_curve_exp: 0.75,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrimeResult {
    pub w: i32,
    pub h: i32,

    pub police_stations: i32,
    pub police_access_road_tiles: i32,

    /// Response cost to the nearest station in milli-steps; -1 unreachable.
    pub police_cost_milli: Vec<i32>,
    /// Policing accessibility in [0,1]; higher is better.
    pub police_access01: Vec<f32>,
    /// Crime risk in [0,1]; higher is worse.
    pub risk01: Vec<f32>,

    pub resident_population: i32,
    pub resident_mean_risk: f32,
    pub resident_mean_police_access: f32,
}

/// Unweighted p-quantile of positive occupant samples.
fn percentile(mut samples: Vec<i32>, q: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let k = ((q * (samples.len() - 1) as f32).round() as usize).min(samples.len() - 1);
    samples.select_nth_unstable(k);
    samples[k] as f32
}

/// Compute the crime model for a world.
#[allow(clippy::too_many_arguments)]
pub fn compute_crime(
    world: &World,
    cfg: &CrimeConfig,
    traffic: Option<&TrafficResult>,
    goods: Option<&GoodsResult>,
    jobs: Option<&JobOpportunityResult>,
    noise: Option<&NoiseResult>,
    road_to_edge: Option<&[u8]>,
    zone_access: Option<&ZoneAccessMap>,
) -> CrimeResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = CrimeResult {
        w,
        h,
        police_cost_milli: vec![-1; n],
        police_access01: vec![0.0; n],
        risk01: vec![0.0; n],
        ..CrimeResult::default()
    };
    if n == 0 || !cfg.enabled {
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

    // --- Police station sources ---
    let mut used = vec![false; n];
    let mut sources: Vec<i32> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if world.at(x, y).overlay != Overlay::PoliceStation {
                continue;
            }
            out.police_stations += 1;
            if let Some(r) = pick_adjacent_road_index(world, mask, x, y) {
                if !used[r] {
                    used[r] = true;
                    sources.push(r as i32);
                }
            }
        }
    }
    sources.sort_unstable();
    out.police_access_road_tiles = sources.len() as i32;

    // --- Optional congestion-aware response costs ---
    let commute = traffic.filter(|t| t.road_traffic.len() == n);
    let extra_cost: Option<Vec<i32>> = commute.filter(|_| cfg.congestion_costs).map(|t| {
        let cap_scale = cfg.congestion_capacity_scale.max(0.01);
        let mut extra = vec![0i32; n];
        for idx in 0..n {
            let tile = world.tile_at_index(idx);
            if tile.overlay != Overlay::Road {
                continue;
            }
            if let Some(m) = mask {
                if m[idx] == 0 {
                    continue;
                }
            }
            let base = tile_travel_time_milli(tile) as f32;
            let cap = (road_capacity(cfg.road_tile_capacity, tile.level) as f32 * cap_scale).max(1.0);
            let ratio = (f32::from(t.road_traffic[idx]) / cap)
                .clamp(0.0, cfg.congestion_ratio_clamp.max(0.0));
            let mult = 1.0 + cfg.congestion_alpha * ratio.powf(cfg.congestion_beta);
            extra[idx] = (((mult - 1.0) * base).round() as i32).max(0);
        }
        extra
    });

    // --- Police access field ---
    if !sources.is_empty() {
        let rcfg = RoadIsochroneConfig {
            require_outside_connection: cfg.require_outside_connection,
            weight_mode: cfg.weight_mode,
            compute_owner: false,
        };
        let road_field =
            build_road_isochrone_field(world, &sources, &rcfg, mask, extra_cost.as_deref());

        let tcfg = TileAccessCostConfig {
            access_step_cost_milli: cfg.access_step_cost_milli.max(0),
            ..TileAccessCostConfig::default()
        };
        out.police_cost_milli =
            build_tile_access_cost_field(world, &road_field, &tcfg, mask, Some(zam));

        let half_life = (cfg.response_half_life_cost_milli.max(1)) as f32;
        let max_cost = (cfg.response_max_cost_milli.max(1)) as f32;
        for i in 0..n {
            let c = out.police_cost_milli[i];
            if c < 0 {
                continue;
            }
            let cc = c as f32;
            let score = 1.0 / (1.0 + cc / half_life);
            let fade = 1.0 - ((cc - 0.70 * max_cost) / (0.30 * max_cost)).clamp(0.0, 1.0);
            out.police_access01[i] = (score * fade).clamp(0.0, 1.0);
        }
    }

    // --- Normalized activity proxies ---
    let freight = goods.filter(|g| g.road_goods_traffic.len() == n);
    let jobs = jobs.filter(|j| j.job_access01.len() == n && j.job_opportunity01.len() == n);
    let noise = noise.filter(|m| m.noise01.len() == n);

    // Occupancy scale: 95th percentile of occupied zone tiles.
    let mut occ_samples: Vec<i32> = Vec::new();
    for t in world.tiles() {
        if t.overlay.is_zone() && t.occupants > 0 {
            occ_samples.push(i32::from(t.occupants));
        }
    }
    let occ_p95 = percentile(occ_samples, 0.95).max(1.0);

    // --- Risk assembly ---
    let mut res_pop = 0u64;
    let mut res_risk_sum = 0.0f64;
    let mut res_police_sum = 0.0f64;

    for y in 0..h {
        for x in 0..w {
            let i = world.idx(x, y);
            let t = world.at(x, y);

            let mut r = match t.overlay {
                Overlay::Road => cfg.base_road,
                Overlay::Residential => cfg.base_residential,
                Overlay::Commercial => cfg.base_commercial,
                Overlay::Industrial => cfg.base_industrial,
                Overlay::Park => cfg.base_park,
                o if o.is_civic() => cfg.base_service,
                _ => cfg.base_none,
            };

            if t.overlay.is_zone() {
                r += cfg.level_boost * f32::from(t.level.clamp(1, 3) - 1);
                if t.occupants > 0 {
                    let occ01 = (f32::from(t.occupants) / occ_p95).clamp(0.0, 1.0);
                    r += cfg.occupants_weight * occ01.sqrt();
                }
            }

            if let Some(j) = jobs {
                r += cfg.job_access_weight * (1.0 - j.job_access01[i].clamp(0.0, 1.0));
                r += cfg.job_opportunity_weight * (1.0 - j.job_opportunity01[i].clamp(0.0, 1.0));
            }

            if let Some(t_res) = commute {
                if let Some(flow01) =
                    crate::air_pollution::normalized_flow(&t_res.road_traffic, t_res.max_traffic, i)
                {
                    r += cfg.traffic_opportunity_weight * flow01.max(0.0).sqrt().clamp(0.0, 1.0);
                }
            }
            if let Some(g) = freight {
                if let Some(g01) = crate::air_pollution::normalized_flow(
                    &g.road_goods_traffic,
                    g.max_road_goods_traffic,
                    i,
                ) {
                    r += cfg.goods_traffic_weight * g01.max(0.0).sqrt().clamp(0.0, 1.0);
                }
            }
            if let Some(m) = noise {
                r += cfg.noise_weight * m.noise01[i].clamp(0.0, 1.0);
            }

            let p = out.police_access01[i].clamp(0.0, 1.0);
            r *= 1.0 - cfg.police_suppression_strength * p;
            if t.overlay == Overlay::PoliceStation {
                r *= 0.25;
            }

            let r = r.clamp(0.0, 1.0).powf(cfg.risk_curve_exp.max(0.05));
            out.risk01[i] = r;

            if t.overlay == Overlay::Residential && t.occupants > 0 {
                res_pop += u64::from(t.occupants);
                res_risk_sum += f64::from(r) * f64::from(t.occupants);
                res_police_sum += f64::from(p) * f64::from(t.occupants);
            }
        }
    }

    out.resident_population = res_pop.min(i32::MAX as u64) as i32;
    if res_pop > 0 {
        out.resident_mean_risk = (res_risk_sum / res_pop as f64) as f32;
        out.resident_mean_police_access = (res_police_sum / res_pop as f64) as f32;
    }

    out
}
