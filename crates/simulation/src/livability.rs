//! Livability composite index.
//!
//! Normalized weighted sum of services access, walkability, and three
//! hazard comforts (clean air, quiet, thermal). Also emits a
//! population-weighted intervention priority field and resident
//! distribution stats (weighted percentiles and Gini) so tooling can rank
//! where help matters most.

use crate::air_pollution::{AirPollutionConfig, compute_air_pollution};
use crate::goods::GoodsResult;
use crate::grid::{Overlay, World};
use crate::heat_island::{HeatIslandConfig, compute_heat_island};
use crate::isochrone::IsochroneWeightMode;
use crate::noise_pollution::{NoiseConfig, compute_noise_pollution};
use crate::services::{ServicesConfig, compute_services, extract_service_facilities};
use crate::traffic::TrafficResult;
use crate::walkability::{WalkabilityConfig, compute_walkability};

#[derive(Debug, Clone, Copy)]
pub struct LivabilityConfig {
    // Component weights; normalized internally.
    pub weight_services: f32,
    pub weight_walkability: f32,
    pub weight_clean_air: f32,
    pub weight_quiet: f32,
    pub weight_thermal_comfort: f32,

    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,

    pub services_catchment_radius_steps: i32,
    pub walk_coverage_threshold_steps: i32,

    /// comfort = (1 - hazard01) ^ hazard_comfort_exponent
    pub hazard_comfort_exponent: f32,

    // Priority scoring.
    pub priority_occupant_scale: i32,
    pub priority_occupant_exponent: f32,
    pub priority_need_exponent: f32,
}

impl Default for LivabilityConfig {
    fn default() -> Self {
        Self {
            weight_services: 0.30,
            weight_walkability: 0.25,
            weight_clean_air: 0.20,
            weight_quiet: 0.15,
            weight_thermal_comfort: 0.10,
            require_outside_connection: true,
            weight_mode: IsochroneWeightMode::TravelTime,
            services_catchment_radius_steps: 18,
            walk_coverage_threshold_steps: 15,
            hazard_comfort_exponent: 1.0,
            priority_occupant_scale: 80,
            priority_occupant_exponent: 0.5,
            priority_need_exponent: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LivabilityResult {
    pub w: i32,
    pub h: i32,

    /// Per-tile score in [0,1]; higher is better.
    pub livability01: Vec<f32>,
    /// Per-tile intervention priority in [0,1]; higher is more urgent.
    pub priority01: Vec<f32>,

    pub max_livability01: f32,
    pub max_priority01: f32,

    pub resident_population: i32,
    pub resident_tile_count: i32,
    pub resident_mean_livability01: f32,
    pub resident_mean_services01: f32,
    pub resident_mean_walkability01: f32,
    pub resident_mean_clean_air01: f32,
    pub resident_mean_quiet01: f32,
    pub resident_mean_thermal01: f32,

    /// Occupant-weighted livability distribution among residents.
    pub resident_p10: f32,
    pub resident_median: f32,
    pub resident_p90: f32,
    /// Weighted Gini coefficient (0 equal, 1 unequal).
    pub resident_gini: f32,
}

#[derive(Clone, Copy)]
struct WeightedSample {
    v: f32,
    w: i32,
}

fn weighted_percentile(samples: &mut Vec<WeightedSample>, q: f32) -> f32 {
    samples.retain(|s| s.w > 0);
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(|a, b| a.v.total_cmp(&b.v).then(a.w.cmp(&b.w)));

    let total: i64 = samples.iter().map(|s| i64::from(s.w)).sum();
    if total <= 0 {
        return 0.0;
    }
    let target = f64::from(q.clamp(0.0, 1.0)) * total as f64;
    let mut acc = 0i64;
    for s in samples.iter() {
        acc += i64::from(s.w);
        if acc as f64 >= target {
            return s.v;
        }
    }
    samples.last().map(|s| s.v).unwrap_or(0.0)
}

fn weighted_gini(samples: &mut Vec<WeightedSample>) -> f32 {
    samples.retain(|s| s.w > 0 && s.v >= 0.0);
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(|a, b| a.v.total_cmp(&b.v).then(a.w.cmp(&b.w)));

    let mut total_w = 0.0f64;
    let mut total_v = 0.0f64;
    for s in samples.iter() {
        total_w += f64::from(s.w);
        total_v += f64::from(s.w) * f64::from(s.v);
    }
    if total_w <= 0.0 || total_v <= 0.0 {
        return 0.0;
    }

    // Area under the Lorenz curve.
    let mut cw = 0.0f64;
    let mut cv = 0.0f64;
    let mut prev_p = 0.0f64;
    let mut prev_q = 0.0f64;
    let mut area = 0.0f64;
    for s in samples.iter() {
        cw += f64::from(s.w);
        cv += f64::from(s.w) * f64::from(s.v);
        let p = cw / total_w;
        let q = cv / total_v;
        area += (q + prev_q) * 0.5 * (p - prev_p);
        prev_p = p;
        prev_q = q;
    }

    let g = 1.0 - 2.0 * area;
    if !g.is_finite() {
        return 0.0;
    }
    g.clamp(0.0, 1.0) as f32
}

fn hazard_to_comfort(hazard01: f32, exponent: f32) -> f32 {
    let c = 1.0 - hazard01.clamp(0.0, 1.0);
    c.powf(exponent.max(0.01)).clamp(0.0, 1.0)
}

/// Compute the composite livability score for a world.
pub fn compute_livability(
    world: &World,
    cfg: &LivabilityConfig,
    traffic: Option<&TrafficResult>,
    goods: Option<&GoodsResult>,
) -> LivabilityResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = LivabilityResult {
        w,
        h,
        livability01: vec![0.0; n],
        priority01: vec![0.0; n],
        ..LivabilityResult::default()
    };
    if n == 0 {
        return out;
    }

    // Normalize weights; degenerate configs fall back to equal weights.
    let mut ws = cfg.weight_services.max(0.0);
    let mut ww = cfg.weight_walkability.max(0.0);
    let mut wa = cfg.weight_clean_air.max(0.0);
    let mut wq = cfg.weight_quiet.max(0.0);
    let mut wt = cfg.weight_thermal_comfort.max(0.0);
    if ws + ww + wa + wq + wt <= 1e-6 {
        ws = 1.0;
        ww = 1.0;
        wa = 1.0;
        wq = 1.0;
        wt = 1.0;
    }
    let inv = 1.0 / (ws + ww + wa + wq + wt);
    ws *= inv;
    ww *= inv;
    wa *= inv;
    wq *= inv;
    wt *= inv;

    // --- Component fields ---
    let services_cfg = ServicesConfig {
        enabled: true,
        require_outside_connection: cfg.require_outside_connection,
        weight_mode: cfg.weight_mode,
        catchment_radius_steps: cfg.services_catchment_radius_steps,
        ..ServicesConfig::default()
    };
    let facilities = extract_service_facilities(world);
    let services = compute_services(world, &services_cfg, &facilities, None, None);

    let walk_cfg = WalkabilityConfig {
        require_outside_connection: cfg.require_outside_connection,
        weight_mode: cfg.weight_mode,
        coverage_threshold_steps: cfg.walk_coverage_threshold_steps,
        ..WalkabilityConfig::default()
    };
    let walkability = compute_walkability(world, &walk_cfg, None, None);

    let noise = compute_noise_pollution(world, &NoiseConfig::default(), traffic, goods);
    let heat = compute_heat_island(world, &HeatIslandConfig::default());
    // Wind stays seed-stable for a given world.
    let air_cfg = AirPollutionConfig {
        wind_from_seed: true,
        ..AirPollutionConfig::default()
    };
    let air = compute_air_pollution(world, &air_cfg, traffic, goods);

    let occ_scale = cfg.priority_occupant_scale.max(1) as f32;
    let occ_exp = cfg.priority_occupant_exponent.max(0.0);
    let need_exp = cfg.priority_need_exponent.max(0.0);

    let mut sum_liv = 0.0f64;
    let mut sum_svc = 0.0f64;
    let mut sum_walk = 0.0f64;
    let mut sum_air = 0.0f64;
    let mut sum_quiet = 0.0f64;
    let mut sum_therm = 0.0f64;
    let mut resident_samples: Vec<WeightedSample> = Vec::with_capacity(256);

    for y in 0..h {
        for x in 0..w {
            let i = world.idx(x, y);

            let svc01 = services.overall[i].clamp(0.0, 1.0);
            let walk01 = walkability.overall01[i].clamp(0.0, 1.0);
            let clean_air01 = hazard_to_comfort(air.pollution01[i], cfg.hazard_comfort_exponent);
            let quiet01 = hazard_to_comfort(noise.noise01[i], cfg.hazard_comfort_exponent);
            let thermal01 = hazard_to_comfort(heat.heat01[i], cfg.hazard_comfort_exponent);

            let liv = (ws * svc01 + ww * walk01 + wa * clean_air01 + wq * quiet01 + wt * thermal01)
                .clamp(0.0, 1.0);
            out.livability01[i] = liv;
            out.max_livability01 = out.max_livability01.max(liv);

            let t = world.at(x, y);
            let occ = i32::from(t.occupants);

            let mut pop01 = (occ as f32 / occ_scale).clamp(0.0, 1.0);
            if (occ_exp - 1.0).abs() > f32::EPSILON {
                pop01 = pop01.powf(occ_exp).clamp(0.0, 1.0);
            }
            let mut need01 = 1.0 - liv;
            if (need_exp - 1.0).abs() > f32::EPSILON {
                need01 = need01.powf(need_exp).clamp(0.0, 1.0);
            }
            let pr = (need01 * pop01).clamp(0.0, 1.0);
            out.priority01[i] = pr;
            out.max_priority01 = out.max_priority01.max(pr);

            if t.overlay == Overlay::Residential && occ > 0 {
                out.resident_tile_count += 1;
                out.resident_population = out.resident_population.saturating_add(occ);

                sum_liv += f64::from(liv) * f64::from(occ);
                sum_svc += f64::from(svc01) * f64::from(occ);
                sum_walk += f64::from(walk01) * f64::from(occ);
                sum_air += f64::from(clean_air01) * f64::from(occ);
                sum_quiet += f64::from(quiet01) * f64::from(occ);
                sum_therm += f64::from(thermal01) * f64::from(occ);

                resident_samples.push(WeightedSample { v: liv, w: occ });
            }
        }
    }

    if out.resident_population > 0 {
        let inv_pop = 1.0 / f64::from(out.resident_population);
        out.resident_mean_livability01 = (sum_liv * inv_pop) as f32;
        out.resident_mean_services01 = (sum_svc * inv_pop) as f32;
        out.resident_mean_walkability01 = (sum_walk * inv_pop) as f32;
        out.resident_mean_clean_air01 = (sum_air * inv_pop) as f32;
        out.resident_mean_quiet01 = (sum_quiet * inv_pop) as f32;
        out.resident_mean_thermal01 = (sum_therm * inv_pop) as f32;

        let mut p = resident_samples.clone();
        out.resident_p10 = weighted_percentile(&mut p, 0.10);
        let mut p = resident_samples.clone();
        out.resident_median = weighted_percentile(&mut p, 0.50);
        let mut p = resident_samples.clone();
        out.resident_p90 = weighted_percentile(&mut p, 0.90);
        out.resident_gini = weighted_gini(&mut resident_samples);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    fn livable_world() -> World {
        let mut world = World::new(20, 10, 3);
        for x in 0..20 {
            world.set_road(x, 5);
        }
        world.set_overlay(Overlay::Park, 3, 4);
        world.set_overlay(Overlay::School, 5, 6);
        for x in 2..7 {
            world.set_overlay(Overlay::Residential, x, 6);
            world.at_mut(x, 6).occupants = 25;
        }
        world.set_overlay(Overlay::Industrial, 16, 4);
        world.at_mut(16, 4).occupants = 30;
        world
    }

    #[test]
    fn test_fields_in_unit_range() {
        let world = livable_world();
        let res = compute_livability(&world, &LivabilityConfig::default(), None, None);
        assert!(res.livability01.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(res.priority01.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_priority_needs_population() {
        let world = livable_world();
        let res = compute_livability(&world, &LivabilityConfig::default(), None, None);
        // Empty tiles can be unlivable but never urgent.
        assert_eq!(res.priority01[world.idx(0, 0)], 0.0);
        // A populated residential tile registers some priority.
        assert!(res.priority01[world.idx(2, 6)] > 0.0);
    }

    #[test]
    fn test_resident_summary_populated() {
        let world = livable_world();
        let res = compute_livability(&world, &LivabilityConfig::default(), None, None);
        assert_eq!(res.resident_population, 125);
        assert_eq!(res.resident_tile_count, 5);
        assert!(res.resident_mean_livability01 > 0.0);
        assert!(res.resident_p10 <= res.resident_median);
        assert!(res.resident_median <= res.resident_p90);
        assert!((0.0..=1.0).contains(&res.resident_gini));
    }

    #[test]
    fn test_park_side_more_livable_than_industry_side() {
        let world = livable_world();
        let res = compute_livability(&world, &LivabilityConfig::default(), None, None);
        assert!(res.livability01[world.idx(3, 6)] > res.livability01[world.idx(16, 5)]);
    }

    #[test]
    fn test_weighted_percentile_and_gini_edge_cases() {
        let mut empty: Vec<WeightedSample> = Vec::new();
        assert_eq!(weighted_percentile(&mut empty, 0.5), 0.0);
        let mut empty: Vec<WeightedSample> = Vec::new();
        assert_eq!(weighted_gini(&mut empty), 0.0);

        let mut equal = vec![
            WeightedSample { v: 0.5, w: 10 },
            WeightedSample { v: 0.5, w: 20 },
        ];
        assert!(weighted_gini(&mut equal) < 1e-6);
    }
}
