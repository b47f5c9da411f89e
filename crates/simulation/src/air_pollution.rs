//! Air pollution transport.
//!
//! Per-tile emission sources (traffic, land use, occupancy) minus local
//! sinks (parks, water, elevation ventilation), pushed through a cheap
//! semi-Lagrangian advection + diffusion solver with per-iteration
//! deposition and decay. Deterministic: the wind comes from the world seed
//! unless a fixed direction is configured.

use crate::goods::GoodsResult;
use crate::grid::{Overlay, Terrain, World};
use crate::rng::mix64;
use crate::traffic::TrafficResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindDir {
    #[default]
    None,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl WindDir {
    pub fn name(self) -> &'static str {
        match self {
            WindDir::None => "none",
            WindDir::N => "n",
            WindDir::Ne => "ne",
            WindDir::E => "e",
            WindDir::Se => "se",
            WindDir::S => "s",
            WindDir::Sw => "sw",
            WindDir::W => "w",
            WindDir::Nw => "nw",
        }
    }

    /// Unit-ish direction vector; `None` is (0, 0).
    pub fn vector(self) -> (f32, f32) {
        const DIAG: f32 = std::f32::consts::FRAC_1_SQRT_2;
        match self {
            WindDir::None => (0.0, 0.0),
            WindDir::N => (0.0, -1.0),
            WindDir::Ne => (DIAG, -DIAG),
            WindDir::E => (1.0, 0.0),
            WindDir::Se => (DIAG, DIAG),
            WindDir::S => (0.0, 1.0),
            WindDir::Sw => (-DIAG, DIAG),
            WindDir::W => (-1.0, 0.0),
            WindDir::Nw => (-DIAG, -DIAG),
        }
    }
}

/// Deterministically pick a prevailing wind from a seed (never `None`).
pub fn wind_dir_from_seed(seed: u64) -> WindDir {
    const DIRS: [WindDir; 8] = [
        WindDir::N,
        WindDir::Ne,
        WindDir::E,
        WindDir::Se,
        WindDir::S,
        WindDir::Sw,
        WindDir::W,
        WindDir::Nw,
    ];
    DIRS[((mix64(seed) >> 61) & 0x7) as usize]
}

#[derive(Debug, Clone, Copy)]
pub struct AirPollutionConfig {
    /// Transport iterations; more spreads the plume further.
    pub iterations: i32,
    /// Diffusion blend per iteration: 0 none, 1 full neighbor average.
    pub diffusion: f32,
    /// Advection blend: 0 no wind transport, 1 fully upwind.
    pub advection: f32,
    /// Wind speed in tiles per iteration.
    pub wind_speed: f32,
    /// Global dissipation per iteration.
    pub decay_per_iteration: f32,
    /// Use the 8-connected neighborhood for diffusion.
    pub eight_connected: bool,

    /// Seed-derived wind wins over `fixed_wind_dir` whenever set.
    pub wind_from_seed: bool,
    pub fixed_wind_dir: WindDir,

    // Emission weights.
    pub road_base: f32,
    pub road_class_boost: f32,
    pub commute_traffic_boost: f32,
    pub goods_traffic_boost: f32,
    pub residential_source: f32,
    pub commercial_source: f32,
    pub industrial_source: f32,
    pub civic_source: f32,

    // Sinks and ventilation applied to the source term.
    pub park_sink: f32,
    pub water_sink: f32,
    pub elevation_ventilation: f32,

    pub occupant_boost: f32,
    pub occupant_scale: i32,

    // Per-iteration deposition on absorbing surfaces.
    pub deposition_park: f32,
    pub deposition_water: f32,

    pub clamp: f32,

    /// Normalized fallback flows used when traffic/goods are not supplied.
    pub fallback_commute_traffic01: f32,
    pub fallback_goods_traffic01: f32,

    pub high_exposure_threshold: f32,
}

impl Default for AirPollutionConfig {
    fn default() -> Self {
        Self {
            iterations: 96,
            diffusion: 0.12,
            advection: 0.38,
            wind_speed: 1.05,
            decay_per_iteration: 0.010,
            eight_connected: true,
            wind_from_seed: true,
            fixed_wind_dir: WindDir::E,
            road_base: 0.08,
            road_class_boost: 0.04,
            commute_traffic_boost: 0.55,
            goods_traffic_boost: 0.28,
            residential_source: 0.04,
            commercial_source: 0.18,
            industrial_source: 0.72,
            civic_source: 0.08,
            park_sink: 0.12,
            water_sink: 0.20,
            elevation_ventilation: 0.10,
            occupant_boost: 0.10,
            occupant_scale: 60,
            deposition_park: 0.10,
            deposition_water: 0.18,
            clamp: 1.0,
            fallback_commute_traffic01: 0.12,
            fallback_goods_traffic01: 0.04,
            high_exposure_threshold: 0.65,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AirPollutionResult {
    pub w: i32,
    pub h: i32,

    /// Clamped per-tile source term in [0,1].
    pub emission01: Vec<f32>,
    /// Transported concentration in [0,1].
    pub pollution01: Vec<f32>,

    pub max_emission01: f32,
    pub max_pollution01: f32,

    pub residential_tile_count: i32,
    pub resident_population: i32,
    pub resident_avg_pollution01: f32,
    /// Share of residents at or above the high-exposure threshold.
    pub resident_high_exposure_frac: f32,

    pub wind_dir: WindDir,
}

fn sample_bilinear_clamped(field: &[f32], w: i32, h: i32, fx: f32, fy: f32) -> f32 {
    if w <= 0 || h <= 0 {
        return 0.0;
    }
    let fx = fx.clamp(0.0, (w - 1) as f32);
    let fy = fy.clamp(0.0, (h - 1) as f32);

    let x0 = fx.floor() as i32;
    let y0 = fy.floor() as i32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let at = |x: i32, y: i32| field[(y * w + x) as usize];
    let ab = at(x0, y0) + (at(x1, y0) - at(x0, y0)) * tx;
    let cd = at(x0, y1) + (at(x1, y1) - at(x0, y1)) * tx;
    ab + (cd - ab) * ty
}

/// Normalize a flow array against its recorded (or scanned) maximum.
pub(crate) fn normalized_flow(flow: &[u16], recorded_max: i32, idx: usize) -> Option<f32> {
    let mut max = recorded_max.clamp(0, i32::from(u16::MAX)) as u16;
    if max == 0 {
        max = flow.iter().copied().max().unwrap_or(0);
    }
    if max == 0 {
        return None;
    }
    Some(f32::from(flow[idx]) / f32::from(max))
}

/// Compute the per-tile air pollution field.
pub fn compute_air_pollution(
    world: &World,
    cfg: &AirPollutionConfig,
    traffic: Option<&TrafficResult>,
    goods: Option<&GoodsResult>,
) -> AirPollutionResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = AirPollutionResult {
        w,
        h,
        emission01: vec![0.0; n],
        pollution01: vec![0.0; n],
        wind_dir: cfg.fixed_wind_dir,
        ..AirPollutionResult::default()
    };
    if n == 0 {
        return out;
    }

    let clamp_abs = cfg.clamp.max(0.01);
    let iters = cfg.iterations.max(0);
    let diff = cfg.diffusion.clamp(0.0, 1.0);
    let adv = cfg.advection.clamp(0.0, 1.0);
    let wind_speed = cfg.wind_speed.max(0.0);
    let decay = cfg.decay_per_iteration.clamp(0.0, 1.0);
    let occ_scale = cfg.occupant_scale.max(1) as f32;

    let commute = traffic.filter(|t| t.road_traffic.len() == n);
    let freight = goods.filter(|g| g.road_goods_traffic.len() == n);

    // --- Emission field ---
    let mut max_emission = 0.0f32;
    for y in 0..h {
        for x in 0..w {
            let i = world.idx(x, y);
            let t = world.at(x, y);

            let mut e = -cfg.elevation_ventilation * t.height.clamp(0.0, 1.0);

            if t.terrain == Terrain::Water {
                e -= cfg.water_sink;
            }

            match t.overlay {
                Overlay::Road => {
                    let lvl = t.level.clamp(1, 3);
                    e += cfg.road_base + cfg.road_class_boost * f32::from(lvl - 1);

                    let commute01 = commute
                        .and_then(|t| normalized_flow(&t.road_traffic, t.max_traffic, i))
                        .unwrap_or(cfg.fallback_commute_traffic01);
                    e += cfg.commute_traffic_boost * commute01.clamp(0.0, 1.0);

                    let goods01 = freight
                        .and_then(|g| {
                            normalized_flow(&g.road_goods_traffic, g.max_road_goods_traffic, i)
                        })
                        .unwrap_or(cfg.fallback_goods_traffic01);
                    e += cfg.goods_traffic_boost * goods01.clamp(0.0, 1.0);
                }
                Overlay::Residential => e += cfg.residential_source,
                Overlay::Commercial => e += cfg.commercial_source,
                Overlay::Industrial => e += cfg.industrial_source,
                Overlay::Park => e -= cfg.park_sink,
                o if o.is_civic() => e += cfg.civic_source,
                _ => {}
            }

            if t.occupants > 0 {
                let occ01 = (f32::from(t.occupants) / occ_scale).clamp(0.0, 1.0);
                e += cfg.occupant_boost * occ01;
            }

            let e01 = (e.clamp(0.0, clamp_abs) / clamp_abs).clamp(0.0, 1.0);
            out.emission01[i] = e01;
            max_emission = max_emission.max(e01);
        }
    }
    out.max_emission01 = max_emission;

    // --- Transport ---
    let wind_dir = if cfg.wind_from_seed {
        wind_dir_from_seed(world.seed())
    } else {
        cfg.fixed_wind_dir
    };
    out.wind_dir = wind_dir;
    let (wind_x, wind_y) = wind_dir.vector();

    let mut cur = out.emission01.clone();
    let mut tmp = vec![0.0f32; n];
    let mut nxt = vec![0.0f32; n];

    let sample = |field: &[f32], x: i32, y: i32| -> f32 {
        let x = x.clamp(0, w - 1);
        let y = y.clamp(0, h - 1);
        field[(y * w + x) as usize]
    };

    for _ in 0..iters {
        // Diffusion towards the neighbor average.
        if diff > 0.0 {
            for y in 0..h {
                for x in 0..w {
                    let mut sum = sample(&cur, x - 1, y)
                        + sample(&cur, x + 1, y)
                        + sample(&cur, x, y - 1)
                        + sample(&cur, x, y + 1);
                    let mut cnt = 4;
                    if cfg.eight_connected {
                        sum += sample(&cur, x - 1, y - 1)
                            + sample(&cur, x + 1, y - 1)
                            + sample(&cur, x - 1, y + 1)
                            + sample(&cur, x + 1, y + 1);
                        cnt += 4;
                    }
                    let i = (y * w + x) as usize;
                    let v = cur[i];
                    tmp[i] = v + diff * (sum / cnt as f32 - v);
                }
            }
        } else {
            tmp.copy_from_slice(&cur);
        }

        // Semi-Lagrangian advection: sample from upwind.
        if adv > 0.0 && wind_speed > 0.0 && (wind_x != 0.0 || wind_y != 0.0) {
            for y in 0..h {
                for x in 0..w {
                    let i = (y * w + x) as usize;
                    let up = sample_bilinear_clamped(
                        &tmp,
                        w,
                        h,
                        x as f32 - wind_x * wind_speed,
                        y as f32 - wind_y * wind_speed,
                    );
                    nxt[i] = tmp[i] + adv * (up - tmp[i]);
                }
            }
        } else {
            nxt.copy_from_slice(&tmp);
        }

        // Deposition and decay.
        if decay > 0.0 || cfg.deposition_park > 0.0 || cfg.deposition_water > 0.0 {
            for y in 0..h {
                for x in 0..w {
                    let i = (y * w + x) as usize;
                    let t = world.at(x, y);
                    let mut v = nxt[i];

                    let mut dep = 0.0f32;
                    if t.overlay == Overlay::Park {
                        dep += cfg.deposition_park;
                    }
                    if t.terrain == Terrain::Water {
                        dep += cfg.deposition_water;
                    }
                    v *= 1.0 - dep.clamp(0.0, 0.95);
                    if decay > 0.0 {
                        v *= 1.0 - decay;
                    }

                    nxt[i] = v.clamp(0.0, 1.0);
                }
            }
        }

        std::mem::swap(&mut cur, &mut nxt);
    }

    out.pollution01 = cur;

    // --- Summaries ---
    out.max_pollution01 = out.pollution01.iter().copied().fold(0.0, f32::max);

    let mut pop = 0i64;
    let mut high_pop = 0i64;
    let mut sum_weighted = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || t.occupants == 0 {
                continue;
            }
            let i = world.idx(x, y);
            out.residential_tile_count += 1;
            pop += i64::from(t.occupants);
            sum_weighted += f64::from(out.pollution01[i]) * f64::from(t.occupants);
            if out.pollution01[i] >= cfg.high_exposure_threshold {
                high_pop += i64::from(t.occupants);
            }
        }
    }
    out.resident_population = pop.min(i64::from(i32::MAX)) as i32;
    if pop > 0 {
        out.resident_avg_pollution01 = (sum_weighted / pop as f64) as f32;
        out.resident_high_exposure_frac = high_pop as f32 / pop as f32;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    fn industrial_world() -> World {
        let mut world = World::new(24, 24, 77);
        world.set_overlay(Overlay::Industrial, 12, 12);
        world.at_mut(12, 12).occupants = 50;
        world.set_overlay(Overlay::Residential, 14, 12);
        world.at_mut(14, 12).occupants = 20;
        world
    }

    #[test]
    fn test_fields_stay_in_unit_range() {
        let world = industrial_world();
        let res = compute_air_pollution(&world, &AirPollutionConfig::default(), None, None);
        for i in 0..world.len() {
            assert!((0.0..=1.0).contains(&res.emission01[i]));
            assert!((0.0..=1.0).contains(&res.pollution01[i]));
        }
        assert!(res.max_pollution01 > 0.0);
    }

    #[test]
    fn test_industry_is_dirtier_than_open_land() {
        let world = industrial_world();
        let res = compute_air_pollution(&world, &AirPollutionConfig::default(), None, None);
        assert!(res.pollution01[world.idx(12, 12)] > res.pollution01[world.idx(1, 1)]);
    }

    #[test]
    fn test_seed_derived_wind_wins_over_fixed() {
        let world = industrial_world();
        let cfg = AirPollutionConfig {
            wind_from_seed: true,
            fixed_wind_dir: WindDir::None,
            ..AirPollutionConfig::default()
        };
        let res = compute_air_pollution(&world, &cfg, None, None);
        assert_eq!(res.wind_dir, wind_dir_from_seed(77));
        assert_ne!(res.wind_dir, WindDir::None);
    }

    #[test]
    fn test_fixed_wind_used_when_seed_wind_disabled() {
        let world = industrial_world();
        let cfg = AirPollutionConfig {
            wind_from_seed: false,
            fixed_wind_dir: WindDir::S,
            ..AirPollutionConfig::default()
        };
        let res = compute_air_pollution(&world, &cfg, None, None);
        assert_eq!(res.wind_dir, WindDir::S);
    }

    #[test]
    fn test_parks_absorb() {
        let mut dirty = industrial_world();
        let res_before = compute_air_pollution(&dirty, &AirPollutionConfig::default(), None, None);
        // Ring the factory with parks.
        for (dx, dy) in crate::grid::NEIGHBORS8 {
            dirty.set_overlay(Overlay::Park, 12 + dx, 12 + dy);
        }
        let res_after = compute_air_pollution(&dirty, &AirPollutionConfig::default(), None, None);
        assert!(
            res_after.pollution01[dirty.idx(12, 12)] < res_before.pollution01[dirty.idx(12, 12)]
        );
    }

    #[test]
    fn test_resident_exposure_summary() {
        let world = industrial_world();
        let res = compute_air_pollution(&world, &AirPollutionConfig::default(), None, None);
        assert_eq!(res.resident_population, 20);
        assert!(res.resident_avg_pollution01 > 0.0);
        assert!((0.0..=1.0).contains(&res.resident_high_exposure_frac));
    }

    #[test]
    fn test_deterministic() {
        let world = industrial_world();
        let a = compute_air_pollution(&world, &AirPollutionConfig::default(), None, None);
        let b = compute_air_pollution(&world, &AirPollutionConfig::default(), None, None);
        assert_eq!(a.pollution01, b.pollution01);
    }
}
