//! Urban heat island field.
//!
//! Same transport scheme as the air model (diffusion + upwind advection +
//! decay) with heat-specific coefficients: paved surfaces and dense
//! development store heat, greenery and water cool. Heat spreads less and
//! advects more weakly than airborne pollution.

use crate::air_pollution::{WindDir, wind_dir_from_seed};
use crate::grid::{Overlay, Terrain, World};

#[derive(Debug, Clone, Copy)]
pub struct HeatIslandConfig {
    pub iterations: i32,
    pub diffusion: f32,
    pub advection: f32,
    pub wind_speed: f32,
    pub decay_per_iteration: f32,
    pub eight_connected: bool,

    pub wind_from_seed: bool,
    pub fixed_wind_dir: WindDir,

    // Heat retention by surface.
    pub road_source: f32,
    pub residential_source: f32,
    pub commercial_source: f32,
    pub industrial_source: f32,
    pub civic_source: f32,

    pub occupant_boost: f32,
    pub occupant_scale: i32,

    // Cooling.
    pub park_sink: f32,
    pub water_sink: f32,
    pub elevation_cooling: f32,

    pub clamp: f32,
}

impl Default for HeatIslandConfig {
    fn default() -> Self {
        Self {
            iterations: 48,
            diffusion: 0.18,
            advection: 0.15,
            wind_speed: 0.65,
            decay_per_iteration: 0.015,
            eight_connected: false,
            wind_from_seed: true,
            fixed_wind_dir: WindDir::E,
            road_source: 0.35,
            residential_source: 0.22,
            commercial_source: 0.34,
            industrial_source: 0.48,
            civic_source: 0.20,
            occupant_boost: 0.08,
            occupant_scale: 60,
            park_sink: 0.30,
            water_sink: 0.45,
            elevation_cooling: 0.12,
            clamp: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeatIslandResult {
    pub w: i32,
    pub h: i32,
    /// Per-tile heat intensity in [0,1].
    pub heat01: Vec<f32>,
    pub max_heat01: f32,

    pub resident_population: i32,
    pub resident_avg_heat01: f32,
}

/// Compute the heat island field.
pub fn compute_heat_island(world: &World, cfg: &HeatIslandConfig) -> HeatIslandResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = HeatIslandResult {
        w,
        h,
        heat01: vec![0.0; n],
        ..HeatIslandResult::default()
    };
    if n == 0 {
        return out;
    }

    let clamp_abs = cfg.clamp.max(0.01);
    let occ_scale = cfg.occupant_scale.max(1) as f32;

    // Heat retention map.
    let mut cur = vec![0.0f32; n];
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            let mut e = -cfg.elevation_cooling * t.height.clamp(0.0, 1.0);

            if t.terrain == Terrain::Water {
                e -= cfg.water_sink;
            }
            match t.overlay {
                Overlay::Road => e += cfg.road_source,
                Overlay::Residential => e += cfg.residential_source,
                Overlay::Commercial => e += cfg.commercial_source,
                Overlay::Industrial => e += cfg.industrial_source,
                Overlay::Park => e -= cfg.park_sink,
                o if o.is_civic() => e += cfg.civic_source,
                _ => {}
            }
            if t.occupants > 0 {
                e += cfg.occupant_boost * (f32::from(t.occupants) / occ_scale).clamp(0.0, 1.0);
            }

            cur[world.idx(x, y)] = (e.clamp(0.0, clamp_abs) / clamp_abs).clamp(0.0, 1.0);
        }
    }

    let wind_dir = if cfg.wind_from_seed {
        wind_dir_from_seed(world.seed())
    } else {
        cfg.fixed_wind_dir
    };
    let (wind_x, wind_y) = wind_dir.vector();

    let diff = cfg.diffusion.clamp(0.0, 1.0);
    let adv = cfg.advection.clamp(0.0, 1.0);
    let wind_speed = cfg.wind_speed.max(0.0);
    let decay = cfg.decay_per_iteration.clamp(0.0, 1.0);

    let mut nxt = vec![0.0f32; n];
    let sample = |field: &[f32], x: i32, y: i32| -> f32 {
        field[((y.clamp(0, h - 1)) * w + x.clamp(0, w - 1)) as usize]
    };

    for _ in 0..cfg.iterations.max(0) {
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                let v = cur[i];

                // Diffusion.
                let mut blended = v;
                if diff > 0.0 {
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
                    blended = v + diff * (sum / cnt as f32 - v);
                }

                // Weak upwind advection (integer upwind sample is enough for
                // heat; the air model keeps the bilinear version).
                if adv > 0.0 && wind_speed > 0.0 && (wind_x != 0.0 || wind_y != 0.0) {
                    let ux = x - (wind_x * wind_speed).round() as i32;
                    let uy = y - (wind_y * wind_speed).round() as i32;
                    let up = sample(&cur, ux, uy);
                    blended += adv * (up - blended);
                }

                // Cooling surfaces keep removing heat each pass.
                let t = world.at(x, y);
                if t.terrain == Terrain::Water {
                    blended *= 1.0 - cfg.water_sink.clamp(0.0, 0.95);
                } else if t.overlay == Overlay::Park {
                    blended *= 1.0 - cfg.park_sink.clamp(0.0, 0.95);
                }
                blended *= 1.0 - decay;

                nxt[i] = blended.clamp(0.0, 1.0);
            }
        }
        std::mem::swap(&mut cur, &mut nxt);
    }

    out.heat01 = cur;
    out.max_heat01 = out.heat01.iter().copied().fold(0.0, f32::max);

    let mut pop = 0i64;
    let mut sum = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || t.occupants == 0 {
                continue;
            }
            pop += i64::from(t.occupants);
            sum += f64::from(out.heat01[world.idx(x, y)]) * f64::from(t.occupants);
        }
    }
    out.resident_population = pop.min(i64::from(i32::MAX)) as i32;
    if pop > 0 {
        out.resident_avg_heat01 = (sum / pop as f64) as f32;
    }

    out
}
