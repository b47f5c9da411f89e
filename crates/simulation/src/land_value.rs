//! Land value field.
//!
//! Additive model around a neutral baseline: waterfront and parks raise
//! value, industry and ambient hazards (air, noise) lower it, civic
//! facilities give a small radius boost. Feeds zone desirability in the
//! growth step and the tax land-value multiplier in the budget.

use crate::air_pollution::AirPollutionResult;
use crate::grid::{NEIGHBORS4, Overlay, Terrain, World};
use crate::noise_pollution::NoiseResult;

#[derive(Debug, Clone, Copy)]
pub struct LandValueConfig {
    pub baseline: f32,
    pub water_tile_value: f32,
    pub water_adjacency_boost: f32,

    pub park_boost: f32,
    pub park_radius: i32,
    pub civic_boost: f32,
    pub civic_radius: i32,

    pub industrial_penalty: f32,
    pub pollution_weight: f32,
    pub noise_weight: f32,
}

impl Default for LandValueConfig {
    fn default() -> Self {
        Self {
            baseline: 0.50,
            water_tile_value: 0.30,
            water_adjacency_boost: 0.15,
            park_boost: 0.20,
            park_radius: 8,
            civic_boost: 0.10,
            civic_radius: 6,
            industrial_penalty: 0.15,
            pollution_weight: 0.35,
            noise_weight: 0.20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LandValueResult {
    pub w: i32,
    pub h: i32,
    /// Per-tile value in [0,1].
    pub value01: Vec<f32>,
    pub avg_value01: f32,
}

/// Compute the land value field.
pub fn compute_land_value(
    world: &World,
    cfg: &LandValueConfig,
    air: Option<&AirPollutionResult>,
    noise: Option<&NoiseResult>,
) -> LandValueResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = LandValueResult {
        w,
        h,
        value01: vec![0.0; n],
        avg_value01: 0.0,
    };
    if n == 0 {
        return out;
    }

    let air = air.filter(|a| a.pollution01.len() == n);
    let noise = noise.filter(|m| m.noise01.len() == n);

    // Base pass.
    for y in 0..h {
        for x in 0..w {
            let i = world.idx(x, y);
            let t = world.at(x, y);

            let mut v = if t.terrain == Terrain::Water {
                cfg.water_tile_value
            } else {
                let mut v = cfg.baseline;
                for (dx, dy) in NEIGHBORS4 {
                    let (nx, ny) = (x + dx, y + dy);
                    if world.in_bounds(nx, ny) && world.at(nx, ny).terrain == Terrain::Water {
                        v += cfg.water_adjacency_boost;
                        break;
                    }
                }
                v
            };

            if t.overlay == Overlay::Industrial {
                v -= cfg.industrial_penalty;
            }
            if let Some(a) = air {
                v -= cfg.pollution_weight * a.pollution01[i].clamp(0.0, 1.0);
            }
            if let Some(m) = noise {
                v -= cfg.noise_weight * m.noise01[i].clamp(0.0, 1.0);
            }

            out.value01[i] = v;
        }
    }

    // Radius boosts from parks and civic facilities, linear falloff with
    // Manhattan distance.
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            let (boost, radius) = match t.overlay {
                Overlay::Park => (cfg.park_boost, cfg.park_radius),
                o if o.is_civic() => (cfg.civic_boost, cfg.civic_radius),
                _ => continue,
            };
            let radius = radius.max(1);
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let d = dx.abs() + dy.abs();
                    if d > radius {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if !world.in_bounds(nx, ny) {
                        continue;
                    }
                    let effect = boost * (1.0 - d as f32 / radius as f32);
                    out.value01[world.idx(nx, ny)] += effect;
                }
            }
        }
    }

    let mut sum = 0.0f64;
    for v in &mut out.value01 {
        *v = v.clamp(0.0, 1.0);
        sum += f64::from(*v);
    }
    out.avg_value01 = (sum / n as f64) as f32;

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    #[test]
    fn test_park_raises_nearby_value() {
        let mut world = World::new(20, 20, 1);
        world.set_overlay(Overlay::Park, 10, 10);
        let res = compute_land_value(&world, &LandValueConfig::default(), None, None);
        assert!(res.value01[world.idx(10, 10)] > res.value01[world.idx(1, 1)]);
        assert!(res.value01[world.idx(11, 10)] > res.value01[world.idx(1, 1)]);
    }

    #[test]
    fn test_industry_lowers_value() {
        let mut world = World::new(10, 10, 1);
        world.set_overlay(Overlay::Industrial, 5, 5);
        let res = compute_land_value(&world, &LandValueConfig::default(), None, None);
        assert!(res.value01[world.idx(5, 5)] < res.value01[world.idx(1, 1)]);
    }

    #[test]
    fn test_waterfront_premium() {
        let mut world = World::new(10, 10, 1);
        for y in 0..10 {
            world.at_mut(0, y).terrain = Terrain::Water;
        }
        let res = compute_land_value(&world, &LandValueConfig::default(), None, None);
        // Shoreline beats inland; open water itself is cheap.
        assert!(res.value01[world.idx(1, 5)] > res.value01[world.idx(6, 5)]);
        assert!(res.value01[world.idx(0, 5)] < res.value01[world.idx(1, 5)]);
    }

    #[test]
    fn test_values_clamped_and_avg_consistent() {
        let mut world = World::new(8, 8, 1);
        for i in 0..8 {
            world.set_overlay(Overlay::Park, i, 3);
        }
        let res = compute_land_value(&world, &LandValueConfig::default(), None, None);
        assert!(res.value01.iter().all(|&v| (0.0..=1.0).contains(&v)));
        let mean: f32 =
            res.value01.iter().sum::<f32>() / res.value01.len() as f32;
        assert!((mean - res.avg_value01).abs() < 1e-3);
    }
}
