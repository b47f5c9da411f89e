//! Noise pollution field.
//!
//! A land-use emission map (roads scaled by commute/goods flow, industry,
//! commerce, with parks and water as sinks) convolved with a Manhattan-ball
//! kernel weighted `1 / (1 + d * decay)`. The output is clamped to [0,1]
//! and square-rooted so low values stay visible in exports.

use crate::air_pollution::normalized_flow;
use crate::goods::GoodsResult;
use crate::grid::{Overlay, Terrain, World};
use crate::traffic::TrafficResult;

#[derive(Debug, Clone, Copy)]
pub struct NoiseConfig {
    /// Influence radius in tiles.
    pub radius: i32,
    /// weight = 1 / (1 + manhattan_distance * decay_per_tile)
    pub decay_per_tile: f32,

    pub road_base: f32,
    pub road_class_boost: f32,
    pub commute_traffic_boost: f32,
    pub goods_traffic_boost: f32,

    pub industrial_source: f32,
    pub commercial_source: f32,

    pub park_sink: f32,
    pub water_sink: f32,

    pub emission_clamp: f32,
    /// Fallback road activity when no traffic result is supplied.
    pub fallback_commute_traffic01: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            radius: 10,
            decay_per_tile: 1.0,
            road_base: 0.30,
            road_class_boost: 0.20,
            commute_traffic_boost: 0.55,
            goods_traffic_boost: 0.35,
            industrial_source: 0.85,
            commercial_source: 0.40,
            park_sink: 0.35,
            water_sink: 0.12,
            emission_clamp: 1.0,
            fallback_commute_traffic01: 0.20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoiseResult {
    pub w: i32,
    pub h: i32,
    /// Per-tile noise in [0,1].
    pub noise01: Vec<f32>,
    pub max_noise: f32,
}

struct KernelOffset {
    dx: i32,
    dy: i32,
    weight: f32,
}

/// Compute per-tile noise in [0,1].
pub fn compute_noise_pollution(
    world: &World,
    cfg: &NoiseConfig,
    traffic: Option<&TrafficResult>,
    goods: Option<&GoodsResult>,
) -> NoiseResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = NoiseResult {
        w,
        h,
        noise01: vec![0.0; n],
        max_noise: 0.0,
    };
    if n == 0 {
        return out;
    }

    let commute = traffic.filter(|t| t.road_traffic.len() == n);
    let freight = goods.filter(|g| g.road_goods_traffic.len() == n);

    // --- Emission map (signed; sinks go negative) ---
    let clamp = cfg.emission_clamp.max(1e-6);
    let mut emission = vec![0.0f32; n];
    for y in 0..h {
        for x in 0..w {
            let i = world.idx(x, y);
            let t = world.at(x, y);

            let mut e = 0.0f32;
            if t.overlay == Overlay::Park {
                e -= cfg.park_sink;
            }
            if t.terrain == Terrain::Water {
                e -= cfg.water_sink;
            }

            match t.overlay {
                Overlay::Industrial => e += cfg.industrial_source,
                Overlay::Commercial => e += cfg.commercial_source,
                Overlay::Road => {
                    let lvl = t.level.clamp(1, 3);
                    e += cfg.road_base + cfg.road_class_boost * f32::from(lvl - 1);

                    let commute01 = commute
                        .and_then(|t| normalized_flow(&t.road_traffic, t.max_traffic, i))
                        .unwrap_or(cfg.fallback_commute_traffic01);
                    e += cfg.commute_traffic_boost * commute01.clamp(0.0, 1.0);

                    if let Some(goods01) = freight.and_then(|g| {
                        normalized_flow(&g.road_goods_traffic, g.max_road_goods_traffic, i)
                    }) {
                        e += cfg.goods_traffic_boost * goods01.clamp(0.0, 1.0);
                    }
                }
                _ => {}
            }

            emission[i] = e.clamp(-clamp, clamp);
        }
    }

    // --- Manhattan-ball kernel ---
    let r = cfg.radius.max(0);
    let decay = cfg.decay_per_tile.max(0.01);
    let mut kernel = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dy in -r..=r {
        for dx in -r..=r {
            let md = dx.abs() + dy.abs();
            if md > r {
                continue;
            }
            kernel.push(KernelOffset {
                dx,
                dy,
                weight: 1.0 / (1.0 + md as f32 * decay),
            });
        }
    }

    // --- Convolve ---
    let mut global_max = 0.0f32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            let mut weight_sum = 0.0f32;
            for o in &kernel {
                let (xx, yy) = (x + o.dx, y + o.dy);
                if !world.in_bounds(xx, yy) {
                    continue;
                }
                acc += emission[world.idx(xx, yy)] * o.weight;
                weight_sum += o.weight;
            }

            let mut v = if weight_sum > 0.0 { acc / weight_sum } else { 0.0 };
            v = (v / clamp).clamp(0.0, 1.0);
            // Gentle curve keeps quiet areas visually distinct.
            v = v.max(0.0).sqrt();

            out.noise01[world.idx(x, y)] = v;
            global_max = global_max.max(v);
        }
    }

    out.max_noise = global_max;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    #[test]
    fn test_industry_is_loud() {
        let mut world = World::new(20, 20, 1);
        world.set_overlay(Overlay::Industrial, 10, 10);
        let res = compute_noise_pollution(&world, &NoiseConfig::default(), None, None);
        assert!(res.noise01[world.idx(10, 10)] > res.noise01[world.idx(1, 1)]);
        assert!(res.max_noise > 0.0);
    }

    #[test]
    fn test_noise_decays_with_distance() {
        let mut world = World::new(30, 9, 1);
        world.set_overlay(Overlay::Industrial, 4, 4);
        let res = compute_noise_pollution(&world, &NoiseConfig::default(), None, None);
        assert!(res.noise01[world.idx(6, 4)] > res.noise01[world.idx(13, 4)]);
    }

    #[test]
    fn test_values_clamped() {
        let mut world = World::new(12, 12, 1);
        for y in 0..12 {
            for x in 0..12 {
                world.set_overlay(Overlay::Industrial, x, y);
            }
        }
        let res = compute_noise_pollution(&world, &NoiseConfig::default(), None, None);
        assert!(res.noise01.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_parks_quieter_than_roads() {
        let mut world = World::new(20, 20, 1);
        for x in 0..20 {
            world.set_road(x, 10);
        }
        world.set_overlay(Overlay::Park, 3, 2);
        let res = compute_noise_pollution(&world, &NoiseConfig::default(), None, None);
        assert!(res.noise01[world.idx(3, 2)] < res.noise01[world.idx(3, 10)]);
    }
}
