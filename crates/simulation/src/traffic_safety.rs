//! Traffic safety exposure.
//!
//! Road-tile exposure derived from commute and freight flow scaled by road
//! class (faster classes are riskier at the same volume), aggregated back to
//! residents through their zone-access road. The daily hotspot (highest
//! exposure road tile, lowest index on ties) seeds the traffic incident
//! model.

use crate::air_pollution::normalized_flow;
use crate::goods::GoodsResult;
use crate::grid::{Overlay, World};
use crate::traffic::TrafficResult;
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy)]
pub struct TrafficSafetyConfig {
    pub enabled: bool,
    pub require_outside_connection: bool,

    /// Sub-linear response to flow volume.
    pub flow_exponent: f32,
    /// Exposure multiplier per road class (street, avenue, highway).
    pub class_weight: [f32; 3],
    /// Weight of freight flow relative to commute flow.
    pub goods_weight: f32,

    /// Occupants at which a residential tile counts as fully dense for the
    /// priority score.
    pub resident_occupant_scale: i32,
}

impl Default for TrafficSafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_outside_connection: true,
            flow_exponent: 0.6,
            class_weight: [0.70, 0.85, 1.0],
            goods_weight: 0.35,
            resident_occupant_scale: 80,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrafficSafetyResult {
    pub w: i32,
    pub h: i32,

    /// Per-road-tile exposure in [0,1]; zero on non-road tiles.
    pub exposure01: Vec<f32>,
    pub road_tiles_considered: i32,

    pub resident_population: i32,
    pub resident_mean_exposure: f32,
    /// Exposure weighted by local density: where dense housing meets risky
    /// streets.
    pub resident_mean_priority: f32,

    /// Highest-exposure road tile; -1 when there is no loaded road.
    pub hotspot_idx: i32,
    pub hotspot_risk01: f32,
}

/// Compute road exposure and resident aggregation.
pub fn compute_traffic_safety(
    world: &World,
    cfg: &TrafficSafetyConfig,
    traffic: Option<&TrafficResult>,
    goods: Option<&GoodsResult>,
    road_to_edge: Option<&[u8]>,
    zone_access: Option<&ZoneAccessMap>,
) -> TrafficSafetyResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = TrafficSafetyResult {
        w,
        h,
        exposure01: vec![0.0; n],
        hotspot_idx: -1,
        ..TrafficSafetyResult::default()
    };
    if n == 0 || !cfg.enabled {
        return out;
    }

    let commute = traffic.filter(|t| t.road_traffic.len() == n);
    let freight = goods.filter(|g| g.road_goods_traffic.len() == n);

    let zam_owned;
    let zam: &ZoneAccessMap = match zone_access {
        Some(z) if z.w == w && z.h == h && z.road_idx.len() == n => z,
        _ => {
            zam_owned = build_zone_access_map(world, road_to_edge);
            &zam_owned
        }
    };

    // --- Road exposure ---
    let exponent = cfg.flow_exponent.max(0.05);
    let mut hotspot = (-1i32, 0.0f32);
    for idx in 0..n {
        let t = world.tile_at_index(idx);
        if t.overlay != Overlay::Road {
            continue;
        }
        out.road_tiles_considered += 1;

        let commute01 = commute
            .and_then(|t| normalized_flow(&t.road_traffic, t.max_traffic, idx))
            .unwrap_or(0.0);
        let goods01 = freight
            .and_then(|g| normalized_flow(&g.road_goods_traffic, g.max_road_goods_traffic, idx))
            .unwrap_or(0.0);

        let mix = (commute01 + cfg.goods_weight * goods01).clamp(0.0, 1.0);
        if mix <= 0.0 {
            continue;
        }
        let class = crate::config::clamp_level(t.level);
        let e = (mix.powf(exponent) * cfg.class_weight[class]).clamp(0.0, 1.0);
        out.exposure01[idx] = e;

        if e > hotspot.1 {
            hotspot = (idx as i32, e);
        }
    }
    out.hotspot_idx = hotspot.0;
    out.hotspot_risk01 = hotspot.1;

    // --- Resident aggregation via access roads ---
    let occ_scale = cfg.resident_occupant_scale.max(1) as f32;
    let mut pop = 0u64;
    let mut sum_exposure = 0.0f64;
    let mut sum_priority = 0.0f64;

    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || t.occupants == 0 {
                continue;
            }
            let idx = world.idx(x, y);
            let ridx = zam.road_idx[idx];
            if ridx < 0 {
                continue;
            }
            let exposure = out.exposure01[ridx as usize];
            let occ = u64::from(t.occupants);
            let pop01 = (f32::from(t.occupants) / occ_scale).clamp(0.0, 1.0);

            pop += occ;
            sum_exposure += f64::from(exposure) * occ as f64;
            sum_priority += f64::from(exposure * pop01) * occ as f64;
        }
    }

    out.resident_population = pop.min(i32::MAX as u64) as i32;
    if pop > 0 {
        out.resident_mean_exposure = (sum_exposure / pop as f64) as f32;
        out.resident_mean_priority = (sum_priority / pop as f64) as f32;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;
    use crate::traffic::{TrafficConfig, compute_traffic};

    fn busy_world() -> World {
        let mut world = World::new(18, 7, 1);
        for x in 0..18 {
            world.set_road(x, 3);
        }
        for x in 1..5 {
            world.set_overlay(Overlay::Residential, x, 2);
            world.at_mut(x, 2).occupants = 40;
        }
        world.set_overlay(Overlay::Commercial, 15, 4);
        world.at_mut(15, 4).level = 3;
        world
    }

    fn traffic_for(world: &World) -> TrafficResult {
        let cfg = TrafficConfig {
            require_outside_connection: false,
            ..TrafficConfig::default()
        };
        compute_traffic(world, &cfg, None, None)
    }

    #[test]
    fn test_no_flow_no_exposure() {
        let world = busy_world();
        let res = compute_traffic_safety(
            &world,
            &TrafficSafetyConfig::default(),
            None,
            None,
            None,
            None,
        );
        assert!(res.exposure01.iter().all(|&v| v == 0.0));
        assert_eq!(res.hotspot_idx, -1);
        assert_eq!(res.resident_mean_exposure, 0.0);
    }

    #[test]
    fn test_loaded_road_has_hotspot() {
        let world = busy_world();
        let traffic = traffic_for(&world);
        let res = compute_traffic_safety(
            &world,
            &TrafficSafetyConfig::default(),
            Some(&traffic),
            None,
            None,
            None,
        );
        assert!(res.hotspot_idx >= 0);
        assert!(res.hotspot_risk01 > 0.0);
        let t = world.tile_at_index(res.hotspot_idx as usize);
        assert_eq!(t.overlay, Overlay::Road);
        assert!(res.resident_mean_exposure > 0.0);
    }

    #[test]
    fn test_highway_riskier_than_street_at_same_flow() {
        let mut street_world = busy_world();
        let traffic = traffic_for(&street_world);
        let street = compute_traffic_safety(
            &street_world,
            &TrafficSafetyConfig::default(),
            Some(&traffic),
            None,
            None,
            None,
        );

        for x in 0..18 {
            street_world.set_road_level(x, 3, 3);
        }
        let traffic_hw = traffic_for(&street_world);
        let highway = compute_traffic_safety(
            &street_world,
            &TrafficSafetyConfig::default(),
            Some(&traffic_hw),
            None,
            None,
            None,
        );
        assert!(highway.hotspot_risk01 >= street.hotspot_risk01);
    }

    #[test]
    fn test_exposure_in_unit_range() {
        let world = busy_world();
        let traffic = traffic_for(&world);
        let res = compute_traffic_safety(
            &world,
            &TrafficSafetyConfig::default(),
            Some(&traffic),
            None,
            None,
            None,
        );
        assert!(res.exposure01.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(res.resident_mean_priority <= res.resident_mean_exposure + 1e-6);
    }
}
