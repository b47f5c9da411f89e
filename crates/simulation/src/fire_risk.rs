//! Fire risk and response coverage.
//!
//! Risk/coverage view, not a spread simulation: base flammability by land
//! use, scaled by occupancy and level, diffused into neighborhood-scale hot
//! spots, then mitigated by fire-station coverage. Coverage falls off with
//! road-network response cost via a smoothstep inside the response radius.

use crate::grid::{NEIGHBORS8, Overlay, Terrain, World, capacity_for_tile};
use crate::isochrone::{
    IsochroneWeightMode, RoadIsochroneConfig, RoadIsochroneField, TileAccessCostConfig,
    build_road_isochrone_field, build_tile_access_cost_field,
};
use crate::roads::{compute_roads_connected_to_edge, mask_usable, pick_adjacent_road_index};
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy)]
pub struct FireRiskConfig {
    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,

    /// Response radius in street steps; zero coverage beyond it.
    pub response_radius_steps: i32,
    pub access_step_cost_milli: i32,

    // Base ignition weight by land use.
    pub base_empty: f32,
    pub base_road: f32,
    pub base_park: f32,
    pub base_residential: f32,
    pub base_commercial: f32,
    pub base_industrial: f32,
    pub base_civic: f32,
    pub base_water: f32,

    /// risk *= (1 + occupancy_weight * occ01)
    pub occupancy_weight: f32,
    /// risk *= (1 + level_weight * level01)
    pub level_weight: f32,

    pub diffusion_iterations: i32,
    pub diffusion: f32,
    pub diffusion_eight_connected: bool,

    /// risk *= (1 - coverage_mitigation * coverage01)
    pub coverage_mitigation: f32,

    pub high_risk_threshold: f32,
}

impl Default for FireRiskConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            weight_mode: IsochroneWeightMode::TravelTime,
            response_radius_steps: 18,
            access_step_cost_milli: 0,
            base_empty: 0.06,
            base_road: 0.03,
            base_park: 0.14,
            base_residential: 0.55,
            base_commercial: 0.65,
            base_industrial: 0.85,
            base_civic: 0.32,
            base_water: 0.0,
            occupancy_weight: 0.40,
            level_weight: 0.20,
            diffusion_iterations: 3,
            diffusion: 0.25,
            diffusion_eight_connected: true,
            coverage_mitigation: 0.65,
            high_risk_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FireRiskResult {
    pub w: i32,
    pub h: i32,

    pub fire_station_count: i32,
    pub source_road_count: i32,

    /// Response cost in milli-steps; -1 unreachable.
    pub response_cost_milli: Vec<i32>,
    /// Coverage proxy in [0,1] derived from the response cost.
    pub coverage01: Vec<f32>,
    /// Final risk in [0,1].
    pub risk01: Vec<f32>,

    pub avg_zone_risk: f32,
    pub avg_zone_coverage: f32,
    pub high_risk_zone_tiles: i32,

    /// Highest-risk zone tile (lowest index wins ties); -1 when no zones.
    pub hotspot_idx: i32,
}

fn base_flammability(cfg: &FireRiskConfig, t: &crate::grid::Tile) -> f32 {
    if t.terrain == Terrain::Water {
        return cfg.base_water;
    }
    match t.overlay {
        Overlay::None => cfg.base_empty,
        Overlay::Road => cfg.base_road,
        Overlay::Park => cfg.base_park,
        Overlay::Residential => cfg.base_residential,
        Overlay::Commercial => cfg.base_commercial,
        Overlay::Industrial => cfg.base_industrial,
        o if o.is_civic() => cfg.base_civic,
        _ => cfg.base_empty,
    }
}

/// Compute per-tile fire risk and response coverage.
pub fn compute_fire_risk(
    world: &World,
    cfg: &FireRiskConfig,
    zone_access: Option<&ZoneAccessMap>,
    road_to_edge: Option<&[u8]>,
) -> FireRiskResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = FireRiskResult {
        w,
        h,
        response_cost_milli: vec![-1; n],
        coverage01: vec![0.0; n],
        risk01: vec![0.0; n],
        hotspot_idx: -1,
        ..FireRiskResult::default()
    };
    if n == 0 {
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

    // --- Fire-station access roads ---
    let mut seen = vec![false; n];
    let mut sources: Vec<i32> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if world.at(x, y).overlay != Overlay::FireStation {
                continue;
            }
            out.fire_station_count += 1;
            if let Some(r) = pick_adjacent_road_index(world, mask, x, y) {
                if !seen[r] {
                    seen[r] = true;
                    sources.push(r as i32);
                }
            }
        }
    }
    sources.sort_unstable();
    out.source_road_count = sources.len() as i32;

    // --- Response cost and coverage ---
    let road_field = if sources.is_empty() {
        RoadIsochroneField::unreachable(w, h)
    } else {
        let rcfg = RoadIsochroneConfig {
            require_outside_connection: cfg.require_outside_connection,
            weight_mode: cfg.weight_mode,
            compute_owner: false,
        };
        build_road_isochrone_field(world, &sources, &rcfg, mask, None)
    };

    let tcfg = TileAccessCostConfig {
        access_step_cost_milli: cfg.access_step_cost_milli.max(0),
        ..TileAccessCostConfig::default()
    };
    out.response_cost_milli =
        build_tile_access_cost_field(world, &road_field, &tcfg, mask, Some(zam));

    let radius_milli = cfg.response_radius_steps.max(1) * 1000;
    let inv_radius = 1.0 / radius_milli as f32;
    for i in 0..n {
        let c = out.response_cost_milli[i];
        if c < 0 || c > radius_milli {
            continue;
        }
        let t = (c as f32 * inv_radius).clamp(0.0, 1.0);
        let s = t * t * (3.0 - 2.0 * t);
        out.coverage01[i] = (1.0 - s).clamp(0.0, 1.0);
    }

    // --- Base ignition risk ---
    let mut cur = vec![0.0f32; n];
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            let mut r = base_flammability(cfg, t);

            let cap = capacity_for_tile(t);
            let occ01 = if cap > 0 {
                (f32::from(t.occupants) / cap as f32).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let lvl01 = f32::from(t.level.clamp(1, 3) - 1) / 2.0;
            r *= 1.0 + cfg.occupancy_weight * occ01;
            r *= 1.0 + cfg.level_weight * lvl01;

            cur[world.idx(x, y)] = r;
        }
    }

    // --- Diffuse into district-scale hot spots ---
    let iters = cfg.diffusion_iterations.max(0);
    let a = cfg.diffusion.clamp(0.0, 1.0);
    if iters > 0 && a > 0.0 {
        let mut nxt = vec![0.0f32; n];
        let sample = |field: &[f32], x: i32, y: i32| -> f32 {
            field[((y.clamp(0, h - 1)) * w + x.clamp(0, w - 1)) as usize]
        };
        for _ in 0..iters {
            for y in 0..h {
                for x in 0..w {
                    let i = (y * w + x) as usize;
                    if world.at(x, y).terrain == Terrain::Water {
                        nxt[i] = 0.0;
                        continue;
                    }
                    let mut sum = 0.0f32;
                    let mut cnt = 0;
                    for (k, (dx, dy)) in NEIGHBORS8.iter().enumerate() {
                        if !cfg.diffusion_eight_connected && k >= 4 {
                            break;
                        }
                        sum += sample(&cur, x + dx, y + dy);
                        cnt += 1;
                    }
                    let v = cur[i];
                    nxt[i] = v + a * (sum / cnt as f32 - v);
                }
            }
            std::mem::swap(&mut cur, &mut nxt);
        }
    }

    // --- Coverage mitigation + summary ---
    let mut sum_risk = 0.0f32;
    let mut sum_cov = 0.0f32;
    let mut zone_count = 0i32;
    let mut hotspot = (-1i32, -1.0f32);

    for y in 0..h {
        for x in 0..w {
            let i = world.idx(x, y);
            let t = world.at(x, y);

            let mut r = cur[i] * (1.0 - cfg.coverage_mitigation * out.coverage01[i]);
            // Roads and water are not hot spots.
            if t.overlay == Overlay::Road || t.terrain == Terrain::Water {
                r *= 0.25;
            }
            let r01 = r.clamp(0.0, 1.0);
            out.risk01[i] = r01;

            if t.overlay.is_zone() {
                sum_risk += r01;
                sum_cov += out.coverage01[i];
                zone_count += 1;
                if r01 >= cfg.high_risk_threshold {
                    out.high_risk_zone_tiles += 1;
                }
                if r01 > hotspot.1 {
                    hotspot = (i as i32, r01);
                }
            }
        }
    }

    if zone_count > 0 {
        out.avg_zone_risk = sum_risk / zone_count as f32;
        out.avg_zone_coverage = sum_cov / zone_count as f32;
    }
    out.hotspot_idx = hotspot.0;

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    fn town(with_station: bool) -> World {
        let mut world = World::new(24, 9, 1);
        for x in 0..24 {
            world.set_road(x, 4);
        }
        for x in 2..8 {
            world.set_overlay(Overlay::Residential, x, 3);
            world.at_mut(x, 3).occupants = 14;
        }
        if with_station {
            world.set_overlay(Overlay::FireStation, 4, 5);
        }
        world
    }

    #[test]
    fn test_no_stations_means_zero_coverage() {
        let world = town(false);
        let res = compute_fire_risk(&world, &FireRiskConfig::default(), None, None);
        assert_eq!(res.fire_station_count, 0);
        assert!(res.coverage01.iter().all(|&c| c == 0.0));
        assert_eq!(res.avg_zone_coverage, 0.0);
        assert!(res.avg_zone_risk > 0.0);
    }

    #[test]
    fn test_station_covers_nearby_zones_only() {
        let world = town(true);
        let cfg = FireRiskConfig::default();
        let res = compute_fire_risk(&world, &cfg, None, None);
        assert_eq!(res.fire_station_count, 1);
        assert!(res.coverage01[world.idx(3, 3)] > 0.0);

        // Beyond the response radius the coverage is exactly zero.
        let radius_milli = cfg.response_radius_steps * 1000;
        for i in 0..world.len() {
            let c = res.response_cost_milli[i];
            if c < 0 || c > radius_milli {
                assert_eq!(res.coverage01[i], 0.0);
            }
        }
    }

    #[test]
    fn test_station_reduces_zone_risk() {
        let uncovered = compute_fire_risk(&town(false), &FireRiskConfig::default(), None, None);
        let covered = compute_fire_risk(&town(true), &FireRiskConfig::default(), None, None);
        assert!(covered.avg_zone_risk < uncovered.avg_zone_risk);
    }

    #[test]
    fn test_industry_riskier_than_homes() {
        let mut world = town(false);
        world.set_overlay(Overlay::Industrial, 20, 3);
        world.at_mut(20, 3).occupants = 14;
        let res = compute_fire_risk(&world, &FireRiskConfig::default(), None, None);
        assert!(res.risk01[world.idx(20, 3)] > res.risk01[world.idx(2, 3)]);
    }

    #[test]
    fn test_hotspot_is_a_zone_tile() {
        let world = town(false);
        let res = compute_fire_risk(&world, &FireRiskConfig::default(), None, None);
        assert!(res.hotspot_idx >= 0);
        let t = world.tile_at_index(res.hotspot_idx as usize);
        assert!(t.overlay.is_zone());
    }

    #[test]
    fn test_risk_in_unit_range() {
        let world = town(true);
        let res = compute_fire_risk(&world, &FireRiskConfig::default(), None, None);
        assert!(res.risk01.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(res.coverage01.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
