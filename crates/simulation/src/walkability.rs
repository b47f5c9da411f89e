//! Walkability scoring ("15-minute city" heuristic).
//!
//! Per-tile road-network distance to five amenity categories, mapped to
//! normalized scores with a smoothstep falloff between each category's
//! ideal and max step budgets, combined into a weighted overall score.

use crate::grid::{Overlay, Tile, World};
use crate::isochrone::{
    IsochroneWeightMode, RoadIsochroneConfig, TileAccessCostConfig, build_road_isochrone_field,
    build_tile_access_cost_field,
};
use crate::roads::{compute_roads_connected_to_edge, mask_usable, pick_adjacent_road_tile};
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAmenity {
    Park,
    Retail,
    Education,
    Health,
    Safety,
}

pub const WALK_AMENITY_COUNT: usize = 5;

pub const WALK_AMENITIES: [WalkAmenity; WALK_AMENITY_COUNT] = [
    WalkAmenity::Park,
    WalkAmenity::Retail,
    WalkAmenity::Education,
    WalkAmenity::Health,
    WalkAmenity::Safety,
];

impl WalkAmenity {
    pub fn index(self) -> usize {
        match self {
            WalkAmenity::Park => 0,
            WalkAmenity::Retail => 1,
            WalkAmenity::Education => 2,
            WalkAmenity::Health => 3,
            WalkAmenity::Safety => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WalkAmenity::Park => "park",
            WalkAmenity::Retail => "retail",
            WalkAmenity::Education => "education",
            WalkAmenity::Health => "health",
            WalkAmenity::Safety => "safety",
        }
    }

    fn matches(self, t: &Tile) -> bool {
        match self {
            WalkAmenity::Park => t.overlay == Overlay::Park,
            WalkAmenity::Retail => t.overlay == Overlay::Commercial,
            WalkAmenity::Education => t.overlay == Overlay::School,
            WalkAmenity::Health => t.overlay == Overlay::Hospital,
            WalkAmenity::Safety => {
                matches!(t.overlay, Overlay::PoliceStation | Overlay::FireStation)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalkabilityCategoryConfig {
    pub enabled: bool,
    /// Within this many steps the category scores 1.
    pub ideal_steps: i32,
    /// Beyond this many steps the category scores 0.
    pub max_steps: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct WalkabilityConfig {
    pub enabled: bool,
    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,
    /// Walk cost when mapping a road cost onto a parcel.
    pub access_step_cost_milli: i32,
    /// Coverage threshold for the per-tile coverage bitmask.
    pub coverage_threshold_steps: i32,

    pub park: WalkabilityCategoryConfig,
    pub retail: WalkabilityCategoryConfig,
    pub education: WalkabilityCategoryConfig,
    pub health: WalkabilityCategoryConfig,
    pub safety: WalkabilityCategoryConfig,
}

impl Default for WalkabilityConfig {
    fn default() -> Self {
        let near = WalkabilityCategoryConfig {
            enabled: true,
            ideal_steps: 6,
            max_steps: 18,
            weight: 1.0,
        };
        let wide = WalkabilityCategoryConfig {
            ideal_steps: 8,
            max_steps: 24,
            ..near
        };
        Self {
            enabled: true,
            require_outside_connection: true,
            weight_mode: IsochroneWeightMode::TravelTime,
            access_step_cost_milli: 1000,
            coverage_threshold_steps: 15,
            park: near,
            retail: near,
            education: wide,
            health: wide,
            safety: wide,
        }
    }
}

impl WalkabilityConfig {
    pub fn category(&self, a: WalkAmenity) -> &WalkabilityCategoryConfig {
        match a {
            WalkAmenity::Park => &self.park,
            WalkAmenity::Retail => &self.retail,
            WalkAmenity::Education => &self.education,
            WalkAmenity::Health => &self.health,
            WalkAmenity::Safety => &self.safety,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalkabilityResult {
    pub w: i32,
    pub h: i32,

    /// Distinct source road tiles per category.
    pub source_count: [i32; WALK_AMENITY_COUNT],

    /// Per-tile access cost in milli-steps; -1 unreachable.
    pub cost_milli: [Vec<i32>; WALK_AMENITY_COUNT],
    /// Per-tile category scores in [0,1].
    pub score01: [Vec<f32>; WALK_AMENITY_COUNT],
    /// Combined overall score in [0,1].
    pub overall01: Vec<f32>,
    /// Bit i set when category i is within the coverage threshold.
    pub coverage_mask: Vec<u8>,

    pub residential_tile_count: i32,
    pub resident_population: i32,
    pub resident_avg_overall01: f32,
    pub resident_coverage_frac: [f32; WALK_AMENITY_COUNT],
    /// Share of residents with every enabled amenity covered.
    pub resident_all_categories_frac: f32,
}

fn score_from_cost(cost_milli: i32, ideal_steps: i32, max_steps: i32) -> f32 {
    if cost_milli < 0 {
        return 0.0;
    }
    if max_steps <= ideal_steps {
        return if cost_milli <= ideal_steps * 1000 { 1.0 } else { 0.0 };
    }
    let steps = cost_milli as f32 / 1000.0;
    if steps <= ideal_steps as f32 {
        return 1.0;
    }
    if steps >= max_steps as f32 {
        return 0.0;
    }
    let t = (steps - ideal_steps as f32) / (max_steps - ideal_steps) as f32;
    1.0 - crate::value_noise::smoothstep(t.clamp(0.0, 1.0))
}

/// Deduplicated, ascending source road indices for one amenity category.
fn gather_amenity_sources(
    world: &World,
    amenity: WalkAmenity,
    mask: Option<&[u8]>,
    zam: &ZoneAccessMap,
) -> Vec<i32> {
    let n = world.len();
    let mut seen = vec![false; n];
    let mut out = Vec::new();

    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            if !amenity.matches(t) {
                continue;
            }

            let mut road = pick_adjacent_road_tile(world, mask, x, y);

            // Zoned amenities (retail) may sit deep inside a block and
            // contribute through their access road.
            if road.is_none() && t.overlay.is_zone() {
                road = zam.road_for(x, y).filter(|p| {
                    !mask_usable(mask, n) || mask.unwrap()[world.idx(p.x, p.y)] != 0
                });
            }

            if let Some(p) = road {
                let ridx = world.idx(p.x, p.y);
                if !seen[ridx] {
                    seen[ridx] = true;
                    out.push(ridx as i32);
                }
            }
        }
    }

    out.sort_unstable();
    out
}

/// Compute walkability for a world.
pub fn compute_walkability(
    world: &World,
    cfg: &WalkabilityConfig,
    road_to_edge: Option<&[u8]>,
    zone_access: Option<&ZoneAccessMap>,
) -> WalkabilityResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = WalkabilityResult {
        w,
        h,
        cost_milli: std::array::from_fn(|_| vec![-1; n]),
        score01: std::array::from_fn(|_| vec![0.0; n]),
        overall01: vec![0.0; n],
        coverage_mask: vec![0; n],
        ..WalkabilityResult::default()
    };
    if !cfg.enabled || n == 0 {
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

    let rcfg = RoadIsochroneConfig {
        require_outside_connection: cfg.require_outside_connection,
        weight_mode: cfg.weight_mode,
        compute_owner: false,
    };
    let tcfg = TileAccessCostConfig {
        access_step_cost_milli: cfg.access_step_cost_milli.max(0),
        ..TileAccessCostConfig::default()
    };
    let cover_milli = cfg.coverage_threshold_steps.max(0) * 1000;

    for amenity in WALK_AMENITIES {
        let ci = amenity.index();
        let ccfg = cfg.category(amenity);
        if !ccfg.enabled || ccfg.weight <= 0.0 {
            continue;
        }

        let sources = gather_amenity_sources(world, amenity, mask, zam);
        out.source_count[ci] = sources.len() as i32;
        if sources.is_empty() {
            continue;
        }

        let road_field = build_road_isochrone_field(world, &sources, &rcfg, mask, None);
        let tile_cost = build_tile_access_cost_field(world, &road_field, &tcfg, mask, Some(zam));

        for i in 0..n {
            let c = tile_cost[i];
            out.score01[ci][i] = score_from_cost(c, ccfg.ideal_steps.max(0), ccfg.max_steps.max(0));
            if c >= 0 && c <= cover_milli {
                out.coverage_mask[i] |= 1 << ci;
            }
        }
        out.cost_milli[ci] = tile_cost;
    }

    // Overall score: weighted sum over enabled categories.
    let mut weights = [0.0f32; WALK_AMENITY_COUNT];
    let mut weight_sum = 0.0f32;
    let mut enabled_mask = 0u8;
    for amenity in WALK_AMENITIES {
        let ccfg = cfg.category(amenity);
        if ccfg.enabled && ccfg.weight > 0.0 {
            weights[amenity.index()] = ccfg.weight;
            weight_sum += ccfg.weight;
            enabled_mask |= 1 << amenity.index();
        }
    }
    if weight_sum <= 1e-6 {
        return out;
    }

    for i in 0..n {
        let mut acc = 0.0f32;
        for ci in 0..WALK_AMENITY_COUNT {
            acc += weights[ci] * out.score01[ci][i];
        }
        out.overall01[i] = (acc / weight_sum).clamp(0.0, 1.0);
    }

    // Resident-weighted summary.
    let mut covered_pop = [0u64; WALK_AMENITY_COUNT];
    let mut all_covered_pop = 0u64;
    let mut pop = 0u64;
    let mut sum_score = 0.0f64;

    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || t.occupants == 0 {
                continue;
            }
            out.residential_tile_count += 1;
            let i = world.idx(x, y);
            let wgt = u64::from(t.occupants);
            pop += wgt;
            sum_score += f64::from(out.overall01[i]) * wgt as f64;

            let m = out.coverage_mask[i];
            for ci in 0..WALK_AMENITY_COUNT {
                if enabled_mask & (1 << ci) != 0 && m & (1 << ci) != 0 {
                    covered_pop[ci] += wgt;
                }
            }
            if enabled_mask != 0 && m & enabled_mask == enabled_mask {
                all_covered_pop += wgt;
            }
        }
    }

    out.resident_population = pop.min(i32::MAX as u64) as i32;
    if pop > 0 {
        out.resident_avg_overall01 = ((sum_score / pop as f64) as f32).clamp(0.0, 1.0);
        for ci in 0..WALK_AMENITY_COUNT {
            if enabled_mask & (1 << ci) != 0 {
                out.resident_coverage_frac[ci] = covered_pop[ci] as f32 / pop as f32;
            }
        }
        out.resident_all_categories_frac = all_covered_pop as f32 / pop as f32;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    fn walk_world() -> World {
        let mut world = World::new(24, 7, 1);
        for x in 0..24 {
            world.set_road(x, 3);
        }
        world.set_overlay(Overlay::Park, 2, 2);
        world.set_overlay(Overlay::Commercial, 3, 4);
        world.at_mut(3, 4).occupants = 10;
        world.set_overlay(Overlay::Residential, 2, 4);
        world.at_mut(2, 4).occupants = 30;
        world.set_overlay(Overlay::Residential, 22, 4);
        world.at_mut(22, 4).occupants = 30;
        world
    }

    #[test]
    fn test_scores_decay_with_distance() {
        let world = walk_world();
        let cfg = WalkabilityConfig {
            require_outside_connection: false,
            ..WalkabilityConfig::default()
        };
        let res = compute_walkability(&world, &cfg, None, None);
        let near = res.overall01[world.idx(2, 4)];
        let far = res.overall01[world.idx(22, 4)];
        assert!(near > far, "near {near} vs far {far}");
        assert!(res.source_count[WalkAmenity::Park.index()] > 0);
    }

    #[test]
    fn test_ideal_radius_scores_one() {
        assert_eq!(score_from_cost(3000, 6, 18), 1.0);
        assert_eq!(score_from_cost(-1, 6, 18), 0.0);
        assert_eq!(score_from_cost(19_000, 6, 18), 0.0);
        let mid = score_from_cost(12_000, 6, 18);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_outside_connection_never_improves_scores() {
        // Island network: amenities exist but nothing touches the edge.
        let mut world = World::new(16, 16, 1);
        for x in 4..12 {
            world.set_road(x, 8);
        }
        world.set_overlay(Overlay::Park, 5, 7);
        world.set_overlay(Overlay::Residential, 6, 7);
        world.at_mut(6, 7).occupants = 12;

        let open = WalkabilityConfig {
            require_outside_connection: false,
            ..WalkabilityConfig::default()
        };
        let strict = WalkabilityConfig {
            require_outside_connection: true,
            ..WalkabilityConfig::default()
        };
        let res_open = compute_walkability(&world, &open, None, None);
        let res_strict = compute_walkability(&world, &strict, None, None);
        for i in 0..world.len() {
            assert!(res_strict.overall01[i] <= res_open.overall01[i] + 1e-6);
        }
        assert!(res_open.resident_avg_overall01 > 0.0);
        assert_eq!(res_strict.resident_avg_overall01, 0.0);
    }

    #[test]
    fn test_disabled_category_contributes_nothing() {
        let world = walk_world();
        let mut cfg = WalkabilityConfig {
            require_outside_connection: false,
            ..WalkabilityConfig::default()
        };
        cfg.park.enabled = false;
        let res = compute_walkability(&world, &cfg, None, None);
        assert_eq!(res.source_count[WalkAmenity::Park.index()], 0);
        assert!(res.score01[WalkAmenity::Park.index()].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_coverage_mask_bits() {
        let world = walk_world();
        let cfg = WalkabilityConfig {
            require_outside_connection: false,
            ..WalkabilityConfig::default()
        };
        let res = compute_walkability(&world, &cfg, None, None);
        let near = res.coverage_mask[world.idx(2, 4)];
        assert!(near & (1 << WalkAmenity::Park.index()) != 0);
        assert!(near & (1 << WalkAmenity::Retail.index()) != 0);
        // No hospital anywhere: health bit must be clear everywhere.
        assert!(res
            .coverage_mask
            .iter()
            .all(|&m| m & (1 << WalkAmenity::Health.index()) == 0));
    }
}
