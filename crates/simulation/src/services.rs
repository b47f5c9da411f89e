//! Civic services accessibility (E2SFCA).
//!
//! Two-step floating catchment: each facility first sums the
//! distance-decayed demand inside its catchment, then redistributes its
//! supply/demand ratio back onto those demand tiles. Aggregated access maps
//! to satisfaction through a saturating curve pinned at 0.5 for
//! `access == target_access`.

use serde::{Deserialize, Serialize};

use crate::grid::{Overlay, Point, Tile, World};
use crate::isochrone::{
    IsochroneWeightMode, RoadIsochroneConfig, TileAccessCostConfig, build_road_isochrone_field,
    build_tile_access_cost_field,
};
use crate::roads::{compute_roads_connected_to_edge, mask_usable, pick_adjacent_road_tile};
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    Education,
    Health,
    Safety,
}

pub const SERVICE_KIND_COUNT: usize = 3;

impl ServiceKind {
    pub fn index(self) -> usize {
        match self {
            ServiceKind::Education => 0,
            ServiceKind::Health => 1,
            ServiceKind::Safety => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Education => "education",
            ServiceKind::Health => "health",
            ServiceKind::Safety => "safety",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceFacility {
    pub tile: Point,
    pub kind: ServiceKind,
    /// 1..=3; higher levels supply more service units.
    pub level: u8,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceDemandMode {
    /// Every eligible zone tile contributes weight 1.
    Tiles,
    /// Eligible zone tiles contribute their occupant count.
    #[default]
    Occupants,
}

#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub enabled: bool,
    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,

    /// Catchment radius in street-step equivalents.
    pub catchment_radius_steps: i32,

    /// Three-band distance decay: weights per band and the band cut points
    /// as fractions of the catchment radius.
    pub distance_band_weight: [f32; 3],
    pub distance_band_cut_frac: [f32; 2],

    pub demand_mode: ServiceDemandMode,
    pub demand_residential: bool,
    pub demand_commercial: bool,
    pub demand_industrial: bool,

    /// Service units supplied per day per facility level.
    pub education_supply_per_level: [i32; 3],
    pub health_supply_per_level: [i32; 3],
    pub safety_supply_per_level: [i32; 3],

    /// Per-day upkeep per facility level.
    pub education_maintenance_per_day: [i32; 3],
    pub health_maintenance_per_day: [i32; 3],
    pub safety_maintenance_per_day: [i32; 3],

    /// Accessibility at which satisfaction reaches 0.5.
    pub target_access: f32,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            require_outside_connection: true,
            weight_mode: IsochroneWeightMode::TravelTime,
            catchment_radius_steps: 18,
            distance_band_weight: [1.0, 0.6, 0.3],
            distance_band_cut_frac: [0.33, 0.66],
            demand_mode: ServiceDemandMode::Occupants,
            demand_residential: true,
            demand_commercial: true,
            demand_industrial: true,
            education_supply_per_level: [200, 500, 900],
            health_supply_per_level: [200, 500, 900],
            safety_supply_per_level: [150, 350, 700],
            education_maintenance_per_day: [1, 2, 4],
            health_maintenance_per_day: [1, 2, 4],
            safety_maintenance_per_day: [1, 2, 4],
            target_access: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServicesResult {
    pub w: i32,
    pub h: i32,

    pub total_facilities: [i32; SERVICE_KIND_COUNT],
    pub active_facilities: [i32; SERVICE_KIND_COUNT],

    /// Demand-weighted citywide satisfaction per kind, in [0,1].
    pub education_satisfaction: f32,
    pub health_satisfaction: f32,
    pub safety_satisfaction: f32,
    pub overall_satisfaction: f32,

    pub maintenance_cost_per_day: i32,

    /// Per-tile satisfaction fields in [0,1].
    pub education: Vec<f32>,
    pub health: Vec<f32>,
    pub safety: Vec<f32>,
    pub overall: Vec<f32>,
}

fn distance_weight(cfg: &ServicesConfig, cost_milli: i32, radius_milli: i32) -> f32 {
    if radius_milli <= 0 || cost_milli < 0 || cost_milli > radius_milli {
        return 0.0;
    }
    let frac = cost_milli as f32 / radius_milli as f32;
    let cut0 = cfg.distance_band_cut_frac[0].clamp(0.0, 1.0);
    let cut1 = cfg.distance_band_cut_frac[1].clamp(cut0, 1.0);
    if frac <= cut0 {
        cfg.distance_band_weight[0]
    } else if frac <= cut1 {
        cfg.distance_band_weight[1]
    } else {
        cfg.distance_band_weight[2]
    }
}

pub(crate) fn base_demand_for_tile(t: &Tile, cfg: &ServicesConfig) -> f32 {
    let eligible = match t.overlay {
        Overlay::Residential => cfg.demand_residential,
        Overlay::Commercial => cfg.demand_commercial,
        Overlay::Industrial => cfg.demand_industrial,
        _ => false,
    };
    if !eligible {
        return 0.0;
    }
    match cfg.demand_mode {
        ServiceDemandMode::Tiles => 1.0,
        ServiceDemandMode::Occupants => f32::from(t.occupants),
    }
}

fn supply_for(cfg: &ServicesConfig, kind: ServiceKind, level: u8) -> i32 {
    let li = crate::config::clamp_level(level);
    let v = match kind {
        ServiceKind::Education => cfg.education_supply_per_level[li],
        ServiceKind::Health => cfg.health_supply_per_level[li],
        ServiceKind::Safety => cfg.safety_supply_per_level[li],
    };
    v.max(0)
}

fn maintenance_for(cfg: &ServicesConfig, kind: ServiceKind, level: u8) -> i32 {
    let li = crate::config::clamp_level(level);
    let v = match kind {
        ServiceKind::Education => cfg.education_maintenance_per_day[li],
        ServiceKind::Health => cfg.health_maintenance_per_day[li],
        ServiceKind::Safety => cfg.safety_maintenance_per_day[li],
    };
    v.max(0)
}

/// Saturating access → satisfaction curve with 0.5 at the target.
pub(crate) fn access_to_satisfaction(access: f32, target_access: f32) -> f32 {
    if access <= 0.0 {
        return 0.0;
    }
    if target_access <= 0.0 {
        return access.clamp(0.0, 1.0);
    }
    let k = std::f32::consts::LN_2 / target_access;
    (1.0 - (-access * k).exp()).clamp(0.0, 1.0)
}

/// One facility's raw access contribution over the whole grid: the E2SFCA
/// supply/demand ratio distributed onto the demand tiles inside its
/// catchment. `None` when the facility is disabled, off-road, out of
/// supply, or serves no reachable demand.
pub(crate) fn facility_access_contribution(
    world: &World,
    cfg: &ServicesConfig,
    f: &ServiceFacility,
    base_demand: &[f32],
    zam: &ZoneAccessMap,
    mask: Option<&[u8]>,
) -> Option<Vec<f32>> {
    let n = world.len();
    if base_demand.len() != n || !f.enabled || !world.in_bounds(f.tile.x, f.tile.y) {
        return None;
    }
    let radius_milli = cfg.catchment_radius_steps.max(0) * 1000;
    if radius_milli <= 0 {
        return None;
    }

    // The facility's street address.
    let road = if world.at(f.tile.x, f.tile.y).overlay == Overlay::Road {
        f.tile
    } else {
        pick_adjacent_road_tile(world, mask, f.tile.x, f.tile.y)?
    };

    let rcfg = RoadIsochroneConfig {
        require_outside_connection: cfg.require_outside_connection,
        weight_mode: cfg.weight_mode,
        compute_owner: false,
    };
    let tcfg = TileAccessCostConfig {
        include_road_tiles: false,
        ..TileAccessCostConfig::default()
    };

    let sources = [world.idx(road.x, road.y) as i32];
    let road_field = build_road_isochrone_field(world, &sources, &rcfg, mask, None);
    let tile_cost = build_tile_access_cost_field(world, &road_field, &tcfg, mask, Some(zam));

    // Step 1: distance-decayed demand inside the catchment.
    let mut demand_sum = 0.0f64;
    for i in 0..n {
        let bd = base_demand[i];
        if bd <= 0.0 {
            continue;
        }
        let c = tile_cost[i];
        if c < 0 || c > radius_milli {
            continue;
        }
        let wgt = distance_weight(cfg, c, radius_milli);
        if wgt > 0.0 {
            demand_sum += f64::from(bd) * f64::from(wgt);
        }
    }

    let supply = supply_for(cfg, f.kind, f.level);
    if supply <= 0 || demand_sum <= 0.0 {
        return None;
    }
    let ratio = f64::from(supply) / demand_sum;

    // Step 2: distribute the ratio back onto the demand tiles.
    let mut contribution = vec![0.0f32; n];
    for i in 0..n {
        let bd = base_demand[i];
        if bd <= 0.0 {
            continue;
        }
        let c = tile_cost[i];
        if c < 0 || c > radius_milli {
            continue;
        }
        let wgt = distance_weight(cfg, c, radius_milli);
        if wgt > 0.0 {
            contribution[i] = (ratio * f64::from(wgt)) as f32;
        }
    }
    Some(contribution)
}

/// Scan the world for civic facility tiles. Fire stations count towards
/// Safety alongside police stations.
pub fn extract_service_facilities(world: &World) -> Vec<ServiceFacility> {
    let mut out = Vec::with_capacity(64);
    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            let kind = match t.overlay {
                Overlay::School => ServiceKind::Education,
                Overlay::Hospital => ServiceKind::Health,
                Overlay::PoliceStation | Overlay::FireStation => ServiceKind::Safety,
                _ => continue,
            };
            out.push(ServiceFacility {
                tile: Point::new(x, y),
                kind,
                level: t.level.clamp(1, 3),
                enabled: true,
            });
        }
    }
    out
}

/// Compute per-tile and citywide service satisfaction.
pub fn compute_services(
    world: &World,
    cfg: &ServicesConfig,
    facilities: &[ServiceFacility],
    zone_access: Option<&ZoneAccessMap>,
    road_to_edge: Option<&[u8]>,
) -> ServicesResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = ServicesResult {
        w,
        h,
        education: vec![0.0; n],
        health: vec![0.0; n],
        safety: vec![0.0; n],
        overall: vec![0.0; n],
        ..ServicesResult::default()
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

    // Base demand is kind-independent.
    let mut base_demand = vec![0.0f32; n];
    for y in 0..h {
        for x in 0..w {
            base_demand[world.idx(x, y)] = base_demand_for_tile(world.at(x, y), cfg);
        }
    }

    let mut access = [vec![0.0f32; n], vec![0.0f32; n], vec![0.0f32; n]];

    for f in facilities {
        let ki = f.kind.index();
        out.total_facilities[ki] += 1;

        let Some(contribution) = facility_access_contribution(world, cfg, f, &base_demand, zam, mask)
        else {
            continue;
        };
        for i in 0..n {
            access[ki][i] += contribution[i];
        }

        out.active_facilities[ki] += 1;
        out.maintenance_cost_per_day += maintenance_for(cfg, f.kind, f.level);
    }

    // Access → satisfaction fields.
    for i in 0..n {
        out.education[i] = access_to_satisfaction(access[0][i], cfg.target_access);
        out.health[i] = access_to_satisfaction(access[1][i], cfg.target_access);
        out.safety[i] = access_to_satisfaction(access[2][i], cfg.target_access);
        out.overall[i] = (out.education[i] + out.health[i] + out.safety[i]) / 3.0;
    }

    // Demand-weighted citywide satisfaction.
    let mut dem = 0.0f64;
    let mut sums = [0.0f64; 3];
    for i in 0..n {
        let bd = f64::from(base_demand[i]);
        if bd <= 0.0 {
            continue;
        }
        dem += bd;
        sums[0] += bd * f64::from(out.education[i]);
        sums[1] += bd * f64::from(out.health[i]);
        sums[2] += bd * f64::from(out.safety[i]);
    }
    if dem > 0.0 {
        out.education_satisfaction = (sums[0] / dem) as f32;
        out.health_satisfaction = (sums[1] / dem) as f32;
        out.safety_satisfaction = (sums[2] / dem) as f32;
    }
    out.overall_satisfaction =
        (out.education_satisfaction + out.health_satisfaction + out.safety_satisfaction) / 3.0;

    out
}
