//! Isochrones and per-tile access cost fields.
//!
//! A road isochrone is a multi-source search over the road grid; the tile
//! cost field maps it onto the rest of the world: road tiles copy their own
//! cost, zone tiles go through the [`ZoneAccessMap`], and other dry tiles
//! may fall back to their cheapest adjacent road. Costs are milli-steps
//! (one street step = 1000); `-1` means unreachable.

use crate::grid::{NEIGHBORS4, Overlay, Terrain, World};
use crate::pathfind::{RoadFlowField, RoadFlowFieldConfig, build_road_flow_field};
use crate::roads::mask_usable;
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsochroneWeightMode {
    /// Shortest path by road steps (edges).
    Steps,
    /// Shortest path by travel-time weights (street/avenue/highway).
    #[default]
    TravelTime,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoadIsochroneConfig {
    pub require_outside_connection: bool,
    pub weight_mode: IsochroneWeightMode,
    pub compute_owner: bool,
}

/// Per-road-tile accessibility result.
#[derive(Debug, Clone, Default)]
pub struct RoadIsochroneField {
    pub w: i32,
    pub h: i32,
    pub cost_milli: Vec<i32>,
    pub steps: Vec<i32>,
    /// Per-tile source ownership label; empty unless requested.
    pub owner: Vec<i32>,
}

impl RoadIsochroneField {
    pub fn unreachable(w: i32, h: i32) -> Self {
        let field = RoadFlowField::unreachable(w, h);
        Self {
            w,
            h,
            cost_milli: field.cost,
            steps: field.dist,
            owner: Vec::new(),
        }
    }
}

/// Build a road accessibility field from one or more source road tiles
/// (linear indices).
pub fn build_road_isochrone_field(
    world: &World,
    source_road_idx: &[i32],
    cfg: &RoadIsochroneConfig,
    road_to_edge: Option<&[u8]>,
    extra_cost_milli: Option<&[i32]>,
) -> RoadIsochroneField {
    let fcfg = RoadFlowFieldConfig {
        require_outside_connection: cfg.require_outside_connection,
        use_travel_time: cfg.weight_mode == IsochroneWeightMode::TravelTime,
        compute_owner: cfg.compute_owner,
    };
    let field = build_road_flow_field(
        world,
        source_road_idx,
        &fcfg,
        road_to_edge,
        extra_cost_milli,
        None,
    );
    RoadIsochroneField {
        w: field.w,
        h: field.h,
        cost_milli: field.cost,
        steps: field.dist,
        owner: field.owner,
    }
}

/// Which tiles a [`build_tile_access_cost_field`] call should cover.
#[derive(Debug, Clone, Copy)]
pub struct TileAccessCostConfig {
    pub include_road_tiles: bool,
    pub include_zones: bool,
    /// Non-zone dry tiles may take the minimum over adjacent road costs.
    pub include_non_zones_adjacent_to_road: bool,
    /// If false, water always stays unreachable.
    pub include_water: bool,
    /// Added when a cost hops from a road onto a non-road tile
    /// ("walk from the road to the parcel").
    pub access_step_cost_milli: i32,
    /// Route zone tiles through the ZoneAccessMap instead of the
    /// adjacent-road rule.
    pub use_zone_access_map: bool,
}

impl Default for TileAccessCostConfig {
    fn default() -> Self {
        Self {
            include_road_tiles: true,
            include_zones: true,
            include_non_zones_adjacent_to_road: true,
            include_water: false,
            access_step_cost_milli: 0,
            use_zone_access_map: true,
        }
    }
}

/// Map a road isochrone onto every tile. Returns a `w*h` vector of
/// milli-step costs, `-1` where unreachable.
pub fn build_tile_access_cost_field(
    world: &World,
    road_field: &RoadIsochroneField,
    cfg: &TileAccessCostConfig,
    road_to_edge: Option<&[u8]>,
    precomputed_zone_access: Option<&ZoneAccessMap>,
) -> Vec<i32> {
    let w = world.width();
    let h = world.height();
    let n = world.len();
    let mut out = vec![-1i32; n];
    if n == 0 || road_field.w != w || road_field.h != h || road_field.cost_milli.len() != n {
        return out;
    }

    let zam_owned;
    let zam: Option<&ZoneAccessMap> = if cfg.include_zones && cfg.use_zone_access_map {
        match precomputed_zone_access {
            Some(z) if z.w == w && z.h == h && z.road_idx.len() == n => Some(z),
            _ => {
                let mask = if mask_usable(road_to_edge, n) {
                    road_to_edge
                } else {
                    None
                };
                zam_owned = build_zone_access_map(world, mask);
                Some(&zam_owned)
            }
        }
    } else {
        None
    };

    let walk_cost = i64::from(cfg.access_step_cost_milli.max(0));

    let best_adjacent_road_cost = |x: i32, y: i32| -> i32 {
        let mut best = -1i32;
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (x + dx, y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            if world.at(nx, ny).overlay != Overlay::Road {
                continue;
            }
            let c = road_field.cost_milli[world.idx(nx, ny)];
            if c < 0 {
                continue;
            }
            if best < 0 || c < best {
                best = c;
            }
        }
        best
    };

    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            let t = world.at(x, y);

            // Water tiles (bridges included) stay unreachable unless the
            // caller asks for them.
            if t.terrain == Terrain::Water && !cfg.include_water {
                continue;
            }

            if t.overlay == Overlay::Road {
                if cfg.include_road_tiles {
                    out[idx] = road_field.cost_milli[idx];
                }
                continue;
            }

            let mut mapped = -1i32;

            if cfg.include_zones && t.overlay.is_zone() {
                if let Some(z) = zam {
                    let ridx = z.road_idx[idx];
                    if ridx >= 0 && (ridx as usize) < n {
                        mapped = road_field.cost_milli[ridx as usize];
                    }
                }
                if mapped < 0 && cfg.use_zone_access_map {
                    // No assignment; fall through to the adjacent-road rule
                    // only when it is enabled for non-zones too.
                    if cfg.include_non_zones_adjacent_to_road {
                        mapped = best_adjacent_road_cost(x, y);
                    }
                } else if mapped < 0 && !cfg.use_zone_access_map {
                    mapped = best_adjacent_road_cost(x, y);
                }
            } else if cfg.include_non_zones_adjacent_to_road {
                mapped = best_adjacent_road_cost(x, y);
            }

            if mapped >= 0 {
                let sum = i64::from(mapped) + walk_cost;
                out[idx] = sum.min(i64::from(i32::MAX)) as i32;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    fn cross_world() -> World {
        let mut world = World::new(9, 9, 1);
        for x in 0..9 {
            world.set_road(x, 4);
        }
        world
    }

    #[test]
    fn test_steps_vs_travel_time() {
        let mut world = cross_world();
        // Upgrade part of the row to highway.
        for x in 5..9 {
            world.set_road_level(x, 4, 3);
        }
        let src = world.idx(4, 4) as i32;

        let steps = build_road_isochrone_field(
            &world,
            &[src],
            &RoadIsochroneConfig {
                weight_mode: IsochroneWeightMode::Steps,
                ..RoadIsochroneConfig::default()
            },
            None,
            None,
        );
        let time = build_road_isochrone_field(&world, &[src], &RoadIsochroneConfig::default(), None, None);

        // Step mode is symmetric; travel-time mode is cheaper on the
        // highway side.
        assert_eq!(steps.cost_milli[world.idx(2, 4)], steps.cost_milli[world.idx(6, 4)]);
        assert!(time.cost_milli[world.idx(6, 4)] < time.cost_milli[world.idx(2, 4)]);
    }

    #[test]
    fn test_zone_tiles_map_through_access_road() {
        let mut world = cross_world();
        for y in 5..8 {
            for x in 2..5 {
                world.set_overlay(Overlay::Residential, x, y);
            }
        }
        let src = world.idx(0, 4) as i32;
        let field =
            build_road_isochrone_field(&world, &[src], &RoadIsochroneConfig::default(), None, None);
        let costs = build_tile_access_cost_field(
            &world,
            &field,
            &TileAccessCostConfig::default(),
            None,
            None,
        );

        // Interior zone tile (3,7) inherits a road cost via its block.
        assert!(costs[world.idx(3, 7)] >= 0);
        // Water-free empty tile far from any road is unreachable.
        assert_eq!(costs[world.idx(8, 8)], -1);
    }

    #[test]
    fn test_access_step_cost_added_off_road() {
        let mut world = cross_world();
        world.set_overlay(Overlay::Park, 3, 5);
        let src = world.idx(3, 4) as i32;
        let field =
            build_road_isochrone_field(&world, &[src], &RoadIsochroneConfig::default(), None, None);
        let cfg = TileAccessCostConfig {
            access_step_cost_milli: 700,
            ..TileAccessCostConfig::default()
        };
        let costs = build_tile_access_cost_field(&world, &field, &cfg, None, None);
        assert_eq!(costs[world.idx(3, 4)], 0); // road keeps its raw cost
        assert_eq!(costs[world.idx(3, 5)], 700); // parcel pays the walk
    }

    #[test]
    fn test_water_excluded_by_default() {
        let mut world = cross_world();
        world.at_mut(2, 5).terrain = Terrain::Water;
        let src = world.idx(2, 4) as i32;
        let field =
            build_road_isochrone_field(&world, &[src], &RoadIsochroneConfig::default(), None, None);
        let costs = build_tile_access_cost_field(
            &world,
            &field,
            &TileAccessCostConfig::default(),
            None,
            None,
        );
        assert_eq!(costs[world.idx(2, 5)], -1);
    }
}
