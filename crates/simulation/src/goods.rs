//! Goods logistics.
//!
//! Industrial tiles produce, commercial tiles consume. Freight routes from
//! each producer to its nearest reachable shop (same weighted road grid as
//! commutes, same downhill accumulation), shops fill up to their demand,
//! and the remainder crosses the map edge: unmet demand is imported and
//! surplus production is exported, both only where the network actually
//! reaches the outside.

use crate::grid::{Overlay, Terrain, World};
use crate::pathfind::{RoadFlowFieldConfig, build_road_flow_field};
use crate::roads::{compute_roads_connected_to_edge, mask_usable, pick_adjacent_road_index};
use crate::traffic::route_downhill;
use crate::zone_access::{ZoneAccessMap, build_zone_access_map};

#[derive(Debug, Clone, Copy)]
pub struct GoodsConfig {
    pub require_outside_connection: bool,
    /// Unmet shop demand may be satisfied over the map edge.
    pub allow_imports: bool,
    /// Surplus production may leave over the map edge.
    pub allow_exports: bool,
}

impl Default for GoodsConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            allow_imports: true,
            allow_exports: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoodsResult {
    pub w: i32,
    pub h: i32,

    /// Per-road-tile freight flow (saturating).
    pub road_goods_traffic: Vec<u16>,
    pub max_road_goods_traffic: i32,

    pub produced: i32,
    pub demand: i32,
    pub delivered: i32,
    pub imported: i32,
    pub exported: i32,
    /// Demand on shops with no usable road access at all.
    pub unreachable_demand: i32,

    /// (delivered + imported) / demand, 1 when there is no demand.
    pub satisfaction: f32,
}

struct Producer {
    road_idx: usize,
    amount: i64,
    outside_connected: bool,
}

/// Compute the freight assignment for a world.
pub fn compute_goods(
    world: &World,
    cfg: &GoodsConfig,
    road_to_edge: Option<&[u8]>,
    zone_access: Option<&ZoneAccessMap>,
) -> GoodsResult {
    let w = world.width();
    let h = world.height();
    let n = world.len();

    let mut out = GoodsResult {
        w,
        h,
        road_goods_traffic: vec![0; n],
        satisfaction: 1.0,
        ..GoodsResult::default()
    };
    if n == 0 {
        return out;
    }

    // The edge mask is needed even without the outside-connection routing
    // rule: imports and exports only exist where the network touches the
    // border.
    let edge_owned;
    let edge_mask: &[u8] = if mask_usable(road_to_edge, n) {
        road_to_edge.unwrap()
    } else {
        edge_owned = compute_roads_connected_to_edge(world);
        &edge_owned
    };
    let routing_mask: Option<&[u8]> = cfg.require_outside_connection.then_some(edge_mask);

    let zam_owned;
    let zam: &ZoneAccessMap = match zone_access {
        Some(z) if z.w == w && z.h == h && z.road_idx.len() == n => z,
        _ => {
            zam_owned = build_zone_access_map(world, routing_mask);
            &zam_owned
        }
    };

    let access_road_for = |x: i32, y: i32, idx: usize| -> Option<usize> {
        let ridx = zam.road_idx[idx];
        if ridx >= 0 {
            return Some(ridx as usize);
        }
        pick_adjacent_road_index(world, routing_mask, x, y)
    };

    // --- Shops: per access road, aggregate remaining demand ---
    let mut demand_on_road = vec![0i64; n];
    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            let t = world.at(x, y);
            if t.overlay != Overlay::Commercial || t.terrain == Terrain::Water {
                continue;
            }
            if t.occupants == 0 {
                continue;
            }
            let amount = i64::from(t.occupants);
            out.demand = out.demand.saturating_add(amount as i32);
            match access_road_for(x, y, idx) {
                Some(r) => demand_on_road[r] += amount,
                None => out.unreachable_demand = out.unreachable_demand.saturating_add(amount as i32),
            }
        }
    }

    // --- Producers ---
    let mut producers: Vec<Producer> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            let t = world.at(x, y);
            if t.overlay != Overlay::Industrial || t.terrain == Terrain::Water {
                continue;
            }
            if t.occupants == 0 {
                continue;
            }
            let amount = i64::from(t.occupants);
            out.produced = out.produced.saturating_add(amount as i32);
            if let Some(r) = access_road_for(x, y, idx) {
                producers.push(Producer {
                    road_idx: r,
                    amount,
                    outside_connected: edge_mask[r] != 0,
                });
            }
        }
    }

    let sources: Vec<i32> = (0..n)
        .filter(|&i| demand_on_road[i] > 0)
        .map(|i| i as i32)
        .collect();

    let mut flow = vec![0i64; n];
    let mut remaining = demand_on_road.clone();

    if !sources.is_empty() && !producers.is_empty() {
        let fcfg = RoadFlowFieldConfig {
            require_outside_connection: cfg.require_outside_connection,
            use_travel_time: true,
            compute_owner: true,
        };
        let field = build_road_flow_field(world, &sources, &fcfg, routing_mask, None, None);

        for p in &mut producers {
            if field.cost[p.road_idx] < 0 {
                continue;
            }
            let owner = field.owner[p.road_idx];
            if owner < 0 {
                continue;
            }
            let dest = sources[owner as usize] as usize;
            let accepted = p.amount.min(remaining[dest]);
            if accepted > 0 {
                route_downhill(world, &field, p.road_idx, accepted, &mut flow);
                remaining[dest] -= accepted;
                out.delivered = out.delivered.saturating_add(accepted as i32);
                p.amount -= accepted;
            }
        }
    }

    // --- Map-edge trade ---
    if cfg.allow_exports {
        for p in &producers {
            if p.amount > 0 && p.outside_connected {
                out.exported = out.exported.saturating_add(p.amount as i32);
            }
        }
    }
    if cfg.allow_imports {
        for idx in 0..n {
            if remaining[idx] > 0 && edge_mask[idx] != 0 {
                out.imported = out.imported.saturating_add(remaining[idx] as i32);
            }
        }
    }

    // --- Flow field → per-tile output ---
    for idx in 0..n {
        let v = flow[idx];
        if v <= 0 {
            continue;
        }
        out.road_goods_traffic[idx] = v.min(i64::from(u16::MAX)) as u16;
        out.max_road_goods_traffic = out
            .max_road_goods_traffic
            .max(v.min(i64::from(i32::MAX)) as i32);
    }

    out.satisfaction = if out.demand > 0 {
        ((out.delivered + out.imported) as f32 / out.demand as f32).clamp(0.0, 1.0)
    } else {
        1.0
    };

    out
}
