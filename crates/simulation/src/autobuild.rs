//! Deterministic autonomous city builder.
//!
//! A greedy bot for headless scenarios: each simulated day it performs a
//! bounded set of edits (ensure an outside connection, extend roads toward
//! unserved zones, upgrade congested tiles, plan redundancy bypasses, grow
//! zone clusters, place parks), then advances the simulator by one day.
//! Candidate selection always breaks ties on the lowest linear index, and
//! every random draw comes from a day-seeded stream, so identical inputs
//! rebuild identical cities.

use crate::grid::{NEIGHBORS4, Overlay, Point, World};
use crate::park_optimizer::{
    ParkOptimizerConfig, apply_park_placements, suggest_park_placements,
};
use crate::pathfind::{LandPathConfig, find_land_path};
use crate::rng::SimRng;
use crate::roads::compute_roads_connected_to_edge;
use crate::sim::Simulator;
use crate::stats::Stats;
use crate::traffic::{TrafficConfig, compute_traffic};
use crate::zone_access::build_zone_access_map;

const SALT_AUTOBUILD: u64 = 0xAB00_0001;

#[derive(Debug, Clone, Copy)]
pub struct AutoBuildConfig {
    /// Zone tiles to attempt per simulated day.
    pub zones_per_day: i32,
    /// Each zoning seed may grow a connected block of up to this many tiles.
    /// Interior tiles stay functional through the zone access rule.
    pub zone_cluster_max_tiles: i32,

    /// Road expansion attempts per day.
    pub roads_per_day: i32,
    /// New roads are built at this class (1 street, 2 avenue, 3 highway).
    pub road_level: u8,
    /// Use the A* corridor planner instead of straight spurs.
    pub use_road_planner: bool,
    pub allow_bridges: bool,
    /// Cap on a single expansion's length in tiles; planned corridors are
    /// truncated when longer.
    pub max_road_spur_length: i32,

    /// Park placements to attempt per day, targeting roughly one park per
    /// `park_per_zone_tiles` zone tiles.
    pub parks_per_day: i32,
    pub park_per_zone_tiles: i32,
    pub use_park_optimizer: bool,

    /// Upgrade the most loaded road tiles once citywide congestion exceeds
    /// the threshold.
    pub auto_upgrade_roads: bool,
    pub congestion_upgrade_threshold: f32,
    pub road_upgrades_per_day: i32,

    /// Proactively build alternate corridors around cut-edges in the road
    /// graph (single points of failure).
    pub auto_build_resilience_bypasses: bool,
    pub resilience_bypass_congestion_threshold: f32,
    pub resilience_bypasses_per_day: i32,

    /// Construction pauses while money sits below this reserve.
    pub min_money_reserve: i64,

    /// Per-tile build prices.
    pub road_cost_per_tile: i64,
    pub zone_cost_per_tile: i64,
    pub park_cost: i64,
    pub upgrade_cost_per_tile: i64,

    /// Build a road-to-edge connection before anything else when the sim
    /// enforces the outside-connection rule.
    pub ensure_outside_connection: bool,
}

impl Default for AutoBuildConfig {
    fn default() -> Self {
        Self {
            zones_per_day: 3,
            zone_cluster_max_tiles: 4,
            roads_per_day: 1,
            road_level: 1,
            use_road_planner: true,
            allow_bridges: false,
            max_road_spur_length: 7,
            parks_per_day: 1,
            park_per_zone_tiles: 18,
            use_park_optimizer: true,
            auto_upgrade_roads: true,
            congestion_upgrade_threshold: 0.25,
            road_upgrades_per_day: 2,
            auto_build_resilience_bypasses: false,
            resilience_bypass_congestion_threshold: 0.35,
            resilience_bypasses_per_day: 1,
            min_money_reserve: 15,
            road_cost_per_tile: 3,
            zone_cost_per_tile: 2,
            park_cost: 5,
            upgrade_cost_per_tile: 4,
            ensure_outside_connection: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoBuildReport {
    pub days_requested: i32,
    pub days_simulated: i32,

    pub roads_built: i32,
    pub roads_upgraded: i32,
    pub zones_built: i32,
    pub parks_built: i32,

    pub failed_builds: i32,
}

struct DayContext<'a> {
    cfg: &'a AutoBuildConfig,
    rng: SimRng,
    report: &'a mut AutoBuildReport,
    /// Upgrade spending accrued today; priced by the next tick's budget.
    upgrade_spend: i64,
}

impl DayContext<'_> {
    fn can_afford(&self, world: &World, cost: i64) -> bool {
        world.stats().money - self.upgrade_spend - cost >= self.cfg.min_money_reserve
    }

    fn charge(&self, world: &mut World, cost: i64) {
        let stats = world.stats_mut();
        stats.money = stats.money.saturating_sub(cost);
    }
}

/// Run the bot for `days` simulated days. Edits happen before each tick.
pub fn run_autobuild(
    world: &mut World,
    sim: &mut Simulator,
    cfg: &AutoBuildConfig,
    days: i32,
    mut out_daily_stats: Option<&mut Vec<Stats>>,
) -> AutoBuildReport {
    let mut report = AutoBuildReport {
        days_requested: days,
        ..AutoBuildReport::default()
    };

    for _ in 0..days.max(0) {
        let day = world.stats().day + 1;
        let mut ctx = DayContext {
            cfg,
            rng: SimRng::for_stream(world.seed(), SALT_AUTOBUILD, day),
            report: &mut report,
            upgrade_spend: 0,
        };

        if cfg.ensure_outside_connection && sim.cfg.require_outside_connection {
            ensure_outside_connection(world, &mut ctx);
        }
        build_roads(world, &mut ctx);
        upgrade_roads(world, &mut ctx);
        if cfg.auto_build_resilience_bypasses {
            build_resilience_bypasses(world, &mut ctx);
        }
        build_zones(world, &mut ctx);
        build_parks(world, &mut ctx);

        sim.pending_upgrade_cost = sim.pending_upgrade_cost.saturating_add(ctx.upgrade_spend);
        sim.step_once(world);
        report.days_simulated += 1;
        if let Some(out) = out_daily_stats.as_deref_mut() {
            out.push(*world.stats());
        }
    }

    report
}

/// Nearest buildable border tile by Manhattan distance, lowest index ties.
fn nearest_buildable_edge(world: &World, from: Point) -> Option<Point> {
    let w = world.width();
    let h = world.height();
    let mut best: Option<(i32, i32, i32)> = None; // (dist, y, x)

    let consider = |x: i32, y: i32, best: &mut Option<(i32, i32, i32)>| {
        if !world.is_buildable(x, y) {
            return;
        }
        let d = (x - from.x).abs() + (y - from.y).abs();
        let cand = (d, y, x);
        if best.map_or(true, |b| cand < b) {
            *best = Some(cand);
        }
    };

    for x in 0..w {
        consider(x, 0, &mut best);
        if h > 1 {
            consider(x, h - 1, &mut best);
        }
    }
    for y in 1..h - 1 {
        consider(0, y, &mut best);
        if w > 1 {
            consider(w - 1, y, &mut best);
        }
    }
    best.map(|(_, y, x)| Point::new(x, y))
}

fn build_corridor(world: &mut World, ctx: &mut DayContext<'_>, path: &[Point]) -> i32 {
    let mut built = 0;
    for p in path {
        if world.at(p.x, p.y).overlay == Overlay::Road {
            continue;
        }
        if !ctx.can_afford(world, ctx.cfg.road_cost_per_tile) {
            break;
        }
        world.set_road_level(p.x, p.y, ctx.cfg.road_level);
        ctx.charge(world, ctx.cfg.road_cost_per_tile);
        built += 1;
    }
    built
}

fn ensure_outside_connection(world: &mut World, ctx: &mut DayContext<'_>) {
    let mask = compute_roads_connected_to_edge(world);
    if mask.iter().any(|&m| m == 1) {
        return;
    }

    // Lowest-index road tile anchors the connection.
    let Some(start_idx) = (0..world.len()).find(|&i| world.tile_at_index(i).overlay == Overlay::Road)
    else {
        return;
    };
    let start = Point::new(
        (start_idx as i32) % world.width(),
        (start_idx as i32) / world.width(),
    );
    let Some(edge) = nearest_buildable_edge(world, start) else {
        return;
    };

    let path_cfg = LandPathConfig {
        allow_roads: true,
        allow_bridges: ctx.cfg.allow_bridges,
    };
    match find_land_path(world, start, edge, &path_cfg) {
        Some(path) => {
            let built = build_corridor(world, ctx, &path);
            ctx.report.roads_built += built;
        }
        None => ctx.report.failed_builds += 1,
    }
}

/// Extend the network: connect the lowest-index zone tile that lacks road
/// access, or grow a spur from a dead end when everything is served.
fn build_roads(world: &mut World, ctx: &mut DayContext<'_>) {
    for _ in 0..ctx.cfg.roads_per_day.max(0) {
        if !ctx.can_afford(world, ctx.cfg.road_cost_per_tile) {
            return;
        }

        let mask = compute_roads_connected_to_edge(world);
        let zam = build_zone_access_map(world, Some(&mask));

        // Zone tiles with no access (and somewhere to land a corridor) are
        // the priority targets.
        let target = (0..world.len()).find(|&i| {
            if !world.tile_at_index(i).overlay.is_zone() || zam.road_idx[i] >= 0 {
                return false;
            }
            let x = (i as i32) % world.width();
            let y = (i as i32) / world.width();
            NEIGHBORS4
                .iter()
                .any(|(dx, dy)| world.is_empty_land(x + dx, y + dy))
        });

        let built = match target {
            Some(target_idx) => connect_unserved_zone(world, ctx, target_idx),
            None => extend_dead_end(world, ctx),
        };
        if built == 0 {
            ctx.report.failed_builds += 1;
            return;
        }
        ctx.report.roads_built += built;
    }
}

fn connect_unserved_zone(world: &mut World, ctx: &mut DayContext<'_>, target_idx: usize) -> i32 {
    let w = world.width();
    let tx = (target_idx as i32) % w;
    let ty = (target_idx as i32) / w;

    // Nearest existing road tile (Manhattan, lowest index ties).
    let mut src: Option<(i32, usize)> = None;
    for i in 0..world.len() {
        if world.tile_at_index(i).overlay != Overlay::Road {
            continue;
        }
        let x = (i as i32) % w;
        let y = (i as i32) / w;
        let d = (x - tx).abs() + (y - ty).abs();
        if src.map_or(true, |s| (d, i) < s) {
            src = Some((d, i));
        }
    }
    let Some((_, src_idx)) = src else {
        return 0;
    };
    let from = Point::new((src_idx as i32) % w, (src_idx as i32) / w);

    // Land the corridor on an empty tile next to the zone block.
    let goal = NEIGHBORS4
        .iter()
        .map(|(dx, dy)| Point::new(tx + dx, ty + dy))
        .find(|p| world.is_empty_land(p.x, p.y));
    let Some(goal) = goal else {
        return 0;
    };

    if !ctx.cfg.use_road_planner {
        return straight_spur(world, ctx, from, goal);
    }

    let path_cfg = LandPathConfig {
        allow_roads: true,
        allow_bridges: ctx.cfg.allow_bridges,
    };
    match find_land_path(world, from, goal, &path_cfg) {
        Some(mut path) => {
            path.truncate(ctx.cfg.max_road_spur_length.max(1) as usize + 1);
            build_corridor(world, ctx, &path)
        }
        None => 0,
    }
}

fn straight_spur(world: &mut World, ctx: &mut DayContext<'_>, from: Point, toward: Point) -> i32 {
    let dx = (toward.x - from.x).signum();
    let dy = (toward.y - from.y).signum();
    // One axis at a time; prefer the longer leg.
    let step = if (toward.x - from.x).abs() >= (toward.y - from.y).abs() {
        (dx, 0)
    } else {
        (0, dy)
    };

    let mut built = 0;
    let mut p = from;
    for _ in 0..ctx.cfg.max_road_spur_length.max(1) {
        let next = Point::new(p.x + step.0, p.y + step.1);
        if !world.is_empty_land(next.x, next.y) {
            break;
        }
        if !ctx.can_afford(world, ctx.cfg.road_cost_per_tile) {
            break;
        }
        world.set_road_level(next.x, next.y, ctx.cfg.road_level);
        ctx.charge(world, ctx.cfg.road_cost_per_tile);
        built += 1;
        p = next;
    }
    built
}

/// Grow from the lowest-index dead-end road tile, away from its neighbor.
fn extend_dead_end(world: &mut World, ctx: &mut DayContext<'_>) -> i32 {
    for i in 0..world.len() {
        let t = world.tile_at_index(i);
        if t.overlay != Overlay::Road || t.road_mask().count_ones() != 1 {
            continue;
        }
        let x = (i as i32) % world.width();
        let y = (i as i32) / world.width();

        // Opposite direction of the single connection.
        let mask = t.road_mask();
        let (dx, dy) = match mask {
            m if m & crate::grid::ROAD_MASK_N != 0 => (0, 1),
            m if m & crate::grid::ROAD_MASK_E != 0 => (-1, 0),
            m if m & crate::grid::ROAD_MASK_S != 0 => (0, -1),
            _ => (1, 0),
        };

        let goal = Point::new(
            (x + dx * ctx.cfg.max_road_spur_length).clamp(0, world.width() - 1),
            (y + dy * ctx.cfg.max_road_spur_length).clamp(0, world.height() - 1),
        );
        let built = straight_spur(world, ctx, Point::new(x, y), goal);
        if built > 0 {
            return built;
        }
    }
    0
}

fn upgrade_roads(world: &mut World, ctx: &mut DayContext<'_>) {
    if !ctx.cfg.auto_upgrade_roads {
        return;
    }
    if world.stats().traffic_congestion < ctx.cfg.congestion_upgrade_threshold {
        return;
    }

    // Fresh flow snapshot; yesterday's congestion gates, today's flow ranks.
    let traffic_cfg = TrafficConfig::default();
    let traffic = compute_traffic(world, &traffic_cfg, None, None);

    let mut loaded: Vec<(u16, usize)> = (0..world.len())
        .filter(|&i| {
            traffic.road_traffic[i] > 0 && world.tile_at_index(i).level < 3
        })
        .map(|i| (traffic.road_traffic[i], i))
        .collect();
    // Heaviest first, lowest index ties.
    loaded.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    for &(_, idx) in loaded.iter().take(ctx.cfg.road_upgrades_per_day.max(0) as usize) {
        if !ctx.can_afford(world, ctx.cfg.upgrade_cost_per_tile) {
            return;
        }
        let x = (idx as i32) % world.width();
        let y = (idx as i32) / world.width();
        let level = world.at(x, y).level;
        world.set_road_level(x, y, level + 1);
        // Upgrade spending is priced through the budget on this day's tick.
        ctx.upgrade_spend += ctx.cfg.upgrade_cost_per_tile;
        ctx.report.roads_upgraded += 1;
    }
}

/// Cut-edges of the road graph (removing one disconnects its component),
/// found with an iterative lowlink DFS over the lattice adjacency.
fn find_road_cut_edges(world: &World) -> Vec<(usize, usize)> {
    let n = world.len();
    let w = world.width();

    let neighbors = |idx: usize| -> Vec<usize> {
        let x = (idx as i32) % w;
        let y = (idx as i32) / w;
        let mut out = Vec::with_capacity(4);
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (x + dx, y + dy);
            if world.in_bounds(nx, ny) && world.at(nx, ny).overlay == Overlay::Road {
                out.push(world.idx(nx, ny));
            }
        }
        out
    };

    let mut disc = vec![-1i64; n];
    let mut low = vec![0i64; n];
    let mut parent = vec![usize::MAX; n];
    let mut timer = 0i64;
    let mut bridges = Vec::new();

    for root in 0..n {
        if world.tile_at_index(root).overlay != Overlay::Road || disc[root] >= 0 {
            continue;
        }

        // Iterative DFS: (node, neighbor cursor).
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;

        while let Some(&(u, cursor)) = stack.last() {
            let ns = neighbors(u);
            if cursor < ns.len() {
                let top = stack.len() - 1;
                stack[top].1 += 1;
                let v = ns[cursor];
                if disc[v] < 0 {
                    parent[v] = u;
                    disc[v] = timer;
                    low[v] = timer;
                    timer += 1;
                    stack.push((v, 0));
                } else if v != parent[u] {
                    low[u] = low[u].min(disc[v]);
                }
            } else {
                stack.pop();
                if let Some(&(p, _)) = stack.last() {
                    low[p] = low[p].min(low[u]);
                    if low[u] > disc[p] {
                        bridges.push((p.min(u), p.max(u)));
                    }
                }
            }
        }
    }

    bridges.sort_unstable();
    bridges
}

fn build_resilience_bypasses(world: &mut World, ctx: &mut DayContext<'_>) {
    if world.stats().traffic_congestion < ctx.cfg.resilience_bypass_congestion_threshold {
        return;
    }

    for _ in 0..ctx.cfg.resilience_bypasses_per_day.max(0) {
        let bridges = find_road_cut_edges(world);
        let Some(&(a, b)) = bridges.first() else {
            return;
        };
        let w = world.width();
        let from = Point::new((a as i32) % w, (a as i32) / w);
        let to = Point::new((b as i32) % w, (b as i32) / w);

        // A parallel corridor that reuses no existing road restores
        // redundancy around the cut edge.
        let path_cfg = LandPathConfig {
            allow_roads: false,
            allow_bridges: ctx.cfg.allow_bridges,
        };
        match find_land_path(world, from, to, &path_cfg) {
            Some(path) if path.len() > 2 => {
                let built = build_corridor(world, ctx, &path);
                if built == 0 {
                    ctx.report.failed_builds += 1;
                    return;
                }
                ctx.report.roads_built += built;
            }
            _ => {
                ctx.report.failed_builds += 1;
                return;
            }
        }
    }
}

/// Zone type furthest below its target share of zoned tiles.
fn pick_zone_overlay(world: &World) -> Overlay {
    let mut res = 0i64;
    let mut com = 0i64;
    let mut ind = 0i64;
    for t in world.tiles() {
        match t.overlay {
            Overlay::Residential => res += 1,
            Overlay::Commercial => com += 1,
            Overlay::Industrial => ind += 1,
            _ => {}
        }
    }
    let total = (res + com + ind).max(1);
    // Target mix ~60/25/15.
    let deficits = [
        (0.60 - res as f64 / total as f64, Overlay::Residential),
        (0.25 - com as f64 / total as f64, Overlay::Commercial),
        (0.15 - ind as f64 / total as f64, Overlay::Industrial),
    ];
    deficits
        .iter()
        .cloned()
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, o)| o)
        .unwrap_or(Overlay::Residential)
}

fn build_zones(world: &mut World, ctx: &mut DayContext<'_>) {
    for _ in 0..ctx.cfg.zones_per_day.max(0) {
        if !ctx.can_afford(world, ctx.cfg.zone_cost_per_tile) {
            return;
        }

        let mask = compute_roads_connected_to_edge(world);

        // Seed: lowest-index empty tile next to a usable road.
        let seed = (0..world.len()).find(|&i| {
            let x = (i as i32) % world.width();
            let y = (i as i32) / world.width();
            if !world.is_empty_land(x, y) {
                return false;
            }
            NEIGHBORS4.iter().any(|(dx, dy)| {
                let (nx, ny) = (x + dx, y + dy);
                world.in_bounds(nx, ny)
                    && world.at(nx, ny).overlay == Overlay::Road
                    && mask[world.idx(nx, ny)] == 1
            })
        });
        let Some(seed_idx) = seed else {
            ctx.report.failed_builds += 1;
            return;
        };

        let overlay = pick_zone_overlay(world);
        let cluster_budget = ctx.cfg.zone_cluster_max_tiles.max(1);
        let mut placed = 0;
        let mut frontier = vec![seed_idx];

        while let Some(idx) = frontier.pop() {
            if placed >= cluster_budget {
                break;
            }
            let x = (idx as i32) % world.width();
            let y = (idx as i32) / world.width();
            if !world.is_empty_land(x, y) {
                continue;
            }
            if !ctx.can_afford(world, ctx.cfg.zone_cost_per_tile) {
                break;
            }
            world.set_overlay(overlay, x, y);
            ctx.charge(world, ctx.cfg.zone_cost_per_tile);
            placed += 1;
            ctx.report.zones_built += 1;

            // Grow the block; shuffle-free deterministic expansion order.
            for (dx, dy) in NEIGHBORS4 {
                let (nx, ny) = (x + dx, y + dy);
                if world.is_empty_land(nx, ny) && ctx.rng.chance(0.75) {
                    frontier.push(world.idx(nx, ny));
                }
            }
        }

        if placed == 0 {
            ctx.report.failed_builds += 1;
            return;
        }
    }
}

fn build_parks(world: &mut World, ctx: &mut DayContext<'_>) {
    for _ in 0..ctx.cfg.parks_per_day.max(0) {
        if !ctx.can_afford(world, ctx.cfg.park_cost) {
            return;
        }

        // Only add parks while the city is under-parked.
        let zones = world.tiles().iter().filter(|t| t.overlay.is_zone()).count() as i32;
        let parks = world
            .tiles()
            .iter()
            .filter(|t| t.overlay == Overlay::Park)
            .count() as i32;
        let wanted = zones / ctx.cfg.park_per_zone_tiles.max(1);
        if parks >= wanted {
            return;
        }

        if ctx.cfg.use_park_optimizer {
            let pcfg = ParkOptimizerConfig {
                parks_to_add: 1,
                ..ParkOptimizerConfig::default()
            };
            let suggestion = suggest_park_placements(world, &pcfg, None, None);
            if suggestion.placements.is_empty() {
                ctx.report.failed_builds += 1;
                return;
            }
            apply_park_placements(world, &suggestion.placements);
            ctx.charge(world, ctx.cfg.park_cost);
            ctx.report.parks_built += 1;
        } else {
            let mask = compute_roads_connected_to_edge(world);
            let spot = (0..world.len()).find(|&i| {
                let x = (i as i32) % world.width();
                let y = (i as i32) / world.width();
                if !world.is_empty_land(x, y) {
                    return false;
                }
                NEIGHBORS4.iter().any(|(dx, dy)| {
                    let (nx, ny) = (x + dx, y + dy);
                    world.in_bounds(nx, ny)
                        && world.at(nx, ny).overlay == Overlay::Road
                        && mask[world.idx(nx, ny)] == 1
                })
            });
            match spot {
                Some(idx) => {
                    let x = (idx as i32) % world.width();
                    let y = (idx as i32) / world.width();
                    world.set_overlay(Overlay::Park, x, y);
                    ctx.charge(world, ctx.cfg.park_cost);
                    ctx.report.parks_built += 1;
                }
                None => {
                    ctx.report.failed_builds += 1;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_world;
    use crate::procgen::{ProcGenConfig, generate_world};
    use crate::sim::SimConfig;

    fn fresh() -> (World, Simulator) {
        let world = generate_world(32, 32, 17, &ProcGenConfig::default());
        let sim = Simulator::new(SimConfig::default());
        (world, sim)
    }

    #[test]
    fn test_autobuild_advances_days() {
        let (mut world, mut sim) = fresh();
        let report = run_autobuild(&mut world, &mut sim, &AutoBuildConfig::default(), 5, None);
        assert_eq!(report.days_requested, 5);
        assert_eq!(report.days_simulated, 5);
        assert_eq!(world.stats().day, 5);
    }

    #[test]
    fn test_autobuild_deterministic() {
        let (mut a, mut sim_a) = fresh();
        let (mut b, mut sim_b) = fresh();
        let cfg = AutoBuildConfig::default();
        run_autobuild(&mut a, &mut sim_a, &cfg, 10, None);
        run_autobuild(&mut b, &mut sim_b, &cfg, 10, None);
        assert_eq!(hash_world(&a, true), hash_world(&b, true));
    }

    #[test]
    fn test_autobuild_grows_a_city() {
        let (mut world, mut sim) = fresh();
        let report = run_autobuild(&mut world, &mut sim, &AutoBuildConfig::default(), 30, None);
        assert!(report.zones_built > 0);
        assert!(world.stats().population > 0);
        assert!(world.stats().roads > 0);
    }

    #[test]
    fn test_money_reserve_respected() {
        let (mut world, mut sim) = fresh();
        world.stats_mut().money = 20;
        let cfg = AutoBuildConfig {
            min_money_reserve: 15,
            ..AutoBuildConfig::default()
        };
        // A single day of building can spend at most money - reserve before
        // the tick's own budget runs.
        let day_budget = world.stats().money - cfg.min_money_reserve;
        let before = world.stats().money;
        let mut ctx_days = Vec::new();
        run_autobuild(&mut world, &mut sim, &cfg, 1, Some(&mut ctx_days));
        let spent_on_builds = before - ctx_days[0].money + (ctx_days[0].income - ctx_days[0].expenses);
        assert!(spent_on_builds <= day_budget);
    }

    #[test]
    fn test_ensure_outside_connection_builds_to_edge() {
        // Hand-built island network far from the border.
        let mut world = World::new(24, 24, 5);
        for x in 10..14 {
            world.set_road(x, 12);
        }
        world.set_overlay(Overlay::Residential, 10, 11);
        let mut sim = Simulator::new(SimConfig::default());
        let cfg = AutoBuildConfig::default();
        run_autobuild(&mut world, &mut sim, &cfg, 1, None);
        let mask = compute_roads_connected_to_edge(&world);
        assert!(mask.iter().any(|&m| m == 1), "bot should reach the edge");
    }

    #[test]
    fn test_daily_stats_collected() {
        let (mut world, mut sim) = fresh();
        let mut days = Vec::new();
        run_autobuild(
            &mut world,
            &mut sim,
            &AutoBuildConfig::default(),
            4,
            Some(&mut days),
        );
        assert_eq!(days.len(), 4);
        assert_eq!(days[3].day, 4);
    }

    #[test]
    fn test_cut_edge_detection_on_dumbbell() {
        // Two loops joined by a single corridor tile: the corridor edges
        // are bridges, the loop edges are not.
        let mut world = World::new(16, 8, 1);
        for (x0, x1) in [(1, 4), (9, 12)] {
            for x in x0..=x1 {
                world.set_road(x, 2);
                world.set_road(x, 5);
            }
            for y in 2..=5 {
                world.set_road(x0, y);
                world.set_road(x1, y);
            }
        }
        for x in 4..=9 {
            world.set_road(x, 3);
        }
        let bridges = find_road_cut_edges(&world);
        assert!(!bridges.is_empty());
        // Every reported bridge lies on the connecting corridor row.
        for (a, b) in bridges {
            let ya = (a as i32) / world.width();
            let yb = (b as i32) / world.width();
            assert!(
                (2..=3).contains(&ya) && (2..=3).contains(&yb),
                "unexpected bridge {a}->{b}"
            );
        }
    }
}
