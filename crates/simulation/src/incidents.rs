//! Deterministic fire and traffic incidents.
//!
//! Incidents roll once per day from a stream derived from
//! `(world seed, salt, day)`, seeded spatially by the previous day's risk
//! hotspots. Fires spread over flammable tiles and can clear buildings;
//! traffic incidents injure and cost without editing tiles. Service
//! coverage mitigates both.

use crate::grid::{NEIGHBORS4, Overlay, Terrain, World, capacity_for_tile};
use crate::rng::SimRng;

pub const SALT_FIRE_INCIDENT: u64 = 0xF14E_0001;
pub const SALT_TRAFFIC_INCIDENT: u64 = 0xF14E_0002;

#[derive(Debug, Clone, Copy)]
pub struct FireIncidentConfig {
    pub enabled: bool,

    /// No fires in very small towns.
    pub min_population: i32,
    pub min_zone_tiles: i32,

    pub base_chance_per_day: f32,
    pub chance_per_100_population: f32,

    /// Chance multiplier when the city has no fire stations at all.
    pub no_station_multiplier: f32,
    /// Per-station chance reduction, floored at `min_chance_factor`.
    pub station_chance_mitigation: f32,
    pub min_chance_factor: f32,

    pub min_affected_tiles: i32,
    pub max_affected_tiles: i32,
    /// Probability of spreading to each flammable neighbor.
    pub spread_base: f32,
    /// Chance an affected building is destroyed outright.
    pub destroy_base: f32,

    pub happiness_penalty_base: f32,
    pub happiness_penalty_per_tile: f32,
    pub happiness_penalty_per_100_displaced: f32,
    pub max_happiness_penalty: f32,

    pub cost_per_damaged_tile: i32,
    pub cost_per_destroyed_tile: i32,
    pub cost_per_10_displaced: i32,
    pub cost_per_10_jobs_cap_lost: i32,
}

impl Default for FireIncidentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_population: 40,
            min_zone_tiles: 12,
            base_chance_per_day: 0.0070,
            chance_per_100_population: 0.0015,
            no_station_multiplier: 1.65,
            station_chance_mitigation: 0.18,
            min_chance_factor: 0.45,
            min_affected_tiles: 4,
            max_affected_tiles: 28,
            spread_base: 0.68,
            destroy_base: 0.22,
            happiness_penalty_base: 0.03,
            happiness_penalty_per_tile: 0.0020,
            happiness_penalty_per_100_displaced: 0.0060,
            max_happiness_penalty: 0.20,
            cost_per_damaged_tile: 6,
            cost_per_destroyed_tile: 12,
            cost_per_10_displaced: 1,
            cost_per_10_jobs_cap_lost: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FireIncidentOutcome {
    pub triggered: bool,
    pub damaged: i32,
    pub destroyed: i32,
    pub displaced: i32,
    pub jobs_cap_lost: i32,
    pub cost: i64,
    pub happiness_penalty: f32,
    pub origin_idx: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct TrafficIncidentConfig {
    pub enabled: bool,

    pub min_population: i32,
    pub min_zone_tiles: i32,

    pub base_chance_per_day: f32,
    pub chance_per_100_population: f32,

    /// Chance boosts from the previous day's safety stats.
    pub exposure_chance_boost: f32,
    pub hotspot_risk_chance_boost: f32,
    pub max_chance_per_day: f32,

    pub min_injuries: i32,
    pub max_injuries: i32,
    /// Extra injuries when hotspot risk approaches 1.
    pub injuries_risk_bonus: f32,

    pub happiness_penalty_base: f32,
    pub happiness_penalty_per_injury: f32,
    pub max_happiness_penalty: f32,

    pub cost_base: i32,
    pub cost_per_injury: i32,

    /// Harsher outcomes without any police/fire facility.
    pub no_safety_services_multiplier: f32,
    /// Severity mitigation from safety satisfaction, floored.
    pub safety_satisfaction_mitigation: f32,
    pub min_safety_mitigation: f32,
}

impl Default for TrafficIncidentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_population: 60,
            min_zone_tiles: 12,
            base_chance_per_day: 0.0060,
            chance_per_100_population: 0.0010,
            exposure_chance_boost: 0.75,
            hotspot_risk_chance_boost: 0.50,
            max_chance_per_day: 0.18,
            min_injuries: 1,
            max_injuries: 12,
            injuries_risk_bonus: 8.0,
            happiness_penalty_base: 0.012,
            happiness_penalty_per_injury: 0.0018,
            max_happiness_penalty: 0.18,
            cost_base: 6,
            cost_per_injury: 2,
            no_safety_services_multiplier: 1.25,
            safety_satisfaction_mitigation: 0.35,
            min_safety_mitigation: 0.65,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficIncidentOutcome {
    pub triggered: bool,
    pub injuries: i32,
    pub cost: i64,
    pub happiness_penalty: f32,
    pub origin_idx: i32,
}

fn is_flammable(world: &World, idx: usize) -> bool {
    let t = world.tile_at_index(idx);
    if t.terrain == Terrain::Water {
        return false;
    }
    t.overlay.is_zone() || t.overlay == Overlay::Park || t.overlay.is_civic()
}

/// Roll and apply a fire incident for the current day. Mutates tiles on a
/// hit; the caller folds the outcome into stats, money, and happiness.
#[allow(clippy::too_many_arguments)]
pub fn roll_fire_incident(
    world: &mut World,
    cfg: &FireIncidentConfig,
    day: i32,
    population: i32,
    zone_tiles: i32,
    fire_station_count: i32,
    hotspot_idx: i32,
    hotspot_risk01: f32,
) -> FireIncidentOutcome {
    let mut out = FireIncidentOutcome {
        origin_idx: -1,
        ..FireIncidentOutcome::default()
    };
    if !cfg.enabled || population < cfg.min_population || zone_tiles < cfg.min_zone_tiles {
        return out;
    }

    let mut rng = SimRng::for_stream(world.seed(), SALT_FIRE_INCIDENT, day);

    let mut chance =
        cfg.base_chance_per_day + cfg.chance_per_100_population * population as f32 / 100.0;
    if fire_station_count == 0 {
        chance *= cfg.no_station_multiplier;
    } else {
        let factor = (1.0 - cfg.station_chance_mitigation * fire_station_count as f32)
            .max(cfg.min_chance_factor);
        chance *= factor;
    }

    if !rng.chance(chance.clamp(0.0, 1.0)) {
        return out;
    }

    // Origin: the risk hotspot, or the densest zone tile as a fallback.
    let n = world.len();
    let origin = if hotspot_idx >= 0 && (hotspot_idx as usize) < n {
        hotspot_idx as usize
    } else {
        let mut best = None::<(u8, usize)>;
        for idx in 0..n {
            let t = world.tile_at_index(idx);
            if t.overlay.is_zone() && best.map_or(true, |(occ, _)| t.occupants > occ) {
                best = Some((t.occupants, idx));
            }
        }
        match best {
            Some((_, idx)) => idx,
            None => return out,
        }
    };

    out.triggered = true;
    out.origin_idx = origin as i32;

    let budget = rng.range_i32(
        cfg.min_affected_tiles.max(1),
        cfg.max_affected_tiles.max(cfg.min_affected_tiles.max(1)),
    ) + (cfg.hotspot_bonus_tiles(hotspot_risk01));

    // Flood the fire outward from the origin over flammable tiles.
    let w = world.width();
    let mut visited = vec![false; n];
    let mut frontier = vec![origin];
    visited[origin] = true;
    let mut affected: Vec<usize> = Vec::new();

    while let Some(idx) = frontier.pop() {
        if affected.len() as i32 >= budget {
            break;
        }
        if !is_flammable(world, idx) {
            continue;
        }
        affected.push(idx);

        let x = (idx as i32) % w;
        let y = (idx as i32) / w;
        for (dx, dy) in NEIGHBORS4 {
            let (nx, ny) = (x + dx, y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            let ni = world.idx(nx, ny);
            if visited[ni] || !is_flammable(world, ni) {
                continue;
            }
            visited[ni] = true;
            if rng.chance(cfg.spread_base) {
                frontier.push(ni);
            }
        }
    }

    // Apply damage.
    for &idx in &affected {
        let x = (idx as i32) % w;
        let y = (idx as i32) / w;
        let t = *world.tile_at_index(idx);
        let destroy = rng.chance(cfg.destroy_base);

        if destroy {
            out.destroyed += 1;
            if t.overlay == Overlay::Residential {
                out.displaced += i32::from(t.occupants);
            } else if t.overlay.is_zone() {
                out.jobs_cap_lost += capacity_for_tile(&t);
            }
            world.set_overlay(Overlay::None, x, y);
        } else {
            out.damaged += 1;
            let tile = world.at_mut(x, y);
            if tile.overlay == Overlay::Residential {
                out.displaced += i32::from(tile.occupants / 2);
            }
            tile.occupants /= 2;
        }
    }

    out.cost = i64::from(out.damaged) * i64::from(cfg.cost_per_damaged_tile)
        + i64::from(out.destroyed) * i64::from(cfg.cost_per_destroyed_tile)
        + i64::from(out.displaced / 10) * i64::from(cfg.cost_per_10_displaced)
        + i64::from(out.jobs_cap_lost / 10) * i64::from(cfg.cost_per_10_jobs_cap_lost);

    out.happiness_penalty = (cfg.happiness_penalty_base
        + cfg.happiness_penalty_per_tile * (out.damaged + out.destroyed) as f32
        + cfg.happiness_penalty_per_100_displaced * out.displaced as f32 / 100.0)
        .clamp(0.0, cfg.max_happiness_penalty);

    out
}

impl FireIncidentConfig {
    /// Extra affected tiles when the hotspot is very risky.
    fn hotspot_bonus_tiles(&self, risk01: f32) -> i32 {
        (risk01.clamp(0.0, 1.0) * 4.0).round() as i32
    }
}

/// Roll a traffic incident for the current day. Pure with respect to the
/// world; only the outcome is returned.
#[allow(clippy::too_many_arguments)]
pub fn roll_traffic_incident(
    world: &World,
    cfg: &TrafficIncidentConfig,
    day: i32,
    population: i32,
    zone_tiles: i32,
    resident_mean_exposure: f32,
    hotspot_idx: i32,
    hotspot_risk01: f32,
    safety_facilities: i32,
    safety_satisfaction: f32,
) -> TrafficIncidentOutcome {
    let mut out = TrafficIncidentOutcome {
        origin_idx: -1,
        ..TrafficIncidentOutcome::default()
    };
    if !cfg.enabled || population < cfg.min_population || zone_tiles < cfg.min_zone_tiles {
        return out;
    }
    if hotspot_idx < 0 {
        return out;
    }

    let mut rng = SimRng::for_stream(world.seed(), SALT_TRAFFIC_INCIDENT, day);

    let mut chance =
        cfg.base_chance_per_day + cfg.chance_per_100_population * population as f32 / 100.0;
    chance *= 1.0 + cfg.exposure_chance_boost * resident_mean_exposure.clamp(0.0, 1.0);
    chance *= 1.0 + cfg.hotspot_risk_chance_boost * hotspot_risk01.clamp(0.0, 1.0);
    chance = chance.min(cfg.max_chance_per_day);

    if !rng.chance(chance.clamp(0.0, 1.0)) {
        return out;
    }

    out.triggered = true;
    out.origin_idx = hotspot_idx;

    let base_injuries = rng.range_i32(cfg.min_injuries.max(0), cfg.max_injuries.max(cfg.min_injuries.max(0)));
    let mut injuries =
        base_injuries as f32 + cfg.injuries_risk_bonus * hotspot_risk01.clamp(0.0, 1.0);

    if safety_facilities == 0 {
        injuries *= cfg.no_safety_services_multiplier;
    } else {
        let mitigation = (1.0
            - cfg.safety_satisfaction_mitigation * safety_satisfaction.clamp(0.0, 1.0))
        .max(cfg.min_safety_mitigation);
        injuries *= mitigation;
    }

    out.injuries = (injuries.round() as i32).max(cfg.min_injuries.max(0));
    out.cost = i64::from(cfg.cost_base) + i64::from(out.injuries) * i64::from(cfg.cost_per_injury);
    out.happiness_penalty = (cfg.happiness_penalty_base
        + cfg.happiness_penalty_per_injury * out.injuries as f32)
        .clamp(0.0, cfg.max_happiness_penalty);

    out
}
