//! Per-day statistics record and the versioned CSV schemas.
//!
//! The CSV column order is an interface contract: consumers that read only
//! the first N columns must keep working when new columns are appended on
//! the right. Never reorder or remove columns within a schema version.

use std::fmt::Write as _;

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_START_MONEY;
use crate::grid::World;

/// Snapshot of a world at the end of a simulation day.
///
/// Integer counters saturate instead of wrapping; fractional scores stay in
/// their documented [0, 1] ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Stats {
    pub day: i32,
    pub population: i32,
    pub money: i64,
    pub happiness: f32,

    pub housing_capacity: i32,
    pub jobs_capacity: i32,
    pub jobs_capacity_accessible: i32,
    pub employed: i32,
    pub roads: i32,
    pub parks: i32,

    pub avg_commute_time: f32,
    pub avg_commute: f32,
    pub p95_commute: f32,
    pub traffic_congestion: f32,
    pub commuters: i32,
    pub commuters_unreachable: i32,
    pub congested_road_tiles: i32,
    pub max_road_traffic: i32,

    pub goods_demand: i32,
    pub goods_delivered: i32,
    pub goods_produced: i32,
    pub goods_imported: i32,
    pub goods_exported: i32,
    pub goods_unreachable_demand: i32,
    pub goods_satisfaction: f32,
    pub max_road_goods_traffic: i32,

    pub avg_land_value: f32,
    pub demand_residential: f32,
    pub demand_commercial: f32,
    pub demand_industrial: f32,

    pub services_education_satisfaction: f32,
    pub services_health_satisfaction: f32,
    pub services_safety_satisfaction: f32,
    pub services_overall_satisfaction: f32,
    pub services_maintenance_cost: i32,

    pub economy_index: f32,
    pub economy_inflation: f32,
    pub economy_event_kind: u8,
    pub economy_event_days_left: i32,
    pub economy_city_wealth: f32,

    pub income: i64,
    pub expenses: i64,
    pub tax_revenue: i64,
    pub maintenance_cost: i64,
    pub upgrade_cost: i64,
    pub import_cost: i64,
    pub export_revenue: i64,
    pub avg_tax_per_capita: f32,

    pub air_resident_avg01: f32,
    pub air_resident_high_exposure_frac: f32,
    pub air_happiness_penalty: f32,

    pub safety_resident_mean_exposure: f32,
    pub safety_happiness_penalty: f32,
    pub safety_hotspot_x: i32,
    pub safety_hotspot_y: i32,
    pub safety_hotspot_risk01: f32,

    pub fire_incident_damaged: i32,
    pub fire_incident_destroyed: i32,
    pub fire_incident_displaced: i32,
    pub fire_incident_cost: i64,
    pub fire_incident_happiness_penalty: f32,

    pub traffic_incident_injuries: i32,
    pub traffic_incident_cost: i64,
    pub traffic_incident_happiness_penalty: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            day: 0,
            population: 0,
            money: DEFAULT_START_MONEY,
            happiness: 0.5,

            housing_capacity: 0,
            jobs_capacity: 0,
            jobs_capacity_accessible: 0,
            employed: 0,
            roads: 0,
            parks: 0,

            avg_commute_time: 0.0,
            avg_commute: 0.0,
            p95_commute: 0.0,
            traffic_congestion: 0.0,
            commuters: 0,
            commuters_unreachable: 0,
            congested_road_tiles: 0,
            max_road_traffic: 0,

            goods_demand: 0,
            goods_delivered: 0,
            goods_produced: 0,
            goods_imported: 0,
            goods_exported: 0,
            goods_unreachable_demand: 0,
            goods_satisfaction: 0.0,
            max_road_goods_traffic: 0,

            avg_land_value: 0.0,
            demand_residential: 0.0,
            demand_commercial: 0.0,
            demand_industrial: 0.0,

            services_education_satisfaction: 0.0,
            services_health_satisfaction: 0.0,
            services_safety_satisfaction: 0.0,
            services_overall_satisfaction: 0.0,
            services_maintenance_cost: 0,

            economy_index: 1.0,
            economy_inflation: 0.0,
            economy_event_kind: 0,
            economy_event_days_left: 0,
            economy_city_wealth: 0.5,

            income: 0,
            expenses: 0,
            tax_revenue: 0,
            maintenance_cost: 0,
            upgrade_cost: 0,
            import_cost: 0,
            export_revenue: 0,
            avg_tax_per_capita: 0.0,

            air_resident_avg01: 0.0,
            air_resident_high_exposure_frac: 0.0,
            air_happiness_penalty: 0.0,

            safety_resident_mean_exposure: 0.0,
            safety_happiness_penalty: 0.0,
            safety_hotspot_x: -1,
            safety_hotspot_y: -1,
            safety_hotspot_risk01: 0.0,

            fire_incident_damaged: 0,
            fire_incident_destroyed: 0,
            fire_incident_displaced: 0,
            fire_incident_cost: 0,
            fire_incident_happiness_penalty: 0.0,

            traffic_incident_injuries: 0,
            traffic_incident_cost: 0,
            traffic_incident_happiness_penalty: 0.0,
        }
    }
}

/// Schema version of the per-day stats CSV. Bump only when a column is
/// appended; never when values change.
pub const STATS_CSV_VERSION: u32 = 1;

/// Per-day stats CSV header (schema v1).
pub const STATS_CSV_HEADER: &str = "day,population,money,housingCapacity,jobsCapacity,\
jobsCapacityAccessible,employed,happiness,roads,parks,avgCommuteTime,trafficCongestion,\
goodsDemand,goodsDelivered,goodsSatisfaction,avgLandValue,demandResidential,demandCommercial,\
demandIndustrial,commuters,commutersUnreachable,avgCommute,p95Commute,congestedRoadTiles,\
maxRoadTraffic,servicesEducationSatisfaction,servicesHealthSatisfaction,\
servicesSafetySatisfaction,servicesOverallSatisfaction,servicesMaintenanceCost,goodsProduced,\
goodsImported,goodsExported,goodsUnreachableDemand,maxRoadGoodsTraffic,economyIndex,\
economyInflation,economyEventKind,economyEventDaysLeft,economyCityWealth,income,expenses,\
taxRevenue,maintenanceCost,upgradeCost,importCost,exportRevenue,avgTaxPerCapita,\
airResidentAvg01,airResidentHighExposureFrac,airHappinessPenalty,safetyResidentMeanExposure,\
safetyHappinessPenalty,safetyHotspotX,safetyHotspotY,safetyHotspotRisk01,fireIncidentDamaged,\
fireIncidentDestroyed,fireIncidentDisplaced,fireIncidentCost,fireIncidentHappinessPenalty,\
trafficIncidentInjuries,trafficIncidentCost,trafficIncidentHappinessPenalty";

/// Append one stats row (no trailing newline handling beyond the single
/// `\n`). Floats print with enough digits to round-trip.
pub fn write_stats_csv_row(out: &mut String, s: &Stats) {
    // Column order must match STATS_CSV_HEADER exactly.
    let _ = writeln!(
        out,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        s.day,
        s.population,
        s.money,
        s.housing_capacity,
        s.jobs_capacity,
        s.jobs_capacity_accessible,
        s.employed,
        s.happiness,
        s.roads,
        s.parks,
        s.avg_commute_time,
        s.traffic_congestion,
        s.goods_demand,
        s.goods_delivered,
        s.goods_satisfaction,
        s.avg_land_value,
        s.demand_residential,
        s.demand_commercial,
        s.demand_industrial,
        s.commuters,
        s.commuters_unreachable,
        s.avg_commute,
        s.p95_commute,
        s.congested_road_tiles,
        s.max_road_traffic,
        s.services_education_satisfaction,
        s.services_health_satisfaction,
        s.services_safety_satisfaction,
        s.services_overall_satisfaction,
        s.services_maintenance_cost,
        s.goods_produced,
        s.goods_imported,
        s.goods_exported,
        s.goods_unreachable_demand,
        s.max_road_goods_traffic,
        s.economy_index,
        s.economy_inflation,
        s.economy_event_kind,
        s.economy_event_days_left,
        s.economy_city_wealth,
        s.income,
        s.expenses,
        s.tax_revenue,
        s.maintenance_cost,
        s.upgrade_cost,
        s.import_cost,
        s.export_revenue,
        s.avg_tax_per_capita,
        s.air_resident_avg01,
        s.air_resident_high_exposure_frac,
        s.air_happiness_penalty,
        s.safety_resident_mean_exposure,
        s.safety_happiness_penalty,
        s.safety_hotspot_x,
        s.safety_hotspot_y,
        s.safety_hotspot_risk01,
        s.fire_incident_damaged,
        s.fire_incident_destroyed,
        s.fire_incident_displaced,
        s.fire_incident_cost,
        s.fire_incident_happiness_penalty,
        s.traffic_incident_injuries,
        s.traffic_incident_cost,
        s.traffic_incident_happiness_penalty,
    );
}

/// Render a per-day time series with header.
pub fn stats_csv(rows: &[Stats]) -> String {
    let mut out = String::with_capacity(128 + rows.len() * 256);
    out.push_str(STATS_CSV_HEADER);
    out.push('\n');
    for s in rows {
        write_stats_csv_row(&mut out, s);
    }
    out
}

/// Per-tile CSV header. Column order and names are part of the interface.
pub const TILE_CSV_HEADER: &str = "x,y,terrain,overlay,level,district,height,variation,occupants";

/// Render the full per-tile raster, one row per tile in row-major order.
pub fn tile_csv(world: &World) -> String {
    let mut out = String::with_capacity(64 + world.len() * 40);
    out.push_str(TILE_CSV_HEADER);
    out.push('\n');
    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{},{}",
                x,
                y,
                t.terrain.name(),
                t.overlay.name(),
                t.level,
                t.district,
                t.height,
                t.variation,
                t.occupants,
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    #[test]
    fn test_header_column_count_matches_row() {
        let mut row = String::new();
        write_stats_csv_row(&mut row, &Stats::default());
        let header_cols = STATS_CSV_HEADER.split(',').count();
        let row_cols = row.trim_end().split(',').count();
        assert_eq!(header_cols, row_cols);
    }

    #[test]
    fn test_default_stats_start_money() {
        let s = Stats::default();
        assert_eq!(s.money, DEFAULT_START_MONEY);
        assert_eq!(s.day, 0);
        assert_eq!(s.population, 0);
    }

    #[test]
    fn test_tile_csv_shape() {
        let mut world = World::new(3, 2, 5);
        world.set_overlay(Overlay::Park, 1, 1);
        let csv = tile_csv(&world);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1 + 6);
        assert_eq!(lines[0], TILE_CSV_HEADER);
        assert!(lines[1].starts_with("0,0,"));
        // Row-major: (1,1) is line index 1 + (1*3 + 1).
        assert!(lines[5].contains(",park,"));
    }

    #[test]
    fn test_stats_csv_has_header_and_rows() {
        let rows = vec![Stats::default(), Stats { day: 1, ..Stats::default() }];
        let csv = stats_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,"));
        assert!(lines[2].starts_with("1,"));
    }
}
