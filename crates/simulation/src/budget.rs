//! Daily budget ledger.
//!
//! Income: per-occupant zone taxes scaled by the land-value multiplier,
//! optional district policy multipliers, and the district economy tax base.
//! Expenses: road/park maintenance, service upkeep, incident response, road
//! upgrades, and goods imports; exports earn revenue. Money may go
//! negative; that is a gameplay condition, not an error.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::config::DISTRICT_COUNT;
use crate::economy::EconomySnapshot;
use crate::grid::{Overlay, World};
use crate::land_value::LandValueResult;

/// Per-district multipliers applied on top of the citywide policy numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct DistrictPolicy {
    pub tax_residential_mult: f32,
    pub tax_commercial_mult: f32,
    pub tax_industrial_mult: f32,
    pub road_maintenance_mult: f32,
    pub park_maintenance_mult: f32,
}

impl Default for DistrictPolicy {
    fn default() -> Self {
        Self {
            tax_residential_mult: 1.0,
            tax_commercial_mult: 1.0,
            tax_industrial_mult: 1.0,
            road_maintenance_mult: 1.0,
            park_maintenance_mult: 1.0,
        }
    }
}

/// Budget-facing knobs that live inside `SimConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct BudgetPolicy {
    /// Per-day tax per occupant by zone type.
    pub tax_residential: i32,
    pub tax_commercial: i32,
    pub tax_industrial: i32,

    /// Per-day maintenance per tile.
    pub maintenance_road: i32,
    pub maintenance_park: i32,

    pub district_policies_enabled: bool,
    pub district_policies: [DistrictPolicy; DISTRICT_COUNT],

    /// Trade pricing per 10 units.
    pub import_cost_per_10: i32,
    pub export_revenue_per_10: i32,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            tax_residential: 1,
            tax_commercial: 2,
            tax_industrial: 2,
            maintenance_road: 1,
            maintenance_park: 1,
            district_policies_enabled: false,
            district_policies: [DistrictPolicy::default(); DISTRICT_COUNT],
            import_cost_per_10: 1,
            export_revenue_per_10: 1,
        }
    }
}

/// One day's resolved income and expenses.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetLedger {
    pub tax_revenue: i64,
    pub export_revenue: i64,
    pub maintenance_cost: i64,
    pub services_cost: i64,
    pub import_cost: i64,
    pub upgrade_cost: i64,
    pub incident_cost: i64,

    pub income: i64,
    pub expenses: i64,
    pub avg_tax_per_capita: f32,
}

/// Inputs that are resolved elsewhere in the tick and priced here.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetInputs {
    pub services_maintenance: i32,
    pub goods_imported: i32,
    pub goods_exported: i32,
    pub upgrade_cost: i64,
    pub incident_cost: i64,
}

/// Land value multiplier on taxes: 0.75x in worthless spots, 1.25x at peak.
fn land_value_mult(value01: f32) -> f32 {
    0.75 + 0.50 * value01.clamp(0.0, 1.0)
}

/// Resolve the day's ledger.
pub fn compute_budget(
    world: &World,
    policy: &BudgetPolicy,
    economy: Option<&EconomySnapshot>,
    land_value: Option<&LandValueResult>,
    inputs: &BudgetInputs,
) -> BudgetLedger {
    let mut out = BudgetLedger::default();
    let n = world.len();
    let lv = land_value.filter(|l| l.value01.len() == n);

    let mut tax_revenue = 0.0f64;
    let mut taxed_pop = 0i64;
    let mut road_cost = 0i64;
    let mut park_cost = 0i64;

    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            let d = (t.district as usize).min(DISTRICT_COUNT - 1);
            let dp = if policy.district_policies_enabled {
                policy.district_policies[d]
            } else {
                DistrictPolicy::default()
            };

            match t.overlay {
                Overlay::Road => {
                    let per_tile =
                        f64::from(policy.maintenance_road) * f64::from(dp.road_maintenance_mult);
                    road_cost += per_tile.round() as i64;
                }
                Overlay::Park => {
                    let per_tile =
                        f64::from(policy.maintenance_park) * f64::from(dp.park_maintenance_mult);
                    park_cost += per_tile.round() as i64;
                }
                Overlay::Residential | Overlay::Commercial | Overlay::Industrial => {
                    if t.occupants == 0 {
                        continue;
                    }
                    let (base, district_mult) = match t.overlay {
                        Overlay::Residential => {
                            (policy.tax_residential, dp.tax_residential_mult)
                        }
                        Overlay::Commercial => (policy.tax_commercial, dp.tax_commercial_mult),
                        _ => (policy.tax_industrial, dp.tax_industrial_mult),
                    };

                    let mut mult = f64::from(district_mult);
                    if let Some(l) = lv {
                        mult *= f64::from(land_value_mult(l.value01[world.idx(x, y)]));
                    }
                    if let Some(e) = economy {
                        mult *= f64::from(e.districts[d].tax_base_mult);
                    }

                    tax_revenue += f64::from(t.occupants) * f64::from(base) * mult;
                    taxed_pop += i64::from(t.occupants);
                }
                _ => {}
            }
        }
    }

    out.tax_revenue = tax_revenue.round() as i64;
    out.avg_tax_per_capita = if taxed_pop > 0 {
        (tax_revenue / taxed_pop as f64) as f32
    } else {
        0.0
    };

    out.export_revenue =
        i64::from(inputs.goods_exported / 10) * i64::from(policy.export_revenue_per_10.max(0));
    out.import_cost =
        i64::from(inputs.goods_imported / 10) * i64::from(policy.import_cost_per_10.max(0));

    out.maintenance_cost = road_cost + park_cost;
    out.services_cost = i64::from(inputs.services_maintenance.max(0));
    out.upgrade_cost = inputs.upgrade_cost.max(0);
    out.incident_cost = inputs.incident_cost.max(0);

    out.income = out.tax_revenue + out.export_revenue;
    out.expenses = out.maintenance_cost
        + out.services_cost
        + out.import_cost
        + out.upgrade_cost
        + out.incident_cost;

    out
}
