//! Daily happiness assembly.
//!
//! Baseline plus bounded contributions (amenity coverage, services,
//! employment, goods availability) minus bounded penalties (taxes, commute,
//! congestion, hazard exposure, incidents, inflation). Always lands in
//! [0, 1].

#[derive(Debug, Clone, Copy)]
pub struct HappinessWeights {
    pub baseline: f32,

    pub park_coverage_bonus: f32,
    pub services_bonus: f32,
    pub employment_bonus: f32,
    pub goods_bonus: f32,

    pub tax_per_capita_penalty: f32,
    pub commute_penalty_per_step: f32,
    pub max_commute_penalty: f32,
    pub congestion_penalty: f32,
    pub inflation_penalty: f32,
}

impl Default for HappinessWeights {
    fn default() -> Self {
        Self {
            baseline: 0.50,
            park_coverage_bonus: 0.10,
            services_bonus: 0.10,
            employment_bonus: 0.10,
            goods_bonus: 0.05,
            tax_per_capita_penalty: 0.02,
            commute_penalty_per_step: 0.004,
            max_commute_penalty: 0.08,
            congestion_penalty: 0.06,
            inflation_penalty: 0.50,
        }
    }
}

/// Everything the day produced that feeds the mood.
#[derive(Debug, Clone, Copy, Default)]
pub struct HappinessInputs {
    /// Share of residents with a park within the walk budget.
    pub park_coverage_frac: f32,
    /// Demand-weighted services satisfaction (0 when the model is off).
    pub services_satisfaction: f32,
    /// employed / population, 0 for an empty town.
    pub employment_rate: f32,
    pub goods_satisfaction: f32,

    pub avg_tax_per_capita: f32,
    pub avg_commute_steps: f32,
    pub congestion01: f32,
    pub inflation: f32,

    /// Pre-capped penalties computed by their own models.
    pub air_penalty: f32,
    pub safety_penalty: f32,
    pub fire_incident_penalty: f32,
    pub traffic_incident_penalty: f32,
}

/// Combine the day's inputs into a happiness value in [0, 1].
pub fn compute_happiness(weights: &HappinessWeights, inputs: &HappinessInputs) -> f32 {
    let mut v = weights.baseline;

    v += weights.park_coverage_bonus * inputs.park_coverage_frac.clamp(0.0, 1.0);
    v += weights.services_bonus * inputs.services_satisfaction.clamp(0.0, 1.0);
    v += weights.employment_bonus * inputs.employment_rate.clamp(0.0, 1.0);
    v += weights.goods_bonus * inputs.goods_satisfaction.clamp(0.0, 1.0);

    v -= weights.tax_per_capita_penalty * inputs.avg_tax_per_capita.max(0.0);
    v -= (weights.commute_penalty_per_step * inputs.avg_commute_steps.max(0.0))
        .min(weights.max_commute_penalty);
    v -= weights.congestion_penalty * inputs.congestion01.clamp(0.0, 1.0);
    v -= weights.inflation_penalty * inputs.inflation.clamp(0.0, 1.0);

    v -= inputs.air_penalty.max(0.0);
    v -= inputs.safety_penalty.max(0.0);
    v -= inputs.fire_incident_penalty.max(0.0);
    v -= inputs.traffic_incident_penalty.max(0.0);

    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs_give_baseline() {
        let w = HappinessWeights::default();
        let h = compute_happiness(&w, &HappinessInputs::default());
        assert!((h - w.baseline).abs() < 1e-6);
    }

    #[test]
    fn test_good_city_is_happier() {
        let w = HappinessWeights::default();
        let good = HappinessInputs {
            park_coverage_frac: 1.0,
            services_satisfaction: 0.8,
            employment_rate: 0.95,
            goods_satisfaction: 1.0,
            ..HappinessInputs::default()
        };
        assert!(compute_happiness(&w, &good) > w.baseline);
    }

    #[test]
    fn test_penalties_reduce_but_never_underflow() {
        let w = HappinessWeights::default();
        let grim = HappinessInputs {
            avg_tax_per_capita: 10.0,
            avg_commute_steps: 100.0,
            congestion01: 1.0,
            inflation: 0.15,
            air_penalty: 0.12,
            safety_penalty: 0.10,
            fire_incident_penalty: 0.20,
            traffic_incident_penalty: 0.18,
            ..HappinessInputs::default()
        };
        let h = compute_happiness(&w, &grim);
        assert_eq!(h, 0.0);
    }

    #[test]
    fn test_commute_penalty_capped() {
        let w = HappinessWeights::default();
        let short = HappinessInputs {
            avg_commute_steps: 10.0,
            ..HappinessInputs::default()
        };
        let absurd = HappinessInputs {
            avg_commute_steps: 10_000.0,
            ..HappinessInputs::default()
        };
        let delta = compute_happiness(&w, &short) - compute_happiness(&w, &absurd);
        assert!(delta <= w.max_commute_penalty + 1e-6);
    }

    #[test]
    fn test_always_in_unit_range() {
        let w = HappinessWeights::default();
        let utopia = HappinessInputs {
            park_coverage_frac: 1.0,
            services_satisfaction: 1.0,
            employment_rate: 1.0,
            goods_satisfaction: 1.0,
            ..HappinessInputs::default()
        };
        let h = compute_happiness(&w, &utopia);
        assert!((0.0..=1.0).contains(&h));
    }
}
