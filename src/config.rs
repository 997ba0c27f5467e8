use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Which inventory position formula drives reorder triggers.
///
/// `NetPosition` (on-hand + on-order − committed production demand) is the
/// correct contract. `GrossOnHand` ignores open supply and committed demand,
/// producing a runaway backlog; it exists for generating datasets with that
/// defect and must be opted into explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReorderPolicyKind {
    NetPosition,
    GrossOnHand,
}

/// How a supplier is picked from a part's qualified list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupplierPolicyKind {
    /// Weighted score over reliability, price and the preferred flag.
    BestValue,
    /// Uniform draw from the qualified list.
    UniformRandom,
}

/// Output layout for the primary event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One growing file, no rollover. Used for bulk historical runs.
    SingleFile,
    /// One file per simulated calendar day, rolled at the day boundary.
    DatePartitioned,
}

/// Flat parameter set controlling every probability, range and toggle in the
/// engine. Loaded from a JSON file by the CLI; `canonical()` provides the
/// documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub start_time: DateTime<Utc>,
    /// Horizon used when pre-scheduling disruption windows.
    pub simulation_years: u32,

    // ── Demand ────────────────────────────────────────────────────────────
    pub demand_probability_base: f64,
    pub demand_probability_business_hours: f64,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    /// Extra demand weight applied to Tier 1 customers' Bernoulli trials.
    pub tier1_demand_weight: f64,
    pub bulk_order_probability: f64,
    pub bulk_order_qty_min: u32,
    pub bulk_order_qty_max: u32,
    pub normal_order_qty_min: u32,
    pub normal_order_qty_max: u32,

    // ── Production ────────────────────────────────────────────────────────
    pub production_duration_hours_min: u32,
    pub production_duration_hours_max: u32,

    // ── Procurement ───────────────────────────────────────────────────────
    pub base_lead_time_hours_min: u32,
    pub base_lead_time_hours_max: u32,
    pub partial_shipment_probability: f64,
    pub partial_shipment_min_pct: f64,
    pub partial_shipment_max_pct: f64,
    pub quality_reject_rate_min: f64,
    pub quality_reject_rate_max: f64,
    pub quality_issue_probability: f64,
    pub reorder_policy: ReorderPolicyKind,
    pub supplier_policy: SupplierPolicyKind,

    // ── Cost drift ────────────────────────────────────────────────────────
    pub cost_drift_enabled: bool,
    pub cost_drift_daily_pct: f64,
    pub cost_drift_max_pct: f64,

    // ── Seasonality & disruptions ─────────────────────────────────────────
    pub seasonality_enabled: bool,
    pub demand_seasonality_strength: f64,
    pub supplier_seasonality_strength: f64,
    /// Schedule one disruption window for multi-year historical runs.
    pub include_disruption: bool,

    // ── Corruption injection ──────────────────────────────────────────────
    pub data_corruption_enabled: bool,
    pub data_corruption_probability: f64,

    // ── Finance ───────────────────────────────────────────────────────────
    pub invoicing_enabled: bool,

    // ── Output ────────────────────────────────────────────────────────────
    pub output_mode: OutputMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

impl SimulationConfig {
    /// Documented default parameters.
    pub fn canonical() -> Self {
        SimulationConfig {
            seed: 42,
            start_time: Utc
                .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
                .single()
                .expect("canonical start time is valid"),
            simulation_years: 1,
            demand_probability_base: 0.05,
            demand_probability_business_hours: 0.12,
            business_hours_start: 8,
            business_hours_end: 18,
            tier1_demand_weight: 1.5,
            bulk_order_probability: 0.08,
            bulk_order_qty_min: 10,
            bulk_order_qty_max: 20,
            normal_order_qty_min: 1,
            normal_order_qty_max: 5,
            production_duration_hours_min: 8,
            production_duration_hours_max: 24,
            base_lead_time_hours_min: 24,
            base_lead_time_hours_max: 168,
            partial_shipment_probability: 0.15,
            partial_shipment_min_pct: 0.80,
            partial_shipment_max_pct: 0.95,
            quality_reject_rate_min: 0.01,
            quality_reject_rate_max: 0.05,
            quality_issue_probability: 0.30,
            reorder_policy: ReorderPolicyKind::NetPosition,
            supplier_policy: SupplierPolicyKind::BestValue,
            cost_drift_enabled: true,
            cost_drift_daily_pct: 0.005,
            cost_drift_max_pct: 0.20,
            seasonality_enabled: true,
            demand_seasonality_strength: 1.0,
            supplier_seasonality_strength: 1.0,
            include_disruption: false,
            data_corruption_enabled: true,
            data_corruption_probability: 0.01,
            invoicing_enabled: true,
            output_mode: OutputMode::DatePartitioned,
        }
    }

    /// Fail-fast validation, run before the first tick. Collects every
    /// problem rather than stopping at the first so the operator sees the
    /// whole picture at once.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut errors: Vec<String> = Vec::new();

        let probs = [
            ("demand_probability_base", self.demand_probability_base),
            ("demand_probability_business_hours", self.demand_probability_business_hours),
            ("bulk_order_probability", self.bulk_order_probability),
            ("partial_shipment_probability", self.partial_shipment_probability),
            ("quality_issue_probability", self.quality_issue_probability),
            ("data_corruption_probability", self.data_corruption_probability),
        ];
        for (name, p) in probs {
            if !(0.0..=1.0).contains(&p) {
                errors.push(format!("{name} must be between 0 and 1, got {p}"));
            }
        }

        if self.business_hours_start > 23 {
            errors.push(format!(
                "business_hours_start must be between 0 and 23, got {}",
                self.business_hours_start
            ));
        }
        if self.business_hours_end > 23 {
            errors.push(format!(
                "business_hours_end must be between 0 and 23, got {}",
                self.business_hours_end
            ));
        }
        if self.bulk_order_qty_min == 0 || self.bulk_order_qty_max < self.bulk_order_qty_min {
            errors.push("bulk order quantity range must satisfy 0 < min <= max".to_string());
        }
        if self.normal_order_qty_min == 0 || self.normal_order_qty_max < self.normal_order_qty_min
        {
            errors.push("normal order quantity range must satisfy 0 < min <= max".to_string());
        }
        if self.production_duration_hours_min == 0 {
            errors.push("production_duration_hours_min must be positive".to_string());
        }
        if self.production_duration_hours_max < self.production_duration_hours_min {
            errors.push("production_duration_hours_max must be >= min".to_string());
        }
        if self.base_lead_time_hours_min == 0 {
            errors.push("base_lead_time_hours_min must be positive".to_string());
        }
        if self.base_lead_time_hours_max < self.base_lead_time_hours_min {
            errors.push("base_lead_time_hours_max must be >= min".to_string());
        }
        if !(0.0..=1.0).contains(&self.partial_shipment_min_pct)
            || !(0.0..=1.0).contains(&self.partial_shipment_max_pct)
            || self.partial_shipment_max_pct < self.partial_shipment_min_pct
        {
            errors.push("partial shipment percentage range must lie within [0, 1]".to_string());
        }
        if self.quality_reject_rate_max < self.quality_reject_rate_min
            || self.quality_reject_rate_min < 0.0
            || self.quality_reject_rate_max > 1.0
        {
            errors.push("quality reject rate range must lie within [0, 1]".to_string());
        }
        if self.cost_drift_daily_pct < 0.0 || self.cost_drift_max_pct < 0.0 {
            errors.push("cost drift percentages must be non-negative".to_string());
        }
        if self.simulation_years == 0 {
            errors.push("simulation_years must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Config(errors.join("; ")))
        }
    }
}
