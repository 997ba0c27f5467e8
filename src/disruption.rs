//! Disruption windows ("black swan" events): scheduled periods that alter
//! demand and supplier lead times for specific countries.
//!
//! Windows are placed once at run start, for multi-year historical runs
//! only, from a fixed set of severity presets. Activity checks are a linear
//! scan over the (very short) window list.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Country;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptionWindow {
    pub name: String,
    pub affected_countries: Vec<Country>,
    pub start: DateTime<Utc>,
    pub duration_days: u32,
    pub demand_multiplier: f64,
    pub lead_time_multiplier: f64,
    /// Set once the boundary-crossing events have been emitted.
    pub start_announced: bool,
    pub end_announced: bool,
}

impl DisruptionWindow {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::days(self.duration_days as i64)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end()
    }

    pub fn affects(&self, country: Country) -> bool {
        self.affected_countries.contains(&country)
    }
}

struct SeverityPreset {
    name: &'static str,
    duration_days: u32,
    demand_multiplier: f64,
    lead_time_multiplier: f64,
    affected_countries: &'static [Country],
}

/// Enumerated severity presets, mirroring the historically observed shapes:
/// demand usually dips while lead times stretch, except for the shortage
/// scenario where panic buying raises demand.
const SEVERITY_PRESETS: &[SeverityPreset] = &[
    SeverityPreset {
        name: "Supply Chain Crisis",
        duration_days: 21,
        demand_multiplier: 0.7,
        lead_time_multiplier: 2.5,
        affected_countries: &[Country::China, Country::Taiwan],
    },
    SeverityPreset {
        name: "Port Congestion Event",
        duration_days: 30,
        demand_multiplier: 0.9,
        lead_time_multiplier: 2.0,
        affected_countries: &[Country::China, Country::Usa],
    },
    SeverityPreset {
        name: "Regional Natural Disaster",
        duration_days: 14,
        demand_multiplier: 0.5,
        lead_time_multiplier: 3.0,
        affected_countries: &[Country::Taiwan],
    },
    SeverityPreset {
        name: "Global Logistics Disruption",
        duration_days: 28,
        demand_multiplier: 0.8,
        lead_time_multiplier: 2.2,
        affected_countries: &[Country::China, Country::Germany, Country::Usa],
    },
    SeverityPreset {
        name: "Semiconductor Shortage",
        duration_days: 25,
        demand_multiplier: 1.1,
        lead_time_multiplier: 3.5,
        affected_countries: &[Country::Taiwan, Country::China],
    },
];

/// Place one disruption window in the second year of the run.
///
/// Returns `None` for runs shorter than three years: the first year
/// establishes a clean baseline and the final year shows recovery, so there
/// is no room for a disruption in shorter horizons.
pub fn schedule_disruption(
    start_time: DateTime<Utc>,
    simulation_years: u32,
    rng: &mut impl Rng,
) -> Option<DisruptionWindow> {
    if simulation_years < 3 {
        return None;
    }

    let preset = &SEVERITY_PRESETS[rng.random_range(0..SEVERITY_PRESETS.len())];
    // Anywhere within year 2, leaving room for the window to close inside it.
    let latest_start = 2 * 365 - preset.duration_days as i64;
    let offset_days = rng.random_range(365..latest_start.max(366));
    Some(DisruptionWindow {
        name: preset.name.to_string(),
        affected_countries: preset.affected_countries.to_vec(),
        start: start_time + Duration::days(offset_days),
        duration_days: preset.duration_days,
        demand_multiplier: preset.demand_multiplier,
        lead_time_multiplier: preset.lead_time_multiplier,
        start_announced: false,
        end_announced: false,
    })
}

/// Demand multiplier contributed by active windows (1.0 when none active).
pub fn demand_factor(windows: &[DisruptionWindow], now: DateTime<Utc>) -> f64 {
    windows
        .iter()
        .filter(|w| w.is_active(now))
        .map(|w| w.demand_multiplier)
        .product()
}

/// Lead-time multiplier for a supplier country (1.0 when no active window
/// names it).
pub fn lead_time_factor(
    windows: &[DisruptionWindow],
    now: DateTime<Utc>,
    country: Country,
) -> f64 {
    windows
        .iter()
        .filter(|w| w.is_active(now) && w.affects(country))
        .map(|w| w.lead_time_multiplier)
        .product()
}
