//! Seasonality modifiers: pure functions of the simulated timestamp (and the
//! active-disruption registry) producing multiplicative demand and lead-time
//! factors. Nothing here touches world state or the random stream.

use chrono::{DateTime, Datelike, Utc, Weekday};

use crate::config::SimulationConfig;
use crate::disruption::{self, DisruptionWindow};
use crate::types::Country;

/// Monthly demand shape: post-holiday slump, summer lull, Q4 ramp to the
/// November peak.
fn month_factor(month: u32) -> f64 {
    match month {
        1 => 0.8,
        2 => 0.85,
        3 | 4 => 1.0,
        5 => 1.05,
        6 => 0.9,
        7 | 8 => 0.85,
        9 => 1.1,
        10 => 1.2,
        11 => 1.4,
        12 => 1.3,
        _ => 1.0,
    }
}

/// Friday rush, weekend lull.
fn day_of_week_factor(weekday: Weekday) -> f64 {
    match weekday {
        Weekday::Mon => 0.85,
        Weekday::Tue => 0.95,
        Weekday::Wed => 1.0,
        Weekday::Thu => 1.05,
        Weekday::Fri => 1.25,
        Weekday::Sat => 0.6,
        Weekday::Sun => 0.4,
    }
}

/// Month-end (+20%) and quarter-end (extra +15%) financial-closing pressure.
fn period_end_factor(now: DateTime<Utc>) -> f64 {
    let day = now.day();
    let month = now.month();
    let mut factor = 1.0;
    if day >= 28 {
        factor = 1.2;
    }
    if matches!(month, 3 | 6 | 9 | 12) && day >= 26 {
        factor *= 1.15;
    }
    factor
}

/// Attenuate a raw factor towards 1.0: strength 1.0 keeps the full effect,
/// 0.0 removes it entirely.
fn attenuate(factor: f64, strength: f64) -> f64 {
    1.0 + (factor - 1.0) * strength
}

/// Combined demand multiplier: month × day-of-week × period-end × active
/// disruptions, each seasonal component attenuated by the configured
/// strength.
pub fn demand_multiplier(
    now: DateTime<Utc>,
    config: &SimulationConfig,
    windows: &[DisruptionWindow],
) -> f64 {
    if !config.seasonality_enabled {
        return disruption::demand_factor(windows, now);
    }
    let strength = config.demand_seasonality_strength;
    attenuate(month_factor(now.month()), strength)
        * attenuate(day_of_week_factor(now.weekday()), strength)
        * period_end_factor(now)
        * disruption::demand_factor(windows, now)
}

struct SeasonalWindow {
    start: (u32, u32),
    end: (u32, u32),
    lead_time_mult: f64,
    reliability_mult: f64,
}

/// Country-specific supplier calendars: Chinese New Year, Golden Week,
/// German vacation and holiday seasons, US holiday weeks. The
/// December-to-January ranges wrap around the year boundary.
fn country_calendar(country: Country) -> &'static [SeasonalWindow] {
    match country {
        Country::China => &[
            SeasonalWindow { start: (1, 15), end: (1, 31), lead_time_mult: 2.5, reliability_mult: 0.7 },
            SeasonalWindow { start: (2, 1), end: (2, 15), lead_time_mult: 3.0, reliability_mult: 0.5 },
            SeasonalWindow { start: (2, 16), end: (2, 28), lead_time_mult: 1.5, reliability_mult: 0.8 },
            SeasonalWindow { start: (10, 1), end: (10, 7), lead_time_mult: 1.8, reliability_mult: 0.75 },
        ],
        Country::Taiwan => &[
            SeasonalWindow { start: (1, 15), end: (1, 31), lead_time_mult: 2.0, reliability_mult: 0.75 },
            SeasonalWindow { start: (2, 1), end: (2, 15), lead_time_mult: 2.5, reliability_mult: 0.6 },
            SeasonalWindow { start: (2, 16), end: (2, 28), lead_time_mult: 1.3, reliability_mult: 0.85 },
        ],
        Country::Germany => &[
            SeasonalWindow { start: (8, 1), end: (8, 31), lead_time_mult: 1.5, reliability_mult: 0.85 },
            SeasonalWindow { start: (12, 15), end: (12, 31), lead_time_mult: 1.8, reliability_mult: 0.8 },
            SeasonalWindow { start: (1, 1), end: (1, 6), lead_time_mult: 1.5, reliability_mult: 0.85 },
        ],
        Country::Usa => &[
            SeasonalWindow { start: (11, 20), end: (11, 30), lead_time_mult: 1.3, reliability_mult: 0.9 },
            SeasonalWindow { start: (12, 20), end: (12, 31), lead_time_mult: 1.5, reliability_mult: 0.85 },
            SeasonalWindow { start: (1, 1), end: (1, 3), lead_time_mult: 1.3, reliability_mult: 0.9 },
            SeasonalWindow { start: (7, 1), end: (7, 7), lead_time_mult: 1.2, reliability_mult: 0.92 },
        ],
    }
}

/// Whether (month, day) lies inside a window, handling windows that wrap the
/// year boundary (e.g. Dec 15 – Jan 6).
fn date_in_window(month: u32, day: u32, start: (u32, u32), end: (u32, u32)) -> bool {
    let current = (month, day);
    if start <= end { start <= current && current <= end } else { current >= start || current <= end }
}

/// Supplier-side seasonal factors for a country at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplierFactors {
    pub lead_time_mult: f64,
    pub reliability_mult: f64,
}

impl SupplierFactors {
    pub const NEUTRAL: SupplierFactors =
        SupplierFactors { lead_time_mult: 1.0, reliability_mult: 1.0 };
}

/// Seasonal lead-time and reliability multipliers for a supplier country,
/// combined multiplicatively with any active disruption's lead-time factor.
pub fn supplier_factors(
    now: DateTime<Utc>,
    country: Country,
    config: &SimulationConfig,
    windows: &[DisruptionWindow],
) -> SupplierFactors {
    let mut factors = SupplierFactors::NEUTRAL;

    if config.seasonality_enabled {
        let strength = config.supplier_seasonality_strength;
        let (month, day) = (now.month(), now.day());
        for w in country_calendar(country) {
            if date_in_window(month, day, w.start, w.end) {
                factors.lead_time_mult = attenuate(w.lead_time_mult, strength);
                factors.reliability_mult = attenuate(w.reliability_mult, strength);
                break;
            }
        }
    }

    factors.lead_time_mult *= disruption::lead_time_factor(windows, now, country);
    factors
}
