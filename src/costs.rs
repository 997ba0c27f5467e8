//! Commodity cost drift: one bounded random-walk step per part per simulated
//! day. The cumulative drift feeds purchase-order pricing; no events are
//! emitted, the drift only becomes visible through `PurchaseOrderCreated`
//! cost fields.

use rand::Rng;

use crate::config::SimulationConfig;
use crate::master::Catalog;
use crate::state::WorldState;

/// Apply the daily drift step if this simulated day has not been stepped
/// yet. Safe to call every tick.
pub fn apply_daily_drift(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    rng: &mut impl Rng,
) {
    if !config.cost_drift_enabled {
        return;
    }
    let today = world.clock.now.date_naive();
    if world.last_drift_date == Some(today) {
        return;
    }
    world.last_drift_date = Some(today);

    let max = config.cost_drift_max_pct;
    for part in &catalog.parts {
        let step = rng.random_range(-config.cost_drift_daily_pct..=config.cost_drift_daily_pct);
        let drift = world.cost_drift.entry(part.id).or_insert(0.0);
        *drift = (*drift + step).clamp(-max, max);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::types::PartId;

    fn setup() -> (WorldState, Catalog, SimulationConfig) {
        let catalog = Catalog::canonical();
        let start = Utc.with_ymd_and_hms(2023, 5, 10, 0, 0, 0).unwrap();
        let world = WorldState::bootstrap(&catalog, start);
        (world, catalog, SimulationConfig::canonical())
    }

    #[test]
    fn one_step_per_simulated_day() {
        let (mut world, catalog, config) = setup();
        let mut rng = ChaCha20Rng::seed_from_u64(5);

        apply_daily_drift(&mut world, &catalog, &config, &mut rng);
        let after_first = world.cost_drift.clone();
        assert_eq!(after_first.len(), catalog.parts.len());

        // Same day, later hour: no further movement.
        world.clock.now += Duration::hours(5);
        apply_daily_drift(&mut world, &catalog, &config, &mut rng);
        assert_eq!(world.cost_drift, after_first);

        // Next day: drift moves again.
        world.clock.now += Duration::hours(24);
        apply_daily_drift(&mut world, &catalog, &config, &mut rng);
        assert_ne!(world.cost_drift, after_first);
    }

    #[test]
    fn drift_stays_within_configured_cap() {
        let (mut world, catalog, mut config) = setup();
        config.cost_drift_daily_pct = 0.5;
        config.cost_drift_max_pct = 0.20;
        let mut rng = ChaCha20Rng::seed_from_u64(5);

        for _ in 0..50 {
            apply_daily_drift(&mut world, &catalog, &config, &mut rng);
            world.clock.now += Duration::days(1);
        }
        for drift in world.cost_drift.values() {
            assert!((-0.20..=0.20).contains(drift), "drift {drift} escaped the cap");
        }
    }

    #[test]
    fn disabled_drift_never_moves() {
        let (mut world, catalog, mut config) = setup();
        config.cost_drift_enabled = false;
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        for _ in 0..10 {
            apply_daily_drift(&mut world, &catalog, &config, &mut rng);
            world.clock.now += Duration::days(1);
        }
        assert!(world.cost_drift.is_empty());
        assert_eq!(world.cost_drift.get(&PartId(1)), None);
    }
}
