//! The tick loop. Each tick advances the clock one hour and runs the
//! processors in a fixed order; every event they return is stamped with the
//! tick's timestamp and pushed through the output pipeline in creation
//! order.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::corruption::Corruptor;
use crate::costs;
use crate::demand;
use crate::disruption;
use crate::error::EngineError;
use crate::events::{Event, EventRecord};
use crate::finance;
use crate::master::Catalog;
use crate::persistence::{Checkpoint, CheckpointStore};
use crate::procurement::{self, ReorderPolicy, SupplierPolicy};
use crate::production;
use crate::sink::{EventPipeline, EventSink};
use crate::state::WorldState;

pub struct Simulation<S: EventSink> {
    pub config: SimulationConfig,
    pub catalog: Catalog,
    pub world: WorldState,
    /// Every record emitted so far, in output order.
    pub log: Vec<EventRecord>,
    rng: ChaCha20Rng,
    pipeline: EventPipeline<S>,
    reorder_policy: Box<dyn ReorderPolicy>,
    supplier_policy: Box<dyn SupplierPolicy>,
    store: Option<CheckpointStore>,
}

impl<S: EventSink> Simulation<S> {
    /// Fresh run from the configured start time and seed.
    pub fn new(config: SimulationConfig, sink: S) -> Result<Self, EngineError> {
        config.validate()?;
        let catalog = Catalog::canonical();
        let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
        let mut world = WorldState::bootstrap(&catalog, config.start_time);
        if config.include_disruption {
            if let Some(window) =
                disruption::schedule_disruption(config.start_time, config.simulation_years, &mut rng)
            {
                info!(name = %window.name, start = %window.start, "disruption scheduled");
                world.disruptions.push(window);
            }
        }
        Ok(Self::assemble(config, catalog, world, rng, sink))
    }

    /// Continue a checkpointed run: same world, same RNG position, so the
    /// remaining event stream is identical to an uninterrupted run.
    pub fn resume(
        config: SimulationConfig,
        sink: S,
        checkpoint: Checkpoint,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let catalog = Catalog::canonical();
        info!(tick = checkpoint.world.clock.tick, "resuming from checkpoint");
        Ok(Self::assemble(config, catalog, checkpoint.world, checkpoint.rng, sink))
    }

    fn assemble(
        config: SimulationConfig,
        catalog: Catalog,
        world: WorldState,
        rng: ChaCha20Rng,
        sink: S,
    ) -> Self {
        let pipeline = EventPipeline::new(sink, Corruptor::from_config(&config));
        let reorder_policy = procurement::reorder_policy(config.reorder_policy);
        let supplier_policy = procurement::supplier_policy(config.supplier_policy);
        Simulation {
            config,
            catalog,
            world,
            log: Vec::new(),
            rng,
            pipeline,
            reorder_policy,
            supplier_policy,
            store: None,
        }
    }

    /// Attach a checkpoint store; the world is saved at every simulated day
    /// boundary and at the end of the run.
    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn horizon_ticks(&self) -> u64 {
        self.config.simulation_years as u64 * 365 * 24
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint { world: self.world.clone(), rng: self.rng.clone() }
    }

    /// One simulated hour.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        let prev_date = self.world.clock.now.date_naive();
        self.world.clock.advance_hour();

        let mut events = self.disruption_transitions();
        costs::apply_daily_drift(&mut self.world, &self.catalog, &self.config, &mut self.rng);
        events.extend(procurement::process_receipts(
            &mut self.world,
            &self.catalog,
            &self.config,
            &mut self.rng,
        )?);
        events.extend(demand::sweep_backorders(&mut self.world, &self.catalog, &self.config)?);
        events.extend(procurement::check_reorders(
            &mut self.world,
            &self.catalog,
            &self.config,
            self.reorder_policy.as_ref(),
            self.supplier_policy.as_ref(),
            &mut self.rng,
        )?);
        events.extend(demand::process_demand(
            &mut self.world,
            &self.catalog,
            &self.config,
            &mut self.rng,
        )?);
        events.extend(production::process_production(
            &mut self.world,
            &self.catalog,
            &self.config,
            &mut self.rng,
        )?);
        events.extend(finance::collect_payments(&mut self.world));

        let now = self.world.clock.now;
        for event in events {
            let record = EventRecord::new(now, event);
            self.pipeline.emit(&record, &mut self.rng)?;
            self.log.push(record);
        }

        if now.date_naive() != prev_date {
            debug!(date = %now.date_naive(), tick = self.world.clock.tick, "day rollover");
            self.save_checkpoint()?;
        }
        Ok(())
    }

    /// Emit the boundary-crossing events for scheduled disruption windows.
    fn disruption_transitions(&mut self) -> Vec<Event> {
        let now = self.world.clock.now;
        let mut events = Vec::new();
        for window in &mut self.world.disruptions {
            if !window.start_announced && window.is_active(now) {
                window.start_announced = true;
                info!(name = %window.name, "disruption started");
                events.push(Event::BlackSwanEventStarted {
                    name: window.name.clone(),
                    affected_countries: window
                        .affected_countries
                        .iter()
                        .map(|c| c.as_str())
                        .collect(),
                    demand_multiplier: window.demand_multiplier,
                    lead_time_multiplier: window.lead_time_multiplier,
                });
            }
            if window.start_announced && !window.end_announced && now >= window.end() {
                window.end_announced = true;
                info!(name = %window.name, "disruption ended");
                events.push(Event::BlackSwanEventEnded {
                    name: window.name.clone(),
                    duration_days: window.duration_days,
                });
            }
        }
        events
    }

    fn save_checkpoint(&self) -> Result<(), EngineError> {
        if let Some(store) = &self.store {
            store.save(&self.checkpoint())?;
        }
        Ok(())
    }

    /// Run a fixed number of ticks, then flush and checkpoint.
    pub fn run(&mut self, ticks: u64) -> Result<(), EngineError> {
        info!(ticks, seed = self.config.seed, "starting run");
        for _ in 0..ticks {
            self.tick()?;
        }
        self.finish()
    }

    /// Tick on a wall-clock cadence until the stop flag is raised. Flushes
    /// every tick so consumers see events promptly at service speeds.
    pub fn run_service(
        &mut self,
        tick_interval: std::time::Duration,
        stop: &AtomicBool,
    ) -> Result<(), EngineError> {
        info!(interval_ms = tick_interval.as_millis() as u64, "running as a service");
        while !stop.load(Ordering::Relaxed) {
            self.tick()?;
            self.pipeline.flush()?;
            std::thread::sleep(tick_interval);
        }
        self.finish()
    }

    /// Flush the sink and write a final checkpoint.
    pub fn finish(&mut self) -> Result<(), EngineError> {
        self.pipeline.flush()?;
        self.save_checkpoint()?;
        info!(
            tick = self.world.clock.tick,
            events = self.log.len(),
            "run finished"
        );
        Ok(())
    }

    pub fn sink(&self) -> &S {
        &self.pipeline.sink
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::disruption::DisruptionWindow;
    use crate::sink::MemorySink;
    use crate::types::{Country, ProductId};

    fn quiet_config() -> SimulationConfig {
        let mut config = SimulationConfig::canonical();
        config.data_corruption_enabled = false;
        config
    }

    fn sim(config: SimulationConfig) -> Simulation<MemorySink> {
        Simulation::new(config, MemorySink::default()).unwrap()
    }

    fn count_type(sim: &Simulation<MemorySink>, name: &str) -> usize {
        sim.log.iter().filter(|r| r.event.type_name() == name).count()
    }

    #[test]
    fn invalid_config_is_rejected_before_the_first_tick() {
        let mut config = quiet_config();
        config.demand_probability_base = 7.0;
        assert!(Simulation::new(config, MemorySink::default()).is_err());
    }

    #[test]
    fn same_seed_produces_identical_output() {
        let mut a = sim(quiet_config());
        let mut b = sim(quiet_config());
        a.run(500).unwrap();
        b.run(500).unwrap();
        assert_eq!(a.sink().lines, b.sink().lines);
        assert!(!a.sink().lines.is_empty());
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = sim(quiet_config());
        let mut config = quiet_config();
        config.seed = 43;
        let mut b = sim(config);
        a.run(500).unwrap();
        b.run(500).unwrap();
        assert_ne!(a.sink().lines, b.sink().lines);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut s = sim(quiet_config());
        s.run(300).unwrap();
        for pair in s.log.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn a_week_of_demand_flows_through_the_full_chain() {
        let mut config = quiet_config();
        config.demand_probability_base = 0.5;
        config.demand_probability_business_hours = 0.8;
        let mut s = sim(config);
        s.run(7 * 24).unwrap();

        assert!(count_type(&s, "SalesOrderCreated") > 0);
        assert!(count_type(&s, "ShipmentCreated") > 0);
        // The 10-unit buffer runs out fast at this rate: backorders,
        // production and replenishment all engage.
        assert!(count_type(&s, "BackorderCreated") > 0);
        assert!(count_type(&s, "ProductionJobCreated") > 0);
        assert!(count_type(&s, "MaterialRequirementsCreated") > 0);
        assert!(count_type(&s, "ProductionCompleted") > 0);
        assert!(count_type(&s, "BackorderFulfilled") > 0);
        assert!(count_type(&s, "ReorderTriggered") > 0);
        assert!(count_type(&s, "PurchaseOrderCreated") > 0);
        assert!(count_type(&s, "InvoiceCreated") > 0);
    }

    #[test]
    fn shipped_plus_outstanding_equals_ordered() {
        let mut config = quiet_config();
        config.demand_probability_base = 0.5;
        config.demand_probability_business_hours = 0.8;
        let mut s = sim(config);
        s.run(14 * 24).unwrap();

        let ordered: u64 = s
            .log
            .iter()
            .filter_map(|r| match r.event {
                Event::SalesOrderCreated { qty, .. } => Some(qty as u64),
                _ => None,
            })
            .sum();
        let shipped: u64 = s
            .log
            .iter()
            .filter_map(|r| match r.event {
                Event::ShipmentCreated { qty, .. } => Some(qty as u64),
                Event::PartialShipmentCreated { qty_shipped, .. } => Some(qty_shipped as u64),
                Event::BackorderFulfilled { qty_shipped, .. } => Some(qty_shipped as u64),
                _ => None,
            })
            .sum();
        let outstanding: u64 =
            s.world.backorders.iter().map(|b| b.qty_outstanding as u64).sum();
        assert_eq!(shipped + outstanding, ordered);
    }

    #[test]
    fn part_receipts_conserve_ordered_quantities() {
        let mut config = quiet_config();
        config.demand_probability_base = 0.5;
        config.demand_probability_business_hours = 0.8;
        let mut s = sim(config);
        s.run(30 * 24).unwrap();

        for record in &s.log {
            if let Event::PurchaseOrderReceived {
                qty_ordered,
                qty_received,
                qty_rejected,
                qty_outstanding,
                ..
            } = record.event
            {
                assert_eq!(qty_received + qty_rejected + qty_outstanding, qty_ordered);
            }
        }
        assert!(count_type(&s, "PurchaseOrderReceived") > 0);
    }

    #[test]
    fn disruption_window_announces_start_and_end_once() {
        let mut s = sim(quiet_config());
        let start = s.config.start_time + Duration::hours(5);
        s.world.disruptions.push(DisruptionWindow {
            name: "Regional Natural Disaster".to_string(),
            affected_countries: vec![Country::Taiwan],
            start,
            duration_days: 1,
            demand_multiplier: 0.5,
            lead_time_multiplier: 3.0,
            start_announced: false,
            end_announced: false,
        });
        s.run(3 * 24).unwrap();

        assert_eq!(count_type(&s, "BlackSwanEventStarted"), 1);
        assert_eq!(count_type(&s, "BlackSwanEventEnded"), 1);
        let started_at = s
            .log
            .iter()
            .find(|r| r.event.type_name() == "BlackSwanEventStarted")
            .unwrap()
            .timestamp;
        assert_eq!(started_at, start);
    }

    #[test]
    fn resume_replays_identically_to_uninterrupted_run() {
        let mut uninterrupted = sim(quiet_config());
        uninterrupted.run(96).unwrap();

        let mut first_half = sim(quiet_config());
        first_half.run(48).unwrap();
        let checkpoint = first_half.checkpoint();
        let split = first_half.sink().lines.len();

        let mut second_half =
            Simulation::resume(quiet_config(), MemorySink::default(), checkpoint).unwrap();
        second_half.run(48).unwrap();

        let mut stitched = first_half.sink().lines.clone();
        stitched.extend(second_half.sink().lines.iter().cloned());
        assert_eq!(stitched, uninterrupted.sink().lines);
        assert!(split > 0, "first half produced no events");
    }

    #[test]
    fn finished_goods_never_negative_under_heavy_demand() {
        let mut config = quiet_config();
        config.demand_probability_base = 1.0;
        config.demand_probability_business_hours = 1.0;
        let mut s = sim(config);
        s.run(10 * 24).unwrap();
        // u32 stock plus checked decrements make this structural; the run
        // completing without an Invariant error is the real assertion.
        assert!(s.world.product_on_hand(ProductId(1)) < u32::MAX);
    }

    #[test]
    fn multi_year_horizon_matches_config() {
        let mut config = quiet_config();
        config.simulation_years = 3;
        let s = sim(config);
        assert_eq!(s.horizon_ticks(), 3 * 365 * 24);
    }

    #[test]
    fn start_of_run_clock_matches_config_start() {
        let mut s = sim(quiet_config());
        assert_eq!(s.world.clock.now, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        s.tick().unwrap();
        assert_eq!(s.world.clock.now, Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap());
    }
}
