//! Production: jobs sized to the open backorder gap, started once their bill
//! of materials can be consumed, completed after a drawn build duration.

use chrono::Duration;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::demand;
use crate::error::EngineError;
use crate::events::{Event, MaterialLine};
use crate::master::Catalog;
use crate::state::{JobState, ProductionJob, WorldState};

/// Run the production stage for this tick: finish due jobs (shipping any
/// backorders the new stock covers), open new jobs for uncovered backorder
/// demand, then start whatever jobs have materials on hand.
pub fn process_production(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> Result<Vec<Event>, EngineError> {
    let mut events = complete_due_jobs(world, catalog, config)?;
    events.extend(create_jobs(world, catalog, config, rng));
    events.extend(start_ready_jobs(world, catalog)?);
    Ok(events)
}

/// Complete every started job whose expected completion has passed. Each
/// completion immediately re-runs the backorder sweep so waiting orders ship
/// in the same tick the goods appear.
fn complete_due_jobs(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
) -> Result<Vec<Event>, EngineError> {
    let now = world.clock.now;
    let mut events = Vec::new();

    let due: Vec<usize> = world
        .jobs
        .iter()
        .enumerate()
        .filter(|(_, job)| {
            job.state == JobState::Started && job.expected_completion.is_some_and(|t| t <= now)
        })
        .map(|(i, _)| i)
        .collect();

    for index in due.into_iter().rev() {
        let job = world.jobs.remove(index);
        world.add_finished_goods(job.product_id, job.qty);
        events.push(Event::ProductionCompleted {
            job_id: job.id,
            product_id: job.product_id,
            qty: job.qty,
            new_qty_on_hand: world.product_on_hand(job.product_id),
        });
        events.extend(demand::sweep_backorders(world, catalog, config)?);
    }

    Ok(events)
}

/// Open one job per product whose backorder demand is not already covered by
/// pending production.
fn create_jobs(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> Vec<Event> {
    let mut events = Vec::new();

    for product in &catalog.products {
        let outstanding = world.backorder_demand(product.id);
        let pending = world.pending_production(product.id);
        if outstanding <= pending {
            continue;
        }
        let gap = outstanding - pending;
        let duration = rng.random_range(
            config.production_duration_hours_min..=config.production_duration_hours_max,
        );
        let order_id = world
            .backorders
            .iter()
            .find(|b| b.product_id == product.id)
            .map(|b| b.order_id);
        let job = ProductionJob {
            id: world.alloc_job_id(),
            product_id: product.id,
            qty: gap,
            order_id,
            state: JobState::Created,
            duration_hours: duration,
            created_at: world.clock.now,
            expected_completion: None,
        };
        events.push(Event::ProductionJobCreated {
            job_id: job.id,
            product_id: job.product_id,
            qty: job.qty,
            duration_hours: job.duration_hours,
        });
        world.jobs.push(job);
    }

    events
}

/// Start every created job whose full bill of materials is on hand,
/// consuming the parts and fixing the completion time.
fn start_ready_jobs(
    world: &mut WorldState,
    catalog: &Catalog,
) -> Result<Vec<Event>, EngineError> {
    let now = world.clock.now;
    let mut events = Vec::new();

    let candidates: Vec<usize> = world
        .jobs
        .iter()
        .enumerate()
        .filter(|(_, job)| job.state == JobState::Created)
        .map(|(i, _)| i)
        .collect();

    for index in candidates {
        let (product_id, qty) = {
            let job = &world.jobs[index];
            (job.product_id, job.qty)
        };
        let Some(product) = catalog.product(product_id) else {
            continue;
        };
        let requirements: Vec<MaterialLine> = product
            .bom
            .iter()
            .map(|line| MaterialLine { part_id: line.part_id, qty: line.qty_per_unit * qty })
            .collect();
        let feasible =
            requirements.iter().all(|line| world.part_on_hand(line.part_id) >= line.qty);
        if !feasible {
            continue;
        }

        for line in &requirements {
            world.consume_part_stock(line.part_id, line.qty)?;
        }

        let job = &mut world.jobs[index];
        let expected = now + Duration::hours(job.duration_hours as i64);
        job.state = JobState::Started;
        job.expected_completion = Some(expected);

        events.push(Event::MaterialRequirementsCreated {
            job_id: job.id,
            order_id: job.order_id,
            product_id,
            qty,
            requirements,
        });
        events.push(Event::ProductionStarted {
            job_id: job.id,
            product_id,
            qty,
            expected_completion: expected,
        });
    }

    Ok(events)
}
