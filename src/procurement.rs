//! Procurement: reorder triggering, supplier selection, purchase-order
//! creation and inbound receipt handling (partial shipments, quality
//! rejections, follow-up deliveries).

use chrono::Duration;
use rand::{Rng, RngCore};

use crate::config::{ReorderPolicyKind, SimulationConfig, SupplierPolicyKind};
use crate::error::EngineError;
use crate::events::Event;
use crate::master::{Catalog, Part, Supplier};
use crate::seasonality::{self, SupplierFactors};
use crate::state::{PurchaseOrder, WorldState};
use crate::types::Cents;

// ── Reorder policy ────────────────────────────────────────────────────────

/// Computes the inventory position a part's reorder decision is based on.
pub trait ReorderPolicy: Send + Sync {
    fn position(&self, world: &WorldState, catalog: &Catalog, part: &Part) -> i64;
}

/// On-hand + on-order − committed production demand. Counting open supply
/// prevents re-triggering every tick while a replenishment is in transit.
pub struct NetPosition;

impl ReorderPolicy for NetPosition {
    fn position(&self, world: &WorldState, catalog: &Catalog, part: &Part) -> i64 {
        world.part_on_hand(part.id) as i64 + world.qty_on_order(part.id) as i64
            - world.qty_committed(part.id, catalog) as i64
    }
}

/// Raw on-hand stock. Ignores open supply, so a part below its reorder point
/// triggers again every tick until goods land. Opt-in, for reproducing
/// runaway-ordering datasets.
pub struct GrossOnHand;

impl ReorderPolicy for GrossOnHand {
    fn position(&self, world: &WorldState, _catalog: &Catalog, part: &Part) -> i64 {
        world.part_on_hand(part.id) as i64
    }
}

pub fn reorder_policy(kind: ReorderPolicyKind) -> Box<dyn ReorderPolicy> {
    match kind {
        ReorderPolicyKind::NetPosition => Box::new(NetPosition),
        ReorderPolicyKind::GrossOnHand => Box::new(GrossOnHand),
    }
}

// ── Supplier policy ───────────────────────────────────────────────────────

/// A qualified supplier with its seasonally adjusted reliability at the
/// moment of selection.
pub struct SupplierCandidate<'a> {
    pub supplier: &'a Supplier,
    pub effective_reliability: f64,
}

/// Picks one of a part's qualified suppliers. Returns an index into the
/// candidate slice, which is always non-empty.
pub trait SupplierPolicy: Send + Sync {
    fn choose(&self, candidates: &[SupplierCandidate<'_>], rng: &mut dyn RngCore) -> usize;
}

/// Weighted score over effective reliability, price and the preferred flag.
/// Seasonal reliability dips can flip the winner to an off-season country.
pub struct BestValue;

impl SupplierPolicy for BestValue {
    fn choose(&self, candidates: &[SupplierCandidate<'_>], _rng: &mut dyn RngCore) -> usize {
        let mut best = 0;
        let mut best_score = f64::MIN;
        for (i, c) in candidates.iter().enumerate() {
            let price_score = 1.0 / c.supplier.price_multiplier;
            let preferred = if c.supplier.preferred { 1.0 } else { 0.0 };
            let score =
                c.effective_reliability * 0.5 + price_score * 0.35 + preferred * 0.15;
            if score > best_score {
                best_score = score;
                best = i;
            }
        }
        best
    }
}

pub struct UniformRandom;

impl SupplierPolicy for UniformRandom {
    fn choose(&self, candidates: &[SupplierCandidate<'_>], rng: &mut dyn RngCore) -> usize {
        rng.random_range(0..candidates.len())
    }
}

pub fn supplier_policy(kind: SupplierPolicyKind) -> Box<dyn SupplierPolicy> {
    match kind {
        SupplierPolicyKind::BestValue => Box::new(BestValue),
        SupplierPolicyKind::UniformRandom => Box::new(UniformRandom),
    }
}

// ── Ordering ──────────────────────────────────────────────────────────────

/// Lead time drawn from the configured base range, stretched by supplier
/// unreliability and the seasonal/disruption multiplier.
fn draw_lead_time_hours(
    config: &SimulationConfig,
    effective_reliability: f64,
    lead_time_mult: f64,
    rng: &mut impl Rng,
) -> u32 {
    let reliability_factor = 1.1 - effective_reliability;
    let lo = config.base_lead_time_hours_min as f64 * reliability_factor * lead_time_mult;
    let hi = config.base_lead_time_hours_max as f64 * reliability_factor * lead_time_mult;
    (rng.random_range(lo..=hi.max(lo)).round() as u32).max(1)
}

/// Drifted unit cost in cents: standard cost moved by the part's cumulative
/// commodity drift, then marked by the supplier's price multiplier.
fn unit_cost(part: &Part, supplier: &Supplier, drift: f64) -> Cents {
    (part.standard_cost as f64 * (1.0 + drift) * supplier.price_multiplier).round() as Cents
}

/// Check every part's inventory position against its reorder point and raise
/// replenishment orders up to the reorder target. Parts are visited in
/// catalog order to keep the random stream deterministic.
pub fn check_reorders(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    reorder: &dyn ReorderPolicy,
    supplier: &dyn SupplierPolicy,
    rng: &mut impl Rng,
) -> Result<Vec<Event>, EngineError> {
    let mut events = Vec::new();

    for part in &catalog.parts {
        let position = reorder.position(world, catalog, part);
        if position >= part.reorder_point as i64 {
            continue;
        }
        let order_qty = (part.reorder_target as i64 - position).max(1) as u32;
        events.push(Event::ReorderTriggered {
            part_id: part.id,
            qty_on_hand: world.part_on_hand(part.id),
            qty_on_order: world.qty_on_order(part.id),
            qty_committed: world.qty_committed(part.id, catalog),
            position,
            reorder_point: part.reorder_point,
            order_qty,
        });
        events.push(create_purchase_order(
            world, catalog, config, part, order_qty, true, supplier, rng,
        )?);
    }

    Ok(events)
}

/// Select a supplier and place one purchase order for a part.
#[allow(clippy::too_many_arguments)]
pub fn create_purchase_order(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    part: &Part,
    qty: u32,
    is_reorder: bool,
    policy: &dyn SupplierPolicy,
    rng: &mut impl Rng,
) -> Result<Event, EngineError> {
    let now = world.clock.now;
    let candidates: Vec<SupplierCandidate<'_>> = part
        .qualified_suppliers
        .iter()
        .filter_map(|sid| catalog.supplier(*sid))
        .map(|s| {
            let factors = seasonality::supplier_factors(now, s.country, config, &world.disruptions);
            SupplierCandidate {
                supplier: s,
                effective_reliability: (s.reliability_score * factors.reliability_mult)
                    .clamp(0.0, 1.0),
            }
        })
        .collect();
    if candidates.is_empty() {
        return Err(EngineError::Invariant(format!(
            "part {} has no qualified suppliers in the catalog",
            part.code
        )));
    }

    let chosen = &candidates[policy.choose(&candidates, rng)];
    let factors: SupplierFactors =
        seasonality::supplier_factors(now, chosen.supplier.country, config, &world.disruptions);
    let lead_time_hours =
        draw_lead_time_hours(config, chosen.effective_reliability, factors.lead_time_mult, rng);
    let eta = now + Duration::hours(lead_time_hours as i64);

    let drift = world.cost_drift.get(&part.id).copied().unwrap_or(0.0);
    let cost = unit_cost(part, chosen.supplier, drift);
    let base_cost = (part.standard_cost as f64 * chosen.supplier.price_multiplier).round() as Cents;
    let cost_variance_pct = if base_cost > 0 {
        (cost as f64 - base_cost as f64) / base_cost as f64 * 100.0
    } else {
        0.0
    };

    let po = PurchaseOrder {
        id: world.alloc_po_id(),
        part_id: part.id,
        supplier_id: chosen.supplier.id,
        qty_ordered: qty,
        qty_received: 0,
        qty_rejected: 0,
        unit_cost: cost,
        created_at: now,
        eta,
        is_reorder,
    };
    let event = Event::PurchaseOrderCreated {
        purchase_order_id: po.id,
        part_id: part.id,
        qty,
        supplier_id: chosen.supplier.id,
        supplier_country: chosen.supplier.country.as_str(),
        supplier_reliability: chosen.supplier.reliability_score,
        lead_time_hours,
        eta,
        is_reorder,
        unit_cost: cost,
        total_cost: cost * qty as u64,
        base_cost,
        cost_variance_pct,
        seasonal_lead_time_mult: factors.lead_time_mult,
    };
    world.purchase_orders.push(po);
    Ok(event)
}

// ── Receiving ─────────────────────────────────────────────────────────────

/// Process every purchase order whose ETA has passed. A delivery may be
/// short (partial shipment) and may lose units to quality rejection; the
/// undelivered remainder stays on the order with a fresh follow-up ETA so
/// ordered == received + rejected + outstanding always holds.
pub fn process_receipts(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> Result<Vec<Event>, EngineError> {
    let now = world.clock.now;
    let mut events = Vec::new();

    let due: Vec<usize> = world
        .purchase_orders
        .iter()
        .enumerate()
        .filter(|(_, po)| po.eta <= now && po.qty_outstanding() > 0)
        .map(|(i, _)| i)
        .collect();

    for index in due {
        let (po_id, part_id, supplier_id, expected) = {
            let po = &world.purchase_orders[index];
            (po.id, po.part_id, po.supplier_id, po.qty_outstanding())
        };
        let supplier = catalog.supplier(supplier_id).ok_or_else(|| {
            EngineError::Invariant(format!("purchase order {po_id:?} references unknown supplier"))
        })?;
        let unreliability = 1.1 - supplier.reliability_score;

        // Short delivery?
        let partial_p = (config.partial_shipment_probability * unreliability).clamp(0.0, 1.0);
        let was_partial = rng.random::<f64>() < partial_p;
        let delivered = if was_partial {
            let pct = rng
                .random_range(config.partial_shipment_min_pct..=config.partial_shipment_max_pct);
            let qty = ((expected as f64 * pct).round() as u32).clamp(1, expected);
            events.push(Event::PartialShipment {
                purchase_order_id: po_id,
                part_id,
                qty_ordered: expected,
                qty_delivered: qty,
                supplier_id,
                shortfall_pct: (1.0 - qty as f64 / expected as f64) * 100.0,
            });
            qty
        } else {
            expected
        };

        // Incoming inspection.
        let mut rejected = 0;
        if rng.random::<f64>() < config.quality_issue_probability {
            let rate = rng
                .random_range(config.quality_reject_rate_min..=config.quality_reject_rate_max)
                * (1.2 - supplier.reliability_score);
            rejected = ((delivered as f64 * rate).round() as u32).min(delivered);
            if rejected > 0 {
                events.push(Event::QualityRejection {
                    purchase_order_id: po_id,
                    part_id,
                    qty_rejected: rejected,
                    supplier_id,
                    reject_rate_pct: rate * 100.0,
                });
            }
        }

        let accepted = delivered - rejected;
        world.add_part_stock(part_id, accepted);

        let follow_up_mult = seasonality::supplier_factors(
            now,
            supplier.country,
            config,
            &world.disruptions,
        )
        .lead_time_mult;
        let effective = (supplier.reliability_score).clamp(0.0, 1.0);

        let po = &mut world.purchase_orders[index];
        po.qty_received += accepted;
        po.qty_rejected += rejected;
        events.push(Event::PurchaseOrderReceived {
            purchase_order_id: po_id,
            part_id,
            qty_ordered: po.qty_ordered,
            qty_received: po.qty_received,
            qty_rejected: po.qty_rejected,
            qty_outstanding: po.qty_outstanding(),
            supplier_id,
            was_partial_shipment: was_partial,
            new_qty_on_hand: 0, // filled below, after the borrow ends
        });

        if po.qty_outstanding() > 0 {
            // Remainder ships later under a fresh lead time.
            let hours = draw_lead_time_hours(config, effective, follow_up_mult, rng);
            po.eta = now + Duration::hours(hours as i64);
        }

        let on_hand = world.part_on_hand(part_id);
        if let Some(Event::PurchaseOrderReceived { new_qty_on_hand, .. }) = events.last_mut() {
            *new_qty_on_hand = on_hand;
        }
    }

    // Fully received orders leave the open list.
    world.purchase_orders.retain(|po| po.qty_outstanding() > 0);

    Ok(events)
}
