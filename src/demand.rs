//! Demand generation and order fulfilment.
//!
//! Each tick every customer gets an independent Bernoulli trial against the
//! hour's seasonal demand probability. Created orders are fulfilled
//! immediately from finished goods; shortfalls become FIFO backorders that
//! the sweep retries whenever stock arrives.

use rand::Rng;

use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::events::Event;
use crate::finance;
use crate::master::{Catalog, ContractTier};
use crate::seasonality;
use crate::state::{Backorder, OrderState, SalesOrder, WorldState};

/// Per-customer order probability for the current hour, before tier
/// weighting. Business hours use the elevated base rate; both are scaled by
/// the seasonal demand multiplier.
fn hourly_probability(world: &WorldState, config: &SimulationConfig) -> f64 {
    use chrono::Timelike;

    let hour = world.clock.now.hour();
    let base = if (config.business_hours_start..config.business_hours_end).contains(&hour) {
        config.demand_probability_business_hours
    } else {
        config.demand_probability_base
    };
    base * seasonality::demand_multiplier(world.clock.now, config, &world.disruptions)
}

fn draw_order_qty(config: &SimulationConfig, rng: &mut impl Rng) -> u32 {
    if rng.random::<f64>() < config.bulk_order_probability {
        rng.random_range(config.bulk_order_qty_min..=config.bulk_order_qty_max)
    } else {
        rng.random_range(config.normal_order_qty_min..=config.normal_order_qty_max)
    }
}

/// Run the per-customer demand trials for this tick, creating and fulfilling
/// sales orders. Customers are visited in catalog order so the random stream
/// is consumed identically for a given seed.
pub fn process_demand(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> Result<Vec<Event>, EngineError> {
    let hourly = hourly_probability(world, config);
    let mut events = Vec::new();

    for customer in &catalog.customers {
        let weight = match customer.tier {
            ContractTier::Tier1 => config.tier1_demand_weight,
            ContractTier::Tier2 => 1.0,
        };
        let p = (hourly * weight).min(1.0);
        if rng.random::<f64>() >= p {
            continue;
        }

        let product = &catalog.products[rng.random_range(0..catalog.products.len())];
        let qty = draw_order_qty(config, rng);
        let order = SalesOrder {
            id: world.alloc_order_id(),
            customer_id: customer.id,
            product_id: product.id,
            qty,
            qty_shipped: 0,
            created_at: world.clock.now,
            state: OrderState::Open,
        };
        events.push(Event::SalesOrderCreated {
            order_id: order.id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            qty: order.qty,
        });
        fulfil_order(world, catalog, config, order, rng, &mut events)?;
    }

    Ok(events)
}

/// Attempt immediate fulfilment of a fresh order. Full shipment closes and
/// invoices it; a short position ships partially only when the configured
/// partial-shipment trial succeeds, otherwise the whole quantity backorders.
fn fulfil_order(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    mut order: SalesOrder,
    rng: &mut impl Rng,
    events: &mut Vec<Event>,
) -> Result<(), EngineError> {
    let on_hand = world.product_on_hand(order.product_id);

    if on_hand >= order.qty {
        let remaining = world.ship_finished_goods(order.product_id, order.qty)?;
        order.qty_shipped = order.qty;
        order.state = OrderState::Fulfilled;
        events.push(Event::ShipmentCreated {
            order_id: order.id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            qty: order.qty,
            qty_ordered: order.qty,
            remaining_stock: remaining,
        });
        events.extend(finance::invoice_order(world, catalog, config, &order));
    } else if on_hand > 0 && rng.random::<f64>() < config.partial_shipment_probability {
        let remaining = world.ship_finished_goods(order.product_id, on_hand)?;
        let backordered = order.qty - on_hand;
        order.qty_shipped = on_hand;
        order.state = OrderState::PartiallyShipped;
        events.push(Event::PartialShipmentCreated {
            order_id: order.id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            qty_shipped: on_hand,
            qty_backordered: backordered,
            qty_ordered: order.qty,
            remaining_stock: remaining,
        });
        world.backorders.push(Backorder {
            order_id: order.id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            qty_outstanding: backordered,
            original_qty: order.qty,
            created_at: world.clock.now,
        });
        world.open_orders.insert(order.id, order);
    } else {
        order.state = OrderState::Backordered;
        events.push(Event::BackorderCreated {
            order_id: order.id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            qty_backordered: order.qty,
            original_order_qty: order.qty,
            reason: "insufficient_stock",
        });
        world.backorders.push(Backorder {
            order_id: order.id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            qty_outstanding: order.qty,
            original_qty: order.qty,
            created_at: world.clock.now,
        });
        world.open_orders.insert(order.id, order);
    }

    Ok(())
}

/// Ship outstanding backorders oldest-first from whatever finished goods are
/// on hand. Runs every tick and again immediately after each production
/// completion. An order's final shipment closes and invoices it.
pub fn sweep_backorders(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
) -> Result<Vec<Event>, EngineError> {
    let mut events = Vec::new();

    let mut index = 0;
    while index < world.backorders.len() {
        let product_id = world.backorders[index].product_id;
        let on_hand = world.product_on_hand(product_id);
        if on_hand == 0 {
            index += 1;
            continue;
        }

        let shippable = on_hand.min(world.backorders[index].qty_outstanding);
        let remaining_stock = world.ship_finished_goods(product_id, shippable)?;
        let backorder = &mut world.backorders[index];
        backorder.qty_outstanding -= shippable;
        let still_pending = backorder.qty_outstanding;
        let order_id = backorder.order_id;
        let customer_id = backorder.customer_id;
        let original_qty = backorder.original_qty;

        events.push(Event::BackorderFulfilled {
            order_id,
            customer_id,
            product_id,
            qty_shipped: shippable,
            qty_still_pending: still_pending,
            original_order_qty: original_qty,
            remaining_stock,
        });

        if let Some(order) = world.open_orders.get_mut(&order_id) {
            order.qty_shipped += shippable;
            if still_pending == 0 {
                order.state = OrderState::Fulfilled;
            }
        }

        if still_pending == 0 {
            world.backorders.remove(index);
            if let Some(order) = world.open_orders.remove(&order_id) {
                events.extend(finance::invoice_order(world, catalog, config, &order));
            }
        } else {
            index += 1;
        }
    }

    Ok(events)
}
