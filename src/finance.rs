//! Invoicing and payment collection. An order is invoiced once, on its final
//! shipment, for the full ordered quantity at list price; payment lands after
//! the customer's contractual terms.

use chrono::Duration;

use crate::config::SimulationConfig;
use crate::events::Event;
use crate::master::Catalog;
use crate::state::{Invoice, SalesOrder, WorldState};

/// Invoice a fully shipped order. Returns no event when invoicing is
/// disabled or master data is missing for the order.
pub fn invoice_order(
    world: &mut WorldState,
    catalog: &Catalog,
    config: &SimulationConfig,
    order: &SalesOrder,
) -> Option<Event> {
    if !config.invoicing_enabled {
        return None;
    }
    let product = catalog.product(order.product_id)?;
    let customer = catalog.customer(order.customer_id)?;

    let invoice = Invoice {
        id: world.alloc_invoice_id(),
        order_id: order.id,
        customer_id: order.customer_id,
        amount: product.list_price * order.qty as u64,
        due: world.clock.now + Duration::days(customer.payment_terms_days as i64),
    };
    let event = Event::InvoiceCreated {
        invoice_id: invoice.id,
        order_id: invoice.order_id,
        customer_id: invoice.customer_id,
        amount: invoice.amount,
        due: invoice.due,
    };
    world.open_invoices.push(invoice);
    Some(event)
}

/// Settle every invoice whose due date has passed.
pub fn collect_payments(world: &mut WorldState) -> Vec<Event> {
    let now = world.clock.now;
    let mut events = Vec::new();
    world.open_invoices.retain(|invoice| {
        if invoice.due <= now {
            events.push(Event::PaymentReceived {
                invoice_id: invoice.id,
                order_id: invoice.order_id,
                customer_id: invoice.customer_id,
                amount: invoice.amount,
            });
            false
        } else {
            true
        }
    });
    events
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::state::OrderState;
    use crate::types::{CustomerId, ProductId, SalesOrderId};

    fn setup() -> (WorldState, Catalog, SimulationConfig) {
        let catalog = Catalog::canonical();
        let start = Utc.with_ymd_and_hms(2023, 5, 10, 12, 0, 0).unwrap();
        let world = WorldState::bootstrap(&catalog, start);
        (world, catalog, SimulationConfig::canonical())
    }

    fn fulfilled_order(qty: u32) -> SalesOrder {
        SalesOrder {
            id: SalesOrderId(1),
            customer_id: CustomerId(1),
            product_id: ProductId(1),
            qty,
            qty_shipped: qty,
            created_at: Utc.with_ymd_and_hms(2023, 5, 10, 12, 0, 0).unwrap(),
            state: OrderState::Fulfilled,
        }
    }

    #[test]
    fn invoice_is_full_quantity_at_list_price() {
        let (mut world, catalog, config) = setup();
        let event = invoice_order(&mut world, &catalog, &config, &fulfilled_order(4)).unwrap();
        match event {
            Event::InvoiceCreated { amount, due, .. } => {
                assert_eq!(amount, 4 * 129_900);
                // Customer 1 pays on 30-day terms.
                assert_eq!(due, world.clock.now + Duration::days(30));
            }
            other => panic!("expected InvoiceCreated, got {other:?}"),
        }
        assert_eq!(world.open_invoices.len(), 1);
    }

    #[test]
    fn invoicing_disabled_emits_nothing() {
        let (mut world, catalog, mut config) = setup();
        config.invoicing_enabled = false;
        assert!(invoice_order(&mut world, &catalog, &config, &fulfilled_order(4)).is_none());
        assert!(world.open_invoices.is_empty());
    }

    #[test]
    fn payment_arrives_once_terms_elapse() {
        let (mut world, catalog, config) = setup();
        invoice_order(&mut world, &catalog, &config, &fulfilled_order(2)).unwrap();

        world.clock.now += Duration::days(29);
        assert!(collect_payments(&mut world).is_empty());

        world.clock.now += Duration::days(2);
        let events = collect_payments(&mut world);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::PaymentReceived { amount, .. } if amount == 2 * 129_900));
        assert!(world.open_invoices.is_empty());
    }
}
