//! Typed simulation events and the line-delimited output envelope.
//!
//! Inside the engine every event is a variant with a typed payload; the
//! generic `{timestamp, event_type, payload}` shape exists only at the
//! serialization boundary, produced by [`EventRecord`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::types::{
    Cents, CustomerId, InvoiceId, PartId, ProductId, ProductionJobId, PurchaseOrderId,
    SalesOrderId, SupplierId,
};

/// One line of a BOM explosion inside `MaterialRequirementsCreated`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaterialLine {
    pub part_id: PartId,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum Event {
    // ── Demand & fulfilment ───────────────────────────────────────────────
    SalesOrderCreated {
        order_id: SalesOrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        qty: u32,
    },
    ShipmentCreated {
        order_id: SalesOrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        qty: u32,
        qty_ordered: u32,
        remaining_stock: u32,
    },
    PartialShipmentCreated {
        order_id: SalesOrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        qty_shipped: u32,
        qty_backordered: u32,
        qty_ordered: u32,
        remaining_stock: u32,
    },
    BackorderCreated {
        order_id: SalesOrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        qty_backordered: u32,
        original_order_qty: u32,
        reason: &'static str,
    },
    BackorderFulfilled {
        order_id: SalesOrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        qty_shipped: u32,
        qty_still_pending: u32,
        original_order_qty: u32,
        remaining_stock: u32,
    },

    // ── Production ────────────────────────────────────────────────────────
    ProductionJobCreated {
        job_id: ProductionJobId,
        product_id: ProductId,
        qty: u32,
        duration_hours: u32,
    },
    MaterialRequirementsCreated {
        job_id: ProductionJobId,
        order_id: Option<SalesOrderId>,
        product_id: ProductId,
        qty: u32,
        requirements: Vec<MaterialLine>,
    },
    ProductionStarted {
        job_id: ProductionJobId,
        product_id: ProductId,
        qty: u32,
        expected_completion: DateTime<Utc>,
    },
    ProductionCompleted {
        job_id: ProductionJobId,
        product_id: ProductId,
        qty: u32,
        new_qty_on_hand: u32,
    },

    // ── Procurement ───────────────────────────────────────────────────────
    ReorderTriggered {
        part_id: PartId,
        qty_on_hand: u32,
        qty_on_order: u32,
        qty_committed: u32,
        position: i64,
        reorder_point: u32,
        order_qty: u32,
    },
    PurchaseOrderCreated {
        purchase_order_id: PurchaseOrderId,
        part_id: PartId,
        qty: u32,
        supplier_id: SupplierId,
        supplier_country: &'static str,
        supplier_reliability: f64,
        lead_time_hours: u32,
        eta: DateTime<Utc>,
        is_reorder: bool,
        unit_cost: Cents,
        total_cost: Cents,
        base_cost: Cents,
        cost_variance_pct: f64,
        seasonal_lead_time_mult: f64,
    },
    PartialShipment {
        purchase_order_id: PurchaseOrderId,
        part_id: PartId,
        qty_ordered: u32,
        qty_delivered: u32,
        supplier_id: SupplierId,
        shortfall_pct: f64,
    },
    QualityRejection {
        purchase_order_id: PurchaseOrderId,
        part_id: PartId,
        qty_rejected: u32,
        supplier_id: SupplierId,
        reject_rate_pct: f64,
    },
    PurchaseOrderReceived {
        purchase_order_id: PurchaseOrderId,
        part_id: PartId,
        qty_ordered: u32,
        qty_received: u32,
        qty_rejected: u32,
        qty_outstanding: u32,
        supplier_id: SupplierId,
        was_partial_shipment: bool,
        new_qty_on_hand: u32,
    },

    // ── Finance ───────────────────────────────────────────────────────────
    InvoiceCreated {
        invoice_id: InvoiceId,
        order_id: SalesOrderId,
        customer_id: CustomerId,
        amount: Cents,
        due: DateTime<Utc>,
    },
    PaymentReceived {
        invoice_id: InvoiceId,
        order_id: SalesOrderId,
        customer_id: CustomerId,
        amount: Cents,
    },

    // ── Disruptions ───────────────────────────────────────────────────────
    BlackSwanEventStarted {
        name: String,
        affected_countries: Vec<&'static str>,
        demand_multiplier: f64,
        lead_time_multiplier: f64,
    },
    BlackSwanEventEnded {
        name: String,
        duration_days: u32,
    },
}

impl Event {
    /// The `event_type` string this event serializes under.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::SalesOrderCreated { .. } => "SalesOrderCreated",
            Event::ShipmentCreated { .. } => "ShipmentCreated",
            Event::PartialShipmentCreated { .. } => "PartialShipmentCreated",
            Event::BackorderCreated { .. } => "BackorderCreated",
            Event::BackorderFulfilled { .. } => "BackorderFulfilled",
            Event::ProductionJobCreated { .. } => "ProductionJobCreated",
            Event::MaterialRequirementsCreated { .. } => "MaterialRequirementsCreated",
            Event::ProductionStarted { .. } => "ProductionStarted",
            Event::ProductionCompleted { .. } => "ProductionCompleted",
            Event::ReorderTriggered { .. } => "ReorderTriggered",
            Event::PurchaseOrderCreated { .. } => "PurchaseOrderCreated",
            Event::PartialShipment { .. } => "PartialShipment",
            Event::QualityRejection { .. } => "QualityRejection",
            Event::PurchaseOrderReceived { .. } => "PurchaseOrderReceived",
            Event::InvoiceCreated { .. } => "InvoiceCreated",
            Event::PaymentReceived { .. } => "PaymentReceived",
            Event::BlackSwanEventStarted { .. } => "BlackSwanEventStarted",
            Event::BlackSwanEventEnded { .. } => "BlackSwanEventEnded",
        }
    }
}

fn iso_utc_seconds<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// The wire record: one JSON object per line,
/// `{"timestamp": ISO-8601 UTC, "event_type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    #[serde(serialize_with = "iso_utc_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventRecord {
    pub fn new(timestamp: DateTime<Utc>, event: Event) -> Self {
        EventRecord { timestamp, event }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 24, 14, 0, 0).unwrap()
    }

    #[test]
    fn envelope_has_timestamp_type_and_payload() {
        let record = EventRecord::new(ts(), Event::SalesOrderCreated {
            order_id: SalesOrderId(17),
            customer_id: CustomerId(3),
            product_id: ProductId(1),
            qty: 4,
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["timestamp"], "2023-11-24T14:00:00Z");
        assert_eq!(value["event_type"], "SalesOrderCreated");
        assert_eq!(value["payload"]["order_id"], 17);
        assert_eq!(value["payload"]["qty"], 4);
    }

    #[test]
    fn shipment_created_carries_remaining_stock() {
        let record = EventRecord::new(ts(), Event::ShipmentCreated {
            order_id: SalesOrderId(1),
            customer_id: CustomerId(1),
            product_id: ProductId(1),
            qty: 4,
            qty_ordered: 4,
            remaining_stock: 6,
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["payload"]["remaining_stock"], 6);
    }

    #[test]
    fn material_requirements_is_one_event_with_all_lines() {
        let record = EventRecord::new(ts(), Event::MaterialRequirementsCreated {
            job_id: ProductionJobId(5),
            order_id: Some(SalesOrderId(9)),
            product_id: ProductId(1),
            qty: 3,
            requirements: vec![
                MaterialLine { part_id: PartId(1), qty: 12 },
                MaterialLine { part_id: PartId(2), qty: 3 },
            ],
        });
        let value = serde_json::to_value(&record).unwrap();
        let lines = value["payload"]["requirements"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["part_id"], 1);
        assert_eq!(lines[0]["qty"], 12);
    }

    #[test]
    fn type_name_matches_serialized_tag() {
        let events = [
            Event::ReorderTriggered {
                part_id: PartId(1),
                qty_on_hand: 10,
                qty_on_order: 0,
                qty_committed: 0,
                position: 10,
                reorder_point: 20,
                order_qty: 50,
            },
            Event::BlackSwanEventEnded { name: "Port Congestion Event".to_string(), duration_days: 30 },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event_type"], event.type_name());
        }
    }

    #[test]
    fn ndjson_stream_one_line_per_event() {
        use std::io::Write;

        let records = vec![
            EventRecord::new(ts(), Event::BlackSwanEventStarted {
                name: "Semiconductor Shortage".to_string(),
                affected_countries: vec!["Taiwan", "China"],
                demand_multiplier: 1.1,
                lead_time_multiplier: 3.5,
            }),
            EventRecord::new(ts(), Event::PaymentReceived {
                invoice_id: InvoiceId(2),
                order_id: SalesOrderId(7),
                customer_id: CustomerId(4),
                amount: 519_600,
            }),
        ];

        let mut buf: Vec<u8> = Vec::new();
        for r in &records {
            serde_json::to_writer(&mut buf, r).unwrap();
            writeln!(buf).unwrap();
        }

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(v.get("timestamp").is_some(), "missing timestamp in {line}");
            assert!(v.get("event_type").is_some(), "missing event_type in {line}");
            assert!(v.get("payload").is_some(), "missing payload in {line}");
        }
    }
}
