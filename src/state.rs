//! The mutable ledger: inventory positions, open documents, cost levels and
//! active disruption windows. A single owned aggregate handed by exclusive
//! reference to each tick processor in a fixed call order.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::disruption::DisruptionWindow;
use crate::error::EngineError;
use crate::master::Catalog;
use crate::types::{
    Cents, CustomerId, InvoiceId, PartId, ProductId, ProductionJobId, PurchaseOrderId,
    SalesOrderId, SupplierId,
};

/// Simulated clock. Advances by exactly one hour per tick and is never
/// rewound except by resuming from a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    pub now: DateTime<Utc>,
    pub tick: u64,
}

impl SimClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        SimClock { now: start, tick: 0 }
    }

    pub fn advance_hour(&mut self) {
        self.now += Duration::hours(1);
        self.tick += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Open,
    PartiallyShipped,
    Backordered,
    Fulfilled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: SalesOrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub qty: u32,
    pub qty_shipped: u32,
    pub created_at: DateTime<Utc>,
    pub state: OrderState,
}

/// The unshipped remainder of a sales order. At most one live backorder per
/// order; `qty_outstanding` only ever decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backorder {
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub qty_outstanding: u32,
    pub original_qty: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Started,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionJob {
    pub id: ProductionJobId,
    pub product_id: ProductId,
    pub qty: u32,
    /// Order whose shortfall triggered this job, if any.
    pub order_id: Option<SalesOrderId>,
    pub state: JobState,
    pub duration_hours: u32,
    pub created_at: DateTime<Utc>,
    pub expected_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderState {
    Created,
    PartiallyReceived,
    Received,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub part_id: PartId,
    pub supplier_id: SupplierId,
    pub qty_ordered: u32,
    pub qty_received: u32,
    pub qty_rejected: u32,
    pub unit_cost: Cents,
    pub created_at: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub is_reorder: bool,
}

impl PurchaseOrder {
    /// Conservation: received + rejected + outstanding == ordered, always.
    pub fn qty_outstanding(&self) -> u32 {
        self.qty_ordered - self.qty_received - self.qty_rejected
    }

    pub fn state(&self) -> PurchaseOrderState {
        if self.qty_outstanding() == 0 {
            PurchaseOrderState::Received
        } else if self.qty_received + self.qty_rejected > 0 {
            PurchaseOrderState::PartiallyReceived
        } else {
            PurchaseOrderState::Created
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub amount: Cents,
    pub due: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub clock: SimClock,
    /// Purchased-part stock. BTreeMap keeps processor iteration order
    /// deterministic for a given seed.
    pub part_stock: BTreeMap<PartId, u32>,
    pub finished_goods: BTreeMap<ProductId, u32>,
    pub open_orders: BTreeMap<SalesOrderId, SalesOrder>,
    /// FIFO by creation; the sweep ships oldest first.
    pub backorders: Vec<Backorder>,
    pub jobs: Vec<ProductionJob>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub open_invoices: Vec<Invoice>,
    /// part_id → cumulative commodity drift, clamped to ±max.
    pub cost_drift: BTreeMap<PartId, f64>,
    pub last_drift_date: Option<chrono::NaiveDate>,
    pub disruptions: Vec<DisruptionWindow>,
    next_order_id: u64,
    next_job_id: u64,
    next_po_id: u64,
    next_invoice_id: u64,
}

impl WorldState {
    /// Fresh world: part stock at each part's reorder target, a small
    /// finished-goods buffer per product, no open documents.
    pub fn bootstrap(catalog: &Catalog, start: DateTime<Utc>) -> Self {
        let part_stock =
            catalog.parts.iter().map(|p| (p.id, p.reorder_target)).collect::<BTreeMap<_, _>>();
        let finished_goods =
            catalog.products.iter().map(|p| (p.id, 10)).collect::<BTreeMap<_, _>>();
        WorldState {
            clock: SimClock::starting_at(start),
            part_stock,
            finished_goods,
            open_orders: BTreeMap::new(),
            backorders: Vec::new(),
            jobs: Vec::new(),
            purchase_orders: Vec::new(),
            open_invoices: Vec::new(),
            cost_drift: BTreeMap::new(),
            last_drift_date: None,
            disruptions: Vec::new(),
            next_order_id: 0,
            next_job_id: 0,
            next_po_id: 0,
            next_invoice_id: 0,
        }
    }

    // ── Identifier allocation ─────────────────────────────────────────────

    pub fn alloc_order_id(&mut self) -> SalesOrderId {
        self.next_order_id += 1;
        SalesOrderId(self.next_order_id)
    }

    pub fn alloc_job_id(&mut self) -> ProductionJobId {
        self.next_job_id += 1;
        ProductionJobId(self.next_job_id)
    }

    pub fn alloc_po_id(&mut self) -> PurchaseOrderId {
        self.next_po_id += 1;
        PurchaseOrderId(self.next_po_id)
    }

    pub fn alloc_invoice_id(&mut self) -> InvoiceId {
        self.next_invoice_id += 1;
        InvoiceId(self.next_invoice_id)
    }

    // ── Inventory ─────────────────────────────────────────────────────────

    pub fn part_on_hand(&self, part_id: PartId) -> u32 {
        self.part_stock.get(&part_id).copied().unwrap_or(0)
    }

    pub fn product_on_hand(&self, product_id: ProductId) -> u32 {
        self.finished_goods.get(&product_id).copied().unwrap_or(0)
    }

    pub fn add_part_stock(&mut self, part_id: PartId, qty: u32) {
        *self.part_stock.entry(part_id).or_insert(0) += qty;
    }

    /// Decrement part stock, aborting on underflow: negative inventory is a
    /// programming defect, not a recoverable condition.
    pub fn consume_part_stock(&mut self, part_id: PartId, qty: u32) -> Result<(), EngineError> {
        let on_hand = self.part_stock.entry(part_id).or_insert(0);
        *on_hand = on_hand.checked_sub(qty).ok_or_else(|| {
            EngineError::Invariant(format!(
                "part {part_id:?} stock would go negative ({on_hand} - {qty})"
            ))
        })?;
        Ok(())
    }

    pub fn add_finished_goods(&mut self, product_id: ProductId, qty: u32) {
        *self.finished_goods.entry(product_id).or_insert(0) += qty;
    }

    pub fn ship_finished_goods(
        &mut self,
        product_id: ProductId,
        qty: u32,
    ) -> Result<u32, EngineError> {
        let on_hand = self.finished_goods.entry(product_id).or_insert(0);
        *on_hand = on_hand.checked_sub(qty).ok_or_else(|| {
            EngineError::Invariant(format!(
                "finished goods {product_id:?} would go negative ({on_hand} - {qty})"
            ))
        })?;
        Ok(*on_hand)
    }

    // ── Derived positions ─────────────────────────────────────────────────

    /// Quantity already ordered but not yet delivered or rejected.
    pub fn qty_on_order(&self, part_id: PartId) -> u32 {
        self.purchase_orders
            .iter()
            .filter(|po| po.part_id == part_id)
            .map(|po| po.qty_outstanding())
            .sum()
    }

    /// Part demand committed to production jobs that have not yet consumed
    /// their materials.
    pub fn qty_committed(&self, part_id: PartId, catalog: &Catalog) -> u32 {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Created)
            .filter_map(|job| {
                let product = catalog.product(job.product_id)?;
                let per_unit = product
                    .bom
                    .iter()
                    .find(|line| line.part_id == part_id)
                    .map(|line| line.qty_per_unit)?;
                Some(per_unit * job.qty)
            })
            .sum()
    }

    /// Open (not yet fully shipped) backorder demand for a product.
    pub fn backorder_demand(&self, product_id: ProductId) -> u32 {
        self.backorders
            .iter()
            .filter(|b| b.product_id == product_id)
            .map(|b| b.qty_outstanding)
            .sum()
    }

    /// Quantity already promised by open production jobs for a product.
    pub fn pending_production(&self, product_id: ProductId) -> u32 {
        self.jobs.iter().filter(|j| j.product_id == product_id).map(|j| j.qty).sum()
    }
}
