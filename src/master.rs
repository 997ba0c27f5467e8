//! Immutable master data: the supplier, part, product and customer catalogs.
//!
//! The engine treats everything here as read-only reference data; the
//! mutable counterpart (stock levels, drift, open documents) lives in
//! [`crate::state::WorldState`].

use serde::Serialize;

use crate::types::{Cents, Country, CustomerId, PartId, ProductId, SupplierId};

#[derive(Debug, Clone, Serialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: &'static str,
    pub country: Country,
    /// 0–1; drives lead-time spread, partial shipments and reject rates.
    pub reliability_score: f64,
    /// Multiplier on the part's drifted standard cost.
    pub price_multiplier: f64,
    pub preferred: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub id: PartId,
    pub code: &'static str,
    pub name: &'static str,
    pub standard_cost: Cents,
    pub reorder_point: u32,
    /// Level a replenishment order aims to restore the position to.
    pub reorder_target: u32,
    pub qualified_suppliers: Vec<SupplierId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BomLine {
    pub part_id: PartId,
    pub qty_per_unit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub code: &'static str,
    pub name: &'static str,
    pub list_price: Cents,
    pub bom: Vec<BomLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContractTier {
    Tier1,
    Tier2,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: &'static str,
    pub tier: ContractTier,
    pub payment_terms_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub suppliers: Vec<Supplier>,
    pub parts: Vec<Part>,
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
}

impl Catalog {
    pub fn supplier(&self, id: SupplierId) -> Option<&Supplier> {
        self.suppliers.iter().find(|s| s.id == id)
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    /// Canonical single-product drone factory.
    ///
    /// One finished product, six purchased parts, eight suppliers across the
    /// four seasonal-calendar countries, eight customers in two contract
    /// tiers.
    pub fn canonical() -> Self {
        Catalog {
            suppliers: vec![
                Supplier { id: SupplierId(1), name: "Shenzhen Precision Motors",  country: Country::China,   reliability_score: 0.82, price_multiplier: 0.90, preferred: false },
                Supplier { id: SupplierId(2), name: "Dongguan Composite Works",   country: Country::China,   reliability_score: 0.76, price_multiplier: 0.85, preferred: false },
                Supplier { id: SupplierId(3), name: "Taipei Flight Controllers",  country: Country::Taiwan,  reliability_score: 0.91, price_multiplier: 1.05, preferred: true },
                Supplier { id: SupplierId(4), name: "Hsinchu Cell Systems",       country: Country::Taiwan,  reliability_score: 0.88, price_multiplier: 1.00, preferred: false },
                Supplier { id: SupplierId(5), name: "Bayern Optik GmbH",          country: Country::Germany, reliability_score: 0.95, price_multiplier: 1.25, preferred: true },
                Supplier { id: SupplierId(6), name: "Rheinland Antriebstechnik",  country: Country::Germany, reliability_score: 0.93, price_multiplier: 1.20, preferred: false },
                Supplier { id: SupplierId(7), name: "Mojave Airframe Supply",     country: Country::Usa,     reliability_score: 0.89, price_multiplier: 1.15, preferred: false },
                Supplier { id: SupplierId(8), name: "Great Lakes Avionics",       country: Country::Usa,     reliability_score: 0.92, price_multiplier: 1.18, preferred: true },
            ],
            parts: vec![
                Part {
                    id: PartId(1), code: "PRT-MTR", name: "Brushless motor",
                    standard_cost: 1_250, reorder_point: 80, reorder_target: 240,
                    qualified_suppliers: vec![SupplierId(1), SupplierId(6)],
                },
                Part {
                    id: PartId(2), code: "PRT-FRM", name: "Carbon frame kit",
                    standard_cost: 3_400, reorder_point: 30, reorder_target: 90,
                    qualified_suppliers: vec![SupplierId(2), SupplierId(7)],
                },
                Part {
                    id: PartId(3), code: "PRT-FCU", name: "Flight control unit",
                    standard_cost: 8_900, reorder_point: 25, reorder_target: 75,
                    qualified_suppliers: vec![SupplierId(3), SupplierId(8)],
                },
                Part {
                    id: PartId(4), code: "PRT-BAT", name: "Battery pack",
                    standard_cost: 4_600, reorder_point: 40, reorder_target: 120,
                    qualified_suppliers: vec![SupplierId(4)],
                },
                Part {
                    id: PartId(5), code: "PRT-CAM", name: "Gimbal camera",
                    standard_cost: 12_500, reorder_point: 20, reorder_target: 60,
                    qualified_suppliers: vec![SupplierId(5), SupplierId(3)],
                },
                Part {
                    id: PartId(6), code: "PRT-PRP", name: "Propeller set",
                    standard_cost: 450, reorder_point: 100, reorder_target: 300,
                    qualified_suppliers: vec![SupplierId(1), SupplierId(2), SupplierId(7)],
                },
            ],
            products: vec![Product {
                id: ProductId(1),
                code: "DRN-X1",
                name: "Surveyor X1 quadcopter",
                list_price: 129_900,
                bom: vec![
                    BomLine { part_id: PartId(1), qty_per_unit: 4 },
                    BomLine { part_id: PartId(2), qty_per_unit: 1 },
                    BomLine { part_id: PartId(3), qty_per_unit: 1 },
                    BomLine { part_id: PartId(4), qty_per_unit: 2 },
                    BomLine { part_id: PartId(5), qty_per_unit: 1 },
                    BomLine { part_id: PartId(6), qty_per_unit: 4 },
                ],
            }],
            customers: vec![
                Customer { id: CustomerId(1), name: "Aerial Survey Partners",  tier: ContractTier::Tier1, payment_terms_days: 30 },
                Customer { id: CustomerId(2), name: "Northfield Agriculture",  tier: ContractTier::Tier1, payment_terms_days: 45 },
                Customer { id: CustomerId(3), name: "Coastline Inspection Co", tier: ContractTier::Tier1, payment_terms_days: 30 },
                Customer { id: CustomerId(4), name: "Metro Film Collective",   tier: ContractTier::Tier2, payment_terms_days: 60 },
                Customer { id: CustomerId(5), name: "Ridgeline Mining Group",  tier: ContractTier::Tier2, payment_terms_days: 45 },
                Customer { id: CustomerId(6), name: "Harbor Logistics Labs",   tier: ContractTier::Tier2, payment_terms_days: 30 },
                Customer { id: CustomerId(7), name: "Open Range Energy",       tier: ContractTier::Tier2, payment_terms_days: 60 },
                Customer { id: CustomerId(8), name: "Summit Emergency Service", tier: ContractTier::Tier2, payment_terms_days: 15 },
            ],
        }
    }
}
