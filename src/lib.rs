//! Discrete-time supply-chain simulator for a single-product drone factory.
//!
//! The engine advances an hourly clock over a seeded world (suppliers,
//! parts, a product BOM, customers) and emits a typed event stream: sales
//! orders, shipments, backorders, production jobs, purchase orders,
//! receipts, invoices. Seasonality, scheduled disruptions, commodity cost
//! drift and deliberate output corruption shape the stream into realistic
//! historical datasets; checkpointing lets a run stop and resume with a
//! byte-identical continuation.

pub mod config;
pub mod corruption;
pub mod costs;
pub mod demand;
pub mod disruption;
pub mod error;
pub mod events;
pub mod finance;
pub mod master;
pub mod persistence;
pub mod procurement;
pub mod production;
pub mod seasonality;
pub mod simulation;
pub mod sink;
pub mod state;
pub mod types;
