//! civic-core library.
//!
//! Proposals and comments stored redundantly across several views, each
//! keyed for one read pattern, with every write fanned out to all of them.
//!
//! Layers, leaves first: [`model`] records, the [`db`] session over SQLite,
//! the [`store`] fan-out adapter, the [`service`] lifecycles, and the
//! [`api`] request layer. [`consistency`] checks and repairs the views.
//!
//! # Conventions
//!
//! - **Errors**: library code returns [`error::CivicError`]; setup and
//!   configuration use `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod api;
pub mod config;
pub mod consistency;
pub mod db;
pub mod error;
pub mod model;
pub mod service;
pub mod store;

pub use service::Civic;
