//! Composition root for the vigil alerting core.
//!
//! Wires storage, rule matching, cooldowns, and the delivery surfaces
//! into the `evaluate_and_dispatch` pipeline, and exposes the thin HTTP/WS
//! surface the (external) dashboard and ingestion layers talk to.

pub mod api;
pub mod app;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod pipeline;
pub mod state;
pub mod ws;

#[cfg(test)]
mod tests;
