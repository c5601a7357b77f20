//! HTTP handlers. Thin wrappers over the pipeline and storage; all
//! alerting semantics live in the core crates.

pub mod error;
pub mod events;
pub mod health;
pub mod notifications;
pub mod thumbnail;
