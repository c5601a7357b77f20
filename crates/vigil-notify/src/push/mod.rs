//! Push provider implementations.
//!
//! One module per upstream service; both talk plain HTTPS via `reqwest`
//! and map provider responses onto [`vigil_common::types::DeliveryStatus`].

pub mod apns;
pub mod fcm;

pub use apns::{ApnsConfig, ApnsProvider};
pub use fcm::{FcmConfig, FcmProvider};
