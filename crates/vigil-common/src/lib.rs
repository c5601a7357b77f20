//! Shared types for the vigil alerting core.
//!
//! Everything that crosses a crate boundary lives here: the detection
//! event emitted by the (external) camera/AI pipeline, the push payload,
//! and the per-device delivery result types.

pub mod id;
pub mod types;
