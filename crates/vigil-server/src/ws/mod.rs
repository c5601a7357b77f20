//! Live dashboard fan-out over WebSocket.
//!
//! The [`BroadcastHub`] owns the set of live connections; the axum upgrade
//! handler registers each socket and forwards its outbound channel, and a
//! supervised heartbeat task keeps connections alive.

mod handler;
mod heartbeat;
mod hub;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use hub::BroadcastHub;
