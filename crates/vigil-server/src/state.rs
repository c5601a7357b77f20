use std::sync::Arc;

use vigil_storage::AlertStore;

use crate::config::ServerConfig;
use crate::pipeline::AlertPipeline;
use crate::ws::BroadcastHub;

/// Shared handles injected into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn AlertStore>,
    pub hub: Arc<BroadcastHub>,
    pub pipeline: Arc<AlertPipeline>,
}
