use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::BroadcastHub;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawns the heartbeat task that pings every dashboard connection on a
/// fixed interval so intermediaries keep idle sockets open. Abort the
/// returned handle on shutdown.
pub fn start_heartbeat(hub: Arc<BroadcastHub>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            hub.ping_all().await;
        }
    })
}
