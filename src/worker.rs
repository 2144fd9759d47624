use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::state::Dashboard;

/// Refreshes the warm queries of whichever network is active at each tick.
/// Returns how many of them failed.
pub async fn refresh_once(dashboard: &Dashboard) -> usize {
    let network = dashboard.active_network().await;
    let mut failed = 0;
    for kind in Dashboard::warm_queries() {
        if let Err(e) = dashboard.refresh(network, kind.clone()).await {
            warn!("[Worker] Failed to refresh {:?} on {}: {}", kind, network, e);
            failed += 1;
        }
    }
    if failed == 0 {
        debug!("[Worker] {} queries are fresh.", network);
    }
    failed
}

pub fn spawn_worker(dashboard: Arc<Dashboard>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        info!("[Worker] Refreshing every {}s.", every.as_secs());
        loop {
            interval.tick().await;
            refresh_once(&dashboard).await;
        }
    });
}
