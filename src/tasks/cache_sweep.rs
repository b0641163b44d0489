use crate::aggregator::Aggregator;
use log::info;
use std::time::Duration as StdDuration;
use tokio::time::interval;

const SWEEP_INTERVAL_SECONDS: u64 = 60; // Sweep every 60 seconds

/// Periodic upkeep for the counts cache: entries that expired without being
/// read again are actually evicted here, keeping the cache's footprint and
/// entry count honest between bursts of traffic.
pub async fn counts_cache_sweep_task(aggregator: Aggregator) {
    info!("Starting background task for counts cache maintenance...");
    let mut interval = interval(StdDuration::from_secs(SWEEP_INTERVAL_SECONDS));

    loop {
        interval.tick().await; // Wait for the next interval tick
        aggregator.run_pending_maintenance();
    }
}
