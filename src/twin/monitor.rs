use super::manager::DigitalTwinManager;
use super::types::{TwinStatus, TwinSummary};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Twin counts by status at one point in time
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub twin_count: usize,
    pub running: usize,
    pub paused: usize,
    pub errored: usize,
    pub terminated: usize,
    pub twins: Vec<TwinSummary>,
}

pub async fn collect_report(manager: &DigitalTwinManager) -> StatusReport {
    let twins = manager.list_twins().await;
    let count = |status: TwinStatus| twins.iter().filter(|t| t.status == status).count();

    StatusReport {
        twin_count: twins.len(),
        running: count(TwinStatus::Running),
        paused: count(TwinStatus::Paused),
        errored: count(TwinStatus::Error),
        terminated: count(TwinStatus::Terminated),
        twins,
    }
}

/// Periodically log a status report of every twin
///
/// Runs until the task is aborted. Twins in `error` are logged at warn level
/// on every tick so a failed twin is not missed.
pub async fn run_status_reporter(manager: Arc<DigitalTwinManager>, interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let report = collect_report(&manager).await;
        if report.twin_count == 0 {
            debug!("No digital twins registered");
            continue;
        }

        info!(
            twins = report.twin_count,
            running = report.running,
            paused = report.paused,
            errored = report.errored,
            terminated = report.terminated,
            "Digital twin status"
        );

        for twin in report.twins.iter().filter(|t| t.status == TwinStatus::Error) {
            warn!(twin_id = %twin.id, name = %twin.name, "Digital twin in error state");
        }
    }
}
