use chrono::Duration;
use log::*;
use print_ledger_engine::{
    events::EventProducers,
    ArtifactStore,
    JobFlowApi,
    LedgerConfig,
    PickupApi,
    SqliteDatabase,
};

const FALLBACK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub codes_purged: u64,
    pub artifacts_released: usize,
}

/// One pass of housekeeping. Failures are logged and the pass carries on, so that one failing task does not starve
/// the other.
pub async fn run_maintenance_pass<A: ArtifactStore>(
    pickup: &PickupApi<SqliteDatabase>,
    jobs: &JobFlowApi<SqliteDatabase, A>,
    artifact_retention: Duration,
) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();
    match pickup.purge_expired_codes().await {
        Ok(count) => report.codes_purged = count,
        Err(e) => error!("🕰️ Could not purge expired pickup codes. {e}"),
    }
    match jobs.sweep_stale_artifacts(artifact_retention).await {
        Ok(released) => report.artifacts_released = released.len(),
        Err(e) => error!("🕰️ Could not sweep stale artifacts. {e}"),
    }
    report
}

/// Runs maintenance passes on the configured interval until interrupted, or once if `once` is set.
pub async fn run_maintenance_worker<A: ArtifactStore>(
    db: SqliteDatabase,
    artifacts: A,
    config: &LedgerConfig,
    once: bool,
) -> anyhow::Result<()> {
    let producers = EventProducers::default();
    let pickup = PickupApi::new(db.clone(), config.fees, config.pickup_code_ttl, producers.clone());
    let jobs = JobFlowApi::new(db, artifacts, config.pricing, producers);
    if once {
        let report = run_maintenance_pass(&pickup, &jobs, config.artifact_retention).await;
        info!("🕰️ {} pickup codes purged, {} artifacts released", report.codes_purged, report.artifacts_released);
        return Ok(());
    }
    let period = config.maintenance_interval.to_std().unwrap_or(FALLBACK_INTERVAL);
    let mut timer = tokio::time::interval(period);
    info!("🕰️ Maintenance worker started. Running every {}s", period.as_secs());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🕰️ Maintenance worker stopping");
                break;
            },
            _ = timer.tick() => {
                debug!("🕰️ Running maintenance");
                let report = run_maintenance_pass(&pickup, &jobs, config.artifact_retention).await;
                if report != MaintenanceReport::default() {
                    info!(
                        "🕰️ {} pickup codes purged, {} artifacts released",
                        report.codes_purged, report.artifacts_released
                    );
                }
            },
        }
    }
    Ok(())
}
