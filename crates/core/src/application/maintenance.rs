// Maintenance scheduler — periodic interval loop plus a manual trigger for
// the `database_maintenance` StepManager / admin surface. Not itself a
// JobKind: the spec treats DB maintenance's config contract as a job kind
// (`database_maintenance_operation`), but the *scheduling* of routine
// VACUUM/GC sweeps is ambient housekeeping, not job-queue traffic.

use crate::error::Result;
use crate::port::{Maintenance, MaintenanceConfig, MaintenanceStats};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    config: MaintenanceConfig,
    interval_hours: u64,
}

impl MaintenanceScheduler {
    pub fn new(maintenance: Arc<dyn Maintenance>, config: MaintenanceConfig, interval_hours: u64) -> Self {
        Self {
            maintenance,
            config,
            interval_hours: interval_hours.max(1),
        }
    }

    /// Runs forever, invoking `run_full_maintenance` on a fixed interval.
    /// Intended to be spawned as its own task by the composition root.
    pub async fn run(&self) {
        let period = Duration::from_secs(self.interval_hours * 3600);
        info!(interval_hours = self.interval_hours, "maintenance scheduler starting");
        loop {
            tokio::time::sleep(period).await;
            if let Err(e) = self.trigger().await {
                error!(error = %e, "scheduled maintenance run failed");
            }
        }
    }

    /// Runs one maintenance pass immediately (used by the admin surface's
    /// manual-trigger endpoint).
    pub async fn trigger(&self) -> Result<MaintenanceStats> {
        self.maintenance.run_full_maintenance(&self.config).await
    }
}
