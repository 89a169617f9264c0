// Worker constants
use std::time::Duration;

/// Sleep duration when no jobs are available.
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a worker error before retry.
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default message visibility timeout (spec §4.2).
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default max deliveries before dead-lettering (spec §4.2).
pub const DEFAULT_MAX_DELIVERIES: i64 = 5;

/// Completion probe grace period (spec §4.6 step 10).
pub const COMPLETION_PROBE_GRACE: Duration = Duration::from_secs(5);

/// Stale-job timeout enforced by the completion probe (spec §4.7 step 2).
pub const STALE_JOB_TIMEOUT_MS: i64 = 10 * 60 * 1000;

/// Orchestrator poll tick while waiting on children (spec §4.4).
pub const ORCHESTRATOR_POLL_TICK: Duration = Duration::from_secs(5);

/// Orchestrator wait-for-children timeout (spec §4.4).
pub const ORCHESTRATOR_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default progress-persistence batch size (spec §4.6, optional batching).
pub const DEFAULT_PROGRESS_BATCH_SIZE: usize = 10;
