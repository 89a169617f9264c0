// Panic isolation for worker safety — a JobKind panic must not take down
// the worker task (spec §5 robustness requirement).

use std::panic::AssertUnwindSafe;
use tracing::error;

/// Result of a panic-guarded execution.
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    Success(T),
    Panicked(String),
}

fn panic_message(panic_info: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a future on its own task so a panic inside it is caught by the
/// `JoinHandle` rather than unwinding into the worker loop.
pub async fn execute_guarded_async<F, T>(future: F) -> PanicGuardResult<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn(async move { AssertUnwindSafe(future).await }).await {
        Ok(value) => PanicGuardResult::Success(value),
        Err(join_err) => {
            let msg = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                "task cancelled".to_string()
            };
            error!(panic_msg = %msg, "worker task panicked");
            PanicGuardResult::Panicked(msg)
        }
    }
}
