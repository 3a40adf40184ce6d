//! Graceful shutdown: a shared flag plus in-flight request counter
//! installed against SIGTERM/SIGINT/SIGHUP. New `/generate-sql` calls are
//! refused once shutdown is requested; in-flight streams drain up to a
//! bounded grace period. Grounded on `fraiseql-server`'s
//! `operational::shutdown` module (spec §5 AMBIENT).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

#[derive(Clone)]
pub struct ShutdownHandler {
    shutdown_requested: Arc<AtomicBool>,
    in_flight_requests: Arc<AtomicU32>,
}

impl ShutdownHandler {
    pub fn new() -> Self {
        Self { shutdown_requested: Arc::new(AtomicBool::new(false)), in_flight_requests: Arc::new(AtomicU32::new(0)) }
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    pub fn increment_requests(&self) {
        self.in_flight_requests.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement_requests(&self) {
        self.in_flight_requests.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight_requests.load(Ordering::Acquire)
    }

    /// Waits until every in-flight request has drained or `grace_period`
    /// elapses, whichever comes first.
    pub async fn wait_for_requests(&self, grace_period: Duration) {
        let deadline = tokio::time::Instant::now() + grace_period;
        while self.in_flight_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// A request-scoped guard that decrements the in-flight counter on drop,
/// so early returns (validation failures, cancellation) still release it.
pub struct InFlightGuard(ShutdownHandler);

impl InFlightGuard {
    pub fn enter(handler: &ShutdownHandler) -> Self {
        handler.increment_requests();
        Self(handler.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.decrement_requests();
    }
}

/// Installs SIGTERM/SIGINT handlers that request shutdown, and a SIGHUP
/// handler that invokes `on_reload` to hot-swap configuration without a
/// restart (spec §6: "Configuration ... reloadable on SIGHUP").
pub fn install_signal_handlers<F>(handler: ShutdownHandler, on_reload: F)
where
    F: Fn() + Send + 'static,
{
    let shutdown = handler.clone();
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                return;
            },
        };
        sigterm.recv().await;
        tracing::info!("received SIGTERM, requesting graceful shutdown");
        shutdown.request_shutdown();
    });

    let shutdown = handler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, requesting graceful shutdown");
            shutdown.request_shutdown();
        }
    });

    tokio::spawn(async move {
        let mut sighup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGHUP handler");
                return;
            },
        };
        loop {
            sighup.recv().await;
            tracing::info!("received SIGHUP, reloading configuration");
            on_reload();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_in_flight_count_via_guard() {
        let handler = ShutdownHandler::new();
        assert_eq!(handler.in_flight_count(), 0);
        {
            let _guard = InFlightGuard::enter(&handler);
            assert_eq!(handler.in_flight_count(), 1);
        }
        assert_eq!(handler.in_flight_count(), 0);
    }

    #[test]
    fn shutdown_flag_toggles() {
        let handler = ShutdownHandler::new();
        assert!(!handler.is_shutdown_requested());
        handler.request_shutdown();
        assert!(handler.is_shutdown_requested());
    }
}
