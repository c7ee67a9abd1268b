//! Core rate limiter implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::info::RateLimitInfo;
use super::window::ClientWindow;
use crate::error::{Error, Result};

/// Configuration for a rate limiter. Fixed for the limiter's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Maximum requests admitted per window per client
    pub limit: u32,
    /// Length of a fixed window
    pub window: Duration,
    /// How often idle clients are reclaimed, and how long a client must be
    /// idle to be reclaimed
    pub cleanup_interval: Duration,
}

impl LimiterConfig {
    /// Create a configuration with `cleanup_interval` set to twice the window.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Config("rate limit must be at least 1".to_string()));
        }
        if window.is_zero() {
            return Err(Error::Config("rate limit window must be non-zero".to_string()));
        }

        Ok(Self {
            limit,
            window,
            cleanup_interval: window.saturating_mul(2),
        })
    }

    /// Override the derived cleanup interval.
    pub fn with_cleanup_interval(mut self, cleanup_interval: Duration) -> Result<Self> {
        if cleanup_interval.is_zero() {
            return Err(Error::Config("cleanup interval must be non-zero".to_string()));
        }
        self.cleanup_interval = cleanup_interval;
        Ok(self)
    }
}

/// Point-in-time snapshot of a limiter, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Clients currently holding window state
    pub active_clients: usize,
    /// Requests admitted per window per client
    pub limit: u32,
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Reclamation cadence
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

/// State shared between the limiter handle and its cleanup task.
struct Shared {
    config: LimiterConfig,
    /// Window state indexed by client identifier
    windows: RwLock<HashMap<String, ClientWindow>>,
}

impl Shared {
    /// Remove every client idle for longer than the cleanup interval.
    fn purge_stale(&self, now: Instant) -> usize {
        let max_idle = self.config.cleanup_interval;
        let mut windows = self.windows.write();

        let before = windows.len();
        windows.retain(|_, window| !window.is_stale(max_idle, now));
        let removed = before - windows.len();

        debug!(
            removed = removed,
            active_clients = windows.len(),
            "Reclaimed idle rate limit windows"
        );
        removed
    }
}

/// A per-client fixed-window rate limiter.
///
/// Each client identifier gets `limit` requests per `window`. State is created
/// on a client's first request and reclaimed by a background task once the
/// client has been idle for longer than the cleanup interval.
///
/// The limiter is safe to share across tasks and threads (wrap it in an
/// `Arc`). Instances are fully independent of each other.
pub struct RateLimiter {
    shared: Arc<Shared>,
    /// Fires the cleanup task's shutdown; `None` once stopped
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    /// Cleanup task, taken when it is joined
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.shared.config)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window` per client.
    ///
    /// Must be called from within a Tokio runtime, which hosts the cleanup
    /// task.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        Self::with_config(LimiterConfig::new(limit, window)?)
    }

    /// Create a limiter from an explicit configuration.
    pub fn with_config(config: LimiterConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::RateLimit(format!("rate limiter requires a Tokio runtime: {}", e))
        })?;

        let shared = Arc::new(Shared {
            config,
            windows: RwLock::new(HashMap::new()),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let cleanup_task = runtime.spawn(run_cleanup(Arc::clone(&shared), shutdown_rx));

        info!(
            limit = config.limit,
            window = ?config.window,
            cleanup_interval = ?config.cleanup_interval,
            "Rate limiter started"
        );

        Ok(Self {
            shared,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            cleanup_task: Mutex::new(Some(cleanup_task)),
        })
    }

    /// The limiter's configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.shared.config
    }

    /// Record a request from `identifier` and decide whether it is admitted.
    ///
    /// Returns `true` if admitted, `false` if the client's quota for the
    /// current window is used up.
    pub fn check_rate_limit(&self, identifier: &str) -> bool {
        let LimiterConfig { limit, window, .. } = self.shared.config;

        // Lookup, decision and write-back all happen under this one guard.
        // Releasing it in between would let two callers spend the same unit.
        let mut windows = self.shared.windows.write();
        let now = Instant::now();

        let allowed = match windows.get_mut(identifier) {
            Some(client) => client.admit(limit, window, now),
            None => {
                debug!(
                    client = %identifier,
                    limit = limit,
                    window = ?window,
                    "Opening rate limit window for new client"
                );
                windows.insert(identifier.to_owned(), ClientWindow::open(limit, window, now));
                true
            }
        };
        drop(windows);

        trace!(client = %identifier, allowed = allowed, "Checked rate limit");
        if !allowed {
            debug!(client = %identifier, "Rate limit exceeded");
        }

        allowed
    }

    /// Report the quota of `identifier` without consuming any of it.
    ///
    /// Clients without state, or whose window has ended, are reported as a
    /// fresh, full window starting now.
    pub fn get_info(&self, identifier: &str) -> RateLimitInfo {
        let LimiterConfig { limit, window, .. } = self.shared.config;

        let windows = self.shared.windows.read();
        let now = Instant::now();

        match windows.get(identifier) {
            Some(client) if !client.is_expired(now) => RateLimitInfo {
                limit,
                remaining: client.remaining(),
                reset_at: client.reset_at(),
            },
            _ => RateLimitInfo {
                limit,
                remaining: limit,
                reset_at: now + window,
            },
        }
    }

    /// Snapshot of the limiter's size and configuration.
    pub fn stats(&self) -> LimiterStats {
        let config = &self.shared.config;
        let windows = self.shared.windows.read();

        LimiterStats {
            active_clients: windows.len(),
            limit: config.limit,
            window: config.window,
            cleanup_interval: config.cleanup_interval,
        }
    }

    /// Run one reclamation sweep now. Returns the number of clients removed.
    pub fn purge_stale(&self) -> usize {
        self.shared.purge_stale(Instant::now())
    }

    /// Signal the cleanup task to stop.
    ///
    /// Idempotent and non-blocking. Checks and queries keep working afterwards;
    /// only reclamation ends.
    pub fn stop(&self) {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().take() {
            // The task may already be gone if its runtime shut down.
            let _ = shutdown_tx.send(());
            info!("Rate limiter cleanup stopping");
        }
    }

    /// Stop the cleanup task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.stop();

        let cleanup_task = self.cleanup_task.lock().take();
        if let Some(cleanup_task) = cleanup_task {
            if let Err(e) = cleanup_task.await {
                debug!(error = %e, "Rate limiter cleanup task ended abnormally");
            }
            info!("Rate limiter cleanup stopped");
        }
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.shutdown_tx.lock().is_none()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sweep idle clients every cleanup interval until shutdown fires.
async fn run_cleanup(shared: Arc<Shared>, mut shutdown_rx: oneshot::Receiver<()>) {
    let period = shared.config.cleanup_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // A dropped sender also ends the loop.
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                shared.purge_stale(Instant::now());
            }
        }
    }

    debug!("Rate limiter cleanup task exited");
}
