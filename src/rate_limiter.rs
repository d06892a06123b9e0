//! A process-wide pacing gate for script invocations.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimiterError {
    #[error("rate limit must admit at least one operation per second")]
    ZeroRate,
}

/// Admits at most one caller per period.
///
/// A timer task places one token in a single-slot channel, waits until a
/// caller has taken it, then waits a full period before placing the next.
/// Two admissions are therefore always at least one period apart and an idle
/// limiter never holds more than one token. Admission order among waiting
/// callers is unspecified.
#[derive(Debug)]
pub struct RateLimiter {
    tokens: Mutex<mpsc::Receiver<()>>,
    period: Duration,
}

impl RateLimiter {
    /// Creates a limiter admitting `per_second` callers per second and spawns
    /// its timer task. Must be called from within a Tokio runtime.
    ///
    /// The first token becomes available one period after construction.
    pub fn new(per_second: u32) -> Result<Self, RateLimiterError> {
        if per_second == 0 {
            return Err(RateLimiterError::ZeroRate);
        }
        let period = Duration::from_secs(1) / per_second;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(run_timer(tx, period));
        debug!(?period, "Rate limiter started");
        Ok(Self {
            tokens: Mutex::new(rx),
            period,
        })
    }

    /// The minimum interval between two admitted callers.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits until a token is available and consumes it.
    pub async fn acquire(&self) {
        if self.tokens.lock().await.recv().await.is_none() {
            // Only reachable if the timer task died, e.g. while the runtime
            // is shutting down.
            warn!("Rate limiter timer is gone; admitting caller without pacing");
        }
    }
}

async fn run_timer(tx: mpsc::Sender<()>, period: Duration) {
    // `reserve` resolves once the previous token has been taken.
    while let Ok(slot) = tx.reserve().await {
        tokio::time::sleep(period).await;
        slot.send(());
    }
    debug!("Rate limiter dropped, stopping timer task");
}
