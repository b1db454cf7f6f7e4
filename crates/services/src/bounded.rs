//! Time limits around datastore calls.
//!
//! Dashboard and health routes prefer a partial answer to a hung request:
//! each call gets its own deadline, and a miss degrades that one figure.

use std::fmt::Display;
use std::future::IntoFuture;
use std::time::{Duration, Instant};

use tracing::warn;

/// Outcome of a time-limited call.
#[derive(Debug)]
pub enum Bounded<T> {
    Done(T),
    Failed(String),
    TimedOut,
}

impl<T> Bounded<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Bounded::Done(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Bounded::Done(_))
    }
}

pub async fn bounded<T, E, F>(label: &str, limit: Duration, fut: F) -> Bounded<T>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Bounded::Done(value),
        Ok(Err(e)) => {
            warn!(call = label, error = %e, "Datastore call failed");
            Bounded::Failed(e.to_string())
        }
        Err(_) => {
            warn!(call = label, limit_ms = limit.as_millis() as u64, "Datastore call timed out");
            Bounded::TimedOut
        }
    }
}

/// Wall-clock allowance shared by a sequence of checks.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    total: Duration,
}

impl Budget {
    pub fn new(total: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.elapsed())
    }

    pub fn exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Deadline for the next call: the per-call cap, or whatever budget
    /// is left if that is smaller.
    pub fn slice(&self, per_call: Duration) -> Duration {
        per_call.min(self.remaining())
    }
}
