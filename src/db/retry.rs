//! Retry policy for statements whose connection was severed mid-statement.
//!
//! After a reconnect, a statement that still fails with "lost connection
//! during query" is re-executed on the same cursor until it succeeds, a
//! different fault occurs, or the policy's attempt bound or deadline is hit.
//! Between attempts the loop backs off exponentially.

use crate::db::driver::Cursor;
use crate::error::{DbError, DbResult, FaultClass};
use crate::models::QueryParam;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Default number of re-executions before giving up.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 10;
/// Default delay before the first re-execution.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
/// Default ceiling for the backoff delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// How long the handle keeps re-executing a statement while the server is
/// temporarily unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum re-executions. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Overall time budget for the loop. `None` means no deadline.
    pub deadline: Option<Duration>,
    /// Delay before the first re-execution; doubles on every attempt.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Retry until the fault clears or changes, with no bound and no deadline.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
            ..Self::default()
        }
    }

    /// Set the attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the overall deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the backoff delays.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Disable the delay between attempts.
    pub fn without_backoff(self) -> Self {
        self.with_backoff(Duration::ZERO, Duration::ZERO)
    }

    /// Whether the policy ever gives up.
    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some() || self.deadline.is_some()
    }

    /// Delay before the given re-execution (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Whether another attempt is allowed after `attempts` re-executions.
    fn allows(&self, attempts: u32, elapsed: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return false;
        }
        if self.deadline.is_some_and(|deadline| elapsed >= deadline) {
            return false;
        }
        true
    }

    /// Remaining time budget, if a deadline is set.
    fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_sub(elapsed))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_RETRY_ATTEMPTS),
            deadline: None,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

/// Re-execute `sql` on `cursor` while it keeps failing with
/// server-temporarily-unavailable.
///
/// Never reconnects. Returns the first non-retryable fault unchanged, or
/// [`DbError::RetriesExhausted`] once the policy gives up.
pub(crate) async fn execute_with_retry<C: Cursor>(
    cursor: &mut C,
    sql: &str,
    params: &[QueryParam],
    policy: &RetryPolicy,
    database: &str,
    last_fault: DbError,
) -> DbResult<()> {
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_message = last_fault.to_string();

    loop {
        let elapsed = started.elapsed();
        if !policy.allows(attempts, elapsed) {
            error!(
                database = %database,
                attempts = attempts,
                elapsed = ?elapsed,
                "Giving up on statement, server still unavailable"
            );
            return Err(DbError::retries_exhausted(attempts, last_message));
        }

        let mut delay = policy.backoff_for(attempts + 1);
        if let Some(remaining) = policy.remaining(elapsed) {
            delay = delay.min(remaining);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        attempts += 1;
        match cursor.execute(sql, params).await {
            Ok(()) => {
                info!(
                    database = %database,
                    attempts = attempts,
                    "Statement succeeded after retrying"
                );
                return Ok(());
            }
            Err(fault) => {
                let err = DbError::from(fault);
                if err.class() == FaultClass::ServerUnavailable {
                    warn!(
                        database = %database,
                        attempt = attempts,
                        error = %err,
                        "Server lost while retrying execution"
                    );
                    last_message = err.to_string();
                } else {
                    error!(
                        database = %database,
                        attempt = attempts,
                        class = %err.class(),
                        error = %err,
                        "Retrying execution failed"
                    );
                    return Err(err);
                }
            }
        }
    }
}
