//! Deadline-bounded retry and polling.
//!
//! Every upgrade step runs under a single [`StepDeadline`]. Transient errors
//! are retried at the polling interval until it expires; anything else ends
//! the step at once.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::canister::ModuleType;
use crate::config::PollingConfig;
use crate::error::{Result, UpgradeTimeoutError};

/// Time budget of one upgrade step.
#[derive(Debug, Clone, Copy)]
pub struct StepDeadline {
    started: Instant,
    deadline: Instant,
    interval: Duration,
}

impl StepDeadline {
    /// Starts the clock for a step.
    #[must_use]
    pub fn start(polling: &PollingConfig) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + polling.step_timeout,
            interval: polling.interval,
        }
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time since the step started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleeps for one polling interval, cut short by the deadline.
    async fn pause(&self) {
        tokio::time::sleep(self.interval.min(self.remaining())).await;
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the deadline passes.
///
/// When the deadline passes the last transient error is returned.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient one.
pub async fn retry_until<T, F, Fut>(deadline: &StepDeadline, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && !deadline.expired() => {
                debug!("{what} failed (attempt {attempt}), retrying: {e}");
            }
            Err(e) => return Err(e),
        }

        attempt += 1;
        deadline.pause().await;
    }
}

/// What a convergence poll waits for.
#[derive(Debug, Clone, Copy)]
pub struct Expectation<'a> {
    /// Module being observed.
    pub module: ModuleType,
    /// Name of the observed property.
    pub property: &'static str,
    /// Value the property must reach.
    pub expected: &'a str,
}

/// Probes until `matches` accepts an observation or the deadline passes.
///
/// Transient probe errors are retried. Returns the matching observation.
///
/// # Errors
///
/// Returns an [`UpgradeTimeoutError`] carrying the last observation once the
/// deadline passes, or the first non-transient probe error.
pub async fn poll_until<F, Fut, M>(
    deadline: &StepDeadline,
    expectation: Expectation<'_>,
    mut probe: F,
    matches: M,
) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
    M: Fn(&str) -> bool,
{
    let mut last_observed = None;

    loop {
        match probe().await {
            Ok(observed) if matches(&observed) => return Ok(observed),
            Ok(observed) => {
                trace!(
                    "{} {} is '{observed}', waiting for '{}'",
                    expectation.module, expectation.property, expectation.expected
                );
                last_observed = Some(observed);
            }
            Err(e) if e.is_retryable() => {
                debug!("Probing {} failed, retrying: {e}", expectation.module);
            }
            Err(e) => return Err(e),
        }

        if deadline.expired() {
            return Err(UpgradeTimeoutError {
                module: expectation.module,
                expectation: expectation.property,
                expected: expectation.expected.to_string(),
                last_observed,
                waited: deadline.elapsed(),
            }
            .into());
        }

        deadline.pause().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NetworkError, UpgradeOrdersError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn polling(interval_ms: u64, timeout_ms: u64) -> PollingConfig {
        PollingConfig::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    fn expectation(expected: &str) -> Expectation<'_> {
        Expectation {
            module: ModuleType::Ledger,
            property: "version",
            expected,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let deadline = StepDeadline::start(&polling(1, 1_000));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let value = retry_until(&deadline, "publish", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(UpgradeOrdersError::from(NetworkError::transport("reset")))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let deadline = StepDeadline::start(&polling(1, 1_000));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<()> = retry_until(&deadline, "propose", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(UpgradeOrdersError::from(NetworkError::Rejected {
                message: String::from("invalid proposal"),
            }))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_returns_matching_observation() {
        let deadline = StepDeadline::start(&polling(1, 1_000));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let observed = poll_until(
            &deadline,
            expectation("v2"),
            move || async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(String::from("v1")),
                    1 => Err(UpgradeOrdersError::from(NetworkError::invalid_response(
                        "restarting",
                    ))),
                    _ => Ok(String::from("v2")),
                }
            },
            |observed| observed == "v2",
        )
        .await
        .unwrap();

        assert_eq!(observed, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out_with_last_observation() {
        let deadline = StepDeadline::start(&polling(2, 20));

        let err = poll_until(
            &deadline,
            expectation("v2"),
            || async { Ok::<_, UpgradeOrdersError>(String::from("v1")) },
            |observed| observed == "v2",
        )
        .await
        .unwrap_err();

        match err {
            UpgradeOrdersError::Timeout(timeout) => {
                assert_eq!(timeout.module, ModuleType::Ledger);
                assert_eq!(timeout.last_observed.as_deref(), Some("v1"));
                assert!(timeout.waited >= Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {other}"),
        }
        assert!(deadline.expired());
    }
}
