//! Bounded polling
//!
//! A single primitive shared by activation waiting and reachability checks:
//! call a check every `period` until it reports success, fails, or the
//! policy's budget (total time, number of checks, or both) runs out.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Budget of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Overall time budget, if any
    pub timeout: Option<Duration>,
    /// Delay between two checks
    pub period: Duration,
    /// Maximum number of checks, if any
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Poll every `period` for at most `timeout`
    pub fn new(timeout: Duration, period: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            period,
            max_attempts: None,
        }
    }

    /// Check exactly up to `attempts` times, `period` apart, however long
    /// each check takes
    pub fn attempts(attempts: u32, period: Duration) -> Self {
        Self {
            timeout: None,
            period,
            max_attempts: Some(attempts),
        }
    }

    fn attempts_exhausted(&self, made: u32) -> bool {
        self.max_attempts.is_some_and(|max| made >= max)
    }
}

/// Poll `check` until it returns `Ok(true)` or the policy's budget runs out.
///
/// Returns `Ok(true)` on success and `Ok(false)` once the time budget elapses
/// or the attempt budget is used up. An `Err` from `check` is the
/// early-failure signal: it is returned immediately without waiting out the
/// rest of the budget.
pub async fn wait_until<F, Fut>(policy: PollPolicy, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = policy.timeout.map(|t| Instant::now() + t);
    let timed_out = || deadline.is_some_and(|d| Instant::now() >= d);
    let mut made = 0u32;

    while !timed_out() && !policy.attempts_exhausted(made) {
        made += 1;
        if check().await? {
            return Ok(true);
        }
        // No point sleeping after the last allowed check
        if policy.attempts_exhausted(made) {
            break;
        }
        tokio::time::sleep(policy.period).await;
    }

    log::debug!("Wait gave up after {} check(s)", made);
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy() -> PollPolicy {
        PollPolicy::new(Duration::from_secs(20), Duration::from_millis(250))
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let done = wait_until(policy(), || {
            calls.set(calls.get() + 1);
            async { anyhow::Ok(true) }
        })
        .await
        .unwrap();

        assert!(done);
        assert_eq!(calls.get(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_a_few_polls() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let done = wait_until(policy(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { anyhow::Ok(n == 4) }
        })
        .await
        .unwrap();

        assert!(done);
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_false() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let done = wait_until(policy(), || {
            calls.set(calls.get() + 1);
            async { anyhow::Ok(false) }
        })
        .await
        .unwrap();

        assert!(!done);
        assert!(start.elapsed() >= Duration::from_secs(20));
        // Checks at 0ms, 250ms, ..., 19750ms
        assert_eq!(calls.get(), 80);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stops_early() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let result = wait_until(policy(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 2 {
                    anyhow::bail!("gone");
                }
                Ok(false)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_checks() {
        let calls = Cell::new(0);
        let zero = PollPolicy::new(Duration::ZERO, Duration::from_millis(250));
        let done = wait_until(zero, || {
            calls.set(calls.get() + 1);
            async { anyhow::Ok(true) }
        })
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_counts_checks() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let done = wait_until(PollPolicy::attempts(3, Duration::from_secs(1)), || {
            calls.set(calls.get() + 1);
            async { anyhow::Ok(false) }
        })
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(calls.get(), 3);
        // Two gaps between three checks, no trailing sleep
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_survives_slow_checks() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let done = wait_until(PollPolicy::attempts(3, Duration::from_secs(1)), || {
            calls.set(calls.get() + 1);
            async {
                // A check hanging until its own timeout
                tokio::time::sleep(Duration::from_secs(8)).await;
                anyhow::Ok(false)
            }
        })
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(26));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_success_on_last_check() {
        let calls = Cell::new(0u32);
        let done = wait_until(PollPolicy::attempts(3, Duration::from_secs(1)), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { anyhow::Ok(n == 3) }
        })
        .await
        .unwrap();

        assert!(done);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_never_checks() {
        let calls = Cell::new(0u32);
        let done = wait_until(PollPolicy::attempts(0, Duration::from_secs(1)), || {
            calls.set(calls.get() + 1);
            async { anyhow::Ok(true) }
        })
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(calls.get(), 0);
    }
}
