//! Failed-PIN throttling.
//!
//! Counts PIN attempts per key (a mission, or a client address doing access
//! lookups) and locks the key out once the limit is reached. An attempt is
//! reserved before the PIN is compared, so a burst of concurrent guesses can
//! never exceed the limit.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::errors::AppError;

const LOCKOUT_MESSAGE: &str = "Too many incorrect PIN attempts. Try again later.";

#[derive(Debug, Clone)]
struct FailureWindow {
    failures: u32,
    /// Attempts reserved but not yet finished
    pending: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl FailureWindow {
    fn new(now: Instant) -> Self {
        Self {
            failures: 0,
            pending: 0,
            window_start: now,
            locked_until: None,
        }
    }

    fn is_idle(&self) -> bool {
        self.failures == 0 && self.pending == 0 && self.locked_until.is_none()
    }
}

/// How a reserved attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The PIN matched; past failures are forgotten.
    Accepted,
    /// The PIN was wrong.
    Rejected,
    /// No PIN was compared (missing PIN, unknown mission, other errors).
    Skipped,
}

/// Per-key PIN attempt tracker.
pub struct PinThrottle {
    max_failures: u32,
    lockout: Duration,
    windows: RwLock<HashMap<String, FailureWindow>>,
}

impl PinThrottle {
    /// `max_failures == 0` disables throttling.
    pub fn new(max_failures: u32, lockout: Duration) -> Self {
        Self {
            max_failures,
            lockout,
            windows: RwLock::new(HashMap::new()),
        }
    }

    fn enabled(&self) -> bool {
        self.max_failures > 0
    }

    /// Reserve one PIN attempt for the key.
    ///
    /// Fails while the key is locked out, or when failures plus attempts in
    /// flight already reach the limit. Every successful call must be paired
    /// with [`PinThrottle::finish_attempt`].
    pub async fn begin_attempt(&self, key: &str) -> Result<(), AppError> {
        if !self.enabled() {
            return Ok(());
        }

        let mut windows = self.windows.write().await;
        let now = Instant::now();
        let window = windows
            .entry(key.to_string())
            .or_insert_with(|| FailureWindow::new(now));

        if let Some(until) = window.locked_until {
            if until > now {
                return Err(AppError::TooManyAttempts {
                    message: LOCKOUT_MESSAGE.to_string(),
                    retry_after_secs: (until - now).as_secs().max(1),
                });
            }
        }

        // Expired lockouts and counting periods start over. Reservations from
        // requests that never finished are dropped along with them.
        if window.locked_until.is_some() || now.duration_since(window.window_start) >= self.lockout
        {
            *window = FailureWindow::new(now);
        }

        if window.failures + window.pending >= self.max_failures {
            return Err(AppError::TooManyAttempts {
                message: LOCKOUT_MESSAGE.to_string(),
                retry_after_secs: 1,
            });
        }

        window.pending += 1;
        Ok(())
    }

    /// Settle an attempt reserved by [`PinThrottle::begin_attempt`]. Returns
    /// true when this failure triggered a lockout.
    pub async fn finish_attempt(&self, key: &str, outcome: AttemptOutcome) -> bool {
        if !self.enabled() {
            return false;
        }

        let mut windows = self.windows.write().await;
        let Some(window) = windows.get_mut(key) else {
            return false;
        };
        window.pending = window.pending.saturating_sub(1);

        let mut locked = false;
        match outcome {
            AttemptOutcome::Accepted => {
                window.failures = 0;
                window.locked_until = None;
            }
            AttemptOutcome::Rejected => {
                window.failures += 1;
                if window.failures >= self.max_failures && window.locked_until.is_none() {
                    window.locked_until = Some(Instant::now() + self.lockout);
                    tracing::warn!(
                        key,
                        failures = window.failures,
                        "PIN attempts locked out for {:?}",
                        self.lockout
                    );
                    locked = true;
                }
            }
            AttemptOutcome::Skipped => {}
        }

        if window.is_idle() {
            windows.remove(key);
        }
        locked
    }

    /// Drop windows whose lockout and counting period have both passed.
    pub async fn prune(&self) {
        let now = Instant::now();
        let lockout = self.lockout;
        self.windows.write().await.retain(|_, w| {
            let locked = w.locked_until.is_some_and(|until| until > now);
            locked || now.duration_since(w.window_start) < lockout
        });
    }

    /// Periodically prune stale windows.
    pub fn start_prune_task(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                self.prune().await;
            }
        })
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// Throttle key for admin PIN attempts against a mission.
pub fn mission_key(mission_id: &str) -> String {
    format!("mission:{}", mission_id)
}

/// Throttle key for access-PIN lookups from a client address.
pub fn access_key(peer: IpAddr) -> String {
    format!("access:{}", peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn fail(throttle: &PinThrottle, key: &str) -> bool {
        throttle.begin_attempt(key).await.unwrap();
        throttle.finish_attempt(key, AttemptOutcome::Rejected).await
    }

    #[tokio::test]
    async fn test_locks_after_max_failures() {
        let throttle = PinThrottle::new(3, Duration::from_secs(60));

        assert!(!fail(&throttle, "mission:a").await);
        assert!(!fail(&throttle, "mission:a").await);
        assert!(fail(&throttle, "mission:a").await);

        let err = throttle.begin_attempt("mission:a").await.unwrap_err();
        assert!(matches!(err, AppError::TooManyAttempts { .. }));

        // Other keys are unaffected
        assert!(throttle.begin_attempt("mission:b").await.is_ok());
    }

    #[tokio::test]
    async fn test_attempts_in_flight_count_against_limit() {
        let throttle = PinThrottle::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            throttle.begin_attempt("k").await.unwrap();
        }
        assert!(throttle.begin_attempt("k").await.is_err());

        // A finished attempt that compared no PIN frees its slot
        throttle.finish_attempt("k", AttemptOutcome::Skipped).await;
        assert!(throttle.begin_attempt("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_burst_is_capped() {
        let throttle = Arc::new(PinThrottle::new(3, Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..40 {
            let throttle = throttle.clone();
            handles.push(tokio::spawn(async move {
                let admitted = throttle.begin_attempt("mission:m").await.is_ok();
                tokio::task::yield_now().await;
                if admitted {
                    throttle
                        .finish_attempt("mission:m", AttemptOutcome::Rejected)
                        .await;
                }
                admitted
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
        assert!(throttle.begin_attempt("mission:m").await.is_err());
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let throttle = PinThrottle::new(2, Duration::from_secs(60));

        fail(&throttle, "k").await;
        throttle.begin_attempt("k").await.unwrap();
        throttle.finish_attempt("k", AttemptOutcome::Accepted).await;
        assert_eq!(throttle.tracked_keys().await, 0);

        assert!(!fail(&throttle, "k").await);
        assert!(throttle.begin_attempt("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let throttle = PinThrottle::new(1, Duration::from_millis(50));

        assert!(fail(&throttle, "k").await);
        assert!(throttle.begin_attempt("k").await.is_err());

        tokio::time::sleep(Duration::from_millis(80)).await;
        throttle.prune().await;
        assert_eq!(throttle.tracked_keys().await, 0);

        assert!(throttle.begin_attempt("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_disables() {
        let throttle = PinThrottle::new(0, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(!fail(&throttle, "k").await);
        }
        assert!(throttle.begin_attempt("k").await.is_ok());
        assert_eq!(throttle.tracked_keys().await, 0);
    }

    #[test]
    fn test_keys() {
        assert_eq!(mission_key("m1"), "mission:m1");
        assert_eq!(
            access_key(IpAddr::from([127, 0, 0, 1])),
            "access:127.0.0.1"
        );
    }
}
