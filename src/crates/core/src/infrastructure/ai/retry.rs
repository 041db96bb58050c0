//! Explicit retry composition for fallible async operations.

use crate::util::errors::{ErrorKind, TarxError};
use log::{debug, warn};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f32,
    /// Fraction of the delay randomly added or removed, clamped to `0.0..=1.0`
    pub jitter_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Retries transport, protocol and timeout failures; never policy or config ones.
    pub fn default_predicate(err: &TarxError) -> bool {
        matches!(
            err.kind(),
            ErrorKind::Transport | ErrorKind::Protocol | ErrorKind::Timeout
        )
    }

    /// Delay before the attempt following `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let pow = self.multiplier.powi(attempt as i32);
        let max_ms = self.max_backoff.as_millis() as u64;
        let delay_ms = ((self.initial_backoff.as_millis() as f32 * pow) as u64).min(max_ms);

        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        if jitter > 0.0 {
            let scale: f32 = rand::thread_rng().gen_range(-jitter..=jitter);
            let jitter_ms = (delay_ms as f32 * scale).round() as i64;
            let adjusted = (delay_ms as i64 + jitter_ms).max(0) as u64;
            return Duration::from_millis(adjusted);
        }

        Duration::from_millis(delay_ms)
    }

    /// Whether another attempt is allowed after `attempt` failed with `err`.
    fn allows_retry<E, P>(&self, err: &E, attempt: u32, should_retry: P) -> bool
    where
        P: Fn(&E) -> bool,
    {
        attempt + 1 < self.max_attempts.max(1) && should_retry(err)
    }

    /// Runs `operation(attempt)` until it succeeds, the predicate rejects the
    /// error, or attempts run out. The last error is returned unchanged.
    pub async fn execute<T, E, Op, Fut, P>(&self, mut operation: Op, should_retry: P) -> Result<T, E>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.allows_retry(&err, attempt, &should_retry) {
                        if attempt > 0 {
                            debug!("Giving up after {} attempts: {}", attempt + 1, err);
                        }
                        return Err(err);
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        "Attempt {} failed, retrying in {}ms: {}",
                        attempt + 1,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Bundles `operation` with this policy into a reusable retrying operation.
    pub fn wrap<Op, P>(&self, operation: Op, should_retry: P) -> Retrying<Op, P> {
        Retrying {
            policy: self.clone(),
            operation,
            should_retry,
        }
    }
}

/// A fallible operation that retries itself according to a [`RetryPolicy`].
pub struct Retrying<Op, P> {
    policy: RetryPolicy,
    operation: Op,
    should_retry: P,
}

impl<Op, P> Retrying<Op, P> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn call<T, E, Fut>(&mut self) -> Result<T, E>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        self.policy
            .execute(&mut self.operation, &self.should_retry)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(250));
        assert_eq!(policy.backoff(9), Duration::from_millis(250));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(400),
            jitter_factor: 0.5,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let ms = policy.backoff(0).as_millis();
            assert!((200..=600).contains(&ms), "delay {}ms out of range", ms);
        }
    }

    #[test]
    fn default_predicate_skips_policy_and_config_errors() {
        assert!(RetryPolicy::default_predicate(&TarxError::transport("mesh", "eof")));
        assert!(RetryPolicy::default_predicate(&TarxError::MissingBody {
            backend: "local-server"
        }));
        assert!(!RetryPolicy::default_predicate(
            &TarxError::LocalInferenceUnavailable
        ));
        assert!(!RetryPolicy::default_predicate(&TarxError::config("x")));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<&str, TarxError> = fast_policy()
            .execute(
                move |_| {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(TarxError::transport("local-server", "refused"))
                        } else {
                            Ok("ok")
                        }
                    }
                },
                RetryPolicy::default_predicate,
            )
            .await;

        assert_eq!(result.expect("third attempt succeeds"), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_when_predicate_rejects() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), TarxError> = fast_policy()
            .execute(
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(TarxError::LocalInferenceUnavailable) }
                },
                RetryPolicy::default_predicate,
            )
            .await;

        assert!(matches!(result, Err(TarxError::LocalInferenceUnavailable)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let seen = Arc::new(AtomicU32::new(0));
        let attempts = seen.clone();
        let mut retrying = fast_policy().wrap(
            move |attempt: u32| {
                attempts.store(attempt, Ordering::SeqCst);
                async move { Err::<(), _>(format!("attempt {}", attempt)) }
            },
            |_: &String| true,
        );

        assert_eq!(retrying.call().await, Err("attempt 2".to_string()));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(retrying.policy().max_attempts, 3);

        assert_eq!(retrying.call().await, Err("attempt 2".to_string()));
    }
}
