//! Circuit breaker guarding the local inference server.
//!
//! `open` blocks mesh routing until the cooldown has elapsed; the first probe
//! after that moves the breaker to `half-open`, and the next local outcome
//! decides whether it closes again or reopens.

use log::{debug, info};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures needed to open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a half-open probe is allowed
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of the breaker's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a guarded attempt may proceed right now.
    ///
    /// This is the only place `open -> half-open` happens.
    pub fn permits_attempt(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.config.cooldown);
                if cooled_down {
                    Self::transition(&mut inner, CircuitState::HalfOpen);
                } else {
                    debug!(
                        "Circuit breaker open, {} consecutive failures",
                        inner.consecutive_failures
                    );
                }
                cooled_down
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        let should_open = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if should_open {
            Self::transition(&mut inner, CircuitState::Open);
        }
    }

    /// Closes the circuit after a successful half-open attempt. No-op otherwise.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.consecutive_failures = 0;
            Self::transition(&mut inner, CircuitState::Closed);
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure: inner.last_failure,
        }
    }

    fn transition(inner: &mut BreakerInner, to: CircuitState) {
        if inner.state != to {
            info!(
                "Circuit breaker state transition: {} -> {}",
                inner.state.as_str(),
                to.as_str()
            );
            inner.state = to;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
