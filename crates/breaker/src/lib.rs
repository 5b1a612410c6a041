//! Per-provider circuit-breaker registry (C3).
//!
//! One [`Breaker`] per `provider_id`, holding atomic counters so a call's
//! success/failure can be recorded without taking a lock. The open→half_open
//! transition is never stored — it's a *view* computed from `last_state_change_at`
//! every time the state is read, exactly as required: two concurrent callers
//! reading state mid-timeout both see `half_open` without a race on a stored flag.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use conflux_common::ErrorCode;
use dashmap::DashMap;
use serde::Serialize;

/// Tunables for every breaker in the registry. Spec defaults: 3 / 2 / 60s.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub open_timeout: Duration,
    /// Codes that never consume a failure slot, e.g. a caller-side
    /// `VALIDATION_ERROR` never reflects on the provider's own health.
    pub excluded_errors: Vec<ErrorCode>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            excluded_errors: vec![ErrorCode::ValidationError],
        }
    }
}

/// Classifies an outcome for breaker bookkeeping: does it count against the
/// provider's health, or is it excluded (e.g. a validation failure that never
/// reached the connector)?
pub trait FailureClassifier {
    fn breaker_code(&self) -> Option<ErrorCode>;
}

impl FailureClassifier for conflux_common::Error {
    fn breaker_code(&self) -> Option<ErrorCode> {
        Some(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failure_count: usize,
    pub success_count: usize,
    pub total_failures: u64,
    pub total_successes: u64,
    pub total_rejected: u64,
    pub seconds_until_retry: Option<u64>,
}

/// One provider's breaker. Internal state is `closed`/`open`; `half_open` is
/// derived at read time from `last_state_change_at` + `open_timeout`.
struct Breaker {
    config: BreakerConfig,
    tripped: std::sync::atomic::AtomicBool,
    failure_count: AtomicUsize,
    success_count: AtomicUsize,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    total_rejected: AtomicU64,
    last_state_change_at: Mutex<Option<Instant>>,
}

impl Breaker {
    fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            tripped: std::sync::atomic::AtomicBool::new(false),
            failure_count: AtomicUsize::new(0),
            success_count: AtomicUsize::new(0),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            last_state_change_at: Mutex::new(None),
        }
    }

    /// Read-only view of the current state, never mutates.
    fn view_state(&self) -> BreakerState {
        if !self.tripped.load(Ordering::Acquire) {
            return BreakerState::Closed;
        }
        #[allow(clippy::unwrap_used)]
        let since = self.last_state_change_at.lock().unwrap();
        match *since {
            Some(at) if at.elapsed() >= self.config.open_timeout => BreakerState::HalfOpen,
            _ => BreakerState::Open,
        }
    }

    /// Returns `Ok(())` if a call is allowed, `Err(seconds_until_retry)` if rejected.
    fn check(&self) -> Result<(), u64> {
        match self.view_state() {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                self.total_rejected.fetch_add(1, Ordering::Relaxed);
                #[allow(clippy::unwrap_used)]
                let since = self.last_state_change_at.lock().unwrap();
                let remaining = since
                    .map(|at| self.config.open_timeout.saturating_sub(at.elapsed()).as_secs().max(1))
                    .unwrap_or(self.config.open_timeout.as_secs());
                Err(remaining)
            },
        }
    }

    fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        match self.view_state() {
            BreakerState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            },
            BreakerState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.close();
                }
            },
            BreakerState::Open => {},
        }
    }

    fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        match self.view_state() {
            BreakerState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.open();
                }
            },
            BreakerState::HalfOpen => self.open(),
            BreakerState::Open => {},
        }
    }

    fn open(&self) {
        self.tripped.store(true, Ordering::Release);
        self.success_count.store(0, Ordering::Relaxed);
        #[allow(clippy::unwrap_used)]
        {
            *self.last_state_change_at.lock().unwrap() = Some(Instant::now());
        }
    }

    fn close(&self) {
        self.tripped.store(false, Ordering::Release);
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        #[allow(clippy::unwrap_used)]
        {
            *self.last_state_change_at.lock().unwrap() = Some(Instant::now());
        }
    }

    fn reset(&self) {
        self.close();
    }

    fn stats(&self) -> BreakerStats {
        let state = self.view_state();
        let seconds_until_retry = match state {
            BreakerState::Open => {
                #[allow(clippy::unwrap_used)]
                let since = self.last_state_change_at.lock().unwrap();
                since.map(|at| self.config.open_timeout.saturating_sub(at.elapsed()).as_secs().max(1))
            },
            _ => None,
        };
        BreakerStats {
            state,
            failure_count: self.failure_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            seconds_until_retry,
        }
    }
}

/// Registry of one [`Breaker`] per `provider_id`, created lazily on first use.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Breaker>,
}

impl BreakerRegistry {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, breakers: DashMap::new() }
    }

    fn get_or_create(&self, provider_id: &str) -> dashmap::mapref::one::Ref<'_, String, Breaker> {
        if !self.breakers.contains_key(provider_id) {
            self.breakers.entry(provider_id.to_string()).or_insert_with(|| Breaker::new(self.config.clone()));
        }
        #[allow(clippy::unwrap_used)]
        self.breakers.get(provider_id).unwrap()
    }

    /// Returns `Ok(())` if a call to `provider_id` is currently allowed, else
    /// `Err(seconds_until_retry)`.
    pub fn check(&self, provider_id: &str) -> Result<(), u64> {
        self.get_or_create(provider_id).check()
    }

    pub fn record_success(&self, provider_id: &str) {
        let breaker = self.get_or_create(provider_id);
        let before = breaker.view_state();
        breaker.record_success();
        let after = breaker.view_state();
        if before != after {
            tracing::info!(provider = provider_id, ?before, ?after, "breaker state transition");
        }
    }

    pub fn record_failure(&self, provider_id: &str) {
        let breaker = self.get_or_create(provider_id);
        let before = breaker.view_state();
        breaker.record_failure();
        let after = breaker.view_state();
        if before != after {
            tracing::warn!(provider = provider_id, ?before, ?after, "breaker state transition");
        }
    }

    pub fn reset(&self, provider_id: &str) {
        self.get_or_create(provider_id).reset();
    }

    #[must_use]
    pub fn stats(&self, provider_id: &str) -> BreakerStats {
        self.get_or_create(provider_id).stats()
    }

    /// Run `f`, classifying its outcome against the breaker for `provider_id`.
    /// Short-circuits with `Err(seconds_until_retry)` without calling `f` when open.
    /// An error whose code is in `excluded_errors` (e.g. `VALIDATION_ERROR`)
    /// neither trips nor resets the breaker.
    pub async fn guard<F, Fut, T, E>(&self, provider_id: &str, f: F) -> Result<Result<T, E>, u64>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: FailureClassifier,
    {
        self.check(provider_id)?;
        let outcome = f().await;
        match &outcome {
            Ok(_) => self.record_success(provider_id),
            Err(error) => {
                let excluded = match error.breaker_code() {
                    Some(code) => self.config.excluded_errors.contains(&code),
                    None => false,
                };
                if !excluded {
                    self.record_failure(provider_id);
                }
            },
        }
        Ok(outcome)
    }
}
