//! Circuit breaker implementation for preventing cascading failures
//!
//! One breaker guards one logical service. A breaker opens after a run of
//! consecutive failures, rejects calls for a cool-down period, then lets a
//! single probe through whose outcome decides the next state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::CircuitBreakerStatus;
use crate::error::{ErrorContext, Result, ServiceError};

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Time after the last failure before a probe is admitted
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    status: CircuitBreakerStatus,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_failure_wall: Option<DateTime<Utc>>,
    probe_started_at: Option<Instant>,
}

/// A thread-safe circuit breaker for a single service
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named service
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                status: CircuitBreakerStatus::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                last_failure_wall: None,
                probe_started_at: None,
            }),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Name of the guarded service
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // A panic while holding the lock leaves plain counters behind; keep using them
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask permission to issue one request
    ///
    /// Fails with [`ServiceError::CircuitOpen`] while the circuit is open and
    /// the cool-down has not elapsed, or while another caller holds the
    /// half-open probe.
    pub fn try_acquire(&self) -> Result<()> {
        let mut inner = self.lock();

        match inner.status {
            CircuitBreakerStatus::Closed => Ok(()),
            CircuitBreakerStatus::Open => {
                let cooled_down = inner
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.config.cool_down)
                    .unwrap_or(true);

                if cooled_down {
                    log::info!("Circuit breaker for '{}' transitioning to HalfOpen", self.name);
                    inner.status = CircuitBreakerStatus::HalfOpen;
                    inner.probe_started_at = Some(Instant::now());
                    Ok(())
                } else {
                    drop(inner);
                    Err(self.rejection())
                }
            }
            CircuitBreakerStatus::HalfOpen => {
                let probe_active = inner
                    .probe_started_at
                    .map(|at| at.elapsed() < self.config.cool_down)
                    .unwrap_or(false);

                if probe_active {
                    drop(inner);
                    Err(self.rejection())
                } else {
                    // The previous probe never reported back
                    log::warn!("Circuit breaker for '{}' taking over abandoned probe", self.name);
                    inner.probe_started_at = Some(Instant::now());
                    Ok(())
                }
            }
        }
    }

    fn rejection(&self) -> ServiceError {
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
        ServiceError::circuit_open(format!("circuit breaker for '{}' is open", self.name))
            .with_context(ErrorContext::for_service(self.name.as_str()))
    }

    /// Record a successful request
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();

        match inner.status {
            CircuitBreakerStatus::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitBreakerStatus::HalfOpen => {
                log::info!("Circuit breaker for '{}' transitioning to Closed", self.name);
                inner.status = CircuitBreakerStatus::Closed;
                inner.consecutive_failures = 0;
                inner.probe_started_at = None;
            }
            CircuitBreakerStatus::Open => {
                // A call admitted before the circuit opened finished late
                log::debug!("Ignoring late success for '{}' while Open", self.name);
            }
        }
    }

    /// Record a failed request, returning the status after the update
    pub fn record_failure(&self) -> CircuitBreakerStatus {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());
        inner.last_failure_wall = Some(Utc::now());

        match inner.status {
            CircuitBreakerStatus::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    log::warn!(
                        "Circuit breaker for '{}' transitioning to Open after {} consecutive failures",
                        self.name,
                        inner.consecutive_failures
                    );
                    inner.status = CircuitBreakerStatus::Open;
                }
            }
            CircuitBreakerStatus::HalfOpen => {
                log::warn!("Circuit breaker for '{}' probe failed, reopening", self.name);
                inner.status = CircuitBreakerStatus::Open;
                inner.probe_started_at = None;
            }
            CircuitBreakerStatus::Open => {}
        }

        inner.status
    }

    /// Get the current circuit status
    pub fn status(&self) -> CircuitBreakerStatus {
        self.lock().status
    }

    /// Get the current number of consecutive failures
    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.status = CircuitBreakerStatus::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure_at = None;
        inner.last_failure_wall = None;
        inner.probe_started_at = None;
    }

    /// Point-in-time view of the breaker, for status endpoints
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            service: self.name.clone(),
            status: inner.status,
            consecutive_failures: inner.consecutive_failures,
            last_failure: inner.last_failure_wall,
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Serializable breaker state
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub status: CircuitBreakerStatus,
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

/// Per-service breakers, created on first use and shared by all callers
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the breaker for a service, creating it closed if absent
    pub fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(breaker) = breakers.get(service) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            breakers
                .entry(service.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.config.clone()))),
        )
    }

    /// Snapshots of every breaker created so far, sorted by service name
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn breaker(threshold: u32, cool_down: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cool_down,
            },
        )
    }

    #[test]
    fn test_circuit_closed_initially() {
        let cb = breaker(5, Duration::from_secs(60));
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);

        assert_eq!(cb.record_failure(), CircuitBreakerStatus::Open);

        let err = cb.try_acquire().unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(cb.snapshot().total_rejections, 1);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();

        assert_eq!(cb.failure_count(), 1);
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let cb = breaker(1, Duration::from_millis(100));

        cb.record_failure();
        thread::sleep(Duration::from_millis(150));

        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);

        // Second caller during the probe is rejected
        assert!(cb.try_acquire().unwrap_err().is_circuit_open());

        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_failed_probe_reopens_circuit() {
        let cb = breaker(1, Duration::from_millis(100));

        cb.record_failure();
        thread::sleep(Duration::from_millis(150));
        assert!(cb.try_acquire().is_ok());

        assert_eq!(cb.record_failure(), CircuitBreakerStatus::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_abandoned_probe_is_taken_over() {
        let cb = breaker(1, Duration::from_millis(50));

        cb.record_failure();
        thread::sleep(Duration::from_millis(80));
        assert!(cb.try_acquire().is_ok());

        // Probe never reports back
        thread::sleep(Duration::from_millis(80));
        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
    }

    #[test]
    fn test_concurrent_callers_share_one_probe() {
        let cb = Arc::new(breaker(1, Duration::from_millis(50)));
        cb.record_failure();
        thread::sleep(Duration::from_millis(80));

        let barrier = Arc::new(std::sync::Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cb.try_acquire().is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(cb.snapshot().total_rejections, 15);
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let cb = Arc::new(breaker(16, Duration::from_secs(60)));

        let handles: Vec<_> = (0..15)
            .map(|_| {
                let cb = Arc::clone(&cb);
                thread::spawn(move || {
                    cb.record_failure();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cb.failure_count(), 15);
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);

        assert_eq!(cb.record_failure(), CircuitBreakerStatus::Open);
        assert_eq!(cb.snapshot().total_failures, 16);
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, Duration::from_secs(60));

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        cb.reset();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.snapshot().last_failure.is_none());
    }

    #[test]
    fn test_registry_shares_breakers_by_name() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cool_down: Duration::from_secs(60),
        });

        registry.breaker("rag").record_failure();

        assert_eq!(registry.breaker("rag").status(), CircuitBreakerStatus::Open);
        assert_eq!(registry.breaker("cache").status(), CircuitBreakerStatus::Closed);

        let names: Vec<_> = registry.snapshots().into_iter().map(|s| s.service).collect();
        assert_eq!(names, vec!["cache".to_string(), "rag".to_string()]);
    }
}
