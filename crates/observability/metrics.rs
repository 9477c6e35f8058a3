use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

/// Process metrics shared through `Arc`. Construct one per process and hand it to the
/// reseller client and the admin router.
#[derive(Debug)]
pub struct SystemMetrics {
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    reseller_api_calls: AtomicU64,
    reseller_api_errors: AtomicU64,
    payments_succeeded: AtomicU64,
    payments_failed: AtomicU64,
    fulfillment_failures: AtomicU64,
    response_time: Mutex<ResponseTimeAverage>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ResponseTimeAverage {
    samples: u64,
    average_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub reseller_api_calls: u64,
    pub reseller_api_errors: u64,
    pub payments_succeeded: u64,
    pub payments_failed: u64,
    pub fulfillment_failures: u64,
    pub average_response_time_ms: f64,
    pub response_time_samples: u64,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            reseller_api_calls: AtomicU64::new(0),
            reseller_api_errors: AtomicU64::new(0),
            payments_succeeded: AtomicU64::new(0),
            payments_failed: AtomicU64::new(0),
            fulfillment_failures: AtomicU64::new(0),
            response_time: Mutex::new(ResponseTimeAverage::default()),
        }
    }

    /// One reseller API attempt, successful or not, with its latency.
    pub fn track_reseller_call(&self, success: bool, elapsed: Duration) {
        self.reseller_api_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.reseller_api_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.track_response_time(elapsed);
    }

    pub fn track_response_time(&self, elapsed: Duration) {
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        let mut avg = self
            .response_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        avg.samples += 1;
        avg.average_ms += (sample_ms - avg.average_ms) / avg.samples as f64;
    }

    pub fn track_payment(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.payments_succeeded
        } else {
            &self.payments_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_fulfillment_failure(&self) {
        self.fulfillment_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let avg = *self
            .response_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        MetricsSnapshot {
            reseller_api_calls: self.reseller_api_calls.load(Ordering::Relaxed),
            reseller_api_errors: self.reseller_api_errors.load(Ordering::Relaxed),
            payments_succeeded: self.payments_succeeded.load(Ordering::Relaxed),
            payments_failed: self.payments_failed.load(Ordering::Relaxed),
            fulfillment_failures: self.fulfillment_failures.load(Ordering::Relaxed),
            average_response_time_ms: avg.average_ms,
            response_time_samples: avg.samples,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            started_at: self.started_at_utc,
        }
    }

    /// Clears counters. Uptime keeps counting from process start.
    pub fn reset(&self) {
        for counter in [
            &self.reseller_api_calls,
            &self.reseller_api_errors,
            &self.payments_succeeded,
            &self.payments_failed,
            &self.fulfillment_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self
            .response_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = ResponseTimeAverage::default();
    }
}
