//! Correlation ids and in-process counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Generate a short correlation ID (8 characters) for compact logging.
pub fn generate_short_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Request and tool-call counters.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Requests that expected a response.
    pub requests_total: AtomicU64,

    /// Notifications (no id).
    pub notifications_total: AtomicU64,

    /// Requests and notifications that ended in an error.
    pub errors_total: AtomicU64,

    /// Tool calls attempted.
    pub tool_calls_total: AtomicU64,

    /// Tool calls that failed.
    pub tool_calls_failed: AtomicU64,

    /// Cumulative tool call time in milliseconds.
    pub tool_time_ms_total: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decoded request.
    pub fn record_request(&self, notification: bool) {
        if notification {
            self.notifications_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tool call and how long it took.
    pub fn record_tool_call(&self, success: bool, duration: Duration) {
        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.tool_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.tool_time_ms_total
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let tool_calls_total = self.tool_calls_total.load(Ordering::Relaxed);
        let tool_time_ms_total = self.tool_time_ms_total.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            notifications_total: self.notifications_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            tool_calls_total,
            tool_calls_failed: self.tool_calls_failed.load(Ordering::Relaxed),
            tool_time_ms_total,
            avg_tool_time_ms: if tool_calls_total > 0 {
                tool_time_ms_total as f64 / tool_calls_total as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of [`ServerMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub notifications_total: u64,
    pub errors_total: u64,
    pub tool_calls_total: u64,
    pub tool_calls_failed: u64,
    pub tool_time_ms_total: u64,
    pub avg_tool_time_ms: f64,
}
