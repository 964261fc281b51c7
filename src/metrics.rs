//! Metrics Collection for storefront-sync
//!
//! Atomic counters for webhook outcomes, carrier token refreshes and carrier
//! calls, exported in Prometheus text format.
//!
//! # Example
//!
//! ```rust
//! use storefront_sync::metrics::global_metrics;
//!
//! global_metrics().record_webhook_received();
//! let output = global_metrics().to_prometheus_format();
//! assert!(output.contains("storefront_webhooks_received_total"));
//! ```

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Process metrics
#[derive(Debug)]
pub struct Metrics {
    webhooks_received: AtomicU64,
    webhooks_rejected: AtomicU64,
    webhooks_applied: AtomicU64,
    webhooks_duplicate: AtomicU64,
    webhooks_ignored: AtomicU64,
    webhooks_failed: AtomicU64,
    token_refreshes: AtomicU64,
    token_refresh_failures: AtomicU64,
    carrier_requests: AtomicU64,
    carrier_failures: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub webhooks_received: u64,
    pub webhooks_rejected: u64,
    pub webhooks_applied: u64,
    pub webhooks_duplicate: u64,
    pub webhooks_ignored: u64,
    pub webhooks_failed: u64,
    pub token_refreshes: u64,
    pub token_refresh_failures: u64,
    pub carrier_requests: u64,
    pub carrier_failures: u64,
    pub uptime_seconds: u64,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            webhooks_received: AtomicU64::new(0),
            webhooks_rejected: AtomicU64::new(0),
            webhooks_applied: AtomicU64::new(0),
            webhooks_duplicate: AtomicU64::new(0),
            webhooks_ignored: AtomicU64::new(0),
            webhooks_failed: AtomicU64::new(0),
            token_refreshes: AtomicU64::new(0),
            token_refresh_failures: AtomicU64::new(0),
            carrier_requests: AtomicU64::new(0),
            carrier_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_webhook_received(&self) {
        self.webhooks_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Signature or payload rejected before any order was touched
    #[inline]
    pub fn record_webhook_rejected(&self) {
        self.webhooks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_webhook_applied(&self) {
        self.webhooks_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_webhook_duplicate(&self) {
        self.webhooks_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_webhook_ignored(&self) {
        self.webhooks_ignored.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_webhook_failed(&self) {
        self.webhooks_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_token_refresh(&self) {
        self.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_token_refresh_failure(&self) {
        self.token_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_carrier_request(&self) {
        self.carrier_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_carrier_failure(&self) {
        self.carrier_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            webhooks_received: self.webhooks_received.load(Ordering::Relaxed),
            webhooks_rejected: self.webhooks_rejected.load(Ordering::Relaxed),
            webhooks_applied: self.webhooks_applied.load(Ordering::Relaxed),
            webhooks_duplicate: self.webhooks_duplicate.load(Ordering::Relaxed),
            webhooks_ignored: self.webhooks_ignored.load(Ordering::Relaxed),
            webhooks_failed: self.webhooks_failed.load(Ordering::Relaxed),
            token_refreshes: self.token_refreshes.load(Ordering::Relaxed),
            token_refresh_failures: self.token_refresh_failures.load(Ordering::Relaxed),
            carrier_requests: self.carrier_requests.load(Ordering::Relaxed),
            carrier_failures: self.carrier_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Render all counters in Prometheus text exposition format
    pub fn to_prometheus_format(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::with_capacity(2048);

        let webhook_outcomes = [
            ("rejected", snap.webhooks_rejected),
            ("applied", snap.webhooks_applied),
            ("duplicate", snap.webhooks_duplicate),
            ("ignored", snap.webhooks_ignored),
            ("failed", snap.webhooks_failed),
        ];

        write_counter(
            &mut out,
            "storefront_webhooks_received_total",
            "Webhook deliveries received",
            snap.webhooks_received,
        );

        let _ = writeln!(
            out,
            "# HELP storefront_webhook_outcomes_total Webhook deliveries by outcome"
        );
        let _ = writeln!(out, "# TYPE storefront_webhook_outcomes_total counter");
        for (outcome, value) in webhook_outcomes {
            let _ = writeln!(
                out,
                "storefront_webhook_outcomes_total{{outcome=\"{outcome}\"}} {value}"
            );
        }

        write_counter(
            &mut out,
            "storefront_carrier_token_refreshes_total",
            "Successful carrier logins",
            snap.token_refreshes,
        );
        write_counter(
            &mut out,
            "storefront_carrier_token_refresh_failures_total",
            "Failed carrier logins",
            snap.token_refresh_failures,
        );
        write_counter(
            &mut out,
            "storefront_carrier_requests_total",
            "Authenticated carrier API calls",
            snap.carrier_requests,
        );
        write_counter(
            &mut out,
            "storefront_carrier_failures_total",
            "Carrier API calls that failed or returned non-2xx",
            snap.carrier_failures,
        );

        let _ = writeln!(out, "# HELP storefront_uptime_seconds Process uptime");
        let _ = writeln!(out, "# TYPE storefront_uptime_seconds gauge");
        let _ = writeln!(out, "storefront_uptime_seconds {}", snap.uptime_seconds);

        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_METRICS: OnceLock<Metrics> = OnceLock::new();

/// Process-wide metrics instance
pub fn global_metrics() -> &'static Metrics {
    GLOBAL_METRICS.get_or_init(Metrics::new)
}
