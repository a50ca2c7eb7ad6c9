//! Request metrics and periodic summaries for the prediction service.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bounds (ms) of the predicted-ETA buckets; the last bucket is open.
/// Roughly: next block, a few blocks, within a minute, within five minutes.
pub const ETA_BUCKET_BOUNDS_MS: [f64; 4] = [12_000.0, 30_000.0, 60_000.0, 300_000.0];

const ETA_BUCKET_LABELS: [&str; 5] = ["<12s", "12-30s", "30-60s", "1-5min", ">=5min"];

/// Latency samples kept for percentile computation
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions_served: AtomicU64,
    /// Requests rejected by validation
    pub validation_failures: AtomicU64,
    /// Requests that failed inside the model
    pub inference_failures: AtomicU64,
    /// Requests that failed while inverse-scaling
    pub scaler_failures: AtomicU64,
    /// Predictions made with a `tx_type` outside the one-hot domain
    pub out_of_range_tx_types: AtomicU64,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Predicted confirmation-time distribution
    eta_buckets: RwLock<[u64; 5]>,
    /// Start time for rate calculation
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            scaler_failures: AtomicU64::new(0),
            out_of_range_tx_types: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            eta_buckets: RwLock::new([0; 5]),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, predicted_ms: f64) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);

        let bucket = eta_bucket(predicted_ms);
        if let Ok(mut buckets) = self.eta_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed request by pipeline stage
    pub fn record_failure(&self, stage: &str, latency: Duration) {
        let counter = match stage {
            "validation" => &self.validation_failures,
            "model_inference" => &self.inference_failures,
            "scaler" => &self.scaler_failures,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    /// Record a request whose `tx_type` fell outside the trained categories
    pub fn record_out_of_range_tx_type(&self) {
        self.out_of_range_tx_types.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only the most recent window
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    /// Get request latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let times = match self.latencies.read() {
            Ok(times) => times,
            Err(_) => return LatencyStats::default(),
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (successful predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get predicted-ETA distribution, in [`ETA_BUCKET_BOUNDS_MS`] order
    pub fn get_eta_distribution(&self) -> [u64; 5] {
        self.eta_buckets.read().map(|b| *b).unwrap_or([0; 5])
    }

    /// Failure counters keyed by stage
    pub fn get_failures_by_stage(&self) -> HashMap<&'static str, u64> {
        HashMap::from([
            ("validation", self.validation_failures.load(Ordering::Relaxed)),
            ("model_inference", self.inference_failures.load(Ordering::Relaxed)),
            ("scaler", self.scaler_failures.load(Ordering::Relaxed)),
        ])
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let served = self.predictions_served.load(Ordering::Relaxed);
        let failures = self.get_failures_by_stage();
        let failed: u64 = failures.values().sum();
        let total = served + failed;
        let failure_rate = if total > 0 {
            (failed as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let latency = self.get_latency_stats();
        let eta_dist = self.get_eta_distribution();

        info!(
            since = %self.started_at.to_rfc3339(),
            served = served,
            failed = failed,
            failure_rate = format!("{:.1}%", failure_rate),
            throughput = format!("{:.1} req/s", self.get_throughput()),
            out_of_range_tx_type = self.out_of_range_tx_types.load(Ordering::Relaxed),
            "Service metrics summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Request latency"
        );
        for (stage, count) in &failures {
            if *count > 0 {
                info!(stage = %stage, count = count, "Failures by stage");
            }
        }

        let predicted: u64 = eta_dist.iter().sum();
        for (label, &count) in ETA_BUCKET_LABELS.iter().zip(eta_dist.iter()) {
            let pct = if predicted > 0 {
                (count as f64 / predicted as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!("  ETA {:>7}: {:>8} ({:>5.1}%) {}", label, count, pct, bar);
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn eta_bucket(predicted_ms: f64) -> usize {
    ETA_BUCKET_BOUNDS_MS
        .iter()
        .position(|&bound| predicted_ms < bound)
        .unwrap_or(ETA_BUCKET_BOUNDS_MS.len())
}

/// Request latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
