use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use super::record::{MetricEncoder, MetricKind, MetricRecord, MetricValue, MetricsBatch};
use super::sampler::ResourceSampler;
use super::store::{mean, CounterSnapshot, CounterStore};
use crate::config::MetricsConfig;
use crate::transport::{Endpoint, HttpPusher};

/// Methods published individually; anything else only counts toward the
/// store's own map.
const PUBLISHED_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Periodic snapshot → encode → push loop.
///
/// Each tick swaps the store's window out, samples CPU and memory, renders
/// the batch and spawns its delivery. The loop never waits on the network,
/// so a slow or failing collector cannot delay the next tick.
pub struct Reporter {
    store: Arc<CounterStore>,
    sampler: ResourceSampler,
    encoder: MetricEncoder,
    pusher: HttpPusher,
    period: Duration,
    rate_multiplier: f64,
}

impl Reporter {
    pub fn new(store: Arc<CounterStore>, sampler: ResourceSampler, config: &MetricsConfig) -> Self {
        let endpoint = Endpoint::from_parts(config.url.as_deref(), config.api_key.clone());
        Self {
            store,
            sampler,
            encoder: MetricEncoder::new(config.source.clone()),
            pusher: HttpPusher::new(endpoint, "metrics"),
            period: config.period(),
            rate_multiplier: config.rate_multiplier(),
        }
    }

    /// Ticks forever, one report per period. The first report fires one
    /// full period after start.
    pub async fn run(self) {
        info!(
            period_ms = self.period.as_millis() as u64,
            configured = self.pusher.is_configured(),
            "metric reporting started"
        );
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        while ticks.next().await.is_some() {
            let _ = self.report_once();
        }
    }

    /// Runs one reporting pass and returns the delivery task, if any.
    pub fn report_once(&self) -> Option<JoinHandle<()>> {
        let snapshot = self.store.snapshot_and_reset();
        let metrics = self.render(&snapshot);
        if metrics.is_empty() {
            debug!("no metrics to send");
            return None;
        }
        debug!(count = metrics.len(), "prepared metrics batch");
        self.pusher.spawn_post(&MetricsBatch::new(metrics))
    }

    /// Encodes one window plus fresh resource readings.
    pub fn render(&self, snapshot: &CounterSnapshot) -> Vec<MetricRecord> {
        let enc = &self.encoder;
        let mut metrics = Vec::with_capacity(16 + snapshot.endpoint_latencies.len());

        // ── Requests ────────────────────────────────────────────
        let mut published_total = 0;
        for method in PUBLISHED_METHODS {
            let count = snapshot.requests(method);
            published_total += count;
            metrics.push(enc.gauge_int(
                "http_requests_per_minute",
                self.per_minute(count),
                &[("method", method)],
            ));
        }
        metrics.push(enc.gauge_int(
            "http_requests_per_minute",
            self.per_minute(published_total),
            &[("method", "TOTAL")],
        ));
        metrics.push(enc.encode(
            "requests_total",
            MetricValue::Int(to_i64(self.store.lifetime_requests())),
            "1",
            MetricKind::Sum,
            &[],
        ));

        // ── Auth / users ────────────────────────────────────────
        let auth = snapshot.auth_attempts;
        metrics.push(enc.gauge_int(
            "auth_attempts_per_minute",
            self.per_minute(auth.successful),
            &[("status", "successful")],
        ));
        metrics.push(enc.gauge_int(
            "auth_attempts_per_minute",
            self.per_minute(auth.failed),
            &[("status", "failed")],
        ));
        metrics.push(enc.gauge_int(
            "active_users",
            to_i64(snapshot.active_users.len() as u64),
            &[],
        ));

        // ── System ──────────────────────────────────────────────
        metrics.push(enc.gauge_double(
            "cpu_usage_percentage",
            self.sampler.sample_cpu_percent(),
            "%",
            &[],
        ));
        metrics.push(enc.gauge_double(
            "memory_usage_percentage",
            self.sampler.sample_memory_percent(),
            "%",
            &[],
        ));

        // ── Purchases ───────────────────────────────────────────
        let purchases = snapshot.purchases;
        metrics.push(enc.gauge_int(
            "pizzas_sold_per_minute",
            self.per_minute(purchases.successful),
            &[],
        ));
        metrics.push(enc.gauge_int(
            "pizza_creation_failures_per_minute",
            self.per_minute(purchases.failed),
            &[],
        ));
        metrics.push(enc.gauge_double(
            "pizza_revenue_per_minute",
            purchases.revenue * self.rate_multiplier,
            "1",
            &[],
        ));

        // ── Latency ─────────────────────────────────────────────
        let mut endpoints: Vec<_> = snapshot.endpoint_latencies.iter().collect();
        endpoints.sort_by(|a, b| a.0.cmp(b.0));
        for (endpoint, samples) in endpoints {
            if let Some(avg) = mean(samples) {
                metrics.push(enc.gauge_double(
                    "endpoint_latency_ms",
                    avg,
                    "ms",
                    &[("endpoint", endpoint.as_str())],
                ));
            }
        }
        metrics.push(enc.gauge_double(
            "pizza_creation_latency_ms",
            snapshot.mean_purchase_latency(),
            "ms",
            &[],
        ));

        metrics
    }

    fn per_minute(&self, count: u64) -> i64 {
        (count as f64 * self.rate_multiplier).round() as i64
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
