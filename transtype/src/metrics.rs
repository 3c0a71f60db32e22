use std::collections::VecDeque;

use serde::Serialize;

use crate::utils::now_epoch_ms;

const DEFAULT_WINDOW_SIZE: usize = 256;
const REQUEST_P95_TARGET_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub samples: usize,
    pub average_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl MetricSummary {
    fn empty() -> Self {
        Self {
            samples: 0,
            average_ms: 0,
            p95_ms: 0,
            max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub generated_at_ms: u64,
    pub request_latency: MetricSummary,
    pub requests_sent: u64,
    pub stale_responses_dropped: u64,
    pub suggestions_shown: u64,
    pub service_failures: u64,
    pub insertions: u64,
    pub reconciliation_failures: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct RollingMetric {
    values: VecDeque<u64>,
    capacity: usize,
}

impl RollingMetric {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, value_ms: u64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value_ms);
    }

    fn summary(&self) -> MetricSummary {
        if self.values.is_empty() {
            return MetricSummary::empty();
        }

        let samples = self.values.len();
        let sum: u64 = self.values.iter().sum();
        let average_ms = sum / samples as u64;
        let max_ms = self.values.iter().copied().max().unwrap_or(0);

        let mut sorted = self.values.iter().copied().collect::<Vec<_>>();
        sorted.sort_unstable();
        let p95_index = ((samples as f64 * 0.95).ceil() as usize)
            .saturating_sub(1)
            .min(samples - 1);

        MetricSummary {
            samples,
            average_ms,
            p95_ms: sorted[p95_index],
            max_ms,
        }
    }
}

#[derive(Debug)]
pub struct AssistantMetrics {
    request_latency_ms: RollingMetric,
    requests_sent: u64,
    stale_responses_dropped: u64,
    suggestions_shown: u64,
    service_failures: u64,
    insertions: u64,
    reconciliation_failures: u64,
}

impl AssistantMetrics {
    pub fn new() -> Self {
        Self {
            request_latency_ms: RollingMetric::new(DEFAULT_WINDOW_SIZE),
            requests_sent: 0,
            stale_responses_dropped: 0,
            suggestions_shown: 0,
            service_failures: 0,
            insertions: 0,
            reconciliation_failures: 0,
        }
    }

    pub fn record_request_sent(&mut self) {
        self.requests_sent += 1;
    }

    pub fn record_response(&mut self, latency_ms: u64, succeeded: bool) {
        self.request_latency_ms.record(latency_ms);
        if succeeded {
            self.suggestions_shown += 1;
        } else {
            self.service_failures += 1;
        }
    }

    pub fn record_stale_drop(&mut self) {
        self.stale_responses_dropped += 1;
    }

    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    pub fn record_reconciliation_failure(&mut self) {
        self.reconciliation_failures += 1;
    }

    pub fn report(&self) -> PerformanceReport {
        let request_latency = self.request_latency_ms.summary();

        let mut warnings = Vec::new();
        if self.stale_responses_dropped > 0 {
            warnings.push(format!(
                "Dropped {} stale responses superseded by newer edits.",
                self.stale_responses_dropped
            ));
        }
        if request_latency.samples > 0 && request_latency.p95_ms > REQUEST_P95_TARGET_MS {
            warnings.push(format!(
                "Request P95 latency {}ms exceeded target {}ms.",
                request_latency.p95_ms, REQUEST_P95_TARGET_MS
            ));
        }

        PerformanceReport {
            generated_at_ms: now_epoch_ms(),
            request_latency,
            requests_sent: self.requests_sent,
            stale_responses_dropped: self.stale_responses_dropped,
            suggestions_shown: self.suggestions_shown,
            service_failures: self.service_failures,
            insertions: self.insertions,
            reconciliation_failures: self.reconciliation_failures,
            warnings,
        }
    }
}

impl Default for AssistantMetrics {
    fn default() -> Self {
        Self::new()
    }
}
