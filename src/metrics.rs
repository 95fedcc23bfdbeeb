//! Engine metrics and periodic reporting.

use crate::analyzer::AnalysisReport;
use crate::types::Severity;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 1000;

/// Metrics collector for the risk engine
pub struct EngineMetrics {
    /// Transactions accepted through `submit`
    pub transactions_submitted: AtomicU64,
    /// Batch analyses completed
    pub analyses_run: AtomicU64,
    /// Transactions scored across all analyses
    pub transactions_scored: AtomicU64,
    /// Transactions skipped because scoring or write-back failed
    pub transactions_skipped: AtomicU64,
    /// Total alerts raised
    pub alerts_raised: AtomicU64,
    alerts_by_severity: RwLock<HashMap<Severity, u64>>,
    /// Batch analysis times (in milliseconds)
    analysis_times: RwLock<Vec<u64>>,
    /// Score distribution of the latest analysis
    score_buckets: RwLock<[usize; 10]>,
    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_submitted: AtomicU64::new(0),
            analyses_run: AtomicU64::new(0),
            transactions_scored: AtomicU64::new(0),
            transactions_skipped: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            alerts_by_severity: RwLock::new(HashMap::new()),
            analysis_times: RwLock::new(Vec::with_capacity(MAX_SAMPLES)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    pub fn record_submission(&self) {
        self.transactions_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed batch analysis
    pub fn record_analysis(&self, elapsed: Duration, report: &AnalysisReport) {
        self.analyses_run.fetch_add(1, Ordering::Relaxed);
        let scored = report.total_analyzed.saturating_sub(report.skipped);
        self.transactions_scored.fetch_add(scored as u64, Ordering::Relaxed);
        self.transactions_skipped
            .fetch_add(report.skipped as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.analysis_times.write() {
            times.push(elapsed.as_millis() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        // every analysis rescores the full history, so the latest one wins
        if let Ok(mut buckets) = self.score_buckets.write() {
            *buckets = report.score_distribution;
        }
    }

    pub fn record_alert(&self, severity: Severity) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_severity) = self.alerts_by_severity.write() {
            *by_severity.entry(severity).or_insert(0) += 1;
        }
    }

    pub fn get_analysis_stats(&self) -> AnalysisStats {
        let times = self
            .analysis_times
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if times.is_empty() {
            return AnalysisStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        AnalysisStats {
            count: count as u64,
            mean_ms: sum / count as u64,
            p50_ms: sorted[count / 2],
            p95_ms: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            max_ms: sorted[count - 1],
        }
    }

    /// Alerts per severity, most urgent first
    pub fn get_alerts_by_severity(&self) -> Vec<(Severity, u64)> {
        let by_severity = self
            .alerts_by_severity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut counts: Vec<(Severity, u64)> = by_severity.iter().map(|(s, c)| (*s, *c)).collect();
        counts.sort();
        counts
    }

    pub fn get_score_distribution(&self) -> [usize; 10] {
        *self
            .score_buckets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Submissions per second since startup
    pub fn get_submission_rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_submitted.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let submitted = self.transactions_submitted.load(Ordering::Relaxed);
        let analyses = self.analyses_run.load(Ordering::Relaxed);
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let skipped = self.transactions_skipped.load(Ordering::Relaxed);
        let alert_count = self.alerts_raised.load(Ordering::Relaxed);
        let stats = self.get_analysis_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD RISK ENGINE - METRICS SUMMARY             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Submitted: {:>8}  │  Rate: {:>8.1} tx/s     ║",
            submitted,
            self.get_submission_rate()
        );
        info!(
            "║ Analyses Run:           {:>8}  │  Scored: {:>10}      ║",
            analyses, scored
        );
        info!(
            "║ Skipped:                {:>8}  │  Alerts: {:>10}      ║",
            skipped, alert_count
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Analysis Time (ms): mean={:>6} p50={:>6} p95={:>6} max={:>6} ║",
            stats.mean_ms, stats.p50_ms, stats.p95_ms, stats.max_ms
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Alerts by Severity:                                          ║");
        for (severity, count) in self.get_alerts_by_severity() {
            let pct = if alert_count > 0 {
                (count as f64 / alert_count as f64) * 100.0
            } else {
                0.0
            };
            info!(
                "║   {:10}: {:>6} ({:>5.1}%)                                ║",
                severity, count, pct
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution (latest analysis):                   ║");
        let distribution = self.get_score_distribution();
        let total: usize = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            let upper = if i == 9 { 100 } else { i * 10 + 9 };
            info!("║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}", i * 10, upper, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch analysis latency statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub count: u64,
    pub mean_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

/// Prints a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_recording() {
        let metrics = EngineMetrics::new();
        let mut report = AnalysisReport {
            total_analyzed: 12,
            skipped: 2,
            ..AnalysisReport::default()
        };
        report.score_distribution[3] = 10;

        metrics.record_analysis(Duration::from_millis(40), &report);
        metrics.record_analysis(Duration::from_millis(10), &report);

        assert_eq!(metrics.analyses_run.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.transactions_scored.load(Ordering::Relaxed), 20);
        assert_eq!(metrics.transactions_skipped.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.get_score_distribution()[3], 10);

        let stats = metrics.get_analysis_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_ms, 25);
        assert_eq!(stats.max_ms, 40);
    }

    #[test]
    fn test_alerts_by_severity() {
        let metrics = EngineMetrics::new();
        metrics.record_alert(Severity::High);
        metrics.record_alert(Severity::Critical);
        metrics.record_alert(Severity::High);

        assert_eq!(metrics.alerts_raised.load(Ordering::Relaxed), 3);
        assert_eq!(
            metrics.get_alerts_by_severity(),
            vec![(Severity::Critical, 1), (Severity::High, 2)]
        );
    }

    #[test]
    fn test_empty_stats() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.get_analysis_stats(), AnalysisStats::default());
        metrics.print_summary();
    }
}
