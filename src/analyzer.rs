//! Batch analysis over the full transaction history.
//!
//! Every transaction is scored against the same history snapshot. The scan is
//! quadratic under [`ScanStrategy::Naive`]; [`ScanStrategy::Indexed`] gives the
//! same results from per-batch indexes.

use crate::config::{DetectionConfig, ScanStrategy};
use crate::error::Result;
use crate::scoring::{HistoryView, IndexedHistory, NaiveScan, RiskAggregator, RiskAssessment};
use crate::store::{Repository, RiskUpdate};
use crate::types::{DbId, PatternType, Transaction};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Classification bucket of a scored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskBand {
    Normal,
    Suspicious,
    HighRisk,
}

/// Per-pattern tallies over every analysed transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCounts {
    pub smurfing: usize,
    pub flash_laundering: usize,
    pub mule_networks: usize,
    /// Reserved; no detector currently reports circular transfers
    pub circular_transfers: usize,
}

impl PatternCounts {
    fn record(&mut self, pattern: PatternType) {
        match pattern {
            PatternType::Smurfing => self.smurfing += 1,
            PatternType::FlashLaundering => self.flash_laundering += 1,
            PatternType::MuleNetwork => self.mule_networks += 1,
            PatternType::CircularTransfer => self.circular_transfers += 1,
            PatternType::Normal => {}
        }
    }
}

/// High-risk transaction listed in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedTransaction {
    pub id: DbId,
    pub pattern: PatternType,
    pub risk_score: u8,
    pub description: String,
}

/// Result of one batch analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub total_analyzed: usize,
    pub suspicious_count: usize,
    pub high_risk_count: usize,
    pub patterns: PatternCounts,
    /// High-risk transactions in history order
    pub flagged_transactions: Vec<FlaggedTransaction>,
    /// Transactions whose scoring or write-back failed
    pub skipped: usize,
    /// Scored transactions per ten-point bucket; 100 lands in the last one
    pub score_distribution: [usize; 10],
}

/// Bucket index of a risk score in [`AnalysisReport::score_distribution`].
pub fn score_bucket(risk_score: u8) -> usize {
    usize::from(risk_score / 10).min(9)
}

/// Scores the whole history and writes risk fields back to the store
pub struct BatchAnalyzer {
    aggregator: RiskAggregator,
    strategy: ScanStrategy,
    high_risk_above: u8,
    suspicious_above: u8,
}

impl BatchAnalyzer {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            aggregator: RiskAggregator::new(config),
            strategy: config.scan_strategy,
            high_risk_above: config.high_risk_above,
            suspicious_above: config.suspicious_above,
        }
    }

    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    pub fn classify(&self, risk_score: u8) -> RiskBand {
        if risk_score > self.high_risk_above {
            RiskBand::HighRisk
        } else if risk_score > self.suspicious_above {
            RiskBand::Suspicious
        } else {
            RiskBand::Normal
        }
    }

    /// Score every transaction against `history` without touching storage.
    /// Results are in history order.
    pub fn assess_all(&self, history: &[Transaction]) -> Vec<Result<RiskAssessment>> {
        match self.strategy {
            ScanStrategy::Naive => self.assess_with(history, &NaiveScan::new(history)),
            ScanStrategy::Indexed => self.assess_with(history, &IndexedHistory::build(history)),
        }
    }

    fn assess_with(
        &self,
        history: &[Transaction],
        view: &dyn HistoryView,
    ) -> Vec<Result<RiskAssessment>> {
        history
            .iter()
            .map(|tx| self.aggregator.assess(tx, view))
            .collect()
    }

    /// Analyse the full history held by `repo`.
    ///
    /// A transaction that fails to score or persist is logged and skipped;
    /// the rest of the batch still runs.
    pub fn analyze(&self, repo: &dyn Repository) -> Result<AnalysisReport> {
        let start_time = Instant::now();
        let history = repo.transactions()?;
        let assessments = self.assess_all(&history);

        let mut report = AnalysisReport {
            total_analyzed: history.len(),
            ..AnalysisReport::default()
        };

        for (tx, outcome) in history.iter().zip(assessments) {
            let assessment = match outcome {
                Ok(assessment) => assessment,
                Err(e) => {
                    warn!(
                        transaction_id = tx.id,
                        error = %e,
                        "Scoring failed, skipping transaction"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let band = self.classify(assessment.risk_score);
            let update = RiskUpdate {
                risk_score: assessment.risk_score,
                pattern_type: assessment.pattern,
                flagged: band == RiskBand::HighRisk,
            };
            if let Err(e) = repo.update_transaction_risk(tx.id, update) {
                warn!(
                    transaction_id = tx.id,
                    error = %e,
                    "Risk write-back failed, skipping transaction"
                );
                report.skipped += 1;
                continue;
            }

            debug!(
                transaction_id = tx.id,
                risk_score = assessment.risk_score,
                pattern = %assessment.pattern,
                triggered = ?assessment.triggered,
                "Transaction scored"
            );

            report.patterns.record(assessment.pattern);
            report.score_distribution[score_bucket(assessment.risk_score)] += 1;
            match band {
                RiskBand::HighRisk => {
                    report.high_risk_count += 1;
                    report.flagged_transactions.push(FlaggedTransaction {
                        id: tx.id,
                        pattern: assessment.pattern,
                        risk_score: assessment.risk_score,
                        description: assessment.description,
                    });
                }
                RiskBand::Suspicious => report.suspicious_count += 1,
                RiskBand::Normal => {}
            }
        }

        info!(
            strategy = ?self.strategy,
            total = report.total_analyzed,
            suspicious = report.suspicious_count,
            high_risk = report.high_risk_count,
            skipped = report.skipped,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Batch analysis complete"
        );

        Ok(report)
    }
}

impl Default for BatchAnalyzer {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}
