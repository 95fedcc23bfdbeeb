//! Fraud engine facade over the repository, analyzer and case lifecycle.

use crate::alerts::AlertEmitter;
use crate::analyzer::{AnalysisReport, BatchAnalyzer};
use crate::cases::{CaseManager, FlagCommand};
use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::EngineMetrics;
use crate::store::{pending_cases, Repository};
use crate::types::{
    Alert, CaseStatus, DbId, FlaggedAccount, NewQrArtifact, NewTransaction, PatternType,
    QrArtifact, Transaction,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Batch report together with the alerts it raised
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    pub alerts: Vec<Alert>,
}

/// Read-only projection over the stored records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_transactions: usize,
    /// Persisted score above the suspicious threshold, high risk included
    pub suspicious_count: usize,
    pub high_risk_count: usize,
    pub qr_scanned: usize,
    pub active_alerts: usize,
    pub pending_flagged_accounts: usize,
}

pub struct FraudEngine {
    repo: Arc<dyn Repository>,
    analyzer: BatchAnalyzer,
    emitter: AlertEmitter,
    cases: CaseManager,
    metrics: Arc<EngineMetrics>,
    suspicious_above: u8,
    dashboard_high_risk_above: u8,
    /// Serialises batch analyses
    analysis_guard: Mutex<()>,
}

impl FraudEngine {
    pub fn new(repo: Arc<dyn Repository>, config: &AppConfig) -> Self {
        let emitter = AlertEmitter::new(&config.alerts);
        Self {
            repo,
            analyzer: BatchAnalyzer::new(&config.detection),
            cases: CaseManager::new(emitter.clone()),
            emitter,
            metrics: Arc::new(EngineMetrics::new()),
            suspicious_above: config.detection.suspicious_above,
            dashboard_high_risk_above: config.detection.dashboard_high_risk_above,
            analysis_guard: Mutex::new(()),
        }
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    /// Validate and store a new transaction. It is scored by the next analysis.
    pub fn submit(&self, submission: NewTransaction) -> Result<Transaction> {
        submission.validate()?;
        let tx = self.repo.insert_transaction(submission)?;
        self.metrics.record_submission();
        debug!(
            transaction_id = tx.id,
            sender_id = %tx.sender_id,
            receiver_id = %tx.receiver_id,
            amount = %tx.amount,
            "Transaction submitted"
        );
        Ok(tx)
    }

    /// Score the full history and raise one transaction alert per flagged
    /// entry above the alert threshold.
    pub fn analyze_all(&self) -> Result<AnalysisOutcome> {
        let _guard = self
            .analysis_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let start_time = Instant::now();

        let report = self.analyzer.analyze(self.repo.as_ref())?;

        let mut alerts = Vec::new();
        for candidate in self.emitter.transaction_alerts(&report) {
            let alert = self.repo.insert_alert(candidate)?;
            self.metrics.record_alert(alert.severity);
            warn!(
                alert_id = alert.id,
                severity = %alert.severity,
                risk_score = alert.risk_score.unwrap_or_default(),
                title = %alert.title,
                "Fraud alert raised"
            );
            alerts.push(alert);
        }

        let elapsed = start_time.elapsed();
        self.metrics.record_analysis(elapsed, &report);
        info!(
            total = report.total_analyzed,
            high_risk = report.high_risk_count,
            new_alerts = alerts.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Analysis finished"
        );

        Ok(AnalysisOutcome { report, alerts })
    }

    /// Open a review case and its companion alert.
    pub fn flag_account(&self, command: FlagCommand) -> Result<FlaggedAccount> {
        self.flag_account_with_alert(command).map(|(case, _)| case)
    }

    /// Like [`FraudEngine::flag_account`], also returning the companion alert.
    pub fn flag_account_with_alert(
        &self,
        command: FlagCommand,
    ) -> Result<(FlaggedAccount, Alert)> {
        let (case, alert) = self.cases.flag_account(self.repo.as_ref(), command)?;
        self.metrics.record_alert(alert.severity);
        Ok((case, alert))
    }

    pub fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.cases.list_alerts(self.repo.as_ref())
    }

    pub fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        self.cases.list_active_alerts(self.repo.as_ref())
    }

    pub fn acknowledge(&self, alert_id: DbId) -> Result<Alert> {
        self.cases.acknowledge(self.repo.as_ref(), alert_id)
    }

    pub fn list_flagged_accounts(&self) -> Result<Vec<FlaggedAccount>> {
        self.cases.list_flagged_accounts(self.repo.as_ref())
    }

    pub fn update_status(
        &self,
        case_id: DbId,
        status: CaseStatus,
        reviewer: Option<&str>,
    ) -> Result<FlaggedAccount> {
        self.cases
            .update_status(self.repo.as_ref(), case_id, status, reviewer)
    }

    /// Record a QR analysis result; high scores raise a qr-steganography alert.
    pub fn record_qr_artifact(
        &self,
        submission: NewQrArtifact,
    ) -> Result<(QrArtifact, Option<Alert>)> {
        submission.validate()?;
        let artifact = self.repo.insert_qr_artifact(submission)?;

        let alert = match self.emitter.qr_alert(&artifact) {
            Some(candidate) => {
                let alert = self.repo.insert_alert(candidate)?;
                self.metrics.record_alert(alert.severity);
                warn!(
                    alert_id = alert.id,
                    qr_artifact_id = artifact.id,
                    risk_score = artifact.risk_score,
                    "Steganographic QR code alert raised"
                );
                Some(alert)
            }
            None => None,
        };

        info!(
            qr_artifact_id = artifact.id,
            classification = ?artifact.classification,
            risk_score = artifact.risk_score,
            "QR artifact recorded"
        );
        Ok((artifact, alert))
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        self.repo.transactions()
    }

    pub fn transactions_by_pattern(&self, pattern: PatternType) -> Result<Vec<Transaction>> {
        self.repo.transactions_by_pattern(pattern)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let transactions = self.repo.transactions()?;
        let score = |tx: &Transaction| tx.risk_score.unwrap_or(0);

        Ok(DashboardStats {
            total_transactions: transactions.len(),
            suspicious_count: transactions
                .iter()
                .filter(|tx| score(tx) > self.suspicious_above)
                .count(),
            high_risk_count: transactions
                .iter()
                .filter(|tx| score(tx) > self.dashboard_high_risk_above)
                .count(),
            qr_scanned: self.repo.qr_artifacts()?.len(),
            active_alerts: self.list_active_alerts()?.len(),
            pending_flagged_accounts: pending_cases(&self.repo.flagged_accounts()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryRepository;
    use crate::types::{AlertType, QrClassification, Severity};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn engine() -> FraudEngine {
        FraudEngine::new(Arc::new(MemoryRepository::new()), &AppConfig::default())
    }

    fn qr(risk_score: u8) -> NewQrArtifact {
        NewQrArtifact {
            filename: "scan.png".into(),
            upi_id: Some("shop@upi".into()),
            merchant_name: None,
            amount: None,
            risk_score,
            classification: QrClassification::HighRisk,
            steganography_detected: true,
            confidence: dec!(97),
        }
    }

    /// A 30,000 transfer at 02:00 with five reverse-edge transfers and six
    /// other senders on its device: flash 40 + mule 25 + round 15 + odd hour 10.
    fn seed_critical(engine: &FraudEngine) -> DbId {
        let night = Utc.with_ymd_and_hms(2024, 3, 14, 2, 0, 0).unwrap();
        let subject = engine
            .submit(
                NewTransaction::new("A", "B", dec!(30000))
                    .at(night)
                    .with_device("dev-1"),
            )
            .unwrap();
        for i in 0..5 {
            engine
                .submit(
                    NewTransaction::new("B", format!("C{}", i), dec!(150))
                        .at(night + Duration::minutes(i)),
                )
                .unwrap();
        }
        for i in 0..6 {
            engine
                .submit(
                    NewTransaction::new(format!("M{}", i), "Z", dec!(75))
                        .at(night - Duration::days(3))
                        .with_device("dev-1"),
                )
                .unwrap();
        }
        subject.id
    }

    #[test]
    fn test_submit_validates() {
        let engine = engine();
        let err = engine.submit(NewTransaction::new("A", "B", dec!(-5))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(engine.transactions().unwrap().is_empty());

        engine.submit(NewTransaction::new("A", "B", dec!(5))).unwrap();
        assert_eq!(engine.metrics().transactions_submitted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_every_analysis_alerts_high_risk_transactions() {
        let engine = engine();
        let subject_id = seed_critical(&engine);

        let outcome = engine.analyze_all().unwrap();
        assert_eq!(outcome.report.high_risk_count, 1);
        assert_eq!(outcome.report.flagged_transactions[0].risk_score, 90);
        assert_eq!(outcome.report.flagged_transactions[0].pattern, PatternType::MuleNetwork);
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].severity, Severity::Critical);
        assert_eq!(outcome.alerts[0].title, "Mule-Network Pattern Detected");
        assert_eq!(outcome.alerts[0].account_id, Some(format!("transaction-{}", subject_id)));

        let again = engine.analyze_all().unwrap();
        assert_eq!(again.report, outcome.report);
        assert_eq!(again.alerts.len(), 1);
        assert_ne!(again.alerts[0].id, outcome.alerts[0].id);
        assert_eq!(again.alerts[0].link, outcome.alerts[0].link);
        assert_eq!(engine.list_alerts().unwrap().len(), 2);
        assert_eq!(engine.metrics().analyses_run.load(Ordering::Relaxed), 2);
        assert_eq!(engine.metrics().alerts_raised.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_qr_artifact_alert_boundary() {
        let engine = engine();
        let (artifact, alert) = engine.record_qr_artifact(qr(80)).unwrap();
        assert_eq!(artifact.id, 1);
        assert!(alert.is_none());

        let (_, alert) = engine.record_qr_artifact(qr(81)).unwrap();
        let alert = alert.unwrap();
        assert_eq!(alert.alert_type, AlertType::QrSteganography);
        assert_eq!(alert.severity, Severity::Critical);

        let err = engine.record_qr_artifact(qr(101)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_dashboard_stats() {
        let engine = engine();
        seed_critical(&engine);
        engine.analyze_all().unwrap();
        engine.record_qr_artifact(qr(20)).unwrap();
        engine
            .flag_account(FlagCommand::new("ACC-1", "structuring", 60))
            .unwrap();
        let case = engine
            .flag_account(FlagCommand::new("ACC-2", "mule", 70))
            .unwrap();
        engine
            .update_status(case.id, CaseStatus::UnderInvestigation, Some("analyst-1"))
            .unwrap();
        engine.acknowledge(1).unwrap();

        let stats = engine.dashboard_stats().unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_transactions: 12,
                suspicious_count: 1,
                high_risk_count: 1,
                qr_scanned: 1,
                active_alerts: 2,
                pending_flagged_accounts: 1,
            }
        );
    }

    #[test]
    fn test_dashboard_high_risk_ignores_alert_severity() {
        let mut config = AppConfig::default();
        config.alerts.critical_above = 95;
        let engine = FraudEngine::new(Arc::new(MemoryRepository::new()), &config);
        seed_critical(&engine);
        engine.analyze_all().unwrap();
        assert_eq!(engine.dashboard_stats().unwrap().high_risk_count, 1);

        config.detection.dashboard_high_risk_above = 95;
        let engine = FraudEngine::new(Arc::new(MemoryRepository::new()), &config);
        seed_critical(&engine);
        engine.analyze_all().unwrap();
        let stats = engine.dashboard_stats().unwrap();
        assert_eq!(stats.high_risk_count, 0);
        assert_eq!(stats.suspicious_count, 1);
    }

    #[test]
    fn test_transactions_by_pattern() {
        let engine = engine();
        seed_critical(&engine);
        assert!(engine
            .transactions_by_pattern(PatternType::MuleNetwork)
            .unwrap()
            .is_empty());

        engine.analyze_all().unwrap();
        // the six device peers see each other and the subject as peers too
        let mules = engine.transactions_by_pattern(PatternType::MuleNetwork).unwrap();
        assert_eq!(mules.len(), 7);
        assert_eq!(mules.iter().filter(|tx| tx.flagged).count(), 1);
        assert_eq!(mules.iter().filter(|tx| tx.risk_score == Some(35)).count(), 6);
    }
}
