//! Alert construction and the severity policy shared by every alert source

use crate::analyzer::AnalysisReport;
use crate::config::AlertConfig;
use crate::types::{
    AlertType, EntityKind, EntityRef, FlaggedAccount, NewAlert, QrArtifact, Severity,
};
use serde_json::json;
use std::collections::HashMap;

/// Single severity rule applied to all alert types
#[derive(Debug, Clone, Copy)]
pub struct SeverityPolicy {
    critical_above: u8,
}

impl SeverityPolicy {
    pub fn new(critical_above: u8) -> Self {
        Self { critical_above }
    }

    /// Severity used when the score does not escalate to critical.
    pub fn default_for(alert_type: AlertType) -> Severity {
        match alert_type {
            AlertType::TransactionFraud => Severity::High,
            AlertType::AccountFlagged => Severity::High,
            AlertType::QrSteganography => Severity::High,
        }
    }

    pub fn grade(&self, alert_type: AlertType, risk_score: u8) -> Severity {
        if risk_score > self.critical_above {
            Severity::Critical
        } else {
            Self::default_for(alert_type)
        }
    }
}

/// What an alert source hands to the emitter
#[derive(Debug, Clone)]
pub struct RiskSignal {
    pub risk_score: u8,
    pub subject_id: String,
    pub evidence: String,
    pub link: Option<EntityRef>,
}

/// Turns risk signals into alert records
#[derive(Debug, Clone)]
pub struct AlertEmitter {
    policy: SeverityPolicy,
    transaction_alert_above: u8,
    qr_alert_above: u8,
}

impl AlertEmitter {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            policy: SeverityPolicy::new(config.critical_above),
            transaction_alert_above: config.transaction_alert_above,
            qr_alert_above: config.qr_alert_above,
        }
    }

    pub fn policy(&self) -> SeverityPolicy {
        self.policy
    }

    /// Build an alert for any source. Severity always comes from the policy.
    pub fn emit(
        &self,
        alert_type: AlertType,
        title: impl Into<String>,
        signal: RiskSignal,
    ) -> NewAlert {
        let mut metadata = HashMap::new();
        if let Some(link) = signal.link {
            let key = match link.kind {
                EntityKind::Transaction => "transactionId",
                EntityKind::QrArtifact => "qrArtifactId",
                EntityKind::FlaggedAccount => "flaggedAccountId",
            };
            metadata.insert(key.to_string(), json!(link.id));
        }

        NewAlert {
            alert_type,
            severity: self.policy.grade(alert_type, signal.risk_score),
            title: title.into(),
            description: signal.evidence,
            account_id: Some(signal.subject_id),
            risk_score: Some(signal.risk_score),
            link: signal.link,
            metadata,
        }
    }

    /// One transaction-fraud alert per listed transaction above the alert threshold.
    pub fn transaction_alerts(&self, report: &AnalysisReport) -> Vec<NewAlert> {
        report
            .flagged_transactions
            .iter()
            .filter(|flagged| flagged.risk_score > self.transaction_alert_above)
            .map(|flagged| {
                self.emit(
                    AlertType::TransactionFraud,
                    format!("{} Pattern Detected", flagged.pattern.display_name()),
                    RiskSignal {
                        risk_score: flagged.risk_score,
                        subject_id: format!("transaction-{}", flagged.id),
                        evidence: flagged.description.clone(),
                        link: Some(EntityRef::transaction(flagged.id)),
                    },
                )
            })
            .collect()
    }

    /// Companion alert for a manual flag; raised for every flag command.
    pub fn account_flagged(&self, case: &FlaggedAccount) -> NewAlert {
        self.emit(
            AlertType::AccountFlagged,
            "Account Flagged",
            RiskSignal {
                risk_score: case.risk_score,
                subject_id: case.account_id.clone(),
                evidence: format!("Account {} flagged for {}", case.account_id, case.flag_reason),
                link: Some(EntityRef::flagged_account(case.id)),
            },
        )
    }

    pub fn qr_alert(&self, artifact: &QrArtifact) -> Option<NewAlert> {
        if artifact.risk_score <= self.qr_alert_above {
            return None;
        }
        let subject_id = artifact.subject_id();
        Some(self.emit(
            AlertType::QrSteganography,
            "Steganographic QR Code Detected",
            RiskSignal {
                risk_score: artifact.risk_score,
                evidence: format!("Hidden payload found in QR code from {}", subject_id),
                subject_id,
                link: Some(EntityRef::qr_artifact(artifact.id)),
            },
        ))
    }
}

impl Default for AlertEmitter {
    fn default() -> Self {
        Self::new(&AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FlaggedTransaction;
    use crate::types::{PatternType, QrClassification};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn report_with(scores: &[u8]) -> AnalysisReport {
        AnalysisReport {
            total_analyzed: scores.len(),
            high_risk_count: scores.len(),
            flagged_transactions: scores
                .iter()
                .enumerate()
                .map(|(i, &risk_score)| FlaggedTransaction {
                    id: i as u64 + 1,
                    pattern: PatternType::FlashLaundering,
                    risk_score,
                    description: "Rapid circular transfers detected".into(),
                })
                .collect(),
            ..AnalysisReport::default()
        }
    }

    fn artifact(risk_score: u8, upi_id: Option<&str>) -> QrArtifact {
        QrArtifact {
            id: 3,
            filename: "menu.png".into(),
            upi_id: upi_id.map(Into::into),
            merchant_name: None,
            amount: None,
            risk_score,
            classification: QrClassification::HighRisk,
            steganography_detected: true,
            confidence: dec!(92.5),
            scanned_at: Utc::now(),
        }
    }

    #[test]
    fn test_policy_boundary() {
        let policy = SeverityPolicy::new(80);
        for alert_type in [
            AlertType::TransactionFraud,
            AlertType::AccountFlagged,
            AlertType::QrSteganography,
        ] {
            assert_eq!(policy.grade(alert_type, 81), Severity::Critical);
            assert_eq!(policy.grade(alert_type, 80), Severity::High);
            assert_eq!(policy.grade(alert_type, 0), Severity::High);
        }
    }

    #[test]
    fn test_transaction_alerts_above_threshold_only() {
        let emitter = AlertEmitter::default();
        let alerts = emitter.transaction_alerts(&report_with(&[75, 80, 81, 100]));

        assert_eq!(alerts.len(), 2);
        let first = &alerts[0];
        assert_eq!(first.alert_type, AlertType::TransactionFraud);
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.title, "Flash-Laundering Pattern Detected");
        assert_eq!(first.account_id.as_deref(), Some("transaction-3"));
        assert_eq!(first.risk_score, Some(81));
        assert_eq!(first.link, Some(EntityRef::transaction(3)));
        assert_eq!(first.metadata["transactionId"], json!(3));
    }

    #[test]
    fn test_account_flagged_alert() {
        let emitter = AlertEmitter::default();
        let case = FlaggedAccount::open(7, "ACC-9".into(), "structuring".into(), 80, Utc::now());
        let alert = emitter.account_flagged(&case);

        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.title, "Account Flagged");
        assert_eq!(alert.description, "Account ACC-9 flagged for structuring");
        assert_eq!(alert.metadata["flaggedAccountId"], json!(7));

        let case = FlaggedAccount::open(8, "ACC-9".into(), "structuring".into(), 81, Utc::now());
        assert_eq!(emitter.account_flagged(&case).severity, Severity::Critical);
    }

    #[test]
    fn test_qr_alert_threshold() {
        let emitter = AlertEmitter::default();
        assert!(emitter.qr_alert(&artifact(80, Some("merchant@upi"))).is_none());

        let alert = emitter.qr_alert(&artifact(81, Some("merchant@upi"))).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.description, "Hidden payload found in QR code from merchant@upi");
        assert_eq!(alert.account_id.as_deref(), Some("merchant@upi"));

        let anonymous = emitter.qr_alert(&artifact(95, None)).unwrap();
        assert_eq!(anonymous.account_id.as_deref(), Some("qr-3"));
    }
}
