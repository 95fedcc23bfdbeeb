//! Fraud alert data structures

use crate::error::EngineError;
use crate::types::DbId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Source of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    QrSteganography,
    TransactionFraud,
    AccountFlagged,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::QrSteganography => "qr-steganography",
            AlertType::TransactionFraud => "transaction-fraud",
            AlertType::AccountFlagged => "account-flagged",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, declared from most to least urgent.
///
/// The derived ordering follows declaration order, so sorting ascending puts
/// critical alerts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(EngineError::Validation(format!("unknown severity '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
}

/// Kind of record an alert points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Transaction,
    QrArtifact,
    FlaggedAccount,
}

/// Weak reference from an alert to the record that triggered it.
///
/// Holds identity only; the referenced record may change or disappear
/// without affecting the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: DbId,
}

impl EntityRef {
    pub fn transaction(id: DbId) -> Self {
        Self { kind: EntityKind::Transaction, id }
    }

    pub fn qr_artifact(id: DbId) -> Self {
        Self { kind: EntityKind::QrArtifact, id }
    }

    pub fn flagged_account(id: DbId) -> Self {
        Self { kind: EntityKind::FlaggedAccount, id }
    }
}

/// Alert content before the store assigns identity and creation time
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub account_id: Option<String>,
    pub risk_score: Option<u8>,
    pub link: Option<EntityRef>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Stored alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: DbId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub account_id: Option<String>,
    pub risk_score: Option<u8>,
    pub status: AlertStatus,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
    pub link: Option<EntityRef>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Alert {
    pub fn from_new(id: DbId, alert: NewAlert, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            alert_type: alert.alert_type,
            severity: alert.severity,
            title: alert.title,
            description: alert.description,
            account_id: alert.account_id,
            risk_score: alert.risk_score,
            status: AlertStatus::Active,
            acknowledged: false,
            created_at,
            link: alert.link,
            metadata: alert.metadata,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Move to `acknowledged`. Returns `false` when already there, in which
    /// case nothing is touched.
    pub fn acknowledge(&mut self) -> bool {
        if self.status == AlertStatus::Acknowledged {
            return false;
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Alert {
        Alert::from_new(
            1,
            NewAlert {
                alert_type: AlertType::TransactionFraud,
                severity: Severity::High,
                title: "Smurfing Pattern Detected".into(),
                description: "Multiple small transactions from same sender detected".into(),
                account_id: Some("transaction-4".into()),
                risk_score: Some(75),
                link: Some(EntityRef::transaction(4)),
                metadata: HashMap::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_severity_orders_by_urgency() {
        let mut levels = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        levels.sort();
        assert_eq!(
            levels,
            vec![Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        );
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_acknowledge_keeps_flag_and_status_in_step() {
        let mut alert = sample();
        assert!(alert.is_active());
        assert!(!alert.acknowledged);

        assert!(alert.acknowledge());
        assert_eq!(alert.status, AlertStatus::Acknowledged);
        assert!(alert.acknowledged);

        let before = alert.clone();
        assert!(!alert.acknowledge());
        assert_eq!(alert, before);
    }

    #[test]
    fn test_alert_serialization() {
        let alert = sample();
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "transaction-fraud");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["link"]["kind"], "transaction");
        assert_eq!(json["link"]["id"], 4);

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back, alert);
    }
}
