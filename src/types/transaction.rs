//! Payment transaction records observed by the engine

use crate::error::EngineError;
use crate::types::DbId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Money amounts carry at most this many decimal places.
pub const AMOUNT_SCALE: u32 = 2;

/// Structural fraud pattern attached to a scored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternType {
    Normal,
    /// Many small payments from one sender
    Smurfing,
    /// Rapid transfers touching the reverse edge
    FlashLaundering,
    /// Several senders sharing one device
    MuleNetwork,
    /// Reserved tally bucket; no detector produces it
    CircularTransfer,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Normal => "normal",
            PatternType::Smurfing => "smurfing",
            PatternType::FlashLaundering => "flash-laundering",
            PatternType::MuleNetwork => "mule-network",
            PatternType::CircularTransfer => "circular-transfer",
        }
    }

    /// Title-case name used in alert headlines.
    pub fn display_name(&self) -> &'static str {
        match self {
            PatternType::Normal => "Normal",
            PatternType::Smurfing => "Smurfing",
            PatternType::FlashLaundering => "Flash-Laundering",
            PatternType::MuleNetwork => "Mule-Network",
            PatternType::CircularTransfer => "Circular-Transfer",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(PatternType::Normal),
            "smurfing" => Ok(PatternType::Smurfing),
            "flash-laundering" => Ok(PatternType::FlashLaundering),
            "mule-network" => Ok(PatternType::MuleNetwork),
            "circular-transfer" => Ok(PatternType::CircularTransfer),
            other => Err(EngineError::Validation(format!(
                "unknown pattern type '{}'",
                other
            ))),
        }
    }
}

/// A transaction submission, before the store assigns identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    #[serde(alias = "sender_id")]
    pub sender_id: String,
    #[serde(alias = "receiver_id")]
    pub receiver_id: String,
    pub amount: Decimal,
    /// Event time; the store stamps the current time when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "device_id")]
    pub device_id: Option<String>,
    #[serde(default, alias = "geo_ip")]
    pub geo_ip: Option<String>,
}

impl NewTransaction {
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            amount,
            timestamp: None,
            device_id: None,
            geo_ip: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_geo_ip(mut self, geo_ip: impl Into<String>) -> Self {
        self.geo_ip = Some(geo_ip.into());
        self
    }

    /// Reject submissions with missing parties or a malformed amount.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sender_id.trim().is_empty() {
            return Err(EngineError::Validation("senderId is required".into()));
        }
        if self.receiver_id.trim().is_empty() {
            return Err(EngineError::Validation("receiverId is required".into()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.amount.normalize().scale() > AMOUNT_SCALE {
            return Err(EngineError::Validation(format!(
                "amount {} has more than {} decimal places",
                self.amount, AMOUNT_SCALE
            )));
        }
        Ok(())
    }
}

/// A stored payment event.
///
/// Only `risk_score`, `pattern_type` and `flagged` change after creation, and
/// only through batch analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: DbId,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub device_id: Option<String>,
    pub geo_ip: Option<String>,
    /// Risk score (0 - 100), unset until first analysed
    pub risk_score: Option<u8>,
    pub pattern_type: Option<PatternType>,
    pub flagged: bool,
}

impl Transaction {
    /// Materialise a validated submission under a store-assigned id.
    pub fn from_submission(
        id: DbId,
        submission: NewTransaction,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender_id: submission.sender_id,
            receiver_id: submission.receiver_id,
            amount: submission.amount.round_dp(AMOUNT_SCALE),
            timestamp: submission.timestamp.unwrap_or(received_at),
            device_id: submission.device_id.filter(|d| !d.is_empty()),
            geo_ip: submission.geo_ip.filter(|g| !g.is_empty()),
            risk_score: None,
            pattern_type: None,
            flagged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pattern_type_wire_names() {
        let json = serde_json::to_string(&PatternType::FlashLaundering).unwrap();
        assert_eq!(json, "\"flash-laundering\"");
        assert_eq!("mule-network".parse::<PatternType>().unwrap(), PatternType::MuleNetwork);
        assert!("layering".parse::<PatternType>().is_err());
        assert!(serde_json::from_str::<PatternType>("\"layering\"").is_err());
    }

    #[test]
    fn test_submission_validation() {
        assert!(NewTransaction::new("A1", "B1", dec!(100.50)).validate().is_ok());
        assert!(NewTransaction::new(" ", "B1", dec!(100)).validate().is_err());
        assert!(NewTransaction::new("A1", "", dec!(100)).validate().is_err());
        assert!(NewTransaction::new("A1", "B1", dec!(0)).validate().is_err());
        assert!(NewTransaction::new("A1", "B1", dec!(-5)).validate().is_err());
        assert!(NewTransaction::new("A1", "B1", dec!(1.005)).validate().is_err());
        // trailing zeros do not count as extra precision
        assert!(NewTransaction::new("A1", "B1", dec!(1.500)).validate().is_ok());
    }

    #[test]
    fn test_submission_from_camel_case_json() {
        let json = r#"{"senderId":"A1","receiverId":"B2","amount":"2500.00","deviceId":"dev-9"}"#;
        let submission: NewTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(submission.amount, dec!(2500));
        assert_eq!(submission.device_id.as_deref(), Some("dev-9"));
        assert!(submission.timestamp.is_none());
    }

    #[test]
    fn test_from_submission_defaults_timestamp() {
        let now = Utc::now();
        let tx = Transaction::from_submission(7, NewTransaction::new("A1", "B1", dec!(10)), now);
        assert_eq!(tx.id, 7);
        assert_eq!(tx.timestamp, now);
        assert_eq!(tx.risk_score, None);
        assert!(!tx.flagged);
    }
}
