//! QR artifact results handed over by the external image-analysis pipeline

use crate::error::EngineError;
use crate::types::DbId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QrClassification {
    Clean,
    Suspicious,
    HighRisk,
}

/// Analysis result as produced by the collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQrArtifact {
    pub filename: String,
    #[serde(default)]
    pub upi_id: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    pub risk_score: u8,
    pub classification: QrClassification,
    #[serde(default)]
    pub steganography_detected: bool,
    /// Confidence percentage (0 - 100)
    pub confidence: Decimal,
}

impl NewQrArtifact {
    /// Reject results outside the ranges the collaborator contract allows.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.filename.trim().is_empty() {
            return Err(EngineError::Validation("filename is required".into()));
        }
        if self.risk_score > 100 {
            return Err(EngineError::Validation(format!(
                "riskScore must be within 0..=100, got {}",
                self.risk_score
            )));
        }
        if self.confidence < Decimal::ZERO || self.confidence > Decimal::ONE_HUNDRED {
            return Err(EngineError::Validation(format!(
                "confidence must be a percentage, got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Stored QR artifact; read-only once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrArtifact {
    pub id: DbId,
    pub filename: String,
    pub upi_id: Option<String>,
    pub merchant_name: Option<String>,
    pub amount: Option<Decimal>,
    pub risk_score: u8,
    pub classification: QrClassification,
    pub steganography_detected: bool,
    pub confidence: Decimal,
    pub scanned_at: DateTime<Utc>,
}

impl QrArtifact {
    pub fn from_new(id: DbId, artifact: NewQrArtifact, scanned_at: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: artifact.filename,
            upi_id: artifact.upi_id,
            merchant_name: artifact.merchant_name,
            amount: artifact.amount,
            risk_score: artifact.risk_score,
            classification: artifact.classification,
            steganography_detected: artifact.steganography_detected,
            confidence: artifact.confidence,
            scanned_at,
        }
    }

    /// Identifier used as the alert subject: the UPI id when known.
    pub fn subject_id(&self) -> String {
        self.upi_id
            .clone()
            .unwrap_or_else(|| format!("qr-{}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn submission() -> NewQrArtifact {
        NewQrArtifact {
            filename: "menu.png".into(),
            upi_id: None,
            merchant_name: Some("Corner Cafe".into()),
            amount: Some(dec!(250.00)),
            risk_score: 35,
            classification: QrClassification::Suspicious,
            steganography_detected: false,
            confidence: dec!(88.40),
        }
    }

    #[test]
    fn test_validation_ranges() {
        assert!(submission().validate().is_ok());

        let mut bad = submission();
        bad.risk_score = 101;
        assert!(bad.validate().is_err());

        let mut bad = submission();
        bad.confidence = dec!(100.01);
        assert!(bad.validate().is_err());

        let mut bad = submission();
        bad.filename = "  ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_subject_falls_back_to_artifact_id() {
        let artifact = QrArtifact::from_new(4, submission(), Utc::now());
        assert_eq!(artifact.subject_id(), "qr-4");

        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["classification"], "suspicious");
        assert_eq!(json["merchantName"], "Corner Cafe");
    }
}
