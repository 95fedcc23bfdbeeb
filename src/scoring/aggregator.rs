//! Score aggregation across detectors

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::scoring::detectors::{
    Detector, FlashLaunderingDetector, MuleNetworkDetector, OddHourModifier,
    RoundAmountModifier, SmurfingDetector,
};
use crate::scoring::history::HistoryView;
use crate::types::{PatternType, Transaction};

/// Upper bound of a transaction risk score.
pub const MAX_RISK_SCORE: u32 = 100;

const NORMAL_DESCRIPTION: &str = "Normal transaction pattern";

/// Combined verdict for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    /// Clamped risk score (0 - 100)
    pub risk_score: u8,
    /// Label of the last structural detector that matched
    pub pattern: PatternType,
    pub description: String,
    /// Names of every detector that contributed
    pub triggered: Vec<&'static str>,
}

/// Runs the detectors in a fixed order and combines their output.
///
/// Structural detectors run smurfing, flash-laundering, mule-network; a later
/// match replaces the label of an earlier one. Modifiers always run afterwards
/// and only add risk and a description clause.
pub struct RiskAggregator {
    structural: Vec<Box<dyn Detector>>,
    modifiers: Vec<Box<dyn Detector>>,
}

impl RiskAggregator {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            structural: vec![
                Box::new(SmurfingDetector::new(&config.smurfing)),
                Box::new(FlashLaunderingDetector::new(&config.flash_laundering)),
                Box::new(MuleNetworkDetector::new(&config.mule_network)),
            ],
            modifiers: vec![
                Box::new(RoundAmountModifier::new(&config.modifiers)),
                Box::new(OddHourModifier::new(&config.modifiers)),
            ],
        }
    }

    /// Assess one transaction. Any detector fault fails the whole assessment.
    pub fn assess(
        &self,
        subject: &Transaction,
        history: &dyn HistoryView,
    ) -> Result<RiskAssessment> {
        let mut total: u32 = 0;
        let mut pattern = PatternType::Normal;
        let mut findings: Vec<&'static str> = Vec::new();
        let mut clauses: Vec<&'static str> = Vec::new();
        let mut triggered = Vec::new();

        for detector in &self.structural {
            let detection = detector.evaluate(subject, history)?;
            if detection.matched {
                total = total.saturating_add(detection.contribution);
                if let Some(label) = detector.pattern() {
                    pattern = label;
                }
                findings.push(detection.evidence);
                triggered.push(detector.name());
            }
        }

        for modifier in &self.modifiers {
            let detection = modifier.evaluate(subject, history)?;
            if detection.matched {
                total = total.saturating_add(detection.contribution);
                clauses.push(detection.evidence);
                triggered.push(modifier.name());
            }
        }

        let mut description = if findings.is_empty() {
            NORMAL_DESCRIPTION.to_string()
        } else {
            findings.join(". ")
        };
        for clause in clauses {
            description.push_str(". ");
            description.push_str(clause);
        }

        Ok(RiskAssessment {
            risk_score: total.min(MAX_RISK_SCORE) as u8,
            pattern,
            description,
            triggered,
        })
    }

    /// Names of all detectors in evaluation order.
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.structural
            .iter()
            .chain(self.modifiers.iter())
            .map(|d| d.name())
            .collect()
    }
}

impl Default for RiskAggregator {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}
