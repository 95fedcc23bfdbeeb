//! Heuristic pattern detectors.
//!
//! Each detector inspects one transaction against the history and reports a
//! partial risk contribution. Detectors never mutate the history and give the
//! same answer however often they are run.

use crate::config::{
    FlashLaunderingConfig, ModifierConfig, MuleNetworkConfig, SmurfingConfig,
};
use crate::error::{EngineError, Result};
use crate::scoring::history::HistoryView;
use crate::types::{PatternType, Transaction};
use chrono::{Duration, Timelike};
use rust_decimal::Decimal;

/// Outcome of a single detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub contribution: u32,
    pub matched: bool,
    pub evidence: &'static str,
}

impl Detection {
    pub fn miss(evidence: &'static str) -> Self {
        Self {
            contribution: 0,
            matched: false,
            evidence,
        }
    }

    pub fn hit(contribution: u32, evidence: &'static str) -> Self {
        Self {
            contribution,
            matched: true,
            evidence,
        }
    }
}

/// A single fraud heuristic
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Label assigned when this detector matches; `None` for modifiers,
    /// which add risk without labelling the transaction.
    fn pattern(&self) -> Option<PatternType>;

    fn evaluate(&self, subject: &Transaction, history: &dyn HistoryView) -> Result<Detection>;
}

/// Many small payments from one sender around the same time.
pub struct SmurfingDetector {
    window: Duration,
    count_above: usize,
    amount_below: Decimal,
    score: u32,
}

impl SmurfingDetector {
    pub const EVIDENCE: &'static str = "Multiple small transactions from same sender detected";

    pub fn new(config: &SmurfingConfig) -> Self {
        Self {
            window: Duration::hours(config.window_hours),
            count_above: config.count_above,
            amount_below: config.amount_below,
            score: config.score,
        }
    }
}

impl Detector for SmurfingDetector {
    fn name(&self) -> &'static str {
        "smurfing"
    }

    fn pattern(&self) -> Option<PatternType> {
        Some(PatternType::Smurfing)
    }

    fn evaluate(&self, subject: &Transaction, history: &dyn HistoryView) -> Result<Detection> {
        if subject.amount >= self.amount_below {
            return Ok(Detection::miss(Self::EVIDENCE));
        }
        let activity = history.sender_activity(subject, self.window)?;
        if activity > self.count_above {
            Ok(Detection::hit(self.score, Self::EVIDENCE))
        } else {
            Ok(Detection::miss(Self::EVIDENCE))
        }
    }
}

/// Large transfers surrounded by rapid activity on the reverse edge.
pub struct FlashLaunderingDetector {
    window: Duration,
    count_above: usize,
    amount_above: Decimal,
    score: u32,
}

impl FlashLaunderingDetector {
    pub const EVIDENCE: &'static str = "Rapid circular transfers detected";

    pub fn new(config: &FlashLaunderingConfig) -> Self {
        Self {
            window: Duration::minutes(config.window_minutes),
            count_above: config.count_above,
            amount_above: config.amount_above,
            score: config.score,
        }
    }
}

impl Detector for FlashLaunderingDetector {
    fn name(&self) -> &'static str {
        "flash-laundering"
    }

    fn pattern(&self) -> Option<PatternType> {
        Some(PatternType::FlashLaundering)
    }

    fn evaluate(&self, subject: &Transaction, history: &dyn HistoryView) -> Result<Detection> {
        if subject.amount <= self.amount_above {
            return Ok(Detection::miss(Self::EVIDENCE));
        }
        let activity = history.reverse_edge_activity(subject, self.window)?;
        if activity > self.count_above {
            Ok(Detection::hit(self.score, Self::EVIDENCE))
        } else {
            Ok(Detection::miss(Self::EVIDENCE))
        }
    }
}

/// Several sender accounts operated from one device.
pub struct MuleNetworkDetector {
    count_above: usize,
    score: u32,
}

impl MuleNetworkDetector {
    pub const EVIDENCE: &'static str = "Multiple accounts on same device detected";

    pub fn new(config: &MuleNetworkConfig) -> Self {
        Self {
            count_above: config.count_above,
            score: config.score,
        }
    }
}

impl Detector for MuleNetworkDetector {
    fn name(&self) -> &'static str {
        "mule-network"
    }

    fn pattern(&self) -> Option<PatternType> {
        Some(PatternType::MuleNetwork)
    }

    fn evaluate(&self, subject: &Transaction, history: &dyn HistoryView) -> Result<Detection> {
        if subject.device_id.is_none() {
            return Ok(Detection::miss(Self::EVIDENCE));
        }
        if history.device_peers(subject)? > self.count_above {
            Ok(Detection::hit(self.score, Self::EVIDENCE))
        } else {
            Ok(Detection::miss(Self::EVIDENCE))
        }
    }
}

/// Amounts just under limits or in exact round units.
pub struct RoundAmountModifier {
    suspicious_amounts: Vec<Decimal>,
    unit: Decimal,
    score: u32,
}

impl RoundAmountModifier {
    pub const EVIDENCE: &'static str = "Suspicious amount pattern";

    pub fn new(config: &ModifierConfig) -> Self {
        Self {
            suspicious_amounts: config.suspicious_amounts.clone(),
            unit: config.round_amount_unit,
            score: config.round_amount_score,
        }
    }
}

impl Detector for RoundAmountModifier {
    fn name(&self) -> &'static str {
        "round-amount"
    }

    fn pattern(&self) -> Option<PatternType> {
        None
    }

    fn evaluate(&self, subject: &Transaction, _history: &dyn HistoryView) -> Result<Detection> {
        let remainder = subject
            .amount
            .checked_rem(self.unit)
            .ok_or_else(|| EngineError::Analysis {
                transaction_id: subject.id,
                reason: format!("cannot divide amount by round unit {}", self.unit),
            })?;

        if self.suspicious_amounts.contains(&subject.amount) || remainder.is_zero() {
            Ok(Detection::hit(self.score, Self::EVIDENCE))
        } else {
            Ok(Detection::miss(Self::EVIDENCE))
        }
    }
}

/// Payments made in the middle of the night, local time.
pub struct OddHourModifier {
    before: u32,
    after: u32,
    utc_offset: Duration,
    score: u32,
}

impl OddHourModifier {
    pub const EVIDENCE: &'static str = "Unusual timing";

    pub fn new(config: &ModifierConfig) -> Self {
        Self {
            before: config.odd_hour_before,
            after: config.odd_hour_after,
            utc_offset: Duration::hours(i64::from(config.utc_offset_hours)),
            score: config.odd_hour_score,
        }
    }
}

impl Detector for OddHourModifier {
    fn name(&self) -> &'static str {
        "odd-hour"
    }

    fn pattern(&self) -> Option<PatternType> {
        None
    }

    fn evaluate(&self, subject: &Transaction, _history: &dyn HistoryView) -> Result<Detection> {
        let local = subject
            .timestamp
            .naive_utc()
            .checked_add_signed(self.utc_offset)
            .ok_or_else(|| EngineError::Analysis {
                transaction_id: subject.id,
                reason: "timestamp out of range for local clock".to_string(),
            })?;

        let hour = local.hour();
        if hour < self.before || hour > self.after {
            Ok(Detection::hit(self.score, Self::EVIDENCE))
        } else {
            Ok(Detection::miss(Self::EVIDENCE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::scoring::history::NaiveScan;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, hour, minute, 0).unwrap()
    }

    fn tx(
        id: u64,
        sender: &str,
        receiver: &str,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id,
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            amount,
            timestamp,
            device_id: None,
            geo_ip: None,
            risk_score: None,
            pattern_type: None,
            flagged: false,
        }
    }

    #[test]
    fn test_smurfing_needs_more_than_ten() {
        let config = DetectionConfig::default();
        let detector = SmurfingDetector::new(&config.smurfing);

        let mut history: Vec<Transaction> = (0..10)
            .map(|i| tx(i + 1, "S", &format!("R{}", i), dec!(5000), at(12, i as u32)))
            .collect();
        let scan = NaiveScan::new(&history);
        assert!(!detector.evaluate(&history[0], &scan).unwrap().matched);

        history.push(tx(11, "S", "R10", dec!(5000), at(12, 30)));
        let scan = NaiveScan::new(&history);
        let detection = detector.evaluate(&history[0], &scan).unwrap();
        assert!(detection.matched);
        assert_eq!(detection.contribution, 30);

        // the amount bound is strict
        let large = tx(12, "S", "R11", dec!(10000), at(12, 31));
        history.push(large.clone());
        let scan = NaiveScan::new(&history);
        assert!(!detector.evaluate(&large, &scan).unwrap().matched);
    }

    #[test]
    fn test_flash_laundering_on_reverse_edge() {
        let config = DetectionConfig::default();
        let detector = FlashLaunderingDetector::new(&config.flash_laundering);

        let subject = tx(1, "A", "B", dec!(25000), at(12, 0));
        let mut history = vec![subject.clone()];
        for i in 0..4 {
            history.push(tx(i + 2, "B", "C", dec!(6000), at(12, 10 + i as u32)));
        }
        let scan = NaiveScan::new(&history);
        let detection = detector.evaluate(&subject, &scan).unwrap();
        assert!(detection.matched);
        assert_eq!(detection.contribution, 40);

        let small = tx(1, "A", "B", dec!(20000), at(12, 0));
        assert!(!detector.evaluate(&small, &scan).unwrap().matched);
    }

    #[test]
    fn test_mule_network_requires_device() {
        let config = DetectionConfig::default();
        let detector = MuleNetworkDetector::new(&config.mule_network);

        let mut history: Vec<Transaction> = (0..6)
            .map(|i| {
                let mut t = tx(i + 1, &format!("S{}", i), "M", dec!(100), at(10, 0));
                t.device_id = Some("shared-device".into());
                t
            })
            .collect();
        let mut subject = tx(7, "S-main", "M", dec!(100), at(10, 5));
        subject.device_id = Some("shared-device".into());
        history.push(subject.clone());

        let scan = NaiveScan::new(&history);
        assert!(detector.evaluate(&subject, &scan).unwrap().matched);

        subject.device_id = None;
        assert!(!detector.evaluate(&subject, &scan).unwrap().matched);
    }

    #[test]
    fn test_round_amount_modifier() {
        let config = DetectionConfig::default();
        let modifier = RoundAmountModifier::new(&config.modifiers);
        let scan = NaiveScan::new(&[]);

        for amount in [dec!(9999), dec!(49999), dec!(10000), dec!(30000.00)] {
            let t = tx(1, "A", "B", amount, at(12, 0));
            assert!(modifier.evaluate(&t, &scan).unwrap().matched, "{}", amount);
        }
        for amount in [dec!(9999.50), dec!(15000), dec!(2000)] {
            let t = tx(1, "A", "B", amount, at(12, 0));
            assert!(!modifier.evaluate(&t, &scan).unwrap().matched, "{}", amount);
        }
    }

    #[test]
    fn test_round_amount_zero_unit_is_analysis_failure() {
        let mut config = DetectionConfig::default();
        config.modifiers.round_amount_unit = Decimal::ZERO;
        let modifier = RoundAmountModifier::new(&config.modifiers);
        let t = tx(5, "A", "B", dec!(100), at(12, 0));
        let err = modifier.evaluate(&t, &NaiveScan::new(&[])).unwrap_err();
        assert!(matches!(err, EngineError::Analysis { transaction_id: 5, .. }));
    }

    #[test]
    fn test_odd_hour_uses_local_offset() {
        let mut config = DetectionConfig::default();
        let scan = NaiveScan::new(&[]);

        let modifier = OddHourModifier::new(&config.modifiers);
        assert!(modifier.evaluate(&tx(1, "A", "B", dec!(1), at(5, 59)), &scan).unwrap().matched);
        assert!(!modifier.evaluate(&tx(1, "A", "B", dec!(1), at(6, 0)), &scan).unwrap().matched);
        assert!(!modifier.evaluate(&tx(1, "A", "B", dec!(1), at(23, 30)), &scan).unwrap().matched);

        // 02:00 UTC is 07:00 at UTC+5, 20:00 UTC is 01:00
        config.modifiers.utc_offset_hours = 5;
        let modifier = OddHourModifier::new(&config.modifiers);
        assert!(!modifier.evaluate(&tx(1, "A", "B", dec!(1), at(2, 0)), &scan).unwrap().matched);
        assert!(modifier.evaluate(&tx(1, "A", "B", dec!(1), at(20, 0)), &scan).unwrap().matched);
    }
}
