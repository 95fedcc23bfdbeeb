//! Pattern detection and risk scoring

pub mod aggregator;
pub mod detectors;
pub mod history;

pub use aggregator::{RiskAggregator, RiskAssessment, MAX_RISK_SCORE};
pub use detectors::{Detection, Detector};
pub use history::{HistoryView, IndexedHistory, NaiveScan};
