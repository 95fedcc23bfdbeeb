//! Fraud Risk Engine Library
//!
//! Scores payment transactions for fraud patterns over the full history,
//! raises severity-graded alerts and tracks flagged accounts through review.

pub mod alerts;
pub mod analyzer;
pub mod cases;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod scoring;
pub mod store;
pub mod types;

pub use analyzer::{AnalysisReport, BatchAnalyzer};
pub use cases::FlagCommand;
pub use config::AppConfig;
pub use engine::{AnalysisOutcome, DashboardStats, FraudEngine};
pub use error::{EngineError, ErrorKind, Result};
pub use producer::AlertProducer;
pub use store::{MemoryRepository, Repository};
pub use types::{Alert, FlaggedAccount, NewTransaction, Transaction};
