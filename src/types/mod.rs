//! Type definitions for the fraud risk engine

pub mod account;
pub mod alert;
pub mod qr;
pub mod transaction;

pub use account::{CaseStatus, FlaggedAccount};
pub use alert::{Alert, AlertStatus, AlertType, EntityKind, EntityRef, NewAlert, Severity};
pub use qr::{NewQrArtifact, QrArtifact, QrClassification};
pub use transaction::{NewTransaction, PatternType, Transaction};

/// Identifier assigned by the repository to every stored record.
pub type DbId = u64;
