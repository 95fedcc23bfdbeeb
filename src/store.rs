//! Repository abstraction and the in-memory implementation.
//!
//! The engine never owns storage; it receives a [`Repository`] at
//! construction time. Every per-record mutation goes through a single call so
//! an implementation can apply it atomically.

use crate::error::{EngineError, Result};
use crate::types::{
    Alert, CaseStatus, DbId, FlaggedAccount, NewAlert, NewQrArtifact, NewTransaction,
    PatternType, QrArtifact, Transaction,
};
use chrono::Utc;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Risk fields written back for one transaction in a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskUpdate {
    pub risk_score: u8,
    pub pattern_type: PatternType,
    pub flagged: bool,
}

/// Mutation applied to a cloned record; an `Err` discards the clone.
pub type AlertUpdate<'a> = &'a mut dyn FnMut(&mut Alert) -> Result<()>;
pub type CaseUpdate<'a> = &'a mut dyn FnMut(&mut FlaggedAccount) -> Result<()>;
/// Builds the alert stored together with a newly opened case.
pub type CompanionAlert<'a> = &'a dyn Fn(&FlaggedAccount) -> NewAlert;

/// Storage collaborator consumed by the engine
pub trait Repository: Send + Sync {
    /// Append a validated submission, assigning id and (if absent) timestamp.
    fn insert_transaction(&self, submission: NewTransaction) -> Result<Transaction>;
    /// Full history in insertion order.
    fn transactions(&self) -> Result<Vec<Transaction>>;
    fn transactions_by_pattern(&self, pattern: PatternType) -> Result<Vec<Transaction>>;
    /// Write all risk fields of one transaction or none of them.
    fn update_transaction_risk(&self, id: DbId, update: RiskUpdate) -> Result<Transaction>;

    fn insert_alert(&self, alert: NewAlert) -> Result<Alert>;
    fn alerts(&self) -> Result<Vec<Alert>>;
    fn update_alert(&self, id: DbId, update: AlertUpdate<'_>) -> Result<Alert>;

    /// Open a case and store its companion alert; both are stored or neither.
    /// Fails with `Conflict` if the account already has an open case.
    fn insert_flagged_account(
        &self,
        account_id: String,
        flag_reason: String,
        risk_score: u8,
        companion: CompanionAlert<'_>,
    ) -> Result<(FlaggedAccount, Alert)>;
    fn flagged_accounts(&self) -> Result<Vec<FlaggedAccount>>;
    /// Fails with `Conflict` if the update would leave two open cases for one account.
    fn update_flagged_account(&self, id: DbId, update: CaseUpdate<'_>) -> Result<FlaggedAccount>;

    fn insert_qr_artifact(&self, artifact: NewQrArtifact) -> Result<QrArtifact>;
    fn qr_artifacts(&self) -> Result<Vec<QrArtifact>>;
}

/// Process-local repository backed by vectors behind `RwLock`s.
///
/// Ids are sequential per collection and equal to position + 1, so lookups
/// by id are direct indexing.
#[derive(Default)]
pub struct MemoryRepository {
    transactions: RwLock<Vec<Transaction>>,
    alerts: RwLock<Vec<Alert>>,
    flagged_accounts: RwLock<Vec<FlaggedAccount>>,
    qr_artifacts: RwLock<Vec<QrArtifact>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| EngineError::Storage(format!("Lock error: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| EngineError::Storage(format!("Lock error: {}", e)))
}

fn next_id(len: usize) -> DbId {
    len as DbId + 1
}

fn slot(id: DbId) -> Option<usize> {
    usize::try_from(id).ok()?.checked_sub(1)
}

impl Repository for MemoryRepository {
    fn insert_transaction(&self, submission: NewTransaction) -> Result<Transaction> {
        let mut transactions = write(&self.transactions)?;
        let tx = Transaction::from_submission(next_id(transactions.len()), submission, Utc::now());
        transactions.push(tx.clone());
        Ok(tx)
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(read(&self.transactions)?.clone())
    }

    fn transactions_by_pattern(&self, pattern: PatternType) -> Result<Vec<Transaction>> {
        Ok(read(&self.transactions)?
            .iter()
            .filter(|tx| tx.pattern_type == Some(pattern))
            .cloned()
            .collect())
    }

    fn update_transaction_risk(&self, id: DbId, update: RiskUpdate) -> Result<Transaction> {
        let mut transactions = write(&self.transactions)?;
        let tx = slot(id)
            .and_then(|i| transactions.get_mut(i))
            .ok_or_else(|| EngineError::not_found("transaction", id))?;

        tx.risk_score = Some(update.risk_score);
        tx.pattern_type = Some(update.pattern_type);
        tx.flagged = update.flagged;
        Ok(tx.clone())
    }

    fn insert_alert(&self, alert: NewAlert) -> Result<Alert> {
        let mut alerts = write(&self.alerts)?;
        let alert = Alert::from_new(next_id(alerts.len()), alert, Utc::now());
        debug!(alert_id = alert.id, alert_type = %alert.alert_type, "Stored alert");
        alerts.push(alert.clone());
        Ok(alert)
    }

    fn alerts(&self) -> Result<Vec<Alert>> {
        Ok(read(&self.alerts)?.clone())
    }

    fn update_alert(&self, id: DbId, update: AlertUpdate<'_>) -> Result<Alert> {
        let mut alerts = write(&self.alerts)?;
        let stored = slot(id)
            .and_then(|i| alerts.get_mut(i))
            .ok_or_else(|| EngineError::not_found("alert", id))?;

        let mut candidate = stored.clone();
        update(&mut candidate)?;
        *stored = candidate.clone();
        Ok(candidate)
    }

    fn insert_flagged_account(
        &self,
        account_id: String,
        flag_reason: String,
        risk_score: u8,
        companion: CompanionAlert<'_>,
    ) -> Result<(FlaggedAccount, Alert)> {
        // cases before alerts, the only place both are held
        let mut cases = write(&self.flagged_accounts)?;
        let mut alerts = write(&self.alerts)?;
        if cases
            .iter()
            .any(|c| c.account_id == account_id && c.status.is_open())
        {
            return Err(EngineError::Conflict(format!(
                "account {} already has an open case",
                account_id
            )));
        }

        let now = Utc::now();
        let case = FlaggedAccount::open(
            next_id(cases.len()),
            account_id,
            flag_reason,
            risk_score,
            now,
        );
        let alert = Alert::from_new(next_id(alerts.len()), companion(&case), now);
        debug!(case_id = case.id, alert_id = alert.id, "Stored case with companion alert");
        cases.push(case.clone());
        alerts.push(alert.clone());
        Ok((case, alert))
    }

    fn flagged_accounts(&self) -> Result<Vec<FlaggedAccount>> {
        Ok(read(&self.flagged_accounts)?.clone())
    }

    fn update_flagged_account(&self, id: DbId, update: CaseUpdate<'_>) -> Result<FlaggedAccount> {
        let mut cases = write(&self.flagged_accounts)?;
        let index = slot(id)
            .filter(|&i| i < cases.len())
            .ok_or_else(|| EngineError::not_found("flagged account", id))?;

        let mut candidate = cases[index].clone();
        update(&mut candidate)?;

        if candidate.status.is_open()
            && cases.iter().any(|c| {
                c.id != candidate.id && c.account_id == candidate.account_id && c.status.is_open()
            })
        {
            return Err(EngineError::Conflict(format!(
                "account {} already has another open case",
                candidate.account_id
            )));
        }

        cases[index] = candidate.clone();
        Ok(candidate)
    }

    fn insert_qr_artifact(&self, artifact: NewQrArtifact) -> Result<QrArtifact> {
        let mut artifacts = write(&self.qr_artifacts)?;
        let artifact = QrArtifact::from_new(next_id(artifacts.len()), artifact, Utc::now());
        artifacts.push(artifact.clone());
        Ok(artifact)
    }

    fn qr_artifacts(&self) -> Result<Vec<QrArtifact>> {
        Ok(read(&self.qr_artifacts)?.clone())
    }
}

/// Count of cases awaiting a first decision.
pub fn pending_cases(cases: &[FlaggedAccount]) -> usize {
    cases
        .iter()
        .filter(|c| c.status == CaseStatus::Pending)
        .count()
}
