//! Alert acknowledgement and flagged-account review lifecycle

use crate::alerts::AlertEmitter;
use crate::error::{EngineError, Result};
use crate::scoring::MAX_RISK_SCORE;
use crate::store::Repository;
use crate::types::{Alert, CaseStatus, DbId, FlaggedAccount};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Manual flag command as received from an analyst or upstream system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagCommand {
    #[serde(alias = "account_id")]
    pub account_id: String,
    #[serde(alias = "flag_reason")]
    pub flag_reason: String,
    #[serde(alias = "risk_score")]
    pub risk_score: u8,
}

impl FlagCommand {
    pub fn new(
        account_id: impl Into<String>,
        flag_reason: impl Into<String>,
        risk_score: u8,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            flag_reason: flag_reason.into(),
            risk_score,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(EngineError::Validation("accountId is required".into()));
        }
        if self.flag_reason.trim().is_empty() {
            return Err(EngineError::Validation("flagReason is required".into()));
        }
        if u32::from(self.risk_score) > MAX_RISK_SCORE {
            return Err(EngineError::Validation(format!(
                "riskScore must be within 0..={}, got {}",
                MAX_RISK_SCORE, self.risk_score
            )));
        }
        Ok(())
    }
}

/// Owns the alert and flagged-account state machines
pub struct CaseManager {
    emitter: AlertEmitter,
}

impl CaseManager {
    pub fn new(emitter: AlertEmitter) -> Self {
        Self { emitter }
    }

    /// Open a case and raise its companion `account-flagged` alert.
    pub fn flag_account(
        &self,
        repo: &dyn Repository,
        command: FlagCommand,
    ) -> Result<(FlaggedAccount, Alert)> {
        command.validate()?;

        let (case, alert) = repo.insert_flagged_account(
            command.account_id.trim().to_string(),
            command.flag_reason.trim().to_string(),
            command.risk_score,
            &|case| self.emitter.account_flagged(case),
        )?;

        info!(
            case_id = case.id,
            account_id = %case.account_id,
            risk_score = case.risk_score,
            severity = %alert.severity,
            "Account flagged"
        );
        Ok((case, alert))
    }

    /// Acknowledge an alert. A second call returns the alert unchanged.
    pub fn acknowledge(&self, repo: &dyn Repository, alert_id: DbId) -> Result<Alert> {
        repo.update_alert(alert_id, &mut |alert| {
            if alert.acknowledge() {
                info!(alert_id = alert.id, "Alert acknowledged");
            } else {
                debug!(alert_id = alert.id, "Alert already acknowledged");
            }
            Ok(())
        })
    }

    /// Move a case to `status`. Any status may follow any other; reopening
    /// fails with `Conflict` while the account has another open case.
    pub fn update_status(
        &self,
        repo: &dyn Repository,
        case_id: DbId,
        status: CaseStatus,
        reviewer: Option<&str>,
    ) -> Result<FlaggedAccount> {
        let now = Utc::now();
        let result = repo.update_flagged_account(case_id, &mut |case| {
            case.transition(status, reviewer, now);
            Ok(())
        });

        match &result {
            Ok(case) => info!(
                case_id,
                account_id = %case.account_id,
                status = %case.status,
                reviewed_by = case.reviewed_by.as_deref().unwrap_or("-"),
                "Case status updated"
            ),
            Err(e) => warn!(case_id, status = %status, error = %e, "Case status update rejected"),
        }
        result
    }

    pub fn list_alerts(&self, repo: &dyn Repository) -> Result<Vec<Alert>> {
        repo.alerts()
    }

    pub fn list_active_alerts(&self, repo: &dyn Repository) -> Result<Vec<Alert>> {
        Ok(repo.alerts()?.into_iter().filter(Alert::is_active).collect())
    }

    pub fn list_flagged_accounts(&self, repo: &dyn Repository) -> Result<Vec<FlaggedAccount>> {
        repo.flagged_accounts()
    }
}

impl Default for CaseManager {
    fn default() -> Self {
        Self::new(AlertEmitter::default())
    }
}
