//! Flagged-account review cases

use crate::error::EngineError;
use crate::types::DbId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Review status of a flagged account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    Pending,
    UnderInvestigation,
    Resolved,
    FalsePositive,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::UnderInvestigation => "under-investigation",
            CaseStatus::Resolved => "resolved",
            CaseStatus::FalsePositive => "false-positive",
        }
    }

    /// Open cases still await a disposition.
    pub fn is_open(&self) -> bool {
        matches!(self, CaseStatus::Pending | CaseStatus::UnderInvestigation)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CaseStatus::Pending),
            "under-investigation" => Ok(CaseStatus::UnderInvestigation),
            "resolved" => Ok(CaseStatus::Resolved),
            "false-positive" => Ok(CaseStatus::FalsePositive),
            other => Err(EngineError::Validation(format!(
                "unknown case status '{}'",
                other
            ))),
        }
    }
}

/// An account placed in the manual review queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedAccount {
    pub id: DbId,
    pub account_id: String,
    pub flag_reason: String,
    pub risk_score: u8,
    pub status: CaseStatus,
    pub flagged_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl FlaggedAccount {
    pub fn open(
        id: DbId,
        account_id: String,
        flag_reason: String,
        risk_score: u8,
        flagged_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            flag_reason,
            risk_score,
            status: CaseStatus::Pending,
            flagged_at,
            reviewed_at: None,
            reviewed_by: None,
            metadata: HashMap::new(),
        }
    }

    /// Apply a review decision.
    ///
    /// Any status may follow any other, so closed cases can be reopened to
    /// correct an analyst mistake. The review time is refreshed on every call;
    /// a previous reviewer is kept when none is supplied.
    pub fn transition(&mut self, status: CaseStatus, reviewer: Option<&str>, at: DateTime<Utc>) {
        self.status = status;
        self.reviewed_at = Some(at);
        if let Some(reviewer) = reviewer.filter(|r| !r.trim().is_empty()) {
            self.reviewed_by = Some(reviewer.to_string());
        }
    }
}
