//! Lookups over the transaction history used by the detectors.
//!
//! [`NaiveScan`] defines the semantics: every query walks the full history.
//! [`IndexedHistory`] answers the same queries from per-batch indexes and must
//! return identical counts.

use crate::error::{EngineError, Result};
use crate::types::Transaction;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Related-transaction counts for a subject transaction
pub trait HistoryView: Sync {
    /// Transactions from the subject's sender with `|Δt| < window`, subject included.
    fn sender_activity(&self, subject: &Transaction, window: Duration) -> Result<usize>;

    /// Transactions with `|Δt| < window` where the other sender is the
    /// subject's receiver or the other receiver is the subject's sender.
    fn reverse_edge_activity(&self, subject: &Transaction, window: Duration) -> Result<usize>;

    /// Transactions on the subject's device sent by a different sender.
    /// Zero when the subject carries no device id.
    fn device_peers(&self, subject: &Transaction) -> Result<usize>;
}

fn within(a: DateTime<Utc>, b: DateTime<Utc>, window: Duration) -> bool {
    let delta = a - b;
    delta < window && delta > -window
}

/// All-pairs scan over a history slice
pub struct NaiveScan<'a> {
    history: &'a [Transaction],
}

impl<'a> NaiveScan<'a> {
    pub fn new(history: &'a [Transaction]) -> Self {
        Self { history }
    }
}

impl HistoryView for NaiveScan<'_> {
    fn sender_activity(&self, subject: &Transaction, window: Duration) -> Result<usize> {
        Ok(self
            .history
            .iter()
            .filter(|tx| {
                tx.sender_id == subject.sender_id && within(tx.timestamp, subject.timestamp, window)
            })
            .count())
    }

    fn reverse_edge_activity(&self, subject: &Transaction, window: Duration) -> Result<usize> {
        Ok(self
            .history
            .iter()
            .filter(|tx| {
                (tx.sender_id == subject.receiver_id || tx.receiver_id == subject.sender_id)
                    && within(tx.timestamp, subject.timestamp, window)
            })
            .count())
    }

    fn device_peers(&self, subject: &Transaction) -> Result<usize> {
        let Some(device) = subject.device_id.as_deref() else {
            return Ok(0);
        };
        Ok(self
            .history
            .iter()
            .filter(|tx| {
                tx.device_id.as_deref() == Some(device) && tx.sender_id != subject.sender_id
            })
            .count())
    }
}

/// Sender, receiver, edge and device indexes built once per batch.
///
/// Timestamp lists are sorted so window counts are two binary searches.
pub struct IndexedHistory<'a> {
    by_sender: HashMap<&'a str, Vec<DateTime<Utc>>>,
    by_receiver: HashMap<&'a str, Vec<DateTime<Utc>>>,
    by_edge: HashMap<(&'a str, &'a str), Vec<DateTime<Utc>>>,
    by_device: HashMap<&'a str, usize>,
    by_device_sender: HashMap<(&'a str, &'a str), usize>,
}

impl<'a> IndexedHistory<'a> {
    pub fn build(history: &'a [Transaction]) -> Self {
        let mut index = Self {
            by_sender: HashMap::new(),
            by_receiver: HashMap::new(),
            by_edge: HashMap::new(),
            by_device: HashMap::new(),
            by_device_sender: HashMap::new(),
        };

        for tx in history {
            let sender = tx.sender_id.as_str();
            let receiver = tx.receiver_id.as_str();
            index.by_sender.entry(sender).or_default().push(tx.timestamp);
            index.by_receiver.entry(receiver).or_default().push(tx.timestamp);
            index
                .by_edge
                .entry((sender, receiver))
                .or_default()
                .push(tx.timestamp);
            if let Some(device) = tx.device_id.as_deref() {
                *index.by_device.entry(device).or_insert(0) += 1;
                *index.by_device_sender.entry((device, sender)).or_insert(0) += 1;
            }
        }

        for times in index
            .by_sender
            .values_mut()
            .chain(index.by_receiver.values_mut())
            .chain(index.by_edge.values_mut())
        {
            times.sort_unstable();
        }

        index
    }

    fn ensure_indexed(&self, subject: &Transaction) -> Result<()> {
        if self.by_sender.contains_key(subject.sender_id.as_str()) {
            Ok(())
        } else {
            Err(EngineError::Analysis {
                transaction_id: subject.id,
                reason: "transaction is not part of the indexed history".to_string(),
            })
        }
    }
}

/// Entries of a sorted list strictly inside `(at - window, at + window)`.
fn count_within(times: Option<&Vec<DateTime<Utc>>>, at: DateTime<Utc>, window: Duration) -> usize {
    let Some(times) = times else {
        return 0;
    };
    let lower = match at.checked_sub_signed(window) {
        Some(bound) => times.partition_point(|t| *t <= bound),
        None => 0,
    };
    let upper = match at.checked_add_signed(window) {
        Some(bound) => times.partition_point(|t| *t < bound),
        None => times.len(),
    };
    upper.saturating_sub(lower)
}

impl HistoryView for IndexedHistory<'_> {
    fn sender_activity(&self, subject: &Transaction, window: Duration) -> Result<usize> {
        self.ensure_indexed(subject)?;
        Ok(count_within(
            self.by_sender.get(subject.sender_id.as_str()),
            subject.timestamp,
            window,
        ))
    }

    fn reverse_edge_activity(&self, subject: &Transaction, window: Duration) -> Result<usize> {
        self.ensure_indexed(subject)?;
        let sent_by_receiver = count_within(
            self.by_sender.get(subject.receiver_id.as_str()),
            subject.timestamp,
            window,
        );
        let received_by_sender = count_within(
            self.by_receiver.get(subject.sender_id.as_str()),
            subject.timestamp,
            window,
        );
        // receiver -> sender transfers satisfy both conditions
        let both = count_within(
            self.by_edge
                .get(&(subject.receiver_id.as_str(), subject.sender_id.as_str())),
            subject.timestamp,
            window,
        );
        Ok(sent_by_receiver + received_by_sender - both)
    }

    fn device_peers(&self, subject: &Transaction) -> Result<usize> {
        self.ensure_indexed(subject)?;
        let Some(device) = subject.device_id.as_deref() else {
            return Ok(0);
        };
        let total = self.by_device.get(device).copied().unwrap_or(0);
        let own = self
            .by_device_sender
            .get(&(device, subject.sender_id.as_str()))
            .copied()
            .unwrap_or(0);
        Ok(total - own)
    }
}
