//! Reconciliation reports
//!
//! A report captures one window's diff between ledger events and off-ledger
//! rows. Mismatches are sorted by reference and classification so re-running
//! the same window over the same inputs yields a byte-identical report.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use coop_core::Amount;

/// Classification of one reconciliation mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MismatchKind {
    /// Ledger event with no matching off-ledger row
    MissingOffLedger,
    /// Off-ledger row marked Completed with no matching ledger event
    MissingOnLedger,
    /// Matching pair with different amounts
    AmountMismatch,
    /// Same ledger reference appearing in two off-ledger rows
    DuplicateProcessing,
}

impl MismatchKind {
    /// Stable name used in CSV exports
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchKind::MissingOffLedger => "MissingOffLedger",
            MismatchKind::MissingOnLedger => "MissingOnLedger",
            MismatchKind::AmountMismatch => "AmountMismatch",
            MismatchKind::DuplicateProcessing => "DuplicateProcessing",
        }
    }
}

/// One discrepancy between the ledger and the off-ledger records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// The transaction reference in question
    pub reference: String,
    /// What kind of discrepancy this is
    pub kind: MismatchKind,
    /// The amount the ledger side implies
    pub expected: Amount,
    /// The amount the off-ledger side holds
    pub observed: Amount,
    /// Timestamp of the underlying record, in seconds
    pub timestamp: u64,
}

/// The outcome of reconciling one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Window start, inclusive, in seconds
    pub period_start: u64,
    /// Window end, exclusive, in seconds
    pub period_end: u64,
    /// Aggregate amount across considered ledger events
    pub ledger_total: Amount,
    /// Aggregate amount across considered off-ledger rows
    pub offledger_total: Amount,
    /// All discrepancies found, sorted by reference then classification
    pub mismatches: Vec<Mismatch>,
}

fn render_ts(secs: u64) -> String {
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

impl ReconciliationReport {
    /// Whether the window reconciled cleanly
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.ledger_total == self.offledger_total
    }

    /// Export as CSV: one row per mismatch plus a summary row
    pub fn to_csv(&self) -> String {
        let mut out = String::from("reference,classification,expected,observed,timestamp\n");
        for m in &self.mismatches {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                m.reference,
                m.kind.as_str(),
                m.expected,
                m.observed,
                render_ts(m.timestamp)
            ));
        }
        out.push_str(&format!(
            "SUMMARY,,{},{},{}\n",
            self.ledger_total,
            self.offledger_total,
            render_ts(self.period_end)
        ));
        out
    }
}
