//! The reconciliation service
//!
//! Periodically reads ledger events and off-ledger rows for a window, builds
//! two keyed sets by transaction reference, and diffs them. The service never
//! mutates ledger state. Ledger events younger than the grace period are not
//! flagged as missing off-ledger, since off-ledger visibility is an
//! eventually consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

use coop_core::utils::timestamp_secs;
use coop_core::{Amount, JsonStorage, Storage};
use coop_ledger::{EventKind, EventLog, LedgerEvent};

use crate::offledger::{OnrampStatus, OnrampStore};
use crate::report::{Mismatch, MismatchKind, ReconciliationReport};
use crate::ReconResult;

/// Read access to ledger events, abstracted so runs can be tested against a
/// failing ledger
#[async_trait]
pub trait LedgerView: Send + Sync {
    /// All events with `start <= timestamp < end`
    async fn events_in_window(&self, start: u64, end: u64) -> ReconResult<Vec<LedgerEvent>>;
}

#[async_trait]
impl LedgerView for EventLog {
    async fn events_in_window(&self, start: u64, end: u64) -> ReconResult<Vec<LedgerEvent>> {
        Ok(EventLog::events_in_window(self, start, end).await?)
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Seconds between scheduled runs
    pub interval_secs: u64,
    /// Ledger events younger than this are exempt from MissingOffLedger
    pub grace_secs: u64,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            grace_secs: 3600,
        }
    }
}

/// One ledger-side entry under consideration
struct LedgerEntry {
    amount: Amount,
    timestamp: u64,
}

/// The reconciliation service
pub struct ReconciliationService {
    ledger: Arc<dyn LedgerView>,
    store: Arc<OnrampStore>,
    storage: Arc<dyn Storage>,
    config: ReconConfig,
}

impl ReconciliationService {
    /// Create the service
    pub fn new(
        ledger: Arc<dyn LedgerView>,
        store: Arc<OnrampStore>,
        storage: Arc<dyn Storage>,
        config: ReconConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            storage,
            config,
        }
    }

    /// Events the reconciliation correlates: onramp mints, transfers, and
    /// settled purchases. The event amount is the correlated quantity.
    fn considered(event: &LedgerEvent) -> Option<Amount> {
        match &event.kind {
            EventKind::Minted {
                amount,
                rate_limited: true,
                ..
            } => Some(*amount),
            EventKind::Transferred { amount, .. } => Some(*amount),
            EventKind::PurchaseSettled { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    /// Reconcile one window and produce a report
    ///
    /// Pure with respect to its inputs: the same window over the same ledger
    /// and off-ledger state yields an identical report, so retried jobs are
    /// idempotent.
    pub async fn run_window(&self, start: u64, end: u64) -> ReconResult<ReconciliationReport> {
        let events = self.ledger.events_in_window(start, end).await?;

        // Ledger side, keyed by reference
        let mut ledger_side: HashMap<String, LedgerEntry> = HashMap::new();
        for event in &events {
            if let Some(amount) = Self::considered(event) {
                ledger_side.insert(
                    event.reference.clone(),
                    LedgerEntry {
                        amount,
                        timestamp: event.timestamp,
                    },
                );
            }
        }

        // Off-ledger side: completed onramp rows and purchase rows in-window,
        // keyed by the same references; duplicates are counted as they appear
        let mut off_side: HashMap<String, (Amount, u64)> = HashMap::new();
        let mut duplicate_refs: Vec<String> = Vec::new();
        let mut offledger_total = Amount::ZERO;

        for row in self.store.onramp_rows().await {
            if row.status != OnrampStatus::Completed {
                continue;
            }
            let (reference, completed_at) = match (&row.mint_event_ref, row.completed_at) {
                (Some(r), Some(t)) => (r.clone(), t),
                _ => continue,
            };
            if completed_at < start || completed_at >= end {
                continue;
            }
            offledger_total = offledger_total.saturating_add(row.amount_token);
            if let Some((amount, ts)) = off_side.get(&reference).copied() {
                duplicate_refs.push(reference.clone());
                off_side.insert(reference, (amount.saturating_add(row.amount_token), ts));
            } else {
                off_side.insert(reference, (row.amount_token, completed_at));
            }
        }
        for row in self.store.purchase_rows().await {
            if row.recorded_at < start || row.recorded_at >= end {
                continue;
            }
            offledger_total = offledger_total.saturating_add(row.amount);
            if let Some((amount, ts)) = off_side.get(&row.reference).copied() {
                duplicate_refs.push(row.reference.clone());
                off_side.insert(row.reference.clone(), (amount.saturating_add(row.amount), ts));
            } else {
                off_side.insert(row.reference.clone(), (row.amount, row.recorded_at));
            }
        }

        let ledger_total: Amount = ledger_side.values().map(|e| e.amount).sum();

        // Diff the two keyed sets
        let mut mismatches = Vec::new();
        let grace_cutoff = end.saturating_sub(self.config.grace_secs);

        for (reference, entry) in &ledger_side {
            match off_side.get(reference) {
                None => {
                    // Recent events may simply not be visible off-ledger yet
                    if entry.timestamp < grace_cutoff {
                        mismatches.push(Mismatch {
                            reference: reference.clone(),
                            kind: MismatchKind::MissingOffLedger,
                            expected: entry.amount,
                            observed: Amount::ZERO,
                            timestamp: entry.timestamp,
                        });
                    } else {
                        debug!("Event {} within grace period, not flagged", reference);
                    }
                }
                Some((observed, _)) if duplicate_refs.contains(reference) => {
                    mismatches.push(Mismatch {
                        reference: reference.clone(),
                        kind: MismatchKind::DuplicateProcessing,
                        expected: entry.amount,
                        observed: *observed,
                        timestamp: entry.timestamp,
                    });
                }
                Some((observed, _)) if *observed != entry.amount => {
                    mismatches.push(Mismatch {
                        reference: reference.clone(),
                        kind: MismatchKind::AmountMismatch,
                        expected: entry.amount,
                        observed: *observed,
                        timestamp: entry.timestamp,
                    });
                }
                Some(_) => {}
            }
        }
        for (reference, (observed, ts)) in &off_side {
            if !ledger_side.contains_key(reference) {
                mismatches.push(Mismatch {
                    reference: reference.clone(),
                    kind: MismatchKind::MissingOnLedger,
                    expected: Amount::ZERO,
                    observed: *observed,
                    timestamp: *ts,
                });
            }
        }

        mismatches.sort_by(|a, b| {
            a.reference
                .cmp(&b.reference)
                .then_with(|| a.kind.cmp(&b.kind))
        });

        let report = ReconciliationReport {
            period_start: start,
            period_end: end,
            ledger_total,
            offledger_total,
            mismatches,
        };
        info!(
            "Reconciled window [{}, {}): {} mismatches, ledger {} vs off-ledger {}",
            start,
            end,
            report.mismatches.len(),
            report.ledger_total,
            report.offledger_total
        );
        Ok(report)
    }

    /// Persist a report under its window key
    pub async fn store_report(&self, report: &ReconciliationReport) -> ReconResult<()> {
        self.storage
            .put_json(
                &format!("recon/reports/{}-{}", report.period_start, report.period_end),
                report,
            )
            .await?;
        Ok(())
    }

    /// Run on a schedule until the task is cancelled
    ///
    /// An I/O failure aborts the current run; the window is retried on the
    /// next tick. Mismatches never abort anything: they are report content.
    pub async fn run_scheduled(self: Arc<Self>) -> ReconResult<()> {
        let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
        let mut window_start = timestamp_secs();
        loop {
            ticker.tick().await;
            let window_end = timestamp_secs();
            match self.run_window(window_start, window_end).await {
                Ok(report) => {
                    if let Err(e) = self.store_report(&report).await {
                        error!("Failed to persist reconciliation report: {}", e);
                        continue;
                    }
                    window_start = window_end;
                }
                Err(e) => {
                    error!(
                        "Reconciliation run for [{}, {}) aborted, will retry: {}",
                        window_start, window_end, e
                    );
                }
            }
        }
    }
}
