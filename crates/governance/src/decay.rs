//! Inactivity decay monitor
//!
//! Decay is not an on-ledger timer. This monitor scans all members
//! off-ledger, computes the decay each inactive member would incur under the
//! configured policy, and returns entries for a slash-batch proposal. The
//! monitor never slashes; execution waits for multi-party approval.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use coop_core::utils::{timestamp_secs, INACTIVITY_THRESHOLD_MONTHS, SECS_PER_MONTH};
use coop_core::{Address, Amount};
use coop_tokens::{MemberStatus, ReputationToken};

/// How decay is computed for an inactive member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecayPolicy {
    /// The entire balance decays
    Full,
    /// `balance * min(100, months_over_threshold * percent_per_month) / 100`
    Gradual { percent_per_month: u8 },
    /// `min(balance, amount_per_month * months_over_threshold)`
    Fixed { amount_per_month: Amount },
}

impl DecayPolicy {
    /// Decay amount for a balance inactive for `months_inactive` whole months
    ///
    /// Gradual decay is cumulative from month 13; it does not compound per
    /// elapsed month.
    pub fn decay_for(&self, balance: Amount, months_inactive: u64) -> Amount {
        if months_inactive < INACTIVITY_THRESHOLD_MONTHS {
            return Amount::ZERO;
        }
        let months_over = months_inactive - INACTIVITY_THRESHOLD_MONTHS;
        match self {
            DecayPolicy::Full => balance,
            DecayPolicy::Gradual { percent_per_month } => {
                let percent = (months_over * *percent_per_month as u64).min(100);
                // percent of balance, expressed in basis points
                balance.mul_bps((percent * 100) as u16)
            }
            DecayPolicy::Fixed { amount_per_month } => {
                balance.min(amount_per_month.saturating_mul_count(months_over))
            }
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// The decay policy in force
    pub policy: DecayPolicy,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            policy: DecayPolicy::Gradual {
                percent_per_month: 10,
            },
        }
    }
}

/// One member's proposed decay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayEntry {
    /// The member to slash
    pub member: Address,
    /// Balance observed at scan time
    pub balance: Amount,
    /// Whole months since last activity
    pub months_inactive: u64,
    /// Proposed slash amount
    pub decay: Amount,
}

/// The off-ledger decay monitor
pub struct DecayMonitor {
    sc: Arc<ReputationToken>,
    config: DecayConfig,
}

impl DecayMonitor {
    /// Create a monitor over the reputation token
    pub fn new(sc: Arc<ReputationToken>, config: DecayConfig) -> Self {
        Self { sc, config }
    }

    /// Scan all members and compute decay entries at the current time
    pub async fn scan(&self) -> Vec<DecayEntry> {
        self.scan_at(timestamp_secs()).await
    }

    /// Scan with an explicit wall-clock reading
    ///
    /// A member whose record cannot be evaluated is logged and skipped; one
    /// bad account never aborts the batch for everyone else.
    pub async fn scan_at(&self, now: u64) -> Vec<DecayEntry> {
        let mut entries = Vec::new();

        for (address, record) in self.sc.members().await {
            if record.status_at(now) != MemberStatus::Inactive || record.balance.is_zero() {
                continue;
            }

            let since = match self.sc.time_since_last_activity_at(now, &address).await {
                Ok(since) => since,
                Err(e) => {
                    warn!("Skipping member {} in decay scan: {}", address, e);
                    continue;
                }
            };
            let months_inactive = since / SECS_PER_MONTH;

            let decay = self.config.policy.decay_for(record.balance, months_inactive);
            if decay.is_zero() {
                debug!("Member {} inactive but decay rounds to zero", address);
                continue;
            }

            if let Err(e) = self.sc.touch_balance_check(&address, now).await {
                warn!("Failed to record balance check for {}: {}", address, e);
            }

            entries.push(DecayEntry {
                member: address,
                balance: record.balance,
                months_inactive,
                decay,
            });
        }

        info!("Decay scan produced {} entries", entries.len());
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_decay_below_threshold() {
        let balance = Amount::from_whole(40);
        for policy in [
            DecayPolicy::Full,
            DecayPolicy::Gradual {
                percent_per_month: 10,
            },
            DecayPolicy::Fixed {
                amount_per_month: Amount::from_whole(5),
            },
        ] {
            assert_eq!(policy.decay_for(balance, 11), Amount::ZERO);
        }
    }

    #[test]
    fn test_full_policy_decays_entire_balance() {
        let policy = DecayPolicy::Full;
        assert_eq!(
            policy.decay_for(Amount::from_whole(40), 12),
            Amount::from_whole(40)
        );
    }

    #[test]
    fn test_gradual_policy_worked_example() {
        // 13 months inactive, balance 40, 10%/month: one month over threshold
        // gives 40 * 10 / 100 = 4
        let policy = DecayPolicy::Gradual {
            percent_per_month: 10,
        };
        assert_eq!(
            policy.decay_for(Amount::from_whole(40), 13),
            Amount::from_whole(4)
        );
    }

    #[test]
    fn test_gradual_policy_caps_at_full_balance() {
        let policy = DecayPolicy::Gradual {
            percent_per_month: 10,
        };
        // 12 months over threshold = 120% -> capped to 100%
        assert_eq!(
            policy.decay_for(Amount::from_whole(40), 24),
            Amount::from_whole(40)
        );
    }

    #[test]
    fn test_fixed_policy_clamps_to_balance() {
        let policy = DecayPolicy::Fixed {
            amount_per_month: Amount::from_whole(15),
        };
        assert_eq!(
            policy.decay_for(Amount::from_whole(40), 14),
            Amount::from_whole(30)
        );
        assert_eq!(
            policy.decay_for(Amount::from_whole(40), 20),
            Amount::from_whole(40)
        );
    }
}
