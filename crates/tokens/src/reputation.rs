//! Reputation token (SC)
//!
//! Role-gated balance ledger representing cooperative membership and voting
//! weight. Balances only move through governance-authorized award and slash
//! operations; inactivity is derived on read from `last_activity_at`, never
//! stored as a status transition.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use coop_core::utils::{timestamp_secs, INACTIVITY_THRESHOLD_MONTHS, SECS_PER_MONTH};
use coop_core::{Address, Amount, Hash, JsonStorage, Storage};
use coop_ledger::roles::labels;
use coop_ledger::{EventKind, EventLog, RoleRegistry};

use crate::{TokenError, TokenResult};

/// Storage path prefix for member records
const MEMBERS_PATH: &str = "tokens/sc/members/";

/// Membership status of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    /// No membership record exists
    NotMember,
    /// Active member
    Active,
    /// Member with no activity past the inactivity threshold (derived)
    Inactive,
    /// Membership revoked by governance
    Revoked,
}

/// Stored state for one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Stored status; Inactive is never persisted, only derived
    pub status: MemberStatus,
    /// Reputation balance
    pub balance: Amount,
    /// Last governance-visible activity, in seconds
    pub last_activity_at: u64,
    /// Last time an off-ledger balance check touched this member
    pub last_balance_check_at: u64,
}

impl MemberRecord {
    /// Status derived against the inactivity threshold at `now`
    pub fn status_at(&self, now: u64) -> MemberStatus {
        match self.status {
            MemberStatus::Active => {
                let inactive_for = now.saturating_sub(self.last_activity_at);
                if inactive_for >= INACTIVITY_THRESHOLD_MONTHS * SECS_PER_MONTH {
                    MemberStatus::Inactive
                } else {
                    MemberStatus::Active
                }
            }
            other => other,
        }
    }
}

/// The reputation-token ledger
pub struct ReputationToken {
    roles: Arc<RoleRegistry>,
    events: Arc<EventLog>,
    storage: Arc<dyn Storage>,
    members: RwLock<HashMap<Address, MemberRecord>>,
}

impl ReputationToken {
    /// Create the reputation token, loading persisted member records
    pub async fn new(
        storage: Arc<dyn Storage>,
        roles: Arc<RoleRegistry>,
        events: Arc<EventLog>,
    ) -> TokenResult<Self> {
        let mut members = HashMap::new();
        for key in storage.list(MEMBERS_PATH).await? {
            let record: MemberRecord = storage.get_json(&key).await?;
            let address = Address::new(key.trim_start_matches(MEMBERS_PATH));
            members.insert(address, record);
        }
        info!("Reputation token loaded: {} members", members.len());

        Ok(Self {
            roles,
            events,
            storage,
            members: RwLock::new(members),
        })
    }

    async fn persist_member(&self, address: &Address, record: &MemberRecord) -> TokenResult<()> {
        self.storage
            .put_json(&format!("{}{}", MEMBERS_PATH, address), record)
            .await?;
        Ok(())
    }

    /// Add a member; re-adding an active member is a no-op
    pub async fn add_member(&self, caller: &Address, address: &Address) -> TokenResult<()> {
        self.roles.require(caller, labels::MEMBER_MANAGER).await?;
        if address.is_null() {
            return Err(TokenError::InvalidTarget);
        }

        let now = timestamp_secs();
        let added = {
            let mut members = self.members.write().await;
            match members.get_mut(address) {
                Some(record) if record.status == MemberStatus::Active => false,
                Some(record) => {
                    // Activating an existing record keeps its balance
                    record.status = MemberStatus::Active;
                    record.last_activity_at = now;
                    let record = record.clone();
                    self.persist_member(address, &record).await?;
                    true
                }
                None => {
                    let record = MemberRecord {
                        status: MemberStatus::Active,
                        balance: Amount::ZERO,
                        last_activity_at: now,
                        last_balance_check_at: now,
                    };
                    self.persist_member(address, &record).await?;
                    members.insert(address.clone(), record);
                    true
                }
            }
        };

        if added {
            self.events
                .append(
                    EventKind::MemberAdded {
                        address: address.clone(),
                    },
                    format!("member-add-{}", address),
                )
                .await?;
            info!("Member added: {}", address);
        }
        Ok(())
    }

    /// Revoke membership; the balance stays until governance slashes it
    pub async fn remove_member(&self, caller: &Address, address: &Address) -> TokenResult<()> {
        self.roles.require(caller, labels::MEMBER_MANAGER).await?;

        let removed = {
            let mut members = self.members.write().await;
            match members.get_mut(address) {
                Some(record) if record.status != MemberStatus::Revoked => {
                    record.status = MemberStatus::Revoked;
                    let record = record.clone();
                    self.persist_member(address, &record).await?;
                    true
                }
                _ => false,
            }
        };

        if removed {
            self.events
                .append(
                    EventKind::MemberRemoved {
                        address: address.clone(),
                    },
                    format!("member-remove-{}", address),
                )
                .await?;
            info!("Member removed: {}", address);
        }
        Ok(())
    }

    /// Apply an award to a member's balance without emitting an event
    ///
    /// The payment router composes this with a spending-token transfer and
    /// emits one combined event; everything else should use
    /// [`ReputationToken::award`].
    pub async fn apply_award(
        &self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<()> {
        self.apply_award_at(timestamp_secs(), caller, to, amount).await
    }

    /// Apply an award with an explicit wall-clock reading
    pub async fn apply_award_at(
        &self,
        now: u64,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<()> {
        self.roles.require(caller, labels::GOVERNANCE_AWARD).await?;
        if to.is_null() {
            return Err(TokenError::InvalidTarget);
        }
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount("award amount is zero".to_string()));
        }

        let mut members = self.members.write().await;
        // Balance and membership are independent; an award to an address with
        // no record creates one that stays NotMember until add_member.
        let record = members.entry(to.clone()).or_insert_with(|| MemberRecord {
            status: MemberStatus::NotMember,
            balance: Amount::ZERO,
            last_activity_at: now,
            last_balance_check_at: now,
        });
        if record.status == MemberStatus::Revoked {
            return Err(TokenError::NotMember(to.clone()));
        }

        record.balance = record
            .balance
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        record.last_activity_at = now;
        let record = record.clone();
        self.persist_member(to, &record).await?;
        Ok(())
    }

    /// Award reputation with an audit reason code
    pub async fn award(
        &self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        reason: Hash,
        reference: String,
    ) -> TokenResult<()> {
        self.apply_award(caller, to, amount).await?;
        self.events
            .append(
                EventKind::Awarded {
                    to: to.clone(),
                    amount,
                    reason,
                },
                reference,
            )
            .await?;
        Ok(())
    }

    /// Slash reputation, clamped at zero; returns the amount actually slashed
    pub async fn slash(
        &self,
        caller: &Address,
        target: &Address,
        amount: Amount,
        reason: Hash,
        reference: String,
    ) -> TokenResult<Amount> {
        self.roles.require(caller, labels::GOVERNANCE_SLASH).await?;
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount("slash amount is zero".to_string()));
        }

        let slashed = {
            let mut members = self.members.write().await;
            let record = members
                .get_mut(target)
                .ok_or_else(|| TokenError::NotMember(target.clone()))?;

            let slashed = amount.min(record.balance);
            record.balance = record.balance.saturating_sub(slashed);
            let record = record.clone();
            self.persist_member(target, &record).await?;
            slashed
        };

        self.events
            .append(
                EventKind::Slashed {
                    target: target.clone(),
                    amount: slashed,
                    reason,
                },
                reference,
            )
            .await?;
        info!("Slashed {} from {}", slashed, target);
        Ok(slashed)
    }

    /// True iff the member is Active (derived) and holds a nonzero balance
    pub async fn is_active_member(&self, address: &Address) -> bool {
        self.is_active_member_at(timestamp_secs(), address).await
    }

    /// Active-member check with an explicit wall-clock reading
    pub async fn is_active_member_at(&self, now: u64, address: &Address) -> bool {
        let members = self.members.read().await;
        members
            .get(address)
            .map(|r| r.status_at(now) == MemberStatus::Active && !r.balance.is_zero())
            .unwrap_or(false)
    }

    /// Derived membership status
    pub async fn status_of_at(&self, now: u64, address: &Address) -> MemberStatus {
        let members = self.members.read().await;
        members
            .get(address)
            .map(|r| r.status_at(now))
            .unwrap_or(MemberStatus::NotMember)
    }

    /// Seconds since the member's last activity
    pub async fn time_since_last_activity_at(
        &self,
        now: u64,
        address: &Address,
    ) -> TokenResult<u64> {
        let members = self.members.read().await;
        let record = members
            .get(address)
            .ok_or_else(|| TokenError::NotMember(address.clone()))?;
        Ok(now.saturating_sub(record.last_activity_at))
    }

    /// Reputation balance of an address
    pub async fn balance_of(&self, address: &Address) -> Amount {
        let members = self.members.read().await;
        members
            .get(address)
            .map(|r| r.balance)
            .unwrap_or_default()
    }

    /// Snapshot of all member records, for the decay monitor
    pub async fn members(&self) -> Vec<(Address, MemberRecord)> {
        let members = self.members.read().await;
        let mut list: Vec<_> = members
            .iter()
            .map(|(a, r)| (a.clone(), r.clone()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    /// Record that an off-ledger balance check visited this member
    pub async fn touch_balance_check(&self, address: &Address, now: u64) -> TokenResult<()> {
        let mut members = self.members.write().await;
        if let Some(record) = members.get_mut(address) {
            record.last_balance_check_at = now;
            let record = record.clone();
            self.persist_member(address, &record).await?;
        }
        Ok(())
    }
}
