//! Slash-batch proposals
//!
//! A decay scan becomes a proposal; the proposal holds the batch until enough
//! eligible approvers have signed off or it is explicitly abandoned. There is
//! no implicit timeout: a pending proposal is never silently discarded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use coop_core::utils::timestamp_secs;
use coop_core::{label_key, Address, Amount, JsonStorage, Storage};
use coop_tokens::{reasons, ReputationToken};

use crate::decay::DecayEntry;
use crate::{GovernanceError, GovernanceResult};

/// Storage path prefix for proposals
const PROPOSALS_PATH: &str = "governance/proposals/";

/// Lifecycle of a slash-batch proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Collecting approvals
    Pending,
    /// Threshold reached; ready to execute
    Approved,
    /// Slashes issued on the ledger
    Executed,
    /// Withdrawn without execution
    Abandoned,
}

/// A batch of proposed slashes awaiting multi-party approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashBatchProposal {
    /// Unique proposal identifier
    pub id: String,
    /// When the proposal was created, in seconds
    pub created_at: u64,
    /// The proposed slashes
    pub entries: Vec<DecayEntry>,
    /// Addresses eligible to approve
    pub approvers: Vec<Address>,
    /// Approvals required before execution
    pub threshold: u32,
    /// Approvals collected so far
    pub approvals: HashSet<Address>,
    /// Current lifecycle state
    pub status: ProposalStatus,
}

/// Persistent store of slash-batch proposals
pub struct ProposalStore {
    storage: Arc<dyn Storage>,
    proposals: RwLock<HashMap<String, SlashBatchProposal>>,
}

impl ProposalStore {
    /// Create the store, loading persisted proposals
    pub async fn new(storage: Arc<dyn Storage>) -> GovernanceResult<Self> {
        let mut proposals = HashMap::new();
        for key in storage.list(PROPOSALS_PATH).await? {
            let proposal: SlashBatchProposal = storage.get_json(&key).await?;
            proposals.insert(proposal.id.clone(), proposal);
        }
        info!("Proposal store loaded: {} proposals", proposals.len());

        Ok(Self {
            storage,
            proposals: RwLock::new(proposals),
        })
    }

    async fn persist(&self, proposal: &SlashBatchProposal) -> GovernanceResult<()> {
        self.storage
            .put_json(&format!("{}{}", PROPOSALS_PATH, proposal.id), proposal)
            .await?;
        Ok(())
    }

    /// Create a proposal from decay-scan entries
    pub async fn create(
        &self,
        entries: Vec<DecayEntry>,
        approvers: Vec<Address>,
        threshold: u32,
    ) -> GovernanceResult<SlashBatchProposal> {
        if entries.is_empty() {
            return Err(GovernanceError::InvalidProposal(
                "batch has no entries".to_string(),
            ));
        }
        if threshold == 0 || threshold as usize > approvers.len() {
            return Err(GovernanceError::InvalidProposal(format!(
                "threshold {} out of range for {} approvers",
                threshold,
                approvers.len()
            )));
        }

        let proposal = SlashBatchProposal {
            id: format!("slash-batch-{}", uuid::Uuid::new_v4()),
            created_at: timestamp_secs(),
            entries,
            approvers,
            threshold,
            approvals: HashSet::new(),
            status: ProposalStatus::Pending,
        };
        self.persist(&proposal).await?;

        let mut proposals = self.proposals.write().await;
        proposals.insert(proposal.id.clone(), proposal.clone());
        info!(
            "Created proposal {} with {} entries, {}-of-{} approval",
            proposal.id,
            proposal.entries.len(),
            proposal.threshold,
            proposal.approvers.len()
        );
        Ok(proposal)
    }

    /// Record one approval; transitions to Approved at the threshold
    pub async fn approve(&self, id: &str, approver: &Address) -> GovernanceResult<ProposalStatus> {
        let updated = {
            let mut proposals = self.proposals.write().await;
            let proposal = proposals
                .get_mut(id)
                .ok_or_else(|| GovernanceError::ProposalNotFound(id.to_string()))?;

            if proposal.status != ProposalStatus::Pending {
                return Err(GovernanceError::InvalidProposalState(format!(
                    "proposal {} is {:?}",
                    id, proposal.status
                )));
            }
            if !proposal.approvers.contains(approver) {
                return Err(GovernanceError::InvalidApproval(format!(
                    "{} is not an eligible approver",
                    approver
                )));
            }
            if !proposal.approvals.insert(approver.clone()) {
                return Err(GovernanceError::InvalidApproval(format!(
                    "{} already approved",
                    approver
                )));
            }

            if proposal.approvals.len() as u32 >= proposal.threshold {
                proposal.status = ProposalStatus::Approved;
            }
            proposal.clone()
        };
        self.persist(&updated).await?;

        info!(
            "Proposal {} approved by {} ({}/{})",
            id,
            approver,
            updated.approvals.len(),
            updated.threshold
        );
        Ok(updated.status)
    }

    /// Execute an approved batch as governance slashes
    ///
    /// `executor` must hold the governance-slash role on the ledger. A slash
    /// that fails for one member is logged and skipped; the rest of the batch
    /// still executes. Returns the total amount actually slashed.
    pub async fn execute(
        &self,
        id: &str,
        executor: &Address,
        sc: &ReputationToken,
    ) -> GovernanceResult<Amount> {
        let entries = {
            let proposals = self.proposals.read().await;
            let proposal = proposals
                .get(id)
                .ok_or_else(|| GovernanceError::ProposalNotFound(id.to_string()))?;
            if proposal.status != ProposalStatus::Approved {
                return Err(GovernanceError::InvalidProposalState(format!(
                    "proposal {} is {:?}, not Approved",
                    id, proposal.status
                )));
            }
            proposal.entries.clone()
        };

        let reason = label_key(reasons::INACTIVITY_DECAY);
        let mut total = Amount::ZERO;
        for (i, entry) in entries.iter().enumerate() {
            match sc
                .slash(
                    executor,
                    &entry.member,
                    entry.decay,
                    reason.clone(),
                    format!("{}#{}", id, i),
                )
                .await
            {
                Ok(slashed) => total = total.saturating_add(slashed),
                Err(e) => {
                    warn!(
                        "Slash of {} for {} failed, skipping: {}",
                        entry.decay, entry.member, e
                    );
                }
            }
        }

        let updated = {
            let mut proposals = self.proposals.write().await;
            let proposal = proposals
                .get_mut(id)
                .ok_or_else(|| GovernanceError::ProposalNotFound(id.to_string()))?;
            proposal.status = ProposalStatus::Executed;
            proposal.clone()
        };
        self.persist(&updated).await?;

        info!("Executed proposal {}, total slashed {}", id, total);
        Ok(total)
    }

    /// Abandon a pending or approved proposal without executing it
    pub async fn abandon(&self, id: &str) -> GovernanceResult<()> {
        let updated = {
            let mut proposals = self.proposals.write().await;
            let proposal = proposals
                .get_mut(id)
                .ok_or_else(|| GovernanceError::ProposalNotFound(id.to_string()))?;
            if proposal.status == ProposalStatus::Executed {
                return Err(GovernanceError::InvalidProposalState(
                    "cannot abandon an executed proposal".to_string(),
                ));
            }
            proposal.status = ProposalStatus::Abandoned;
            proposal.clone()
        };
        self.persist(&updated).await?;
        info!("Abandoned proposal {}", id);
        Ok(())
    }

    /// Fetch a proposal by id
    pub async fn get(&self, id: &str) -> Option<SlashBatchProposal> {
        let proposals = self.proposals.read().await;
        proposals.get(id).cloned()
    }

    /// All proposals currently collecting approvals
    pub async fn pending(&self) -> Vec<SlashBatchProposal> {
        let proposals = self.proposals.read().await;
        let mut pending: Vec<_> = proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }
}
