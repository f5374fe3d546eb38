//! Spending token (UC)
//!
//! Fungible, fiat-pegged balance ledger. Two minting paths exist on purpose:
//! unlimited minting by the treasurer backs verified fiat deposits into the
//! treasury reserve, while rate-limited minting backs automated onramp
//! integrations whose blast radius must stay capped per day, per integration.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use coop_core::utils::{timestamp_secs, SECS_PER_DAY};
use coop_core::{Address, Amount, JsonStorage, Storage};
use coop_ledger::roles::labels;
use coop_ledger::{EventKind, EventLog, RoleRegistry};

use crate::{TokenError, TokenResult};

/// Storage paths
const META_PATH: &str = "tokens/uc/meta";
const ACCOUNTS_PATH: &str = "tokens/uc/accounts/";
const MINTERS_PATH: &str = "tokens/uc/minters/";

/// Rolling daily mint allowance for one onramp minter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterConfig {
    /// Maximum amount mintable per 24-hour window
    pub daily_limit: Amount,
    /// Amount minted in the current window
    pub daily_minted: Amount,
    /// When the current window opened, in seconds
    pub window_start_at: u64,
}

/// Record of an applied transfer, sufficient to reverse it exactly
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub from: Address,
    pub to: Address,
    pub fee_recipient: Address,
    pub amount: Amount,
    pub fee: Amount,
}

/// Token-wide settings and counters
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UcMeta {
    total_supply: Amount,
    paused: bool,
    transfer_fee_bps: u16,
    fee_recipient: Address,
}

impl Default for UcMeta {
    fn default() -> Self {
        Self {
            total_supply: Amount::ZERO,
            paused: false,
            transfer_fee_bps: 0,
            fee_recipient: Address::new("treasury"),
        }
    }
}

#[derive(Debug, Default)]
struct UcState {
    balances: HashMap<Address, Amount>,
    minters: HashMap<Address, MinterConfig>,
    meta: UcMeta,
}

/// The spending-token ledger
pub struct SpendingToken {
    roles: Arc<RoleRegistry>,
    events: Arc<EventLog>,
    storage: Arc<dyn Storage>,
    state: RwLock<UcState>,
}

impl SpendingToken {
    /// Create the spending token, loading persisted state
    pub async fn new(
        storage: Arc<dyn Storage>,
        roles: Arc<RoleRegistry>,
        events: Arc<EventLog>,
    ) -> TokenResult<Self> {
        let mut state = UcState::default();

        state.meta = match storage.get_json::<UcMeta>(META_PATH).await {
            Ok(meta) => meta,
            Err(_) => {
                let meta = UcMeta::default();
                if let Err(e) = storage.put_json(META_PATH, &meta).await {
                    warn!("Failed to save default spending-token meta: {}", e);
                }
                meta
            }
        };

        for key in storage.list(ACCOUNTS_PATH).await? {
            let balance: Amount = storage.get_json(&key).await?;
            let address = Address::new(key.trim_start_matches(ACCOUNTS_PATH));
            state.balances.insert(address, balance);
        }
        for key in storage.list(MINTERS_PATH).await? {
            let config: MinterConfig = storage.get_json(&key).await?;
            let address = Address::new(key.trim_start_matches(MINTERS_PATH));
            state.minters.insert(address, config);
        }

        info!(
            "Spending token loaded: {} accounts, {} minters, supply {}",
            state.balances.len(),
            state.minters.len(),
            state.meta.total_supply
        );

        Ok(Self {
            roles,
            events,
            storage,
            state: RwLock::new(state),
        })
    }

    async fn persist_account(&self, address: &Address, balance: Amount) -> TokenResult<()> {
        self.storage
            .put_json(&format!("{}{}", ACCOUNTS_PATH, address), &balance)
            .await?;
        Ok(())
    }

    async fn persist_meta(&self, meta: &UcMeta) -> TokenResult<()> {
        self.storage.put_json(META_PATH, meta).await?;
        Ok(())
    }

    async fn persist_minter(&self, address: &Address, config: &MinterConfig) -> TokenResult<()> {
        self.storage
            .put_json(&format!("{}{}", MINTERS_PATH, address), config)
            .await?;
        Ok(())
    }

    fn check_mint_inputs(to: &Address, amount: Amount) -> TokenResult<()> {
        if to.is_null() {
            return Err(TokenError::InvalidTarget);
        }
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount("mint amount is zero".to_string()));
        }
        Ok(())
    }

    /// Unlimited mint backed by a verified treasury deposit
    pub async fn mint_unlimited(
        &self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        reference: String,
    ) -> TokenResult<()> {
        self.roles.require(caller, labels::TREASURER_MINT).await?;
        Self::check_mint_inputs(to, amount)?;

        {
            let mut state = self.state.write().await;
            if state.meta.paused {
                return Err(TokenError::ContractPaused);
            }

            let balance = state.balances.entry(to.clone()).or_default();
            *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
            let new_balance = *balance;
            state.meta.total_supply = state
                .meta
                .total_supply
                .checked_add(amount)
                .ok_or(TokenError::Overflow)?;

            self.persist_account(to, new_balance).await?;
            let meta = state.meta.clone();
            self.persist_meta(&meta).await?;
        }

        self.events
            .append(
                EventKind::Minted {
                    to: to.clone(),
                    amount,
                    minter: caller.clone(),
                    rate_limited: false,
                },
                reference,
            )
            .await?;
        info!("Treasury minted {} to {}", amount, to);
        Ok(())
    }

    /// Rate-limited mint for automated onramp integrations
    pub async fn mint_rate_limited(
        &self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        reference: String,
    ) -> TokenResult<()> {
        self.mint_rate_limited_at(timestamp_secs(), caller, to, amount, reference)
            .await
    }

    /// Rate-limited mint with an explicit wall-clock reading
    ///
    /// The window rolls forward from the stored `window_start_at` using the
    /// time read at the moment of the call; there is no background timer.
    pub async fn mint_rate_limited_at(
        &self,
        now: u64,
        caller: &Address,
        to: &Address,
        amount: Amount,
        reference: String,
    ) -> TokenResult<()> {
        self.roles.require(caller, labels::ONRAMP_MINT).await?;
        Self::check_mint_inputs(to, amount)?;

        {
            let mut state = self.state.write().await;
            if state.meta.paused {
                return Err(TokenError::ContractPaused);
            }

            let config = state
                .minters
                .get_mut(caller)
                .ok_or_else(|| TokenError::LimitNotConfigured(caller.clone()))?;

            // Roll the window forward before applying the mint
            if now.saturating_sub(config.window_start_at) >= SECS_PER_DAY {
                config.window_start_at = now;
                config.daily_minted = Amount::ZERO;
            }

            let minted_after = config
                .daily_minted
                .checked_add(amount)
                .ok_or(TokenError::Overflow)?;
            if minted_after > config.daily_limit {
                let remaining = config.daily_limit.saturating_sub(config.daily_minted);
                return Err(TokenError::RateLimitExceeded { remaining });
            }
            config.daily_minted = minted_after;
            let config_snapshot = config.clone();

            let balance = state.balances.entry(to.clone()).or_default();
            *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
            let new_balance = *balance;
            state.meta.total_supply = state
                .meta
                .total_supply
                .checked_add(amount)
                .ok_or(TokenError::Overflow)?;

            self.persist_minter(caller, &config_snapshot).await?;
            self.persist_account(to, new_balance).await?;
            let meta = state.meta.clone();
            self.persist_meta(&meta).await?;
        }

        self.events
            .append_at(
                now,
                EventKind::Minted {
                    to: to.clone(),
                    amount,
                    minter: caller.clone(),
                    rate_limited: true,
                },
                reference,
            )
            .await?;
        info!("Onramp minter {} minted {} to {}", caller, amount, to);
        Ok(())
    }

    /// Configure or update an onramp minter's daily limit
    pub async fn set_minter_limit(
        &self,
        caller: &Address,
        minter: &Address,
        daily_limit: Amount,
    ) -> TokenResult<()> {
        self.roles.require(caller, labels::TREASURER_MINT).await?;
        if minter.is_null() {
            return Err(TokenError::InvalidTarget);
        }

        let mut state = self.state.write().await;
        let now = timestamp_secs();
        let config = state
            .minters
            .entry(minter.clone())
            .and_modify(|c| c.daily_limit = daily_limit)
            .or_insert_with(|| MinterConfig {
                daily_limit,
                daily_minted: Amount::ZERO,
                window_start_at: now,
            })
            .clone();
        self.persist_minter(minter, &config).await?;
        info!("Minter {} daily limit set to {}", minter, daily_limit);
        Ok(())
    }

    /// Configure the transfer fee routed to the fee recipient
    pub async fn set_transfer_fee(
        &self,
        caller: &Address,
        fee_bps: u16,
        fee_recipient: Address,
    ) -> TokenResult<()> {
        self.roles.require(caller, labels::TREASURER_MINT).await?;
        if fee_bps > 10_000 {
            return Err(TokenError::InvalidAmount(format!(
                "fee {} bps exceeds 100%",
                fee_bps
            )));
        }
        if fee_recipient.is_null() {
            return Err(TokenError::InvalidTarget);
        }

        let mut state = self.state.write().await;
        state.meta.transfer_fee_bps = fee_bps;
        state.meta.fee_recipient = fee_recipient;
        let meta = state.meta.clone();
        self.persist_meta(&meta).await?;
        Ok(())
    }

    /// Apply a transfer to balances without emitting an event
    ///
    /// The payment router composes this with a reputation award and emits one
    /// combined event; everything else should use [`SpendingToken::transfer`].
    pub async fn apply_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<TransferReceipt> {
        if to.is_null() {
            return Err(TokenError::InvalidTarget);
        }
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount(
                "transfer amount is zero".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if state.meta.paused {
            return Err(TokenError::ContractPaused);
        }

        let available = state.balances.get(from).copied().unwrap_or_default();
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                available,
                needed: amount,
            });
        }

        let fee = amount.mul_bps(state.meta.transfer_fee_bps);
        let credited = amount.saturating_sub(fee);
        let fee_recipient = state.meta.fee_recipient.clone();

        let from_balance = available.saturating_sub(amount);
        state.balances.insert(from.clone(), from_balance);
        let to_balance = {
            let balance = state.balances.entry(to.clone()).or_default();
            *balance = balance.checked_add(credited).ok_or(TokenError::Overflow)?;
            *balance
        };
        let fee_balance = {
            let balance = state.balances.entry(fee_recipient.clone()).or_default();
            *balance = balance.checked_add(fee).ok_or(TokenError::Overflow)?;
            *balance
        };

        self.persist_account(from, from_balance).await?;
        self.persist_account(to, to_balance).await?;
        self.persist_account(&fee_recipient, fee_balance).await?;

        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            fee_recipient,
            amount,
            fee,
        })
    }

    /// Reverse a previously applied transfer exactly
    pub async fn revert_transfer(&self, receipt: &TransferReceipt) -> TokenResult<()> {
        let credited = receipt.amount.saturating_sub(receipt.fee);

        let mut state = self.state.write().await;
        let to_balance = {
            let balance = state.balances.entry(receipt.to.clone()).or_default();
            *balance = balance.saturating_sub(credited);
            *balance
        };
        let fee_balance = {
            let balance = state
                .balances
                .entry(receipt.fee_recipient.clone())
                .or_default();
            *balance = balance.saturating_sub(receipt.fee);
            *balance
        };
        let from_balance = {
            let balance = state.balances.entry(receipt.from.clone()).or_default();
            *balance = balance.saturating_add(receipt.amount);
            *balance
        };

        self.persist_account(&receipt.to, to_balance).await?;
        self.persist_account(&receipt.fee_recipient, fee_balance).await?;
        self.persist_account(&receipt.from, from_balance).await?;

        warn!(
            "Reverted transfer of {} from {} to {}",
            receipt.amount, receipt.from, receipt.to
        );
        Ok(())
    }

    /// Standard balance move with the configured fee routed to the fee recipient
    pub async fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
        reference: String,
    ) -> TokenResult<TransferReceipt> {
        let receipt = self.apply_transfer(from, to, amount).await?;
        self.events
            .append(
                EventKind::Transferred {
                    from: from.clone(),
                    to: to.clone(),
                    amount,
                    fee: receipt.fee,
                },
                reference,
            )
            .await?;
        Ok(receipt)
    }

    /// Burn tokens from a holder, reducing total supply
    pub async fn burn(
        &self,
        holder: &Address,
        amount: Amount,
        reference: String,
    ) -> TokenResult<()> {
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount("burn amount is zero".to_string()));
        }

        {
            let mut state = self.state.write().await;
            if state.meta.paused {
                return Err(TokenError::ContractPaused);
            }

            let available = state.balances.get(holder).copied().unwrap_or_default();
            if available < amount {
                return Err(TokenError::InsufficientBalance {
                    available,
                    needed: amount,
                });
            }

            let new_balance = available.saturating_sub(amount);
            state.balances.insert(holder.clone(), new_balance);
            state.meta.total_supply = state.meta.total_supply.saturating_sub(amount);

            self.persist_account(holder, new_balance).await?;
            let meta = state.meta.clone();
            self.persist_meta(&meta).await?;
        }

        self.events
            .append(
                EventKind::Burned {
                    holder: holder.clone(),
                    amount,
                },
                reference,
            )
            .await?;
        Ok(())
    }

    /// Halt transfer, mint, and burn
    pub async fn pause(&self, caller: &Address) -> TokenResult<()> {
        self.roles.require(caller, labels::PAUSER).await?;
        let mut state = self.state.write().await;
        state.meta.paused = true;
        let meta = state.meta.clone();
        self.persist_meta(&meta).await?;
        warn!("Spending token paused by {}", caller);
        Ok(())
    }

    /// Resume after a pause
    pub async fn unpause(&self, caller: &Address) -> TokenResult<()> {
        self.roles.require(caller, labels::PAUSER).await?;
        let mut state = self.state.write().await;
        state.meta.paused = false;
        let meta = state.meta.clone();
        self.persist_meta(&meta).await?;
        info!("Spending token unpaused by {}", caller);
        Ok(())
    }

    /// Current balance of an address
    pub async fn balance_of(&self, address: &Address) -> Amount {
        let state = self.state.read().await;
        state.balances.get(address).copied().unwrap_or_default()
    }

    /// Current total supply
    pub async fn total_supply(&self) -> Amount {
        self.state.read().await.meta.total_supply
    }

    /// Whether the token is paused
    pub async fn is_paused(&self) -> bool {
        self.state.read().await.meta.paused
    }

    /// Amount still mintable by an onramp minter in the current window
    pub async fn remaining_daily_mint(&self, minter: &Address) -> TokenResult<Amount> {
        self.remaining_daily_mint_at(timestamp_secs(), minter).await
    }

    /// Remaining daily mint with an explicit wall-clock reading
    pub async fn remaining_daily_mint_at(
        &self,
        now: u64,
        minter: &Address,
    ) -> TokenResult<Amount> {
        let state = self.state.read().await;
        let config = state
            .minters
            .get(minter)
            .ok_or_else(|| TokenError::LimitNotConfigured(minter.clone()))?;
        if now.saturating_sub(config.window_start_at) >= SECS_PER_DAY {
            Ok(config.daily_limit)
        } else {
            Ok(config.daily_limit.saturating_sub(config.daily_minted))
        }
    }
}
