//! Primary curation pool
//!
//! Takes reserve deposits, issues shares at a compounding per-block rate,
//! sells new shares at a dilution price, and hands proportional distribution
//! of issuance and royalties to the [`SecondaryPool`].
//!
//! Every stake change settles first: `claim` realizes pending issuance and
//! flushes the account's secondary-pool entitlement before its deposit is
//! re-registered. Share royalties are settled for every holder whose share
//! balance is about to change, so each snapshot always matches the balance
//! it was taken at.
//!
//! Each public operation runs inside a journal. Writes record what they
//! overwrite; a failed operation is undone from that record and its ledger
//! post hooks never run.

use log::{debug, info, warn};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain::Chain;
use crate::config::{GenesisConfig, PoolConfig};
use crate::error::{PoolError, Result};
use crate::hooks::LedgerHooks;
use crate::journal::JournaledMap;
use crate::ledger::{ensure_non_negative, Ledger, TransferOutcome, TRANSFER_TOLERANCE};
use crate::secondary::{DepositLookup, SecondaryPool, Settlement};

/// Share balance and royalty accumulator as of an account's last share-royalty settlement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub shares: Decimal,
    pub acc_royalties_per_share: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct Scalars {
    acc_royalties_per_share: Decimal,
    last_minted_block: u64,
    deferred_royalties: Decimal,
}

#[derive(Debug, Default)]
struct PoolState {
    reserve: Ledger,
    shares: Ledger,
    deposits: JournaledMap<Decimal>,
    secondary: SecondaryPool,
    snapshots: JournaledMap<ShareSnapshot>,
    acc_royalties_per_share: Decimal,
    last_minted_block: u64,
    /// Share royalties owed to the secondary pool while it had no depositors
    deferred_royalties: Decimal,
    saved: Option<Scalars>,
}

impl PoolState {
    fn begin(&mut self) {
        self.reserve.begin();
        self.shares.begin();
        self.deposits.begin();
        self.secondary.begin();
        self.snapshots.begin();
        self.saved = Some(Scalars {
            acc_royalties_per_share: self.acc_royalties_per_share,
            last_minted_block: self.last_minted_block,
            deferred_royalties: self.deferred_royalties,
        });
    }

    fn commit(&mut self) {
        self.deposits.commit();
        self.secondary.commit();
        self.snapshots.commit();
        self.saved = None;
        self.reserve.commit();
        self.shares.commit();
    }

    fn rollback(&mut self) {
        self.reserve.rollback();
        self.shares.rollback();
        self.deposits.rollback();
        self.secondary.rollback();
        self.snapshots.rollback();
        if let Some(saved) = self.saved.take() {
            self.acc_royalties_per_share = saved.acc_royalties_per_share;
            self.last_minted_block = saved.last_minted_block;
            self.deferred_royalties = saved.deferred_royalties;
        }
    }
}

#[derive(Debug)]
pub struct CurationPool {
    config: PoolConfig,
    chain: Chain,
    state: PoolState,
}

impl CurationPool {
    /// Create a pool over an existing reserve ledger.
    ///
    /// The initial deposits must sum exactly to the reserve already held at
    /// the pool's address.
    pub fn new<D, DS, S, SS>(
        config: PoolConfig,
        reserve: Ledger,
        initial_deposits: D,
        initial_shares: S,
        chain: Chain,
    ) -> Result<Self>
    where
        D: IntoIterator<Item = (DS, Decimal)>,
        DS: Into<String>,
        S: IntoIterator<Item = (SS, Decimal)>,
        SS: Into<String>,
    {
        config.validate()?;

        let mut deposits = Vec::new();
        for (account, amount) in initial_deposits {
            let account = account.into();
            ensure_non_negative(amount, &format!("initial deposit of {}", account))?;
            deposits.push((account, amount));
        }
        let deposits: JournaledMap<Decimal> = deposits.into_iter().collect();

        let deposit_sum = deposits
            .values()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or(PoolError::ArithmeticOverflow("initial deposits"))?;
        let pool_reserve = reserve.balance_of(&config.address);
        if deposit_sum != pool_reserve {
            return Err(PoolError::InvariantViolation {
                deposits: deposit_sum,
                reserve: pool_reserve,
            });
        }

        let shares = Ledger::new(initial_shares)?;
        let secondary = SecondaryPool::new(config.secondary_address.clone(), pool_reserve);
        let last_minted_block = chain.block_height();

        info!(
            "Curation pool {} created at block {}: reserve {}, shares {}, issuance rate {}",
            config.address,
            last_minted_block,
            pool_reserve,
            shares.total_supply(),
            config.issuance_rate
        );

        Ok(Self {
            config,
            chain,
            state: PoolState {
                reserve,
                shares,
                deposits,
                secondary,
                last_minted_block,
                ..PoolState::default()
            },
        })
    }

    /// Build the reserve ledger and the pool from genesis allocations
    pub fn from_genesis(config: PoolConfig, genesis: &GenesisConfig, chain: Chain) -> Result<Self> {
        let reserve = Ledger::new(
            genesis
                .reserve_balances
                .iter()
                .map(|a| (a.account.clone(), a.amount)),
        )?;
        Self::new(
            config,
            reserve,
            genesis.deposits.iter().map(|a| (a.account.clone(), a.amount)),
            genesis.share_balances.iter().map(|a| (a.account.clone(), a.amount)),
            chain,
        )
    }

    pub fn register_reserve_hooks(&mut self, hooks: LedgerHooks) {
        self.state.reserve.register_hooks(hooks);
    }

    pub fn register_share_hooks(&mut self, hooks: LedgerHooks) {
        self.state.shares.register_hooks(hooks);
    }

    // ---- Public operations ----

    /// Deposit reserve into the pool. Settles the account first.
    pub fn deposit(&mut self, account: &str, amount: Decimal) -> Result<()> {
        self.commit(|pool, state| pool.apply_deposit(state, account, amount))
    }

    /// Withdraw deposited reserve. Shares are kept.
    pub fn withdraw(&mut self, account: &str, amount: Decimal) -> Result<()> {
        self.commit(|pool, state| pool.apply_withdraw(state, account, amount))
    }

    /// Buy newly minted shares at their self-assessed dilution cost.
    /// Returns the reserve paid.
    pub fn buy_shares(&mut self, account: &str, shares: Decimal) -> Result<Decimal> {
        self.commit(|pool, state| pool.apply_buy_shares(state, account, shares))
    }

    /// Realize issuance and flush the account's pending shares and royalties
    pub fn claim(&mut self, account: &str) -> Result<Settlement> {
        self.commit(|pool, state| pool.apply_claim(state, account))
    }

    /// Pay royalties to every share holder in proportion to shares held.
    /// Holders collect them through any later change to their share balance
    /// or through [`CurationPool::claim_share_royalties`].
    pub fn distribute_royalties(&mut self, payer: &str, royalties: Decimal) -> Result<()> {
        self.commit(|pool, state| pool.apply_distribute_royalties(state, payer, royalties))
    }

    /// Pay out the royalties the account's shares have earned
    pub fn claim_share_royalties(&mut self, account: &str) -> Result<Decimal> {
        self.commit(|pool, state| pool.settle_share_royalties(state, account))
    }

    /// Move shares between holders, settling both sides' royalties first
    pub fn transfer_shares(&mut self, from: &str, to: &str, amount: Decimal) -> Result<TransferOutcome> {
        self.commit(|pool, state| pool.apply_transfer_shares(state, from, to, amount))
    }

    // ---- Accessors ----

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn reserve(&self) -> &Ledger {
        &self.state.reserve
    }

    pub fn shares(&self) -> &Ledger {
        &self.state.shares
    }

    pub fn secondary(&self) -> &SecondaryPool {
        &self.state.secondary
    }

    pub fn deposit_of(&self, account: &str) -> Decimal {
        self.state.deposits.deposit_of(account)
    }

    pub fn deposits(&self) -> BTreeMap<String, Decimal> {
        self.state
            .deposits
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn last_minted_block(&self) -> u64 {
        self.state.last_minted_block
    }

    pub fn acc_royalties_per_share(&self) -> Decimal {
        self.state.acc_royalties_per_share
    }

    /// Share royalties held for the secondary pool until it has depositors again
    pub fn deferred_share_royalties(&self) -> Decimal {
        self.state.deferred_royalties
    }

    pub fn share_snapshot_of(&self, account: &str) -> ShareSnapshot {
        share_snapshot_of(&self.state, account)
    }

    /// Share supply projected to the current block, as if issuance had been realized
    pub fn total_shares(&self) -> Result<Decimal> {
        self.projected_total_shares(&self.state)
    }

    // ---- Internals ----

    fn commit<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&Self, &mut PoolState) -> Result<T>,
    {
        let mut state = std::mem::take(&mut self.state);
        state.begin();
        let out = op(&*self, &mut state);
        match out {
            Ok(_) => state.commit(),
            Err(_) => state.rollback(),
        }
        self.state = state;
        out
    }

    fn is_holding_address(&self, account: &str) -> bool {
        account == self.config.address
            || account == self.config.secondary_address
            || account == self.config.royalty_address
    }

    fn ensure_external(&self, account: &str) -> Result<()> {
        if self.is_holding_address(account) {
            return Err(PoolError::ReservedAddress(account.to_string()));
        }
        Ok(())
    }

    fn projected_total_shares(&self, state: &PoolState) -> Result<Decimal> {
        let elapsed = self.chain.block_height().saturating_sub(state.last_minted_block);
        compound(state.shares.total_supply(), self.config.issuance_rate, elapsed)
    }

    /// Run a share-ledger change with the share royalties of every holder it
    /// touches settled before it and re-snapshotted after it
    fn with_share_settlement<T, F>(&self, state: &mut PoolState, holders: &[&str], change: F) -> Result<T>
    where
        F: FnOnce(&mut PoolState) -> Result<T>,
    {
        for holder in holders {
            self.settle_share_royalties(state, holder)?;
        }
        let out = change(state)?;
        for holder in holders {
            let snapshot = ShareSnapshot {
                shares: state.shares.balance_of(holder),
                acc_royalties_per_share: state.acc_royalties_per_share,
            };
            state.snapshots.insert(holder, snapshot);
        }
        Ok(out)
    }

    /// Mint the issuance accrued since the last mint into the secondary pool
    fn mint_shares(&self, state: &mut PoolState) -> Result<Decimal> {
        let height = self.chain.block_height();
        let elapsed = height.saturating_sub(state.last_minted_block);
        if elapsed == 0 {
            return Ok(Decimal::ZERO);
        }

        let supply = state.shares.total_supply();
        let to_mint = compound(supply, self.config.issuance_rate, elapsed)? - supply;

        let secondary = self.config.secondary_address.as_str();
        let minted = self.with_share_settlement(state, &[secondary], |state| {
            let minted = state.shares.mint(secondary, to_mint)?;
            state.secondary.distribute_shares(minted, &mut state.shares)?;
            Ok(minted)
        })?;
        state.last_minted_block = height;

        debug!(
            "Minted {} shares over {} blocks (block {}), supply {}",
            minted,
            elapsed,
            height,
            state.shares.total_supply()
        );
        Ok(minted)
    }

    fn apply_claim(&self, state: &mut PoolState, account: &str) -> Result<Settlement> {
        self.ensure_external(account)?;
        self.mint_shares(state)?;

        let secondary = self.config.secondary_address.as_str();
        self.with_share_settlement(state, &[account, secondary], |state| {
            state
                .secondary
                .claim(account, &state.deposits, &mut state.shares, &mut state.reserve)
        })
    }

    fn apply_deposit(&self, state: &mut PoolState, account: &str, amount: Decimal) -> Result<()> {
        self.ensure_external(account)?;
        ensure_non_negative(amount, "deposit")?;

        let available = state.reserve.balance_of(account);
        if available < amount {
            return Err(PoolError::InsufficientFunds {
                account: account.to_string(),
                requested: amount,
                available,
            });
        }

        // Settle against the pre-deposit stake
        self.apply_claim(state, account)?;

        let moved = state
            .reserve
            .transfer(account, &self.config.address, amount)?
            .amount();
        let new_deposit = state
            .deposits
            .deposit_of(account)
            .checked_add(moved)
            .ok_or(PoolError::ArithmeticOverflow("deposit"))?;
        state.deposits.insert(account, new_deposit);
        state
            .secondary
            .update_deposit(account, new_deposit, &state.deposits)?;

        info!("{} deposited {} (deposit now {})", account, moved, new_deposit);
        Ok(())
    }

    fn apply_withdraw(&self, state: &mut PoolState, account: &str, amount: Decimal) -> Result<()> {
        self.ensure_external(account)?;
        ensure_non_negative(amount, "withdrawal")?;

        let deposit = state.deposits.deposit_of(account);
        if deposit < amount {
            return Err(PoolError::InsufficientFunds {
                account: account.to_string(),
                requested: amount,
                available: deposit,
            });
        }

        // Settlement below must see the stake registered before this withdrawal
        state.secondary.pin_snapshot(account, &state.deposits);

        let new_deposit = deposit - amount;
        state.deposits.insert(account, new_deposit);
        let outcome = state.reserve.transfer(&self.config.address, account, amount)?;
        if outcome.is_skipped() {
            return Err(PoolError::InsufficientFunds {
                account: self.config.address.clone(),
                requested: amount,
                available: state.reserve.balance_of(&self.config.address),
            });
        }

        self.apply_claim(state, account)?;
        state
            .secondary
            .update_deposit(account, new_deposit, &state.deposits)?;

        info!("{} withdrew {} (deposit now {})", account, amount, new_deposit);
        Ok(())
    }

    fn apply_buy_shares(&self, state: &mut PoolState, account: &str, shares: Decimal) -> Result<Decimal> {
        self.ensure_external(account)?;
        ensure_non_negative(shares, "share purchase")?;
        if shares.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let total_value = state
            .reserve
            .balance_of(&self.config.address)
            .checked_mul(self.config.valuation_multiple)
            .ok_or(PoolError::ArithmeticOverflow("self-assessed value"))?;
        let total_shares = self.projected_total_shares(state)?;
        let dilution = shares
            .checked_add(total_shares)
            .and_then(|outstanding| shares.checked_div(outstanding))
            .ok_or(PoolError::ArithmeticOverflow("dilution"))?;
        let cost = total_value
            .checked_mul(dilution)
            .ok_or(PoolError::ArithmeticOverflow("purchase cost"))?;

        let available = state.reserve.balance_of(account);
        if cost - available >= TRANSFER_TOLERANCE {
            return Err(PoolError::InsufficientFunds {
                account: account.to_string(),
                requested: cost,
                available,
            });
        }

        // Existing depositors are compensated for the dilution
        let paid = state
            .reserve
            .transfer(account, &self.config.secondary_address, cost)?
            .amount();
        if !paid.is_zero() {
            state.secondary.distribute_royalties(paid)?;
        }

        self.with_share_settlement(state, &[account], |state| state.shares.mint(account, shares))?;

        info!(
            "{} bought {} shares for {} (dilution {})",
            account, shares, paid, dilution
        );
        Ok(paid)
    }

    fn apply_distribute_royalties(&self, state: &mut PoolState, payer: &str, royalties: Decimal) -> Result<()> {
        self.ensure_external(payer)?;
        ensure_non_negative(royalties, "royalties")?;

        self.mint_shares(state)?;
        let supply = state.shares.total_supply();
        if supply <= Decimal::ZERO {
            return Err(PoolError::NoShareholders);
        }

        let available = state.reserve.balance_of(payer);
        if royalties - available >= TRANSFER_TOLERANCE {
            return Err(PoolError::InsufficientFunds {
                account: payer.to_string(),
                requested: royalties,
                available,
            });
        }

        let paid = state
            .reserve
            .transfer(payer, &self.config.royalty_address, royalties)?
            .amount();
        let per_share = paid
            .checked_div(supply)
            .ok_or(PoolError::ArithmeticOverflow("royalties per share"))?;
        state.acc_royalties_per_share = state
            .acc_royalties_per_share
            .checked_add(per_share)
            .ok_or(PoolError::ArithmeticOverflow("accumulated royalties per share"))?;

        info!("{} paid {} royalties ({} per share)", payer, paid, per_share);
        Ok(())
    }

    /// Pay the account the royalties its snapshotted shares earned and move
    /// its snapshot to the current balance and accumulator.
    ///
    /// Royalties earned by shares held in the secondary pool are forwarded
    /// to depositors. While the secondary pool has no depositors they are
    /// held back and forwarded with its next settlement.
    fn settle_share_royalties(&self, state: &mut PoolState, account: &str) -> Result<Decimal> {
        let snapshot = share_snapshot_of(state, account);
        let mut owed = (state.acc_royalties_per_share - snapshot.acc_royalties_per_share)
            .checked_mul(snapshot.shares)
            .ok_or(PoolError::ArithmeticOverflow("owed royalties"))?;

        let forward = account == self.config.secondary_address;
        if forward {
            owed = owed
                .checked_add(state.deferred_royalties)
                .ok_or(PoolError::ArithmeticOverflow("deferred royalties"))?;
            if state.secondary.total_deposits() <= Decimal::ZERO {
                if !owed.is_zero() {
                    warn!("Deferring {} share royalties of {}: no deposits registered", owed, account);
                }
                state.deferred_royalties = owed;
                owed = Decimal::ZERO;
            } else {
                state.deferred_royalties = Decimal::ZERO;
            }
        }

        let mut paid = Decimal::ZERO;
        if !owed.is_zero() {
            let outcome = state
                .reserve
                .transfer(&self.config.royalty_address, account, owed)?;
            if outcome.is_skipped() {
                return Err(PoolError::InsufficientFunds {
                    account: self.config.royalty_address.clone(),
                    requested: owed,
                    available: state.reserve.balance_of(&self.config.royalty_address),
                });
            }
            paid = outcome.amount();
            if forward {
                state.secondary.distribute_royalties(paid)?;
            }
            debug!("Settled {} share royalties to {}", paid, account);
        }

        let snapshot = ShareSnapshot {
            shares: state.shares.balance_of(account),
            acc_royalties_per_share: state.acc_royalties_per_share,
        };
        state.snapshots.insert(account, snapshot);
        Ok(paid)
    }

    fn apply_transfer_shares(
        &self,
        state: &mut PoolState,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransferOutcome> {
        self.ensure_external(from)?;
        self.ensure_external(to)?;
        ensure_non_negative(amount, "share transfer")?;

        self.with_share_settlement(state, &[from, to], |state| state.shares.transfer(from, to, amount))
    }
}

/// Stored snapshot, or a zero baseline for a holder whose balance has not
/// changed since genesis
fn share_snapshot_of(state: &PoolState, account: &str) -> ShareSnapshot {
    state.snapshots.get(account).copied().unwrap_or(ShareSnapshot {
        shares: state.shares.balance_of(account),
        acc_royalties_per_share: Decimal::ZERO,
    })
}

/// `supply * (1 + rate)^blocks`
fn compound(supply: Decimal, rate: Decimal, blocks: u64) -> Result<Decimal> {
    if blocks == 0 || rate.is_zero() {
        return Ok(supply);
    }
    let growth = (Decimal::ONE + rate)
        .checked_powu(blocks)
        .ok_or(PoolError::ArithmeticOverflow("compounded issuance"))?;
    supply
        .checked_mul(growth)
        .ok_or(PoolError::ArithmeticOverflow("compounded supply"))
}
