//! Secondary pool
//!
//! Distributes newly issued primary-pool shares and dilution royalties to
//! depositors in proportion to their registered deposit. Uses two
//! per-deposit accumulators and a lazily created snapshot per account:
//!
//! ```text
//! pending = (acc_now - acc_at_snapshot) * deposit_at_snapshot
//! ```
//!
//! The pool never holds a reference back to its owner. Ledgers and the
//! deposit lookup are passed in by the caller on every operation.

use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PoolError, Result};
use crate::journal::JournaledMap;
use crate::ledger::{ensure_non_negative, Ledger};

/// Read-only view of primary-pool deposits
pub trait DepositLookup {
    fn deposit_of(&self, account: &str) -> Decimal;
}

impl DepositLookup for HashMap<String, Decimal> {
    fn deposit_of(&self, account: &str) -> Decimal {
        self.get(account).copied().unwrap_or(Decimal::ZERO)
    }
}

/// An account's registered deposit and the accumulators it last settled at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepositSnapshot {
    pub deposit: Decimal,
    pub acc_shares_per_deposit: Decimal,
    pub acc_royalties_per_deposit: Decimal,
}

/// Amounts paid out by a single settlement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Settlement {
    pub shares: Decimal,
    pub royalties: Decimal,
}

impl Settlement {
    pub fn is_empty(&self) -> bool {
        self.shares.is_zero() && self.royalties.is_zero()
    }
}

#[derive(Debug, Clone, Copy)]
struct Totals {
    acc_shares_per_deposit: Decimal,
    acc_royalties_per_deposit: Decimal,
    total_deposits: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SecondaryPool {
    address: String,
    snapshots: JournaledMap<DepositSnapshot>,
    acc_shares_per_deposit: Decimal,
    acc_royalties_per_deposit: Decimal,
    total_deposits: Decimal,
    saved: Option<Totals>,
}

impl SecondaryPool {
    pub fn new(address: impl Into<String>, total_deposits: Decimal) -> Self {
        Self {
            address: address.into(),
            snapshots: JournaledMap::default(),
            acc_shares_per_deposit: Decimal::ZERO,
            acc_royalties_per_deposit: Decimal::ZERO,
            total_deposits,
            saved: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn total_deposits(&self) -> Decimal {
        self.total_deposits
    }

    pub fn acc_shares_per_deposit(&self) -> Decimal {
        self.acc_shares_per_deposit
    }

    pub fn acc_royalties_per_deposit(&self) -> Decimal {
        self.acc_royalties_per_deposit
    }

    /// Stored snapshot, or the default for an account never snapshotted.
    ///
    /// A genesis participant (nonzero primary deposit, no snapshot yet)
    /// defaults to zero accumulators so it collects everything accrued since
    /// inception. Anyone else defaults to a zero deposit at the current
    /// accumulators.
    pub fn snapshot_of(&self, account: &str, deposits: &dyn DepositLookup) -> DepositSnapshot {
        if let Some(snapshot) = self.snapshots.get(account) {
            return *snapshot;
        }

        let deposit = deposits.deposit_of(account);
        if deposit > Decimal::ZERO {
            DepositSnapshot {
                deposit,
                acc_shares_per_deposit: Decimal::ZERO,
                acc_royalties_per_deposit: Decimal::ZERO,
            }
        } else {
            DepositSnapshot {
                deposit: Decimal::ZERO,
                acc_shares_per_deposit: self.acc_shares_per_deposit,
                acc_royalties_per_deposit: self.acc_royalties_per_deposit,
            }
        }
    }

    pub fn has_snapshot(&self, account: &str) -> bool {
        self.snapshots.contains_key(account)
    }

    /// Store the account's current (possibly default) snapshot unchanged
    pub(crate) fn pin_snapshot(&mut self, account: &str, deposits: &dyn DepositLookup) {
        if !self.has_snapshot(account) {
            let snapshot = self.snapshot_of(account, deposits);
            self.snapshots.insert(account, snapshot);
        }
    }

    /// Register a new deposit size without settling anything
    pub fn update_deposit(&mut self, account: &str, amount: Decimal, deposits: &dyn DepositLookup) -> Result<()> {
        ensure_non_negative(amount, "registered deposit")?;

        let prev_deposit = self.snapshot_of(account, deposits).deposit;
        let total_deposits = (self.total_deposits - prev_deposit)
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow("secondary total deposits"))?;

        self.snapshots.insert(
            account,
            DepositSnapshot {
                deposit: amount,
                acc_shares_per_deposit: self.acc_shares_per_deposit,
                acc_royalties_per_deposit: self.acc_royalties_per_deposit,
            },
        );
        self.total_deposits = total_deposits;

        debug!(
            "Registered deposit {} for {} (was {}), total deposits {}",
            amount, account, prev_deposit, self.total_deposits
        );
        Ok(())
    }

    /// Spread freshly minted shares (held at this pool's address) over all
    /// deposits. With no deposits the shares are burned instead.
    pub fn distribute_shares(&mut self, shares: Decimal, share_ledger: &mut Ledger) -> Result<()> {
        ensure_non_negative(shares, "distributed shares")?;

        if self.total_deposits > Decimal::ZERO {
            let per_deposit = shares
                .checked_div(self.total_deposits)
                .ok_or(PoolError::ArithmeticOverflow("shares per deposit"))?;
            self.acc_shares_per_deposit = self
                .acc_shares_per_deposit
                .checked_add(per_deposit)
                .ok_or(PoolError::ArithmeticOverflow("accumulated shares per deposit"))?;
        } else {
            warn!("No deposits registered, burning {} unclaimable shares", shares);
            share_ledger.burn(&self.address, shares)?;
        }
        Ok(())
    }

    /// Spread royalties (already moved to this pool's address) over all deposits
    pub fn distribute_royalties(&mut self, royalties: Decimal) -> Result<()> {
        ensure_non_negative(royalties, "distributed royalties")?;

        if self.total_deposits <= Decimal::ZERO {
            return Err(PoolError::NoDepositors);
        }

        let per_deposit = royalties
            .checked_div(self.total_deposits)
            .ok_or(PoolError::ArithmeticOverflow("royalties per deposit"))?;
        self.acc_royalties_per_deposit = self
            .acc_royalties_per_deposit
            .checked_add(per_deposit)
            .ok_or(PoolError::ArithmeticOverflow("accumulated royalties per deposit"))?;
        Ok(())
    }

    /// Settle the account's pending shares and royalties against the deposit
    /// it was last registered with, then move its snapshot to the current
    /// accumulators.
    pub fn claim(
        &mut self,
        account: &str,
        deposits: &dyn DepositLookup,
        share_ledger: &mut Ledger,
        reserve_ledger: &mut Ledger,
    ) -> Result<Settlement> {
        let snapshot = self.snapshot_of(account, deposits);

        let owed_shares = pending(
            self.acc_shares_per_deposit,
            snapshot.acc_shares_per_deposit,
            snapshot.deposit,
        )?;
        let shares = share_ledger.transfer(&self.address, account, owed_shares)?;

        let owed_royalties = pending(
            self.acc_royalties_per_deposit,
            snapshot.acc_royalties_per_deposit,
            snapshot.deposit,
        )?;
        let royalties = reserve_ledger.transfer(&self.address, account, owed_royalties)?;

        self.snapshots.insert(
            account,
            DepositSnapshot {
                deposit: snapshot.deposit,
                acc_shares_per_deposit: self.acc_shares_per_deposit,
                acc_royalties_per_deposit: self.acc_royalties_per_deposit,
            },
        );

        let settlement = Settlement {
            shares: shares.amount(),
            royalties: royalties.amount(),
        };
        if !settlement.is_empty() {
            debug!(
                "Settled {} shares and {} royalties to {}",
                settlement.shares, settlement.royalties, account
            );
        }
        Ok(settlement)
    }

    pub(crate) fn begin(&mut self) {
        self.snapshots.begin();
        self.saved = Some(Totals {
            acc_shares_per_deposit: self.acc_shares_per_deposit,
            acc_royalties_per_deposit: self.acc_royalties_per_deposit,
            total_deposits: self.total_deposits,
        });
    }

    pub(crate) fn commit(&mut self) {
        self.snapshots.commit();
        self.saved = None;
    }

    pub(crate) fn rollback(&mut self) {
        self.snapshots.rollback();
        if let Some(saved) = self.saved.take() {
            self.acc_shares_per_deposit = saved.acc_shares_per_deposit;
            self.acc_royalties_per_deposit = saved.acc_royalties_per_deposit;
            self.total_deposits = saved.total_deposits;
        }
    }
}

fn pending(current: Decimal, at_snapshot: Decimal, stake: Decimal) -> Result<Decimal> {
    (current - at_snapshot)
        .checked_mul(stake)
        .ok_or(PoolError::ArithmeticOverflow("pending entitlement"))
}
