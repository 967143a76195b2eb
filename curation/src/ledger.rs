//! Fungible balance ledger
//!
//! Tracks per-account balances of a single asset together with its total
//! supply. Transfers never fail on a shortfall: a shortfall within
//! [`TRANSFER_TOLERANCE`] is clamped, anything larger skips the transfer.
//! Burns are strict.
//!
//! Pre hooks may only change the amount of an operation. Balances are always
//! read from the ledger itself.

use log::{info, warn};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::{PoolError, Result};
use crate::hooks::{LedgerContext, LedgerHooks};
use crate::journal::JournaledMap;

/// Largest transfer shortfall that is absorbed by clamping (1e-6)
pub const TRANSFER_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Result of a [`Ledger::transfer`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferOutcome {
    /// The full requested amount moved
    Executed { amount: Decimal },
    /// The sender was short by less than the tolerance; its whole balance moved
    Clamped { amount: Decimal, shortfall: Decimal },
    /// The sender was short by more than the tolerance; nothing moved
    Skipped { requested: Decimal, available: Decimal },
}

impl TransferOutcome {
    /// Amount that actually changed hands
    pub fn amount(&self) -> Decimal {
        match self {
            TransferOutcome::Executed { amount } | TransferOutcome::Clamped { amount, .. } => *amount,
            TransferOutcome::Skipped { .. } => Decimal::ZERO,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TransferOutcome::Skipped { .. })
    }
}

/// Supply at the start of a staged operation and the post-hook calls held
/// back until it commits
#[derive(Debug, Clone)]
struct Staged {
    total_supply: Decimal,
    post_hooks: Vec<LedgerContext>,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: JournaledMap<Decimal>,
    total_supply: Decimal,
    hooks: LedgerHooks,
    staged: Option<Staged>,
}

impl Ledger {
    /// Create a ledger from initial balances; total supply is derived from them
    pub fn new<I, S>(initial_balances: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        Self::with_hooks(initial_balances, LedgerHooks::new())
    }

    pub fn with_hooks<I, S>(initial_balances: I, hooks: LedgerHooks) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let mut balances = Vec::new();
        for (account, amount) in initial_balances {
            let account = account.into();
            ensure_non_negative(amount, &format!("initial balance of {}", account))?;
            balances.push((account, amount));
        }
        let balances: JournaledMap<Decimal> = balances.into_iter().collect();

        let total_supply = balances
            .values()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or(PoolError::ArithmeticOverflow("ledger total supply"))?;

        Ok(Self {
            balances,
            total_supply,
            hooks,
            staged: None,
        })
    }

    /// Append hooks after the ones already registered
    pub fn register_hooks(&mut self, hooks: LedgerHooks) {
        self.hooks.extend(hooks);
    }

    pub fn balance_of(&self, account: &str) -> Decimal {
        self.balances.get(account).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_supply(&self) -> Decimal {
        self.total_supply
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.balances.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Balances ordered by account, for reporting
    pub fn balances(&self) -> BTreeMap<String, Decimal> {
        self.balances.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn transfer(&mut self, from: &str, to: &str, amount: Decimal) -> Result<TransferOutcome> {
        ensure_non_negative(amount, "transfer amount")?;

        let available = self.balance_of(from);
        let ctx = LedgerContext::transfer(from, to, amount, available, self.balance_of(to));
        let requested = self.hooks.run_pre(ctx).amount;
        ensure_non_negative(requested, "transfer amount after hooks")?;

        let outcome = if requested > available {
            let shortfall = requested - available;
            if shortfall < TRANSFER_TOLERANCE {
                info!(
                    "Rounding transfer {} -> {} down from {} to {} (shortfall {})",
                    from, to, requested, available, shortfall
                );
                TransferOutcome::Clamped {
                    amount: available,
                    shortfall,
                }
            } else {
                warn!(
                    "Skipping transfer {} -> {}: requested {}, available {}",
                    from, to, requested, available
                );
                return Ok(TransferOutcome::Skipped {
                    requested,
                    available,
                });
            }
        } else {
            TransferOutcome::Executed { amount: requested }
        };

        let amount = outcome.amount();
        let receiver_initial = self.balance_of(to);
        let sender_final = available - amount;
        self.balances.insert(from, sender_final);
        let receiver_final = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow("transfer receiver balance"))?;
        self.balances.insert(to, receiver_final);

        self.post(LedgerContext {
            sender_final_balance: Some(sender_final),
            receiver_final_balance: Some(receiver_final),
            ..LedgerContext::transfer(from, to, amount, available, receiver_initial)
        });
        Ok(outcome)
    }

    /// Mint `amount` to `to`; returns the amount minted after hooks
    pub fn mint(&mut self, to: &str, amount: Decimal) -> Result<Decimal> {
        ensure_non_negative(amount, "mint amount")?;

        let receiver_initial = self.balance_of(to);
        let minted = self
            .hooks
            .run_pre(LedgerContext::mint(to, amount, receiver_initial))
            .amount;
        ensure_non_negative(minted, "mint amount after hooks")?;

        let receiver_final = receiver_initial
            .checked_add(minted)
            .ok_or(PoolError::ArithmeticOverflow("mint receiver balance"))?;
        let total_supply = self
            .total_supply
            .checked_add(minted)
            .ok_or(PoolError::ArithmeticOverflow("mint total supply"))?;

        self.balances.insert(to, receiver_final);
        self.total_supply = total_supply;

        self.post(LedgerContext {
            receiver_final_balance: Some(receiver_final),
            ..LedgerContext::mint(to, minted, receiver_initial)
        });
        Ok(minted)
    }

    /// Burn `amount` from `from`; fails without mutation when the balance is short
    pub fn burn(&mut self, from: &str, amount: Decimal) -> Result<Decimal> {
        ensure_non_negative(amount, "burn amount")?;

        let sender_initial = self.balance_of(from);
        let burned = self
            .hooks
            .run_pre(LedgerContext::burn(from, amount, sender_initial))
            .amount;
        ensure_non_negative(burned, "burn amount after hooks")?;

        if sender_initial < burned {
            return Err(PoolError::InsufficientFunds {
                account: from.to_string(),
                requested: burned,
                available: sender_initial,
            });
        }

        let sender_final = sender_initial - burned;
        self.balances.insert(from, sender_final);
        self.total_supply -= burned;

        self.post(LedgerContext {
            sender_final_balance: Some(sender_final),
            ..LedgerContext::burn(from, burned, sender_initial)
        });
        Ok(burned)
    }

    /// Start recording changes; post hooks are held back until [`Ledger::commit`]
    pub(crate) fn begin(&mut self) {
        self.balances.begin();
        self.staged = Some(Staged {
            total_supply: self.total_supply,
            post_hooks: Vec::new(),
        });
    }

    /// Keep the recorded changes and run the post hooks they held back
    pub(crate) fn commit(&mut self) {
        self.balances.commit();
        if let Some(staged) = self.staged.take() {
            for ctx in staged.post_hooks {
                self.hooks.run_post(ctx);
            }
        }
    }

    /// Undo every change since [`Ledger::begin`]; held-back post hooks never run
    pub(crate) fn rollback(&mut self) {
        self.balances.rollback();
        if let Some(staged) = self.staged.take() {
            self.total_supply = staged.total_supply;
        }
    }

    fn post(&mut self, ctx: LedgerContext) {
        match &mut self.staged {
            Some(staged) => staged.post_hooks.push(ctx),
            None => {
                self.hooks.run_post(ctx);
            }
        }
    }
}

pub(crate) fn ensure_non_negative(amount: Decimal, what: &str) -> Result<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PoolError::InvalidAmount(format!("{} must not be negative, got {}", what, amount)));
    }
    Ok(())
}
