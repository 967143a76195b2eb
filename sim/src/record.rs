//! Per-step state records

use curation_pool::{CurationPool, Decimal};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::scenario::Action;

/// Holdings of a watched account, with ratios against the first watched account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchedAccount {
    pub account: String,
    pub shares: Decimal,
    pub deposit: Decimal,
    pub share_ratio: Option<Decimal>,
    pub deposit_ratio: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRecord {
    pub block_height: u64,
    pub share_balances: BTreeMap<String, Decimal>,
    pub reserve_balances: BTreeMap<String, Decimal>,
    pub deposits: BTreeMap<String, Decimal>,
    pub share_supply: Decimal,
    /// Share supply with pending issuance; `None` when the projection overflows
    pub total_shares: Option<Decimal>,
    pub primary_pool_reserve: Decimal,
    pub secondary_total_deposits: Decimal,
    pub acc_shares_per_deposit: Decimal,
    pub acc_royalties_per_deposit: Decimal,
    pub acc_royalties_per_share: Decimal,
    pub watched: Vec<WatchedAccount>,
}

impl StateRecord {
    pub fn capture(pool: &CurationPool, watch: &[String]) -> Self {
        let secondary = pool.secondary();

        let base = watch
            .first()
            .map(|account| (pool.shares().balance_of(account), pool.deposit_of(account)));
        let watched = watch
            .iter()
            .map(|account| {
                let shares = pool.shares().balance_of(account);
                let deposit = pool.deposit_of(account);
                let (base_shares, base_deposit) = base.unwrap_or((Decimal::ZERO, Decimal::ZERO));
                WatchedAccount {
                    account: account.clone(),
                    shares,
                    deposit,
                    share_ratio: shares.checked_div(base_shares),
                    deposit_ratio: deposit.checked_div(base_deposit),
                }
            })
            .collect();

        Self {
            block_height: pool.chain().block_height(),
            share_balances: pool.shares().balances(),
            reserve_balances: pool.reserve().balances(),
            deposits: pool.deposits(),
            share_supply: pool.shares().total_supply(),
            total_shares: pool.total_shares().ok(),
            primary_pool_reserve: pool.reserve().balance_of(pool.address()),
            secondary_total_deposits: secondary.total_deposits(),
            acc_shares_per_deposit: secondary.acc_shares_per_deposit(),
            acc_royalties_per_deposit: secondary.acc_royalties_per_deposit(),
            acc_royalties_per_share: pool.acc_royalties_per_share(),
            watched,
        }
    }

    pub fn watched(&self, account: &str) -> Option<&WatchedAccount> {
        self.watched.iter().find(|w| w.account == account)
    }
}

/// One line of a simulation log. `action` is `None` for the initial state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub step: usize,
    pub action: Option<Action>,
    pub error: Option<String>,
    pub state: StateRecord,
}

impl LogEntry {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn label(&self) -> String {
        match &self.action {
            Some(action) => action.to_string(),
            None => "initial_state".to_string(),
        }
    }
}
