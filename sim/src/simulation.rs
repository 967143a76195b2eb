//! Action replay

use curation_pool::{Chain, CurationPool, PoolError, Result};
use log::{debug, error};

use crate::record::{LogEntry, StateRecord};
use crate::scenario::{Action, Scenario};

pub struct Simulation {
    chain: Chain,
    pool: CurationPool,
    watch: Vec<String>,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let chain = Chain::new(scenario.initial_block_height);
        let pool = CurationPool::from_genesis(scenario.pool.clone(), &scenario.genesis(), chain.clone())?;
        Ok(Self {
            chain,
            pool,
            watch: scenario.watch.clone(),
        })
    }

    pub fn pool(&self) -> &CurationPool {
        &self.pool
    }

    pub fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Sleep { blocks } => self.chain.sleep(*blocks).map(|_| ()),
            Action::Step => self.chain.step().map(|_| ()),
            Action::Deposit { account, amount } => self.pool.deposit(account, *amount),
            Action::Withdraw { account, amount } => self.pool.withdraw(account, *amount),
            Action::BuyShares { account, shares } => self.pool.buy_shares(account, *shares).map(|_| ()),
            Action::Claim { account } => self.pool.claim(account).map(|_| ()),
            Action::DistributeRoyalties { payer, amount } => self.pool.distribute_royalties(payer, *amount),
            Action::TransferShares { from, to, amount } => {
                let outcome = self.pool.transfer_shares(from, to, *amount)?;
                if outcome.is_skipped() {
                    return Err(PoolError::InsufficientFunds {
                        account: from.clone(),
                        requested: *amount,
                        available: self.pool.shares().balance_of(from),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn record(&self) -> StateRecord {
        StateRecord::capture(&self.pool, &self.watch)
    }

    /// Replay `actions` in order. A failed action is logged and recorded with
    /// its error; the pool is left as it was before that action.
    pub fn run(&mut self, actions: &[Action]) -> Vec<LogEntry> {
        let mut log = Vec::with_capacity(actions.len() + 1);
        log.push(LogEntry {
            step: 0,
            action: None,
            error: None,
            state: self.record(),
        });

        for (index, action) in actions.iter().enumerate() {
            let step = index + 1;
            let error = match self.apply(action) {
                Ok(()) => {
                    debug!("Step {}: {}", step, action);
                    None
                }
                Err(e) => {
                    error!("Step {} ({}) failed: {}", step, action, e);
                    Some(e.to_string())
                }
            };
            log.push(LogEntry {
                step,
                action: Some(action.clone()),
                error,
                state: self.record(),
            });
        }

        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curation_pool::{Allocation, Decimal};

    fn scenario() -> Scenario {
        Scenario {
            reserve_balances: vec![
                Allocation::new("curator1", Decimal::from(100)),
                Allocation::new("curationPool", Decimal::from(50)),
            ],
            share_balances: vec![Allocation::new("curator1", Decimal::from(10))],
            deposits: vec![Allocation::new("curator1", Decimal::from(50))],
            watch: vec!["curator1".to_string()],
            ..Scenario::default()
        }
    }

    #[test]
    fn test_initial_state_recorded() {
        let mut sim = Simulation::new(&scenario()).unwrap();
        let log = sim.run(&[]);

        assert_eq!(log.len(), 1);
        assert_eq!(log[0].label(), "initial_state");
        assert_eq!(log[0].state.primary_pool_reserve, Decimal::from(50));
        assert_eq!(log[0].state.watched("curator1").unwrap().share_ratio, Some(Decimal::ONE));
    }

    #[test]
    fn test_failed_action_recorded_and_replay_continues() {
        let mut sim = Simulation::new(&scenario()).unwrap();
        let actions = vec![
            Action::Withdraw {
                account: "curator1".to_string(),
                amount: Decimal::from(500),
            },
            Action::Step,
        ];
        let log = sim.run(&actions);

        assert_eq!(log.len(), 3);
        assert!(log[1].is_failure());
        assert_eq!(log[1].state.deposits.get("curator1"), Some(&Decimal::from(50)));
        assert!(!log[2].is_failure());
        assert_eq!(log[2].state.block_height, 1);
    }

    #[test]
    fn test_skipped_share_transfer_is_a_failure() {
        let mut sim = Simulation::new(&scenario()).unwrap();
        let result = sim.apply(&Action::TransferShares {
            from: "curator1".to_string(),
            to: "curator2".to_string(),
            amount: Decimal::from(11),
        });
        assert!(matches!(result, Err(PoolError::InsufficientFunds { .. })));
    }
}
