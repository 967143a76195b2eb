//! Scenario files
//!
//! A scenario is a pool configuration, the genesis allocations and an
//! ordered list of actions, read from TOML:
//!
//! ```toml
//! [pool]
//! issuance_rate = "0.0001"
//!
//! [[reserve_balances]]
//! account = "curator2"
//! amount = 1000
//!
//! [[actions]]
//! action = "deposit"
//! account = "curator2"
//! amount = 1000
//! ```

use anyhow::{Context, Result};
use curation_pool::{Allocation, Decimal, GenesisConfig, PoolConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Sleep { blocks: u64 },
    Step,
    Deposit { account: String, amount: Decimal },
    Withdraw { account: String, amount: Decimal },
    BuyShares { account: String, shares: Decimal },
    Claim { account: String },
    DistributeRoyalties { payer: String, amount: Decimal },
    TransferShares { from: String, to: String, amount: Decimal },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Sleep { blocks } => write!(f, "sleep {}", blocks),
            Action::Step => write!(f, "step"),
            Action::Deposit { account, amount } => write!(f, "deposit {} {}", account, amount),
            Action::Withdraw { account, amount } => write!(f, "withdraw {} {}", account, amount),
            Action::BuyShares { account, shares } => write!(f, "buy_shares {} {}", account, shares),
            Action::Claim { account } => write!(f, "claim {}", account),
            Action::DistributeRoyalties { payer, amount } => {
                write!(f, "distribute_royalties {} {}", payer, amount)
            }
            Action::TransferShares { from, to, amount } => {
                write!(f, "transfer_shares {} -> {} {}", from, to, amount)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: Option<String>,
    pub description: Option<String>,
    pub initial_block_height: u64,
    pub pool: PoolConfig,
    pub reserve_balances: Vec<Allocation>,
    pub share_balances: Vec<Allocation>,
    pub deposits: Vec<Allocation>,
    /// Accounts whose share and deposit ratios are recorded; ratios are
    /// taken against the first account listed
    pub watch: Vec<String>,
    pub actions: Vec<Action>,
}

impl Scenario {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(contents).context("Failed to parse scenario")?;
        scenario.pool.validate()?;
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn genesis(&self) -> GenesisConfig {
        GenesisConfig {
            reserve_balances: self.reserve_balances.clone(),
            share_balances: self.share_balances.clone(),
            deposits: self.deposits.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed scenario")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_actions() {
        let scenario = Scenario::from_toml_str(
            r#"
            watch = ["curator1", "curator2"]

            [pool]
            issuance_rate = "0.0001"

            [[actions]]
            action = "sleep"
            blocks = 100

            [[actions]]
            action = "step"

            [[actions]]
            action = "buy_shares"
            account = "queryMarket"
            shares = "12.5"

            [[actions]]
            action = "transfer_shares"
            from = "curator1"
            to = "curator2"
            amount = 10
            "#,
        )
        .unwrap();

        assert_eq!(scenario.pool.issuance_rate, Decimal::new(1, 4));
        assert_eq!(scenario.watch.len(), 2);
        assert_eq!(
            scenario.actions,
            vec![
                Action::Sleep { blocks: 100 },
                Action::Step,
                Action::BuyShares {
                    account: "queryMarket".to_string(),
                    shares: Decimal::new(125, 1),
                },
                Action::TransferShares {
                    from: "curator1".to_string(),
                    to: "curator2".to_string(),
                    amount: Decimal::from(10),
                },
            ]
        );
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = Scenario::from_toml_str(
            r#"
            [[actions]]
            action = "mint"
            account = "curator1"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_sleep_rejected() {
        let result = Scenario::from_toml_str(
            r#"
            [[actions]]
            action = "sleep"
            blocks = -5
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_pool_config_rejected() {
        let result = Scenario::from_toml_str(
            r#"
            [pool]
            issuance_rate = "-1"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_action_display() {
        let action = Action::Deposit {
            account: "curator2".to_string(),
            amount: Decimal::from(1000),
        };
        assert_eq!(action.to_string(), "deposit curator2 1000");
    }
}
