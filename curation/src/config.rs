//! Pool configuration and genesis allocations

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PoolError, Result};

pub const DEFAULT_POOL_ADDRESS: &str = "curationPool";
pub const DEFAULT_SECONDARY_ADDRESS: &str = "secondaryPool";
pub const DEFAULT_ROYALTY_ADDRESS: &str = "curationPool/royalties";

/// Parameters of a curation pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Reserve account holding all deposits
    pub address: String,
    /// Account holding undistributed issuance and dilution royalties
    pub secondary_address: String,
    /// Account holding royalties owed to share holders
    pub royalty_address: String,
    /// Per-block compounding share issuance rate
    pub issuance_rate: Decimal,
    /// Self-assessed share value as a multiple of the pool's reserve
    pub valuation_multiple: Decimal,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_POOL_ADDRESS.to_string(),
            secondary_address: DEFAULT_SECONDARY_ADDRESS.to_string(),
            royalty_address: DEFAULT_ROYALTY_ADDRESS.to_string(),
            issuance_rate: Decimal::ZERO,
            valuation_multiple: Decimal::ONE,
        }
    }
}

impl PoolConfig {
    pub fn with_issuance_rate(mut self, issuance_rate: Decimal) -> Self {
        self.issuance_rate = issuance_rate;
        self
    }

    pub fn with_valuation_multiple(mut self, valuation_multiple: Decimal) -> Self {
        self.valuation_multiple = valuation_multiple;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.issuance_rate < Decimal::ZERO {
            return Err(PoolError::InvalidConfig(format!(
                "issuance_rate must not be negative, got {}",
                self.issuance_rate
            )));
        }
        if self.valuation_multiple < Decimal::ZERO {
            return Err(PoolError::InvalidConfig(format!(
                "valuation_multiple must not be negative, got {}",
                self.valuation_multiple
            )));
        }

        let addresses = [&self.address, &self.secondary_address, &self.royalty_address];
        if addresses.iter().any(|a| a.is_empty()) {
            return Err(PoolError::InvalidConfig("pool addresses must not be empty".to_string()));
        }
        if self.address == self.secondary_address
            || self.address == self.royalty_address
            || self.secondary_address == self.royalty_address
        {
            return Err(PoolError::InvalidConfig(
                "pool, secondary and royalty addresses must be distinct".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PoolConfig =
            toml::from_str(contents).map_err(|e| PoolError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PoolError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }
}

/// An amount assigned to an account at genesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub account: String,
    pub amount: Decimal,
}

impl Allocation {
    pub fn new(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            amount,
        }
    }
}

/// Initial state of the reserve ledger, the share ledger and the deposits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub reserve_balances: Vec<Allocation>,
    pub share_balances: Vec<Allocation>,
    pub deposits: Vec<Allocation>,
}
