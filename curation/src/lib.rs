//! Curation Pool Engine
//!
//! Two-tier reward distribution for a pooled-deposit market:
//! - Depositors lock a reserve asset in the primary pool
//! - Shares are issued every block at a compounding rate
//! - New shares and dilution royalties reach depositors lazily, in
//!   proportion to their deposit, through the secondary pool
//!
//! All amounts are fixed-point decimals. Operations are synchronous and
//! atomic: a failed operation leaves the pool unchanged.

pub mod chain;
pub mod config;
pub mod error;
pub mod hooks;
mod journal;
pub mod ledger;
pub mod pool;
pub mod secondary;
pub mod shared;

pub use chain::Chain;
pub use config::{
    Allocation, GenesisConfig, PoolConfig, DEFAULT_POOL_ADDRESS, DEFAULT_ROYALTY_ADDRESS,
    DEFAULT_SECONDARY_ADDRESS,
};
pub use error::{PoolError, Result};
pub use hooks::{LedgerContext, LedgerHook, LedgerHooks, LedgerOp};
pub use ledger::{Ledger, TransferOutcome, TRANSFER_TOLERANCE};
pub use pool::{CurationPool, ShareSnapshot};
pub use secondary::{DepositLookup, DepositSnapshot, SecondaryPool, Settlement};
pub use shared::SharedCurationPool;

pub use rust_decimal::Decimal;
