//! Curation pool error types

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the ledger and the pools.
///
/// Every variant aborts the operation that produced it without leaving any
/// partial state behind. Rounding shortfalls on transfers are not errors; see
/// [`crate::ledger::TransferOutcome`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("Deposits sum to {deposits} but the pool holds {reserve} reserve")]
    InvariantViolation { deposits: Decimal, reserve: Decimal },

    #[error("Insufficient funds for {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{0} is a pool holding address and cannot act as a participant")]
    ReservedAddress(String),

    #[error("Cannot distribute royalties: no deposits are registered")]
    NoDepositors,

    #[error("Cannot distribute royalties: no shares are outstanding")]
    NoShareholders,

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
