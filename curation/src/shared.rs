//! Thread-safe handle around a single pool
//!
//! Settlement reads and then writes accumulators and snapshots, so a pool
//! and the ledgers it owns sit behind one lock. Clones share the pool.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::Result;
use crate::pool::CurationPool;
use crate::secondary::Settlement;

#[derive(Debug, Clone)]
pub struct SharedCurationPool {
    inner: Arc<Mutex<CurationPool>>,
}

impl SharedCurationPool {
    pub fn new(pool: CurationPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    pub fn deposit(&self, account: &str, amount: Decimal) -> Result<()> {
        self.inner.lock().deposit(account, amount)
    }

    pub fn withdraw(&self, account: &str, amount: Decimal) -> Result<()> {
        self.inner.lock().withdraw(account, amount)
    }

    pub fn buy_shares(&self, account: &str, shares: Decimal) -> Result<Decimal> {
        self.inner.lock().buy_shares(account, shares)
    }

    pub fn claim(&self, account: &str) -> Result<Settlement> {
        self.inner.lock().claim(account)
    }

    /// Run `f` with the pool locked, for reads spanning several accessors
    pub fn read<R>(&self, f: impl FnOnce(&CurationPool) -> R) -> R {
        f(&*self.inner.lock())
    }

    /// Run `f` with exclusive access to the pool
    pub fn write<R>(&self, f: impl FnOnce(&mut CurationPool) -> R) -> R {
        f(&mut *self.inner.lock())
    }
}

impl From<CurationPool> for SharedCurationPool {
    fn from(pool: CurationPool) -> Self {
        Self::new(pool)
    }
}
