//! Discrete block clock
//!
//! `Chain` is a cheap handle: clones share the same counter, so the driver
//! that advances the clock and the pools that read it stay in step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{PoolError, Result};

#[derive(Debug, Clone, Default)]
pub struct Chain {
    height: Arc<AtomicU64>,
}

impl Chain {
    pub fn new(initial_block_height: u64) -> Self {
        Self {
            height: Arc::new(AtomicU64::new(initial_block_height)),
        }
    }

    pub fn block_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// Advance the clock by `blocks`
    pub fn sleep(&self, blocks: u64) -> Result<u64> {
        let current = self.block_height();
        let next = current
            .checked_add(blocks)
            .ok_or(PoolError::ArithmeticOverflow("block height"))?;
        self.height.store(next, Ordering::SeqCst);
        Ok(next)
    }

    pub fn step(&self) -> Result<u64> {
        self.sleep(1)
    }
}
