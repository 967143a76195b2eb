//! Ledger extension hooks
//!
//! Hooks are plain callback values collected into [`LedgerHooks`] and handed
//! to a ledger at construction or through [`crate::Ledger::register_hooks`].
//! Each hook receives the operation's [`LedgerContext`] and returns the
//! context the next stage sees. Hooks of one kind run in registration order.
//!
//! The ledger reads only `amount` back from the pre-hook chain. Post hooks
//! see the final balances; inside a pool operation they run only once the
//! operation has committed.

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Ledger operation a context describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    Transfer,
    Mint,
    Burn,
}

/// Snapshot of a ledger operation passed through the hook chain.
///
/// `from` is `None` for mints and `to` is `None` for burns. The final
/// balances are only filled in for post hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerContext {
    pub op: LedgerOp,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Decimal,
    pub sender_initial_balance: Decimal,
    pub receiver_initial_balance: Decimal,
    pub sender_final_balance: Option<Decimal>,
    pub receiver_final_balance: Option<Decimal>,
}

impl LedgerContext {
    pub(crate) fn transfer(from: &str, to: &str, amount: Decimal, sender: Decimal, receiver: Decimal) -> Self {
        Self {
            op: LedgerOp::Transfer,
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            amount,
            sender_initial_balance: sender,
            receiver_initial_balance: receiver,
            sender_final_balance: None,
            receiver_final_balance: None,
        }
    }

    pub(crate) fn mint(to: &str, amount: Decimal, receiver: Decimal) -> Self {
        Self {
            op: LedgerOp::Mint,
            from: None,
            to: Some(to.to_string()),
            amount,
            sender_initial_balance: Decimal::ZERO,
            receiver_initial_balance: receiver,
            sender_final_balance: None,
            receiver_final_balance: None,
        }
    }

    pub(crate) fn burn(from: &str, amount: Decimal, sender: Decimal) -> Self {
        Self {
            op: LedgerOp::Burn,
            from: Some(from.to_string()),
            to: None,
            amount,
            sender_initial_balance: sender,
            receiver_initial_balance: Decimal::ZERO,
            sender_final_balance: None,
            receiver_final_balance: None,
        }
    }

    /// Copy of this context with a different amount
    pub fn with_amount(&self, amount: Decimal) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }
}

/// A single hook callback
pub type LedgerHook = Arc<dyn Fn(LedgerContext) -> LedgerContext + Send + Sync>;

/// Ordered hook lists for the six ledger stages
#[derive(Clone, Default)]
pub struct LedgerHooks {
    pre_transfer: Vec<LedgerHook>,
    post_transfer: Vec<LedgerHook>,
    pre_mint: Vec<LedgerHook>,
    post_mint: Vec<LedgerHook>,
    pre_burn: Vec<LedgerHook>,
    post_burn: Vec<LedgerHook>,
}

impl LedgerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_transfer<F>(mut self, hook: F) -> Self
    where
        F: Fn(LedgerContext) -> LedgerContext + Send + Sync + 'static,
    {
        self.pre_transfer.push(Arc::new(hook));
        self
    }

    pub fn post_transfer<F>(mut self, hook: F) -> Self
    where
        F: Fn(LedgerContext) -> LedgerContext + Send + Sync + 'static,
    {
        self.post_transfer.push(Arc::new(hook));
        self
    }

    pub fn pre_mint<F>(mut self, hook: F) -> Self
    where
        F: Fn(LedgerContext) -> LedgerContext + Send + Sync + 'static,
    {
        self.pre_mint.push(Arc::new(hook));
        self
    }

    pub fn post_mint<F>(mut self, hook: F) -> Self
    where
        F: Fn(LedgerContext) -> LedgerContext + Send + Sync + 'static,
    {
        self.post_mint.push(Arc::new(hook));
        self
    }

    pub fn pre_burn<F>(mut self, hook: F) -> Self
    where
        F: Fn(LedgerContext) -> LedgerContext + Send + Sync + 'static,
    {
        self.pre_burn.push(Arc::new(hook));
        self
    }

    pub fn post_burn<F>(mut self, hook: F) -> Self
    where
        F: Fn(LedgerContext) -> LedgerContext + Send + Sync + 'static,
    {
        self.post_burn.push(Arc::new(hook));
        self
    }

    /// Append every hook of `other` after the hooks already registered
    pub fn extend(&mut self, other: LedgerHooks) {
        self.pre_transfer.extend(other.pre_transfer);
        self.post_transfer.extend(other.post_transfer);
        self.pre_mint.extend(other.pre_mint);
        self.post_mint.extend(other.post_mint);
        self.pre_burn.extend(other.pre_burn);
        self.post_burn.extend(other.post_burn);
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.pre_transfer.len()
            + self.post_transfer.len()
            + self.pre_mint.len()
            + self.post_mint.len()
            + self.pre_burn.len()
            + self.post_burn.len()
    }

    pub(crate) fn run_pre(&self, ctx: LedgerContext) -> LedgerContext {
        let hooks = match ctx.op {
            LedgerOp::Transfer => &self.pre_transfer,
            LedgerOp::Mint => &self.pre_mint,
            LedgerOp::Burn => &self.pre_burn,
        };
        run_chain(hooks, ctx)
    }

    pub(crate) fn run_post(&self, ctx: LedgerContext) -> LedgerContext {
        let hooks = match ctx.op {
            LedgerOp::Transfer => &self.post_transfer,
            LedgerOp::Mint => &self.post_mint,
            LedgerOp::Burn => &self.post_burn,
        };
        run_chain(hooks, ctx)
    }
}

fn run_chain(hooks: &[LedgerHook], ctx: LedgerContext) -> LedgerContext {
    hooks.iter().fold(ctx, |ctx, hook| hook(ctx))
}

impl fmt::Debug for LedgerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerHooks")
            .field("pre_transfer", &self.pre_transfer.len())
            .field("post_transfer", &self.post_transfer.len())
            .field("pre_mint", &self.pre_mint.len())
            .field("post_mint", &self.post_mint.len())
            .field("pre_burn", &self.pre_burn.len())
            .field("post_burn", &self.post_burn.len())
            .finish()
    }
}
