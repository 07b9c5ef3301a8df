//! Credit ledger interface and the in-memory reference implementation.
//!
//! The ledger is the one piece of shared mutable state. The orchestrator
//! issues debit/credit intents and never assumes a post-condition
//! balance; serializing concurrent adjustments is the ledger's own job.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::Credits;

/// A spendable credit balance with atomic debit and credit operations.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Debit `amount` from the balance. Fails on overdraft.
    async fn debit(&self, amount: Credits) -> Result<(), CoreError>;

    /// Credit `amount` back to the balance (refund).
    async fn credit(&self, amount: Credits) -> Result<(), CoreError>;

    /// Current balance.
    async fn balance(&self) -> Credits;
}

/// Session-local ledger holding the balance in memory.
///
/// Adjustments are serialized through a mutex so interleaved debit and
/// credit intents from concurrent tasks cannot lose updates.
pub struct InMemoryLedger {
    balance: Mutex<Credits>,
}

impl InMemoryLedger {
    pub fn new(initial: Credits) -> Self {
        Self {
            balance: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn debit(&self, amount: Credits) -> Result<(), CoreError> {
        let mut balance = self.balance.lock().expect("ledger mutex poisoned");
        if *balance < amount {
            return Err(CoreError::InsufficientCredits {
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    async fn credit(&self, amount: Credits) -> Result<(), CoreError> {
        let mut balance = self.balance.lock().expect("ledger mutex poisoned");
        *balance += amount;
        Ok(())
    }

    async fn balance(&self) -> Credits {
        *self.balance.lock().expect("ledger mutex poisoned")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
