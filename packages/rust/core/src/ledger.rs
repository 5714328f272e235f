//! Ledger capability consumed by the exchange.
//!
//! The ledger records submitted knowledge, verifies signatures on read and
//! pays contributor rewards. [`InMemoryLedger`] backs dry runs and tests.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use parentheses_shared::{KnowledgeItem, ParenthesesError, Result, Signature, TransactionId};

/// External record-keeping and payout service.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record an accepted item and return the assigned transaction id.
    async fn submit_knowledge(
        &self,
        item: &KnowledgeItem,
        signature: &Signature,
    ) -> Result<TransactionId>;

    /// Whether `signature` was recorded. Unknown signatures are `false`.
    async fn verify(&self, signature: &Signature) -> Result<bool>;

    /// Pay `amount` base units to `contributor`.
    async fn distribute_reward(&self, contributor: &str, amount: u64) -> Result<TransactionId>;
}

/// Await a ledger call, mapping expiry of `limit` to a ledger error.
pub async fn with_timeout<T>(
    limit: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ParenthesesError::ledger(format!(
            "{operation} timed out after {}s",
            limit.as_secs_f64()
        ))),
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

/// A reward paid through [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub transaction_id: TransactionId,
    pub contributor: String,
    pub amount: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    signatures: HashSet<Signature>,
    payouts: Vec<Payout>,
}

/// Process-local ledger. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payouts in the order they were made.
    pub fn payouts(&self) -> Vec<Payout> {
        self.state
            .lock()
            .map(|state| state.payouts.clone())
            .unwrap_or_default()
    }

    /// Sum paid to `contributor` so far.
    pub fn balance(&self, contributor: &str) -> u64 {
        self.payouts()
            .iter()
            .filter(|p| p.contributor == contributor)
            .fold(0u64, |acc, p| acc.saturating_add(p.amount))
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| ParenthesesError::ledger("in-memory ledger state poisoned"))
    }
}

fn next_transaction_id() -> TransactionId {
    TransactionId(Uuid::now_v7().to_string())
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn submit_knowledge(
        &self,
        item: &KnowledgeItem,
        signature: &Signature,
    ) -> Result<TransactionId> {
        self.state()?.signatures.insert(*signature);
        let tx = next_transaction_id();
        debug!(id = %item.id, tx = %tx, "recorded knowledge");
        Ok(tx)
    }

    async fn verify(&self, signature: &Signature) -> Result<bool> {
        Ok(self.state()?.signatures.contains(signature))
    }

    async fn distribute_reward(&self, contributor: &str, amount: u64) -> Result<TransactionId> {
        let tx = next_transaction_id();
        self.state()?.payouts.push(Payout {
            transaction_id: tx.clone(),
            contributor: contributor.to_string(),
            amount,
        });
        debug!(contributor, amount, tx = %tx, "paid reward");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> KnowledgeItem {
        KnowledgeItem::from_submission(&json!({
            "content": {"type": "other", "text": "x"},
            "domain": "d",
            "contributor": "alice",
            "timestamp": "2024-05-01T12:00:00",
            "version": "1.0.0",
            "metadata": {},
            "dependencies": []
        }))
        .expect("item")
    }

    #[tokio::test]
    async fn submitted_signatures_verify() {
        let ledger = InMemoryLedger::new();
        let item = item();
        let signature = item.signature.expect("signature");

        assert!(!ledger.verify(&signature).await.unwrap());
        let tx = ledger.submit_knowledge(&item, &signature).await.unwrap();
        assert!(Uuid::parse_str(&tx.0).is_ok());
        assert!(ledger.verify(&signature).await.unwrap());
        assert!(!ledger.verify(&Signature([0u8; 32])).await.unwrap());
    }

    #[tokio::test]
    async fn payouts_are_recorded_in_order() {
        let ledger = InMemoryLedger::new();
        let a = ledger.distribute_reward("alice", 5).await.unwrap();
        let b = ledger.distribute_reward("bob", 3).await.unwrap();
        ledger.distribute_reward("alice", 2).await.unwrap();

        assert_ne!(a, b);
        let payouts = ledger.payouts();
        assert_eq!(payouts.len(), 3);
        assert_eq!(payouts[0].contributor, "alice");
        assert_eq!(payouts[1].amount, 3);
        assert_eq!(ledger.balance("alice"), 7);
        assert_eq!(ledger.balance("carol"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_as_ledger_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), ParenthesesError>(())
        };
        let err = with_timeout(Duration::from_secs(30), "submit_knowledge", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, ParenthesesError::Ledger(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let value = with_timeout(Duration::from_secs(1), "verify", async {
            Ok::<_, ParenthesesError>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }
}
