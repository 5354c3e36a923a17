use crate::{
    CreditOutcome, DebitOutcome, LedgerError, PrecheckResult, QuotaPolicy, VirtualTokenLedger,
    WalletState,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

/// `DashMap`-backed ledger matching the teacher's shared-state idiom for
/// in-process concurrent maps (same discipline as
/// `gateway_secrets::InMemorySecretStore`). Intended for tests and
/// single-process development; production runs [`crate::PostgresLedger`]
/// where idempotency is a database unique-constraint property rather than
/// an in-process lock.
pub struct InMemoryLedger {
    wallets: DashMap<String, WalletState>,
    debits: DashMap<String, DebitOutcome>,
    credits: DashMap<String, CreditOutcome>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            debits: DashMap::new(),
            credits: DashMap::new(),
        }
    }

    fn wallet_or_fresh(&self, user_id: &str) -> WalletState {
        self.wallets
            .get(user_id)
            .map(|w| w.clone())
            .unwrap_or_else(|| WalletState::fresh(user_id, Utc::now()))
    }
}

#[async_trait]
impl VirtualTokenLedger for InMemoryLedger {
    async fn precheck(
        &self,
        user_id: &str,
        cost_tokens: i64,
        policy: QuotaPolicy,
    ) -> Result<PrecheckResult, LedgerError> {
        let mut wallet = self.wallet_or_fresh(user_id);
        wallet.reset_month_if_due(Utc::now());

        if wallet.balance_tokens < cost_tokens {
            return Ok(PrecheckResult::Deny {
                reason: "insufficient balance".to_string(),
            });
        }
        if let Some(cap) = policy.monthly_cap_tokens {
            if wallet.monthly_usage_tokens + cost_tokens > cap {
                return Ok(PrecheckResult::Deny {
                    reason: "monthly quota exceeded".to_string(),
                });
            }
        }
        Ok(PrecheckResult::Allow {
            balance_after: wallet.balance_tokens - cost_tokens,
            usage_after: wallet.monthly_usage_tokens + cost_tokens,
        })
    }

    async fn debit(
        &self,
        user_id: &str,
        cost_tokens: i64,
        request_id: &str,
    ) -> Result<DebitOutcome, LedgerError> {
        if let Some(existing) = self.debits.get(request_id) {
            return Ok(DebitOutcome {
                wallet: existing.wallet.clone(),
                first_time: false,
            });
        }

        let mut wallet = self.wallet_or_fresh(user_id);
        wallet.reset_month_if_due(Utc::now());
        wallet.balance_tokens -= cost_tokens;
        wallet.monthly_usage_tokens += cost_tokens;
        self.wallets.insert(user_id.to_string(), wallet.clone());

        let outcome = DebitOutcome {
            wallet,
            first_time: true,
        };
        // Second writer racing on the same request_id loses the insert and
        // reads the first outcome back out, matching the Postgres path's
        // `ON CONFLICT DO NOTHING RETURNING *` semantics.
        match self.debits.entry(request_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Ok(DebitOutcome {
                wallet: existing.get().wallet.clone(),
                first_time: false,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(outcome.clone());
                Ok(outcome)
            }
        }
    }

    async fn credit(
        &self,
        user_id: &str,
        tokens: i64,
        payment_id: &str,
        amount_cents: i64,
        currency: &str,
        raw_payload: serde_json::Value,
    ) -> Result<CreditOutcome, LedgerError> {
        let _ = (amount_cents, currency, raw_payload);
        if let Some(existing) = self.credits.get(payment_id) {
            return Ok(CreditOutcome {
                wallet: existing.wallet.clone(),
                first_time: false,
            });
        }

        let mut wallet = self.wallet_or_fresh(user_id);
        wallet.balance_tokens += tokens;
        self.wallets.insert(user_id.to_string(), wallet.clone());

        let outcome = CreditOutcome {
            wallet,
            first_time: true,
        };
        match self.credits.entry(payment_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Ok(CreditOutcome {
                wallet: existing.get().wallet.clone(),
                first_time: false,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(outcome.clone());
                Ok(outcome)
            }
        }
    }

    async fn wallet(&self, user_id: &str) -> Result<WalletState, LedgerError> {
        Ok(self.wallet_or_fresh(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn precheck_denies_insufficient_balance() {
        let ledger = InMemoryLedger::new();
        let result = ledger.precheck("u1", 100, QuotaPolicy::default()).await.unwrap();
        assert!(matches!(result, PrecheckResult::Deny { .. }));
    }

    #[tokio::test]
    async fn precheck_allows_when_funded() {
        let ledger = InMemoryLedger::new();
        ledger
            .credit("u1", 1000, "pay1", 500, "usd", json!({}))
            .await
            .unwrap();
        let result = ledger.precheck("u1", 100, QuotaPolicy::default()).await.unwrap();
        assert!(matches!(result, PrecheckResult::Allow { balance_after: 900, .. }));
    }

    #[tokio::test]
    async fn debit_is_idempotent_by_request_id() {
        let ledger = InMemoryLedger::new();
        ledger
            .credit("u1", 1000, "pay1", 500, "usd", json!({}))
            .await
            .unwrap();
        let first = ledger.debit("u1", 100, "req-1").await.unwrap();
        let second = ledger.debit("u1", 100, "req-1").await.unwrap();
        assert!(first.first_time);
        assert!(!second.first_time);
        assert_eq!(first.wallet, second.wallet);
        assert_eq!(ledger.wallet("u1").await.unwrap().balance_tokens, 900);
    }

    #[tokio::test]
    async fn credit_is_idempotent_by_payment_id() {
        let ledger = InMemoryLedger::new();
        let first = ledger.credit("u1", 5000, "P1", 500, "usd", json!({"a":1})).await.unwrap();
        let second = ledger.credit("u1", 5000, "P1", 500, "usd", json!({"a":1})).await.unwrap();
        assert!(first.first_time);
        assert!(!second.first_time);
        assert_eq!(ledger.wallet("u1").await.unwrap().balance_tokens, 5000);
    }

    #[tokio::test]
    async fn debit_never_goes_negative_in_balance_accounting_but_caller_must_precheck() {
        // the ledger itself does not refuse a debit that would go negative;
        // `precheck` is the gate the executor must consult first (spec §4.G
        // step 5 runs precheck before any debit is attempted).
        let ledger = InMemoryLedger::new();
        let outcome = ledger.debit("u1", 50, "req-x").await.unwrap();
        assert_eq!(outcome.wallet.balance_tokens, -50);
    }

    #[tokio::test]
    async fn monthly_cap_denies_over_allowance() {
        let ledger = InMemoryLedger::new();
        ledger.credit("u1", 10_000, "pay1", 100, "usd", json!({})).await.unwrap();
        ledger.debit("u1", 900, "req-1").await.unwrap();
        let policy = QuotaPolicy { monthly_cap_tokens: Some(1000) };
        let result = ledger.precheck("u1", 200, policy).await.unwrap();
        assert!(matches!(result, PrecheckResult::Deny { .. }));
    }
}
