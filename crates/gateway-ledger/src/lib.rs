//! Virtual-token ledger: the durable wallet behind quota enforcement.
//!
//! Durable state is a relational store (see [`PostgresLedger`]); this crate
//! defines the contract plus an in-memory double (see [`InMemoryLedger`])
//! used in tests and single-process development, matching the dual
//! in-memory/Postgres split `gateway-secrets` uses for the same reason.

mod memory;
mod postgres;
pub mod webhook;

pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// `{user_id, balance_tokens, monthly_usage_tokens, last_reset_at, active}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletState {
    pub user_id: String,
    pub balance_tokens: i64,
    pub monthly_usage_tokens: i64,
    pub last_reset_at: DateTime<Utc>,
    pub active: bool,
}

impl WalletState {
    fn fresh(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance_tokens: 0,
            monthly_usage_tokens: 0,
            last_reset_at: now,
            active: true,
        }
    }

    /// A calendar-month reset is due when `now`'s (year, month) differs
    /// from `last_reset_at`'s.
    fn month_rolled_over(&self, now: DateTime<Utc>) -> bool {
        use chrono::Datelike;
        (self.last_reset_at.year(), self.last_reset_at.month()) != (now.year(), now.month())
    }

    fn reset_month_if_due(&mut self, now: DateTime<Utc>) {
        if self.month_rolled_over(now) {
            self.monthly_usage_tokens = 0;
            self.last_reset_at = now;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PrecheckResult {
    Allow {
        balance_after: i64,
        usage_after: i64,
    },
    Deny {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebitOutcome {
    pub wallet: WalletState,
    /// `true` the first time this `request_id` is debited; `false` on a
    /// replayed debit, in which case `wallet` is the original outcome.
    pub first_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditOutcome {
    pub wallet: WalletState,
    pub first_time: bool,
}

/// A user's monthly token allowance. `None` means unmetered (no monthly
/// cap, only the balance matters).
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub monthly_cap_tokens: Option<i64>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            monthly_cap_tokens: None,
        }
    }
}

/// Durable contract for the virtual-token wallet. `debit`/`credit` are
/// idempotent by their respective keys per spec §4.J and §8 ("a second
/// debit(r) leaves wallets unchanged and returns the first outcome").
#[async_trait]
pub trait VirtualTokenLedger: Send + Sync {
    async fn precheck(
        &self,
        user_id: &str,
        cost_tokens: i64,
        policy: QuotaPolicy,
    ) -> Result<PrecheckResult, LedgerError>;

    async fn debit(
        &self,
        user_id: &str,
        cost_tokens: i64,
        request_id: &str,
    ) -> Result<DebitOutcome, LedgerError>;

    async fn credit(
        &self,
        user_id: &str,
        tokens: i64,
        payment_id: &str,
        amount_cents: i64,
        currency: &str,
        raw_payload: serde_json::Value,
    ) -> Result<CreditOutcome, LedgerError>;

    async fn wallet(&self, user_id: &str) -> Result<WalletState, LedgerError>;
}

/// `cost_cents = (prompt * input_price) + (completion * output_price)`,
/// using the descriptor's per-token pricing; missing pricing is the
/// caller's job to detect (it records `cost_cents = None` and skips the
/// debit, per spec §4.G step 9).
pub fn cost_cents(prompt_tokens: u32, completion_tokens: u32, input_per_token: f64, output_per_token: f64) -> i64 {
    let cost = (prompt_tokens as f64) * input_per_token + (completion_tokens as f64) * output_per_token;
    (cost * 100.0).round() as i64
}

/// `floor(cost_cents * fee_pct / 100)`.
pub fn platform_fee_cents(cost_cents: i64, fee_pct: f64) -> i64 {
    ((cost_cents as f64) * fee_pct / 100.0).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_fee_floors() {
        assert_eq!(platform_fee_cents(999, 10.0), 99);
        assert_eq!(platform_fee_cents(1000, 10.0), 100);
    }

    #[test]
    fn cost_cents_computes_from_pricing() {
        // 1000 prompt tokens @ $0.000003, 500 completion @ $0.000015 -> $0.0105 -> 1 cent (rounded)
        let cents = cost_cents(1000, 500, 0.000003, 0.000015);
        assert_eq!(cents, 1);
    }

    #[test]
    fn month_rollover_detection() {
        let jan = DateTime::parse_from_rfc3339("2026-01-15T00:00:00Z").unwrap().with_timezone(&Utc);
        let feb = DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let mut wallet = WalletState::fresh("u1", jan);
        wallet.monthly_usage_tokens = 500;
        assert!(!wallet.month_rolled_over(jan));
        assert!(wallet.month_rolled_over(feb));
        wallet.reset_month_if_due(feb);
        assert_eq!(wallet.monthly_usage_tokens, 0);
        assert_eq!(wallet.last_reset_at, feb);
    }
}
