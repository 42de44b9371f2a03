//! PostgreSQL ledger
//!
//! Runtime-checked sqlx queries against the tables in
//! `migrations/0001_init.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use super::{
    default_refund_key, ensure_refundable, generate_account_number, Deposit, LedgerError,
    LedgerRecord, LedgerStore, LedgerTotals, NewDeposit, NewRefund, NewTransfer, NewUser,
    NewWithdrawal, Page, PaymentToken, Refund, SumFilter, Transfer, User, UserDirectory,
    Withdrawal,
};
use crate::domain::{
    Amount, DomainError, OrderId, OrderKind, PaymentStatus, Role, WithdrawalStatus,
};

const ACTIVE: i32 = 1;
const CREATED: i32 = 1;
const PENDING: i32 = 2;
const PAID: i32 = 5;

/// Attempts at finding an unused account number before giving up
const ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

type DepositRow = (i64, String, i64, i64, i32, DateTime<Utc>);
type WithdrawalRow = (i64, i64, i64, String, i32, DateTime<Utc>);
type TransferRow = (i64, String, i64, String, String, i64, i32, DateTime<Utc>);
type RefundRow = (i64, String, i64, i64, String, i32, DateTime<Utc>);
type UserRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    i32,
    i32,
    bool,
    DateTime<Utc>,
);

// =========================================================================
// Row mapping
// =========================================================================

fn parse_order_id(raw: String) -> Result<OrderId, LedgerError> {
    raw.parse()
        .map_err(|e: crate::domain::OrderIdError| LedgerError::Corrupt(e.to_string()))
}

fn parse_amount(raw: i64) -> Result<Amount, LedgerError> {
    Amount::new(raw).map_err(|e| LedgerError::Corrupt(e.to_string()))
}

fn parse_status(raw: i32) -> Result<PaymentStatus, LedgerError> {
    PaymentStatus::from_code(raw)
        .ok_or_else(|| LedgerError::Corrupt(format!("unknown status code {}", raw)))
}

fn deposit_from_row(row: DepositRow) -> Result<Deposit, LedgerError> {
    let (id, order_id, user_id, amount, status, created_at) = row;
    Ok(Deposit {
        id,
        order_id: parse_order_id(order_id)?,
        user_id,
        amount: parse_amount(amount)?,
        status: parse_status(status)?,
        created_at,
    })
}

fn withdrawal_from_row(row: WithdrawalRow) -> Result<Withdrawal, LedgerError> {
    let (id, user_id, amount, to, status, created_at) = row;
    Ok(Withdrawal {
        id,
        user_id,
        amount: parse_amount(amount)?,
        to,
        status: WithdrawalStatus::from(status),
        created_at,
    })
}

fn transfer_from_row(row: TransferRow) -> Result<Transfer, LedgerError> {
    let (id, order_id, user_id, from_account, to_account, amount, status, created_at) = row;
    Ok(Transfer {
        id,
        order_id: parse_order_id(order_id)?,
        user_id,
        from_account,
        to_account,
        amount: parse_amount(amount)?,
        status: parse_status(status)?,
        created_at,
    })
}

fn refund_from_row(row: RefundRow) -> Result<Refund, LedgerError> {
    let (id, order_id, user_id, amount, refund_key, status, created_at) = row;
    Ok(Refund {
        id,
        order_id: parse_order_id(order_id)?,
        user_id,
        amount: parse_amount(amount)?,
        refund_key,
        status: parse_status(status)?,
        created_at,
    })
}

fn user_from_row(row: UserRow) -> Result<User, LedgerError> {
    let (
        id,
        account_number,
        first_name,
        last_name,
        email,
        username,
        telephone,
        role,
        status,
        is_verified,
        created_at,
    ) = row;
    Ok(User {
        id,
        account_number,
        first_name,
        last_name,
        email,
        username,
        telephone,
        role: Role::from_code(role)
            .ok_or_else(|| LedgerError::Corrupt(format!("unknown role {}", role)))?,
        status,
        is_verified,
        created_at,
    })
}

fn collect<R, T>(
    rows: Vec<R>,
    map: fn(R) -> Result<T, LedgerError>,
) -> Result<Vec<T>, LedgerError> {
    rows.into_iter().map(map).collect()
}

// =========================================================================
// Aggregation
// =========================================================================

/// Run one balance sum on any executor (pool or open transaction)
async fn sum_with<'e, E>(executor: E, filter: &SumFilter) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = match filter {
        SumFilter::PaidDeposits { owner } => sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM deposits
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(*owner)
        .bind(PAID),
        SumFilter::ActiveWithdrawals { owner } => sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM withdrawals
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(*owner)
        .bind(ACTIVE),
        SumFilter::IncomingTransfers { account } => sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM transactions
            WHERE acc_number_to = $1 AND status = $2
            "#,
        )
        .bind(account.clone())
        .bind(CREATED),
        SumFilter::OutgoingTransfers { account } => sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM transactions
            WHERE acc_number_from = $1 AND status = $2
            "#,
        )
        .bind(account.clone())
        .bind(CREATED),
        SumFilter::Refunds { owner } => sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM refunds
            WHERE user_id = $1 AND status IN ($2, $3)
            "#,
        )
        .bind(*owner)
        .bind(CREATED)
        .bind(PAID),
        SumFilter::RefundsOfDeposit { order_id } => sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM refunds
            WHERE order_id = $1 AND status IN ($2, $3)
            "#,
        )
        .bind(order_id.to_string())
        .bind(CREATED)
        .bind(PAID),
    };

    query.fetch_one(executor).await
}

/// Lock the owner's ledger for the rest of the transaction and read totals
async fn locked_totals(
    tx: &mut Transaction<'_, Postgres>,
    owner: i64,
    account: &str,
) -> Result<LedgerTotals, LedgerError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(owner)
        .execute(&mut **tx)
        .await?;

    let account = account.to_string();
    Ok(LedgerTotals {
        paid_deposits: sum_with(&mut **tx, &SumFilter::PaidDeposits { owner }).await?,
        incoming_transfers: sum_with(
            &mut **tx,
            &SumFilter::IncomingTransfers {
                account: account.clone(),
            },
        )
        .await?,
        active_withdrawals: sum_with(&mut **tx, &SumFilter::ActiveWithdrawals { owner }).await?,
        outgoing_transfers: sum_with(&mut **tx, &SumFilter::OutgoingTransfers { account }).await?,
        refunds: sum_with(&mut **tx, &SumFilter::Refunds { owner }).await?,
    })
}

// =========================================================================
// PgLedgerStore
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_deposit(&self, new: NewDeposit) -> Result<Deposit, LedgerError> {
        let order_id = OrderId::generate(OrderKind::Deposit);

        let row: DepositRow = sqlx::query_as(
            r#"
            INSERT INTO deposits (order_id, user_id, amount, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, user_id, amount, status, created_at
            "#,
        )
        .bind(order_id.as_str())
        .bind(new.user_id)
        .bind(new.amount.value())
        .bind(CREATED)
        .fetch_one(&self.pool)
        .await?;

        deposit_from_row(row)
    }

    async fn find_deposit(&self, id: i64) -> Result<Deposit, LedgerError> {
        let row: Option<DepositRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, user_id, amount, status, created_at
            FROM deposits
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(deposit_from_row)
            .unwrap_or_else(|| Err(LedgerError::not_found(format!("deposit {}", id))))
    }

    async fn list_deposits(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Deposit>, LedgerError> {
        let rows: Vec<DepositRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, user_id, amount, status, created_at
            FROM deposits
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND status <> $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(owner)
        .bind(CREATED)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        collect(rows, deposit_from_row)
    }

    async fn count_deposits(&self, owner: Option<i64>) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM deposits
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND status <> $2
            "#,
        )
        .bind(owner)
        .bind(CREATED)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_open_deposits(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Deposit>, LedgerError> {
        let rows: Vec<DepositRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, user_id, amount, status, created_at
            FROM deposits
            WHERE status IN ($1, $2) AND created_at < $3
            ORDER BY created_at
            LIMIT $4
            "#,
        )
        .bind(CREATED)
        .bind(PENDING)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        collect(rows, deposit_from_row)
    }

    async fn create_withdrawal_if_covered(
        &self,
        new: NewWithdrawal,
    ) -> Result<Withdrawal, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let totals = locked_totals(&mut tx, new.user_id, &new.account_number).await?;
        totals.ensure_covers(&new.amount)?;

        let row: WithdrawalRow = sqlx::query_as(
            r#"
            INSERT INTO withdrawals (user_id, amount, destination, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, amount, destination, status, created_at
            "#,
        )
        .bind(new.user_id)
        .bind(new.amount.value())
        .bind(&new.to)
        .bind(ACTIVE)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            user_id = new.user_id,
            amount = %new.amount,
            "withdrawal booked"
        );

        withdrawal_from_row(row)
    }

    async fn find_withdrawal(&self, id: i64) -> Result<Withdrawal, LedgerError> {
        let row: Option<WithdrawalRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, amount, destination, status, created_at
            FROM withdrawals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(withdrawal_from_row)
            .unwrap_or_else(|| Err(LedgerError::not_found(format!("withdrawal {}", id))))
    }

    async fn list_withdrawals(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        let rows: Vec<WithdrawalRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, amount, destination, status, created_at
            FROM withdrawals
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND status = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(owner)
        .bind(ACTIVE)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        collect(rows, withdrawal_from_row)
    }

    async fn count_withdrawals(&self, owner: Option<i64>) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM withdrawals
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND status = $2
            "#,
        )
        .bind(owner)
        .bind(ACTIVE)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn create_transfer_if_covered(&self, new: NewTransfer) -> Result<Transfer, LedgerError> {
        let order_id = OrderId::generate(OrderKind::Transfer);
        let mut tx = self.pool.begin().await?;

        let totals = locked_totals(&mut tx, new.user_id, &new.from_account).await?;
        totals.ensure_covers(&new.amount)?;

        let row: TransferRow = sqlx::query_as(
            r#"
            INSERT INTO transactions (order_id, user_id, acc_number_from, acc_number_to, amount, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, user_id, acc_number_from, acc_number_to, amount, status, created_at
            "#,
        )
        .bind(order_id.as_str())
        .bind(new.user_id)
        .bind(&new.from_account)
        .bind(&new.to_account)
        .bind(new.amount.value())
        .bind(CREATED)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            order_id = %order_id,
            from = %new.from_account,
            to = %new.to_account,
            amount = %new.amount,
            "transfer booked"
        );

        transfer_from_row(row)
    }

    async fn find_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        let row: Option<TransferRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, user_id, acc_number_from, acc_number_to, amount, status, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(transfer_from_row)
            .unwrap_or_else(|| Err(LedgerError::not_found(format!("transfer {}", id))))
    }

    async fn list_transfers(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let rows: Vec<TransferRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, user_id, acc_number_from, acc_number_to, amount, status, created_at
            FROM transactions
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND status = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(owner)
        .bind(CREATED)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        collect(rows, transfer_from_row)
    }

    async fn count_transfers(&self, owner: Option<i64>) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND status = $2
            "#,
        )
        .bind(owner)
        .bind(CREATED)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn create_refund_if_covered(&self, new: NewRefund) -> Result<Refund, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let totals = locked_totals(&mut tx, new.user_id, &new.account_number).await?;

        let row: Option<DepositRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, user_id, amount, status, created_at
            FROM deposits
            WHERE order_id = $1 AND user_id = $2
            "#,
        )
        .bind(new.order_id.as_str())
        .bind(new.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let deposit = row
            .map(deposit_from_row)
            .transpose()?
            .ok_or_else(|| LedgerError::not_found(&new.order_id))?;

        let refund_key = match new.refund_key {
            Some(key) => key,
            None => {
                let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refunds WHERE order_id = $1")
                    .bind(new.order_id.as_str())
                    .fetch_one(&mut *tx)
                    .await?;
                default_refund_key(&new.order_id, n + 1)
            }
        };

        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM refunds WHERE refund_key = $1)")
                .bind(&refund_key)
                .fetch_one(&mut *tx)
                .await?;
        if taken {
            return Err(DomainError::DuplicateRefund(refund_key).into());
        }

        let refunded = sum_with(
            &mut *tx,
            &SumFilter::RefundsOfDeposit {
                order_id: new.order_id.clone(),
            },
        )
        .await?;
        ensure_refundable(&deposit, refunded, &new.amount)?;
        totals.ensure_covers(&new.amount)?;

        let result: Result<RefundRow, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO refunds (order_id, user_id, amount, refund_key, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, user_id, amount, refund_key, status, created_at
            "#,
        )
        .bind(new.order_id.as_str())
        .bind(new.user_id)
        .bind(new.amount.value())
        .bind(&refund_key)
        .bind(CREATED)
        .fetch_one(&mut *tx)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(DomainError::DuplicateRefund(refund_key).into());
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        tracing::debug!(
            order_id = %new.order_id,
            refund_key = %refund_key,
            amount = %new.amount,
            "refund reserved"
        );

        refund_from_row(row)
    }

    async fn set_refund_status(
        &self,
        refund_key: &str,
        status: PaymentStatus,
    ) -> Result<(), LedgerError> {
        let rows_affected = sqlx::query("UPDATE refunds SET status = $2 WHERE refund_key = $1")
            .bind(refund_key)
            .bind(status.code())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(LedgerError::not_found(format!("refund {}", refund_key)));
        }

        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<LedgerRecord, LedgerError> {
        let record = match order_id.kind() {
            OrderKind::Deposit => {
                let row: Option<DepositRow> = sqlx::query_as(
                    r#"
                    SELECT id, order_id, user_id, amount, status, created_at
                    FROM deposits
                    WHERE order_id = $1
                    "#,
                )
                .bind(order_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
                row.map(deposit_from_row)
                    .transpose()?
                    .map(LedgerRecord::Deposit)
            }
            OrderKind::Transfer => {
                let row: Option<TransferRow> = sqlx::query_as(
                    r#"
                    SELECT id, order_id, user_id, acc_number_from, acc_number_to, amount, status, created_at
                    FROM transactions
                    WHERE order_id = $1
                    "#,
                )
                .bind(order_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
                row.map(transfer_from_row)
                    .transpose()?
                    .map(LedgerRecord::Transfer)
            }
        };

        record.ok_or_else(|| LedgerError::not_found(order_id))
    }

    async fn set_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<(), LedgerError> {
        let sql = match order_id.kind() {
            OrderKind::Deposit => "UPDATE deposits SET status = $2 WHERE order_id = $1",
            OrderKind::Transfer => "UPDATE transactions SET status = $2 WHERE order_id = $1",
        };

        let rows_affected = sqlx::query(sql)
            .bind(order_id.as_str())
            .bind(status.code())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(LedgerError::not_found(order_id));
        }

        Ok(())
    }

    async fn sum_amount(&self, filter: SumFilter) -> Result<i64, LedgerError> {
        Ok(sum_with(&self.pool, &filter).await?)
    }

    async fn store_payment_token(&self, token: PaymentToken) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO payment_tokens (order_id, token, bank, virtual_account, callback_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id) DO UPDATE
            SET token = EXCLUDED.token,
                bank = EXCLUDED.bank,
                virtual_account = EXCLUDED.virtual_account,
                callback_url = EXCLUDED.callback_url
            "#,
        )
        .bind(token.order_id.as_str())
        .bind(&token.token)
        .bind(&token.bank)
        .bind(&token.virtual_account)
        .bind(&token.callback_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_payment_token(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentToken>, LedgerError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT token, bank, virtual_account, callback_url
            FROM payment_tokens
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(token, bank, virtual_account, callback_url)| PaymentToken {
            order_id: order_id.clone(),
            token,
            bank,
            virtual_account,
            callback_url,
        }))
    }
}

// =========================================================================
// PgUserDirectory
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, account_number, first_name, last_name, email, username, \
                            telephone, role, status, is_verified, created_at";

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_user(&self, id: i64) -> Result<User, LedgerError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row)
            .unwrap_or_else(|| Err(LedgerError::not_found(format!("user {}", id))))
    }

    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<User>, LedgerError> {
        let sql = format!("SELECT {} FROM users WHERE account_number = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(account_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn account_exists(&self, account_number: &str) -> Result<bool, LedgerError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE account_number = $1)")
                .bind(account_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, LedgerError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR LOWER(email) = LOWER($2))",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError> {
        let sql = format!(
            r#"
            INSERT INTO users (account_number, first_name, last_name, email, username, telephone, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let mut last_error = None;
        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            let result: Result<UserRow, sqlx::Error> = sqlx::query_as(&sql)
                .bind(generate_account_number())
                .bind(&new.first_name)
                .bind(&new.last_name)
                .bind(&new.email)
                .bind(&new.username)
                .bind(&new.telephone)
                .bind(new.role.code())
                .fetch_one(&self.pool)
                .await;

            match result {
                Ok(row) => return user_from_row(row),
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    tracing::warn!("account number collision, retrying: {}", e);
                    last_error = Some(sqlx::Error::Database(e));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .map(LedgerError::from)
            .unwrap_or_else(|| LedgerError::Corrupt("account number space exhausted".into())))
    }
}
