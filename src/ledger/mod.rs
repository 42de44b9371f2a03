//! Ledger Store
//!
//! Persistence seam for deposits, withdrawals and transfers. Balances are
//! never stored; they are aggregated from these records on every read.
//!
//! Two implementations: [`PgLedgerStore`] for production and
//! [`InMemoryStore`] for tests and local runs.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Amount, Balance, DomainError, OrderId, PaymentStatus};

pub use memory::InMemoryStore;
pub use models::{
    Deposit, LedgerRecord, NewDeposit, NewRefund, NewTransfer, NewUser, NewWithdrawal,
    PaymentToken, Refund, Transfer, User, Withdrawal,
};
pub use postgres::{PgLedgerStore, PgUserDirectory};

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored row that cannot be mapped back into a domain type
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl LedgerError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// =========================================================================
// Pagination
// =========================================================================

/// Offset pagination, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: i64,
    page_size: i64,
}

impl Page {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn new(page: i64, page_size: i64) -> Result<Self, DomainError> {
        if page < 1 || !(1..=Self::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(DomainError::InvalidPagination { page, page_size });
        }
        Ok(Self { page, page_size })
    }

    pub fn number(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Paging metadata for a listing with `total_records` rows in scope
    pub fn meta(&self, total_records: i64) -> PageMeta {
        let total_pages = if total_records > 0 {
            (total_records - 1) / self.page_size + 1
        } else {
            0
        };
        PageMeta {
            total_records,
            current_page: self.page,
            total_pages,
            next_page: (self.page < total_pages).then_some(self.page + 1),
            prev_page: (self.page > 1).then_some(self.page - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total_records: i64,
    pub current_page: i64,
    pub total_pages: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<i64>,
}

// =========================================================================
// Aggregation
// =========================================================================

/// Predicate for [`LedgerStore::sum_amount`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SumFilter {
    /// Deposits of `owner` in status Paid
    PaidDeposits { owner: i64 },
    /// Withdrawals of `owner` in status Active
    ActiveWithdrawals { owner: i64 },
    /// Counted transfers whose destination is `account`
    IncomingTransfers { account: String },
    /// Counted transfers whose source is `account`
    OutgoingTransfers { account: String },
    /// Counted refunds paid back to `owner`
    Refunds { owner: i64 },
    /// Counted refunds drawn against one deposit
    RefundsOfDeposit { order_id: OrderId },
}

/// The sums a balance is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    pub paid_deposits: i64,
    pub incoming_transfers: i64,
    pub active_withdrawals: i64,
    pub outgoing_transfers: i64,
    pub refunds: i64,
}

impl LedgerTotals {
    /// credits minus debits
    pub fn net(&self) -> Balance {
        let credits = self.paid_deposits.saturating_add(self.incoming_transfers);
        let debits = self
            .active_withdrawals
            .saturating_add(self.outgoing_transfers)
            .saturating_add(self.refunds);
        Balance::new(credits.saturating_sub(debits))
    }

    /// Fail with `InsufficientBalance` unless the net balance covers `amount`
    pub fn ensure_covers(&self, amount: &Amount) -> Result<(), DomainError> {
        let balance = self.net();
        if balance.covers(amount) {
            Ok(())
        } else {
            Err(DomainError::insufficient_balance(amount.value(), balance))
        }
    }
}

// =========================================================================
// Store traits
// =========================================================================

/// Storage of ledger records.
///
/// `owner: None` on listings means every owner (admin scope).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Deposits
    async fn create_deposit(&self, new: NewDeposit) -> Result<Deposit, LedgerError>;
    async fn find_deposit(&self, id: i64) -> Result<Deposit, LedgerError>;
    async fn list_deposits(&self, owner: Option<i64>, page: Page)
        -> Result<Vec<Deposit>, LedgerError>;
    async fn count_deposits(&self, owner: Option<i64>) -> Result<i64, LedgerError>;
    /// Deposits still in Created/Pending and created before `before`
    async fn list_open_deposits(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Deposit>, LedgerError>;

    // Withdrawals
    /// Check the owner's balance and insert the withdrawal atomically
    async fn create_withdrawal_if_covered(
        &self,
        new: NewWithdrawal,
    ) -> Result<Withdrawal, LedgerError>;
    async fn find_withdrawal(&self, id: i64) -> Result<Withdrawal, LedgerError>;
    async fn list_withdrawals(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Withdrawal>, LedgerError>;
    async fn count_withdrawals(&self, owner: Option<i64>) -> Result<i64, LedgerError>;

    // Transfers
    /// Check the sender's balance and insert the transfer atomically
    async fn create_transfer_if_covered(&self, new: NewTransfer) -> Result<Transfer, LedgerError>;
    async fn find_transfer(&self, id: i64) -> Result<Transfer, LedgerError>;
    async fn list_transfers(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Transfer>, LedgerError>;
    async fn count_transfers(&self, owner: Option<i64>) -> Result<i64, LedgerError>;

    // Refunds
    /// Reserve a refund against a paid deposit, atomically checking both the
    /// deposit's unrefunded remainder and the owner's balance
    async fn create_refund_if_covered(&self, new: NewRefund) -> Result<Refund, LedgerError>;
    async fn set_refund_status(
        &self,
        refund_key: &str,
        status: PaymentStatus,
    ) -> Result<(), LedgerError>;

    // Shared
    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<LedgerRecord, LedgerError>;
    /// Overwrite the status of the record behind `order_id`
    async fn set_status(&self, order_id: &OrderId, status: PaymentStatus)
        -> Result<(), LedgerError>;
    /// Sum of amounts matching `filter`; 0 when nothing matches
    async fn sum_amount(&self, filter: SumFilter) -> Result<i64, LedgerError>;

    async fn store_payment_token(&self, token: PaymentToken) -> Result<(), LedgerError>;
    async fn find_payment_token(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentToken>, LedgerError>;
}

/// Lookup of account holders
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<User, LedgerError>;
    async fn find_by_account_number(&self, account_number: &str)
        -> Result<Option<User>, LedgerError>;
    async fn account_exists(&self, account_number: &str) -> Result<bool, LedgerError> {
        Ok(self.find_by_account_number(account_number).await?.is_some())
    }
    /// True if another user already holds `username` or `email`
    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, LedgerError>;
    /// Insert a user under a freshly generated account number
    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError>;
}

/// Check a refund request against the deposit it draws on
pub(crate) fn ensure_refundable(
    deposit: &Deposit,
    already_refunded: i64,
    amount: &Amount,
) -> Result<(), DomainError> {
    if deposit.status != PaymentStatus::Paid {
        return Err(DomainError::RefundExceedsDeposit {
            requested: amount.value(),
            refundable: 0,
        });
    }
    let refundable = deposit.amount.value().saturating_sub(already_refunded).max(0);
    if amount.value() > refundable {
        return Err(DomainError::RefundExceedsDeposit {
            requested: amount.value(),
            refundable,
        });
    }
    Ok(())
}

/// Key for the `n`th refund of a deposit
pub(crate) fn default_refund_key(order_id: &OrderId, n: i64) -> String {
    format!("refund-{}-{}", order_id, n)
}

/// Random 7-digit public account number
pub fn generate_account_number() -> String {
    use rand::Rng;
    rand::thread_rng().gen_range(1_000_000..=9_999_999).to_string()
}
