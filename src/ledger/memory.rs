//! In-memory ledger
//!
//! Backs both [`LedgerStore`] and [`UserDirectory`] with plain vectors behind
//! one `tokio::sync::Mutex`. Holding the lock across the balance check and
//! the insert gives debit creation the same atomicity the PostgreSQL store
//! gets from its advisory lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    default_refund_key, ensure_refundable, generate_account_number, Deposit, LedgerError,
    LedgerRecord, LedgerStore, LedgerTotals, NewDeposit, NewRefund, NewTransfer, NewUser,
    NewWithdrawal, Page, PaymentToken, Refund, SumFilter, Transfer, User, UserDirectory,
    Withdrawal,
};
use crate::domain::DomainError;
use crate::domain::{OrderId, OrderKind, PaymentStatus, WithdrawalStatus};

#[derive(Debug, Default)]
struct Inner {
    deposits: Vec<Deposit>,
    withdrawals: Vec<Withdrawal>,
    transfers: Vec<Transfer>,
    refunds: Vec<Refund>,
    tokens: HashMap<OrderId, PaymentToken>,
    users: Vec<User>,
}

impl Inner {
    fn sum(&self, filter: &SumFilter) -> i64 {
        match filter {
            SumFilter::PaidDeposits { owner } => self
                .deposits
                .iter()
                .filter(|d| d.user_id == *owner && d.status.counts_for_deposit())
                .map(|d| d.amount.value())
                .sum(),
            SumFilter::ActiveWithdrawals { owner } => self
                .withdrawals
                .iter()
                .filter(|w| w.user_id == *owner && w.status.counts_toward_balance())
                .map(|w| w.amount.value())
                .sum(),
            SumFilter::IncomingTransfers { account } => self
                .transfers
                .iter()
                .filter(|t| &t.to_account == account && t.status.counts_for_transfer())
                .map(|t| t.amount.value())
                .sum(),
            SumFilter::OutgoingTransfers { account } => self
                .transfers
                .iter()
                .filter(|t| &t.from_account == account && t.status.counts_for_transfer())
                .map(|t| t.amount.value())
                .sum(),
            SumFilter::Refunds { owner } => self
                .refunds
                .iter()
                .filter(|r| r.user_id == *owner && r.status.counts_for_refund())
                .map(|r| r.amount.value())
                .sum(),
            SumFilter::RefundsOfDeposit { order_id } => self
                .refunds
                .iter()
                .filter(|r| &r.order_id == order_id && r.status.counts_for_refund())
                .map(|r| r.amount.value())
                .sum(),
        }
    }

    fn totals(&self, owner: i64, account: &str) -> LedgerTotals {
        LedgerTotals {
            paid_deposits: self.sum(&SumFilter::PaidDeposits { owner }),
            incoming_transfers: self.sum(&SumFilter::IncomingTransfers {
                account: account.to_string(),
            }),
            active_withdrawals: self.sum(&SumFilter::ActiveWithdrawals { owner }),
            outgoing_transfers: self.sum(&SumFilter::OutgoingTransfers {
                account: account.to_string(),
            }),
            refunds: self.sum(&SumFilter::Refunds { owner }),
        }
    }

    fn listed_deposits(&self, owner: Option<i64>) -> impl Iterator<Item = &Deposit> {
        self.deposits
            .iter()
            .filter(move |d| owner.map_or(true, |o| d.user_id == o))
            .filter(|d| d.status != PaymentStatus::Created)
    }

    fn listed_withdrawals(&self, owner: Option<i64>) -> impl Iterator<Item = &Withdrawal> {
        self.withdrawals
            .iter()
            .filter(move |w| owner.map_or(true, |o| w.user_id == o))
            .filter(|w| w.status.counts_toward_balance())
    }

    fn listed_transfers(&self, owner: Option<i64>) -> impl Iterator<Item = &Transfer> {
        self.transfers
            .iter()
            .filter(move |t| owner.map_or(true, |o| t.user_id == o))
            .filter(|t| t.status.counts_for_transfer())
    }
}

fn paginate<'a, T: Clone + 'a>(items: impl Iterator<Item = &'a T>, page: Page) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(0);
    items
        .skip(offset)
        .take(limit)
        .cloned()
        .collect()
}

/// Process-local ledger and user directory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_deposit(&self, new: NewDeposit) -> Result<Deposit, LedgerError> {
        let mut inner = self.inner.lock().await;
        let deposit = Deposit {
            id: inner.deposits.len() as i64 + 1,
            order_id: OrderId::generate(OrderKind::Deposit),
            user_id: new.user_id,
            amount: new.amount,
            status: PaymentStatus::Created,
            created_at: Utc::now(),
        };
        inner.deposits.push(deposit.clone());
        Ok(deposit)
    }

    async fn find_deposit(&self, id: i64) -> Result<Deposit, LedgerError> {
        let inner = self.inner.lock().await;
        inner
            .deposits
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("deposit {}", id)))
    }

    async fn list_deposits(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Deposit>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(paginate(inner.listed_deposits(owner), page))
    }

    async fn count_deposits(&self, owner: Option<i64>) -> Result<i64, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.listed_deposits(owner).count() as i64)
    }

    async fn list_open_deposits(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Deposit>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .deposits
            .iter()
            .filter(|d| d.status.is_open() && d.created_at < before)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn create_withdrawal_if_covered(
        &self,
        new: NewWithdrawal,
    ) -> Result<Withdrawal, LedgerError> {
        let mut inner = self.inner.lock().await;
        inner
            .totals(new.user_id, &new.account_number)
            .ensure_covers(&new.amount)?;

        let withdrawal = Withdrawal {
            id: inner.withdrawals.len() as i64 + 1,
            user_id: new.user_id,
            amount: new.amount,
            to: new.to,
            status: WithdrawalStatus::Active,
            created_at: Utc::now(),
        };
        inner.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn find_withdrawal(&self, id: i64) -> Result<Withdrawal, LedgerError> {
        let inner = self.inner.lock().await;
        inner
            .withdrawals
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("withdrawal {}", id)))
    }

    async fn list_withdrawals(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(paginate(inner.listed_withdrawals(owner), page))
    }

    async fn count_withdrawals(&self, owner: Option<i64>) -> Result<i64, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.listed_withdrawals(owner).count() as i64)
    }

    async fn create_transfer_if_covered(&self, new: NewTransfer) -> Result<Transfer, LedgerError> {
        let mut inner = self.inner.lock().await;
        inner
            .totals(new.user_id, &new.from_account)
            .ensure_covers(&new.amount)?;

        let transfer = Transfer {
            id: inner.transfers.len() as i64 + 1,
            order_id: OrderId::generate(OrderKind::Transfer),
            user_id: new.user_id,
            from_account: new.from_account,
            to_account: new.to_account,
            amount: new.amount,
            status: PaymentStatus::Created,
            created_at: Utc::now(),
        };
        inner.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn find_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        let inner = self.inner.lock().await;
        inner
            .transfers
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("transfer {}", id)))
    }

    async fn list_transfers(
        &self,
        owner: Option<i64>,
        page: Page,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(paginate(inner.listed_transfers(owner), page))
    }

    async fn count_transfers(&self, owner: Option<i64>) -> Result<i64, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.listed_transfers(owner).count() as i64)
    }

    async fn create_refund_if_covered(&self, new: NewRefund) -> Result<Refund, LedgerError> {
        let mut inner = self.inner.lock().await;

        let deposit = inner
            .deposits
            .iter()
            .find(|d| d.order_id == new.order_id && d.user_id == new.user_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(&new.order_id))?;

        let refund_key = match new.refund_key {
            Some(key) => key,
            None => {
                let n = inner
                    .refunds
                    .iter()
                    .filter(|r| r.order_id == new.order_id)
                    .count();
                default_refund_key(&new.order_id, n as i64 + 1)
            }
        };
        if inner.refunds.iter().any(|r| r.refund_key == refund_key) {
            return Err(DomainError::DuplicateRefund(refund_key).into());
        }

        let refunded = inner.sum(&SumFilter::RefundsOfDeposit {
            order_id: new.order_id.clone(),
        });
        ensure_refundable(&deposit, refunded, &new.amount)?;
        inner
            .totals(new.user_id, &new.account_number)
            .ensure_covers(&new.amount)?;

        let refund = Refund {
            id: inner.refunds.len() as i64 + 1,
            order_id: new.order_id,
            user_id: new.user_id,
            amount: new.amount,
            refund_key,
            status: PaymentStatus::Created,
            created_at: Utc::now(),
        };
        inner.refunds.push(refund.clone());
        Ok(refund)
    }

    async fn set_refund_status(
        &self,
        refund_key: &str,
        status: PaymentStatus,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        match inner.refunds.iter_mut().find(|r| r.refund_key == refund_key) {
            Some(refund) => {
                refund.status = status;
                Ok(())
            }
            None => Err(LedgerError::not_found(format!("refund {}", refund_key))),
        }
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<LedgerRecord, LedgerError> {
        let inner = self.inner.lock().await;
        let record = match order_id.kind() {
            OrderKind::Deposit => inner
                .deposits
                .iter()
                .find(|d| &d.order_id == order_id)
                .cloned()
                .map(LedgerRecord::Deposit),
            OrderKind::Transfer => inner
                .transfers
                .iter()
                .find(|t| &t.order_id == order_id)
                .cloned()
                .map(LedgerRecord::Transfer),
        };
        record.ok_or_else(|| LedgerError::not_found(order_id))
    }

    async fn set_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        let slot = match order_id.kind() {
            OrderKind::Deposit => inner
                .deposits
                .iter_mut()
                .find(|d| &d.order_id == order_id)
                .map(|d| &mut d.status),
            OrderKind::Transfer => inner
                .transfers
                .iter_mut()
                .find(|t| &t.order_id == order_id)
                .map(|t| &mut t.status),
        };

        match slot {
            Some(current) => {
                *current = status;
                Ok(())
            }
            None => Err(LedgerError::not_found(order_id)),
        }
    }

    async fn sum_amount(&self, filter: SumFilter) -> Result<i64, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.sum(&filter))
    }

    async fn store_payment_token(&self, token: PaymentToken) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(token.order_id.clone(), token);
        Ok(())
    }

    async fn find_payment_token(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentToken>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.tokens.get(order_id).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: i64) -> Result<User, LedgerError> {
        let inner = self.inner.lock().await;
        inner
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("user {}", id)))
    }

    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<User>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.account_number == account_number)
            .cloned())
    }

    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .any(|u| u.username == username || u.email.eq_ignore_ascii_case(email)))
    }

    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError> {
        let mut inner = self.inner.lock().await;

        let mut account_number = generate_account_number();
        while inner.users.iter().any(|u| u.account_number == account_number) {
            account_number = generate_account_number();
        }

        let user = User {
            id: inner.users.len() as i64 + 1,
            account_number,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            username: new.username,
            telephone: new.telephone,
            role: new.role,
            status: 1,
            is_verified: false,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, DomainError, Role};

    fn amount(value: i64) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn customer(store: &InMemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                first_name: name.to_string(),
                last_name: "Test".to_string(),
                email: format!("{}@example.com", name),
                username: name.to_string(),
                telephone: String::new(),
                role: Role::Customer,
            })
            .await
            .unwrap()
    }

    async fn paid_deposit(store: &InMemoryStore, user_id: i64, value: i64) -> Deposit {
        let deposit = store
            .create_deposit(NewDeposit {
                user_id,
                amount: amount(value),
            })
            .await
            .unwrap();
        store
            .set_status(&deposit.order_id, PaymentStatus::Paid)
            .await
            .unwrap();
        deposit
    }

    #[tokio::test]
    async fn test_sums_are_zero_for_empty_ledger() {
        let store = InMemoryStore::new();
        let sum = store
            .sum_amount(SumFilter::PaidDeposits { owner: 1 })
            .await
            .unwrap();
        assert_eq!(sum, 0);
    }

    #[tokio::test]
    async fn test_only_paid_deposits_are_summed() {
        let store = InMemoryStore::new();
        paid_deposit(&store, 1, 1000).await;
        store
            .create_deposit(NewDeposit {
                user_id: 1,
                amount: amount(500),
            })
            .await
            .unwrap();

        let sum = store
            .sum_amount(SumFilter::PaidDeposits { owner: 1 })
            .await
            .unwrap();
        assert_eq!(sum, 1000);
    }

    #[tokio::test]
    async fn test_created_deposits_are_not_listed() {
        let store = InMemoryStore::new();
        paid_deposit(&store, 1, 1000).await;
        store
            .create_deposit(NewDeposit {
                user_id: 1,
                amount: amount(500),
            })
            .await
            .unwrap();

        let page = Page::new(1, 10).unwrap();
        assert_eq!(store.list_deposits(Some(1), page).await.unwrap().len(), 1);
        assert_eq!(store.count_deposits(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_withdrawal_rejected_when_not_covered() {
        let store = InMemoryStore::new();
        let user = customer(&store, "alice").await;
        paid_deposit(&store, user.id, 100).await;

        let err = store
            .create_withdrawal_if_covered(NewWithdrawal {
                user_id: user.id,
                account_number: user.account_number.clone(),
                amount: amount(101),
                to: "BCA 123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientBalance { .. })
        ));
        assert_eq!(store.count_withdrawals(Some(user.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_between_accounts() {
        let store = InMemoryStore::new();
        let alice = customer(&store, "alice").await;
        let bob = customer(&store, "bob").await;
        paid_deposit(&store, alice.id, 1000).await;

        store
            .create_transfer_if_covered(NewTransfer {
                user_id: alice.id,
                from_account: alice.account_number.clone(),
                to_account: bob.account_number.clone(),
                amount: amount(300),
            })
            .await
            .unwrap();

        let outgoing = store
            .sum_amount(SumFilter::OutgoingTransfers {
                account: alice.account_number.clone(),
            })
            .await
            .unwrap();
        let incoming = store
            .sum_amount(SumFilter::IncomingTransfers {
                account: bob.account_number.clone(),
            })
            .await
            .unwrap();
        assert_eq!(outgoing, 300);
        assert_eq!(incoming, 300);
    }

    #[tokio::test]
    async fn test_find_by_order_id_and_set_status() {
        let store = InMemoryStore::new();
        let deposit = store
            .create_deposit(NewDeposit {
                user_id: 1,
                amount: amount(10),
            })
            .await
            .unwrap();

        store
            .set_status(&deposit.order_id, PaymentStatus::Pending)
            .await
            .unwrap();
        let record = store.find_by_order_id(&deposit.order_id).await.unwrap();
        assert_eq!(record.status(), PaymentStatus::Pending);

        let missing = OrderId::generate(OrderKind::Transfer);
        assert!(store
            .set_status(&missing, PaymentStatus::Paid)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_find_unknown_ids() {
        let store = InMemoryStore::new();
        assert!(store.find_deposit(0).await.unwrap_err().is_not_found());
        assert!(store.find_withdrawal(1).await.unwrap_err().is_not_found());
        assert!(!store.account_exists("999999").await.unwrap());
    }

    fn refund(user: &User, deposit: &Deposit, value: i64, key: Option<&str>) -> NewRefund {
        NewRefund {
            user_id: user.id,
            account_number: user.account_number.clone(),
            order_id: deposit.order_id.clone(),
            amount: amount(value),
            refund_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_refunds_cannot_exceed_deposit_in_total() {
        let store = InMemoryStore::new();
        let user = customer(&store, "alice").await;
        let deposit = paid_deposit(&store, user.id, 1000).await;

        let first = store
            .create_refund_if_covered(refund(&user, &deposit, 600, None))
            .await
            .unwrap();
        assert_eq!(first.refund_key, format!("refund-{}-1", deposit.order_id));

        let err = store
            .create_refund_if_covered(refund(&user, &deposit, 600, Some("second")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::RefundExceedsDeposit {
                requested: 600,
                refundable: 400
            })
        ));

        store
            .create_refund_if_covered(refund(&user, &deposit, 400, None))
            .await
            .unwrap();
        let refunded = store
            .sum_amount(SumFilter::Refunds { owner: user.id })
            .await
            .unwrap();
        assert_eq!(refunded, 1000);
    }

    #[tokio::test]
    async fn test_refund_needs_unspent_balance() {
        let store = InMemoryStore::new();
        let user = customer(&store, "alice").await;
        let deposit = paid_deposit(&store, user.id, 1000).await;
        store
            .create_withdrawal_if_covered(NewWithdrawal {
                user_id: user.id,
                account_number: user.account_number.clone(),
                amount: amount(800),
                to: "BCA 123".to_string(),
            })
            .await
            .unwrap();

        let err = store
            .create_refund_if_covered(refund(&user, &deposit, 500, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_refund_frees_the_amount() {
        let store = InMemoryStore::new();
        let user = customer(&store, "alice").await;
        let deposit = paid_deposit(&store, user.id, 1000).await;

        let reserved = store
            .create_refund_if_covered(refund(&user, &deposit, 1000, Some("r1")))
            .await
            .unwrap();
        let err = store
            .create_refund_if_covered(refund(&user, &deposit, 1000, Some("r1")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::DuplicateRefund(_))
        ));

        store
            .set_refund_status(&reserved.refund_key, PaymentStatus::Cancelled)
            .await
            .unwrap();
        assert!(store
            .create_refund_if_covered(refund(&user, &deposit, 1000, Some("r2")))
            .await
            .is_ok());
    }
}
