//! Balance Calculator
//!
//! A balance is never stored. It is recomputed on every read as
//!
//! ```text
//! paid deposits + incoming transfers - active withdrawals - outgoing transfers - refunds
//! ```
//!
//! with transfers matched by the user's account number.

use std::sync::Arc;

use crate::domain::{Amount, Balance};
use crate::ledger::{LedgerError, LedgerStore, LedgerTotals, SumFilter, UserDirectory};

#[derive(Clone)]
pub struct BalanceCalculator {
    ledger: Arc<dyn LedgerStore>,
    users: Arc<dyn UserDirectory>,
}

impl BalanceCalculator {
    pub fn new(ledger: Arc<dyn LedgerStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { ledger, users }
    }

    /// Pure balance formula over the ledger sums
    pub fn compute(totals: &LedgerTotals) -> Balance {
        totals.net()
    }

    /// Load the ledger sums for one owner
    pub async fn totals(&self, user_id: i64, account_number: &str) -> Result<LedgerTotals, LedgerError> {
        let account = account_number.to_string();

        let paid_deposits = self
            .ledger
            .sum_amount(SumFilter::PaidDeposits { owner: user_id })
            .await?;
        let incoming_transfers = self
            .ledger
            .sum_amount(SumFilter::IncomingTransfers {
                account: account.clone(),
            })
            .await?;
        let active_withdrawals = self
            .ledger
            .sum_amount(SumFilter::ActiveWithdrawals { owner: user_id })
            .await?;
        let outgoing_transfers = self
            .ledger
            .sum_amount(SumFilter::OutgoingTransfers { account })
            .await?;
        let refunds = self
            .ledger
            .sum_amount(SumFilter::Refunds { owner: user_id })
            .await?;

        Ok(LedgerTotals {
            paid_deposits,
            incoming_transfers,
            active_withdrawals,
            outgoing_transfers,
            refunds,
        })
    }

    /// Current spendable balance of `user_id`
    pub async fn compute_balance(&self, user_id: i64) -> Result<Balance, LedgerError> {
        let user = self.users.find_user(user_id).await?;
        let totals = self.totals(user.id, &user.account_number).await?;
        let balance = Self::compute(&totals);

        tracing::debug!(
            user_id,
            paid_deposits = totals.paid_deposits,
            incoming = totals.incoming_transfers,
            withdrawals = totals.active_withdrawals,
            outgoing = totals.outgoing_transfers,
            refunds = totals.refunds,
            balance = balance.value(),
            "balance computed"
        );

        Ok(balance)
    }

    /// Whether `user_id` can currently afford `amount` (equality is enough)
    pub async fn covers(&self, user_id: i64, amount: &Amount) -> Result<bool, LedgerError> {
        Ok(self.compute_balance(user_id).await?.covers(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PaymentStatus, Role};
    use crate::ledger::{InMemoryStore, NewDeposit, NewTransfer, NewUser, NewWithdrawal, User};

    fn amount(value: i64) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn setup() -> (Arc<InMemoryStore>, BalanceCalculator) {
        let store = Arc::new(InMemoryStore::new());
        let calculator = BalanceCalculator::new(store.clone(), store.clone());
        (store, calculator)
    }

    async fn user(store: &InMemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                first_name: name.to_string(),
                last_name: String::new(),
                email: format!("{}@example.com", name),
                username: name.to_string(),
                telephone: String::new(),
                role: Role::Customer,
            })
            .await
            .unwrap()
    }

    async fn deposit(store: &InMemoryStore, user_id: i64, value: i64, status: PaymentStatus) {
        let deposit = store
            .create_deposit(NewDeposit {
                user_id,
                amount: amount(value),
            })
            .await
            .unwrap();
        store.set_status(&deposit.order_id, status).await.unwrap();
    }

    #[tokio::test]
    async fn test_user_without_records_has_zero_balance() {
        let (store, calculator) = setup().await;
        let alice = user(&store, "alice").await;

        assert_eq!(calculator.compute_balance(alice.id).await.unwrap(), Balance::zero());
    }

    #[tokio::test]
    async fn test_paid_deposit_minus_outgoing_transfer() {
        let (store, calculator) = setup().await;
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        deposit(&store, alice.id, 1000, PaymentStatus::Paid).await;

        store
            .create_transfer_if_covered(NewTransfer {
                user_id: alice.id,
                from_account: alice.account_number.clone(),
                to_account: bob.account_number.clone(),
                amount: amount(300),
            })
            .await
            .unwrap();

        assert_eq!(calculator.compute_balance(alice.id).await.unwrap().value(), 700);
        assert_eq!(calculator.compute_balance(bob.id).await.unwrap().value(), 300);
    }

    #[tokio::test]
    async fn test_unsettled_deposits_do_not_count() {
        let (store, calculator) = setup().await;
        let alice = user(&store, "alice").await;
        deposit(&store, alice.id, 1000, PaymentStatus::Paid).await;
        deposit(&store, alice.id, 50, PaymentStatus::Pending).await;
        deposit(&store, alice.id, 60, PaymentStatus::Denied).await;
        deposit(&store, alice.id, 70, PaymentStatus::Cancelled).await;

        assert_eq!(calculator.compute_balance(alice.id).await.unwrap().value(), 1000);
    }

    #[tokio::test]
    async fn test_withdrawals_reduce_balance() {
        let (store, calculator) = setup().await;
        let alice = user(&store, "alice").await;
        deposit(&store, alice.id, 500, PaymentStatus::Paid).await;
        deposit(&store, alice.id, 500, PaymentStatus::Paid).await;

        store
            .create_withdrawal_if_covered(NewWithdrawal {
                user_id: alice.id,
                account_number: alice.account_number.clone(),
                amount: amount(400),
                to: "BCA 0001".to_string(),
            })
            .await
            .unwrap();

        let balance = calculator.compute_balance(alice.id).await.unwrap();
        assert_eq!(balance.value(), 600);
        assert!(calculator.covers(alice.id, &amount(600)).await.unwrap());
        assert!(!calculator.covers(alice.id, &amount(601)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (_store, calculator) = setup().await;
        assert!(calculator
            .compute_balance(42)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
