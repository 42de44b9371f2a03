//! Operation Context
//!
//! Who is calling and under which correlation id, built by the auth
//! middleware and threaded through handlers for logging.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Internal user id from the `userid` claim
    pub user_id: i64,

    pub role: Role,

    /// Public account number of the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            account_number: None,
            correlation_id: None,
        }
    }

    pub fn with_account_number(mut self, account_number: impl Into<String>) -> Self {
        self.account_number = Some(account_number.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// Owner filter for listings: `None` means every owner
    pub fn owner_scope(&self) -> Option<i64> {
        if self.role.can_view_all_records() {
            None
        } else {
            Some(self.user_id)
        }
    }

    /// Whether the caller may read a record owned by `owner_id`
    pub fn can_read(&self, owner_id: i64) -> bool {
        self.role.can_view_all_records() || self.user_id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new(7, Role::Customer)
            .with_account_number("1234567")
            .with_correlation_id(correlation_id);

        assert_eq!(context.user_id, 7);
        assert_eq!(context.account_number.as_deref(), Some("1234567"));
        assert_eq!(context.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new(1, Role::Admin);
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert_eq!(context.correlation_id, Some(id));

        // Calling again should return the same ID
        assert_eq!(context.ensure_correlation_id(), id);
    }

    #[test]
    fn test_owner_scope() {
        assert_eq!(OperationContext::new(3, Role::Customer).owner_scope(), Some(3));
        assert_eq!(OperationContext::new(1, Role::Admin).owner_scope(), None);

        let customer = OperationContext::new(3, Role::Customer);
        assert!(customer.can_read(3));
        assert!(!customer.can_read(4));
        assert!(OperationContext::new(1, Role::Admin).can_read(4));
    }
}
