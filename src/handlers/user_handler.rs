//! User Creation Handler
//!
//! Admin-only creation of account holders. Each user receives a fresh
//! 7-digit account number from the directory.

use std::sync::Arc;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::ledger::{NewUser, User, UserDirectory};

use super::CreateUserCommand;

/// Handler for user creation
pub struct CreateUserHandler {
    users: Arc<dyn UserDirectory>,
}

impl CreateUserHandler {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Execute the create user command
    pub async fn execute(
        &self,
        command: CreateUserCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        if !context.role.can_manage_users() {
            return Err(AppError::Forbidden("creating users requires the admin role".to_string()));
        }

        let username = command.username.trim();
        let email = command.email.trim();
        if username.is_empty() {
            return Err(AppError::InvalidRequest("username is required".to_string()));
        }
        if !is_plausible_email(email) {
            return Err(AppError::InvalidRequest(format!("invalid email: {}", email)));
        }

        if self.users.identity_taken(username, email).await? {
            return Err(AppError::InvalidRequest(
                "User with this username or email already exists".to_string(),
            ));
        }

        let user = self
            .users
            .create_user(NewUser {
                first_name: command.first_name,
                last_name: command.last_name,
                email: email.to_string(),
                username: username.to_string(),
                telephone: command.telephone,
                role: command.role,
            })
            .await?;

        tracing::info!(
            user_id = user.id,
            account_number = %user.account_number,
            created_by = context.user_id,
            "user created"
        );

        Ok(user)
    }
}

/// One '@' with something on both sides and a dot in the domain
fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
