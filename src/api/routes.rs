//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderName, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::domain::{Balance, OperationContext, Role};
use crate::error::AppError;
use crate::handlers::{
    CreateDepositCommand, CreateDepositHandler, CreateUserCommand, CreateUserHandler,
    DepositResult, RefundCommand, RefundDepositHandler, RefundResult, TransferCommand,
    TransferHandler, WithdrawCommand, WithdrawHandler,
};
use crate::ledger::{Deposit, Page, PageMeta, PaymentToken, Transfer, User, Withdrawal};
use crate::webhook::WebhookOutcome;

use super::middleware::{auth_middleware, logging_middleware, CORRELATION_HEADER};
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: i64,
    pub payment: String,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub order_id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub refund_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: i64,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub acc_number_to: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub idrole: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub telephone: String,
}

fn default_role() -> Role {
    Role::Customer
}

/// `?page=&pageSize=&exportTo=` on every listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default, rename = "pageSize")]
    pub page_size: Option<i64>,
    #[serde(default, rename = "exportTo")]
    pub export_to: Option<String>,
}

impl ListQuery {
    /// Absent values take the defaults; present values must be >= 1
    pub fn page(&self) -> Result<Page, AppError> {
        match self.export_to.as_deref() {
            None | Some("") | Some("json") => {}
            Some(other) => {
                return Err(AppError::InvalidRequest(format!(
                    "unsupported export format: {}",
                    other
                )))
            }
        }

        Ok(Page::new(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(Page::DEFAULT_PAGE_SIZE),
        )?)
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub paging: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct DepositDetailResponse {
    #[serde(flatten)]
    pub deposit: Deposit,
    pub payment: Option<PaymentToken>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub acc_number: String,
    pub balance: Balance,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub balance: Balance,
}

// =========================================================================
// API Router
// =========================================================================

/// Routes that require a bearer token
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Deposits
        .route("/deposit", post(create_deposit).get(list_deposits))
        .route("/deposit/refund", post(refund_deposit))
        .route("/deposit/:id", get(get_deposit))
        // Withdrawals
        .route("/withdrawal", post(create_withdrawal).get(list_withdrawals))
        .route("/withdrawal/:id", get(get_withdrawal))
        // Transfers
        .route("/transaction", post(create_transfer).get(list_transfers))
        .route("/transaction/:id", get(get_transfer))
        // Account holder
        .route("/user/balance", get(get_balance))
        .route("/user/profile", get(get_profile))
        .route("/users", post(create_user))
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let correlation_header = HeaderName::from_static(CORRELATION_HEADER);

    // Note: Axum layers are applied in reverse order (last added = first executed)
    let protected_routes = create_router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let api_routes = Router::new()
        // The processor authenticates with a signature, not a bearer token
        .route("/midtrans/notification", post(midtrans_notification))
        .merge(protected_routes)
        .layer(middleware::from_fn(logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(PropagateRequestIdLayer::new(correlation_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(correlation_header, MakeRequestUuid))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// =========================================================================
// Deposits
// =========================================================================

async fn create_deposit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositResult>), AppError> {
    let handler = CreateDepositHandler::new(state.ledger.clone(), state.gateway.clone());
    let result = handler
        .execute(
            CreateDepositCommand::new(request.amount, request.payment),
            &context,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn list_deposits(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Deposit>>, AppError> {
    let page = query.page()?;
    let owner = context.owner_scope();

    let data = state.ledger.list_deposits(owner, page).await?;
    let total = state.ledger.count_deposits(owner).await?;

    Ok(Json(ListResponse {
        data,
        paging: page.meta(total),
    }))
}

async fn get_deposit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<i64>,
) -> Result<Json<DepositDetailResponse>, AppError> {
    let deposit = state.ledger.find_deposit(id).await?;
    // Someone else's record looks exactly like a missing one
    if !context.can_read(deposit.user_id) {
        return Err(AppError::NotFound(format!("deposit {}", id)));
    }

    let payment = state.ledger.find_payment_token(&deposit.order_id).await?;

    Ok(Json(DepositDetailResponse { deposit, payment }))
}

async fn refund_deposit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResult>, AppError> {
    let mut command = RefundCommand::new(request.order_id, request.reason);
    if let Some(amount) = request.amount {
        command = command.with_amount(amount);
    }
    if let Some(refund_key) = request.refund_key {
        command = command.with_refund_key(refund_key);
    }

    let handler = RefundDepositHandler::new(
        state.ledger.clone(),
        state.users.clone(),
        state.gateway.clone(),
    );
    let result = handler.execute(command, &context).await?;

    Ok(Json(result))
}

// =========================================================================
// Payment processor notifications
// =========================================================================

async fn midtrans_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let outcome = state.webhooks.handle(&body).await?;

    match outcome {
        WebhookOutcome::Updated { from, to } => {
            tracing::debug!(%from, %to, "notification applied")
        }
        WebhookOutcome::Unchanged(status) => {
            tracing::debug!(%status, "notification repeated current status")
        }
        WebhookOutcome::Flagged
        | WebhookOutcome::Ignored
        | WebhookOutcome::Rejected { .. } => {
            tracing::debug!(?outcome, "notification left record untouched")
        }
    }

    Ok(Json(json!({ "status": "ok" })))
}

// =========================================================================
// Withdrawals
// =========================================================================

async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<Withdrawal>), AppError> {
    let handler = WithdrawHandler::new(
        state.users.clone(),
        state.ledger.clone(),
        state.validator.clone(),
    );
    let withdrawal = handler
        .execute(WithdrawCommand::new(request.amount, request.to), &context)
        .await?;

    Ok((StatusCode::CREATED, Json(withdrawal)))
}

async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Withdrawal>>, AppError> {
    let page = query.page()?;
    let owner = context.owner_scope();

    let data = state.ledger.list_withdrawals(owner, page).await?;
    let total = state.ledger.count_withdrawals(owner).await?;

    Ok(Json(ListResponse {
        data,
        paging: page.meta(total),
    }))
}

async fn get_withdrawal(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<i64>,
) -> Result<Json<Withdrawal>, AppError> {
    let withdrawal = state.ledger.find_withdrawal(id).await?;
    if !context.can_read(withdrawal.user_id) {
        return Err(AppError::NotFound(format!("withdrawal {}", id)));
    }

    Ok(Json(withdrawal))
}

// =========================================================================
// Transfers
// =========================================================================

async fn create_transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<Transfer>), AppError> {
    let handler = TransferHandler::new(
        state.users.clone(),
        state.ledger.clone(),
        state.validator.clone(),
    );
    let transfer = handler
        .execute(
            TransferCommand::new(request.acc_number_to, request.amount),
            &context,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transfer)))
}

async fn list_transfers(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Transfer>>, AppError> {
    let page = query.page()?;
    let owner = context.owner_scope();

    let data = state.ledger.list_transfers(owner, page).await?;
    let total = state.ledger.count_transfers(owner).await?;

    Ok(Json(ListResponse {
        data,
        paging: page.meta(total),
    }))
}

async fn get_transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<i64>,
) -> Result<Json<Transfer>, AppError> {
    let transfer = state.ledger.find_transfer(id).await?;
    if !context.can_read(transfer.user_id) {
        return Err(AppError::NotFound(format!("transfer {}", id)));
    }

    Ok(Json(transfer))
}

// =========================================================================
// Account holder
// =========================================================================

async fn get_balance(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user = state.users.find_user(context.user_id).await?;
    let totals = state.balance.totals(user.id, &user.account_number).await?;

    Ok(Json(BalanceResponse {
        user_id: user.id,
        acc_number: user.account_number,
        balance: totals.net(),
    }))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.users.find_user(context.user_id).await?;
    let balance = state.balance.totals(user.id, &user.account_number).await?.net();

    Ok(Json(ProfileResponse { user, balance }))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let command = CreateUserCommand::new(request.username, request.email, request.idrole)
        .with_name(request.first_name, request.last_name)
        .with_telephone(request.telephone);

    let user = CreateUserHandler::new(state.users.clone())
        .execute(command, &context)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}
