//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::util::ServiceExt;

use selfbank::auth::JwtService;
use selfbank::gateway::ScriptedGateway;
use selfbank::ledger::{InMemoryStore, NewUser, User, UserDirectory};
use selfbank::webhook::WebhookSettings;
use selfbank::{build_router, AppState, OrderId, Role, TransitionPolicy};

pub const JWT_SECRET: &str = "test-secret";
pub const JWT_ISSUER: &str = "selfbank";

/// Router wired to the in-memory store and the scripted gateway
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub jwt: JwtService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(TransitionPolicy::Permissive)
    }

    pub fn with_policy(policy: TransitionPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let jwt = JwtService::new(JWT_SECRET, JWT_ISSUER);

        let state = AppState::new(
            store.clone(),
            store.clone(),
            gateway.clone(),
            jwt.clone(),
            policy,
            WebhookSettings::default(),
        );

        Self {
            router: build_router(state),
            store,
            gateway,
            jwt,
        }
    }

    /// Seed a customer and return it with a valid bearer token
    pub async fn customer(&self, name: &str) -> (User, String) {
        let user = self
            .store
            .create_user(NewUser {
                first_name: name.to_string(),
                last_name: "Test".to_string(),
                email: format!("{}@example.com", name),
                username: name.to_string(),
                telephone: String::new(),
                role: Role::Customer,
            })
            .await
            .unwrap();
        let token = self
            .jwt
            .issue(user.id, Role::Customer, Some(user.account_number.as_str()))
            .unwrap();
        (user, token)
    }

    pub fn admin_token(&self) -> String {
        self.jwt.issue(9000, Role::Admin, None).unwrap()
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        send(self.router.clone(), req).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router.clone(), req).await
    }

    /// Deliver a raw notification body, unauthenticated
    pub async fn notify(&self, body: impl Into<Body>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/api/midtrans/notification")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        send(self.router.clone(), req).await
    }

    /// Script what the processor reports for `order_id`
    pub async fn processor_reports(&self, order_id: &str, transaction_status: &str) {
        let order_id: OrderId = order_id.parse().unwrap();
        self.gateway
            .set_status(&order_id, transaction_status, None)
            .await;
    }

    /// Deliver a bare notification for `order_id`
    pub async fn notify_status(&self, order_id: &str, transaction_status: &str) -> (StatusCode, Value) {
        self.notify(
            serde_json::json!({
                "order_id": order_id,
                "transaction_status": transaction_status
            })
            .to_string(),
        )
        .await
    }

    /// Create a deposit over HTTP, let the processor settle it and deliver
    /// the notification
    pub async fn fund(&self, token: &str, amount: i64) -> String {
        let (status, body) = self
            .post(
                "/api/deposit",
                token,
                serde_json::json!({ "amount": amount, "payment": "6" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "deposit failed: {}", body);
        let order_id = body["order_id"].as_str().unwrap().to_string();
        self.processor_reports(&order_id, "settlement").await;

        let (status, _) = self
            .notify(
                serde_json::json!({
                    "order_id": order_id,
                    "transaction_status": "settlement",
                    "status_code": "200",
                    "gross_amount": format!("{}.00", amount)
                })
                .to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        order_id
    }
}

pub async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}
