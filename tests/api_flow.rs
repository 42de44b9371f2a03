//! API Integration Tests
//!
//! Drive the full router against the in-memory store and scripted gateway.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use selfbank::TransitionPolicy;

mod common;

use common::TestApp;

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = TestApp::new();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, _) = common::send(app.router.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_401() {
    let app = TestApp::new();

    let req = Request::builder()
        .uri("/api/user/balance")
        .body(Body::empty())
        .unwrap();
    let (status, body) = common::send(app.router.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "missing_token");

    let (status, body) = app.get("/api/user/balance", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "invalid_token");
}

#[tokio::test]
async fn test_deposit_settlement_then_transfer() {
    let app = TestApp::new();
    let (_alice, alice_token) = app.customer("alice").await;
    let (bob, bob_token) = app.customer("bob").await;

    // 1. Deposit 1000 and settle it
    app.fund(&alice_token, 1000).await;
    let (status, body) = app.get("/api/user/balance", &alice_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 1000);

    // 2. Transfer 300 to Bob
    let (status, body) = app
        .post(
            "/api/transaction",
            &alice_token,
            json!({ "acc_number_to": bob.account_number, "amount": 300 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "transfer failed: {}", body);
    assert_eq!(body["acc_number_to"], Value::from(bob.account_number.clone()));
    assert_eq!(body["status"], 1);

    // 3. Both balances reflect it
    let (_, body) = app.get("/api/user/balance", &alice_token).await;
    assert_eq!(body["balance"], 700);
    let (_, body) = app.get("/api/user/profile", &bob_token).await;
    assert_eq!(body["balance"], 300);
    assert_eq!(body["acc_number"], Value::from(bob.account_number));
}

#[tokio::test]
async fn test_deposit_detail_includes_payment() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;

    let (status, created) = app
        .post("/api/deposit", &token, json!({ "amount": 50000, "payment": "8" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["bank"], "bni");
    assert_eq!(created["status"], 1);

    let (status, body) = app
        .get(&format!("/api/deposit/{}", created["id"]), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], created["order_id"]);
    assert_eq!(body["payment"]["virtual_account"], created["va_account"]);
}

#[tokio::test]
async fn test_unsupported_payment_code() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;

    let (status, body) = app
        .post("/api/deposit", &token, json!({ "amount": 1000, "payment": "1" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "unsupported_payment");
}

#[tokio::test]
async fn test_gateway_failure_cancels_deposit() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;
    app.gateway.fail_charges(true);

    let (status, body) = app
        .post("/api/deposit", &token, json!({ "amount": 1000, "payment": "7" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_code"], "gateway_error");

    let (status, body) = app.get("/api/deposit/1", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 3);
    assert_eq!(body["payment"], Value::Null);
}

#[tokio::test]
async fn test_transfer_to_unknown_account_rejected() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;
    app.fund(&token, 1000).await;

    let (status, body) = app
        .post(
            "/api/transaction",
            &token,
            json!({ "acc_number_to": "999999", "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "destination_invalid");

    let (_, body) = app.get("/api/transaction", &token).await;
    assert_eq!(body["paging"]["total_records"], 0);
}

#[tokio::test]
async fn test_withdrawal_over_balance_rejected() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;
    app.fund(&token, 500).await;

    let (status, body) = app
        .post("/api/withdrawal", &token, json!({ "amount": 501, "to": "BCA 123" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "insufficient_balance");

    let (status, body) = app
        .post("/api/withdrawal", &token, json!({ "amount": 500, "to": "BCA 123" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["to"], "BCA 123");

    let (_, body) = app.get("/api/user/balance", &token).await;
    assert_eq!(body["balance"], 0);
}

#[tokio::test]
async fn test_concurrent_withdrawals_never_overdraw() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;
    app.fund(&token, 1000).await;

    // Ten requests of 300 against a balance of 1000: at most three fit
    let mut handles = Vec::new();
    for _ in 0..10 {
        let router = app.router.clone();
        let req = Request::builder()
            .method("POST")
            .uri("/api/withdrawal")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(json!({ "amount": 300, "to": "BRI 77" }).to_string()))
            .unwrap();
        handles.push(tokio::spawn(common::send(router, req)));
    }

    let mut created = 0;
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
    assert_eq!(created, 3);

    let (_, body) = app.get("/api/user/balance", &token).await;
    assert_eq!(body["balance"], 100);
}

#[tokio::test]
async fn test_listing_pagination_and_roles() {
    let app = TestApp::new();
    let (_alice, alice_token) = app.customer("alice").await;
    let (_bob, bob_token) = app.customer("bob").await;

    for _ in 0..3 {
        app.fund(&alice_token, 100).await;
    }
    app.fund(&bob_token, 100).await;

    let (status, body) = app
        .get("/api/deposit?page=1&pageSize=2", &alice_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["paging"]["total_records"], 3);
    assert_eq!(body["paging"]["total_pages"], 2);
    assert_eq!(body["paging"]["next_page"], 2);

    let (_, body) = app.get("/api/deposit", &app.admin_token()).await;
    assert_eq!(body["paging"]["total_records"], 4);

    let (status, body) = app.get("/api/deposit?page=0", &alice_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_pagination");

    let (status, _) = app.get("/api/deposit?exportTo=pdf", &alice_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get("/api/deposit?pageSize=9223372036854775807", &alice_token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_pagination");
}

#[tokio::test]
async fn test_customer_cannot_read_foreign_record() {
    let app = TestApp::new();
    let (_alice, alice_token) = app.customer("alice").await;
    let (_bob, bob_token) = app.customer("bob").await;
    app.fund(&alice_token, 100).await;

    let (status, body) = app.get("/api/deposit/1", &bob_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "record_not_found");

    let (status, _) = app.get("/api/deposit/1", &app.admin_token()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_error_responses() {
    let app = TestApp::new();

    let (status, body) = app.notify("{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "webhook_parse_error");

    // Well-formed id that matches no record
    let unknown = json!({
        "order_id": "DEP-0123456789abcdef0123456789abcdef",
        "transaction_status": "settlement"
    });
    let (status, _) = app.notify(unknown.to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_duplicate_settlement_keeps_paid() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;
    let order_id = app.fund(&token, 1000).await;

    let (status, body) = app.notify_status(&order_id, "settlement").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = app.get("/api/user/balance", &token).await;
    assert_eq!(body["balance"], 1000);
}

#[tokio::test]
async fn test_settlement_claim_without_payment_is_not_credited() {
    let app = TestApp::new();
    let (_eve, token) = app.customer("eve").await;

    let (status, created) = app
        .post("/api/deposit", &token, json!({ "amount": 5000, "payment": "6" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = created["order_id"].as_str().unwrap().to_string();

    // The processor still has the virtual account waiting for payment
    let (status, _) = app.notify_status(&order_id, "settlement").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/user/balance", &token).await;
    assert_eq!(body["balance"], 0);
    let (_, body) = app.get(&format!("/api/deposit/{}", created["id"]), &token).await;
    assert_eq!(body["status"], 2);
}

#[tokio::test]
async fn test_transfer_cannot_be_cancelled_by_notification() {
    let app = TestApp::new();
    let (_alice, alice_token) = app.customer("alice").await;
    let (bob, bob_token) = app.customer("bob").await;
    app.fund(&alice_token, 1000).await;

    let (status, transfer) = app
        .post(
            "/api/transaction",
            &alice_token,
            json!({ "acc_number_to": bob.account_number, "amount": 1000 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .post("/api/withdrawal", &bob_token, json!({ "amount": 1000, "to": "BNI 9" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let order_id = transfer["order_id"].as_str().unwrap();
    for transaction_status in ["cancel", "pending"] {
        let (status, _) = app.notify_status(order_id, transaction_status).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.get("/api/user/balance", &alice_token).await;
    assert_eq!(body["balance"], 0);
    let (_, body) = app.get("/api/user/balance", &bob_token).await;
    assert_eq!(body["balance"], 0);
}

#[tokio::test]
async fn test_strict_policy_refuses_paid_to_cancelled() {
    let app = TestApp::with_policy(TransitionPolicy::Strict);
    let (_alice, token) = app.customer("alice").await;
    let order_id = app.fund(&token, 1000).await;
    app.processor_reports(&order_id, "cancel").await;

    // Acknowledged so the processor stops redelivering, but not applied
    let (status, body) = app.notify_status(&order_id, "cancel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = app.get("/api/user/balance", &token).await;
    assert_eq!(body["balance"], 1000);
}

#[tokio::test]
async fn test_permissive_policy_overwrites_status() {
    let app = TestApp::new();
    let (_alice, token) = app.customer("alice").await;
    let order_id = app.fund(&token, 1000).await;
    app.processor_reports(&order_id, "cancel").await;

    let (status, _) = app.notify_status(&order_id, "cancel").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/user/balance", &token).await;
    assert_eq!(body["balance"], 0);
}

#[tokio::test]
async fn test_admin_creates_user_and_refunds() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let (_alice, alice_token) = app.customer("alice").await;

    let (status, body) = app
        .post(
            "/api/users",
            &admin,
            json!({ "username": "dewi", "email": "dewi@example.com", "first_name": "Dewi" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create user failed: {}", body);
    assert_eq!(body["acc_number"].as_str().unwrap().len(), 7);
    assert_eq!(body["idrole"], 2);

    let (status, _) = app
        .post(
            "/api/users",
            &alice_token,
            json!({ "username": "eko", "email": "eko@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let order_id = app.fund(&alice_token, 1000).await;
    let (status, body) = app
        .post(
            "/api/deposit/refund",
            &admin,
            json!({ "order_id": order_id, "amount": 250, "reason": "overpaid" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "refund failed: {}", body);
    assert_eq!(body["amount"], 250);
    assert_eq!(app.gateway.refunds().await.len(), 1);

    let (_, body) = app.get("/api/user/balance", &alice_token).await;
    assert_eq!(body["balance"], 750);

    let (status, body) = app
        .post(
            "/api/deposit/refund",
            &admin,
            json!({ "order_id": order_id, "amount": 800, "refund_key": "second" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "refund_exceeds_deposit");
    assert_eq!(app.gateway.refunds().await.len(), 1);
}
