//! Wallet top-ups and student plans paid through a gateway.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use httpmock::prelude::*;
use secrecy::SecretString;
use serde_json::json;
use swiftdrop_client::backend::AuthSession;
use swiftdrop_client::db::RepositoryError;
use swiftdrop_client::payments::{GatewayResponse, PaymentProvider};
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::{Email, Naira, StudentPlan, TransactionKind};
use swiftdrop_integration_tests::{
    CUSTOMER_ID, EMAIL, PASSWORD, state, token_body, wallet_row,
};

async fn signed_in(server: &MockServer, state: &AppState) -> AuthSession {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/token");
            then.status(200)
                .json_body(token_body("access-1", "refresh-1", 3600));
        })
        .await;
    state
        .auth()
        .sign_in(
            &Email::parse(EMAIL).unwrap(),
            &SecretString::from(PASSWORD),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fund_wallet_then_read_balance() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    let session = signed_in(&server, &state).await;

    let mut checkout = state
        .wallet()
        .begin_funding(PaymentProvider::Squad, &session, Naira::from_whole(5_000))
        .unwrap();
    assert_eq!(checkout.config()["metadata"]["purpose"], json!("wallet_funding"));

    let reference = checkout.reference().to_string();
    let record = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/wallet_transactions")
                .header("authorization", "Bearer access-1")
                .json_body_partial(
                    json!({
                        "user_id": CUSTOMER_ID,
                        "kind": "credit",
                        "description": "Wallet funding via Squad",
                        "reference": reference,
                    })
                    .to_string(),
                );
            then.status(201).json_body(json!([wallet_row(
                "7e8f9a0b-1c2d-4e3f-8a4b-5c6d7e8f9a0b",
                5_000,
                "credit",
                Some(reference.as_str()),
            )]));
        })
        .await;

    let mut response = GatewayResponse::default();
    response.transaction_ref = Some(reference.clone());
    response.status = "successful".to_string();
    let receipt = checkout.complete(&response).unwrap();
    let tx = state.wallet().complete_funding(&receipt, &session).await.unwrap();
    record.assert_async().await;
    assert_eq!(tx.kind, TransactionKind::Credit);

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/wallet_transactions")
                .query_param("user_id", format!("eq.{CUSTOMER_ID}"));
            then.status(200).json_body(json!([
                wallet_row("7e8f9a0b-1c2d-4e3f-8a4b-5c6d7e8f9a0b", 5_000, "credit", Some(reference.as_str())),
                wallet_row("6d7e8f9a-0b1c-4d2e-9f3a-4b5c6d7e8f9a", 1_200, "debit", None),
            ]));
        })
        .await;
    let balance = state.wallet().balance(&session).await.unwrap();
    assert_eq!(balance, Naira::from_whole(3_800));
}

#[tokio::test]
async fn test_duplicate_credit_is_a_conflict() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    let session = signed_in(&server, &state).await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/wallet_transactions");
            then.status(409).json_body(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"wallet_transactions_reference_key\""
            }));
        })
        .await;

    let mut checkout = state
        .wallet()
        .begin_funding(PaymentProvider::Paystack, &session, Naira::from_whole(1_000))
        .unwrap();
    let reference = checkout.reference().to_string();
    let receipt = checkout
        .complete(&GatewayResponse::new(reference, "success"))
        .unwrap();

    let err = state
        .wallet()
        .complete_funding(&receipt, &session)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Repository(RepositoryError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_buy_student_plan() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    let session = signed_in(&server, &state).await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/student_subscriptions");
            then.status(200).json_body(json!([]));
        })
        .await;
    assert!(state.subscriptions().current(&session).await.unwrap().is_none());

    let mut checkout = state
        .subscriptions()
        .begin(PaymentProvider::Paystack, StudentPlan::Monthly, &session)
        .unwrap();
    assert_eq!(checkout.amount(), Naira::from_whole(2_000));

    let reference = checkout.reference().to_string();
    let receipt = checkout
        .complete(&GatewayResponse::new(reference.clone(), "success"))
        .unwrap();

    let starts_at = receipt.paid_at;
    let expires_at = starts_at + Duration::days(30);
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/student_subscriptions")
                .json_body_partial(
                    json!({
                        "plan": "monthly",
                        "status": "active",
                        "payment_reference": reference,
                    })
                    .to_string(),
                );
            then.status(201).json_body(json!([{
                "id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
                "user_id": CUSTOMER_ID,
                "plan": "monthly",
                "status": "active",
                "amount": 2000,
                "payment_reference": reference,
                "starts_at": starts_at.to_rfc3339(),
                "expires_at": expires_at.to_rfc3339(),
                "created_at": starts_at.to_rfc3339()
            }]));
        })
        .await;

    let plan = state
        .subscriptions()
        .activate(&receipt, StudentPlan::Monthly, &session)
        .await
        .unwrap();
    create.assert_async().await;
    assert!(plan.is_active(Utc::now()));
    assert_eq!(plan.days_remaining(Utc::now()), 29);
}
