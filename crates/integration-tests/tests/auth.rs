//! Session lifecycle: sign in, silent refresh, expiry and sign out.

#![allow(clippy::unwrap_used)]

use httpmock::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use swiftdrop_client::backend::AuthError;
use swiftdrop_client::{AppState, ClientError, RecoveryAction};
use swiftdrop_core::{Email, Role};
use swiftdrop_integration_tests::{EMAIL, PASSWORD, state, token_body};

async fn sign_in(server: &MockServer, state: &AppState, expires_in: i64) {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "password")
                .json_body(json!({ "email": EMAIL, "password": PASSWORD }));
            then.status(200)
                .json_body(token_body("access-1", "refresh-1", expires_in));
        })
        .await;
    state
        .auth()
        .sign_in(
            &Email::parse(EMAIL).unwrap(),
            &SecretString::from(PASSWORD),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fresh_session_used_as_is() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    sign_in(&server, &state, 3600).await;

    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "refresh_token");
            then.status(200)
                .json_body(token_body("access-2", "refresh-2", 3600));
        })
        .await;

    let session = state.auth().require_session().await.unwrap();
    assert_eq!(session.access_token.expose_secret(), "access-1");
    assert_eq!(session.role(), Some(Role::Customer));
    assert_eq!(refresh.hits_async().await, 0);
}

#[tokio::test]
async fn test_expiring_session_refreshed() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    sign_in(&server, &state, 30).await;

    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "refresh_token")
                .json_body(json!({ "refresh_token": "refresh-1" }));
            then.status(200)
                .json_body(token_body("access-2", "refresh-2", 3600));
        })
        .await;

    let session = state.auth().require_session().await.unwrap();
    refresh.assert_async().await;
    assert_eq!(session.access_token.expose_secret(), "access-2");

    // the refreshed session was stored, so no second refresh
    let again = state.auth().require_session().await.unwrap();
    assert_eq!(again.access_token.expose_secret(), "access-2");
    assert_eq!(refresh.hits_async().await, 1);
}

#[tokio::test]
async fn test_rejected_refresh_flags_auth_error() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    sign_in(&server, &state, 30).await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "refresh_token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Already Used"
            }));
        })
        .await;

    let result = state.auth().current_session().await;
    assert!(matches!(result, Err(AuthError::SessionExpired)));
    assert!(state.flags().has_auth_error());
    assert!(state.auth().current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_signed_out_user_gets_boundary_failure() {
    let server = MockServer::start_async().await;
    let state = state(&server);

    let failure = state
        .boundary()
        .guard(async { Ok(state.auth().require_session().await?) })
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ClientError::Auth(AuthError::NotSignedIn)
    ));
    assert_eq!(failure.actions, [RecoveryAction::Reload, RecoveryAction::SoftRetry]);
    assert!(!state.toasts().drain().is_empty());
}

#[tokio::test]
async fn test_sign_out_revokes_and_forgets() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    sign_in(&server, &state, 3600).await;

    let logout = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/logout")
                .header("authorization", "Bearer access-1");
            then.status(204);
        })
        .await;

    state.auth().sign_out().await.unwrap();
    logout.assert_async().await;
    assert!(state.auth().current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_out_survives_backend_outage() {
    let server = MockServer::start_async().await;
    let state = state(&server);
    sign_in(&server, &state, 3600).await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/logout");
            then.status(503);
        })
        .await;

    state.auth().sign_out().await.unwrap();
    assert!(state.auth().current_session().await.unwrap().is_none());
}
