//! Invite email delivery.

mod common;

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use bazaar_market::{HttpInviteMailer, InviteEmail, InviteMailer, LogMailer, MarketError};

use common::{marketplace_backend, shared, signed_in_member};

fn message() -> InviteEmail {
    InviteEmail {
        email: "friend@example.com".to_string(),
        code: "AB12CD".to_string(),
        inviter_name: Some("Ada".to_string()),
    }
}

#[tokio::test]
async fn http_mailer_posts_email_and_code_with_session_token() {
    let server = MockServer::start_async().await;
    let backend = marketplace_backend().await;
    let (session, _) = signed_in_member(&backend, "ada@example.com").await;

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/send-invite")
                .header("authorization", format!("Bearer {}", session.access_token))
                .json_body(json!({ "email": "friend@example.com", "code": "AB12CD" }));
            then.status(200).json_body(json!({ "success": true }));
        })
        .await;

    let mailer = HttpInviteMailer::new(
        server.url("/api/send-invite"),
        shared(&backend),
        Duration::from_secs(2),
    )
    .expect("client");
    mailer.send_invite(&message()).await.expect("delivered");

    mock.assert_async().await;
}

#[tokio::test]
async fn http_mailer_reports_delivery_failure() {
    let server = MockServer::start_async().await;
    let backend = marketplace_backend().await;
    signed_in_member(&backend, "ada@example.com").await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/send-invite");
            then.status(500)
                .json_body(json!({ "error": "Failed to send invite email" }));
        })
        .await;

    let mailer: Arc<dyn InviteMailer> = Arc::new(
        HttpInviteMailer::new(
            server.url("/api/send-invite"),
            shared(&backend),
            Duration::from_secs(2),
        )
        .expect("client"),
    );
    let err = mailer.send_invite(&message()).await.expect_err("server error");

    assert!(matches!(err, MarketError::MailDelivery { .. }));
    assert_eq!(err.to_string(), "Failed to send invite email");
}

#[tokio::test]
async fn http_mailer_needs_a_session() {
    let backend = marketplace_backend().await;
    let mailer = HttpInviteMailer::new(
        "http://127.0.0.1:9/api/send-invite",
        shared(&backend),
        Duration::from_secs(1),
    )
    .expect("client");

    let err = mailer.send_invite(&message()).await.expect_err("no session");
    assert!(matches!(err, MarketError::NotAuthenticated));
}

#[tokio::test]
async fn log_mailer_always_succeeds() {
    LogMailer.send_invite(&message()).await.expect("logged");
}
