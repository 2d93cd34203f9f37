// Integration tests for the Gmail relay endpoints against a mocked Gmail API

mod common;

use axum::http::StatusCode;
use common::*;
use mailbridge::api::auth::ProviderError;
use mockito::{Matcher, Server};
use std::sync::Arc;
use tower::ServiceExt;

fn gmail_app(server: &Server, provider: ScriptedProvider) -> axum::Router {
    let mut config = test_config();
    config.google.gmail_api_url = server.url();
    app_with(config, full_secrets(), Arc::new(provider))
}

fn session_cookie() -> String {
    format!("session={}", session_token(JWT_SECRET))
}

fn metadata_body(id: &str, subject: &str) -> String {
    serde_json::json!({
        "id": id,
        "threadId": format!("thread-{}", id),
        "snippet": format!("snippet for {}", id),
        "labelIds": ["INBOX", "UNREAD"],
        "payload": {
            "mimeType": "text/plain",
            "headers": [
                {"name": "Subject", "value": subject},
                {"name": "From", "value": "Bob <bob@example.com>"},
                {"name": "Date", "value": "Mon, 12 Oct 2026 09:00:00 +0000"}
            ]
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_list_emails() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", "/gmail/v1/users/me/messages")
        .match_header("authorization", "Bearer ya29.renewed")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("maxResults".into(), "5".into()),
            Matcher::UrlEncoded("labelIds".into(), "INBOX".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"messages": [{"id": "m1", "threadId": "thread-m1"}, {"id": "m2", "threadId": "thread-m2"}], "nextPageToken": "next"}"#)
        .create_async()
        .await;
    let _m1 = server
        .mock("GET", "/gmail/v1/users/me/messages/m1")
        .match_query(Matcher::UrlEncoded("format".into(), "metadata".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(metadata_body("m1", "Quarterly report"))
        .create_async()
        .await;
    let _m2 = server
        .mock("GET", "/gmail/v1/users/me/messages/m2")
        .match_query(Matcher::UrlEncoded("format".into(), "metadata".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(metadata_body("m2", "Lunch?"))
        .create_async()
        .await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request(
            "GET",
            "/api/gmail/list-emails?maxResults=5",
            Some(&session_cookie()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["id"], "m1");
    assert_eq!(messages[0]["subject"], "Quarterly report");
    assert_eq!(messages[0]["from"], "Bob <bob@example.com>");
    assert_eq!(messages[0]["threadId"], "thread-m1");
    assert_eq!(messages[1]["subject"], "Lunch?");
    assert_eq!(json["nextPageToken"], "next");
}

#[tokio::test]
async fn test_list_emails_empty_mailbox() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", "/gmail/v1/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"resultSizeEstimate": 0}"#)
        .create_async()
        .await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request("GET", "/api/gmail/list-emails", Some(&session_cookie())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["messages"], serde_json::json!([]));
}

#[tokio::test]
async fn test_list_emails_without_session() {
    let server = Server::new_async().await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request("GET", "/api/gmail/list-emails", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Not authenticated");
}

#[tokio::test]
async fn test_list_emails_refresh_revoked() {
    let server = Server::new_async().await;
    let provider = ScriptedProvider::happy().with_refresh(|| {
        Err(ProviderError::Rejected {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        })
    });

    let response = gmail_app(&server, provider)
        .oneshot(request("GET", "/api/gmail/list-emails", Some(&session_cookie())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Authentication expired");
}

#[tokio::test]
async fn test_list_emails_gmail_failure() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", "/gmail/v1/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request("GET", "/api/gmail/list-emails", Some(&session_cookie())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to fetch emails");
}

#[tokio::test]
async fn test_get_email() {
    let mut server = Server::new_async().await;
    let html = "<p>Hello <b>Alice</b></p>";
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, html);
    let body = serde_json::json!({
        "id": "m1",
        "threadId": "t1",
        "snippet": "Hello Alice",
        "labelIds": ["INBOX"],
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                {"name": "Subject", "value": "Greetings"},
                {"name": "From", "value": "bob@example.com"},
                {"name": "To", "value": "alice@example.com"},
                {"name": "Date", "value": "Tue, 13 Oct 2026 10:00:00 +0000"}
            ],
            "parts": [
                {"mimeType": "text/html", "body": {"data": encoded}}
            ]
        }
    });
    let _get = server
        .mock("GET", "/gmail/v1/users/me/messages/m1")
        .match_header("authorization", "Bearer ya29.renewed")
        .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request("GET", "/api/gmail/get-email?id=m1", Some(&session_cookie())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["subject"], "Greetings");
    assert_eq!(json["to"], "alice@example.com");
    assert_eq!(json["bodyHtml"], html);
    assert_eq!(json["body"], "Hello Alice");
}

#[tokio::test]
async fn test_get_email_requires_id() {
    let server = Server::new_async().await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request("GET", "/api/gmail/get-email", Some(&session_cookie())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Email ID required");
}

#[tokio::test]
async fn test_get_email_token_rejected_by_gmail() {
    let mut server = Server::new_async().await;
    let _get = server
        .mock("GET", "/gmail/v1/users/me/messages/m1")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let response = gmail_app(&server, ScriptedProvider::happy())
        .oneshot(request("GET", "/api/gmail/get-email?id=m1", Some(&session_cookie())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Authentication expired");
}
