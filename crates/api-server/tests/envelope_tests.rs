//! Envelope and audit integration tests.
//!
//! Exercise the full router over real HTTP: handler envelopes, fault
//! rendering, and the audit records written for each exchange.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use api_test_utils::TestApiServer;
use serde_json::{json, Value};

const SUBJECT: &str = "5b6f7a0e-1d2c-4e3f-8a9b-0c1d2e3f4a5b";

fn bearer(subject: &str) -> String {
    format!("Bearer {}", TestApiServer::token_for(subject))
}

async fn send_email(server: &TestApiServer, body: &str) -> Result<reqwest::Response> {
    let response = reqwest::Client::new()
        .post(format!("{}/api/email/send", server.url()))
        .header("Authorization", bearer(SUBJECT))
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await?;
    Ok(response)
}

#[tokio::test]
async fn test_invalid_email_model_is_not_rewrapped() -> Result<()> {
    let server = TestApiServer::spawn().await?;

    let response = send_email(&server, r#"{"toName":"Ada","toAddress":"not-an-address"}"#).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    // statusCode follows the HTTP status actually written
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["message"], "User Model is Invalid");
    assert!(body.get("result").is_none());
    assert!(body.get("responseException").is_none());
    assert!(server.sent_emails().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unparseable_email_body_is_invalid_model() -> Result<()> {
    let server = TestApiServer::spawn().await?;

    let response = send_email(&server, "{not json").await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["message"], "User Model is Invalid");

    Ok(())
}

#[tokio::test]
async fn test_valid_email_is_sent_with_test_template() -> Result<()> {
    let server = TestApiServer::spawn().await?;

    let response = send_email(
        &server,
        r#"{"toName":"Ada","toAddress":"ada@example.com","subject":"ignored","templateName":"Welcome"}"#,
    )
    .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["message"], "Email Successfuly Sent");

    let sent = server.sent_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Test Email");
    assert_eq!(sent[0].to[0].address, "ada@example.com");

    Ok(())
}

#[tokio::test]
async fn test_email_sender_failure_is_generic_exception() -> Result<()> {
    let server = TestApiServer::spawn_with_failing_email().await?;

    let response = send_email(&server, r#"{"toName":"Ada","toAddress":"ada@example.com"}"#).await?;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["statusCode"], 500);
    assert_eq!(body["message"], "Exception");
    assert_eq!(
        body["responseException"]["message"],
        "An unhandled error occurred."
    );
    let text = body.to_string();
    assert!(!text.contains("mock mail server"), "internal detail leaked: {text}");

    let records = server.audit_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 500);

    Ok(())
}

#[tokio::test]
async fn test_unknown_api_route_is_not_found_envelope() -> Result<()> {
    let server = TestApiServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/unknown", server.url())).await?;

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await?;
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["message"], "Failure");
    assert_eq!(
        body["responseException"]["message"],
        "The specified URI does not exist. Please verify and try again."
    );

    Ok(())
}

#[tokio::test]
async fn test_audit_record_captures_exchange() -> Result<()> {
    let server = TestApiServer::spawn().await?;
    let request_body = r#"{"toName":"Ada","toAddress":"ada@example.com"}"#;

    let response = reqwest::Client::new()
        .post(format!("{}/api/email/send?trace=1", server.url()))
        .header("Authorization", bearer(SUBJECT))
        .header("Content-Type", "application/json")
        .body(request_body)
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let response_text = response.text().await?;

    let records = server.audit_records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.method, "POST");
    assert_eq!(record.path, "/api/email/send");
    assert_eq!(record.query_string, "?trace=1");
    assert_eq!(record.request_body, request_body);
    assert_eq!(record.status_code, 200);
    assert_eq!(record.remote_address, "127.0.0.1");
    assert_eq!(record.user_id.to_string(), SUBJECT);
    assert!(record.duration_millis >= 0);
    assert_eq!(record.response_body, response_text);

    Ok(())
}

#[tokio::test]
async fn test_non_uuid_subject_audits_nil_user() -> Result<()> {
    let server = TestApiServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/email/send", server.url()))
        .header("Authorization", bearer("service-account"))
        .json(&json!({"toName": "Ada", "toAddress": "ada@example.com"}))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let records = server.audit_records();
    assert_eq!(records.len(), 1);
    assert!(records[0].user_id.is_nil());

    Ok(())
}

#[tokio::test]
async fn test_profile_path_is_not_audited() -> Result<()> {
    let server = TestApiServer::spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/UserProfile/get", server.url()))
        .header("Authorization", bearer(SUBJECT))
        .send()
        .await?;
    // Routing is case-sensitive, the deny-list is not
    assert_eq!(response.status(), 404);

    let response = reqwest::Client::new()
        .get(format!("{}/api/userprofile/get", server.url()))
        .header("Authorization", bearer(SUBJECT))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    assert!(server.audit_records().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_disabled_api_logging_writes_nothing() -> Result<()> {
    let server = TestApiServer::spawn_with(&[("ENABLE_API_LOGGING", "false")]).await?;

    let response = send_email(&server, r#"{"toName":"Ada","toAddress":"ada@example.com"}"#).await?;
    assert_eq!(response.status(), 200);
    let response = reqwest::get(format!("{}/api/unknown", server.url())).await?;
    assert_eq!(response.status(), 404);

    assert!(server.audit_records().is_empty());
    // Envelopes are still produced
    assert_eq!(server.sent_emails().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_custom_api_prefix() -> Result<()> {
    let server = TestApiServer::spawn_with(&[("API_PATH_PREFIX", "/service")]).await?;

    let response = reqwest::Client::new()
        .get(format!("{}/service/userprofile/get", server.url()))
        .header("Authorization", bearer(SUBJECT))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["result"]["userId"], SUBJECT);

    let response = reqwest::get(format!("{}/api/userprofile/get", server.url())).await?;
    assert_eq!(response.status(), 404);
    assert!(!response.text().await?.contains("statusCode"));

    Ok(())
}
