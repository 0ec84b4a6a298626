use std::{sync::Arc, time::Duration};

use anyhow::Result;
use digest_service::{
    clients::telegram::TelegramClient,
    errors::{ChannelError, ErrorClass},
    models::{
        delivery::{DeliveryTarget, OutboundNotification, RenderedMessage},
        event::NotificationType,
        retry::RetryConfig,
    },
    notifications::{ChannelClient, DeliveryClient, InMemoryFailureStore},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

const TOKEN: &str = "123456:TEST";

fn target() -> DeliveryTarget {
    DeliveryTarget {
        user_id: "user-1".to_string(),
        chat_id: 42,
    }
}

fn telegram(server: &MockServer, timeout: Duration) -> Result<TelegramClient> {
    TelegramClient::with_api_url(server.uri(), TOKEN.to_string(), timeout, None)
}

async fn respond_with(template: ResponseTemplate) -> Result<(MockServer, TelegramClient)> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(template)
        .mount(&server)
        .await;

    let client = telegram(&server, Duration::from_secs(5))?;
    Ok((server, client))
}

fn telegram_error(code: u16, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "ok": false,
        "error_code": code,
        "description": description,
    }))
}

/// Test: A 200 with ok=true is a successful delivery carrying the chat id and text
#[tokio::test]
async fn test_send_message_success() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .and(body_partial_json(json!({ "chat_id": 42, "text": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = telegram(&server, Duration::from_secs(5))?;
    client.deliver(&target(), &RenderedMessage::plain("hello")).await?;

    Ok(())
}

/// Test: 429 is a transient rate limit carrying retry_after
#[tokio::test]
async fn test_rate_limit_is_transient() -> Result<()> {
    let (_server, client) = respond_with(ResponseTemplate::new(429).set_body_json(json!({
        "ok": false,
        "error_code": 429,
        "description": "Too Many Requests: retry after 7",
        "parameters": { "retry_after": 7 }
    })))
    .await?;

    let error = client
        .deliver(&target(), &RenderedMessage::plain("hello"))
        .await
        .expect_err("429 should fail");

    assert_eq!(
        error,
        ChannelError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
    assert!(error.is_transient());

    Ok(())
}

/// Test: A user who blocked the bot is permanently unreachable
#[tokio::test]
async fn test_blocked_bot_is_permanent() -> Result<()> {
    let (_server, client) =
        respond_with(telegram_error(403, "Forbidden: bot was blocked by the user")).await?;

    let error = client
        .deliver(&target(), &RenderedMessage::plain("hello"))
        .await
        .expect_err("403 should fail");

    assert!(matches!(error, ChannelError::RecipientUnreachable(_)));
    assert_eq!(error.class(), ErrorClass::Permanent);

    Ok(())
}

/// Test: An unknown chat is permanently unreachable
#[tokio::test]
async fn test_chat_not_found_is_permanent() -> Result<()> {
    let (_server, client) = respond_with(telegram_error(400, "Bad Request: chat not found")).await?;

    let error = client
        .deliver(&target(), &RenderedMessage::plain("hello"))
        .await
        .expect_err("400 should fail");

    assert!(matches!(error, ChannelError::RecipientUnreachable(_)));

    Ok(())
}

/// Test: Other 4xx responses are permanent rejections
#[tokio::test]
async fn test_bad_request_is_rejected() -> Result<()> {
    let (_server, client) =
        respond_with(telegram_error(400, "Bad Request: message is too long")).await?;

    let error = client
        .deliver(&target(), &RenderedMessage::plain("hello"))
        .await
        .expect_err("400 should fail");

    assert_eq!(
        error,
        ChannelError::Rejected {
            status: 400,
            description: "Bad Request: message is too long".to_string(),
        }
    );
    assert!(!error.is_transient());

    Ok(())
}

/// Test: A 5xx without a JSON body is a transient server error
#[tokio::test]
async fn test_gateway_error_is_transient() -> Result<()> {
    let (_server, client) =
        respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway")).await?;

    let error = client
        .deliver(&target(), &RenderedMessage::plain("hello"))
        .await
        .expect_err("502 should fail");

    assert_eq!(
        error,
        ChannelError::Server {
            status: 502,
            description: "Bad Gateway".to_string(),
        }
    );
    assert!(error.is_transient());

    Ok(())
}

/// Test: A slow API surfaces as a transient timeout
#[tokio::test]
async fn test_slow_response_times_out() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = telegram(&server, Duration::from_millis(50))?;
    let error = client
        .deliver(&target(), &RenderedMessage::plain("hello"))
        .await
        .expect_err("request should time out");

    assert!(matches!(error, ChannelError::Timeout(_)));
    assert!(error.is_transient());
    assert!(!error.to_string().contains(TOKEN), "bot token must not leak into errors");

    Ok(())
}

/// Test: The delivery client retries a flaky API until it succeeds
#[tokio::test]
async fn test_delivery_client_retries_over_http() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryFailureStore::new());
    let delivery = DeliveryClient::new(
        Arc::new(telegram(&server, Duration::from_secs(5))?),
        store.clone(),
        RetryConfig {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2,
            attempt_timeout_ms: 5_000,
            jitter_ratio: 0.0,
        },
    );

    let outcome = delivery
        .send(OutboundNotification {
            target: target(),
            notification_type: NotificationType::Achievement,
            message: RenderedMessage::plain("🏆 Achievement unlocked: First Track"),
            original_payload: json!([]),
        })
        .await;

    assert!(outcome.is_delivered());
    assert_eq!(outcome.attempts(), 3);
    assert!(store.is_empty());

    Ok(())
}

/// Test: A blocked bot is permanent whatever the status code
#[test]
fn test_blocked_user_is_permanent() {
    let error = ChannelError::from_status(403, "Forbidden: bot was blocked by the user", None);

    assert_eq!(
        error,
        ChannelError::RecipientUnreachable("Forbidden: bot was blocked by the user".into())
    );
    assert_eq!(error.class(), ErrorClass::Permanent);
}

/// Test: Rate limits and server errors are transient, other 4xx are not
#[test]
fn test_status_classification() {
    let limited = ChannelError::from_status(429, "Too Many Requests", Some(Duration::from_secs(3)));
    assert!(limited.is_transient());
    assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));

    assert!(ChannelError::from_status(502, "Bad Gateway", None).is_transient());
    assert!(!ChannelError::from_status(400, "Bad Request: message is too long", None).is_transient());
}
