use super::*;
use crate::test_support::spawn_stub;
use axum::http::StatusCode;
use rand;
use serde_json::{json, Value};

fn factory_for(endpoint: &str, token: &str) -> BotClientFactory {
    BotClientFactory::new(Client::new(), endpoint, token)
}

#[test]
fn new_client_test_builds_reply_url() {
    let client = factory_for("https://api.line.me/", "token").new_client().unwrap();
    assert_eq!(client.reply_url(), "https://api.line.me/v2/bot/message/reply");
}

#[test]
fn new_client_test_empty_token() {
    assert!(matches!(
        factory_for("https://api.line.me", "  ").new_client(),
        Err(ClientError::MissingChannelToken(_))
    ));
}

#[test]
fn new_client_test_bad_endpoint() {
    assert!(matches!(
        factory_for("not a url", "token").new_client(),
        Err(ClientError::UrlParseFailure(_))
    ));
}

#[test]
fn reply_url_for_test_keeps_path_prefix() {
    assert_eq!(
        reply_url_for("https://api.line.me").unwrap(),
        "https://api.line.me/v2/bot/message/reply"
    );
    assert_eq!(
        reply_url_for("http://127.0.0.1:9000/stub").unwrap(),
        "http://127.0.0.1:9000/stub/v2/bot/message/reply"
    );
    assert_eq!(
        reply_url_for("http://127.0.0.1:9000/stub/////").unwrap(),
        "http://127.0.0.1:9000/stub/v2/bot/message/reply"
    );
}

#[test]
fn reply_url_for_test_rejects_unusable_endpoints() {
    assert!(matches!(
        reply_url_for("api.line.me"),
        Err(ClientError::UrlParseFailure(_))
    ));
    assert!(matches!(
        reply_url_for("mailto:bot@example.com"),
        Err(ClientError::UrlParseFailure(_))
    ));
}

#[tokio::test]
async fn reply_message_test_happy_path() {
    let stub = spawn_stub(vec![StatusCode::OK]).await;
    let token = format!("token{}", rand::random::<u32>());
    let reply_token = format!("tok{}", rand::random::<u32>());
    let client = factory_for(&stub.base_url, &token).new_client().unwrap();
    client
        .reply_message(&reply_token, vec![OutgoingMessage::text("ok")])
        .await
        .unwrap();
    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v2/bot/message/reply");
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        &format!("Bearer {}", token)
    );
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({"replyToken": reply_token, "messages": [{"type": "text", "text": "ok"}]})
    );
}

#[tokio::test]
async fn reply_message_test_client_error_is_rejection() {
    let stub = spawn_stub(vec![StatusCode::BAD_REQUEST]).await;
    let client = factory_for(&stub.base_url, "token").new_client().unwrap();
    let result = client
        .reply_message("expired", vec![OutgoingMessage::text("ok")])
        .await;
    assert!(matches!(result, Err(ClientError::ReplyRejected(_))));
}

#[tokio::test]
async fn reply_message_test_server_error_is_delivery_failure() {
    let stub = spawn_stub(vec![StatusCode::SERVICE_UNAVAILABLE]).await;
    let client = factory_for(&stub.base_url, "token").new_client().unwrap();
    let result = client
        .reply_message("tok123", vec![OutgoingMessage::text("ok")])
        .await;
    assert!(matches!(result, Err(ClientError::ReplyDeliveryFailure(_))));
}

#[tokio::test]
async fn reply_message_test_unreachable_endpoint() {
    // port 9 (discard) on loopback is closed in test environments
    let client = factory_for("http://127.0.0.1:9", "token").new_client().unwrap();
    let result = client
        .reply_message("tok123", vec![OutgoingMessage::text("ok")])
        .await;
    assert!(matches!(result, Err(ClientError::ReplyDeliveryFailure(_))));
}
