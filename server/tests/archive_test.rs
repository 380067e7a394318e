//! Integration tests for the conversation/message archive and presence HTTP API.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use courier_server::auth::jwt::Claims;
use courier_server::auth::JwtVerifier;
use courier_server::state::{AppState, WsSettings};

const SECRET: &[u8] = b"archive-test-secret-archive-test";

/// Helper: start the server on a random port and return (state, base_url).
async fn start_test_server() -> (AppState, String) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = courier_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = AppState::new(db, Arc::new(JwtVerifier::new(SECRET)), WsSettings::default());

    let app = courier_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (state, format!("http://{}", addr))
}

fn bearer(user_id: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        id: user_id.to_string(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
    format!("Bearer {}", token)
}

async fn create_conversation(base_url: &str, user_id: &str, member_id: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/conversations", base_url))
        .header("Authorization", bearer(user_id))
        .json(&json!({ "memberId": member_id }))
        .send()
        .await
        .unwrap()
}

async fn save_message(
    base_url: &str,
    user_id: &str,
    conversation_id: &str,
    text: &str,
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/messages", base_url))
        .header("Authorization", bearer(user_id))
        .json(&json!({ "conversationId": conversation_id, "text": text }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (_state, base_url) = start_test_server().await;
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let (_state, base_url) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/conversations", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/api/conversations", base_url))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_conversation_find_or_create() {
    let (_state, base_url) = start_test_server().await;

    let resp = create_conversation(&base_url, "a1", "b2").await;
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();

    // The other member gets the same conversation back
    let resp = create_conversation(&base_url, "b2", "a1").await;
    assert_eq!(resp.status(), 200);
    let existing: Value = resp.json().await.unwrap();

    assert_eq!(created["id"], existing["id"]);
    assert_eq!(created["members"], json!(["a1", "b2"]));

    let resp = reqwest::Client::new()
        .get(format!("{}/api/conversations", base_url))
        .header("Authorization", bearer("a1"))
        .send()
        .await
        .unwrap();
    let list: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_conversation_with_self_rejected() {
    let (_state, base_url) = start_test_server().await;
    assert_eq!(create_conversation(&base_url, "a1", "a1").await.status(), 400);
    assert_eq!(create_conversation(&base_url, "a1", "").await.status(), 400);
}

#[tokio::test]
async fn test_message_history_round_trip() {
    let (_state, base_url) = start_test_server().await;
    let conv: Value = create_conversation(&base_url, "a1", "b2")
        .await
        .json()
        .await
        .unwrap();
    let conv_id = conv["id"].as_str().unwrap();

    let resp = save_message(&base_url, "a1", conv_id, "hi").await;
    assert_eq!(resp.status(), 201);
    let saved: Value = resp.json().await.unwrap();
    assert_eq!(saved["sender"], "a1");

    assert_eq!(save_message(&base_url, "b2", conv_id, "hey").await.status(), 201);

    let resp = reqwest::Client::new()
        .get(format!("{}/api/messages/{}", base_url, conv_id))
        .header("Authorization", bearer("b2"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let history: Vec<Value> = resp.json().await.unwrap();
    let texts: Vec<&str> = history.iter().map(|m| m["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["hi", "hey"]);
    assert_eq!(history[1]["sender"], "b2");
}

#[tokio::test]
async fn test_message_access_control() {
    let (_state, base_url) = start_test_server().await;
    let conv: Value = create_conversation(&base_url, "a1", "b2")
        .await
        .json()
        .await
        .unwrap();
    let conv_id = conv["id"].as_str().unwrap();

    assert_eq!(save_message(&base_url, "c3", conv_id, "intruder").await.status(), 403);
    assert_eq!(save_message(&base_url, "a1", "missing", "hi").await.status(), 404);
    assert_eq!(save_message(&base_url, "a1", conv_id, "  ").await.status(), 400);

    let resp = reqwest::Client::new()
        .get(format!("{}/api/messages/{}", base_url, conv_id))
        .header("Authorization", bearer("c3"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_presence_endpoint_reflects_live_connections() {
    let (state, base_url) = start_test_server().await;
    let client = reqwest::Client::new();
    let presence_url = format!("{}/api/presence/b2", base_url);

    let body: Value = client
        .get(&presence_url)
        .header("Authorization", bearer("a1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "userId": "b2", "online": false }));

    let ws_url = format!(
        "{}/ws?token={}",
        base_url.replace("http://", "ws://"),
        bearer("b2").trim_start_matches("Bearer ")
    );
    let (_ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    for _ in 0..100 {
        if state.presence().is_online("b2") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let body: Value = client
        .get(&presence_url)
        .header("Authorization", bearer("a1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["online"], true);
}
