use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{ header::CONTENT_TYPE, Method, Request, StatusCode };
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{ json, Value };
use tokio::sync::Mutex;
use tower::ServiceExt;

use chat_agent::agent::ChatAgent;
use chat_agent::error::ChatError;
use chat_agent::history::MemoryHistoryStore;
use chat_agent::llm::chat::{ ChatClient, CompletionResponse };
use chat_agent::server::api::build_router;

struct ScriptedChatClient {
    outcomes: Mutex<VecDeque<Result<String, String>>>,
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(&self, _prompt: &str) -> Result<CompletionResponse, ChatError> {
        let outcome = self.outcomes
            .lock().await
            .pop_front()
            .expect("unexpected completion call");
        match outcome {
            Ok(response) => Ok(CompletionResponse { response }),
            Err(message) => Err(ChatError::provider(message)),
        }
    }
}

fn app(outcomes: Vec<Result<&str, &str>>) -> Router {
    let client = Arc::new(ScriptedChatClient {
        outcomes: Mutex::new(
            outcomes
                .into_iter()
                .map(|o| o.map(str::to_string).map_err(str::to_string))
                .collect()
        ),
    });
    let agent = Arc::new(ChatAgent::with_parts(client, Arc::new(MemoryHistoryStore::new())));
    build_router(agent, "public")
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>
) -> (StatusCode, Value) {
    let request = match body {
        Some(json_body) =>
            Request::builder()
                .method(method)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json_body.to_string()))
                .unwrap(),
        None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn create_chat_returns_the_new_conversation() {
    let app = app(vec![Ok("hello")]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chats",
        Some(json!({"message": "hi"}))
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "hi");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][1]["role"], "assistant");
    assert_eq!(body["messages"][1]["content"], "hello");
}

#[tokio::test]
async fn create_chat_without_a_message_is_bad_request() {
    let app = app(vec![]);

    let (status, body) = send(&app, Method::POST, "/api/chats", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Message is required");
}

#[tokio::test]
async fn create_chat_surfaces_provider_failures() {
    let app = app(vec![Err("quota exceeded")]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chats",
        Some(json!({"message": "hi"}))
    ).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Error processing your request");
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn unknown_chat_is_not_found() {
    let app = app(vec![]);

    let (status, body) = send(&app, Method::GET, "/api/chats/missing", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Chat not found");
}

#[tokio::test]
async fn append_and_edit_flow_updates_the_thread() {
    let app = app(vec![Ok("b"), Ok("d"), Ok("d2")]);

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/chats",
        Some(json!({"message": "a"}))
    ).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, appended) = send(
        &app,
        Method::POST,
        &format!("/api/chats/{}/messages", id),
        Some(json!({"message": "c"}))
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appended["messages"].as_array().unwrap().len(), 4);

    let (status, edited) = send(
        &app,
        Method::PUT,
        &format!("/api/chats/{}/messages/2", id),
        Some(json!({"content": "c2"}))
    ).await;
    assert_eq!(status, StatusCode::OK);
    let messages = edited["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["content"], "a");
    assert_eq!(messages[1]["content"], "b");
    assert_eq!(messages[2]["content"], "c2");
    assert_eq!(messages[3]["content"], "d2");
}

#[tokio::test]
async fn editing_an_assistant_message_is_forbidden() {
    let app = app(vec![Ok("hello")]);

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/chats",
        Some(json!({"message": "hi"}))
    ).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/chats/{}/messages/1", id),
        Some(json!({"content": "rewrite"}))
    ).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Can only edit user messages");
}

#[tokio::test]
async fn editing_with_an_invalid_index_is_bad_request() {
    let app = app(vec![Ok("hello")]);

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/chats",
        Some(json!({"message": "hi"}))
    ).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/chats/{}/messages/9", id),
        Some(json!({"content": "x"}))
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid message index");
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let app = app(vec![Ok("hello")]);

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/chats",
        Some(json!({"message": "hi"}))
    ).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::DELETE, &format!("/api/chats/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chat deleted successfully");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/chats/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &format!("/api/chats/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_returns_summaries_without_messages() {
    let app = app(vec![Ok("r1"), Ok("r2")]);

    send(&app, Method::POST, "/api/chats", Some(json!({"message": "first"}))).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    send(&app, Method::POST, "/api/chats", Some(json!({"message": "second"}))).await;

    let (status, body) = send(&app, Method::GET, "/api/chats", None).await;

    assert_eq!(status, StatusCode::OK);
    let summaries = body.as_array().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["title"], "second");
    assert_eq!(summaries[1]["title"], "first");
    assert!(summaries[0].get("messages").is_none());
    assert!(summaries[0].get("updatedAt").is_some());
}
