use crate::agent::ChatAgent;
use crate::cli::Args;
use crate::error::ChatError;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post, put },
    Router,
    extract::{ State, Path },
    response::{ IntoResponse, Response },
    http::StatusCode,
    Json,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use tower_http::services::ServeDir;
use log::{ info, error };

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ChatAgent>,
}

#[derive(Deserialize)]
struct NewMessageRequest {
    message: Option<String>,
}

#[derive(Deserialize)]
struct EditMessageRequest {
    content: Option<String>,
}

#[derive(Serialize)]
struct ApiMessage {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn build_router(agent: Arc<ChatAgent>, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/chats/{id}", get(get_chat).delete(delete_chat))
        .route("/api/chats/{id}/messages", post(append_message))
        .route("/api/chats/{id}/messages/{index}", put(edit_message))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<ChatAgent>,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = build_router(agent, &args.static_dir);

    if args.enable_tls && args.tls_cert_path.is_some() && args.tls_key_path.is_some() {
        let cert_path = args.tls_cert_path.as_ref().unwrap();
        let key_path = args.tls_key_path.as_ref().unwrap();

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("HTTPS server starting with TLS enabled");
        axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

/// One status per error kind, with the detail kept for provider failures so
/// the client can tell a retryable failure from bad input.
fn error_response(err: ChatError) -> Response {
    let (status, message, detail) = match &err {
        ChatError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
        ChatError::Index { .. } =>
            (StatusCode::BAD_REQUEST, "Invalid message index".to_string(), None),
        ChatError::Forbidden =>
            (StatusCode::FORBIDDEN, "Can only edit user messages".to_string(), None),
        ChatError::NotFound(_) => (StatusCode::NOT_FOUND, "Chat not found".to_string(), None),
        ChatError::Provider(e) => {
            error!("Completion provider error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing your request".to_string(),
                Some(e.to_string()),
            )
        }
        ChatError::Store(e) => {
            error!("History store error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
        }
    };

    (status, Json(ApiMessage { message, error: detail })).into_response()
}

async fn list_chats(State(state): State<AppState>) -> Response {
    match state.agent.list_conversations().await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_chat(
    State(state): State<AppState>,
    Json(req): Json<NewMessageRequest>
) -> Response {
    let message = req.message.unwrap_or_default();
    match state.agent.create_conversation(&message).await {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_chat(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.agent.get_conversation(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => error_response(e),
    }
}

async fn append_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewMessageRequest>
) -> Response {
    let message = req.message.unwrap_or_default();
    match state.agent.append_turn(&id, &message).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => error_response(e),
    }
}

async fn edit_message(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Json(req): Json<EditMessageRequest>
) -> Response {
    let content = req.content.unwrap_or_default();
    match state.agent.edit_user_message(&id, index, &content).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_chat(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.agent.delete_conversation(&id).await {
        Ok(()) =>
            Json(ApiMessage {
                message: "Chat deleted successfully".to_string(),
                error: None,
            }).into_response(),
        Err(e) => error_response(e),
    }
}
