use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::Html,
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::error::ApiError;
use crate::links::LinkInjector;
use crate::llm_interaction::{build_prompt, LanguageModel};

/// Opening message shown by the widget before the first question.
pub const GREETING: &str = "Hello! I'm your WebMD AI Assistant. I can help you with:\n\n\
• Understanding symptoms\n\
• Finding information about conditions\n\
• Learning about medications\n\
• General health questions\n\n\
I'll provide information from WebMD's extensive medical database and always cite my sources. How can I help you today?";

/// Body of `POST /api/chat`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    // No validation: a missing message is answered like an empty one.
    #[serde(default)]
    pub message: Option<String>,
    // Accepted but not used for context yet.
    #[serde(default, rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// Read a request body without ever rejecting it.
    ///
    /// Only JSON bodies are parsed. A string field is taken as is, any other
    /// JSON value as its JSON text; a missing, null or unreadable field is
    /// `None`.
    pub fn from_body(headers: &HeaderMap, body: &[u8]) -> Self {
        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|content_type| content_type.contains("json"))
            .unwrap_or(false);
        if !is_json {
            return Self::default();
        }

        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let field = |name: &str| match value.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        };
        Self {
            message: field("message"),
            conversation_id: field("conversationId"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    llm: Arc<dyn LanguageModel>,
    injector: Arc<LinkInjector>,
}

impl AppState {
    pub fn new(llm: Arc<dyn LanguageModel>, injector: Arc<LinkInjector>) -> Result<Self> {
        let templates = create_minijinja_env().context("Failed to initialize template engine")?;
        Ok(Self {
            templates: Arc::new(templates),
            llm,
            injector,
        })
    }
}

// Minijinja Environment setup
fn create_minijinja_env() -> Result<AutoReloader> {
    // Use AutoReloader so edits to the widget page show up without a restart
    let reloader = AutoReloader::new(|notifier| {
        let loader = path_loader("templates");
        let mut env = Environment::new();
        env.set_loader(loader);
        notifier.watch_path("templates", true);
        Ok(env)
    });
    Ok(reloader)
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, Html<String>> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => "WebMD AI Assistant",
                    greeting => GREETING,
                };
                tmpl.render(context)
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            Html(format!("Internal Server Error: {}", e))
        })
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "sitemap_urls": state.injector.sitemap().len(),
    }))
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    // Taken as raw bytes so that no body is turned away with a 4xx.
    let request = ChatRequest::from_body(&headers, &body);
    info!(conversation_id = ?request.conversation_id, "Chat request received");
    let message = request.message.unwrap_or_default();

    // A panic inside the pipeline becomes a JoinError, and so a 500.
    let response = tokio::spawn(answer(state, message)).await??;
    Ok(Json(ChatResponse { response }))
}

/// Prompt the model with `message` and attach verified links to its reply.
pub async fn answer(state: AppState, message: String) -> Result<String> {
    let prompt = build_prompt(&message);
    let reply = state
        .llm
        .generate(&prompt)
        .await
        .context("Failed to generate a reply")?;
    Ok(state.injector.augment(&reply).await)
}

/// Build the application router: widget page, static assets and the chat API.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(port: u16, state: AppState) -> Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server is running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
