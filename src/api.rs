// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::chat::{ChatError, ChatService};
use crate::dataset::query;
use crate::dataset::types::{Program, QueryResult, Record, Space};
use crate::dataset::Dataset;

/// Front-end origins allowed to call the API from a browser.
pub const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:3000",
    "https://kt-busan.github.io",
];

#[derive(Clone)]
pub struct AppState {
    pub spaces: Arc<Dataset<Space>>,
    pub programs: Arc<Dataset<Program>>,
    pub chat: Arc<ChatService>,
}

pub fn create_router(state: AppState) -> Router {
    let spaces = dataset_router::<Space>().with_state(state.spaces.clone());
    let programs = dataset_router::<Program>()
        .route("/categories", get(program_categories))
        .with_state(state.programs.clone());

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/{chat_id}", delete(delete_chat))
        .route("/api/history/{anonymous_id}", get(history))
        .route("/api/user", post(create_user))
        .route("/api/user/{anonymous_id}", get(get_user))
        .route("/api/users/stats", get(users_stats))
        .nest("/api/spaces", spaces)
        .nest("/api/programs", programs)
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .map(|o| HeaderValue::from_static(*o))
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// ------------------------------------------------------------
// Datasets
// ------------------------------------------------------------

fn dataset_router<R: Record>() -> Router<Arc<Dataset<R>>> {
    Router::new()
        .route("/", get(list_all::<R>))
        .route("/all", get(formatted_all::<R>))
        .route("/region/{region}", get(list_by_region::<R>))
        .route("/search", get(search::<R>))
        .route("/detail/{name}", get(detail::<R>))
        .route("/crawl", post(crawl::<R>))
        .route("/overrides/reload", post(reload_overrides::<R>))
        .route("/status", get(status::<R>))
}

#[derive(Serialize)]
#[serde(bound = "R: Record")]
struct ListResp<R> {
    success: bool,
    /// false when there is no data at all (scrape failed or nothing published)
    available: bool,
    count: usize,
    data: Vec<R>,
    message: String,
}

fn list_response<R: Record>(
    result: QueryResult<Vec<R>>,
    found: impl FnOnce(&[R]) -> String,
    no_match: impl FnOnce() -> String,
) -> Json<ListResp<R>> {
    let (available, data, message) = match result {
        QueryResult::Found(data) => {
            let message = found(&data);
            (true, data, message)
        }
        QueryResult::NoMatch => (true, Vec::new(), no_match()),
        QueryResult::Unavailable => (false, Vec::new(), query::unavailable_message(R::KIND)),
    };
    Json(ListResp {
        success: true,
        available,
        count: data.len(),
        data,
        message,
    })
}

async fn list_all<R: Record>(State(ds): State<Arc<Dataset<R>>>) -> Json<ListResp<R>> {
    let result = ds.list_all().await;
    list_response(
        result,
        |all| format!("{}개의 {} 정보를 찾았습니다.", all.len(), R::KIND.label()),
        || query::unavailable_message(R::KIND),
    )
}

async fn list_by_region<R: Record>(
    State(ds): State<Arc<Dataset<R>>>,
    Path(region): Path<String>,
) -> Json<ListResp<R>> {
    let result = ds.list_by_region(&region).await;
    list_response(
        result,
        |hits| query::render_region_listing(&region, hits),
        || query::region_no_match_message(R::KIND, &region),
    )
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    keyword: Option<String>,
}

async fn search<R: Record>(
    State(ds): State<Arc<Dataset<R>>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let keyword = params.keyword.unwrap_or_default();
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "keyword 파라미터가 필요합니다." })),
        )
            .into_response();
    }
    let result = ds.list_by_keyword(keyword).await;
    list_response(
        result,
        |hits| query::render_keyword_listing(keyword, hits),
        || query::keyword_no_match_message(R::KIND, keyword),
    )
    .into_response()
}

async fn detail<R: Record>(
    State(ds): State<Arc<Dataset<R>>>,
    Path(name): Path<String>,
) -> Response {
    match ds.get_detail(&name).await {
        QueryResult::Found(record) => Json(json!({
            "success": true,
            "message": record.render(),
            "data": record,
        }))
        .into_response(),
        QueryResult::NoMatch => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": query::name_no_match_message(R::KIND, &name),
            })),
        )
            .into_response(),
        QueryResult::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": query::unavailable_message(R::KIND),
            })),
        )
            .into_response(),
    }
}

async fn formatted_all<R: Record>(State(ds): State<Arc<Dataset<R>>>) -> Json<Value> {
    Json(json!({ "success": true, "message": ds.overview_reply().await }))
}

async fn crawl<R: Record>(State(ds): State<Arc<Dataset<R>>>) -> Json<Value> {
    let outcome = ds.force_refresh().await;
    Json(json!({
        "success": true,
        "count": outcome.records.len(),
        "fetched_at": outcome.fetched_at,
        "persisted": outcome.persisted,
        "message": format!("{}개의 {} 정보를 수집했습니다.", outcome.records.len(), R::KIND.label()),
    }))
}

async fn reload_overrides<R: Record>(State(ds): State<Arc<Dataset<R>>>) -> Json<Value> {
    let count = ds.reload_overrides();
    Json(json!({ "success": true, "override_count": count }))
}

async fn status<R: Record>(State(ds): State<Arc<Dataset<R>>>) -> Json<Value> {
    Json(json!({ "success": true, "status": ds.status() }))
}

async fn program_categories(State(ds): State<Arc<Dataset<Program>>>) -> Json<Value> {
    let QueryResult::Found(all) = ds.list_all().await else {
        return Json(json!({
            "success": true,
            "categories": [],
            "message": query::unavailable_message(Program::KIND),
        }));
    };
    let categories: Vec<Value> = query::categorize(&all)
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(name, items)| json!({ "category": name, "count": items.len(), "data": items }))
        .collect();
    Json(json!({
        "success": true,
        "categories": categories,
        "message": query::render_categories(&all),
    }))
}

// ------------------------------------------------------------
// Chat and users
// ------------------------------------------------------------

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ChatError::MissingField(_) => (StatusCode::BAD_REQUEST, "필수 정보가 누락되었습니다."),
            ChatError::ChatNotFound(_) => (StatusCode::NOT_FOUND, "삭제할 채팅을 찾을 수 없습니다."),
            ChatError::Storage(e) => {
                tracing::error!(target: "chat", error = ?e, "chat storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "요청 처리 중 오류가 발생했습니다.")
            }
        };
        (status, Json(json!({ "error": message, "detail": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatReq {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    anonymous_id: Option<String>,
    /// The web client sends either a string or a numeric timestamp.
    #[serde(default)]
    chat_id: Option<Value>,
}

fn id_string(v: Option<Value>) -> String {
    match v {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatReq>) -> Result<Json<Value>, ChatError> {
    let message = body.message.unwrap_or_default();
    let anonymous_id = body.anonymous_id.unwrap_or_default();
    let chat_id = id_string(body.chat_id);
    let reply = state.chat.process(&message, &anonymous_id, &chat_id).await?;
    Ok(Json(json!({ "reply": reply })))
}

async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    state.chat.delete_chat(&chat_id)?;
    Ok(Json(json!({ "message": "채팅이 성공적으로 삭제되었습니다." })))
}

async fn history(
    State(state): State<AppState>,
    Path(anonymous_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    let history = state.chat.history(&anonymous_id)?;
    Ok(Json(json!(history)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(anonymous_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    Ok(Json(match state.chat.user_info(&anonymous_id)? {
        Some(user) => json!({
            "success": true,
            "id": user.id,
            "anonymous_id": user.anonymous_id,
        }),
        None => json!({ "success": false, "message": "사용자를 찾을 수 없습니다." }),
    }))
}

#[derive(Deserialize)]
struct CreateUserReq {
    #[serde(default)]
    anonymous_id: Option<String>,
}

async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserReq>,
) -> Result<Json<Value>, ChatError> {
    let (user, created) = state
        .chat
        .create_user(body.anonymous_id.as_deref().unwrap_or_default())?;
    let message = if created {
        "사용자가 성공적으로 생성되었습니다."
    } else {
        "이미 존재하는 사용자입니다."
    };
    Ok(Json(json!({
        "success": true,
        "id": user.id,
        "anonymous_id": user.anonymous_id,
        "message": message,
    })))
}

async fn users_stats(State(state): State<AppState>) -> Result<Json<Value>, ChatError> {
    let stats = state.chat.stats()?;
    Ok(Json(json!({
        "success": true,
        "total_users": stats.total_users,
        "total_chats": stats.total_chats,
        "total_messages": stats.total_messages,
        "timestamp": chrono::Utc::now(),
    })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
        "components": {
            "spaces": state.spaces.status(),
            "programs": state.programs.status(),
            "llm": state.chat.llm_provider(),
        },
    }))
}
