use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hyper::Server;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::documents_use_case::{DocumentsUseCase, NewRevision, NewVvDoc, VvDocUpdate};
use crate::app::projects_use_case::{NewProject, ProjectsUseCase};
use crate::app::verification_use_case::{NewUser, VerificationReport, VerificationUseCase};
use crate::common::error::RevizeError;
use crate::domain::{Project, Revision, User, VvDoc};
use crate::numbering::EvidenceNumberGenerator;
use crate::observability;
use crate::registry::RegistryMatcher;
use crate::storage::Storage;

/// Header carrying the id of the already authenticated caller.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<ProjectsUseCase>,
    pub documents: Arc<DocumentsUseCase>,
    pub verification: Arc<VerificationUseCase>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, matcher: RegistryMatcher, max_number_attempts: u32) -> Self {
        let numbers = EvidenceNumberGenerator::new(storage.clone(), max_number_attempts);
        Self {
            projects: Arc::new(ProjectsUseCase::new(storage.clone())),
            documents: Arc::new(DocumentsUseCase::new(storage.clone(), numbers)),
            verification: Arc::new(VerificationUseCase::new(storage, matcher)),
        }
    }
}

/// JSON error body `{"detail": ...}` with the matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            detail: "missing or invalid X-User-Id header".to_string(),
        }
    }
}

impl From<RevizeError> for ApiError {
    fn from(err: RevizeError) -> Self {
        let status = match &err {
            RevizeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RevizeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RevizeError::NotFound(_) => StatusCode::NOT_FOUND,
            RevizeError::Forbidden(_) => StatusCode::FORBIDDEN,
            RevizeError::Conflict(_) | RevizeError::SequenceConflict { .. } => StatusCode::CONFLICT,
            RevizeError::SequenceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &err {
            RevizeError::Validation(msg)
            | RevizeError::BadRequest(msg)
            | RevizeError::Forbidden(msg)
            | RevizeError::Conflict(msg) => msg.clone(),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %err, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self { status, detail }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Caller id taken from the `X-User-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(ActingUser)
            .ok_or_else(ApiError::unauthorized)
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "revize-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        observability::render(),
    )
}

// Projects

async fn create_project(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(body): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.projects.create_project(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.list_projects(user_id).await?))
}

async fn get_project(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.get_project(user_id, project_id).await?))
}

// Verification protocols

async fn create_vv(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(body): Json<NewVvDoc>,
) -> ApiResult<(StatusCode, Json<VvDoc>)> {
    let doc = state.documents.create_vv(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn get_vv(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<VvDoc>> {
    Ok(Json(state.documents.get_vv(user_id, &id).await?))
}

async fn update_vv(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
    Json(body): Json<VvDocUpdate>,
) -> ApiResult<Json<VvDoc>> {
    Ok(Json(state.documents.update_vv(user_id, &id, body).await?))
}

async fn delete_vv(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.documents.delete_vv(user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_project_vv(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<VvDoc>>> {
    Ok(Json(state.documents.list_vv(user_id, project_id).await?))
}

// Revisions

async fn create_revision(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(body): Json<NewRevision>,
) -> ApiResult<(StatusCode, Json<Revision>)> {
    let revision = state.documents.create_revision(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(revision)))
}

async fn get_revision(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Revision>> {
    Ok(Json(state.documents.get_revision(user_id, id).await?))
}

async fn list_project_revisions(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Revision>>> {
    Ok(Json(state.documents.list_revisions(user_id, project_id).await?))
}

// Admin

async fn create_user(
    State(state): State<AppState>,
    ActingUser(admin_id): ActingUser,
    Json(body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.verification.create_user(admin_id, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn verify_user(
    State(state): State<AppState>,
    ActingUser(admin_id): ActingUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<VerificationReport>> {
    Ok(Json(state.verification.verify_user(admin_id, user_id).await?))
}

/// All API routes with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/:pid", get(get_project))
        .route("/vv", post(create_vv))
        .route("/vv/project/:pid", get(list_project_vv))
        .route("/vv/:id", get(get_vv).put(update_vv).delete(delete_vv))
        .route("/revisions", post(create_revision))
        .route("/revisions/project/:pid", get(list_project_revisions))
        .route("/revisions/:id", get(get_revision))
        .route("/admin/users", post(create_user))
        .route("/admin/users/:uid/verify-rt", post(verify_user))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "HTTP server listening");
    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
