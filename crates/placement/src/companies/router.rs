use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{ApprovalStatus, CompanyDraft, CompanyId, DriveDetails, OfficerId};
use super::gate::GateError;
use super::repository::{CompanyRepository, RepositoryError};
use super::service::{CompanyServiceError, CompanyWorkflowService};

/// Create/update payload. The token may ride in the body when the caller
/// cannot set an `Authorization` header.
#[derive(Debug, Deserialize)]
pub struct CompanyRequest {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(flatten)]
    pub company: CompanyDraft,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub officer_id: String,
    pub assigned_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub updated_by: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub companies: Vec<CompanyDraft>,
    #[serde(default)]
    pub csv: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub officer_id: Option<String>,
}

/// Router builder exposing the company lifecycle endpoints.
pub fn company_router<R>(service: Arc<CompanyWorkflowService<R>>) -> Router
where
    R: CompanyRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/companies",
            post(create_handler::<R>).get(list_handler::<R>),
        )
        .route(
            "/api/v1/companies/{company_id}",
            get(get_handler::<R>).put(update_handler::<R>),
        )
        .route(
            "/api/v1/companies/{company_id}/drive",
            put(drive_handler::<R>),
        )
        .route(
            "/api/v1/companies/{company_id}/assignment",
            post(assign_handler::<R>),
        )
        .route(
            "/api/v1/companies/{company_id}/assignments",
            get(assignments_handler::<R>),
        )
        .route(
            "/api/v1/companies/{company_id}/approval",
            post(approval_handler::<R>),
        )
        .route(
            "/api/v1/companies/{company_id}/validation",
            post(validation_handler::<R>),
        )
        .route(
            "/api/v1/hr-contacts/{email}/company",
            get(hr_lookup_handler::<R>),
        )
        .route("/api/v1/company-imports", post(import_handler::<R>))
        .with_state(service)
}

pub(crate) async fn create_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    headers: HeaderMap,
    Json(request): Json<CompanyRequest>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let token = bearer_token(&headers).or(request.jwt);
    let result =
        run_blocking(move || service.create_company(token.as_deref(), request.company)).await;
    match result {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "company_id": id }))).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let result = run_blocking(move || match query.officer_id {
        Some(officer) => service.list_by_officer(&OfficerId(officer)),
        None => service.list_all(),
    })
    .await;
    respond(result)
}

pub(crate) async fn get_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    respond(run_blocking(move || service.get(&id)).await)
}

pub(crate) async fn update_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CompanyRequest>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    let token = bearer_token(&headers).or(request.jwt);
    let result =
        run_blocking(move || service.update_company(token.as_deref(), &id, request.company)).await;
    respond(result)
}

pub(crate) async fn drive_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
    headers: HeaderMap,
    Json(details): Json<DriveDetails>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    let token = bearer_token(&headers);
    respond(run_blocking(move || service.update_drive(token.as_deref(), &id, details)).await)
}

pub(crate) async fn assign_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AssignmentRequest>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    let token = bearer_token(&headers);
    let result = run_blocking(move || {
        service.assign_to_officer(
            token.as_deref(),
            &id,
            OfficerId(request.officer_id),
            &request.assigned_by,
        )
    })
    .await;
    respond(result)
}

pub(crate) async fn assignments_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    respond(run_blocking(move || service.assignment_history(&id)).await)
}

pub(crate) async fn approval_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ApprovalRequest>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    let token = bearer_token(&headers);
    let result = run_blocking(move || {
        service.set_approval_status(
            token.as_deref(),
            &id,
            request.status,
            &request.notes,
            &request.updated_by,
        )
    })
    .await;
    respond(result)
}

pub(crate) async fn validation_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(company_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let id = CompanyId(company_id);
    let token = bearer_token(&headers);
    respond(run_blocking(move || service.mark_data_validated(token.as_deref(), &id)).await)
}

pub(crate) async fn hr_lookup_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    Path(email): Path<String>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    respond(run_blocking(move || service.get_by_hr_email(&email)).await)
}

pub(crate) async fn import_handler<R>(
    State(service): State<Arc<CompanyWorkflowService<R>>>,
    headers: HeaderMap,
    Json(request): Json<ImportRequest>,
) -> Response
where
    R: CompanyRepository + 'static,
{
    let ImportRequest { companies, csv } = request;
    let token = bearer_token(&headers);
    respond(
        run_blocking(move || match csv {
            Some(csv) => service.import_sheet(token.as_deref(), Cursor::new(csv), companies),
            None => service.import_batch(token.as_deref(), companies),
        })
        .await,
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Runs a store-bound service call on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, Response>
where
    F: FnOnce() -> Result<T, CompanyServiceError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(error_response(err)),
        Err(join_error) => {
            error!(error = %join_error, "company task aborted");
            let payload = json!({ "error": "request aborted" });
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response())
        }
    }
}

fn respond<T: serde::Serialize>(result: Result<T, Response>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(response) => response,
    }
}

pub(crate) fn error_response(error: CompanyServiceError) -> Response {
    let status = match &error {
        CompanyServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CompanyServiceError::Import(_) => StatusCode::BAD_REQUEST,
        CompanyServiceError::Authorization(GateError::InvalidToken(_)) => {
            StatusCode::UNAUTHORIZED
        }
        CompanyServiceError::Authorization(GateError::PermissionDenied { .. }) => {
            StatusCode::FORBIDDEN
        }
        CompanyServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        CompanyServiceError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        CompanyServiceError::Repository(RepositoryError::Persistence(_)) => {
            error!(error = %error, "company store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
