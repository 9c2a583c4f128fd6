use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{DocumentId, ProjectId, SubcontractorId, UserId};
use super::repository::{BlobError, BlobStore, ComplianceRepository, RepositoryError};
use super::service::{ComplianceService, ComplianceServiceError, DocumentUpdate, NewDocument};

/// Header carrying the identity resolved by the session layer in front of the service.
pub const USER_HEADER: &str = "x-user-id";

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

type SharedService<R, B> = Arc<ComplianceService<R, B>>;

/// Router builder exposing subcontractor, document, project, and dashboard endpoints.
pub fn compliance_router<R, B>(service: SharedService<R, B>) -> Router
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/subs",
            get(list_subs_handler::<R, B>).post(create_sub_handler::<R, B>),
        )
        .route(
            "/api/v1/subs/:sub_id",
            get(sub_detail_handler::<R, B>).delete(delete_sub_handler::<R, B>),
        )
        .route(
            "/api/v1/subs/:sub_id/documents",
            post(add_document_handler::<R, B>),
        )
        .route(
            "/api/v1/subs/:sub_id/files",
            put(upload_handler::<R, B>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/v1/documents/:document_id",
            put(update_document_handler::<R, B>).delete(delete_document_handler::<R, B>),
        )
        .route(
            "/api/v1/documents/:document_id/file",
            put(replace_file_handler::<R, B>),
        )
        .route(
            "/api/v1/documents/:document_id/archive",
            post(archive_handler::<R, B>),
        )
        .route(
            "/api/v1/documents/:document_id/unarchive",
            post(unarchive_handler::<R, B>),
        )
        .route("/api/v1/download", get(download_handler::<R, B>))
        .route(
            "/api/v1/projects",
            get(list_projects_handler::<R, B>).post(create_project_handler::<R, B>),
        )
        .route(
            "/api/v1/projects/:project_id",
            axum::routing::delete(delete_project_handler::<R, B>),
        )
        .route(
            "/api/v1/projects/:project_id/subs/:sub_id",
            put(assign_handler::<R, B>).delete(unassign_handler::<R, B>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<R, B>))
        .route(
            "/api/v1/compliance/reevaluate",
            post(reevaluate_handler::<R, B>),
        )
        .with_state(service)
}

/// Resolve the caller; requests without a well-formed identity are rejected.
pub(crate) fn current_user(headers: &HeaderMap) -> Result<UserId, ComplianceServiceError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .map(UserId)
        .ok_or(ComplianceServiceError::Unauthorized)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSubRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) project_ids: Vec<ProjectId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateProjectRequest {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplaceFileRequest {
    pub(crate) file_key: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DetailQuery {
    #[serde(default)]
    pub(crate) include_archived: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    pub(crate) filename: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadQuery {
    pub(crate) key: String,
}

pub(crate) async fn list_subs_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let subs = service.list_subcontractors()?;
    Ok(Json(subs).into_response())
}

pub(crate) async fn create_sub_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Json(request): Json<CreateSubRequest>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let sub = service.create_subcontractor(&request.name, &request.project_ids)?;
    Ok((StatusCode::CREATED, Json(sub)).into_response())
}

pub(crate) async fn sub_detail_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(sub_id): Path<Uuid>,
    Query(query): Query<DetailQuery>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let detail = service.subcontractor_detail(SubcontractorId(sub_id), query.include_archived)?;
    Ok(Json(detail).into_response())
}

pub(crate) async fn delete_sub_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(sub_id): Path<Uuid>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    service.delete_subcontractor(SubcontractorId(sub_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn add_document_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(sub_id): Path<Uuid>,
    Json(input): Json<NewDocument>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let document = service.add_document(SubcontractorId(sub_id), input)?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

pub(crate) async fn upload_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(sub_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let key = service.upload_file(
        SubcontractorId(sub_id),
        &query.filename,
        content_type,
        body.to_vec(),
    )?;
    Ok((StatusCode::CREATED, Json(json!({ "key": key }))).into_response())
}

pub(crate) async fn update_document_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
    Json(update): Json<DocumentUpdate>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let document = service.update_document(DocumentId(document_id), update)?;
    Ok(Json(document).into_response())
}

pub(crate) async fn replace_file_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
    Json(request): Json<ReplaceFileRequest>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let document = service.replace_document_file(DocumentId(document_id), request.file_key)?;
    Ok(Json(document).into_response())
}

pub(crate) async fn archive_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let document = service.archive_document(DocumentId(document_id))?;
    Ok(Json(document).into_response())
}

pub(crate) async fn unarchive_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let document = service.unarchive_document(DocumentId(document_id))?;
    Ok(Json(document).into_response())
}

pub(crate) async fn delete_document_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    service.delete_document(DocumentId(document_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn download_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let url = service.download_url(&query.key)?;
    Ok(Json(json!({ "url": url })).into_response())
}

pub(crate) async fn list_projects_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    let user = current_user(&headers)?;
    let projects = service.list_projects(user)?;
    Ok(Json(projects).into_response())
}

pub(crate) async fn create_project_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Json(request): Json<CreateProjectRequest>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    let user = current_user(&headers)?;
    let project = service.create_project(user, &request.name)?;
    Ok((StatusCode::CREATED, Json(project)).into_response())
}

pub(crate) async fn delete_project_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    let user = current_user(&headers)?;
    service.delete_project(user, ProjectId(project_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn assign_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path((project_id, sub_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    service.assign_subcontractor(ProjectId(project_id), SubcontractorId(sub_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn unassign_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Path((project_id, sub_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    service.unassign_subcontractor(ProjectId(project_id), SubcontractorId(sub_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn dashboard_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    let user = current_user(&headers)?;
    let dashboard = service.dashboard(user)?;
    Ok(Json(dashboard).into_response())
}

pub(crate) async fn reevaluate_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
) -> Result<Response, ComplianceServiceError>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    current_user(&headers)?;
    let report = service.reevaluate()?;
    Ok(Json(report).into_response())
}

impl IntoResponse for ComplianceServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ComplianceServiceError::NotFound(_)
            | ComplianceServiceError::Repository(RepositoryError::NotFound)
            | ComplianceServiceError::Blob(BlobError::NotFound(_)) => StatusCode::NOT_FOUND,
            ComplianceServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ComplianceServiceError::Validation(_)
            | ComplianceServiceError::Blob(BlobError::InvalidKey(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ComplianceServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            ComplianceServiceError::Repository(RepositoryError::Unavailable(_))
            | ComplianceServiceError::Blob(BlobError::Transport(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}
