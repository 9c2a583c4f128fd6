use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::Request;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::compliance::clock::FixedClock;
use crate::compliance::domain::{
    Assignment, AvsDocument, DocumentDates, DocumentId, Project, ProjectAccess, ProjectId,
    Subcontractor, SubcontractorId, UserId, ValidityStatus,
};
use crate::compliance::memory::{MemoryBlobStore, MemoryComplianceRepository};
use crate::compliance::repository::{
    BlobError, BlobStore, ComplianceRepository, RepositoryError, StoredBlob,
};
use crate::compliance::router::USER_HEADER;
use crate::compliance::service::ComplianceService;
use crate::compliance::storage::UrlSigner;
use crate::config::{ComplianceConfig, StorageConfig};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Reference day for every service scenario.
pub(super) fn today() -> NaiveDate {
    date(2026, 2, 20)
}

pub(super) fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::on(today()))
}

pub(super) fn storage_config() -> StorageConfig {
    StorageConfig {
        base_url: "https://files.test".to_string(),
        signing_secret: "test-secret".to_string(),
        signed_url_ttl_secs: 3600,
    }
}

pub(super) fn blob_store() -> MemoryBlobStore {
    let config = storage_config();
    MemoryBlobStore::with_clock(
        UrlSigner::new(config.base_url, config.signing_secret),
        clock(),
    )
}

pub(super) type MemoryService = ComplianceService<MemoryComplianceRepository, MemoryBlobStore>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<MemoryComplianceRepository>,
    Arc<MemoryBlobStore>,
) {
    let repository = Arc::new(MemoryComplianceRepository::default());
    let blobs = Arc::new(blob_store());
    let service = service_with(repository.clone(), blobs.clone());
    (service, repository, blobs)
}

pub(super) fn service_with<R, B>(repository: Arc<R>, blobs: Arc<B>) -> ComplianceService<R, B>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    ComplianceService::with_clock(
        repository,
        blobs,
        ComplianceConfig::default(),
        &storage_config(),
        clock(),
    )
}

pub(super) fn user() -> UserId {
    UserId(uuid::Uuid::from_u128(0x5eed_0000_0000_0000_0000_0000_0000_0001))
}

pub(super) fn with_user(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(USER_HEADER, user().to_string())
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<axum::body::Body> {
    with_user(Request::builder().method(method).uri(uri))
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&body).expect("serialize body"),
        ))
        .expect("build request")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<axum::body::Body> {
    with_user(Request::builder().method(method).uri(uri))
        .body(axum::body::Body::empty())
        .expect("build request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Blob store whose deletes always fail; everything else succeeds.
#[derive(Default)]
pub(super) struct StickyBlobStore {
    pub(super) delete_attempts: Mutex<Vec<String>>,
}

impl StickyBlobStore {
    pub(super) fn attempts(&self) -> Vec<String> {
        self.delete_attempts
            .lock()
            .expect("attempts mutex poisoned")
            .clone()
    }
}

impl BlobStore for StickyBlobStore {
    fn put(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<(), BlobError> {
        Ok(())
    }

    fn get(&self, key: &str) -> Result<StoredBlob, BlobError> {
        Err(BlobError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.delete_attempts
            .lock()
            .expect("attempts mutex poisoned")
            .push(key.to_string());
        Err(BlobError::Transport("bucket unreachable".to_string()))
    }

    fn signed_url(&self, _key: &str, _ttl: Duration) -> Result<String, BlobError> {
        Err(BlobError::Transport("bucket unreachable".to_string()))
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ComplianceRepository for UnavailableRepository {
    fn insert_subcontractor(&self, _subcontractor: Subcontractor) -> Result<(), RepositoryError> {
        offline()
    }

    fn fetch_subcontractor(
        &self,
        _id: SubcontractorId,
    ) -> Result<Option<Subcontractor>, RepositoryError> {
        offline()
    }

    fn list_subcontractors(&self) -> Result<Vec<Subcontractor>, RepositoryError> {
        offline()
    }

    fn delete_subcontractor(&self, _id: SubcontractorId) -> Result<Vec<String>, RepositoryError> {
        offline()
    }

    fn insert_project(
        &self,
        _project: Project,
        _access: ProjectAccess,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn projects_for_user(&self, _user_id: UserId) -> Result<Vec<Project>, RepositoryError> {
        offline()
    }

    fn has_project_access(
        &self,
        _project_id: ProjectId,
        _user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        offline()
    }

    fn delete_project(&self, _id: ProjectId) -> Result<(), RepositoryError> {
        offline()
    }

    fn assign(&self, _assignment: Assignment) -> Result<(), RepositoryError> {
        offline()
    }

    fn unassign(&self, _assignment: Assignment) -> Result<(), RepositoryError> {
        offline()
    }

    fn assignments_for_projects(
        &self,
        _project_ids: &[ProjectId],
    ) -> Result<Vec<Assignment>, RepositoryError> {
        offline()
    }

    fn insert_document(&self, _document: AvsDocument) -> Result<(), RepositoryError> {
        offline()
    }

    fn fetch_document(&self, _id: DocumentId) -> Result<Option<AvsDocument>, RepositoryError> {
        offline()
    }

    fn documents_for_subcontractor(
        &self,
        _id: SubcontractorId,
        _include_archived: bool,
    ) -> Result<Vec<AvsDocument>, RepositoryError> {
        offline()
    }

    fn non_archived_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError> {
        offline()
    }

    fn alertable_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError> {
        offline()
    }

    fn subcontractors_with_valid_document(
        &self,
    ) -> Result<HashSet<SubcontractorId>, RepositoryError> {
        offline()
    }

    fn update_document_dates(
        &self,
        _id: DocumentId,
        _dates: DocumentDates,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn update_document_status(
        &self,
        _id: DocumentId,
        _expected_valid_until: Option<NaiveDate>,
        _status: Option<ValidityStatus>,
    ) -> Result<bool, RepositoryError> {
        offline()
    }

    fn update_document_file(
        &self,
        _id: DocumentId,
        _file_key: String,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn set_document_archived(
        &self,
        _id: DocumentId,
        _archived_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete_document(&self, _id: DocumentId) -> Result<Option<String>, RepositoryError> {
        offline()
    }
}

type Edit = Box<dyn FnOnce(&MemoryComplianceRepository) -> Result<(), RepositoryError> + Send>;

/// Memory repository that applies one queued edit right after handing out the
/// non-archived snapshot, the way a request racing the status sweep would.
#[derive(Default)]
pub(super) struct EditingRepository {
    pub(super) inner: MemoryComplianceRepository,
    pending: Mutex<Option<Edit>>,
}

impl EditingRepository {
    pub(super) fn edit_after_snapshot<F>(&self, edit: F)
    where
        F: FnOnce(&MemoryComplianceRepository) -> Result<(), RepositoryError> + Send + 'static,
    {
        *self.pending.lock().expect("edit mutex poisoned") = Some(Box::new(edit));
    }
}

impl ComplianceRepository for EditingRepository {
    fn insert_subcontractor(&self, subcontractor: Subcontractor) -> Result<(), RepositoryError> {
        self.inner.insert_subcontractor(subcontractor)
    }

    fn fetch_subcontractor(
        &self,
        id: SubcontractorId,
    ) -> Result<Option<Subcontractor>, RepositoryError> {
        self.inner.fetch_subcontractor(id)
    }

    fn list_subcontractors(&self) -> Result<Vec<Subcontractor>, RepositoryError> {
        self.inner.list_subcontractors()
    }

    fn delete_subcontractor(&self, id: SubcontractorId) -> Result<Vec<String>, RepositoryError> {
        self.inner.delete_subcontractor(id)
    }

    fn insert_project(
        &self,
        project: Project,
        access: ProjectAccess,
    ) -> Result<(), RepositoryError> {
        self.inner.insert_project(project, access)
    }

    fn projects_for_user(&self, user_id: UserId) -> Result<Vec<Project>, RepositoryError> {
        self.inner.projects_for_user(user_id)
    }

    fn has_project_access(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        self.inner.has_project_access(project_id, user_id)
    }

    fn delete_project(&self, id: ProjectId) -> Result<(), RepositoryError> {
        self.inner.delete_project(id)
    }

    fn assign(&self, assignment: Assignment) -> Result<(), RepositoryError> {
        self.inner.assign(assignment)
    }

    fn unassign(&self, assignment: Assignment) -> Result<(), RepositoryError> {
        self.inner.unassign(assignment)
    }

    fn assignments_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Assignment>, RepositoryError> {
        self.inner.assignments_for_projects(project_ids)
    }

    fn insert_document(&self, document: AvsDocument) -> Result<(), RepositoryError> {
        self.inner.insert_document(document)
    }

    fn fetch_document(&self, id: DocumentId) -> Result<Option<AvsDocument>, RepositoryError> {
        self.inner.fetch_document(id)
    }

    fn documents_for_subcontractor(
        &self,
        id: SubcontractorId,
        include_archived: bool,
    ) -> Result<Vec<AvsDocument>, RepositoryError> {
        self.inner.documents_for_subcontractor(id, include_archived)
    }

    fn non_archived_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError> {
        let snapshot = self.inner.non_archived_documents()?;
        let edit = self.pending.lock().expect("edit mutex poisoned").take();
        if let Some(edit) = edit {
            edit(&self.inner)?;
        }
        Ok(snapshot)
    }

    fn alertable_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError> {
        self.inner.alertable_documents()
    }

    fn subcontractors_with_valid_document(
        &self,
    ) -> Result<HashSet<SubcontractorId>, RepositoryError> {
        self.inner.subcontractors_with_valid_document()
    }

    fn update_document_dates(
        &self,
        id: DocumentId,
        dates: DocumentDates,
    ) -> Result<(), RepositoryError> {
        self.inner.update_document_dates(id, dates)
    }

    fn update_document_status(
        &self,
        id: DocumentId,
        expected_valid_until: Option<NaiveDate>,
        status: Option<ValidityStatus>,
    ) -> Result<bool, RepositoryError> {
        self.inner.update_document_status(id, expected_valid_until, status)
    }

    fn update_document_file(
        &self,
        id: DocumentId,
        file_key: String,
    ) -> Result<(), RepositoryError> {
        self.inner.update_document_file(id, file_key)
    }

    fn set_document_archived(
        &self,
        id: DocumentId,
        archived_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        self.inner.set_document_archived(id, archived_at)
    }

    fn delete_document(&self, id: DocumentId) -> Result<Option<String>, RepositoryError> {
        self.inner.delete_document(id)
    }
}
