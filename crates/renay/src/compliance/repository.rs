use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    Assignment, AvsDocument, DocumentDates, DocumentId, Project, ProjectAccess, ProjectId,
    Subcontractor, SubcontractorId, UserId, ValidityStatus,
};

/// Storage abstraction over subcontractors, projects, assignments, and AVS documents.
pub trait ComplianceRepository: Send + Sync {
    fn insert_subcontractor(&self, subcontractor: Subcontractor) -> Result<(), RepositoryError>;
    fn fetch_subcontractor(
        &self,
        id: SubcontractorId,
    ) -> Result<Option<Subcontractor>, RepositoryError>;
    fn list_subcontractors(&self) -> Result<Vec<Subcontractor>, RepositoryError>;
    /// Removes the subcontractor together with its documents and assignments, returning the
    /// file keys of the removed documents.
    fn delete_subcontractor(&self, id: SubcontractorId) -> Result<Vec<String>, RepositoryError>;

    fn insert_project(&self, project: Project, access: ProjectAccess)
        -> Result<(), RepositoryError>;
    fn projects_for_user(&self, user_id: UserId) -> Result<Vec<Project>, RepositoryError>;
    fn has_project_access(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;
    fn delete_project(&self, id: ProjectId) -> Result<(), RepositoryError>;

    fn assign(&self, assignment: Assignment) -> Result<(), RepositoryError>;
    fn unassign(&self, assignment: Assignment) -> Result<(), RepositoryError>;
    fn assignments_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Assignment>, RepositoryError>;

    fn insert_document(&self, document: AvsDocument) -> Result<(), RepositoryError>;
    fn fetch_document(&self, id: DocumentId) -> Result<Option<AvsDocument>, RepositoryError>;
    /// Ordered by `valid_until` descending (undated last), then `created_at` descending.
    fn documents_for_subcontractor(
        &self,
        id: SubcontractorId,
        include_archived: bool,
    ) -> Result<Vec<AvsDocument>, RepositoryError>;
    fn non_archived_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError>;
    /// Non-archived documents whose stored status is expired or expiring soon.
    ///
    /// The dashboard reads every non-archived document because it also reports subcontractors
    /// with nothing on file. This is the indexed query a persistence backend exposes to readers
    /// that only want the problem rows, such as reminder mail jobs.
    fn alertable_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError>;
    /// Distinct subcontractors with a non-archived document stored as valid.
    fn subcontractors_with_valid_document(
        &self,
    ) -> Result<HashSet<SubcontractorId>, RepositoryError>;
    /// Overwrites dates, status, and description in a single write.
    fn update_document_dates(
        &self,
        id: DocumentId,
        dates: DocumentDates,
    ) -> Result<(), RepositoryError>;
    /// Stores a re-derived status only while `valid_until` still equals the value it was derived
    /// from. Returns `false` when the row changed in between and nothing was written.
    fn update_document_status(
        &self,
        id: DocumentId,
        expected_valid_until: Option<NaiveDate>,
        status: Option<ValidityStatus>,
    ) -> Result<bool, RepositoryError>;
    fn update_document_file(&self, id: DocumentId, file_key: String)
        -> Result<(), RepositoryError>;
    fn set_document_archived(
        &self,
        id: DocumentId,
        archived_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;
    /// Removes the row and hands back the file key it referenced.
    fn delete_document(&self, id: DocumentId) -> Result<Option<String>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Object storage holding uploaded AVS files.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError>;
    fn get(&self, key: &str) -> Result<StoredBlob, BlobError>;
    fn delete(&self, key: &str) -> Result<(), BlobError>;
    /// Time-limited read URL so clients never see storage credentials.
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("blob store unavailable: {0}")]
    Transport(String),
}
