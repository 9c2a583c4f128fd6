//! Process-local collaborators backing the demo server, CLI, and tests.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use super::clock::{Clock, SystemClock};
use super::domain::{
    Assignment, AvsDocument, DocumentDates, DocumentId, Project, ProjectAccess, ProjectId,
    Subcontractor, SubcontractorId, UserId, ValidityStatus,
};
use super::repository::{
    BlobError, BlobStore, ComplianceRepository, RepositoryError, StoredBlob,
};
use super::storage::{validate_key, SignatureError, UrlSigner};

#[derive(Debug, Default)]
struct Tables {
    subcontractors: Vec<Subcontractor>,
    projects: Vec<Project>,
    access: HashSet<ProjectAccess>,
    assignments: Vec<Assignment>,
    documents: Vec<AvsDocument>,
}

impl Tables {
    fn document_mut(&mut self, id: DocumentId) -> Result<&mut AvsDocument, RepositoryError> {
        self.documents
            .iter_mut()
            .find(|document| document.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn has_subcontractor(&self, id: SubcontractorId) -> bool {
        self.subcontractors.iter().any(|sub| sub.id == id)
    }
}

/// Relational store kept in memory, with the cascade rules of the real schema.
#[derive(Debug, Default, Clone)]
pub struct MemoryComplianceRepository {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryComplianceRepository {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ComplianceRepository for MemoryComplianceRepository {
    fn insert_subcontractor(&self, subcontractor: Subcontractor) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.has_subcontractor(subcontractor.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.subcontractors.push(subcontractor);
        Ok(())
    }

    fn fetch_subcontractor(
        &self,
        id: SubcontractorId,
    ) -> Result<Option<Subcontractor>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.subcontractors.iter().find(|sub| sub.id == id).cloned())
    }

    fn list_subcontractors(&self) -> Result<Vec<Subcontractor>, RepositoryError> {
        Ok(self.tables()?.subcontractors.clone())
    }

    fn delete_subcontractor(&self, id: SubcontractorId) -> Result<Vec<String>, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.has_subcontractor(id) {
            return Err(RepositoryError::NotFound);
        }

        tables.subcontractors.retain(|sub| sub.id != id);
        tables
            .assignments
            .retain(|assignment| assignment.subcontractor_id != id);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut tables.documents)
            .into_iter()
            .partition(|document| document.subcontractor_id == id);
        tables.documents = kept;

        Ok(removed
            .into_iter()
            .filter_map(|document| document.file_key)
            .collect())
    }

    fn insert_project(
        &self,
        project: Project,
        access: ProjectAccess,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.projects.iter().any(|existing| existing.id == project.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.projects.push(project);
        tables.access.insert(access);
        Ok(())
    }

    fn projects_for_user(&self, user_id: UserId) -> Result<Vec<Project>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .projects
            .iter()
            .filter(|project| {
                tables.access.contains(&ProjectAccess {
                    project_id: project.id,
                    user_id,
                })
            })
            .cloned()
            .collect())
    }

    fn has_project_access(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.tables()?.access.contains(&ProjectAccess {
            project_id,
            user_id,
        }))
    }

    fn delete_project(&self, id: ProjectId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.projects.len();
        tables.projects.retain(|project| project.id != id);
        if tables.projects.len() == before {
            return Err(RepositoryError::NotFound);
        }
        tables.access.retain(|access| access.project_id != id);
        tables
            .assignments
            .retain(|assignment| assignment.project_id != id);
        Ok(())
    }

    fn assign(&self, assignment: Assignment) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let project_exists = tables
            .projects
            .iter()
            .any(|project| project.id == assignment.project_id);
        if !project_exists || !tables.has_subcontractor(assignment.subcontractor_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.assignments.contains(&assignment) {
            return Err(RepositoryError::Conflict);
        }
        tables.assignments.push(assignment);
        Ok(())
    }

    fn unassign(&self, assignment: Assignment) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.assignments.len();
        tables.assignments.retain(|existing| *existing != assignment);
        if tables.assignments.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn assignments_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .assignments
            .iter()
            .filter(|assignment| project_ids.contains(&assignment.project_id))
            .copied()
            .collect())
    }

    fn insert_document(&self, document: AvsDocument) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.has_subcontractor(document.subcontractor_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.documents.iter().any(|existing| existing.id == document.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.documents.push(document);
        Ok(())
    }

    fn fetch_document(&self, id: DocumentId) -> Result<Option<AvsDocument>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .documents
            .iter()
            .find(|document| document.id == id)
            .cloned())
    }

    fn documents_for_subcontractor(
        &self,
        id: SubcontractorId,
        include_archived: bool,
    ) -> Result<Vec<AvsDocument>, RepositoryError> {
        let tables = self.tables()?;
        let mut documents: Vec<_> = tables
            .documents
            .iter()
            .filter(|document| document.subcontractor_id == id)
            .filter(|document| include_archived || !document.is_archived())
            .cloned()
            .collect();
        // `Option` orders `None` first, so reversing puts undated documents last.
        documents.sort_by_key(|document| {
            (Reverse(document.valid_until), Reverse(document.created_at))
        });
        Ok(documents)
    }

    fn non_archived_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .documents
            .iter()
            .filter(|document| !document.is_archived())
            .cloned()
            .collect())
    }

    fn alertable_documents(&self) -> Result<Vec<AvsDocument>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .documents
            .iter()
            .filter(|document| document.is_alertable())
            .cloned()
            .collect())
    }

    fn subcontractors_with_valid_document(
        &self,
    ) -> Result<HashSet<SubcontractorId>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .documents
            .iter()
            .filter(|document| document.is_currently_valid())
            .map(|document| document.subcontractor_id)
            .collect())
    }

    fn update_document_dates(
        &self,
        id: DocumentId,
        dates: DocumentDates,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let document = tables.document_mut(id)?;
        document.valid_from = dates.valid_from;
        document.valid_until = dates.valid_until;
        document.validity_status = dates.validity_status;
        document.description = dates.description;
        Ok(())
    }

    fn update_document_status(
        &self,
        id: DocumentId,
        expected_valid_until: Option<NaiveDate>,
        status: Option<ValidityStatus>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let document = tables.document_mut(id)?;
        if document.valid_until != expected_valid_until {
            return Ok(false);
        }
        document.validity_status = status;
        Ok(true)
    }

    fn update_document_file(
        &self,
        id: DocumentId,
        file_key: String,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables.document_mut(id)?.file_key = Some(file_key);
        Ok(())
    }

    fn set_document_archived(
        &self,
        id: DocumentId,
        archived_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables.document_mut(id)?.archived_at = archived_at;
        Ok(())
    }

    fn delete_document(&self, id: DocumentId) -> Result<Option<String>, RepositoryError> {
        let mut tables = self.tables()?;
        let position = tables
            .documents
            .iter()
            .position(|document| document.id == id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(tables.documents.remove(position).file_key)
    }
}

/// Object map with HMAC signed download URLs.
#[derive(Clone)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, StoredBlob>>>,
    signer: UrlSigner,
    clock: Arc<dyn Clock>,
}

impl MemoryBlobStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self::with_clock(signer, Arc::new(SystemClock))
    }

    pub fn with_clock(signer: UrlSigner, clock: Arc<dyn Clock>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            signer,
            clock,
        }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    pub fn keys(&self) -> Result<Vec<String>, BlobError> {
        let mut keys: Vec<_> = self.objects()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Check a signed download link against this store's clock.
    pub fn verify_signed(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), SignatureError> {
        self.signer.verify(key, expires, signature, self.clock.now())
    }

    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, StoredBlob>>, BlobError> {
        self.objects
            .lock()
            .map_err(|_| BlobError::Transport("blob store mutex poisoned".to_string()))
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        if !validate_key(key) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        self.objects()?.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<StoredBlob, BlobError> {
        self.objects()?
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.objects()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        if !validate_key(key) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.signer.sign(key, self.clock.now(), ttl))
    }
}
