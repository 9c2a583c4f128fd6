use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::alerts::{build_alerts, AlertEvent};
use super::clock::{Clock, SystemClock};
use super::domain::{
    status_label, Assignment, AvsDocument, DocumentDates, DocumentId, Project, ProjectAccess,
    ProjectId, Subcontractor, SubcontractorId, UserId, ValidityStatus,
};
use super::projects::{compute_compliance, ProjectCompliance};
use super::repository::{BlobError, BlobStore, ComplianceRepository, RepositoryError};
use super::storage::{content_type_for, object_key};
use super::validity::{classify, WarningWindow};
use crate::config::{ComplianceConfig, StorageConfig};

/// Fields accepted when a document is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

/// Replacement values for a document's dates and description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

/// Document as shown to users, with the status re-derived for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: AvsDocument,
    pub current_status: Option<ValidityStatus>,
    pub status_label: &'static str,
    /// The stored status no longer matches today's classification.
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcontractorDetail {
    pub subcontractor: Subcontractor,
    pub documents: Vec<DocumentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    pub project: Project,
    #[serde(flatten)]
    pub compliance: ProjectCompliance,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub project_count: usize,
    pub subcontractor_count: usize,
    pub compliant_projects: usize,
    pub projects: Vec<ProjectOverview>,
    pub alerts: Vec<AlertEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub document_id: DocumentId,
    pub from: Option<ValidityStatus>,
    pub to: Option<ValidityStatus>,
}

/// Outcome of re-classifying stored documents against today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReevaluationReport {
    pub examined: usize,
    pub changes: Vec<StatusChange>,
}

/// Service composing the repository, blob store, and the compliance engine.
pub struct ComplianceService<R, B> {
    repository: Arc<R>,
    blobs: Arc<B>,
    clock: Arc<dyn Clock>,
    warning_window: WarningWindow,
    signed_url_ttl: Duration,
}

impl<R, B> ComplianceService<R, B>
where
    R: ComplianceRepository + 'static,
    B: BlobStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        blobs: Arc<B>,
        compliance: ComplianceConfig,
        storage: &StorageConfig,
    ) -> Self {
        Self::with_clock(repository, blobs, compliance, storage, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        blobs: Arc<B>,
        compliance: ComplianceConfig,
        storage: &StorageConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            blobs,
            clock,
            warning_window: compliance.warning_window,
            signed_url_ttl: Duration::from_secs(storage.signed_url_ttl_secs),
        }
    }

    pub fn warning_window(&self) -> WarningWindow {
        self.warning_window
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Register a subcontractor and attach it to the given projects.
    pub fn create_subcontractor(
        &self,
        name: &str,
        project_ids: &[ProjectId],
    ) -> Result<Subcontractor, ComplianceServiceError> {
        let subcontractor = Subcontractor {
            id: SubcontractorId::new(),
            name: required_name(name, "subcontractor")?,
            created_at: self.clock.now(),
        };
        self.repository.insert_subcontractor(subcontractor.clone())?;

        for project_id in project_ids {
            let assigned = self.repository.assign(Assignment {
                project_id: *project_id,
                subcontractor_id: subcontractor.id,
            });
            if let Err(err) = assigned {
                if let Err(rollback) = self.repository.delete_subcontractor(subcontractor.id) {
                    warn!(
                        subcontractor_id = %subcontractor.id,
                        error = %rollback,
                        "failed to remove partially created subcontractor"
                    );
                }
                return Err(not_found_as("project")(err));
            }
        }

        info!(
            subcontractor_id = %subcontractor.id,
            projects = project_ids.len(),
            "subcontractor created"
        );
        Ok(subcontractor)
    }

    pub fn list_subcontractors(&self) -> Result<Vec<Subcontractor>, ComplianceServiceError> {
        Ok(self.repository.list_subcontractors()?)
    }

    /// Subcontractor with its documents, newest expiry first.
    pub fn subcontractor_detail(
        &self,
        id: SubcontractorId,
        include_archived: bool,
    ) -> Result<SubcontractorDetail, ComplianceServiceError> {
        let subcontractor = self
            .repository
            .fetch_subcontractor(id)?
            .ok_or(ComplianceServiceError::NotFound("subcontractor"))?;
        let today = self.today();
        let documents = self
            .repository
            .documents_for_subcontractor(id, include_archived)?
            .into_iter()
            .map(|document| self.view(document, today))
            .collect();

        Ok(SubcontractorDetail {
            subcontractor,
            documents,
        })
    }

    pub fn delete_subcontractor(&self, id: SubcontractorId) -> Result<(), ComplianceServiceError> {
        let file_keys = self
            .repository
            .delete_subcontractor(id)
            .map_err(not_found_as("subcontractor"))?;
        for key in &file_keys {
            self.discard_blob(key);
        }

        info!(subcontractor_id = %id, files = file_keys.len(), "subcontractor deleted");
        Ok(())
    }

    /// Create a project owned by `user`.
    pub fn create_project(
        &self,
        user: UserId,
        name: &str,
    ) -> Result<Project, ComplianceServiceError> {
        let project = Project {
            id: ProjectId::new(),
            name: required_name(name, "project")?,
            created_at: self.clock.now(),
        };
        self.repository.insert_project(
            project.clone(),
            ProjectAccess {
                project_id: project.id,
                user_id: user,
            },
        )?;

        info!(project_id = %project.id, user_id = %user, "project created");
        Ok(project)
    }

    pub fn list_projects(&self, user: UserId) -> Result<Vec<Project>, ComplianceServiceError> {
        Ok(self.repository.projects_for_user(user)?)
    }

    /// Projects the user cannot see are reported as missing.
    pub fn delete_project(
        &self,
        user: UserId,
        project_id: ProjectId,
    ) -> Result<(), ComplianceServiceError> {
        if !self.repository.has_project_access(project_id, user)? {
            return Err(ComplianceServiceError::NotFound("project"));
        }
        self.repository
            .delete_project(project_id)
            .map_err(not_found_as("project"))?;

        info!(project_id = %project_id, user_id = %user, "project deleted");
        Ok(())
    }

    pub fn assign_subcontractor(
        &self,
        project_id: ProjectId,
        subcontractor_id: SubcontractorId,
    ) -> Result<(), ComplianceServiceError> {
        self.repository
            .assign(Assignment {
                project_id,
                subcontractor_id,
            })
            .map_err(not_found_as("project or subcontractor"))?;
        debug!(%project_id, %subcontractor_id, "subcontractor assigned");
        Ok(())
    }

    pub fn unassign_subcontractor(
        &self,
        project_id: ProjectId,
        subcontractor_id: SubcontractorId,
    ) -> Result<(), ComplianceServiceError> {
        self.repository
            .unassign(Assignment {
                project_id,
                subcontractor_id,
            })
            .map_err(not_found_as("assignment"))?;
        debug!(%project_id, %subcontractor_id, "subcontractor unassigned");
        Ok(())
    }

    pub fn add_document(
        &self,
        subcontractor_id: SubcontractorId,
        input: NewDocument,
    ) -> Result<AvsDocument, ComplianceServiceError> {
        let dates = self.document_dates(input.valid_from, input.valid_until, input.description);
        let document = AvsDocument {
            id: DocumentId::new(),
            subcontractor_id,
            file_key: input.file_key,
            description: dates.description,
            valid_from: dates.valid_from,
            valid_until: dates.valid_until,
            validity_status: dates.validity_status,
            archived_at: None,
            created_at: self.clock.now(),
        };
        self.repository
            .insert_document(document.clone())
            .map_err(not_found_as("subcontractor"))?;

        info!(
            document_id = %document.id,
            subcontractor_id = %subcontractor_id,
            status = status_label(document.validity_status),
            "avs document added"
        );
        Ok(document)
    }

    /// Rewrite dates and description; the status is re-derived in the same write.
    pub fn update_document(
        &self,
        id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<AvsDocument, ComplianceServiceError> {
        let dates = self.document_dates(update.valid_from, update.valid_until, update.description);
        self.write_document_dates(id, dates)?;
        self.fetch_document(id)
    }

    /// Point the document at a new file, discarding the previous object.
    pub fn replace_document_file(
        &self,
        id: DocumentId,
        file_key: String,
    ) -> Result<AvsDocument, ComplianceServiceError> {
        let existing = self.fetch_document(id)?;
        if let Some(old_key) = existing.file_key.as_deref() {
            if old_key != file_key {
                self.discard_blob(old_key);
            }
        }

        self.repository
            .update_document_file(id, file_key)
            .map_err(not_found_as("document"))?;
        self.fetch_document(id)
    }

    pub fn archive_document(&self, id: DocumentId) -> Result<AvsDocument, ComplianceServiceError> {
        self.repository
            .set_document_archived(id, Some(self.clock.now()))
            .map_err(not_found_as("document"))?;
        self.fetch_document(id)
    }

    pub fn unarchive_document(
        &self,
        id: DocumentId,
    ) -> Result<AvsDocument, ComplianceServiceError> {
        self.repository
            .set_document_archived(id, None)
            .map_err(not_found_as("document"))?;
        self.fetch_document(id)
    }

    /// Drop the row first, then the file. A failed file delete only leaves an orphaned object.
    pub fn delete_document(&self, id: DocumentId) -> Result<(), ComplianceServiceError> {
        let file_key = self
            .repository
            .delete_document(id)
            .map_err(not_found_as("document"))?;
        if let Some(key) = file_key.as_deref() {
            self.discard_blob(key);
        }

        info!(document_id = %id, "avs document deleted");
        Ok(())
    }

    /// Store an uploaded file under a fresh key for the subcontractor.
    pub fn upload_file(
        &self,
        subcontractor_id: SubcontractorId,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, ComplianceServiceError> {
        if self
            .repository
            .fetch_subcontractor(subcontractor_id)?
            .is_none()
        {
            return Err(ComplianceServiceError::NotFound("subcontractor"));
        }

        let key = object_key(subcontractor_id, filename);
        let content_type = content_type_for(filename, content_type);
        let size = bytes.len();
        self.blobs.put(&key, bytes, content_type.as_ref())?;

        info!(%key, size, content_type = %content_type, "avs file uploaded");
        Ok(key)
    }

    pub fn download_url(&self, key: &str) -> Result<String, ComplianceServiceError> {
        Ok(self.blobs.signed_url(key, self.signed_url_ttl)?)
    }

    /// Re-classify every non-archived document and persist the statuses that drifted.
    ///
    /// Only the status column is written, and only while `valid_until` still matches the value
    /// read here, so an edit landing mid-sweep is never overwritten.
    pub fn reevaluate(&self) -> Result<ReevaluationReport, ComplianceServiceError> {
        let today = self.today();
        let documents = self.repository.non_archived_documents()?;
        let mut report = ReevaluationReport {
            examined: documents.len(),
            changes: Vec::new(),
        };

        for document in documents {
            let status = self.status_on(today, document.valid_until);
            if status == document.validity_status {
                continue;
            }

            let written = match self.repository.update_document_status(
                document.id,
                document.valid_until,
                status,
            ) {
                Ok(written) => written,
                Err(RepositoryError::NotFound) => false,
                Err(err) => return Err(err.into()),
            };
            if !written {
                debug!(document_id = %document.id, "document changed during sweep; skipped");
                continue;
            }

            report.changes.push(StatusChange {
                document_id: document.id,
                from: document.validity_status,
                to: status,
            });
        }

        debug!(
            examined = report.examined,
            changed = report.changes.len(),
            %today,
            "document statuses re-evaluated"
        );
        Ok(report)
    }

    /// Alerts and per-project compliance for the user's dashboard.
    pub fn dashboard(&self, user: UserId) -> Result<Dashboard, ComplianceServiceError> {
        self.reevaluate()?;

        let subcontractors = self.repository.list_subcontractors()?;
        let documents = self.repository.non_archived_documents()?;
        let alerts = build_alerts(&subcontractors, &documents);

        let projects = self.repository.projects_for_user(user)?;
        let project_ids: Vec<_> = projects.iter().map(|project| project.id).collect();
        let assignments = self.repository.assignments_for_projects(&project_ids)?;
        let valid_sub_ids = self.repository.subcontractors_with_valid_document()?;
        let compliance = compute_compliance(&projects, &assignments, &valid_sub_ids);

        let compliant_projects = compliance
            .iter()
            .filter(|entry| entry.is_fully_compliant())
            .count();
        let projects: Vec<_> = projects
            .into_iter()
            .zip(compliance)
            .map(|(project, compliance)| ProjectOverview {
                summary: compliance.summary(),
                project,
                compliance,
            })
            .collect();

        Ok(Dashboard {
            today: self.today(),
            project_count: projects.len(),
            subcontractor_count: subcontractors.len(),
            compliant_projects,
            projects,
            alerts,
        })
    }

    fn fetch_document(&self, id: DocumentId) -> Result<AvsDocument, ComplianceServiceError> {
        self.repository
            .fetch_document(id)?
            .ok_or(ComplianceServiceError::NotFound("document"))
    }

    fn document_dates(
        &self,
        valid_from: Option<NaiveDate>,
        valid_until: Option<NaiveDate>,
        description: Option<String>,
    ) -> DocumentDates {
        self.document_dates_on(self.today(), valid_from, valid_until, description)
    }

    fn document_dates_on(
        &self,
        today: NaiveDate,
        valid_from: Option<NaiveDate>,
        valid_until: Option<NaiveDate>,
        description: Option<String>,
    ) -> DocumentDates {
        DocumentDates {
            valid_from,
            valid_until,
            validity_status: self.status_on(today, valid_until),
            description: description.and_then(trimmed),
        }
    }

    /// The only place a `validity_status` is derived.
    fn status_on(
        &self,
        today: NaiveDate,
        valid_until: Option<NaiveDate>,
    ) -> Option<ValidityStatus> {
        classify(valid_until, today, self.warning_window)
    }

    fn write_document_dates(
        &self,
        id: DocumentId,
        dates: DocumentDates,
    ) -> Result<(), ComplianceServiceError> {
        let status = dates.validity_status;
        self.repository
            .update_document_dates(id, dates)
            .map_err(not_found_as("document"))?;
        debug!(document_id = %id, status = status_label(status), "document dates written");
        Ok(())
    }

    fn view(&self, document: AvsDocument, today: NaiveDate) -> DocumentView {
        let current_status = self.status_on(today, document.valid_until);
        DocumentView {
            stale: current_status != document.validity_status,
            status_label: status_label(current_status),
            current_status,
            document,
        }
    }

    fn discard_blob(&self, key: &str) {
        if let Err(err) = self.blobs.delete(key) {
            warn!(%key, error = %err, "failed to delete stored file; leaving orphaned object");
        }
    }
}

fn trimmed(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn required_name(raw: &str, entity: &str) -> Result<String, ComplianceServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ComplianceServiceError::Validation(format!(
            "{entity} name must not be empty"
        )));
    }
    Ok(name.to_string())
}

fn not_found_as(entity: &'static str) -> impl Fn(RepositoryError) -> ComplianceServiceError {
    move |err| match err {
        RepositoryError::NotFound => ComplianceServiceError::NotFound(entity),
        other => ComplianceServiceError::Repository(other),
    }
}

/// Error raised by the compliance service.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}
