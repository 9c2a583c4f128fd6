//! AVS document validity, dashboard alerts, and project compliance.
//!
//! Documents flow one way through the engine: the validity classifier turns a document's
//! `valid_until` into a status, the alert aggregator turns statuses into per-subcontractor
//! alerts, and the project aggregator turns "holds a valid document" into compliance ratios.
//! The pure pieces live in [`validity`], [`alerts`], and [`projects`]; [`service`] persists
//! the derived status and wires the engine to the repository and blob store seams.

pub mod alerts;
pub mod clock;
pub mod domain;
pub mod memory;
pub mod projects;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;
pub mod validity;

#[cfg(test)]
mod tests;

pub use alerts::{build_alerts, AlertEvent, AlertKind};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    status_label, Assignment, AvsDocument, DocumentDates, DocumentId, Project, ProjectAccess,
    ProjectId, Subcontractor, SubcontractorId, UserId, ValidityStatus,
};
pub use memory::{MemoryBlobStore, MemoryComplianceRepository};
pub use projects::{compute_compliance, valid_subcontractor_ids, ProjectCompliance};
pub use repository::{BlobError, BlobStore, ComplianceRepository, RepositoryError, StoredBlob};
pub use router::{compliance_router, USER_HEADER};
pub use service::{
    ComplianceService, ComplianceServiceError, Dashboard, DocumentUpdate, DocumentView,
    NewDocument, ProjectOverview, ReevaluationReport, StatusChange, SubcontractorDetail,
};
pub use storage::{SignatureError, UrlSigner};
pub use validity::{classify, WarningWindow};
