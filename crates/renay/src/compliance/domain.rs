use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered subcontractor.
    SubcontractorId
);
uuid_id!(
    /// Identifier of a general contractor project.
    ProjectId
);
uuid_id!(
    /// Identifier of a single AVS document.
    DocumentId
);
uuid_id!(
    /// Opaque identity handed over by the session provider.
    UserId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcontractor {
    pub id: SubcontractorId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Many-to-many link between a project and a subcontractor working on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub project_id: ProjectId,
    pub subcontractor_id: SubcontractorId,
}

/// Grants a user visibility of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectAccess {
    pub project_id: ProjectId,
    pub user_id: UserId,
}

/// Cached classification of a document's `valid_until` against the warning window.
///
/// The unset state (no `valid_until`) is carried as `Option::None` next to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    ExpiringSoon,
    Expired,
}

impl ValidityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::ExpiringSoon => "Expiring soon",
            Self::Expired => "Expired",
        }
    }

    pub const fn is_alertable(self) -> bool {
        matches!(self, Self::ExpiringSoon | Self::Expired)
    }
}

/// Display label for a possibly unset status.
pub fn status_label(status: Option<ValidityStatus>) -> &'static str {
    match status {
        Some(status) => status.label(),
        None => "No dates set",
    }
}

/// Compliance artifact held by a subcontractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsDocument {
    pub id: DocumentId,
    pub subcontractor_id: SubcontractorId,
    pub file_key: Option<String>,
    pub description: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub validity_status: Option<ValidityStatus>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AvsDocument {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_alertable(&self) -> bool {
        !self.is_archived() && self.validity_status.is_some_and(ValidityStatus::is_alertable)
    }

    pub fn is_currently_valid(&self) -> bool {
        !self.is_archived() && self.validity_status == Some(ValidityStatus::Valid)
    }
}

/// The columns rewritten together whenever a document's dates change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDates {
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub validity_status: Option<ValidityStatus>,
    pub description: Option<String>,
}
