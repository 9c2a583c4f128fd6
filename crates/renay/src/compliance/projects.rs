use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::domain::{Assignment, AvsDocument, Project, ProjectId, SubcontractorId};

/// How many of a project's subcontractors currently hold a valid document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCompliance {
    pub project_id: ProjectId,
    pub total_subs: usize,
    pub compliant_subs: usize,
}

impl ProjectCompliance {
    pub fn is_fully_compliant(&self) -> bool {
        self.total_subs > 0 && self.compliant_subs == self.total_subs
    }

    pub fn summary(&self) -> String {
        if self.total_subs == 0 {
            "No subs assigned".to_string()
        } else if self.is_fully_compliant() {
            format!("All {} subs compliant", self.total_subs)
        } else {
            format!("{}/{} compliant subs", self.compliant_subs, self.total_subs)
        }
    }
}

/// Subcontractors holding at least one non-archived document classified as valid.
pub fn valid_subcontractor_ids(documents: &[AvsDocument]) -> HashSet<SubcontractorId> {
    documents
        .iter()
        .filter(|document| document.is_currently_valid())
        .map(|document| document.subcontractor_id)
        .collect()
}

/// One entry per project, in project order. Duplicate assignments count once.
pub fn compute_compliance(
    projects: &[Project],
    assignments: &[Assignment],
    valid_sub_ids: &HashSet<SubcontractorId>,
) -> Vec<ProjectCompliance> {
    let mut assigned: HashMap<ProjectId, BTreeSet<SubcontractorId>> = HashMap::new();
    for assignment in assignments {
        assigned
            .entry(assignment.project_id)
            .or_default()
            .insert(assignment.subcontractor_id);
    }

    projects
        .iter()
        .map(|project| {
            let subs = assigned.get(&project.id);
            let total_subs = subs.map_or(0, BTreeSet::len);
            let compliant_subs = subs.map_or(0, |subs| {
                subs.iter().filter(|id| valid_sub_ids.contains(*id)).count()
            });

            ProjectCompliance {
                project_id: project.id,
                total_subs,
                compliant_subs,
            }
        })
        .collect()
}
