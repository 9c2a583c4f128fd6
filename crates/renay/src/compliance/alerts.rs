use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{AvsDocument, Subcontractor, SubcontractorId, ValidityStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Expired,
    ExpiringSoon,
    Missing,
}

impl AlertKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Expired => "Expired",
            Self::ExpiringSoon => "Expiring soon",
            Self::Missing => "Missing AVS",
        }
    }

    fn from_status(status: ValidityStatus) -> Option<Self> {
        match status {
            ValidityStatus::Expired => Some(Self::Expired),
            ValidityStatus::ExpiringSoon => Some(Self::ExpiringSoon),
            ValidityStatus::Valid => None,
        }
    }
}

/// Dashboard alert raised for a single subcontractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub subcontractor_id: SubcontractorId,
    pub subcontractor_name: String,
    pub valid_until: Option<NaiveDate>,
}

/// Build the alert list, subcontractor by subcontractor in input order.
///
/// Every non-archived expired or expiring document raises its own alert. A subcontractor
/// without any non-archived document raises a single `Missing` alert instead.
pub fn build_alerts(
    subcontractors: &[Subcontractor],
    documents: &[AvsDocument],
) -> Vec<AlertEvent> {
    let mut by_subcontractor: HashMap<SubcontractorId, Vec<&AvsDocument>> = HashMap::new();
    for document in documents.iter().filter(|document| !document.is_archived()) {
        by_subcontractor
            .entry(document.subcontractor_id)
            .or_default()
            .push(document);
    }

    let mut alerts = Vec::new();
    for subcontractor in subcontractors {
        let held = by_subcontractor
            .get(&subcontractor.id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if held.is_empty() {
            alerts.push(AlertEvent {
                kind: AlertKind::Missing,
                subcontractor_id: subcontractor.id,
                subcontractor_name: subcontractor.name.clone(),
                valid_until: None,
            });
            continue;
        }

        alerts.extend(held.iter().filter_map(|document| {
            let kind = document.validity_status.and_then(AlertKind::from_status)?;
            Some(AlertEvent {
                kind,
                subcontractor_id: subcontractor.id,
                subcontractor_name: subcontractor.name.clone(),
                valid_until: document.valid_until,
            })
        }));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::domain::DocumentId;
    use chrono::{DateTime, TimeZone, Utc};

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn subcontractor(name: &str) -> Subcontractor {
        Subcontractor {
            id: SubcontractorId::new(),
            name: name.to_string(),
            created_at: created(),
        }
    }

    fn document(
        owner: &Subcontractor,
        status: Option<ValidityStatus>,
        valid_until: Option<NaiveDate>,
    ) -> AvsDocument {
        AvsDocument {
            id: DocumentId::new(),
            subcontractor_id: owner.id,
            file_key: None,
            description: None,
            valid_from: None,
            valid_until,
            validity_status: status,
            archived_at: None,
            created_at: created(),
        }
    }

    fn date(month: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, month, day)
    }

    #[test]
    fn empty_input_yields_no_alerts() {
        assert!(build_alerts(&[], &[]).is_empty());
    }

    #[test]
    fn archived_only_subcontractor_is_missing() {
        let sub = subcontractor("Kessler Roofing");
        let mut archived = document(&sub, Some(ValidityStatus::Expired), date(1, 1));
        archived.archived_at = Some(created());

        let alerts = build_alerts(&[sub.clone()], &[archived]);

        assert_eq!(
            alerts,
            vec![AlertEvent {
                kind: AlertKind::Missing,
                subcontractor_id: sub.id,
                subcontractor_name: sub.name,
                valid_until: None,
            }]
        );
    }

    #[test]
    fn single_valid_document_is_quiet() {
        let sub = subcontractor("Brandt Elektro");
        let valid = document(&sub, Some(ValidityStatus::Valid), date(9, 30));

        assert!(build_alerts(&[sub], &[valid]).is_empty());
    }

    #[test]
    fn expired_document_suppresses_missing_even_alongside_valid() {
        let sub = subcontractor("Nowak Bau");
        let docs = vec![
            document(&sub, Some(ValidityStatus::Expired), date(2, 1)),
            document(&sub, Some(ValidityStatus::Valid), date(12, 31)),
        ];

        let alerts = build_alerts(&[sub], &docs);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Expired);
        assert_eq!(alerts[0].valid_until, date(2, 1));
    }

    #[test]
    fn undated_document_still_counts_as_held() {
        let sub = subcontractor("Haas Gerüstbau");
        let undated = document(&sub, None, None);

        assert!(build_alerts(&[sub], &[undated]).is_empty());
    }

    #[test]
    fn alerts_follow_subcontractor_order_then_document_order() {
        let first = subcontractor("Alpha");
        let second = subcontractor("Beta");
        let third = subcontractor("Gamma");
        let docs = vec![
            document(&third, Some(ValidityStatus::Expired), date(1, 15)),
            document(&first, Some(ValidityStatus::ExpiringSoon), date(3, 1)),
            document(&first, Some(ValidityStatus::Expired), date(1, 20)),
        ];

        let subs = vec![first.clone(), second.clone(), third.clone()];
        let alerts = build_alerts(&subs, &docs);

        let summary: Vec<_> = alerts
            .iter()
            .map(|alert| (alert.subcontractor_id, alert.kind, alert.valid_until))
            .collect();
        assert_eq!(
            summary,
            vec![
                (first.id, AlertKind::ExpiringSoon, date(3, 1)),
                (first.id, AlertKind::Expired, date(1, 20)),
                (second.id, AlertKind::Missing, None),
                (third.id, AlertKind::Expired, date(1, 15)),
            ]
        );

        assert_eq!(build_alerts(&subs, &docs), alerts, "rebuilding is idempotent");
    }

    #[test]
    fn documents_of_unknown_subcontractors_are_ignored() {
        let known = subcontractor("Known");
        let stranger = subcontractor("Deleted");
        let docs = vec![document(&stranger, Some(ValidityStatus::Expired), date(1, 1))];

        let alerts = build_alerts(&[known.clone()], &docs);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subcontractor_id, known.id);
        assert_eq!(alerts[0].kind, AlertKind::Missing);
    }
}
