use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::ValidityStatus;

const DEFAULT_WARNING_DAYS: u32 = 20;

/// Number of calendar days before `valid_until` during which a document is expiring soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarningWindow(u32);

impl WarningWindow {
    pub const fn days(days: u32) -> Self {
        Self(days)
    }

    pub const fn as_days(self) -> u32 {
        self.0
    }

    /// First day of the warning window. Saturates at the earliest representable date.
    pub fn warn_date(self, valid_until: NaiveDate) -> NaiveDate {
        valid_until
            .checked_sub_days(Days::new(u64::from(self.0)))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl Default for WarningWindow {
    fn default() -> Self {
        Self(DEFAULT_WARNING_DAYS)
    }
}

/// Classify a document by its expiry date.
///
/// Only `valid_until` matters; `valid_from` is informational. A document is still current on
/// its `valid_until` day and expires the day after. The warning window boundary is inclusive.
pub fn classify(
    valid_until: Option<NaiveDate>,
    today: NaiveDate,
    window: WarningWindow,
) -> Option<ValidityStatus> {
    let valid_until = valid_until?;

    let status = if today > valid_until {
        ValidityStatus::Expired
    } else if today >= window.warn_date(valid_until) {
        ValidityStatus::ExpiringSoon
    } else {
        ValidityStatus::Valid
    };

    Some(status)
}
