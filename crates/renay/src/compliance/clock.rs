use chrono::{DateTime, NaiveDate, Utc};

/// Source of "now" for timestamps and "today" for classification.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The UTC calendar date of [`Clock::now`].
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Pinned clock for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn on(today: NaiveDate) -> Self {
        Self(today.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
