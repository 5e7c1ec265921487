//! # Clock
//!
//! "Today" is always injected. Nothing in the core reads the wall clock
//! except through a `Clock`.

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of the current calendar day and instant.
pub trait Clock: Send + Sync {
    /// The calendar day used for date gating.
    fn today(&self) -> NaiveDate;

    /// The instant stamped into `edited_at` and submission states.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. The calendar day follows the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one day.
///
/// `now()` reports noon UTC of that day unless an explicit instant is given.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
    now: DateTime<Utc>,
}

impl FixedClock {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        let now = today
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_default();
        Self { today, now }
    }

    #[must_use]
    pub fn at(today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self { today, now }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
