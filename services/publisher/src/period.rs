//! Reference periods for datasets.

use chrono::{NaiveDate, NaiveDateTime};

const CATALOG_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Aggregate `[earliest start, latest end]` over observed rows.
///
/// Starts out inverted (start = MAX, end = MIN) so the first real range
/// replaces both bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateSpan {
    pub fn empty() -> Self {
        Self {
            start: NaiveDateTime::MAX,
            end: NaiveDateTime::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn widen(&mut self, start: NaiveDateTime, end: NaiveDateTime) {
        if start < self.start {
            self.start = start;
        }
        if end > self.end {
            self.end = end;
        }
    }

    /// `[2000-01-01T00:00:00 TO 2020-12-31T23:59:59]`
    pub fn to_catalog_string(&self) -> String {
        format!(
            "[{} TO {}]",
            self.start.format(CATALOG_FORMAT),
            self.end.format(CATALOG_FORMAT)
        )
    }
}

impl Default for DateSpan {
    fn default() -> Self {
        Self::empty()
    }
}

/// Whole-period range of a year (`2020`) or a day (`2020-03-15`): midnight
/// at the start, 23:59:59 on the last day.
pub fn period_range(value: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let value = value.trim();
    let (first, last) = match value.parse::<i32>() {
        Ok(year) => (
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
        ),
        Err(_) => {
            let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
            (day, day)
        }
    };
    Some((first.and_hms_opt(0, 0, 0)?, last.and_hms_opt(23, 59, 59)?))
}
