use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{model::WeatherRecord, normalize::localize};

/// Inclusive date range; an absent bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

/// Earliest and latest timestamps of a record sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub earliest: DateTime<FixedOffset>,
    pub latest: DateTime<FixedOffset>,
}

/// How the window is chosen on the first successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPolicy {
    /// The whole payload.
    #[default]
    FullSpan,
    /// From now until the end of tomorrow, when the payload covers them.
    TodayTomorrow,
}

impl DateWindow {
    pub fn new(
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        self.start.is_none_or(|start| *ts >= start) && self.end.is_none_or(|end| *ts <= end)
    }

    /// Keeps the window if both bounds lie inside `span`, otherwise clamps
    /// each bound to it. Unbounded sides stay unbounded.
    pub fn fit_to(self, span: &Span) -> Self {
        let inside = |ts: DateTime<FixedOffset>| ts >= span.earliest && ts <= span.latest;
        if self.start.is_none_or(inside) && self.end.is_none_or(inside) {
            return self;
        }

        let clamp = |ts: DateTime<FixedOffset>| ts.clamp(span.earliest, span.latest);
        Self {
            start: self.start.map(clamp),
            end: self.end.map(clamp),
        }
    }
}

impl Span {
    pub fn of(records: &[WeatherRecord]) -> Option<Self> {
        let mut timestamps = records.iter().map(|r| r.timestamp);
        let first = timestamps.next()?;
        let (earliest, latest) =
            timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
        Some(Self { earliest, latest })
    }

    fn covers_day(&self, day: NaiveDate) -> bool {
        self.earliest.date_naive() <= day && day <= self.latest.date_naive()
    }
}

/// Records whose timestamp lies inside `window`, in input order.
pub fn filter_records(records: &[WeatherRecord], window: &DateWindow) -> Vec<WeatherRecord> {
    records
        .iter()
        .filter(|r| window.contains(&r.timestamp))
        .cloned()
        .collect()
}

/// Window used right after the first successful load.
pub fn default_window(span: &Span, policy: WindowPolicy, now: DateTime<Utc>) -> DateWindow {
    match policy {
        WindowPolicy::FullSpan => DateWindow::new(Some(span.earliest), Some(span.latest)),
        WindowPolicy::TodayTomorrow => {
            let offset = *span.earliest.offset();
            let now = now.with_timezone(&offset);
            let today = now.date_naive();

            let start = if span.covers_day(today) {
                now
            } else {
                span.earliest
            };

            let end = today
                .succ_opt()
                .filter(|tomorrow| span.covers_day(*tomorrow))
                .and_then(|tomorrow| tomorrow.and_hms_opt(23, 59, 59))
                .map(|end_of_tomorrow| localize(end_of_tomorrow, offset).min(span.latest))
                .unwrap_or(span.latest);

            DateWindow::new(Some(start), Some(end))
        }
    }
}
