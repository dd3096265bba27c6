// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Interval planner: splits a `[start, end)` range into export requests.
//!
//! The Protect export endpoint is unreliable for anything longer than one
//! hour, so a range is cut into pieces of at most an hour. By default the
//! pieces are snapped to the top of the wall-clock hour:
//!
//! ```text
//!   08:30 ─ 13:45   →   08:30-08:59:59.999
//!                       09:00-09:59:59.999
//!                       ...
//!                       13:00-13:44:59.999
//! ```
//!
//! Every interval is closed on both ends and finishes one millisecond before
//! the next one starts, so neighbours never share an instant.
//!
//! Alignment reads the minute/second fields in the time zone of the inputs;
//! stepping adds an absolute hour.

use chrono::{DateTime, Duration, TimeZone, Timelike};

/// Gap between the inclusive end of one interval and the start of the next.
pub fn tick() -> Duration {
    Duration::milliseconds(1)
}

fn one_hour() -> Duration {
    Duration::hours(1)
}

/// A closed `[start, end]` range produced by [`plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    /// Inclusive; one tick before the next interval's start.
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> Interval<Tz> {
    fn closing_before(start: DateTime<Tz>, next: DateTime<Tz>) -> Self {
        Self { end: next - tick(), start }
    }

    /// Length of the half-open range this interval stands for.
    pub fn span(&self) -> Duration {
        self.end.clone() - self.start.clone() + tick()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Let hour blocks float with `start` instead of snapping to the clock.
    pub disable_alignment: bool,
    /// Request the whole range at once. Long exports may crash the server.
    pub disable_splitting: bool,
}

/// Lazy sequence of intervals covering a range. Re-run [`plan`] to restart.
#[derive(Debug, Clone)]
pub struct Intervals<Tz: TimeZone> {
    head: Option<Interval<Tz>>,
    cursor: DateTime<Tz>,
    end: DateTime<Tz>,
    full_hours: i64,
    finished: bool,
}

/// Plan the export intervals for `[start, end)`.
///
/// An empty or inverted range yields nothing.
pub fn plan<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>, options: PlanOptions) -> Intervals<Tz> {
    if start >= end {
        return Intervals { head: None, cursor: start, end, full_hours: 0, finished: true };
    }

    if options.disable_splitting {
        return Intervals {
            head: Some(Interval::closing_before(start.clone(), end.clone())),
            cursor: end.clone(),
            end,
            full_hours: 0,
            finished: false,
        };
    }

    let mut head = None;
    let mut cursor = start.clone();

    if !options.disable_alignment {
        let past_hour = floor_to_hour(&start);
        if past_hour != start {
            let next_hour = past_hour + one_hour();
            // A range that ends before the next boundary is handled as remainder.
            if end >= next_hour {
                head = Some(Interval::closing_before(start, next_hour.clone()));
                cursor = next_hour;
            }
        }
    }

    let full_hours = (end.clone() - cursor.clone()).num_seconds().max(0) / 3600;

    Intervals { head, cursor, end, full_hours, finished: false }
}

/// Truncate to the most recent full hour in the value's own time zone.
pub fn floor_to_hour<Tz: TimeZone>(ts: &DateTime<Tz>) -> DateTime<Tz> {
    let into_hour = Duration::minutes(i64::from(ts.minute()))
        + Duration::seconds(i64::from(ts.second()))
        + Duration::nanoseconds(i64::from(ts.nanosecond()));
    ts.clone() - into_hour
}

impl<Tz: TimeZone> Iterator for Intervals<Tz> {
    type Item = Interval<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(head) = self.head.take() {
            return Some(head);
        }
        if self.full_hours > 0 {
            self.full_hours -= 1;
            let start = self.cursor.clone();
            self.cursor = start.clone() + one_hour();
            return Some(Interval::closing_before(start, self.cursor.clone()));
        }
        self.finished = true;
        if self.cursor < self.end {
            return Some(Interval::closing_before(self.cursor.clone(), self.end.clone()));
        }
        None
    }
}
