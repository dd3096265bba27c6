//! Interval planner tests: literal scenarios plus coverage properties.
//!
//! Run with: `cargo test`

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

use protect_archiver::planner::{plan, tick, Interval, PlanOptions};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .expect("valid time")
        .and_utc()
}

fn ms_before(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts - Duration::milliseconds(1)
}

fn pairs(intervals: &[Interval<Utc>]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    intervals.iter().map(|iv| (iv.start, iv.end)).collect()
}

fn assert_partition<Tz: TimeZone>(intervals: &[Interval<Tz>], start: &DateTime<Tz>, end: &DateTime<Tz>) {
    assert_eq!(&intervals[0].start, start);
    assert_eq!(intervals[intervals.len() - 1].end.clone() + tick(), end.clone());
    for pair in intervals.windows(2) {
        assert_eq!(pair[0].end.clone() + tick(), pair[1].start.clone(), "gap or overlap");
    }
    let total = intervals.iter().fold(Duration::zero(), |acc, iv| acc + iv.span());
    assert_eq!(total, end.clone() - start.clone());
}

#[test]
fn test_range_inside_one_hour() {
    let got: Vec<_> = plan(at(8, 30, 0), at(8, 45, 0), PlanOptions::default()).collect();
    assert_eq!(pairs(&got), vec![(at(8, 30, 0), ms_before(at(8, 45, 0)))]);
}

#[test]
fn test_aligned_multi_hour_range() {
    let got: Vec<_> = plan(at(8, 30, 0), at(13, 45, 0), PlanOptions::default()).collect();
    assert_eq!(
        pairs(&got),
        vec![
            (at(8, 30, 0), ms_before(at(9, 0, 0))),
            (at(9, 0, 0), ms_before(at(10, 0, 0))),
            (at(10, 0, 0), ms_before(at(11, 0, 0))),
            (at(11, 0, 0), ms_before(at(12, 0, 0))),
            (at(12, 0, 0), ms_before(at(13, 0, 0))),
            (at(13, 0, 0), ms_before(at(13, 45, 0))),
        ]
    );
    assert_partition(&got, &at(8, 30, 0), &at(13, 45, 0));
}

#[test]
fn test_disable_splitting_single_request() {
    let options = PlanOptions { disable_splitting: true, ..PlanOptions::default() };
    let got: Vec<_> = plan(at(8, 56, 0), at(13, 21, 0), options).collect();
    assert_eq!(pairs(&got), vec![(at(8, 56, 0), ms_before(at(13, 21, 0)))]);
}

#[test]
fn test_disable_alignment_short_range() {
    let options = PlanOptions { disable_alignment: true, ..PlanOptions::default() };
    let got: Vec<_> = plan(at(8, 30, 0), at(9, 15, 0), options).collect();
    assert_eq!(pairs(&got), vec![(at(8, 30, 0), ms_before(at(9, 15, 0)))]);
}

#[test]
fn test_disable_alignment_floats_with_start() {
    let options = PlanOptions { disable_alignment: true, ..PlanOptions::default() };
    let got: Vec<_> = plan(at(8, 45, 0), at(11, 0, 0), options).collect();
    assert_eq!(
        pairs(&got),
        vec![
            (at(8, 45, 0), ms_before(at(9, 45, 0))),
            (at(9, 45, 0), ms_before(at(10, 45, 0))),
            (at(10, 45, 0), ms_before(at(11, 0, 0))),
        ]
    );
}

#[test]
fn test_aligned_boundaries_without_remainder() {
    let got: Vec<_> = plan(at(9, 0, 0), at(12, 0, 0), PlanOptions::default()).collect();
    assert_eq!(got.len(), 3);
    assert!(got.iter().all(|iv| iv.span() == Duration::hours(1)));
    assert_partition(&got, &at(9, 0, 0), &at(12, 0, 0));
}

#[test]
fn test_partition_for_odd_ranges() {
    let cases = [
        (at(0, 0, 1), at(23, 59, 59)),
        (at(7, 59, 59), at(8, 0, 1)),
        (at(8, 17, 3), at(8, 17, 4)),
        (at(10, 0, 0), at(10, 0, 0) + Duration::milliseconds(1)),
    ];
    for (start, end) in cases {
        for options in [
            PlanOptions::default(),
            PlanOptions { disable_alignment: true, ..PlanOptions::default() },
        ] {
            let got: Vec<_> = plan(start, end, options).collect();
            assert_partition(&got, &start, &end);
            assert!(got.iter().all(|iv| iv.span() <= Duration::hours(1)));
        }
    }
}

#[test]
fn test_aligned_inner_intervals_start_on_the_hour() {
    let got: Vec<_> = plan(at(3, 12, 40), at(20, 5, 0), PlanOptions::default()).collect();
    for iv in &got[1..] {
        assert_eq!((iv.start.minute(), iv.start.second(), iv.start.nanosecond()), (0, 0, 0));
    }
}

#[test]
fn test_planning_twice_gives_same_result() {
    let first: Vec<_> = plan(at(8, 30, 0), at(13, 45, 0), PlanOptions::default()).collect();
    let second: Vec<_> = plan(at(8, 30, 0), at(13, 45, 0), PlanOptions::default()).collect();
    assert_eq!(first, second);
}

#[test]
fn test_alignment_uses_the_input_offset() {
    // +05:30 wall clock: 08:30 local is 03:00 UTC, so the head block is 30 minutes.
    let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("valid offset");
    let start = ist.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).single().expect("valid");
    let end = ist.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single().expect("valid");

    let got: Vec<_> = plan(start, end, PlanOptions::default()).collect();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].span(), Duration::minutes(30));
    assert_eq!(got[1].start, ist.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid"));
    assert_partition(&got, &start, &end);
}

#[test]
fn test_empty_and_inverted_ranges() {
    assert_eq!(plan(at(8, 0, 0), at(8, 0, 0), PlanOptions::default()).count(), 0);
    assert_eq!(plan(at(9, 0, 0), at(8, 0, 0), PlanOptions::default()).count(), 0);
    let options = PlanOptions { disable_splitting: true, ..PlanOptions::default() };
    assert_eq!(plan(at(9, 0, 0), at(8, 0, 0), options).count(), 0);
}
