//! Behavioral tests for the enrollment rollup engine.

use std::sync::Arc;

use coursepulse_core::store::memory::MemoryStore;
use coursepulse_core::store::AnalyticsStore;
use coursepulse_core::{CourseKey, StudentId};
use coursepulse_rollup::enrollment::EnrollmentRollup;
use coursepulse_test_utils::{at, test_course, transition, StubEnrollmentSource};

fn engine(store: &Arc<MemoryStore>, source: StubEnrollmentSource) -> EnrollmentRollup {
    EnrollmentRollup::new(store.clone(), Arc::new(source))
}

#[tokio::test]
async fn enroll_then_unenroll_same_day_nets_to_zero() {
    let store = Arc::new(MemoryStore::new());
    let course = test_course();
    let source = StubEnrollmentSource {
        transitions: vec![
            transition(1, &course.to_string(), at(10, 9), true),
            transition(1, &course.to_string(), at(10, 11), false),
        ],
        ..StubEnrollmentSource::default()
    };

    let outcome = engine(&store, source).run().await.unwrap();
    assert_eq!(outcome.events_applied, 2);

    let day = at(10, 0).date_naive();
    let snap = store.daily_snapshot(&course, day).unwrap().unwrap();
    assert_eq!(snap.enrolled, 1);
    assert_eq!(snap.unenrolled, 1);
    assert_eq!(snap.total, 0);

    let states = store.enrollment_states().await.unwrap();
    assert_eq!(states.len(), 1);
    assert!(!states[0].is_active);
    assert_eq!(states[0].last_update, at(10, 11));
    assert_eq!(states[0].student_id, StudentId(1));
}

#[tokio::test]
async fn second_run_without_new_history_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let course = test_course();
    let source = StubEnrollmentSource {
        transitions: vec![
            transition(1, &course.to_string(), at(10, 9), true),
            transition(2, &course.to_string(), at(11, 9), true),
        ],
        ..StubEnrollmentSource::default()
    };
    let engine = EnrollmentRollup::new(store.clone(), Arc::new(source));

    engine.run().await.unwrap();
    let watermark = store.enrollment_watermark().await.unwrap();
    let states_before = {
        let mut s = store.enrollment_states().await.unwrap();
        s.sort_by_key(|st| st.student_id);
        s
    };
    let snapshots_before = store.daily_snapshot_count().unwrap();

    // The watermark now sits at the newest transition; the stub returns
    // nothing strictly after it, so the second pass must be a no-op.
    let outcome = engine.run().await.unwrap();
    assert_eq!(outcome.events_seen, 0);
    assert_eq!(outcome.events_applied, 0);

    assert_eq!(store.enrollment_watermark().await.unwrap(), watermark);
    assert_eq!(store.daily_snapshot_count().unwrap(), snapshots_before);
    let mut states_after = store.enrollment_states().await.unwrap();
    states_after.sort_by_key(|st| st.student_id);
    assert_eq!(states_after, states_before);
}

#[tokio::test]
async fn replayed_state_is_deduplicated() {
    let store = Arc::new(MemoryStore::new());
    let course = test_course();
    // Two "active" events for the same student: the second is a replay of
    // known state and must not double-count.
    let source = StubEnrollmentSource {
        transitions: vec![
            transition(1, &course.to_string(), at(10, 9), true),
            transition(1, &course.to_string(), at(10, 10), true),
        ],
        ..StubEnrollmentSource::default()
    };

    let outcome = engine(&store, source).run().await.unwrap();
    assert_eq!(outcome.events_applied, 1);

    let snap = store
        .daily_snapshot(&course, at(10, 0).date_naive())
        .unwrap()
        .unwrap();
    assert_eq!(snap.enrolled, 1);
    assert_eq!(snap.total, 1);

    // The replay must not advance the per-student timestamp either.
    let states = store.enrollment_states().await.unwrap();
    assert_eq!(states[0].last_update, at(10, 9));
}

#[tokio::test]
async fn malformed_course_id_is_skipped_not_fatal() {
    let store = Arc::new(MemoryStore::new());
    let course = test_course();
    let source = StubEnrollmentSource {
        transitions: vec![
            transition(1, "not-a-course-key", at(10, 9), true),
            transition(2, &course.to_string(), at(10, 10), true),
        ],
        ..StubEnrollmentSource::default()
    };

    let outcome = engine(&store, source).run().await.unwrap();
    assert_eq!(outcome.events_skipped, 1);
    assert_eq!(outcome.events_applied, 1);

    let snap = store
        .daily_snapshot(&course, at(10, 0).date_naive())
        .unwrap()
        .unwrap();
    assert_eq!(snap.enrolled, 1);
}

#[tokio::test]
async fn running_total_chains_across_days() {
    let store = Arc::new(MemoryStore::new());
    let course = test_course();
    let source = StubEnrollmentSource {
        transitions: vec![
            transition(1, &course.to_string(), at(10, 9), true),
            transition(2, &course.to_string(), at(10, 10), true),
            transition(3, &course.to_string(), at(11, 9), true),
            transition(1, &course.to_string(), at(12, 9), false),
        ],
        ..StubEnrollmentSource::default()
    };

    engine(&store, source).run().await.unwrap();

    let day = |d: u32| at(d, 0).date_naive();
    let totals: Vec<i64> = [10, 11, 12]
        .iter()
        .map(|d| store.daily_snapshot(&course, day(*d)).unwrap().unwrap().total)
        .collect();
    assert_eq!(totals, [2, 3, 2]);

    // total(n) == total(n-1) + enrolled(n) - unenrolled(n)
    for d in [11_u32, 12] {
        let prev = store.daily_snapshot(&course, day(d - 1)).unwrap().unwrap();
        let cur = store.daily_snapshot(&course, day(d)).unwrap().unwrap();
        assert_eq!(cur.total, prev.total + cur.enrolled - cur.unenrolled);
    }
}

#[tokio::test]
async fn same_day_bucket_extends_existing_snapshot_across_passes() {
    let store = Arc::new(MemoryStore::new());
    let course = test_course();

    let first = StubEnrollmentSource {
        transitions: vec![transition(1, &course.to_string(), at(10, 9), true)],
        ..StubEnrollmentSource::default()
    };
    engine(&store, first).run().await.unwrap();

    // A later pass sees a new event on the same calendar day; the open
    // bucket's counters must extend, not reset.
    let second = StubEnrollmentSource {
        transitions: vec![
            transition(1, &course.to_string(), at(10, 9), true),
            transition(2, &course.to_string(), at(10, 15), true),
        ],
        ..StubEnrollmentSource::default()
    };
    engine(&store, second).run().await.unwrap();

    let snap = store
        .daily_snapshot(&course, at(10, 0).date_naive())
        .unwrap()
        .unwrap();
    assert_eq!(snap.enrolled, 2);
    assert_eq!(snap.total, 2);
}

#[tokio::test]
async fn totals_are_tracked_independently_per_course() {
    let store = Arc::new(MemoryStore::new());
    let course_a = test_course();
    let course_b: CourseKey = "course-v1:RG+Analytics+2025".parse().unwrap();
    let source = StubEnrollmentSource {
        transitions: vec![
            transition(1, &course_a.to_string(), at(10, 9), true),
            transition(1, &course_b.to_string(), at(10, 10), true),
            transition(2, &course_b.to_string(), at(10, 11), true),
        ],
        ..StubEnrollmentSource::default()
    };

    let outcome = engine(&store, source).run().await.unwrap();
    assert_eq!(outcome.courses_touched, 2);

    let day = at(10, 0).date_naive();
    assert_eq!(store.daily_snapshot(&course_a, day).unwrap().unwrap().total, 1);
    assert_eq!(store.daily_snapshot(&course_b, day).unwrap().unwrap().total, 2);
}
