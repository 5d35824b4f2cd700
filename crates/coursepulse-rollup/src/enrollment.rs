//! Watermark-driven enrollment rollup.
//!
//! Folds the platform's append-only enrollment history into two tables:
//! per-course-per-day enroll/unenroll/total counters and a per-student
//! last-known-state cache. The cache row with the greatest `last_update` is
//! the pass watermark, so the watermark advances exactly when a pass
//! commits — a crashed pass reprocesses the same window, and the
//! state-equality check makes the replay a no-op.
//!
//! ## Pass Outline
//!
//! 1. Watermark = max `last_update` over state rows (epoch default if none).
//! 2. Fetch transitions strictly after the watermark, ordered ascending.
//! 3. Fold: skip events equal to the cached state; otherwise update the
//!    cache, bump the event day's delta bucket, and advance the course's
//!    running total (seeded from the most recent prior daily snapshot).
//! 4. Commit touched state rows and touched day buckets atomically.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::{info, warn, Instrument};

use coursepulse_core::observability::rollup_span;
use coursepulse_core::records::{EnrollmentDailySnapshot, EnrollmentStudentState};
use coursepulse_core::store::{AnalyticsStore, EnrollmentSource};
use coursepulse_core::{CourseKey, StudentId};

use crate::error::{Error, Result};
use crate::RollupOutcome;

/// Watermark used when no rollup has ever run.
///
/// Far enough back to pick up the oldest history the platform retains.
#[must_use]
pub fn default_watermark() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// The enrollment rollup engine.
///
/// Cheap to construct; hold one per scheduled job. Concurrent passes over
/// the same store must be serialized by the scheduler, matching the
/// single-writer commit contract of [`AnalyticsStore`].
pub struct EnrollmentRollup {
    store: Arc<dyn AnalyticsStore>,
    source: Arc<dyn EnrollmentSource>,
}

impl EnrollmentRollup {
    /// Creates an engine over the given store and history source.
    #[must_use]
    pub fn new(store: Arc<dyn AnalyticsStore>, source: Arc<dyn EnrollmentSource>) -> Self {
        Self { store, source }
    }

    /// Runs one incremental pass.
    ///
    /// Idempotent: a second run with no new history commits nothing.
    /// Malformed course-id strings in the source are logged and skipped;
    /// they never abort the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator call or the final commit fails.
    /// Nothing is applied in that case and the watermark does not move.
    pub async fn run(&self) -> Result<RollupOutcome> {
        self.run_pass().instrument(rollup_span("enrollment")).await
    }

    async fn run_pass(&self) -> Result<RollupOutcome> {
        let watermark = self
            .store
            .enrollment_watermark()
            .await?
            .unwrap_or_else(default_watermark);

        let events = self.source.transitions_since(watermark).await?;
        let events_seen = events.len();

        let mut states: HashMap<(CourseKey, StudentId), EnrollmentStudentState> = self
            .store
            .enrollment_states()
            .await?
            .into_iter()
            .map(|s| ((s.course_id.clone(), s.student_id), s))
            .collect();

        let latest_daily = self.store.latest_daily_snapshots().await?;
        let mut totals: HashMap<CourseKey, i64> = latest_daily
            .iter()
            .map(|(course, snap)| (course.clone(), snap.total))
            .collect();

        let mut buckets: HashMap<(CourseKey, NaiveDate), EnrollmentDailySnapshot> = HashMap::new();
        let mut touched: HashSet<(CourseKey, StudentId)> = HashSet::new();
        let mut events_applied = 0_usize;
        let mut events_skipped = 0_usize;

        for event in events {
            let course: CourseKey = match event.course_id.parse() {
                Ok(course) => course,
                Err(err) => {
                    warn!(course_id = %event.course_id, %err, "skipping transition with malformed course id");
                    events_skipped += 1;
                    continue;
                }
            };

            let state_key = (course.clone(), event.student_id);
            if states
                .get(&state_key)
                .is_some_and(|s| s.is_active == event.is_active)
            {
                // Replay of known state; the dedup that makes retries safe.
                continue;
            }

            states.insert(
                state_key.clone(),
                EnrollmentStudentState {
                    course_id: course.clone(),
                    student_id: event.student_id,
                    last_update: event.timestamp,
                    is_active: event.is_active,
                },
            );
            touched.insert(state_key);

            let day = event.timestamp.date_naive();
            let bucket = buckets
                .entry((course.clone(), day))
                .or_insert_with(|| match latest_daily.get(&course) {
                    // Same calendar day as the newest stored row: extend its
                    // counters instead of starting from zero.
                    Some(snap) if snap.day == day => snap.clone(),
                    _ => EnrollmentDailySnapshot {
                        course_id: course.clone(),
                        day,
                        enrolled: 0,
                        unenrolled: 0,
                        total: 0,
                    },
                });

            let delta = if event.is_active {
                bucket.enrolled += 1;
                1
            } else {
                bucket.unenrolled += 1;
                -1
            };
            let total = totals.entry(course).or_insert(0);
            *total += delta;
            bucket.total = *total;
            events_applied += 1;
        }

        for ((course, day), bucket) in &buckets {
            if bucket.total < 0 {
                warn!(%course, %day, total = bucket.total, "negative running total; source history is inconsistent");
            }
        }

        let outcome = RollupOutcome {
            events_seen,
            events_applied,
            events_skipped,
            courses_touched: buckets
                .keys()
                .map(|(course, _)| course.clone())
                .collect::<HashSet<_>>()
                .len(),
        };

        if touched.is_empty() && buckets.is_empty() {
            // Nothing genuinely new (empty window, or replays only); leave
            // every persisted row untouched.
            info!(%watermark, events_seen, "enrollment rollup: no state changes");
            return Ok(outcome);
        }

        let dirty_states: Vec<EnrollmentStudentState> = touched
            .iter()
            .filter_map(|key| states.get(key).cloned())
            .collect();
        let snapshots: Vec<EnrollmentDailySnapshot> = buckets.into_values().collect();

        self.store
            .commit_enrollment_rollup(dirty_states, snapshots)
            .await
            .map_err(|err| Error::commit_failed("enrollment rollup", err))?;

        info!(
            events_seen = outcome.events_seen,
            events_applied = outcome.events_applied,
            events_skipped = outcome.events_skipped,
            courses = outcome.courses_touched,
            "enrollment rollup committed"
        );
        Ok(outcome)
    }
}
