//! Persisted rollup records.
//!
//! These four row types are the only durable state this engine owns. All of
//! them are produced by the rollup passes in `coursepulse-rollup` and read
//! back by the dashboard-facing derivations in `coursepulse-insights`;
//! everything else (enrollment history, module activity, the content tree)
//! belongs to the platform and is reached through the traits in
//! [`crate::store`].

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::{CheckpointId, CourseKey, StudentId};

/// Per-course, per-day enrollment counters.
///
/// Unique per `(course_id, day)`. `total` carries the running active-student
/// count as of the end of that day, so for consecutive days
/// `total(n) == total(n-1) + enrolled(n) - unenrolled(n)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentDailySnapshot {
    /// Course this bucket belongs to.
    pub course_id: CourseKey,
    /// Calendar day of the bucket (UTC).
    pub day: NaiveDate,
    /// Enroll transitions observed on this day.
    pub enrolled: i64,
    /// Unenroll transitions observed on this day.
    pub unenrolled: i64,
    /// Running active-student total as of the end of this day.
    ///
    /// Not forced non-negative: a negative value means the source history is
    /// corrupt and is surfaced as a data-quality warning, not an error.
    pub total: i64,
}

/// Last observed enrollment state for one student in one course.
///
/// Unique per `(course_id, student_id)`. This is the dedup cache that lets
/// the enrollment rollup tell a genuinely new transition from a replay of
/// known state; the row with the greatest `last_update` doubles as the
/// rollup watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStudentState {
    /// Course this state belongs to.
    pub course_id: CourseKey,
    /// The student.
    pub student_id: StudentId,
    /// Timestamp of the most recent transition seen so far.
    pub last_update: DateTime<Utc>,
    /// Whether the student was active after that transition.
    pub is_active: bool,
}

/// Cached grade summary for one student in one course.
///
/// Unique per `(course_id, student_id)`; upserted by the grade rollup,
/// deleted only when the account becomes staff or is re-graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSnapshot {
    /// Course this grade belongs to.
    pub course_id: CourseKey,
    /// The student.
    pub student_id: StudentId,
    /// Username, denormalized at rollup time so cohort and gradebook reads
    /// never join back into the platform's user table.
    pub username: String,
    /// Ordered section-label to integer-percent mapping, ending with a
    /// `"total"` entry. Insertion order mirrors the grading collaborator's
    /// section breakdown.
    pub exam_info: IndexMap<String, u8>,
    /// Overall grade as a fraction in `[0, 1]`.
    pub total: f64,
}

/// One completed grade-rollup pass.
///
/// The newest row's `last_update` is the "since" watermark for the next diff
/// pass; a short history is retained for recovery and older rows pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRollupCheckpoint {
    /// Row identifier, sortable by creation time.
    pub id: CheckpointId,
    /// Start timestamp of the completed pass.
    pub last_update: DateTime<Utc>,
}

impl GradeRollupCheckpoint {
    /// Creates a checkpoint stamped with the given pass-start time.
    #[must_use]
    pub fn at(last_update: DateTime<Utc>) -> Self {
        Self {
            id: CheckpointId::generate(),
            last_update,
        }
    }
}
