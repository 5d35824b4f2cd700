//! Storage and collaborator traits.
//!
//! Every seam between this engine and the surrounding platform is an async
//! trait defined here:
//!
//! | Trait | Owner | Role |
//! |-------|-------|------|
//! | [`EnrollmentSource`] | platform | append-only enrollment history |
//! | [`ActivitySource`] | platform | module interaction log |
//! | [`ContentSource`] | platform | course content tree |
//! | [`GradeProvider`] | platform | per-student grade summaries |
//! | [`StudentDirectory`] | platform | usernames and email addresses |
//! | [`EmailSender`] | platform | outbound mail (queue-backed) |
//! | [`AnalyticsStore`] | **this engine** | the four persisted rollup tables |
//!
//! ## Commit Semantics
//!
//! The `commit_*` methods on [`AnalyticsStore`] are the transactional
//! boundary of a rollup pass: each applies all of its writes or none of
//! them. Because the enrollment watermark and the grade checkpoint only
//! advance inside those commits, a pass that fails mid-way leaves the store
//! exactly as it found it and is safe to retry.
//!
//! ## Raw Course Identifiers
//!
//! Platform sources hand back course ids as raw strings; the rollup engines
//! parse them and skip malformed rows with a logged warning. Parsing happens
//! there, not in the adapters, so one bad row never aborts a whole pass.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::content::CourseBlock;
use crate::error::Result;
use crate::id::{CourseKey, StudentId, UsageKey};
use crate::records::{
    EnrollmentDailySnapshot, EnrollmentStudentState, GradeRollupCheckpoint, GradeSnapshot,
};

/// One enrollment state transition from the platform's history log.
///
/// Synthetic "row created" history entries are excluded at the source; only
/// real state changes arrive here. The course id is the platform's raw
/// string, parsed by the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentTransition {
    /// The student who transitioned.
    pub student_id: StudentId,
    /// Raw course identifier string as stored by the platform.
    pub course_id: String,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Whether the student is active after this transition.
    pub is_active: bool,
}

/// A (student, course) pair as reported by a platform source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoursePair {
    /// The student.
    pub student_id: StudentId,
    /// Raw course identifier string as stored by the platform.
    pub course_id: String,
}

impl CoursePair {
    /// Creates a pair from a student id and a raw course string.
    #[must_use]
    pub fn new(student_id: StudentId, course_id: impl Into<String>) -> Self {
        Self {
            student_id,
            course_id: course_id.into(),
        }
    }
}

/// Module categories the activity log is queried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Subsection-level navigation state (carries a `position` field).
    Sequential,
    /// Graded problem interactions (carry `attempts` and grades).
    Problem,
}

impl ModuleKind {
    /// Returns the platform's string name for this module kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Problem => "problem",
        }
    }
}

/// One row of the module interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleActivityRecord {
    /// The student this row belongs to.
    pub student_id: StudentId,
    /// The module the student interacted with.
    pub module_key: UsageKey,
    /// Module kind of this row.
    pub kind: ModuleKind,
    /// Opaque JSON state blob. For sequentials it contains a 1-indexed
    /// `position`; for problems an `attempts` counter.
    pub state: String,
    /// Earned grade, if the row is graded.
    pub grade: Option<f64>,
    /// Maximum achievable grade, if the row is graded.
    pub max_grade: Option<f64>,
    /// Last modification time of this row.
    pub modified_at: DateTime<Utc>,
}

/// One section entry of a grade summary, as a fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionGrade {
    /// Display label of the graded section (e.g. `"HW 01"`).
    pub label: String,
    /// Achieved fraction in `[0, 1]`.
    pub percent: f64,
}

/// A grade summary produced by the platform's grading engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    /// Ordered per-section breakdown.
    pub section_breakdown: Vec<SectionGrade>,
    /// Overall grade as a fraction in `[0, 1]`.
    pub percent: f64,
}

/// Append-only enrollment history, owned by the platform.
#[async_trait]
pub trait EnrollmentSource: Send + Sync {
    /// Returns state transitions with timestamp strictly greater than
    /// `since`, ordered by timestamp ascending.
    async fn transitions_since(&self, since: DateTime<Utc>) -> Result<Vec<EnrollmentTransition>>;

    /// Returns all currently-active (student, course) pairs.
    async fn active_pairs(&self) -> Result<Vec<CoursePair>>;

    /// Returns pairs whose enrollment was created after `since`.
    async fn enrolled_since(&self, since: DateTime<Utc>) -> Result<Vec<CoursePair>>;

    /// Returns instructor/staff account ids for the given course.
    async fn course_staff(&self, course: &CourseKey) -> Result<Vec<StudentId>>;
}

/// The platform's module interaction log.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Returns all interaction rows of the given kind for the course.
    async fn module_records(
        &self,
        course: &CourseKey,
        kind: ModuleKind,
    ) -> Result<Vec<ModuleActivityRecord>>;

    /// Returns distinct (student, course) pairs with graded problem activity
    /// after `since`.
    async fn graded_pairs_since(&self, since: DateTime<Utc>) -> Result<Vec<CoursePair>>;
}

/// The platform's course content store.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches the content tree for a course down to `depth` levels.
    ///
    /// Returns `None` if the course does not exist; callers skip it with a
    /// logged warning rather than failing the batch.
    async fn course_tree(&self, course: &CourseKey, depth: u32) -> Result<Option<CourseBlock>>;
}

/// The platform's grading engine.
#[async_trait]
pub trait GradeProvider: Send + Sync {
    /// Computes a grade summary for one student.
    ///
    /// Returns `None` when the student has no accessible grade (including
    /// permission-denied); the caller omits the student from its output.
    async fn grade_summary(
        &self,
        student: StudentId,
        course: &CourseKey,
    ) -> Result<Option<GradeSummary>>;
}

/// Username and email lookup, owned by the platform.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Resolves a student's username, if the account exists.
    async fn username(&self, student: StudentId) -> Result<Option<String>>;

    /// Resolves email addresses for the given students, skipping unknown
    /// ids.
    async fn emails_for(&self, students: &[StudentId]) -> Result<Vec<String>>;
}

/// Outbound email transport (queue-backed, fire-and-forget).
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one message to the given recipients.
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()>;
}

/// All writes of one grade-rollup pass, applied atomically.
#[derive(Debug, Clone, Default)]
pub struct GradeRollupCommit {
    /// Snapshots to insert or replace, keyed by (course, student).
    pub upserts: Vec<GradeSnapshot>,
    /// Snapshots to delete (staff and otherwise-excluded accounts).
    pub deletes: Vec<(CourseKey, StudentId)>,
    /// Checkpoint row recording this pass.
    pub checkpoint: Option<GradeRollupCheckpoint>,
    /// How many checkpoint rows to retain after appending.
    pub retain_checkpoints: usize,
    /// Force-regrade flags this pass read and acted on. Only these are
    /// cleared; a flag raised while the pass was running survives for the
    /// next one.
    pub consumed_flags: Vec<(CourseKey, StudentId)>,
}

/// The persisted rollup tables owned by this engine.
///
/// Implementations must make each `commit_*` method atomic: either every
/// write in the call is applied or none is. The in-memory implementation
/// ([`memory::MemoryStore`]) holds one write lock for the whole commit;
/// a SQL-backed implementation would wrap it in a transaction.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    // --- Enrollment rollup rows ---

    /// Returns the greatest `last_update` across all student-state rows,
    /// or `None` if no rollup has ever run.
    async fn enrollment_watermark(&self) -> Result<Option<DateTime<Utc>>>;

    /// Returns all per-student enrollment state rows.
    async fn enrollment_states(&self) -> Result<Vec<EnrollmentStudentState>>;

    /// Returns the most recent daily snapshot per course.
    ///
    /// Rollup passes seed two things from this row: the running total, and
    /// the still-open bucket for that day (new events on the same calendar
    /// day extend its counters instead of replacing them).
    async fn latest_daily_snapshots(&self) -> Result<HashMap<CourseKey, EnrollmentDailySnapshot>>;

    /// Returns daily snapshots for the course within `[from, to]`, ordered
    /// by day ascending.
    async fn daily_snapshots_in_range(
        &self,
        course: &CourseKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EnrollmentDailySnapshot>>;

    /// Returns the most recent daily snapshot strictly before `day`.
    async fn last_daily_before(
        &self,
        course: &CourseKey,
        day: NaiveDate,
    ) -> Result<Option<EnrollmentDailySnapshot>>;

    /// Atomically applies one enrollment rollup pass: upserts the given
    /// student-state rows and create-or-updates the given daily snapshots.
    async fn commit_enrollment_rollup(
        &self,
        states: Vec<EnrollmentStudentState>,
        snapshots: Vec<EnrollmentDailySnapshot>,
    ) -> Result<()>;

    // --- Grade rollup rows ---

    /// Returns the newest grade-rollup checkpoint, if any pass completed.
    async fn latest_grade_checkpoint(&self) -> Result<Option<GradeRollupCheckpoint>>;

    /// Returns all grade snapshots for the course, ordered by username.
    async fn grade_snapshots(&self, course: &CourseKey) -> Result<Vec<GradeSnapshot>>;

    /// Returns pairs explicitly flagged for forced recomputation.
    async fn forced_grade_pairs(&self) -> Result<Vec<(CourseKey, StudentId)>>;

    /// Flags a pair for forced recomputation on the next grade pass
    /// (e.g. after a role change invalidated the cached grade).
    async fn flag_for_regrade(&self, course: &CourseKey, student: StudentId) -> Result<()>;

    /// Atomically applies one grade rollup pass: upserts and deletes
    /// snapshots, appends the checkpoint, prunes checkpoint history to
    /// `retain_checkpoints` rows, and clears exactly the force flags listed
    /// in `consumed_flags`.
    async fn commit_grade_rollup(&self, commit: GradeRollupCommit) -> Result<()>;
}
