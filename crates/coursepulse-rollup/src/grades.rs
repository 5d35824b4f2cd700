//! Diff-based grade rollup.
//!
//! Recomputes per-student grade snapshots only where something changed since
//! the last completed pass. The persisted checkpoint log supplies the diff
//! boundary: the newest row's timestamp is the "since" watermark, and a new
//! row is appended by the same commit that writes the pass's snapshots, so
//! the watermark and the data can never disagree.
//!
//! ## Candidate Set
//!
//! - first pass ever: every currently-enrolled (student, course) pair;
//! - otherwise: pairs with graded activity after the checkpoint, plus pairs
//!   explicitly flagged for recomputation, plus pairs newly enrolled since
//!   the checkpoint — intersected with current active enrollments (stale
//!   activity without an enrollment is dropped);
//! - instructor/staff accounts are excluded per course, and any snapshot
//!   previously stored for them is deleted.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn, Instrument};

use coursepulse_core::observability::rollup_span;
use coursepulse_core::records::{GradeRollupCheckpoint, GradeSnapshot};
use coursepulse_core::store::{
    ActivitySource, AnalyticsStore, ContentSource, CoursePair, EnrollmentSource, GradeProvider,
    GradeRollupCommit, GradeSummary, StudentDirectory,
};
use coursepulse_core::{CourseKey, StudentId};

use crate::error::{Error, Result};
use crate::RollupOutcome;

/// How many checkpoint rows to keep by default.
pub const DEFAULT_CHECKPOINT_RETENTION: usize = 3;

/// Label of the synthetic overall entry appended to each exam mapping.
pub const TOTAL_LABEL: &str = "total";

/// The grade rollup engine.
pub struct GradeRollup {
    store: Arc<dyn AnalyticsStore>,
    enrollment: Arc<dyn EnrollmentSource>,
    activity: Arc<dyn ActivitySource>,
    content: Arc<dyn ContentSource>,
    grades: Arc<dyn GradeProvider>,
    directory: Arc<dyn StudentDirectory>,
    retain_checkpoints: usize,
}

impl GradeRollup {
    /// Creates an engine over the given store and collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn AnalyticsStore>,
        enrollment: Arc<dyn EnrollmentSource>,
        activity: Arc<dyn ActivitySource>,
        content: Arc<dyn ContentSource>,
        grades: Arc<dyn GradeProvider>,
        directory: Arc<dyn StudentDirectory>,
    ) -> Self {
        Self {
            store,
            enrollment,
            activity,
            content,
            grades,
            directory,
            retain_checkpoints: DEFAULT_CHECKPOINT_RETENTION,
        }
    }

    /// Overrides how many checkpoint rows are retained after each pass.
    #[must_use]
    pub fn with_checkpoint_retention(mut self, retain: usize) -> Self {
        self.retain_checkpoints = retain.max(1);
        self
    }

    /// Runs one diff pass stamped with `now` as the pass-start time.
    ///
    /// Per-student and per-course problems (denied grades, malformed keys,
    /// missing courses or accounts) are logged and skipped. A checkpoint is
    /// appended even when no snapshot changed, so an activity-free window
    /// still advances the watermark.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator call or the final commit fails;
    /// nothing is applied in that case and the checkpoint log is untouched.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RollupOutcome> {
        self.run_pass(now).instrument(rollup_span("grades")).await
    }

    async fn run_pass(&self, now: DateTime<Utc>) -> Result<RollupOutcome> {
        let (candidates, consumed_flags) = self.candidate_pairs().await?;
        let events_seen: usize = candidates.values().map(Vec::len).sum();

        let mut upserts: Vec<GradeSnapshot> = Vec::new();
        let mut deletes: Vec<(CourseKey, StudentId)> = Vec::new();
        let mut events_skipped = 0_usize;
        let mut courses_touched = 0_usize;

        for (course, students) in candidates {
            // One tree fetch per course amortizes the content lookup across
            // all of its candidate students and doubles as the existence
            // check.
            if self.content.course_tree(&course, 0).await?.is_none() {
                warn!(%course, "skipping grade rollup for missing course");
                events_skipped += students.len();
                continue;
            }

            let staff: HashSet<StudentId> =
                self.enrollment.course_staff(&course).await?.into_iter().collect();
            if !staff.is_empty() {
                for snap in self.store.grade_snapshots(&course).await? {
                    if staff.contains(&snap.student_id) {
                        deletes.push((course.clone(), snap.student_id));
                    }
                }
            }

            let mut wrote_any = false;
            for student in students {
                if staff.contains(&student) {
                    events_skipped += 1;
                    continue;
                }
                let Some(summary) = self.grades.grade_summary(student, &course).await? else {
                    debug!(%course, %student, "no accessible grade; student omitted");
                    events_skipped += 1;
                    continue;
                };
                let Some(username) = self.directory.username(student).await? else {
                    warn!(%course, %student, "skipping grade for unknown account");
                    events_skipped += 1;
                    continue;
                };
                upserts.push(build_snapshot(&course, student, username, &summary));
                wrote_any = true;
            }
            if wrote_any {
                courses_touched += 1;
            }
        }

        let outcome = RollupOutcome {
            events_seen,
            events_applied: upserts.len(),
            events_skipped,
            courses_touched,
        };

        self.store
            .commit_grade_rollup(GradeRollupCommit {
                upserts,
                deletes,
                checkpoint: Some(GradeRollupCheckpoint::at(now)),
                retain_checkpoints: self.retain_checkpoints,
                consumed_flags,
            })
            .await
            .map_err(|err| Error::commit_failed("grade rollup", err))?;

        info!(
            candidates = outcome.events_seen,
            snapshots = outcome.events_applied,
            skipped = outcome.events_skipped,
            courses = outcome.courses_touched,
            "grade rollup committed"
        );
        Ok(outcome)
    }

    /// Resolves the candidate pairs for this pass, grouped by parsed course
    /// key, together with the force flags this pass read (the ones the
    /// commit is allowed to clear). Malformed course ids are logged and
    /// dropped here.
    async fn candidate_pairs(
        &self,
    ) -> Result<(BTreeMap<CourseKey, Vec<StudentId>>, Vec<(CourseKey, StudentId)>)> {
        let mut consumed_flags = Vec::new();
        let raw_pairs = match self.store.latest_grade_checkpoint().await? {
            None => self.enrollment.active_pairs().await?,
            Some(checkpoint) => {
                let since = checkpoint.last_update;
                let mut union: HashSet<CoursePair> = self
                    .activity
                    .graded_pairs_since(since)
                    .await?
                    .into_iter()
                    .collect();
                for (course, student) in self.store.forced_grade_pairs().await? {
                    union.insert(CoursePair::new(student, course.to_string()));
                    consumed_flags.push((course, student));
                }
                union.extend(self.enrollment.enrolled_since(since).await?);

                let active: HashSet<CoursePair> =
                    self.enrollment.active_pairs().await?.into_iter().collect();
                union.retain(|pair| active.contains(pair));
                union.into_iter().collect()
            }
        };

        let mut by_course: BTreeMap<CourseKey, Vec<StudentId>> = BTreeMap::new();
        for pair in raw_pairs {
            match pair.course_id.parse::<CourseKey>() {
                Ok(course) => by_course.entry(course).or_default().push(pair.student_id),
                Err(err) => {
                    warn!(course_id = %pair.course_id, %err, "skipping candidate with malformed course id");
                }
            }
        }
        for students in by_course.values_mut() {
            students.sort_unstable();
            students.dedup();
        }
        Ok((by_course, consumed_flags))
    }
}

/// Converts a grade summary into a persisted snapshot row.
///
/// Section fractions become integer percentages in insertion order, with the
/// overall grade appended under [`TOTAL_LABEL`]; the fractional total is kept
/// alongside for cohort binning.
#[must_use]
pub fn build_snapshot(
    course: &CourseKey,
    student: StudentId,
    username: String,
    summary: &GradeSummary,
) -> GradeSnapshot {
    let mut exam_info: IndexMap<String, u8> = IndexMap::new();
    for section in &summary.section_breakdown {
        exam_info.insert(section.label.clone(), to_percent(section.percent));
    }
    exam_info.insert(TOTAL_LABEL.to_string(), to_percent(summary.percent));
    GradeSnapshot {
        course_id: course.clone(),
        student_id: student,
        username,
        exam_info,
        total: summary.percent,
    }
}

/// Converts a `[0, 1]` fraction to a clamped integer percentage.
fn to_percent(fraction: f64) -> u8 {
    let scaled = (fraction * 100.0).round();
    if scaled.is_nan() || scaled < 0.0 {
        0
    } else if scaled > 100.0 {
        100
    } else {
        // Range-checked above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            scaled as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursepulse_core::store::SectionGrade;

    #[test]
    fn to_percent_rounds_and_clamps() {
        assert_eq!(to_percent(0.666), 67);
        assert_eq!(to_percent(0.0), 0);
        assert_eq!(to_percent(1.0), 100);
        assert_eq!(to_percent(1.7), 100);
        assert_eq!(to_percent(-0.2), 0);
    }

    #[test]
    fn build_snapshot_orders_sections_and_appends_total() {
        let course: CourseKey = "course-v1:RG+Analytics+2024".parse().unwrap();
        let summary = GradeSummary {
            section_breakdown: vec![
                SectionGrade {
                    label: "HW 01".to_string(),
                    percent: 0.8,
                },
                SectionGrade {
                    label: "Midterm".to_string(),
                    percent: 0.5,
                },
            ],
            percent: 0.65,
        };
        let snap = build_snapshot(&course, StudentId(3), "sam".to_string(), &summary);
        let entries: Vec<(&String, &u8)> = snap.exam_info.iter().collect();
        assert_eq!(
            entries,
            [
                (&"HW 01".to_string(), &80),
                (&"Midterm".to_string(), &50),
                (&"total".to_string(), &65)
            ]
        );
        assert!((snap.total - 0.65).abs() < f64::EPSILON);
    }
}
