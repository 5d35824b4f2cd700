//! Cohort binning.
//!
//! Partitions a course's students into progress cohorts by thresholding on
//! the mean and standard deviation of their total grades:
//!
//! 1. compute mean `m` and population std-dev `s` over all grades in `[0,1]`
//! 2. candidate thresholds, ascending: `0`, `m-3s`, `m-0.5s`, `m+0.5s`,
//!    `m+3s`, `1`
//! 3. drop candidates outside `[0,1]` and candidates closer than one
//!    percentage point to the previously accepted one (prevents degenerate
//!    near-duplicate bands when `s` is tiny or huge)
//! 4. each student lands in the first band whose threshold exceeds their
//!    grade; the exact values `0.0` and `1.0` are included in the zero and
//!    top bands respectively
//!
//! The output is transient: built per request, never persisted.

use serde::Serialize;

use coursepulse_core::error::Result;
use coursepulse_core::records::GradeSnapshot;
use coursepulse_core::store::{EmailSender, StudentDirectory};
use coursepulse_core::StudentId;

use crate::stats;

/// Minimum distance between adjacent thresholds (one percentage point).
const MIN_THRESHOLD_GAP: f64 = 0.01;

/// One student's scalar grade, the binning input.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentGrade {
    /// The student.
    pub id: StudentId,
    /// Display name for reporting.
    pub username: String,
    /// Total grade as a fraction in `[0, 1]`.
    pub grade: f64,
}

impl From<&GradeSnapshot> for StudentGrade {
    fn from(snap: &GradeSnapshot) -> Self {
        Self {
            id: snap.student_id,
            username: snap.username.clone(),
            grade: snap.total,
        }
    }
}

/// One contiguous grade band and its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortBand {
    /// Upper bound of the band as an integer percent in `[0, 100]`.
    pub max_progress: u8,
    /// Member student ids.
    pub students_id: Vec<StudentId>,
    /// Member usernames, index-aligned with `students_id`.
    pub students_username: Vec<String>,
    /// This band's share of all students, truncated integer percent.
    pub percent: u8,
}

/// Bins students into non-overlapping grade bands.
///
/// Returns an empty list for empty input (no cohorts rather than a divide
/// by zero). Every student lands in exactly one band.
#[must_use]
pub fn bin_students(students: &[StudentGrade]) -> Vec<CohortBand> {
    if students.is_empty() {
        return Vec::new();
    }

    let grades: Vec<f64> = students.iter().map(|s| s.grade).collect();
    let m = stats::mean(&grades).unwrap_or(0.0);
    let s = stats::std_dev(&grades).unwrap_or(0.0);

    let mut thresholds = vec![0.0_f64];
    for candidate in [
        m - 3.0 * s,
        m - 0.5 * s,
        m + 0.5 * s,
        m + 3.0 * s,
        1.0,
    ] {
        let last = *thresholds.last().unwrap_or(&0.0);
        if (0.0..=1.0).contains(&candidate) && candidate - last >= MIN_THRESHOLD_GAP {
            thresholds.push(candidate);
        }
    }

    let mut bands: Vec<CohortBand> = thresholds
        .iter()
        .map(|t| CohortBand {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            max_progress: (t * 100.0).round() as u8,
            students_id: Vec::new(),
            students_username: Vec::new(),
            percent: 0,
        })
        .collect();

    for student in students {
        let slot = thresholds
            .iter()
            .position(|&t| {
                student.grade < t
                    || (student.grade == t && (t == 0.0 || (t - 1.0).abs() < f64::EPSILON))
            })
            // A grade above every threshold can only happen when the 1% merge
            // dropped the 1.0 candidate; fold it into the top band so the
            // partition stays total.
            .unwrap_or(thresholds.len() - 1);
        bands[slot].students_id.push(student.id);
        bands[slot].students_username.push(student.username.clone());
    }

    #[allow(clippy::cast_precision_loss)]
    let total = students.len() as f64;
    for band in &mut bands {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            band.percent = (band.students_id.len() as f64 / total * 100.0) as u8;
        }
    }
    bands
}

/// Display labels for a band sequence: `"zero progress"` for the zero band,
/// `"from X% to Y%"` otherwise.
#[must_use]
pub fn cohort_labels(bands: &[CohortBand]) -> Vec<String> {
    bands
        .iter()
        .enumerate()
        .map(|(i, band)| {
            if band.max_progress == 0 {
                "zero progress".to_string()
            } else {
                let prev = if i == 0 { 0 } else { bands[i - 1].max_progress };
                format!("from {prev} % to {} %", band.max_progress)
            }
        })
        .collect()
}

/// The cohort tab's full payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortReport {
    /// Band display labels.
    pub labels: Vec<String>,
    /// Band percentages, index-aligned with `labels`.
    pub values: Vec<u8>,
    /// The bands themselves.
    pub cohorts: Vec<CohortBand>,
}

impl CohortReport {
    /// Builds the report from a course's persisted grade snapshots.
    #[must_use]
    pub fn from_snapshots(snapshots: &[GradeSnapshot]) -> Self {
        let students: Vec<StudentGrade> = snapshots.iter().map(StudentGrade::from).collect();
        let cohorts = bin_students(&students);
        Self {
            labels: cohort_labels(&cohorts),
            values: cohorts.iter().map(|c| c.percent).collect(),
            cohorts,
        }
    }
}

/// Sends one message to every resolvable member of a cohort.
///
/// Resolution and delivery are both delegated: unknown student ids are
/// silently dropped by the directory, and the sender is expected to be
/// queue-backed. Nothing is sent when no address resolves.
pub async fn send_cohort_message(
    directory: &dyn StudentDirectory,
    sender: &dyn EmailSender,
    students: &[StudentId],
    subject: &str,
    body: &str,
) -> Result<()> {
    let recipients = directory.emails_for(students).await?;
    if recipients.is_empty() {
        return Ok(());
    }
    sender.send(subject, body, &recipients).await
}
