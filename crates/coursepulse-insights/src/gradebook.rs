//! Gradebook read model.
//!
//! Tabulates a course's persisted grade snapshots for display: one row per
//! student, one column per exam, with an optional substring filter on the
//! username.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::Instrument;

use coursepulse_core::error::Result;
use coursepulse_core::observability::insight_span;
use coursepulse_core::store::AnalyticsStore;
use coursepulse_core::CourseKey;

/// Tabular gradebook payload, rows ordered by username.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Gradebook {
    /// Row labels.
    pub students_names: Vec<String>,
    /// Column labels, taken from the first row's exam mapping.
    pub exam_names: Vec<String>,
    /// Per-student exam percentages, index-aligned with `students_names`.
    pub student_info: Vec<IndexMap<String, u8>>,
}

/// Builds the gradebook for one course.
///
/// `filter` narrows the rows to usernames containing the given substring,
/// case-insensitive. Column order follows the rollup's stored exam
/// ordering, so every row shares one header.
///
/// # Errors
///
/// Propagates store failures unchanged.
pub async fn build(
    store: &dyn AnalyticsStore,
    course: &CourseKey,
    filter: Option<&str>,
) -> Result<Gradebook> {
    let span = insight_span("gradebook", &course.to_string());
    async {
        let snapshots = store.grade_snapshots(course).await?;
        let needle = filter.map(str::to_lowercase);

        let mut gradebook = Gradebook::default();
        for snapshot in snapshots {
            if let Some(needle) = &needle {
                if !snapshot.username.to_lowercase().contains(needle) {
                    continue;
                }
            }
            if gradebook.exam_names.is_empty() {
                gradebook.exam_names = snapshot.exam_info.keys().cloned().collect();
            }
            gradebook.students_names.push(snapshot.username);
            gradebook.student_info.push(snapshot.exam_info);
        }
        Ok(gradebook)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursepulse_core::records::GradeSnapshot;
    use coursepulse_core::store::memory::MemoryStore;
    use coursepulse_core::StudentId;
    use coursepulse_test_utils::test_course;

    fn snapshot(course: &CourseKey, id: i64, username: &str, exams: &[(&str, u8)]) -> GradeSnapshot {
        GradeSnapshot {
            course_id: course.clone(),
            student_id: StudentId(id),
            username: username.to_string(),
            exam_info: exams
                .iter()
                .map(|(name, grade)| ((*name).to_string(), *grade))
                .collect(),
            total: 0.0,
        }
    }

    #[tokio::test]
    async fn rows_are_ordered_and_columns_come_from_the_first_row() {
        let course = test_course();
        let store = MemoryStore::new();
        store
            .seed_grade_snapshots(vec![
                snapshot(&course, 2, "zoe", &[("Midterm", 40), ("total", 40)]),
                snapshot(&course, 1, "adam", &[("Midterm", 80), ("total", 80)]),
            ])
            .unwrap();

        let gradebook = build(&store, &course, None).await.unwrap();
        assert_eq!(gradebook.students_names, ["adam", "zoe"]);
        assert_eq!(gradebook.exam_names, ["Midterm", "total"]);
        assert_eq!(gradebook.student_info[0]["Midterm"], 80);
    }

    #[tokio::test]
    async fn username_filter_is_case_insensitive() {
        let course = test_course();
        let store = MemoryStore::new();
        store
            .seed_grade_snapshots(vec![
                snapshot(&course, 1, "Adam", &[("total", 80)]),
                snapshot(&course, 2, "zoe", &[("total", 40)]),
            ])
            .unwrap();

        let gradebook = build(&store, &course, Some("ADA")).await.unwrap();
        assert_eq!(gradebook.students_names, ["Adam"]);
        assert_eq!(gradebook.exam_names, ["total"]);
    }

    #[tokio::test]
    async fn empty_course_yields_an_empty_table() {
        let store = MemoryStore::new();
        let gradebook = build(&store, &test_course(), None).await.unwrap();
        assert!(gradebook.students_names.is_empty());
        assert!(gradebook.exam_names.is_empty());
    }
}
