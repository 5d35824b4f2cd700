//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test data with sensible defaults:
//! course keys, content trees, enrollment transitions and module-state
//! blobs shaped like the platform's.

use chrono::{DateTime, TimeZone, Utc};

use coursepulse_core::store::{EnrollmentTransition, ModuleActivityRecord, ModuleKind};
use coursepulse_core::{CourseBlock, CourseKey, StudentId, UsageKey};

/// Returns the standard test course key.
#[must_use]
pub fn test_course() -> CourseKey {
    "course-v1:RG+Analytics+2024"
        .parse()
        .expect("static key parses")
}

/// Builds a usage key inside [`test_course`].
#[must_use]
pub fn test_usage_key(category: &str, name: &str) -> UsageKey {
    UsageKey::new(test_course(), category, name).expect("static key parses")
}

/// Returns a UTC timestamp on 2024-05-`day` at `hour`:00:00.
#[must_use]
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0)
        .single()
        .expect("valid fixture time")
}

/// Builds an enrollment transition with a raw course-id string.
#[must_use]
pub fn transition(
    student: i64,
    course_id: &str,
    timestamp: DateTime<Utc>,
    is_active: bool,
) -> EnrollmentTransition {
    EnrollmentTransition {
        student_id: StudentId(student),
        course_id: course_id.to_string(),
        timestamp,
        is_active,
    }
}

/// Builds a content block with the given children.
#[must_use]
pub fn block(category: &str, name: &str, display_name: &str, children: Vec<CourseBlock>) -> CourseBlock {
    CourseBlock {
        usage_key: test_usage_key(category, name),
        display_name: display_name.to_string(),
        category: category.to_string(),
        graded: false,
        children,
    }
}

/// Builds a graded content block with the given children.
#[must_use]
pub fn graded_block(
    category: &str,
    name: &str,
    display_name: &str,
    children: Vec<CourseBlock>,
) -> CourseBlock {
    CourseBlock {
        graded: true,
        ..block(category, name, display_name, children)
    }
}

/// A minimal course: one section, one subsection, two units.
///
/// Matches the single-branch funnel scenario used across the funnel and
/// suggestion tests.
#[must_use]
pub fn single_branch_course() -> CourseBlock {
    block(
        "course",
        "root",
        "Test Course",
        vec![block(
            "chapter",
            "sec1",
            "Section 1",
            vec![block(
                "sequential",
                "sub1",
                "Subsection 1",
                vec![
                    block("vertical", "unit1", "Unit 1", vec![]),
                    block("vertical", "unit2", "Unit 2", vec![]),
                ],
            )],
        )],
    )
}

/// Returns a sequential-module state blob with the given 1-indexed position.
#[must_use]
pub fn sequential_state(position: u32) -> String {
    format!("{{\"position\": {position}}}")
}

/// Returns a problem-module state blob with the given attempt count.
#[must_use]
pub fn problem_state(attempts: u32) -> String {
    format!("{{\"attempts\": {attempts}, \"done\": true}}")
}

/// Builds a sequential-module activity record.
#[must_use]
pub fn sequential_record(
    student: i64,
    subsection: &UsageKey,
    position: u32,
    modified_at: DateTime<Utc>,
) -> ModuleActivityRecord {
    ModuleActivityRecord {
        student_id: StudentId(student),
        module_key: subsection.clone(),
        kind: ModuleKind::Sequential,
        state: sequential_state(position),
        grade: None,
        max_grade: None,
        modified_at,
    }
}

/// Builds a graded problem activity record.
#[must_use]
pub fn problem_record(
    student: i64,
    problem: &UsageKey,
    grade: f64,
    max_grade: f64,
    attempts: u32,
    modified_at: DateTime<Utc>,
) -> ModuleActivityRecord {
    ModuleActivityRecord {
        student_id: StudentId(student),
        module_key: problem.clone(),
        kind: ModuleKind::Problem,
        state: problem_state(attempts),
        grade: Some(grade),
        max_grade: Some(max_grade),
        modified_at,
    }
}
