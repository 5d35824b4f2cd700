//! Homework and problem statistics.
//!
//! Aggregates graded problem interactions into per-problem averages, then
//! rolls them up per graded subsection ("homework") for the dashboard and
//! for the problem-difficulty suggestion rule.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use coursepulse_core::content::CourseBlock;
use coursepulse_core::store::ModuleActivityRecord;
use coursepulse_core::UsageKey;

/// Average performance on one problem across all graded interactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProblemPerformance {
    /// Correct fraction: summed earned grade over summed max grade.
    pub grade_avg: f64,
    /// Average attempt count, parsed from the state blobs.
    pub attempts_avg: f64,
}

/// Folds graded problem rows into per-problem averages.
///
/// Rows without both `grade` and `max_grade` are ungraded interactions and
/// are ignored, as are problems whose summed max grade is zero.
#[must_use]
pub fn problem_performance(
    records: &[ModuleActivityRecord],
) -> HashMap<UsageKey, ProblemPerformance> {
    struct Acc {
        grade_sum: f64,
        max_grade_sum: f64,
        attempts_sum: f64,
        rows: u32,
    }

    let mut by_problem: HashMap<UsageKey, Acc> = HashMap::new();
    for record in records {
        let (Some(grade), Some(max_grade)) = (record.grade, record.max_grade) else {
            continue;
        };
        let attempts = parse_attempts(&record.state).unwrap_or_else(|| {
            debug!(module = %record.module_key, "graded row without attempts field");
            0.0
        });
        let acc = by_problem.entry(record.module_key.clone()).or_insert(Acc {
            grade_sum: 0.0,
            max_grade_sum: 0.0,
            attempts_sum: 0.0,
            rows: 0,
        });
        acc.grade_sum += grade;
        acc.max_grade_sum += max_grade;
        acc.attempts_sum += attempts;
        acc.rows += 1;
    }

    by_problem
        .into_iter()
        .filter(|(_, acc)| acc.max_grade_sum > 0.0 && acc.rows > 0)
        .map(|(key, acc)| {
            (
                key,
                ProblemPerformance {
                    grade_avg: acc.grade_sum / acc.max_grade_sum,
                    attempts_avg: acc.attempts_sum / f64::from(acc.rows),
                },
            )
        })
        .collect()
}

/// Extracts the attempt counter from a problem state blob.
fn parse_attempts(state: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(state).ok()?;
    value.get("attempts")?.as_f64()
}

/// Per-homework aggregates for one course, index-aligned across all fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HomeworkStats {
    /// Subsection display names.
    pub names: Vec<String>,
    /// Subsection identifiers.
    pub subsection_ids: Vec<UsageKey>,
    /// Average correct fraction over the subsection's problems with data.
    pub correct_answer: Vec<f64>,
    /// Average attempt count over the subsection's problems with data.
    pub attempts: Vec<f64>,
    /// All problem ids under the subsection, with or without data.
    pub problems: Vec<Vec<UsageKey>>,
}

impl HomeworkStats {
    /// Number of homework subsections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the course has no graded subsections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Rolls per-problem averages up to the course's graded subsections.
///
/// Only subsections flagged as graded participate. A subsection's averages
/// cover just the problems that have interaction data; problems without
/// data still appear in `problems` so the dashboard can drill into them.
#[must_use]
pub fn homework_stats(
    course: &CourseBlock,
    performance: &HashMap<UsageKey, ProblemPerformance>,
) -> HomeworkStats {
    let mut stats = HomeworkStats::default();

    for subsection in course.subsections() {
        if !subsection.graded {
            continue;
        }
        let mut correct_sum = 0.0;
        let mut attempts_sum = 0.0;
        let mut problems_with_data = 0_u32;
        let mut problem_ids = Vec::new();

        for unit in &subsection.children {
            for child in &unit.children {
                if !child.is_problem() {
                    continue;
                }
                if let Some(perf) = performance.get(&child.usage_key) {
                    correct_sum += perf.grade_avg;
                    attempts_sum += perf.attempts_avg;
                    problems_with_data += 1;
                }
                problem_ids.push(child.usage_key.clone());
            }
        }

        let divisor = f64::from(problems_with_data.max(1));
        stats.names.push(subsection.display_name.clone());
        stats.subsection_ids.push(subsection.usage_key.clone());
        stats.correct_answer.push(if problems_with_data > 0 {
            correct_sum / divisor
        } else {
            0.0
        });
        stats.attempts.push(if problems_with_data > 0 {
            attempts_sum / divisor
        } else {
            0.0
        });
        stats.problems.push(problem_ids);
    }
    stats
}

/// Correct/incorrect answer totals for a requested list of problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemDetail {
    /// Summed earned grade per problem, rounded.
    pub correct: Vec<i64>,
    /// Summed missed grade (max minus earned) per problem, rounded.
    pub incorrect: Vec<i64>,
}

/// Computes answer totals for each requested problem, in request order.
///
/// Problems without any graded rows report zero on both sides.
#[must_use]
pub fn problem_detail(records: &[ModuleActivityRecord], problems: &[UsageKey]) -> ProblemDetail {
    let mut sums: HashMap<&UsageKey, (f64, f64)> = HashMap::new();
    for record in records {
        let (Some(grade), Some(max_grade)) = (record.grade, record.max_grade) else {
            continue;
        };
        let entry = sums.entry(&record.module_key).or_insert((0.0, 0.0));
        entry.0 += grade;
        entry.1 += max_grade;
    }

    let mut detail = ProblemDetail::default();
    for problem in problems {
        let (grade_sum, max_sum) = sums.get(problem).copied().unwrap_or((0.0, 0.0));
        #[allow(clippy::cast_possible_truncation)]
        {
            detail.correct.push(grade_sum.round() as i64);
            detail
                .incorrect
                .push((max_sum - grade_sum).max(0.0).round() as i64);
        }
    }
    detail
}
