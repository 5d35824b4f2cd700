//! Property-based tests for the insight invariants.
//!
//! These tests use proptest to verify the cohort partition and funnel
//! conservation invariants across randomly generated inputs.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use proptest::prelude::*;

use coursepulse_core::{StudentId, UsageKey};
use coursepulse_insights::cohort::{bin_students, StudentGrade};
use coursepulse_insights::funnel::{
    append_inout_info, build_funnel, FunnelNode, PositionCount,
};
use coursepulse_test_utils::{single_branch_course, test_usage_key};

/// Generates a grade as a fraction in `[0, 1]` with two-decimal resolution.
fn arb_grade() -> impl Strategy<Value = f64> {
    (0u32..=100).prop_map(|g| f64::from(g) / 100.0)
}

/// Generates a non-empty roster of students with random grades.
fn arb_roster() -> impl Strategy<Value = Vec<StudentGrade>> {
    prop::collection::vec(arb_grade(), 1..120).prop_map(|grades| {
        grades
            .into_iter()
            .enumerate()
            .map(|(i, grade)| StudentGrade {
                id: StudentId(i as i64),
                username: format!("user{i}"),
                grade,
            })
            .collect()
    })
}

/// Generates per-offset student counts for the two-unit fixture subsection.
/// Offsets may overflow the unit list to exercise clamping.
fn arb_position_counts() -> impl Strategy<Value = Vec<PositionCount>> {
    prop::collection::vec((1usize..=4, 1i64..50), 0..4).prop_map(|raw| {
        let mut by_offset: HashMap<usize, i64> = HashMap::new();
        for (offset, count) in raw {
            *by_offset.entry(offset).or_insert(0) += count;
        }
        let mut positions: Vec<PositionCount> = by_offset
            .into_iter()
            .map(|(offset, count)| PositionCount { offset, count })
            .collect();
        positions.sort_by_key(|p| p.offset);
        positions
    })
}

/// Walks a funnel checking the flow identity and parent/child bounds.
fn assert_flow_invariants(nodes: &[FunnelNode]) {
    for node in nodes {
        assert_eq!(
            node.student_count_out,
            node.student_count_in - node.student_count,
            "flow identity violated at {}",
            node.id
        );
        assert!(node.student_count_in >= 0);
        assert!(node.student_count_out >= 0);
        for child in &node.children {
            assert!(
                node.student_count_in >= child.student_count_in,
                "child {} exceeds parent {} inflow",
                child.id,
                node.id
            );
        }
        assert_flow_invariants(&node.children);
    }
}

proptest! {
    #[test]
    fn cohorts_partition_the_roster(students in arb_roster()) {
        let bands = bin_students(&students);

        let member_total: usize = bands.iter().map(|b| b.students_id.len()).sum();
        prop_assert_eq!(member_total, students.len());

        for band in &bands {
            prop_assert_eq!(band.students_id.len(), band.students_username.len());
            prop_assert!(band.max_progress <= 100);
        }

        let progress: Vec<u8> = bands.iter().map(|b| b.max_progress).collect();
        let mut sorted = progress.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(&sorted, &progress, "band bounds must strictly increase");
    }

    #[test]
    fn cohort_percentages_never_exceed_the_whole(students in arb_roster()) {
        let bands = bin_students(&students);
        let percent_total: u32 = bands.iter().map(|b| u32::from(b.percent)).sum();
        // Truncation loses at most one point per band.
        prop_assert!(percent_total <= 100);
    }

    #[test]
    fn funnel_flow_is_conserved(positions in arb_position_counts()) {
        let mut activity: HashMap<UsageKey, Vec<PositionCount>> = HashMap::new();
        let total: i64 = positions.iter().map(|p| p.count).sum();
        if !positions.is_empty() {
            activity.insert(test_usage_key("sequential", "sub1"), positions);
        }

        let mut funnel = build_funnel(&single_branch_course(), &activity);
        append_inout_info(&mut funnel);

        assert_flow_invariants(&funnel);

        // Every counted student is attributed exactly once at section level.
        let section_total: i64 = funnel.iter().map(|n| n.student_count).sum();
        prop_assert_eq!(section_total, total);
    }
}
