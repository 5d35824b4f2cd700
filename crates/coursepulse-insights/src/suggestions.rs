//! Suggestion rules.
//!
//! Two closed rules scan the funnel and homework statistics for content
//! that is statistically harder than the rest of the course, and emit
//! human-readable pointers at it. Rules are pure: they consume already
//! built views and return suggestions, funnel rule first.

use serde::Serialize;

use coursepulse_core::UsageKey;

use crate::funnel::FunnelNode;
use crate::problems::HomeworkStats;
use crate::stats;

/// Dashboard tab a suggestion points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionTab {
    /// The funnel view.
    Funnel,
    /// The homework/problem statistics view.
    Problems,
}

/// Where a suggestion points: a tab plus the item to highlight on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionSource {
    /// The tab.
    pub tab: SuggestionTab,
    /// The content item to highlight.
    pub item_id: UsageKey,
}

/// One actionable hint shown to course staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Message shown to the user.
    pub description: String,
    /// Tab and item the message refers to.
    pub location: SuggestionSource,
}

/// Fraction of the students who entered a node that stopped there.
fn stuck_ratio(node: &FunnelNode) -> f64 {
    if node.student_count_in <= 0 || node.student_count <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        node.student_count as f64 / node.student_count_in as f64
    }
}

/// Collects subsection-level funnel nodes that any student has entered.
fn visited_subsections(nodes: &[FunnelNode]) -> Vec<&FunnelNode> {
    let mut result = Vec::new();
    for node in nodes {
        if node.level == 1 && node.student_count_in > 0 {
            result.push(node);
        }
        result.extend(visited_subsections(&node.children));
    }
    result
}

/// Flags subsections where unusually many students stall.
///
/// The threshold is mean plus standard deviation over the stuck ratios of
/// all visited subsections, computed only on ratios below `1.0` so a
/// trailing subsection (where everyone currently is) does not drown the
/// signal. Ratios at `1.0` are likewise never flagged themselves.
#[must_use]
pub fn funnel_suggestions(funnel: &[FunnelNode]) -> Vec<Suggestion> {
    let subsections = visited_subsections(funnel);
    let ratios: Vec<f64> = subsections
        .iter()
        .map(|node| stuck_ratio(node))
        .filter(|&r| r < 1.0)
        .collect();
    let Some(mean) = stats::mean(&ratios) else {
        return Vec::new();
    };
    let threshold = mean + stats::std_dev(&ratios).unwrap_or(0.0);

    subsections
        .into_iter()
        .filter_map(|node| {
            let ratio = stuck_ratio(node);
            if (threshold..1.0).contains(&ratio) {
                Some(Suggestion {
                    description: format!(
                        "Take a look at \"{}\" - the number of students that \
                         stuck there is {:.0}% higher than average.",
                        node.name,
                        ratio * 100.0
                    ),
                    location: SuggestionSource {
                        tab: SuggestionTab::Funnel,
                        item_id: node.id.clone(),
                    },
                })
            } else {
                None
            }
        })
        .collect()
}

/// Flags homeworks whose success score falls well below the course average.
///
/// A homework's success score is its average correct fraction divided by
/// its average attempt count, zero when there are no attempts. The
/// threshold is mean minus standard deviation over the nonzero scores;
/// zero scores carry no data and are never flagged.
#[must_use]
pub fn problem_suggestions(stats_view: &HomeworkStats) -> Vec<Suggestion> {
    let scores: Vec<f64> = stats_view
        .correct_answer
        .iter()
        .zip(&stats_view.attempts)
        .map(|(&correct, &attempts)| {
            if attempts > 0.0 {
                correct / attempts
            } else {
                0.0
            }
        })
        .collect();

    let nonzero: Vec<f64> = scores.iter().copied().filter(|&s| s > 0.0).collect();
    let Some(mean) = stats::mean(&nonzero) else {
        return Vec::new();
    };
    let threshold = mean - stats::std_dev(&nonzero).unwrap_or(0.0);

    scores
        .iter()
        .enumerate()
        .filter(|&(_, &score)| score > 0.0 && score < threshold)
        .map(|(i, _)| Suggestion {
            description: format!(
                "Take a look at `{}`: there is too high avg attempts number \
                 and too low value of the mean success rate",
                stats_view.names[i]
            ),
            location: SuggestionSource {
                tab: SuggestionTab::Problems,
                item_id: stats_view.subsection_ids[i].clone(),
            },
        })
        .collect()
}

/// Runs all rules and concatenates their output, funnel rule first.
#[must_use]
pub fn generate_suggestions(funnel: &[FunnelNode], homework: &HomeworkStats) -> Vec<Suggestion> {
    let mut suggestions = funnel_suggestions(funnel);
    suggestions.extend(problem_suggestions(homework));
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursepulse_test_utils::test_usage_key;

    fn subsection(name: &str, count: i64, count_in: i64) -> FunnelNode {
        FunnelNode {
            level: 1,
            id: test_usage_key("sequential", name),
            name: name.to_string(),
            student_count: count,
            student_count_in: count_in,
            student_count_out: count_in - count,
            children: Vec::new(),
        }
    }

    fn section(children: Vec<FunnelNode>) -> FunnelNode {
        let count_in = children.iter().map(|c| c.student_count_in).max().unwrap_or(0);
        FunnelNode {
            level: 0,
            id: test_usage_key("chapter", "sec1"),
            name: "Section 1".to_string(),
            student_count: children.iter().map(|c| c.student_count).sum(),
            student_count_in: count_in,
            student_count_out: 0,
            children,
        }
    }

    #[test]
    fn funnel_rule_flags_the_outlier_subsection() {
        // stuck ratios: 0.1, 0.1, 0.8; mean 1/3, std ~0.33, threshold ~0.66.
        let funnel = vec![section(vec![
            subsection("smooth-a", 1, 10),
            subsection("smooth-b", 1, 10),
            subsection("sticky", 8, 10),
        ])];
        let suggestions = funnel_suggestions(&funnel);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].location.tab, SuggestionTab::Funnel);
        assert_eq!(
            suggestions[0].location.item_id,
            test_usage_key("sequential", "sticky")
        );
        assert!(suggestions[0].description.contains("sticky"));
        assert!(suggestions[0].description.contains("80%"));
    }

    #[test]
    fn funnel_rule_never_flags_fully_stuck_nodes() {
        // The last subsection everyone sits in has ratio 1.0 and must not
        // be reported even though it exceeds any threshold. With ratios
        // 0.1 and 0.2 in play the threshold lands at 0.2, so only "mid"
        // qualifies.
        let funnel = vec![section(vec![
            subsection("early", 1, 10),
            subsection("mid", 2, 10),
            subsection("terminal", 8, 8),
        ])];
        let suggestions = funnel_suggestions(&funnel);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(
            suggestions[0].location.item_id,
            test_usage_key("sequential", "mid")
        );
    }

    #[test]
    fn funnel_rule_handles_empty_and_unvisited_trees() {
        assert!(funnel_suggestions(&[]).is_empty());
        let funnel = vec![section(vec![subsection("ghost", 0, 0)])];
        assert!(funnel_suggestions(&funnel).is_empty());
    }

    fn homework(names_scores: &[(&str, f64, f64)]) -> HomeworkStats {
        let mut stats = HomeworkStats::default();
        for (name, correct, attempts) in names_scores {
            stats.names.push((*name).to_string());
            stats
                .subsection_ids
                .push(test_usage_key("sequential", name));
            stats.correct_answer.push(*correct);
            stats.attempts.push(*attempts);
            stats.problems.push(Vec::new());
        }
        stats
    }

    #[test]
    fn problem_rule_flags_low_success_homeworks() {
        // success scores: 0.9, 0.8, 0.1; mean 0.6, std ~0.356,
        // threshold ~0.244. Only the last homework falls below it.
        let stats = homework(&[
            ("easy-a", 0.9, 1.0),
            ("easy-b", 0.8, 1.0),
            ("brutal", 0.3, 3.0),
        ]);
        let suggestions = problem_suggestions(&stats);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].location.tab, SuggestionTab::Problems);
        assert_eq!(
            suggestions[0].location.item_id,
            test_usage_key("sequential", "brutal")
        );
    }

    #[test]
    fn problem_rule_ignores_homeworks_without_attempts() {
        let stats = homework(&[("idle", 0.0, 0.0), ("active", 0.5, 1.0)]);
        // The zero score is excluded from the statistics and never flagged.
        assert!(problem_suggestions(&stats).is_empty());
    }

    #[test]
    fn combined_output_lists_funnel_suggestions_first() {
        let funnel = vec![section(vec![
            subsection("smooth-a", 1, 10),
            subsection("smooth-b", 1, 10),
            subsection("sticky", 8, 10),
        ])];
        let stats = homework(&[
            ("easy-a", 0.9, 1.0),
            ("easy-b", 0.8, 1.0),
            ("brutal", 0.3, 3.0),
        ]);
        let all = generate_suggestions(&funnel, &stats);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].location.tab, SuggestionTab::Funnel);
        assert_eq!(all[1].location.tab, SuggestionTab::Problems);
    }
}
