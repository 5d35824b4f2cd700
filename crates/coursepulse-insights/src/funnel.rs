//! Funnel tree builder.
//!
//! Overlays per-subsection progression counts on the course content tree:
//! each student's latest sequential-module state carries the 1-indexed
//! `position` of the furthest child unit they reached, and the funnel counts
//! how many students sit at each position. A second pass annotates every
//! node with in/out flow:
//!
//! - `student_count_in`: students who reached this node or anything after it
//! - `student_count_out`: students who moved past it (later siblings and
//!   their subtrees)
//!
//! Siblings are processed in reverse so the flow metric reads "how far past
//! me did people get", which is what makes the rendered funnel narrow
//! toward harder content.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn, Instrument};

use coursepulse_core::content::CourseBlock;
use coursepulse_core::error::{Error, Result};
use coursepulse_core::observability::insight_span;
use coursepulse_core::store::{ActivitySource, ContentSource, ModuleActivityRecord, ModuleKind};
use coursepulse_core::{CourseKey, StudentId, UsageKey};

/// Tree depth requested from the content store (down to problem leaves).
const FUNNEL_TREE_DEPTH: u32 = 4;

/// One node of the funnel view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelNode {
    /// Tree level: 0 = section, 1 = subsection, 2 = unit, 3 = leaf.
    pub level: u8,
    /// Identifier of the underlying content block.
    pub id: UsageKey,
    /// Display title of the underlying content block.
    pub name: String,
    /// Students whose furthest position is exactly here.
    pub student_count: i64,
    /// Students who reached this node or anything after it.
    pub student_count_in: i64,
    /// Students who moved past this node.
    pub student_count_out: i64,
    /// Ordered child nodes.
    pub children: Vec<FunnelNode>,
}

impl FunnelNode {
    fn from_block(block: &CourseBlock, level: u8) -> Self {
        Self {
            level,
            id: block.usage_key.clone(),
            name: block.display_name.clone(),
            student_count: 0,
            student_count_in: 0,
            student_count_out: 0,
            children: Vec::new(),
        }
    }
}

/// Students grouped by their furthest-reached position within a subsection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCount {
    /// 1-indexed child-unit offset from the state blob. [`build_funnel`]
    /// treats anything below 1 as the first unit.
    pub offset: usize,
    /// Students whose latest state sits at this offset.
    pub count: i64,
}

/// Folds raw sequential-module rows into per-subsection position counts.
///
/// Only each student's most recently modified row per subsection counts;
/// earlier rows are superseded navigation history. Rows whose state blob has
/// no parseable 1-indexed `position` are logged and dropped.
#[must_use]
pub fn subsection_activity(
    records: &[ModuleActivityRecord],
) -> HashMap<UsageKey, Vec<PositionCount>> {
    let mut latest: HashMap<(StudentId, UsageKey), &ModuleActivityRecord> = HashMap::new();
    for record in records {
        let key = (record.student_id, record.module_key.clone());
        match latest.get(&key) {
            Some(existing) if existing.modified_at >= record.modified_at => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut counts: HashMap<UsageKey, HashMap<usize, i64>> = HashMap::new();
    for record in latest.into_values() {
        let Some(offset) = parse_position(&record.state) else {
            debug!(module = %record.module_key, "state blob without position; row dropped");
            continue;
        };
        *counts
            .entry(record.module_key.clone())
            .or_default()
            .entry(offset)
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(key, by_offset)| {
            let mut positions: Vec<PositionCount> = by_offset
                .into_iter()
                .map(|(offset, count)| PositionCount { offset, count })
                .collect();
            positions.sort_by_key(|p| p.offset);
            (key, positions)
        })
        .collect()
}

/// Extracts the 1-indexed `position` field from a sequential state blob.
fn parse_position(state: &str) -> Option<usize> {
    let value: serde_json::Value = serde_json::from_str(state).ok()?;
    let position = value.get("position")?.as_u64()?;
    if position == 0 {
        return None;
    }
    usize::try_from(position).ok()
}

/// Mirrors the course tree into funnel nodes and applies activity counts.
///
/// Returns one root per top-level section. A position offset past a
/// subsection's last unit is clamped to that unit (a data-quality artifact
/// of content edits after the activity was recorded), never an index error.
#[must_use]
pub fn build_funnel(
    course: &CourseBlock,
    activity: &HashMap<UsageKey, Vec<PositionCount>>,
) -> Vec<FunnelNode> {
    let mut sections = Vec::new();
    for section_block in &course.children {
        let mut section = FunnelNode::from_block(section_block, 0);
        for subsection_block in &section_block.children {
            let mut subsection = FunnelNode::from_block(subsection_block, 1);
            for unit_block in &subsection_block.children {
                let mut unit = FunnelNode::from_block(unit_block, 2);
                for leaf in &unit_block.children {
                    if leaf.is_problem() {
                        unit.children.push(FunnelNode::from_block(leaf, 3));
                    }
                }
                subsection.children.push(unit);
            }

            if let Some(positions) = activity.get(&subsection.id) {
                apply_positions(&mut subsection, positions);
                section.student_count += subsection.student_count;
            }
            section.children.push(subsection);
        }
        sections.push(section);
    }
    sections
}

/// Adds position-grouped counts to a subsection and its child units.
fn apply_positions(subsection: &mut FunnelNode, positions: &[PositionCount]) {
    if subsection.children.is_empty() {
        // Activity against a subsection whose units were since removed.
        warn!(subsection = %subsection.id, "activity for subsection without units; counts kept on the subsection only");
        subsection.student_count += positions.iter().map(|p| p.count).sum::<i64>();
        return;
    }
    let last = subsection.children.len() - 1;
    for position in positions {
        let index = position.offset.saturating_sub(1);
        if index > last {
            warn!(
                subsection = %subsection.id,
                offset = position.offset,
                units = subsection.children.len(),
                "position offset beyond last unit; clamped"
            );
        }
        subsection.children[index.min(last)].student_count += position.count;
        subsection.student_count += position.count;
    }
}

/// Annotates a funnel with in/out flow.
///
/// Siblings are visited in reverse: a node's `student_count_out` is the
/// accumulator before its own count is added (everyone who got further),
/// its `student_count_in` the accumulator after. Children start from the
/// parent's pre-add value, so a subtree inherits the flow that passed its
/// parent by.
pub fn append_inout_info(nodes: &mut [FunnelNode]) {
    append_inout(nodes, 0);
}

fn append_inout(nodes: &mut [FunnelNode], mut accumulate: i64) {
    for node in nodes.iter_mut().rev() {
        node.student_count_out = accumulate;
        if !node.children.is_empty() {
            append_inout(&mut node.children, accumulate);
        }
        accumulate += node.student_count;
        node.student_count_in = accumulate;
    }
}

/// Builds the complete annotated funnel for one course.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if the content store has no tree for
/// the course; collaborator failures propagate unchanged.
pub async fn course_funnel(
    content: &dyn ContentSource,
    activity: &dyn ActivitySource,
    course: &CourseKey,
) -> Result<Vec<FunnelNode>> {
    let span = insight_span("funnel", &course.to_string());
    async {
        let tree = content
            .course_tree(course, FUNNEL_TREE_DEPTH)
            .await?
            .ok_or_else(|| Error::resource_not_found("course", course))?;
        let records = activity.module_records(course, ModuleKind::Sequential).await?;
        let mut funnel = build_funnel(&tree, &subsection_activity(&records));
        append_inout_info(&mut funnel);
        Ok(funnel)
    }
    .instrument(span)
    .await
}
