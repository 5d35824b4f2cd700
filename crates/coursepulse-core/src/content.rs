//! Course content tree types.
//!
//! The content store is an external collaborator; this module only defines
//! the shape its trees arrive in. A course is a recursive block structure:
//! `course -> chapter (section) -> sequential (subsection) -> vertical
//! (unit) -> leaf components`, fetched to a configurable depth.

use serde::{Deserialize, Serialize};

use crate::id::UsageKey;

/// Block category of a subsection whose children are graded homework.
pub const CATEGORY_SEQUENTIAL: &str = "sequential";
/// Block category of a leaf problem component.
pub const CATEGORY_PROBLEM: &str = "problem";

/// One node of the course content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseBlock {
    /// Identifier of this block.
    pub usage_key: UsageKey,
    /// Human-readable title.
    pub display_name: String,
    /// Block category (`chapter`, `sequential`, `vertical`, `problem`, ...).
    pub category: String,
    /// Whether this block counts toward the grade. Only meaningful on
    /// subsections.
    pub graded: bool,
    /// Ordered child blocks.
    pub children: Vec<CourseBlock>,
}

impl CourseBlock {
    /// Returns true if this is a leaf problem component.
    #[must_use]
    pub fn is_problem(&self) -> bool {
        self.category == CATEGORY_PROBLEM
    }

    /// Iterates over this course's subsections in document order.
    ///
    /// Assumes `self` is the course root (children are sections).
    pub fn subsections(&self) -> impl Iterator<Item = &CourseBlock> {
        self.children.iter().flat_map(|section| section.children.iter())
    }
}
