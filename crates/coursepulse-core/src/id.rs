//! Strongly-typed identifiers for coursepulse entities.
//!
//! The surrounding platform speaks several historical key dialects; this
//! module is the single place where its identifier strings are parsed into
//! one stable internal representation. Everything past this boundary works
//! with typed keys:
//!
//! - **Strongly typed**: a [`CourseKey`] cannot be passed where a
//!   [`UsageKey`] is expected
//! - **Validated once**: malformed strings are rejected at the edge with
//!   [`Error::InvalidKey`], never deep inside a rollup pass
//!
//! # Example
//!
//! ```rust
//! use coursepulse_core::id::{CourseKey, UsageKey};
//!
//! let course: CourseKey = "course-v1:RG+Analytics+2024".parse().unwrap();
//! assert_eq!(course.org(), "RG");
//!
//! let block: UsageKey =
//!     "block-v1:RG+Analytics+2024+type@problem+block@intro".parse().unwrap();
//! assert_eq!(block.category(), "problem");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

const COURSE_PREFIX: &str = "course-v1:";
const BLOCK_PREFIX: &str = "block-v1:";

/// A validated course identifier.
///
/// Canonical form: `course-v1:{org}+{course}+{run}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey {
    org: String,
    course: String,
    run: String,
}

impl CourseKey {
    /// Builds a course key from its three segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if any segment is empty or contains
    /// the `+` separator.
    pub fn new(
        org: impl Into<String>,
        course: impl Into<String>,
        run: impl Into<String>,
    ) -> Result<Self> {
        let (org, course, run) = (org.into(), course.into(), run.into());
        for (name, value) in [("org", &org), ("course", &course), ("run", &run)] {
            if value.is_empty() || value.contains('+') {
                return Err(Error::invalid_key(format!(
                    "course key segment '{name}' is empty or contains '+': {value:?}"
                )));
            }
        }
        Ok(Self { org, course, run })
    }

    /// Returns the organization segment.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Returns the course segment.
    #[must_use]
    pub fn course(&self) -> &str {
        &self.course
    }

    /// Returns the run segment.
    #[must_use]
    pub fn run(&self) -> &str {
        &self.run
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{COURSE_PREFIX}{}+{}+{}", self.org, self.course, self.run)
    }
}

impl FromStr for CourseKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(COURSE_PREFIX)
            .ok_or_else(|| Error::invalid_key(format!("course key missing prefix: {s:?}")))?;
        let mut parts = body.split('+');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(course), Some(run), None) => Self::new(org, course, run),
            _ => Err(Error::invalid_key(format!(
                "course key must have exactly three '+'-separated segments: {s:?}"
            ))),
        }
    }
}

impl TryFrom<String> for CourseKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> Self {
        key.to_string()
    }
}

/// A validated content-block identifier.
///
/// Canonical form:
/// `block-v1:{org}+{course}+{run}+type@{category}+block@{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsageKey {
    course_key: CourseKey,
    category: String,
    name: String,
}

impl UsageKey {
    /// Builds a usage key from a course key plus category and block name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the category or name is empty or
    /// contains a separator character.
    pub fn new(
        course_key: CourseKey,
        category: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let (category, name) = (category.into(), name.into());
        for (label, value) in [("category", &category), ("name", &name)] {
            if value.is_empty() || value.contains('+') || value.contains('@') {
                return Err(Error::invalid_key(format!(
                    "usage key segment '{label}' is empty or contains a separator: {value:?}"
                )));
            }
        }
        Ok(Self {
            course_key,
            category,
            name,
        })
    }

    /// Returns the course this block belongs to.
    #[must_use]
    pub fn course_key(&self) -> &CourseKey {
        &self.course_key
    }

    /// Returns the block category (e.g. `chapter`, `sequential`, `problem`).
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the block name segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{BLOCK_PREFIX}{}+{}+{}+type@{}+block@{}",
            self.course_key.org,
            self.course_key.course,
            self.course_key.run,
            self.category,
            self.name
        )
    }
}

impl FromStr for UsageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(BLOCK_PREFIX)
            .ok_or_else(|| Error::invalid_key(format!("usage key missing prefix: {s:?}")))?;
        let parts: Vec<&str> = body.split('+').collect();
        if parts.len() != 5 {
            return Err(Error::invalid_key(format!(
                "usage key must have exactly five '+'-separated segments: {s:?}"
            )));
        }
        let category = parts[3]
            .strip_prefix("type@")
            .ok_or_else(|| Error::invalid_key(format!("usage key missing 'type@': {s:?}")))?;
        let name = parts[4]
            .strip_prefix("block@")
            .ok_or_else(|| Error::invalid_key(format!("usage key missing 'block@': {s:?}")))?;
        let course_key = CourseKey::new(parts[0], parts[1], parts[2])?;
        Self::new(course_key, category, name)
    }
}

impl TryFrom<String> for UsageKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<UsageKey> for String {
    fn from(key: UsageKey) -> Self {
        key.to_string()
    }
}

/// A platform-assigned student identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StudentId(pub i64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|e| Error::invalid_key(format!("invalid student id '{s}': {e}")))
    }
}

/// A unique identifier for a grade-rollup checkpoint row.
///
/// ULIDs sort lexicographically by creation time, so checkpoint rows order
/// chronologically without a separate sequence column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(Ulid);

impl CheckpointId {
    /// Generates a new unique checkpoint ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
