//! # coursepulse-core
//!
//! Core abstractions for the coursepulse course-analytics engine.
//!
//! This crate provides the foundational types and traits used across all
//! coursepulse components:
//!
//! - **Identifiers**: Strongly-typed course, block and student keys, parsed
//!   once at the platform boundary
//! - **Records**: The four persisted rollup row types this engine owns
//! - **Storage Traits**: Abstract interfaces over the platform's logs and
//!   over the engine's own rollup tables
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `coursepulse-core` is the **only** crate allowed to define shared
//! primitives. The rollup engines and the insight derivations both talk to
//! the platform exclusively through the traits in [`store`].
//!
//! ## Example
//!
//! ```rust
//! use coursepulse_core::prelude::*;
//!
//! let course: CourseKey = "course-v1:RG+Analytics+2024".parse().unwrap();
//! assert_eq!(course.org(), "RG");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod content;
pub mod error;
pub mod id;
pub mod observability;
pub mod records;
pub mod store;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use coursepulse_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::content::CourseBlock;
    pub use crate::error::{Error, Result};
    pub use crate::id::{CheckpointId, CourseKey, StudentId, UsageKey};
    pub use crate::records::{
        EnrollmentDailySnapshot, EnrollmentStudentState, GradeRollupCheckpoint, GradeSnapshot,
    };
    pub use crate::store::{
        ActivitySource, AnalyticsStore, ContentSource, CoursePair, EmailSender,
        EnrollmentSource, EnrollmentTransition, GradeProvider, GradeRollupCommit, GradeSummary,
        ModuleActivityRecord, ModuleKind, SectionGrade, StudentDirectory,
    };
    pub use crate::store::memory::MemoryStore;
}

pub use content::CourseBlock;
pub use error::{Error, Result};
pub use id::{CheckpointId, CourseKey, StudentId, UsageKey};
