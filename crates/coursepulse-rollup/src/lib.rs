//! # coursepulse-rollup
//!
//! The incremental rollup engines: scheduled background passes that fold the
//! platform's raw history logs into the compact summary rows served to the
//! dashboard.
//!
//! - [`enrollment::EnrollmentRollup`] — enrollment transitions into per-day
//!   counters plus a per-student state cache (watermark-driven, idempotent)
//! - [`grades::GradeRollup`] — per-student grade snapshots recomputed on a
//!   diff basis against a bounded checkpoint log
//!
//! Both engines commit through [`coursepulse_core::store::AnalyticsStore`]
//! atomically: a failed pass applies nothing and is safe to retry on the
//! next scheduled invocation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod enrollment;
pub mod error;
pub mod grades;

pub use error::{Error, Result};

/// Summary counters from one completed rollup pass, for logs and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupOutcome {
    /// Source rows examined in this pass.
    pub events_seen: usize,
    /// Rows that produced a persisted change.
    pub events_applied: usize,
    /// Rows skipped (malformed keys, missing references, denied grades).
    pub events_skipped: usize,
    /// Distinct courses with at least one write.
    pub courses_touched: usize,
}
