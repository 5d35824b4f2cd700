//! # coursepulse-insights
//!
//! Request-scoped derivations over the rollup tables and the platform's raw
//! logs. Everything here is computed per request and discarded, never
//! persisted:
//!
//! - [`cohort`] — progress bands over grade snapshots, plus cohort messaging
//! - [`funnel`] — the per-course progression tree with in/out flow
//! - [`problems`] — homework and problem success statistics
//! - [`suggestions`] — rules that flag statistically hard content
//! - [`enrollment`] — the dense per-day enrollment series
//! - [`gradebook`] — the per-student exam table
//!
//! Modules are pure where they can be: the statistical cores take owned
//! data and the async entry points only fetch through the
//! [`coursepulse_core::store`] traits.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cohort;
pub mod enrollment;
pub mod funnel;
pub mod gradebook;
pub mod problems;
mod stats;
pub mod suggestions;

pub use coursepulse_core::error::{Error, Result};
