//! Shared test utilities for the coursepulse workspace.
//!
//! Factory functions for courses, trees and event rows live in
//! [`fixtures`]; stub implementations of the platform collaborator traits
//! live in [`sources`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod fixtures;
pub mod sources;

pub use fixtures::*;
pub use sources::*;
