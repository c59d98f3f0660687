//! Shared utilities for nomos integration tests.
//!
//! - `TestHarness` materializes a policy repository in a temp directory
//!   and compiles it
//! - builders render the manifests those repositories are made of

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
