//! Shared testing utilities for the harvester workspace.
//!
//! Provides in-memory mock repositories and test data builders usable from
//! any crate in the workspace. Add as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! harvester-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
