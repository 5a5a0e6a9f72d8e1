//! Testing utilities for deployment runs.
//!
//! This module provides:
//! - A scriptable in-process function service
//! - Configuration fixtures tuned for fast tests

mod fixtures;
mod mocks;

pub use fixtures::{fast_retry, test_config};
pub use mocks::MockFunctionService;
