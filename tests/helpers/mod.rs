//! Shared fixtures and setup for integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod project_helpers;
