//! Shared helpers used across layers

pub mod fs;
pub mod math;
