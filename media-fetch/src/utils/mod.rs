//! Utility modules.

pub mod filename;
pub mod fs;
