//! Path utilities shared by the selection code

pub mod glob;
pub mod paths;
