//! Process-level server plumbing.

pub mod shutdown;
