//! Report module - summarizing pipeline runs

pub mod summary;

pub use summary::*;
