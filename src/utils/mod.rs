//! Terminal output helpers for the headless runner

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
