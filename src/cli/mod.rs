//! CLI module - argument parsing, the terminal wizard and the headless runner

pub mod args;
pub mod file_selector;
pub mod headless;
pub mod prompts;
pub mod wizard;

pub use args::{Cli, Commands};
pub use headless::run_headless;
pub use prompts::*;
pub use wizard::run_wizard;
