//! Application layer: the wizard session shared by the terminal UI and tests.

pub mod session;

pub use session::{Notice, NoticeLevel, Results, Session, TaskFailure};
