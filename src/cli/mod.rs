//! CLI module for the code-notes-auditor application

mod app;
mod main;

pub use app::*;
pub use main::*;
