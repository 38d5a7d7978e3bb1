//! Find annotation keywords (TODO, FIXME, BUG, ...) in loaded buffers and
//! directory trees, and present them as a narrowable candidate list.

pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod jump;
pub mod keywords;
pub mod narrow;
pub mod orchestrator;
pub mod picker;
pub mod project;
pub mod scan;
pub mod search;
pub mod syntax;
pub mod types;

pub use error::{Result, TodoscopeError};
