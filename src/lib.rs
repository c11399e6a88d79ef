//! Brew day orchestration: resumable process state, timers, dry-hop
//! reminders, an audit timeline and the final brew report.

pub mod config;
pub mod db;
pub mod dryhop;
pub mod errors;
pub mod notify;
pub mod process;
pub mod recipe;
pub mod store;
pub mod summary;
pub mod timeline;
pub mod timer;
pub mod watcher;

pub use errors::{BrewError, Result};
pub use process::BrewProcess;
