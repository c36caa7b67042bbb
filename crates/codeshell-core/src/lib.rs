//! Core of the code shell: task tracking, the command console and project configuration.

pub mod commands;
pub mod config;
pub mod console;
pub mod fs;
pub mod language;
pub mod runner;
pub mod task;
pub mod task_store;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
