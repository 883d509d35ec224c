//! CLI command handlers

pub mod commands;

pub use commands::{check, clear, dump, formats, punch, sheets};
