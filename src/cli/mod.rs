//! Command-line interface
//!
//! Argument parsing for the binary; the command handlers live in
//! `main.rs`.

pub mod commands;

pub use commands::{Command, Opt};
