//! Clickstream sessions CLI library.
//!
//! This crate provides the CLI interface for importing navigation logs and
//! running session segmentation and role labeling over them.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, ExportTable};
pub use config::Config;
