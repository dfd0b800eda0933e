//! CLI parse: clap types for Eraser. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Eraser CLI - image edits with linear undo/redo
#[derive(Parser)]
#[command(name = "eraser")]
#[command(about = "Apply image edits, including background removal, with undo/redo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace directory searched for eraser.toml
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import an image, run edit steps in order, and write the resulting image as PNG
    Apply {
        /// Image to import
        input: PathBuf,
        /// Where to write the result
        #[arg(long, short)]
        output: PathBuf,
        /// Edit step; repeat to run several in order
        #[arg(long = "step", value_enum)]
        steps: Vec<EditStep>,
        /// Provider endpoint (overrides provider.endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the resolved configuration
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditStep {
    RemoveBackground,
    Undo,
    Redo,
    Reset,
}
