//! CLI for the waldur_os_security_group binary
//!
//! The automation engine calls the binary with the path of an arguments file;
//! the remaining flags are for running a task by hand.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Manage OpenStack security groups through the Waldur API
#[derive(Parser, Debug, Clone)]
#[command(name = "waldur_os_security_group")]
#[command(author = "Waldur OS Contributors")]
#[command(version)]
#[command(about = "Manage OpenStack security groups through the Waldur API", long_about = None)]
pub struct Cli {
    /// File with the module arguments (JSON or YAML)
    pub args_file: PathBuf,

    /// Module to run
    #[arg(short = 'm', long, default_value = "waldur_os_security_group")]
    pub module: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run in check mode (dry-run, don't make changes)
    #[arg(long = "check")]
    pub check_mode: bool,

    /// Run in diff mode (show differences)
    #[arg(long = "diff")]
    pub diff_mode: bool,

    /// Output format
    #[arg(long, default_value = "json")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, env = "WALDUR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object, as read by the automation engine
    #[default]
    Json,
    /// Human-readable output with colors
    Human,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
