// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command definitions for TableFlow

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tableflow::RuntimeMode;

/// Log level options
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors
    Info,
    /// Debug messages and above (verbose)
    Debug,
    /// All messages including trace (very verbose)
    Trace,
    /// Disable all logging
    Off,
}

impl LogLevel {
    /// Convert to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// TableFlow CLI - run SQL scripts against a table environment
#[derive(Parser)]
#[command(name = "tableflow")]
#[command(about = "TableFlow - A table-oriented query execution environment")]
#[command(version)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace, off)
    #[arg(short = 'l', long = "log-level", global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Verbose mode (equivalent to --log-level debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective log level; defaults to warnings
    pub fn level_filter(&self) -> log::LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.to_level_filter(),
            (None, true) => log::LevelFilter::Debug,
            (None, false) => log::LevelFilter::Warn,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show detailed version information
    Version,

    /// Execute a SQL script
    ///
    /// Statements between `BEGIN STATEMENT SET;` and `END;` are submitted
    /// together as one job.
    Run {
        /// Path of the script
        script: PathBuf,

        /// Runtime mode (streaming or batch); overrides the config file
        #[arg(short, long)]
        mode: Option<RuntimeMode>,

        /// JSON file with environment settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Explain the INSERT and SELECT statements of a script without running them
    ///
    /// DDL statements are still executed so that later statements resolve.
    Explain {
        /// Path of the script
        script: PathBuf,

        /// Include the physical execution plan
        #[arg(short, long)]
        extended: bool,

        /// Runtime mode (streaming or batch); overrides the config file
        #[arg(short, long)]
        mode: Option<RuntimeMode>,

        /// JSON file with environment settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}
