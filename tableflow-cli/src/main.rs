// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! TableFlow command-line entry point

mod cli;

use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use cli::{handle_explain, handle_run, handle_version, Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.level_filter())
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Version => {
            handle_version();
            Ok(())
        }
        Commands::Run {
            script,
            mode,
            config,
            format,
        } => handle_run(script, mode, config, format),
        Commands::Explain {
            script,
            extended,
            mode,
            config,
        } => handle_explain(script, extended, mode, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            ExitCode::FAILURE
        }
    }
}
