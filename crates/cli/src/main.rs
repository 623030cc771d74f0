// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchwatch CLI entry point.

use benchwatch_cli::{run, telemetry, Cli};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = telemetry::init(cli.verbose, cli.log_format) {
        eprintln!("{} {e:#}", "error:".red().bold());
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
