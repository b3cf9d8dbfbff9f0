// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! wathost CLI Tool
//!
//! Main entry point for the wathost command-line interface.

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wathost_runtime::RuntimeError;
use wathost_tools::EngineArgs;
use wathost_tools::cli::inspect::{self, InspectArgs};
use wathost_tools::cli::run::{self, RunArgs};

#[derive(Parser)]
#[command(name = "wathost")]
#[command(about = "wathost - Host runtime for WebAssembly text modules")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module and invoke one of its exports
    Run(RunArgs),
    /// Describe the imports, exports and start routine of a module
    Inspect(InspectArgs),
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so guest output on stdout stays clean
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => report(&err),
    };
    process::exit(code);
}

fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.engine.resolve()?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Run(args) => Ok(run::execute(&args, config, &mut stdout)?.code()),
        Commands::Inspect(args) => {
            inspect::execute(&args, config, &mut stdout)?;
            Ok(0)
        }
    }
}

fn report(err: &anyhow::Error) -> i32 {
    let (message, code) = diagnostic(err);
    eprintln!("{message}");
    code
}

/// Diagnostic line and exit status for a failed command
fn diagnostic(err: &anyhow::Error) -> (String, i32) {
    match err.downcast_ref::<RuntimeError>() {
        Some(runtime_err) => (format!("error[{}]: {}", runtime_err.category(), runtime_err), runtime_err.exit_code()),
        None => (format!("error: {err:#}"), 1),
    }
}
