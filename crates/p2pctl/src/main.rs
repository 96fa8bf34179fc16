//! p2pctl - drive peer-to-peer stream lifecycles from the command line
//!
//! Subcommands:
//! - `p2pctl run <STEP>...` - Run a sequence of lifecycle steps on one stream
//! - `p2pctl demo` - Walk a stream through create, enable and destroy
//! - `p2pctl config` - Show the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use p2pconf::P2pConfig;

mod commands;
mod steps;
mod telemetry;

use steps::Step;

#[derive(Parser)]
#[command(name = "p2pctl")]
#[command(about = "Drive peer-to-peer stream lifecycles against a simulated driver")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./p2pstream.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run lifecycle steps in order against one stream
    #[command(after_help = "STEPS:\n  \
        create | create-enabled | destroy | enable | disable | flush | link | unlink | state\n  \
        write:<n> | read:<n>         move elements through the simulated FIFOs\n  \
        wait:<event>                 fifo-overflow, fifo-underflow, stream-enabled, stream-disabled (or 0-3)\n  \
        attr:<key>                   stream-state, reader-capacity, writer-overflow, ... (or 0-6)\n  \
        fault:<call>:<status>        script the next status of a driver call, e.g. fault:disable:-5")]
    Run {
        /// Steps to execute
        #[arg(required = true, value_name = "STEP")]
        steps: Vec<Step>,

        /// Print one JSON object per step
        #[arg(long)]
        json: bool,

        /// Exit non-zero if any step failed
        #[arg(long)]
        strict: bool,
    },

    /// Show the flags through create, enable and destroy
    Demo,

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = P2pConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading configuration")?;
    telemetry::init(&config.telemetry.log_level);

    match cli.command {
        Commands::Run {
            steps,
            json,
            strict,
        } => {
            commands::run(&config, &steps, json, strict)?;
        }
        Commands::Demo => {
            commands::demo(&config)?;
        }
        Commands::Config => {
            commands::config(&config, &sources)?;
        }
    }

    Ok(())
}
