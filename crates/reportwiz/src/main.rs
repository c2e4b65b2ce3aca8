//! reportwiz
//!
//! Command-line front end for the report wizard filter core:
//! - `validate`: check a wizard config and list its categories
//! - `replay`: run a scripted wizard session against a static hint catalog
//! - `tape`: summarize a recorded session tape

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use reportwiz_logging::{init_logging, LogConfig};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "reportwiz", about = "Report wizard filter tooling")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate a wizard config
    Validate {
        /// Wizard config (TOML)
        config: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a scripted session and print the resulting configuration
    Replay {
        /// Wizard config (TOML)
        #[arg(long)]
        config: PathBuf,

        /// Hint catalog (JSON object of category -> [{value, display}])
        #[arg(long)]
        catalog: PathBuf,

        /// Session script (JSON)
        #[arg(long)]
        script: PathBuf,

        /// Maximum hints returned per fetch
        #[arg(long, default_value_t = reportwiz_protocol::defaults::DEFAULT_HINT_LIMIT)]
        limit: usize,

        /// Record the session to a tape file (default: ~/.reportwiz/tapes/<session>.tape)
        #[arg(long, num_args = 0..=1)]
        tape: Option<Option<PathBuf>>,

        /// Record typed text in the tape instead of hashing it
        #[arg(long, requires = "tape")]
        plaintext: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a session tape
    Tape {
        /// Path to the tape file
        tape_file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Validate { json, .. }
        | Commands::Replay { json, .. }
        | Commands::Tape { json, .. } => *json,
    }
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Validate { config, json } => {
            cli::validate::run(cli::validate::ValidateArgs { config, json })
        }
        Commands::Replay {
            config,
            catalog,
            script,
            limit,
            tape,
            plaintext,
            json,
        } => cli::replay::run(cli::replay::ReplayArgs {
            config,
            catalog,
            script,
            limit,
            tape,
            plaintext,
            json,
        }),
        Commands::Tape { tape_file, json } => cli::tape::run(&tape_file, json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let _log_guard = match init_logging(LogConfig {
        app_name: "reportwiz",
        verbose: cli.verbose,
        file: matches!(cli.command, Commands::Replay { .. }),
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging disabled: {:#}", err);
            None
        }
    };

    match run_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
