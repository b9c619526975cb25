// src/cli.rs
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Step through a multi-day training plan set by set", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Act as this user instead of the configured default
    #[arg(short, long, global = true)]
    pub user: Option<i64>,

    /// Print rendered output as JSON
    #[arg(long, global = true, conflicts_with = "export_csv")]
    pub json: bool,

    /// Export the progress view as CSV
    #[arg(long, global = true)]
    pub export_csv: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the user (optionally with a display name) and show the menu
    Start {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Import a plan from a CSV file with columns Allenamento, Esercizio, Serie, Ripetizioni, Recupero
    Import {
        /// Path to the CSV file
        file: PathBuf,
    },
    /// Show the full training plan
    Plan,
    /// List the plan's training days
    Days,
    /// Start a training day
    Begin {
        /// Day name as it appears in the plan (e.g. "Giorno 1")
        day: String,
    },
    /// Record the current set
    Log {
        /// Weight; ',' is accepted as decimal separator
        weight: String,
        /// Repetitions performed
        reps: String,
    },
    /// Send free text, recorded as "<weight> <reps>" while a set is awaited
    Say { text: String },
    /// Press a button by its identifier (e.g. "skip:set", "day:Giorno 1")
    Press { button: String },
    /// Skip the current set without recording it
    Skip,
    /// Go back one set, undoing it if it was recorded
    Back,
    /// Show the prompt for the current set again
    Resume,
    /// Show the active day's exercises
    Current,
    /// Cancel the active day (asks for confirmation unless --confirm)
    Cancel {
        #[arg(long)]
        confirm: bool,
    },
    /// Delete the plan and every recorded set (asks for confirmation unless --confirm)
    Reset {
        #[arg(long)]
        confirm: bool,
    },
    /// Show recorded progress grouped by day, exercise and date
    Progress,
    /// Delete the user and all of their history
    DeleteUser {
        #[arg(long)]
        confirm: bool,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion script
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
