//! CLI argument parsing.

use clap::{Parser, Subcommand};

pub const DEFAULT_STATE_FILE: &str = "~/.poller/state.json";
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "poller")]
#[command(about = "Status board poller — pushes door switch and printer state to the hub")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Push the state file to the hub on a fixed interval [default]
    Run {
        /// JSON file holding `{"printers": .., "sign": ..}`
        #[arg(long, value_name = "PATH", default_value = DEFAULT_STATE_FILE)]
        state_file: String,

        /// Seconds between reports
        #[arg(long, value_name = "SECS", default_value_t = DEFAULT_INTERVAL_SECS)]
        interval: u64,
    },

    /// Send one report built from the flags, then exit
    Send {
        /// Door contact, 1 = shut
        #[arg(long)]
        door: u8,

        /// Switch position one (follow the schedule)
        #[arg(long)]
        one_on: u8,

        /// Switch position two (force open)
        #[arg(long)]
        two_on: u8,

        /// Printer status object, passed through to displays as-is
        #[arg(long, value_name = "JSON")]
        printers: Option<String>,
    },
}

impl Cli {
    pub fn command_or_default(self) -> Commands {
        self.command.unwrap_or(Commands::Run {
            state_file: DEFAULT_STATE_FILE.to_string(),
            interval: DEFAULT_INTERVAL_SECS,
        })
    }
}
