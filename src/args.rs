use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::db::TimeRange;
use crate::import::EntryKind;

/// Import figures from dated spreadsheet reports into a local ledger.
#[derive(Parser, Debug)]
pub struct Args {
    /// Directory holding the ledger and the settings file
    #[clap(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read spreadsheets, preview the extracted amounts and add them to the ledger
    Import {
        /// Spreadsheet files to import
        #[clap(required = true)]
        files: Vec<PathBuf>,

        /// Year of the reports, defaults to the current year
        #[clap(long)]
        year: Option<i32>,

        /// Import without asking for confirmation
        #[clap(short, long)]
        yes: bool,
    },

    /// Add a record by hand
    Add {
        /// Amount; asked for interactively if missing
        #[clap(short, long, allow_hyphen_values = true)]
        amount: Option<String>,

        #[clap(short, long, value_enum, default_value = "income")]
        kind: EntryKind,

        /// Defaults to today
        #[clap(short, long)]
        date: Option<NaiveDate>,

        #[clap(long)]
        description: Option<String>,
    },

    /// Print the records in the ledger
    List {
        #[clap(short, long, value_enum, default_value = "all")]
        range: TimeRange,
    },

    /// Remove a record from the ledger
    Delete { id: String },

    /// Remove all records from the ledger
    Clear {
        #[clap(short, long)]
        yes: bool,
    },

    /// Write the ledger to a backup file
    Backup { path: PathBuf },

    /// Merge a backup file into the ledger
    Restore { path: PathBuf },

    /// Show or change the import settings
    Settings {
        #[clap(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Edit the settings in your editor
    Edit,
    /// Restore the default settings
    Reset,
}

pub fn parse() -> Args {
    Args::parse()
}
