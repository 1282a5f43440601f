//! MNDX inspector library
//!
//! Command definitions and handlers for the `mndx` tool.

pub mod commands;

use clap::Subcommand;
use std::path::PathBuf;

/// How command results are printed
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Compact JSON
    Json,
    /// Indented JSON
    JsonPretty,
}

/// Subcommands of the `mndx` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show header fields and database statistics of an MNDX root
    Info {
        /// Decoded MNDX root file
        file: PathBuf,
    },

    /// List the packages of an MNDX root
    Packages {
        /// Decoded MNDX root file
        file: PathBuf,
    },

    /// List files with their content keys
    List {
        /// Decoded MNDX root file
        file: PathBuf,

        /// Only list names starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Only list names matching this mask (`*` and `?`)
        #[arg(short = 'm', long)]
        mask: Option<String>,
    },

    /// Resolve paths to content keys
    Lookup {
        /// Decoded MNDX root file
        file: PathBuf,

        /// Paths to resolve
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Enumerate the names of a standalone MAR database
    Names {
        /// MAR database file
        file: PathBuf,

        /// Only list names starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,
    },
}
