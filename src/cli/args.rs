//! Command-line arguments and subcommands, declared with `clap` derive.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::report::DEFAULT_MANIFEST;

#[derive(Debug, Parser)]
#[command(
    name = "docrun",
    version,
    about = "Run the code examples in markdown documents and check their results."
)]
pub struct DocrunArgs {
    /// More logging on stderr: -v for phases, -vv for debug detail.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every case in one markdown document and print a summary.
    Run {
        /// The markdown document to run.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Run all documents of the repositories in a manifest and print a JSON report.
    Report {
        /// File listing one repository path per line.
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
        /// Directory the manifest entries are relative to.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}
