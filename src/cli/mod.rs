//! The docrun command-line interface.
//!
//! `run()` parses arguments, sets up logging on stderr, and hands off to one
//! handler per subcommand. Handlers return the process exit code; fatal errors
//! are rendered as `miette` diagnostics.

use std::io::{self, ErrorKind};
use std::path::Path;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Command, DocrunArgs};
use crate::config::RunConfig;
use crate::diagnostics::DocrunError;
use crate::report;
use crate::runner::DocRunner;

pub mod args;
pub mod output;

pub fn run() {
    let args = DocrunArgs::parse();
    init_logging(args.verbose);

    let config = RunConfig::default();
    let result = match &args.command {
        Command::Run { file } => handle_run(&config, file, args.verbose > 0),
        Command::Report { manifest, root } => handle_report(&config, root, manifest),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let directive = match verbose {
        0 => "warn",
        1 => "docrun=info",
        _ => "docrun=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Case failures are reported, not signalled through the exit code.
fn handle_run(config: &RunConfig, file: &Path, show_diffs: bool) -> Result<i32, DocrunError> {
    let run = match DocRunner::run_document(config, file) {
        Ok(run) => run,
        Err(DocrunError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            println!("File not found: \"{}\"", file.display());
            return Ok(1);
        }
        Err(e) => return Err(e),
    };
    let mut out = output::stdout(config.use_colors);
    output::print_run(&mut out, &run, show_diffs).map_err(|e| DocrunError::io(file, e))?;
    Ok(0)
}

fn handle_report(config: &RunConfig, root: &Path, manifest: &Path) -> Result<i32, DocrunError> {
    let rows = report::create_report(config, root, manifest)?;
    println!("{}", report::render(&rows)?);
    Ok(0)
}
