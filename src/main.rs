use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Runs a Lira script.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Script file to run.
    path: Option<PathBuf>,

    /// Run this source text instead of a file.
    #[arg(short, long, conflicts_with = "path")]
    code: Option<String>,

    /// Log pipeline activity to stderr (-v debug, -vv trace). `RUST_LOG`
    /// takes precedence when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// Exit codes follow sysexits.h.
const EX_DATAERR: u8 = 65;
const EX_NOINPUT: u8 = 66;
const EX_SOFTWARE: u8 = 70;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let source = match load_source(&args) {
        Ok(Some(source)) => source,
        Ok(None) => {
            eprintln!("Usage: lira <PATH> | lira -c <SOURCE>");
            return ExitCode::from(EX_DATAERR);
        }
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(EX_NOINPUT);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let diagnostics = lira::run(&source, &mut out);
    let _ = out.flush();

    for diagnostic in &diagnostics {
        eprintln!("{diagnostic}");
    }

    if diagnostics.has_runtime_error() {
        ExitCode::from(EX_SOFTWARE)
    } else if diagnostics.has_errors() {
        ExitCode::from(EX_DATAERR)
    } else {
        ExitCode::SUCCESS
    }
}

fn load_source(args: &Args) -> anyhow::Result<Option<String>> {
    if let Some(code) = &args.code {
        return Ok(Some(code.clone()));
    }

    match &args.path {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(Some(source))
        }
        None => Ok(None),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
