// Strainwave - Gravitational-wave strain analysis and sonification
// Module declarations

use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

pub mod catalog;
pub mod commands;
pub mod config;
pub mod filtering;
pub mod pipeline;
pub mod plots;
pub mod sonify;
pub mod spectral;
pub mod strain;

/// Install the log subscriber; `RUST_LOG` overrides the default `info` level
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Logging already initialized: {}", e);
    }
}

pub fn run() -> ExitCode {
    init_logging();
    let args = commands::Args::parse();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    match commands::execute(&args, &mut input, &mut output) {
        Ok(report) => {
            println!("Analysis of {} complete (run {})", report.event, report.run_id);
            for artifact in &report.artifacts {
                println!("  {}  {}", artifact.sha256, artifact.path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Analysis failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
