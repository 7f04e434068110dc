// Command-line surface
// Flags, the two interactive prompts, and the hand-off to the pipeline

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::catalog::{list_events, lookup, lookup_by_choice, EventDescriptor, EventError};
use crate::config::AnalysisConfig;
use crate::pipeline::{analyze_event, AnalysisError, AnalysisReport};
use crate::strain::GwoscClient;

/// Menu entry chosen when the event prompt is left blank
const DEFAULT_CHOICE: u32 = 2;

/// Gravitational-wave strain analysis and sonification
#[derive(Parser, Debug, Default)]
#[command(name = "strainwave")]
#[command(version)]
pub struct Args {
    /// Event name (GW150914, GW170817) or menu number (1, 2); prompts when absent
    #[arg(short, long)]
    pub event: Option<String>,

    /// Write the WAV file without asking
    #[arg(long, conflicts_with = "no_audio")]
    pub audio: bool,

    /// Skip the WAV file without asking
    #[arg(long)]
    pub no_audio: bool,

    /// Root directory for plots and the trace file
    #[arg(long, env = "STRAINWAVE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub audio_dir: Option<PathBuf>,

    /// Reuse downloaded strain files from the local cache
    #[arg(long)]
    pub cache: bool,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Open-data archive base URL
    #[arg(long, env = "STRAINWAVE_ARCHIVE_URL")]
    pub archive_url: Option<String>,
}

impl Args {
    fn audio_choice(&self) -> Option<bool> {
        if self.audio {
            Some(true)
        } else if self.no_audio {
            Some(false)
        } else {
            None
        }
    }
}

/// Interpret a menu answer: blank selects the default, digits pick a menu
/// entry, anything else is treated as an event name
pub fn parse_event_choice(input: &str) -> Result<&'static EventDescriptor, EventError> {
    let input = input.trim();
    if input.is_empty() {
        return lookup_by_choice(DEFAULT_CHOICE);
    }
    match input.parse::<u32>() {
        Ok(choice) => lookup_by_choice(choice),
        Err(_) => lookup(input),
    }
}

/// Blank means yes
pub fn parse_yes_no(input: &str) -> bool {
    let answer = input.trim().to_lowercase();
    answer.is_empty() || matches!(answer.as_str(), "y" | "yes" | "是")
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}

fn event_menu() -> String {
    let mut menu = String::from("Select a gravitational-wave event:\n");
    for choice in 1..=list_events().len() as u32 {
        if let Ok(event) = lookup_by_choice(choice) {
            menu.push_str(&format!("  {}. {} - {}\n", choice, event.name, event.description));
        }
    }
    menu.push_str(&format!("Enter choice [{}]: ", DEFAULT_CHOICE));
    menu
}

/// Config file (if any) with command-line overrides applied
pub fn resolve_config(args: &Args) -> Result<AnalysisConfig, AnalysisError> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &args.audio_dir {
        config.audio_dir = dir.clone();
    }
    if let Some(url) = &args.archive_url {
        config.archive_url = url.clone();
    }
    if args.cache {
        config.use_cache = true;
    }

    config.validate()?;
    Ok(config)
}

/// Resolve the event and audio choice (prompting on `input`/`output` where
/// the flags are silent), then analyse the event against the archive
pub fn execute<R: BufRead, W: Write>(
    args: &Args,
    input: &mut R,
    output: &mut W,
) -> Result<AnalysisReport, AnalysisError> {
    let config = resolve_config(args)?;

    let event = match &args.event {
        Some(name) => parse_event_choice(name)?,
        None => {
            let answer = prompt(input, output, &event_menu())?;
            parse_event_choice(&answer)?
        }
    };

    let generate_audio = match args.audio_choice() {
        Some(choice) => choice,
        None => {
            let answer = prompt(input, output, "Generate audio file? (y/n) [y]: ")?;
            parse_yes_no(&answer)
        }
    };

    log::info!("Analyzing {}: {}", event.name, event.description);

    let client = GwoscClient::new(
        config.archive_url.clone(),
        event.dataset,
        config.timeout(),
        config.cache()?,
    )?;

    analyze_event(event, &client, &config, generate_audio)
}
