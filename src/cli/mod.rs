mod buffer;
mod completions;
mod dir;
mod project;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tokio::io::{BufReader, Stdin};

use todoscope::config::Config;
use todoscope::orchestrator::{Notice, NoticeKind, Orchestrator, PickKind, PickRequest, Reaction};
use todoscope::picker::{PickError, Picker, PrintPicker, Prompt};
use todoscope::types::{CandidateOutput, JumpTarget};

#[derive(Parser)]
#[command(name = "todoscope")]
#[command(about = "Find TODO, FIXME and friends in buffers and directory trees")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Show detailed progress
    #[arg(long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (defaults to the per-user config.toml)
    #[arg(long, global = true, env = "TODOSCOPE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one file loaded as a buffer
    Buffer(buffer::BufferArgs),

    /// Search several files loaded as buffers
    Buffers(buffer::BuffersArgs),

    /// Search a directory tree
    Dir(dir::DirArgs),

    /// Search the project containing a path
    Project(project::ProjectArgs),

    /// Interactive session with a persistent result cache
    Shell(shell::ShellArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub async fn run(self) -> Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }

        let output = OutputConfig {
            json: self.json,
            quiet: self.quiet,
            verbose: self.verbose,
        };

        let config_path = self.config;
        let load = || Config::resolve(config_path.as_deref()).context("Failed to load configuration");

        match self.command {
            Commands::Buffer(args) => buffer::run(args, output, load()?).await,
            Commands::Buffers(args) => buffer::run_many(args, output, load()?).await,
            Commands::Dir(args) => dir::run(args, output, load()?).await,
            Commands::Project(args) => project::run(args, output, load()?).await,
            Commands::Shell(args) => shell::run(args, output, load()?).await,
            Commands::Completions(args) => {
                completions::run(args);
                Ok(())
            }
        }
    }
}

/// Output configuration passed to all commands
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
}

/// JSON output for one result set
#[derive(Serialize)]
struct ResultsOutput<'a> {
    scope: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory: Option<&'a str>,
    count: usize,
    results: Vec<CandidateOutput>,
}

/// JSON output for a notice
#[derive(Serialize)]
struct NoticeOutput {
    notice: &'static str,
    message: String,
}

fn notice_code(notice: &Notice) -> &'static str {
    match notice {
        Notice::NoResults => "no_results",
        Notice::SearchSlow { .. } => "search_slow",
        Notice::CachingComplete { .. } => "caching_complete",
        Notice::AlreadyRunning { .. } => "already_running",
        Notice::CacheEmpty => "cache_empty",
        Notice::CacheCleared { .. } => "cache_cleared",
        Notice::ConfigWarning(_) => "config_warning",
    }
}

pub(crate) fn print_notice(notice: &Notice, output: OutputConfig) {
    if output.json {
        let out = NoticeOutput {
            notice: notice_code(notice),
            message: notice.to_string(),
        };
        if let Ok(json) = serde_json::to_string(&out) {
            println!("{json}");
        }
        return;
    }
    match notice.kind() {
        NoticeKind::Warning => println!("{} {notice}", "!".yellow()),
        NoticeKind::Success if !output.quiet => println!("{} {notice}", "✓".green()),
        NoticeKind::Info if !output.quiet => println!("{} {notice}", "·".dimmed()),
        _ => {}
    }
}

/// Print configuration problems that were worked around.
pub(crate) fn print_config_warnings(orch: &Orchestrator, output: OutputConfig) -> Result<()> {
    for warning in orch.config_warnings().context("Invalid narrow configuration")? {
        print_notice(&warning, output);
    }
    Ok(())
}

fn print_jump(target: &JumpTarget) {
    println!("{} {}", "→".cyan(), target.to_string().bold());
    println!("  {}", target.text().trim().dimmed());
}

/// Line reader over stdin, echoing prompts to stdout.
pub(crate) fn stdin_prompt() -> Prompt<BufReader<Stdin>> {
    Prompt::new(BufReader::new(tokio::io::stdin()), Box::new(io::stdout()))
}

/// Non-interactive picker for stdout, honoring `picker.width`.
pub(crate) fn list_picker(orch: &Orchestrator) -> PrintPicker {
    let picker = PrintPicker::stdout(true);
    match orch.config().picker.width {
        Some(width) => picker.with_width(width),
        None => picker,
    }
}

/// Show a result set through `picker` and print where the selection points.
///
/// Cancelling the picker is not an error.
pub(crate) async fn present<P: Picker>(
    orch: &Orchestrator,
    request: &PickRequest,
    picker: &mut P,
    output: OutputConfig,
) -> Result<()> {
    let directory = match &request.kind {
        PickKind::Directory(dir) => Some(dir.as_str()),
        PickKind::Buffer => None,
    };

    if output.json {
        let out = ResultsOutput {
            scope: if directory.is_some() { "directory" } else { "buffers" },
            directory,
            count: request.candidates.len(),
            results: request.candidates.iter().map(CandidateOutput::from).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !output.quiet {
        println!(
            "{} {} keyword match{} in {}",
            "✓".green(),
            request.lines.len(),
            if request.lines.len() == 1 { "" } else { "es" },
            request.prompt.cyan()
        );
    }

    let _guard = orch.enter_picker()?;
    match picker.pick(request).await {
        Ok(Some(line)) => match orch.jump(&line) {
            Some(target) => print_jump(&target),
            None => println!("{} Cannot open {}", "!".yellow(), line.text.trim()),
        },
        Ok(None) => {}
        Err(PickError::Cancelled) => tracing::debug!("picker cancelled"),
        Err(PickError::Io(e)) => return Err(e).context("Picker failed"),
    }
    Ok(())
}

/// Present a reaction that needs no further waiting.
pub(crate) async fn react<P: Picker>(
    orch: &Orchestrator,
    reaction: Reaction,
    picker: &mut P,
    output: OutputConfig,
) -> Result<()> {
    match reaction {
        Reaction::Show(request) => present(orch, &request, picker, output).await,
        Reaction::Notice(notice) => {
            print_notice(&notice, output);
            Ok(())
        }
        Reaction::Pending { directory } => {
            if output.verbose && !output.json {
                println!("{} Searching {}", "·".dimmed(), directory.cyan());
            }
            Ok(())
        }
    }
}
