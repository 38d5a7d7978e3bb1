use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{BufReader, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;

use super::{list_picker, print_config_warnings, print_notice, react, stdin_prompt, OutputConfig};
use todoscope::config::Config;
use todoscope::orchestrator::{DirectoryTarget, Notice, Orchestrator, Reaction};
use todoscope::picker::{Prompt, PromptPicker};
use todoscope::search::SearchEvent;

#[derive(Args)]
pub struct DirArgs {
    /// Directory to search (defaults to the project around the current
    /// directory, or the current directory itself)
    dir: Option<PathBuf>,

    /// Ask for the directory on stdin
    #[arg(long, conflicts_with = "dir")]
    prompt: bool,

    /// Choose a result interactively and print its location
    #[arg(long)]
    pick: bool,
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run a directory search to completion.
///
/// A slow run caches its results; the search is then repeated right away so
/// the answer comes from the cache. Returns `None` when the run failed.
pub(super) async fn search_once(
    orch: &mut Orchestrator,
    events: &mut UnboundedReceiver<SearchEvent>,
    target: &DirectoryTarget,
    output: OutputConfig,
) -> Result<Option<Reaction>> {
    let directory = match orch.search_directory(target)? {
        Reaction::Pending { directory } => directory,
        settled => return Ok(Some(settled)),
    };
    if output.verbose && !output.json {
        println!("{} Searching {} with {}", "·".dimmed(), directory.cyan(), orch.searcher_name());
    }

    let mut progress: Option<ProgressBar> = None;
    while let Some(event) = events.recv().await {
        match orch.handle_event(event) {
            Some(Reaction::Notice(notice @ Notice::SearchSlow { .. })) => {
                if !output.quiet && !output.json {
                    progress = Some(spinner(notice.to_string()));
                }
            }
            Some(Reaction::Notice(notice @ Notice::CachingComplete { .. })) => {
                if let Some(pb) = progress.take() {
                    pb.finish_and_clear();
                }
                if output.verbose {
                    print_notice(&notice, output);
                }
                return Ok(Some(orch.search_directory(target)?));
            }
            Some(reaction) => {
                if let Some(pb) = progress.take() {
                    pb.finish_and_clear();
                }
                return Ok(Some(reaction));
            }
            None if !orch.is_searching() => break,
            None => {}
        }
    }

    if let Some(pb) = progress.take() {
        pb.finish_and_clear();
    }
    tracing::debug!(%directory, "directory search did not finish");
    Ok(None)
}

pub(super) async fn show(
    orch: &Orchestrator,
    reaction: Option<Reaction>,
    pick: bool,
    prompt: &mut Prompt<BufReader<Stdin>>,
    output: OutputConfig,
) -> Result<()> {
    let Some(reaction) = reaction else {
        return Ok(());
    };
    if pick {
        react(orch, reaction, &mut PromptPicker::new(prompt, true), output).await
    } else {
        react(orch, reaction, &mut list_picker(orch), output).await
    }
}

pub async fn run(args: DirArgs, output: OutputConfig, config: Config) -> Result<()> {
    let (mut orch, mut events) = Orchestrator::from_config(config).context("Invalid configuration")?;
    print_config_warnings(&orch, output)?;

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let mut prompt = stdin_prompt();
    let prompted = if args.prompt {
        prompt
            .read_line("Directory: ")
            .await
            .context("Failed to read directory")?
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
    } else {
        None
    };

    let target = DirectoryTarget {
        explicit: args.dir,
        prompted,
        default_dir: cwd,
    };
    let reaction = search_once(&mut orch, &mut events, &target, output)
        .await
        .context("Directory search failed")?;
    show(&orch, reaction, args.pick, &mut prompt, output).await
}
