use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::{list_picker, print_config_warnings, react, stdin_prompt, OutputConfig};
use todoscope::buffer::BufferList;
use todoscope::config::Config;
use todoscope::orchestrator::{Orchestrator, Reaction};
use todoscope::picker::PromptPicker;

#[derive(Args)]
pub struct BufferArgs {
    /// File to load and search
    file: PathBuf,

    /// Only report keywords that sit inside comments
    #[arg(long)]
    comments_only: bool,

    /// Choose a result interactively and print its location
    #[arg(long)]
    pick: bool,
}

#[derive(Args)]
pub struct BuffersArgs {
    /// Files to load; those without keyword highlighting are skipped
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Only report keywords that sit inside comments
    #[arg(long)]
    comments_only: bool,

    /// Choose a result interactively and print its location
    #[arg(long)]
    pick: bool,
}

fn load(files: &[PathBuf], config: &Config) -> Result<BufferList> {
    let mut buffers = BufferList::new();
    for file in files {
        buffers
            .open(file, &config.highlight)
            .with_context(|| format!("Failed to open {}", file.display()))?;
    }
    Ok(buffers)
}

async fn finish(orch: &Orchestrator, reaction: Reaction, pick: bool, output: OutputConfig) -> Result<()> {
    if pick {
        let mut prompt = stdin_prompt();
        react(orch, reaction, &mut PromptPicker::new(&mut prompt, true), output).await
    } else {
        react(orch, reaction, &mut list_picker(orch), output).await
    }
}

pub async fn run(args: BufferArgs, output: OutputConfig, mut config: Config) -> Result<()> {
    config.search.comments_only |= args.comments_only;
    let buffers = load(std::slice::from_ref(&args.file), &config)?;

    let (orch, _events) = Orchestrator::from_config(config).context("Invalid configuration")?;
    print_config_warnings(&orch, output)?;

    let reaction = orch.search_current_buffer(&buffers)?;
    finish(&orch, reaction, args.pick, output).await
}

pub async fn run_many(args: BuffersArgs, output: OutputConfig, mut config: Config) -> Result<()> {
    config.search.comments_only |= args.comments_only;
    let buffers = load(&args.files, &config)?;

    let (orch, _events) = Orchestrator::from_config(config).context("Invalid configuration")?;
    print_config_warnings(&orch, output)?;

    let reaction = orch.search_all_buffers(&buffers)?;
    finish(&orch, reaction, args.pick, output).await
}
