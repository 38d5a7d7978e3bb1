use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::dir::{search_once, show};
use super::{print_config_warnings, stdin_prompt, OutputConfig};
use todoscope::config::Config;
use todoscope::orchestrator::{DirectoryTarget, Orchestrator};

#[derive(Args)]
pub struct ProjectArgs {
    /// File or directory inside the project
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Choose a result interactively and print its location
    #[arg(long)]
    pick: bool,
}

pub async fn run(args: ProjectArgs, output: OutputConfig, config: Config) -> Result<()> {
    let start = args
        .path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", args.path.display()))?;

    let (mut orch, mut events) = Orchestrator::from_config(config).context("Invalid configuration")?;
    print_config_warnings(&orch, output)?;

    let target = DirectoryTarget::for_project(&start);
    let reaction = search_once(&mut orch, &mut events, &target, output)
        .await
        .context("Project search failed")?;
    let mut prompt = stdin_prompt();
    show(&orch, reaction, args.pick, &mut prompt, output).await
}
