use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::io::{BufReader, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;

use super::{print_config_warnings, print_notice, react, stdin_prompt, OutputConfig};
use todoscope::buffer::BufferList;
use todoscope::config::Config;
use todoscope::orchestrator::{ClearTarget, DirectoryTarget, Notice, Orchestrator, Reaction};
use todoscope::picker::{PickError, Picker, Prompt, PromptPicker};
use todoscope::search::SearchEvent;

#[derive(Args)]
pub struct ShellArgs {
    /// Files to open as buffers at startup
    files: Vec<PathBuf>,
}

const HELP: &str = "\
Commands:
  open FILE        load FILE as a buffer and make it current
  buffer [NAME]    search the current (or named) buffer
  buffers          search every buffer with highlighting active
  dir [DIR]        search a directory (default: the current project)
  dir?             ask for a directory, then search it
  project          search the project of the current buffer
  wait             wait for running directory searches
  cache            list cached directories
  clear-cache      choose one cached directory to forget
  clear-cache!     forget every cached directory
  help             show this help
  quit             leave the shell";

struct Session {
    orch: Orchestrator,
    events: UnboundedReceiver<SearchEvent>,
    buffers: BufferList,
    prompt: Prompt<BufReader<Stdin>>,
    cwd: PathBuf,
    output: OutputConfig,
}

impl Session {
    fn warn(&self, message: impl std::fmt::Display) {
        if self.output.json {
            tracing::warn!("{message}");
        } else {
            println!("{} {message}", "!".yellow());
        }
    }

    async fn show(&mut self, reaction: Reaction) -> Result<()> {
        if let Reaction::Pending { directory } = &reaction {
            if !self.output.quiet && !self.output.json {
                println!("{} Searching {} in the background", "·".dimmed(), directory.cyan());
            }
            return Ok(());
        }
        let mut picker = PromptPicker::new(&mut self.prompt, true);
        match react(&self.orch, reaction, &mut picker, self.output).await {
            Err(e) if e.downcast_ref::<todoscope::TodoscopeError>().is_some() => {
                self.warn(e);
                Ok(())
            }
            other => other,
        }
    }

    async fn event(&mut self, event: SearchEvent) -> Result<()> {
        match self.orch.handle_event(event) {
            Some(reaction) => self.show(reaction).await,
            None => Ok(()),
        }
    }

    async fn wait(&mut self) -> Result<()> {
        while self.orch.is_searching() {
            let Some(event) = self.events.recv().await else {
                break;
            };
            self.event(event).await?;
        }
        Ok(())
    }

    async fn search_directory(&mut self, target: DirectoryTarget) -> Result<()> {
        match self.orch.search_directory(&target) {
            Ok(reaction) => self.show(reaction).await,
            Err(e) => {
                self.warn(e);
                Ok(())
            }
        }
    }

    async fn clear_one(&mut self) -> Result<()> {
        let directories = self.orch.cached_directories();
        if directories.is_empty() {
            print_notice(&Notice::CacheEmpty, self.output);
            return Ok(());
        }
        let _guard = self.orch.enter_picker()?;
        let chosen = PromptPicker::new(&mut self.prompt, false)
            .choose("Clear which cached directory?", &directories)
            .await;
        match chosen {
            Ok(Some(i)) => {
                let notice = self.orch.clear_cache(ClearTarget::One(directories[i].clone()));
                print_notice(&notice, self.output);
            }
            Ok(None) | Err(PickError::Cancelled) => {}
            Err(PickError::Io(e)) => return Err(e).context("Failed to read selection"),
        }
        Ok(())
    }

    /// Run one command line. Returns false when the session should end.
    async fn command(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };

        match cmd {
            "" => {}
            "quit" | "exit" => return Ok(false),
            "help" => println!("{HELP}"),
            "open" => match arg {
                Some(path) => {
                    let highlight = self.orch.config().highlight.clone();
                    match self.buffers.open(Path::new(path), &highlight) {
                        Ok(buffer) if !self.output.quiet => {
                            println!("{} Opened {}", "✓".green(), buffer.name().cyan());
                        }
                        Ok(_) => {}
                        Err(e) => self.warn(e),
                    }
                }
                None => self.warn("usage: open FILE"),
            },
            "buffer" => {
                if let Some(name) = arg {
                    if self.buffers.switch_to(name).is_none() {
                        self.warn(format!("No buffer named {name}"));
                        return Ok(true);
                    }
                }
                let reaction = self.orch.search_current_buffer(&self.buffers)?;
                self.show(reaction).await?;
            }
            "buffers" => {
                let reaction = self.orch.search_all_buffers(&self.buffers)?;
                self.show(reaction).await?;
            }
            "dir" => {
                let target = match arg {
                    Some(dir) => DirectoryTarget::explicit(self.cwd.join(dir)),
                    None => DirectoryTarget::from_default(self.cwd.clone()),
                };
                self.search_directory(target).await?;
            }
            "dir?" => {
                let answer = self
                    .prompt
                    .read_line("Directory: ")
                    .await
                    .context("Failed to read input")?;
                let prompted = answer
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .map(|a| self.cwd.join(a));
                let target = DirectoryTarget {
                    explicit: None,
                    prompted,
                    default_dir: self.cwd.clone(),
                };
                self.search_directory(target).await?;
            }
            "project" => {
                let start = self
                    .buffers
                    .current()
                    .and_then(|b| b.path())
                    .unwrap_or_else(|| self.cwd.clone());
                match self.orch.search_project(&start) {
                    Ok(reaction) => self.show(reaction).await?,
                    Err(e) => self.warn(e),
                }
            }
            "wait" => self.wait().await?,
            "cache" => {
                let directories = self.orch.cached_directories();
                if directories.is_empty() {
                    print_notice(&Notice::CacheEmpty, self.output);
                } else if self.output.json {
                    println!("{}", serde_json::to_string_pretty(&directories)?);
                } else {
                    for directory in directories {
                        let count = self.orch.cache().get(&directory).map_or(0, <[_]>::len);
                        println!("{}  {}", directory.cyan(), format!("({count})").dimmed());
                    }
                }
            }
            "clear-cache" => self.clear_one().await?,
            "clear-cache!" => {
                let notice = self.orch.clear_cache(ClearTarget::All);
                print_notice(&notice, self.output);
            }
            other => self.warn(format!("Unknown command `{other}`; try `help`")),
        }
        Ok(true)
    }
}

pub async fn run(args: ShellArgs, output: OutputConfig, config: Config) -> Result<()> {
    let mut buffers = BufferList::new();
    for file in &args.files {
        buffers
            .open(file, &config.highlight)
            .with_context(|| format!("Failed to open {}", file.display()))?;
    }

    let (orch, events) = Orchestrator::from_config(config).context("Invalid configuration")?;
    print_config_warnings(&orch, output)?;

    let mut session = Session {
        orch,
        events,
        buffers,
        prompt: stdin_prompt(),
        cwd: std::env::current_dir().context("Failed to read current directory")?,
        output,
    };

    if !output.quiet && !output.json {
        println!("todoscope shell; type `help` for commands");
    }

    loop {
        let line = tokio::select! {
            biased;
            Some(event) = session.events.recv() => {
                session.event(event).await?;
                continue;
            }
            line = session.prompt.read_line("todoscope> ") => {
                line.context("Failed to read input")?
            }
        };
        let Some(line) = line else {
            break;
        };
        if !session.command(&line).await? {
            break;
        }
    }

    if session.orch.is_searching() {
        tracing::info!("leaving with directory searches still running");
    }
    Ok(())
}
