//! Top-level search decisions.
//!
//! The orchestrator picks a scan path for each scope, owns the directory
//! cache, and turns background run events into reactions for whoever drives
//! the session. It never opens a picker itself: every entry point returns a
//! [`Reaction`] and the driver decides how to present it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::buffer::{Buffer, BufferList};
use crate::cache::ResultCache;
use crate::config::{Config, PreviewPolicy, Settings};
use crate::error::{Result, TodoscopeError};
use crate::format::{format, DisplayLine};
use crate::jump;
use crate::keywords::HighlightCatalog;
use crate::narrow::NarrowGroups;
use crate::picker::{PickerGate, PickerGuard};
use crate::project::{MarkerResolver, ProjectResolver};
use crate::scan::scan_buffers;
use crate::search::{searcher_from_config, spawn_run, DirectorySearcher, RunId, SearchEvent};
use crate::types::{Candidate, JumpTarget};

/// What a picker is being opened for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickKind {
    /// Live buffer positions; direct jump, no preview
    Buffer,
    /// Results for the given directory
    Directory(String),
}

/// Everything a picker needs to present one result set.
#[derive(Debug, Clone)]
pub struct PickRequest {
    pub kind: PickKind,
    pub prompt: String,
    pub lines: Vec<DisplayLine>,
    pub candidates: Vec<Candidate>,
    /// Narrow groups, OTHER last
    pub groups: Vec<(char, String)>,
    pub preview: PreviewPolicy,
}

/// How a notice should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
}

/// A user-visible message that is not a result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoResults,
    SearchSlow { directory: String },
    CachingComplete { directory: String, count: usize },
    AlreadyRunning { directory: String },
    CacheEmpty,
    CacheCleared { removed: usize },
    ConfigWarning(String),
}

impl Notice {
    pub fn kind(&self) -> NoticeKind {
        match self {
            Notice::CachingComplete { .. } | Notice::CacheCleared { .. } => NoticeKind::Success,
            Notice::NoResults | Notice::ConfigWarning(_) => NoticeKind::Warning,
            Notice::SearchSlow { .. } | Notice::AlreadyRunning { .. } | Notice::CacheEmpty => {
                NoticeKind::Info
            }
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoResults => write!(f, "No keyword matches found"),
            Notice::SearchSlow { directory } => write!(
                f,
                "Searching {directory} is taking a while; results will be cached"
            ),
            Notice::CachingComplete { directory, count } => write!(
                f,
                "Cached {count} result{} for {directory}; search it again to see them",
                if *count == 1 { "" } else { "s" }
            ),
            Notice::AlreadyRunning { directory } => {
                write!(f, "A search of {directory} is already running")
            }
            Notice::CacheEmpty => write!(f, "No cached directory results"),
            Notice::CacheCleared { removed } => write!(
                f,
                "Cleared {removed} cached director{}",
                if *removed == 1 { "y" } else { "ies" }
            ),
            Notice::ConfigWarning(warning) => write!(f, "Configuration: {warning}"),
        }
    }
}

/// Outcome of a command or of a background event
#[derive(Debug)]
pub enum Reaction {
    /// Open a picker with these results
    Show(PickRequest),
    /// A directory search was started; its outcome arrives as an event
    Pending { directory: String },
    Notice(Notice),
}

/// Candidate directories for a directory search, highest precedence first.
#[derive(Debug, Clone, Default)]
pub struct DirectoryTarget {
    /// Directory given on the command line
    pub explicit: Option<PathBuf>,
    /// Directory the user chose interactively
    pub prompted: Option<PathBuf>,
    /// Where to start project detection, and the fallback when there is no
    /// project
    pub default_dir: PathBuf,
}

impl DirectoryTarget {
    pub fn explicit(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            explicit: Some(dir.clone()),
            prompted: None,
            default_dir: dir,
        }
    }

    pub fn from_default(dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Target for the project around `start`, which may be a file.
    pub fn for_project(start: &Path) -> Self {
        let dir = if start.is_file() {
            start.parent().unwrap_or(start)
        } else {
            start
        };
        Self::from_default(dir)
    }
}

/// Which cache entries to remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    One(String),
}

pub struct Orchestrator {
    settings: Settings,
    catalog: Arc<HighlightCatalog>,
    searcher: Arc<dyn DirectorySearcher>,
    searcher_from_config: bool,
    resolver: Box<dyn ProjectResolver>,
    cache: ResultCache,
    in_flight: HashMap<String, RunId>,
    next_run: RunId,
    events: UnboundedSender<SearchEvent>,
    gate: PickerGate,
}

impl Orchestrator {
    /// Orchestrator with an injected directory searcher and project resolver.
    ///
    /// Search events for the session arrive on the returned receiver and
    /// must be fed back through [`Orchestrator::handle_event`].
    pub fn new(
        config: Config,
        searcher: Arc<dyn DirectorySearcher>,
        resolver: Box<dyn ProjectResolver>,
    ) -> Result<(Self, UnboundedReceiver<SearchEvent>)> {
        let catalog = Arc::new(HighlightCatalog::from_config(&config.keywords)?);
        let (events, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            settings: Settings::new(config),
            catalog,
            searcher,
            searcher_from_config: false,
            resolver,
            cache: ResultCache::new(),
            in_flight: HashMap::new(),
            next_run: 0,
            events,
            gate: PickerGate::default(),
        };
        Ok((orchestrator, rx))
    }

    /// Orchestrator whose searcher and resolver come from configuration.
    ///
    /// Fails when the narrow mapping conflicts with its OTHER extension.
    pub fn from_config(config: Config) -> Result<(Self, UnboundedReceiver<SearchEvent>)> {
        let resolver = Box::new(MarkerResolver::new(config.project.markers.clone()));
        let settings = Settings::new(config);
        let catalog = Arc::new(HighlightCatalog::from_config(&settings.config().keywords)?);
        let searcher = searcher_from_config(
            &settings.config().search,
            catalog.clone(),
            settings.narrow()?.clone(),
        );
        let (events, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            settings,
            catalog,
            searcher,
            searcher_from_config: true,
            resolver,
            cache: ResultCache::new(),
            in_flight: HashMap::new(),
            next_run: 0,
            events,
            gate: PickerGate::default(),
        };
        Ok((orchestrator, rx))
    }

    pub fn config(&self) -> &Config {
        self.settings.config()
    }

    pub fn searcher_name(&self) -> &'static str {
        self.searcher.name()
    }

    /// Replace the configuration. Derived values, including the narrow
    /// groups, are recomputed. The cache is kept.
    ///
    /// A configuration that fails to build leaves the orchestrator as it was.
    pub fn reconfigure(&mut self, config: Config) -> Result<()> {
        let catalog = Arc::new(HighlightCatalog::from_config(&config.keywords)?);
        let narrow = NarrowGroups::build(&config.narrow)?;
        if self.searcher_from_config {
            self.resolver = Box::new(MarkerResolver::new(config.project.markers.clone()));
            self.searcher = searcher_from_config(&config.search, catalog.clone(), narrow);
        }
        self.catalog = catalog;
        self.settings.reconfigure(config);
        Ok(())
    }

    /// Problems in the configuration that were worked around
    pub fn config_warnings(&self) -> Result<Vec<Notice>> {
        Ok(self
            .settings
            .narrow()?
            .warnings()
            .iter()
            .map(|w| Notice::ConfigWarning(w.clone()))
            .collect())
    }

    /// Search the current buffer.
    pub fn search_current_buffer(&self, buffers: &BufferList) -> Result<Reaction> {
        let current: Vec<Buffer> = buffers.current().cloned().into_iter().collect();
        self.search_buffers(&current)
    }

    /// Search every open buffer that has keyword highlighting active.
    pub fn search_all_buffers(&self, buffers: &BufferList) -> Result<Reaction> {
        self.search_buffers(&buffers.highlighted())
    }

    /// Search the given buffers in order.
    pub fn search_buffers(&self, buffers: &[Buffer]) -> Result<Reaction> {
        let narrow = self.settings.narrow()?;
        let candidates = scan_buffers(
            buffers,
            self.catalog.as_ref(),
            narrow,
            self.config().search.comments_only,
        );
        tracing::info!(buffers = buffers.len(), matches = candidates.len(), "buffer search");
        self.present(PickKind::Buffer, "Buffer keywords".into(), candidates)
    }

    /// Search a directory, serving cached results when present.
    ///
    /// On a cache miss a background run is started and `Pending` is returned;
    /// the run's outcome arrives as a [`SearchEvent`].
    pub fn search_directory(&mut self, target: &DirectoryTarget) -> Result<Reaction> {
        // conflicts surface before anything is launched
        self.settings.narrow()?;
        let directory = self.resolve_directory(target)?;

        if let Some(cached) = self.cache.get(&directory) {
            tracing::info!(%directory, count = cached.len(), "serving directory search from cache");
            let candidates = cached.to_vec();
            return self.present(PickKind::Directory(directory.clone()), directory, candidates);
        }

        if self.in_flight.contains_key(&directory) {
            return Ok(Reaction::Notice(Notice::AlreadyRunning { directory }));
        }

        self.next_run += 1;
        let run = self.next_run;
        self.in_flight.insert(directory.clone(), run);
        spawn_run(
            Arc::clone(&self.searcher),
            run,
            directory.clone(),
            self.config().search.slow_threshold(),
            self.events.clone(),
        );
        Ok(Reaction::Pending { directory })
    }

    /// Search the project containing `start`, or `start` itself when it is
    /// not inside a project.
    pub fn search_project(&mut self, start: &Path) -> Result<Reaction> {
        self.search_directory(&DirectoryTarget::for_project(start))
    }

    /// Apply one background event.
    pub fn handle_event(&mut self, event: SearchEvent) -> Option<Reaction> {
        match event {
            SearchEvent::BecameSlow { directory, .. } => {
                Some(Reaction::Notice(Notice::SearchSlow { directory }))
            }
            SearchEvent::Finished {
                run,
                directory,
                became_slow,
                outcome,
            } => {
                if self.in_flight.get(&directory) == Some(&run) {
                    self.in_flight.remove(&directory);
                }
                let candidates = match outcome {
                    Ok(candidates) => candidates,
                    Err(failure) => {
                        tracing::debug!(run, %directory, %failure, "directory search failed");
                        return None;
                    }
                };
                if became_slow {
                    let count = candidates.len();
                    self.cache.put(directory.clone(), candidates);
                    return Some(Reaction::Notice(Notice::CachingComplete { directory, count }));
                }
                let kind = PickKind::Directory(directory.clone());
                match self.present(kind, directory, candidates) {
                    Ok(reaction) => Some(reaction),
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot present directory results");
                        None
                    }
                }
            }
        }
    }

    /// Whether any directory search is still running
    pub fn is_searching(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Where a picked line points now
    pub fn jump(&self, line: &DisplayLine) -> Option<JumpTarget> {
        jump::resolve(&line.location)
    }

    pub fn cached_directories(&self) -> Vec<String> {
        self.cache.keys().map(str::to_string).collect()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn clear_cache(&mut self, target: ClearTarget) -> Notice {
        if self.cache.is_empty() {
            return Notice::CacheEmpty;
        }
        let removed = match target {
            ClearTarget::All => self.cache.clear_all(),
            ClearTarget::One(directory) => usize::from(self.cache.clear(&directory)),
        };
        tracing::info!(removed, "cleared directory cache");
        Notice::CacheCleared { removed }
    }

    /// Claim the single picker slot.
    pub fn enter_picker(&self) -> Result<PickerGuard> {
        self.gate.enter()
    }

    fn resolve_directory(&self, target: &DirectoryTarget) -> Result<String> {
        let chosen = target
            .explicit
            .clone()
            .or_else(|| target.prompted.clone())
            .or_else(|| self.resolver.project_root(&target.default_dir))
            .unwrap_or_else(|| target.default_dir.clone());
        let canonical = chosen.canonicalize().map_err(|source| TodoscopeError::Read {
            path: chosen.clone(),
            source,
        })?;
        Ok(canonical.display().to_string())
    }

    fn present(&self, kind: PickKind, prompt: String, candidates: Vec<Candidate>) -> Result<Reaction> {
        let lines = match format(&candidates, self.catalog.as_ref()) {
            Ok(lines) => lines,
            Err(TodoscopeError::NoResults) => return Ok(Reaction::Notice(Notice::NoResults)),
            Err(e) => return Err(e),
        };
        let preview = match kind {
            PickKind::Buffer => PreviewPolicy::None,
            PickKind::Directory(_) => self.config().picker.preview.clone(),
        };
        let groups = self
            .settings
            .narrow()?
            .groups()
            .map(|(key, label)| (key, label.to_string()))
            .collect();
        Ok(Reaction::Show(PickRequest {
            kind,
            prompt,
            lines,
            candidates,
            groups,
            preview,
        }))
    }
}
