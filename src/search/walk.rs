use futures::future::BoxFuture;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::runner::{DirectorySearcher, RunFailure, RunOutcome};
use crate::config::SearchConfig;
use crate::keywords::KeywordCatalog;
use crate::narrow::NarrowGroups;
use crate::scan::scan_file_text;
use crate::types::Candidate;

struct WalkInner {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    catalog: Arc<dyn KeywordCatalog>,
    narrow: NarrowGroups,
}

/// Searches a directory in-process, for when ripgrep is not installed.
///
/// Honors `.gitignore` and skips hidden files. Files are visited in file
/// name order and files that are not valid UTF-8 are skipped.
#[derive(Clone)]
pub struct WalkSearcher {
    inner: Arc<WalkInner>,
}

fn patterns(globs: &[String]) -> Vec<glob::Pattern> {
    globs
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "ignoring invalid glob");
                None
            }
        })
        .collect()
}

impl WalkSearcher {
    pub fn new(config: &SearchConfig, catalog: Arc<dyn KeywordCatalog>, narrow: NarrowGroups) -> Self {
        Self {
            inner: Arc::new(WalkInner {
                include: patterns(&config.include),
                exclude: patterns(&config.exclude),
                catalog,
                narrow,
            }),
        }
    }
}

impl WalkInner {
    fn wanted(&self, rel_path: &str) -> bool {
        !self.exclude.iter().any(|p| p.matches(rel_path))
            && self.include.iter().any(|p| p.matches(rel_path))
    }

    fn search(&self, root: &Path) -> RunOutcome {
        if !root.is_dir() {
            return Err(RunFailure::new(format!("{} is not a directory", root.display())));
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut files = 0usize;
        for entry in builder.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().map_or(true, |ft| ft.is_dir()) {
                continue;
            }

            let path = entry.path();
            let rel_path = path.strip_prefix(root).unwrap_or(path).to_string_lossy();
            if !self.wanted(&rel_path) {
                continue;
            }

            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            // NUL bytes mark a binary file, as ripgrep treats them
            if bytes.contains(&0) {
                tracing::trace!(path = %path.display(), "skipping binary file");
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            files += 1;
            candidates.extend(scan_file_text(path, &text, self.catalog.as_ref(), &self.narrow));
        }

        tracing::debug!(root = %root.display(), files, matches = candidates.len(), "walk finished");
        Ok(candidates)
    }
}

impl DirectorySearcher for WalkSearcher {
    fn name(&self) -> &'static str {
        "walk"
    }

    fn search(&self, directory: PathBuf) -> BoxFuture<'static, RunOutcome> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || inner.search(&directory))
                .await
                .unwrap_or_else(|e| Err(RunFailure::new(format!("walk task failed: {e}"))))
        })
    }
}
