//! Directory search through an external `rg` process.
//!
//! `rg --json` output is captured into a per-run [`ScratchBuffer`] and parsed
//! once the process exits. The scratch buffer is released on every exit
//! path, whether or not parsing happened.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::runner::{DirectorySearcher, RunFailure, RunOutcome};
use crate::config::SearchConfig;
use crate::keywords::{word_at, KeywordCatalog};
use crate::narrow::NarrowGroups;
use crate::types::{Candidate, Location};

/// Tracks live scratch buffers by name.
#[derive(Debug, Clone, Default)]
pub struct ScratchRegistry {
    live: Arc<Mutex<BTreeSet<String>>>,
    counter: Arc<AtomicU64>,
}

impl ScratchRegistry {
    /// Create a uniquely named scratch buffer for a search of `directory`.
    pub fn create(&self, directory: &Path) -> ScratchBuffer {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("*todoscope-rg {} #{n}*", directory.display());
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone());
        ScratchBuffer {
            name,
            contents: Vec::new(),
            live: Arc::clone(&self.live),
        }
    }

    /// Names of scratch buffers not yet released
    pub fn live(&self) -> Vec<String> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Captured output of one search process.
#[derive(Debug)]
pub struct ScratchBuffer {
    name: String,
    contents: Vec<u8>,
    live: Arc<Mutex<BTreeSet<String>>>,
}

impl ScratchBuffer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        tracing::trace!(name = %self.name, bytes = self.contents.len(), "releasing scratch buffer");
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

#[derive(Deserialize)]
struct RgLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// rg reports UTF-8 data as `text` and anything else as base64 `bytes`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RgText {
    text: Option<String>,
    bytes: Option<String>,
}

impl RgText {
    fn raw(self) -> Option<Vec<u8>> {
        match (self.text, self.bytes) {
            (Some(text), _) => Some(text.into_bytes()),
            (None, Some(encoded)) => STANDARD.decode(encoded).ok(),
            (None, None) => None,
        }
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

#[derive(Deserialize)]
struct RgSubmatch {
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RgMatch {
    #[serde(default)]
    path: RgText,
    #[serde(default)]
    lines: RgText,
    line_number: Option<usize>,
    #[serde(default)]
    submatches: Vec<RgSubmatch>,
}

/// Turn `rg --json` output into candidates, one per highlighted submatch,
/// in output order. Lines that are not match records are skipped.
pub(crate) fn parse_json_output(
    output: &[u8],
    directory: &Path,
    catalog: &dyn KeywordCatalog,
    narrow: &NarrowGroups,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for raw in output.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
        let Ok(line) = serde_json::from_slice::<RgLine>(raw) else {
            continue;
        };
        if line.kind != "match" {
            continue;
        }
        let Ok(record) = serde_json::from_value::<RgMatch>(line.data) else {
            continue;
        };
        let (Some(path), Some(raw_line), Some(line_number)) =
            (record.path.raw(), record.lines.raw(), record.line_number)
        else {
            continue;
        };
        let path = {
            let p = path_from_bytes(path);
            if p.is_absolute() {
                p
            } else {
                directory.join(p)
            }
        };
        let source_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        for sub in record.submatches {
            // offsets are into the raw line; decode each piece separately so
            // replacement characters cannot shift them
            let (Some(before), Some(matched), Some(after)) = (
                raw_line.get(..sub.start),
                raw_line.get(sub.start..sub.end),
                raw_line.get(sub.end..),
            ) else {
                continue;
            };
            let before = String::from_utf8_lossy(before);
            let matched = String::from_utf8_lossy(matched);
            let after = String::from_utf8_lossy(after);
            let text = format!("{before}{matched}{after}");

            let keyword = catalog
                .keyword_in(&matched)
                .filter(|k| !k.is_empty())
                .or_else(|| word_at(&text, before.len()))
                .or_else(|| Some(matched.trim()).filter(|m| !m.is_empty()));
            let Some(keyword) = keyword else {
                continue;
            };
            let excerpt = after.lines().next().unwrap_or_default().trim();

            candidates.push(Candidate {
                source_name: source_name.clone(),
                line_number,
                keyword_type: keyword.to_string(),
                location: Location::File {
                    path: path.clone(),
                    line: line_number,
                    column: before.chars().count() + 1,
                },
                narrow_key: narrow.key_for(keyword),
                excerpt: excerpt.to_string(),
            });
        }
    }
    candidates
}

/// Searches with ripgrep.
pub struct RipgrepSearcher {
    program: String,
    include: Vec<String>,
    exclude: Vec<String>,
    catalog: Arc<dyn KeywordCatalog>,
    narrow: NarrowGroups,
    scratch: ScratchRegistry,
}

impl RipgrepSearcher {
    pub fn new(config: &SearchConfig, catalog: Arc<dyn KeywordCatalog>, narrow: NarrowGroups) -> Self {
        Self {
            program: config.rg_path.clone(),
            include: config.include.clone(),
            exclude: config.exclude.clone(),
            catalog,
            narrow,
            scratch: ScratchRegistry::default(),
        }
    }

    /// Whether `program --version` runs
    pub fn available(program: &str) -> bool {
        std::process::Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    pub fn scratch(&self) -> &ScratchRegistry {
        &self.scratch
    }

    fn command(&self, directory: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--json", "--no-config", "--no-messages", "--column"]);
        cmd.arg("-e").arg(self.catalog.search_regex());
        for glob in &self.include {
            cmd.arg("--glob").arg(glob);
        }
        for glob in &self.exclude {
            cmd.arg("--glob").arg(format!("!{glob}"));
        }
        cmd.arg("--").arg(directory);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }
}

async fn capture(
    program: String,
    mut cmd: Command,
    scratch: &mut ScratchBuffer,
) -> std::result::Result<(), RunFailure> {
    let mut child = cmd.spawn().map_err(|e| {
        tracing::warn!(%program, error = %e, "failed to launch search process");
        RunFailure::new(format!("failed to launch {program}: {e}"))
    })?;
    if let Some(mut stdout) = child.stdout.take() {
        stdout
            .read_to_end(&mut scratch.contents)
            .await
            .map_err(|e| RunFailure::new(format!("reading {program} output: {e}")))?;
    }
    let status = child
        .wait()
        .await
        .map_err(|e| RunFailure::new(format!("waiting for {program}: {e}")))?;
    // 0 = matches, 1 = no matches, 2+ = error, None = killed by a signal
    match status.code() {
        Some(0 | 1) => Ok(()),
        _ => Err(RunFailure::new(format!("{program} {status}"))),
    }
}

impl DirectorySearcher for RipgrepSearcher {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    fn search(&self, directory: PathBuf) -> BoxFuture<'static, RunOutcome> {
        let cmd = self.command(&directory);
        let program = self.program.clone();
        let mut scratch = self.scratch.create(&directory);
        let catalog = Arc::clone(&self.catalog);
        let narrow = self.narrow.clone();

        Box::pin(async move {
            capture(program, cmd, &mut scratch).await?;
            let candidates =
                parse_json_output(scratch.contents(), &directory, catalog.as_ref(), &narrow);
            tracing::debug!(scratch = scratch.name(), count = candidates.len(), "parsed rg output");
            Ok(candidates)
        })
    }
}
