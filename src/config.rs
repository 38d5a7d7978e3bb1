use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::narrow::NarrowGroups;

const DEFAULT_SLOW_THRESHOLD_SECS: f64 = 3.0;

/// Main configuration for todoscope
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub keywords: KeywordsConfig,
    pub narrow: NarrowConfig,
    pub search: SearchConfig,
    pub picker: PickerConfig,
    pub highlight: HighlightConfig,
    pub project: ProjectConfig,
}

/// A recognized keyword and the color it is displayed with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordFace {
    pub keyword: String,
    /// Color name ("red", "bright yellow") or "#rrggbb"
    pub color: String,
}

impl KeywordFace {
    fn new(keyword: &str, color: &str) -> Self {
        Self {
            keyword: keyword.into(),
            color: color.into(),
        }
    }
}

/// Configuration for the keyword catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Keywords in match priority order
    pub faces: Vec<KeywordFace>,
    /// Punctuation allowed directly after a keyword and counted as part of
    /// the match (e.g. the colon in "TODO:")
    pub punctuation: String,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            faces: vec![
                KeywordFace::new("TODO", "#cc9393"),
                KeywordFace::new("FIXME", "#cc9393"),
                KeywordFace::new("BUG", "#cc9393"),
                KeywordFace::new("HACK", "#d0bf8f"),
                KeywordFace::new("XXX", "#cc9393"),
                KeywordFace::new("NOTE", "#d0bf8f"),
                KeywordFace::new("KLUDGE", "#d0bf8f"),
                KeywordFace::new("TEMP", "#d0bf8f"),
                KeywordFace::new("HOLD", "#d0bf8f"),
                KeywordFace::new("NEXT", "#dca3a3"),
                KeywordFace::new("FAIL", "#8c5353"),
                KeywordFace::new("DONE", "#afd8af"),
            ],
            punctuation: ":".into(),
        }
    }
}

/// Narrowing keys used to group candidates in the picker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrowConfig {
    /// `[key, keyword]` pairs, unique on both components
    pub keys: Vec<(String, String)>,
    /// Whether uncatalogued keywords get their own group
    pub group_other: bool,
    /// `[key, label]` for keywords not covered by `keys`
    pub other: (String, String),
}

impl Default for NarrowConfig {
    fn default() -> Self {
        Self {
            keys: vec![
                ("t".into(), "TODO".into()),
                ("f".into(), "FIXME".into()),
                ("b".into(), "BUG".into()),
                ("h".into(), "HACK".into()),
            ],
            group_other: true,
            other: (".".into(), "OTHER".into()),
        }
    }
}

/// Which directory search implementation to run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchBackend {
    /// ripgrep when it is installed, otherwise the built-in walker
    #[default]
    Auto,
    /// External `rg` process
    Ripgrep,
    /// In-process directory walk
    Walk,
}

/// Configuration for buffer and directory searches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Only report buffer matches that sit inside a comment
    pub comments_only: bool,
    /// Seconds after which a running directory search is considered slow
    /// and its results are cached instead of shown
    pub slow_threshold_secs: f64,
    pub backend: SearchBackend,
    /// Program used by the ripgrep backend
    pub rg_path: String,
    /// Glob patterns for files worth searching
    pub include: Vec<String>,
    /// Glob patterns to skip (in addition to .gitignore)
    pub exclude: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            comments_only: false,
            slow_threshold_secs: DEFAULT_SLOW_THRESHOLD_SECS,
            backend: SearchBackend::default(),
            rg_path: "rg".into(),
            include: [
                "rs", "c", "h", "cc", "cpp", "hpp", "go", "java", "kt", "swift", "cs", "scala",
                "js", "jsx", "ts", "tsx", "py", "rb", "sh", "bash", "zsh", "lua", "sql", "hs",
                "el", "lisp", "clj", "scm", "toml", "yaml", "yml", "css", "html", "xml", "md",
                "txt",
            ]
            .iter()
            .map(|ext| format!("*.{ext}"))
            .collect(),
            exclude: vec![
                "**/node_modules/**".into(),
                "**/target/**".into(),
                "**/dist/**".into(),
                "**/.git/**".into(),
                "**/build/**".into(),
                "**/__pycache__/**".into(),
            ],
        }
    }
}

impl SearchConfig {
    /// Negative values clamp to zero; values a `Duration` cannot hold fall
    /// back to the default threshold.
    pub fn slow_threshold(&self) -> Duration {
        let secs = self.slow_threshold_secs.max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
            tracing::warn!(
                "slow_threshold_secs = {secs} is out of range; using {DEFAULT_SLOW_THRESHOLD_SECS}"
            );
            Duration::from_secs_f64(DEFAULT_SLOW_THRESHOLD_SECS)
        })
    }
}

/// When the picker previews a candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewPolicy {
    /// Never preview
    None,
    /// Preview on any key
    #[default]
    AnyKey,
    /// Preview after the given delay in milliseconds
    Debounced(u64),
    /// Preview only on the listed keys
    Keys(Vec<String>),
}

impl PreviewPolicy {
    pub fn enabled(&self) -> bool {
        match self {
            PreviewPolicy::None => false,
            PreviewPolicy::Keys(keys) => !keys.is_empty(),
            PreviewPolicy::AnyKey | PreviewPolicy::Debounced(_) => true,
        }
    }
}

/// Configuration for the picker
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PickerConfig {
    /// Preview trigger for directory results
    pub preview: PreviewPolicy,
    /// Truncate listed rows to this many characters
    pub width: Option<usize>,
}

/// Configuration for which buffers count as highlighted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enabled: bool,
    /// File extensions where keyword highlighting is off
    pub exclude_extensions: Vec<String>,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude_extensions: vec!["org".into()],
        }
    }
}

impl HighlightConfig {
    /// Whether highlighting is active for a file with the given path
    pub fn active_for(&self, path: Option<&Path>) -> bool {
        if !self.enabled {
            return false;
        }
        let ext = path
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_lowercase());
        match ext {
            Some(ext) => !self.exclude_extensions.iter().any(|x| x.eq_ignore_ascii_case(&ext)),
            None => true,
        }
    }
}

/// Configuration for project root detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// File or directory names that mark a project root
    pub markers: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            markers: vec![
                ".git".into(),
                ".hg".into(),
                ".svn".into(),
                ".project".into(),
                ".projectile".into(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the per-user config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "todoscope", "todoscope")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the explicit config file if given, else the per-user file if it
    /// exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Configuration plus the values derived from it.
///
/// The narrow groups are computed on first use and kept until
/// [`Settings::reconfigure`] replaces the configuration.
#[derive(Debug, Default)]
pub struct Settings {
    config: Config,
    narrow: OnceLock<std::result::Result<NarrowGroups, String>>,
}

impl Settings {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            narrow: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Narrow groups extended with the OTHER bucket, memoized.
    pub fn narrow(&self) -> crate::Result<&NarrowGroups> {
        let built = self
            .narrow
            .get_or_init(|| NarrowGroups::try_build(&self.config.narrow));
        match built {
            Ok(groups) => Ok(groups),
            Err(detail) => Err(crate::TodoscopeError::NarrowConflict(detail.clone())),
        }
    }

    /// Replace the configuration and drop every derived value.
    pub fn reconfigure(&mut self, config: Config) {
        self.config = config;
        self.narrow = OnceLock::new();
    }
}
