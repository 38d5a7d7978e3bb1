#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory plus a config file that lives outside it.
pub struct TestProject {
    pub dir: TempDir,
    config_dir: TempDir,
}

impl TestProject {
    /// Create a project marked as a project root, searched with the
    /// built-in walker.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir(dir.path().join(".git")).expect("failed to create project marker");
        let project = Self {
            dir,
            config_dir: TempDir::new().expect("failed to create config dir"),
        };
        project.write_config("[search]\nbackend = \"walk\"\n");
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Canonical project path, as directory searches report it.
    pub fn canonical_path(&self) -> PathBuf {
        self.dir.path().canonicalize().expect("failed to canonicalize")
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("config.toml")
    }

    /// Replace the config file contents.
    pub fn write_config(&self, content: &str) {
        std::fs::write(self.config_path(), content).expect("failed to write config");
    }

    /// Write a file relative to the project root, creating parent dirs as needed.
    pub fn write_file(&self, relative_path: &str, content: &str) {
        let full = self.dir.path().join(relative_path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&full, content).expect("failed to write file");
    }

    /// Write a small annotated source tree.
    pub fn write_fixtures(&self) {
        self.write_file(
            "src/lib.rs",
            r#"//! Sample library.

pub fn add(a: i32, b: i32) -> i32 {
    // TODO: fix this
    a + b
}

pub fn parse(input: &str) -> usize {
    let s = "TODO inside a string";
    // BUG: crash on empty input
    input.len() + s.len()
}
"#,
        );
        self.write_file(
            "src/util.py",
            "def clamp(x):\n    # HACK: hard-coded bounds\n    return max(0, min(x, 10))\n",
        );
        self.write_file("notes.org", "* TODO: write the docs\n");
    }

    /// Command for the todoscope binary, run inside the project with this
    /// project's config.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(Self::bin());
        cmd.current_dir(self.path())
            .env_remove("TODOSCOPE_CONFIG")
            .env("NO_COLOR", "1")
            .arg("--no-color")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }

    /// Return the path to the todoscope binary (built via cargo).
    pub fn bin() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_todoscope"))
    }
}
