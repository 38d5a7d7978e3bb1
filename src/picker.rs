//! Pickers: presenting a result set and reading the user's choice.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::error::{Result, TodoscopeError};
use crate::format::DisplayLine;
use crate::jump;
use crate::orchestrator::PickRequest;

#[derive(Debug, Error)]
pub enum PickError {
    /// The user backed out of the picker
    #[error("selection cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Presents result sets and returns the user's selection.
#[allow(async_fn_in_trait)]
pub trait Picker {
    /// Show `request` and return the chosen line, or `None` when the picker
    /// does not select.
    async fn pick(&mut self, request: &PickRequest) -> std::result::Result<Option<DisplayLine>, PickError>;

    /// Choose one of `options` by index.
    async fn choose(
        &mut self,
        prompt: &str,
        options: &[String],
    ) -> std::result::Result<Option<usize>, PickError>;
}

/// Allows one picker at a time.
#[derive(Debug, Clone, Default)]
pub struct PickerGate {
    active: Arc<AtomicBool>,
}

/// Holds the picker slot until dropped.
#[derive(Debug)]
pub struct PickerGuard {
    active: Arc<AtomicBool>,
}

impl PickerGate {
    /// Claim the slot, failing fast when another picker holds it.
    pub fn enter(&self) -> Result<PickerGuard> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(TodoscopeError::PickerBusy);
        }
        Ok(PickerGuard {
            active: Arc::clone(&self.active),
        })
    }
}

impl Drop for PickerGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

fn render(line: &DisplayLine, styled: bool, width: Option<usize>) -> String {
    match width {
        Some(w) => line.truncated(w).text,
        None if styled => line.styled.clone(),
        None => line.text.clone(),
    }
}

/// Prints every line and selects nothing.
pub struct PrintPicker {
    out: Box<dyn Write + Send>,
    styled: bool,
    width: Option<usize>,
}

impl PrintPicker {
    pub fn new(out: Box<dyn Write + Send>, styled: bool) -> Self {
        Self {
            out,
            styled,
            width: None,
        }
    }

    pub fn stdout(styled: bool) -> Self {
        Self::new(Box::new(io::stdout()), styled)
    }

    /// Truncate rows to `width` characters
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }
}

impl Picker for PrintPicker {
    async fn pick(&mut self, request: &PickRequest) -> std::result::Result<Option<DisplayLine>, PickError> {
        for line in &request.lines {
            writeln!(self.out, "{}", render(line, self.styled, self.width))?;
        }
        self.out.flush()?;
        Ok(None)
    }

    async fn choose(
        &mut self,
        _prompt: &str,
        options: &[String],
    ) -> std::result::Result<Option<usize>, PickError> {
        for option in options {
            writeln!(self.out, "{option}")?;
        }
        Ok(None)
    }
}

/// Line-oriented input plus the output it echoes to.
pub struct Prompt<R> {
    lines: Lines<R>,
    out: Box<dyn Write + Send>,
}

impl<R: AsyncBufRead + Unpin> Prompt<R> {
    pub fn new(reader: R, out: Box<dyn Write + Send>) -> Self {
        Self {
            lines: reader.lines(),
            out,
        }
    }

    /// Print `prompt` and read one line; `None` at end of input.
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        self.lines.next_line().await
    }

    /// Read the next line without printing a prompt.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }
}

/// Interactive picker over a [`Prompt`].
///
/// Input: a number selects that row; `<key> ` narrows to a group and `*`
/// shows every group again; `/text` filters rows by text; `?N` previews row
/// N when preview is enabled; an empty line or `q` cancels.
pub struct PromptPicker<'p, R> {
    prompt: &'p mut Prompt<R>,
    styled: bool,
}

impl<'p, R: AsyncBufRead + Unpin> PromptPicker<'p, R> {
    pub fn new(prompt: &'p mut Prompt<R>, styled: bool) -> Self {
        Self { prompt, styled }
    }

    fn show(
        &mut self,
        request: &PickRequest,
        visible: &[&DisplayLine],
        narrow: Option<char>,
    ) -> io::Result<()> {
        let out = self.prompt.out();
        writeln!(out, "{}", request.prompt.bold())?;
        if !request.groups.is_empty() {
            let legend: Vec<String> = request
                .groups
                .iter()
                .map(|(key, label)| {
                    let entry = format!("[{key}] {label}");
                    if narrow == Some(*key) {
                        entry.bold().to_string()
                    } else {
                        entry
                    }
                })
                .collect();
            writeln!(out, "  {}", legend.join("  ").dimmed())?;
        }
        let digits = visible.len().to_string().len();
        for (i, line) in visible.iter().enumerate() {
            let row = if self.styled {
                line.styled.as_str()
            } else {
                line.text.as_str()
            };
            writeln!(out, "{:>digits$}  {row}", i + 1)?;
        }
        Ok(())
    }
}

fn narrow_key(input: &str) -> Option<char> {
    let mut chars = input.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(c), None, _) | (Some(c), Some(' '), None) => Some(c),
        _ => None,
    }
}

impl<R: AsyncBufRead + Unpin> Picker for PromptPicker<'_, R> {
    async fn pick(&mut self, request: &PickRequest) -> std::result::Result<Option<DisplayLine>, PickError> {
        let mut narrow: Option<char> = None;
        let mut filter = String::new();

        loop {
            let visible: Vec<&DisplayLine> = request
                .lines
                .iter()
                .filter(|l| narrow.is_none() || l.narrow_key == narrow)
                .filter(|l| filter.is_empty() || l.text.contains(filter.as_str()))
                .collect();
            self.show(request, &visible, narrow)?;

            let Some(input) = self.prompt.read_line("> ").await? else {
                return Err(PickError::Cancelled);
            };
            let trimmed = input.trim();

            if trimmed.is_empty() || trimmed == "q" {
                return Err(PickError::Cancelled);
            }
            if let Ok(n) = trimmed.parse::<usize>() {
                match n.checked_sub(1).and_then(|i| visible.get(i)) {
                    Some(line) => return Ok(Some((*line).clone())),
                    None => writeln!(self.prompt.out(), "no row {n}")?,
                }
                continue;
            }
            if let Some(n) = trimmed.strip_prefix('?') {
                if !request.preview.enabled() {
                    writeln!(self.prompt.out(), "preview is off")?;
                    continue;
                }
                let target = n
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| visible.get(i))
                    .and_then(|line| jump::resolve(&line.location));
                match target {
                    Some(target) => {
                        writeln!(self.prompt.out(), "{}  {}", target.to_string().cyan(), target.text())?
                    }
                    None => writeln!(self.prompt.out(), "nothing to preview")?,
                }
                continue;
            }
            if trimmed == "*" {
                narrow = None;
                filter.clear();
                continue;
            }
            if let Some(text) = trimmed.strip_prefix('/') {
                filter = text.to_string();
                continue;
            }
            match narrow_key(input.trim_start()) {
                Some(key) if request.groups.iter().any(|(k, _)| *k == key) => narrow = Some(key),
                _ => writeln!(self.prompt.out(), "unrecognized input: {trimmed}")?,
            }
        }
    }

    async fn choose(
        &mut self,
        prompt: &str,
        options: &[String],
    ) -> std::result::Result<Option<usize>, PickError> {
        let digits = options.len().to_string().len();
        loop {
            writeln!(self.prompt.out(), "{}", prompt.bold())?;
            for (i, option) in options.iter().enumerate() {
                writeln!(self.prompt.out(), "{:>digits$}  {option}", i + 1)?;
            }
            let Some(input) = self.prompt.read_line("> ").await? else {
                return Err(PickError::Cancelled);
            };
            let trimmed = input.trim();
            if trimmed.is_empty() || trimmed == "q" {
                return Err(PickError::Cancelled);
            }
            match trimmed.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => writeln!(self.prompt.out(), "choose a number from 1 to {}", options.len())?,
            }
        }
    }
}
