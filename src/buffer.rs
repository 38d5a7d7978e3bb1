//! In-memory text buffers with live position markers.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::config::HighlightConfig;
use crate::error::{Result, TodoscopeError};
use crate::syntax::CommentSyntax;

#[derive(Debug)]
struct BufferState {
    name: String,
    path: Option<PathBuf>,
    text: String,
    point: usize,
    restriction: Option<Range<usize>>,
    markers: Vec<Weak<AtomicUsize>>,
    syntax: CommentSyntax,
    highlighting: bool,
}

fn floor_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

impl BufferState {
    fn each_marker(&mut self, mut adjust: impl FnMut(usize) -> usize) {
        self.markers.retain(|weak| match weak.upgrade() {
            Some(pos) => {
                let old = pos.load(Ordering::Relaxed);
                pos.store(adjust(old), Ordering::Relaxed);
                true
            }
            None => false,
        });
    }
}

/// A named text buffer, shared by handle.
///
/// Cloning a `Buffer` clones the handle, not the text. The buffer lives as
/// long as any handle does; markers only hold weak references.
#[derive(Clone)]
pub struct Buffer {
    state: Arc<Mutex<BufferState>>,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("name", &self.name()).finish()
    }
}

impl Buffer {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_path(name.into(), None, text.into())
    }

    fn with_path(name: String, path: Option<PathBuf>, text: String) -> Self {
        let syntax = CommentSyntax::for_path(path.as_deref().or(Some(Path::new(&name))));
        Self {
            state: Arc::new(Mutex::new(BufferState {
                name,
                path,
                text,
                point: 0,
                restriction: None,
                markers: Vec::new(),
                syntax,
                highlighting: true,
            })),
        }
    }

    /// Load a file into a new buffer named after the file.
    pub fn from_file(path: &Path, highlight: &HighlightConfig) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| TodoscopeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let buffer = Self::with_path(name, Some(path.to_path_buf()), text);
        buffer.set_highlighting(highlight.active_for(Some(path)));
        Ok(buffer)
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    fn rename(&self, name: String) {
        self.lock().name = name;
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` over the whole text, ignoring any restriction.
    pub fn with_text<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.lock().text)
    }

    /// The accessible region of the text.
    pub fn accessible(&self) -> Range<usize> {
        let state = self.lock();
        state.restriction.clone().unwrap_or(0..state.text.len())
    }

    pub fn syntax(&self) -> CommentSyntax {
        self.lock().syntax
    }

    /// Whether keyword highlighting is active in this buffer
    pub fn highlighting(&self) -> bool {
        self.lock().highlighting
    }

    pub fn set_highlighting(&self, on: bool) {
        self.lock().highlighting = on;
    }

    pub fn point(&self) -> usize {
        self.lock().point
    }

    pub fn set_point(&self, pos: usize) {
        let mut state = self.lock();
        state.point = floor_boundary(&state.text, pos);
    }

    /// Restrict the accessible region to `range`.
    pub fn narrow_to(&self, range: Range<usize>) {
        let mut state = self.lock();
        let start = floor_boundary(&state.text, range.start);
        let end = floor_boundary(&state.text, range.end).max(start);
        state.restriction = Some(start..end);
    }

    pub fn widen(&self) {
        self.lock().restriction = None;
    }

    /// Run `f` with the buffer widened, then restore point and restriction.
    pub fn save_excursion<R>(&self, f: impl FnOnce(&Buffer) -> R) -> R {
        let (point, restriction) = {
            let state = self.lock();
            (state.point, state.restriction.clone())
        };
        self.widen();
        let result = f(self);
        let mut state = self.lock();
        state.point = floor_boundary(&state.text, point);
        state.restriction = restriction;
        result
    }

    /// Create a marker at `pos` that follows later edits.
    pub fn marker_at(&self, pos: usize) -> Marker {
        let mut state = self.lock();
        let position = Arc::new(AtomicUsize::new(floor_boundary(&state.text, pos)));
        state.markers.push(Arc::downgrade(&position));
        Marker {
            buffer: Arc::downgrade(&self.state),
            position,
        }
    }

    /// Insert `text` at `pos`. Markers at `pos` stay before the insertion.
    pub fn insert(&self, pos: usize, text: &str) {
        let mut state = self.lock();
        let pos = floor_boundary(&state.text, pos);
        state.text.insert_str(pos, text);
        let len = text.len();
        let shift = |p: usize| if p > pos { p + len } else { p };
        state.each_marker(shift);
        state.point = shift(state.point);
        if let Some(r) = state.restriction.clone() {
            state.restriction = Some(shift(r.start)..if r.end >= pos { r.end + len } else { r.end });
        }
    }

    /// Delete `range`. Markers inside it collapse to its start.
    pub fn delete(&self, range: Range<usize>) {
        let mut state = self.lock();
        let start = floor_boundary(&state.text, range.start);
        let end = floor_boundary(&state.text, range.end).max(start);
        state.text.replace_range(start..end, "");
        let len = end - start;
        let shift = |p: usize| {
            if p >= end {
                p - len
            } else if p > start {
                start
            } else {
                p
            }
        };
        state.each_marker(shift);
        state.point = shift(state.point);
        if let Some(r) = state.restriction.clone() {
            state.restriction = Some(shift(r.start)..shift(r.end));
        }
    }

    /// 1-based line and 1-based character column of `pos`.
    pub fn line_column_at(&self, pos: usize) -> (usize, usize) {
        self.with_text(|text| line_column(text, pos))
    }

    fn same_path(&self, path: &Path) -> bool {
        self.lock().path.as_deref() == Some(path)
    }
}

/// 1-based line and 1-based character column of `pos` in `text`.
pub fn line_column(text: &str, pos: usize) -> (usize, usize) {
    let pos = floor_boundary(text, pos);
    let before = &text[..pos];
    let line = before.bytes().filter(|b| *b == b'\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, text[line_start..pos].chars().count() + 1)
}

/// A position in a buffer that moves with edits.
///
/// Holds only a weak reference to the buffer: once every [`Buffer`] handle is
/// dropped the marker no longer resolves.
#[derive(Clone)]
pub struct Marker {
    buffer: Weak<Mutex<BufferState>>,
    position: Arc<AtomicUsize>,
}

impl Marker {
    /// Current byte position, or `None` if the buffer is gone.
    pub fn position(&self) -> Option<usize> {
        self.buffer
            .upgrade()
            .map(|_| self.position.load(Ordering::Relaxed))
    }

    pub fn buffer(&self) -> Option<Buffer> {
        self.buffer.upgrade().map(|state| Buffer { state })
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.position, &other.position)
    }
}

impl Eq for Marker {}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position() {
            Some(pos) => write!(f, "Marker({pos})"),
            None => write!(f, "Marker(dead)"),
        }
    }
}

/// The set of open buffers.
#[derive(Debug, Default)]
pub struct BufferList {
    buffers: Vec<Buffer>,
    current: Option<usize>,
}

impl BufferList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path`, reusing the buffer if it is already open. The opened
    /// buffer becomes current.
    pub fn open(&mut self, path: &Path, highlight: &HighlightConfig) -> Result<Buffer> {
        if let Some(idx) = self.buffers.iter().position(|b| b.same_path(path)) {
            self.current = Some(idx);
            return Ok(self.buffers[idx].clone());
        }
        let buffer = Buffer::from_file(path, highlight)?;
        self.add(buffer.clone());
        Ok(buffer)
    }

    /// Add a buffer, making its name unique, and make it current.
    pub fn add(&mut self, buffer: Buffer) {
        let base = buffer.name();
        let mut name = base.clone();
        let mut n = 2;
        while self.find(&name).is_some() {
            name = format!("{base}<{n}>");
            n += 1;
        }
        if name != base {
            buffer.rename(name);
        }
        self.buffers.push(buffer);
        self.current = Some(self.buffers.len() - 1);
    }

    pub fn current(&self) -> Option<&Buffer> {
        self.current.and_then(|idx| self.buffers.get(idx))
    }

    pub fn find(&self, name: &str) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.name() == name)
    }

    /// Make the named buffer current.
    pub fn switch_to(&mut self, name: &str) -> Option<&Buffer> {
        let idx = self.buffers.iter().position(|b| b.name() == name)?;
        self.current = Some(idx);
        self.buffers.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    /// Buffers with keyword highlighting active, in open order.
    pub fn highlighted(&self) -> Vec<Buffer> {
        self.buffers
            .iter()
            .filter(|b| b.highlighting())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
