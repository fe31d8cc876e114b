//! The document model: lines, markers, selection and per-document state.
//!
//! A [`Document`] owns its [`LineStore`], its markers and its selection. Its
//! history lives in the engine so linked documents can share one. All
//! mutation goes through [`Engine`](crate::Engine) methods, which run the
//! change pipeline and keep attached editors up to date; the methods here are
//! read-only queries plus crate-internal building blocks.

pub mod change;
mod collapsed;
pub mod history;
pub mod line;
pub mod line_store;
pub mod linked;
pub mod marker;
pub mod selection;

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::arena::Arena;
use crate::editor::EditorId;
use crate::error::{Error, Result};
use crate::highlight::{Mode, PlainText};
use crate::options::DocOptions;
use crate::pos::Pos;
use crate::unicode::{Direction, char_len, slice_chars, split_lines_with};

pub use change::{Change, ChangeRequest, Origin, SelectionRequest, adjust_for_change, change_end};
pub use history::{History, HistoryDirection, HistoryId};
pub use line::{Line, LineId, LineStyles, StyleRun};
pub use line_store::LineStore;
pub use linked::{LinkOptions, SharedMarker, SharedMarkerId};
pub use marker::{MarkedSpan, MarkerId, MarkerKind, MarkerOptions, MarkerRange, TextMarker, Widget};
pub use selection::{Range, Selection};

crate::arena::arena_id!(
    /// Handle of a document owned by an [`Engine`](crate::Engine).
    DocId
);

/// Synchronous hook run before a change is applied.
pub type BeforeChangeHook = Box<dyn FnMut(&mut ChangeRequest)>;
/// Synchronous hook run before a selection is set.
pub type BeforeSelectionHook = Box<dyn FnMut(&mut SelectionRequest)>;

/// Which end of the primary range [`Document::cursor`] reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorSide {
    #[default]
    Head,
    Anchor,
    From,
    To,
}

/// A link to another document that receives this document's changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocLink {
    pub doc: DocId,
    pub shared_hist: bool,
    /// `doc` is the document this one was linked from.
    pub is_parent: bool,
}

/// How new and edited lines get their provisional height before they are
/// measured.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct HeightEstimate {
    pub text_height: f64,
    /// Characters per visual row when wrapping.
    pub wrap_chars: Option<usize>,
}

impl Default for HeightEstimate {
    fn default() -> Self {
        Self {
            text_height: 1.0,
            wrap_chars: None,
        }
    }
}

impl HeightEstimate {
    pub(crate) fn for_text(&self, text: &str) -> f64 {
        match self.wrap_chars {
            Some(per_row) if per_row > 0 => {
                let rows = char_len(text).div_ceil(per_row).max(1);
                rows as f64 * self.text_height
            }
            _ => self.text_height,
        }
    }
}

pub struct Document {
    pub(crate) store: LineStore,
    pub(crate) markers: Arena<MarkerId, TextMarker>,
    pub(crate) first: usize,
    pub(crate) sel: Selection,
    pub(crate) history: HistoryId,
    pub(crate) mode: Arc<dyn Mode>,
    pub(crate) mode_gen: u64,
    pub(crate) mode_frontier: usize,
    pub(crate) highlight_frontier: usize,
    pub(crate) scroll_top: f64,
    pub(crate) scroll_left: f64,
    pub(crate) direction: Direction,
    pub(crate) line_sep: Option<String>,
    pub(crate) links: Vec<DocLink>,
    pub(crate) editor: Option<EditorId>,
    pub(crate) cant_edit: bool,
    pub(crate) extend: bool,
    pub(crate) clean_generation: u64,
    pub(crate) estimate: HeightEstimate,
    pub(crate) saw_read_only: bool,
    pub(crate) saw_collapsed: bool,
    pub(crate) before_change: Vec<BeforeChangeHook>,
    pub(crate) before_selection_change: Vec<BeforeSelectionHook>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("first", &self.first)
            .field("lines", &self.store.len())
            .field("markers", &self.markers.len())
            .field("sel", &self.sel)
            .field("mode", &self.mode.name())
            .field("editor", &self.editor)
            .field("links", &self.links)
            .finish_non_exhaustive()
    }
}

impl Document {
    pub(crate) fn new(text: &str, options: DocOptions, history: HistoryId) -> Self {
        let estimate = HeightEstimate::default();
        let lines = split_lines_with(text, options.line_separator.as_deref())
            .into_iter()
            .map(|text| Line::new(text, estimate.text_height))
            .collect();
        let first = options.first_line;
        Self {
            store: LineStore::new(lines),
            markers: Arena::new(),
            first,
            sel: Selection::cursor(Pos::new(first, 0)),
            history,
            mode: options.mode.unwrap_or_else(|| Arc::new(PlainText)),
            mode_gen: 1,
            mode_frontier: first,
            highlight_frontier: first,
            scroll_top: 0.0,
            scroll_left: 0.0,
            direction: options.direction,
            line_sep: options.line_separator,
            links: Vec::new(),
            editor: None,
            cant_edit: false,
            extend: false,
            clean_generation: 1,
            estimate,
            saw_read_only: false,
            saw_collapsed: false,
            before_change: Vec::new(),
            before_selection_change: Vec::new(),
        }
    }

    #[must_use]
    pub fn first_line(&self) -> usize {
        self.first
    }

    #[must_use]
    pub fn last_line(&self) -> usize {
        self.first + self.store.len() - 1
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_line(&self, n: usize) -> bool {
        n >= self.first && n < self.first + self.store.len()
    }

    #[must_use]
    pub fn line_store(&self) -> &LineStore {
        &self.store
    }

    /// Handle of line `n`, or `LineOutOfRange`.
    pub fn line_handle(&self, n: usize) -> Result<LineId> {
        n.checked_sub(self.first)
            .and_then(|rel| self.store.id_at(rel))
            .ok_or(Error::LineOutOfRange {
                line: n,
                first: self.first,
                size: self.store.len(),
            })
    }

    /// Absolute line number of `id`.
    #[must_use]
    pub fn line_no(&self, id: LineId) -> Option<usize> {
        self.store.index_of(id).map(|rel| rel + self.first)
    }

    /// Text of line `n`, if it exists.
    #[must_use]
    pub fn line(&self, n: usize) -> Option<&str> {
        let id = self.line_handle(n).ok()?;
        self.store.line(id).map(Line::text)
    }

    pub(crate) fn line_ref(&self, id: LineId) -> &Line {
        match self.store.line(id) {
            Some(line) => line,
            None => panic!("line {id:?} is not in this document"),
        }
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> &mut Line {
        match self.store.line_mut(id) {
            Some(line) => line,
            None => panic!("line {id:?} is not in this document"),
        }
    }

    /// Text of line `n` for a line number already known to be valid.
    pub(crate) fn text_of(&self, n: usize) -> &str {
        self.line(n).unwrap_or("")
    }

    /// Length in chars of line `n`, zero when it does not exist.
    #[must_use]
    pub fn line_len(&self, n: usize) -> usize {
        self.line(n).map_or(0, char_len)
    }

    #[must_use]
    pub fn line_separator(&self) -> &str {
        self.line_sep.as_deref().unwrap_or("\n")
    }

    /// Split `text` the way this document splits incoming text.
    #[must_use]
    pub fn split_lines(&self, text: &str) -> Vec<String> {
        split_lines_with(text, self.line_sep.as_deref())
    }

    /// Full text joined with the line separator.
    #[must_use]
    pub fn value(&self) -> String {
        self.value_with(self.line_separator())
    }

    #[must_use]
    pub fn value_with(&self, sep: &str) -> String {
        let mut out = String::new();
        self.store.iterate(0, self.store.len(), |i, _, line| {
            if i > 0 {
                out.push_str(sep);
            }
            out.push_str(&line.text);
            ControlFlow::Continue(())
        });
        out
    }

    /// Lines of text between two positions, clipped.
    #[must_use]
    pub fn get_between(&self, from: Pos, to: Pos) -> Vec<String> {
        let from = self.clip_pos(from);
        let to = self.clip_pos(to);
        if to <= from {
            return vec![String::new()];
        }
        let mut out = Vec::with_capacity(to.line - from.line + 1);
        for n in from.line..=to.line {
            let text = self.text_of(n);
            let start = if n == from.line { from.ch } else { 0 };
            let end = if n == to.line { to.ch } else { char_len(text) };
            out.push(slice_chars(text, start, end).to_string());
        }
        out
    }

    /// Text between two positions joined with the line separator.
    #[must_use]
    pub fn range(&self, from: Pos, to: Pos) -> String {
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        self.get_between(from, to).join(self.line_separator())
    }

    #[must_use]
    pub fn clip_line(&self, n: usize) -> usize {
        n.clamp(self.first, self.last_line())
    }

    /// Clamp `pos` into the document.
    #[must_use]
    pub fn clip_pos(&self, pos: Pos) -> Pos {
        if pos.line < self.first {
            return Pos::new(self.first, 0);
        }
        let last = self.last_line();
        if pos.line > last {
            return Pos::new(last, self.line_len(last));
        }
        let len = self.line_len(pos.line);
        if pos.ch > len {
            Pos::new(pos.line, len)
        } else {
            pos
        }
    }

    /// Char offset of `pos` from the start of the document, counting
    /// separators.
    #[must_use]
    pub fn index_from_pos(&self, pos: Pos) -> usize {
        let pos = self.clip_pos(pos);
        let sep = char_len(self.line_separator());
        let mut index = pos.ch;
        self.store.iterate(0, pos.line - self.first, |_, _, line| {
            index += char_len(&line.text) + sep;
            ControlFlow::Continue(())
        });
        index
    }

    /// Inverse of [`index_from_pos`](Self::index_from_pos).
    #[must_use]
    pub fn pos_from_index(&self, index: usize) -> Pos {
        let sep = char_len(self.line_separator());
        let mut off = index;
        let mut line_no = self.first;
        let mut ch = None;
        self.store.iterate(0, self.store.len(), |_, _, line| {
            let size = char_len(&line.text) + sep;
            if size > off {
                ch = Some(off);
                return ControlFlow::Break(());
            }
            off -= size;
            line_no += 1;
            ControlFlow::Continue(())
        });
        self.clip_pos(Pos::new(line_no, ch.unwrap_or(usize::MAX)))
    }

    /// Visit lines `[from, to)` (absolute numbers) in order.
    pub fn iterate_lines<F>(&self, from: usize, to: usize, mut f: F)
    where
        F: FnMut(usize, &Line) -> ControlFlow<()>,
    {
        let from = from.max(self.first);
        let to = to.min(self.first + self.store.len());
        if from >= to {
            return;
        }
        let first = self.first;
        self.store
            .iterate(from - first, to - first, |i, _, line| f(i + first, line));
    }

    /// Ids of lines `[from, to)` (absolute numbers).
    #[must_use]
    pub(crate) fn line_ids(&self, from: usize, to: usize) -> Vec<LineId> {
        let from = from.max(self.first);
        self.store.ids(from - self.first, to.saturating_sub(self.first))
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.sel
    }

    #[must_use]
    pub fn list_selections(&self) -> Vec<Range> {
        self.sel.ranges().to_vec()
    }

    #[must_use]
    pub fn something_selected(&self) -> bool {
        self.sel.something_selected()
    }

    #[must_use]
    pub fn cursor(&self, side: CursorSide) -> Pos {
        let range = self.sel.primary();
        match side {
            CursorSide::Head => range.head,
            CursorSide::Anchor => range.anchor,
            CursorSide::From => range.from(),
            CursorSide::To => range.to(),
        }
    }

    /// Selected text of every range joined by `sep` (the line separator by
    /// default).
    #[must_use]
    pub fn get_selection(&self, sep: Option<&str>) -> String {
        let sep = sep.unwrap_or_else(|| self.line_separator());
        let mut lines = Vec::new();
        for range in self.sel.ranges() {
            lines.extend(self.get_between(range.from(), range.to()));
        }
        lines.join(sep)
    }

    /// Selected text of each range.
    #[must_use]
    pub fn get_selections(&self) -> Vec<String> {
        let sep = self.line_separator();
        self.sel
            .ranges()
            .iter()
            .map(|range| self.get_between(range.from(), range.to()).join(sep))
            .collect()
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn mode(&self) -> &Arc<dyn Mode> {
        &self.mode
    }

    /// First line whose highlighting is not known to be current.
    #[must_use]
    pub fn highlight_frontier(&self) -> usize {
        self.highlight_frontier
    }

    #[must_use]
    pub fn editor(&self) -> Option<EditorId> {
        self.editor
    }

    #[must_use]
    pub fn history_id(&self) -> HistoryId {
        self.history
    }

    #[must_use]
    pub fn links(&self) -> &[DocLink] {
        &self.links
    }

    /// Total height of all lines.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.store.height()
    }

    /// Line number at vertical offset `h`, clamped to the last line.
    #[must_use]
    pub fn line_at_height(&self, h: f64) -> usize {
        let rel = self.store.index_at_height(h.max(0.0));
        self.first + rel.min(self.store.len() - 1)
    }

    /// Offset of the top of line `n`.
    #[must_use]
    pub fn height_at_line(&self, n: usize) -> f64 {
        match self.line_handle(self.clip_line(n)) {
            Ok(id) => self.store.height_before(self.visual_line(id)),
            Err(_) => 0.0,
        }
    }

    pub(crate) fn set_line_height(&mut self, id: LineId, height: f64) {
        self.store.set_height(id, height);
    }

    /// Provisional height for `id`: zero when hidden by a collapsed marker.
    pub(crate) fn estimate_height(&self, id: LineId) -> f64 {
        if self.line_is_hidden(id) {
            0.0
        } else {
            self.estimate.for_text(&self.line_ref(id).text)
        }
    }

    /// Re-estimate every line's height, e.g. after the text height changed.
    pub(crate) fn estimate_all_heights(&mut self) {
        for id in self.store.ids(0, self.store.len()) {
            let height = self.estimate_height(id);
            self.store.set_height(id, height);
        }
    }

    /// Drop every cached highlighting result.
    pub(crate) fn reset_mode_state(&mut self) {
        self.mode_gen += 1;
        for id in self.store.ids(0, self.store.len()) {
            let line = self.line_mut(id);
            line.state_after = None;
            line.styles = None;
        }
        self.mode_frontier = self.first;
        self.highlight_frontier = self.first;
    }

    /// Change the base direction, dropping cached bidi orders.
    pub(crate) fn set_direction(&mut self, direction: Direction) {
        if self.direction == direction {
            return;
        }
        self.direction = direction;
        for id in self.store.ids(0, self.store.len()) {
            self.line_mut(id).order = None;
        }
    }

    /// Shift every line number by `diff`, used when a linked parent grows or
    /// shrinks above this document's range.
    pub(crate) fn shift(&mut self, diff: isize) {
        self.first = self.first.saturating_add_signed(diff);
        let shift = |pos: Pos| Pos::with_sticky(pos.line.saturating_add_signed(diff), pos.ch, pos.sticky);
        self.sel = self.sel.map_positions(shift);
        self.mode_frontier = self.mode_frontier.saturating_add_signed(diff);
        self.highlight_frontier = self.highlight_frontier.saturating_add_signed(diff);
    }
}
