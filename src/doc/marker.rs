//! Text markers: tracked ranges carrying styling, widgets or collapse.
//!
//! A marker and the lines it touches refer to each other by id. Each line
//! keeps a [`MarkedSpan`] per marker touching it, with `from`/`to` columns
//! (`None` meaning the span continues past the line edge); each marker keeps
//! the list of lines it has spans on. Neither side owns the other. A marker
//! whose lines all disappear stays registered but hidden, so undoing the
//! removal can bring it back.

use crate::doc::change::{Change, change_end};
use crate::doc::history::HiddenSpan;
use crate::doc::line::LineId;
use crate::doc::linked::SharedMarkerId;
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::pos::Pos;
use crate::unicode::char_len;

crate::arena::arena_id!(
    /// Handle of a marker within its document.
    MarkerId
);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkerKind {
    #[default]
    Range,
    Bookmark,
}

/// Replacement content shown in place of a marked range or at a bookmark.
#[derive(Clone, Debug, PartialEq)]
pub struct Widget {
    pub id: u64,
    /// Width in pixels the widget occupies on screen.
    pub width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerOptions {
    pub class_name: Option<String>,
    pub start_style: Option<String>,
    pub end_style: Option<String>,
    pub css: Option<String>,
    pub title: Option<String>,
    /// Hide the covered text.
    pub collapsed: bool,
    /// Show a widget instead of the covered text. Implies `collapsed` for
    /// range markers; bookmarks draw it at their position.
    pub replaced_with: Option<Widget>,
    pub inclusive_left: bool,
    pub inclusive_right: bool,
    /// Remove the marker when its range becomes empty.
    pub clear_when_empty: bool,
    /// Clear the marker as soon as a cursor enters it.
    pub clear_on_enter: bool,
    /// Cursors cannot be placed inside the range.
    pub atomic: bool,
    /// Edits touching the range are dropped.
    pub read_only: bool,
    /// Record the marking as an undoable history event.
    pub add_to_history: bool,
    pub handle_mouse_events: bool,
    /// Mirror the marker into every linked document.
    pub shared: bool,
    /// Bookmarks only: stay left of text inserted at their position.
    pub insert_left: bool,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            class_name: None,
            start_style: None,
            end_style: None,
            css: None,
            title: None,
            collapsed: false,
            replaced_with: None,
            inclusive_left: false,
            inclusive_right: false,
            clear_when_empty: true,
            clear_on_enter: false,
            atomic: false,
            read_only: false,
            add_to_history: false,
            handle_mouse_events: false,
            shared: false,
            insert_left: false,
        }
    }
}

impl MarkerOptions {
    /// Options for a styling-only marker.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            class_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Options for a collapsed (folded) range.
    #[must_use]
    pub fn collapsed() -> Self {
        Self {
            collapsed: true,
            ..Self::default()
        }
    }

    /// Whether the marker changes how text is drawn.
    #[must_use]
    pub fn is_styling(&self) -> bool {
        self.class_name.is_some()
            || self.start_style.is_some()
            || self.end_style.is_some()
            || self.css.is_some()
            || self.title.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct TextMarker {
    pub(crate) kind: MarkerKind,
    pub(crate) options: MarkerOptions,
    pub(crate) lines: Vec<LineId>,
    pub(crate) shared: Option<SharedMarkerId>,
}

impl TextMarker {
    #[must_use]
    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &MarkerOptions {
        &self.options
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.options.collapsed
    }

    /// Whether every line the marker touched has been removed.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn shared_group(&self) -> Option<SharedMarkerId> {
        self.shared
    }
}

/// The part of a marker on one line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkedSpan {
    pub marker: MarkerId,
    pub from: Option<usize>,
    pub to: Option<usize>,
}

/// Current extent of a marker. Bookmarks have `from == to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerRange {
    pub from: Pos,
    pub to: Pos,
}

/// What clearing a marker touched, for display bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ClearedMarker {
    pub from_line: usize,
    pub to_line: usize,
    pub collapsed: bool,
}

impl Document {
    #[must_use]
    pub fn marker(&self, id: MarkerId) -> Option<&TextMarker> {
        self.markers.get(id)
    }

    pub(crate) fn span_for(&self, line: LineId, marker: MarkerId) -> Option<MarkedSpan> {
        self.line_ref(line)
            .marked_spans
            .iter()
            .find(|span| span.marker == marker)
            .copied()
    }

    /// Line and column where `marker` starts.
    pub(crate) fn marker_start(&self, marker: MarkerId) -> Option<(LineId, usize)> {
        let marker_ref = self.markers.get(marker)?;
        marker_ref.lines.iter().find_map(|&line| {
            self.span_for(line, marker)
                .and_then(|span| span.from)
                .map(|ch| (line, ch))
        })
    }

    /// Line and column where `marker` ends.
    pub(crate) fn marker_end(&self, marker: MarkerId) -> Option<(LineId, usize)> {
        let marker_ref = self.markers.get(marker)?;
        marker_ref.lines.iter().find_map(|&line| {
            self.span_for(line, marker)
                .and_then(|span| span.to)
                .map(|ch| (line, ch))
        })
    }

    fn pos_of(&self, at: Option<(LineId, usize)>) -> Option<Pos> {
        let (line, ch) = at?;
        Some(Pos::new(self.line_no(line)?, ch))
    }

    pub(crate) fn marker_start_pos(&self, marker: MarkerId) -> Option<Pos> {
        self.pos_of(self.marker_start(marker))
    }

    pub(crate) fn marker_end_pos(&self, marker: MarkerId) -> Option<Pos> {
        self.pos_of(self.marker_end(marker))
    }

    /// Current range of `marker`, or `None` when it was cleared or hidden.
    #[must_use]
    pub fn find_marker(&self, marker: MarkerId) -> Option<MarkerRange> {
        let from = self.marker_start_pos(marker)?;
        let to = self.marker_end_pos(marker)?;
        Some(MarkerRange { from, to })
    }

    /// Markers overlapping `[from, to]`, each reported once.
    #[must_use]
    pub fn find_marks(&self, from: Pos, to: Pos) -> Vec<MarkerId> {
        let from = self.clip_pos(from);
        let to = self.clip_pos(to);
        let mut found = Vec::new();
        for (offset, id) in self.line_ids(from.line, to.line + 1).into_iter().enumerate() {
            let line_no = from.line + offset;
            for span in &self.line_ref(id).marked_spans {
                let before = line_no == from.line && span.to.is_some_and(|t| from.ch >= t);
                let continued = span.from.is_none() && line_no != from.line;
                let after = line_no == to.line && span.from.is_some_and(|f| f >= to.ch);
                if !(before || continued || after) {
                    found.push(span.marker);
                }
            }
        }
        found
    }

    /// Markers whose range includes `pos`.
    #[must_use]
    pub fn find_marks_at(&self, pos: Pos) -> Vec<MarkerId> {
        let pos = self.clip_pos(pos);
        let Ok(id) = self.line_handle(pos.line) else {
            return Vec::new();
        };
        self.line_ref(id)
            .marked_spans
            .iter()
            .filter(|span| {
                span.from.is_none_or(|f| f <= pos.ch) && span.to.is_none_or(|t| t >= pos.ch)
            })
            .map(|span| span.marker)
            .collect()
    }

    /// Every visible marker, in document order of their start.
    #[must_use]
    pub fn all_marks(&self) -> Vec<MarkerId> {
        let mut out = Vec::new();
        for id in self.store.ids(0, self.store.len()) {
            for span in &self.line_ref(id).marked_spans {
                if span.from.is_some() {
                    out.push(span.marker);
                }
            }
        }
        out
    }

    /// Add `span` to line `line` and record the line on its marker.
    pub(crate) fn attach_span(&mut self, line: LineId, span: MarkedSpan) {
        self.line_mut(line).marked_spans.push(span);
        if let Some(marker) = self.markers.get_mut(span.marker) {
            if !marker.lines.contains(&line) {
                marker.lines.push(line);
            }
        }
    }

    /// Replace the spans of `line`, keeping marker line lists in sync.
    pub(crate) fn set_spans(&mut self, line: LineId, spans: Vec<MarkedSpan>) {
        self.detach_spans(line);
        for span in spans {
            self.attach_span(line, span);
        }
    }

    /// Remove every span of `line` from its marker's line list.
    pub(crate) fn detach_spans(&mut self, line: LineId) -> Vec<MarkedSpan> {
        let spans = std::mem::take(&mut self.line_mut(line).marked_spans);
        for span in &spans {
            if let Some(marker) = self.markers.get_mut(span.marker) {
                marker.lines.retain(|&l| l != line);
            }
        }
        spans
    }

    /// Forget lines that left the document.
    pub(crate) fn forget_removed_spans(&mut self, removed: &[crate::doc::line::Line], ids: &[LineId]) {
        for (line, &id) in removed.iter().zip(ids) {
            for span in &line.marked_spans {
                if let Some(marker) = self.markers.get_mut(span.marker) {
                    marker.lines.retain(|&l| l != id);
                }
            }
        }
    }

    /// Register a marker over `[from, to]` and attach its spans.
    pub(crate) fn mark_text_inner(
        &mut self,
        from: Pos,
        to: Pos,
        mut options: MarkerOptions,
        kind: MarkerKind,
    ) -> Result<MarkerId> {
        let mut from = self.clip_pos(from);
        let mut to = self.clip_pos(to);
        if to < from {
            std::mem::swap(&mut from, &mut to);
        }
        if from == to && options.clear_when_empty {
            return Err(Error::EmptyMarkerRange { at: from });
        }
        if options.replaced_with.is_some() && kind == MarkerKind::Range {
            options.collapsed = true;
        }
        if options.collapsed {
            if self.conflicting_collapsed_range(from, to, &options) {
                tracing::warn!(%from, %to, "collapsed marker overlaps an existing collapsed marker");
                return Err(Error::OverlappingCollapsedRange { from, to });
            }
            self.saw_collapsed = true;
            options.atomic = true;
        }
        if options.read_only {
            self.saw_read_only = true;
        }

        let collapsed = options.collapsed;
        let id = self.markers.insert(TextMarker {
            kind,
            options,
            lines: Vec::new(),
            shared: None,
        });
        let lines = self.line_ids(from.line, to.line + 1);
        for (offset, &line) in lines.iter().enumerate() {
            let n = from.line + offset;
            if collapsed && n != from.line {
                self.set_line_height(line, 0.0);
            }
            let span = MarkedSpan {
                marker: id,
                from: (n == from.line).then_some(from.ch),
                to: (n == to.line).then_some(to.ch),
            };
            self.attach_span(line, span);
        }
        if collapsed {
            for &line in &lines {
                if self.line_is_hidden(line) {
                    self.set_line_height(line, 0.0);
                }
            }
        }
        tracing::trace!(?id, %from, %to, collapsed, "marker added");
        Ok(id)
    }

    /// Detach `marker` from all its lines and drop it.
    pub(crate) fn clear_marker_inner(&mut self, marker: MarkerId) -> Option<ClearedMarker> {
        let entry = self.markers.get(marker)?;
        let lines = entry.lines.clone();
        let collapsed = entry.options.collapsed;
        let atomic = entry.options.atomic;
        let mut from_line = usize::MAX;
        let mut to_line = 0;
        for line in lines {
            if let Some(n) = self.line_no(line) {
                from_line = from_line.min(n);
                to_line = to_line.max(n);
            }
            let spans = &mut self.line_mut(line).marked_spans;
            let continued = spans
                .iter()
                .find(|span| span.marker == marker)
                .is_some_and(|span| span.from.is_none());
            spans.retain(|span| span.marker != marker);
            if continued && collapsed && !self.line_is_hidden(line) {
                let height = self.estimate_height(line);
                self.set_line_height(line, height);
            }
        }
        self.markers.remove(marker);
        if atomic && self.cant_edit {
            self.cant_edit = false;
        }
        if from_line > to_line {
            return Some(ClearedMarker {
                from_line: self.first,
                to_line: self.first,
                collapsed,
            });
        }
        Some(ClearedMarker {
            from_line,
            to_line,
            collapsed,
        })
    }

    fn spans_before(&self, old: &[MarkedSpan], start_ch: usize, is_insert: bool) -> Vec<MarkedSpan> {
        let mut out = Vec::new();
        for span in old {
            let Some(marker) = self.markers.get(span.marker) else {
                continue;
            };
            let opts = &marker.options;
            let starts_before = span.from.is_none_or(|f| {
                if opts.inclusive_left {
                    f <= start_ch
                } else {
                    f < start_ch
                }
            });
            let bookmark_stays = span.from == Some(start_ch)
                && marker.kind == MarkerKind::Bookmark
                && (!is_insert || !opts.insert_left);
            if starts_before || bookmark_stays {
                let ends_after = span.to.is_none_or(|t| {
                    if opts.inclusive_right {
                        t >= start_ch
                    } else {
                        t > start_ch
                    }
                });
                out.push(MarkedSpan {
                    marker: span.marker,
                    from: span.from,
                    to: if ends_after { None } else { span.to },
                });
            }
        }
        out
    }

    fn spans_after(&self, old: &[MarkedSpan], end_ch: usize, is_insert: bool) -> Vec<MarkedSpan> {
        let mut out = Vec::new();
        for span in old {
            let Some(marker) = self.markers.get(span.marker) else {
                continue;
            };
            let opts = &marker.options;
            let ends_after = span.to.is_none_or(|t| {
                if opts.inclusive_right {
                    t >= end_ch
                } else {
                    t > end_ch
                }
            });
            let bookmark_moves = span.from == Some(end_ch)
                && marker.kind == MarkerKind::Bookmark
                && (!is_insert || opts.insert_left);
            if ends_after || bookmark_moves {
                let starts_before = span.from.is_none_or(|f| {
                    if opts.inclusive_left {
                        f <= end_ch
                    } else {
                        f < end_ch
                    }
                });
                out.push(MarkedSpan {
                    marker: span.marker,
                    from: if starts_before {
                        None
                    } else {
                        span.from.map(|f| f.saturating_sub(end_ch))
                    },
                    to: span.to.map(|t| t.saturating_sub(end_ch)),
                });
            }
        }
        out
    }

    fn clear_empty_spans(&self, spans: &mut Vec<MarkedSpan>) {
        spans.retain(|span| {
            let empty = span.from.is_some() && span.from == span.to;
            !(empty
                && self
                    .markers
                    .get(span.marker)
                    .is_none_or(|m| m.options.clear_when_empty))
        });
    }

    /// Compute the spans of each line produced by `change`, stretching or
    /// shrinking markers that touch the edit. `None` when neither edge line
    /// carries spans.
    pub(crate) fn stretch_spans_over_change(&self, change: &Change) -> Option<Vec<Vec<MarkedSpan>>> {
        let spans_of = |n: usize| {
            self.line_handle(n)
                .ok()
                .map(|id| self.line_ref(id).marked_spans.as_slice())
                .filter(|spans| !spans.is_empty())
        };
        let old_first = spans_of(change.from.line);
        let old_last = spans_of(change.to.line);
        if old_first.is_none() && old_last.is_none() {
            return None;
        }

        let start_ch = change.from.ch;
        let end_ch = change.to.ch;
        let is_insert = change.from == change.to;
        let mut first = old_first.map_or_else(Vec::new, |s| self.spans_before(s, start_ch, is_insert));
        let mut last = old_last.map_or_else(Vec::new, |s| self.spans_after(s, end_ch, is_insert));

        let same_line = change.text.len() == 1;
        let last_text = change.text.last().map_or(0, |t| char_len(t));
        let offset = last_text + if same_line { start_ch } else { 0 };

        for i in 0..first.len() {
            if first[i].to.is_none() {
                match last.iter().find(|s| s.marker == first[i].marker) {
                    None => first[i].to = Some(start_ch),
                    Some(found) if same_line => first[i].to = found.to.map(|t| t + offset),
                    Some(_) => {}
                }
            }
        }

        let mut moved = Vec::new();
        for span in &mut last {
            if let Some(to) = span.to {
                span.to = Some(to + offset);
            }
            match span.from {
                None => {
                    if !first.iter().any(|s| s.marker == span.marker) {
                        span.from = Some(offset);
                        if same_line {
                            moved.push(*span);
                        }
                    }
                }
                Some(from) => {
                    span.from = Some(from + offset);
                    if same_line {
                        moved.push(*span);
                    }
                }
            }
        }
        first.extend(moved);

        self.clear_empty_spans(&mut first);
        let mut out = Vec::with_capacity(change.text.len());
        if same_line {
            out.push(first);
        } else {
            self.clear_empty_spans(&mut last);
            let gap = change.text.len().saturating_sub(2);
            let gap_spans: Vec<MarkedSpan> = first
                .iter()
                .filter(|span| span.to.is_none())
                .map(|span| MarkedSpan {
                    marker: span.marker,
                    from: None,
                    to: None,
                })
                .collect();
            out.push(first);
            for _ in 0..gap {
                out.push(gap_spans.clone());
            }
            out.push(last);
        }
        Some(out)
    }

    /// Markers lying entirely inside text that `change` removes.
    pub(crate) fn hidden_spans_in(&self, change: &Change) -> Vec<HiddenSpan> {
        if change.from == change.to {
            return Vec::new();
        }
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for id in self.line_ids(change.from.line, change.to.line + 1) {
            for span in &self.line_ref(id).marked_spans {
                if seen.contains(&span.marker) {
                    continue;
                }
                seen.push(span.marker);
                if let Some(range) = self.find_marker(span.marker) {
                    if range.from >= change.from && range.to <= change.to {
                        out.push(HiddenSpan {
                            marker: span.marker,
                            from: range.from,
                            to: range.to,
                        });
                    }
                }
            }
        }
        out
    }

    /// Reattach hidden markers whose text came back. Returns the markers
    /// that became visible again.
    pub(crate) fn restore_hidden(&mut self, spans: &[HiddenSpan]) -> Vec<MarkerId> {
        let mut restored = Vec::new();
        for hidden in spans {
            let Some(marker) = self.markers.get(hidden.marker) else {
                continue;
            };
            if !marker.lines.is_empty() {
                continue;
            }
            let collapsed = marker.options.collapsed;
            let from = self.clip_pos(hidden.from);
            let to = self.clip_pos(hidden.to);
            for (offset, line) in self.line_ids(from.line, to.line + 1).into_iter().enumerate() {
                let n = from.line + offset;
                self.attach_span(
                    line,
                    MarkedSpan {
                        marker: hidden.marker,
                        from: (n == from.line).then_some(from.ch),
                        to: (n == to.line).then_some(to.ch),
                    },
                );
                if collapsed && n != from.line {
                    self.set_line_height(line, 0.0);
                }
            }
            restored.push(hidden.marker);
        }
        restored
    }

    /// Markers that lost all their lines, among `candidates`.
    pub(crate) fn newly_hidden(&self, candidates: &[MarkerId]) -> Vec<MarkerId> {
        candidates
            .iter()
            .copied()
            .filter(|&m| self.markers.get(m).is_some_and(TextMarker::is_hidden))
            .collect()
    }

    /// Markers with spans on lines `[from, to]` of the pre-change document.
    pub(crate) fn markers_touching(&self, from: usize, to: usize) -> Vec<MarkerId> {
        let mut out = Vec::new();
        for id in self.line_ids(from, to + 1) {
            for span in &self.line_ref(id).marked_spans {
                if !out.contains(&span.marker) {
                    out.push(span.marker);
                }
            }
        }
        out
    }

    /// End position of a change as seen by markers.
    pub(crate) fn marker_change_end(change: &Change) -> Pos {
        change_end(change)
    }
}
