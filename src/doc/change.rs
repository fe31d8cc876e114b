//! Change records and the line-level part of applying them.
//!
//! A [`Change`] replaces the text between `from` and `to` with `text`, one
//! entry per resulting line. [`Document::update_doc`] splices the lines; the
//! rest of the pipeline (hooks, history, linked documents, display
//! bookkeeping) lives on the engine.

use std::borrow::Cow;
use std::fmt;

use crate::doc::Document;
use crate::doc::line::{Line, LineId};
use crate::doc::marker::MarkedSpan;
use crate::doc::selection::{Range, Selection};
use crate::pos::Pos;
use crate::unicode::{char_len, slice_chars};

/// Where a change or selection update came from.
///
/// Origins starting with `+` merge with the previous history event when
/// they repeat within the event delay; origins starting with `*` always
/// merge when they repeat.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin(Cow<'static, str>);

impl Origin {
    pub const UNDO: Self = Self(Cow::Borrowed("undo"));
    pub const REDO: Self = Self(Cow::Borrowed("redo"));
    pub const SET_VALUE: Self = Self(Cow::Borrowed("setValue"));
    pub const INPUT: Self = Self(Cow::Borrowed("+input"));
    pub const DELETE: Self = Self(Cow::Borrowed("+delete"));
    pub const MOVE: Self = Self(Cow::Borrowed("+move"));
    pub const PASTE: Self = Self(Cow::Borrowed("paste"));
    pub const MARK_TEXT: Self = Self(Cow::Borrowed("markText"));
    pub const INDENT: Self = Self(Cow::Borrowed("+indent"));

    #[must_use]
    pub fn new(origin: impl Into<Cow<'static, str>>) -> Self {
        Self(origin.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn merges_when_recent(&self) -> bool {
        self.0.starts_with('+')
    }

    #[must_use]
    pub fn merges_always(&self) -> bool {
        self.0.starts_with('*')
    }

    /// Whether this is an undo or redo replay.
    #[must_use]
    pub fn is_history(&self) -> bool {
        *self == Self::UNDO || *self == Self::REDO
    }
}

impl From<&'static str> for Origin {
    fn from(origin: &'static str) -> Self {
        Self(Cow::Borrowed(origin))
    }
}

impl From<String> for Origin {
    fn from(origin: String) -> Self {
        Self(Cow::Owned(origin))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One text replacement.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub from: Pos,
    pub to: Pos,
    /// Replacement text, one entry per line. Never empty.
    pub text: Vec<String>,
    pub origin: Option<Origin>,
    /// Text that was replaced, filled in when the change is applied.
    pub removed: Vec<String>,
    /// Replaces the whole document.
    pub(crate) full: bool,
}

impl Change {
    #[must_use]
    pub fn new(from: Pos, to: Pos, text: Vec<String>, origin: Option<Origin>) -> Self {
        let text = if text.is_empty() {
            vec![String::new()]
        } else {
            text
        };
        Self {
            from,
            to,
            text,
            origin,
            removed: Vec::new(),
            full: false,
        }
    }

    /// Whether applying the change would do nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.text.len() == 1 && self.text[0].is_empty() && self.from == self.to
    }

    /// Line count difference the change causes.
    #[must_use]
    pub fn line_diff(&self) -> isize {
        self.text.len() as isize - (self.to.line as isize - self.from.line as isize) - 1
    }
}

/// Position just after the inserted text of `change`.
#[must_use]
pub fn change_end(change: &Change) -> Pos {
    let last = change.text.last().map_or(0, |t| char_len(t));
    let ch = if change.text.len() == 1 {
        change.from.ch + last
    } else {
        last
    };
    Pos::new(change.from.line + change.text.len() - 1, ch)
}

/// Where `pos` ends up after `change` is applied. Positions inside the
/// replaced range move to its end.
#[must_use]
pub fn adjust_for_change(pos: Pos, change: &Change) -> Pos {
    if pos < change.from {
        return pos;
    }
    let end = change_end(change);
    if pos <= change.to {
        return end;
    }
    let line = pos.line.saturating_add_signed(change.line_diff());
    let mut ch = pos.ch;
    if pos.line == change.to.line {
        ch = (ch + end.ch).saturating_sub(change.to.ch);
    }
    Pos::with_sticky(line, ch, pos.sticky)
}

/// A pending change offered to `beforeChange` hooks.
#[derive(Debug)]
pub struct ChangeRequest {
    from: Pos,
    to: Pos,
    text: Vec<String>,
    origin: Option<Origin>,
    canceled: bool,
    updatable: bool,
}

impl ChangeRequest {
    pub(crate) fn new(change: &Change, updatable: bool) -> Self {
        Self {
            from: change.from,
            to: change.to,
            text: change.text.clone(),
            origin: change.origin.clone(),
            canceled: false,
            updatable,
        }
    }

    #[must_use]
    pub fn from(&self) -> Pos {
        self.from
    }

    #[must_use]
    pub fn to(&self) -> Pos {
        self.to
    }

    #[must_use]
    pub fn text(&self) -> &[String] {
        &self.text
    }

    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Drop the change.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Whether [`ChangeRequest::update`] has an effect. Undo and redo
    /// replays cannot be rewritten.
    #[must_use]
    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Rewrite the change. Returns `false` when the change cannot be
    /// modified.
    pub fn update(&mut self, from: Option<Pos>, to: Option<Pos>, text: Option<Vec<String>>) -> bool {
        if !self.updatable {
            return false;
        }
        if let Some(from) = from {
            self.from = from;
        }
        if let Some(to) = to {
            self.to = to;
        }
        if let Some(text) = text {
            self.text = if text.is_empty() {
                vec![String::new()]
            } else {
                text
            };
        }
        true
    }

    pub(crate) fn into_change(self) -> Option<Change> {
        if self.canceled {
            return None;
        }
        Some(Change::new(self.from, self.to, self.text, self.origin))
    }
}

/// A pending selection offered to `beforeSelectionChange` hooks.
#[derive(Debug)]
pub struct SelectionRequest {
    ranges: Vec<Range>,
    origin: Option<Origin>,
    updated: bool,
}

impl SelectionRequest {
    pub(crate) fn new(sel: &Selection, origin: Option<Origin>) -> Self {
        Self {
            ranges: sel.ranges().to_vec(),
            origin,
            updated: false,
        }
    }

    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Replace the ranges. The last range becomes primary.
    pub fn update(&mut self, ranges: Vec<Range>) {
        self.ranges = ranges;
        self.updated = true;
    }

    pub(crate) fn into_ranges(self) -> Option<Vec<Range>> {
        self.updated.then_some(self.ranges)
    }
}

impl Document {
    /// Selection after `change`, with every range mapped through it.
    pub(crate) fn compute_sel_after_change(&self, change: &Change) -> Selection {
        let ranges = self
            .sel
            .ranges()
            .iter()
            .map(|range| {
                Range::new(
                    adjust_for_change(range.anchor, change),
                    adjust_for_change(range.head, change),
                )
            })
            .collect();
        Selection::new(ranges, self.sel.primary_index())
    }

    /// Whether `change` replaces whole lines, letting the last line keep
    /// its identity.
    pub(crate) fn is_whole_line_update(change: &Change) -> bool {
        change.from.ch == 0
            && change.to.ch == 0
            && change.text.last().is_some_and(String::is_empty)
    }

    /// Insert new lines before absolute line `at`.
    pub(crate) fn insert_lines(&mut self, at: usize, lines: Vec<(String, Vec<MarkedSpan>)>) -> Vec<LineId> {
        if lines.is_empty() {
            return Vec::new();
        }
        let text_height = self.estimate.text_height;
        let mut spans = Vec::with_capacity(lines.len());
        let new_lines = lines
            .into_iter()
            .map(|(text, line_spans)| {
                spans.push(line_spans);
                Line::new(text, text_height)
            })
            .collect();
        let ids = self.store.insert(at - self.first, new_lines);
        for (&id, line_spans) in ids.iter().zip(spans) {
            for span in line_spans {
                self.attach_span(id, span);
            }
        }
        for &id in &ids {
            let height = self.estimate_height(id);
            self.set_line_height(id, height);
        }
        ids
    }

    /// Remove `count` lines starting at absolute line `at`, detaching
    /// their markers.
    pub(crate) fn remove_lines(&mut self, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        let ids = self.line_ids(at, at + count);
        let removed = self.store.remove(at - self.first, count);
        self.forget_removed_spans(&removed, &ids);
    }

    /// Replace the text and spans of an existing line.
    pub(crate) fn update_line(&mut self, id: LineId, text: String, spans: Vec<MarkedSpan>) {
        self.line_mut(id).set_text(text);
        self.set_spans(id, spans);
        let height = self.estimate_height(id);
        self.set_line_height(id, height);
    }

    /// Splice `change` into the line store. `spans` holds the marker spans
    /// for each line of `change.text`, as computed before the edit.
    pub(crate) fn update_doc(&mut self, change: &Change, spans: Option<Vec<Vec<MarkedSpan>>>) {
        let spans_for = |n: usize| -> Vec<MarkedSpan> {
            spans
                .as_ref()
                .and_then(|all| all.get(n))
                .cloned()
                .unwrap_or_default()
        };
        let lines_for = |start: usize, end: usize| -> Vec<(String, Vec<MarkedSpan>)> {
            (start..end)
                .map(|i| (change.text[i].clone(), spans_for(i)))
                .collect()
        };

        let from = change.from;
        let to = change.to;
        let text = &change.text;
        let last_idx = text.len() - 1;
        let last_text = text[last_idx].as_str();
        let nlines = to.line - from.line;

        if change.full {
            let old = self.line_count();
            self.insert_lines(self.first, lines_for(0, text.len()));
            self.remove_lines(self.first + text.len(), old);
            return;
        }

        let (Ok(first_id), Ok(last_id)) = (self.line_handle(from.line), self.line_handle(to.line))
        else {
            tracing::warn!(%from, %to, "change outside document ignored");
            return;
        };

        if Self::is_whole_line_update(change) {
            let added = lines_for(0, last_idx);
            let kept = self.line_ref(last_id).text.clone();
            self.update_line(last_id, kept, spans_for(last_idx));
            self.remove_lines(from.line, nlines);
            self.insert_lines(from.line, added);
        } else if first_id == last_id {
            let first_text = self.line_ref(first_id).text.clone();
            let before = slice_chars(&first_text, 0, from.ch);
            let after = slice_chars(&first_text, to.ch, usize::MAX);
            if text.len() == 1 {
                let joined = format!("{before}{last_text}{after}");
                self.update_line(first_id, joined, spans_for(last_idx));
            } else {
                let mut added = lines_for(1, last_idx);
                added.push((format!("{last_text}{after}"), spans_for(last_idx)));
                let head = format!("{before}{}", text[0]);
                self.update_line(first_id, head, spans_for(0));
                self.insert_lines(from.line + 1, added);
            }
        } else if text.len() == 1 {
            let first_text = self.line_ref(first_id).text.clone();
            let last_line_text = self.line_ref(last_id).text.clone();
            let joined = format!(
                "{}{}{}",
                slice_chars(&first_text, 0, from.ch),
                text[0],
                slice_chars(&last_line_text, to.ch, usize::MAX)
            );
            self.update_line(first_id, joined, spans_for(0));
            self.remove_lines(from.line + 1, nlines);
        } else {
            let first_text = self.line_ref(first_id).text.clone();
            let last_line_text = self.line_ref(last_id).text.clone();
            let head = format!("{}{}", slice_chars(&first_text, 0, from.ch), text[0]);
            let tail = format!("{last_text}{}", slice_chars(&last_line_text, to.ch, usize::MAX));
            self.update_line(first_id, head, spans_for(0));
            self.update_line(last_id, tail, spans_for(last_idx));
            let added = lines_for(1, last_idx);
            if nlines > 1 {
                self.remove_lines(from.line + 1, nlines - 1);
            }
            self.insert_lines(from.line + 1, added);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::doc::history::{History, HistoryId};
    use crate::options::DocOptions;

    fn doc(text: &str) -> Document {
        let mut histories: Arena<HistoryId, History> = Arena::new();
        let history = histories.insert(History::default());
        Document::new(text, DocOptions::default(), history)
    }

    fn change(from: (usize, usize), to: (usize, usize), text: &[&str]) -> Change {
        Change::new(
            from.into(),
            to.into(),
            text.iter().map(|s| (*s).to_string()).collect(),
            None,
        )
    }

    fn apply(d: &mut Document, c: &Change) {
        let spans = d.stretch_spans_over_change(c);
        d.update_doc(c, spans);
    }

    // ========================================================================
    // Position mapping
    // ========================================================================

    #[test]
    fn change_end_single_and_multi_line() {
        assert_eq!(change_end(&change((0, 3), (0, 3), &["bar"])), Pos::new(0, 6));
        assert_eq!(change_end(&change((1, 3), (1, 3), &["a", "bc"])), Pos::new(2, 2));
    }

    #[test]
    fn adjust_moves_positions_after_change() {
        let c = change((0, 2), (1, 1), &["XYZ"]);
        assert_eq!(adjust_for_change(Pos::new(0, 1), &c), Pos::new(0, 1));
        assert_eq!(adjust_for_change(Pos::new(0, 4), &c), Pos::new(0, 5));
        assert_eq!(adjust_for_change(Pos::new(1, 3), &c), Pos::new(0, 7));
        assert_eq!(adjust_for_change(Pos::new(3, 0), &c), Pos::new(2, 0));
    }

    #[test]
    fn origin_prefixes() {
        assert!(Origin::INPUT.merges_when_recent());
        assert!(!Origin::PASTE.merges_when_recent());
        assert!(Origin::new("*compose").merges_always());
        assert!(Origin::UNDO.is_history());
        assert_eq!(Origin::from("x").to_string(), "x");
    }

    #[test]
    fn change_request_update_respects_flag() {
        let c = change((0, 0), (0, 0), &["a"]);
        let mut locked = ChangeRequest::new(&c, false);
        assert!(!locked.update(None, None, Some(vec!["b".into()])));
        assert_eq!(locked.text(), ["a".to_string()]);

        let mut open = ChangeRequest::new(&c, true);
        assert!(open.update(Some(Pos::new(0, 0)), None, Some(Vec::new())));
        assert_eq!(open.text(), [String::new()]);
        open.cancel();
        assert!(open.into_change().is_none());
    }

    // ========================================================================
    // Line splicing
    // ========================================================================

    #[test]
    fn insert_within_line() {
        let mut d = doc("foo");
        apply(&mut d, &change((0, 3), (0, 3), &["bar"]));
        assert_eq!(d.value(), "foobar");
    }

    #[test]
    fn insert_newline_splits_line() {
        let mut d = doc("hello world");
        apply(&mut d, &change((0, 5), (0, 6), &["", ""]));
        assert_eq!(d.value(), "hello\nworld");
        assert_eq!(d.line_count(), 2);
    }

    #[test]
    fn join_lines() {
        let mut d = doc("one\ntwo\nthree");
        apply(&mut d, &change((0, 2), (2, 1), &["-"]));
        assert_eq!(d.value(), "on-hree");
        assert_eq!(d.line_count(), 1);
    }

    #[test]
    fn multi_line_replacement_across_lines() {
        let mut d = doc("aaa\nbbb\nccc\nddd");
        apply(&mut d, &change((0, 1), (3, 2), &["X", "Y", "Z"]));
        assert_eq!(d.value(), "aX\nY\nZd");
        assert!(d.line_store().is_consistent());
    }

    #[test]
    fn whole_line_update_keeps_following_line_identity() {
        let mut d = doc("a\nb\nc");
        let keep = d.line_handle(2).unwrap();
        apply(&mut d, &change((1, 0), (2, 0), &["x", "y", ""]));
        assert_eq!(d.value(), "a\nx\ny\nc");
        assert_eq!(d.line_handle(3).unwrap(), keep);
    }

    #[test]
    fn full_replacement() {
        let mut d = doc("old\ntext");
        let mut c = change((0, 0), (1, 4), &["new", "lines", "here"]);
        c.full = true;
        apply(&mut d, &c);
        assert_eq!(d.value(), "new\nlines\nhere");
    }

    #[test]
    fn selection_follows_change() {
        let mut d = doc("hello");
        d.sel = Selection::cursor(Pos::new(0, 5));
        let c = change((0, 0), (0, 0), &["ab"]);
        assert_eq!(d.compute_sel_after_change(&c).primary().head, Pos::new(0, 7));
    }
}
