//! The change pipeline.
//!
//! A change passes through, in order: the edit-suppression check, the
//! `beforeChange` hooks, read-only splitting, history recording, the line
//! store splice, and propagation to linked documents. Display bookkeeping
//! for the editor showing a document happens in the single-document step,
//! so linked documents with their own editors update as well.

use std::collections::HashSet;

use crate::doc::{Change, ChangeRequest, DocId, Document, MarkedSpan, Selection};
use crate::editor::EditorId;
use crate::engine::{Engine, SelectOptions};
use crate::error::Result;
use crate::events::EditorEvent;
use crate::pos::Pos;
use crate::scheduler::WORKER_RESTART_DELAY;
use crate::view::ChangeFlags;

impl Engine {
    /// Apply `change` to `doc` and every document linked to it.
    pub(crate) fn make_change(&mut self, doc: DocId, change: Change, ignore_read_only: bool) -> Result<()> {
        self.run_op(None, |engine| engine.make_change_in_op(doc, change, ignore_read_only))
    }

    fn make_change_in_op(&mut self, doc: DocId, change: Change, ignore_read_only: bool) -> Result<()> {
        self.touch_doc(doc);
        if !ignore_read_only && self.edits_suppressed(doc)? {
            tracing::debug!(?doc, from = %change.from, to = %change.to, "edit dropped, document is read-only");
            return Ok(());
        }
        let full = change.full;
        let (from, to) = (change.from, change.to);
        let Some(mut change) = self.filter_change(doc, change, true)? else {
            tracing::debug!(?doc, "change canceled by beforeChange hook");
            return Ok(());
        };
        change.full = full && change.from == from && change.to == to;

        let split = if ignore_read_only {
            None
        } else {
            self.doc(doc)?.read_only_split(change.from, change.to)
        };
        match split {
            Some(parts) => {
                if parts.is_empty() {
                    tracing::debug!(?doc, from = %change.from, to = %change.to, "change inside read-only range dropped");
                }
                for (i, &(from, to)) in parts.iter().enumerate().rev() {
                    let text = if i == 0 {
                        change.text.clone()
                    } else {
                        vec![String::new()]
                    };
                    self.make_change_inner(doc, Change::new(from, to, text, change.origin.clone()))?;
                }
                Ok(())
            }
            None => self.make_change_inner(doc, change),
        }
    }

    /// Whether edits to `doc` are currently dropped.
    pub(crate) fn edits_suppressed(&self, doc: DocId) -> Result<bool> {
        let entry = self.doc(doc)?;
        let read_only = entry
            .editor
            .and_then(|e| self.editors.get(e))
            .is_some_and(|e| e.options.read_only.is_read_only());
        Ok(read_only || entry.cant_edit)
    }

    pub(crate) fn has_change_hooks(&self, doc: DocId) -> bool {
        self.docs
            .get(doc)
            .is_some_and(|d| !d.before_change.is_empty())
    }

    /// Offer `change` to the `beforeChange` hooks of `doc`. `None` when a
    /// hook canceled it. The result is clipped to the document.
    pub(crate) fn filter_change(&mut self, doc: DocId, change: Change, updatable: bool) -> Result<Option<Change>> {
        let entry = self.doc_mut(doc)?;
        if entry.before_change.is_empty() {
            return Ok(Some(change));
        }
        let mut request = ChangeRequest::new(&change, updatable);
        let mut hooks = std::mem::take(&mut entry.before_change);
        for hook in &mut hooks {
            hook(&mut request);
            if request.is_canceled() {
                break;
            }
        }
        hooks.append(&mut entry.before_change);
        entry.before_change = hooks;
        let Some(mut filtered) = request.into_change() else {
            return Ok(None);
        };
        filtered.from = entry.clip_pos(filtered.from);
        filtered.to = entry.clip_pos(filtered.to);
        if filtered.to < filtered.from {
            std::mem::swap(&mut filtered.from, &mut filtered.to);
        }
        Ok(Some(filtered))
    }

    /// Record `change` in history, apply it, and propagate it.
    fn make_change_inner(&mut self, doc: DocId, mut change: Change) -> Result<()> {
        if change.is_noop() {
            return Ok(());
        }
        let editor = self.touch_doc(doc);
        let op_id = self.current_op_id(editor);
        let now = self.clock.now();
        let delay = self.event_delay(doc);

        let entry = self.doc(doc)?;
        let sel_before = entry.sel.clone();
        let sel_after = entry.compute_sel_after_change(&change);
        change.removed = entry.get_between(change.from, change.to);
        let hidden = entry.hidden_spans_in(&change);
        let history_id = entry.history;
        if let Some(history) = self.histories.get_mut(history_id) {
            history.add_change(&change, hidden, &sel_before, sel_after.clone(), op_id, now, delay);
        }

        self.make_change_single_doc(doc, &change, Some(sel_after))?;
        self.propagate_change(doc, &change)
    }

    /// Apply `change` to every document linked to `doc`, rebasing the
    /// histories that are not shared with it.
    pub(crate) fn propagate_change(&mut self, doc: DocId, change: &Change) -> Result<()> {
        let Some(history) = self.docs.get(doc).map(|d| d.history) else {
            return Ok(());
        };
        let mut rebased = vec![history];
        for (other, shared) in self.linked_docs(doc, false) {
            let Some(other_history) = self.docs.get(other).map(|d| d.history) else {
                continue;
            };
            if !shared && !rebased.contains(&other_history) {
                if let Some(hist) = self.histories.get_mut(other_history) {
                    hist.rebase(change);
                }
                rebased.push(other_history);
            }
            self.make_change_single_doc(other, change, None)?;
        }
        Ok(())
    }

    /// Documents linked to `doc`, directly or transitively, with whether
    /// each shares history along the whole path.
    pub(crate) fn linked_docs(&self, doc: DocId, shared_only: bool) -> Vec<(DocId, bool)> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([doc]);
        let mut stack = vec![(doc, true)];
        while let Some((at, shared)) = stack.pop() {
            let Some(entry) = self.docs.get(at) else {
                continue;
            };
            for link in &entry.links {
                let shared = shared && link.shared_hist;
                if (shared_only && !shared) || !seen.insert(link.doc) || !self.docs.contains(link.doc) {
                    continue;
                }
                out.push((link.doc, shared));
                stack.push((link.doc, shared));
            }
        }
        out
    }

    /// Apply `change` to `doc` alone, clipping it to the document's line
    /// range, then update the editor showing it.
    pub(crate) fn make_change_single_doc(
        &mut self,
        doc: DocId,
        change: &Change,
        sel_after: Option<Selection>,
    ) -> Result<()> {
        let Some(entry) = self.docs.get_mut(doc) else {
            return Ok(());
        };
        let first_before = entry.first_line();
        let Some(change) = clip_to_doc(entry, change) else {
            let shifted = entry.first_line() != first_before;
            if let Some(editor) = entry.editor.filter(|_| shifted) {
                self.start_editor_op(editor);
                if let Some(ed) = self.editors.get_mut(editor) {
                    ed.display.reset();
                    ed.op().force_update = true;
                }
            }
            return Ok(());
        };

        let sel_after = sel_after.unwrap_or_else(|| entry.compute_sel_after_change(&change));
        let spans = entry.stretch_spans_over_change(&change);
        match entry.editor {
            Some(editor) => self.change_in_editor(editor, &change, spans)?,
            None => {
                entry.update_doc(&change, spans);
                entry.retreat_frontier(change.from.line);
            }
        }

        self.set_selection_no_undo(doc, sel_after, &SelectOptions::no_scroll())?;
        let entry = self.doc_mut(doc)?;
        if entry.cant_edit {
            let start = Pos::new(entry.first_line(), 0);
            if entry.skip_atomic(start, None, 1, false, &mut Vec::new()).is_some() {
                entry.cant_edit = false;
            }
        }
        Ok(())
    }

    fn change_in_editor(
        &mut self,
        editor: EditorId,
        change: &Change,
        spans: Option<Vec<Vec<MarkedSpan>>>,
    ) -> Result<()> {
        self.start_editor_op(editor);
        let (ed, doc) = self.editor_and_doc(editor)?;
        let (from, to) = (change.from, change.to);
        let wrapping = ed.options.line_wrapping;

        let check_from = if wrapping {
            from.line
        } else {
            doc.visual_line_no(from.line)
        };
        let mut recompute_max = !wrapping
            && ed
                .display
                .max_line
                .and_then(|id| doc.line_no(id))
                .is_some_and(|n| n >= check_from && n <= to.line);
        if doc.sel.contains(from, Some(to)).is_some() {
            ed.op().events.push(EditorEvent::CursorActivity);
        }
        let touching = doc.markers_touching(from.line, to.line);

        doc.update_doc(change, spans);

        if !wrapping {
            let end = (from.line + change.text.len()).min(doc.first_line() + doc.line_count());
            for id in doc.line_ids(check_from, end) {
                let len = doc.line_length(id);
                if len > ed.display.max_line_length {
                    ed.display.max_line = Some(id);
                    ed.display.max_line_length = len;
                    recompute_max = false;
                }
            }
            if recompute_max {
                ed.op().update_max_line = true;
            }
        }
        doc.retreat_frontier(from.line);

        if change.full {
            ed.display.reset();
            ed.op().force_update = true;
        } else {
            let start = doc.visual_line_no(doc.clip_line(from.line));
            let end = if from.line == to.line && change.text.len() == 1 && !Document::is_whole_line_update(change) {
                from.line + 1
            } else {
                from.line + change.text.len()
            };
            ed.display.mark_range_dirty(doc, start, end, ChangeFlags::TEXT);
            ed.op().view_changed = true;
        }

        let hidden = doc.newly_hidden(&touching);
        let op = ed.op();
        op.text_changed = true;
        op.events.push_change(change.clone());
        for marker in hidden {
            op.events.push(EditorEvent::MarkerHidden(marker));
        }
        self.start_worker(editor, WORKER_RESTART_DELAY);
        Ok(())
    }

    /// Replace `[from, to]` in `doc` with `text`. Positions are clipped and
    /// may be given in either order.
    pub fn replace_range(
        &mut self,
        doc: DocId,
        text: &str,
        from: Pos,
        to: Pos,
        origin: Option<crate::doc::Origin>,
    ) -> Result<()> {
        let entry = self.doc(doc)?;
        let mut from = entry.clip_pos(from);
        let mut to = entry.clip_pos(to);
        if to < from {
            std::mem::swap(&mut from, &mut to);
        }
        let lines = entry.split_lines(text);
        self.make_change(doc, Change::new(from, to, lines, origin), false)
    }

    /// Replace the whole text of `doc` as one undoable change. The cursor
    /// moves to the document start.
    pub fn set_value(&mut self, doc: DocId, text: &str) -> Result<()> {
        self.run_op(None, |engine| {
            let entry = engine.doc(doc)?;
            let top = Pos::new(entry.first_line(), 0);
            let last = entry.last_line();
            let end = Pos::new(last, entry.line_len(last));
            let mut change = Change::new(top, end, entry.split_lines(text), Some(crate::doc::Origin::SET_VALUE));
            change.full = true;
            engine.make_change(doc, change, true)?;
            if let Some(op) = engine.doc_op(doc) {
                op.scroll_top = Some(0.0);
                op.scroll_left = Some(0.0);
            }
            let entry = engine.doc_mut(doc)?;
            entry.scroll_top = 0.0;
            entry.scroll_left = 0.0;
            let top = Pos::new(entry.first_line(), 0);
            engine.set_selection_no_undo(doc, Selection::cursor(top), &SelectOptions::no_scroll())
        })
    }
}

/// Clip `change` to the line range of `doc`. Changes entirely above the
/// range shift it and yield `None`, as do changes below it.
fn clip_to_doc(doc: &mut Document, change: &Change) -> Option<Change> {
    let first = doc.first_line();
    if change.to.line < first {
        doc.shift(change.line_diff());
        return None;
    }
    if change.from.line > doc.last_line() {
        return None;
    }
    let mut change = change.clone();
    if change.from.line < first {
        let shift = change.text.len() as isize - 1 - (first - change.from.line) as isize;
        doc.shift(shift);
        let text = change.text.last().cloned().unwrap_or_default();
        change = Change::new(
            Pos::new(doc.first_line(), 0),
            Pos::new(change.to.line.saturating_add_signed(shift), change.to.ch),
            vec![text],
            change.origin,
        );
    }
    let last = doc.last_line();
    if change.to.line > last {
        let text = change.text.first().cloned().unwrap_or_default();
        change = Change::new(change.from, Pos::new(last, doc.line_len(last)), vec![text], change.origin);
    }
    change.from = doc.clip_pos(change.from);
    change.to = doc.clip_pos(change.to);
    change.removed = doc.get_between(change.from, change.to);
    Some(change)
}
