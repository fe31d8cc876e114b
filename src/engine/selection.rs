//! Selection updates: hooks, atomic skipping, history and scrolling.

use crate::doc::history::HistoryEvent;
use crate::doc::{Change, DocId, Origin, Range, Selection, SelectionRequest, change_end};
use crate::engine::Engine;
use crate::error::Result;
use crate::events::EditorEvent;
use crate::options::ReadOnly;
use crate::pos::Pos;
use crate::scheduler::ScrollRequest;
use crate::view::ScrollTarget;

/// How a selection update is recorded and displayed.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectOptions {
    /// History merge origin, as for changes.
    pub origin: Option<Origin>,
    /// Scroll the primary head into view.
    pub scroll: bool,
    /// Direction to leave atomic ranges in. Defaults to the direction the
    /// primary head moved.
    pub bias: Option<i32>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            origin: None,
            scroll: true,
            bias: None,
        }
    }
}

impl SelectOptions {
    #[must_use]
    pub fn no_scroll() -> Self {
        Self {
            scroll: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub fn with_bias(mut self, bias: i32) -> Self {
        self.bias = Some(bias);
        self
    }
}

/// Where the selection goes after [`Engine::replace_selection`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplaceSelect {
    /// Select the inserted text.
    Around,
    /// Collapse to the start of the inserted text.
    Start,
    /// Collapse to the end of the inserted text.
    #[default]
    End,
}

impl Engine {
    /// Replace the selection of `doc` without recording it in history.
    pub(crate) fn set_selection_no_undo(&mut self, doc: DocId, sel: Selection, opts: &SelectOptions) -> Result<()> {
        let editor = self.touch_doc(doc);
        let entry = self.doc_mut(doc)?;
        let sel = if entry.before_selection_change.is_empty() {
            sel
        } else {
            let mut request = SelectionRequest::new(&sel, opts.origin.clone());
            let mut hooks = std::mem::take(&mut entry.before_selection_change);
            for hook in &mut hooks {
                hook(&mut request);
            }
            hooks.append(&mut entry.before_selection_change);
            entry.before_selection_change = hooks;
            match request.into_ranges() {
                Some(ranges) if !ranges.is_empty() => {
                    let primary = ranges.len() - 1;
                    let ranges = ranges
                        .into_iter()
                        .map(|r| Range {
                            anchor: entry.clip_pos(r.anchor),
                            head: entry.clip_pos(r.head),
                            goal_column: r.goal_column,
                        })
                        .collect();
                    Selection::new(ranges, primary)
                }
                _ => sel,
            }
        };

        let bias = opts.bias.unwrap_or_else(|| {
            if sel.primary().head < entry.sel.primary().head {
                -1
            } else {
                1
            }
        });
        let skipped = entry.skip_atomic_in_selection(&sel, bias, true);
        entry.cant_edit = skipped.cant_edit;
        if skipped.cant_edit {
            tracing::debug!(?doc, "no position outside atomic ranges, editing blocked");
        }
        let changed = skipped.sel != entry.sel;
        if changed {
            entry.sel = skipped.sel;
        }

        if let Some(ed) = editor.and_then(|e| self.editors.get_mut(e)) {
            if changed {
                let op = ed.op();
                op.selection_changed = true;
                op.events.push(EditorEvent::CursorActivity);
            }
        }
        for marker in skipped.entered {
            self.clear_marker(doc, marker)?;
        }
        if opts.scroll {
            self.ensure_cursor_visible(doc);
        }
        Ok(())
    }

    /// Replace the selection and record it as an undoable selection event.
    pub(crate) fn set_selection_recorded(
        &mut self,
        doc: DocId,
        sel: Selection,
        opts: &SelectOptions,
        clear_redo: bool,
    ) -> Result<()> {
        self.run_op(None, |engine| {
            engine.set_selection_no_undo(doc, sel, opts)?;
            let editor = engine.doc(doc)?.editor;
            let op_id = engine.current_op_id(editor);
            let now = engine.clock.now();
            let delay = engine.event_delay(doc);
            let sel = engine.doc(doc)?.sel.clone();
            engine
                .history_mut(doc)?
                .add_selection(sel, op_id, opts.origin.as_ref(), clear_redo, now, delay);
            Ok(())
        })
    }

    /// Scroll the primary cursor of `doc` into view on its editor.
    pub(crate) fn ensure_cursor_visible(&mut self, doc: DocId) {
        let Some(head) = self.docs.get(doc).map(|d| d.sel.primary().head) else {
            return;
        };
        let Some(editor) = self.touch_doc(doc) else {
            return;
        };
        if let Some(ed) = self.editors.get_mut(editor) {
            if ed.options.read_only == ReadOnly::NoCursor {
                return;
            }
            let margin = ed.options.cursor_scroll_margin;
            ed.op().scroll_to = Some(ScrollRequest {
                target: ScrollTarget::Pos(head),
                margin,
            });
        }
    }

    /// Select `[anchor, head]`, or place a cursor at `anchor`.
    pub fn set_selection(&mut self, doc: DocId, anchor: Pos, head: Option<Pos>, opts: SelectOptions) -> Result<()> {
        let entry = self.doc(doc)?;
        let anchor = entry.clip_pos(anchor);
        let head = head.map_or(anchor, |h| entry.clip_pos(h));
        self.set_selection_recorded(doc, Selection::single(anchor, head), &opts, true)
    }

    pub fn set_cursor(&mut self, doc: DocId, pos: Pos, opts: SelectOptions) -> Result<()> {
        self.set_selection(doc, pos, None, opts)
    }

    /// Move the primary head to `head`, keeping the anchor when the
    /// document is extending. `other` extends the range to cover both.
    pub fn extend_selection(&mut self, doc: DocId, head: Pos, other: Option<Pos>, opts: SelectOptions) -> Result<()> {
        let entry = self.doc(doc)?;
        let head = entry.clip_pos(head);
        let other = other.map(|o| entry.clip_pos(o));
        let range = extend_range(entry.sel.primary(), head, other, entry.extend);
        self.set_selection_recorded(doc, Selection::new(vec![range], 0), &opts, true)
    }

    /// Extend every range to the matching head in `heads`.
    pub fn extend_selections(&mut self, doc: DocId, heads: &[Pos], opts: SelectOptions) -> Result<()> {
        let entry = self.doc(doc)?;
        let ranges = entry
            .sel
            .ranges()
            .iter()
            .zip(heads)
            .map(|(range, &head)| extend_range(range, entry.clip_pos(head), None, entry.extend))
            .collect();
        let sel = Selection::new(ranges, entry.sel.primary_index());
        self.set_selection_recorded(doc, sel, &opts, true)
    }

    /// Replace the whole selection. `primary` defaults to the current
    /// primary index, clamped.
    pub fn set_selections(
        &mut self,
        doc: DocId,
        ranges: Vec<Range>,
        primary: Option<usize>,
        opts: SelectOptions,
    ) -> Result<()> {
        if ranges.is_empty() {
            return Ok(());
        }
        let entry = self.doc(doc)?;
        let primary = primary
            .unwrap_or_else(|| entry.sel.primary_index())
            .min(ranges.len() - 1);
        let ranges = ranges
            .into_iter()
            .map(|r| Range {
                anchor: entry.clip_pos(r.anchor),
                head: entry.clip_pos(r.head),
                goal_column: r.goal_column,
            })
            .collect();
        self.set_selection_recorded(doc, Selection::new(ranges, primary), &opts, true)
    }

    /// Add a range and make it primary.
    pub fn add_selection(&mut self, doc: DocId, anchor: Pos, head: Option<Pos>) -> Result<()> {
        let entry = self.doc(doc)?;
        let anchor = entry.clip_pos(anchor);
        let head = head.map_or(anchor, |h| entry.clip_pos(h));
        let mut ranges = entry.sel.ranges().to_vec();
        let primary = ranges.len();
        ranges.push(Range::new(anchor, head));
        self.set_selection_recorded(doc, Selection::new(ranges, primary), &SelectOptions::default(), true)
    }

    /// Make plain cursor motion extend the selection (shift-selection).
    pub fn set_extending(&mut self, doc: DocId, extending: bool) -> Result<()> {
        self.doc_mut(doc)?.extend = extending;
        Ok(())
    }

    pub fn is_extending(&self, doc: DocId) -> Result<bool> {
        self.doc(doc).map(|d| d.extend)
    }

    /// Replace every selected range with `text`. The origin defaults to
    /// `+input`.
    pub fn replace_selection(
        &mut self,
        doc: DocId,
        text: &str,
        select: ReplaceSelect,
        origin: Option<Origin>,
    ) -> Result<()> {
        let count = self.doc(doc)?.sel.len();
        let texts = vec![text.to_owned(); count];
        self.replace_selections(doc, &texts, select, origin)
    }

    /// Replace range `i` of the selection with `texts[i]`.
    pub fn replace_selections(
        &mut self,
        doc: DocId,
        texts: &[String],
        select: ReplaceSelect,
        origin: Option<Origin>,
    ) -> Result<()> {
        let origin = origin.unwrap_or(Origin::INPUT);
        self.run_op(None, |engine| {
            let entry = engine.doc(doc)?;
            let changes: Vec<Change> = entry
                .sel
                .ranges()
                .iter()
                .zip(texts)
                .map(|(range, text)| {
                    Change::new(range.from(), range.to(), entry.split_lines(text), Some(origin.clone()))
                })
                .collect();
            let new_sel = match select {
                ReplaceSelect::End => None,
                ReplaceSelect::Around | ReplaceSelect::Start => {
                    Some(computed_replaced_sel(&entry.sel, entry.first_line(), &changes, select))
                }
            };
            for change in changes.into_iter().rev() {
                engine.make_change(doc, change, false)?;
            }
            match new_sel {
                Some(sel) => engine.set_selection_replace_history(doc, sel),
                None => {
                    engine.ensure_cursor_visible(doc);
                    Ok(())
                }
            }
        })
    }

    /// Set the selection, overwriting a trailing selection event in history
    /// instead of adding one.
    fn set_selection_replace_history(&mut self, doc: DocId, sel: Selection) -> Result<()> {
        let replaced = match self.history_mut(doc)?.done.last_mut() {
            Some(HistoryEvent::Selection(last)) => {
                *last = sel.clone();
                true
            }
            _ => false,
        };
        if replaced {
            self.set_selection_no_undo(doc, sel, &SelectOptions::default())
        } else {
            self.set_selection_recorded(doc, sel, &SelectOptions::default(), true)
        }
    }

    /// Text of the primary selection, or all ranges joined by `sep`.
    pub fn get_selection(&self, doc: DocId, sep: Option<&str>) -> Result<String> {
        self.doc(doc).map(|d| d.get_selection(sep))
    }

    pub fn selections(&self, doc: DocId) -> Result<&Selection> {
        self.doc(doc).map(crate::doc::Document::selection)
    }
}

/// The range `range` becomes when its head moves to `head`.
pub(crate) fn extend_range(range: &Range, head: Pos, other: Option<Pos>, extend: bool) -> Range {
    if !extend {
        return Range::new(other.unwrap_or(head), head);
    }
    let mut anchor = range.anchor;
    let mut head = head;
    if let Some(other) = other {
        let pos_before = head < anchor;
        if pos_before != (other < anchor) {
            anchor = head;
            head = other;
        } else if pos_before != (head < other) {
            head = other;
        }
    }
    Range::new(anchor, head)
}

/// Selection after replacing each range by its change, for the collapsing
/// modes that do not simply follow the mapped cursor.
fn computed_replaced_sel(sel: &Selection, first: usize, changes: &[Change], select: ReplaceSelect) -> Selection {
    let offset = |pos: Pos, old: Pos, new: Pos| {
        if pos.line == old.line {
            Pos::new(new.line, (pos.ch + new.ch).saturating_sub(old.ch))
        } else {
            Pos::new(new.line + (pos.line - old.line), pos.ch)
        }
    };
    let mut old_prev = Pos::new(first, 0);
    let mut new_prev = old_prev;
    let mut out = Vec::with_capacity(changes.len());
    for (change, range) in changes.iter().zip(sel.ranges()) {
        let from = offset(change.from, old_prev, new_prev);
        let to = offset(change_end(change), old_prev, new_prev);
        old_prev = change.to;
        new_prev = to;
        out.push(match select {
            ReplaceSelect::Around if range.head < range.anchor => Range::new(to, from),
            ReplaceSelect::Around => Range::new(from, to),
            _ => Range::cursor(from),
        });
    }
    Selection::new(out, sel.primary_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocOptions;

    #[test]
    fn extend_range_without_extending_moves_both_ends() {
        let range = Range::new(Pos::new(0, 1), Pos::new(0, 3));
        let out = extend_range(&range, Pos::new(0, 5), None, false);
        assert_eq!(out, Range::cursor(Pos::new(0, 5)));
    }

    #[test]
    fn extend_range_keeps_anchor() {
        let range = Range::new(Pos::new(0, 1), Pos::new(0, 3));
        let out = extend_range(&range, Pos::new(0, 5), None, true);
        assert_eq!(out, Range::new(Pos::new(0, 1), Pos::new(0, 5)));
    }

    #[test]
    fn replace_selection_around_selects_inserted_text() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("one two", DocOptions::default());
        engine
            .set_selection(doc, Pos::new(0, 4), Some(Pos::new(0, 7)), SelectOptions::default())
            .unwrap();
        engine
            .replace_selection(doc, "three", ReplaceSelect::Around, None)
            .unwrap();
        let d = engine.doc(doc).unwrap();
        assert_eq!(d.value(), "one three");
        assert_eq!(
            *d.selection().primary(),
            Range::new(Pos::new(0, 4), Pos::new(0, 9))
        );
    }

    #[test]
    fn replace_selections_in_multiple_ranges() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("a b c", DocOptions::default());
        engine
            .set_selections(
                doc,
                vec![
                    Range::new(Pos::new(0, 0), Pos::new(0, 1)),
                    Range::new(Pos::new(0, 4), Pos::new(0, 5)),
                ],
                None,
                SelectOptions::default(),
            )
            .unwrap();
        engine.replace_selection(doc, "xy", ReplaceSelect::End, None).unwrap();
        let d = engine.doc(doc).unwrap();
        assert_eq!(d.value(), "xy b xy");
        let heads: Vec<Pos> = d.selection().ranges().iter().map(|r| r.head).collect();
        assert_eq!(heads, vec![Pos::new(0, 2), Pos::new(0, 7)]);
        assert_eq!(engine.history_size(doc).unwrap(), (1, 0));
    }

    #[test]
    fn before_selection_hook_rewrites_ranges() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("abcdef", DocOptions::default());
        engine
            .on_before_selection_change(doc, |req| {
                let ranges: Vec<Range> = req
                    .ranges()
                    .iter()
                    .map(|r| Range::cursor(Pos::new(r.head.line, r.head.ch.min(3))))
                    .collect();
                req.update(ranges);
            })
            .unwrap();
        engine.set_cursor(doc, Pos::new(0, 5), SelectOptions::default()).unwrap();
        assert_eq!(engine.doc(doc).unwrap().selection().primary().head, Pos::new(0, 3));
    }

    #[test]
    fn add_selection_becomes_primary() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("abc\ndef", DocOptions::default());
        engine.add_selection(doc, Pos::new(1, 1), None).unwrap();
        let sel = engine.selections(doc).unwrap();
        assert_eq!(sel.len(), 2);
        assert_eq!(sel.primary().head, Pos::new(1, 1));
    }
}
