//! Marker creation and removal with their display and history effects.

use crate::doc::{
    Change, DocId, MarkerId, MarkerKind, MarkerOptions, Origin, SharedMarker, TextMarker, Widget,
};
use crate::engine::Engine;
use crate::error::Result;
use crate::events::EditorEvent;
use crate::pos::Pos;
use crate::view::ChangeFlags;

/// Options of [`Engine::set_bookmark`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookmarkOptions {
    pub widget: Option<Widget>,
    /// Stay before text inserted at the bookmark.
    pub insert_left: bool,
    pub shared: bool,
    pub handle_mouse_events: bool,
}

/// Which class slot of a line [`Engine::add_line_class`] edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineClassTarget {
    Text,
    Background,
}

impl Engine {
    /// Mark `[from, to]` in `doc`. Reversed positions are swapped.
    ///
    /// Fails with [`crate::Error::EmptyMarkerRange`] for an empty range that would
    /// be cleared immediately, and with [`crate::Error::OverlappingCollapsedRange`]
    /// when a collapsed range partially overlaps another one. Nothing is
    /// marked when it fails.
    pub fn mark_text(&mut self, doc: DocId, from: Pos, to: Pos, options: MarkerOptions) -> Result<MarkerId> {
        self.mark(doc, from, to, options, MarkerKind::Range)
    }

    /// Place a bookmark at `pos`.
    pub fn set_bookmark(&mut self, doc: DocId, pos: Pos, options: BookmarkOptions) -> Result<MarkerId> {
        let options = MarkerOptions {
            replaced_with: options.widget,
            insert_left: options.insert_left,
            shared: options.shared,
            handle_mouse_events: options.handle_mouse_events,
            clear_when_empty: false,
            ..MarkerOptions::default()
        };
        self.mark(doc, pos, pos, options, MarkerKind::Bookmark)
    }

    fn mark(&mut self, doc: DocId, from: Pos, to: Pos, options: MarkerOptions, kind: MarkerKind) -> Result<MarkerId> {
        self.run_op(None, |engine| {
            if options.shared {
                engine.mark_shared(doc, from, to, options, kind)
            } else {
                engine.mark_single(doc, from, to, options, kind)
            }
        })
    }

    fn mark_single(&mut self, doc: DocId, from: Pos, to: Pos, options: MarkerOptions, kind: MarkerKind) -> Result<MarkerId> {
        let add_to_history = options.add_to_history;
        let entry = self.doc_mut(doc)?;
        let marker = entry.mark_text_inner(from, to, options, kind)?;
        if add_to_history {
            self.record_marker_in_history(doc, marker)?;
        }
        self.marker_added(doc, marker)?;
        Ok(marker)
    }

    /// Mark the range in `doc` and every linked document, grouping the
    /// markers so they clear together.
    fn mark_shared(&mut self, doc: DocId, from: Pos, to: Pos, options: MarkerOptions, kind: MarkerKind) -> Result<MarkerId> {
        let primary = self.mark_single(doc, from, to, options.clone(), kind)?;
        let mut members = vec![(doc, primary)];
        for (other, _) in self.linked_docs(doc, false) {
            let Some(entry) = self.docs.get(other) else {
                continue;
            };
            let (a, b) = (entry.clip_pos(from), entry.clip_pos(to));
            if a == b && options.clear_when_empty {
                tracing::trace!(?other, "shared marker range outside linked document, skipped");
                continue;
            }
            match self.mark_single(other, a, b, options.clone(), kind) {
                Ok(marker) => members.push((other, marker)),
                Err(err) => {
                    for (d, m) in members {
                        self.clear_single_marker(d, m)?;
                    }
                    return Err(err);
                }
            }
        }
        let group = self.shared_markers.insert(SharedMarker {
            members: members.clone(),
        });
        for (d, m) in members {
            if let Some(marker) = self.docs.get_mut(d).and_then(|e| e.markers.get_mut(m)) {
                marker.shared = Some(group);
            }
        }
        Ok(primary)
    }

    /// Record a marker as an undoable event: undoing it re-inserts the same
    /// text, which drops the marker.
    fn record_marker_in_history(&mut self, doc: DocId, marker: MarkerId) -> Result<()> {
        let entry = self.doc(doc)?;
        let Some(range) = entry.find_marker(marker) else {
            return Ok(());
        };
        let text = entry.get_between(range.from, range.to);
        let mut change = Change::new(range.from, range.to, text.clone(), Some(Origin::MARK_TEXT));
        change.removed = text;
        let sel = entry.sel.clone();
        let op_id = self.scheduler.next_op_id();
        let now = self.clock.now();
        let delay = self.event_delay(doc);
        self.history_mut(doc)?
            .add_change(&change, Vec::new(), &sel, sel.clone(), op_id, now, delay);
        Ok(())
    }

    /// Display effects of a new marker on the editor showing `doc`.
    fn marker_added(&mut self, doc: DocId, marker: MarkerId) -> Result<()> {
        let Some(editor) = self.touch_doc(doc) else {
            return Ok(());
        };
        let (ed, entry) = self.editor_and_doc(editor)?;
        let (Some(range), Some(m)) = (entry.find_marker(marker), entry.marker(marker)) else {
            return Ok(());
        };
        let opts = m.options().clone();
        if opts.collapsed {
            let from = entry.visual_line_no(range.from.line);
            ed.display.mark_range_dirty(entry, from, range.to.line + 1, ChangeFlags::TEXT);
            let op = ed.op();
            op.view_changed = true;
            op.update_max_line = true;
        } else if opts.is_styling() || opts.replaced_with.is_some() {
            ed.display
                .mark_range_dirty(entry, range.from.line, range.to.line + 1, ChangeFlags::TEXT);
            ed.op().view_changed = true;
        }
        if opts.atomic {
            self.recheck_selection(doc)?;
        }
        Ok(())
    }

    /// Push the selection out of atomic ranges after markers changed.
    fn recheck_selection(&mut self, doc: DocId) -> Result<()> {
        let editor = self.touch_doc(doc);
        let entry = self.doc_mut(doc)?;
        let current = entry.sel.clone();
        let skipped = entry.skip_atomic_in_selection(&current, 1, false);
        entry.cant_edit = skipped.cant_edit;
        if skipped.sel == current {
            return Ok(());
        }
        entry.sel = skipped.sel;
        if let Some(ed) = editor.and_then(|e| self.editors.get_mut(e)) {
            let op = ed.op();
            op.selection_changed = true;
            op.events.push(EditorEvent::CursorActivity);
        }
        Ok(())
    }

    /// Remove `marker` from `doc`, along with the other members of its
    /// shared group. Returns whether anything was cleared.
    pub fn clear_marker(&mut self, doc: DocId, marker: MarkerId) -> Result<bool> {
        let group = self
            .doc(doc)?
            .marker(marker)
            .and_then(TextMarker::shared_group);
        let Some(group) = group else {
            return self.clear_single_marker(doc, marker);
        };
        let members = self
            .shared_markers
            .remove(group)
            .map(|g| g.members)
            .unwrap_or_else(|| vec![(doc, marker)]);
        let mut cleared = false;
        for (d, m) in members {
            cleared |= self.clear_single_marker(d, m)?;
        }
        Ok(cleared)
    }

    pub(crate) fn clear_single_marker(&mut self, doc: DocId, marker: MarkerId) -> Result<bool> {
        self.run_op(None, |engine| {
            let Some(entry) = engine.docs.get_mut(doc) else {
                return Ok(false);
            };
            let Some(cleared) = entry.clear_marker_inner(marker) else {
                return Ok(false);
            };
            tracing::trace!(?doc, ?marker, "marker cleared");
            if let Some(editor) = engine.touch_doc(doc) {
                let (ed, entry) = engine.editor_and_doc(editor)?;
                let from = if cleared.collapsed {
                    entry.visual_line_no(entry.clip_line(cleared.from_line))
                } else {
                    cleared.from_line
                };
                ed.display
                    .mark_range_dirty(entry, from, cleared.to_line + 1, ChangeFlags::TEXT);
                let op = ed.op();
                op.view_changed = true;
                op.update_max_line |= cleared.collapsed;
                op.events.push(EditorEvent::MarkerCleared(marker));
            }
            Ok(true)
        })
    }

    /// Re-measure the lines a marker covers, after its widget changed size.
    pub fn marker_changed(&mut self, doc: DocId, marker: MarkerId) -> Result<()> {
        self.run_op(None, |engine| {
            let Some(editor) = engine.touch_doc(doc) else {
                return Ok(());
            };
            let (ed, entry) = engine.editor_and_doc(editor)?;
            let Some(range) = entry.find_marker(marker) else {
                return Ok(());
            };
            let from = entry.visual_line_no(range.from.line);
            ed.display
                .mark_range_dirty(entry, from, range.to.line + 1, ChangeFlags::WIDGET);
            ed.op().view_changed = true;
            Ok(())
        })
    }

    /// Add `class` to a line's text or background classes.
    pub fn add_line_class(&mut self, doc: DocId, line: usize, target: LineClassTarget, class: &str) -> Result<bool> {
        self.edit_line_class(doc, line, target, |classes| {
            if classes.split_whitespace().any(|c| c == class) {
                return false;
            }
            if !classes.is_empty() {
                classes.push(' ');
            }
            classes.push_str(class);
            true
        })
    }

    /// Remove `class` from a line's text or background classes.
    pub fn remove_line_class(&mut self, doc: DocId, line: usize, target: LineClassTarget, class: &str) -> Result<bool> {
        self.edit_line_class(doc, line, target, |classes| {
            let kept: Vec<&str> = classes.split_whitespace().filter(|c| *c != class).collect();
            let joined = kept.join(" ");
            if joined == *classes {
                return false;
            }
            *classes = joined;
            true
        })
    }

    fn edit_line_class(
        &mut self,
        doc: DocId,
        line: usize,
        target: LineClassTarget,
        edit: impl FnOnce(&mut String) -> bool,
    ) -> Result<bool> {
        self.run_op(None, |engine| {
            let entry = engine.doc_mut(doc)?;
            let id = entry.line_handle(line)?;
            let slot = match target {
                LineClassTarget::Text => &mut entry.line_mut(id).text_class,
                LineClassTarget::Background => &mut entry.line_mut(id).bg_class,
            };
            let mut classes = slot.take().unwrap_or_default();
            let changed = edit(&mut classes);
            *slot = (!classes.is_empty()).then_some(classes);
            if changed {
                if let Some(editor) = engine.touch_doc(doc) {
                    let ed = engine.editor_mut(editor)?;
                    ed.display.mark_dirty(id, ChangeFlags::CLASS);
                    ed.op().view_changed = true;
                }
            }
            Ok(changed)
        })
    }

    /// Marker `id` in `doc`, if it still exists.
    pub fn marker(&self, doc: DocId, marker: MarkerId) -> Result<Option<&TextMarker>> {
        self.doc(doc).map(|d| d.marker(marker))
    }

    /// Shared group of a marker created with `shared: true`.
    pub fn shared_marker(&self, doc: DocId, marker: MarkerId) -> Result<Option<&SharedMarker>> {
        let group = self
            .doc(doc)?
            .marker(marker)
            .and_then(TextMarker::shared_group);
        Ok(group.and_then(|g| self.shared_markers.get(g)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocOptions;

    #[test]
    fn mark_text_and_clear() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("hello world", DocOptions::default());
        let m = engine
            .mark_text(doc, Pos::new(0, 0), Pos::new(0, 5), MarkerOptions::class("bold"))
            .unwrap();
        let range = engine.doc(doc).unwrap().find_marker(m).unwrap();
        assert_eq!((range.from, range.to), (Pos::new(0, 0), Pos::new(0, 5)));
        assert!(engine.clear_marker(doc, m).unwrap());
        assert!(engine.doc(doc).unwrap().find_marker(m).is_none());
        assert!(!engine.clear_marker(doc, m).unwrap());
    }

    #[test]
    fn overlapping_collapsed_leaves_state_untouched() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("0123456789", DocOptions::default());
        engine
            .mark_text(doc, Pos::new(0, 2), Pos::new(0, 6), MarkerOptions::collapsed())
            .unwrap();
        let err = engine
            .mark_text(doc, Pos::new(0, 4), Pos::new(0, 8), MarkerOptions::collapsed())
            .unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(engine.doc(doc).unwrap().all_marks().len(), 1);
    }

    #[test]
    fn marker_in_history_is_undone() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("abcdef", DocOptions::default());
        let opts = MarkerOptions {
            add_to_history: true,
            ..MarkerOptions::class("x")
        };
        let m = engine.mark_text(doc, Pos::new(0, 1), Pos::new(0, 3), opts).unwrap();
        assert_eq!(engine.history_size(doc).unwrap(), (1, 0));
        engine.undo(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "abcdef");
        assert!(engine.doc(doc).unwrap().find_marker(m).is_none());
    }

    #[test]
    fn bookmark_survives_empty_range() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("abc", DocOptions::default());
        let b = engine
            .set_bookmark(doc, Pos::new(0, 1), BookmarkOptions::default())
            .unwrap();
        engine
            .replace_range(doc, "X", Pos::new(0, 0), Pos::new(0, 0), None)
            .unwrap();
        let range = engine.doc(doc).unwrap().find_marker(b).unwrap();
        assert_eq!(range.from, Pos::new(0, 2));
    }

    #[test]
    fn line_classes_toggle() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("a\nb", DocOptions::default());
        assert!(engine.add_line_class(doc, 1, LineClassTarget::Background, "hl").unwrap());
        assert!(!engine.add_line_class(doc, 1, LineClassTarget::Background, "hl").unwrap());
        assert!(engine.add_line_class(doc, 1, LineClassTarget::Background, "err").unwrap());
        let d = engine.doc(doc).unwrap();
        let id = d.line_handle(1).unwrap();
        assert_eq!(d.line_ref(id).bg_class(), Some("hl err"));
        assert!(engine.remove_line_class(doc, 1, LineClassTarget::Background, "hl").unwrap());
        let d = engine.doc(doc).unwrap();
        assert_eq!(d.line_ref(id).bg_class(), Some("err"));
    }
}
