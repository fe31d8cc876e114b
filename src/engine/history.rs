//! Undo, redo and the clean-state API.

use crate::doc::history::{HistoryChange, HistoryEvent, push_selection};
use crate::doc::{DocId, HistoryDirection, Selection, change_end};
use crate::engine::{Engine, SelectOptions};
use crate::error::{Error, Result};
use crate::events::EditorEvent;
use crate::scheduler::ScrollRequest;
use crate::view::ScrollTarget;

/// What popping the source stack produced.
enum Popped {
    Nothing,
    Select(Selection),
    Replay {
        changes: Vec<HistoryChange>,
        generation: u64,
        sel_after: Selection,
    },
}

impl Engine {
    pub fn undo(&mut self, doc: DocId) -> Result<()> {
        self.make_change_from_history(doc, HistoryDirection::Undo, false)
    }

    pub fn redo(&mut self, doc: DocId) -> Result<()> {
        self.make_change_from_history(doc, HistoryDirection::Redo, false)
    }

    /// Undo the last selection change, or the last edit if none is left.
    pub fn undo_selection(&mut self, doc: DocId) -> Result<()> {
        self.make_change_from_history(doc, HistoryDirection::Undo, true)
    }

    pub fn redo_selection(&mut self, doc: DocId) -> Result<()> {
        self.make_change_from_history(doc, HistoryDirection::Redo, true)
    }

    fn make_change_from_history(&mut self, doc: DocId, dir: HistoryDirection, selection_only: bool) -> Result<()> {
        self.run_op(None, |engine| engine.history_step(doc, dir, selection_only))
    }

    fn history_step(&mut self, doc: DocId, dir: HistoryDirection, selection_only: bool) -> Result<()> {
        let editor = self.touch_doc(doc);
        let suppress = self.edits_suppressed(doc)?;
        if suppress && !selection_only {
            tracing::debug!(?doc, ?dir, "history replay dropped, document is read-only");
            return Ok(());
        }
        let entry = self.doc(doc)?;
        let current = entry.sel.clone();
        let history_id = entry.history;

        let popped = {
            let history = self
                .histories
                .get_mut(history_id)
                .ok_or(Error::UnknownDocument(doc))?;
            if !history.has_usable_event(dir, &current, selection_only) {
                return Ok(());
            }
            history.reset_origins();
            let mut sel_after = current.clone();
            let (source, dest) = history.stacks_mut(dir);
            loop {
                let Some(event) = source.pop() else {
                    break Popped::Nothing;
                };
                match event {
                    HistoryEvent::Selection(sel) => {
                        push_selection(dest, sel.clone());
                        if selection_only && sel != current {
                            break Popped::Select(sel);
                        }
                        sel_after = sel;
                    }
                    HistoryEvent::Changes { .. } if suppress => {
                        source.push(event);
                        break Popped::Nothing;
                    }
                    HistoryEvent::Changes { changes, generation } => {
                        break Popped::Replay {
                            changes,
                            generation,
                            sel_after,
                        };
                    }
                }
            }
        };

        let (changes, generation, sel_after) = match popped {
            Popped::Nothing => return Ok(()),
            Popped::Select(sel) => {
                tracing::trace!(?doc, ?dir, "selection restored from history");
                return self.set_selection_from_history(doc, sel);
            }
            Popped::Replay {
                changes,
                generation,
                sel_after,
            } => (changes, generation, sel_after),
        };

        if let Some(history) = self.histories.get_mut(history_id) {
            let current_generation = history.generation;
            let (_, dest) = history.stacks_mut(dir);
            push_selection(dest, sel_after);
            dest.push(HistoryEvent::Changes {
                changes: Vec::new(),
                generation: current_generation,
            });
            history.generation = generation;
        }
        tracing::debug!(?doc, ?dir, changes = changes.len(), "replaying history event");

        let filter = self.has_change_hooks(doc);
        let origin = dir.origin();
        for (i, recorded) in changes.iter().enumerate().rev() {
            let change = recorded.to_change(origin.clone());
            if filter && self.filter_change(doc, change.clone(), false)?.is_none() {
                if let Some(history) = self.histories.get_mut(history_id) {
                    history.stacks_mut(dir).0.clear();
                }
                tracing::debug!(?doc, ?dir, "history replay canceled by beforeChange hook");
                return Ok(());
            }

            let entry = self.doc(doc)?;
            let anti = HistoryChange {
                from: change.from,
                to: change_end(&change),
                text: entry.get_between(change.from, change.to),
                hidden: entry.hidden_spans_in(&change),
            };
            let after = if i == 0 {
                self.histories
                    .get(history_id)
                    .and_then(|h| match h.stack(dir).last() {
                        Some(HistoryEvent::Selection(sel)) => Some(sel.clone()),
                        _ => None,
                    })
            } else {
                Some(entry.compute_sel_after_change(&change))
            };
            if let Some(history) = self.histories.get_mut(history_id) {
                if let Some(HistoryEvent::Changes { changes, .. }) = history.stacks_mut(dir).1.last_mut() {
                    changes.push(anti);
                }
            }

            self.make_change_single_doc(doc, &change, after)?;
            let restored = self.doc_mut(doc)?.restore_hidden(&recorded.hidden);
            if let Some(editor) = editor {
                self.start_editor_op(editor);
                if let Some(ed) = self.editors.get_mut(editor) {
                    let margin = ed.options.cursor_scroll_margin;
                    let op = ed.op();
                    for marker in restored {
                        op.events.push(EditorEvent::MarkerUnhidden(marker));
                    }
                    if i == 0 {
                        op.scroll_to = Some(ScrollRequest {
                            target: ScrollTarget::Range {
                                from: change.from,
                                to: change_end(&change),
                            },
                            margin,
                        });
                    }
                }
            }
            self.propagate_change(doc, &change)?;
        }
        Ok(())
    }

    /// Number of undoable and redoable edits.
    pub fn history_size(&self, doc: DocId) -> Result<(usize, usize)> {
        self.history(doc).map(crate::doc::History::size)
    }

    /// Drop all undo and redo events of `doc` and the documents sharing its
    /// history.
    pub fn clear_history(&mut self, doc: DocId) -> Result<()> {
        self.history_mut(doc)?.clear();
        tracing::debug!(?doc, "history cleared");
        Ok(())
    }

    /// Current history generation. With `close_event`, the next change
    /// starts a new undo event.
    pub fn change_generation(&mut self, doc: DocId, close_event: bool) -> Result<u64> {
        let history = self.history_mut(doc)?;
        if close_event {
            history.close_event();
        }
        Ok(history.generation())
    }

    /// Whether `doc` is unchanged since [`Engine::mark_clean`], or since
    /// `generation` when given.
    pub fn is_clean(&self, doc: DocId, generation: Option<u64>) -> Result<bool> {
        let entry = self.doc(doc)?;
        let current = self.history(doc)?.generation();
        Ok(current == generation.unwrap_or(entry.clean_generation))
    }

    pub fn mark_clean(&mut self, doc: DocId) -> Result<()> {
        let generation = self.change_generation(doc, true)?;
        self.doc_mut(doc)?.clean_generation = generation;
        Ok(())
    }

    /// Set the selection from a history snapshot without recording it again.
    fn set_selection_from_history(&mut self, doc: DocId, sel: Selection) -> Result<()> {
        self.set_selection_recorded(doc, sel, &SelectOptions::default(), false)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::doc::Origin;
    use crate::engine::{Engine, SelectOptions};
    use crate::options::DocOptions;
    use crate::pos::Pos;

    fn engine() -> (Engine, ManualClock) {
        let clock = ManualClock::new();
        (Engine::with_clock(clock.clone()), clock)
    }

    #[test]
    fn typed_input_merges_within_delay() {
        let (mut engine, clock) = engine();
        let doc = engine.create_doc("", DocOptions::default());
        for (i, ch) in ["f", "o", "o"].iter().enumerate() {
            engine
                .replace_range(doc, ch, Pos::new(0, i), Pos::new(0, i), Some(Origin::INPUT))
                .unwrap();
            clock.advance(Duration::from_millis(100));
        }
        assert_eq!(engine.history_size(doc).unwrap(), (1, 0));
        clock.advance(Duration::from_secs(5));
        engine
            .replace_range(doc, "bar", Pos::new(0, 3), Pos::new(0, 3), Some(Origin::INPUT))
            .unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "foobar");
        assert_eq!(engine.history_size(doc).unwrap(), (2, 0));

        engine.undo(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "foo");
        engine.undo(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "");
        assert_eq!(engine.history_size(doc).unwrap(), (0, 2));
        engine.redo(doc).unwrap();
        engine.redo(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "foobar");
    }

    #[test]
    fn new_change_clears_redo() {
        let (mut engine, _clock) = engine();
        let doc = engine.create_doc("a", DocOptions::default());
        engine.replace_range(doc, "b", Pos::new(0, 1), Pos::new(0, 1), None).unwrap();
        engine.undo(doc).unwrap();
        assert_eq!(engine.history_size(doc).unwrap(), (0, 1));
        engine.replace_range(doc, "c", Pos::new(0, 1), Pos::new(0, 1), None).unwrap();
        assert_eq!(engine.history_size(doc).unwrap(), (1, 0));
    }

    #[test]
    fn clean_tracking() {
        let (mut engine, _clock) = engine();
        let doc = engine.create_doc("x", DocOptions::default());
        assert!(engine.is_clean(doc, None).unwrap());
        engine.replace_range(doc, "y", Pos::new(0, 1), Pos::new(0, 1), None).unwrap();
        assert!(!engine.is_clean(doc, None).unwrap());
        engine.mark_clean(doc).unwrap();
        assert!(engine.is_clean(doc, None).unwrap());
        let generation = engine.change_generation(doc, false).unwrap();
        engine.replace_range(doc, "z", Pos::new(0, 2), Pos::new(0, 2), None).unwrap();
        assert!(!engine.is_clean(doc, Some(generation)).unwrap());
        engine.undo(doc).unwrap();
        assert!(engine.is_clean(doc, Some(generation)).unwrap());
    }

    #[test]
    fn undo_selection_steps_back_through_cursor_moves() {
        let (mut engine, clock) = engine();
        let doc = engine.create_doc("abcdef", DocOptions::default());
        engine.set_cursor(doc, Pos::new(0, 2), SelectOptions::default()).unwrap();
        clock.advance(Duration::from_secs(2));
        engine.set_cursor(doc, Pos::new(0, 4), SelectOptions::default()).unwrap();
        engine.undo_selection(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().selection().primary().head, Pos::new(0, 2));
        engine.redo_selection(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().selection().primary().head, Pos::new(0, 4));
    }

    #[test]
    fn clear_history_empties_both_stacks() {
        let (mut engine, _clock) = engine();
        let doc = engine.create_doc("", DocOptions::default());
        engine.replace_range(doc, "a", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        engine.undo(doc).unwrap();
        engine.replace_range(doc, "b", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        engine.clear_history(doc).unwrap();
        assert_eq!(engine.history_size(doc).unwrap(), (0, 0));
        engine.undo(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "b");
    }
}
