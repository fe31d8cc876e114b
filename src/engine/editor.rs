//! Editor lifecycle, options, geometry queries and token lookups.

use crate::doc::{DocId, Document, HeightEstimate};
use crate::editor::{Editor, EditorId};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::events::{EditorEvent, HookActions};
use crate::highlight::{SavedState, Token, TokenKind};
use crate::input;
use crate::options::{EditorOption, EditorOptions, OptionEffect, ReadOnly};
use crate::pos::Pos;
use crate::scheduler::{ScrollRequest, TaskKind, WORKER_RESTART_DELAY};
use crate::view::{CoordsPos, Rect, RenderHost, ScrollInfo, ScrollTarget, Viewport, measure};

/// Height estimate matching the editor's host metrics.
fn height_estimate(ed: &Editor) -> HeightEstimate {
    let char_width = ed.host.char_width();
    let wrap_chars = (ed.options.line_wrapping && char_width > 0.0).then(|| {
        let per_row = ed.host.geometry().client_width / char_width - 3.0;
        per_row.max(5.0) as usize
    });
    HeightEstimate {
        text_height: ed.host.text_height(),
        wrap_chars,
    }
}

/// Re-estimate every line height of `doc` when the estimate changed.
fn reestimate(ed: &Editor, doc: &mut Document) {
    let estimate = height_estimate(ed);
    if doc.estimate != estimate {
        doc.estimate = estimate;
        doc.estimate_all_heights();
    }
}

impl Engine {
    /// Show `doc` through `host`. The document must not be shown by
    /// another editor.
    pub fn create_editor(
        &mut self,
        doc: DocId,
        options: EditorOptions,
        mut host: Box<dyn RenderHost>,
    ) -> Result<EditorId> {
        if self.doc(doc)?.editor.is_some() {
            return Err(Error::DocumentAlreadyAttached(doc));
        }
        let input = input::for_style(options.input_style);
        host.mount();
        let id = self.editors.insert(Editor::new(doc, options, host, input));
        tracing::debug!(editor = ?id, ?doc, "editor created");
        self.run_op(Some(id), |engine| {
            engine.attach_doc(id, doc)?;
            if let Some(ed) = engine.editors.get_mut(id) {
                ed.op().force_update = true;
            }
            engine.start_worker(id, WORKER_RESTART_DELAY);
            Ok(id)
        })
    }

    /// Point `editor` at `doc` and bring the document in line with the
    /// editor's options.
    fn attach_doc(&mut self, editor: EditorId, doc: DocId) -> Result<()> {
        let mode = self
            .editor(editor)?
            .options
            .mode
            .as_deref()
            .and_then(|name| {
                let found = self.modes.by_name(name);
                if found.is_none() {
                    tracing::warn!(?editor, mode = name, "unknown mode, keeping the document's");
                }
                found
            });
        let (ed, entry) = {
            let ed = self
                .editors
                .get_mut(editor)
                .ok_or(Error::UnknownEditor(editor))?;
            let entry = self.docs.get_mut(doc).ok_or(Error::UnknownDocument(doc))?;
            (ed, entry)
        };
        ed.doc = doc;
        entry.editor = Some(editor);
        entry.set_direction(ed.options.direction);
        if let Some(sep) = &ed.options.line_separator {
            entry.line_sep = Some(sep.clone());
        }
        if let Some(mode) = mode {
            if mode.name() != entry.mode.name() {
                entry.mode = mode;
                entry.reset_mode_state();
            }
        }
        reestimate(ed, entry);
        ed.display.reset();
        ed.input.reset(entry);
        let depth = ed.options.undo_depth;
        let history = entry.history;
        if let Some(history) = self.histories.get_mut(history) {
            history.set_undo_depth(depth);
        }
        Ok(())
    }

    /// Show `doc` in `editor` instead of its current document. Returns the
    /// document that was shown before.
    pub fn swap_doc(&mut self, editor: EditorId, doc: DocId) -> Result<DocId> {
        let old = self.editor_doc(editor)?;
        if old == doc {
            return Ok(old);
        }
        if self.doc(doc)?.editor.is_some() {
            return Err(Error::DocumentAlreadyAttached(doc));
        }
        self.run_op(Some(editor), |engine| {
            if let Some(entry) = engine.docs.get_mut(old) {
                entry.editor = None;
            }
            engine.attach_doc(editor, doc)?;
            if let Some(ed) = engine.editors.get_mut(editor) {
                let op = ed.op();
                op.force_update = true;
                op.events.push(EditorEvent::SwapDoc { old });
            }
            engine.scheduler.cancel(TaskKind::Highlight(editor));
            engine.start_worker(editor, WORKER_RESTART_DELAY);
            tracing::debug!(?editor, ?old, new = ?doc, "document swapped");
            Ok(old)
        })
    }

    /// Unmount the host and detach the document. Pending work for the
    /// editor is dropped.
    pub fn destroy_editor(&mut self, editor: EditorId) -> Result<()> {
        let mut ed = self
            .editors
            .remove(editor)
            .ok_or(Error::UnknownEditor(editor))?;
        ed.host.unmount();
        if let Some(entry) = self.docs.get_mut(ed.doc) {
            entry.editor = None;
        }
        self.scheduler.cancel(TaskKind::Highlight(editor));
        self.scheduler.deferred.retain(|(e, _)| *e != editor);
        tracing::debug!(?editor, doc = ?ed.doc, "editor destroyed");
        Ok(())
    }

    pub fn focus(&mut self, editor: EditorId) -> Result<()> {
        self.set_focused(editor, true)
    }

    pub fn blur(&mut self, editor: EditorId) -> Result<()> {
        self.set_focused(editor, false)
    }

    fn set_focused(&mut self, editor: EditorId, focused: bool) -> Result<()> {
        self.run_op(Some(editor), |engine| {
            let (ed, doc) = engine.editor_and_doc(editor)?;
            if ed.focused == focused {
                return Ok(());
            }
            if focused && ed.options.read_only == ReadOnly::NoCursor {
                return Ok(());
            }
            ed.focused = focused;
            ed.input.reset(doc);
            let op = ed.op();
            op.selection_changed = true;
            op.events.push(if focused {
                EditorEvent::Focus
            } else {
                EditorEvent::Blur
            });
            Ok(())
        })
    }

    /// Change one option of `editor` at runtime.
    pub fn set_option(&mut self, editor: EditorId, option: EditorOption) -> Result<()> {
        self.run_op(Some(editor), |engine| engine.set_option_in_op(editor, option))
    }

    fn set_option_in_op(&mut self, editor: EditorId, option: EditorOption) -> Result<()> {
        let name = option.name();
        let line_sep = match &option {
            EditorOption::LineSeparator(sep) => Some(sep.clone()),
            _ => None,
        };
        let mode = match &option {
            EditorOption::Mode(name) => Some(self.modes.by_name(name)),
            _ => None,
        };
        let (ed, doc) = self.editor_and_doc(editor)?;
        let effect = ed.options.apply(option);
        tracing::debug!(?editor, option = name, ?effect, "option set");
        let mut restart_worker = false;
        match effect {
            OptionEffect::None => {}
            OptionEffect::Redraw => {
                ed.display.reset();
                ed.op().force_update = true;
                if ed.options.read_only == ReadOnly::NoCursor && ed.focused {
                    ed.focused = false;
                    ed.op().events.push(EditorEvent::Blur);
                }
            }
            OptionEffect::Relayout => {
                reestimate(ed, doc);
                ed.display.reset();
                ed.op().force_update = true;
            }
            OptionEffect::Restyle => {
                doc.reset_mode_state();
                ed.display.reset();
                ed.op().force_update = true;
                restart_worker = true;
            }
            OptionEffect::Direction => {
                doc.set_direction(ed.options.direction);
                ed.display.reset();
                ed.op().force_update = true;
            }
            OptionEffect::History => {
                let depth = ed.options.undo_depth;
                let history = doc.history;
                if let Some(history) = self.histories.get_mut(history) {
                    history.set_undo_depth(depth);
                }
            }
            OptionEffect::Input => {
                ed.input = input::for_style(ed.options.input_style);
                ed.input.reset(doc);
            }
            OptionEffect::Mode => match mode.flatten() {
                Some(mode) => {
                    doc.mode = mode;
                    doc.reset_mode_state();
                    ed.display.reset();
                    ed.op().force_update = true;
                    restart_worker = true;
                }
                None => tracing::warn!(?editor, "unknown mode, keeping the document's"),
            },
        }
        let (ed, doc) = self.editor_and_doc(editor)?;
        if let Some(sep) = line_sep {
            doc.line_sep = sep;
        }
        ed.op().events.push(EditorEvent::OptionChange(name));
        if restart_worker {
            self.start_worker(editor, WORKER_RESTART_DELAY);
        }
        Ok(())
    }

    /// Resize the host's visible area.
    pub fn set_size(&mut self, editor: EditorId, width: f64, height: f64) -> Result<()> {
        self.run_op(Some(editor), |engine| {
            let (ed, doc) = engine.editor_and_doc(editor)?;
            ed.host.resize(width, height);
            ed.display.measure_cache.clear();
            if ed.options.line_wrapping {
                reestimate(ed, doc);
                ed.display.reset();
            }
            let op = ed.op();
            op.view_changed = true;
            op.events.push(EditorEvent::Refresh);
            Ok(())
        })
    }

    /// Drop every cached view and measurement and redraw.
    pub fn refresh(&mut self, editor: EditorId) -> Result<()> {
        self.run_op(Some(editor), |engine| {
            let (ed, doc) = engine.editor_and_doc(editor)?;
            reestimate(ed, doc);
            ed.display.reset();
            let op = ed.op();
            op.force_update = true;
            op.events.push(EditorEvent::Refresh);
            Ok(())
        })
    }

    /// Scroll to the given offsets. `None` keeps the current one.
    pub fn scroll_to(&mut self, editor: EditorId, x: Option<f64>, y: Option<f64>) -> Result<()> {
        self.run_op(Some(editor), |engine| {
            let op = engine.editor_mut(editor)?.op();
            if let Some(x) = x {
                op.scroll_left = Some(x);
            }
            if let Some(y) = y {
                op.scroll_top = Some(y);
            }
            Ok(())
        })
    }

    /// Scroll so `target` is visible with `margin` pixels around it.
    pub fn scroll_into_view(&mut self, editor: EditorId, target: ScrollTarget, margin: f64) -> Result<()> {
        self.run_op(Some(editor), |engine| {
            engine.editor_mut(editor)?.op().scroll_to = Some(ScrollRequest { target, margin });
            Ok(())
        })
    }

    pub fn get_scroll_info(&self, editor: EditorId) -> Result<ScrollInfo> {
        let ed = self.editor(editor)?;
        let doc = self.doc(ed.doc)?;
        let geometry = ed.host.geometry();
        Ok(ScrollInfo {
            left: doc.scroll_left,
            top: doc.scroll_top,
            width: ed.display.scroll_width.max(geometry.client_width),
            height: doc.height(),
            client_width: geometry.client_width,
            client_height: geometry.client_height,
        })
    }

    /// Line range currently rendered.
    pub fn get_viewport(&self, editor: EditorId) -> Result<Viewport> {
        Ok(self.editor(editor)?.display.viewport())
    }

    pub fn default_text_height(&self, editor: EditorId) -> Result<f64> {
        Ok(self.editor(editor)?.host.text_height())
    }

    pub fn default_char_width(&self, editor: EditorId) -> Result<f64> {
        Ok(self.editor(editor)?.host.char_width())
    }

    /// Cursor rect at `pos`, or at the primary head.
    pub fn cursor_coords(&mut self, editor: EditorId, pos: Option<Pos>) -> Result<Rect> {
        let (ed, doc) = self.editor_and_doc(editor)?;
        let pos = pos.unwrap_or_else(|| doc.sel.primary().head);
        measure::cursor_coords(ed, doc, pos)
    }

    /// Box of the char after `pos`.
    pub fn char_coords(&mut self, editor: EditorId, pos: Pos) -> Result<Rect> {
        let (ed, doc) = self.editor_and_doc(editor)?;
        measure::char_coords(ed, doc, pos)
    }

    /// Position nearest to `(x, y)` in document coordinates.
    pub fn coords_char(&mut self, editor: EditorId, x: f64, y: f64) -> Result<CoordsPos> {
        let (ed, doc) = self.editor_and_doc(editor)?;
        measure::coords_char(ed, doc, x, y)
    }

    pub fn line_at_height(&self, editor: EditorId, height: f64) -> Result<usize> {
        Ok(self.doc(self.editor_doc(editor)?)?.line_at_height(height))
    }

    pub fn height_at_line(&self, editor: EditorId, line: usize) -> Result<f64> {
        let doc = self.doc(self.editor_doc(editor)?)?;
        Ok(doc.height_at_line(doc.clip_line(line)))
    }

    /// Register a listener for the events of `editor`.
    pub fn on(
        &mut self,
        editor: EditorId,
        listener: impl FnMut(&EditorEvent, &mut HookActions) + 'static,
    ) -> Result<()> {
        self.editor_mut(editor)?.listeners.push(Box::new(listener));
        Ok(())
    }

    /// Token at `pos`. `precise` tokenizes from the last checkpoint instead
    /// of approximating far from the frontier.
    pub fn get_token_at(&mut self, doc: DocId, pos: Pos, precise: bool) -> Result<Token> {
        let params = self.params_for(doc);
        self.doc_mut(doc)?.token_at(pos, precise, &params)
    }

    pub fn get_line_tokens(&mut self, doc: DocId, line: usize, precise: bool) -> Result<Vec<Token>> {
        let params = self.params_for(doc);
        self.doc_mut(doc)?.line_tokens(line, precise, &params)
    }

    pub fn get_token_type_at(&mut self, doc: DocId, pos: Pos) -> Result<Option<TokenKind>> {
        let params = self.params_for(doc);
        self.doc_mut(doc)?.token_type_at(pos, &params)
    }

    /// Mode state after `line`.
    pub fn get_state_after(&mut self, doc: DocId, line: usize, precise: bool) -> Result<SavedState> {
        let params = self.params_for(doc);
        self.doc_mut(doc)?.state_after(line, precise, &params)
    }

    /// Name of the nested mode at `pos`, for multiplexing modes.
    pub fn get_inner_mode_at(&mut self, doc: DocId, pos: Pos) -> Result<Option<String>> {
        let params = self.params_for(doc);
        self.doc_mut(doc)?.inner_mode_at(pos, &params)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::options::DocOptions;
    use crate::view::HeadlessHost;

    fn recorder(engine: &mut Engine, editor: EditorId) -> Rc<RefCell<Vec<EditorEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        engine
            .on(editor, move |event, _| sink.borrow_mut().push(event.clone()))
            .unwrap();
        events
    }

    #[test]
    fn create_editor_renders_and_rejects_second_attach() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("one\ntwo\nthree", DocOptions::default());
        let host = HeadlessHost::new(80.0, 10.0);
        let state = host.handle();
        let editor = engine
            .create_editor(doc, EditorOptions::default(), Box::new(host))
            .unwrap();
        assert!(state.borrow().mounted);
        assert_eq!(state.borrow().lines.len(), 3);
        assert_eq!(engine.doc(doc).unwrap().editor(), Some(editor));

        let err = engine
            .create_editor(doc, EditorOptions::default(), Box::new(HeadlessHost::new(10.0, 10.0)))
            .unwrap_err();
        assert_eq!(err, Error::DocumentAlreadyAttached(doc));
    }

    #[test]
    fn swap_doc_reports_old_document() {
        let mut engine = Engine::new();
        let a = engine.create_doc("a", DocOptions::default());
        let b = engine.create_doc("b1\nb2", DocOptions::default());
        let host = HeadlessHost::new(80.0, 10.0);
        let state = host.handle();
        let editor = engine
            .create_editor(a, EditorOptions::default(), Box::new(host))
            .unwrap();
        let events = recorder(&mut engine, editor);
        assert_eq!(engine.swap_doc(editor, b).unwrap(), a);
        assert_eq!(engine.doc(a).unwrap().editor(), None);
        assert_eq!(engine.editor_doc(editor).unwrap(), b);
        assert_eq!(state.borrow().lines.len(), 2);
        assert!(events.borrow().contains(&EditorEvent::SwapDoc { old: a }));
    }

    #[test]
    fn destroy_editor_unmounts_and_frees_document() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("x", DocOptions::default());
        let host = HeadlessHost::new(80.0, 10.0);
        let state = host.handle();
        let editor = engine
            .create_editor(doc, EditorOptions::default(), Box::new(host))
            .unwrap();
        engine.destroy_editor(editor).unwrap();
        assert!(!state.borrow().mounted);
        assert_eq!(engine.doc(doc).unwrap().editor(), None);
        assert!(engine.next_deadline().is_none());
        assert_eq!(engine.destroy_editor(editor), Err(Error::UnknownEditor(editor)));
        engine.remove_doc(doc).unwrap();
    }

    #[test]
    fn set_option_emits_option_change() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("\tx", DocOptions::default());
        let editor = engine
            .create_editor(doc, EditorOptions::default(), Box::new(HeadlessHost::new(80.0, 10.0)))
            .unwrap();
        let events = recorder(&mut engine, editor);
        engine.set_option(editor, EditorOption::TabSize(8)).unwrap();
        assert_eq!(engine.editor(editor).unwrap().options().tab_size, 8);
        assert!(events.borrow().contains(&EditorEvent::OptionChange("tabSize")));

        engine
            .set_option(editor, EditorOption::LineSeparator(Some("\r\n".into())))
            .unwrap();
        assert_eq!(engine.doc(doc).unwrap().line_separator(), "\r\n");
    }

    #[test]
    fn focus_and_blur_emit_once() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("", DocOptions::default());
        let editor = engine
            .create_editor(doc, EditorOptions::default(), Box::new(HeadlessHost::new(80.0, 10.0)))
            .unwrap();
        let events = recorder(&mut engine, editor);
        engine.focus(editor).unwrap();
        engine.focus(editor).unwrap();
        engine.blur(editor).unwrap();
        let seen: Vec<_> = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, EditorEvent::Focus | EditorEvent::Blur))
            .cloned()
            .collect();
        assert_eq!(seen, vec![EditorEvent::Focus, EditorEvent::Blur]);
        assert!(!engine.editor(editor).unwrap().is_focused());
    }

    #[test]
    fn scroll_into_view_moves_viewport() {
        let mut engine = Engine::new();
        let text: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        let doc = engine.create_doc(&text.join("\n"), DocOptions::default());
        let editor = engine
            .create_editor(
                doc,
                EditorOptions::default().with_viewport_margin(2),
                Box::new(HeadlessHost::new(80.0, 10.0)),
            )
            .unwrap();
        assert_eq!(engine.get_viewport(editor).unwrap().from, 0);
        engine
            .scroll_into_view(editor, ScrollTarget::Pos(Pos::new(150, 0)), 0.0)
            .unwrap();
        let info = engine.get_scroll_info(editor).unwrap();
        assert!(info.top > 100.0);
        let viewport = engine.get_viewport(editor).unwrap();
        assert!(viewport.from <= 150 && 150 < viewport.to);
        assert_eq!(engine.line_at_height(editor, 150.5).unwrap(), 150);
        assert_eq!(engine.height_at_line(editor, 150).unwrap(), 150.0);
    }

    #[test]
    fn coords_round_trip_through_host_metrics() {
        let mut engine = Engine::new();
        let doc = engine.create_doc("hello\nworld", DocOptions::default());
        let editor = engine
            .create_editor(
                doc,
                EditorOptions::default(),
                Box::new(HeadlessHost::new(80.0, 20.0).with_metrics(2.0, 4.0)),
            )
            .unwrap();
        assert_eq!(engine.default_char_width(editor).unwrap(), 2.0);
        assert_eq!(engine.default_text_height(editor).unwrap(), 4.0);
        let rect = engine.cursor_coords(editor, Some(Pos::new(1, 2))).unwrap();
        assert_eq!(rect.left, 4.0);
        assert_eq!(rect.top, 4.0);
        let hit = engine.coords_char(editor, 4.5, 5.0).unwrap();
        assert_eq!(hit.pos, Pos::new(1, 2));
        assert!(!hit.outside);
    }
}
