//! The engine: owner of documents, histories, editors and the scheduler.
//!
//! Every public mutating call is an `Engine` method taking ids. Calls made
//! outside an operation open one implicitly; see [`crate::scheduler`].

mod editor;
mod history;
mod linked;
mod markers;
mod pipeline;
mod selection;

use std::sync::Arc;
use std::time::Duration;

use crate::arena::Arena;
use crate::clock::{Clock, SystemClock};
use crate::doc::{
    BeforeChangeHook, BeforeSelectionHook, DocId, Document, History, HistoryId, SharedMarker,
    SharedMarkerId,
};
use crate::editor::{Editor, EditorId};
use crate::error::{Error, Result};
use crate::highlight::{HighlightParams, Mode, ModeRegistry};
use crate::options::DocOptions;
use crate::scheduler::{Operation, Scheduler};

pub use markers::{BookmarkOptions, LineClassTarget};
pub use selection::{ReplaceSelect, SelectOptions};
pub(crate) use selection::extend_range;

/// History event delay for documents without an editor.
const DEFAULT_EVENT_DELAY: Duration = Duration::from_millis(1250);

/// Owner of every document and editor.
pub struct Engine {
    pub(crate) docs: Arena<DocId, Document>,
    pub(crate) histories: Arena<HistoryId, History>,
    pub(crate) editors: Arena<EditorId, Editor>,
    pub(crate) shared_markers: Arena<SharedMarkerId, SharedMarker>,
    pub(crate) modes: ModeRegistry,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) scheduler: Scheduler,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("docs", &self.docs.len())
            .field("editors", &self.editors.len())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine on the system clock with the built-in modes registered.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            docs: Arena::new(),
            histories: Arena::new(),
            editors: Arena::new(),
            shared_markers: Arena::new(),
            modes: ModeRegistry::with_builtins(),
            clock: Box::new(clock),
            scheduler: Scheduler::default(),
        }
    }

    /// Make `mode` available to editors by name.
    pub fn register_mode(&mut self, mode: Arc<dyn Mode>) {
        self.modes.register(mode);
    }

    #[must_use]
    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    /// Create a document holding `text`.
    pub fn create_doc(&mut self, text: &str, options: DocOptions) -> DocId {
        let history = self.histories.insert(History::default());
        let doc = Document::new(text, options, history);
        let lines = doc.line_count();
        let id = self.docs.insert(doc);
        tracing::debug!(?id, lines, "document created");
        id
    }

    /// Drop a document. It must not be shown by an editor.
    pub fn remove_doc(&mut self, doc: DocId) -> Result<()> {
        let entry = self.doc(doc)?;
        if entry.editor.is_some() {
            return Err(Error::DocumentAlreadyAttached(doc));
        }
        let others: Vec<DocId> = entry.links.iter().map(|link| link.doc).collect();
        for other in others {
            self.unlink_doc(doc, other)?;
        }
        if let Some(removed) = self.docs.remove(doc) {
            let history_shared = self.docs.iter().any(|(_, d)| d.history == removed.history);
            if !history_shared {
                self.histories.remove(removed.history);
            }
        }
        tracing::debug!(?doc, "document removed");
        Ok(())
    }

    pub fn doc(&self, doc: DocId) -> Result<&Document> {
        self.docs.get(doc).ok_or(Error::UnknownDocument(doc))
    }

    pub(crate) fn doc_mut(&mut self, doc: DocId) -> Result<&mut Document> {
        self.docs.get_mut(doc).ok_or(Error::UnknownDocument(doc))
    }

    pub fn editor(&self, editor: EditorId) -> Result<&Editor> {
        self.editors.get(editor).ok_or(Error::UnknownEditor(editor))
    }

    pub(crate) fn editor_mut(&mut self, editor: EditorId) -> Result<&mut Editor> {
        self.editors
            .get_mut(editor)
            .ok_or(Error::UnknownEditor(editor))
    }

    /// Editor state and the document it shows.
    pub(crate) fn editor_and_doc(&mut self, editor: EditorId) -> Result<(&mut Editor, &mut Document)> {
        let ed = self
            .editors
            .get_mut(editor)
            .ok_or(Error::UnknownEditor(editor))?;
        let doc = self
            .docs
            .get_mut(ed.doc)
            .ok_or(Error::UnknownDocument(ed.doc))?;
        Ok((ed, doc))
    }

    /// Document shown by `editor`.
    pub fn editor_doc(&self, editor: EditorId) -> Result<DocId> {
        self.editor(editor).map(Editor::doc)
    }

    /// History used by `doc`, shared with linked documents that share undo.
    pub fn history(&self, doc: DocId) -> Result<&History> {
        let id = self.doc(doc)?.history;
        self.histories.get(id).ok_or(Error::UnknownDocument(doc))
    }

    pub(crate) fn history_mut(&mut self, doc: DocId) -> Result<&mut History> {
        let id = self.doc(doc)?.history;
        self.histories
            .get_mut(id)
            .ok_or(Error::UnknownDocument(doc))
    }

    /// Open the operation of the editor showing `doc`, if any, and return
    /// that editor.
    pub(crate) fn touch_doc(&mut self, doc: DocId) -> Option<EditorId> {
        let editor = self.docs.get(doc)?.editor?;
        self.start_editor_op(editor);
        Some(editor)
    }

    /// The open operation of the editor showing `doc`.
    pub(crate) fn doc_op(&mut self, doc: DocId) -> Option<&mut Operation> {
        let editor = self.touch_doc(doc)?;
        self.editors.get_mut(editor).map(Editor::op)
    }

    pub(crate) fn event_delay(&self, doc: DocId) -> Duration {
        self.docs
            .get(doc)
            .and_then(|d| d.editor)
            .and_then(|e| self.editors.get(e))
            .map_or(DEFAULT_EVENT_DELAY, |e| e.options.history_event_delay)
    }

    /// Highlighting parameters for `doc`: its editor's, or defaults.
    pub(crate) fn params_for(&self, doc: DocId) -> HighlightParams {
        self.docs
            .get(doc)
            .and_then(|d| d.editor)
            .and_then(|e| self.editors.get(e))
            .map_or_else(HighlightParams::default, Editor::highlight_params)
    }

    /// Register a hook run before every change to `doc`.
    pub fn on_before_change(&mut self, doc: DocId, hook: impl FnMut(&mut crate::doc::ChangeRequest) + 'static) -> Result<()> {
        let hook: BeforeChangeHook = Box::new(hook);
        self.doc_mut(doc)?.before_change.push(hook);
        Ok(())
    }

    /// Register a hook run before every selection update of `doc`.
    pub fn on_before_selection_change(
        &mut self,
        doc: DocId,
        hook: impl FnMut(&mut crate::doc::SelectionRequest) + 'static,
    ) -> Result<()> {
        let hook: BeforeSelectionHook = Box::new(hook);
        self.doc_mut(doc)?.before_selection_change.push(hook);
        Ok(())
    }

    /// Set the mode of `doc`, dropping every cached highlighting result.
    pub fn set_mode(&mut self, doc: DocId, mode: Arc<dyn Mode>) -> Result<()> {
        self.run_op(None, |engine| {
            let entry = engine.doc_mut(doc)?;
            tracing::debug!(?doc, mode = mode.name(), "mode set");
            entry.mode = mode;
            entry.reset_mode_state();
            if let Some(editor) = engine.touch_doc(doc) {
                if let Some(ed) = engine.editors.get_mut(editor) {
                    ed.display.reset();
                    ed.op().force_update = true;
                }
                engine.start_worker(editor, crate::scheduler::WORKER_RESTART_DELAY);
            }
            Ok(())
        })
    }
}
