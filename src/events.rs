//! Editor events and the actions listeners may request.
//!
//! Events raised while an operation is open are queued on it and delivered
//! once the display is up to date, each kind at most once per operation.
//! Listeners cannot touch the engine directly; they queue work on
//! [`HookActions`], which the scheduler runs in a fresh operation after all
//! notifications of the current one were delivered.

use std::fmt;

use crate::doc::{Change, DocId, MarkerId, Origin};
use crate::editor::EditorId;
use crate::engine::Engine;
use crate::error::Result;
use crate::pos::Pos;
use crate::view::ScrollTarget;

/// Notification delivered to editor listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// Every change applied to the editor's document during the operation.
    Changes(Vec<Change>),
    CursorActivity,
    Scroll,
    /// The rendered line range changed.
    ViewportChange { from: usize, to: usize },
    /// A display update ran.
    Update,
    Refresh,
    SwapDoc { old: DocId },
    OptionChange(&'static str),
    Focus,
    Blur,
    MarkerCleared(MarkerId),
    /// The marker's whole range was deleted; undo can bring it back.
    MarkerHidden(MarkerId),
    MarkerUnhidden(MarkerId),
}

impl EditorEvent {
    /// Events of the same kind coalesce within one operation. Marker and
    /// option events coalesce only with identical ones.
    fn coalesces_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::OptionChange(_), _)
            | (Self::MarkerCleared(_), _)
            | (Self::MarkerHidden(_), _)
            | (Self::MarkerUnhidden(_), _) => self == other,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// Work a listener asks the engine to perform after notifications finish.
pub type Deferred = Box<dyn FnOnce(&mut Engine, EditorId) -> Result<()>>;

/// Editor listener.
pub type Listener = Box<dyn FnMut(&EditorEvent, &mut HookActions)>;

/// Requests collected from listeners during one round of notifications.
#[derive(Default)]
pub struct HookActions {
    pub(crate) deferred: Vec<Deferred>,
}

impl fmt::Debug for HookActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookActions")
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl HookActions {
    /// Run `f` in a new operation on the notifying editor.
    pub fn defer(&mut self, f: impl FnOnce(&mut Engine, EditorId) -> Result<()> + 'static) {
        self.deferred.push(Box::new(f));
    }

    /// Replace `[from, to]` in the editor's document.
    pub fn replace_range(&mut self, text: impl Into<String>, from: Pos, to: Pos, origin: Option<Origin>) {
        let text = text.into();
        self.defer(move |engine, editor| {
            let doc = engine.editor_doc(editor)?;
            engine.replace_range(doc, &text, from, to, origin)
        });
    }

    pub fn set_cursor(&mut self, pos: Pos) {
        self.defer(move |engine, editor| {
            let doc = engine.editor_doc(editor)?;
            engine.set_cursor(doc, pos, crate::SelectOptions::default())
        });
    }

    pub fn scroll_into_view(&mut self, target: ScrollTarget, margin: f64) {
        self.defer(move |engine, editor| engine.scroll_into_view(editor, target, margin));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }
}

/// Events queued on an open operation.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    changes: Vec<Change>,
    cursor_activity: bool,
    other: Vec<EditorEvent>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::Changes(changes) => self.changes.extend(changes),
            EditorEvent::CursorActivity => self.cursor_activity = true,
            EditorEvent::ViewportChange { .. } => {
                self.other.retain(|e| !e.coalesces_with(&event));
                self.other.push(event);
            }
            event => {
                if !self.other.iter().any(|e| e.coalesces_with(&event)) {
                    self.other.push(event);
                }
            }
        }
    }

    pub(crate) fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.cursor_activity && self.other.is_empty()
    }

    /// Final delivery order: changes, cursor activity, then the rest in the
    /// order they were raised.
    pub(crate) fn drain(&mut self) -> Vec<EditorEvent> {
        let mut out = Vec::with_capacity(self.other.len() + 2);
        if !self.changes.is_empty() {
            out.push(EditorEvent::Changes(std::mem::take(&mut self.changes)));
        }
        if std::mem::take(&mut self.cursor_activity) {
            out.push(EditorEvent::CursorActivity);
        }
        out.append(&mut self.other);
        out
    }
}
