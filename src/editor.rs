//! Per-editor state: options, host, rendered window, input and listeners.

use std::fmt;

use crate::doc::DocId;
use crate::events::Listener;
use crate::highlight::HighlightParams;
use crate::input::InputAdapter;
use crate::options::EditorOptions;
use crate::scheduler::Operation;
use crate::view::{Display, RenderHost};

crate::arena::arena_id!(
    /// Handle of an editor owned by an [`Engine`](crate::Engine).
    EditorId
);

/// An editor: one document shown through one render host.
pub struct Editor {
    pub(crate) doc: DocId,
    pub(crate) options: EditorOptions,
    pub(crate) host: Box<dyn RenderHost>,
    pub(crate) display: Display,
    pub(crate) input: Box<dyn InputAdapter>,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) cur_op: Option<Operation>,
    pub(crate) focused: bool,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("doc", &self.doc)
            .field("options", &self.options)
            .field("view_from", &self.display.view_from)
            .field("view_to", &self.display.view_to)
            .field("listeners", &self.listeners.len())
            .field("focused", &self.focused)
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub(crate) fn new(
        doc: DocId,
        options: EditorOptions,
        host: Box<dyn RenderHost>,
        input: Box<dyn InputAdapter>,
    ) -> Self {
        let display = Display {
            force_full: true,
            max_line_changed: true,
            ..Display::default()
        };
        Self {
            doc,
            options,
            host,
            display,
            input,
            listeners: Vec::new(),
            cur_op: None,
            focused: false,
        }
    }

    #[must_use]
    pub fn doc(&self) -> DocId {
        self.doc
    }

    #[must_use]
    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub(crate) fn highlight_params(&self) -> HighlightParams {
        HighlightParams {
            tab_size: self.options.tab_size,
            max_highlight_length: self.options.max_highlight_length,
            view: (self.display.view_from, self.display.view_to),
        }
    }

    /// The open operation. Engine paths open one before touching an editor;
    /// a missing one is logged and replaced by a detached operation.
    pub(crate) fn op(&mut self) -> &mut Operation {
        let doc = self.doc;
        self.cur_op.get_or_insert_with(|| {
            tracing::warn!(?doc, "editor touched outside an operation");
            Operation::new(0, 0.0, 0.0)
        })
    }
}
