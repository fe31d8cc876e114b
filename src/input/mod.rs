//! Text capture from the host.
//!
//! The host owns the native input element. It hands what it captured to
//! the editor's [`InputAdapter`], which turns it into an [`InputEdit`]
//! against the document when polled. Which adapter an editor uses is fixed
//! by [`InputStyle`] at construction and swapped when that option changes.

mod editable_region;
mod plain_field;

pub use editable_region::EditableRegionInput;
pub use plain_field::PlainFieldInput;

use crate::doc::{Document, Origin, Selection};
use crate::editor::EditorId;
use crate::engine::{Engine, ReplaceSelect, SelectOptions};
use crate::error::Result;
use crate::options::{InputStyle, ReadOnly};
use crate::pos::Pos;

/// Raw text captured by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Captured {
    /// Current value of a plain text field.
    Field(String),
    /// Current text of lines `[from, to)` of an editable region.
    Region { from: usize, to: usize, text: String },
}

/// An edit derived from captured input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEdit {
    /// `text` was typed at every cursor after deleting `deleted` chars
    /// before it.
    Typed { text: String, deleted: usize },
    /// `[from, to)` now holds `text`.
    Replace { from: Pos, to: Pos, text: String },
}

/// Capability contract of an input capture strategy.
pub trait InputAdapter {
    fn style(&self) -> InputStyle;

    /// Store captured text. Returns false when the capture does not fit
    /// this adapter.
    fn capture(&mut self, captured: Captured) -> bool;

    /// Diff pending captured text against what the adapter last saw.
    fn poll(&mut self, doc: &Document) -> Option<InputEdit>;

    /// Resynchronise with the document after the selection or text changed
    /// from elsewhere. Not called after the adapter's own edits.
    fn reset(&mut self, doc: &Document);
}

/// The adapter for `style`.
#[must_use]
pub fn for_style(style: InputStyle) -> Box<dyn InputAdapter> {
    match style {
        InputStyle::PlainField => Box::new(PlainFieldInput::new()),
        InputStyle::EditableRegion => Box::new(EditableRegionInput::new()),
    }
}

impl Engine {
    /// Hand captured text to the editor's adapter.
    pub fn capture_input(&mut self, editor: EditorId, captured: Captured) -> Result<bool> {
        Ok(self.editor_mut(editor)?.input.capture(captured))
    }

    /// Poll the editor's adapter and apply whatever edit it reports.
    /// Returns whether there was one.
    pub fn poll_input(&mut self, editor: EditorId) -> Result<bool> {
        let (ed, doc) = self.editor_and_doc(editor)?;
        let Some(edit) = ed.input.poll(doc) else {
            return Ok(false);
        };
        self.apply_input(editor, edit)?;
        Ok(true)
    }

    /// Apply an input edit to the editor's document as `+input`, or
    /// `+delete` when nothing is inserted. Dropped when the editor is
    /// read-only or the selection sits where editing is blocked.
    pub fn apply_input(&mut self, editor: EditorId, edit: InputEdit) -> Result<()> {
        let doc = self.editor_doc(editor)?;
        let read_only = self.editor(editor)?.options.read_only != ReadOnly::No;
        if read_only || self.doc(doc)?.cant_edit {
            tracing::debug!(?editor, "input dropped on read-only editor");
            let (ed, entry) = self.editor_and_doc(editor)?;
            ed.input.reset(entry);
            return Ok(());
        }

        self.run_op(Some(editor), |engine| {
            let typed = match edit {
                InputEdit::Typed { text, deleted } => {
                    let origin = input_origin(&text);
                    if deleted > 0 {
                        let widened = widen_cursors(engine.doc(doc)?, deleted);
                        engine.set_selection_no_undo(doc, widened, &SelectOptions::no_scroll())?;
                    }
                    engine.replace_selection(doc, &text, ReplaceSelect::End, Some(origin))?;
                    text
                }
                InputEdit::Replace { from, to, text } => {
                    let origin = input_origin(&text);
                    engine.replace_range(doc, &text, from, to, Some(origin))?;
                    text
                }
            };
            engine.electric_indent(doc, &typed)?;
            engine.ensure_cursor_visible(doc);
            Ok(())
        })
    }
}

fn input_origin(text: &str) -> Origin {
    if text.is_empty() {
        Origin::DELETE
    } else {
        Origin::INPUT
    }
}

/// Extend every empty range `deleted` chars back, without crossing its line
/// start.
fn widen_cursors(doc: &Document, deleted: usize) -> Selection {
    let ranges = doc
        .selection()
        .ranges()
        .iter()
        .map(|range| {
            if range.is_empty() {
                let head = range.head;
                let from = Pos::new(head.line, head.ch.saturating_sub(deleted));
                crate::doc::Range::new(from, head)
            } else {
                *range
            }
        })
        .collect();
    Selection::new(ranges, doc.selection().primary_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DocOptions, EditorOptions};
    use crate::view::HeadlessHost;

    fn setup(text: &str, options: EditorOptions) -> (Engine, crate::doc::DocId, EditorId) {
        let mut engine = Engine::new();
        let doc = engine.create_doc(text, DocOptions::default());
        let editor = engine
            .create_editor(doc, options, Box::new(HeadlessHost::new(80.0, 24.0)))
            .unwrap();
        (engine, doc, editor)
    }

    #[test]
    fn adapter_follows_input_style() {
        assert_eq!(for_style(InputStyle::PlainField).style(), InputStyle::PlainField);
        assert_eq!(
            for_style(InputStyle::EditableRegion).style(),
            InputStyle::EditableRegion
        );
    }

    #[test]
    fn typed_text_lands_at_every_cursor() {
        let (mut engine, doc, editor) = setup("ab\ncd", EditorOptions::default());
        engine.set_cursor(doc, Pos::new(0, 1), SelectOptions::default()).unwrap();
        engine.add_selection(doc, Pos::new(1, 1), None).unwrap();
        let edit = InputEdit::Typed {
            text: "X".to_string(),
            deleted: 0,
        };
        engine.apply_input(editor, edit).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "aXb\ncXd");
        let heads: Vec<Pos> = engine
            .doc(doc)
            .unwrap()
            .selection()
            .ranges()
            .iter()
            .map(|r| r.head)
            .collect();
        assert_eq!(heads, vec![Pos::new(0, 2), Pos::new(1, 2)]);
    }

    #[test]
    fn deletion_only_input_is_a_delete() {
        let (mut engine, doc, editor) = setup("hello", EditorOptions::default());
        engine.set_cursor(doc, Pos::new(0, 5), SelectOptions::default()).unwrap();
        let edit = InputEdit::Typed {
            text: String::new(),
            deleted: 2,
        };
        engine.apply_input(editor, edit).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "hel");
        engine.undo(doc).unwrap();
        assert_eq!(engine.doc(doc).unwrap().value(), "hello");
    }

    #[test]
    fn read_only_editor_drops_input() {
        let options = EditorOptions::default().with_read_only(ReadOnly::Yes);
        let (mut engine, doc, editor) = setup("abc", options);
        engine
            .capture_input(editor, Captured::Field("zz".to_string()))
            .unwrap();
        assert!(engine.poll_input(editor).unwrap());
        assert_eq!(engine.doc(doc).unwrap().value(), "abc");
        assert_eq!(engine.history_size(doc).unwrap(), (0, 0));
    }

    #[test]
    fn plain_field_capture_round_trip() {
        let (mut engine, doc, editor) = setup("", EditorOptions::default());
        assert!(engine.capture_input(editor, Captured::Field("hi".to_string())).unwrap());
        assert!(engine.poll_input(editor).unwrap());
        assert!(!engine.poll_input(editor).unwrap());
        assert_eq!(engine.doc(doc).unwrap().value(), "hi");
        assert!(
            !engine
                .capture_input(
                    editor,
                    Captured::Region {
                        from: 0,
                        to: 1,
                        text: String::new()
                    }
                )
                .unwrap()
        );
    }

    #[test]
    fn electric_chars_reindent() {
        let mut engine = Engine::new();
        let doc = engine.create_doc(
            "if (x) {\n    ",
            DocOptions::default().with_mode(std::sync::Arc::new(crate::highlight::CLike::c())),
        );
        let editor = engine
            .create_editor(doc, EditorOptions::default(), Box::new(HeadlessHost::new(80.0, 24.0)))
            .unwrap();
        engine.set_cursor(doc, Pos::new(1, 4), SelectOptions::default()).unwrap();
        engine
            .apply_input(
                editor,
                InputEdit::Typed {
                    text: "}".to_string(),
                    deleted: 0,
                },
            )
            .unwrap();
        assert_eq!(engine.doc(doc).unwrap().line(1), Some("}"));
    }
}
