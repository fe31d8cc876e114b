//! Capture through a plain text field.

use super::{Captured, InputAdapter, InputEdit};
use crate::doc::Document;
use crate::options::InputStyle;

/// Fields longer than this are cleared after each poll.
const MAX_FIELD_CHARS: usize = 1000;

/// Diffs the field's value against the value seen on the previous poll.
///
/// After a reset the field holds the selected text (or nothing), so typing
/// over a selection shows up as text with no common prefix and replaces it.
#[derive(Debug, Default)]
pub struct PlainFieldInput {
    prev: String,
    primed: String,
    pending: Option<String>,
}

impl PlainFieldInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value the host should put in the field after a reset.
    #[must_use]
    pub fn field_value(&self) -> &str {
        &self.primed
    }
}

impl InputAdapter for PlainFieldInput {
    fn style(&self) -> InputStyle {
        InputStyle::PlainField
    }

    fn capture(&mut self, captured: Captured) -> bool {
        match captured {
            Captured::Field(value) => {
                self.pending = Some(value);
                true
            }
            Captured::Region { .. } => false,
        }
    }

    fn poll(&mut self, _doc: &Document) -> Option<InputEdit> {
        let text = self.pending.take()?;
        if text == self.prev {
            return None;
        }
        let same = text
            .chars()
            .zip(self.prev.chars())
            .take_while(|(a, b)| a == b)
            .count();
        let inserted: String = text.chars().skip(same).collect();
        let deleted = self.prev.chars().count() - same;
        self.prev = if text.chars().count() > MAX_FIELD_CHARS {
            String::new()
        } else {
            text
        };
        Some(InputEdit::Typed {
            text: inserted,
            deleted,
        })
    }

    fn reset(&mut self, doc: &Document) {
        self.pending = None;
        self.prev.clear();
        self.primed = if doc.something_selected() {
            doc.get_selection(None)
        } else {
            String::new()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, SelectOptions};
    use crate::options::DocOptions;
    use crate::pos::Pos;

    fn engine(text: &str) -> (Engine, crate::doc::DocId) {
        let mut engine = Engine::new();
        let doc = engine.create_doc(text, DocOptions::default());
        (engine, doc)
    }

    #[test]
    fn reports_appended_text() {
        let (engine, id) = engine("");
        let doc = engine.doc(id).unwrap();
        let mut input = PlainFieldInput::new();
        input.capture(Captured::Field("ab".to_string()));
        assert_eq!(
            input.poll(doc),
            Some(InputEdit::Typed {
                text: "ab".to_string(),
                deleted: 0
            })
        );
        input.capture(Captured::Field("abc".to_string()));
        assert_eq!(
            input.poll(doc),
            Some(InputEdit::Typed {
                text: "c".to_string(),
                deleted: 0
            })
        );
    }

    #[test]
    fn reports_deleted_chars_before_cursor() {
        let (engine, id) = engine("");
        let doc = engine.doc(id).unwrap();
        let mut input = PlainFieldInput::new();
        input.capture(Captured::Field("héllo".to_string()));
        input.poll(doc);
        input.capture(Captured::Field("hé".to_string()));
        assert_eq!(
            input.poll(doc),
            Some(InputEdit::Typed {
                text: String::new(),
                deleted: 3
            })
        );
        input.capture(Captured::Field("hx".to_string()));
        assert_eq!(
            input.poll(doc),
            Some(InputEdit::Typed {
                text: "x".to_string(),
                deleted: 1
            })
        );
    }

    #[test]
    fn unchanged_value_is_not_an_edit() {
        let (engine, id) = engine("");
        let doc = engine.doc(id).unwrap();
        let mut input = PlainFieldInput::new();
        assert_eq!(input.poll(doc), None);
        input.capture(Captured::Field(String::new()));
        assert_eq!(input.poll(doc), None);
    }

    #[test]
    fn reset_primes_field_with_selection() {
        let (mut engine, id) = engine("select me");
        engine
            .set_selection(id, Pos::new(0, 0), Some(Pos::new(0, 6)), SelectOptions::default())
            .unwrap();
        let mut input = PlainFieldInput::new();
        input.reset(engine.doc(id).unwrap());
        assert_eq!(input.field_value(), "select");
    }

    #[test]
    fn reset_forgets_previous_value() {
        let (engine, id) = engine("");
        let doc = engine.doc(id).unwrap();
        let mut input = PlainFieldInput::new();
        input.capture(Captured::Field("abc".to_string()));
        input.poll(doc);
        input.reset(doc);
        assert_eq!(input.field_value(), "");
        input.capture(Captured::Field("abcd".to_string()));
        assert_eq!(
            input.poll(doc),
            Some(InputEdit::Typed {
                text: "abcd".to_string(),
                deleted: 0
            })
        );
    }
}
