//! Capture through an editable region that mirrors a range of lines.

use super::{Captured, InputAdapter, InputEdit};
use crate::doc::Document;
use crate::options::InputStyle;
use crate::pos::Pos;
use crate::unicode::{char_len, slice_chars, split_lines};

/// Diffs the captured text of a line range against the document and reports
/// the smallest replacement that turns one into the other.
#[derive(Debug, Default)]
pub struct EditableRegionInput {
    pending: Option<(usize, usize, String)>,
}

impl EditableRegionInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputAdapter for EditableRegionInput {
    fn style(&self) -> InputStyle {
        InputStyle::EditableRegion
    }

    fn capture(&mut self, captured: Captured) -> bool {
        match captured {
            Captured::Region { from, to, text } => {
                self.pending = Some((from, to, text));
                true
            }
            Captured::Field(_) => false,
        }
    }

    fn poll(&mut self, doc: &Document) -> Option<InputEdit> {
        let (from, to, text) = self.pending.take()?;
        let first = doc.first_line();
        let end = first + doc.line_count();
        let from = from.clamp(first, end - 1);
        let to = to.clamp(from + 1, end);
        let old: Vec<String> = (from..to).map(|n| doc.text_of(n).to_owned()).collect();
        let new = split_lines(&text);
        diff_lines(from, old, new)
    }

    fn reset(&mut self, _doc: &Document) {
        self.pending = None;
    }
}

/// Trim common leading and trailing lines, then common chars at the edges
/// of what remains.
fn diff_lines(from: usize, mut old: Vec<String>, mut new: Vec<String>) -> Option<InputEdit> {
    if old == new {
        return None;
    }
    let mut from_line = from;
    while old.len() > 1 && new.len() > 1 && old.last() == new.last() {
        old.pop();
        new.pop();
    }
    while old.len() > 1 && new.len() > 1 && old.first() == new.first() {
        old.remove(0);
        new.remove(0);
        from_line += 1;
    }

    let (old_top, new_top) = (&old[0], &new[0]);
    let prefix = old_top
        .chars()
        .zip(new_top.chars())
        .take_while(|(a, b)| a == b)
        .count();

    let (old_bot, new_bot) = (&old[old.len() - 1], &new[new.len() - 1]);
    let old_room = char_len(old_bot) - if old.len() == 1 { prefix } else { 0 };
    let new_room = char_len(new_bot) - if new.len() == 1 { prefix } else { 0 };
    let suffix = old_bot
        .chars()
        .rev()
        .zip(new_bot.chars().rev())
        .take(old_room.min(new_room))
        .take_while(|(a, b)| a == b)
        .count();

    let to = Pos::new(from_line + old.len() - 1, char_len(old_bot) - suffix);
    let last = new.len() - 1;
    let bot_len = char_len(&new[last]);
    new[last] = slice_chars(&new[last], 0, bot_len - suffix).to_owned();
    let top_len = char_len(&new[0]);
    new[0] = slice_chars(&new[0], prefix, top_len).to_owned();

    Some(InputEdit::Replace {
        from: Pos::new(from_line, prefix),
        to,
        text: new.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::options::DocOptions;

    fn poll(text: &str, from: usize, to: usize, captured: &str) -> Option<InputEdit> {
        let mut engine = Engine::new();
        let id = engine.create_doc(text, DocOptions::default());
        let mut input = EditableRegionInput::new();
        input.capture(Captured::Region {
            from,
            to,
            text: captured.to_string(),
        });
        input.poll(engine.doc(id).unwrap())
    }

    #[test]
    fn single_char_insert() {
        assert_eq!(
            poll("hello\nworld", 0, 2, "helxlo\nworld"),
            Some(InputEdit::Replace {
                from: Pos::new(0, 3),
                to: Pos::new(0, 3),
                text: "x".to_string()
            })
        );
    }

    #[test]
    fn joined_lines_become_one_replacement() {
        assert_eq!(
            poll("a\nb\nc", 0, 3, "a\nbc"),
            Some(InputEdit::Replace {
                from: Pos::new(1, 1),
                to: Pos::new(2, 0),
                text: String::new()
            })
        );
    }

    #[test]
    fn repeated_chars_do_not_overlap_prefix_and_suffix() {
        assert_eq!(
            poll("aa", 0, 1, "aaa"),
            Some(InputEdit::Replace {
                from: Pos::new(0, 2),
                to: Pos::new(0, 2),
                text: "a".to_string()
            })
        );
    }

    #[test]
    fn identical_region_is_not_an_edit() {
        assert_eq!(poll("x\ny", 1, 2, "y"), None);
    }

    #[test]
    fn field_capture_is_refused() {
        let mut input = EditableRegionInput::new();
        assert!(!input.capture(Captured::Field("x".to_string())));
    }
}
