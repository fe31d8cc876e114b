//! Text helpers shared by the document model, tokenizer and renderer.
//!
//! Columns everywhere in the engine are counted in Unicode scalar values
//! (`char`s). These helpers translate between char columns and byte offsets
//! and implement line splitting and tab-aware column counting.

pub mod bidi;
mod grapheme;
mod width;

pub use bidi::{
    BidiRun, Direction, bidi_ordering, iterate_bidi_sections, line_left, line_right,
    move_logically, move_visually,
};
pub use grapheme::{
    CharGroup, char_group, is_extending_char, is_word_char, next_cluster_boundary,
};
pub use width::{WidthMethod, char_advance};

/// Number of chars in `s`.
#[inline]
#[must_use]
pub fn char_len(s: &str) -> usize {
    if s.is_ascii() {
        s.len()
    } else {
        s.chars().count()
    }
}

/// Byte offset of char column `ch`, clamped to the string length.
#[inline]
#[must_use]
pub fn byte_of(s: &str, ch: usize) -> usize {
    if s.is_ascii() {
        return ch.min(s.len());
    }
    s.char_indices().nth(ch).map_or(s.len(), |(idx, _)| idx)
}

/// Slice `s` by char columns `[from, to)`, clamped.
#[must_use]
pub fn slice_chars(s: &str, from: usize, to: usize) -> &str {
    let start = byte_of(s, from);
    let end = byte_of(s, to.max(from));
    &s[start..end]
}

/// Char at column `ch`, if any.
#[must_use]
pub fn char_at(s: &str, ch: usize) -> Option<char> {
    if s.is_ascii() {
        return s.as_bytes().get(ch).map(|&b| b as char);
    }
    s.chars().nth(ch)
}

/// Split text on `\r\n`, `\r` or `\n`. Always yields at least one line.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\n' => lines.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    lines.push(current);
    lines
}

/// Split on an explicit separator, or on any line break when `sep` is `None`.
#[must_use]
pub fn split_lines_with(text: &str, sep: Option<&str>) -> Vec<String> {
    match sep {
        Some(sep) if !sep.is_empty() => text.split(sep).map(str::to_string).collect(),
        _ => split_lines(text),
    }
}

/// Visual column of char column `end` (or the line end) in `text`, expanding tabs.
#[must_use]
pub fn count_column(text: &str, end: Option<usize>, tab_size: usize) -> usize {
    let tab_size = tab_size.max(1);
    let mut col = 0;
    for (i, ch) in text.chars().enumerate() {
        if end.is_some_and(|end| i >= end) {
            break;
        }
        if ch == '\t' {
            col += tab_size - col % tab_size;
        } else {
            col += 1;
        }
    }
    col
}

/// Visual width of the leading whitespace of `text`, expanding tabs.
#[must_use]
pub fn indent_column(text: &str, tab_size: usize) -> usize {
    let ws = text.chars().take_while(|c| c.is_whitespace()).count();
    count_column(text, Some(ws), tab_size)
}

/// Char column at which visual column `goal` is reached, expanding tabs.
#[must_use]
pub fn find_column(text: &str, goal: usize, tab_size: usize) -> usize {
    let tab_size = tab_size.max(1);
    let mut col = 0;
    for (i, ch) in text.chars().enumerate() {
        let width = if ch == '\t' {
            tab_size - col % tab_size
        } else {
            1
        };
        if col + width > goal {
            return i;
        }
        col += width;
    }
    char_len(text)
}

/// Indentation string of `width` columns, using tabs when `use_tabs`.
#[must_use]
pub fn indentation_string(width: usize, tab_size: usize, use_tabs: bool) -> String {
    let mut out = String::new();
    let mut remaining = width;
    if use_tabs && tab_size > 0 {
        for _ in 0..width / tab_size {
            out.push('\t');
        }
        remaining = width % tab_size;
    }
    out.extend(std::iter::repeat_n(' ', remaining));
    out
}
