//! Document lines and their cached derived state.

use crate::doc::line_store::NodeId;
use crate::doc::marker::MarkedSpan;
use crate::highlight::{SavedState, TokenKind};
use crate::unicode::{BidiRun, Direction, char_len};

crate::arena::arena_id!(
    /// Stable handle of a line. Survives edits that keep the line in place.
    LineId
);

/// A run of text sharing one token style, ending at char column `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleRun {
    pub end: usize,
    pub style: Option<TokenKind>,
}

/// Cached highlighting result for a line, tagged with the mode generation it
/// was computed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineStyles {
    pub mode_gen: u64,
    pub runs: Vec<StyleRun>,
}

#[derive(Debug)]
pub struct Line {
    pub(crate) text: String,
    pub(crate) height: f64,
    pub(crate) marked_spans: Vec<MarkedSpan>,
    pub(crate) styles: Option<LineStyles>,
    pub(crate) order: Option<(Direction, Vec<BidiRun>)>,
    pub(crate) state_after: Option<SavedState>,
    pub(crate) parent: Option<NodeId>,
    /// Extra class for the line's text element.
    pub(crate) text_class: Option<String>,
    /// Extra class for the line's background element.
    pub(crate) bg_class: Option<String>,
}

impl Line {
    #[must_use]
    pub fn new(text: String, height: f64) -> Self {
        Self {
            text,
            height,
            marked_spans: Vec::new(),
            styles: None,
            order: None,
            state_after: None,
            parent: None,
            text_class: None,
            bg_class: None,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[must_use]
    pub fn len_chars(&self) -> usize {
        char_len(&self.text)
    }

    #[must_use]
    pub fn marked_spans(&self) -> &[MarkedSpan] {
        &self.marked_spans
    }

    #[must_use]
    pub fn styles(&self) -> Option<&LineStyles> {
        self.styles.as_ref()
    }

    #[must_use]
    pub fn text_class(&self) -> Option<&str> {
        self.text_class.as_deref()
    }

    #[must_use]
    pub fn bg_class(&self) -> Option<&str> {
        self.bg_class.as_deref()
    }

    /// Replace the text, dropping every cache derived from it.
    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
        self.styles = None;
        self.order = None;
        self.state_after = None;
    }

    /// Bidi runs for this line under `direction`, computed on first use.
    pub(crate) fn order(&mut self, direction: Direction) -> &[BidiRun] {
        let stale = self.order.as_ref().is_none_or(|(dir, _)| *dir != direction);
        if stale {
            let runs = crate::unicode::bidi_ordering(&self.text, direction);
            self.order = Some((direction, runs));
        }
        self.order.as_ref().map_or(&[], |(_, runs)| runs.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_text_drops_caches() {
        let mut line = Line::new("abc".to_string(), 1.0);
        let _ = line.order(Direction::Ltr);
        line.styles = Some(LineStyles {
            mode_gen: 1,
            runs: vec![StyleRun { end: 3, style: None }],
        });
        line.set_text("xyz".to_string());
        assert!(line.styles.is_none());
        assert!(line.order.is_none());
    }

    #[test]
    fn order_is_recomputed_for_new_direction() {
        let mut line = Line::new("abc".to_string(), 1.0);
        assert_eq!(line.order(Direction::Ltr)[0].level, 0);
        let rtl = line.order(Direction::Rtl).to_vec();
        assert_eq!(rtl, vec![BidiRun::new(0, 0, 3)]);
        assert_eq!(line.order.as_ref().map(|(d, _)| *d), Some(Direction::Rtl));
    }
}
