//! Rendered form of one visual line.
//!
//! A [`LineView`] is the list of [`Span`]s a host draws for a visual line:
//! styled text pieces, tabs, special characters and widgets, in visual
//! order. Collapsed ranges are skipped (or replaced by their widget), so a
//! single view can cover several physical lines.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::doc::{Document, LineId, MarkerId, MarkerKind, StyleRun, Widget};
use crate::error::Result;
use crate::highlight::{HighlightParams, TokenKind};
use crate::pos::Pos;
use crate::unicode::{char_len, iterate_bidi_sections, slice_chars};

bitflags! {
    /// What about a rendered line needs rebuilding.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct ChangeFlags: u8 {
        /// Text or token styles changed.
        const TEXT        = 0x01;
        /// Line classes changed.
        const CLASS       = 0x02;
        /// Widgets changed.
        const WIDGET      = 0x04;
        /// The line moved to a different number.
        const LINE_NUMBER = 0x08;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpanKind {
    Text,
    /// A tab, `width` columns wide.
    Tab { width: usize },
    /// A control character drawn as a placeholder box.
    Special { code: u32 },
    /// A widget standing in for `[span.line:span.from, end]` or a bookmark.
    Widget {
        marker: MarkerId,
        widget: Widget,
        end: Pos,
    },
    /// Zero-width element keeping an empty line measurable.
    Placeholder,
}

/// One drawable piece of a line.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub text: String,
    /// Space-separated class names.
    pub classes: Option<String>,
    pub css: Option<String>,
    pub kind: SpanKind,
    /// Laid out right-to-left.
    pub rtl: bool,
    /// Physical line the text comes from.
    pub line: usize,
    /// Char columns `[from, to)` of the text on `line`.
    pub from: usize,
    pub to: usize,
}

impl Span {
    #[must_use]
    pub fn text(text: impl Into<String>, line: usize, from: usize, classes: Option<String>) -> Self {
        let text = text.into();
        let to = from + char_len(&text);
        Self {
            text,
            classes,
            css: None,
            kind: SpanKind::Text,
            rtl: false,
            line,
            from,
            to,
        }
    }

    /// Number of layout boxes a host produces for this span.
    #[must_use]
    pub fn box_count(&self) -> usize {
        match self.kind {
            SpanKind::Text => self.to - self.from,
            _ => 1,
        }
    }

    #[must_use]
    pub fn is_widget(&self) -> bool {
        matches!(self.kind, SpanKind::Widget { .. })
    }
}

/// Rendered visual line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineView {
    /// First physical line of the visual line.
    pub line: usize,
    /// Physical lines covered, including lines merged by collapsed ranges.
    pub lines: usize,
    pub text_class: Option<String>,
    pub bg_class: Option<String>,
    pub spans: Vec<Span>,
}

impl LineView {
    /// Plain text as drawn, widgets excluded.
    #[must_use]
    pub fn display_text(&self) -> String {
        self.spans
            .iter()
            .filter(|span| !span.is_widget())
            .map(|span| span.text.as_str())
            .collect()
    }
}

/// Token kind to class string, built once per kind.
#[derive(Debug, Default)]
pub(crate) struct StyleCache {
    classes: HashMap<TokenKind, String>,
}

impl StyleCache {
    pub(crate) fn class_for(&mut self, kind: TokenKind) -> &str {
        self.classes
            .entry(kind)
            .or_insert_with(|| format!("cm-{}", kind.class_name()))
    }
}

/// Marker decoration applying to a column range of one line.
struct Decoration {
    from: usize,
    to: usize,
    classes: Vec<String>,
    css: Option<String>,
}

fn decorations(doc: &Document, id: LineId, len: usize) -> Vec<Decoration> {
    let mut out = Vec::new();
    for span in doc.line_ref(id).marked_spans() {
        let Some(marker) = doc.marker(span.marker) else {
            continue;
        };
        let opts = marker.options();
        if opts.collapsed || !opts.is_styling() {
            continue;
        }
        let from = span.from.unwrap_or(0);
        let to = span.to.unwrap_or(len);
        if from >= to {
            continue;
        }
        let mut classes = Vec::new();
        classes.extend(opts.class_name.iter().cloned());
        out.push(Decoration {
            from,
            to,
            classes,
            css: opts.css.clone(),
        });
        if span.from.is_some() {
            if let Some(start) = &opts.start_style {
                out.push(Decoration {
                    from,
                    to: from + 1,
                    classes: vec![start.clone()],
                    css: None,
                });
            }
        }
        if span.to.is_some() {
            if let Some(end) = &opts.end_style {
                out.push(Decoration {
                    from: to - 1,
                    to,
                    classes: vec![end.clone()],
                    css: None,
                });
            }
        }
    }
    out
}

/// What interrupts the text of a visual line.
enum Break {
    Collapsed {
        marker: MarkerId,
        from: usize,
        to: Option<usize>,
    },
    Bookmark {
        marker: MarkerId,
        at: usize,
    },
}

impl Break {
    fn at(&self) -> usize {
        match self {
            Self::Collapsed { from, .. } => *from,
            Self::Bookmark { at, .. } => *at,
        }
    }

    fn marker(&self) -> MarkerId {
        match self {
            Self::Collapsed { marker, .. } | Self::Bookmark { marker, .. } => *marker,
        }
    }
}

fn next_break(doc: &Document, id: LineId, ch: usize, done: &[MarkerId]) -> Option<Break> {
    let mut best: Option<Break> = None;
    for span in doc.line_ref(id).marked_spans() {
        if done.contains(&span.marker) {
            continue;
        }
        let Some(marker) = doc.marker(span.marker) else {
            continue;
        };
        let Some(from) = span.from else {
            continue;
        };
        if from < ch {
            continue;
        }
        let candidate = if marker.is_collapsed() {
            Break::Collapsed {
                marker: span.marker,
                from,
                to: span.to,
            }
        } else if marker.kind() == MarkerKind::Bookmark && marker.options().replaced_with.is_some() {
            Break::Bookmark {
                marker: span.marker,
                at: from,
            }
        } else {
            continue;
        };
        if best.as_ref().is_none_or(|b| candidate.at() < b.at()) {
            best = Some(candidate);
        }
    }
    best
}

/// Builds line views for one document.
pub(crate) struct LineBuilder<'a> {
    pub params: &'a HighlightParams,
    pub styles: &'a mut StyleCache,
}

impl LineBuilder<'_> {
    /// View of the visual line starting at physical line `n`.
    pub(crate) fn build(&mut self, doc: &mut Document, n: usize) -> Result<LineView> {
        let start = doc.line_handle(n)?;
        let mut spans = Vec::new();
        let mut done = Vec::new();
        let mut id = start;
        let mut line_no = n;
        let mut ch = 0;
        let mut last_line = n;

        // Bounded by the number of markers on the visual line.
        loop {
            let len = doc.line_ref(id).len_chars();
            let brk = next_break(doc, id, ch, &done);
            let seg_end = brk.as_ref().map_or(len, |b| b.at().min(len));
            if seg_end > ch {
                self.push_text(doc, id, line_no, ch, seg_end, &mut spans)?;
            }
            let Some(brk) = brk else {
                break;
            };
            let marker = brk.marker();
            done.push(marker);
            let widget = doc
                .marker(marker)
                .and_then(|m| m.options().replaced_with.clone());
            match brk {
                Break::Bookmark { at, .. } => {
                    if let Some(widget) = widget {
                        spans.push(widget_span(marker, widget, line_no, at, Pos::new(line_no, at)));
                    }
                    ch = at;
                }
                Break::Collapsed { from, to, .. } => {
                    let start_line = line_no;
                    let end = match to {
                        Some(to) => Pos::new(line_no, to),
                        None => match doc.marker_end(marker).and_then(|(end_id, end_ch)| {
                            doc.line_no(end_id).map(|no| (end_id, no, end_ch))
                        }) {
                            Some((end_id, end_no, end_ch)) => {
                                id = end_id;
                                line_no = end_no;
                                last_line = end_no;
                                Pos::new(end_no, end_ch)
                            }
                            None => Pos::new(line_no, len),
                        },
                    };
                    if let Some(widget) = widget {
                        spans.push(widget_span(marker, widget, start_line, from, end));
                    }
                    ch = end.ch;
                }
            }
        }

        if spans.is_empty() {
            spans.push(Span {
                text: String::new(),
                classes: None,
                css: None,
                kind: SpanKind::Placeholder,
                rtl: false,
                line: n,
                from: 0,
                to: 0,
            });
        }

        let line = doc.line_ref(start);
        Ok(LineView {
            line: n,
            lines: last_line - n + 1,
            text_class: line.text_class().map(str::to_string),
            bg_class: line.bg_class().map(str::to_string),
            spans,
        })
    }

    /// Append the text of columns `[from, to)` of one physical line, split at
    /// style, marker and bidi boundaries.
    fn push_text(
        &mut self,
        doc: &mut Document,
        id: LineId,
        line_no: usize,
        from: usize,
        to: usize,
        out: &mut Vec<Span>,
    ) -> Result<()> {
        let runs = doc.line_styles(id, self.params, true)?;
        let direction = doc.direction();
        let order = doc.line_mut(id).order(direction).to_vec();
        let len = doc.line_ref(id).len_chars();
        let decos = decorations(doc, id, len);
        let text = doc.line_ref(id).text().to_string();

        let mut cuts: Vec<usize> = runs.iter().map(|r| r.end).collect();
        for deco in &decos {
            cuts.push(deco.from);
            cuts.push(deco.to);
        }

        iterate_bidi_sections(&order, from, to, |sec_from, sec_to, rtl| {
            if sec_from >= sec_to {
                return;
            }
            let mut bounds: Vec<usize> = cuts
                .iter()
                .copied()
                .filter(|&c| c > sec_from && c < sec_to)
                .collect();
            bounds.push(sec_from);
            bounds.push(sec_to);
            bounds.sort_unstable();
            bounds.dedup();

            let mut pieces = Vec::new();
            for pair in bounds.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let classes = self.classes_at(&runs, &decos, a);
                let css = decos
                    .iter()
                    .filter(|d| d.from <= a && d.to > a)
                    .find_map(|d| d.css.clone());
                split_specials(&text, line_no, a, b, classes, css, self.params.tab_size, &mut pieces);
            }
            if rtl {
                pieces.reverse();
                for piece in &mut pieces {
                    piece.rtl = true;
                }
            }
            out.extend(pieces);
        });
        Ok(())
    }

    fn classes_at(&mut self, runs: &[StyleRun], decos: &[Decoration], ch: usize) -> Option<String> {
        let mut classes = Vec::new();
        if let Some(kind) = runs.iter().find(|r| r.end > ch).and_then(|r| r.style) {
            classes.push(self.styles.class_for(kind).to_string());
        }
        for deco in decos.iter().filter(|d| d.from <= ch && d.to > ch) {
            classes.extend(deco.classes.iter().cloned());
        }
        (!classes.is_empty()).then(|| classes.join(" "))
    }
}

fn widget_span(marker: MarkerId, widget: Widget, line: usize, from: usize, end: Pos) -> Span {
    Span {
        text: String::new(),
        classes: None,
        css: None,
        kind: SpanKind::Widget {
            marker,
            widget,
            end,
        },
        rtl: false,
        line,
        from,
        to: from,
    }
}

/// Split `[from, to)` into text, tab and special-char spans.
#[allow(clippy::too_many_arguments)]
fn split_specials(
    text: &str,
    line: usize,
    from: usize,
    to: usize,
    classes: Option<String>,
    css: Option<String>,
    tab_size: usize,
    out: &mut Vec<Span>,
) {
    let slice = slice_chars(text, from, to);
    let mut start = from;
    let mut pending = String::new();
    let flush = |pending: &mut String, start: usize, out: &mut Vec<Span>| {
        if !pending.is_empty() {
            let mut span = Span::text(std::mem::take(pending), line, start, classes.clone());
            span.css.clone_from(&css);
            out.push(span);
        }
    };
    for (offset, c) in slice.chars().enumerate() {
        let col = from + offset;
        let kind = if c == '\t' {
            let visual = crate::unicode::count_column(text, Some(col), tab_size);
            let tab_size = tab_size.max(1);
            Some(SpanKind::Tab {
                width: tab_size - visual % tab_size,
            })
        } else if c.is_control() {
            Some(SpanKind::Special { code: c as u32 })
        } else {
            None
        };
        match kind {
            Some(kind) => {
                flush(&mut pending, start, out);
                let class = if matches!(kind, SpanKind::Tab { .. }) {
                    "cm-tab"
                } else {
                    "cm-invalidchar"
                };
                let classes = Some(match &classes {
                    Some(c) => format!("{c} {class}"),
                    None => class.to_string(),
                });
                out.push(Span {
                    text: c.to_string(),
                    classes,
                    css: css.clone(),
                    kind,
                    rtl: false,
                    line,
                    from: col,
                    to: col + 1,
                });
                start = col + 1;
            }
            None => {
                if pending.is_empty() {
                    start = col;
                }
                pending.push(c);
            }
        }
    }
    flush(&mut pending, start, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::doc::{History, HistoryId, MarkerOptions};
    use crate::options::DocOptions;
    use crate::unicode::Direction;

    fn doc_with(text: &str, options: DocOptions) -> Document {
        let mut histories: Arena<HistoryId, History> = Arena::new();
        let history = histories.insert(History::default());
        Document::new(text, options, history)
    }

    fn build(doc: &mut Document, n: usize) -> LineView {
        let params = HighlightParams::default();
        let mut styles = StyleCache::default();
        LineBuilder {
            params: &params,
            styles: &mut styles,
        }
        .build(doc, n)
        .unwrap()
    }

    #[test]
    fn tabs_and_control_chars_get_their_own_spans() {
        let mut doc = doc_with("a\tb\u{1}", DocOptions::default());
        let view = build(&mut doc, 0);
        let kinds: Vec<_> = view.spans.iter().map(|s| s.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                SpanKind::Text,
                SpanKind::Tab { width: 3 },
                SpanKind::Text,
                SpanKind::Special { code: 1 }
            ]
        );
        assert_eq!(view.spans[2].from, 2);
    }

    #[test]
    fn empty_line_gets_placeholder() {
        let mut doc = doc_with("", DocOptions::default());
        let view = build(&mut doc, 0);
        assert_eq!(view.spans.len(), 1);
        assert_eq!(view.spans[0].kind, SpanKind::Placeholder);
    }

    #[test]
    fn class_marker_splits_text() {
        let mut doc = doc_with("hello world", DocOptions::default());
        doc.mark_text_inner(
            Pos::new(0, 2),
            Pos::new(0, 5),
            MarkerOptions::class("hl"),
            MarkerKind::Range,
        )
        .unwrap();
        let view = build(&mut doc, 0);
        let texts: Vec<_> = view.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["he", "llo", " world"]);
        assert_eq!(view.spans[1].classes.as_deref(), Some("hl"));
    }

    #[test]
    fn collapsed_range_merges_lines() {
        let mut doc = doc_with("one\ntwo\nthree", DocOptions::default());
        let options = MarkerOptions {
            replaced_with: Some(Widget { id: 7, width: 3.0 }),
            ..MarkerOptions::default()
        };
        doc.mark_text_inner(Pos::new(0, 1), Pos::new(1, 2), options, MarkerKind::Range)
            .unwrap();
        let view = build(&mut doc, 0);
        assert_eq!(view.lines, 2);
        assert_eq!(view.display_text(), "oo");
        assert!(view.spans[1].is_widget());
        assert_eq!(view.spans[2].line, 1);
    }

    #[test]
    fn rtl_text_is_marked_and_reversed() {
        let options = DocOptions::default().with_direction(Direction::Ltr);
        let mut doc = doc_with("ab \u{5d0}\u{5d1}", options);
        let view = build(&mut doc, 0);
        assert!(view.spans.iter().any(|s| s.rtl));
        assert_eq!(view.display_text().chars().count(), 5);
    }
}
