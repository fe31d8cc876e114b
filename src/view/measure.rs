//! Mapping between document positions and content coordinates.
//!
//! Coordinates are in document space: `top` is measured from the top of the
//! first line, `left` from the start of the line box. Lines outside the
//! rendered window are built and measured on demand.

use crate::doc::{Document, LineId};
use crate::editor::Editor;
use crate::error::Result;
use crate::pos::{Pos, Sticky};

use super::host::{LineMeasure, Rect};
use super::line_view::{LineBuilder, LineView, Span, SpanKind};
use super::wrap_width;

/// Result of mapping a point back to a position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordsPos {
    pub pos: Pos,
    /// The point was outside the text: above, below, or past a line edge.
    pub outside: bool,
}

/// View and measurement of the visual line holding line `n`.
pub(crate) fn measured_line(editor: &mut Editor, doc: &mut Document, n: usize) -> Result<(LineId, LineView, LineMeasure)> {
    let n = doc.visual_line_no(doc.clip_line(n));
    let id = doc.line_handle(n)?;
    if let Some((view, measure)) = editor.display.measure_cache.get(&id) {
        if view.line == n {
            return Ok((id, view.clone(), measure.clone()));
        }
    }
    let params = editor.highlight_params();
    let mut builder = LineBuilder {
        params: &params,
        styles: &mut editor.display.style_cache,
    };
    let view = builder.build(doc, n)?;
    let measure = editor.host.measure(&view, wrap_width(editor));
    editor
        .display
        .measure_cache
        .insert(id, (view.clone(), measure.clone()));
    Ok((id, view, measure))
}

/// Rect of the char at `(line, ch)` inside a view, with the span it belongs to.
fn char_box<'a>(view: &'a LineView, measure: &LineMeasure, line: usize, ch: usize) -> Option<(&'a Span, Rect)> {
    view.spans.iter().zip(&measure.span_rects).find_map(|(span, rects)| {
        if span.line != line || span.is_widget() || ch < span.from || ch >= span.to {
            return None;
        }
        let index = match span.kind {
            SpanKind::Text => ch - span.from,
            _ => 0,
        };
        rects.get(index).map(|rect| (span, *rect))
    })
}

/// Widget span covering `pos`, if the position lies in a replaced range.
fn widget_box<'a>(view: &'a LineView, measure: &LineMeasure, pos: Pos) -> Option<(&'a Span, Rect, bool)> {
    view.spans.iter().zip(&measure.span_rects).find_map(|(span, rects)| {
        let SpanKind::Widget { end, .. } = &span.kind else {
            return None;
        };
        let start = Pos::new(span.line, span.from);
        if pos < start || pos > *end {
            return None;
        }
        let at_end = pos == *end && pos != start;
        rects.first().map(|rect| (span, *rect, at_end))
    })
}

/// Zero-width cursor rect at `pos`, relative to the top of its visual line.
fn cursor_rect_in(doc: &Document, view: &LineView, measure: &LineMeasure, pos: Pos) -> Rect {
    let len = doc.line_len(pos.line);
    let use_before = pos.ch > 0 && (pos.sticky == Sticky::Before || pos.ch >= len);

    let edge = |rect: Rect, rtl: bool, after_char: bool| {
        let x = if after_char != rtl { rect.right } else { rect.left };
        Rect::new(x, rect.top, x, rect.bottom)
    };

    if use_before {
        if let Some((span, rect)) = char_box(view, measure, pos.line, pos.ch - 1) {
            return edge(rect, span.rtl, true);
        }
    }
    if let Some((span, rect)) = char_box(view, measure, pos.line, pos.ch) {
        return edge(rect, span.rtl, false);
    }
    if pos.ch > 0 {
        if let Some((span, rect)) = char_box(view, measure, pos.line, pos.ch - 1) {
            return edge(rect, span.rtl, true);
        }
    }
    if let Some((_, rect, at_end)) = widget_box(view, measure, pos) {
        return edge(rect, false, at_end);
    }
    // Empty line, or a position hidden by a collapsed range without widget.
    let first = measure
        .span_rects
        .iter()
        .flatten()
        .next()
        .copied()
        .unwrap_or_default();
    Rect::new(first.left, first.top, first.left, first.bottom.max(first.top))
}

/// Cursor rect of `pos` in document coordinates.
pub(crate) fn cursor_coords(editor: &mut Editor, doc: &mut Document, pos: Pos) -> Result<Rect> {
    let pos = doc.clip_pos(pos).sticky(pos.sticky);
    let (_, view, measure) = measured_line(editor, doc, pos.line)?;
    let top = doc.height_at_line(pos.line);
    let mut rect = cursor_rect_in(doc, &view, &measure, pos);
    if rect.bottom <= rect.top {
        rect.bottom = rect.top + editor.host.text_height();
    }
    Ok(rect.offset_y(top))
}

/// Box of the char after `pos` (or the cursor rect at a line end).
pub(crate) fn char_coords(editor: &mut Editor, doc: &mut Document, pos: Pos) -> Result<Rect> {
    let pos = doc.clip_pos(pos);
    let (_, view, measure) = measured_line(editor, doc, pos.line)?;
    let top = doc.height_at_line(pos.line);
    let rect = match char_box(&view, &measure, pos.line, pos.ch) {
        Some((_, rect)) => rect,
        None => cursor_rect_in(doc, &view, &measure, pos),
    };
    Ok(rect.offset_y(top))
}

/// Position nearest to the point `(x, y)` in document coordinates.
pub(crate) fn coords_char(editor: &mut Editor, doc: &mut Document, x: f64, y: f64) -> Result<CoordsPos> {
    if y < 0.0 {
        return Ok(CoordsPos {
            pos: Pos::new(doc.first_line(), 0),
            outside: true,
        });
    }
    if y >= doc.height() {
        let last = doc.last_line();
        return Ok(CoordsPos {
            pos: Pos::new(last, doc.line_len(last)).sticky(Sticky::Before),
            outside: true,
        });
    }
    let n = doc.visual_line_no(doc.line_at_height(y));
    let (_, view, measure) = measured_line(editor, doc, n)?;
    let local_y = y - doc.height_at_line(n);

    // Row: the last row whose top is at or above the point.
    let row_top = measure
        .span_rects
        .iter()
        .flatten()
        .map(|r| r.top)
        .filter(|&top| top <= local_y)
        .fold(f64::NEG_INFINITY, f64::max);
    let row_top = if row_top.is_finite() { row_top } else { 0.0 };

    let mut best: Option<(f64, &Span, usize, Rect)> = None;
    let mut row_left = f64::INFINITY;
    let mut row_right = f64::NEG_INFINITY;
    for (span, rects) in view.spans.iter().zip(&measure.span_rects) {
        for (i, rect) in rects.iter().enumerate() {
            if (rect.top - row_top).abs() > f64::EPSILON {
                continue;
            }
            row_left = row_left.min(rect.left);
            row_right = row_right.max(rect.right);
            let dist = if x < rect.left {
                rect.left - x
            } else if x > rect.right {
                x - rect.right
            } else {
                0.0
            };
            if best.is_none_or(|(d, ..)| dist < d) {
                best = Some((dist, span, i, *rect));
            }
        }
    }

    let Some((_, span, index, rect)) = best else {
        return Ok(CoordsPos {
            pos: Pos::new(n, 0),
            outside: true,
        });
    };
    let outside = x < row_left || x > row_right;
    let right_half = x >= (rect.left + rect.right) / 2.0;
    let pos = match &span.kind {
        SpanKind::Widget { end, .. } => {
            if right_half {
                *end
            } else {
                Pos::new(span.line, span.from)
            }
        }
        SpanKind::Placeholder => Pos::new(span.line, 0),
        _ => {
            let ch = span.from + index;
            let after = right_half != span.rtl;
            if after {
                Pos::with_sticky(span.line, ch + 1, Sticky::Before)
            } else {
                Pos::with_sticky(span.line, ch, Sticky::After)
            }
        }
    };
    Ok(CoordsPos { pos, outside })
}
