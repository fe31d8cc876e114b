//! Cursor and selection rectangles for the rendered window.

use crate::doc::{Document, Range};
use crate::editor::Editor;
use crate::error::Result;
use crate::options::ReadOnly;
use crate::pos::Pos;

use super::host::{LineMeasure, Rect};
use super::line_view::{LineView, SpanKind};
use super::measure::{cursor_coords, measured_line};

/// Cursor rects (one per head) and selection rects in document coordinates.
pub(crate) fn draw_selection(editor: &mut Editor, doc: &mut Document) -> Result<(Vec<Rect>, Vec<Rect>)> {
    let from = editor.display.view_from;
    let to = editor.display.view_to;
    let ranges: Vec<Range> = doc.selection().ranges().to_vec();
    let mut cursors = Vec::new();
    let mut selection = Vec::new();
    for range in &ranges {
        let head = range.head;
        if editor.options.read_only != ReadOnly::NoCursor && head.line >= from && head.line < to {
            cursors.push(cursor_coords(editor, doc, head)?);
        }
        if !range.is_empty() {
            selection.extend(range_rects(editor, doc, range.from(), range.to(), from, to)?);
        }
    }
    Ok((cursors, selection))
}

/// Whether the box of a span item lies inside `[from, to)`.
fn box_selected(span_line: usize, ch: usize, from: Pos, to: Pos) -> bool {
    let at = Pos::new(span_line, ch);
    at >= from && at < to
}

fn range_rects(
    editor: &mut Editor,
    doc: &mut Document,
    from: Pos,
    to: Pos,
    view_from: usize,
    view_to: usize,
) -> Result<Vec<Rect>> {
    let client_width = editor.host.geometry().client_width.max(editor.display.scroll_width);
    let mut out = Vec::new();
    let mut n = doc.visual_line_no(from.line.max(view_from));
    let last = to.line.min(view_to.saturating_sub(1));
    while n <= last && n < view_to {
        let (_, view, measure) = measured_line(editor, doc, n)?;
        let top = doc.height_at_line(n);
        let mut rects = line_rects(&view, &measure, from, to);
        let view_end = view.line + view.lines - 1;
        if to.line > view_end {
            // Selection continues past this visual line: extend its last row.
            let row_top = measure
                .span_rects
                .iter()
                .flatten()
                .map(|r| r.top)
                .fold(0.0, f64::max);
            let row_bottom = row_top + editor.host.text_height();
            let start = rects
                .iter()
                .filter(|r| (r.top - row_top).abs() <= f64::EPSILON)
                .map(|r| r.right)
                .fold(f64::NEG_INFINITY, f64::max);
            let start = if start.is_finite() {
                start
            } else {
                measure
                    .span_rects
                    .iter()
                    .flatten()
                    .filter(|r| (r.top - row_top).abs() <= f64::EPSILON)
                    .map(|r| r.right)
                    .fold(0.0, f64::max)
            };
            if client_width > start {
                rects.push(Rect::new(start, row_top, client_width, row_bottom));
            }
        }
        out.extend(rects.into_iter().map(|r| r.offset_y(top)));
        n = view.line + view.lines.max(1);
    }
    Ok(out)
}

/// Selected boxes of one visual line, merged per row into contiguous rects.
fn line_rects(view: &LineView, measure: &LineMeasure, from: Pos, to: Pos) -> Vec<Rect> {
    let mut boxes: Vec<Rect> = Vec::new();
    for (span, rects) in view.spans.iter().zip(&measure.span_rects) {
        match &span.kind {
            SpanKind::Placeholder => {}
            SpanKind::Widget { end, .. } => {
                let start = Pos::new(span.line, span.from);
                if start >= from && *end <= to && start < *end {
                    boxes.extend(rects.iter().copied());
                }
            }
            SpanKind::Text => {
                for (i, rect) in rects.iter().enumerate() {
                    if box_selected(span.line, span.from + i, from, to) {
                        boxes.push(*rect);
                    }
                }
            }
            SpanKind::Tab { .. } | SpanKind::Special { .. } => {
                if box_selected(span.line, span.from, from, to) {
                    boxes.extend(rects.iter().copied());
                }
            }
        }
    }
    boxes.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));
    let mut merged: Vec<Rect> = Vec::new();
    for rect in boxes {
        match merged.last_mut() {
            Some(last)
                if (last.top - rect.top).abs() <= f64::EPSILON
                    && (rect.left - last.right).abs() <= f64::EPSILON =>
            {
                *last = last.merge(&rect);
            }
            _ => merged.push(rect),
        }
    }
    merged
}
