//! Windowed renderer.
//!
//! Each editor keeps a [`Display`]: the list of line views currently handed
//! to its [`RenderHost`], the range `[view_from, view_to)` they cover, and
//! per-line dirty flags raised by the change pipeline, marker updates and the
//! background highlighter. [`update_display`] recomputes the window from the
//! scroll position, rebuilds only what changed and produces the list of
//! [`LinePatch`] ops for the host.

pub mod host;
pub mod line_view;
pub(crate) mod measure;
pub(crate) mod selection;

use std::collections::HashMap;

use crate::doc::{Document, LineId};
use crate::editor::Editor;
use crate::error::Result;
use crate::pos::Pos;

pub use host::{
    DisplayPatch, HeadlessHost, HeadlessState, HostGeometry, LineMeasure, LinePatch, Rect,
    RenderHost,
};
pub use line_view::{ChangeFlags, LineView, Span, SpanKind};
pub use measure::CoordsPos;

use line_view::{LineBuilder, StyleCache};

/// Height-reconciliation passes per display update.
const MAX_UPDATE_PASSES: usize = 3;

/// What [`Engine::scroll_into_view`](crate::Engine::scroll_into_view) should
/// bring on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollTarget {
    Pos(Pos),
    Range { from: Pos, to: Pos },
    Rect(Rect),
}

/// Scroll position and extents, as returned by `get_scroll_info`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollInfo {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub client_width: f64,
    pub client_height: f64,
}

/// Rendered line range `[from, to)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub from: usize,
    pub to: usize,
}

/// Per-editor render state.
#[derive(Debug, Default)]
pub(crate) struct Display {
    pub view_from: usize,
    pub view_to: usize,
    pub views: Vec<LineView>,
    /// Line handle of the first line of each view, parallel to `views`.
    pub ids: Vec<LineId>,
    pub dirty: HashMap<LineId, ChangeFlags>,
    /// Rebuild every view on the next update.
    pub force_full: bool,
    pub max_line: Option<LineId>,
    pub max_line_length: usize,
    pub max_line_changed: bool,
    pub measure_cache: HashMap<LineId, (LineView, LineMeasure)>,
    pub style_cache: StyleCache,
    pub scroll_width: f64,
}

impl Display {
    /// Flag line `id` for rebuilding.
    pub(crate) fn mark_dirty(&mut self, id: LineId, flags: ChangeFlags) {
        *self.dirty.entry(id).or_default() |= flags;
        self.measure_cache.remove(&id);
    }

    /// Flag every line of `[from, to)` that is currently rendered.
    pub(crate) fn mark_range_dirty(&mut self, doc: &Document, from: usize, to: usize, flags: ChangeFlags) {
        let shown_from = from.max(self.view_from);
        let shown_to = to.min(self.view_to);
        if shown_from < shown_to {
            for id in doc.line_ids(shown_from, shown_to) {
                self.mark_dirty(id, flags);
            }
        }
        let stale: Vec<LineId> = self
            .measure_cache
            .keys()
            .copied()
            .filter(|id| doc.line_no(*id).is_none_or(|n| n >= from && n < to))
            .collect();
        for id in stale {
            self.measure_cache.remove(&id);
        }
    }

    /// Drop every view and cache.
    pub(crate) fn reset(&mut self) {
        self.force_full = true;
        self.dirty.clear();
        self.measure_cache.clear();
        self.max_line_changed = true;
    }

    /// Index of the view whose visual line covers physical line `n`.
    pub(crate) fn view_index(&self, n: usize) -> Option<usize> {
        if n < self.view_from || n >= self.view_to {
            return None;
        }
        self.views
            .iter()
            .position(|view| view.line <= n && n < view.line + view.lines)
    }

    #[must_use]
    pub(crate) fn viewport(&self) -> Viewport {
        Viewport {
            from: self.view_from,
            to: self.view_to,
        }
    }
}

/// Outcome of one display update.
#[derive(Debug, Default)]
pub(crate) struct DisplayUpdate {
    pub ops: Vec<LinePatch>,
    pub viewport_changed: bool,
    pub heights_changed: bool,
}

/// Wrap width for measuring, when wrapping.
pub(crate) fn wrap_width(editor: &Editor) -> Option<f64> {
    editor
        .options
        .line_wrapping
        .then(|| editor.host.geometry().client_width)
}

/// Lines `[from, to)` to render for the current scroll position.
fn visible_range(editor: &Editor, doc: &Document) -> (usize, usize) {
    let geometry = editor.host.geometry();
    let top = doc.scroll_top.max(0.0);
    let bottom = top + geometry.client_height.max(0.0);
    let end = doc.first_line() + doc.line_count();
    let visible_from = doc.line_at_height(top);
    let visible_to = (doc.line_at_height(bottom) + 1).min(end);
    let margin = editor.options.viewport_margin;
    let from = doc.visual_line_no(visible_from.saturating_sub(margin).max(doc.first_line()));
    let mut to = (visible_to + margin).min(end);
    if to > from {
        to = doc.visual_line_end_no(to - 1).max(to);
    }
    (from, to.min(end))
}

/// Shift the line numbers carried by a reused view.
fn renumber(view: &mut LineView, n: usize) {
    if view.line == n {
        return;
    }
    let delta = n as isize - view.line as isize;
    for span in &mut view.spans {
        span.line = span.line.saturating_add_signed(delta);
        if let line_view::SpanKind::Widget { end, .. } = &mut span.kind {
            end.line = end.line.saturating_add_signed(delta);
        }
    }
    view.line = n;
}

/// Measure `view` and record the heights of the lines it covers. Returns
/// whether any height changed.
fn apply_measure(doc: &mut Document, id: LineId, view: &LineView, measure: &LineMeasure) -> bool {
    let mut changed = false;
    let old = doc.line_ref(id).height();
    if (old - measure.height).abs() > f64::EPSILON {
        doc.set_line_height(id, measure.height);
        changed = true;
    }
    if view.lines > 1 {
        for merged in doc.line_ids(view.line + 1, view.line + view.lines) {
            if doc.line_ref(merged).height() != 0.0 {
                doc.set_line_height(merged, 0.0);
                changed = true;
            }
        }
    }
    changed
}

/// Recompute the longest line when its bookkeeping was invalidated.
pub(crate) fn update_max_line(display: &mut Display, doc: &Document) {
    if !display.max_line_changed {
        return;
    }
    let mut best: Option<(LineId, usize)> = None;
    for id in doc.line_ids(doc.first_line(), doc.first_line() + doc.line_count()) {
        if doc.line_is_hidden(id) {
            continue;
        }
        let len = doc.line_length(id);
        if best.is_none_or(|(_, l)| len > l) {
            best = Some((id, len));
        }
    }
    display.max_line = best.map(|(id, _)| id);
    display.max_line_length = best.map_or(0, |(_, len)| len);
    display.max_line_changed = false;
}

/// Rebuild the rendered window of `editor` over `doc`.
pub(crate) fn update_display(editor: &mut Editor, doc: &mut Document) -> Result<DisplayUpdate> {
    let params = editor.highlight_params();
    let wrap = wrap_width(editor);
    let force = std::mem::take(&mut editor.display.force_full);
    let dirty = std::mem::take(&mut editor.display.dirty);

    let mut old: HashMap<LineId, (usize, LineView)> = editor
        .display
        .ids
        .iter()
        .copied()
        .zip(editor.display.views.iter().cloned())
        .enumerate()
        .map(|(i, (id, view))| (id, (i, view)))
        .collect();
    // Views built during this update, reused by later passes.
    let mut built: HashMap<LineId, LineView> = HashMap::new();

    let mut result = DisplayUpdate::default();
    let mut new_views = Vec::new();
    let mut new_ids = Vec::new();
    let mut rebuilt = Vec::new();
    let mut from = editor.display.view_from;
    let mut to = editor.display.view_to;

    for pass in 0..MAX_UPDATE_PASSES {
        (from, to) = visible_range(editor, doc);
        new_views.clear();
        new_ids.clear();
        rebuilt.clear();
        let mut heights_changed = false;
        let mut n = from;
        while n < to {
            let id = doc.line_handle(n)?;
            if doc.line_is_hidden(id) {
                n += 1;
                continue;
            }
            let fresh = built.get(&id).cloned();
            let reusable = if force || dirty.contains_key(&id) {
                None
            } else {
                old.get(&id).map(|(_, view)| view.clone())
            };
            let (view, was_built) = match (fresh, reusable) {
                (Some(view), _) => (view, true),
                (None, Some(mut view)) => {
                    renumber(&mut view, n);
                    (view, false)
                }
                (None, None) => {
                    let mut builder = LineBuilder {
                        params: &params,
                        styles: &mut editor.display.style_cache,
                    };
                    let view = builder.build(doc, n)?;
                    built.insert(id, view.clone());
                    (view, true)
                }
            };
            let cached = editor
                .display
                .measure_cache
                .get(&id)
                .filter(|(cached_view, _)| *cached_view == view)
                .map(|(_, m)| m.clone());
            let measure = match cached {
                Some(measure) => measure,
                None => {
                    let measure = editor.host.measure(&view, wrap);
                    editor
                        .display
                        .measure_cache
                        .insert(id, (view.clone(), measure.clone()));
                    measure
                }
            };
            heights_changed |= apply_measure(doc, id, &view, &measure);
            n += view.lines.max(1);
            if was_built {
                rebuilt.push(id);
            }
            new_views.push(view);
            new_ids.push(id);
        }
        result.heights_changed |= heights_changed;
        tracing::trace!(pass, from, to, views = new_views.len(), heights_changed, "display pass");
        if !heights_changed || visible_range(editor, doc) == (from, to) {
            break;
        }
    }

    // Removals, highest index first.
    let mut keep = vec![false; editor.display.ids.len()];
    let new_index: HashMap<LineId, usize> = new_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    for (i, id) in editor.display.ids.iter().enumerate() {
        keep[i] = new_index.contains_key(id);
    }
    for i in (0..keep.len()).rev() {
        if !keep[i] {
            result.ops.push(LinePatch::Remove { index: i });
        }
    }
    let surviving: Vec<LineId> = editor
        .display
        .ids
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(id, _)| *id)
        .collect();
    let mut k = 0;
    for (j, (id, view)) in new_ids.iter().zip(&new_views).enumerate() {
        if surviving.get(k) == Some(id) {
            k += 1;
            let changed = rebuilt.contains(id)
                || old.remove(id).is_none_or(|(_, prev)| prev != *view);
            if changed {
                result.ops.push(LinePatch::Update {
                    index: j,
                    view: view.clone(),
                });
            }
        } else {
            result.ops.push(LinePatch::Insert {
                index: j,
                view: view.clone(),
            });
        }
    }

    result.viewport_changed = (from, to) != (editor.display.view_from, editor.display.view_to);
    editor.display.view_from = from;
    editor.display.view_to = to;
    editor.display.views = new_views;
    editor.display.ids = new_ids;
    editor
        .display
        .measure_cache
        .retain(|id, _| doc.line_no(*id).is_some());

    update_max_line(&mut editor.display, doc);
    editor.display.scroll_width = match wrap {
        Some(width) => width,
        None => editor.display.max_line_length as f64 * editor.host.char_width(),
    };

    tracing::debug!(
        from,
        to,
        ops = result.ops.len(),
        viewport_changed = result.viewport_changed,
        "display updated"
    );
    Ok(result)
}

/// Scroll offsets that bring `rect` on screen with `margin` pixels to spare.
/// `None` means the axis is already fine.
pub(crate) fn calculate_scroll_pos(
    doc: &Document,
    geometry: HostGeometry,
    scroll_width: f64,
    rect: Rect,
    margin: f64,
) -> (Option<f64>, Option<f64>) {
    let screen_top = doc.scroll_top;
    let screen = geometry.client_height;
    let doc_bottom = doc.height();
    let mut top = None;
    let at_top = rect.top - margin;
    let at_bottom = rect.bottom + margin;
    if at_top < screen_top {
        top = Some(if at_top <= 0.0 { 0.0 } else { at_top });
    } else if at_bottom > screen_top + screen {
        let new_top = (rect.top - margin).min(at_bottom - screen);
        if (new_top - screen_top).abs() > f64::EPSILON {
            top = Some(new_top.min(doc_bottom).max(0.0));
        }
    }

    let screen_left = doc.scroll_left;
    let screen_w = geometry.client_width;
    let mut left = None;
    if rect.left < screen_left + 10.0 && rect.left - 10.0 < screen_left {
        let target = (rect.left - 10.0).max(0.0);
        if (target - screen_left).abs() > f64::EPSILON {
            left = Some(target);
        }
    } else if rect.right > screen_left + screen_w - 3.0 {
        let target = (rect.right + 3.0 - screen_w).min(scroll_width).max(0.0);
        if (target - screen_left).abs() > f64::EPSILON {
            left = Some(target);
        }
    }
    (top, left)
}

/// Clamp a scroll position to the scrollable area.
pub(crate) fn clamp_scroll(doc: &Document, geometry: HostGeometry, scroll_width: f64, top: f64, left: f64) -> (f64, f64) {
    let max_top = (doc.height() - geometry.client_height).max(0.0);
    let max_left = (scroll_width - geometry.client_width).max(0.0);
    (top.clamp(0.0, max_top), left.clamp(0.0, max_left))
}
