//! The rendering host capability and a headless monospace implementation.
//!
//! The renderer never touches a real UI. It hands [`DisplayPatch`]es to a
//! [`RenderHost`] and asks it to measure line views; everything else
//! (scroll extents, hit testing, selection geometry) is computed from those
//! measurements.

use std::cell::RefCell;
use std::rc::Rc;

use crate::unicode::{WidthMethod, char_advance};

use super::line_view::{LineView, SpanKind};

/// An axis-aligned box in content coordinates. `top` grows downward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Smallest rect covering both.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    #[must_use]
    pub fn offset_y(&self, dy: f64) -> Self {
        Self::new(self.left, self.top + dy, self.right, self.bottom + dy)
    }
}

/// Size of the host's visible area.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HostGeometry {
    pub client_width: f64,
    pub client_height: f64,
}

/// Measurement of one line view.
///
/// `span_rects[i]` holds one rect per char of span `i` in logical order, or
/// a single rect for widget and placeholder spans. Rects are relative to the
/// top of the line view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineMeasure {
    pub height: f64,
    pub span_rects: Vec<Vec<Rect>>,
}

/// One change to the host's list of line views.
#[derive(Clone, Debug, PartialEq)]
pub enum LinePatch {
    Insert { index: usize, view: LineView },
    Update { index: usize, view: LineView },
    Remove { index: usize },
}

/// Everything the host must do to catch up with one operation.
///
/// `ops` are applied in order: removals come first in descending index
/// order, then inserts and updates in ascending order of the new list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayPatch {
    pub ops: Vec<LinePatch>,
    pub total_height: f64,
    /// Widest line, for the horizontal scroll extent.
    pub scroll_width: f64,
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub view_from: usize,
    pub view_to: usize,
    /// One rect per selection head.
    pub cursors: Vec<Rect>,
    pub selection: Vec<Rect>,
    /// The host should put focus back into the editor after patching.
    pub restore_focus: bool,
}

impl DisplayPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The UI the renderer draws into.
pub trait RenderHost {
    fn mount(&mut self);
    fn unmount(&mut self);
    fn geometry(&self) -> HostGeometry;
    fn apply(&mut self, patch: &DisplayPatch);
    /// Lay out `view`, wrapping at `wrap_width` when given.
    fn measure(&mut self, view: &LineView, wrap_width: Option<f64>) -> LineMeasure;
    fn text_height(&self) -> f64;
    fn char_width(&self) -> f64;

    /// Change the visible area.
    fn resize(&mut self, _width: f64, _height: f64) {}

    /// Give focus back to the editor after its content was patched.
    fn restore_focus(&mut self) {}
}

/// State mirrored by a [`HeadlessHost`].
#[derive(Debug, Default)]
pub struct HeadlessState {
    pub mounted: bool,
    pub geometry: HostGeometry,
    pub lines: Vec<LineView>,
    pub patches: usize,
    pub last_patch: Option<DisplayPatch>,
    pub focus_restores: usize,
    pub measures: usize,
}

/// A monospace host with no UI.
///
/// Every char advances by its `unicode-width` cell count times
/// `char_width`; rows are `text_height` tall. Applied patches are mirrored
/// into a shared [`HeadlessState`] so the materialized window can be
/// inspected through a [`HeadlessHost::handle`].
#[derive(Debug)]
pub struct HeadlessHost {
    char_width: f64,
    text_height: f64,
    width_method: WidthMethod,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessHost {
    #[must_use]
    pub fn new(client_width: f64, client_height: f64) -> Self {
        let state = HeadlessState {
            geometry: HostGeometry {
                client_width,
                client_height,
            },
            ..HeadlessState::default()
        };
        Self {
            char_width: 1.0,
            text_height: 1.0,
            width_method: WidthMethod::WcWidth,
            state: Rc::new(RefCell::new(state)),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, char_width: f64, text_height: f64) -> Self {
        self.char_width = char_width;
        self.text_height = text_height;
        self
    }

    #[must_use]
    pub fn with_width_method(mut self, method: WidthMethod) -> Self {
        self.width_method = method;
        self
    }

    /// Shared view of the mirrored state.
    #[must_use]
    pub fn handle(&self) -> Rc<RefCell<HeadlessState>> {
        Rc::clone(&self.state)
    }

    fn span_widths(&self, kind: &SpanKind, text: &str) -> Vec<f64> {
        match kind {
            SpanKind::Text => text
                .chars()
                .map(|c| char_advance(c, self.width_method) as f64 * self.char_width)
                .collect(),
            SpanKind::Tab { width } => vec![*width as f64 * self.char_width],
            SpanKind::Special { .. } => vec![self.char_width],
            SpanKind::Widget { widget, .. } => vec![widget.width],
            SpanKind::Placeholder => vec![0.0],
        }
    }
}

impl RenderHost for HeadlessHost {
    fn mount(&mut self) {
        self.state.borrow_mut().mounted = true;
    }

    fn unmount(&mut self) {
        let mut state = self.state.borrow_mut();
        state.mounted = false;
        state.lines.clear();
    }

    fn geometry(&self) -> HostGeometry {
        self.state.borrow().geometry
    }

    fn apply(&mut self, patch: &DisplayPatch) {
        let mut state = self.state.borrow_mut();
        for op in &patch.ops {
            match op {
                LinePatch::Remove { index } if *index < state.lines.len() => {
                    state.lines.remove(*index);
                }
                LinePatch::Insert { index, view } if *index <= state.lines.len() => {
                    state.lines.insert(*index, view.clone());
                }
                LinePatch::Update { index, view } if *index < state.lines.len() => {
                    state.lines[*index] = view.clone();
                }
                op => tracing::warn!(?op, "patch index out of range"),
            }
        }
        state.patches += 1;
        state.last_patch = Some(patch.clone());
    }

    fn measure(&mut self, view: &LineView, wrap_width: Option<f64>) -> LineMeasure {
        self.state.borrow_mut().measures += 1;
        let mut x = 0.0;
        let mut row = 0usize;
        let th = self.text_height;
        let mut span_rects = Vec::with_capacity(view.spans.len());
        for span in &view.spans {
            let widths = self.span_widths(&span.kind, &span.text);
            let mut rects = vec![Rect::default(); widths.len()];
            let visual: Box<dyn Iterator<Item = usize>> = if span.rtl {
                Box::new((0..widths.len()).rev())
            } else {
                Box::new(0..widths.len())
            };
            for i in visual {
                let w = widths[i];
                if let Some(limit) = wrap_width {
                    if x > 0.0 && x + w > limit {
                        row += 1;
                        x = 0.0;
                    }
                }
                let top = row as f64 * th;
                rects[i] = Rect::new(x, top, x + w, top + th);
                x += w;
            }
            span_rects.push(rects);
        }
        LineMeasure {
            height: (row + 1) as f64 * th,
            span_rects,
        }
    }

    fn text_height(&self) -> f64 {
        self.text_height
    }

    fn char_width(&self) -> f64 {
        self.char_width
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.state.borrow_mut().geometry = HostGeometry {
            client_width: width,
            client_height: height,
        };
    }

    fn restore_focus(&mut self) {
        self.state.borrow_mut().focus_restores += 1;
    }
}
