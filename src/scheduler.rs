//! Operation batching and background tasks.
//!
//! Every mutating engine call runs inside an operation group. The outermost
//! call opens the group; nested calls join it. Each editor touched while the
//! group is open gets its own [`Operation`] collecting display flags, scroll
//! requests and events. When the outermost call returns the group ends, and
//! all editors go through the same phases in lockstep:
//!
//! 1. longest-line bookkeeping,
//! 2. display update (with scroll requests resolved before and after
//!    measuring) and patch delivery to the host,
//! 3. event delivery, each kind at most once,
//! 4. focus restoration.
//!
//! Work requested by listeners runs afterwards, each item in a fresh
//! operation. The background highlighter is a timed task driven by
//! [`Engine::run_due_tasks`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::editor::EditorId;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::events::{Deferred, EditorEvent, EventQueue, HookActions};
use crate::view::{
    ChangeFlags, DisplayPatch, ScrollTarget, calculate_scroll_pos, clamp_scroll,
    measure::cursor_coords, selection::draw_selection, update_display, update_max_line,
};

/// Delay before the highlighter resumes after an edit or display update.
pub(crate) const WORKER_RESTART_DELAY: Duration = Duration::from_millis(400);

/// Deferred actions drained per outermost operation before giving up.
const MAX_DEFERRED_ACTIONS: usize = 10_000;

/// Pending request to bring something on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScrollRequest {
    pub target: ScrollTarget,
    pub margin: f64,
}

/// What one editor accumulated during an operation group.
#[derive(Debug)]
pub(crate) struct Operation {
    pub id: u64,
    /// Rebuild every line view.
    pub force_update: bool,
    pub text_changed: bool,
    /// Geometry or visibility changed; recompute the window.
    pub view_changed: bool,
    pub selection_changed: bool,
    pub update_max_line: bool,
    pub scroll_top: Option<f64>,
    pub scroll_left: Option<f64>,
    pub scroll_to: Option<ScrollRequest>,
    pub events: EventQueue,
    pub start_scroll_top: f64,
    pub start_scroll_left: f64,
}

impl Operation {
    pub(crate) fn new(id: u64, scroll_top: f64, scroll_left: f64) -> Self {
        Self {
            id,
            force_update: false,
            text_changed: false,
            view_changed: false,
            selection_changed: false,
            update_max_line: false,
            scroll_top: None,
            scroll_left: None,
            scroll_to: None,
            events: EventQueue::default(),
            start_scroll_top: scroll_top,
            start_scroll_left: scroll_left,
        }
    }

    fn needs_display(&self) -> bool {
        self.force_update
            || self.text_changed
            || self.view_changed
            || self.selection_changed
            || self.update_max_line
            || self.scroll_top.is_some()
            || self.scroll_left.is_some()
            || self.scroll_to.is_some()
    }
}

#[derive(Debug)]
pub(crate) struct OperationGroup {
    pub id: u64,
    pub editors: Vec<EditorId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TaskKind {
    Highlight(EditorId),
}

#[derive(Debug)]
struct Task {
    due: Instant,
    kind: TaskKind,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    next_id: u64,
    pub group: Option<OperationGroup>,
    tasks: Vec<Task>,
    pub deferred: VecDeque<(EditorId, Deferred)>,
    draining: bool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("next_id", &self.next_id)
            .field("group", &self.group)
            .field("tasks", &self.tasks)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl Scheduler {
    pub(crate) fn next_op_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Schedule `kind` at `due`, keeping the earlier time when it is
    /// already pending.
    pub(crate) fn schedule(&mut self, kind: TaskKind, due: Instant) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.kind == kind) {
            task.due = task.due.min(due);
        } else {
            self.tasks.push(Task { due, kind });
        }
    }

    pub(crate) fn cancel(&mut self, kind: TaskKind) {
        self.tasks.retain(|t| t.kind != kind);
    }

    fn take_due(&mut self, now: Instant) -> Vec<TaskKind> {
        let mut due: Vec<&Task> = self.tasks.iter().filter(|t| t.due <= now).collect();
        due.sort_by_key(|t| t.due);
        let kinds: Vec<TaskKind> = due.into_iter().map(|t| t.kind).collect();
        self.tasks.retain(|t| t.due > now);
        kinds
    }

    #[must_use]
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.due).min()
    }

    #[must_use]
    pub(crate) fn is_pending(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|t| t.kind == kind)
    }
}

impl Engine {
    /// Run `f` inside an operation on `editor`. Nested calls join the
    /// enclosing operation; the display is updated once when the outermost
    /// call returns.
    pub fn operation<T>(&mut self, editor: EditorId, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if !self.editors.contains(editor) {
            return Err(Error::UnknownEditor(editor));
        }
        self.run_op(Some(editor), f)
    }

    /// Run `f` in one operation group, so every editor it touches renders
    /// once at the end.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.run_op(None, f)
    }

    pub(crate) fn run_op<T>(
        &mut self,
        editor: Option<EditorId>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let outer = self.start_group();
        if let Some(editor) = editor {
            self.start_editor_op(editor);
        }
        let result = f(self);
        if !outer {
            return result;
        }
        let ended = self.end_group();
        let drained = self.drain_deferred();
        let value = result?;
        ended?;
        drained?;
        Ok(value)
    }

    fn start_group(&mut self) -> bool {
        if self.scheduler.group.is_some() {
            return false;
        }
        let id = self.scheduler.next_op_id();
        tracing::trace!(id, "operation group opened");
        self.scheduler.group = Some(OperationGroup {
            id,
            editors: Vec::new(),
        });
        true
    }

    /// Open `editor`'s operation in the current group if it has none.
    pub(crate) fn start_editor_op(&mut self, editor: EditorId) {
        let Some(ed) = self.editors.get(editor) else {
            return;
        };
        if ed.cur_op.is_some() {
            return;
        }
        let (top, left) = self
            .docs
            .get(ed.doc)
            .map_or((0.0, 0.0), |d| (d.scroll_top, d.scroll_left));
        let id = self.scheduler.next_op_id();
        if let Some(ed) = self.editors.get_mut(editor) {
            ed.cur_op = Some(Operation::new(id, top, left));
        }
        match &mut self.scheduler.group {
            Some(group) => {
                if !group.editors.contains(&editor) {
                    group.editors.push(editor);
                }
            }
            None => tracing::warn!(?editor, "editor operation started outside a group"),
        }
    }

    /// History op id for changes to a document: its editor's operation, or
    /// the group for documents without an editor.
    pub(crate) fn current_op_id(&self, editor: Option<EditorId>) -> u64 {
        editor
            .and_then(|e| self.editors.get(e))
            .and_then(|e| e.cur_op.as_ref())
            .map(|op| op.id)
            .or_else(|| self.scheduler.group.as_ref().map(|g| g.id))
            .unwrap_or_default()
    }

    fn end_group(&mut self) -> Result<()> {
        let Some(group) = self.scheduler.group.take() else {
            return Ok(());
        };
        let editors: Vec<EditorId> = group
            .editors
            .into_iter()
            .filter(|&e| self.editors.contains(e))
            .collect();
        tracing::trace!(id = group.id, editors = editors.len(), "operation group closing");

        for &editor in &editors {
            self.end_max_line(editor);
        }
        let mut first_err = None;
        let mut patched = Vec::with_capacity(editors.len());
        for &editor in &editors {
            match self.end_display(editor) {
                Ok(restore) => patched.push((editor, restore)),
                Err(err) => {
                    tracing::warn!(?editor, %err, "display update failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        for &editor in &editors {
            self.deliver_events(editor);
        }
        for (editor, restore) in patched {
            if restore {
                if let Some(ed) = self.editors.get_mut(editor) {
                    ed.host.restore_focus();
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn end_max_line(&mut self, editor: EditorId) {
        let Some(ed) = self.editors.get_mut(editor) else {
            return;
        };
        let Some(doc) = self.docs.get(ed.doc) else {
            return;
        };
        if ed.cur_op.as_ref().is_some_and(|op| op.update_max_line) {
            ed.display.max_line_changed = true;
        }
        if !ed.options.line_wrapping {
            update_max_line(&mut ed.display, doc);
        }
    }

    /// Update the display of `editor` and hand the patch to its host.
    /// Returns whether focus should be restored.
    fn end_display(&mut self, editor: EditorId) -> Result<bool> {
        let now = self.clock.now();
        let Some(ed) = self.editors.get_mut(editor) else {
            return Ok(false);
        };
        let Some(doc) = self.docs.get_mut(ed.doc) else {
            return Ok(false);
        };
        let Some(mut op) = ed.cur_op.take() else {
            return Ok(false);
        };
        let needed = op.needs_display() || ed.display.force_full || !ed.display.dirty.is_empty();
        if !needed {
            ed.cur_op = Some(op);
            return Ok(false);
        }
        if op.force_update {
            ed.display.reset();
        }

        let geometry = ed.host.geometry();
        if let Some(top) = op.scroll_top {
            doc.scroll_top = top;
        }
        if let Some(left) = op.scroll_left {
            doc.scroll_left = left;
        }
        if let Some(request) = op.scroll_to {
            resolve_scroll(ed, doc, request)?;
        }
        (doc.scroll_top, doc.scroll_left) =
            clamp_scroll(doc, geometry, ed.display.scroll_width.max(geometry.client_width), doc.scroll_top, doc.scroll_left);

        let mut update = update_display(ed, doc)?;
        if let Some(request) = op.scroll_to.take() {
            let before = doc.scroll_top;
            resolve_scroll(ed, doc, request)?;
            (doc.scroll_top, doc.scroll_left) = clamp_scroll(
                doc,
                geometry,
                ed.display.scroll_width.max(geometry.client_width),
                doc.scroll_top,
                doc.scroll_left,
            );
            if (doc.scroll_top - before).abs() > f64::EPSILON {
                let second = update_display(ed, doc)?;
                update.ops.extend(second.ops);
                update.viewport_changed |= second.viewport_changed;
            }
        }

        let (cursors, selection) = draw_selection(ed, doc)?;
        let scrolled = (doc.scroll_top - op.start_scroll_top).abs() > f64::EPSILON
            || (doc.scroll_left - op.start_scroll_left).abs() > f64::EPSILON;
        if scrolled {
            op.events.push(EditorEvent::Scroll);
        }
        if update.viewport_changed {
            op.events.push(EditorEvent::ViewportChange {
                from: ed.display.view_from,
                to: ed.display.view_to,
            });
        }
        op.events.push(EditorEvent::Update);

        let restore = ed.focused && !update.ops.is_empty();
        let patch = DisplayPatch {
            ops: update.ops,
            total_height: doc.height(),
            scroll_width: ed.display.scroll_width,
            scroll_top: doc.scroll_top,
            scroll_left: doc.scroll_left,
            view_from: ed.display.view_from,
            view_to: ed.display.view_to,
            cursors,
            selection,
            restore_focus: restore,
        };
        ed.host.apply(&patch);
        ed.cur_op = Some(op);

        let target = (ed.display.view_to + ed.options.highlight_margin)
            .min(doc.first_line() + doc.line_count());
        if doc.highlight_frontier < target {
            self.scheduler
                .schedule(TaskKind::Highlight(editor), now + WORKER_RESTART_DELAY);
        }
        Ok(restore)
    }

    fn deliver_events(&mut self, editor: EditorId) {
        let Some(ed) = self.editors.get_mut(editor) else {
            return;
        };
        let Some(mut op) = ed.cur_op.take() else {
            return;
        };
        let events = op.events.drain();
        if events.is_empty() {
            return;
        }
        let mut actions = HookActions::default();
        for event in &events {
            tracing::trace!(?editor, ?event, "event");
            for listener in &mut ed.listeners {
                listener(event, &mut actions);
            }
        }
        self.scheduler
            .deferred
            .extend(actions.deferred.into_iter().map(|f| (editor, f)));
    }

    fn drain_deferred(&mut self) -> Result<()> {
        if self.scheduler.draining {
            return Ok(());
        }
        self.scheduler.draining = true;
        let mut first_err = None;
        let mut ran = 0;
        while let Some((editor, action)) = self.scheduler.deferred.pop_front() {
            if !self.editors.contains(editor) {
                continue;
            }
            ran += 1;
            if ran > MAX_DEFERRED_ACTIONS {
                tracing::warn!(dropped = self.scheduler.deferred.len() + 1, "listener actions keep requeueing, dropped");
                self.scheduler.deferred.clear();
                break;
            }
            if let Err(err) = self.run_op(Some(editor), |engine| action(engine, editor)) {
                first_err.get_or_insert(err);
            }
        }
        self.scheduler.draining = false;
        first_err.map_or(Ok(()), Err)
    }

    /// Run every background task whose deadline passed. Returns how many ran.
    pub fn run_due_tasks(&mut self) -> Result<usize> {
        let now = self.clock.now();
        let mut ran = 0;
        for task in self.scheduler.take_due(now) {
            match task {
                TaskKind::Highlight(editor) => {
                    if self.editors.contains(editor) {
                        self.run_op(Some(editor), |engine| engine.highlight_worker(editor))?;
                        ran += 1;
                    }
                }
            }
        }
        Ok(ran)
    }

    /// When the next background task is due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Schedule the highlighter for `editor` if its document is behind.
    pub(crate) fn start_worker(&mut self, editor: EditorId, delay: Duration) {
        let Some(ed) = self.editors.get(editor) else {
            return;
        };
        let Some(doc) = self.docs.get(ed.doc) else {
            return;
        };
        let target = (ed.display.view_to + ed.options.highlight_margin)
            .min(doc.first_line() + doc.line_count());
        if doc.highlight_frontier < target {
            let due = self.clock.now() + delay;
            self.scheduler.schedule(TaskKind::Highlight(editor), due);
        }
    }

    /// One time-boxed highlighting slice.
    fn highlight_worker(&mut self, editor: EditorId) -> Result<()> {
        let clock = &self.clock;
        let Some(ed) = self.editors.get_mut(editor) else {
            return Ok(());
        };
        let Some(doc) = self.docs.get_mut(ed.doc) else {
            return Ok(());
        };
        let params = ed.highlight_params();
        let start = clock.now();
        let deadline = start + ed.options.work_time;
        let mut time_up = || clock.now() >= deadline;
        let slice = doc.highlight_slice(&params, ed.options.highlight_margin, &mut time_up)?;
        for &n in &slice.changed {
            if let Ok(id) = doc.line_handle(n) {
                ed.display.mark_dirty(id, ChangeFlags::TEXT);
            }
        }
        tracing::debug!(
            processed = slice.processed,
            changed = slice.changed.len(),
            done = slice.done,
            frontier = doc.highlight_frontier,
            elapsed_ms = clock.now().saturating_duration_since(start).as_millis() as u64,
            "highlight slice"
        );
        if !slice.done {
            let due = clock.now() + ed.options.work_delay;
            self.scheduler.schedule(TaskKind::Highlight(editor), due);
        }
        Ok(())
    }
}

/// Move the scroll position so `request` is visible.
fn resolve_scroll(
    ed: &mut crate::editor::Editor,
    doc: &mut crate::doc::Document,
    request: ScrollRequest,
) -> Result<()> {
    let rect = match request.target {
        ScrollTarget::Rect(rect) => rect,
        ScrollTarget::Pos(pos) => cursor_coords(ed, doc, pos)?,
        ScrollTarget::Range { from, to } => {
            let a = cursor_coords(ed, doc, from)?;
            let b = cursor_coords(ed, doc, to)?;
            a.merge(&b)
        }
    };
    let geometry = ed.host.geometry();
    let width = ed.display.scroll_width.max(geometry.client_width);
    let (top, left) = calculate_scroll_pos(doc, geometry, width, rect, request.margin);
    if let Some(top) = top {
        doc.scroll_top = top;
    }
    if let Some(left) = left {
        doc.scroll_left = left;
    }
    Ok(())
}
