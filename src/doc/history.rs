//! Undo/redo history.
//!
//! `done` and `undone` hold alternating selection snapshots and change
//! events. A change event stores the inverse of every change it grouped, so
//! replaying it in reverse order restores the previous text. Consecutive
//! changes merge into one event when they come from the same operation, or
//! when their origins ask for it: `+`-prefixed origins merge within the
//! event delay, `*`-prefixed origins merge whenever the origin repeats.

use std::time::{Duration, Instant};

use crate::doc::change::{Change, Origin, change_end};
use crate::doc::marker::MarkerId;
use crate::doc::selection::Selection;
use crate::pos::Pos;

crate::arena::arena_id!(
    /// Handle of a history, shared between linked documents that share undo.
    HistoryId
);

/// Default number of change events kept.
pub const DEFAULT_UNDO_DEPTH: usize = 200;

/// A marker range that lived inside replaced text, restored when the
/// replacement is undone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HiddenSpan {
    pub marker: MarkerId,
    pub from: Pos,
    pub to: Pos,
}

/// Inverse of one applied change.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HistoryChange {
    pub from: Pos,
    pub to: Pos,
    pub text: Vec<String>,
    pub hidden: Vec<HiddenSpan>,
}

impl HistoryChange {
    pub(crate) fn to_change(&self, origin: Origin) -> Change {
        Change::new(self.from, self.to, self.text.clone(), Some(origin))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum HistoryEvent {
    Selection(Selection),
    Changes {
        changes: Vec<HistoryChange>,
        generation: u64,
    },
}

impl HistoryEvent {
    fn is_selection(&self) -> bool {
        matches!(self, Self::Selection(_))
    }
}

/// Which stack an undo-like operation draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryDirection {
    Undo,
    Redo,
}

impl HistoryDirection {
    #[must_use]
    pub fn origin(self) -> Origin {
        match self {
            Self::Undo => Origin::UNDO,
            Self::Redo => Origin::REDO,
        }
    }
}

#[derive(Clone, Debug)]
pub struct History {
    pub(crate) done: Vec<HistoryEvent>,
    pub(crate) undone: Vec<HistoryEvent>,
    pub(crate) undo_depth: usize,
    last_mod_time: Option<Instant>,
    last_sel_time: Option<Instant>,
    last_op: Option<u64>,
    last_sel_op: Option<u64>,
    last_origin: Option<Origin>,
    last_sel_origin: Option<Origin>,
    pub(crate) generation: u64,
    pub(crate) max_generation: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(1)
    }
}

impl History {
    #[must_use]
    pub fn new(start_generation: u64) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            undo_depth: DEFAULT_UNDO_DEPTH,
            last_mod_time: None,
            last_sel_time: None,
            last_op: None,
            last_sel_op: None,
            last_origin: None,
            last_sel_origin: None,
            generation: start_generation,
            max_generation: start_generation,
        }
    }

    /// Number of undoable and redoable change events.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        let count = |events: &[HistoryEvent]| events.iter().filter(|e| !e.is_selection()).count();
        (count(&self.done), count(&self.undone))
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop both stacks, keeping generation counters monotonic.
    pub fn clear(&mut self) {
        *self = Self {
            undo_depth: self.undo_depth,
            ..Self::new(self.max_generation)
        };
    }

    /// Close the current event so the next change starts a new one.
    pub fn close_event(&mut self) {
        self.last_op = None;
        self.last_sel_op = None;
        self.last_origin = None;
    }

    pub fn set_undo_depth(&mut self, depth: usize) {
        self.undo_depth = depth.max(1);
    }

    fn last_change_event(&mut self, force: bool) -> Option<&mut Vec<HistoryChange>> {
        if force {
            clear_selection_events(&mut self.done);
        } else if self.done.last().is_some_and(HistoryEvent::is_selection) {
            let len = self.done.len();
            if len > 1 && !self.done[len - 2].is_selection() {
                self.done.pop();
            } else {
                return None;
            }
        }
        match self.done.last_mut() {
            Some(HistoryEvent::Changes { changes, .. }) => Some(changes),
            _ => None,
        }
    }

    /// Record `change` (already carrying its removed text) as undoable.
    ///
    /// `sel_before` is pushed ahead of a new event; `sel_after` closes it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_change(
        &mut self,
        change: &Change,
        hidden: Vec<HiddenSpan>,
        sel_before: &Selection,
        sel_after: Selection,
        op_id: u64,
        now: Instant,
        event_delay: Duration,
    ) {
        self.undone.clear();
        let same_op = self.last_op == Some(op_id);
        let origin_merges = match (&change.origin, &self.last_origin) {
            (Some(origin), Some(last)) if origin == last => {
                (origin.merges_when_recent()
                    && self
                        .last_mod_time
                        .is_some_and(|t| now.saturating_duration_since(t) < event_delay))
                    || origin.merges_always()
            }
            _ => false,
        };

        let inverse = HistoryChange {
            from: change.from,
            to: change_end(change),
            text: change.removed.clone(),
            hidden,
        };

        let mut merged = false;
        if same_op || origin_merges {
            if let Some(changes) = self.last_change_event(same_op) {
                let simple_insert = change.from == change.to
                    && changes.last().is_some_and(|last| last.to == change.from)
                    && inverse.hidden.is_empty();
                if simple_insert {
                    if let Some(last) = changes.last_mut() {
                        last.to = change_end(change);
                    }
                } else {
                    changes.push(inverse.clone());
                }
                merged = true;
            }
        }

        if !merged {
            if !self.done.last().is_some_and(HistoryEvent::is_selection) {
                push_selection(&mut self.done, sel_before.clone());
            }
            self.done.push(HistoryEvent::Changes {
                changes: vec![inverse],
                generation: self.generation,
            });
            while self.done.iter().filter(|e| !e.is_selection()).count() > self.undo_depth {
                self.done.remove(0);
                if self.done.first().is_some_and(|e| !e.is_selection()) {
                    self.done.remove(0);
                }
                tracing::trace!(depth = self.undo_depth, "history depth exceeded, dropped oldest event");
            }
        }

        self.done.push(HistoryEvent::Selection(sel_after));
        self.max_generation += 1;
        self.generation = self.max_generation;
        self.last_mod_time = Some(now);
        self.last_sel_time = Some(now);
        self.last_op = Some(op_id);
        self.last_sel_op = Some(op_id);
        self.last_origin.clone_from(&change.origin);
        self.last_sel_origin.clone_from(&change.origin);
    }

    /// Record a selection change as its own undo step, merging with the
    /// previous snapshot when it belongs to the same operation or the origin
    /// allows merging.
    pub(crate) fn add_selection(
        &mut self,
        sel: Selection,
        op_id: u64,
        origin: Option<&Origin>,
        clear_redo: bool,
        now: Instant,
        event_delay: Duration,
    ) {
        let mergeable = origin.is_some_and(|origin| {
            self.last_sel_origin.as_ref() == Some(origin)
                && ((self.last_mod_time == self.last_sel_time
                    && self.last_origin.as_ref() == Some(origin))
                    || self.selection_can_merge(origin, &sel, now, event_delay))
        });

        if self.last_sel_op == Some(op_id) || mergeable {
            if self.done.last().is_some_and(HistoryEvent::is_selection) {
                let last = self.done.len() - 1;
                self.done[last] = HistoryEvent::Selection(sel);
            } else {
                self.done.push(HistoryEvent::Selection(sel));
            }
        } else {
            push_selection(&mut self.done, sel);
        }

        self.last_sel_time = Some(now);
        self.last_sel_origin = origin.cloned();
        self.last_sel_op = Some(op_id);
        if clear_redo {
            clear_selection_events(&mut self.undone);
        }
    }

    fn selection_can_merge(
        &self,
        origin: &Origin,
        sel: &Selection,
        now: Instant,
        event_delay: Duration,
    ) -> bool {
        if origin.merges_always() {
            return true;
        }
        let Some(HistoryEvent::Selection(prev)) = self.done.last() else {
            return false;
        };
        origin.merges_when_recent()
            && prev.len() == sel.len()
            && prev.something_selected() == sel.something_selected()
            && self
                .last_sel_time
                .is_some_and(|t| now.saturating_duration_since(t) <= event_delay)
    }

    /// Whether `dir` has an event that would do something for `current`.
    pub(crate) fn has_usable_event(
        &self,
        dir: HistoryDirection,
        current: &Selection,
        selection_only: bool,
    ) -> bool {
        self.stack(dir).iter().any(|event| match event {
            HistoryEvent::Selection(sel) => selection_only && sel != current,
            HistoryEvent::Changes { .. } => !selection_only,
        })
    }

    pub(crate) fn stack(&self, dir: HistoryDirection) -> &Vec<HistoryEvent> {
        match dir {
            HistoryDirection::Undo => &self.done,
            HistoryDirection::Redo => &self.undone,
        }
    }

    /// Source and destination stacks for `dir`.
    pub(crate) fn stacks_mut(
        &mut self,
        dir: HistoryDirection,
    ) -> (&mut Vec<HistoryEvent>, &mut Vec<HistoryEvent>) {
        match dir {
            HistoryDirection::Undo => (&mut self.done, &mut self.undone),
            HistoryDirection::Redo => (&mut self.undone, &mut self.done),
        }
    }

    pub(crate) fn reset_origins(&mut self) {
        self.last_origin = None;
        self.last_sel_origin = None;
    }

    /// Shift stored positions for a change applied through a linked document
    /// that does not share this history. Events overlapping the change can no
    /// longer be replayed and are dropped along with everything older.
    pub(crate) fn rebase(&mut self, change: &Change) {
        let from = change.from.line;
        let to = change.to.line;
        let diff = change.text.len() as isize - (to as isize - from as isize) - 1;
        rebase_events(&mut self.done, from, to, diff);
        rebase_events(&mut self.undone, from, to, diff);
    }
}

pub(crate) fn push_selection(dest: &mut Vec<HistoryEvent>, sel: Selection) {
    if let Some(HistoryEvent::Selection(top)) = dest.last() {
        if *top == sel {
            return;
        }
    }
    dest.push(HistoryEvent::Selection(sel));
}

fn clear_selection_events(events: &mut Vec<HistoryEvent>) {
    while events.last().is_some_and(HistoryEvent::is_selection) {
        events.pop();
    }
}

fn shift_line(line: usize, diff: isize) -> usize {
    line.saturating_add_signed(diff)
}

fn rebase_events(events: &mut Vec<HistoryEvent>, from: usize, to: usize, diff: isize) {
    let mut i = 0;
    while i < events.len() {
        let keep = match &mut events[i] {
            HistoryEvent::Selection(sel) => {
                let rebase = |pos: Pos| {
                    if to < pos.line {
                        Pos::new(shift_line(pos.line, diff), pos.ch)
                    } else if from < pos.line {
                        Pos::new(from, 0)
                    } else {
                        pos
                    }
                };
                *sel = sel.map_positions(rebase);
                true
            }
            HistoryEvent::Changes { changes, .. } => {
                let mut ok = true;
                for change in changes.iter_mut() {
                    if to < change.from.line {
                        change.from.line = shift_line(change.from.line, diff);
                        change.to.line = shift_line(change.to.line, diff);
                        for span in &mut change.hidden {
                            span.from.line = shift_line(span.from.line, diff);
                            span.to.line = shift_line(span.to.line, diff);
                        }
                    } else if from <= change.to.line {
                        ok = false;
                        break;
                    }
                }
                ok
            }
        };
        if keep {
            i += 1;
        } else {
            events.drain(..=i);
            i = 0;
        }
    }
}
