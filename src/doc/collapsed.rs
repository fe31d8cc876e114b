//! Collapsed ranges, atomic cursor skipping and read-only splitting.

use std::cmp::Ordering;

use crate::doc::Document;
use crate::doc::line::LineId;
use crate::doc::marker::{MarkedSpan, MarkerId, MarkerOptions};
use crate::doc::selection::{Range, Selection};
use crate::pos::Pos;

/// Recursion limit for chains of adjacent atomic markers.
const MAX_SKIP_DEPTH: usize = 256;

/// Result of pushing a selection out of atomic ranges.
#[derive(Debug)]
pub(crate) struct SkippedSelection {
    pub sel: Selection,
    /// Markers with `clear_on_enter` that a cursor moved into.
    pub entered: Vec<MarkerId>,
    /// No valid position was found; editing must be blocked.
    pub cant_edit: bool,
}

impl Document {
    fn collapsed_span_at(&self, line: LineId, start: bool) -> Option<MarkerId> {
        self.line_ref(line)
            .marked_spans
            .iter()
            .find(|span| {
                let edge = if start { span.from } else { span.to };
                edge.is_none()
                    && self
                        .markers
                        .get(span.marker)
                        .is_some_and(|m| m.options.collapsed)
            })
            .map(|span| span.marker)
    }

    /// Collapsed marker continuing onto `line` from a previous line.
    pub(crate) fn collapsed_span_at_start(&self, line: LineId) -> Option<MarkerId> {
        self.collapsed_span_at(line, true)
    }

    /// Collapsed marker continuing past the end of `line`.
    pub(crate) fn collapsed_span_at_end(&self, line: LineId) -> Option<MarkerId> {
        self.collapsed_span_at(line, false)
    }

    /// First physical line of the visual line containing `line`.
    #[must_use]
    pub fn visual_line(&self, line: LineId) -> LineId {
        let mut cur = line;
        for _ in 0..self.store.len() {
            let Some(marker) = self.collapsed_span_at_start(cur) else {
                break;
            };
            match self.marker_start(marker) {
                Some((start, _)) if start != cur => cur = start,
                _ => break,
            }
        }
        cur
    }

    /// Last physical line of the visual line containing `line`.
    #[must_use]
    pub fn visual_line_end(&self, line: LineId) -> LineId {
        let mut cur = line;
        for _ in 0..self.store.len() {
            let Some(marker) = self.collapsed_span_at_end(cur) else {
                break;
            };
            match self.marker_end(marker) {
                Some((end, _)) if end != cur => cur = end,
                _ => break,
            }
        }
        cur
    }

    /// Physical lines merged after `line` into its visual line.
    pub(crate) fn visual_line_continued(&self, line: LineId) -> Vec<LineId> {
        let mut out = Vec::new();
        let mut cur = line;
        while let Some(marker) = self.collapsed_span_at_end(cur) {
            match self.marker_end(marker) {
                Some((end, _)) if end != cur && !out.contains(&end) => {
                    out.push(end);
                    cur = end;
                }
                _ => break,
            }
        }
        out
    }

    /// Line number of the first line of the visual line holding line `n`.
    #[must_use]
    pub fn visual_line_no(&self, n: usize) -> usize {
        let Ok(id) = self.line_handle(n) else {
            return n;
        };
        let visual = self.visual_line(id);
        if visual == id {
            return n;
        }
        self.line_no(visual).unwrap_or(n)
    }

    /// Line number just past the visual line that starts at line `n`.
    #[must_use]
    pub fn visual_line_end_no(&self, n: usize) -> usize {
        if n > self.last_line() {
            return n;
        }
        let Ok(id) = self.line_handle(n) else {
            return n;
        };
        if !self.line_is_hidden(id) {
            return n;
        }
        let mut cur = id;
        while let Some(marker) = self.collapsed_span_at_end(cur) {
            match self.marker_end(marker) {
                Some((end, _)) if end != cur => cur = end,
                _ => break,
            }
        }
        self.line_no(cur).map_or(n, |no| no + 1)
    }

    /// Whether `line` is merged into an earlier visual line by a collapsed
    /// marker, so it gets no line view of its own.
    #[must_use]
    pub fn line_is_hidden(&self, line: LineId) -> bool {
        if !self.saw_collapsed {
            return false;
        }
        self.line_ref(line).marked_spans.iter().any(|span| {
            let Some(marker) = self.markers.get(span.marker) else {
                return false;
            };
            if !marker.options.collapsed {
                return false;
            }
            if span.from.is_none() {
                return true;
            }
            marker.options.replaced_with.is_none()
                && span.from == Some(0)
                && marker.options.inclusive_left
                && self.line_is_hidden_inner(line, *span, 0)
        })
    }

    fn line_is_hidden_inner(&self, line: LineId, span: MarkedSpan, depth: usize) -> bool {
        if depth > MAX_SKIP_DEPTH {
            return false;
        }
        let Some(marker) = self.markers.get(span.marker) else {
            return false;
        };
        let Some(to) = span.to else {
            return self.marker_end(span.marker).is_some_and(|(end, _)| {
                self.span_for(end, span.marker)
                    .is_some_and(|end_span| end_span.to.is_some() && self.line_is_hidden_inner(end, end_span, depth + 1))
            });
        };
        if marker.options.inclusive_right && to == self.line_ref(line).len_chars() {
            return true;
        }
        self.line_ref(line).marked_spans.iter().any(|sp| {
            let Some(next) = self.markers.get(sp.marker) else {
                return false;
            };
            next.options.collapsed
                && next.options.replaced_with.is_none()
                && sp.from == Some(to)
                && (sp.to.is_none() || sp.to != span.from)
                && (next.options.inclusive_left || marker.options.inclusive_right)
                && self.line_is_hidden_inner(line, *sp, depth + 1)
        })
    }

    /// Length in chars of the visual line containing `line`.
    pub(crate) fn line_length(&self, line: LineId) -> usize {
        if self.line_is_hidden(line) {
            return 0;
        }
        let mut len = self.line_ref(line).len_chars() as isize;
        let mut cur = line;
        while let Some(marker) = self.collapsed_span_at_start(cur) {
            let (Some((start, from_ch)), Some((_, to_ch))) =
                (self.marker_start(marker), self.marker_end(marker))
            else {
                break;
            };
            if start == cur {
                break;
            }
            len += from_ch as isize - to_ch as isize;
            cur = start;
        }
        cur = line;
        while let Some(marker) = self.collapsed_span_at_end(cur) {
            let (Some((_, from_ch)), Some((end, to_ch))) =
                (self.marker_start(marker), self.marker_end(marker))
            else {
                break;
            };
            if end == cur {
                break;
            }
            len -= self.line_ref(cur).len_chars() as isize - from_ch as isize;
            len += self.line_ref(end).len_chars() as isize - to_ch as isize;
            cur = end;
        }
        len.max(0) as usize
    }

    /// Whether a new collapsed marker over `[from, to]` would overlap an
    /// existing collapsed marker.
    pub(crate) fn conflicting_collapsed_range(
        &self,
        from: Pos,
        to: Pos,
        options: &MarkerOptions,
    ) -> bool {
        let mut checked = Vec::new();
        for id in self.line_ids(from.line, to.line + 1) {
            for span in &self.line_ref(id).marked_spans {
                if checked.contains(&span.marker) {
                    continue;
                }
                checked.push(span.marker);
                let Some(existing) = self.markers.get(span.marker) else {
                    continue;
                };
                if !existing.options.collapsed {
                    continue;
                }
                let Some(found) = self.find_marker(span.marker) else {
                    continue;
                };
                let overlap = found.from < to && from < found.to;
                let touch_left = found.to == from
                    && existing.options.inclusive_right
                    && options.inclusive_left;
                let touch_right = found.from == to
                    && existing.options.inclusive_left
                    && options.inclusive_right;
                if overlap || touch_left || touch_right {
                    return true;
                }
            }
        }
        false
    }

    /// Step one char in `dir`, crossing line boundaries.
    pub(crate) fn move_pos(&self, pos: Pos, dir: i32) -> Option<Pos> {
        let len = self.line_len(pos.line);
        if dir < 0 && pos.ch == 0 {
            (pos.line > self.first).then(|| Pos::new(pos.line - 1, self.line_len(pos.line - 1)))
        } else if dir > 0 && pos.ch >= len {
            (pos.line < self.last_line()).then(|| Pos::new(pos.line + 1, 0))
        } else if dir < 0 {
            Some(Pos::new(pos.line, pos.ch - 1))
        } else {
            Some(Pos::new(pos.line, pos.ch + 1))
        }
    }

    fn skip_atomic_inner(
        &self,
        pos: Pos,
        old: Option<Pos>,
        dir: i32,
        may_clear: bool,
        entered: &mut Vec<MarkerId>,
        depth: usize,
    ) -> Option<Pos> {
        if depth > MAX_SKIP_DEPTH {
            return None;
        }
        let line = self.line_handle(pos.line).ok()?;
        for span in &self.line_ref(line).marked_spans {
            let Some(marker) = self.markers.get(span.marker) else {
                continue;
            };
            let left = marker.options.inclusive_left;
            let right = marker.options.inclusive_right;
            let inside = span.from.is_none_or(|f| if left { f <= pos.ch } else { f < pos.ch })
                && span.to.is_none_or(|t| if right { t >= pos.ch } else { t > pos.ch });
            if !inside {
                continue;
            }
            if may_clear && marker.options.clear_on_enter {
                if !entered.contains(&span.marker) {
                    entered.push(span.marker);
                }
                continue;
            }
            if entered.contains(&span.marker) || !marker.options.atomic {
                continue;
            }

            if let Some(old) = old {
                let mut near = if dir < 0 {
                    self.marker_end_pos(span.marker)
                } else {
                    self.marker_start_pos(span.marker)
                };
                if (dir < 0 && right) || (dir > 0 && left) {
                    near = near.and_then(|n| self.move_pos(n, -dir));
                }
                if let Some(near) = near {
                    let diff = near.cmp(&old);
                    let toward = if dir < 0 {
                        diff == Ordering::Less
                    } else {
                        diff == Ordering::Greater
                    };
                    if near.line == pos.line && toward {
                        return self.skip_atomic_inner(
                            near,
                            Some(pos),
                            dir,
                            may_clear,
                            entered,
                            depth + 1,
                        );
                    }
                }
            }

            let mut far = if dir < 0 {
                self.marker_start_pos(span.marker)
            } else {
                self.marker_end_pos(span.marker)
            };
            if (dir < 0 && left) || (dir > 0 && right) {
                far = far.and_then(|f| self.move_pos(f, dir));
            }
            return far.and_then(|far| {
                self.skip_atomic_inner(far, Some(pos), dir, may_clear, entered, depth + 1)
            });
        }
        Some(pos)
    }

    /// Move `pos` out of any atomic range, preferring the direction `bias`
    /// and falling back to the other side at document edges.
    pub(crate) fn skip_atomic(
        &self,
        pos: Pos,
        old: Option<Pos>,
        bias: i32,
        may_clear: bool,
        entered: &mut Vec<MarkerId>,
    ) -> Option<Pos> {
        let dir = if bias < 0 { -1 } else { 1 };
        self.skip_atomic_inner(pos, old, dir, may_clear, entered, 0)
            .or_else(|| {
                (!may_clear)
                    .then(|| self.skip_atomic_inner(pos, old, dir, true, entered, 0))
                    .flatten()
            })
            .or_else(|| self.skip_atomic_inner(pos, old, -dir, may_clear, entered, 0))
            .or_else(|| {
                (!may_clear)
                    .then(|| self.skip_atomic_inner(pos, old, -dir, true, entered, 0))
                    .flatten()
            })
    }

    /// Apply [`Document::skip_atomic`] to every range of `sel`.
    pub(crate) fn skip_atomic_in_selection(
        &self,
        sel: &Selection,
        bias: i32,
        may_clear: bool,
    ) -> SkippedSelection {
        let mut entered = Vec::new();
        let mut cant_edit = false;
        let fallback = Pos::new(self.first, 0);
        let mut out: Option<Vec<Range>> = None;
        let same_shape = sel.len() == self.sel.len();
        for (i, range) in sel.ranges().iter().enumerate() {
            let old = same_shape.then(|| self.sel.ranges()[i]);
            let mut skip = |pos: Pos, old: Option<Pos>| {
                self.skip_atomic(pos, old, bias, may_clear, &mut entered)
                    .unwrap_or_else(|| {
                        cant_edit = true;
                        fallback
                    })
            };
            let anchor = skip(range.anchor, old.map(|o| o.anchor));
            let head = if range.head == range.anchor {
                anchor
            } else {
                skip(range.head, old.map(|o| o.head))
            };
            if out.is_some() || anchor != range.anchor || head != range.head {
                let ranges = out.get_or_insert_with(|| sel.ranges()[..i].to_vec());
                ranges.push(Range {
                    anchor,
                    head,
                    goal_column: range.goal_column,
                });
            }
        }
        let sel = match out {
            Some(ranges) => Selection::new(ranges, sel.primary_index()),
            None => sel.clone(),
        };
        SkippedSelection {
            sel,
            entered,
            cant_edit,
        }
    }

    /// Split `[from, to]` around read-only markers. `None` when no read-only
    /// marker touches the range.
    pub(crate) fn read_only_split(&self, from: Pos, to: Pos) -> Option<Vec<(Pos, Pos)>> {
        if !self.saw_read_only {
            return None;
        }
        let mut markers = Vec::new();
        for id in self.line_ids(from.line, to.line + 1) {
            for span in &self.line_ref(id).marked_spans {
                let read_only = self
                    .markers
                    .get(span.marker)
                    .is_some_and(|m| m.options.read_only);
                if read_only && !markers.contains(&span.marker) {
                    markers.push(span.marker);
                }
            }
        }
        if markers.is_empty() {
            return None;
        }

        let mut parts = vec![(from, to)];
        for marker in markers {
            let (Some(found), Some(entry)) = (self.find_marker(marker), self.markers.get(marker))
            else {
                continue;
            };
            let mut j = 0;
            while j < parts.len() {
                let (part_from, part_to) = parts[j];
                if part_to < found.from || part_from > found.to {
                    j += 1;
                    continue;
                }
                let mut pieces = Vec::with_capacity(2);
                let dfrom = part_from.cmp(&found.from);
                let dto = part_to.cmp(&found.to);
                if dfrom == Ordering::Less
                    || (!entry.options.inclusive_left && dfrom == Ordering::Equal)
                {
                    pieces.push((part_from, found.from));
                }
                if dto == Ordering::Greater
                    || (!entry.options.inclusive_right && dto == Ordering::Equal)
                {
                    pieces.push((found.to, part_to));
                }
                let added = pieces.len();
                parts.splice(j..=j, pieces);
                j += added;
            }
        }
        Some(parts)
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::Arena;
    use crate::doc::history::{History, HistoryId};
    use crate::doc::marker::{MarkerKind, MarkerOptions};
    use crate::doc::{Document, Selection};
    use crate::error::Error;
    use crate::options::DocOptions;
    use crate::pos::Pos;

    fn doc(text: &str) -> Document {
        let mut histories: Arena<HistoryId, History> = Arena::new();
        let history = histories.insert(History::default());
        Document::new(text, DocOptions::default(), history)
    }

    fn fold(d: &mut Document, from: Pos, to: Pos) -> crate::error::Result<crate::doc::MarkerId> {
        d.mark_text_inner(from, to, MarkerOptions::collapsed(), MarkerKind::Range)
    }

    #[test]
    fn overlapping_collapsed_marker_is_rejected() {
        let mut d = doc("hello world");
        fold(&mut d, Pos::new(0, 2), Pos::new(0, 5)).unwrap();
        let before = d.all_marks();
        assert_eq!(
            fold(&mut d, Pos::new(0, 3), Pos::new(0, 7)),
            Err(Error::OverlappingCollapsedRange {
                from: Pos::new(0, 3),
                to: Pos::new(0, 7)
            })
        );
        assert_eq!(d.all_marks(), before);
        assert_eq!(d.value(), "hello world");
    }

    #[test]
    fn adjacent_collapsed_markers_are_allowed() {
        let mut d = doc("hello world");
        fold(&mut d, Pos::new(0, 2), Pos::new(0, 5)).unwrap();
        assert!(fold(&mut d, Pos::new(0, 5), Pos::new(0, 8)).is_ok());
    }

    #[test]
    fn nested_collapsed_marker_conflicts() {
        let mut d = doc("hello world");
        fold(&mut d, Pos::new(0, 1), Pos::new(0, 9)).unwrap();
        assert!(fold(&mut d, Pos::new(0, 3), Pos::new(0, 4)).is_err());
    }

    #[test]
    fn multi_line_fold_hides_lines() {
        let mut d = doc("one\ntwo\nthree\nfour");
        fold(&mut d, Pos::new(0, 2), Pos::new(2, 5)).unwrap();
        let ids = d.line_ids(0, 4);
        assert!(!d.line_is_hidden(ids[0]));
        assert!(d.line_is_hidden(ids[1]));
        assert!(d.line_is_hidden(ids[2]));
        assert!(!d.line_is_hidden(ids[3]));
        assert_eq!(d.visual_line(ids[2]), ids[0]);
        assert_eq!(d.visual_line_end(ids[0]), ids[2]);
        assert_eq!(d.visual_line_no(2), 0);
        assert_eq!(d.visual_line_end_no(1), 3);
        assert_eq!(d.visual_line_continued(ids[0]), vec![ids[2]]);
        // "on" + "" from "three" after col 5
        assert_eq!(d.line_length(ids[0]), 2);
        assert_eq!(d.line_ref(ids[1]).height(), 0.0);
    }

    #[test]
    fn cursor_is_pushed_out_of_fold() {
        let mut d = doc("hello world");
        fold(&mut d, Pos::new(0, 2), Pos::new(0, 5)).unwrap();
        let mut entered = Vec::new();
        assert_eq!(
            d.skip_atomic(Pos::new(0, 3), Some(Pos::new(0, 2)), 1, false, &mut entered),
            Some(Pos::new(0, 5))
        );
        assert_eq!(
            d.skip_atomic(Pos::new(0, 4), Some(Pos::new(0, 5)), -1, false, &mut entered),
            Some(Pos::new(0, 2))
        );
        assert_eq!(
            d.skip_atomic(Pos::new(0, 2), None, 1, false, &mut entered),
            Some(Pos::new(0, 2))
        );
    }

    #[test]
    fn selection_skip_reports_clear_on_enter() {
        let mut d = doc("abcdef");
        let options = MarkerOptions {
            clear_on_enter: true,
            ..MarkerOptions::class("x")
        };
        let id = d
            .mark_text_inner(Pos::new(0, 1), Pos::new(0, 4), options, MarkerKind::Range)
            .unwrap();
        let skipped = d.skip_atomic_in_selection(&Selection::cursor(Pos::new(0, 2)), 1, true);
        assert_eq!(skipped.entered, vec![id]);
        assert_eq!(skipped.sel.primary().head, Pos::new(0, 2));
        assert!(!skipped.cant_edit);
    }

    #[test]
    fn read_only_range_splits_change() {
        let mut d = doc("abcdefghij");
        let options = MarkerOptions {
            read_only: true,
            ..MarkerOptions::default()
        };
        d.mark_text_inner(Pos::new(0, 3), Pos::new(0, 6), options, MarkerKind::Range)
            .unwrap();
        let parts = d.read_only_split(Pos::new(0, 1), Pos::new(0, 8)).unwrap();
        assert_eq!(
            parts,
            vec![
                (Pos::new(0, 1), Pos::new(0, 3)),
                (Pos::new(0, 6), Pos::new(0, 8))
            ]
        );
        let inside = d.read_only_split(Pos::new(0, 4), Pos::new(0, 5)).unwrap();
        assert!(inside.is_empty());
        assert!(d.read_only_split(Pos::new(0, 7), Pos::new(0, 9)).is_some_and(|p| p.len() == 1));
    }
}
