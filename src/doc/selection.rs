//! Cursor and selection ranges.

use std::fmt;

use crate::pos::Pos;

/// One selection range. `anchor` stays put while `head` moves.
#[derive(Clone, Copy, Debug, Default)]
pub struct Range {
    pub anchor: Pos,
    pub head: Pos,
    /// Horizontal pixel position kept across vertical moves.
    pub goal_column: Option<f64>,
}

impl Range {
    #[must_use]
    pub const fn new(anchor: Pos, head: Pos) -> Self {
        Self {
            anchor,
            head,
            goal_column: None,
        }
    }

    #[must_use]
    pub const fn cursor(pos: Pos) -> Self {
        Self::new(pos, pos)
    }

    #[must_use]
    pub fn from(&self) -> Pos {
        self.anchor.min(self.head)
    }

    #[must_use]
    pub fn to(&self) -> Pos {
        self.anchor.max(self.head)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head == self.anchor
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.anchor == other.anchor && self.head == other.head
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.anchor, self.head)
    }
}

/// An ordered, non-overlapping set of ranges with one primary range.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    ranges: Vec<Range>,
    primary: usize,
}

impl Selection {
    /// Build a selection, sorting and merging overlapping ranges.
    ///
    /// `primary` indexes into `ranges` before sorting; the primary range
    /// keeps its status through the merge. An empty `ranges` yields a cursor
    /// at the origin.
    #[must_use]
    pub fn new(ranges: Vec<Range>, primary: usize) -> Self {
        normalize(ranges, primary)
    }

    /// A selection holding one range.
    #[must_use]
    pub fn single(anchor: Pos, head: Pos) -> Self {
        Self {
            ranges: vec![Range::new(anchor, head)],
            primary: 0,
        }
    }

    #[must_use]
    pub fn cursor(pos: Pos) -> Self {
        Self::single(pos, pos)
    }

    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    #[must_use]
    pub fn primary(&self) -> &Range {
        &self.ranges[self.primary]
    }

    #[must_use]
    pub fn primary_index(&self) -> usize {
        self.primary
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[must_use]
    pub fn something_selected(&self) -> bool {
        self.ranges.iter().any(|range| !range.is_empty())
    }

    /// Index of the range containing `[pos, end]`, if any.
    #[must_use]
    pub fn contains(&self, pos: Pos, end: Option<Pos>) -> Option<usize> {
        let end = end.unwrap_or(pos);
        self.ranges
            .iter()
            .position(|range| range.from() <= end && range.to() >= pos)
    }

    /// Whether the selection is already sorted and free of overlaps.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.primary < self.ranges.len()
            && self
                .ranges
                .windows(2)
                .all(|pair| pair[0].to() < pair[1].from())
    }

    pub(crate) fn into_parts(self) -> (Vec<Range>, usize) {
        (self.ranges, self.primary)
    }

    /// Apply `f` to every position, then renormalize.
    #[must_use]
    pub fn map_positions(&self, mut f: impl FnMut(Pos) -> Pos) -> Self {
        let ranges = self
            .ranges
            .iter()
            .map(|range| Range::new(f(range.anchor), f(range.head)))
            .collect();
        normalize(ranges, self.primary)
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::cursor(Pos::default())
    }
}

/// Sort ranges by start and merge the ones that overlap or touch.
fn normalize(ranges: Vec<Range>, primary: usize) -> Selection {
    if ranges.is_empty() {
        return Selection::default();
    }
    let primary = primary.min(ranges.len() - 1);
    let mut tagged: Vec<(bool, Range)> = ranges
        .into_iter()
        .enumerate()
        .map(|(i, range)| (i == primary, range))
        .collect();
    tagged.sort_by(|a, b| a.1.from().cmp(&b.1.from()));

    let mut out: Vec<(bool, Range)> = Vec::with_capacity(tagged.len());
    for (is_primary, cur) in tagged {
        let Some((prev_primary, prev)) = out.last_mut() else {
            out.push((is_primary, cur));
            continue;
        };
        if prev.to() >= cur.from() {
            let from = prev.from().min(cur.from());
            let to = prev.to().max(cur.to());
            let inverted = if prev.is_empty() {
                cur.from() == cur.head
            } else {
                prev.from() == prev.head
            };
            *prev = if inverted {
                Range::new(to, from)
            } else {
                Range::new(from, to)
            };
            *prev_primary |= is_primary;
        } else {
            out.push((is_primary, cur));
        }
    }

    let primary = out.iter().position(|(is_primary, _)| *is_primary).unwrap_or(0);
    Selection {
        ranges: out.into_iter().map(|(_, range)| range).collect(),
        primary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(line: usize, ch: usize) -> Pos {
        Pos::new(line, ch)
    }

    #[test]
    fn overlapping_ranges_merge() {
        let sel = Selection::new(
            vec![
                Range::new(p(0, 5), p(0, 9)),
                Range::new(p(0, 0), p(0, 6)),
                Range::new(p(1, 0), p(1, 1)),
            ],
            0,
        );
        assert_eq!(sel.len(), 2);
        assert_eq!(sel.ranges()[0], Range::new(p(0, 0), p(0, 9)));
        assert_eq!(sel.primary_index(), 0);
        assert!(sel.is_normalized());
    }

    #[test]
    fn touching_cursors_merge() {
        let sel = Selection::new(
            vec![Range::cursor(p(2, 3)), Range::cursor(p(2, 3))],
            1,
        );
        assert_eq!(sel.len(), 1);
        assert_eq!(sel.primary().head, p(2, 3));
    }

    #[test]
    fn merge_keeps_backward_direction() {
        let sel = Selection::new(
            vec![Range::new(p(0, 4), p(0, 0)), Range::new(p(0, 6), p(0, 2))],
            0,
        );
        assert_eq!(sel.ranges(), &[Range::new(p(0, 6), p(0, 0))]);
    }

    #[test]
    fn primary_follows_sorting() {
        let sel = Selection::new(
            vec![Range::cursor(p(5, 0)), Range::cursor(p(1, 0))],
            0,
        );
        assert_eq!(sel.primary().head, p(5, 0));
        assert_eq!(sel.primary_index(), 1);
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let sel = Selection::new(
            vec![
                Range::new(p(3, 1), p(0, 2)),
                Range::cursor(p(1, 1)),
                Range::new(p(4, 0), p(4, 2)),
            ],
            2,
        );
        let (ranges, primary) = sel.clone().into_parts();
        assert_eq!(Selection::new(ranges, primary), sel);
    }

    #[test]
    fn contains_finds_range() {
        let sel = Selection::new(
            vec![Range::new(p(0, 0), p(0, 3)), Range::cursor(p(2, 0))],
            0,
        );
        assert_eq!(sel.contains(p(0, 2), None), Some(0));
        assert_eq!(sel.contains(p(1, 0), None), None);
        assert!(sel.something_selected());
    }
}
