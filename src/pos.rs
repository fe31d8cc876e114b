//! Document positions.
//!
//! A [`Pos`] addresses a gap between two characters: `line` is an absolute
//! line number (documents may start at a non-zero first line) and `ch` counts
//! Unicode scalar values from the start of that line.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which neighbouring character a position associates with.
///
/// Only matters at bidi boundaries and wrap points, where one offset has two
/// possible screen locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sticky {
    #[default]
    None,
    Before,
    After,
}

/// A line/column position. Comparison and equality ignore `sticky`.
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pos {
    pub line: usize,
    pub ch: usize,
    pub sticky: Sticky,
}

impl Pos {
    #[must_use]
    pub const fn new(line: usize, ch: usize) -> Self {
        Self {
            line,
            ch,
            sticky: Sticky::None,
        }
    }

    #[must_use]
    pub const fn with_sticky(line: usize, ch: usize, sticky: Sticky) -> Self {
        Self { line, ch, sticky }
    }

    #[must_use]
    pub const fn sticky(mut self, sticky: Sticky) -> Self {
        self.sticky = sticky;
        self
    }

    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if other < self { other } else { self }
    }

    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other > self { other } else { self }
    }
}

impl PartialEq for Pos {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line && self.ch == other.ch
    }
}

impl Eq for Pos {}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.ch.cmp(&other.ch))
    }
}

impl Hash for Pos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.line.hash(state);
        self.ch.hash(state);
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sticky {
            Sticky::None => write!(f, "Pos({}, {})", self.line, self.ch),
            sticky => write!(f, "Pos({}, {}, {sticky:?})", self.line, self.ch),
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.ch)
    }
}

impl From<(usize, usize)> for Pos {
    fn from((line, ch): (usize, usize)) -> Self {
        Self::new(line, ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_line_then_column() {
        assert!(Pos::new(0, 5) < Pos::new(1, 0));
        assert!(Pos::new(2, 1) < Pos::new(2, 3));
        assert_eq!(Pos::new(1, 1).cmp(&Pos::new(1, 1)), Ordering::Equal);
    }

    #[test]
    fn sticky_is_ignored_by_equality() {
        let a = Pos::with_sticky(3, 4, Sticky::Before);
        let b = Pos::new(3, 4);
        assert_eq!(a, b);
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn min_max() {
        let a = Pos::new(1, 9);
        let b = Pos::new(2, 0);
        assert_eq!(a.min(b), a);
        assert_eq!(a.max(b), b);
    }
}
