//! Bidirectional text ordering.
//!
//! A simplified, single-paragraph subset of the Unicode Bidirectional
//! Algorithm (UAX #9): characters are classified with `unicode-bidi`'s
//! class tables, weak and neutral types are resolved with rules W1–W7 and
//! N1–N2, and implicit levels are assigned without building an explicit level
//! array. Explicit embedding controls are treated as neutrals. The result is a
//! list of runs in visual order.

use unicode_bidi::BidiClass;

use crate::pos::Sticky;
use crate::unicode::{char_len, is_extending_char};

/// Base text direction of a document or line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

/// A maximal span of text at one embedding level.
///
/// `from`/`to` are char columns in logical order; runs themselves are
/// listed in visual (left-to-right on screen) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BidiRun {
    pub from: usize,
    pub to: usize,
    pub level: u8,
}

impl BidiRun {
    #[must_use]
    pub const fn new(level: u8, from: usize, to: usize) -> Self {
        Self { from, to, level }
    }

    /// Whether text in this run is laid out right to left.
    #[must_use]
    pub const fn is_rtl(&self) -> bool {
        self.level % 2 == 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CharType {
    L,
    R,
    /// Arabic letter.
    Al,
    /// European number.
    En,
    /// Arabic number.
    An,
    /// European separator.
    Es,
    /// European terminator.
    Et,
    /// Common separator.
    Cs,
    /// Non-spacing mark.
    Nsm,
    /// Boundary neutral.
    Bn,
    /// Paragraph separator.
    B,
    /// Segment separator.
    S,
    Ws,
    /// Other neutral.
    On,
}

impl CharType {
    fn of(ch: char) -> Self {
        match unicode_bidi::bidi_class(ch) {
            BidiClass::L => Self::L,
            BidiClass::R => Self::R,
            BidiClass::AL => Self::Al,
            BidiClass::EN => Self::En,
            BidiClass::AN => Self::An,
            BidiClass::ES => Self::Es,
            BidiClass::ET => Self::Et,
            BidiClass::CS => Self::Cs,
            BidiClass::NSM => Self::Nsm,
            BidiClass::BN => Self::Bn,
            BidiClass::B => Self::B,
            BidiClass::S => Self::S,
            BidiClass::WS => Self::Ws,
            _ => Self::On,
        }
    }

    fn is_neutral(self) -> bool {
        matches!(self, Self::B | Self::S | Self::Ws | Self::On)
    }

    fn is_strong(self) -> bool {
        matches!(self, Self::L | Self::R | Self::Al)
    }

    fn counts_as_left(self) -> bool {
        matches!(self, Self::L | Self::Bn | Self::En | Self::An)
    }

    fn counts_as_num(self) -> bool {
        matches!(self, Self::En | Self::An)
    }
}

fn has_rtl_chars(text: &str) -> bool {
    text.chars().any(|ch| {
        matches!(
            CharType::of(ch),
            CharType::R | CharType::Al | CharType::An
        )
    })
}

/// Compute the visual runs of `text` under base direction `direction`.
///
/// Pure left-to-right text under an LTR base yields exactly one run
/// `{from: 0, to: len, level: 0}`.
#[must_use]
pub fn bidi_ordering(text: &str, direction: Direction) -> Vec<BidiRun> {
    let len = char_len(text);
    let outer = match direction {
        Direction::Ltr => CharType::L,
        Direction::Rtl => CharType::R,
    };
    if len == 0 || (direction == Direction::Ltr && !has_rtl_chars(text)) {
        let level = u8::from(direction == Direction::Rtl && len == 0);
        return vec![BidiRun::new(level, 0, len)];
    }

    let mut types: Vec<CharType> = text.chars().map(CharType::of).collect();

    // W1: non-spacing marks take the type of the previous character.
    let mut prev = outer;
    for ty in &mut types {
        if *ty == CharType::Nsm {
            *ty = prev;
        } else {
            prev = *ty;
        }
    }

    // W2 + W3: European numbers after Arabic letters become Arabic numbers,
    // Arabic letters become R.
    let mut cur = outer;
    for ty in &mut types {
        if *ty == CharType::En && cur == CharType::Al {
            *ty = CharType::An;
        } else if ty.is_strong() {
            cur = *ty;
            if *ty == CharType::Al {
                *ty = CharType::R;
            }
        }
    }

    // W4: single separators between numbers of the same kind.
    if len > 2 {
        let mut prev = types[0];
        for i in 1..len - 1 {
            let ty = types[i];
            if ty == CharType::Es && prev == CharType::En && types[i + 1] == CharType::En {
                types[i] = CharType::En;
            } else if ty == CharType::Cs
                && prev == types[i + 1]
                && matches!(prev, CharType::En | CharType::An)
            {
                types[i] = prev;
            }
            prev = ty;
        }
    }

    // W5 + W6: terminators next to European numbers become numbers, other
    // separators and terminators become neutral.
    let mut i = 0;
    while i < len {
        match types[i] {
            CharType::Cs | CharType::Es => types[i] = CharType::On,
            CharType::Et => {
                let mut end = i + 1;
                while end < len && types[end] == CharType::Et {
                    end += 1;
                }
                let touches_number = (i > 0 && types[i - 1] == CharType::En)
                    || (end < len && types[end] == CharType::En);
                let replace = if touches_number {
                    CharType::En
                } else {
                    CharType::On
                };
                for ty in &mut types[i..end] {
                    *ty = replace;
                }
                i = end - 1;
            }
            _ => {}
        }
        i += 1;
    }

    // W7: European numbers after L become L.
    let mut cur = outer;
    for ty in &mut types {
        if cur == CharType::L && *ty == CharType::En {
            *ty = CharType::L;
        } else if ty.is_strong() {
            cur = *ty;
        }
    }

    // N1 + N2: neutrals take the direction of matching surroundings,
    // otherwise the base direction.
    let mut i = 0;
    while i < len {
        if types[i].is_neutral() {
            let mut end = i + 1;
            while end < len && types[end].is_neutral() {
                end += 1;
            }
            let before = (if i > 0 { types[i - 1] } else { outer }) == CharType::L;
            let after = (if end < len { types[end] } else { outer }) == CharType::L;
            let replace = if before == after {
                if before { CharType::L } else { CharType::R }
            } else {
                outer
            };
            for ty in &mut types[i..end] {
                *ty = replace;
            }
            i = end;
        } else {
            i += 1;
        }
    }

    // With at most three levels the visual order can be built directly.
    let rtl = direction == Direction::Rtl;
    let mut order: Vec<BidiRun> = Vec::new();
    let mut i = 0;
    while i < len {
        if types[i].counts_as_left() {
            let start = i;
            i += 1;
            while i < len && types[i].counts_as_left() {
                i += 1;
            }
            order.push(BidiRun::new(0, start, i));
        } else {
            let mut pos = i;
            let mut at = order.len();
            i += 1;
            while i < len && types[i] != CharType::L {
                i += 1;
            }
            let mut j = pos;
            while j < i {
                if types[j].counts_as_num() {
                    if pos < j {
                        order.insert(at, BidiRun::new(1, pos, j));
                        at += usize::from(rtl);
                    }
                    let num_start = j;
                    j += 1;
                    while j < i && types[j].counts_as_num() {
                        j += 1;
                    }
                    order.insert(at, BidiRun::new(2, num_start, j));
                    at += usize::from(rtl);
                    pos = j;
                } else {
                    j += 1;
                }
            }
            if pos < i {
                order.insert(at, BidiRun::new(1, pos, i));
            }
        }
    }

    if !rtl {
        let leading = text.chars().take_while(|c| c.is_whitespace()).count();
        if order[0].level == 1 && leading > 0 {
            order[0].from = leading;
            order.insert(0, BidiRun::new(0, 0, leading));
        }
        let trailing = text.chars().rev().take_while(|c| c.is_whitespace()).count();
        let last = order.len() - 1;
        if order[last].level == 1 && trailing > 0 && trailing < len {
            order[last].to -= trailing;
            order.push(BidiRun::new(0, len - trailing, len));
        }
        order.retain(|run| run.from < run.to);
    } else {
        order.reverse();
    }
    order
}

/// Index of the run containing `ch`, resolving boundaries with `sticky`.
///
/// The second value is the run on the other side of a boundary, when `ch`
/// sits exactly between two runs.
#[must_use]
pub fn bidi_part_at(order: &[BidiRun], ch: usize, sticky: Sticky) -> (Option<usize>, Option<usize>) {
    let mut found = None;
    let mut other = None;
    for (i, run) in order.iter().enumerate() {
        if run.from < ch && run.to > ch {
            return (Some(i), None);
        }
        if run.to == ch {
            if run.from != run.to && sticky == Sticky::Before {
                found = Some(i);
            } else {
                other = Some(i);
            }
        }
        if run.from == ch {
            if run.from != run.to && sticky != Sticky::Before {
                found = Some(i);
            } else {
                other = Some(i);
            }
        }
    }
    match found {
        Some(found) => (Some(found), other),
        None => (other, None),
    }
}

/// Call `f(from, to, rtl)` for each part of `[from, to)` in visual order.
pub fn iterate_bidi_sections(
    order: &[BidiRun],
    from: usize,
    to: usize,
    mut f: impl FnMut(usize, usize, bool),
) {
    let mut found = false;
    for run in order {
        if (run.from < to && run.to > from) || (from == to && run.to == from) {
            f(run.from.max(from), run.to.min(to), run.is_rtl());
            found = true;
        }
    }
    if !found {
        f(from, to, false);
    }
}

/// Leftmost logical column of a line under `order`.
#[must_use]
pub fn line_left(order: &[BidiRun]) -> usize {
    order
        .first()
        .map_or(0, |run| if run.is_rtl() { run.to } else { run.from })
}

/// Rightmost logical column of a line under `order`.
#[must_use]
pub fn line_right(order: &[BidiRun]) -> usize {
    order
        .last()
        .map_or(0, |run| if run.is_rtl() { run.from } else { run.to })
}

/// Step one cluster in logical order, skipping combining marks.
#[must_use]
pub fn move_char_logically(text: &str, ch: usize, dir: i32) -> Option<usize> {
    let len = char_len(text);
    let mut target = ch as isize + dir as isize;
    let chars: Vec<char> = text.chars().collect();
    while target > 0 && (target as usize) < len && is_extending_char(chars[target as usize]) {
        target += dir as isize;
    }
    if target < 0 || target as usize > len {
        None
    } else {
        Some(target as usize)
    }
}

/// Logical one-step movement, returning the new column and its stickiness.
#[must_use]
pub fn move_logically(text: &str, ch: usize, dir: i32) -> Option<(usize, Sticky)> {
    move_char_logically(text, ch, dir).map(|ch| {
        let sticky = if dir < 0 { Sticky::After } else { Sticky::Before };
        (ch, sticky)
    })
}

/// Move one step to the left (`dir < 0`) or right (`dir > 0`) on screen.
///
/// Returns `None` when there is nowhere to go on this line.
#[must_use]
pub fn move_visually(
    text: &str,
    order: &[BidiRun],
    base: Direction,
    ch: usize,
    sticky: Sticky,
    dir: i32,
) -> Option<(usize, Sticky)> {
    let len = char_len(text);
    if order.len() <= 1 && order.first().is_none_or(|run| !run.is_rtl()) && base == Direction::Ltr {
        return move_logically(text, ch, dir);
    }
    let (ch, sticky) = if ch >= len {
        (len, Sticky::Before)
    } else if ch == 0 {
        (0, Sticky::After)
    } else {
        (ch, sticky)
    };
    let (part_pos, _) = bidi_part_at(order, ch, sticky);
    let part_pos = part_pos?;
    let part = order[part_pos];
    let within = if dir > 0 { part.to > ch } else { part.from < ch };
    if base == Direction::Ltr && part.level % 2 == 0 && within {
        return move_logically(text, ch, dir);
    }

    let mv = |pos: usize, d: i32| move_char_logically(text, pos, d);

    if base == Direction::Rtl || part.level == 1 {
        let in_storage_order = (part.level == 1) == (dir < 0);
        if let Some(next) = mv(ch, if in_storage_order { 1 } else { -1 }) {
            let ok = if in_storage_order {
                next <= part.to
            } else {
                next >= part.from
            };
            if ok {
                let sticky = if in_storage_order {
                    Sticky::Before
                } else {
                    Sticky::After
                };
                return Some((next, sticky));
            }
        }
    }

    let mut idx = part_pos as isize + dir as isize;
    while idx >= 0 && (idx as usize) < order.len() {
        let run = order[idx as usize];
        let in_storage_order = (dir > 0) == (run.level != 1);
        let start = if in_storage_order {
            Some(run.from)
        } else {
            mv(run.to, -1)
        };
        if let Some(start) = start {
            if run.from <= start && start < run.to {
                return if in_storage_order {
                    mv(start, 1).map(|c| (c, Sticky::Before))
                } else {
                    Some((start, Sticky::After))
                };
            }
        }
        idx += dir as isize;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_ltr_is_single_run() {
        let text = "Hello, world!";
        assert_eq!(
            bidi_ordering(text, Direction::Ltr),
            vec![BidiRun::new(0, 0, 13)]
        );
    }

    #[test]
    fn empty_line_has_one_empty_run() {
        assert_eq!(bidi_ordering("", Direction::Ltr), vec![BidiRun::new(0, 0, 0)]);
        assert_eq!(bidi_ordering("", Direction::Rtl), vec![BidiRun::new(1, 0, 0)]);
    }

    #[test]
    fn pure_rtl_hebrew_is_one_rtl_run() {
        let order = bidi_ordering("שלום", Direction::Ltr);
        assert_eq!(order, vec![BidiRun::new(1, 0, 4)]);
    }

    #[test]
    fn mixed_text_splits_into_runs() {
        let order = bidi_ordering("abc שלום def", Direction::Ltr);
        assert_eq!(
            order,
            vec![
                BidiRun::new(0, 0, 4),
                BidiRun::new(1, 4, 8),
                BidiRun::new(0, 8, 12),
            ]
        );
    }

    #[test]
    fn numbers_inside_rtl_get_level_two() {
        let order = bidi_ordering("אב 12 גד", Direction::Ltr);
        assert!(order.iter().any(|run| run.level == 2 && run.from == 3 && run.to == 5));
        assert!(order.iter().all(|run| run.level >= 1));
    }

    #[test]
    fn rtl_base_reverses_run_order() {
        let order = bidi_ordering("abc שלום", Direction::Rtl);
        assert_eq!(order.first().map(|r| r.level), Some(1));
        assert_eq!(order.last(), Some(&BidiRun::new(0, 0, 3)));
    }

    #[test]
    fn trailing_space_after_rtl_stays_ltr() {
        let order = bidi_ordering("שלום  ", Direction::Ltr);
        assert_eq!(order, vec![BidiRun::new(1, 0, 4), BidiRun::new(0, 4, 6)]);
    }

    #[test]
    fn part_at_boundary_respects_sticky() {
        let order = vec![BidiRun::new(0, 0, 3), BidiRun::new(1, 3, 6)];
        assert_eq!(bidi_part_at(&order, 3, Sticky::Before).0, Some(0));
        assert_eq!(bidi_part_at(&order, 3, Sticky::After).0, Some(1));
        assert_eq!(bidi_part_at(&order, 4, Sticky::None).0, Some(1));
    }

    #[test]
    fn logical_movement_skips_combining_marks() {
        let text = "e\u{0301}x";
        assert_eq!(move_char_logically(text, 0, 1), Some(2));
        assert_eq!(move_char_logically(text, 2, -1), Some(0));
        assert_eq!(move_char_logically(text, 3, 1), None);
    }

    #[test]
    fn visual_movement_inside_rtl_run_goes_backwards() {
        let text = "שלום";
        let order = bidi_ordering(text, Direction::Ltr);
        let moved = move_visually(text, &order, Direction::Ltr, 2, Sticky::None, 1);
        assert_eq!(moved.map(|(ch, _)| ch), Some(1));
    }

    #[test]
    fn visual_movement_in_ltr_text_is_logical() {
        let text = "abc";
        let order = bidi_ordering(text, Direction::Ltr);
        assert_eq!(
            move_visually(text, &order, Direction::Ltr, 1, Sticky::None, 1),
            Some((2, Sticky::Before))
        );
        assert_eq!(move_visually(text, &order, Direction::Ltr, 3, Sticky::None, 1), None);
    }
}
