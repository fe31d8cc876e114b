//! Cluster boundaries and character classes for cursor movement.

use unicode_segmentation::UnicodeSegmentation;

/// Combining marks and other characters that attach to the preceding char.
#[must_use]
pub fn is_extending_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0300..=0x036F
            | 0x0483..=0x0489
            | 0x0591..=0x05BD
            | 0x05BF
            | 0x05C1..=0x05C2
            | 0x05C4..=0x05C5
            | 0x05C7
            | 0x0610..=0x061A
            | 0x064B..=0x065F
            | 0x0670
            | 0x06D6..=0x06DC
            | 0x06DF..=0x06E4
            | 0x06E7..=0x06E8
            | 0x06EA..=0x06ED
            | 0x0900..=0x0903
            | 0x093A..=0x094F
            | 0x1AB0..=0x1AFF
            | 0x1DC0..=0x1DFF
            | 0x200C..=0x200D
            | 0x20D0..=0x20FF
            | 0xFE00..=0xFE0F
            | 0xFE20..=0xFE2F
    )
}

/// Next grapheme-cluster boundary from char column `ch` in direction `dir`
/// (`1` forward, `-1` backward). Returns `None` at the line edge.
#[must_use]
pub fn next_cluster_boundary(text: &str, ch: usize, dir: i32) -> Option<usize> {
    let mut boundaries = Vec::new();
    let mut col = 0;
    for grapheme in text.graphemes(true) {
        boundaries.push(col);
        col += grapheme.chars().count();
    }
    boundaries.push(col);

    if dir > 0 {
        boundaries.into_iter().find(|&b| b > ch)
    } else {
        boundaries.into_iter().rev().find(|&b| b < ch)
    }
}

/// Word characters: letters, digits, underscore, and anything outside ASCII
/// that is alphanumeric.
#[must_use]
pub fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

/// Character classes used by group-wise movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharGroup {
    Word,
    Punct,
    Space,
}

#[must_use]
pub fn char_group(ch: char) -> CharGroup {
    if ch.is_whitespace() {
        CharGroup::Space
    } else if is_word_char(ch) {
        CharGroup::Word
    } else {
        CharGroup::Punct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_marks_extend() {
        assert!(is_extending_char('\u{0301}'));
        assert!(!is_extending_char('a'));
        assert!(!is_extending_char('é'));
    }

    #[test]
    fn cluster_boundaries_skip_combining_marks() {
        let text = "ae\u{0301}b";
        assert_eq!(next_cluster_boundary(text, 1, 1), Some(3));
        assert_eq!(next_cluster_boundary(text, 3, -1), Some(1));
        assert_eq!(next_cluster_boundary(text, 4, 1), None);
        assert_eq!(next_cluster_boundary(text, 0, -1), None);
    }

    #[test]
    fn cluster_boundaries_on_zwj_emoji() {
        let text = "x👨‍👩‍👧y";
        let after_emoji = next_cluster_boundary(text, 1, 1).unwrap();
        assert_eq!(after_emoji, 1 + "👨‍👩‍👧".chars().count());
    }

    #[test]
    fn char_groups() {
        assert_eq!(char_group('a'), CharGroup::Word);
        assert_eq!(char_group('_'), CharGroup::Word);
        assert_eq!(char_group(' '), CharGroup::Space);
        assert_eq!(char_group('+'), CharGroup::Punct);
        assert_eq!(char_group('ж'), CharGroup::Word);
    }
}
