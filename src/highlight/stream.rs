//! Character stream handed to modes while tokenizing one line.

use crate::unicode::{char_len, count_column};

/// Source of the lines after the one being tokenized. `oracle(n)` returns
/// the text `n` lines below the current one.
pub type LineOracle<'a> = &'a dyn Fn(usize) -> Option<String>;

/// A cursor over one line. Modes consume chars with the `eat*`/`next`
/// family; `start..pos` is the token being read.
pub struct StringStream<'a> {
    string: &'a str,
    pub(crate) pos: usize,
    pub(crate) start: usize,
    line_start: usize,
    tab_size: usize,
    oracle: Option<LineOracle<'a>>,
    pub(crate) max_look_ahead: usize,
}

impl std::fmt::Debug for StringStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringStream")
            .field("string", &self.string)
            .field("pos", &self.pos)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl<'a> StringStream<'a> {
    #[must_use]
    pub fn new(string: &'a str, tab_size: usize) -> Self {
        Self {
            string,
            pos: 0,
            start: 0,
            line_start: 0,
            tab_size,
            oracle: None,
            max_look_ahead: 0,
        }
    }

    #[must_use]
    pub(crate) fn with_oracle(mut self, oracle: LineOracle<'a>, max_look_ahead: usize) -> Self {
        self.oracle = Some(oracle);
        self.max_look_ahead = max_look_ahead;
        self
    }

    /// The whole line.
    #[must_use]
    pub fn string(&self) -> &'a str {
        self.string
    }

    #[must_use]
    pub fn eol(&self) -> bool {
        self.pos >= self.string.len()
    }

    #[must_use]
    pub fn sol(&self) -> bool {
        self.pos == self.line_start
    }

    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.string[self.pos..].chars().next()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consume `ch` if it is next.
    pub fn eat(&mut self, ch: char) -> bool {
        self.eat_if(|c| c == ch).is_some()
    }

    /// Consume the next char if it satisfies `f`.
    pub fn eat_if(&mut self, f: impl Fn(char) -> bool) -> Option<char> {
        let ch = self.peek()?;
        if f(ch) {
            self.pos += ch.len_utf8();
            Some(ch)
        } else {
            None
        }
    }

    /// Consume chars while they satisfy `f`. Returns whether any were eaten.
    pub fn eat_while(&mut self, f: impl Fn(char) -> bool) -> bool {
        let start = self.pos;
        while self.eat_if(&f).is_some() {}
        self.pos > start
    }

    /// Consume whitespace, including no-break spaces.
    pub fn eat_space(&mut self) -> bool {
        self.eat_while(|c| c.is_whitespace() || c == '\u{a0}')
    }

    pub fn skip_to_end(&mut self) {
        self.pos = self.string.len();
    }

    /// Move to the next occurrence of `ch`, leaving it unconsumed.
    pub fn skip_to(&mut self, ch: char) -> bool {
        match self.string[self.pos..].find(ch) {
            Some(offset) => {
                self.pos += offset;
                true
            }
            None => false,
        }
    }

    /// Un-consume `n` chars.
    pub fn back_up(&mut self, n: usize) {
        for _ in 0..n {
            match self.string[..self.pos].chars().next_back() {
                Some(ch) if self.pos > self.start => self.pos -= ch.len_utf8(),
                _ => break,
            }
        }
    }

    /// Visual column where the current token starts.
    #[must_use]
    pub fn column(&self) -> usize {
        let col = count_column(&self.string[..self.start], None, self.tab_size);
        col.saturating_sub(self.line_start_column())
    }

    /// Visual width of the line's leading whitespace.
    #[must_use]
    pub fn indentation(&self) -> usize {
        let indent = self
            .string
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(self.string.len());
        count_column(&self.string[..indent], None, self.tab_size)
            .saturating_sub(self.line_start_column())
    }

    fn line_start_column(&self) -> usize {
        if self.line_start == 0 {
            0
        } else {
            count_column(&self.string[..self.line_start], None, self.tab_size)
        }
    }

    /// Check whether `pattern` comes next, consuming it when `consume`.
    pub fn match_str(&mut self, pattern: &str, consume: bool, case_insensitive: bool) -> bool {
        let rest = &self.string[self.pos..];
        let Some(candidate) = rest.get(..pattern.len()) else {
            return false;
        };
        let matches = if case_insensitive {
            candidate.eq_ignore_ascii_case(pattern)
        } else {
            candidate == pattern
        };
        if matches && consume {
            self.pos += pattern.len();
        }
        matches
    }

    /// Text of the token read so far.
    #[must_use]
    pub fn current(&self) -> &'a str {
        &self.string[self.start..self.pos]
    }

    /// Char column of the stream position.
    #[must_use]
    pub fn char_pos(&self) -> usize {
        char_len(&self.string[..self.pos])
    }

    /// Text of the line `n` lines below this one, recording that the
    /// tokenizer depended on it.
    pub fn look_ahead(&mut self, n: usize) -> Option<String> {
        let line = (self.oracle?)(n)?;
        self.max_look_ahead = self.max_look_ahead.max(n);
        Some(line)
    }

    /// Run `inner` with the first `n` chars hidden from `sol`/`column`.
    pub fn hide_first_chars<R>(&mut self, n: usize, inner: impl FnOnce(&mut Self) -> R) -> R {
        let bytes = self.string[self.line_start..]
            .char_indices()
            .nth(n)
            .map_or(self.string.len() - self.line_start, |(idx, _)| idx);
        self.line_start += bytes;
        let result = inner(self);
        self.line_start -= bytes;
        result
    }
}
