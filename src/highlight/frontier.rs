//! Incremental highlighting.
//!
//! Two watermarks track how far cached results can be trusted:
//! `mode_frontier` is the first line whose saved mode state may be stale and
//! `highlight_frontier` the first line whose styles may be stale. Edits
//! retreat both; the background slice advances `highlight_frontier` in
//! time-boxed steps. Mode states are checkpointed on every fifth line, on
//! lines in the viewport, and on the line before a requested context.

use crate::doc::{Document, LineId, LineStyles, StyleRun};
use crate::error::{Error, Result};
use crate::pos::Pos;
use crate::unicode::{byte_of, char_len, indent_column};

use super::mode::{Mode, ModeState, SavedState};
use super::stream::StringStream;
use super::token::{Token, TokenKind};

/// Consecutive non-advancing `token` calls tolerated before giving up.
const MAX_STALLED_READS: usize = 10;

/// How far back an imprecise context search looks for a saved state.
const START_LINE_SEARCH: usize = 100;

/// Editor settings the highlighter depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HighlightParams {
    pub tab_size: usize,
    pub max_highlight_length: usize,
    /// Rendered line range `[from, to)`.
    pub view: (usize, usize),
}

impl Default for HighlightParams {
    fn default() -> Self {
        Self {
            tab_size: 4,
            max_highlight_length: 10_000,
            view: (0, 0),
        }
    }
}

/// Mode state while walking lines.
#[derive(Debug)]
pub(crate) struct Context {
    pub line: usize,
    pub state: Box<dyn ModeState>,
    pub max_look_ahead: usize,
}

impl Context {
    fn new(state: Box<dyn ModeState>, line: usize) -> Self {
        Self {
            line,
            state,
            max_look_ahead: 0,
        }
    }

    fn from_saved(saved: &SavedState, line: usize) -> Self {
        Self {
            line,
            state: saved.state.as_ref().clone_state(),
            max_look_ahead: saved.look_ahead,
        }
    }

    pub(crate) fn save(&self) -> SavedState {
        SavedState::new(self.state.as_ref().clone_state(), self.max_look_ahead)
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.max_look_ahead = self.max_look_ahead.saturating_sub(1);
    }
}

/// Outcome of one background highlighting slice.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct HighlightSlice {
    /// Rendered lines whose styles changed.
    pub changed: Vec<usize>,
    pub processed: usize,
    /// The frontier reached its target; no further slice is needed.
    pub done: bool,
}

fn read_token(
    mode: &dyn Mode,
    stream: &mut StringStream<'_>,
    state: &mut dyn ModeState,
    line: usize,
) -> Result<Option<TokenKind>> {
    for _ in 0..MAX_STALLED_READS {
        let style = mode.token(stream, state);
        if stream.pos > stream.start {
            return Ok(style);
        }
    }
    tracing::warn!(mode = mode.name(), line, "mode failed to advance stream");
    Err(Error::TokenizerStalled {
        mode: mode.name().to_string(),
        line,
        column: stream.char_pos(),
    })
}

impl Document {
    /// Tokenize `text` from byte `start_at` purely to advance `ctx`.
    fn process_line(
        &self,
        mode: &dyn Mode,
        text: &str,
        ctx: &mut Context,
        start_at: usize,
        params: &HighlightParams,
    ) -> Result<()> {
        let line_no = ctx.line;
        let oracle = |n: usize| self.line(line_no + n).map(str::to_string);
        let mut stream =
            StringStream::new(text, params.tab_size).with_oracle(&oracle, ctx.max_look_ahead);
        stream.start = start_at;
        stream.pos = start_at;
        if text.is_empty() {
            mode.blank_line(ctx.state.as_mut());
        }
        while !stream.eol() {
            read_token(mode, &mut stream, ctx.state.as_mut(), line_no)?;
            stream.start = stream.pos;
        }
        ctx.max_look_ahead = stream.max_look_ahead;
        Ok(())
    }

    /// Tokenize `text` into style runs, merging adjacent tokens of the same
    /// style. Past `max_highlight_length` the rest of the line is one plain
    /// run; with `force_to_end` the mode still reads it to keep its state.
    fn run_mode(
        &self,
        mode: &dyn Mode,
        text: &str,
        ctx: &mut Context,
        params: &HighlightParams,
        force_to_end: bool,
    ) -> Result<Vec<StyleRun>> {
        let line_no = ctx.line;
        let oracle = |n: usize| self.line(line_no + n).map(str::to_string);
        let mut stream =
            StringStream::new(text, params.tab_size).with_oracle(&oracle, ctx.max_look_ahead);
        let mut runs = Vec::new();
        let mut flatten = true;
        let mut cur_start = 0;
        let mut cur_style: Option<TokenKind> = None;
        let mut start_char = 0;

        if text.is_empty() {
            mode.blank_line(ctx.state.as_mut());
        }
        while !stream.eol() {
            let style = if start_char > params.max_highlight_length {
                flatten = false;
                if force_to_end {
                    ctx.max_look_ahead = stream.max_look_ahead;
                    self.process_line(mode, text, ctx, stream.pos, params)?;
                    stream.max_look_ahead = ctx.max_look_ahead;
                }
                stream.pos = text.len();
                None
            } else {
                read_token(mode, &mut stream, ctx.state.as_mut(), line_no)?
            };
            if !flatten || cur_style != style {
                if cur_start < start_char {
                    runs.push(StyleRun {
                        end: start_char,
                        style: cur_style,
                    });
                    cur_start = start_char;
                }
                cur_style = style;
            }
            start_char += char_len(stream.current());
            stream.start = stream.pos;
        }
        if cur_start < start_char {
            runs.push(StyleRun {
                end: start_char,
                style: cur_style,
            });
        }
        ctx.max_look_ahead = stream.max_look_ahead;
        Ok(runs)
    }

    fn highlight_line(
        &self,
        mode: &dyn Mode,
        id: LineId,
        ctx: &mut Context,
        force_to_end: bool,
        params: &HighlightParams,
    ) -> Result<LineStyles> {
        let text = self.line_ref(id).text();
        let runs = self.run_mode(mode, text, ctx, params, force_to_end)?;
        Ok(LineStyles {
            mode_gen: self.mode_gen,
            runs,
        })
    }

    /// Line to resume tokenizing from when a context for line `n` is needed:
    /// the nearest line with a usable saved state, or, when none is close,
    /// the least indented line in the search window.
    fn find_start_line(&self, n: usize, precise: bool, tab_size: usize) -> usize {
        let limit = if precise {
            self.first
        } else {
            n.saturating_sub(START_LINE_SEARCH)
        };
        let mut min_line = None;
        let mut min_indent = usize::MAX;
        let mut search = n;
        loop {
            if search <= self.first {
                return self.first;
            }
            if search <= limit && !precise {
                break;
            }
            let Ok(id) = self.line_handle(search - 1) else {
                return self.first;
            };
            let line = self.line_ref(id);
            if let Some(after) = &line.state_after {
                if !precise || search + after.look_ahead <= self.mode_frontier {
                    return search;
                }
            }
            let indented = indent_column(&line.text, tab_size);
            if min_line.is_none() || min_indent > indented {
                min_line = Some(search - 1);
                min_indent = indented;
            }
            search -= 1;
        }
        min_line.unwrap_or(self.first)
    }

    /// Mode state at the start of line `n`, checkpointing along the way.
    pub(crate) fn context_before(
        &mut self,
        n: usize,
        precise: bool,
        params: &HighlightParams,
    ) -> Result<Context> {
        let mode = self.mode.clone();
        let start = self.find_start_line(n, precise, params.tab_size);
        let saved = if start > self.first {
            self.line_handle(start - 1)
                .ok()
                .and_then(|id| self.line_ref(id).state_after.clone())
        } else {
            None
        };
        let mut ctx = match saved {
            Some(saved) => Context::from_saved(&saved, start),
            None => Context::new(mode.start_state(), start),
        };
        for id in self.line_ids(start, n) {
            self.process_line(mode.as_ref(), self.line_ref(id).text(), &mut ctx, 0, params)?;
            let pos = ctx.line;
            let keep = pos + 1 == n || pos % 5 == 0 || (pos >= params.view.0 && pos < params.view.1);
            self.line_mut(id).state_after = keep.then(|| ctx.save());
            ctx.next_line();
        }
        if precise {
            self.mode_frontier = ctx.line;
        }
        Ok(ctx)
    }

    /// Styles of `id`, recomputing them when missing or stale.
    pub(crate) fn line_styles(
        &mut self,
        id: LineId,
        params: &HighlightParams,
        update_frontier: bool,
    ) -> Result<Vec<StyleRun>> {
        if let Some(styles) = &self.line_ref(id).styles {
            if styles.mode_gen == self.mode_gen {
                return Ok(styles.runs.clone());
            }
        }
        let Some(n) = self.line_no(id) else {
            return Ok(Vec::new());
        };
        let mode = self.mode.clone();
        let mut ctx = self.context_before(n, false, params)?;
        let reset = (self.line_ref(id).len_chars() > params.max_highlight_length)
            .then(|| ctx.state.as_ref().clone_state());
        let styles = self.highlight_line(mode.as_ref(), id, &mut ctx, false, params)?;
        if let Some(state) = reset {
            ctx.state = state;
        }
        let runs = styles.runs.clone();
        let line = self.line_mut(id);
        line.state_after = Some(ctx.save());
        line.styles = Some(styles);
        if update_frontier && n == self.highlight_frontier {
            self.highlight_frontier += 1;
            self.mode_frontier = self.mode_frontier.max(self.highlight_frontier);
        }
        Ok(runs)
    }

    /// Pull both frontiers back to line `n` after an edit there.
    pub(crate) fn retreat_frontier(&mut self, n: usize) {
        self.mode_frontier = self.mode_frontier.min(n);
        if self.highlight_frontier + 10 < n {
            return;
        }
        let mut start = self.first;
        let mut line = n;
        while line > start + 1 {
            line -= 1;
            let saved = self
                .line_handle(line)
                .ok()
                .and_then(|id| self.line_ref(id).state_after.as_ref().map(|s| s.look_ahead));
            if let Some(look_ahead) = saved {
                if line + look_ahead < n {
                    start = line + 1;
                    break;
                }
            }
        }
        self.highlight_frontier = self.highlight_frontier.min(start);
    }

    /// Advance `highlight_frontier` toward `view.1 + margin` until
    /// `time_up` reports the budget is spent.
    pub(crate) fn highlight_slice(
        &mut self,
        params: &HighlightParams,
        margin: usize,
        time_up: &mut dyn FnMut() -> bool,
    ) -> Result<HighlightSlice> {
        let end = self.first + self.line_count();
        let target = (params.view.1 + margin).min(end);
        if self.highlight_frontier >= target {
            return Ok(HighlightSlice {
                done: true,
                ..HighlightSlice::default()
            });
        }
        let mode = self.mode.clone();
        let mut ctx = self.context_before(self.highlight_frontier, false, params)?;
        let mut slice = HighlightSlice::default();
        for id in self.line_ids(ctx.line, target) {
            let n = ctx.line;
            let long = self.line_ref(id).len_chars() > params.max_highlight_length;
            if n >= params.view.0 {
                let reset = long.then(|| ctx.state.as_ref().clone_state());
                let styles = self.highlight_line(mode.as_ref(), id, &mut ctx, true, params)?;
                if let Some(state) = reset {
                    ctx.state = state;
                }
                let line = self.line_mut(id);
                let changed = line.styles.as_ref() != Some(&styles);
                line.styles = Some(styles);
                line.state_after = Some(ctx.save());
                if changed && n < params.view.1 {
                    slice.changed.push(n);
                }
            } else {
                if !long {
                    self.process_line(mode.as_ref(), self.line_ref(id).text(), &mut ctx, 0, params)?;
                }
                let keep = ctx.line % 5 == 0;
                self.line_mut(id).state_after = keep.then(|| ctx.save());
            }
            ctx.next_line();
            slice.processed += 1;
            if time_up() {
                break;
            }
        }
        self.highlight_frontier = ctx.line;
        self.mode_frontier = self.mode_frontier.max(ctx.line);
        slice.done = ctx.line >= target;
        Ok(slice)
    }

    fn take_tokens(
        &mut self,
        pos: Pos,
        precise: bool,
        all: bool,
        params: &HighlightParams,
    ) -> Result<Vec<Token>> {
        let pos = self.clip_pos(pos);
        let mut ctx = self.context_before(pos.line, precise, params)?;
        let mode = self.mode.clone();
        let text = self.text_of(pos.line);
        let line_no = pos.line;
        let oracle = |n: usize| self.line(line_no + n).map(str::to_string);
        let mut stream =
            StringStream::new(text, params.tab_size).with_oracle(&oracle, ctx.max_look_ahead);
        let target = byte_of(text, pos.ch);
        let mut tokens = Vec::new();
        let mut start_char = 0;
        while (all || stream.pos < target) && !stream.eol() {
            stream.start = stream.pos;
            let kind = read_token(mode.as_ref(), &mut stream, ctx.state.as_mut(), line_no)?;
            let end_char = start_char + char_len(stream.current());
            let token = Token {
                start: start_char,
                end: end_char,
                text: stream.current().to_string(),
                kind,
                state: ctx.save(),
            };
            start_char = end_char;
            if !all {
                tokens.clear();
            }
            tokens.push(token);
        }
        if tokens.is_empty() && !all {
            tokens.push(Token {
                start: start_char,
                end: start_char,
                text: String::new(),
                kind: None,
                state: ctx.save(),
            });
        }
        Ok(tokens)
    }

    /// Token ending at or after `pos`.
    pub(crate) fn token_at(&mut self, pos: Pos, precise: bool, params: &HighlightParams) -> Result<Token> {
        let mut tokens = self.take_tokens(pos, precise, false, params)?;
        tokens.pop().ok_or(Error::LineOutOfRange {
            line: pos.line,
            first: self.first,
            size: self.line_count(),
        })
    }

    /// Every token of line `n`.
    pub(crate) fn line_tokens(&mut self, n: usize, precise: bool, params: &HighlightParams) -> Result<Vec<Token>> {
        self.line_handle(n)?;
        self.take_tokens(Pos::new(n, 0), precise, true, params)
    }

    /// Style of the char before `pos`, from cached line styles.
    pub(crate) fn token_type_at(&mut self, pos: Pos, params: &HighlightParams) -> Result<Option<TokenKind>> {
        let pos = self.clip_pos(pos);
        let id = self.line_handle(pos.line)?;
        let runs = self.line_styles(id, params, false)?;
        if pos.ch == 0 {
            return Ok(runs.first().and_then(|run| run.style));
        }
        let idx = runs.partition_point(|run| run.end < pos.ch);
        Ok(runs.get(idx).and_then(|run| run.style))
    }

    /// Mode state after line `n`.
    pub(crate) fn state_after(&mut self, n: usize, precise: bool, params: &HighlightParams) -> Result<SavedState> {
        let n = self.clip_line(n);
        Ok(self.context_before(n + 1, precise, params)?.save())
    }

    /// Inner mode active at `pos`, for multiplexing modes.
    pub(crate) fn inner_mode_at(&mut self, pos: Pos, params: &HighlightParams) -> Result<Option<String>> {
        let token = self.token_at(pos, false, params)?;
        Ok(self.mode.inner_mode(token.state.state()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::arena::Arena;
    use crate::doc::{History, HistoryId};
    use crate::highlight::modes::CLike;
    use crate::options::DocOptions;

    fn doc(text: &str) -> Document {
        let mut histories: Arena<HistoryId, History> = Arena::new();
        let history = histories.insert(History::default());
        let options = DocOptions {
            mode: Some(Arc::new(CLike::c())),
            ..DocOptions::default()
        };
        Document::new(text, options, history)
    }

    fn params(view_to: usize) -> HighlightParams {
        HighlightParams {
            view: (0, view_to),
            ..HighlightParams::default()
        }
    }

    #[derive(Clone, Copy)]
    struct Stuck;

    impl Mode for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        fn start_state(&self) -> Box<dyn ModeState> {
            Box::new(())
        }

        fn token(&self, _stream: &mut StringStream<'_>, _state: &mut dyn ModeState) -> Option<TokenKind> {
            None
        }
    }

    #[test]
    fn styles_merge_equal_tokens() {
        let mut d = doc("int x;");
        let id = d.line_handle(0).unwrap();
        let runs = d.line_styles(id, &params(1), false).unwrap();
        assert_eq!(runs.last().map(|r| r.end), Some(6));
        assert_eq!(runs[0], StyleRun { end: 3, style: Some(TokenKind::KeywordType) });
    }

    #[test]
    fn comment_state_carries_across_lines() {
        let mut d = doc("/* a\nb\nc */ x");
        let id = d.line_handle(1).unwrap();
        let runs = d.line_styles(id, &params(3), false).unwrap();
        assert_eq!(runs, vec![StyleRun { end: 1, style: Some(TokenKind::CommentBlock) }]);
    }

    #[test]
    fn stalled_mode_is_an_error() {
        let mut histories: Arena<HistoryId, History> = Arena::new();
        let history = histories.insert(History::default());
        let options = DocOptions {
            mode: Some(Arc::new(Stuck)),
            ..DocOptions::default()
        };
        let mut d = Document::new("abc", options, history);
        let id = d.line_handle(0).unwrap();
        assert_eq!(
            d.line_styles(id, &params(1), false),
            Err(Error::TokenizerStalled {
                mode: "stuck".into(),
                line: 0,
                column: 0
            })
        );
    }

    #[test]
    fn long_lines_are_plain_past_the_limit() {
        let text = "x ".repeat(20);
        let mut d = doc(&text);
        let p = HighlightParams {
            max_highlight_length: 5,
            ..params(1)
        };
        let id = d.line_handle(0).unwrap();
        let runs = d.line_styles(id, &p, false).unwrap();
        assert_eq!(runs.last(), Some(&StyleRun { end: 40, style: None }));
    }

    #[test]
    fn slice_advances_frontier_and_respects_budget() {
        let text = vec!["int a;"; 50].join("\n");
        let mut d = doc(&text);
        let mut calls = 0;
        let mut budget = || {
            calls += 1;
            calls >= 10
        };
        let slice = d.highlight_slice(&params(20), 5, &mut budget).unwrap();
        assert_eq!(slice.processed, 10);
        assert!(!slice.done);
        assert_eq!(d.highlight_frontier, 10);

        let slice = d.highlight_slice(&params(20), 5, &mut || false).unwrap();
        assert!(slice.done);
        assert_eq!(d.highlight_frontier, 25);
        assert!(slice.changed.iter().all(|&n| n >= 10 && n < 20));
    }

    #[test]
    fn retreat_pulls_frontiers_back() {
        let text = vec!["int a;"; 30].join("\n");
        let mut d = doc(&text);
        d.highlight_slice(&params(30), 0, &mut || false).unwrap();
        assert_eq!(d.highlight_frontier, 30);
        d.retreat_frontier(12);
        assert_eq!(d.mode_frontier, 12);
        assert!(d.highlight_frontier <= 12);
    }

    #[test]
    fn token_queries() {
        let mut d = doc("int value = 3;");
        let p = params(1);
        let token = d.token_at(Pos::new(0, 6), false, &p).unwrap();
        assert_eq!(token.text, "value");
        assert_eq!((token.start, token.end), (4, 9));
        assert_eq!(token.kind, Some(TokenKind::Identifier));

        let tokens = d.line_tokens(0, true, &p).unwrap();
        assert_eq!(tokens.first().map(|t| t.text.as_str()), Some("int"));
        assert_eq!(tokens.last().map(|t| t.text.as_str()), Some(";"));

        assert_eq!(d.token_type_at(Pos::new(0, 2), &p).unwrap(), Some(TokenKind::KeywordType));
        assert_eq!(d.token_type_at(Pos::new(0, 13), &p).unwrap(), Some(TokenKind::Number));
    }

    #[test]
    fn state_after_reflects_open_comment() {
        let mut d = doc("/* open\nx");
        let saved = d.state_after(0, true, &params(2)).unwrap();
        assert_eq!(
            saved.downcast_ref::<crate::highlight::modes::CLikeState>().map(|s| s.in_comment),
            Some(true)
        );
    }
}
