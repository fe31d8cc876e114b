//! Cursor motion by unit, deletion by unit, named commands and indentation.
//!
//! Horizontal motion works on the document alone and honours bidi order
//! when moving visually. Vertical motion needs an editor: it maps the head
//! to pixels, steps one row or page, and maps back, keeping the range's
//! goal column so repeated moves through short lines return to the same
//! horizontal position.

use crate::doc::{DocId, Document, Origin, Range, Selection};
use crate::editor::EditorId;
use crate::engine::{Engine, ReplaceSelect, SelectOptions, extend_range};
use crate::error::Result;
use crate::pos::{Pos, Sticky};
use crate::unicode::{
    BidiRun, Direction, bidi_ordering, char_at, char_len, indent_column, indentation_string,
    is_word_char, line_left, line_right, move_logically, move_visually, next_cluster_boundary,
};
use crate::view::{Rect, measure};

/// Step size for horizontal motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    /// One grapheme cluster.
    Char,
    /// One Unicode scalar value.
    Codepoint,
    /// A run of word chars, punctuation, or a line break.
    Group,
    /// To the next word boundary, skipping anything that is not a word char.
    Word,
}

/// Step size for vertical motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalUnit {
    Line,
    Page,
}

/// Where a motion ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovedPos {
    pub pos: Pos,
    /// The motion ran into the start or end of the document.
    pub hit_side: bool,
}

/// How [`Engine::indent_line`] computes the new indentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndentHow {
    /// Ask the mode; falls back to the previous line's indentation.
    Smart,
    /// One indent unit more.
    Add,
    /// One indent unit less.
    Subtract,
    /// Same as the previous line.
    Prev,
    /// Exactly this many columns.
    Column(usize),
}

/// Named editing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    GoDocStart,
    GoDocEnd,
    GoLineStart,
    GoLineEnd,
    GoCharLeft,
    GoCharRight,
    GoGroupLeft,
    GoGroupRight,
    GoWordLeft,
    GoWordRight,
    GoLineUp,
    GoLineDown,
    GoPageUp,
    GoPageDown,
    DelCharBefore,
    DelCharAfter,
    DelWordBefore,
    DelWordAfter,
    Undo,
    Redo,
    UndoSelection,
    RedoSelection,
    SelectAll,
    SingleSelection,
    NewlineAndIndent,
    IndentMore,
    IndentLess,
    IndentAuto,
}

const COMMAND_NAMES: &[(&str, Command)] = &[
    ("goDocStart", Command::GoDocStart),
    ("goDocEnd", Command::GoDocEnd),
    ("goLineStart", Command::GoLineStart),
    ("goLineEnd", Command::GoLineEnd),
    ("goCharLeft", Command::GoCharLeft),
    ("goCharRight", Command::GoCharRight),
    ("goGroupLeft", Command::GoGroupLeft),
    ("goGroupRight", Command::GoGroupRight),
    ("goWordLeft", Command::GoWordLeft),
    ("goWordRight", Command::GoWordRight),
    ("goLineUp", Command::GoLineUp),
    ("goLineDown", Command::GoLineDown),
    ("goPageUp", Command::GoPageUp),
    ("goPageDown", Command::GoPageDown),
    ("delCharBefore", Command::DelCharBefore),
    ("delCharAfter", Command::DelCharAfter),
    ("delWordBefore", Command::DelWordBefore),
    ("delWordAfter", Command::DelWordAfter),
    ("undo", Command::Undo),
    ("redo", Command::Redo),
    ("undoSelection", Command::UndoSelection),
    ("redoSelection", Command::RedoSelection),
    ("selectAll", Command::SelectAll),
    ("singleSelection", Command::SingleSelection),
    ("newlineAndIndent", Command::NewlineAndIndent),
    ("indentMore", Command::IndentMore),
    ("indentLess", Command::IndentLess),
    ("indentAuto", Command::IndentAuto),
];

impl Command {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        COMMAND_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, command)| command)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        COMMAND_NAMES
            .iter()
            .find(|(_, c)| *c == self)
            .map_or("", |&(name, _)| name)
    }
}

/// Char class used by word and group motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CharClass {
    Word,
    Newline,
    Punct,
    Space,
}

impl Document {
    /// Position `amount` units left (negative) or right of `from`.
    ///
    /// With `visually`, steps follow the on-screen bidi order instead of
    /// the logical one. The result is moved out of atomic ranges.
    #[must_use]
    pub fn find_pos_h(&self, from: Pos, amount: i32, unit: Unit, visually: bool) -> MovedPos {
        let dir = if amount < 0 { -1 } else { 1 };
        let mut cur = MovedPos {
            pos: self.clip_pos(from),
            hit_side: false,
        };
        for _ in 0..amount.unsigned_abs() {
            cur = self.find_pos_h_once(cur.pos, dir, unit, visually);
            if cur.hit_side {
                break;
            }
        }
        cur
    }

    fn find_pos_h_once(&self, start: Pos, dir: i32, unit: Unit, visually: bool) -> MovedPos {
        let line_dir = if visually && self.direction == Direction::Rtl {
            -dir
        } else {
            dir
        };
        let mut pos = start;
        match unit {
            Unit::Char | Unit::Codepoint => {
                self.move_once(&mut pos, dir, line_dir, unit, visually, false);
            }
            Unit::Word | Unit::Group => {
                let group = unit == Unit::Group;
                let mut dir = dir;
                let mut saw: Option<CharClass> = None;
                let mut first = true;
                loop {
                    if dir < 0 && !self.move_once(&mut pos, dir, line_dir, unit, visually, !first) {
                        break;
                    }
                    let cur = char_at(self.text_of(pos.line), pos.ch).unwrap_or('\n');
                    let mut class = if is_word_char(cur) {
                        Some(CharClass::Word)
                    } else if group && cur == '\n' {
                        Some(CharClass::Newline)
                    } else if !group || cur.is_whitespace() {
                        None
                    } else {
                        Some(CharClass::Punct)
                    };
                    if group && !first && class.is_none() {
                        class = Some(CharClass::Space);
                    }
                    if saw.is_some() && saw != class {
                        if dir < 0 {
                            dir = 1;
                            self.move_once(&mut pos, dir, line_dir, unit, visually, false);
                            pos.sticky = Sticky::After;
                        }
                        break;
                    }
                    if class.is_some() {
                        saw = class;
                    }
                    if dir > 0 && !self.move_once(&mut pos, dir, line_dir, unit, visually, !first) {
                        break;
                    }
                    first = false;
                }
            }
        }
        let mut entered = Vec::new();
        let pos = self
            .skip_atomic(pos, Some(start), dir, true, &mut entered)
            .unwrap_or(start);
        MovedPos {
            pos,
            hit_side: pos == start,
        }
    }

    /// One step of `unit` from `pos`, crossing to the next line unless
    /// `bound_to_line`. Returns false when there is nowhere to go.
    fn move_once(&self, pos: &mut Pos, dir: i32, line_dir: i32, unit: Unit, visually: bool, bound_to_line: bool) -> bool {
        let text = self.text_of(pos.line);
        let sticky_for = |dir: i32| if dir < 0 { Sticky::After } else { Sticky::Before };
        let next = match unit {
            Unit::Codepoint => {
                let target = pos.ch.checked_add_signed(dir as isize);
                target
                    .filter(|&t| t <= char_len(text))
                    .map(|t| Pos::with_sticky(pos.line, t, sticky_for(dir)))
            }
            _ if visually => {
                let order = self.line_order(pos.line);
                move_visually(text, &order, self.direction, pos.ch, pos.sticky, dir)
                    .map(|(ch, sticky)| Pos::with_sticky(pos.line, ch, sticky))
            }
            Unit::Char => next_cluster_boundary(text, pos.ch, dir)
                .map(|ch| Pos::with_sticky(pos.line, ch, sticky_for(dir))),
            _ => move_logically(text, pos.ch, dir).map(|(ch, sticky)| Pos::with_sticky(pos.line, ch, sticky)),
        };
        if let Some(next) = next {
            *pos = next;
            return true;
        }
        if bound_to_line {
            return false;
        }
        let Some(line) = pos.line.checked_add_signed(line_dir as isize) else {
            return false;
        };
        if !self.is_line(line) {
            return false;
        }
        *pos = self.end_of_line(line, line_dir, visually);
        true
    }

    /// Start (`dir > 0`) or end (`dir < 0`) of line `n`, visually when asked.
    pub(crate) fn end_of_line(&self, n: usize, dir: i32, visually: bool) -> Pos {
        if visually {
            let dir = if self.direction == Direction::Rtl { -dir } else { dir };
            let order = self.line_order(n);
            let part = if dir < 0 { order.last() } else { order.first() };
            if let Some(part) = part {
                let in_storage_order = (dir < 0) == part.is_rtl();
                let ch = if dir < 0 {
                    line_right(&order)
                } else {
                    line_left(&order)
                };
                let sticky = if in_storage_order {
                    Sticky::After
                } else {
                    Sticky::Before
                };
                return Pos::with_sticky(n, ch, sticky);
            }
        }
        if dir < 0 {
            Pos::with_sticky(n, self.line_len(n), Sticky::Before)
        } else {
            Pos::with_sticky(n, 0, Sticky::After)
        }
    }

    /// Bidi order of line `n`, from the line's cache when it is current.
    fn line_order(&self, n: usize) -> Vec<BidiRun> {
        let Ok(id) = self.line_handle(n) else {
            return Vec::new();
        };
        let line = self.line_ref(id);
        match &line.order {
            Some((direction, runs)) if *direction == self.direction => runs.clone(),
            _ => bidi_ordering(&line.text, self.direction),
        }
    }
}

/// Indentation settings of the editor showing a document, or defaults.
#[derive(Clone, Copy, Debug)]
struct IndentSettings {
    tab_size: usize,
    unit: usize,
    with_tabs: bool,
    smart: bool,
    electric: bool,
}

impl Engine {
    fn indent_settings(&self, doc: DocId) -> IndentSettings {
        let defaults = crate::options::EditorOptions::default();
        let options = self
            .docs
            .get(doc)
            .and_then(|d| d.editor)
            .and_then(|e| self.editors.get(e))
            .map_or(&defaults, |e| &e.options);
        IndentSettings {
            tab_size: options.tab_size.max(1),
            unit: options.indent_unit,
            with_tabs: options.indent_with_tabs,
            smart: options.smart_indent,
            electric: options.electric_chars,
        }
    }

    /// Position `amount` units away from `from` in `doc`.
    pub fn find_pos_h(&self, doc: DocId, from: Pos, amount: i32, unit: Unit, visually: bool) -> Result<MovedPos> {
        Ok(self.doc(doc)?.find_pos_h(from, amount, unit, visually))
    }

    /// Position `amount` rows or pages below (positive) or above `from`,
    /// at horizontal pixel `goal_column` or the head's own column.
    pub fn find_pos_v(
        &mut self,
        editor: EditorId,
        from: Pos,
        amount: i32,
        unit: VerticalUnit,
        goal_column: Option<f64>,
    ) -> Result<MovedPos> {
        let (ed, doc) = self.editor_and_doc(editor)?;
        let dir = if amount < 0 { -1 } else { 1 };
        let mut cur = MovedPos {
            pos: doc.clip_pos(from),
            hit_side: false,
        };
        for _ in 0..amount.unsigned_abs() {
            let rect = measure::cursor_coords(ed, doc, cur.pos)?;
            let x = goal_column.unwrap_or(rect.left);
            cur = find_pos_v_from(ed, doc, rect, x, dir, unit)?;
            if cur.hit_side {
                break;
            }
        }
        Ok(cur)
    }

    /// Move every cursor `dir` units horizontally. Non-empty ranges
    /// collapse to their start or end unless the document is extending.
    pub fn move_h(&mut self, doc: DocId, dir: i32, unit: Unit) -> Result<()> {
        self.run_op(None, |engine| {
            let entry = engine.doc(doc)?;
            let heads: Vec<Pos> = entry
                .sel
                .ranges()
                .iter()
                .map(|range| {
                    if entry.extend || range.is_empty() {
                        entry.find_pos_h(range.head, dir, unit, true).pos
                    } else if dir < 0 {
                        range.from()
                    } else {
                        range.to()
                    }
                })
                .collect();
            engine.extend_selections(doc, &heads, SelectOptions::default().with_origin(Origin::MOVE))
        })
    }

    /// Move every cursor `dir` rows or pages, keeping goal columns.
    pub fn move_v(&mut self, editor: EditorId, dir: i32, unit: VerticalUnit) -> Result<()> {
        self.run_op(Some(editor), |engine| {
            let doc = engine.editor_doc(editor)?;
            let entry = engine.doc(doc)?;
            let extend = entry.extend;
            let collapse = !extend && entry.sel.something_selected();
            let ranges = entry.sel.ranges().to_vec();
            let primary = entry.sel.primary_index();

            let mut out = Vec::with_capacity(ranges.len());
            let mut scroll_by = None;
            for (i, range) in ranges.iter().enumerate() {
                if collapse {
                    out.push(Range::cursor(if dir < 0 { range.from() } else { range.to() }));
                    continue;
                }
                let (ed, d) = engine.editor_and_doc(editor)?;
                let head = measure::cursor_coords(ed, d, range.head)?;
                let goal = range.goal_column.unwrap_or(head.left);
                let found = find_pos_v_from(ed, d, head, goal, dir, unit)?;
                if unit == VerticalUnit::Page && i == primary {
                    let target = measure::char_coords(ed, d, found.pos)?;
                    scroll_by = Some(target.top - head.top);
                }
                let mut moved = extend_range(range, found.pos, None, extend);
                moved.goal_column = Some(goal);
                out.push(moved);
            }
            if let Some(dy) = scroll_by {
                let (ed, d) = engine.editor_and_doc(editor)?;
                let current = d.scroll_top;
                let op = ed.op();
                op.scroll_top = Some(op.scroll_top.unwrap_or(current) + dy);
            }
            let opts = SelectOptions::default().with_origin(Origin::MOVE);
            engine.set_selection_recorded(doc, Selection::new(out, primary), &opts, true)
        })
    }

    /// Delete `dir` units next to each cursor, or the selection when
    /// something is selected.
    pub fn del_h(&mut self, doc: DocId, dir: i32, unit: Unit) -> Result<()> {
        self.run_op(None, |engine| {
            let entry = engine.doc(doc)?;
            if entry.sel.something_selected() {
                return engine.replace_selection(doc, "", ReplaceSelect::End, Some(Origin::DELETE));
            }
            let mut kill: Vec<(Pos, Pos)> = Vec::new();
            for range in entry.sel.ranges() {
                let other = entry.find_pos_h(range.head, dir, unit, false).pos;
                let (mut from, to) = if dir < 0 {
                    (other, range.head)
                } else {
                    (range.head, other)
                };
                while let Some(&(last_from, last_to)) = kill.last() {
                    if from >= last_to {
                        break;
                    }
                    kill.pop();
                    if last_from < from {
                        from = last_from;
                        break;
                    }
                }
                kill.push((from, to));
            }
            for (from, to) in kill.into_iter().rev() {
                engine.replace_range(doc, "", from, to, Some(Origin::DELETE))?;
            }
            engine.ensure_cursor_visible(doc);
            Ok(())
        })
    }

    /// Run a named command on the document shown by `editor`.
    pub fn exec_command(&mut self, editor: EditorId, command: Command) -> Result<()> {
        let doc = self.editor_doc(editor)?;
        tracing::trace!(?editor, command = command.name(), "command");
        self.run_op(Some(editor), |engine| match command {
            Command::GoDocStart => {
                let first = engine.doc(doc)?.first_line();
                engine.extend_selection(doc, Pos::new(first, 0), None, SelectOptions::default().with_origin(Origin::MOVE))
            }
            Command::GoDocEnd => {
                let entry = engine.doc(doc)?;
                let last = entry.last_line();
                let end = Pos::new(last, entry.line_len(last));
                engine.extend_selection(doc, end, None, SelectOptions::default().with_origin(Origin::MOVE))
            }
            Command::GoLineStart => engine.move_to_line_edge(doc, 1),
            Command::GoLineEnd => engine.move_to_line_edge(doc, -1),
            Command::GoCharLeft => engine.move_h(doc, -1, Unit::Char),
            Command::GoCharRight => engine.move_h(doc, 1, Unit::Char),
            Command::GoGroupLeft => engine.move_h(doc, -1, Unit::Group),
            Command::GoGroupRight => engine.move_h(doc, 1, Unit::Group),
            Command::GoWordLeft => engine.move_h(doc, -1, Unit::Word),
            Command::GoWordRight => engine.move_h(doc, 1, Unit::Word),
            Command::GoLineUp => engine.move_v(editor, -1, VerticalUnit::Line),
            Command::GoLineDown => engine.move_v(editor, 1, VerticalUnit::Line),
            Command::GoPageUp => engine.move_v(editor, -1, VerticalUnit::Page),
            Command::GoPageDown => engine.move_v(editor, 1, VerticalUnit::Page),
            Command::DelCharBefore => engine.del_h(doc, -1, Unit::Codepoint),
            Command::DelCharAfter => engine.del_h(doc, 1, Unit::Char),
            Command::DelWordBefore => engine.del_h(doc, -1, Unit::Word),
            Command::DelWordAfter => engine.del_h(doc, 1, Unit::Word),
            Command::Undo => engine.undo(doc),
            Command::Redo => engine.redo(doc),
            Command::UndoSelection => engine.undo_selection(doc),
            Command::RedoSelection => engine.redo_selection(doc),
            Command::SelectAll => {
                let entry = engine.doc(doc)?;
                let last = entry.last_line();
                let (start, end) = (Pos::new(entry.first_line(), 0), Pos::new(last, entry.line_len(last)));
                engine.set_selection(doc, start, Some(end), SelectOptions::no_scroll())
            }
            Command::SingleSelection => {
                let primary = *engine.doc(doc)?.sel.primary();
                engine.set_selection(doc, primary.anchor, Some(primary.head), SelectOptions::no_scroll())
            }
            Command::NewlineAndIndent => engine.newline_and_indent(doc),
            Command::IndentMore => engine.indent_selection(doc, IndentHow::Add),
            Command::IndentLess => engine.indent_selection(doc, IndentHow::Subtract),
            Command::IndentAuto => engine.indent_selection(doc, IndentHow::Smart),
        })
    }

    /// Move every head to the visual start (`dir > 0`) or end of its line.
    fn move_to_line_edge(&mut self, doc: DocId, dir: i32) -> Result<()> {
        let entry = self.doc(doc)?;
        let heads: Vec<Pos> = entry
            .sel
            .ranges()
            .iter()
            .map(|range| {
                let n = if dir > 0 {
                    entry.visual_line_no(range.head.line)
                } else {
                    entry.visual_line_end_no(range.head.line)
                };
                entry.end_of_line(n, dir, true)
            })
            .collect();
        let opts = SelectOptions::default().with_origin(Origin::MOVE).with_bias(dir);
        self.extend_selections(doc, &heads, opts)
    }

    fn newline_and_indent(&mut self, doc: DocId) -> Result<()> {
        let entry = self.doc(doc)?;
        let sep = entry.line_separator().to_owned();
        let ranges = entry.sel.ranges().to_vec();
        for range in ranges.iter().rev() {
            self.replace_range(doc, &sep, range.anchor, range.head, Some(Origin::INPUT))?;
        }
        let lines: Vec<usize> = self.doc(doc)?.sel.ranges().iter().map(|r| r.from().line).collect();
        for line in lines {
            self.indent_line_inner(doc, line, IndentHow::Smart, true)?;
        }
        self.ensure_cursor_visible(doc);
        Ok(())
    }

    /// Reindent line `n`. Returns whether the line changed. Blank lines are
    /// left alone.
    pub fn indent_line(&mut self, doc: DocId, n: usize, how: IndentHow) -> Result<bool> {
        if !self.doc(doc)?.is_line(n) {
            return Ok(false);
        }
        self.run_op(None, |engine| engine.indent_line_inner(doc, n, how, false))
    }

    fn indent_line_inner(&mut self, doc: DocId, n: usize, how: IndentHow, aggressive: bool) -> Result<bool> {
        let settings = self.indent_settings(doc);
        let params = self.params_for(doc);
        let entry = self.doc_mut(doc)?;
        let text = entry.text_of(n).to_owned();
        let cur_space = indent_column(&text, settings.tab_size);
        let ws_chars = text.chars().take_while(|c| c.is_whitespace()).count();
        let ws_string: String = text.chars().take(ws_chars).collect();

        let indentation = if !aggressive && text.chars().all(char::is_whitespace) {
            0
        } else {
            let mut how = how;
            let mut smart = None;
            if how == IndentHow::Smart {
                let mode = entry.mode.clone();
                let ctx = entry.context_before(n, true, &params)?;
                let after: String = text.chars().skip(ws_chars).collect();
                smart = mode
                    .indent(ctx.state.as_ref(), &after, settings.unit)
                    .filter(|&cols| cols <= 150);
                if smart.is_none() {
                    how = IndentHow::Prev;
                }
            }
            match how {
                IndentHow::Smart => smart.unwrap_or(0),
                IndentHow::Prev if n > entry.first_line() => {
                    indent_column(entry.text_of(n - 1), settings.tab_size)
                }
                IndentHow::Prev => 0,
                IndentHow::Add => cur_space + settings.unit,
                IndentHow::Subtract => cur_space.saturating_sub(settings.unit),
                IndentHow::Column(cols) => cols,
            }
        };

        let indent = indentation_string(indentation, settings.tab_size, settings.with_tabs);
        if indent != ws_string {
            self.replace_range(doc, &indent, Pos::new(n, 0), Pos::new(n, ws_chars), Some(Origin::INDENT))?;
            return Ok(true);
        }
        // Cursors inside the leading whitespace move to its end.
        let entry = self.doc(doc)?;
        if let Some(i) = entry
            .sel
            .ranges()
            .iter()
            .position(|r| r.head.line == n && r.head.ch < ws_chars)
        {
            self.replace_one_selection(doc, i, Range::cursor(Pos::new(n, ws_chars)), SelectOptions::default())?;
        }
        Ok(false)
    }

    /// Indent every line touched by a non-empty range, and the line of each
    /// cursor.
    pub fn indent_selection(&mut self, doc: DocId, how: IndentHow) -> Result<()> {
        self.run_op(None, |engine| {
            let ranges = engine.doc(doc)?.sel.ranges().to_vec();
            let mut end: Option<usize> = None;
            for (i, range) in ranges.iter().enumerate() {
                if !range.is_empty() {
                    let (from, to) = (range.from(), range.to());
                    let start = end.map_or(from.line, |e| e.max(from.line));
                    let last = engine.doc(doc)?.last_line();
                    let stop = last.min(if to.ch > 0 { to.line } else { to.line.saturating_sub(1) }) + 1;
                    end = Some(stop);
                    for line in start..stop {
                        engine.indent_line_inner(doc, line, how, false)?;
                    }
                    let current = engine.doc(doc)?.sel.ranges().to_vec();
                    if from.ch == 0 && current.len() == ranges.len() && current[i].from().ch > 0 {
                        let range = Range::new(from, current[i].to());
                        engine.replace_one_selection(doc, i, range, SelectOptions::no_scroll())?;
                    }
                } else if end.is_none_or(|e| range.head.line >= e) {
                    engine.indent_line_inner(doc, range.head.line, how, true)?;
                    end = Some(range.head.line + 1);
                    if i == engine.doc(doc)?.sel.primary_index() {
                        engine.ensure_cursor_visible(doc);
                    }
                }
            }
            Ok(())
        })
    }

    /// Reindent the lines of every cursor when `typed` holds one of the
    /// mode's electric chars.
    pub(crate) fn electric_indent(&mut self, doc: DocId, typed: &str) -> Result<()> {
        let settings = self.indent_settings(doc);
        if !settings.smart || !settings.electric {
            return Ok(());
        }
        let entry = self.doc(doc)?;
        let electric = entry.mode.electric_chars();
        if electric.is_empty() || !typed.chars().any(|c| electric.contains(c)) {
            return Ok(());
        }
        let mut lines: Vec<usize> = entry.sel.ranges().iter().map(|r| r.head.line).collect();
        lines.dedup();
        for line in lines {
            self.indent_line_inner(doc, line, IndentHow::Smart, false)?;
        }
        Ok(())
    }

    fn replace_one_selection(&mut self, doc: DocId, i: usize, range: Range, opts: SelectOptions) -> Result<()> {
        let sel = &self.doc(doc)?.sel;
        let mut ranges = sel.ranges().to_vec();
        let primary = sel.primary_index();
        if let Some(slot) = ranges.get_mut(i) {
            *slot = range;
        }
        self.set_selection_recorded(doc, Selection::new(ranges, primary), &opts, true)
    }
}

/// One vertical step from the cursor rect `head` at horizontal pixel `x`.
fn find_pos_v_from(
    ed: &mut crate::editor::Editor,
    doc: &mut Document,
    head: Rect,
    x: f64,
    dir: i32,
    unit: VerticalUnit,
) -> Result<MovedPos> {
    let text_height = ed.host.text_height();
    let y = match unit {
        VerticalUnit::Page => {
            let page = ed.host.geometry().client_height;
            let amount = (page - 0.5 * text_height).max(3.0);
            let edge = if dir > 0 { head.bottom } else { head.top };
            edge + f64::from(dir) * amount
        }
        VerticalUnit::Line => {
            if dir > 0 {
                head.bottom + 0.5 * text_height
            } else {
                head.top - 0.5 * text_height
            }
        }
    };
    let hit_side = y < 0.0 || y >= doc.height();
    let target = measure::coords_char(ed, doc, x, y)?;
    Ok(MovedPos {
        pos: target.pos,
        hit_side,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::highlight::CLike;
    use crate::options::{DocOptions, EditorOptions};
    use crate::view::HeadlessHost;

    fn doc(text: &str) -> (Engine, DocId) {
        let mut engine = Engine::new();
        let doc = engine.create_doc(text, DocOptions::default());
        (engine, doc)
    }

    #[test]
    fn char_motion_crosses_lines() {
        let (engine, d) = doc("ab\ncd");
        let entry = engine.doc(d).unwrap();
        assert_eq!(entry.find_pos_h(Pos::new(0, 2), 1, Unit::Char, false).pos, Pos::new(1, 0));
        assert_eq!(entry.find_pos_h(Pos::new(1, 0), -1, Unit::Char, false).pos, Pos::new(0, 2));
        let edge = entry.find_pos_h(Pos::new(0, 0), -1, Unit::Char, false);
        assert!(edge.hit_side);
        assert_eq!(edge.pos, Pos::new(0, 0));
    }

    #[test]
    fn char_skips_combining_marks_but_codepoint_does_not() {
        let (engine, d) = doc("e\u{301}x");
        let entry = engine.doc(d).unwrap();
        assert_eq!(entry.find_pos_h(Pos::new(0, 0), 1, Unit::Char, false).pos, Pos::new(0, 2));
        assert_eq!(entry.find_pos_h(Pos::new(0, 0), 1, Unit::Codepoint, false).pos, Pos::new(0, 1));
    }

    #[test]
    fn word_and_group_boundaries() {
        let (engine, d) = doc("foo bar.baz");
        let entry = engine.doc(d).unwrap();
        assert_eq!(entry.find_pos_h(Pos::new(0, 0), 1, Unit::Word, false).pos, Pos::new(0, 3));
        assert_eq!(entry.find_pos_h(Pos::new(0, 11), -1, Unit::Word, false).pos, Pos::new(0, 8));
        assert_eq!(entry.find_pos_h(Pos::new(0, 3), 1, Unit::Group, false).pos, Pos::new(0, 7));
    }

    #[test]
    fn del_h_deletes_before_each_cursor() {
        let (mut engine, d) = doc("abc\ndef");
        engine.set_cursor(d, Pos::new(0, 1), SelectOptions::default()).unwrap();
        engine.add_selection(d, Pos::new(1, 3), None).unwrap();
        engine.del_h(d, -1, Unit::Codepoint).unwrap();
        assert_eq!(engine.doc(d).unwrap().value(), "bc\nde");
        engine.undo(d).unwrap();
        assert_eq!(engine.doc(d).unwrap().value(), "abc\ndef");
    }

    #[test]
    fn move_h_collapses_selection_first() {
        let (mut engine, d) = doc("hello");
        engine
            .set_selection(d, Pos::new(0, 1), Some(Pos::new(0, 4)), SelectOptions::default())
            .unwrap();
        engine.move_h(d, -1, Unit::Char).unwrap();
        assert_eq!(*engine.doc(d).unwrap().selection().primary(), Range::cursor(Pos::new(0, 1)));
        engine.move_h(d, 1, Unit::Char).unwrap();
        assert_eq!(engine.doc(d).unwrap().selection().primary().head, Pos::new(0, 2));
    }

    #[test]
    fn indent_add_subtract_and_column() {
        let (mut engine, d) = doc("x\n  y");
        assert!(engine.indent_line(d, 0, IndentHow::Add).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(0), Some("  x"));
        assert!(engine.indent_line(d, 1, IndentHow::Subtract).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(1), Some("y"));
        assert!(engine.indent_line(d, 1, IndentHow::Column(3)).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(1), Some("   y"));
        assert!(engine.indent_line(d, 1, IndentHow::Prev).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(1), Some("  y"));
        assert!(!engine.indent_line(d, 1, IndentHow::Prev).unwrap());
    }

    #[test]
    fn indent_measures_leading_whitespace_only() {
        let (mut engine, d) = doc("hello\n    function\nbody");
        assert!(engine.indent_line(d, 0, IndentHow::Add).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(0), Some("  hello"));
        assert!(engine.indent_line(d, 2, IndentHow::Prev).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(2), Some("    body"));
        assert!(engine.indent_line(d, 1, IndentHow::Subtract).unwrap());
        assert_eq!(engine.doc(d).unwrap().line(1), Some("  function"));
    }

    #[test]
    fn newline_in_plain_text_copies_previous_indentation() {
        let mut engine = Engine::new();
        let d = engine.create_doc("function\n  nested", DocOptions::default());
        let editor = engine
            .create_editor(d, EditorOptions::default(), Box::new(HeadlessHost::new(80.0, 10.0)))
            .unwrap();
        engine.set_cursor(d, Pos::new(0, 8), SelectOptions::default()).unwrap();
        engine.exec_command(editor, Command::NewlineAndIndent).unwrap();
        assert_eq!(engine.doc(d).unwrap().value(), "function\n\n  nested");
        engine.exec_command(editor, Command::GoDocEnd).unwrap();
        engine.exec_command(editor, Command::NewlineAndIndent).unwrap();
        assert_eq!(engine.doc(d).unwrap().value(), "function\n\n  nested\n  ");
    }

    #[test]
    fn smart_indent_uses_mode() {
        let mut engine = Engine::new();
        let d = engine.create_doc(
            "if (x) {\nfoo();\n}",
            DocOptions::default().with_mode(Arc::new(CLike::c())),
        );
        engine.indent_line(d, 1, IndentHow::Smart).unwrap();
        engine.indent_line(d, 2, IndentHow::Smart).unwrap();
        assert_eq!(engine.doc(d).unwrap().value(), "if (x) {\n  foo();\n}");
    }

    #[test]
    fn commands_by_name() {
        assert_eq!(Command::from_name("goDocEnd"), Some(Command::GoDocEnd));
        assert_eq!(Command::IndentMore.name(), "indentMore");
        assert_eq!(Command::from_name("nope"), None);
    }

    #[test]
    fn vertical_motion_keeps_goal_column() {
        let mut engine = Engine::new();
        let d = engine.create_doc("abcdef\nab\nabcdef", DocOptions::default());
        let editor = engine
            .create_editor(d, EditorOptions::default(), Box::new(HeadlessHost::new(80.0, 10.0)))
            .unwrap();
        engine.set_cursor(d, Pos::new(0, 5), SelectOptions::default()).unwrap();
        engine.exec_command(editor, Command::GoLineDown).unwrap();
        assert_eq!(engine.doc(d).unwrap().selection().primary().head, Pos::new(1, 2));
        engine.exec_command(editor, Command::GoLineDown).unwrap();
        assert_eq!(engine.doc(d).unwrap().selection().primary().head, Pos::new(2, 5));
        engine.exec_command(editor, Command::GoLineUp).unwrap();
        engine.exec_command(editor, Command::GoLineUp).unwrap();
        assert_eq!(engine.doc(d).unwrap().selection().primary().head, Pos::new(0, 5));
    }

    #[test]
    fn select_all_and_doc_edges() {
        let mut engine = Engine::new();
        let d = engine.create_doc("one\ntwo", DocOptions::default());
        let editor = engine
            .create_editor(d, EditorOptions::default(), Box::new(HeadlessHost::new(80.0, 10.0)))
            .unwrap();
        engine.exec_command(editor, Command::SelectAll).unwrap();
        assert_eq!(engine.get_selection(d, None).unwrap(), "one\ntwo");
        engine.exec_command(editor, Command::GoDocStart).unwrap();
        assert_eq!(engine.doc(d).unwrap().selection().primary().head, Pos::new(0, 0));
        engine.exec_command(editor, Command::GoLineEnd).unwrap();
        assert_eq!(engine.doc(d).unwrap().selection().primary().head, Pos::new(0, 3));
        engine.exec_command(editor, Command::NewlineAndIndent).unwrap();
        assert_eq!(engine.doc(d).unwrap().value(), "one\n\ntwo");
    }
}
