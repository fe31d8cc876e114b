//! Editor and document configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::highlight::Mode;
use crate::unicode::Direction;

/// Whether an editor accepts edits from user input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadOnly {
    #[default]
    No,
    Yes,
    /// Read-only and no cursor is drawn.
    NoCursor,
}

impl ReadOnly {
    #[must_use]
    pub fn is_read_only(self) -> bool {
        self != Self::No
    }
}

/// Which input adapter captures text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputStyle {
    #[default]
    PlainField,
    EditableRegion,
}

/// Editor configuration.
///
/// Defaults match a plain code editor: no wrapping, tab size 4, left-to-right
/// text, 100 ms highlighting slices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EditorOptions {
    pub line_wrapping: bool,
    /// Lines rendered above and below the visible range.
    pub viewport_margin: usize,
    pub tab_size: usize,
    pub indent_unit: usize,
    pub indent_with_tabs: bool,
    pub smart_indent: bool,
    /// Reindent when a mode's electric char is typed.
    pub electric_chars: bool,
    pub direction: Direction,
    pub read_only: ReadOnly,
    /// Budget of one background highlighting slice.
    pub work_time: Duration,
    /// Pause between highlighting slices.
    pub work_delay: Duration,
    /// Lines past the viewport the highlighter keeps up to date.
    pub highlight_margin: usize,
    pub undo_depth: usize,
    /// Window in which `+`-origin changes merge into one history event.
    pub history_event_delay: Duration,
    pub input_style: InputStyle,
    /// `None` splits on any line break and joins with `\n`.
    pub line_separator: Option<String>,
    /// Columns highlighted per line; the rest is styled plain.
    pub max_highlight_length: usize,
    /// Pixels kept between the cursor and the viewport edge when scrolling.
    pub cursor_scroll_margin: f64,
    pub first_line_number: usize,
    /// Name of the mode to look up in the engine's registry.
    pub mode: Option<String>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            line_wrapping: false,
            viewport_margin: 10,
            tab_size: 4,
            indent_unit: 2,
            indent_with_tabs: false,
            smart_indent: true,
            electric_chars: true,
            direction: Direction::Ltr,
            read_only: ReadOnly::No,
            work_time: Duration::from_millis(100),
            work_delay: Duration::from_millis(100),
            highlight_margin: 500,
            undo_depth: 200,
            history_event_delay: Duration::from_millis(1250),
            input_style: InputStyle::PlainField,
            line_separator: None,
            max_highlight_length: 10_000,
            cursor_scroll_margin: 0.0,
            first_line_number: 0,
            mode: None,
        }
    }
}

impl EditorOptions {
    #[must_use]
    pub fn with_line_wrapping(mut self, wrap: bool) -> Self {
        self.line_wrapping = wrap;
        self
    }

    #[must_use]
    pub fn with_viewport_margin(mut self, margin: usize) -> Self {
        self.viewport_margin = margin;
        self
    }

    #[must_use]
    pub fn with_tab_size(mut self, size: usize) -> Self {
        self.tab_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_indent_unit(mut self, unit: usize) -> Self {
        self.indent_unit = unit;
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: ReadOnly) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_work_time(mut self, work_time: Duration) -> Self {
        self.work_time = work_time;
        self
    }

    #[must_use]
    pub fn with_work_delay(mut self, work_delay: Duration) -> Self {
        self.work_delay = work_delay;
        self
    }

    #[must_use]
    pub fn with_highlight_margin(mut self, lines: usize) -> Self {
        self.highlight_margin = lines;
        self
    }

    #[must_use]
    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    #[must_use]
    pub fn with_history_event_delay(mut self, delay: Duration) -> Self {
        self.history_event_delay = delay;
        self
    }

    #[must_use]
    pub fn with_input_style(mut self, style: InputStyle) -> Self {
        self.input_style = style;
        self
    }

    #[must_use]
    pub fn with_line_separator(mut self, sep: impl Into<String>) -> Self {
        self.line_separator = Some(sep.into());
        self
    }

    #[must_use]
    pub fn with_max_highlight_length(mut self, columns: usize) -> Self {
        self.max_highlight_length = columns;
        self
    }

    #[must_use]
    pub fn with_cursor_scroll_margin(mut self, pixels: f64) -> Self {
        self.cursor_scroll_margin = pixels;
        self
    }

    #[must_use]
    pub fn with_first_line_number(mut self, first: usize) -> Self {
        self.first_line_number = first;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, name: impl Into<String>) -> Self {
        self.mode = Some(name.into());
        self
    }

    /// Apply one runtime option change, reporting what must be redone.
    pub(crate) fn apply(&mut self, option: EditorOption) -> OptionEffect {
        match option {
            EditorOption::LineWrapping(wrap) => {
                self.line_wrapping = wrap;
                OptionEffect::Relayout
            }
            EditorOption::ViewportMargin(margin) => {
                self.viewport_margin = margin;
                OptionEffect::Redraw
            }
            EditorOption::TabSize(size) => {
                self.tab_size = size.max(1);
                OptionEffect::Restyle
            }
            EditorOption::IndentUnit(unit) => {
                self.indent_unit = unit;
                OptionEffect::None
            }
            EditorOption::IndentWithTabs(tabs) => {
                self.indent_with_tabs = tabs;
                OptionEffect::None
            }
            EditorOption::SmartIndent(smart) => {
                self.smart_indent = smart;
                OptionEffect::None
            }
            EditorOption::Direction(direction) => {
                self.direction = direction;
                OptionEffect::Direction
            }
            EditorOption::ReadOnly(read_only) => {
                self.read_only = read_only;
                OptionEffect::Redraw
            }
            EditorOption::WorkTime(time) => {
                self.work_time = time;
                OptionEffect::None
            }
            EditorOption::WorkDelay(delay) => {
                self.work_delay = delay;
                OptionEffect::None
            }
            EditorOption::HighlightMargin(lines) => {
                self.highlight_margin = lines;
                OptionEffect::None
            }
            EditorOption::UndoDepth(depth) => {
                self.undo_depth = depth;
                OptionEffect::History
            }
            EditorOption::HistoryEventDelay(delay) => {
                self.history_event_delay = delay;
                OptionEffect::None
            }
            EditorOption::InputStyle(style) => {
                self.input_style = style;
                OptionEffect::Input
            }
            EditorOption::LineSeparator(sep) => {
                self.line_separator = sep;
                OptionEffect::None
            }
            EditorOption::MaxHighlightLength(columns) => {
                self.max_highlight_length = columns;
                OptionEffect::Restyle
            }
            EditorOption::CursorScrollMargin(pixels) => {
                self.cursor_scroll_margin = pixels;
                OptionEffect::None
            }
            EditorOption::FirstLineNumber(first) => {
                self.first_line_number = first;
                OptionEffect::Redraw
            }
            EditorOption::Mode(name) => {
                self.mode = Some(name);
                OptionEffect::Mode
            }
        }
    }
}

/// A single option change for [`Engine::set_option`](crate::Engine::set_option).
#[derive(Clone, Debug, PartialEq)]
pub enum EditorOption {
    LineWrapping(bool),
    ViewportMargin(usize),
    TabSize(usize),
    IndentUnit(usize),
    IndentWithTabs(bool),
    SmartIndent(bool),
    Direction(Direction),
    ReadOnly(ReadOnly),
    WorkTime(Duration),
    WorkDelay(Duration),
    HighlightMargin(usize),
    UndoDepth(usize),
    HistoryEventDelay(Duration),
    InputStyle(InputStyle),
    LineSeparator(Option<String>),
    MaxHighlightLength(usize),
    CursorScrollMargin(f64),
    FirstLineNumber(usize),
    Mode(String),
}

impl EditorOption {
    /// Option name as reported by `OptionChange` events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LineWrapping(_) => "lineWrapping",
            Self::ViewportMargin(_) => "viewportMargin",
            Self::TabSize(_) => "tabSize",
            Self::IndentUnit(_) => "indentUnit",
            Self::IndentWithTabs(_) => "indentWithTabs",
            Self::SmartIndent(_) => "smartIndent",
            Self::Direction(_) => "direction",
            Self::ReadOnly(_) => "readOnly",
            Self::WorkTime(_) => "workTime",
            Self::WorkDelay(_) => "workDelay",
            Self::HighlightMargin(_) => "highlightMargin",
            Self::UndoDepth(_) => "undoDepth",
            Self::HistoryEventDelay(_) => "historyEventDelay",
            Self::InputStyle(_) => "inputStyle",
            Self::LineSeparator(_) => "lineSeparator",
            Self::MaxHighlightLength(_) => "maxHighlightLength",
            Self::CursorScrollMargin(_) => "cursorScrollMargin",
            Self::FirstLineNumber(_) => "firstLineNumber",
            Self::Mode(_) => "mode",
        }
    }
}

/// Follow-up work after an option change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OptionEffect {
    None,
    /// Rebuild every line view.
    Redraw,
    /// Re-estimate heights and rebuild every line view.
    Relayout,
    /// Drop cached styles.
    Restyle,
    Direction,
    History,
    Input,
    Mode,
}

/// Options for a new document.
#[derive(Clone, Default)]
pub struct DocOptions {
    /// Number of the first line.
    pub first_line: usize,
    pub line_separator: Option<String>,
    pub direction: Direction,
    pub mode: Option<Arc<dyn Mode>>,
}

impl fmt::Debug for DocOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocOptions")
            .field("first_line", &self.first_line)
            .field("line_separator", &self.line_separator)
            .field("direction", &self.direction)
            .field("mode", &self.mode.as_ref().map(|m| m.name()))
            .finish()
    }
}

impl DocOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: Arc<dyn Mode>) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_first_line(mut self, first: usize) -> Self {
        self.first_line = first;
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = EditorOptions::default();
        assert_eq!(opts.viewport_margin, 10);
        assert_eq!(opts.tab_size, 4);
        assert_eq!(opts.work_time, Duration::from_millis(100));
        assert_eq!(opts.highlight_margin, 500);
        assert_eq!(opts.undo_depth, 200);
        assert_eq!(opts.max_highlight_length, 10_000);
        assert!(!opts.read_only.is_read_only());
    }

    #[test]
    fn builder_and_apply() {
        let mut opts = EditorOptions::default()
            .with_tab_size(0)
            .with_line_wrapping(true);
        assert_eq!(opts.tab_size, 1);
        assert!(opts.line_wrapping);
        assert_eq!(opts.apply(EditorOption::TabSize(8)), OptionEffect::Restyle);
        assert_eq!(opts.tab_size, 8);
        assert_eq!(
            opts.apply(EditorOption::Direction(Direction::Rtl)),
            OptionEffect::Direction
        );
        assert_eq!(EditorOption::ReadOnly(ReadOnly::Yes).name(), "readOnly");
    }
}
