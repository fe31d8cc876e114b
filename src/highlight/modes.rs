//! Built-in modes.

use super::mode::{Mode, ModeState};
use super::stream::StringStream;
use super::token::TokenKind;

/// The null mode: every line is one unstyled token.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainText;

impl Mode for PlainText {
    fn name(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt"]
    }

    fn start_state(&self) -> Box<dyn ModeState> {
        Box::new(())
    }

    fn token(&self, stream: &mut StringStream<'_>, _state: &mut dyn ModeState) -> Option<TokenKind> {
        stream.skip_to_end();
        None
    }
}

/// Line state of [`CLike`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CLikeState {
    /// Inside a `/* */` comment.
    pub in_comment: bool,
    /// Inside a string continued with a trailing backslash.
    pub in_string: Option<char>,
    /// Open `{` count.
    pub depth: usize,
}

/// A small C-family tokenizer: keywords, types, atoms, numbers, strings,
/// line and block comments, and brace-based indentation.
#[derive(Clone, Debug)]
pub struct CLike {
    name: &'static str,
    extensions: &'static [&'static str],
    keywords: &'static [&'static str],
    types: &'static [&'static str],
    atoms: &'static [&'static str],
}

const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "const", "continue", "default", "do", "else", "enum", "extern",
    "for", "goto", "if", "inline", "register", "restrict", "return", "sizeof", "static",
    "struct", "switch", "typedef", "union", "volatile", "while",
];

const C_TYPES: &[&str] = &[
    "bool", "char", "double", "float", "int", "long", "short", "signed", "unsigned", "void",
    "size_t",
];

const C_ATOMS: &[&str] = &["NULL", "true", "false"];

const OPERATOR_CHARS: &str = "+-*&%=<>!?|/^~:";

impl CLike {
    #[must_use]
    pub fn c() -> Self {
        Self {
            name: "clike",
            extensions: &["c", "h"],
            keywords: C_KEYWORDS,
            types: C_TYPES,
            atoms: C_ATOMS,
        }
    }

    /// A C-like mode with custom word lists.
    #[must_use]
    pub fn custom(
        name: &'static str,
        keywords: &'static [&'static str],
        types: &'static [&'static str],
        atoms: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            extensions: &[],
            keywords,
            types,
            atoms,
        }
    }

    fn block_comment(stream: &mut StringStream<'_>, state: &mut CLikeState) -> Option<TokenKind> {
        let mut prev_star = false;
        while let Some(ch) = stream.next() {
            if prev_star && ch == '/' {
                state.in_comment = false;
                break;
            }
            prev_star = ch == '*';
        }
        Some(TokenKind::CommentBlock)
    }

    fn string(stream: &mut StringStream<'_>, state: &mut CLikeState, quote: char) -> Option<TokenKind> {
        let mut escaped = false;
        let mut closed = false;
        while let Some(ch) = stream.next() {
            if ch == quote && !escaped {
                closed = true;
                break;
            }
            escaped = !escaped && ch == '\\';
        }
        state.in_string = (!closed && escaped).then_some(quote);
        Some(TokenKind::String)
    }

    fn word_kind(&self, word: &str) -> TokenKind {
        if self.keywords.contains(&word) {
            TokenKind::Keyword
        } else if self.types.contains(&word) {
            TokenKind::KeywordType
        } else if self.atoms.contains(&word) {
            TokenKind::Constant
        } else {
            TokenKind::Identifier
        }
    }
}

impl Mode for CLike {
    fn name(&self) -> &str {
        self.name
    }

    fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn start_state(&self) -> Box<dyn ModeState> {
        Box::new(CLikeState::default())
    }

    fn token(&self, stream: &mut StringStream<'_>, state: &mut dyn ModeState) -> Option<TokenKind> {
        let Some(state) = state.as_any_mut().downcast_mut::<CLikeState>() else {
            stream.skip_to_end();
            return None;
        };
        if state.in_comment {
            return Self::block_comment(stream, state);
        }
        if let Some(quote) = state.in_string {
            return Self::string(stream, state, quote);
        }
        if stream.eat_space() {
            return None;
        }

        let ch = stream.next()?;
        match ch {
            '"' | '\'' => Self::string(stream, state, ch),
            '/' if stream.eat('*') => {
                state.in_comment = true;
                Self::block_comment(stream, state)
            }
            '/' if stream.eat('/') => {
                stream.skip_to_end();
                Some(TokenKind::Comment)
            }
            '#' if stream.column() == stream.indentation() => {
                stream.skip_to_end();
                Some(TokenKind::Attribute)
            }
            '0'..='9' => {
                stream.eat_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
                Some(TokenKind::Number)
            }
            '{' => {
                state.depth += 1;
                Some(TokenKind::Punctuation)
            }
            '}' => {
                state.depth = state.depth.saturating_sub(1);
                Some(TokenKind::Punctuation)
            }
            '(' | ')' | '[' | ']' | ';' | ',' | '.' => Some(TokenKind::Punctuation),
            c if OPERATOR_CHARS.contains(c) => {
                stream.eat_while(|c| OPERATOR_CHARS.contains(c));
                Some(TokenKind::Operator)
            }
            c if c.is_alphabetic() || c == '_' => {
                stream.eat_while(|c| c.is_alphanumeric() || c == '_');
                Some(self.word_kind(stream.current()))
            }
            _ => None,
        }
    }

    fn indent(&self, state: &dyn ModeState, text_after: &str, unit: usize) -> Option<usize> {
        let state = state.as_any().downcast_ref::<CLikeState>()?;
        if state.in_comment || state.in_string.is_some() {
            return None;
        }
        let closing = usize::from(text_after.starts_with('}'));
        Some(state.depth.saturating_sub(closing) * unit)
    }

    fn electric_chars(&self) -> &str {
        "{}"
    }
}
