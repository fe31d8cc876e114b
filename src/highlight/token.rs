//! Token types for syntax highlighting.

use std::ops::Range;

use crate::highlight::mode::SavedState;

/// Semantic token categories produced by modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    // Keywords
    Keyword,
    KeywordControl,
    KeywordType,
    KeywordModifier,

    // Literals
    String,
    StringEscape,
    Number,
    Boolean,

    // Identifiers
    Identifier,
    Type,
    Constant,
    Function,
    Macro,

    // Comments
    Comment,
    CommentBlock,
    CommentDoc,

    // Operators and punctuation
    Operator,
    Punctuation,
    Delimiter,

    // Special
    Attribute,
    Label,

    // Markup
    Heading,
    Link,
    Emphasis,

    // Errors
    Error,

    // Default
    Text,
}

impl TokenKind {
    /// Class name used in rendered spans, without the `cm-` prefix.
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Keyword | Self::KeywordControl | Self::KeywordModifier => "keyword",
            Self::KeywordType | Self::Type => "type",
            Self::String => "string",
            Self::StringEscape => "string-2",
            Self::Number => "number",
            Self::Boolean | Self::Constant => "atom",
            Self::Identifier => "variable",
            Self::Function => "def",
            Self::Macro => "builtin",
            Self::Comment | Self::CommentBlock | Self::CommentDoc => "comment",
            Self::Operator => "operator",
            Self::Punctuation | Self::Delimiter => "punctuation",
            Self::Attribute => "attribute",
            Self::Label => "tag",
            Self::Heading => "header",
            Self::Link => "link",
            Self::Emphasis => "em",
            Self::Error => "error",
            Self::Text => "text",
        }
    }
}

/// A token read back from a line by the token queries.
#[derive(Clone, Debug)]
pub struct Token {
    /// Char column where the token starts.
    pub start: usize,
    /// Char column just past the token.
    pub end: usize,
    pub text: String,
    pub kind: Option<TokenKind>,
    /// Mode state after the token.
    pub state: SavedState,
}

impl Token {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}
