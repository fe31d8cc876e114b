//! Syntax highlighting: the mode capability, built-in modes and the
//! incremental frontier machinery.

pub(crate) mod frontier;
pub mod mode;
pub mod modes;
pub mod stream;
pub mod token;

pub(crate) use frontier::HighlightParams;
pub use mode::{Mode, ModeRegistry, ModeState, SavedState};
pub use modes::{CLike, CLikeState, PlainText};
pub use stream::{LineOracle, StringStream};
pub use token::{Token, TokenKind};
