//! The tokenizer capability and mode lookup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::stream::StringStream;
use super::token::TokenKind;

/// Per-line tokenizer state, opaque to the engine.
///
/// Implemented for every `Clone + Debug + Send + 'static` type, so a mode
/// only has to pick a state struct and downcast it in [`Mode::token`].
pub trait ModeState: Any + fmt::Debug + Send {
    fn clone_state(&self) -> Box<dyn ModeState>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + fmt::Debug + Send> ModeState for T {
    fn clone_state(&self) -> Box<dyn ModeState> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A tokenizer. Modes turn one line at a time into styled tokens, carrying
/// state from line to line.
pub trait Mode: Send + Sync {
    /// Human-readable name of this mode.
    fn name(&self) -> &str;

    /// File extensions this mode handles (e.g. `c`, `h`).
    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    /// State at the top of the document.
    fn start_state(&self) -> Box<dyn ModeState>;

    /// Read one token from `stream`, advancing it by at least one char.
    fn token(&self, stream: &mut StringStream<'_>, state: &mut dyn ModeState) -> Option<TokenKind>;

    /// Called for empty lines, which never reach [`Mode::token`].
    fn blank_line(&self, _state: &mut dyn ModeState) {}

    /// Indentation in columns for a line starting with `text_after`, or
    /// `None` when the mode has no opinion.
    fn indent(&self, _state: &dyn ModeState, _text_after: &str, _unit: usize) -> Option<usize> {
        None
    }

    /// Name of the nested mode active in `state`, for multiplexing modes.
    fn inner_mode(&self, _state: &dyn ModeState) -> Option<String> {
        None
    }

    /// Maximum number of lines [`StringStream::look_ahead`] may peek.
    fn lookahead(&self) -> usize {
        0
    }

    /// Chars that trigger reindentation when typed.
    fn electric_chars(&self) -> &str {
        ""
    }
}

/// A checkpoint stored on a line: the mode state after it, plus how many
/// following lines the tokenizer looked at to produce it.
#[derive(Debug)]
pub struct SavedState {
    pub(crate) state: Box<dyn ModeState>,
    pub(crate) look_ahead: usize,
}

impl SavedState {
    #[must_use]
    pub fn new(state: Box<dyn ModeState>, look_ahead: usize) -> Self {
        Self { state, look_ahead }
    }

    #[must_use]
    pub fn state(&self) -> &dyn ModeState {
        self.state.as_ref()
    }

    /// Downcast the state to the mode's concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.state.as_ref().as_any().downcast_ref::<T>()
    }

    #[must_use]
    pub fn look_ahead(&self) -> usize {
        self.look_ahead
    }
}

impl Clone for SavedState {
    fn clone(&self) -> Self {
        Self {
            state: self.state.as_ref().clone_state(),
            look_ahead: self.look_ahead,
        }
    }
}

/// Registry for mode lookup by name or extension.
#[derive(Default)]
pub struct ModeRegistry {
    modes: Vec<Arc<dyn Mode>>,
    by_extension: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.modes.iter().map(|m| m.name().to_string()))
            .finish()
    }
}

impl ModeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mode. Later registrations override existing lookups.
    pub fn register(&mut self, mode: Arc<dyn Mode>) {
        let index = self.modes.len();
        self.by_name.insert(mode.name().to_ascii_lowercase(), index);
        for ext in mode.extensions() {
            let key = ext.trim_start_matches('.').to_ascii_lowercase();
            if !key.is_empty() {
                self.by_extension.insert(key, index);
            }
        }
        self.modes.push(mode);
    }

    /// Get a mode by name (case-insensitive).
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Mode>> {
        let index = self.by_name.get(&name.to_ascii_lowercase())?;
        self.modes.get(*index).cloned()
    }

    /// Get a mode by file extension (case-insensitive, with or without dot).
    #[must_use]
    pub fn for_extension(&self, ext: &str) -> Option<Arc<dyn Mode>> {
        let key = ext.trim_start_matches('.').to_ascii_lowercase();
        let index = self.by_extension.get(&key)?;
        self.modes.get(*index).cloned()
    }

    /// Create a registry holding the built-in modes.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::modes::PlainText));
        registry.register(Arc::new(super::modes::CLike::c()));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Depth(u32);

    #[test]
    fn saved_state_clones_and_downcasts() {
        let saved = SavedState::new(Box::new(Depth(3)), 1);
        let copy = saved.clone();
        assert_eq!(copy.downcast_ref::<Depth>(), Some(&Depth(3)));
        assert_eq!(copy.look_ahead(), 1);
        assert!(copy.downcast_ref::<String>().is_none());
    }

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let registry = ModeRegistry::with_builtins();
        assert!(registry.by_name("CLIKE").is_some());
        assert!(registry.by_name("text").is_some());
        assert!(registry.for_extension(".H").is_some());
        assert!(registry.by_name("cobol").is_none());
    }
}
