//! `linewise` - text editor engine
//!
//! Documents live in a B-tree line store with markers, multi-range
//! selections and undo history. Editors attach a document to a render host
//! and keep a viewport of laid-out lines in sync with it through batched
//! operations, while a time-sliced worker brings syntax highlighting up to
//! date in the background.
//!
//! All state is owned by an [`Engine`] and addressed through [`DocId`] and
//! [`EditorId`] handles. Rendering goes through the [`RenderHost`] trait;
//! [`HeadlessHost`] implements it in memory for tests and servers.

// Crate-level lint configuration
#![forbid(unsafe_code)] // Pure data structures, no FFI
#![allow(dead_code)] // Public API functions not yet used internally
#![allow(clippy::cast_possible_truncation)] // Intentional pixel/column casts
#![allow(clippy::cast_sign_loss)] // Intentional pixel/column conversions
#![allow(clippy::cast_precision_loss)] // Column counts as f64 pixels
#![allow(clippy::cast_possible_wrap)] // Line deltas as isize
#![allow(clippy::module_name_repetitions)] // Allow doc::DocOptions etc
#![allow(clippy::struct_excessive_bools)] // Options and marker flags
#![allow(clippy::missing_errors_doc)] // Docs WIP
#![allow(clippy::missing_panics_doc)] // Docs WIP
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::needless_pass_by_value)] // Allow pass by value for small Copy types
#![allow(clippy::suboptimal_flops)] // Standard math notation is clearer than mul_add
#![allow(clippy::branches_sharing_code)] // Code clarity over DRY in branching
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::cast_lossless)] // as casts are fine for primitive widening
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine
#![allow(clippy::semicolon_if_nothing_returned)] // Style preference
#![allow(clippy::needless_collect)] // Collect for assertions is clear
#![allow(clippy::type_complexity)] // Hook and listener boxes

pub mod arena;
pub mod clock;
pub mod doc;
pub mod editor;
pub mod engine;
pub mod error;
pub mod events;
pub mod highlight;
pub mod input;
pub mod movement;
pub mod options;
pub mod pos;
pub mod scheduler;
pub mod unicode;
pub mod view;

// Re-export core types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use doc::{
    Change, DocId, Document, LinkOptions, MarkerId, MarkerOptions, Origin, Range, Selection,
};
pub use editor::{Editor, EditorId};
pub use engine::{BookmarkOptions, Engine, LineClassTarget, ReplaceSelect, SelectOptions};
pub use error::{Error, Result};
pub use events::{EditorEvent, HookActions};
pub use options::{DocOptions, EditorOption, EditorOptions, InputStyle, ReadOnly};
pub use pos::{Pos, Sticky};

// Re-export highlighting types
pub use highlight::{Mode, ModeRegistry, ModeState, StringStream, Token, TokenKind};

// Re-export input and motion types
pub use input::{Captured, InputAdapter, InputEdit};
pub use movement::{Command, IndentHow, MovedPos, Unit, VerticalUnit};

// Re-export rendering types
pub use unicode::{Direction, WidthMethod};
pub use view::{HeadlessHost, RenderHost, ScrollInfo, ScrollTarget, Viewport};
