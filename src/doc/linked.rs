//! Linked documents and markers mirrored across them.
//!
//! Linked documents share one line of descent: a change applied to one is
//! replayed on the others in the same pipeline invocation. Links may share
//! a [`History`](crate::doc::History) (same `HistoryId`) or keep separate
//! histories that get rebased by each other's changes.

use std::fmt;
use std::sync::Arc;

use crate::doc::DocId;
use crate::doc::marker::MarkerId;
use crate::highlight::Mode;

crate::arena::arena_id!(
    /// Handle of a marker mirrored into several linked documents.
    SharedMarkerId
);

/// How a linked copy is made.
#[derive(Clone, Default)]
pub struct LinkOptions {
    /// Share undo history with the source document.
    pub shared_hist: bool,
    /// First line of the source to include. Defaults to the source's first line.
    pub from: Option<usize>,
    /// Line after the last one to include. Defaults to the end of the source.
    pub to: Option<usize>,
    /// Mode for the copy. Defaults to the source's mode.
    pub mode: Option<Arc<dyn Mode>>,
}

impl fmt::Debug for LinkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkOptions")
            .field("shared_hist", &self.shared_hist)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("mode", &self.mode.as_ref().map(|m| m.name()))
            .finish()
    }
}

impl LinkOptions {
    #[must_use]
    pub fn shared_history() -> Self {
        Self {
            shared_hist: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_range(mut self, from: usize, to: usize) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// One marker per linked document, acting as a unit.
#[derive(Clone, Debug, Default)]
pub struct SharedMarker {
    pub(crate) members: Vec<(DocId, MarkerId)>,
}

impl SharedMarker {
    #[must_use]
    pub fn members(&self) -> &[(DocId, MarkerId)] {
        &self.members
    }

    /// Member marker living in `doc`.
    #[must_use]
    pub fn member_in(&self, doc: DocId) -> Option<MarkerId> {
        self.members
            .iter()
            .find(|(d, _)| *d == doc)
            .map(|&(_, marker)| marker)
    }
}
