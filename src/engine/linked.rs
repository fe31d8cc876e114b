//! Linked documents: creation, unlinking and history splitting.

use std::sync::Arc;

use crate::doc::{DocId, DocLink, Document, LinkOptions, MarkerKind, MarkerOptions};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::options::DocOptions;
use crate::pos::Pos;

impl Engine {
    /// Create a document linked to `doc`, holding lines `[from, to)` of it.
    ///
    /// Changes to either document are applied to the other. Lines outside
    /// the copy's range are clipped away. Shared markers of `doc` are
    /// mirrored into the copy.
    pub fn link_doc(&mut self, doc: DocId, options: LinkOptions) -> Result<DocId> {
        let parent = self.doc(doc)?;
        let first = parent.first_line();
        let end = first + parent.line_count();
        let from = options.from.map_or(first, |f| f.clamp(first, end - 1));
        let to = options.to.map_or(end, |t| t.clamp(from + 1, end));
        let sep = parent.line_separator().to_owned();
        let text = parent
            .get_between(Pos::new(from, 0), Pos::new(to - 1, parent.line_len(to - 1)))
            .join(&sep);
        let parent_history = parent.history;
        let doc_options = DocOptions {
            first_line: from,
            line_separator: parent.line_sep.clone(),
            direction: parent.direction(),
            mode: Some(options.mode.clone().unwrap_or_else(|| Arc::clone(parent.mode()))),
        };
        let history = if options.shared_hist {
            parent_history
        } else {
            self.histories.insert(crate::doc::History::default())
        };

        let mut copy = Document::new(&text, doc_options, history);
        copy.links.push(DocLink {
            doc,
            shared_hist: options.shared_hist,
            is_parent: true,
        });
        let id = self.docs.insert(copy);
        self.doc_mut(doc)?.links.push(DocLink {
            doc: id,
            shared_hist: options.shared_hist,
            is_parent: false,
        });
        tracing::debug!(parent = ?doc, copy = ?id, from, to, shared_hist = options.shared_hist, "linked document created");

        self.copy_shared_markers(doc, id)?;
        Ok(id)
    }

    /// Mirror the shared markers of `source` into the new document `copy`.
    fn copy_shared_markers(&mut self, source: DocId, copy: DocId) -> Result<()> {
        let entry = self.doc(source)?;
        let mut wanted: Vec<(_, MarkerOptions, MarkerKind, Pos, Pos)> = Vec::new();
        for marker in entry.all_marks() {
            let (Some(m), Some(range)) = (entry.marker(marker), entry.find_marker(marker)) else {
                continue;
            };
            if let Some(group) = m.shared_group() {
                wanted.push((group, m.options().clone(), m.kind(), range.from, range.to));
            }
        }
        for (group, options, kind, from, to) in wanted {
            let target = self.doc_mut(copy)?;
            let (from, to) = (target.clip_pos(from), target.clip_pos(to));
            if from == to && options.clear_when_empty {
                continue;
            }
            match target.mark_text_inner(from, to, options, kind) {
                Ok(marker) => {
                    if let Some(m) = target.markers.get_mut(marker) {
                        m.shared = Some(group);
                    }
                    if let Some(shared) = self.shared_markers.get_mut(group) {
                        shared.members.push((copy, marker));
                    }
                }
                Err(err) => tracing::warn!(?copy, %err, "shared marker not mirrored into linked document"),
            }
        }
        Ok(())
    }

    /// Break the link between `a` and `b`. A shared history is split: `b`
    /// and the documents still sharing with it get a copy.
    pub fn unlink_doc(&mut self, a: DocId, b: DocId) -> Result<()> {
        if a == b {
            return Err(Error::LinkCycle(a));
        }
        let linked = self.doc(a)?.links.iter().any(|l| l.doc == b);
        if !linked {
            return Ok(());
        }
        self.doc_mut(a)?.links.retain(|l| l.doc != b);
        if let Some(other) = self.docs.get_mut(b) {
            other.links.retain(|l| l.doc != a);
        }
        self.detach_shared_markers();

        let (Some(ha), Some(hb)) = (self.docs.get(a).map(|d| d.history), self.docs.get(b).map(|d| d.history)) else {
            return Ok(());
        };
        if ha == hb {
            let copy = self.histories.get(ha).cloned().unwrap_or_default();
            let split = self.histories.insert(copy);
            let mut group = vec![b];
            group.extend(self.linked_docs(b, true).into_iter().map(|(d, _)| d));
            for d in group {
                if let Some(entry) = self.docs.get_mut(d) {
                    entry.history = split;
                }
            }
        }
        tracing::debug!(?a, ?b, split_history = ha == hb, "documents unlinked");
        Ok(())
    }

    /// Drop shared-marker members that are no longer linked to the group's
    /// first member.
    fn detach_shared_markers(&mut self) {
        let groups = self.shared_markers.ids();
        for group in groups {
            let Some(shared) = self.shared_markers.get(group) else {
                continue;
            };
            let Some(&(primary, _)) = shared.members.first() else {
                continue;
            };
            let mut reachable = vec![primary];
            reachable.extend(self.linked_docs(primary, false).into_iter().map(|(d, _)| d));
            let detached: Vec<_> = shared
                .members
                .iter()
                .copied()
                .filter(|(d, _)| !reachable.contains(d))
                .collect();
            if detached.is_empty() {
                continue;
            }
            for &(d, m) in &detached {
                if let Some(marker) = self.docs.get_mut(d).and_then(|e| e.markers.get_mut(m)) {
                    marker.shared = None;
                }
            }
            if let Some(shared) = self.shared_markers.get_mut(group) {
                shared.members.retain(|member| !detached.contains(member));
            }
        }
    }

    /// Call `f` with every document linked to `doc` and whether it shares
    /// history with it.
    pub fn iterate_linked_docs(&self, doc: DocId, mut f: impl FnMut(DocId, bool)) -> Result<()> {
        self.require_doc(doc)?;
        for (other, shared) in self.linked_docs(doc, false) {
            f(other, shared);
        }
        Ok(())
    }

    fn require_doc(&self, doc: DocId) -> Result<()> {
        self.doc(doc).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::MarkerOptions;

    #[test]
    fn edits_propagate_both_ways() {
        let mut engine = Engine::new();
        let a = engine.create_doc("one\ntwo", DocOptions::default());
        let b = engine.link_doc(a, LinkOptions::default()).unwrap();
        engine.replace_range(a, "1", Pos::new(0, 0), Pos::new(0, 3), None).unwrap();
        assert_eq!(engine.doc(b).unwrap().value(), "1\ntwo");
        engine.replace_range(b, "2", Pos::new(1, 0), Pos::new(1, 3), None).unwrap();
        assert_eq!(engine.doc(a).unwrap().value(), "1\n2");
    }

    #[test]
    fn sub_range_copy_clips_outside_changes() {
        let mut engine = Engine::new();
        let a = engine.create_doc("a\nb\nc\nd", DocOptions::default());
        let b = engine
            .link_doc(a, LinkOptions::default().with_range(1, 3))
            .unwrap();
        assert_eq!(engine.doc(b).unwrap().first_line(), 1);
        assert_eq!(engine.doc(b).unwrap().value(), "b\nc");
        engine.replace_range(a, "x\n", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        let copy = engine.doc(b).unwrap();
        assert_eq!(copy.first_line(), 2);
        assert_eq!(copy.value(), "b\nc");
        engine.replace_range(a, "B", Pos::new(2, 0), Pos::new(2, 1), None).unwrap();
        assert_eq!(engine.doc(b).unwrap().value(), "B\nc");
    }

    #[test]
    fn shared_history_undoes_across_docs_and_splits_on_unlink() {
        let mut engine = Engine::new();
        let a = engine.create_doc("abc", DocOptions::default());
        let b = engine.link_doc(a, LinkOptions::shared_history()).unwrap();
        assert_eq!(engine.doc(a).unwrap().history_id(), engine.doc(b).unwrap().history_id());
        engine.replace_range(b, "X", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        engine.undo(a).unwrap();
        assert_eq!(engine.doc(a).unwrap().value(), "abc");
        assert_eq!(engine.doc(b).unwrap().value(), "abc");

        engine.unlink_doc(a, b).unwrap();
        assert_ne!(engine.doc(a).unwrap().history_id(), engine.doc(b).unwrap().history_id());
        assert_eq!(engine.history_size(b).unwrap(), engine.history_size(a).unwrap());
        engine.replace_range(a, "Y", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        assert_eq!(engine.doc(b).unwrap().value(), "abc");
    }

    #[test]
    fn unlink_self_is_rejected() {
        let mut engine = Engine::new();
        let a = engine.create_doc("", DocOptions::default());
        assert_eq!(engine.unlink_doc(a, a), Err(Error::LinkCycle(a)));
    }

    #[test]
    fn shared_markers_are_mirrored_and_cleared_together() {
        let mut engine = Engine::new();
        let a = engine.create_doc("hello world", DocOptions::default());
        let b = engine.link_doc(a, LinkOptions::default()).unwrap();
        let opts = MarkerOptions {
            shared: true,
            ..MarkerOptions::class("s")
        };
        let m = engine.mark_text(a, Pos::new(0, 0), Pos::new(0, 5), opts).unwrap();
        let group = engine.shared_marker(a, m).unwrap().unwrap().clone();
        assert_eq!(group.members().len(), 2);
        let in_b = group.member_in(b).unwrap();
        assert!(engine.doc(b).unwrap().find_marker(in_b).is_some());

        let c = engine.link_doc(a, LinkOptions::default()).unwrap();
        assert_eq!(engine.doc(c).unwrap().all_marks().len(), 1);

        engine.clear_marker(b, in_b).unwrap();
        assert!(engine.doc(a).unwrap().all_marks().is_empty());
        assert!(engine.doc(c).unwrap().all_marks().is_empty());
    }

    #[test]
    fn iterate_reaches_transitive_links() {
        let mut engine = Engine::new();
        let a = engine.create_doc("x", DocOptions::default());
        let b = engine.link_doc(a, LinkOptions::shared_history()).unwrap();
        let c = engine.link_doc(b, LinkOptions::default()).unwrap();
        let mut seen = Vec::new();
        engine.iterate_linked_docs(a, |d, shared| seen.push((d, shared))).unwrap();
        seen.sort();
        let mut expected = vec![(b, true), (c, false)];
        expected.sort();
        assert_eq!(seen, expected);
    }
}
