//! Property-based tests for the line store, selection normalisation and the
//! undo history.

use linewise::doc::{Line, LineStore};
use linewise::{DocOptions, Engine, Pos, Range, Selection};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

#[derive(Clone, Debug)]
enum StoreOp {
    Insert { at: usize, heights: Vec<u8> },
    Remove { at: usize, count: usize },
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (any::<usize>(), prop::collection::vec(1u8..5, 1..40))
            .prop_map(|(at, heights)| StoreOp::Insert { at, heights }),
        (any::<usize>(), 1usize..30).prop_map(|(at, count)| StoreOp::Remove { at, count }),
    ]
}

fn pos() -> impl Strategy<Value = Pos> {
    (0usize..6, 0usize..8).prop_map(|(line, ch)| Pos::new(line, ch))
}

fn range() -> impl Strategy<Value = Range> {
    (pos(), pos()).prop_map(|(anchor, head)| Range::new(anchor, head))
}

fn edit_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "\n", "xy", ""]), 0..4)
        .prop_map(|parts| parts.concat())
}

// ============================================================================
// Line store
// ============================================================================

proptest! {
    /// The root's cached size tracks the true line count, and every line is
    /// found again at its own start height.
    #[test]
    fn store_size_and_heights_stay_consistent(ops in prop::collection::vec(store_op(), 1..40)) {
        let mut store = LineStore::new(vec![Line::new(String::new(), 1.0)]);
        let mut model: Vec<f64> = vec![1.0];

        for op in ops {
            match op {
                StoreOp::Insert { at, heights } => {
                    let at = at % (model.len() + 1);
                    let lines = heights
                        .iter()
                        .enumerate()
                        .map(|(i, &h)| Line::new(format!("l{i}"), f64::from(h)))
                        .collect();
                    store.insert(at, lines);
                    for (i, &h) in heights.iter().enumerate() {
                        model.insert(at + i, f64::from(h));
                    }
                }
                StoreOp::Remove { at, count } => {
                    if model.len() <= 1 {
                        continue;
                    }
                    let at = at % model.len();
                    let count = count.min(model.len() - at).min(model.len() - 1);
                    if count == 0 {
                        continue;
                    }
                    let removed = store.remove(at, count);
                    prop_assert_eq!(removed.len(), count);
                    model.drain(at..at + count);
                }
            }
            prop_assert_eq!(store.len(), model.len());
            prop_assert!(store.is_consistent());
        }

        let total: f64 = model.iter().sum();
        prop_assert!((store.height() - total).abs() < 1e-9);
        for i in 0..model.len() {
            let id = store.id_at(i).unwrap();
            prop_assert_eq!(store.index_of(id), Some(i));
            let top = store.height_before(id);
            prop_assert_eq!(store.index_at_height(top), i);
        }
    }

    /// Document line lookup by height inverts height lookup by line.
    #[test]
    fn document_line_at_height_inverts_height_at_line(lines in prop::collection::vec("[a-z ]{0,12}", 1..60)) {
        let mut engine = Engine::new();
        let doc = engine.create_doc(&lines.join("\n"), DocOptions::default());
        let entry = engine.doc(doc).unwrap();
        prop_assert_eq!(entry.line_count(), lines.len());
        for n in 0..lines.len() {
            prop_assert_eq!(entry.line_at_height(entry.height_at_line(n)), n);
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

proptest! {
    /// Normalising an already normalised selection changes nothing.
    #[test]
    fn selection_normalisation_is_idempotent(ranges in prop::collection::vec(range(), 1..10), primary in any::<usize>()) {
        let primary = primary % ranges.len();
        let once = Selection::new(ranges, primary);
        prop_assert!(once.is_normalized());
        let twice = Selection::new(once.ranges().to_vec(), once.primary_index());
        prop_assert_eq!(&twice, &once);
    }
}

// ============================================================================
// History
// ============================================================================

proptest! {
    /// Undoing every change restores the original text and selection; redoing
    /// them all restores the final text.
    #[test]
    fn undo_redo_round_trip(edits in prop::collection::vec((pos(), pos(), edit_text()), 1..20)) {
        let mut engine = Engine::new();
        let doc = engine.create_doc("abc\ndef\nghi", DocOptions::default());
        let original = engine.doc(doc).unwrap().value();
        let original_sel = engine.doc(doc).unwrap().selection().clone();

        for (from, to, text) in &edits {
            engine.replace_range(doc, text, *from, *to, None).unwrap();
        }
        let edited = engine.doc(doc).unwrap().value();

        let mut guard = 0;
        while engine.history_size(doc).unwrap().0 > 0 && guard < 100 {
            engine.undo(doc).unwrap();
            guard += 1;
        }
        prop_assert_eq!(engine.doc(doc).unwrap().value(), original);
        prop_assert_eq!(engine.doc(doc).unwrap().selection(), &original_sel);

        let mut guard = 0;
        while engine.history_size(doc).unwrap().1 > 0 && guard < 100 {
            engine.redo(doc).unwrap();
            guard += 1;
        }
        prop_assert_eq!(engine.doc(doc).unwrap().value(), edited);
    }
}
