//! End-to-end scenarios over the public engine API.

mod common;

use common::Fixture;
use linewise::unicode::{BidiRun, bidi_ordering};
use linewise::{Command, DocOptions, Direction, Engine, Error, MarkerOptions, Pos, SelectOptions};

// ============================================================================
// Editing and history
// ============================================================================

#[test]
fn insert_twice_then_undo_twice() {
    common::init_tracing();
    let mut engine = Engine::new();
    let doc = engine.create_doc("", DocOptions::default());

    engine.replace_range(doc, "foo", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
    engine.replace_range(doc, "bar", Pos::new(0, 3), Pos::new(0, 3), None).unwrap();
    assert_eq!(engine.doc(doc).unwrap().value(), "foobar");

    engine.undo(doc).unwrap();
    assert_eq!(engine.doc(doc).unwrap().value(), "foo");
    engine.undo(doc).unwrap();
    assert_eq!(engine.doc(doc).unwrap().value(), "");

    engine.redo(doc).unwrap();
    engine.redo(doc).unwrap();
    assert_eq!(engine.doc(doc).unwrap().value(), "foobar");
}

#[test]
fn stale_positions_are_clamped() {
    let mut engine = Engine::new();
    let doc = engine.create_doc("ab\ncd", DocOptions::default());
    engine.replace_range(doc, "!", Pos::new(99, 99), Pos::new(99, 99), None).unwrap();
    assert_eq!(engine.doc(doc).unwrap().value(), "ab\ncd!");
    engine.set_cursor(doc, Pos::new(7, 0), SelectOptions::default()).unwrap();
    assert_eq!(engine.doc(doc).unwrap().selection().primary().head, Pos::new(1, 3));
}

// ============================================================================
// Collapsed markers
// ============================================================================

#[test]
fn overlapping_collapsed_marker_is_rejected() {
    let mut engine = Engine::new();
    let doc = engine.create_doc("hello world", DocOptions::default());

    engine
        .mark_text(doc, Pos::new(0, 2), Pos::new(0, 5), MarkerOptions::collapsed())
        .unwrap();
    let err = engine
        .mark_text(doc, Pos::new(0, 3), Pos::new(0, 7), MarkerOptions::collapsed())
        .unwrap_err();

    assert!(matches!(err, Error::OverlappingCollapsedRange { .. }));
    assert!(err.is_contract_violation());
    let entry = engine.doc(doc).unwrap();
    assert_eq!(entry.value(), "hello world");
    assert_eq!(entry.all_marks().len(), 1);
}

#[test]
fn collapsed_interior_is_unreachable() {
    let mut fx = Fixture::new("hello world", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    fx.engine
        .mark_text(doc, Pos::new(0, 2), Pos::new(0, 5), MarkerOptions::collapsed())
        .unwrap();

    fx.engine.set_cursor(doc, Pos::new(0, 2), SelectOptions::default()).unwrap();
    fx.engine.exec_command(editor, Command::GoCharRight).unwrap();
    assert_eq!(fx.head(), Pos::new(0, 5));
    fx.engine.exec_command(editor, Command::GoCharLeft).unwrap();
    assert_eq!(fx.head(), Pos::new(0, 2));

    fx.engine.set_cursor(doc, Pos::new(0, 3), SelectOptions::default()).unwrap();
    let ch = fx.head().ch;
    assert!(ch <= 2 || ch >= 5, "cursor landed inside the fold at {ch}");

    for step in 0..40 {
        let x = f64::from(step) * 0.5;
        let hit = fx.engine.coords_char(editor, x, 0.5).unwrap();
        assert!(
            hit.pos.ch <= 2 || hit.pos.ch >= 5,
            "x={x} mapped inside the fold at {}",
            hit.pos
        );
    }
}

// ============================================================================
// Bidi
// ============================================================================

#[test]
fn ltr_ascii_line_is_one_run() {
    assert_eq!(
        bidi_ordering("plain ascii", Direction::Ltr),
        vec![BidiRun::new(0, 0, 11)]
    );
}

#[test]
fn mixed_line_orders_rtl_run() {
    let order = bidi_ordering("abc \u{5d0}\u{5d1}\u{5d2}", Direction::Ltr);
    assert!(order.len() >= 2);
    let last = order.last().unwrap();
    assert!(last.is_rtl());
    assert_eq!(last.to, 7);
    assert!(!order[0].is_rtl());
}

#[test]
fn rtl_document_moves_visually() {
    let mut engine = Engine::new();
    let doc = engine.create_doc("\u{5d0}\u{5d1}\u{5d2}", DocOptions::default().with_direction(Direction::Rtl));
    let entry = engine.doc(doc).unwrap();
    let moved = entry.find_pos_h(Pos::new(0, 0), -1, linewise::Unit::Char, true);
    assert_eq!(moved.pos.ch, 1);
}
