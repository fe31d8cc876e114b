//! Display updates, scrolling, background highlighting and events through a
//! headless host.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use common::{Fixture, numbered_lines};
use linewise::highlight::CLike;
use linewise::{
    DocOptions, EditorEvent, EditorOption, EditorOptions, Engine, HeadlessHost, ManualClock, Pos,
    ScrollTarget, SelectOptions, TokenKind,
};

// ============================================================================
// Viewport
// ============================================================================

#[test]
fn viewport_covers_visible_lines_after_scroll_and_resize() {
    let mut fx = Fixture::new(&numbered_lines(1000), 20.0);
    let editor = fx.editor;

    let vp = fx.engine.get_viewport(editor).unwrap();
    assert_eq!(vp.from, 0);
    assert!(vp.to >= 20);
    assert_eq!(fx.host.borrow().lines.len(), vp.to - vp.from);

    fx.engine.scroll_to(editor, None, Some(500.0)).unwrap();
    let info = fx.engine.get_scroll_info(editor).unwrap();
    assert_eq!(info.top, 500.0);
    let vp = fx.engine.get_viewport(editor).unwrap();
    assert!(vp.from <= 500 && vp.to >= 520, "viewport {vp:?}");
    assert_eq!(fx.host.borrow().lines.len(), vp.to - vp.from);

    fx.engine.set_size(editor, 80.0, 40.0).unwrap();
    let vp = fx.engine.get_viewport(editor).unwrap();
    assert!(vp.from <= 500 && vp.to >= 540, "viewport {vp:?}");
}

#[test]
fn scroll_into_view_brings_cursor_on_screen() {
    let mut fx = Fixture::new(&numbered_lines(300), 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    fx.engine.set_cursor(doc, Pos::new(250, 0), SelectOptions::default()).unwrap();
    let info = fx.engine.get_scroll_info(editor).unwrap();
    assert!(info.top <= 250.0 && info.top + info.client_height >= 251.0, "{info:?}");

    fx.engine
        .scroll_into_view(editor, ScrollTarget::Pos(Pos::new(3, 0)), 0.0)
        .unwrap();
    let info = fx.engine.get_scroll_info(editor).unwrap();
    assert!(info.top <= 3.0, "{info:?}");
}

#[test]
fn edits_patch_only_the_window() {
    let mut fx = Fixture::new(&numbered_lines(500), 10.0);
    let doc = fx.doc;
    let before = fx.host.borrow().patches;
    fx.engine
        .replace_range(doc, "edited", Pos::new(2, 0), Pos::new(2, 4), None)
        .unwrap();
    let state = fx.host.borrow();
    assert!(state.patches > before);
    let vp = fx.engine.get_viewport(fx.editor).unwrap();
    assert_eq!(state.lines.len(), vp.to - vp.from);
    let line = state.lines.iter().find(|v| v.line == 2).unwrap();
    let text: String = line.spans.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(text, "edited 2");
}

// ============================================================================
// Background highlighting
// ============================================================================

#[test]
fn worker_highlights_past_the_viewport_in_slices() {
    let clock = ManualClock::new();
    let engine = Engine::with_clock(clock.clone());
    let source = "int x = 1;\nreturn x;\n".repeat(400);
    let doc_options = DocOptions::default().with_mode(Arc::new(CLike::c()));
    let mut fx = Fixture::with(engine, &source, doc_options, EditorOptions::default(), 20.0);
    let (doc, editor) = (fx.doc, fx.editor);

    assert!(fx.engine.next_deadline().is_some());
    let mut rounds = 0;
    while fx.engine.next_deadline().is_some() && rounds < 50 {
        clock.advance(Duration::from_millis(250));
        fx.engine.run_due_tasks().unwrap();
        rounds += 1;
    }

    let vp = fx.engine.get_viewport(editor).unwrap();
    let frontier = fx.engine.doc(doc).unwrap().highlight_frontier();
    assert!(frontier >= vp.to + 500, "frontier {frontier}, viewport {vp:?}");
    assert_eq!(
        fx.engine.get_token_type_at(doc, Pos::new(1, 1)).unwrap(),
        Some(TokenKind::Keyword)
    );
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn batched_edits_render_each_editor_once() {
    let mut fx = Fixture::new("abc\ndef", 10.0);
    let first_doc = fx.doc;
    let second_doc = fx.engine.create_doc("uvw\nxyz", DocOptions::default());
    let second_host = HeadlessHost::new(80.0, 10.0);
    let second_state = second_host.handle();
    fx.engine
        .create_editor(second_doc, EditorOptions::default(), Box::new(second_host))
        .unwrap();

    let before = (fx.host.borrow().patches, second_state.borrow().patches);
    fx.engine
        .batch(|engine| {
            engine.replace_range(first_doc, "1", Pos::new(0, 0), Pos::new(0, 1), None)?;
            engine.replace_range(second_doc, "2", Pos::new(0, 0), Pos::new(0, 1), None)?;
            engine.replace_range(first_doc, "3", Pos::new(1, 0), Pos::new(1, 1), None)?;
            engine.replace_range(second_doc, "4", Pos::new(1, 0), Pos::new(1, 1), None)
        })
        .unwrap();

    assert_eq!(fx.value(), "1bc\n3ef");
    assert_eq!(fx.engine.doc(second_doc).unwrap().value(), "2vw\n4yz");
    assert_eq!(fx.host.borrow().patches, before.0 + 1);
    assert_eq!(second_state.borrow().patches, before.1 + 1);
}

#[test]
fn events_are_coalesced_per_operation() {
    let mut fx = Fixture::new("abc\ndef", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    let seen: Rc<RefCell<Vec<EditorEvent>>> = Rc::default();
    let sink = Rc::clone(&seen);
    fx.engine
        .on(editor, move |event, _| sink.borrow_mut().push(event.clone()))
        .unwrap();

    fx.engine
        .operation(editor, |engine| {
            engine.replace_range(doc, "1", Pos::new(0, 0), Pos::new(0, 1), None)?;
            engine.replace_range(doc, "2", Pos::new(1, 0), Pos::new(1, 1), None)?;
            engine.set_cursor(doc, Pos::new(1, 2), SelectOptions::default())
        })
        .unwrap();

    let events = seen.borrow();
    let changes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EditorEvent::Changes(changes) => Some(changes.len()),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![2]);
    assert_eq!(
        events.iter().filter(|e| **e == EditorEvent::CursorActivity).count(),
        1
    );
}

#[test]
fn listener_actions_run_after_notifications() {
    let mut fx = Fixture::new("abc", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    let fired = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&fired);
    fx.engine
        .on(editor, move |event, actions| {
            if matches!(event, EditorEvent::OptionChange("tabSize")) && !*flag.borrow() {
                *flag.borrow_mut() = true;
                actions.replace_range("!", Pos::new(0, 3), Pos::new(0, 3), None);
            }
        })
        .unwrap();

    fx.engine.set_option(editor, EditorOption::TabSize(8)).unwrap();
    assert!(*fired.borrow());
    assert_eq!(fx.engine.doc(doc).unwrap().value(), "abc!");
}
