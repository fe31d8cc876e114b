//! User-level workflows: typing through input adapters, named commands and
//! linked documents shown in editors.

mod common;

use common::Fixture;
use linewise::{
    Captured, Command, DocOptions, EditorOption, EditorOptions, Engine, InputStyle, LinkOptions,
    Pos, ReadOnly, SelectOptions,
};

// ============================================================================
// Typing
// ============================================================================

#[test]
fn type_delete_undo_through_plain_field() {
    let mut fx = Fixture::new("", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);

    for value in ["h", "he", "hel", "hell", "hello"] {
        fx.engine.capture_input(editor, Captured::Field(value.to_string())).unwrap();
        fx.engine.poll_input(editor).unwrap();
    }
    assert_eq!(fx.value(), "hello");
    assert_eq!(fx.engine.history_size(doc).unwrap().0, 1, "typing merges into one event");

    fx.engine.exec_command(editor, Command::DelCharBefore).unwrap();
    assert_eq!(fx.value(), "hell");
    fx.engine.exec_command(editor, Command::Undo).unwrap();
    assert_eq!(fx.value(), "hello");
    fx.engine.exec_command(editor, Command::Undo).unwrap();
    assert_eq!(fx.value(), "");
}

#[test]
fn editable_region_capture_becomes_replacement() {
    let options = EditorOptions::default().with_input_style(InputStyle::EditableRegion);
    let mut fx = Fixture::with(Engine::new(), "one\ntwo\nthree", DocOptions::default(), options, 10.0);
    let editor = fx.editor;

    let captured = Captured::Region {
        from: 1,
        to: 3,
        text: "tw-o\nthree".to_string(),
    };
    assert!(fx.engine.capture_input(editor, captured).unwrap());
    assert!(fx.engine.poll_input(editor).unwrap());
    assert_eq!(fx.value(), "one\ntw-o\nthree");
    assert!(!fx.engine.capture_input(editor, Captured::Field("x".to_string())).unwrap());
}

#[test]
fn switching_input_style_swaps_adapter() {
    let mut fx = Fixture::new("abc", 10.0);
    let editor = fx.editor;
    fx.engine
        .set_option(editor, EditorOption::InputStyle(InputStyle::EditableRegion))
        .unwrap();
    assert!(!fx.engine.capture_input(editor, Captured::Field("x".to_string())).unwrap());
    assert!(
        fx.engine
            .capture_input(
                editor,
                Captured::Region {
                    from: 0,
                    to: 1,
                    text: "abcd".to_string()
                }
            )
            .unwrap()
    );
    fx.engine.poll_input(editor).unwrap();
    assert_eq!(fx.value(), "abcd");
}

#[test]
fn read_only_editor_ignores_typing_and_commands() {
    let options = EditorOptions::default().with_read_only(ReadOnly::Yes);
    let mut fx = Fixture::with(Engine::new(), "keep", DocOptions::default(), options, 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    fx.engine.set_cursor(doc, Pos::new(0, 4), SelectOptions::default()).unwrap();

    fx.engine.capture_input(editor, Captured::Field("x".to_string())).unwrap();
    fx.engine.poll_input(editor).unwrap();
    fx.engine.exec_command(editor, Command::DelCharBefore).unwrap();
    assert_eq!(fx.value(), "keep");

    fx.engine.exec_command(editor, Command::GoLineStart).unwrap();
    assert_eq!(fx.head(), Pos::new(0, 0));
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn word_motion_and_deletion() {
    let mut fx = Fixture::new("foo bar baz", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    fx.engine.set_cursor(doc, Pos::new(0, 11), SelectOptions::default()).unwrap();

    fx.engine.exec_command(editor, Command::GoGroupLeft).unwrap();
    assert_eq!(fx.head(), Pos::new(0, 8));
    fx.engine.exec_command(editor, Command::DelWordBefore).unwrap();
    assert_eq!(fx.value(), "foo baz");
    fx.engine.exec_command(editor, Command::GoDocEnd).unwrap();
    fx.engine.exec_command(editor, Command::DelWordBefore).unwrap();
    assert_eq!(fx.value(), "foo ");
}

#[test]
fn indent_more_and_less_over_a_selection() {
    let mut fx = Fixture::new("a\nb\nc", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    fx.engine
        .set_selection(doc, Pos::new(0, 0), Some(Pos::new(1, 1)), SelectOptions::default())
        .unwrap();
    fx.engine.exec_command(editor, Command::IndentMore).unwrap();
    assert_eq!(fx.value(), "  a\n  b\nc");
    fx.engine.exec_command(editor, Command::IndentLess).unwrap();
    assert_eq!(fx.value(), "a\nb\nc");
}

#[test]
fn page_down_scrolls_and_moves() {
    let text = common::numbered_lines(200);
    let mut fx = Fixture::new(&text, 20.0);
    let editor = fx.editor;
    fx.engine.exec_command(editor, Command::GoPageDown).unwrap();
    let head = fx.head();
    assert!(head.line >= 15 && head.line <= 25, "head {head}");
    let info = fx.engine.get_scroll_info(editor).unwrap();
    assert!(info.top > 0.0);
}

// ============================================================================
// Linked documents
// ============================================================================

#[test]
fn linked_copy_in_second_editor_sees_edits() {
    let mut fx = Fixture::new("shared\ntext", 10.0);
    let (doc, editor) = (fx.doc, fx.editor);
    let copy = fx.engine.link_doc(doc, LinkOptions::shared_history()).unwrap();
    let host = linewise::HeadlessHost::new(80.0, 10.0);
    let state = host.handle();
    let other = fx
        .engine
        .create_editor(copy, EditorOptions::default(), Box::new(host))
        .unwrap();

    fx.engine.set_cursor(doc, Pos::new(0, 6), SelectOptions::default()).unwrap();
    fx.engine.capture_input(editor, Captured::Field("!".to_string())).unwrap();
    fx.engine.poll_input(editor).unwrap();
    assert_eq!(fx.engine.doc(copy).unwrap().value(), "shared!\ntext");

    let first = state.borrow().lines.first().cloned().unwrap();
    let text: String = first.spans.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(text, "shared!");

    fx.engine.exec_command(other, Command::Undo).unwrap();
    assert_eq!(fx.value(), "shared\ntext");
}
