//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use linewise::view::HeadlessState;
use linewise::{DocId, DocOptions, EditorId, EditorOptions, Engine, HeadlessHost};

static TRACING: Once = Once::new();

/// Route engine logs to the test harness. Set `RUST_LOG`-style verbosity by
/// editing the level here when chasing a failure.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// An editor over `text`, drawn into a headless host `rows` lines tall with
/// unit-sized chars.
pub struct Fixture {
    pub engine: Engine,
    pub doc: DocId,
    pub editor: EditorId,
    pub host: Rc<RefCell<HeadlessState>>,
}

impl Fixture {
    pub fn new(text: &str, rows: f64) -> Self {
        Self::with(Engine::new(), text, DocOptions::default(), EditorOptions::default(), rows)
    }

    pub fn with(mut engine: Engine, text: &str, doc_options: DocOptions, options: EditorOptions, rows: f64) -> Self {
        init_tracing();
        let doc = engine.create_doc(text, doc_options);
        let host = HeadlessHost::new(80.0, rows);
        let state = host.handle();
        let editor = engine
            .create_editor(doc, options, Box::new(host))
            .expect("editor attaches to a fresh document");
        Self {
            engine,
            doc,
            editor,
            host: state,
        }
    }

    pub fn value(&self) -> String {
        self.engine.doc(self.doc).unwrap().value()
    }

    pub fn head(&self) -> linewise::Pos {
        self.engine.doc(self.doc).unwrap().selection().primary().head
    }
}

/// `n` numbered lines.
pub fn numbered_lines(n: usize) -> String {
    (0..n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
}
