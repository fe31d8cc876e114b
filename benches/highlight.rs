//! Tokenizer and bidi benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{Criterion, criterion_group, criterion_main};
use linewise::highlight::CLike;
use linewise::unicode::bidi_ordering;
use linewise::{DocOptions, Direction, Engine, Pos};
use std::hint::black_box;
use std::sync::Arc;

const SOURCE: &str = "static int counter = 0; /* running total */\n\
                      for (int i = 0; i < 10; i++) { counter += i * 2; }\n\
                      return \"done\";\n";

fn tokenize_document(c: &mut Criterion) {
    let text = SOURCE.repeat(2_000);

    c.bench_function("clike_state_after_6k_lines", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            let doc = engine.create_doc(&text, DocOptions::default().with_mode(Arc::new(CLike::c())));
            engine.get_state_after(doc, black_box(5_999), true).ok()
        });
    });

    let mut engine = Engine::new();
    let doc = engine.create_doc(&text, DocOptions::default().with_mode(Arc::new(CLike::c())));
    c.bench_function("clike_line_tokens", |b| {
        b.iter(|| engine.get_line_tokens(doc, black_box(3_001), true).ok());
    });
    c.bench_function("clike_token_at", |b| {
        b.iter(|| engine.get_token_at(doc, black_box(Pos::new(4_000, 12)), true).ok());
    });
}

fn bidi(c: &mut Criterion) {
    let ascii = "plain left to right text ".repeat(8);
    let mixed = "abc \u{5d0}\u{5d1}\u{5d2} 123 def \u{627}\u{644}\u{639} ".repeat(8);

    c.bench_function("bidi_ltr_ascii", |b| {
        b.iter(|| bidi_ordering(black_box(&ascii), Direction::Ltr));
    });
    c.bench_function("bidi_mixed", |b| {
        b.iter(|| bidi_ordering(black_box(&mixed), Direction::Ltr));
    });
    c.bench_function("bidi_mixed_rtl_base", |b| {
        b.iter(|| bidi_ordering(black_box(&mixed), Direction::Rtl));
    });
}

criterion_group!(benches, tokenize_document, bidi);
criterion_main!(benches);
