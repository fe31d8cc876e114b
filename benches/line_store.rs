//! Line store and change pipeline benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use linewise::doc::{Line, LineStore};
use linewise::{DocOptions, Engine, Pos};
use std::hint::black_box;

fn lines(n: usize) -> Vec<Line> {
    (0..n).map(|i| Line::new(format!("line {i}"), 1.0)).collect()
}

fn store_build(c: &mut Criterion) {
    c.bench_function("linestore_new_100k", |b| {
        b.iter_batched(|| lines(100_000), |l| LineStore::new(black_box(l)), BatchSize::LargeInput);
    });
}

fn store_lookup(c: &mut Criterion) {
    let store = LineStore::new(lines(100_000));

    c.bench_function("linestore_id_at", |b| {
        b.iter(|| store.id_at(black_box(73_421)));
    });

    c.bench_function("linestore_index_at_height", |b| {
        b.iter(|| store.index_at_height(black_box(54_321.5)));
    });

    let id = store.id_at(88_888).expect("line exists");
    c.bench_function("linestore_height_before", |b| {
        b.iter(|| store.height_before(black_box(id)));
    });
}

fn store_edit(c: &mut Criterion) {
    c.bench_function("linestore_insert_remove_middle", |b| {
        b.iter_batched(
            || LineStore::new(lines(50_000)),
            |mut store| {
                store.insert(25_000, lines(100));
                store.remove(10_000, 100);
                store
            },
            BatchSize::LargeInput,
        );
    });
}

fn pipeline_edit(c: &mut Criterion) {
    let text = (0..20_000).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");

    c.bench_function("replace_range_single_char", |b| {
        let mut engine = Engine::new();
        let doc = engine.create_doc(&text, DocOptions::default());
        b.iter(|| {
            engine
                .replace_range(doc, black_box("x"), Pos::new(10_000, 2), Pos::new(10_000, 2), None)
                .ok()
        });
    });

    c.bench_function("replace_range_multiline_paste", |b| {
        let paste = "a\nb\nc\nd\ne\n".repeat(20);
        b.iter_batched(
            || {
                let mut engine = Engine::new();
                let doc = engine.create_doc(&text, DocOptions::default());
                (engine, doc)
            },
            |(mut engine, doc)| {
                engine
                    .replace_range(doc, &paste, Pos::new(5_000, 0), Pos::new(5_010, 0), None)
                    .ok();
                engine
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, store_build, store_lookup, store_edit, pipeline_edit);
criterion_main!(benches);
