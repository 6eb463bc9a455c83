use criterion::{Criterion, criterion_group, criterion_main};
use tabnote_state::{Assoc, ChangeSet, ChangeSpec, Document, TransactionSpec};
mod common;

fn bench_change_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("changes");
    group.sample_size(20);

    let text = common::generate_text(5_000);
    let a = common::scattered_edits(text.len(), 200);
    let after_a = a.apply(&text).unwrap();
    let b = common::scattered_edits(after_a.len(), 150);
    let parallel = common::scattered_edits(text.len(), 150);

    group.bench_function("apply", |bench| {
        bench.iter(|| a.apply(std::hint::black_box(&text)).unwrap());
    });

    group.bench_function("compose", |bench| {
        bench.iter(|| a.compose(std::hint::black_box(&b)).unwrap());
    });

    group.bench_function("map", |bench| {
        bench.iter(|| parallel.map(std::hint::black_box(a.desc()), false).unwrap());
    });

    group.bench_function("invert", |bench| {
        bench.iter(|| a.invert(std::hint::black_box(&text)).unwrap());
    });

    group.bench_function("map_pos", |bench| {
        let end = text.len();
        bench.iter(|| a.map_pos(std::hint::black_box(end / 2), Assoc::After));
    });

    group.finish();
}

fn bench_document_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");
    group.sample_size(20);

    let doc = Document::new(common::generate_text(1_000));

    group.bench_function("apply_insert", |bench| {
        let mut d = doc.clone();
        bench.iter(|| {
            let spec = TransactionSpec::changes(ChangeSpec::insert(std::hint::black_box(50), "test"));
            let patch = d.apply(spec).unwrap();
            std::hint::black_box(patch);
        });
    });

    group.bench_function("of_many_specs", |bench| {
        let len = doc.text().len();
        bench.iter(|| {
            let specs = (0..100).map(|i| ChangeSpec::insert(i * 100, "x")).collect::<Vec<_>>();
            ChangeSet::of(std::hint::black_box(specs), len, None).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_change_algebra, bench_document_edits);
criterion_main!(benches);
