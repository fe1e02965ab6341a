use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use html::{ChunkTransform, MarkerTable, TagTransform, Tokenizer, tokenize};

const SMALL_BLOCKS: usize = 64;
const LARGE_BLOCKS: usize = 20_000;

fn make_blocks(count: usize) -> String {
    let mut out = String::from("<!doctype html><html><head><title>bench</title></head><body>");
    for i in 0..count {
        out.push_str("<div class=box><span>hello</span><img src=x>");
        if i % 64 == 0 {
            out.push_str("<script src=\"chunk.js\"></script>");
        }
        out.push_str("</div>");
    }
    out.push_str("</body></html>");
    out
}

fn bench_tokenize_small(c: &mut Criterion) {
    let input = make_blocks(SMALL_BLOCKS);
    c.bench_function("bench_tokenize_small", |b| {
        b.iter(|| black_box(tokenize(black_box(&input)).len()));
    });
}

fn bench_tokenize_large(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    c.bench_function("bench_tokenize_large", |b| {
        b.iter(|| black_box(tokenize(black_box(&input)).len()));
    });
}

fn bench_tokenize_chunked(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    c.bench_function("bench_tokenize_chunked", |b| {
        b.iter_batched(
            Tokenizer::default,
            |mut tokenizer| {
                let mut out = Vec::new();
                for chunk in input.as_bytes().chunks(256) {
                    // The fixture is ASCII, so every byte chunk is valid UTF-8.
                    tokenizer.push_str(std::str::from_utf8(chunk).unwrap_or_default(), &mut out);
                }
                tokenizer.finish(&mut out);
                black_box(out.len())
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_tag_transform_chunked(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    let table = MarkerTable::private_head("entry-head");
    c.bench_function("bench_tag_transform_chunked", |b| {
        b.iter_batched(
            || TagTransform::new(&table),
            |mut transform| {
                let mut len = 0usize;
                for chunk in input.as_bytes().chunks(64) {
                    len += transform.push(std::str::from_utf8(chunk).unwrap_or_default()).len();
                }
                len += transform.finish().len();
                black_box(len)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_tokenize_small,
    bench_tokenize_large,
    bench_tokenize_chunked,
    bench_tag_transform_chunked
);
criterion_main!(benches);
