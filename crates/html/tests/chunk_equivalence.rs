//! Chunk-equivalence for the tokenizer and the marker transform.
//!
//! Fast CI mode uses a small fuzz budget when `CI` is set; set
//! `ENTRY_CHUNK_FUZZ_RUNS` locally for more coverage.

use html::chunker::build_chunk_plans;
use html::{ChunkTransform, MarkerTable, TagTransform, Token, Tokenizer, tokenize};
use pretty_assertions::assert_eq;

const CASES: &[&str] = &[
    "plain text only",
    "<!DOCTYPE html><html><head><title>t</title></head><body><p>x</p></body></html>",
    "<head><meta charset=utf-8><link rel=stylesheet href=\"a.css\"></head><div id=app></div>",
    "<script src=\"a.js\"></script><script src='b.js' entry></script><script src=c.js></script>",
    "<script>var a = \"</div>\"; if (a < 3) {}</script><style>p>b{}</style>",
    "é<b>café &amp; 😀</b> a < b <!-- comment --> <!bogus> tail",
    "<div a=1 b = \"two words\" c d='&quot;'/><br><img src=x.png/>",
    "unterminated <div class=\"x",
    "<!-- never closed",
];

fn fuzz_runs() -> usize {
    if let Ok(value) = std::env::var("ENTRY_CHUNK_FUZZ_RUNS")
        && let Ok(parsed) = value.parse::<usize>()
    {
        return parsed;
    }
    if std::env::var("CI").is_ok() { 16 } else { 64 }
}

fn tokenize_chunks(chunks: &[&str]) -> Vec<Token> {
    let mut tokenizer = Tokenizer::default();
    let mut out = Vec::new();
    for chunk in chunks {
        tokenizer.push_str(chunk, &mut out);
    }
    tokenizer.finish(&mut out);
    out
}

#[test]
fn tokenizer_output_is_independent_of_chunking() {
    for (case_idx, input) in CASES.iter().enumerate() {
        let expected = tokenize(input);
        for case in build_chunk_plans(input, fuzz_runs(), 0x4f6f_726f ^ case_idx as u64) {
            let chunks = case.plan.text_chunks(input);
            assert_eq!(
                tokenize_chunks(&chunks),
                expected,
                "case={case_idx} plan={}",
                case.label
            );
        }
    }
}

#[test]
fn substituted_then_tokenized_is_independent_of_chunking() {
    let table = MarkerTable::private_head("entry-head");
    for (case_idx, input) in CASES.iter().enumerate() {
        let expected = tokenize(&table.apply(input));
        for case in build_chunk_plans(input, fuzz_runs(), 0x7461_6773 ^ case_idx as u64) {
            let mut transform = TagTransform::new(&table);
            let mut tokenizer = Tokenizer::default();
            let mut out = Vec::new();
            for chunk in case.plan.text_chunks(input) {
                tokenizer.push_str(&transform.push(chunk), &mut out);
            }
            tokenizer.push_str(&transform.finish(), &mut out);
            tokenizer.finish(&mut out);
            assert_eq!(out, expected, "case={case_idx} plan={}", case.label);
        }
    }
}

#[test]
fn private_head_tag_reaches_the_tokenizer() {
    let table = MarkerTable::private_head("entry-head");
    let tokens = tokenize(&table.apply("<head></head>"));
    assert_eq!(
        tokens,
        vec![
            Token::StartTag {
                name: "entry-head".into(),
                attributes: Vec::new(),
                self_closing: false,
            },
            Token::EndTag("entry-head".into()),
        ]
    );
}
