#![no_main]

use html::chunker::{ChunkPlan, Lcg};
use html::{Tokenizer, TokenizerConfig, tokenize};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&seed, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let mut rng = Lcg::new(u64::from(seed));
    let mut boundaries: Vec<usize> = (0..rng.gen_range(8) + 1)
        .map(|_| rng.gen_range(text.len() + 1))
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut tokens = Vec::new();
    for chunk in ChunkPlan::Boundaries(boundaries).text_chunks(&text) {
        tokenizer.push_str(chunk, &mut tokens);
    }
    tokenizer.finish(&mut tokens);
    assert_eq!(tokens, tokenize(&text));
});
