#![no_main]

use html::chunker::{ChunkPlan, Lcg};
use html::{ChunkTransform, Marker, MarkerTable, TagTransform};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&seed, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let mut table = MarkerTable::private_head("entry-head");
    table.push(Marker::new("aa", "b"));
    table.push(Marker::new("ba", "ab"));

    let max_held: usize = table.markers().iter().map(|m| m.literal.len() - 1).sum();

    let mut rng = Lcg::new(u64::from(seed));
    let size = rng.gen_range(16) + 1;
    let mut transform = TagTransform::new(&table);
    let mut out = String::new();
    for chunk in ChunkPlan::Fixed(size).text_chunks(&text) {
        out.push_str(&transform.push(chunk));
        assert!(transform.held() <= max_held);
    }
    out.push_str(&transform.finish());
    assert_eq!(out, table.apply(&text));
});
