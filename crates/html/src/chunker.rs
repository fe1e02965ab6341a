//! Deterministic and seeded chunk plans for streaming coverage.
//!
//! A plan splits one input into chunks; every consumer that claims
//! chunk-equivalence is checked against all plans for the same input.

use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkPlan {
    /// Chunks of `size` bytes, shrunk as needed to stay on char boundaries.
    Fixed(usize),
    /// Split exactly at these byte offsets (may cut UTF-8 sequences).
    Boundaries(Vec<usize>),
}

impl fmt::Display for ChunkPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPlan::Fixed(size) => write!(f, "fixed size={size}"),
            ChunkPlan::Boundaries(indices) => {
                write!(f, "boundaries count={} indices={indices:?}", indices.len())
            }
        }
    }
}

impl ChunkPlan {
    /// Byte chunks of `input`.
    pub fn byte_chunks<'a>(&self, input: &'a [u8]) -> Vec<&'a [u8]> {
        let mut out = Vec::new();
        match self {
            ChunkPlan::Fixed(size) => {
                assert!(*size > 0, "chunk size must be > 0");
                out.extend(input.chunks(*size));
            }
            ChunkPlan::Boundaries(indices) => {
                let mut last = 0usize;
                for &idx in indices {
                    if idx <= last || idx >= input.len() {
                        continue;
                    }
                    out.push(&input[last..idx]);
                    last = idx;
                }
                out.push(&input[last..]);
            }
        }
        out
    }

    /// Text chunks of `input`; boundaries inside a character move forward to
    /// the next char boundary.
    pub fn text_chunks<'a>(&self, input: &'a str) -> Vec<&'a str> {
        let mut cuts = Vec::new();
        match self {
            ChunkPlan::Fixed(size) => {
                assert!(*size > 0, "chunk size must be > 0");
                cuts.extend((1..).map(|i| i * size).take_while(|&i| i < input.len()));
            }
            ChunkPlan::Boundaries(indices) => cuts.extend(indices.iter().copied()),
        }
        let mut out = Vec::new();
        let mut last = 0usize;
        for mut idx in cuts {
            while idx < input.len() && !input.is_char_boundary(idx) {
                idx += 1;
            }
            if idx <= last || idx >= input.len() {
                continue;
            }
            out.push(&input[last..idx]);
            last = idx;
        }
        out.push(&input[last..]);
        out
    }
}

#[derive(Clone, Debug)]
pub struct ChunkPlanCase {
    pub label: String,
    pub plan: ChunkPlan,
}

/// Fixed sizes, splits around markup-significant bytes, and `fuzz_runs`
/// seeded random plans (reproducible from `fuzz_seed`).
pub fn build_chunk_plans(input: &str, fuzz_runs: usize, fuzz_seed: u64) -> Vec<ChunkPlanCase> {
    let mut plans = Vec::new();
    for size in [1usize, 2, 3, 4, 7, 16, 64] {
        plans.push(ChunkPlanCase {
            label: format!("fixed size={size}"),
            plan: ChunkPlan::Fixed(size),
        });
    }

    let markup = markup_boundaries(input);
    if !markup.is_empty() {
        plans.push(ChunkPlanCase {
            label: format!("markup-boundaries count={}", markup.len()),
            plan: ChunkPlan::Boundaries(markup),
        });
    }

    let len = input.len();
    for run in 0..fuzz_runs {
        let seed = fuzz_seed.wrapping_add(run as u64);
        let mut rng = Lcg::new(seed);
        let mut picks = Vec::new();
        if len > 1 {
            let count = 1 + rng.gen_range(len.min(32));
            for _ in 0..count {
                picks.push(1 + rng.gen_range(len - 1));
            }
            picks.sort_unstable();
            picks.dedup();
        }
        plans.push(ChunkPlanCase {
            label: format!("fuzz seed=0x{seed:016x}"),
            plan: ChunkPlan::Boundaries(picks),
        });
    }
    plans
}

fn markup_boundaries(input: &str) -> Vec<usize> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'<' | b'>' | b'"' | b'\'' | b'/' | b'=') {
            out.push(i);
            if i + 1 < bytes.len() {
                out.push(i + 1);
            }
        }
    }
    out.retain(|&i| i > 0 && i < bytes.len());
    out.sort_unstable();
    out.dedup();
    out
}

/// Small deterministic generator; good enough for picking split points.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub fn gen_range(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() >> 33) as usize % upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_chunks_concatenate_to_input() {
        let input = "<p>café 😀</p>";
        for case in build_chunk_plans(input, 16, 0x5eed) {
            let chunks = case.plan.text_chunks(input);
            assert_eq!(chunks.concat(), input, "{}", case.label);
        }
    }

    #[test]
    fn byte_chunks_concatenate_to_input() {
        let input = "<p>café 😀</p>".as_bytes();
        for plan in [ChunkPlan::Fixed(3), ChunkPlan::Boundaries(vec![1, 5, 6, 40])] {
            assert_eq!(plan.byte_chunks(input).concat(), input, "{plan}");
        }
    }

    #[test]
    fn fuzz_plans_are_reproducible() {
        let a = build_chunk_plans("<a href='x'>y</a>", 4, 7);
        let b = build_chunk_plans("<a href='x'>y</a>", 4, 7);
        let plans = |cases: &[ChunkPlanCase]| cases.iter().map(|c| c.plan.clone()).collect::<Vec<_>>();
        assert_eq!(plans(&a), plans(&b));
    }
}
