//! Literal marker substitution over a chunked text stream.
//!
//! Some structural tokens must not reach the tree builder verbatim (a host
//! would relocate `<head>` content out of the insertion point). The marker
//! table escapes them into private names before parsing; its inverse
//! restores them.
//!
//! Invariants:
//! - Markers apply in table order, each literal fully replaced before the
//!   next literal is scanned, exactly as if the whole text were one chunk.
//! - Each literal keeps at most `literal.len() - 1` bytes buffered between
//!   chunks.
//! - A partial marker left at end-of-stream is passed through unchanged.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub literal: String,
    pub substitute: String,
}

impl Marker {
    pub fn new(literal: impl Into<String>, substitute: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
            substitute: substitute.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerTable {
    markers: Vec<Marker>,
}

impl MarkerTable {
    pub fn new(markers: Vec<Marker>) -> Self {
        Self { markers }
    }

    /// `<head>`/`</head>` renamed to a private tag name.
    // TODO: add the equivalent `<body>` pair once hosts can map a private body tag back.
    pub fn private_head(tag: &str) -> Self {
        Self::new(vec![
            Marker::new("<head>", format!("<{tag}>")),
            Marker::new("</head>", format!("</{tag}>")),
        ])
    }

    pub fn push(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Table that undoes this one (applied in reverse order).
    pub fn inverse(&self) -> Self {
        Self::new(
            self.markers
                .iter()
                .rev()
                .map(|m| Marker::new(m.substitute.clone(), m.literal.clone()))
                .collect(),
        )
    }

    /// Apply the table to a complete string.
    pub fn apply(&self, text: &str) -> String {
        self.markers
            .iter()
            .filter(|m| !m.literal.is_empty())
            .fold(text.to_string(), |acc, m| acc.replace(&m.literal, &m.substitute))
    }
}

/// A text-to-text stage driven one chunk at a time.
pub trait ChunkTransform {
    /// Consume a chunk and return whatever output is final so far.
    fn push(&mut self, chunk: &str) -> String;

    /// End-of-stream: return everything still held back.
    fn finish(&mut self) -> String;
}

impl<T: ChunkTransform + ?Sized> ChunkTransform for Box<T> {
    fn push(&mut self, chunk: &str) -> String {
        (**self).push(chunk)
    }

    fn finish(&mut self) -> String {
        (**self).finish()
    }
}

/// Replaces every occurrence of one literal, across chunk boundaries.
#[derive(Debug)]
struct LiteralReplacer {
    marker: Marker,
    carry: String,
}

impl LiteralReplacer {
    fn push(&mut self, chunk: &str) -> String {
        let mut pending = std::mem::take(&mut self.carry);
        pending.push_str(chunk);

        let literal = self.marker.literal.as_str();
        let mut out = String::with_capacity(pending.len());
        let mut rest = pending.as_str();
        while let Some(pos) = rest.find(literal) {
            out.push_str(&rest[..pos]);
            out.push_str(&self.marker.substitute);
            rest = &rest[pos + literal.len()..];
        }

        let keep = partial_match_len(rest, literal);
        let (ready, held) = rest.split_at(rest.len() - keep);
        out.push_str(ready);
        self.carry.push_str(held);
        out
    }

    fn finish(&mut self) -> String {
        std::mem::take(&mut self.carry)
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `literal`.
fn partial_match_len(text: &str, literal: &str) -> usize {
    let max = literal.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| literal.is_char_boundary(n) && text.ends_with(&literal[..n]))
        .unwrap_or(0)
}

/// Streaming application of a [`MarkerTable`]: one replacer per literal,
/// chained in table order.
#[derive(Debug)]
pub struct TagTransform {
    stages: Vec<LiteralReplacer>,
}

impl TagTransform {
    pub fn new(table: &MarkerTable) -> Self {
        let stages = table
            .markers()
            .iter()
            .filter(|m| !m.literal.is_empty())
            .map(|m| LiteralReplacer {
                marker: m.clone(),
                carry: String::new(),
            })
            .collect();
        Self { stages }
    }

    /// Bytes currently held back across all stages.
    pub fn held(&self) -> usize {
        self.stages.iter().map(|s| s.carry.len()).sum()
    }
}

impl ChunkTransform for TagTransform {
    fn push(&mut self, chunk: &str) -> String {
        let mut text = chunk.to_string();
        for stage in &mut self.stages {
            if text.is_empty() {
                break;
            }
            text = stage.push(&text);
        }
        text
    }

    fn finish(&mut self) -> String {
        // Flushing stage i feeds stage i + 1, which must still get to match it.
        let mut text = String::new();
        for stage in &mut self.stages {
            let mut flushed = stage.push(&text);
            flushed.push_str(&stage.finish());
            text = flushed;
        }
        text
    }
}
