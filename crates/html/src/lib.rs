pub mod chunker;
pub mod markers;

mod entities;
mod tokenizer;
mod types;

use memchr::memchr2;

/// True when a `Content-Type` value names an HTML document.
pub fn is_html(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return false;
    };
    contains_ignore_ascii_case(value, b"text/html")
        || contains_ignore_ascii_case(value, b"application/xhtml")
}

fn contains_ignore_ascii_case(haystack: &str, needle: &[u8]) -> bool {
    let hay = haystack.as_bytes();
    let Some(&first) = needle.first() else {
        return true;
    };
    let (lower, upper) = (first.to_ascii_lowercase(), first.to_ascii_uppercase());
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let Some(rel) = memchr2(lower, upper, &hay[i..]) else {
            return false;
        };
        let pos = i + rel;
        if hay
            .get(pos..pos + needle.len())
            .is_some_and(|window| window.eq_ignore_ascii_case(needle))
        {
            return true;
        }
        i = pos + 1;
    }
    false
}

pub use crate::markers::{ChunkTransform, Marker, MarkerTable, TagTransform};
pub use crate::tokenizer::{Tokenizer, TokenizerConfig, TokenizerStats, tokenize};
pub use crate::types::{
    Attributes, Element, Node, NodeKey, ScriptElement, ScriptSource, Token, get_attr, set_attr,
};
