//! Streaming HTML tokenizer with a constrained, practical grammar.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]`. `script` and `style`
//! bodies are rawtext. This is not an HTML5 state machine: there is no
//! parse-error recovery beyond the end-of-stream rules below.
//!
//! Invariants:
//! - Chunk-equivalence: any split of the same text yields the same token
//!   sequence as [`tokenize`] on the concatenation. A token is only emitted
//!   once everything that decides its extent is buffered; text runs are held
//!   until the next `<` that opens markup.
//! - Buffer slices are cut only at ASCII structural bytes, so every slice
//!   boundary is a UTF-8 boundary.
//!
//! End-of-stream rules: an unterminated comment becomes a comment of the
//! remainder, unclosed rawtext gets an implied end tag, an unterminated tag is
//! emitted as far as it was read, and a stray `<` is text.

use crate::entities::decode_entities;
use crate::types::{Attributes, Token};
use memchr::memchr;

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const DOCTYPE_OPEN: &[u8] = b"<!doctype";
// Matching only ever starts at an ASCII `<`, which never occurs inside a
// multi-byte UTF-8 sequence.
const SCRIPT_CLOSE_TAG: &[u8] = b"</script";
const STYLE_CLOSE_TAG: &[u8] = b"</style";

#[derive(Clone, Debug)]
pub struct TokenizerConfig {
    /// Decode character references in text and attribute values.
    pub decode_entities: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            decode_entities: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenizerStats {
    pub tokens_emitted: u64,
    pub bytes_consumed: u64,
    pub max_buffered: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RawText {
    Script,
    Style,
}

impl RawText {
    fn for_tag(name: &str) -> Option<Self> {
        match name {
            "script" => Some(RawText::Script),
            "style" => Some(RawText::Style),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            RawText::Script => "script",
            RawText::Style => "style",
        }
    }

    fn close_tag(self) -> &'static [u8] {
        match self {
            RawText::Script => SCRIPT_CLOSE_TAG,
            RawText::Style => STYLE_CLOSE_TAG,
        }
    }
}

enum Lexed {
    NeedMore,
    /// Bytes consumed (always > 0) and the token they produced, if any.
    Consumed(usize, Option<Token>),
}

/// Resumable tokenizer fed with decoded text chunks.
#[derive(Debug)]
pub struct Tokenizer {
    config: TokenizerConfig,
    buffer: String,
    cursor: usize,
    rawtext: Option<RawText>,
    /// Offset (relative to `cursor`) where the rawtext close-tag scan resumes.
    rawtext_resume: usize,
    finished: bool,
    stats: TokenizerStats,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            cursor: 0,
            rawtext: None,
            rawtext_resume: 0,
            finished: false,
            stats: TokenizerStats::default(),
        }
    }

    /// Append a chunk and emit every token whose extent is now known.
    pub fn push_str(&mut self, chunk: &str, out: &mut Vec<Token>) {
        assert!(
            !self.finished,
            "Tokenizer::push_str called after finish(); this violates the end-of-stream contract"
        );
        self.buffer.push_str(chunk);
        self.stats.max_buffered = self.stats.max_buffered.max(self.buffer.len() - self.cursor);
        self.drain(false, out);
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
    }

    /// Mark end-of-stream and flush everything still buffered.
    pub fn finish(&mut self, out: &mut Vec<Token>) {
        if self.finished {
            return;
        }
        self.drain(true, out);
        debug_assert_eq!(self.cursor, self.buffer.len());
        self.buffer.clear();
        self.cursor = 0;
        self.finished = true;
        log::trace!(
            target: "entry.tokenizer",
            "finished: tokens={} bytes={} max_buffered={}",
            self.stats.tokens_emitted,
            self.stats.bytes_consumed,
            self.stats.max_buffered
        );
    }

    /// Bytes received but not yet turned into tokens.
    pub fn buffered(&self) -> &str {
        &self.buffer[self.cursor..]
    }

    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    fn drain(&mut self, eof: bool, out: &mut Vec<Token>) {
        let before = out.len();
        while self.step(eof, out) {}
        self.stats.tokens_emitted += (out.len() - before) as u64;
    }

    fn step(&mut self, eof: bool, out: &mut Vec<Token>) -> bool {
        let start = self.cursor;
        let input = &self.buffer[start..];

        if let Some(raw) = self.rawtext {
            let resume = self.rawtext_resume.min(input.len());
            match find_rawtext_close_tag(&input[resume..], raw.close_tag()) {
                Some((rel_start, rel_end)) => {
                    let body_end = resume + rel_start;
                    if body_end > 0 {
                        out.push(Token::Text(input[..body_end].to_string()));
                    }
                    out.push(Token::EndTag(raw.name().to_string()));
                    self.advance(resume + rel_end);
                    self.rawtext = None;
                    self.rawtext_resume = 0;
                    true
                }
                None if eof => {
                    if !input.is_empty() {
                        out.push(Token::Text(input.to_string()));
                    }
                    out.push(Token::EndTag(raw.name().to_string()));
                    let len = input.len();
                    self.advance(len);
                    self.rawtext = None;
                    self.rawtext_resume = 0;
                    true
                }
                None => {
                    // Only the last `<` can begin a close tag that is still incomplete.
                    self.rawtext_resume = input.rfind('<').unwrap_or(input.len());
                    false
                }
            }
        } else {
            match lex(input, eof, &self.config) {
                Lexed::NeedMore => false,
                Lexed::Consumed(len, token) => {
                    debug_assert!(len > 0, "lexer must make progress");
                    if let Some(token) = token {
                        if let Token::StartTag {
                            name,
                            self_closing: false,
                            ..
                        } = &token
                        {
                            self.rawtext = RawText::for_tag(name);
                        }
                        out.push(token);
                    }
                    self.advance(len);
                    true
                }
            }
        }
    }

    fn advance(&mut self, len: usize) {
        self.cursor += len;
        self.stats.bytes_consumed += len as u64;
    }
}

/// Tokenize a complete document in one pass.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::default();
    let mut out = Vec::new();
    tokenizer.push_str(input, &mut out);
    tokenizer.finish(&mut out);
    out
}

fn lex(input: &str, eof: bool, config: &TokenizerConfig) -> Lexed {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return Lexed::NeedMore;
    }

    let mut i = 0usize;
    let markup_start = loop {
        let Some(rel) = memchr(b'<', &bytes[i..]) else {
            if !eof {
                return Lexed::NeedMore;
            }
            return text_token(input, input.len(), config);
        };
        let p = i + rel;
        match opens_markup(bytes, p) {
            Some(true) => break p,
            Some(false) => i = p + 1,
            None if eof => i = p + 1,
            None => return Lexed::NeedMore,
        }
        if i >= bytes.len() {
            return text_token(input, input.len(), config);
        }
    };
    if markup_start > 0 {
        return text_token(input, markup_start, config);
    }

    match bytes[1] {
        b'!' => lex_declaration(input, eof),
        b'/' => lex_end_tag(input, eof),
        _ => lex_start_tag(input, eof, config),
    }
}

/// `Some(true)` if the `<` at `p` opens markup, `None` if that depends on
/// bytes not received yet.
fn opens_markup(bytes: &[u8], p: usize) -> Option<bool> {
    let next = *bytes.get(p + 1)?;
    Some(next.is_ascii_alphabetic() || next == b'/' || next == b'!')
}

fn text_token(input: &str, end: usize, config: &TokenizerConfig) -> Lexed {
    let raw = &input[..end];
    let text = if config.decode_entities {
        decode_entities(raw).into_owned()
    } else {
        raw.to_string()
    };
    Lexed::Consumed(end, Some(Token::Text(text)))
}

fn lex_declaration(input: &str, eof: bool) -> Lexed {
    let bytes = input.as_bytes();
    if input.starts_with(COMMENT_OPEN) {
        let body = &input[COMMENT_OPEN.len()..];
        return match body.find(COMMENT_CLOSE) {
            Some(end) => Lexed::Consumed(
                COMMENT_OPEN.len() + end + COMMENT_CLOSE.len(),
                Some(Token::Comment(body[..end].to_string())),
            ),
            None if eof => Lexed::Consumed(input.len(), Some(Token::Comment(body.to_string()))),
            None => Lexed::NeedMore,
        };
    }
    if !eof
        && (COMMENT_OPEN.as_bytes().starts_with(bytes)
            || (bytes.len() < DOCTYPE_OPEN.len()
                && DOCTYPE_OPEN[..bytes.len()].eq_ignore_ascii_case(bytes)))
    {
        return Lexed::NeedMore;
    }
    let is_doctype = bytes.len() >= DOCTYPE_OPEN.len()
        && bytes[..DOCTYPE_OPEN.len()].eq_ignore_ascii_case(DOCTYPE_OPEN);
    match memchr(b'>', bytes) {
        Some(end) => {
            let inner = &input[2..end];
            let token = if is_doctype {
                Token::Doctype(inner.trim().to_string())
            } else {
                Token::Comment(inner.to_string())
            };
            Lexed::Consumed(end + 1, Some(token))
        }
        None if eof => {
            // An unterminated doctype is dropped; a bogus comment keeps its text.
            let token = (!is_doctype).then(|| Token::Comment(input[2..].to_string()));
            Lexed::Consumed(input.len(), token)
        }
        None => Lexed::NeedMore,
    }
}

fn lex_end_tag(input: &str, eof: bool) -> Lexed {
    let bytes = input.as_bytes();
    let Some(&first) = bytes.get(2) else {
        if eof {
            return Lexed::Consumed(input.len(), Some(Token::Text(input.to_string())));
        }
        return Lexed::NeedMore;
    };
    let name = if first.is_ascii_alphabetic() {
        let end = scan_name(bytes, 2);
        Some(input[2..end].to_ascii_lowercase())
    } else {
        None
    };
    match memchr(b'>', &bytes[2..]) {
        Some(rel) => Lexed::Consumed(2 + rel + 1, name.map(Token::EndTag)),
        None if eof => Lexed::Consumed(input.len(), name.map(Token::EndTag)),
        None => Lexed::NeedMore,
    }
}

fn lex_start_tag(input: &str, eof: bool, config: &TokenizerConfig) -> Lexed {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let name_end = scan_name(bytes, 1);
    let name = input[1..name_end].to_ascii_lowercase();
    let mut attributes: Attributes = Vec::new();
    let mut self_closing = false;
    let mut closed = false;
    let mut k = name_end;

    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };
    let decode = |raw: &str| {
        if config.decode_entities {
            decode_entities(raw).into_owned()
        } else {
            raw.to_string()
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            break;
        }
        match bytes[k] {
            b'>' => {
                k += 1;
                closed = true;
                break;
            }
            b'/' => {
                if k + 1 >= len {
                    break;
                }
                if bytes[k + 1] == b'>' {
                    self_closing = true;
                    closed = true;
                    k += 2;
                    break;
                }
                k += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = k;
        k = scan_name(bytes, k);
        if attr_start == k {
            // Not a name character; skip it.
            k += 1;
            continue;
        }
        let attr_name = input[attr_start..k].to_ascii_lowercase();

        skip_whitespace(&mut k);
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                let value_start = k + 1;
                match memchr(quote, &bytes[value_start..]) {
                    Some(rel) => {
                        k = value_start + rel + 1;
                        Some(decode(&input[value_start..value_start + rel]))
                    }
                    None => {
                        k = len;
                        Some(decode(&input[value_start..]))
                    }
                }
            } else {
                let value_start = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                Some(decode(&input[value_start..k]))
            }
        } else {
            None
        };
        attributes.push((attr_name, value));
    }

    if !closed && !eof {
        return Lexed::NeedMore;
    }
    if is_void_element(&name) {
        self_closing = true;
    }
    Lexed::Consumed(
        k.max(1),
        Some(Token::StartTag {
            name,
            attributes,
            self_closing,
        }),
    )
}

fn scan_name(bytes: &[u8], mut k: usize) -> usize {
    while k < bytes.len() && is_name_char(bytes[k]) {
        k += 1;
    }
    k
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn find_rawtext_close_tag(haystack: &str, close_tag: &[u8]) -> Option<(usize, usize)> {
    let bytes = haystack.as_bytes();
    let len = bytes.len();
    let n = close_tag.len();
    let mut i = 0;
    while i + n <= len {
        let rel = memchr(b'<', &bytes[i..])?;
        i += rel;
        if i + n > len {
            return None;
        }
        if bytes[i..i + n].eq_ignore_ascii_case(close_tag) {
            let mut k = i + n;
            // Only ASCII whitespace may sit between the name and `>`.
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, attrs: &[(&str, Option<&str>)]) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
            self_closing: false,
        }
    }

    fn end(name: &str) -> Token {
        Token::EndTag(name.to_string())
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn basic_document() {
        let tokens = tokenize("<!DOCTYPE html><div id=a class='b c'>hi</div>");
        assert_eq!(
            tokens,
            vec![
                Token::Doctype("DOCTYPE html".into()),
                start("div", &[("id", Some("a")), ("class", Some("b c"))]),
                text("hi"),
                end("div"),
            ]
        );
    }

    #[test]
    fn bare_and_uppercase_attributes() {
        let tokens = tokenize("<SCRIPT SRC=\"b.js\" Entry></script>");
        assert_eq!(
            tokens,
            vec![
                start("script", &[("src", Some("b.js")), ("entry", None)]),
                end("script"),
            ]
        );
    }

    #[test]
    fn script_body_is_rawtext() {
        let tokens = tokenize("<script>if (a < b && c > d) {}</ScRiPt >after");
        assert_eq!(
            tokens,
            vec![
                start("script", &[]),
                text("if (a < b && c > d) {}"),
                end("script"),
                text("after"),
            ]
        );
    }

    #[test]
    fn near_miss_close_tag_stays_in_rawtext() {
        let tokens = tokenize("<script>ok</scriptx >no</script>");
        assert_eq!(
            tokens,
            vec![start("script", &[]), text("ok</scriptx >no"), end("script")]
        );
    }

    #[test]
    fn void_and_self_closing_elements() {
        let tokens = tokenize("<img src=x.png><br/><x-a/>");
        assert!(tokens.iter().all(|t| matches!(
            t,
            Token::StartTag {
                self_closing: true,
                ..
            }
        )));
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let tokens = tokenize("a < b <3");
        assert_eq!(tokens, vec![text("a < b <3")]);
    }

    #[test]
    fn comments_and_bogus_declarations() {
        let tokens = tokenize("<!--x--><!foo><!-- open");
        assert_eq!(
            tokens,
            vec![
                Token::Comment("x".into()),
                Token::Comment("foo".into()),
                Token::Comment(" open".into()),
            ]
        );
    }

    #[test]
    fn entities_decoded_in_text_and_attributes() {
        let tokens = tokenize("<a title=\"x &amp; y\">&lt;b&gt;</a>");
        assert_eq!(
            tokens,
            vec![
                start("a", &[("title", Some("x & y"))]),
                text("<b>"),
                end("a"),
            ]
        );
    }

    #[test]
    fn entity_decoding_can_be_disabled() {
        let mut tokenizer = Tokenizer::new(TokenizerConfig {
            decode_entities: false,
        });
        let mut out = Vec::new();
        tokenizer.push_str("a&amp;b", &mut out);
        tokenizer.finish(&mut out);
        assert_eq!(out, vec![text("a&amp;b")]);
    }

    #[test]
    fn unclosed_rawtext_gets_implied_end_tag() {
        let tokens = tokenize("<style>body{}");
        assert_eq!(tokens, vec![start("style", &[]), text("body{}"), end("style")]);
    }

    #[test]
    fn stray_end_tag_syntax_is_dropped() {
        let tokens = tokenize("a</ >b");
        assert_eq!(tokens, vec![text("a"), text("b")]);
    }

    #[test]
    fn tokens_wait_for_their_full_extent() {
        let mut tokenizer = Tokenizer::default();
        let mut out = Vec::new();
        tokenizer.push_str("hello <di", &mut out);
        assert_eq!(out, vec![text("hello ")]);
        tokenizer.push_str("v class=\"a>b", &mut out);
        assert_eq!(out.len(), 1, "quoted `>` must not close the tag");
        tokenizer.push_str("\">x", &mut out);
        assert_eq!(out[1], start("div", &[("class", Some("a>b"))]));
        assert_eq!(tokenizer.buffered(), "x");
        tokenizer.finish(&mut out);
        assert_eq!(out[2], text("x"));
    }

    #[test]
    fn stats_count_tokens_and_peak_buffer() {
        let mut tokenizer = Tokenizer::default();
        let mut out = Vec::new();
        tokenizer.push_str("<p", &mut out);
        assert_eq!(tokenizer.stats().tokens_emitted, 0);
        tokenizer.push_str(">ab</p>", &mut out);
        tokenizer.finish(&mut out);
        assert_eq!(
            tokenizer.stats(),
            TokenizerStats {
                tokens_emitted: 3,
                bytes_consumed: 9,
                max_buffered: 9,
            }
        );
    }

    #[test]
    fn text_is_held_when_trailing_lt_is_undecided() {
        let mut tokenizer = Tokenizer::default();
        let mut out = Vec::new();
        tokenizer.push_str("a <", &mut out);
        assert!(out.is_empty());
        tokenizer.push_str(" b", &mut out);
        tokenizer.finish(&mut out);
        assert_eq!(out, vec![text("a < b")]);
    }

    #[test]
    fn every_two_way_split_matches_whole_input() {
        let input = "<!doctype html><head><title>t &amp; u</title></head>\
                     <div a=1 b='2' c>x<!-- c --></div><script src=\"a.js\"></script>\
                     <script>var s = '</scr' + 'ipt>';</script><p>é😀</p>";
        let expected = tokenize(input);
        for (split, _) in input.char_indices().skip(1) {
            let mut tokenizer = Tokenizer::default();
            let mut out = Vec::new();
            tokenizer.push_str(&input[..split], &mut out);
            tokenizer.push_str(&input[split..], &mut out);
            tokenizer.finish(&mut out);
            assert_eq!(out, expected, "split at {split}");
        }
    }

    #[test]
    fn large_rawtext_in_small_chunks() {
        let mut body = String::new();
        for _ in 0..2_000 {
            body.push_str("x < y; </scri");
        }
        let input = format!("<script>{body}</script>");
        let mut tokenizer = Tokenizer::default();
        let mut out = Vec::new();
        for chunk in input.as_bytes().chunks(7) {
            tokenizer.push_str(std::str::from_utf8(chunk).unwrap(), &mut out);
        }
        tokenizer.finish(&mut out);
        assert_eq!(out, vec![start("script", &[]), text(&body), end("script")]);
    }
}
