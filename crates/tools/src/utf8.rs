//! Incremental UTF-8 decoding for byte streams that arrive in arbitrary chunks.
//!
//! A multi-byte sequence split across two chunks is held back until it is
//! complete. Invalid sequences become U+FFFD and decoding keeps going, so a
//! chunk boundary never changes the decoded text.

/// Stateful decoder: feed chunks with [`Utf8Decoder::push`], then call
/// [`Utf8Decoder::finish`] once the byte stream ends.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of an incomplete sequence carried over from the last chunk.
    pub fn pending(&self) -> &[u8] {
        &self.pending[..self.pending_len]
    }

    /// Decode `bytes`, returning every complete character seen so far.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() + self.pending_len);
        self.push_into(&mut out, bytes);
        out
    }

    /// Same as [`Utf8Decoder::push`] but appends to an existing buffer.
    pub fn push_into(&mut self, out: &mut String, mut bytes: &[u8]) {
        while self.pending_len > 0 && !bytes.is_empty() {
            let expected = sequence_len(self.pending[0]);
            if expected == 0 {
                out.push(char::REPLACEMENT_CHARACTER);
                self.pending_len = 0;
                break;
            }
            let missing = expected - self.pending_len;
            let take = missing.min(bytes.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&bytes[..take]);
            self.pending_len += take;
            bytes = &bytes[take..];
            if self.pending_len < expected {
                return;
            }

            // The sequence has its full length now; it may still be invalid, in which
            // case the tail bytes are decoded again as fresh input.
            let seq = self.pending;
            let seq_len = self.pending_len;
            self.pending_len = 0;
            self.decode_complete(out, &seq[..seq_len]);
        }
        if !bytes.is_empty() {
            self.decode_complete(out, bytes);
        }
    }

    /// Flush whatever is still pending. A truncated trailing sequence decodes
    /// to U+FFFD instead of being dropped.
    pub fn finish(&mut self) -> String {
        if self.pending_len == 0 {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending[..self.pending_len]).into_owned();
        self.pending_len = 0;
        tail
    }

    fn decode_complete(&mut self, out: &mut String, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(valid) => {
                    out.push_str(valid);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[bad..];
                        }
                        None => {
                            // Incomplete suffix: at most three bytes by construction.
                            self.pending[..rest.len()].copy_from_slice(rest);
                            self.pending_len = rest.len();
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn sequence_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// Decode a whole byte slice through a chunked decoder, splitting at `boundaries`.
pub fn decode_chunked(bytes: &[u8], boundaries: &[usize]) -> String {
    let mut decoder = Utf8Decoder::new();
    let mut out = String::new();
    let mut last = 0usize;
    for &idx in boundaries {
        if idx <= last || idx > bytes.len() {
            continue;
        }
        decoder.push_into(&mut out, &bytes[last..idx]);
        last = idx;
    }
    decoder.push_into(&mut out, &bytes[last..]);
    out.push_str(&decoder.finish());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_byte_char_split_in_half() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[0xC3]), "");
        assert_eq!(decoder.pending(), &[0xC3]);
        assert_eq!(decoder.push(&[0x97]), "×");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn four_byte_char_completed_with_trailing_ascii() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[0xF0, 0x9F]), "");
        assert_eq!(decoder.push(&[0x98]), "");
        assert_eq!(decoder.push(&[0x80, b'!']), "😀!");
    }

    #[test]
    fn new_incomplete_sequence_is_carried_again() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[0xE2]), "");
        assert_eq!(decoder.push(&[0x82, 0xAC, 0xE2]), "€");
        assert_eq!(decoder.pending(), &[0xE2]);
    }

    #[test]
    fn invalid_lead_byte_is_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[0xFF, b'f']), "\u{FFFD}f");
    }

    #[test]
    fn broken_continuation_in_carry_does_not_swallow_ascii() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[0xE2]), "");
        let out = decoder.push(&[b'a', b'b']);
        assert!(out.ends_with("b"), "got {out:?}");
        assert!(out.starts_with('\u{FFFD}'), "got {out:?}");
    }

    #[test]
    fn truncated_tail_is_flushed_on_finish() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn every_split_point_matches_one_shot_decode() {
        let text = "é<script>😀</script>ö &amp; 120×32";
        let bytes = text.as_bytes();
        for split in 1..bytes.len() {
            assert_eq!(decode_chunked(bytes, &[split]), text, "split={split}");
        }
        let every: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(decode_chunked(bytes, &every), text);
    }
}
