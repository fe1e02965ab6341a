//! Character reference decoding for text and attribute values.
//!
//! Only a narrow, stable subset is decoded: the six common named references
//! and semicolon-terminated numeric references that name a valid scalar.
//! Everything else passes through untouched.

use memchr::memchr;
use std::borrow::Cow;

const NAMED: &[(&str, char)] = &[
    ("amp;", '&'),
    ("lt;", '<'),
    ("gt;", '>'),
    ("quot;", '"'),
    ("apos;", '\''),
    ("nbsp;", '\u{00A0}'),
];

const MAX_HEX_DIGITS: usize = 6;
const MAX_DEC_DIGITS: usize = 7;

pub(crate) fn decode_entities(s: &str) -> Cow<'_, str> {
    let Some(first) = memchr(b'&', s.as_bytes()) else {
        return Cow::Borrowed(s);
    };
    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut rest = &s[first..];

    while let Some(amp) = memchr(b'&', rest.as_bytes()) {
        out.push_str(&rest[..amp]);
        let reference = &rest[amp + 1..];
        match decode_reference(reference) {
            Some((ch, used)) => {
                out.push(ch);
                rest = &reference[used..];
            }
            None => {
                out.push('&');
                rest = reference;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decode the reference following an `&`; returns the character and the bytes used.
fn decode_reference(s: &str) -> Option<(char, usize)> {
    if let Some(numeric) = s.strip_prefix('#') {
        let (digits, radix, prefix) = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (numeric, 10, 1),
        };
        let max = if radix == 16 {
            MAX_HEX_DIGITS
        } else {
            MAX_DEC_DIGITS
        };
        let end = digits.bytes().take(max + 1).position(|b| b == b';')?;
        let body = &digits[..end];
        if body.is_empty() || body.len() > max || !body.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        let ch = u32::from_str_radix(body, radix).ok().and_then(char::from_u32)?;
        return Some((ch, prefix + end + 1));
    }
    NAMED
        .iter()
        .find(|(name, _)| s.starts_with(name))
        .map(|(name, ch)| (*ch, name.len()))
}
