//! Tokenization for the tag-delimited wire grammar.
//!
//! There are two levels of strictness, and both are needed: the lenient helpers
//!  ([element_text], [split_after_last]) extract fields from wherever they can be found,
//!  which is what the integrity phase and the response decoder want - a message with a
//!  damaged structure must still yield whatever fields are recognizable so it can be
//!  answered (or rejected) in a routable way. The [Scanner] accepts only the exact
//!  left-to-right tag sequence of the grammar and is what the strict syntax check uses.

use std::num::ParseIntError;
use std::str::FromStr;

use anyhow::{anyhow, bail};

pub const REQUEST_OPEN: &[u8] = b"<request>";
pub const REQUEST_CLOSE: &[u8] = b"</request>";
pub const RESPONSE_OPEN: &[u8] = b"<response>";
pub const RESPONSE_CLOSE: &[u8] = b"</response>";
pub const ID_OPEN: &[u8] = b"<id>";
pub const ID_CLOSE: &[u8] = b"</id>";
pub const CODE_OPEN: &[u8] = b"<code>";
pub const CODE_CLOSE: &[u8] = b"</code>";
pub const MEASUREMENT_OPEN: &[u8] = b"<measurement>";
pub const MEASUREMENT_CLOSE: &[u8] = b"</measurement>";
pub const VALUE_OPEN: &[u8] = b"<value>";
pub const VALUE_CLOSE: &[u8] = b"</value>";

/// Removes all ASCII whitespace. Decoding and checksum computation operate on the
///  stripped bytes.
pub fn strip_whitespace(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// The text after the first occurrence of `open`, up to the next occurrence of `close` -
///  or up to the end of input if `close` never occurs. `None` if `open` is absent.
pub fn element_text<'a>(stripped: &'a [u8], open: &[u8], close: &[u8]) -> Option<&'a [u8]> {
    let start = find(stripped, open)? + open.len();
    let rest = &stripped[start..];
    match find(rest, close) {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

/// Splits at the last occurrence of `close_tag`, returning the body up to and including the
///  tag, and the trailer after it. This is how the trailing checksum is isolated from the
///  message body. `None` if the tag is absent.
pub fn split_after_last<'a>(stripped: &'a [u8], close_tag: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
    let mut last = None;
    let mut offset = 0;
    while let Some(i) = find(&stripped[offset..], close_tag) {
        last = Some(offset + i);
        offset += i + close_tag.len();
    }
    let end = last? + close_tag.len();
    Some((&stripped[..end], &stripped[end..]))
}

/// Parses a field as an unsigned decimal integer. Only plain digit sequences are accepted:
///  no sign, no leading/trailing junk, no empty input.
pub fn parse_int<T>(text: &[u8]) -> anyhow::Result<T>
where
    T: FromStr<Err = ParseIntError>,
{
    if text.is_empty() || !text.iter().all(|b| b.is_ascii_digit()) {
        bail!("not an unsigned decimal integer: {:?}", String::from_utf8_lossy(text));
    }
    let s = std::str::from_utf8(text)?;
    s.parse::<T>()
        .map_err(|e| anyhow!("integer field {} out of range: {}", s, e))
}

/// Parses a `<value>` field: digits and at most the dots a decimal rendering produces -
///  no sign, no exponent.
pub fn parse_float(text: &[u8]) -> anyhow::Result<f32> {
    if text.is_empty() || !text.iter().all(|b| b.is_ascii_digit() || *b == b'.') {
        bail!("not an unsigned decimal number: {:?}", String::from_utf8_lossy(text));
    }
    let s = std::str::from_utf8(text)?;
    s.parse::<f32>()
        .map_err(|e| anyhow!("unparseable number {}: {}", s, e))
}

/// Strict left-to-right scanner over a stripped message: tags must appear exactly where
///  the grammar puts them, with nothing in between.
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Scanner<'a> {
        Scanner { input, pos: 0 }
    }

    /// consumes `lit` at the current position, or fails
    pub fn expect(&mut self, lit: &[u8]) -> anyhow::Result<()> {
        if self.input[self.pos..].starts_with(lit) {
            self.pos += lit.len();
            Ok(())
        } else {
            bail!("expected {:?} at offset {}", String::from_utf8_lossy(lit), self.pos);
        }
    }

    /// consumes and returns everything up to the next occurrence of `until`, then consumes
    ///  `until` itself
    pub fn scan_until(&mut self, until: &[u8]) -> anyhow::Result<&'a [u8]> {
        match find(&self.input[self.pos..], until) {
            Some(i) => {
                let text = &self.input[self.pos..self.pos + i];
                self.pos += i + until.len();
                Ok(text)
            }
            None => bail!("missing {:?} after offset {}", String::from_utf8_lossy(until), self.pos),
        }
    }

    /// the unconsumed remainder of the input
    pub fn remainder(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }
}
