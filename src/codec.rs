use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SocksError};

/// Text encoding used for SOCKS strings (usernames, passwords, USERID,
/// domain labels).
///
/// `Raw` passes bytes through unchanged instead of requiring valid UTF-8:
/// each byte round-trips through the `char` of the same code point (a
/// transparent Latin-1-style mapping, not a lossy substitution), so
/// `encode(decode(raw)) == raw` for any byte string, not just valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    Raw,
}

impl Encoding {
    pub(crate) fn decode(self, raw: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(raw.to_vec())
                .map_err(|_| SocksError::Protocol("invalid UTF-8 in protocol string".to_string())),
            Encoding::Raw => Ok(raw.iter().map(|&b| b as char).collect()),
        }
    }

    /// Inverse of [`Encoding::decode`]. For `Raw`, each `char` that came out
    /// of `decode` is one byte that went in, so this recovers it exactly
    /// instead of re-encoding through UTF-8 (which would widen any byte
    /// `>= 0x80` to two bytes).
    pub(crate) fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => s.as_bytes().to_vec(),
            Encoding::Raw => s.chars().map(|c| c as u8).collect(),
        }
    }
}

/// Sans-I/O buffered reader/writer.
///
/// `Codec` owns nothing but bytes: it never performs I/O itself. Its `try_*`
/// methods operate purely on whatever has already been buffered and return
/// `None`/need-more when there isn't enough data yet; the engine (see
/// [`crate::engine`]) is responsible for calling an adapter and feeding the
/// result back in via [`Codec::feed`]. This split is what makes the
/// handshake state machines testable against plain byte buffers without a
/// network (see the `adapter::memory` module and the property tests).
#[derive(Debug, Default)]
pub struct Codec {
    buffer: BytesMut,
    encoding: Encoding,
}

impl Codec {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            buffer: BytesMut::new(),
            encoding,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Appends bytes most recently read from the transport.
    pub fn feed(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Returns `n` bytes from the front of the buffer, or `None` if fewer
    /// than `n` bytes are currently buffered. Unless `put_back` is set, the
    /// returned bytes are consumed.
    pub fn try_read_exactly(&mut self, n: usize, put_back: bool) -> Option<Bytes> {
        if self.buffer.len() < n {
            return None;
        }
        if put_back {
            Some(Bytes::copy_from_slice(&self.buffer[..n]))
        } else {
            Some(self.buffer.split_to(n).freeze())
        }
    }

    /// Returns the bytes preceding the first occurrence of `delim`, not
    /// including the delimiter itself (the delimiter is left in the
    /// buffer). Returns `Ok(None)` when the delimiter has not been seen yet
    /// and no cap has been exceeded; `Err` when `max_size` rules it out.
    pub fn try_read_until(
        &mut self,
        delim: u8,
        max_size: Option<usize>,
        put_back: bool,
    ) -> Result<Option<Bytes>> {
        let pos = self.buffer.iter().position(|&b| b == delim);
        if let Some(max) = max_size {
            let exceeds = match pos {
                Some(p) => p > max,
                None => self.buffer.len() > max,
            };
            if exceeds {
                return Err(SocksError::Protocol(format!(
                    "buffer became too long ({} > {})",
                    self.buffer.len(),
                    max
                )));
            }
        }
        Ok(match pos {
            Some(p) if put_back => Some(Bytes::copy_from_slice(&self.buffer[..p])),
            Some(p) => Some(self.buffer.split_to(p).freeze()),
            None => None,
        })
    }

    #[cfg(test)]
    pub(crate) fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_exactly_put_back_then_consume_yields_same_bytes() {
        let mut codec = Codec::new(Encoding::Utf8);
        codec.feed(Bytes::from_static(b"1234"));
        let peeked = codec.try_read_exactly(3, true).unwrap();
        let consumed = codec.try_read_exactly(3, false).unwrap();
        assert_eq!(peeked, consumed);
        assert_eq!(codec.buffered_len(), 1);
    }

    #[test]
    fn read_exactly_reports_not_enough_data() {
        let mut codec = Codec::new(Encoding::Utf8);
        codec.feed(Bytes::from_static(b"1"));
        assert!(codec.try_read_exactly(2, false).is_none());
    }

    #[test]
    fn read_until_leaves_delimiter_unconsumed() {
        let mut codec = Codec::new(Encoding::Utf8);
        codec.feed(Bytes::from_static(b"123456"));
        let prefix = codec.try_read_until(b'4', None, false).unwrap().unwrap();
        assert_eq!(&prefix[..], b"123");
        assert_eq!(codec.buffered_len(), 3); // "456" still there, "4" included
    }

    #[test]
    fn read_until_fails_when_delimiter_beyond_max_size() {
        let mut codec = Codec::new(Encoding::Utf8);
        codec.feed(Bytes::from_static(b"123456"));
        assert!(codec.try_read_until(b'4', Some(2), false).is_err());
    }

    #[test]
    fn read_until_fails_when_buffered_exceeds_max_with_no_delimiter() {
        let mut codec = Codec::new(Encoding::Utf8);
        codec.feed(Bytes::from_static(b"123"));
        assert!(codec.try_read_until(b'4', Some(2), false).is_err());
    }

    #[test]
    fn read_until_waits_when_under_cap_and_no_delimiter() {
        let mut codec = Codec::new(Encoding::Utf8);
        codec.feed(Bytes::from_static(b"12"));
        assert_eq!(codec.try_read_until(b'4', Some(4), false).unwrap(), None);
    }

    #[test]
    fn utf8_encoding_rejects_non_utf8_bytes() {
        let raw: &[u8] = &[0xff, 0xfe, 0x00];
        assert!(Encoding::Utf8.decode(raw).is_err());
    }

    #[test]
    fn raw_encoding_round_trips_non_utf8_bytes_losslessly() {
        let raw: &[u8] = &[0x00, 0x7f, 0x80, 0xff, 0x01, 0xfe];
        let decoded = Encoding::Raw.decode(raw).unwrap();
        let re_encoded = Encoding::Raw.encode(&decoded);
        assert_eq!(re_encoded, raw);
    }
}
