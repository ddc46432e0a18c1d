//! Incremental UTF-8 decoding across chunk boundaries.

/// Decodes a byte stream delivered in arbitrary pieces.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the rest
/// of it arrives. Bytes that can never form valid UTF-8 are replaced with
/// U+FFFD, one replacement per maximal invalid subsequence.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning all text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[bad..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of input. An incomplete trailing sequence becomes a
    /// single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"hello"), "hello");
        assert!(!d.has_pending());
    }

    #[test]
    fn test_split_two_byte_char() {
        let bytes = "é".as_bytes();
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(&bytes[..1]), "");
        assert!(d.has_pending());
        assert_eq!(d.decode(&bytes[1..]), "é");
        assert!(!d.has_pending());
    }

    #[test]
    fn test_split_four_byte_char_byte_by_byte() {
        let bytes = "a🎉b".as_bytes();
        let mut d = Utf8Decoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&d.decode(std::slice::from_ref(b)));
        }
        assert_eq!(out, "a🎉b");
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_incomplete_sequence() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(&"世".as_bytes()[..2]), "");
        assert_eq!(d.finish(), "\u{FFFD}");
        assert_eq!(d.finish(), "");
    }
}
