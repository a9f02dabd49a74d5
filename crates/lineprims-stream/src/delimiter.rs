//! Delimiter sets and the per-consumer byte-to-token framer.

use bytes::{BufMut, BytesMut};

use crate::error::{Result, StreamError};

/// Carriage return.
pub const CR: u8 = b'\r';

/// Line feed.
pub const LF: u8 = b'\n';

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// A non-empty set of terminator bytes.
///
/// Membership is all that matters: any single byte in the set ends the
/// current token, and consecutive terminators each end one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    bytes: Vec<u8>,
}

impl Delimiters {
    /// Build a delimiter set from the given bytes, in caller order.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(StreamError::EmptyDelimiters);
        }
        Ok(Self { bytes })
    }

    /// A set holding exactly one terminator.
    pub fn single(byte: u8) -> Self {
        Self { bytes: vec![byte] }
    }

    /// Returns true if `byte` terminates a token.
    pub fn contains(&self, byte: u8) -> bool {
        self.bytes.contains(&byte)
    }

    /// The configured bytes, in caller order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The first configured byte; used when a terminator has to be written.
    pub fn first(&self) -> u8 {
        self.bytes[0]
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self { bytes: vec![CR, LF] }
    }
}

/// Splits a byte sequence into string tokens at delimiter bytes.
///
/// One framer serves one consumer. Feed it bytes with [`push`](Self::push)
/// and call [`finish`](Self::finish) when the upstream ends, normally or not,
/// so a trailing partial token is not lost.
#[derive(Debug)]
pub struct DelimiterFramer {
    delimiters: Delimiters,
    buf: BytesMut,
}

impl DelimiterFramer {
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            delimiters,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Feed one byte. Returns a token when `byte` is a delimiter.
    ///
    /// A delimiter arriving on an empty buffer yields `""`.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if self.delimiters.contains(byte) {
            return Some(self.take());
        }
        self.buf.put_u8(byte);
        None
    }

    /// Flush the pending partial token, if there is one.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.take())
    }

    /// Bytes buffered since the last emission.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    fn take(&mut self) -> String {
        let token = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        token
    }
}

impl Default for DelimiterFramer {
    fn default() -> Self {
        Self::new(Delimiters::default())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn frame_all(input: &[u8], delimiters: &Delimiters) -> Vec<String> {
        let mut framer = DelimiterFramer::new(delimiters.clone());
        let mut out: Vec<String> = input.iter().filter_map(|b| framer.push(*b)).collect();
        out.extend(framer.finish());
        out
    }

    #[test]
    fn empty_delimiter_set_rejected() {
        assert_eq!(Delimiters::new(Vec::new()), Err(StreamError::EmptyDelimiters));
    }

    #[test]
    fn default_is_cr_lf() {
        let delimiters = Delimiters::default();
        assert_eq!(delimiters.as_bytes(), &[CR, LF]);
        assert_eq!(delimiters.first(), CR);
        assert!(delimiters.contains(LF));
        assert!(!delimiters.contains(b'a'));
    }

    #[test]
    fn no_bytes_emit_nothing() {
        assert!(frame_all(b"", &Delimiters::default()).is_empty());
    }

    #[test]
    fn cr_lf_emits_two_empty_tokens() {
        assert_eq!(frame_all(b"\r\n", &Delimiters::default()), vec!["", ""]);
    }

    #[test]
    fn terminated_token_is_not_flushed_twice() {
        assert_eq!(frame_all(b"ab\r", &Delimiters::default()), vec!["ab"]);
    }

    #[test]
    fn trailing_partial_token_flushed_on_finish() {
        assert_eq!(
            frame_all(b"one\ntwo\nthr", &Delimiters::default()),
            vec!["one", "two", "thr"]
        );
    }

    #[test]
    fn delimiter_order_does_not_matter() {
        let delimiters = Delimiters::new(vec![CR, LF]).unwrap();
        assert_eq!(frame_all(b"a\n\rb", &delimiters), vec!["a", "", "b"]);
    }

    #[test]
    fn custom_single_delimiter() {
        let delimiters = Delimiters::single(b';');
        assert_eq!(frame_all(b"x=1;y=2;\n", &delimiters), vec!["x=1", "y=2", "\n"]);
    }

    #[test]
    fn buffer_is_reused_after_emission() {
        let mut framer = DelimiterFramer::default();
        assert_eq!(framer.push(b'a'), None);
        assert_eq!(framer.pending(), b"a");
        assert_eq!(framer.push(LF).as_deref(), Some("a"));
        assert!(framer.pending().is_empty());
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let tokens = frame_all(&[b'o', 0xFF, b'k', LF], &Delimiters::default());
        assert_eq!(tokens, vec!["o\u{FFFD}k"]);
    }

    fn delimiter_sets() -> impl Strategy<Value = Delimiters> {
        prop::collection::vec(any::<u8>(), 1..4).prop_map(|bytes| Delimiters::new(bytes).unwrap())
    }

    fn inputs() -> impl Strategy<Value = Vec<u8>> {
        // Skew towards small alphabets so delimiters actually show up.
        prop::collection::vec(prop_oneof![Just(CR), Just(LF), 0u8..8, any::<u8>()], 0..64)
    }

    proptest! {
        #[test]
        fn reinserting_delimiters_rebuilds_input(delimiters in delimiter_sets(), input in inputs()) {
            let mut framer = DelimiterFramer::new(delimiters.clone());
            let mut rebuilt = Vec::new();
            let mut raw_token = Vec::new();
            for &byte in &input {
                if let Some(token) = framer.push(byte) {
                    prop_assert_eq!(token, String::from_utf8_lossy(&raw_token).into_owned());
                    rebuilt.append(&mut raw_token);
                    rebuilt.push(byte);
                } else {
                    raw_token.push(byte);
                }
            }
            if framer.finish().is_some() {
                rebuilt.append(&mut raw_token);
            }
            prop_assert_eq!(rebuilt, input);
        }

        #[test]
        fn emission_count_matches_delimiters(delimiters in delimiter_sets(), input in inputs()) {
            let tokens = frame_all(&input, &delimiters);
            let hits = input.iter().filter(|b| delimiters.contains(**b)).count();
            let trailing = match input.last() {
                Some(last) if !delimiters.contains(*last) => 1,
                _ => 0,
            };
            prop_assert_eq!(tokens.len(), hits + trailing);
        }

        #[test]
        fn tokens_match_split_for_ascii(input in "[a-c\r\n]{0,40}") {
            let tokens = frame_all(input.as_bytes(), &Delimiters::default());
            let mut expected: Vec<String> = input
                .split(['\r', '\n'])
                .map(str::to_string)
                .collect();
            // `split` always yields a trailing piece; the framer only flushes a non-empty one.
            if expected.last().is_some_and(String::is_empty) {
                expected.pop();
            }
            prop_assert_eq!(tokens, expected);
        }
    }
}
