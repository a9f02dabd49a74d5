//! Delimiter framing as a `tokio_util` codec.
//!
//! [`DelimiterCodec`] applies the same emission rules as
//! [`DelimiterFramer`](crate::DelimiterFramer) to an async byte source, for
//! callers that read through `FramedRead` instead of a [`ByteStream`](crate::ByteStream).

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::delimiter::{DelimiterFramer, Delimiters};

#[derive(Debug, Default)]
pub struct DelimiterCodec {
    framer: DelimiterFramer,
}

impl DelimiterCodec {
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            framer: DelimiterFramer::new(delimiters),
        }
    }
}

impl Decoder for DelimiterCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            if let Some(token) = self.framer.push(src.get_u8()) {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(token) = self.decode(src)? {
            return Ok(Some(token));
        }
        Ok(self.framer.finish())
    }
}

/// Writes the text followed by the first configured delimiter.
impl Encoder<&str> for DelimiterCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(self.framer.delimiters().first());
        Ok(())
    }
}
