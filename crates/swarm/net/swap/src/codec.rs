//! Length-delimited JSON codec for [`SwapMessage`].

use asynchronous_codec::{Decoder, Encoder};
use bytes::{Buf, BufMut, BytesMut};

use crate::{MAX_MESSAGE_SIZE, SwapMessage};

/// Size of the big-endian length prefix.
const LENGTH_PREFIX: usize = 4;

/// Errors from [`SwapCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },
}

/// Frames each message as a 4-byte big-endian length followed by JSON.
#[derive(Debug, Clone, Copy)]
pub struct SwapCodec {
    max_size: usize,
}

impl SwapCodec {
    /// Create a codec rejecting payloads above `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.min(u32::MAX as usize),
        }
    }
}

impl Default for SwapCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl Encoder for SwapCodec {
    type Item<'a> = SwapMessage;
    type Error = CodecError;

    fn encode(&mut self, item: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        let size = payload.len();
        let len = u32::try_from(size)
            .ok()
            .filter(|_| size <= self.max_size)
            .ok_or(CodecError::MessageTooLarge {
                size,
                max: self.max_size,
            })?;

        dst.reserve(LENGTH_PREFIX + size);
        dst.put_u32(len);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl Decoder for SwapCodec {
    type Item = SwapMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(prefix) = src.first_chunk::<LENGTH_PREFIX>() else {
            return Ok(None);
        };
        let size = u32::from_be_bytes(*prefix) as usize;
        if size > self.max_size {
            return Err(CodecError::MessageTooLarge {
                size,
                max: self.max_size,
            });
        }

        let frame_len = LENGTH_PREFIX + size;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let payload = src.split_to(size);
        Ok(Some(serde_json::from_slice(&payload)?))
    }
}
