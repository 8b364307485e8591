use bytes::{Buf, BytesMut};
use std::convert::TryInto;
use std::env;
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::frame::Frame;
use crate::{Error, Result};

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Frames RESP values for `tokio_util::codec::Framed`.
///
/// Unlike [`Connection`](crate::connection::Connection), error replies are yielded as
/// [`Frame::Error`] values so that one error doesn't end the framed stream.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    max_depth: usize,
}

impl FrameCodec {
    pub fn new() -> FrameCodec {
        FrameCodec::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Deepest nesting of arrays accepted, 512 by default.
    pub fn max_depth(mut self, max_depth: usize) -> FrameCodec {
        self.max_depth = max_depth;
        self
    }

    /// Reads the limit from `MAX_FRAME_SIZE`, falling back to 512 MiB when unset.
    pub fn from_env() -> Result<FrameCodec> {
        let max_frame_size = match env::var("MAX_FRAME_SIZE") {
            Ok(s) => s
                .parse()
                .map_err(|_| Error::Config("MAX_FRAME_SIZE must be a number".to_string()))?,
            Err(_) => DEFAULT_MAX_FRAME_SIZE,
        };

        Ok(FrameCodec::with_max_frame_size(max_frame_size))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor, self.max_frame_size, self.max_depth) {
            Ok(frame) => frame,
            Err(Error::Incomplete) => {
                // Keep buffering, unless the partial frame is already over the limit.
                if src.len() > self.max_frame_size {
                    return Err(Error::Protocol("frame size exceeds limit".to_string()));
                }
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let position: usize = cursor
            .position()
            .try_into()
            .map_err(|_| Error::Protocol("frame size exceeds limit".to_string()))?;

        trace!(bytes = position, "decoded frame");

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.encode(dst);
        Ok(())
    }
}
