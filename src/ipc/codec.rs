//! NDJSON line codec shared by every inter-process stream.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum line
//! length so a misbehaving peer (automation host or worker process) cannot
//! make us buffer an unbounded line. Used for the worker chunk handoff,
//! the worker log relay, and the automation host protocol.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum line length accepted on inbound streams: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited UTF-8 framing with a [`MAX_LINE_BYTES`] limit.
///
/// Over-long inbound lines decode to `AppError::Io("line too long: …")`;
/// the limit is not enforced when encoding.
#[derive(Debug)]
pub struct NdjsonCodec(LinesCodec);

impl NdjsonCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for NdjsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NdjsonCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for NdjsonCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

/// Whether an error came from the line-length guard rather than the stream.
#[must_use]
pub fn is_framing_error(err: &AppError) -> bool {
    matches!(err, AppError::Io(msg) if msg.starts_with("line too long"))
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Io(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
