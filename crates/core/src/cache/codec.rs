//! Streaming compression of stored values.
//!
//! Values are written as zstd frames, which are self-delimiting, so the stored
//! bytes need no extra length prefix.

use std::io::{self, Write};

use crate::Error;

/// Default zstd level for new writes.
pub const DEFAULT_LEVEL: i32 = 3;

/// Compress a payload into a complete zstd frame.
///
/// The frame is only complete once the encoder is finished. If a write fails
/// midway the encoder is still finished before the write error is returned.
pub fn compress(payload: &[u8], level: i32) -> Result<Vec<u8>, Error> {
    let mut encoder = zstd::stream::write::Encoder::new(Vec::with_capacity(payload.len() / 2 + 16), level)
        .map_err(Error::Compress)?;

    if let Err(e) = encoder.write_all(payload) {
        let _ = encoder.finish();
        return Err(Error::Compress(e));
    }

    encoder.finish().map_err(Error::Compress)
}

/// Decompress bytes produced by [`compress`].
///
/// Reads until end-of-stream; any framing or checksum problem is reported as
/// `CorruptPayload`.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = zstd::stream::read::Decoder::new(bytes).map_err(Error::CorruptPayload)?;
    let mut out = Vec::with_capacity(bytes.len() * 2);
    io::copy(&mut decoder, &mut out).map_err(Error::CorruptPayload)?;
    Ok(out)
}
