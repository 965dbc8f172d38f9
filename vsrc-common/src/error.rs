//! Decode error types shared by every format crate

/// Structural failure while decoding a source asset.
///
/// Any of these aborts the conversion of the asset that produced it, and
/// only that asset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Read of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Lump {lump} is truncated: {len} bytes at offset {offset} (record size {record_size}, buffer {size})")]
    TruncatedLump {
        lump: &'static str,
        offset: usize,
        len: usize,
        record_size: usize,
        size: usize,
    },

    #[error("Mip {level} is truncated: needs {len} bytes at offset {offset}, buffer is {size}")]
    TruncatedMip {
        level: u32,
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(i32),

    #[error("Unsupported model version: {0}")]
    UnsupportedModelVersion(i32),

    #[error("Lump {0} is compressed")]
    CompressedLump(&'static str),

    #[error("Invalid {what} index {index} (count {count})")]
    InvalidIndex {
        what: &'static str,
        index: i64,
        count: usize,
    },
}

impl DecodeError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        DecodeError::MalformedHeader(msg.into())
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
