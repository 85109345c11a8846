//! Portable network graphics decoder.
//!
//! Interface only; decoding is not implemented yet and every input is
//! reported as malformed.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngError {
    #[error("malformed png data")]
    Malformed,
}

/// A decoded png image: canonical rgba-ordered pixels, rows bottom-up.
pub struct PngImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// Decode a png file. Always fails until the decoder lands.
pub fn decode(_input: &[u8]) -> Result<PngImage, PngError> {
    Err(PngError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_is_not_supported_yet() {
        assert!(matches!(decode(b"\x89PNG\r\n"), Err(PngError::Malformed)));
    }
}
