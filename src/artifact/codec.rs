//! Decompression codecs for published artifacts.
//!
//! Builds are published gzip-compressed. The integrity pass decompresses them
//! through a [`Codec`] so that the passthrough codec can stand in for a
//! decompressor that silently does nothing.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// A compression/decompression codec.
pub trait Codec: Send + Sync {
    /// Short codec name for logs and errors.
    fn name(&self) -> &'static str;

    /// Compresses input data.
    fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>>;

    /// Decompresses previously compressed data.
    fn decompress(&self, input: &[u8]) -> std::io::Result<Vec<u8>>;
}

/// No-op codec (passthrough).
#[derive(Debug, Clone, Copy)]
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// Gzip codec using `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    /// Compression level (0-9).
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(input)?;
        encoder.finish()
    }

    fn decompress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(input);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_decompresses_published_build() {
        let codec = GzipCodec::default();
        let module = b"\0asm\x01\0\0\0 module body module body module body";
        let published = codec.compress(module).unwrap();

        assert_ne!(published.as_slice(), module.as_slice());
        assert_eq!(codec.decompress(&published).unwrap(), module);
    }

    #[test]
    fn gzip_rejects_garbage() {
        let codec = GzipCodec::default();
        assert!(codec.decompress(b"definitely not gzip").is_err());
    }

    #[test]
    fn none_codec_is_identity() {
        let codec = NoneCodec;
        assert_eq!(codec.decompress(b"bytes").unwrap(), b"bytes");
        assert_eq!(codec.name(), "none");
    }
}
