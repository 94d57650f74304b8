//! Gzip wrapper over byte buffers.
//!
//! Chunks are compressed independently so any chunk can be read without
//! touching its siblings. The format is standard gzip, keeping on-disk
//! chunks portable across implementations.

use crate::error::CompressionError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compresses a byte buffer with gzip.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(CompressionError::Compress)?;
    encoder.finish().map_err(CompressionError::Compress)
}

/// Decompresses a gzip byte buffer.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(CompressionError::Decompress)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"hello, chunked world".to_vec();
        let packed = compress(&data).unwrap();
        let unpacked = decompress(&packed).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn empty_round_trip() {
        let packed = compress(&[]).unwrap();
        assert_eq!(decompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn compresses_repetitive_payloads() {
        let data = vec![b'a'; 64 * 1024];
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn rejects_garbage() {
        let result = decompress(b"definitely not gzip");
        assert!(matches!(result, Err(CompressionError::Decompress(_))));
    }
}
