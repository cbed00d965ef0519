//! Archive codecs
//!
//! Every byte that goes into a snapshot archive passes through an
//! [`ArchiveCodec`]. A snapshot records whether it was compressed, and
//! restore picks the matching codec with [`codec_for`].

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Archive codec trait.
///
/// Codecs must be `Send + Sync` so one instance can be shared by the
/// scheduler thread and administrative callers.
pub trait ArchiveCodec: Send + Sync {
    /// Encode a document's bytes for the archive.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Reverse [`encode`](Self::encode)
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Unique codec identifier, used in error messages and logs.
    fn codec_id(&self) -> &'static str;

    /// Suffix appended to a document's file name to form its archive name.
    fn extension(&self) -> &'static str;
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Encoding failed
    #[error("Encode error (codec={codec_id}): {detail}")]
    EncodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the encode.
        codec_id: String,
    },

    /// Decoding failed (truncated or corrupt archive).
    ///
    /// Carries the codec identity and data length so callers can
    /// distinguish a wrong-codec error from data corruption.
    #[error("Decode error (codec={codec_id}, data_len={data_len}): {detail}")]
    DecodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the decode.
        codec_id: String,
        /// Length of the data that failed to decode.
        data_len: usize,
    },
}

impl CodecError {
    /// Create a decode error with full diagnostic context.
    pub fn decode(detail: impl Into<String>, codec_id: impl Into<String>, data_len: usize) -> Self {
        CodecError::DecodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
            data_len,
        }
    }

    /// Create an encode error
    pub fn encode(detail: impl Into<String>, codec_id: impl Into<String>) -> Self {
        CodecError::EncodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
        }
    }
}

/// Stores documents as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl ArchiveCodec for IdentityCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &'static str {
        "identity"
    }

    fn extension(&self) -> &'static str {
        ""
    }
}

/// Gzip-compresses documents
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: Compression,
}

impl Default for GzipCodec {
    fn default() -> Self {
        GzipCodec {
            level: Compression::default(),
        }
    }
}

impl GzipCodec {
    /// Gzip codec with an explicit compression level (0-9).
    pub fn with_level(level: u32) -> Self {
        GzipCodec {
            level: Compression::new(level.min(9)),
        }
    }
}

impl ArchiveCodec for GzipCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder
            .write_all(data)
            .and_then(|_| encoder.finish())
            .map_err(|e| CodecError::encode(e.to_string(), self.codec_id()))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(data.len() * 4);
        GzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::decode(e.to_string(), self.codec_id(), data.len()))?;
        Ok(out)
    }

    fn codec_id(&self) -> &'static str {
        "gzip"
    }

    fn extension(&self) -> &'static str {
        ".gz"
    }
}

/// Codec matching a snapshot's `compressed` flag.
pub fn codec_for(compressed: bool) -> Box<dyn ArchiveCodec> {
    if compressed {
        Box::new(GzipCodec::default())
    } else {
        Box::new(IdentityCodec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _accepts_box_dyn_codec(_codec: Box<dyn ArchiveCodec>) {}

    #[test]
    fn test_identity_is_passthrough() {
        let codec = IdentityCodec;
        let data = b"{\"workflows\":[]}";
        assert_eq!(codec.encode(data).unwrap(), data);
        assert_eq!(codec.decode(data).unwrap(), data);
        assert_eq!(codec.extension(), "");
    }

    #[test]
    fn test_gzip_roundtrip_shrinks_repetitive_json() {
        let codec = GzipCodec::default();
        let data: Vec<u8> = serde_json::to_vec_pretty(&serde_json::json!({
            "workflows": vec![serde_json::json!({"id": "w", "nodes": []}); 200]
        }))
        .unwrap();

        let encoded = codec.encode(&data).unwrap();
        assert!(encoded.len() < data.len());
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_gzip_rejects_garbage() {
        let err = GzipCodec::default().decode(b"not gzip at all").unwrap_err();
        match err {
            CodecError::DecodeError { codec_id, data_len, .. } => {
                assert_eq!(codec_id, "gzip");
                assert_eq!(data_len, 15);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_gzip_rejects_truncated_archive() {
        let codec = GzipCodec::with_level(9);
        let encoded = codec.encode(&[7u8; 4096]).unwrap();
        assert!(codec.decode(&encoded[..encoded.len() - 8]).is_err());
    }

    #[test]
    fn test_codec_for_flag() {
        assert_eq!(codec_for(true).codec_id(), "gzip");
        assert_eq!(codec_for(false).codec_id(), "identity");
    }
}
