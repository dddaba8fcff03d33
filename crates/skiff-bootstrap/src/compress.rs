//! Payload compression and ceiling enforcement.
//!
//! Cloud backends cap machine boot data at tens of kilobytes, and
//! cloud-init decodes gzip'd user data natively, so gzip is the whole
//! story here: no bespoke framing the boot agent would need tooling for.
//! A payload that still exceeds the ceiling after compression is a clean
//! failure before any cloud resource exists; truncation would boot a
//! machine into half a script.

use crate::interpolate::InterpolatedScript;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use skiff_types::{Result, SkiffError};
use std::io::{Read, Write};
use tracing::debug;

/// Compressed boot payload, sized within the active backend's ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPayload {
    bytes: Vec<u8>,
}

impl CompressedPayload {
    /// Payload size in bytes (what the backend's ceiling is checked
    /// against).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw gzip bytes to attach as machine boot data.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base64 rendering for APIs that only accept text boot data.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Size of the base64 rendering, for callers sizing against a
    /// text-transport ceiling.
    pub fn encoded_len(&self) -> usize {
        self.bytes.len().div_ceil(3) * 4
    }
}

/// Compress an interpolated script and enforce the payload ceiling.
///
/// # Errors
///
/// `PayloadTooLarge { actual, ceiling }` when the gzip output exceeds
/// `ceiling`. The payload is never truncated.
pub fn compress(script: &InterpolatedScript, ceiling: usize) -> Result<CompressedPayload> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(script.as_bytes())?;
    let bytes = encoder.finish()?;

    debug!(
        plaintext = script.as_bytes().len(),
        compressed = bytes.len(),
        ceiling,
        "Compressed bootstrap payload"
    );

    if bytes.len() > ceiling {
        return Err(SkiffError::PayloadTooLarge {
            actual: bytes.len(),
            ceiling,
        });
    }

    Ok(CompressedPayload { bytes })
}

/// Decompress a payload back to script text.
///
/// Exists for round-trip verification; the boot agent on the machine does
/// the real decoding.
pub fn decompress(payload: &CompressedPayload) -> Result<String> {
    let mut decoder = GzDecoder::new(payload.as_bytes());
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let script = InterpolatedScript::from_text("#!/usr/bin/env bash\necho hello\n");
        let payload = compress(&script, 32_768).unwrap();
        assert_eq!(decompress(&payload).unwrap(), script.text());
    }

    #[test]
    fn test_compressible_plaintext_over_ceiling_succeeds() {
        // 40 KB of repetitive script text compresses far below a 32 KiB
        // ceiling even though the plaintext would never fit raw.
        let script = InterpolatedScript::from_text("echo bootstrap step\n".repeat(2_000));
        assert!(script.as_bytes().len() >= 40_000);

        let payload = compress(&script, 32_768).unwrap();
        assert!(payload.len() <= 32_768);
        assert_eq!(decompress(&payload).unwrap(), script.text());
    }

    #[test]
    fn test_incompressible_payload_fails_with_both_counts() {
        // Gzip gets little traction on high-entropy text; build ~64 KB of
        // it from a cheap deterministic generator. Even at hex's best-case
        // ratio the output stays well above the ceiling.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut text = String::with_capacity(64_000);
        while text.len() < 64_000 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            text.push_str(&format!("{:016x}", state));
        }
        let script = InterpolatedScript::from_text(text);

        let err = compress(&script, 16_384).unwrap_err();
        match err {
            SkiffError::PayloadTooLarge { actual, ceiling } => {
                assert!(actual > ceiling);
                assert_eq!(ceiling, 16_384);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_base64_rendering_decodes_to_payload() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let script = InterpolatedScript::from_text("echo hi\n");
        let payload = compress(&script, 32_768).unwrap();
        let decoded = STANDARD.decode(payload.to_base64()).unwrap();
        assert_eq!(decoded, payload.as_bytes());
        assert_eq!(payload.encoded_len(), payload.to_base64().len());
    }

    #[test]
    fn test_compression_is_deterministic() {
        let script = InterpolatedScript::from_text("echo same\n".repeat(100));
        let a = compress(&script, 32_768).unwrap();
        let b = compress(&script, 32_768).unwrap();
        assert_eq!(a, b);
    }
}
