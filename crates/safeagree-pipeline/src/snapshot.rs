use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use safeagree_core::{AnalysisResult, Error, Result};
use std::io::{Read, Write};

/// Decompressed size cap. Valid snapshots are a few kilobytes; anything
/// approaching this bound is a crafted token.
const MAX_DECODED_BYTES: u64 = 1_000_000;

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

/// Encode a finished analysis into a URL-safe share token.
///
/// Deterministic and offline: compact JSON, deflate, url-safe base64. The
/// embedded document text is stripped first; it must never travel in a link.
pub fn encode(result: &AnalysisResult) -> Result<String> {
    let mut shared = result.clone();
    shared.document_text = None;

    let json = serde_json::to_vec(&shared).map_err(|e| Error::InvalidToken(e.to_string()))?;
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&json)
        .and_then(|_| enc.finish())
        .map(|compressed| b64().encode(compressed))
        .map_err(|e| Error::InvalidToken(e.to_string()))
}

/// Reverse of [`encode`]. Any failure (bad base64, corrupt stream, wrong
/// shape) is `InvalidToken`; the consuming surface renders that as
/// "link invalid or expired" whether the cause is corruption or tampering.
pub fn decode(token: &str) -> Result<AnalysisResult> {
    let compressed = b64()
        .decode(token.trim())
        .map_err(|e| Error::InvalidToken(e.to_string()))?;

    let mut json = Vec::new();
    DeflateDecoder::new(&compressed[..])
        .take(MAX_DECODED_BYTES)
        .read_to_end(&mut json)
        .map_err(|e| Error::InvalidToken(e.to_string()))?;

    serde_json::from_slice(&json).map_err(|e| Error::InvalidToken(e.to_string()))
}
