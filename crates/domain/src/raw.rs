//! Raw characteristic payload decoding.
//!
//! Many transports deliver fixed-width, zero-padded buffers for what is
//! logically a short text field (a firmware revision, a model string).

/// Decode a trailing-zero-padded buffer into display text.
///
/// When the buffer carries zero padding and the remainder is valid UTF-8,
/// the decoded text is returned; otherwise the whole buffer is rendered as
/// hex.
#[must_use]
pub fn text_or_hex(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|byte| *byte != 0)
        .map_or(0, |pos| pos + 1);

    if end < bytes.len() {
        if let Ok(text) = std::str::from_utf8(&bytes[..end]) {
            return text.to_string();
        }
    }

    hex::encode(bytes)
}
