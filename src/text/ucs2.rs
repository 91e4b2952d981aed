//! UCS-2 big-endian (`data_coding` 0x08). Despite the name, the wire form is
//! UTF-16BE: supplementary-plane characters are carried as surrogate pairs.

/// Encode UTF-8 text as big-endian UTF-16.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Decode big-endian UTF-16 back to UTF-8. An odd trailing octet is ignored;
/// unpaired surrogates become U+FFFD.
pub fn decode(data: &[u8]) -> Vec<u8> {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units).into_bytes()
}
