//! Latin-1 (ISO-8859-1, `data_coding` 0x03). The wire form is a plain octet
//! stream in 0x00–0xFF, so both directions are the identity transform.

pub fn encode(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

pub fn decode(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}
