use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::pdu::CodecError;

// Optional-parameter tags per SMPP v3.4 Table 5-1, the ones relevant to
// submit/deliver traffic. Unknown tags round-trip untouched.
pub mod tags {
    pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
    pub const SOURCE_PORT: u16 = 0x020A;
    pub const DESTINATION_PORT: u16 = 0x020C;
    pub const SAR_MSG_REF_NUM: u16 = 0x020E;
    pub const SAR_TOTAL_SEGMENTS: u16 = 0x020F;
    pub const SAR_SEGMENT_SEQNUM: u16 = 0x0210;
    pub const MORE_MESSAGES_TO_SEND: u16 = 0x0426;
    pub const PAYLOAD_TYPE: u16 = 0x0019;
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
    pub const PRIVACY_INDICATOR: u16 = 0x0201;
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    pub const MESSAGE_STATE: u16 = 0x0427;
    pub const NETWORK_ERROR_CODE: u16 = 0x0423;
    pub const USER_DATA_HEADER: u16 = 0x0005;
}

/// The optional tail of a PDU: tag → value, serialized after the mandatory
/// body. Tags are kept sorted so encoding is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlvMap {
    entries: BTreeMap<u16, Bytes>,
}

impl TlvMap {
    pub fn new() -> TlvMap {
        TlvMap::default()
    }

    pub fn insert(&mut self, tag: u16, value: impl Into<Bytes>) {
        self.entries.insert(tag, value.into());
    }

    pub fn get(&self, tag: u16) -> Option<&Bytes> {
        self.entries.get(&tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Bytes)> {
        self.entries.iter().map(|(&tag, value)| (tag, value))
    }

    /// Serialized size of all entries.
    pub fn encoded_len(&self) -> usize {
        self.entries.values().map(|v| 4 + v.len()).sum()
    }

    pub fn serialize_to(&self, buf: &mut BytesMut) {
        for (&tag, value) in &self.entries {
            buf.put_u16(tag);
            buf.put_u16(value.len() as u16);
            buf.put_slice(value);
        }
    }

    /// Consume the remainder of a frame as TLVs. A trailing fragment too
    /// short to hold a tag+length pair is skipped; a value cut short by the
    /// frame boundary is malformed.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<TlvMap, CodecError> {
        let mut map = TlvMap::new();
        while buf.remaining() >= 4 {
            let tag = buf.get_u16();
            let length = buf.get_u16() as usize;
            if buf.remaining() < length {
                return Err(CodecError::Tlv(format!(
                    "tag {tag:#06x} declares {length} octets, {} available",
                    buf.remaining()
                )));
            }
            let value = buf.copy_to_bytes(length);
            map.insert(tag, value);
        }
        Ok(map)
    }
}
