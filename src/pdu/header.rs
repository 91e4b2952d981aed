use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

use crate::pdu::CodecError;

/// Maximum accepted frame size, guarding the read buffer against a hostile
/// or corrupt `command_length`.
pub const MAX_PDU_SIZE: u32 = 64 * 1024;

/// The 16-byte header common to every PDU. All four words are big-endian.
/// `command_id` and `command_status` stay raw here so frames with vendor or
/// unknown values still round-trip; typed views live on [`crate::pdu::Pdu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total frame length in octets, header included.
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl Header {
    pub const SIZE: usize = 16;

    /// Decode a header, validating `command_length` bounds.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }
        let command_length = buf.get_u32();
        let command_id = buf.get_u32();
        let command_status = buf.get_u32();
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 {
            return Err(CodecError::FrameTooShort(command_length));
        }
        if command_length > MAX_PDU_SIZE {
            return Err(CodecError::FrameTooLong(command_length));
        }

        Ok(Header {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let header = Header {
            command_length: 24,
            command_id: 0x0000_0015,
            command_status: 0,
            sequence_number: 42,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), Header::SIZE);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(Header::decode(&mut cursor).unwrap(), header);
    }

    #[test]
    fn rejects_undersized_length() {
        let raw = [
            0x00, 0x00, 0x00, 0x08, // command_length below header size
            0x00, 0x00, 0x00, 0x15, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x01,
        ];
        let mut cursor = Cursor::new(&raw[..]);
        assert!(matches!(
            Header::decode(&mut cursor),
            Err(CodecError::FrameTooShort(8))
        ));
    }

    #[test]
    fn rejects_oversized_length() {
        let raw = [
            0xFF, 0xFF, 0xFF, 0xFF, //
            0x00, 0x00, 0x00, 0x15, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x01,
        ];
        let mut cursor = Cursor::new(&raw[..]);
        assert!(matches!(
            Header::decode(&mut cursor),
            Err(CodecError::FrameTooLong(_))
        ));
    }

    #[test]
    fn incomplete_header() {
        let raw = [0x00, 0x00];
        let mut cursor = Cursor::new(&raw[..]);
        assert!(matches!(
            Header::decode(&mut cursor),
            Err(CodecError::Incomplete)
        ));
    }
}
