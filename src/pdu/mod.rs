// SMPP v3.4 PDU model: a 16-byte header, a schema-ordered mandatory body,
// and an optional TLV tail. Encoding and decoding are driven by the
// per-command schemas in `schema`, so the layout knowledge lives in data
// rather than per-command routines.

pub mod command_id;
pub mod command_status;
pub mod field;
pub mod header;
pub mod schema;
pub mod tlv;

pub use command_id::CommandId;
pub use command_status::{status_name, CommandStatus};
pub use field::{DestAddress, FieldName, InformationElement, Udh, UnsuccessSme, Value};
pub use header::{Header, MAX_PDU_SIZE};
pub use tlv::TlvMap;

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

/// Wire-layer failures. `Incomplete` is an expected runtime condition while
/// a frame is still arriving; the rest indicate a broken peer.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("incomplete frame: need more data")]
    Incomplete,

    #[error("command_length {0} below the 16-octet header")]
    FrameTooShort(u32),

    #[error("command_length {0} above the {MAX_PDU_SIZE}-octet cap")]
    FrameTooLong(u32),

    #[error("malformed body after '{field}': {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("optional parameters: {0}")]
    Tlv(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// The mandatory body as a mapping from field name to value. Field *order*
/// is not kept here; it comes from the command's schema at encode time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    inner: HashMap<FieldName, Value>,
}

impl FieldMap {
    pub fn new() -> FieldMap {
        FieldMap::default()
    }

    pub fn set(&mut self, name: FieldName, value: Value) {
        self.inner.insert(name, value);
    }

    /// Store a C-string field from text.
    pub fn set_str(&mut self, name: FieldName, text: &str) {
        self.set(name, Value::string(text));
    }

    pub fn get(&self, name: FieldName) -> Option<&Value> {
        self.inner.get(&name)
    }

    /// Text view of a field; empty string when absent.
    pub fn get_str(&self, name: FieldName) -> String {
        self.get(name).map(Value::as_str).unwrap_or_default()
    }

    /// Fixed-octet view of a field; 0 when absent.
    pub fn get_u8(&self, name: FieldName) -> u8 {
        self.get(name).map(Value::as_u8).unwrap_or(0)
    }

    pub fn contains(&self, name: FieldName) -> bool {
        self.inner.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &Value)> {
        self.inner.iter().map(|(&name, value)| (name, value))
    }
}

/// A single protocol data unit.
///
/// `command_id` and `command_status` are kept raw so frames with values this
/// crate does not know still pass through; [`Pdu::id`] gives the typed view.
/// Unknown commands carry their body opaquely in `raw_body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
    pub fields: FieldMap,
    pub tlvs: TlvMap,
    pub raw_body: Option<Bytes>,
}

impl Pdu {
    /// An empty PDU of the given command, status 0. The sequence number is
    /// assigned by the session when the PDU is submitted.
    pub fn new(id: CommandId) -> Pdu {
        Pdu {
            command_id: id as u32,
            command_status: 0,
            sequence_number: 0,
            fields: FieldMap::new(),
            tlvs: TlvMap::new(),
            raw_body: None,
        }
    }

    /// Typed command id, `None` for commands outside the supported set.
    pub fn id(&self) -> Option<CommandId> {
        CommandId::try_from(self.command_id).ok()
    }

    pub fn is_response(&self) -> bool {
        self.command_id & command_id::RESPONSE_BIT != 0
    }

    /// True when `command_status` reports success.
    pub fn ok(&self) -> bool {
        self.command_status == 0
    }

    /// The empty paired response for a request, carrying the same sequence
    /// number. `None` for responses and unknown commands.
    pub fn response(&self) -> Option<Pdu> {
        let id = self.id()?;
        if id.is_response() {
            return None;
        }
        let mut resp = Pdu::new(id.response());
        resp.sequence_number = self.sequence_number;
        Some(resp)
    }

    /// Serialize to a complete frame. `command_length` is patched in after
    /// the body is written, so it always equals the exact frame size.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        let header = Header {
            command_length: 0,
            command_id: self.command_id,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(&mut buf);

        if let Some(raw) = &self.raw_body {
            buf.put_slice(raw);
        } else {
            if let Some(id) = self.id() {
                schema::encode_body(schema::for_command(id), &self.fields, &mut buf);
            }
            self.tlvs.serialize_to(&mut buf);
        }

        let length = buf.len() as u32;
        buf[0..4].copy_from_slice(&length.to_be_bytes());
        buf.freeze()
    }

    /// Decode one complete frame. `frame` must hold exactly the
    /// `command_length` octets promised by its header (the connection layer
    /// guarantees this).
    pub fn decode(frame: &[u8]) -> Result<Pdu, CodecError> {
        let mut cursor = Cursor::new(frame);
        let header = Header::decode(&mut cursor)?;
        if frame.len() < header.command_length as usize {
            return Err(CodecError::Incomplete);
        }
        let body = &frame[Header::SIZE..header.command_length as usize];

        match CommandId::try_from(header.command_id) {
            Ok(id) => {
                let mut body_cursor = Cursor::new(body);
                let fields = schema::decode_body(schema::for_command(id), &mut body_cursor)?;
                let tlvs = TlvMap::decode(&mut body_cursor)?;
                Ok(Pdu {
                    command_id: header.command_id,
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    fields,
                    tlvs,
                    raw_body: None,
                })
            }
            Err(_) => {
                tracing::warn!(
                    command_id = header.command_id,
                    "unknown command id, keeping body opaque"
                );
                Ok(Pdu {
                    command_id: header.command_id,
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    fields: FieldMap::new(),
                    tlvs: TlvMap::new(),
                    raw_body: Some(Bytes::copy_from_slice(body)),
                })
            }
        }
    }
}
