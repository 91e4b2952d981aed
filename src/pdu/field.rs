//! Body field shapes. A PDU body is an ordered run of these values; the
//! order itself lives in [`crate::pdu::schema`].

use bytes::{BufMut, Bytes, BytesMut};

/// Names of the mandatory body fields across the supported commands. Schemas
/// are ordered lists of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    AddrNpi,
    AddrTon,
    AddressRange,
    DataCoding,
    DestAddrNpi,
    DestAddrTon,
    DestinationAddr,
    DestAddresses,
    EsmClass,
    ErrorCode,
    FinalDate,
    InterfaceVersion,
    MessageId,
    MessageState,
    NumberOfDests,
    NoUnsuccess,
    Password,
    PriorityFlag,
    ProtocolId,
    RegisteredDelivery,
    ReplaceIfPresentFlag,
    ScheduleDeliveryTime,
    ServiceType,
    ShortMessage,
    SmDefaultMsgId,
    SmLength,
    SourceAddr,
    SourceAddrNpi,
    SourceAddrTon,
    SystemId,
    SystemType,
    UdhLength,
    GsmUserData,
    UnsuccessSme,
    ValidityPeriod,
}

impl FieldName {
    /// Wire-level field name, used in error and log messages.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::AddrNpi => "addr_npi",
            FieldName::AddrTon => "addr_ton",
            FieldName::AddressRange => "address_range",
            FieldName::DataCoding => "data_coding",
            FieldName::DestAddrNpi => "dest_addr_npi",
            FieldName::DestAddrTon => "dest_addr_ton",
            FieldName::DestinationAddr => "destination_addr",
            FieldName::DestAddresses => "dest_addresses",
            FieldName::EsmClass => "esm_class",
            FieldName::ErrorCode => "error_code",
            FieldName::FinalDate => "final_date",
            FieldName::InterfaceVersion => "interface_version",
            FieldName::MessageId => "message_id",
            FieldName::MessageState => "message_state",
            FieldName::NumberOfDests => "number_of_dests",
            FieldName::NoUnsuccess => "no_unsuccess",
            FieldName::Password => "password",
            FieldName::PriorityFlag => "priority_flag",
            FieldName::ProtocolId => "protocol_id",
            FieldName::RegisteredDelivery => "registered_delivery",
            FieldName::ReplaceIfPresentFlag => "replace_if_present_flag",
            FieldName::ScheduleDeliveryTime => "schedule_delivery_time",
            FieldName::ServiceType => "service_type",
            FieldName::ShortMessage => "short_message",
            FieldName::SmDefaultMsgId => "sm_default_msg_id",
            FieldName::SmLength => "sm_length",
            FieldName::SourceAddr => "source_addr",
            FieldName::SourceAddrNpi => "source_addr_npi",
            FieldName::SourceAddrTon => "source_addr_ton",
            FieldName::SystemId => "system_id",
            FieldName::SystemType => "system_type",
            FieldName::UdhLength => "gsm_sms_ud.udh.len",
            FieldName::GsmUserData => "gsm_sms_ud",
            FieldName::UnsuccessSme => "unsuccess_sme",
            FieldName::ValidityPeriod => "validity_period",
        }
    }
}

/// `esm_class` bit 6: a User Data Header precedes the payload.
pub const ESM_CLASS_UDHI: u8 = 0x40;

/// Concatenated-short-message IE identifiers.
pub const IEI_CONCAT_8BIT: u8 = 0x00;
pub const IEI_CONCAT_16BIT: u8 = 0x08;

/// `dest_addresses` entry flags.
pub const DEST_FLAG_SME: u8 = 0x01;
pub const DEST_FLAG_DISTRIBUTION_LIST: u8 = 0x02;

/// A single Information Element inside a UDH. The length octet on the wire
/// is derived from `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationElement {
    pub id: u8,
    pub data: Bytes,
}

impl InformationElement {
    pub fn len(&self) -> usize {
        2 + self.data.len()
    }

    fn serialize_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
    }
}

/// A User Data Header: a run of Information Elements. The UDH length octet
/// itself is a separate body field (`gsm_sms_ud.udh.len`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Udh {
    pub ies: Vec<InformationElement>,
}

impl Udh {
    /// A UDH holding a single concatenation IE. 8-bit form when the
    /// reference fits one octet, 16-bit otherwise.
    pub fn concatenated(reference: u16, total: u8, part: u8) -> Udh {
        let ie = if reference > 0xFF {
            InformationElement {
                id: IEI_CONCAT_16BIT,
                data: Bytes::copy_from_slice(&[
                    (reference >> 8) as u8,
                    (reference & 0xFF) as u8,
                    total,
                    part,
                ]),
            }
        } else {
            InformationElement {
                id: IEI_CONCAT_8BIT,
                data: Bytes::copy_from_slice(&[reference as u8, total, part]),
            }
        };
        Udh { ies: vec![ie] }
    }

    /// Total IE octets, the value carried in `gsm_sms_ud.udh.len`.
    pub fn len(&self) -> usize {
        self.ies.iter().map(InformationElement::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ies.is_empty()
    }

    /// Look for a concatenation IE: `(reference, total, part)`. A UDH with
    /// no such IE describes a standalone message, part 1 of 1.
    pub fn concatenation(&self) -> (u16, u8, u8) {
        for ie in &self.ies {
            match (ie.id, ie.data.len()) {
                (IEI_CONCAT_8BIT, 3) => {
                    return (u16::from(ie.data[0]), ie.data[1], ie.data[2]);
                }
                (IEI_CONCAT_16BIT, 4) => {
                    let reference = u16::from_be_bytes([ie.data[0], ie.data[1]]);
                    return (reference, ie.data[2], ie.data[3]);
                }
                _ => {}
            }
        }
        (0, 1, 1)
    }

    fn serialize_to(&self, buf: &mut BytesMut) {
        for ie in &self.ies {
            ie.serialize_to(buf);
        }
    }
}

/// One `dest_addresses` entry of a submit_multi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestAddress {
    Sme { ton: u8, npi: u8, addr: String },
    DistributionList(String),
}

impl DestAddress {
    fn len(&self) -> usize {
        match self {
            DestAddress::Sme { addr, .. } => 3 + addr.len() + 1,
            DestAddress::DistributionList(name) => 1 + name.len() + 1,
        }
    }

    fn serialize_to(&self, buf: &mut BytesMut) {
        match self {
            DestAddress::Sme { ton, npi, addr } => {
                buf.put_u8(DEST_FLAG_SME);
                buf.put_u8(*ton);
                buf.put_u8(*npi);
                buf.put_slice(addr.as_bytes());
                buf.put_u8(0x00);
            }
            DestAddress::DistributionList(name) => {
                buf.put_u8(DEST_FLAG_DISTRIBUTION_LIST);
                buf.put_slice(name.as_bytes());
                buf.put_u8(0x00);
            }
        }
    }
}

/// One `unsuccess_sme` entry of a submit_multi_resp: the destination that
/// failed and the 4-octet SMPP error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsuccessSme {
    pub ton: u8,
    pub npi: u8,
    pub addr: String,
    pub error_code: u32,
}

impl UnsuccessSme {
    fn len(&self) -> usize {
        2 + self.addr.len() + 1 + 4
    }

    fn serialize_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.ton);
        buf.put_u8(self.npi);
        buf.put_slice(self.addr.as_bytes());
        buf.put_u8(0x00);
        buf.put_u32(self.error_code);
    }
}

/// A body field value. Uniform `len` / `serialize_to` / `string` surface so
/// the encoder can walk a schema without caring about shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Exactly one octet.
    Fixed(u8),
    /// NUL-terminated octet string. The stored bytes may or may not carry
    /// the terminator; serialization appends one only when absent.
    Variable(Bytes),
    /// Raw `sm_length`-counted octets, no terminator.
    Sm(Bytes),
    /// The Information Element run of a User Data Header.
    Udh(Udh),
    /// Count-driven submit_multi destination list.
    DestList(Vec<DestAddress>),
    /// Count-driven submit_multi_resp unsuccess list.
    UnsuccessList(Vec<UnsuccessSme>),
    /// A field that contributes no octets (e.g. UDH fields without UDHI).
    Null,
}

impl Value {
    /// C-string value from text, stored without the terminator.
    pub fn string(s: &str) -> Value {
        Value::Variable(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Serialized size in octets.
    pub fn len(&self) -> usize {
        match self {
            Value::Fixed(_) => 1,
            Value::Variable(data) => {
                if data.last() == Some(&0x00) {
                    data.len()
                } else {
                    data.len() + 1
                }
            }
            Value::Sm(data) => data.len(),
            Value::Udh(udh) => udh.len(),
            Value::DestList(list) => list.iter().map(DestAddress::len).sum(),
            Value::UnsuccessList(list) => list.iter().map(UnsuccessSme::len).sum(),
            Value::Null => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn serialize_to(&self, buf: &mut BytesMut) {
        match self {
            Value::Fixed(b) => buf.put_u8(*b),
            Value::Variable(data) => {
                buf.put_slice(data);
                if data.last() != Some(&0x00) {
                    buf.put_u8(0x00);
                }
            }
            Value::Sm(data) => buf.put_slice(data),
            Value::Udh(udh) => udh.serialize_to(buf),
            Value::DestList(list) => {
                for dest in list {
                    dest.serialize_to(buf);
                }
            }
            Value::UnsuccessList(list) => {
                for sme in list {
                    sme.serialize_to(buf);
                }
            }
            Value::Null => {}
        }
    }

    /// Text view: C-strings without their terminator, short messages as-is,
    /// fixed octets in decimal. Composite fields render empty.
    pub fn as_str(&self) -> String {
        match self {
            Value::Fixed(b) => b.to_string(),
            Value::Variable(data) => {
                let end = if data.last() == Some(&0x00) {
                    data.len() - 1
                } else {
                    data.len()
                };
                String::from_utf8_lossy(&data[..end]).into_owned()
            }
            Value::Sm(data) => String::from_utf8_lossy(data).into_owned(),
            _ => String::new(),
        }
    }

    /// The octet of a `Fixed` value; 0 for anything else.
    pub fn as_u8(&self) -> u8 {
        match self {
            Value::Fixed(b) => *b,
            _ => 0,
        }
    }
}
