//! Per-command body schemas and the decoder that walks them.
//!
//! Schemas are data, not code: an ordered list of field names per command.
//! Decoding must follow that order because the layout of later fields
//! depends on values parsed earlier (`sm_length`, `esm_class` bit 6,
//! `gsm_sms_ud.udh.len`, `number_of_dests`, `no_unsuccess`, `data_coding`).

use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

use crate::pdu::field::{
    DestAddress, FieldName, InformationElement, Udh, UnsuccessSme, Value,
    DEST_FLAG_DISTRIBUTION_LIST, ESM_CLASS_UDHI,
};
use crate::pdu::{CodecError, CommandId, FieldMap};
use crate::text;

use FieldName::*;

const BIND: &[FieldName] = &[
    SystemId,
    Password,
    SystemType,
    InterfaceVersion,
    AddrTon,
    AddrNpi,
    AddressRange,
];

const BIND_RESP: &[FieldName] = &[SystemId];

const SUBMIT_SM: &[FieldName] = &[
    ServiceType,
    SourceAddrTon,
    SourceAddrNpi,
    SourceAddr,
    DestAddrTon,
    DestAddrNpi,
    DestinationAddr,
    EsmClass,
    ProtocolId,
    PriorityFlag,
    ScheduleDeliveryTime,
    ValidityPeriod,
    RegisteredDelivery,
    ReplaceIfPresentFlag,
    DataCoding,
    SmDefaultMsgId,
    SmLength,
    UdhLength,
    GsmUserData,
    ShortMessage,
];

const SUBMIT_MULTI: &[FieldName] = &[
    ServiceType,
    SourceAddrTon,
    SourceAddrNpi,
    SourceAddr,
    NumberOfDests,
    DestAddresses,
    EsmClass,
    ProtocolId,
    PriorityFlag,
    ScheduleDeliveryTime,
    ValidityPeriod,
    RegisteredDelivery,
    ReplaceIfPresentFlag,
    DataCoding,
    SmDefaultMsgId,
    SmLength,
    UdhLength,
    GsmUserData,
    ShortMessage,
];

const MESSAGE_ID_ONLY: &[FieldName] = &[MessageId];

const SUBMIT_MULTI_RESP: &[FieldName] = &[MessageId, NoUnsuccess, UnsuccessSme];

const QUERY_SM: &[FieldName] = &[MessageId, SourceAddrTon, SourceAddrNpi, SourceAddr];

const QUERY_SM_RESP: &[FieldName] = &[MessageId, FinalDate, MessageState, ErrorCode];

const EMPTY: &[FieldName] = &[];

/// The ordered mandatory-field list for a command.
pub fn for_command(id: CommandId) -> &'static [FieldName] {
    match id {
        CommandId::BindReceiver | CommandId::BindTransmitter | CommandId::BindTransceiver => BIND,
        CommandId::BindReceiverResp
        | CommandId::BindTransmitterResp
        | CommandId::BindTransceiverResp => BIND_RESP,
        CommandId::SubmitSm | CommandId::DeliverSm => SUBMIT_SM,
        CommandId::SubmitSmResp | CommandId::DeliverSmResp => MESSAGE_ID_ONLY,
        CommandId::SubmitMulti => SUBMIT_MULTI,
        CommandId::SubmitMultiResp => SUBMIT_MULTI_RESP,
        CommandId::QuerySm => QUERY_SM,
        CommandId::QuerySmResp => QUERY_SM_RESP,
        CommandId::Unbind
        | CommandId::UnbindResp
        | CommandId::EnquireLink
        | CommandId::EnquireLinkResp
        | CommandId::GenericNack => EMPTY,
    }
}

/// How a field reads off the wire. `Composite` fields need the context the
/// walker threads through.
enum Kind {
    Fixed,
    CString,
    Composite,
}

fn kind(name: FieldName) -> Kind {
    match name {
        AddressRange | DestinationAddr | FinalDate | MessageId | Password
        | ScheduleDeliveryTime | ServiceType | SourceAddr | SystemId | SystemType
        | ValidityPeriod => Kind::CString,
        UdhLength | GsmUserData | ShortMessage | DestAddresses | UnsuccessSme => Kind::Composite,
        _ => Kind::Fixed,
    }
}

/// Values gathered while walking the schema that shape later fields.
#[derive(Default)]
struct DecodeCtx {
    udhi: bool,
    udh_len: usize,
    sm_length: usize,
    data_coding: u8,
    number_of_dests: usize,
    no_unsuccess: usize,
}

/// Read a C-string including its terminator. `None` when no terminator
/// exists in the remaining octets.
fn read_cstring(buf: &mut Cursor<&[u8]>) -> Option<Bytes> {
    let remaining = &buf.get_ref()[buf.position() as usize..];
    let end = remaining.iter().position(|&b| b == 0x00)?;
    Some(buf.copy_to_bytes(end + 1))
}

fn malformed(after: Option<FieldName>, reason: &str) -> CodecError {
    CodecError::Malformed {
        field: after.map(FieldName::as_str).unwrap_or("header"),
        reason: reason.to_string(),
    }
}

/// Decode a body by walking `schema` in order.
///
/// Running out of octets at a field boundary ends the walk cleanly (trailing
/// fields are simply absent, as some SMSCs omit them). Running out inside a
/// field is malformed, reported against the last complete field — except the
/// UDH, where short data silently ends the walk.
pub fn decode_body(
    schema: &'static [FieldName],
    buf: &mut Cursor<&[u8]>,
) -> Result<FieldMap, CodecError> {
    let mut map = FieldMap::new();
    let mut ctx = DecodeCtx::default();
    let mut last: Option<FieldName> = None;

    for &name in schema {
        match kind(name) {
            Kind::Fixed => {
                if !buf.has_remaining() {
                    return Ok(map);
                }
                let octet = buf.get_u8();
                map.set(name, Value::Fixed(octet));
                match name {
                    DataCoding => ctx.data_coding = octet,
                    EsmClass => ctx.udhi = octet & ESM_CLASS_UDHI != 0,
                    SmLength => ctx.sm_length = octet as usize,
                    NumberOfDests => ctx.number_of_dests = octet as usize,
                    NoUnsuccess => ctx.no_unsuccess = octet as usize,
                    _ => {}
                }
            }
            Kind::CString => {
                if !buf.has_remaining() {
                    return Ok(map);
                }
                match read_cstring(buf) {
                    Some(data) => map.set(name, Value::Variable(data)),
                    None => return Err(malformed(last, "unterminated octet string")),
                }
            }
            Kind::Composite => {
                if !decode_composite(name, buf, &mut ctx, &mut map, last)? {
                    return Ok(map);
                }
            }
        }
        last = Some(name);
    }
    Ok(map)
}

/// Decode one context-dependent field. Returns `false` to end the walk
/// cleanly (partial-frame tolerance).
fn decode_composite(
    name: FieldName,
    buf: &mut Cursor<&[u8]>,
    ctx: &mut DecodeCtx,
    map: &mut FieldMap,
    last: Option<FieldName>,
) -> Result<bool, CodecError> {
    match name {
        UdhLength => {
            if !ctx.udhi {
                map.set(name, Value::Null);
                return Ok(true);
            }
            if !buf.has_remaining() {
                return Ok(false);
            }
            let octet = buf.get_u8();
            ctx.udh_len = octet as usize;
            map.set(name, Value::Fixed(octet));
        }
        GsmUserData => {
            if !ctx.udhi {
                map.set(name, Value::Null);
                return Ok(true);
            }
            let mut ies = Vec::new();
            let mut left = ctx.udh_len;
            while left > 0 {
                if buf.remaining() < 2 {
                    return Ok(false);
                }
                let id = buf.get_u8();
                let ie_len = buf.get_u8() as usize;
                let take = ie_len.min(buf.remaining());
                let data = buf.copy_to_bytes(take);
                ies.push(InformationElement { id, data });
                if take < ie_len {
                    return Ok(false);
                }
                left = left.saturating_sub(2 + ie_len);
            }
            map.set(name, Value::Udh(Udh { ies }));
        }
        ShortMessage => {
            let declared = if ctx.udhi {
                ctx.sm_length.saturating_sub(ctx.udh_len + 1)
            } else {
                ctx.sm_length
            };
            let take = declared.min(buf.remaining());
            let raw = buf.copy_to_bytes(take);
            let decoded = text::decode(ctx.data_coding, &raw);
            map.set(name, Value::Sm(Bytes::from(decoded)));
        }
        DestAddresses => {
            let mut list = Vec::with_capacity(ctx.number_of_dests);
            for _ in 0..ctx.number_of_dests {
                if !buf.has_remaining() {
                    return Err(malformed(last, "destination list cut short"));
                }
                let flag = buf.get_u8();
                if flag == DEST_FLAG_DISTRIBUTION_LIST {
                    let raw = read_cstring(buf)
                        .ok_or_else(|| malformed(last, "destination list cut short"))?;
                    list.push(DestAddress::DistributionList(cstring_text(&raw)));
                } else {
                    if buf.remaining() < 2 {
                        return Err(malformed(last, "destination list cut short"));
                    }
                    let ton = buf.get_u8();
                    let npi = buf.get_u8();
                    let raw = read_cstring(buf)
                        .ok_or_else(|| malformed(last, "destination list cut short"))?;
                    list.push(DestAddress::Sme {
                        ton,
                        npi,
                        addr: cstring_text(&raw),
                    });
                }
            }
            map.set(name, Value::DestList(list));
        }
        UnsuccessSme => {
            let mut list = Vec::with_capacity(ctx.no_unsuccess);
            for _ in 0..ctx.no_unsuccess {
                if buf.remaining() < 2 {
                    return Err(malformed(last, "unsuccess list cut short"));
                }
                let ton = buf.get_u8();
                let npi = buf.get_u8();
                let raw =
                    read_cstring(buf).ok_or_else(|| malformed(last, "unsuccess list cut short"))?;
                if buf.remaining() < 4 {
                    return Err(malformed(last, "unsuccess list cut short"));
                }
                let error_code = buf.get_u32();
                list.push(UnsuccessSme {
                    ton,
                    npi,
                    addr: cstring_text(&raw),
                    error_code,
                });
            }
            map.set(name, Value::UnsuccessList(list));
        }
        _ => unreachable!("non-composite field"),
    }
    Ok(true)
}

fn cstring_text(raw: &Bytes) -> String {
    let end = if raw.last() == Some(&0x00) {
        raw.len() - 1
    } else {
        raw.len()
    };
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Serialize the fields present in `map`, in schema order.
pub fn encode_body(schema: &'static [FieldName], map: &FieldMap, buf: &mut BytesMut) {
    for &name in schema {
        if let Some(value) = map.get(name) {
            value.serialize_to(buf);
        }
    }
}

/// Serialized size of the fields present in `map`.
pub fn body_len(schema: &'static [FieldName], map: &FieldMap) -> usize {
    schema
        .iter()
        .filter_map(|&name| map.get(name))
        .map(Value::len)
        .sum()
}
