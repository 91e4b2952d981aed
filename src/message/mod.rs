// ABOUTME: Message-layer operations on a bound session: submit, long-message
// ABOUTME: concatenation, query_sm and submit_multi, with typed results

mod segment;

use bytes::Bytes;
use num_enum::TryFromPrimitive;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::pdu::field::ESM_CLASS_UDHI;
use crate::pdu::{
    CommandId, DestAddress, FieldName, Pdu, TlvMap, Udh, UnsuccessSme, Value,
};
use crate::session::{Session, SmppError, SmppResult};
use crate::text::Text;
use self::segment::Boundary;

/// `registered_delivery` request levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DeliveryReceipt {
    #[default]
    None = 0x00,
    /// Receipt on final delivery outcome.
    Final = 0x01,
    /// Receipt only when delivery failed.
    Failure = 0x02,
}

/// One outbound short message. For submit_multi, fill `dst_list` and/or
/// `distribution_lists` instead of `dst`.
#[derive(Debug, Clone)]
pub struct ShortMessage {
    pub src: String,
    pub dst: String,
    pub src_ton: u8,
    pub src_npi: u8,
    pub dst_ton: u8,
    pub dst_npi: u8,
    pub dst_list: Vec<String>,
    pub distribution_lists: Vec<String>,
    pub text: Text,
    pub service_type: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority: u8,
    /// Relative validity period; omitted from the PDU when `None`.
    pub validity: Option<Duration>,
    pub register: DeliveryReceipt,
    pub tlvs: TlvMap,
}

impl ShortMessage {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, text: Text) -> ShortMessage {
        ShortMessage {
            src: src.into(),
            dst: dst.into(),
            text,
            ..ShortMessage::default()
        }
    }
}

impl Default for ShortMessage {
    fn default() -> ShortMessage {
        ShortMessage {
            src: String::new(),
            dst: String::new(),
            src_ton: 0,
            src_npi: 0,
            dst_ton: 0,
            dst_npi: 0,
            dst_list: Vec::new(),
            distribution_lists: Vec::new(),
            text: Text::Raw(Vec::new()),
            service_type: String::new(),
            esm_class: 0,
            protocol_id: 0,
            priority: 0,
            validity: None,
            register: DeliveryReceipt::None,
            tlvs: TlvMap::new(),
        }
    }
}

/// Outcome of one accepted submit_sm.
#[derive(Debug)]
pub struct SubmitResult {
    /// The SMSC-assigned message id.
    pub message_id: String,
    /// The full response PDU for anything beyond the id.
    pub resp: Pdu,
}

/// Outcome of an accepted submit_multi, including the destinations the SMSC
/// could not accept.
#[derive(Debug)]
pub struct SubmitMultiResult {
    pub message_id: String,
    pub unsuccess: Vec<UnsuccessSme>,
    pub resp: Pdu,
}

/// `message_state` values of a query_sm_resp.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Enroute = 1,
    Delivered = 2,
    Expired = 3,
    Deleted = 4,
    Undeliverable = 5,
    Accepted = 6,
    Unknown = 7,
    Rejected = 8,
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageState::Enroute => "ENROUTE",
            MessageState::Delivered => "DELIVERED",
            MessageState::Expired => "EXPIRED",
            MessageState::Deleted => "DELETED",
            MessageState::Undeliverable => "UNDELIVERABLE",
            MessageState::Accepted => "ACCEPTED",
            MessageState::Unknown => "UNKNOWN",
            MessageState::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// Outcome of a query_sm: the state as a name plus the raw octet.
#[derive(Debug)]
pub struct QueryResult {
    pub message_id: String,
    pub message_state: String,
    pub state: u8,
    pub final_date: String,
    pub error_code: u8,
}

/// A long-message submission that did not run to completion. The parts
/// already accepted are kept so the caller can see what went out.
#[derive(Debug, Error)]
#[error("long message interrupted after {} of {total} part(s): {source}", .parts.len())]
pub struct PartialSubmit {
    pub parts: Vec<SubmitResult>,
    pub total: usize,
    #[source]
    pub source: SmppError,
}

impl Session {
    /// Submit one short message and wait for its message id. The encoded
    /// payload must fit a single PDU; use
    /// [`submit_long`](Session::submit_long) past that.
    pub async fn submit(&self, msg: &ShortMessage) -> SmppResult<SubmitResult> {
        let payload = msg.text.encode();
        if payload.len() > msg.text.single_limit() {
            return Err(SmppError::Malformed {
                field: "short_message",
                reason: format!(
                    "{} octets exceed the {}-octet single-message limit",
                    payload.len(),
                    msg.text.single_limit()
                ),
            });
        }
        let resp = self.request(submit_sm_pdu(msg, &payload, None)).await?;
        submit_result(resp)
    }

    /// Submit a message of any length. Payloads past the single-message
    /// limit are segmented on glyph boundaries and sent as concatenated
    /// parts sharing one random 16-bit reference; each part's response is
    /// awaited in order.
    pub async fn submit_long(&self, msg: &ShortMessage) -> Result<Vec<SubmitResult>, PartialSubmit> {
        let chunks = match encoded_chunks(msg) {
            Ok(chunks) => chunks,
            Err(source) => {
                return Err(PartialSubmit {
                    parts: Vec::new(),
                    total: 0,
                    source,
                })
            }
        };

        if chunks.len() == 1 {
            return match self.request(submit_sm_pdu(msg, &chunks[0], None)).await {
                Ok(resp) => match submit_result(resp) {
                    Ok(result) => Ok(vec![result]),
                    Err(source) => Err(PartialSubmit {
                        parts: Vec::new(),
                        total: 1,
                        source,
                    }),
                },
                Err(source) => Err(PartialSubmit {
                    parts: Vec::new(),
                    total: 1,
                    source,
                }),
            };
        }

        let reference: u16 = rand::random();
        let total = chunks.len();
        let mut parts = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            let udh = Udh::concatenated(reference, total as u8, (index + 1) as u8);
            let outcome = match self.request(submit_sm_pdu(msg, chunk, Some(udh))).await {
                Ok(resp) => submit_result(resp),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(result) => parts.push(result),
                Err(source) => {
                    return Err(PartialSubmit {
                        parts,
                        total,
                        source,
                    })
                }
            }
        }
        Ok(parts)
    }

    /// Submit to several destinations and/or distribution lists at once.
    pub async fn submit_multi(&self, msg: &ShortMessage) -> SmppResult<SubmitMultiResult> {
        let payload = msg.text.encode();
        if payload.len() > msg.text.single_limit() {
            return Err(SmppError::Malformed {
                field: "short_message",
                reason: format!(
                    "{} octets exceed the {}-octet single-message limit",
                    payload.len(),
                    msg.text.single_limit()
                ),
            });
        }

        let mut dests: Vec<DestAddress> = msg
            .dst_list
            .iter()
            .map(|addr| DestAddress::Sme {
                ton: msg.dst_ton,
                npi: msg.dst_npi,
                addr: addr.clone(),
            })
            .collect();
        dests.extend(
            msg.distribution_lists
                .iter()
                .map(|name| DestAddress::DistributionList(name.clone())),
        );
        if dests.is_empty() || dests.len() > 255 {
            return Err(SmppError::Malformed {
                field: "number_of_dests",
                reason: format!("{} destinations, must be 1..=255", dests.len()),
            });
        }

        let mut pdu = Pdu::new(CommandId::SubmitMulti);
        pdu.fields
            .set(FieldName::NumberOfDests, Value::Fixed(dests.len() as u8));
        pdu.fields.set(FieldName::DestAddresses, Value::DestList(dests));
        fill_common_fields(&mut pdu, msg, &payload, None);

        let resp = self.request(pdu).await?;
        if !resp.ok() {
            return Err(SmppError::Smpp(resp.command_status));
        }
        let unsuccess = match resp.fields.get(FieldName::UnsuccessSme) {
            Some(Value::UnsuccessList(list)) => list.clone(),
            _ => Vec::new(),
        };
        Ok(SubmitMultiResult {
            message_id: resp.fields.get_str(FieldName::MessageId),
            unsuccess,
            resp,
        })
    }

    /// Look up the delivery state of a previously submitted message.
    pub async fn query(
        &self,
        message_id: &str,
        src: &str,
        src_ton: u8,
        src_npi: u8,
    ) -> SmppResult<QueryResult> {
        let mut pdu = Pdu::new(CommandId::QuerySm);
        pdu.fields.set_str(FieldName::MessageId, message_id);
        pdu.fields
            .set(FieldName::SourceAddrTon, Value::Fixed(src_ton));
        pdu.fields
            .set(FieldName::SourceAddrNpi, Value::Fixed(src_npi));
        pdu.fields.set_str(FieldName::SourceAddr, src);

        let resp = self.request(pdu).await?;
        if !resp.ok() {
            return Err(SmppError::Smpp(resp.command_status));
        }
        let state = resp.fields.get_u8(FieldName::MessageState);
        let message_state = MessageState::try_from(state)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| format!("UNKNOWN({state})"));
        Ok(QueryResult {
            message_id: resp.fields.get_str(FieldName::MessageId),
            message_state,
            state,
            final_date: resp.fields.get_str(FieldName::FinalDate),
            error_code: resp.fields.get_u8(FieldName::ErrorCode),
        })
    }
}

fn submit_result(resp: Pdu) -> SmppResult<SubmitResult> {
    if !resp.ok() {
        return Err(SmppError::Smpp(resp.command_status));
    }
    Ok(SubmitResult {
        message_id: resp.fields.get_str(FieldName::MessageId),
        resp,
    })
}

/// Encode and, when needed, segment a message payload. One chunk means "send
/// without UDH".
fn encoded_chunks(msg: &ShortMessage) -> SmppResult<Vec<Vec<u8>>> {
    // Packed GSM7 segments on the septet stream and packs each part
    // separately, otherwise escape pairs could straddle octet cuts.
    if let Text::Gsm7Packed(text) = &msg.text {
        let septets = crate::text::gsm7::encode(text);
        let packed = crate::text::gsm7::pack(&septets);
        if packed.len() <= msg.text.single_limit() {
            return Ok(vec![packed]);
        }
        let chunks: Vec<Vec<u8>> = segment::split(&septets, Boundary::Gsm7Escape, 150)
            .into_iter()
            .map(crate::text::gsm7::pack)
            .collect();
        return bounded(chunks);
    }

    let payload = msg.text.encode();
    if payload.len() <= msg.text.single_limit() {
        return Ok(vec![payload]);
    }
    let boundary = match msg.text {
        Text::Gsm7(_) => Boundary::Gsm7Escape,
        Text::Ucs2(_) => Boundary::TwoByteUnits,
        _ => Boundary::Octets,
    };
    let chunks: Vec<Vec<u8>> = segment::split(&payload, boundary, msg.text.part_limit())
        .into_iter()
        .map(<[u8]>::to_vec)
        .collect();
    bounded(chunks)
}

fn bounded(chunks: Vec<Vec<u8>>) -> SmppResult<Vec<Vec<u8>>> {
    if chunks.len() > 255 {
        return Err(SmppError::Malformed {
            field: "sar_total_segments",
            reason: format!("{} parts exceed the 255-part limit", chunks.len()),
        });
    }
    Ok(chunks)
}

fn submit_sm_pdu(msg: &ShortMessage, payload: &[u8], udh: Option<Udh>) -> Pdu {
    let mut pdu = Pdu::new(CommandId::SubmitSm);
    pdu.fields
        .set(FieldName::DestAddrTon, Value::Fixed(msg.dst_ton));
    pdu.fields
        .set(FieldName::DestAddrNpi, Value::Fixed(msg.dst_npi));
    pdu.fields.set_str(FieldName::DestinationAddr, &msg.dst);
    fill_common_fields(&mut pdu, msg, payload, udh);
    pdu
}

fn fill_common_fields(pdu: &mut Pdu, msg: &ShortMessage, payload: &[u8], udh: Option<Udh>) {
    let fields = &mut pdu.fields;
    fields.set_str(FieldName::ServiceType, &msg.service_type);
    fields.set(FieldName::SourceAddrTon, Value::Fixed(msg.src_ton));
    fields.set(FieldName::SourceAddrNpi, Value::Fixed(msg.src_npi));
    fields.set_str(FieldName::SourceAddr, &msg.src);
    fields.set(FieldName::ProtocolId, Value::Fixed(msg.protocol_id));
    fields.set(FieldName::PriorityFlag, Value::Fixed(msg.priority));
    fields.set_str(FieldName::ScheduleDeliveryTime, "");
    match msg.validity {
        Some(validity) => {
            fields.set_str(FieldName::ValidityPeriod, &relative_validity(validity))
        }
        None => fields.set_str(FieldName::ValidityPeriod, ""),
    }
    fields.set(
        FieldName::RegisteredDelivery,
        Value::Fixed(msg.register as u8),
    );
    fields.set(FieldName::ReplaceIfPresentFlag, Value::Fixed(0));
    fields.set(FieldName::DataCoding, Value::Fixed(msg.text.data_coding()));
    fields.set(FieldName::SmDefaultMsgId, Value::Fixed(0));

    match udh {
        Some(udh) => {
            let udh_len = udh.len();
            fields.set(
                FieldName::EsmClass,
                Value::Fixed(msg.esm_class | ESM_CLASS_UDHI),
            );
            fields.set(FieldName::UdhLength, Value::Fixed(udh_len as u8));
            fields.set(FieldName::GsmUserData, Value::Udh(udh));
            fields.set(
                FieldName::SmLength,
                Value::Fixed((udh_len + 1 + payload.len()) as u8),
            );
        }
        None => {
            fields.set(FieldName::EsmClass, Value::Fixed(msg.esm_class));
            fields.set(FieldName::SmLength, Value::Fixed(payload.len() as u8));
        }
    }
    fields.set(
        FieldName::ShortMessage,
        Value::Sm(Bytes::copy_from_slice(payload)),
    );

    pdu.tlvs = msg.tlvs.clone();
}

/// SMPP relative time format (`YYMMDDhhmmss000R`) from a duration, avoiding
/// any dependence on the wall clock.
fn relative_validity(validity: Duration) -> String {
    let mut secs = validity.as_secs();
    let years = (secs / (365 * 24 * 3600)).min(99);
    secs -= years * 365 * 24 * 3600;
    let months = secs / (30 * 24 * 3600);
    secs -= months * 30 * 24 * 3600;
    let days = secs / (24 * 3600);
    secs -= days * 24 * 3600;
    let hours = secs / 3600;
    secs -= hours * 3600;
    let minutes = secs / 60;
    secs -= minutes * 60;
    format!("{years:02}{months:02}{days:02}{hours:02}{minutes:02}{secs:02}000R")
}
