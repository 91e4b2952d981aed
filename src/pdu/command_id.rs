use num_enum::TryFromPrimitive;

/// SMPP v3.4 command identifiers for the operations this client speaks.
///
/// Bit 31 distinguishes responses from requests: a response ID is its request
/// ID OR'd with `0x8000_0000`. IDs outside this enum still frame correctly;
/// they decode to a [`crate::pdu::Pdu`] with an opaque body.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    GenericNack = 0x8000_0000,

    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    BindTransmitter = 0x0000_0002,
    BindTransmitterResp = 0x8000_0002,

    QuerySm = 0x0000_0003,
    QuerySmResp = 0x8000_0003,

    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,

    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,

    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,

    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,

    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,

    SubmitMulti = 0x0000_0021,
    SubmitMultiResp = 0x8000_0021,
}

/// The response bit in a command id.
pub const RESPONSE_BIT: u32 = 0x8000_0000;

impl CommandId {
    /// True for response PDUs (bit 31 set). `generic_nack` counts as a
    /// response.
    pub fn is_response(self) -> bool {
        (self as u32) & RESPONSE_BIT != 0
    }

    /// The paired response id for a request. Responses return themselves.
    pub fn response(self) -> CommandId {
        match self {
            CommandId::BindReceiver => CommandId::BindReceiverResp,
            CommandId::BindTransmitter => CommandId::BindTransmitterResp,
            CommandId::BindTransceiver => CommandId::BindTransceiverResp,
            CommandId::QuerySm => CommandId::QuerySmResp,
            CommandId::SubmitSm => CommandId::SubmitSmResp,
            CommandId::DeliverSm => CommandId::DeliverSmResp,
            CommandId::Unbind => CommandId::UnbindResp,
            CommandId::EnquireLink => CommandId::EnquireLinkResp,
            CommandId::SubmitMulti => CommandId::SubmitMultiResp,
            other => other,
        }
    }
}
