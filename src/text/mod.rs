//! Text codecs for the `short_message` payload and their `data_coding`
//! bytes. Each [`Text`] variant knows how to encode itself and what the
//! single-PDU and concatenated-part payload limits are for that encoding.

pub mod gsm7;
pub mod latin1;
pub mod ucs2;

/// `data_coding` values this crate produces or interprets.
pub mod coding {
    /// SMSC default alphabet (GSM 03.38).
    pub const DEFAULT: u8 = 0x00;
    /// IA5 (CCITT T.50) / ASCII.
    pub const ASCII: u8 = 0x01;
    /// Latin-1 (ISO-8859-1).
    pub const LATIN1: u8 = 0x03;
    /// UCS-2 (ISO/IEC-10646), big-endian.
    pub const UCS2: u8 = 0x08;
}

/// A short-message payload tagged with its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Text {
    /// GSM 03.38 default alphabet, one septet per octet.
    Gsm7(String),
    /// GSM 03.38 default alphabet, 7-bit packed. Only used when explicitly
    /// requested; shares `data_coding` 0x00 with the unpacked form.
    Gsm7Packed(String),
    /// Latin-1 octets, carried through unchanged.
    Latin1(Vec<u8>),
    /// UCS-2-BE (UTF-16BE on the wire).
    Ucs2(String),
    /// Pre-encoded octets, `data_coding` 0x00.
    Raw(Vec<u8>),
}

impl Text {
    /// The `data_coding` byte advertised for this payload.
    pub fn data_coding(&self) -> u8 {
        match self {
            Text::Gsm7(_) | Text::Gsm7Packed(_) | Text::Raw(_) => coding::DEFAULT,
            Text::Latin1(_) => coding::LATIN1,
            Text::Ucs2(_) => coding::UCS2,
        }
    }

    /// Encode the payload to its wire octets.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Text::Gsm7(s) => gsm7::encode(s),
            Text::Gsm7Packed(s) => gsm7::encode_packed(s),
            Text::Latin1(b) => latin1::encode(b),
            Text::Ucs2(s) => ucs2::encode(s),
            Text::Raw(b) => b.clone(),
        }
    }

    /// Maximum encoded payload for a single, unconcatenated PDU.
    pub fn single_limit(&self) -> usize {
        match self {
            Text::Gsm7(_) => 160,
            _ => 140,
        }
    }

    /// Maximum encoded payload per concatenated part. One unit below the
    /// arithmetic maximum for GSM7 and UCS-2 so a slice never has to end
    /// inside an escape pair or a 2-octet character.
    pub fn part_limit(&self) -> usize {
        match self {
            Text::Gsm7(_) => 152,
            Text::Gsm7Packed(_) | Text::Ucs2(_) => 132,
            Text::Latin1(_) | Text::Raw(_) => 133,
        }
    }
}

/// Decode received `short_message` octets according to `data_coding`,
/// returning UTF-8. Codings this crate does not understand pass through
/// unchanged.
pub fn decode(data_coding: u8, data: &[u8]) -> Vec<u8> {
    match data_coding {
        coding::DEFAULT => gsm7::decode(data),
        coding::LATIN1 => latin1::decode(data),
        coding::UCS2 => ucs2::decode(data),
        _ => data.to_vec(),
    }
}
