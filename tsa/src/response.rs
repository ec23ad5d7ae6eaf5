//! TimeStampResp construction and status parsing.
//!
//! Assembles the final RFC 3161 TimeStampResp from the CMS SignedData
//! (containing TSTInfo + signature) or from an error status, and reads the
//! status back on the requesting side.

use crate::der::{
    expect_tlv, read_tlv, write_tlv, TAG_BIT_STRING, TAG_INTEGER, TAG_SEQUENCE, TAG_UTF8_STRING,
};
use crate::error::TsaError;
use crate::rfc3161::RejectReason;

/// PKIStatus values per RFC 3161.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PkiStatus {
    Granted = 0,
    GrantedWithMods = 1,
    Rejection = 2,
    Waiting = 3,
    RevocationWarning = 4,
    RevocationNotification = 5,
}

impl PkiStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Granted),
            1 => Some(Self::GrantedWithMods),
            2 => Some(Self::Rejection),
            3 => Some(Self::Waiting),
            4 => Some(Self::RevocationWarning),
            5 => Some(Self::RevocationNotification),
            _ => None,
        }
    }

    /// Whether a token accompanies this status.
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted | Self::GrantedWithMods)
    }
}

impl std::fmt::Display for PkiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::GrantedWithMods => write!(f, "grantedWithMods"),
            Self::Rejection => write!(f, "rejection"),
            Self::Waiting => write!(f, "waiting"),
            Self::RevocationWarning => write!(f, "revocationWarning"),
            Self::RevocationNotification => write!(f, "revocationNotification"),
        }
    }
}

/// Decoded PKIStatusInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    pub status: PkiStatus,
    pub status_text: Option<String>,
    pub failure: Option<RejectReason>,
}

impl StatusInfo {
    pub fn is_granted(&self) -> bool {
        self.status.is_granted()
    }
}

/// A parsed TimeStampResp borrowing the token from the input.
#[derive(Debug)]
pub struct ParsedResponse<'a> {
    pub status: StatusInfo,
    /// Complete timeStampToken ContentInfo, tag and length included.
    pub token: Option<&'a [u8]>,
}

/// Build a successful TimeStampResp containing the signed timestamp token.
///
/// TimeStampResp ::= SEQUENCE {
///     status          PKIStatusInfo,
///     timeStampToken  ContentInfo OPTIONAL
/// }
///
/// PKIStatusInfo ::= SEQUENCE {
///     status PKIStatus  -- INTEGER
/// }
pub fn build_timestamp_resp_success(signed_data_content_info: &[u8]) -> Vec<u8> {
    let mut inner = Vec::with_capacity(signed_data_content_info.len() + 16);

    // PKIStatusInfo: SEQUENCE { status INTEGER 0 (granted) }
    inner.extend_from_slice(&[TAG_SEQUENCE, 0x03, TAG_INTEGER, 0x01, PkiStatus::Granted as u8]);

    // timeStampToken: ContentInfo (already DER-encoded)
    inner.extend_from_slice(signed_data_content_info);

    let mut result = Vec::with_capacity(inner.len() + 4);
    write_tlv(&mut result, TAG_SEQUENCE, &inner);
    result
}

/// Build a rejection TimeStampResp for `reason`.
///
/// PKIStatusInfo ::= SEQUENCE {
///     status       PKIStatus,
///     statusString PKIFreeText OPTIONAL,
///     failInfo     PKIFailureInfo OPTIONAL
/// }
pub fn build_timestamp_resp_rejection(reason: RejectReason) -> Vec<u8> {
    let mut pki_status_info = Vec::with_capacity(96);

    // status: INTEGER 2 (rejection)
    pki_status_info.extend_from_slice(&[TAG_INTEGER, 0x01, PkiStatus::Rejection as u8]);

    // statusString: SEQUENCE OF UTF8String
    let mut free_text = Vec::with_capacity(64);
    write_tlv(&mut free_text, TAG_UTF8_STRING, reason.status_text().as_bytes());
    write_tlv(&mut pki_status_info, TAG_SEQUENCE, &free_text);

    pki_status_info.extend_from_slice(&encode_failure_info(reason.failure_info_bit()));

    let mut status_info_seq = Vec::with_capacity(pki_status_info.len() + 4);
    write_tlv(&mut status_info_seq, TAG_SEQUENCE, &pki_status_info);

    // No timeStampToken for rejections.
    let mut result = Vec::with_capacity(status_info_seq.len() + 4);
    write_tlv(&mut result, TAG_SEQUENCE, &status_info_seq);
    result
}

/// Encode a PKIFailureInfo BIT STRING with a single named bit set.
///
/// Bit 0 is the most significant bit of the first content byte; DER drops
/// trailing zero bits, so the last byte always carries the set bit.
fn encode_failure_info(bit: u32) -> Vec<u8> {
    let byte_index = (bit / 8) as usize;
    let unused_bits = (7 - bit % 8) as u8;

    let mut content = vec![0u8; byte_index + 2];
    content[0] = unused_bits;
    content[byte_index + 1] = 1 << unused_bits;

    let mut result = Vec::with_capacity(content.len() + 2);
    write_tlv(&mut result, TAG_BIT_STRING, &content);
    result
}

/// Lowest named bit set in a PKIFailureInfo BIT STRING content.
fn decode_failure_info(content: &[u8]) -> Option<RejectReason> {
    let (_unused, bits) = content.split_first()?;
    bits.iter().enumerate().find_map(|(index, byte)| {
        (0..8u32)
            .find(|offset| byte & (0x80 >> offset) != 0)
            .and_then(|offset| RejectReason::from_failure_info_bit(index as u32 * 8 + offset))
    })
}

fn parse_status_info(content: &[u8]) -> Result<StatusInfo, TsaError> {
    let (status, mut rest) =
        expect_tlv(content, TAG_INTEGER).ok_or(TsaError::MalformedResponse)?;
    let status = match status {
        [value] => PkiStatus::from_u8(*value).ok_or(TsaError::MalformedResponse)?,
        _ => return Err(TsaError::MalformedResponse),
    };

    let mut info = StatusInfo {
        status,
        status_text: None,
        failure: None,
    };

    while !rest.is_empty() {
        let (field, next) = read_tlv(rest).ok_or(TsaError::MalformedResponse)?;
        match field.tag {
            TAG_SEQUENCE => {
                let mut texts = Vec::new();
                let mut strings = field.value;
                while !strings.is_empty() {
                    let (text, after) = expect_tlv(strings, TAG_UTF8_STRING)
                        .ok_or(TsaError::MalformedResponse)?;
                    texts.push(String::from_utf8_lossy(text).into_owned());
                    strings = after;
                }
                info.status_text = Some(texts.join("; "));
            }
            TAG_BIT_STRING => info.failure = decode_failure_info(field.value),
            _ => return Err(TsaError::MalformedResponse),
        }
        rest = next;
    }

    Ok(info)
}

/// Parse a DER-encoded TimeStampResp.
pub fn parse_response(der: &[u8]) -> Result<ParsedResponse<'_>, TsaError> {
    let (content, trailing) = expect_tlv(der, TAG_SEQUENCE).ok_or(TsaError::MalformedResponse)?;
    if !trailing.is_empty() {
        return Err(TsaError::MalformedResponse);
    }

    let (status_info, rest) =
        expect_tlv(content, TAG_SEQUENCE).ok_or(TsaError::MalformedResponse)?;
    let status = parse_status_info(status_info)?;

    let token = if rest.is_empty() {
        None
    } else {
        let (element, after) = read_tlv(rest).ok_or(TsaError::MalformedResponse)?;
        if element.tag != TAG_SEQUENCE || !after.is_empty() {
            return Err(TsaError::MalformedResponse);
        }
        Some(rest)
    };

    Ok(ParsedResponse { status, token })
}

/// Read only the PKIStatusInfo of a TimeStampResp.
pub fn parse_status(der: &[u8]) -> Result<StatusInfo, TsaError> {
    parse_response(der).map(|response| response.status)
}
