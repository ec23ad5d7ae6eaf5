//! RFC 3161 TimeStampReq: query construction on the signing side, DER
//! parsing and validation on the authority side.
//!
//! ```text
//! TimeStampReq ::= SEQUENCE {
//!     version         INTEGER { v1(1) },
//!     messageImprint  MessageImprint,
//!     reqPolicy       TSAPolicyId         OPTIONAL,
//!     nonce           INTEGER             OPTIONAL,
//!     certReq         BOOLEAN             DEFAULT FALSE,
//!     extensions      [0] IMPLICIT Extensions OPTIONAL }
//! ```

use sha2::{Digest, Sha256};

use crate::der::{
    expect_tlv, read_tlv, write_tlv, TAG_BOOLEAN, TAG_CONTEXT_0, TAG_INTEGER, TAG_OCTET_STRING,
    TAG_OID, TAG_SEQUENCE,
};
use crate::policy::TsaPolicy;

/// Supported hash algorithm OIDs and their properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Map an OID byte sequence to a HashAlgorithm.
    pub fn from_oid(oid: &[u8]) -> Option<Self> {
        // OID bytes (without tag and length):
        // SHA-256: 60 86 48 01 65 03 04 02 01
        // SHA-384: 60 86 48 01 65 03 04 02 02
        // SHA-512: 60 86 48 01 65 03 04 02 03
        const SHA2_PREFIX: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02];

        if oid.len() == 9 && oid.starts_with(SHA2_PREFIX) {
            match oid[8] {
                0x01 => Some(Self::Sha256),
                0x02 => Some(Self::Sha384),
                0x03 => Some(Self::Sha512),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Expected digest length for this algorithm.
    pub fn digest_length(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns the DER-encoded AlgorithmIdentifier: SEQUENCE { OID, NULL }
    pub fn algorithm_identifier_der(self) -> &'static [u8] {
        match self {
            // SHA-256: 30 0D 06 09 60 86 48 01 65 03 04 02 01 05 00
            Self::Sha256 => &[
                TAG_SEQUENCE, 0x0D,
                TAG_OID, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
                0x05, 0x00, // NULL
            ],
            Self::Sha384 => &[
                TAG_SEQUENCE, 0x0D,
                TAG_OID, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02,
                0x05, 0x00,
            ],
            Self::Sha512 => &[
                TAG_SEQUENCE, 0x0D,
                TAG_OID, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
                0x05, 0x00,
            ],
        }
    }
}

/// RFC 3161 rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BadAlg,
    BadRequest,
    BadDataFormat,
    TimeNotAvailable,
    UnacceptedPolicy,
    UnacceptedExtension,
    SystemFailure,
}

impl RejectReason {
    /// PKIFailureInfo bit position per RFC 3161.
    pub fn failure_info_bit(self) -> u32 {
        match self {
            Self::BadAlg => 0,
            Self::BadRequest => 2,
            Self::BadDataFormat => 5,
            Self::TimeNotAvailable => 14,
            Self::UnacceptedPolicy => 15,
            Self::UnacceptedExtension => 16,
            Self::SystemFailure => 25,
        }
    }

    pub fn from_failure_info_bit(bit: u32) -> Option<Self> {
        match bit {
            0 => Some(Self::BadAlg),
            2 => Some(Self::BadRequest),
            5 => Some(Self::BadDataFormat),
            14 => Some(Self::TimeNotAvailable),
            15 => Some(Self::UnacceptedPolicy),
            16 => Some(Self::UnacceptedExtension),
            25 => Some(Self::SystemFailure),
            _ => None,
        }
    }

    /// Human readable text placed in PKIStatusInfo.statusString.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::BadAlg => "unrecognized or unsupported algorithm identifier",
            Self::BadRequest => "transaction not permitted or supported",
            Self::BadDataFormat => "the data submitted has the wrong format",
            Self::TimeNotAvailable => "the TSA's time source is not available",
            Self::UnacceptedPolicy => "the requested TSA policy is not supported by the TSA",
            Self::UnacceptedExtension => "the requested extension is not supported by the TSA",
            Self::SystemFailure => "the request cannot be handled due to system failure",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status_text())
    }
}

/// Parsed TimeStampReq fields relevant for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampReq {
    pub hash_algorithm: HashAlgorithm,
    pub message_digest: Vec<u8>,
    /// Requested policy OID value bytes (without tag and length).
    pub policy_oid: Option<Vec<u8>>,
    /// Nonce INTEGER content bytes, copied verbatim into TSTInfo.
    pub nonce: Option<Vec<u8>>,
    pub cert_req: bool,
    /// Raw content of the `[0] Extensions` field.
    pub extensions: Option<Vec<u8>>,
}

impl TimeStampReq {
    /// Query over `data` as `openssl ts -query -sha256 -cert -no_nonce`
    /// builds it: deterministic for identical input bytes.
    pub fn sha256(data: &[u8]) -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha256,
            message_digest: Sha256::digest(data).to_vec(),
            policy_oid: None,
            nonce: None,
            cert_req: true,
            extensions: None,
        }
    }

    /// Serialize the request as DER.
    pub fn to_der(&self) -> Vec<u8> {
        let mut imprint = Vec::with_capacity(15 + 2 + self.message_digest.len());
        imprint.extend_from_slice(self.hash_algorithm.algorithm_identifier_der());
        write_tlv(&mut imprint, TAG_OCTET_STRING, &self.message_digest);

        // version: INTEGER 1
        let mut inner = vec![TAG_INTEGER, 0x01, 0x01];
        write_tlv(&mut inner, TAG_SEQUENCE, &imprint);

        if let Some(policy) = &self.policy_oid {
            write_tlv(&mut inner, TAG_OID, policy);
        }
        if let Some(nonce) = &self.nonce {
            write_tlv(&mut inner, TAG_INTEGER, nonce);
        }
        // certReq: DEFAULT FALSE, omitted per DER unless set
        if self.cert_req {
            inner.extend_from_slice(&[TAG_BOOLEAN, 0x01, 0xFF]);
        }
        if let Some(extensions) = &self.extensions {
            write_tlv(&mut inner, TAG_CONTEXT_0, extensions);
        }

        let mut result = Vec::with_capacity(inner.len() + 4);
        write_tlv(&mut result, TAG_SEQUENCE, &inner);
        result
    }

    /// Parse a DER-encoded TimeStampReq.
    pub fn from_der(der: &[u8]) -> Result<Self, RejectReason> {
        use RejectReason::BadDataFormat;

        let (content, trailing) = expect_tlv(der, TAG_SEQUENCE).ok_or(BadDataFormat)?;
        if !trailing.is_empty() {
            return Err(BadDataFormat);
        }

        // version INTEGER
        let (version, rest) = expect_tlv(content, TAG_INTEGER).ok_or(BadDataFormat)?;
        if version != [0x01] {
            return Err(RejectReason::BadRequest);
        }

        // messageImprint SEQUENCE { AlgorithmIdentifier, OCTET STRING }
        let (imprint, mut rest) = expect_tlv(rest, TAG_SEQUENCE).ok_or(BadDataFormat)?;
        let (algorithm, digest_field) = expect_tlv(imprint, TAG_SEQUENCE).ok_or(BadDataFormat)?;
        let (oid, _params) = expect_tlv(algorithm, TAG_OID).ok_or(BadDataFormat)?;
        let hash_algorithm = HashAlgorithm::from_oid(oid).ok_or(RejectReason::BadAlg)?;
        let (digest, tail) = expect_tlv(digest_field, TAG_OCTET_STRING).ok_or(BadDataFormat)?;
        if !tail.is_empty() {
            return Err(BadDataFormat);
        }

        let mut req = Self {
            hash_algorithm,
            message_digest: digest.to_vec(),
            policy_oid: None,
            nonce: None,
            cert_req: false,
            extensions: None,
        };

        // Optional fields, each at most once and in schema order.
        let mut position = 0;
        while !rest.is_empty() {
            let (field, next) = read_tlv(rest).ok_or(BadDataFormat)?;
            let field_position = match field.tag {
                TAG_OID => 1,
                TAG_INTEGER => 2,
                TAG_BOOLEAN => 3,
                TAG_CONTEXT_0 => 4,
                _ => return Err(BadDataFormat),
            };
            if field_position <= position {
                return Err(BadDataFormat);
            }
            position = field_position;

            match field.tag {
                TAG_OID => req.policy_oid = Some(field.value.to_vec()),
                TAG_INTEGER if !field.value.is_empty() => req.nonce = Some(field.value.to_vec()),
                TAG_BOOLEAN => {
                    req.cert_req = match field.value {
                        [0x00] => false,
                        [0xFF] => true,
                        _ => return Err(BadDataFormat),
                    }
                }
                TAG_CONTEXT_0 => req.extensions = Some(field.value.to_vec()),
                _ => return Err(BadDataFormat),
            }
            rest = next;
        }

        Ok(req)
    }
}

/// Validate a parsed TimeStampReq against the authority's policy.
pub fn validate_request(req: &TimeStampReq, policy: &TsaPolicy) -> Result<(), RejectReason> {
    if !policy.accepts_digest(req.hash_algorithm) {
        return Err(RejectReason::BadAlg);
    }

    // Verify digest length matches algorithm
    if req.message_digest.len() != req.hash_algorithm.digest_length() {
        return Err(RejectReason::BadDataFormat);
    }

    if let Some(requested) = &req.policy_oid {
        if !policy.accepts_policy(requested) {
            return Err(RejectReason::UnacceptedPolicy);
        }
    }

    if req.extensions.is_some() {
        return Err(RejectReason::UnacceptedExtension);
    }

    Ok(())
}
