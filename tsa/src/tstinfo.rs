//! DER encoder for RFC 3161 TSTInfo structures.
//!
//! Builds TSTInfo without an ASN.1 library by filling variable fields into
//! the known DER structure.

use crate::der::{
    encode_integer_u64, tlv, write_tlv, TAG_BOOLEAN, TAG_CONTEXT_0, TAG_CONTEXT_4,
    TAG_GENERALIZED_TIME, TAG_INTEGER, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE,
};
use crate::rfc3161::HashAlgorithm;

// TSTInfo.version = 1
const VERSION_V1: &[u8] = &[TAG_INTEGER, 0x01, 0x01];

/// Parameters for building a TSTInfo.
pub struct TstInfoParams<'a> {
    /// Policy OID value bytes (without tag and length).
    pub policy_oid: &'a [u8],
    pub hash_algorithm: HashAlgorithm,
    pub digest: &'a [u8],
    pub serial_number: u64,
    /// GeneralizedTime as "YYYYMMDDHHMMSSZ".
    pub gen_time: [u8; 15],
    /// Accuracy in whole seconds; 0 omits the field.
    pub accuracy_secs: u64,
    pub ordering: bool,
    /// Nonce INTEGER content bytes from the request.
    pub nonce: Option<&'a [u8]>,
    /// DER-encoded Name used as the TSA directoryName.
    pub tsa_name: Option<&'a [u8]>,
}

/// Build a DER-encoded MessageImprint SEQUENCE.
fn encode_message_imprint(buf: &mut Vec<u8>, algo: HashAlgorithm, digest: &[u8]) {
    let mut inner = Vec::with_capacity(64 + digest.len());
    inner.extend_from_slice(algo.algorithm_identifier_der());
    write_tlv(&mut inner, TAG_OCTET_STRING, digest);
    write_tlv(buf, TAG_SEQUENCE, &inner);
}

/// Accuracy ::= SEQUENCE { seconds INTEGER OPTIONAL, millis [0], micros [1] }
fn encode_accuracy(buf: &mut Vec<u8>, seconds: u64) {
    let mut inner = Vec::with_capacity(10);
    encode_integer_u64(&mut inner, seconds);
    write_tlv(buf, TAG_SEQUENCE, &inner);
}

/// Build a DER-encoded TSTInfo structure.
///
/// TSTInfo ::= SEQUENCE {
///     version         INTEGER { v1(1) },
///     policy          OBJECT IDENTIFIER,
///     messageImprint  MessageImprint,
///     serialNumber    INTEGER,
///     genTime         GeneralizedTime,
///     accuracy        Accuracy        OPTIONAL,
///     ordering        BOOLEAN         DEFAULT FALSE,
///     nonce           INTEGER         OPTIONAL,
///     tsa             [0] GeneralName OPTIONAL,
/// }
pub fn build_tstinfo(params: &TstInfoParams) -> Vec<u8> {
    let mut inner = Vec::with_capacity(256);

    inner.extend_from_slice(VERSION_V1);
    write_tlv(&mut inner, TAG_OID, params.policy_oid);
    encode_message_imprint(&mut inner, params.hash_algorithm, params.digest);
    encode_integer_u64(&mut inner, params.serial_number);
    write_tlv(&mut inner, TAG_GENERALIZED_TIME, &params.gen_time);

    if params.accuracy_secs > 0 {
        encode_accuracy(&mut inner, params.accuracy_secs);
    }

    // ordering: DEFAULT FALSE, omitted per DER
    if params.ordering {
        inner.extend_from_slice(&[TAG_BOOLEAN, 0x01, 0xFF]);
    }

    if let Some(nonce) = params.nonce {
        write_tlv(&mut inner, TAG_INTEGER, nonce);
    }

    // tsa [0] EXPLICIT GeneralName { directoryName [4] EXPLICIT Name }
    if let Some(name) = params.tsa_name {
        let general_name = tlv(TAG_CONTEXT_4, name);
        write_tlv(&mut inner, TAG_CONTEXT_0, &general_name);
    }

    let mut result = Vec::with_capacity(inner.len() + 4);
    write_tlv(&mut result, TAG_SEQUENCE, &inner);
    result
}
