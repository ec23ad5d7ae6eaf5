//! CMS SignedAttributes (signedAttrs) DER encoder.
//!
//! Per RFC 5652 Section 5.4, when the content type is not id-data,
//! signedAttrs MUST be present and the signature covers DER(signedAttrs).
//!
//! signedAttrs = SET OF Attribute {
//!   { contentType,          SET { id-ct-TSTInfo } },
//!   { signingTime,          SET { UTCTime } },
//!   { signingCertificate,   SET { SigningCertificate } },   -- or V2
//!   { messageDigest,        SET { OCTET STRING (SHA-256 of TSTInfo DER) } },
//! }

use sha2::{Digest, Sha256};

use crate::der::{
    tlv, write_tlv, TAG_GENERALIZED_TIME, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE, TAG_SET,
    TAG_UTC_TIME,
};
use crate::time::{format_generalized_time, format_utc_time};

// OID: contentType (1.2.840.113549.1.9.3)
const OID_CONTENT_TYPE: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x03];

// OID: id-ct-TSTInfo (1.2.840.113549.1.9.16.1.4)
pub(crate) const OID_CT_TSTINFO: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x10, 0x01, 0x04];

// OID: messageDigest (1.2.840.113549.1.9.4)
const OID_MESSAGE_DIGEST: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x04];

// OID: signingTime (1.2.840.113549.1.9.5)
const OID_SIGNING_TIME: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x05];

// OID: signingCertificate (1.2.840.113549.1.9.16.2.12)
const OID_SIGNING_CERT: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x10, 0x02, 0x0C];

// OID: signingCertificateV2 (1.2.840.113549.1.9.16.2.47)
const OID_SIGNING_CERT_V2: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x10, 0x02, 0x2F];

/// ESS identifier of the signing certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EssCertId {
    /// SHA-1 of the certificate DER, carried in SigningCertificate.
    Sha1([u8; 20]),
    /// SHA-256 of the certificate DER, carried in SigningCertificateV2.
    Sha256([u8; 32]),
}

/// Attribute ::= SEQUENCE { attrType OID, attrValues SET { value } }
fn build_attribute(oid: &[u8], value: &[u8]) -> Vec<u8> {
    let mut inner = Vec::with_capacity(oid.len() + value.len() + 8);
    write_tlv(&mut inner, TAG_OID, oid);
    write_tlv(&mut inner, TAG_SET, value);
    tlv(TAG_SEQUENCE, &inner)
}

fn build_content_type_attr() -> Vec<u8> {
    build_attribute(OID_CONTENT_TYPE, &tlv(TAG_OID, OID_CT_TSTINFO))
}

fn build_message_digest_attr(tstinfo_hash: &[u8]) -> Vec<u8> {
    build_attribute(OID_MESSAGE_DIGEST, &tlv(TAG_OCTET_STRING, tstinfo_hash))
}

/// UTCTime through 2049, GeneralizedTime afterwards (RFC 5652 Section 11.3).
fn build_signing_time_attr(unix_secs: u64) -> Vec<u8> {
    let time = match format_utc_time(unix_secs) {
        Some(utc) => tlv(TAG_UTC_TIME, &utc),
        None => tlv(TAG_GENERALIZED_TIME, &format_generalized_time(unix_secs)),
    };
    build_attribute(OID_SIGNING_TIME, &time)
}

/// SigningCertificate   ::= SEQUENCE { certs SEQUENCE OF ESSCertID }
/// SigningCertificateV2 ::= SEQUENCE { certs SEQUENCE OF ESSCertIDv2 }
///
/// ESSCertID(v2) ::= SEQUENCE { [hashAlgorithm,] certHash OCTET STRING }
/// hashAlgorithm is absent in v1 and omitted in v2 when it is the
/// DEFAULT sha-256. issuerSerial is never included for the signer.
fn build_signing_cert_attr(cert_id: &EssCertId) -> Vec<u8> {
    let (oid, cert_hash): (&[u8], &[u8]) = match cert_id {
        EssCertId::Sha1(hash) => (OID_SIGNING_CERT, hash),
        EssCertId::Sha256(hash) => (OID_SIGNING_CERT_V2, hash),
    };
    let ess_cert_id = tlv(TAG_SEQUENCE, &tlv(TAG_OCTET_STRING, cert_hash));
    let certs = tlv(TAG_SEQUENCE, &ess_cert_id);
    let signing_certificate = tlv(TAG_SEQUENCE, &certs);
    build_attribute(oid, &signing_certificate)
}

/// Build the complete signedAttrs SET.
///
/// The signature is computed over this exact byte sequence. Attributes are
/// sorted by their encoding as DER requires for SET OF; the caller re-tags
/// the SET as `[0] IMPLICIT` when placing it in SignerInfo.
pub fn build_signed_attrs(tstinfo_der: &[u8], signing_time: u64, cert_id: &EssCertId) -> Vec<u8> {
    let tstinfo_hash = Sha256::digest(tstinfo_der);

    let mut attrs = vec![
        build_content_type_attr(),
        build_signing_time_attr(signing_time),
        build_signing_cert_attr(cert_id),
        build_message_digest_attr(&tstinfo_hash),
    ];
    attrs.sort();

    let attrs_content = attrs.concat();
    let mut result = Vec::with_capacity(attrs_content.len() + 4);
    write_tlv(&mut result, TAG_SET, &attrs_content);
    result
}
