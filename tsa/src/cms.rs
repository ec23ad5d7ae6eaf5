//! CMS SignedData assembly for the timestamp token.
//!
//! Takes the TSTInfo DER, the signedAttrs DER and the signature,
//! combines them with the signer certificate, and produces the
//! ContentInfo that becomes TimeStampResp.timeStampToken.

use crate::der::{write_tlv, TAG_CONTEXT_0, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE, TAG_SET};
use crate::rfc3161::HashAlgorithm;
use crate::signed_attrs::OID_CT_TSTINFO;

// id-signedData (1.2.840.113549.1.7.2)
const OID_SIGNED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];

/// Signer fields for CMS assembly.
pub struct CmsConfig<'a> {
    /// DER-encoded signer certificate; `None` leaves `certificates` out.
    pub signer_cert_der: Option<&'a [u8]>,
    /// Issuer Name and serial number INTEGER from the signer certificate
    /// (for SignerInfo.sid).
    pub issuer_der: &'a [u8],
    pub serial_number_der: &'a [u8],
    /// SignerInfo.signatureAlgorithm, a complete DER AlgorithmIdentifier.
    pub signature_algorithm_der: &'a [u8],
}

/// Signed pieces of a timestamp token.
pub struct SignerComponents {
    pub tstinfo_der: Vec<u8>,
    pub signed_attrs_der: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Build a CMS SignedData structure.
///
/// ContentInfo {
///   contentType: id-signedData,
///   content: SignedData {
///     version: 3,
///     digestAlgorithms: { SHA-256 },
///     encapContentInfo: { id-ct-TSTInfo, TSTInfo },
///     certificates: [0] { signer_cert }   -- only when requested
///     signerInfos: { SignerInfo { ... signature_algorithm ... } }
///   }
/// }
pub fn build_signed_data(config: &CmsConfig, components: &SignerComponents) -> Vec<u8> {
    let mut signed_data_content = Vec::with_capacity(2048);

    // version: 3 (because eContentType is not id-data)
    signed_data_content.extend_from_slice(&[0x02, 0x01, 0x03]);

    // digestAlgorithms: SET OF { AlgorithmIdentifier SHA-256 }
    write_tlv(
        &mut signed_data_content,
        TAG_SET,
        HashAlgorithm::Sha256.algorithm_identifier_der(),
    );

    // encapContentInfo: SEQUENCE { eContentType, eContent }
    let encap = build_encap_content_info(&components.tstinfo_der);
    signed_data_content.extend_from_slice(&encap);

    // certificates [0] IMPLICIT SET OF Certificate
    if let Some(cert) = config.signer_cert_der {
        write_tlv(&mut signed_data_content, TAG_CONTEXT_0, cert);
    }

    // signerInfos: SET OF SignerInfo
    let signer_info = build_signer_info(config, &components.signed_attrs_der, &components.signature);
    write_tlv(&mut signed_data_content, TAG_SET, &signer_info);

    let mut signed_data = Vec::with_capacity(signed_data_content.len() + 4);
    write_tlv(&mut signed_data, TAG_SEQUENCE, &signed_data_content);

    // ContentInfo { contentType, content [0] EXPLICIT SignedData }
    let mut content_info_content = Vec::with_capacity(signed_data.len() + 16);
    write_tlv(&mut content_info_content, TAG_OID, OID_SIGNED_DATA);
    write_tlv(&mut content_info_content, TAG_CONTEXT_0, &signed_data);

    let mut result = Vec::with_capacity(content_info_content.len() + 4);
    write_tlv(&mut result, TAG_SEQUENCE, &content_info_content);
    result
}

fn build_encap_content_info(tstinfo_der: &[u8]) -> Vec<u8> {
    let mut inner = Vec::with_capacity(tstinfo_der.len() + 24);
    // eContentType: id-ct-TSTInfo
    write_tlv(&mut inner, TAG_OID, OID_CT_TSTINFO);
    // eContent [0] EXPLICIT OCTET STRING
    let mut octet_string = Vec::with_capacity(tstinfo_der.len() + 4);
    write_tlv(&mut octet_string, TAG_OCTET_STRING, tstinfo_der);
    write_tlv(&mut inner, TAG_CONTEXT_0, &octet_string);

    let mut result = Vec::with_capacity(inner.len() + 4);
    write_tlv(&mut result, TAG_SEQUENCE, &inner);
    result
}

fn build_signer_info(config: &CmsConfig, signed_attrs_der: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut inner = Vec::with_capacity(signed_attrs_der.len() + config.issuer_der.len() + 128);

    // version: 1
    inner.extend_from_slice(&[0x02, 0x01, 0x01]);

    // sid: IssuerAndSerialNumber SEQUENCE
    let mut sid = Vec::with_capacity(config.issuer_der.len() + config.serial_number_der.len());
    sid.extend_from_slice(config.issuer_der);
    sid.extend_from_slice(config.serial_number_der);
    write_tlv(&mut inner, TAG_SEQUENCE, &sid);

    // digestAlgorithm: SHA-256
    inner.extend_from_slice(HashAlgorithm::Sha256.algorithm_identifier_der());

    // signedAttrs [0] IMPLICIT SET OF
    // The attributes are signed with the SET tag (0x31); SignerInfo carries
    // them re-tagged as [0] IMPLICIT (0xA0).
    if let Some((&first, rest)) = signed_attrs_der.split_first() {
        inner.push(if first == TAG_SET { TAG_CONTEXT_0 } else { first });
        inner.extend_from_slice(rest);
    }

    // signatureAlgorithm
    inner.extend_from_slice(config.signature_algorithm_der);

    // signature: OCTET STRING
    write_tlv(&mut inner, TAG_OCTET_STRING, signature);

    let mut result = Vec::with_capacity(inner.len() + 4);
    write_tlv(&mut result, TAG_SEQUENCE, &inner);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::der::{expect_tlv, read_tlv};

    fn components() -> SignerComponents {
        SignerComponents {
            tstinfo_der: vec![0x30, 0x03, 0x02, 0x01, 0x01],
            signed_attrs_der: vec![0x31, 0x03, 0x02, 0x01, 0x01],
            signature: vec![0x00; 72],
        }
    }

    fn config(cert: Option<&[u8]>) -> CmsConfig<'_> {
        CmsConfig {
            signer_cert_der: cert,
            issuer_der: &[0x30, 0x03, 0x0C, 0x01, 0x41],
            serial_number_der: &[0x02, 0x01, 0x01],
            signature_algorithm_der: &[0x30, 0x03, 0x06, 0x01, 0x2A],
        }
    }

    /// Walk ContentInfo down to the SignedData fields.
    fn signed_data_fields(content_info: &[u8]) -> Vec<u8> {
        let (ci, rest) = expect_tlv(content_info, TAG_SEQUENCE).unwrap();
        assert!(rest.is_empty());
        let (oid, rest) = expect_tlv(ci, TAG_OID).unwrap();
        assert_eq!(oid, OID_SIGNED_DATA);
        let (explicit, _) = expect_tlv(rest, TAG_CONTEXT_0).unwrap();
        let (mut fields, _) = expect_tlv(explicit, TAG_SEQUENCE).unwrap();
        let mut tags = Vec::new();
        while !fields.is_empty() {
            let (element, next) = read_tlv(fields).unwrap();
            tags.push(element.tag);
            fields = next;
        }
        tags
    }

    #[test]
    fn encap_content_info_structure() {
        let tstinfo = vec![0x30, 0x03, 0x02, 0x01, 0x01];
        let encap = build_encap_content_info(&tstinfo);
        assert_eq!(encap[0], TAG_SEQUENCE);
        assert!(encap.ends_with(&[TAG_CONTEXT_0, 0x07, TAG_OCTET_STRING, 0x05, 0x30, 0x03, 0x02, 0x01, 0x01]));
    }

    #[test]
    fn signed_data_with_certificate() {
        let cert = [0x30, 0x03, 0x02, 0x01, 0x01];
        let result = build_signed_data(&config(Some(&cert)), &components());
        assert_eq!(
            signed_data_fields(&result),
            vec![0x02, TAG_SET, TAG_SEQUENCE, TAG_CONTEXT_0, TAG_SET]
        );
    }

    #[test]
    fn signed_data_without_certificate() {
        let result = build_signed_data(&config(None), &components());
        assert_eq!(
            signed_data_fields(&result),
            vec![0x02, TAG_SET, TAG_SEQUENCE, TAG_SET]
        );
    }

    #[test]
    fn signer_info_retags_signed_attrs() {
        let info = build_signer_info(&config(None), &[0x31, 0x03, 0x02, 0x01, 0x01], &[0xAB; 4]);
        assert!(info
            .windows(5)
            .any(|w| w == [TAG_CONTEXT_0, 0x03, 0x02, 0x01, 0x01]));
        // signatureAlgorithm, then the signature
        assert!(info.ends_with(&[
            0x30, 0x03, 0x06, 0x01, 0x2A, TAG_OCTET_STRING, 0x04, 0xAB, 0xAB, 0xAB, 0xAB
        ]));
    }
}
