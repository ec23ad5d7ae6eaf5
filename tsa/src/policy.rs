//! Policy of the self-issued timestamp authority.
//!
//! These are the values an `openssl ts -reply` configuration section would
//! carry (`serial`, `default_policy`, `digests`, `accuracy`, ...), held as a
//! plain struct instead of a generated configuration file.

use crate::rfc3161::HashAlgorithm;

/// Policy OID 1.2 (value bytes: 2A), used as default and only other policy.
pub const DEFAULT_POLICY_OID: &[u8] = &[0x2A];

/// Serial-file contents ("0000"): the last serial number issued.
pub const INITIAL_SERIAL: u64 = 0x0000;

/// Digest used for the ESS certificate identifier of the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EssCertIdAlgorithm {
    /// SigningCertificate (RFC 2634) with a SHA-1 ESSCertID.
    Sha1,
    /// SigningCertificateV2 (RFC 5035) with a SHA-256 ESSCertIDv2.
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsaPolicy {
    /// Last serial number issued; each token carries the next one.
    pub last_serial: u64,
    /// Policy OID (value bytes) placed in TSTInfo when the request names none.
    pub default_policy: Vec<u8>,
    /// Further policies a request may ask for.
    pub other_policies: Vec<Vec<u8>>,
    /// Message imprint algorithms the authority accepts.
    pub digests: Vec<HashAlgorithm>,
    /// TSTInfo accuracy in seconds; 0 omits the field.
    pub accuracy_secs: u64,
    pub ordering: bool,
    /// Include the signer's subject as TSTInfo.tsa.
    pub tsa_name: bool,
    pub ess_cert_id_alg: EssCertIdAlgorithm,
}

impl Default for TsaPolicy {
    fn default() -> Self {
        Self {
            last_serial: INITIAL_SERIAL,
            default_policy: DEFAULT_POLICY_OID.to_vec(),
            other_policies: vec![DEFAULT_POLICY_OID.to_vec()],
            digests: vec![HashAlgorithm::Sha256],
            accuracy_secs: 1,
            ordering: false,
            tsa_name: false,
            ess_cert_id_alg: EssCertIdAlgorithm::Sha1,
        }
    }
}

impl TsaPolicy {
    /// Serial number for the next token.
    pub fn serial_number(&self) -> u64 {
        self.last_serial.saturating_add(1)
    }

    pub fn accepts_digest(&self, algorithm: HashAlgorithm) -> bool {
        self.digests.contains(&algorithm)
    }

    pub fn accepts_policy(&self, oid: &[u8]) -> bool {
        self.default_policy == oid || self.other_policies.iter().any(|p| p == oid)
    }

    /// Policy to stamp into TSTInfo for a request that may name one.
    pub fn select_policy<'a>(&'a self, requested: Option<&'a [u8]>) -> &'a [u8] {
        match requested {
            Some(oid) if self.accepts_policy(oid) => oid,
            _ => &self.default_policy,
        }
    }
}
