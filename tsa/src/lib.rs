//! Self-issued RFC 3161 timestamp authority.
//!
//! Parses and builds TimeStampReq/TimeStampResp messages and signs TSTInfo
//! tokens as CMS SignedData with a local ECDSA or RSA key and certificate, so a
//! build host can timestamp artifacts without a network TSA.

pub mod authority;
pub mod cms;
pub mod der;
pub mod error;
pub mod policy;
pub mod response;
pub mod rfc3161;
pub mod signed_attrs;
pub mod signing;
pub mod time;
pub mod tstinfo;

pub use authority::LocalTsa;
pub use error::TsaError;
pub use policy::{EssCertIdAlgorithm, TsaPolicy};
pub use response::{parse_response, parse_status, PkiStatus, StatusInfo};
pub use rfc3161::{HashAlgorithm, RejectReason, TimeStampReq};
pub use signing::{SignerCertificate, SignerIdentity, SigningKey};
pub use time::{Clock, FixedClock, SystemClock};
