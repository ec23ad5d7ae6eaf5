//! Timestamp requester: query over the firmware digest, response from a
//! timestamp backend.

use std::path::{Path, PathBuf};

use redwax_tsa::{parse_response, LocalTsa, SignerIdentity, TimeStampReq, TsaPolicy};

use crate::error::Error;

/// Something that answers RFC 3161 queries.
pub trait TimestampBackend {
    /// Answer a DER TimeStampReq with a DER TimeStampResp, signing with the
    /// key bundle at `key_path`.
    fn reply(&self, query_der: &[u8], key_path: &Path) -> Result<Vec<u8>, Error>;
}

/// Local authority signing with the firmware key itself.
#[derive(Debug, Clone, Default)]
pub struct SelfIssued {
    policy: TsaPolicy,
}

impl SelfIssued {
    pub fn new(policy: TsaPolicy) -> Self {
        Self { policy }
    }
}

impl TimestampBackend for SelfIssued {
    fn reply(&self, query_der: &[u8], key_path: &Path) -> Result<Vec<u8>, Error> {
        let identity = SignerIdentity::from_pem_file(key_path)?;
        let tsa = LocalTsa::new(identity, self.policy.clone());
        Ok(tsa.respond(query_der))
    }
}

/// Firmware binary read fully into memory.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FirmwareImage {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// DER TimeStampResp with a granted status, carried verbatim in the
/// container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken(Vec<u8>);

impl TimestampToken {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

pub struct TimestampRequester<B = SelfIssued> {
    backend: B,
}

impl<B: TimestampBackend> TimestampRequester<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Timestamp `firmware` with the key at `key_path`.
    ///
    /// The query is SHA-256, certReq set, no nonce: identical firmware bytes
    /// always produce the same query.
    pub fn request_timestamp(
        &self,
        firmware: &FirmwareImage,
        key_path: &Path,
    ) -> Result<TimestampToken, Error> {
        let query = TimeStampReq::sha256(firmware.bytes());
        log::debug!(
            "firmware {} sha256={}",
            firmware.path().display(),
            hex(&query.message_digest)
        );

        let response = self.backend.reply(&query.to_der(), key_path)?;
        let parsed = parse_response(&response)?;

        if !parsed.status.is_granted() {
            let mut message = format!("timestamp request {}", parsed.status.status);
            if let Some(reason) = parsed.status.failure {
                message.push_str(&format!(": {}", reason));
            } else if let Some(text) = &parsed.status.status_text {
                message.push_str(&format!(": {}", text));
            }
            return Err(Error::SigningBackend(message));
        }
        if parsed.token.is_none() {
            return Err(Error::SigningBackend(
                "granted timestamp response carries no token".into(),
            ));
        }

        log::debug!("timestamp response: {} bytes", response.len());
        Ok(TimestampToken(response))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use redwax_tsa::rfc3161::RejectReason;
    use redwax_tsa::{parse_status, PkiStatus};
    use std::cell::RefCell;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../tsa/testdata")
            .join(name)
    }

    /// Backend returning a canned response and recording the query.
    struct Canned {
        response: Vec<u8>,
        seen: RefCell<Vec<Vec<u8>>>,
    }

    impl Canned {
        fn new(response: Vec<u8>) -> Self {
            Self {
                response,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl TimestampBackend for Canned {
        fn reply(&self, query_der: &[u8], _key_path: &Path) -> Result<Vec<u8>, Error> {
            self.seen.borrow_mut().push(query_der.to_vec());
            Ok(self.response.clone())
        }
    }

    fn firmware() -> FirmwareImage {
        FirmwareImage::from_bytes("fw.bin", b"FWDATA".to_vec())
    }

    #[test]
    fn self_issued_token_is_granted_response() {
        let requester = TimestampRequester::new(SelfIssued::default());
        let token = requester
            .request_timestamp(&firmware(), &testdata("p256-signer.pem"))
            .unwrap();
        let status = parse_status(token.as_bytes()).unwrap();
        assert_eq!(status.status, PkiStatus::Granted);
    }

    #[test]
    fn query_is_deterministic() {
        let backend = Canned::new(vec![0x30, 0x0A, 0x30, 0x03, 0x02, 0x01, 0x00, 0x30, 0x03, 0x02, 0x01, 0x01]);
        let requester = TimestampRequester::new(backend);
        requester.request_timestamp(&firmware(), Path::new("k.pem")).unwrap();
        requester.request_timestamp(&firmware(), Path::new("k.pem")).unwrap();

        let seen = requester.backend.seen.borrow();
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0], TimeStampReq::sha256(b"FWDATA").to_der());
    }

    #[test]
    fn rejection_is_backend_error() {
        let response = redwax_tsa::response::build_timestamp_resp_rejection(RejectReason::BadAlg);
        let requester = TimestampRequester::new(Canned::new(response));
        match requester.request_timestamp(&firmware(), Path::new("k.pem")) {
            Err(Error::SigningBackend(message)) => {
                assert!(message.contains("rejection"), "{}", message);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn granted_without_token_is_backend_error() {
        let requester =
            TimestampRequester::new(Canned::new(vec![0x30, 0x05, 0x30, 0x03, 0x02, 0x01, 0x00]));
        assert!(matches!(
            requester.request_timestamp(&firmware(), Path::new("k.pem")),
            Err(Error::SigningBackend(_))
        ));
    }

    #[test]
    fn garbage_response_is_backend_error() {
        let requester = TimestampRequester::new(Canned::new(b"garbage".to_vec()));
        assert!(matches!(
            requester.request_timestamp(&firmware(), Path::new("k.pem")),
            Err(Error::SigningBackend(_))
        ));
    }

    #[test]
    fn unusable_key_is_backend_error() {
        let requester = TimestampRequester::new(SelfIssued::default());
        let err = requester
            .request_timestamp(&firmware(), &testdata("key-only.pem"))
            .unwrap_err();
        assert!(matches!(err, Error::SigningBackend(_)));
    }

    #[test]
    fn missing_firmware_is_io_error() {
        let err = FirmwareImage::read(Path::new("/nonexistent/fw.bin")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
