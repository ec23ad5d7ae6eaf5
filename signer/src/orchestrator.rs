//! Top-level signing flow.
//!
//!   skip? -> firmware/output -> model/revision -> key -> timestamp -> encode -> write
//!
//! Every step before the final write is fallible; nothing touches the output
//! path until the complete container is assembled.

use std::path::PathBuf;

use crate::config::SigningConfig;
use crate::container::{Checksum, HeaderFields, SignedContainer, MAX_DEVICE_HEADER_LEN};
use crate::error::{ConfigError, Error};
use crate::key::KeySource;
use crate::requester::{FirmwareImage, SelfIssued, TimestampBackend, TimestampRequester};

/// Log target of the skip-signing warning. The binary keeps it at Warn or
/// louder whatever `RUST_LOG` says.
pub const SKIP_WARNING_TARGET: &str = "redwax_sign::skip";

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Signed(SignedArtifact),
    /// Signing disabled by the `SKIP_SIGNING=true` build flag.
    Skipped,
}

/// What was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    pub output: PathBuf,
    /// Header line without its trailing newline.
    pub header: String,
    pub total_size: usize,
    pub checksum: Checksum,
    pub key_source: KeySource,
}

pub struct SigningOrchestrator<B = SelfIssued> {
    requester: TimestampRequester<B>,
}

impl<B: TimestampBackend> SigningOrchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            requester: TimestampRequester::new(backend),
        }
    }

    pub fn run(&self, config: &SigningConfig) -> Result<Outcome, Error> {
        if config.skip_signing {
            log::warn!(
                target: SKIP_WARNING_TARGET,
                "WARNING: SKIP_SIGNING is set, skipping firmware signing!"
            );
            return Ok(Outcome::Skipped);
        }

        let firmware_path = config.firmware.as_ref().ok_or(ConfigError::MissingFirmware)?;
        let output = config.output.as_ref().ok_or(ConfigError::MissingOutput)?;

        let model = non_empty(&config.model).ok_or(ConfigError::MissingHardwareModel)?;
        let revision = non_empty(&config.revision).ok_or(ConfigError::MissingHardwareRevision)?;
        let fields = HeaderFields::new(model, revision)?;
        log::info!("Got model: {} with revision {}", model, revision);

        let key = config.keys.resolve()?;

        let firmware = FirmwareImage::read(firmware_path)?;
        let token = self.requester.request_timestamp(&firmware, &key.path)?;

        let container = SignedContainer::encode(&fields, token.as_bytes(), firmware.bytes());
        let header = container.header().trim_end_matches('\n').to_string();
        if header.len() >= MAX_DEVICE_HEADER_LEN {
            log::warn!(
                "header is {} bytes, devices only inspect the first {}",
                header.len() + 1,
                MAX_DEVICE_HEADER_LEN
            );
        }

        let checksum = container.checksum();
        log::info!(
            "Upload size: {}, MD5={}, header={}",
            container.len(),
            checksum,
            header
        );

        container.write_to(output)?;
        log::info!("Signed binary: {}", output.display());

        Ok(Outcome::Signed(SignedArtifact {
            output: output.clone(),
            header,
            total_size: container.len(),
            checksum,
            key_source: key.source,
        }))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Sign with the self-issued timestamp authority and `config.policy`.
pub fn sign_firmware(config: &SigningConfig) -> Result<Outcome, Error> {
    SigningOrchestrator::new(SelfIssued::new(config.policy.clone())).run(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeySources;
    use redwax_tsa::TsaPolicy;
    use std::path::Path;

    struct Fixed(Vec<u8>);

    impl TimestampBackend for Fixed {
        fn reply(&self, _query_der: &[u8], _key_path: &Path) -> Result<Vec<u8>, Error> {
            Ok(self.0.clone())
        }
    }

    /// Minimal granted response (12 bytes) wrapping a stub token.
    fn granted() -> Fixed {
        Fixed(vec![0x30, 0x0A, 0x30, 0x03, 0x02, 0x01, 0x00, 0x30, 0x03, 0x02, 0x01, 0x01])
    }

    fn config(dir: &tempfile::TempDir) -> SigningConfig {
        let firmware = dir.path().join("fw.bin");
        std::fs::write(&firmware, b"FWDATA").unwrap();
        let key = dir.path().join("key.pem");
        std::fs::write(&key, b"unused by the fixed backend").unwrap();
        SigningConfig {
            output: Some(dir.path().join("fw.bin.signed")),
            firmware: Some(firmware),
            model: Some("UCD2".into()),
            revision: Some("5.3".into()),
            keys: KeySources {
                command_line: Some(key),
                ..Default::default()
            },
            skip_signing: false,
            policy: TsaPolicy::default(),
        }
    }

    #[test]
    fn signs_with_backend_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let outcome = SigningOrchestrator::new(granted()).run(&config).unwrap();

        let Outcome::Signed(artifact) = outcome else {
            panic!("expected a signed artifact");
        };
        assert_eq!(artifact.header, "RedWax/1.00 rfc3161=12 payload=6 model=UCD2 hw=5.3");
        assert_eq!(artifact.key_source, KeySource::CommandLine);
        let written = std::fs::read(&artifact.output).unwrap();
        assert_eq!(written.len(), artifact.total_size);
        assert_eq!(Checksum::of(&written), artifact.checksum);
    }

    #[test]
    fn skip_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = SigningConfig {
            skip_signing: true,
            ..config(&dir)
        };
        let outcome = SigningOrchestrator::new(granted()).run(&config).unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(!dir.path().join("fw.bin.signed").exists());
    }

    fn expect_config_error(config: &SigningConfig, check: impl Fn(&ConfigError) -> bool) {
        match SigningOrchestrator::new(granted()).run(config) {
            Err(Error::Configuration(e)) => assert!(check(&e), "unexpected error: {}", e),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!config.output.as_ref().is_some_and(|p| p.exists()));
    }

    #[test]
    fn missing_inputs_are_distinct_errors() {
        let dir = tempfile::tempdir().unwrap();

        expect_config_error(&SigningConfig { firmware: None, ..config(&dir) }, |e| {
            matches!(e, ConfigError::MissingFirmware)
        });
        expect_config_error(&SigningConfig { output: None, ..config(&dir) }, |e| {
            matches!(e, ConfigError::MissingOutput)
        });
        expect_config_error(&SigningConfig { model: None, ..config(&dir) }, |e| {
            matches!(e, ConfigError::MissingHardwareModel)
        });
        expect_config_error(
            &SigningConfig {
                revision: Some(String::new()),
                ..config(&dir)
            },
            |e| matches!(e, ConfigError::MissingHardwareRevision),
        );
        expect_config_error(
            &SigningConfig {
                keys: KeySources::default(),
                ..config(&dir)
            },
            |e| matches!(e, ConfigError::MissingSigningKey),
        );
        expect_config_error(
            &SigningConfig {
                model: Some("UCD 2".into()),
                ..config(&dir)
            },
            |e| matches!(e, ConfigError::InvalidHeaderField { .. }),
        );
    }

    #[test]
    fn backend_failure_leaves_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let output = config.output.clone().unwrap();
        std::fs::write(&output, b"previous build").unwrap();

        let result = SigningOrchestrator::new(Fixed(b"garbage".to_vec())).run(&config);
        assert!(matches!(result, Err(Error::SigningBackend(_))));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous build");
    }

    #[test]
    fn unreadable_firmware_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SigningConfig {
            firmware: Some(dir.path().join("missing.bin")),
            ..config(&dir)
        };
        assert!(matches!(
            SigningOrchestrator::new(granted()).run(&config),
            Err(Error::Io { .. })
        ));
    }
}
