use std::path::{Path, PathBuf};

use redwax_sign::container::parse;
use redwax_sign::{
    sign_firmware, CliOptions, ConfigError, Environment, Error, KeySource, KeySources, Outcome,
    SigningConfig, SigningOrchestrator, TimestampBackend,
};
use redwax_tsa::{parse_response, parse_status, PkiStatus, TimeStampReq};

fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../tsa/testdata")
        .join(name)
}

fn write_firmware(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("firmware.bin");
    std::fs::write(&path, b"FWDATA").unwrap();
    path
}

fn standalone(dir: &tempfile::TempDir, key: Option<PathBuf>) -> SigningConfig {
    SigningConfig::assemble(
        CliOptions {
            bin: Some(write_firmware(dir)),
            out: Some(dir.path().join("firmware.bin.signed")),
            private_key: key,
            model: Some("UCD2".into()),
            hw_rev: Some("5.3".into()),
            build_flags: Vec::new(),
        },
        Environment::default(),
    )
}

#[test]
fn end_to_end_self_issued() {
    let dir = tempfile::tempdir().unwrap();
    let config = standalone(&dir, Some(testdata("p256-signer.pem")));

    let Outcome::Signed(artifact) = sign_firmware(&config).unwrap() else {
        panic!("signing was skipped");
    };
    let data = std::fs::read(&artifact.output).unwrap();
    let container = parse(&data).unwrap();

    let expected_header = format!(
        "RedWax/1.00 rfc3161={} payload=6 model=UCD2 hw=5.3\n",
        container.token.len()
    );
    assert_eq!(container.header, expected_header);
    assert_eq!(artifact.header, expected_header.trim_end());
    assert!(data.ends_with(b"FWDATA"));
    assert_eq!(data.len(), expected_header.len() + container.token.len() + 6);
    assert_eq!(artifact.total_size, data.len());
    assert_eq!(artifact.key_source, KeySource::CommandLine);

    // the embedded response is granted and carries a token over the firmware digest
    let response = parse_response(container.token).unwrap();
    assert_eq!(response.status.status, PkiStatus::Granted);
    let token = response.token.unwrap();
    let digest = TimeStampReq::sha256(b"FWDATA").message_digest;
    assert!(token.windows(digest.len()).any(|w| w == digest.as_slice()));
}

#[test]
fn end_to_end_other_key_types() {
    for key in ["p384-signer.pem", "p256-sec1-signer.pem", "rsa-signer.pem"] {
        let dir = tempfile::tempdir().unwrap();
        let config = standalone(&dir, Some(testdata(key)));
        assert!(matches!(sign_firmware(&config), Ok(Outcome::Signed(_))), "{}", key);
    }
}

#[test]
fn build_integration_mode() {
    let dir = tempfile::tempdir().unwrap();
    let firmware = write_firmware(&dir);
    let config = SigningConfig::assemble(
        CliOptions {
            bin: Some(firmware.clone()),
            build_flags: vec![
                "-D HW_MODEL=UCD2".into(),
                "-D HW_REVISION=5.3".into(),
                format!("-D SIGNING_KEY_FILE={}", testdata("p256-signer.pem").display()),
            ],
            ..Default::default()
        },
        Environment::default(),
    );

    let Outcome::Signed(artifact) = sign_firmware(&config).unwrap() else {
        panic!("signing was skipped");
    };
    assert_eq!(artifact.output, dir.path().join("firmware.bin.signed"));
    assert_eq!(artifact.key_source, KeySource::BuildFlag);
    let data = std::fs::read(&artifact.output).unwrap();
    let container = parse(&data).unwrap();
    assert_eq!((container.model, container.revision), ("UCD2", "5.3"));
    assert_eq!(container.payload, b"FWDATA");
}

#[test]
fn environment_key_overrides_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = standalone(&dir, Some(testdata("key-only.pem")));
    config.keys.environment = Some(testdata("p384-signer.pem"));

    let Outcome::Signed(artifact) = sign_firmware(&config).unwrap() else {
        panic!("signing was skipped");
    };
    assert_eq!(artifact.key_source, KeySource::Environment);
}

/// Timestamp backend returning a fixed granted response.
struct Stub;

impl TimestampBackend for Stub {
    fn reply(&self, query_der: &[u8], _key_path: &Path) -> Result<Vec<u8>, Error> {
        assert_eq!(query_der, TimeStampReq::sha256(b"FWDATA").to_der());
        // TimeStampResp { status granted, token SEQUENCE { 37 bytes } }
        let mut response = vec![0x30, 0x2C, 0x30, 0x03, 0x02, 0x01, 0x00, 0x30, 0x25];
        response.extend_from_slice(&[0x5A; 37]);
        Ok(response)
    }
}

#[test]
fn stub_backend_header() {
    let dir = tempfile::tempdir().unwrap();
    // the stub ignores the key, but the file must exist
    let config = standalone(&dir, Some(testdata("p256-signer.pem")));

    let Outcome::Signed(artifact) = SigningOrchestrator::new(Stub).run(&config).unwrap() else {
        panic!("signing was skipped");
    };
    let data = std::fs::read(&artifact.output).unwrap();
    assert!(data.starts_with(b"RedWax/1.00 rfc3161=46 payload=6 model=UCD2 hw=5.3\n"));
    assert!(data.ends_with(b"FWDATA"));
    assert_eq!(parse_status(parse(&data).unwrap().token).unwrap().status, PkiStatus::Granted);
}

#[test]
fn missing_key_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = standalone(&dir, None);
    assert_eq!(config.keys, KeySources::default());

    let err = sign_firmware(&config).unwrap_err();
    assert!(matches!(err, Error::Configuration(ConfigError::MissingSigningKey)));
    assert!(!dir.path().join("firmware.bin.signed").exists());
}

#[test]
fn skip_signing_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("firmware.bin.signed");
    std::fs::write(&output, b"earlier container").unwrap();

    let config = SigningConfig::assemble(
        CliOptions {
            bin: Some(write_firmware(&dir)),
            ..Default::default()
        },
        Environment {
            build_flags: Some("-DSKIP_SIGNING=true".into()),
            ..Default::default()
        },
    );
    assert_eq!(sign_firmware(&config).unwrap(), Outcome::Skipped);
    assert_eq!(std::fs::read(&output).unwrap(), b"earlier container");
}

#[test]
fn mismatched_key_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = standalone(&dir, Some(testdata("mismatched-signer.pem")));
    assert!(matches!(sign_firmware(&config), Err(Error::SigningBackend(_))));
    assert!(!dir.path().join("firmware.bin.signed").exists());
}
