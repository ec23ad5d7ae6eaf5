//! RedWax container: one ASCII header line, the timestamp response, then the
//! raw firmware.
//!
//! ```text
//! RedWax/1.00 rfc3161=<N> payload=<M> model=<MODEL> hw=<REV>\n
//! <N bytes TimeStampResp DER>
//! <M bytes firmware>
//! ```

use std::fmt;
use std::io::Write;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::{ConfigError, Error};

/// Header magic and format version written by this encoder.
pub const MAGIC: &str = "RedWax/1.00";

/// Prefix accepted by decoders for any 1.x container.
const MAGIC_PREFIX: &str = "RedWax/1.";

/// The device inspects only this many leading bytes for the header fields.
pub const MAX_DEVICE_HEADER_LEN: usize = 128;

/// Hardware identification written into the header. Values are verbatim,
/// so they may not contain whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    model: String,
    revision: String,
}

impl HeaderFields {
    pub fn new(model: impl Into<String>, revision: impl Into<String>) -> Result<Self, ConfigError> {
        let model = model.into();
        let revision = revision.into();
        check_field("model", &model)?;
        check_field("hardware revision", &revision)?;
        Ok(Self { model, revision })
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidHeaderField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// MD5 over the complete container, for upload logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum([u8; 16]);

impl Checksum {
    pub fn of(data: &[u8]) -> Self {
        Self(Md5::digest(data).into())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A fully assembled container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContainer {
    header: String,
    bytes: Vec<u8>,
    token_len: usize,
}

impl SignedContainer {
    /// Header, then token, then firmware.
    pub fn encode(fields: &HeaderFields, token: &[u8], firmware: &[u8]) -> Self {
        let header = format!(
            "{} rfc3161={} payload={} model={} hw={}\n",
            MAGIC,
            token.len(),
            firmware.len(),
            fields.model,
            fields.revision
        );

        let mut bytes = Vec::with_capacity(header.len() + token.len() + firmware.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(token);
        bytes.extend_from_slice(firmware);

        Self {
            header,
            bytes,
            token_len: token.len(),
        }
    }

    /// Header line including its trailing newline.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn token(&self) -> &[u8] {
        let start = self.header.len();
        &self.bytes[start..start + self.token_len]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header.len() + self.token_len..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::of(&self.bytes)
    }

    /// Replace `path` with the container in one step.
    ///
    /// The bytes go to a temporary file in the same directory which is then
    /// renamed over `path`; on error `path` is left untouched.
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        file.write_all(&self.bytes)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| Error::io(file.path(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))
                .map_err(|e| Error::io(file.path(), e))?;
        }

        file.persist(path).map_err(|e| Error::io(path, e.error))?;
        Ok(())
    }
}

/// Errors decoding a container.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("no newline terminating the header")]
    UnterminatedHeader,

    #[error("header is not ASCII text")]
    NonAsciiHeader,

    #[error("bad magic '{0}'")]
    BadMagic(String),

    #[error("missing header field '{0}'")]
    MissingField(&'static str),

    #[error("invalid length in header field '{0}'")]
    InvalidLength(&'static str),

    #[error("container is {actual} bytes, header announces {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// A container split into its parts, borrowing from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContainer<'a> {
    pub version: &'a str,
    pub model: &'a str,
    pub revision: &'a str,
    pub header: &'a str,
    pub token: &'a [u8],
    pub payload: &'a [u8],
}

/// Split `data` at the header boundary and the announced lengths.
pub fn parse(data: &[u8]) -> Result<ParsedContainer<'_>, ContainerError> {
    let newline = data
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(ContainerError::UnterminatedHeader)?;
    let header_bytes = &data[..=newline];
    if !header_bytes.is_ascii() {
        return Err(ContainerError::NonAsciiHeader);
    }
    let header = std::str::from_utf8(header_bytes).map_err(|_| ContainerError::NonAsciiHeader)?;

    let mut words = header.trim_end_matches('\n').split(' ');
    let magic = words.next().unwrap_or_default();
    let version = magic
        .strip_prefix("RedWax/")
        .filter(|_| magic.starts_with(MAGIC_PREFIX))
        .ok_or_else(|| ContainerError::BadMagic(magic.to_string()))?;

    let (mut token_len, mut payload_len, mut model, mut revision) = (None, None, None, None);
    for (key, value) in words.filter_map(|word| word.split_once('=')) {
        match key {
            "rfc3161" => token_len = Some(parse_len("rfc3161", value)?),
            "payload" => payload_len = Some(parse_len("payload", value)?),
            "model" => model = Some(value),
            "hw" => revision = Some(value),
            _ => {}
        }
    }
    let token_len = token_len.ok_or(ContainerError::MissingField("rfc3161"))?;
    let payload_len = payload_len.ok_or(ContainerError::MissingField("payload"))?;
    let model = model.ok_or(ContainerError::MissingField("model"))?;
    let revision = revision.ok_or(ContainerError::MissingField("hw"))?;

    let expected = header
        .len()
        .checked_add(token_len)
        .and_then(|n| n.checked_add(payload_len))
        .ok_or(ContainerError::InvalidLength("payload"))?;
    if expected != data.len() {
        return Err(ContainerError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    let body = &data[header.len()..];
    let (token, payload) = body.split_at(token_len);
    Ok(ParsedContainer {
        version,
        model,
        revision,
        header,
        token,
        payload,
    })
}

fn parse_len(field: &'static str, value: &str) -> Result<usize, ContainerError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ContainerError::InvalidLength(field));
    }
    value.parse().map_err(|_| ContainerError::InvalidLength(field))
}
