use std::path::PathBuf;

use crate::key::KeySource;

/// Fatal signing errors; see [`crate::orchestrator::sign_firmware`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("timestamp signing failed: {0}")]
    SigningBackend(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<redwax_tsa::TsaError> for Error {
    fn from(e: redwax_tsa::TsaError) -> Self {
        Self::SigningBackend(e.to_string())
    }
}

/// Missing or invalid signing inputs. Each variant names the missing item.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing option --bin")]
    MissingFirmware,

    #[error("missing option --out")]
    MissingOutput,

    #[error(
        "missing option --privatekey, SIGNING_KEY_FILE build flag or OTA_SIGNING_KEY_FILE environment variable"
    )]
    MissingSigningKey,

    #[error("private key file not found: {} (from {origin})", .path.display())]
    KeyFileNotFound { path: PathBuf, origin: KeySource },

    #[error("missing option --model or HW_MODEL build flag")]
    MissingHardwareModel,

    #[error("missing option --hw-rev or HW_REVISION build flag")]
    MissingHardwareRevision,

    #[error("{field} must not contain whitespace: '{value}'")]
    InvalidHeaderField { field: &'static str, value: String },
}
