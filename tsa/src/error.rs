use std::path::PathBuf;

/// Errors raised while loading the signer or handling a timestamp response.
#[derive(Debug, thiserror::Error)]
pub enum TsaError {
    #[error("failed to read key file '{}': {source}", .path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PEM in key file: {0}")]
    Pem(String),

    #[error("no certificate found in key file")]
    MissingCertificate,

    #[error("no private key found in key file")]
    MissingPrivateKey,

    #[error("unsupported private key: {0}")]
    UnsupportedKey(String),

    #[error("invalid private key")]
    InvalidKey,

    #[error("invalid signer certificate: {0}")]
    Certificate(String),

    #[error("private key does not match signer certificate")]
    KeyMismatch,

    #[error("signing failed")]
    Signature,

    #[error("malformed timestamp response")]
    MalformedResponse,
}
