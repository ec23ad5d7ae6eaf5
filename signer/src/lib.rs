//! Firmware signing into RedWax containers.
//!
//! A firmware image is timestamped by a self-issued RFC 3161 authority
//! (see `redwax-tsa`) and wrapped as
//! `RedWax/1.00 rfc3161=<N> payload=<M> model=<MODEL> hw=<REV>\n` followed by
//! the timestamp response and the raw firmware.

pub mod config;
pub mod container;
pub mod error;
pub mod key;
pub mod orchestrator;
pub mod requester;

pub use config::{BuildFlags, CliOptions, Environment, SigningConfig};
pub use container::{Checksum, HeaderFields, SignedContainer};
pub use error::{ConfigError, Error};
pub use key::{KeySource, KeySources};
pub use orchestrator::{sign_firmware, Outcome, SignedArtifact, SigningOrchestrator};
pub use requester::{FirmwareImage, SelfIssued, TimestampBackend, TimestampRequester, TimestampToken};
