//! Signing key resolution.
//!
//! Sources are consulted in priority order: the `OTA_SIGNING_KEY_FILE`
//! environment override, the `SIGNING_KEY_FILE` build flag, then the
//! `--privatekey` command-line option. The first source that is set wins,
//! even if its file is missing, so CI can never silently fall back to a
//! committed development key.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable overriding every other key source.
pub const KEY_FILE_ENV: &str = "OTA_SIGNING_KEY_FILE";

/// Where a key path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    BuildFlag,
    CommandLine,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "{} environment variable", KEY_FILE_ENV),
            Self::BuildFlag => write!(f, "SIGNING_KEY_FILE build flag"),
            Self::CommandLine => write!(f, "--privatekey option"),
        }
    }
}

/// Candidate key paths, one per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySources {
    pub environment: Option<PathBuf>,
    pub build_flag: Option<PathBuf>,
    pub command_line: Option<PathBuf>,
}

/// A key path that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub path: PathBuf,
    pub source: KeySource,
}

impl KeySources {
    /// Pick the highest-priority source and check that its file exists.
    pub fn resolve(&self) -> Result<ResolvedKey, ConfigError> {
        let (path, source) = [
            (&self.environment, KeySource::Environment),
            (&self.build_flag, KeySource::BuildFlag),
            (&self.command_line, KeySource::CommandLine),
        ]
        .into_iter()
        .find_map(|(path, source)| {
            path.as_ref()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| (p.clone(), source))
        })
        .ok_or(ConfigError::MissingSigningKey)?;

        if !path.is_file() {
            return Err(ConfigError::KeyFileNotFound {
                path,
                origin: source,
            });
        }

        log::debug!("using signing key {} from {}", path.display(), source);
        warn_if_exposed(&path);

        Ok(ResolvedKey { path, source })
    }
}

#[cfg(unix)]
fn warn_if_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            log::warn!(
                "signing key {} is accessible by group/others (mode {:o})",
                path.display(),
                mode & 0o777
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_exposed(_path: &Path) {}
