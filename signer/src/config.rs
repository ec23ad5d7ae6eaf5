//! Signing configuration: command-line options, build flags and environment
//! collected once at startup into a [`SigningConfig`].

use std::ffi::OsString;
use std::path::PathBuf;

use redwax_tsa::TsaPolicy;

use crate::key::{KeySources, KEY_FILE_ENV};

/// Environment variable carrying build flags forwarded by a post-build hook.
pub const BUILD_FLAGS_ENV: &str = "REDWAX_BUILD_FLAGS";

pub const HW_MODEL_FLAG: &str = "HW_MODEL";
pub const HW_REVISION_FLAG: &str = "HW_REVISION";
pub const SIGNING_KEY_FILE_FLAG: &str = "SIGNING_KEY_FILE";
pub const SKIP_SIGNING_FLAG: &str = "SKIP_SIGNING";

/// Suffix appended to the firmware path when no output path is given.
const SIGNED_SUFFIX: &str = ".signed";

/// Build flags of the host build, e.g. `-D HW_MODEL=UCD2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags(Vec<String>);

impl BuildFlags {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(flags.into_iter().map(Into::into).collect())
    }

    /// Whitespace-separated list, as passed through [`BUILD_FLAGS_ENV`].
    pub fn parse(list: &str) -> Self {
        Self::new(list.split_whitespace())
    }

    pub fn extend(&mut self, other: BuildFlags) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the first flag containing `NAME=`: everything after its
    /// first `=`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let needle = format!("{}=", name);
        self.0
            .iter()
            .find(|flag| flag.contains(&needle))
            .and_then(|flag| flag.split_once('='))
            .map(|(_, value)| value.trim())
    }

    pub fn hw_model(&self) -> Option<&str> {
        self.get(HW_MODEL_FLAG)
    }

    pub fn hw_revision(&self) -> Option<&str> {
        self.get(HW_REVISION_FLAG)
    }

    pub fn signing_key_file(&self) -> Option<&str> {
        self.get(SIGNING_KEY_FILE_FLAG)
    }

    /// Only the literal value `true` disables signing.
    pub fn skip_signing(&self) -> bool {
        self.get(SKIP_SIGNING_FLAG) == Some("true")
    }
}

/// Process environment relevant to signing. Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub signing_key_file: Option<PathBuf>,
    pub build_flags: Option<String>,
}

impl Environment {
    pub fn capture() -> Self {
        Self {
            signing_key_file: non_empty_var(KEY_FILE_ENV).map(PathBuf::from),
            build_flags: non_empty_var(BUILD_FLAGS_ENV).and_then(|v| v.into_string().ok()),
        }
    }
}

fn non_empty_var(name: &str) -> Option<OsString> {
    std::env::var_os(name).filter(|value| !value.is_empty())
}

/// Options given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub bin: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
    pub model: Option<String>,
    pub hw_rev: Option<String>,
    pub build_flags: Vec<String>,
}

/// Everything one signing run needs, resolved from all sources.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub firmware: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub keys: KeySources,
    pub skip_signing: bool,
    pub policy: TsaPolicy,
}

impl SigningConfig {
    /// Merge CLI options with build flags and the environment.
    ///
    /// Model and revision come from the CLI first, then the build flags.
    /// With build flags present the output defaults to `<bin>.signed`.
    pub fn assemble(cli: CliOptions, env: Environment) -> Self {
        let mut flags = BuildFlags::new(cli.build_flags);
        if let Some(list) = env.build_flags.as_deref() {
            flags.extend(BuildFlags::parse(list));
        }

        let output = cli.out.or_else(|| {
            if flags.is_empty() {
                return None;
            }
            cli.bin.as_ref().map(|bin| {
                let mut signed = bin.clone().into_os_string();
                signed.push(SIGNED_SUFFIX);
                PathBuf::from(signed)
            })
        });

        Self {
            output,
            model: cli.model.or_else(|| flags.hw_model().map(str::to_owned)),
            revision: cli.hw_rev.or_else(|| flags.hw_revision().map(str::to_owned)),
            keys: KeySources {
                environment: env.signing_key_file,
                build_flag: flags.signing_key_file().map(PathBuf::from),
                command_line: cli.private_key,
            },
            skip_signing: flags.skip_signing(),
            firmware: cli.bin,
            policy: TsaPolicy::default(),
        }
    }
}
