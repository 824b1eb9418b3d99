//! Configuration loading and validation.
//!
//! Configuration is layered with [`figment`], lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A configuration file (TOML, YAML or JSON, chosen by extension). Either
//!    given explicitly, or `config.toml` in the platform config directory.
//! 3. Environment variables prefixed with `LIBPROBE_`; nested keys are split
//!    on a double underscore (`LIBPROBE_PROBE__TIMEOUT_SECS=60`).
//! 4. Command-line [`Overrides`].
//!
//! The merged result is validated by [`Config::validate`] before it's handed
//! back to the caller, so a [`Config`] returned by [`Loader::load`] always has
//! a catalog path and the mandatory folder parameters.

pub mod error;
mod load;

pub use crate::load::Loader;
use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the processed-cache lives when nothing else is configured. Relative
/// to the working directory.
pub const DEFAULT_PROCESSED_CACHE: &str = "cached_results.json";
/// Upper bound for a single Build Pipeline invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the catalog (`library_index.json`). Mandatory.
    pub catalog: Option<PathBuf>,
    /// Path to the processed-cache.
    pub processed_cache: PathBuf,
    /// Reprocess libraries even when the processed-cache says they're done.
    pub force: bool,
    /// Also probe every example program bundled with each library.
    pub examples: bool,
    /// Persist locally-provided dependencies into `bundledRequires`.
    pub record_bundled: bool,
    pub accumulation: AccumulationMode,
    pub folders: Folders,
    pub probe: ProbeConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: None,
            processed_cache: PathBuf::from(DEFAULT_PROCESSED_CACHE),
            force: false,
            examples: false,
            record_bundled: false,
            accumulation: AccumulationMode::default(),
            folders: Folders::default(),
            probe: ProbeConfig::default(),
        }
    }
}
impl Config {
    /// Ensures every parameter the run can't start without is present.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
            exn::bail!(ErrorKind::MissingParameter("catalog"));
        }
        if self.folders.hardware.is_empty() {
            exn::bail!(ErrorKind::MissingParameter("hardware"));
        }
        if self.folders.tools.is_empty() {
            exn::bail!(ErrorKind::MissingParameter("tools"));
        }
        // Dependencies are classified by whether they live under one of these.
        if self.folders.libraries.is_empty() {
            exn::bail!(ErrorKind::MissingParameter("libraries"));
        }
        if self.probe.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("probe timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Filesystem roots handed to the Build Pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Folders {
    /// Hardware (board/core definition) folders.
    pub hardware: Vec<PathBuf>,
    /// Toolchain folders.
    pub tools: Vec<PathBuf>,
    /// Libraries bundled with the IDE or a core. Low priority.
    pub built_in: Vec<PathBuf>,
    /// Third-party libraries, the ones distributed through the catalog.
    pub libraries: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
    pub pipeline: Pipeline,
}
impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_TIMEOUT_SECS, pipeline: Pipeline::default() }
    }
}
impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which Build Pipeline implementation drives the probes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Pipeline {
    /// Built-in include scanner.
    #[default]
    Scan,
    /// External program speaking JSON over stdin/stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// How discovered dependencies are shared between libraries within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationMode {
    /// Every library starts from an empty dependency set.
    #[default]
    Isolated,
    /// Dependencies of libraries finalized earlier in the run are folded into
    /// any library that imports them.
    Session,
}

/// Values supplied on the command-line. Anything left as `None` (or empty)
/// does not override lower-priority layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_cache: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_bundled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accumulation: Option<AccumulationMode>,
    pub folders: FolderOverrides,
    pub probe: ProbeOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderOverrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hardware: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub built_in: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Pipeline>,
}
