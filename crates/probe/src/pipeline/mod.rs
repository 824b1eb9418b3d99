//! The Build Pipeline seam.
//!
//! A pipeline takes one compilation unit, a target profile and a
//! [`SearchContext`], and reports which libraries the unit ended up pulling
//! in. Two implementations ship with the crate:
//!
//! - [`IncludeScanPipeline`] follows `#include` directives in-process.
//! - [`CommandPipeline`] hands the request to an external program as JSON.

mod command;
mod scan;

pub use self::command::CommandPipeline;
pub use self::scan::IncludeScanPipeline;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait BuildPipeline {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs one build. A build that fails to *compile* is still `Ok`, with
    /// [`BuildStatus::Failed`]; `Err` means the pipeline itself couldn't run.
    async fn build(&self, request: &BuildRequest) -> Result<BuildReport>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub unit: PathBuf,
    /// Fully-qualified board name, e.g. `arduino:avr:uno`.
    pub target: String,
    pub search: SearchContext,
}

/// Everything a pipeline may search while resolving a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    pub hardware: Vec<PathBuf>,
    pub tools: Vec<PathBuf>,
    /// Libraries bundled with the IDE or a core. Searched after `other`.
    pub built_in: Vec<PathBuf>,
    /// Third-party library roots.
    pub other: Vec<PathBuf>,
    /// Extra lookup names for library folders: name → folder.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, PathBuf>,
}
impl SearchContext {
    /// Library roots in search order.
    pub fn library_roots(&self) -> impl Iterator<Item = &Path> {
        self.other.iter().chain(self.built_in.iter()).map(PathBuf::as_path)
    }

    /// Returns a copy of this context that also knows `folder` as `name`.
    ///
    /// The name must be usable as a single folder name: not empty, no path
    /// separators, not `.` or `..`.
    pub fn with_alias(&self, name: &str, folder: impl Into<PathBuf>) -> Result<Self> {
        let invalid = name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']);
        if invalid {
            exn::bail!(ErrorKind::InvalidAlias(name.to_string()));
        }
        let mut context = self.clone();
        context.aliases.insert(name.to_string(), folder.into());
        Ok(context)
    }

    /// Alias names pointing at `folder`.
    pub fn aliases_of<'a>(&'a self, folder: &'a Path) -> impl Iterator<Item = &'a str> + 'a {
        self.aliases.iter().filter(move |(_, f)| f.as_path() == folder).map(|(name, _)| name.as_str())
    }
}

/// A library the pipeline decided to compile in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportedLibrary {
    /// Canonical name.
    pub name: String,
    pub folder: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// On the wire: `"success"` or `{"failed": "<message>"}`.
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    #[serde(default)]
    pub imported: Vec<ImportedLibrary>,
    #[serde(default)]
    pub include_folders: Vec<PathBuf>,
    pub status: BuildStatus,
}
impl BuildReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, BuildStatus::Success)
    }
}
