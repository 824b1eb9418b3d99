use crate::PipelineHandle;
use crate::error::Result;
use crate::library::LibraryDir;
use crate::pipeline::{BuildRequest, BuildStatus, ImportedLibrary, SearchContext};
use crate::unit::Unit;
use derive_more::Display;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Fully-qualified board name a probe compiles for, e.g. `arduino:avr:uno`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct TargetProfile(String);
impl TargetProfile {
    pub fn new(fqbn: impl Into<String>) -> Self {
        Self(fqbn.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ProbeFailure {
    #[display("compilation failed: {_0}")]
    CompileFailed(String),
    #[display("timed out after {}s", _0.as_secs())]
    TimedOut(Duration),
    #[display("build pipeline error: {_0}")]
    PipelineError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Compiled,
    Failed(ProbeFailure),
}

/// What one probe observed. Libraries the pipeline imported before a failure
/// are kept.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub target: TargetProfile,
    pub unit: PathBuf,
    /// Headers the unit included. Empty for example probes.
    pub headers: Vec<PathBuf>,
    /// In the order the pipeline imported them, without duplicates.
    pub imported: Vec<ImportedLibrary>,
    pub include_folders: Vec<PathBuf>,
    pub status: ProbeStatus,
    pub elapsed: Duration,
}
impl ProbeOutcome {
    pub fn compiled(&self) -> bool {
        self.status == ProbeStatus::Compiled
    }

    pub fn failure(&self) -> Option<&ProbeFailure> {
        match &self.status {
            ProbeStatus::Compiled => None,
            ProbeStatus::Failed(failure) => Some(failure),
        }
    }
}

/// Runs probes, one at a time, against a [`BuildPipeline`](crate::BuildPipeline).
#[derive(Clone)]
pub struct Prober {
    pipeline: PipelineHandle,
    search: SearchContext,
    timeout: Duration,
}
impl Prober {
    pub fn new(pipeline: PipelineHandle, search: SearchContext, timeout: Duration) -> Self {
        Self { pipeline, search, timeout }
    }

    /// The context every probe starts from, before aliasing.
    pub fn search(&self) -> &SearchContext {
        &self.search
    }

    /// Builds a synthetic unit for `library` and probes it. `Err` means the
    /// unit couldn't be prepared; a failing build is reported in the outcome.
    #[instrument(skip_all, fields(library = %library.name, target = %target))]
    pub async fn probe_library(
        &self,
        library: &LibraryDir,
        target: &TargetProfile,
        search: &SearchContext,
    ) -> Result<ProbeOutcome> {
        // Dropped on return, taking its temporary directory with it.
        let unit = Unit::for_library(&library.name, &library.folder)?;
        tracing::debug!(unit = %unit.path().display(), headers = unit.headers().len(), "Probe unit written");
        let mut outcome = self.probe_unit(unit.path(), target, search).await;
        outcome.headers = unit.headers().to_vec();
        Ok(outcome)
    }

    /// Probes an existing unit, such as a bundled example program.
    #[instrument(skip_all, fields(unit = %unit.display(), target = %target))]
    pub async fn probe_unit(&self, unit: &Path, target: &TargetProfile, search: &SearchContext) -> ProbeOutcome {
        let request = BuildRequest { unit: unit.to_path_buf(), target: target.to_string(), search: search.clone() };
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.pipeline.build(&request)).await;
        let (imported, include_folders, status) = match result {
            Ok(Ok(report)) => {
                let status = match report.status {
                    BuildStatus::Success => ProbeStatus::Compiled,
                    BuildStatus::Failed(message) => ProbeStatus::Failed(ProbeFailure::CompileFailed(message)),
                };
                (report.imported, report.include_folders, status)
            },
            Ok(Err(e)) => {
                tracing::warn!(pipeline = self.pipeline.name(), error = ?e, "Build pipeline error");
                (Vec::new(), Vec::new(), ProbeStatus::Failed(ProbeFailure::PipelineError(e.to_string())))
            },
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Probe timed out");
                (Vec::new(), Vec::new(), ProbeStatus::Failed(ProbeFailure::TimedOut(self.timeout)))
            },
        };
        let mut seen = HashSet::new();
        let imported: Vec<_> = imported.into_iter().filter(|lib| seen.insert(lib.folder.clone())).collect();
        let elapsed = started.elapsed();
        tracing::debug!(imported = imported.len(), elapsed_ms = elapsed.as_millis() as u64, "Probe finished");
        ProbeOutcome {
            target: target.clone(),
            unit: unit.to_path_buf(),
            headers: Vec::new(),
            imported,
            include_folders,
            status,
            elapsed,
        }
    }
}
