use crate::checkpoint::{Checkpoint, Snapshot};
use crate::classify::{Classifier, DependencyClassification};
use crate::examples::{ExampleReport, probe_examples};
use crate::installed::{InstalledLibrary, Origin, discover};
use crate::select::{ProfileTable, Selection};
use async_stream::stream;
use derive_more::Display;
use futures::Stream;
use libprobe_config::{AccumulationMode, Config};
use libprobe_probe::{ProbeFailure, ProbeStatus, Prober, alias};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::instrument;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub force: bool,
    pub examples: bool,
    pub record_bundled: bool,
    pub accumulation: AccumulationMode,
}
impl From<&Config> for RunOptions {
    fn from(config: &Config) -> Self {
        Self {
            force: config.force,
            examples: config.examples,
            record_bundled: config.record_bundled,
            accumulation: config.accumulation,
        }
    }
}

/// Everything a run needs besides the catalog itself.
pub struct Context {
    pub prober: Prober,
    pub profiles: ProfileTable,
    pub classifier: Classifier,
    pub options: RunOptions,
}
impl Context {
    pub fn new(prober: Prober, options: RunOptions) -> Self {
        let classifier = Classifier::new(&prober.search().other);
        Self { prober, profiles: ProfileTable::default(), classifier, options }
    }
}

/// Progress events emitted by [`run`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once.
/// 3. [`Skipped`](Self::Skipped) or [`Finalized`](Self::Finalized), once per
///    installed library that's in the catalog.
/// 4. [`Complete`](Self::Complete), exactly once.
#[derive(Debug)]
pub enum RunEvent {
    Started,
    DiscoveryComplete { installed: usize, catalogued: usize },
    Skipped(Skipped),
    /// A library has been probed and its catalog record updated.
    Finalized(Box<LibraryReport>),
    Complete(Summary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[display("already processed")]
    AlreadyProcessed,
    /// Same name and version installed in more than one root; the first wins.
    #[display("duplicate installation")]
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub version: String,
    pub folder: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum LibraryStatus {
    #[display("compiled")]
    Compiled,
    #[display("{_0}")]
    Failed(ProbeFailure),
    /// The probe unit could not be written, so nothing was compiled.
    #[display("not probed: {_0}")]
    Unprepared(String),
}

#[derive(Debug, Clone)]
pub struct LibraryReport {
    pub name: String,
    pub version: String,
    pub folder: PathBuf,
    pub origin: Origin,
    pub selection: Selection,
    pub status: LibraryStatus,
    pub dependencies: DependencyClassification,
    /// What was written to the catalog's `requires`.
    pub requires: Vec<String>,
    /// `None` unless examples are enabled.
    pub examples: Option<ExampleReport>,
}
impl LibraryReport {
    pub fn compiled(&self) -> bool {
        self.status == LibraryStatus::Compiled
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub installed: usize,
    /// Installed libraries with no matching catalog record.
    pub uncatalogued: usize,
    pub processed: usize,
    pub skipped: usize,
    /// Processed libraries whose own probe didn't compile.
    pub failed: usize,
    pub failed_examples: usize,
}

/// Probes every installed library that has a catalog record, publishing a
/// snapshot to `checkpoint` after each one.
///
/// The catalog and processed-cache are taken from the checkpoint's latest
/// snapshot. Once the stream has yielded [`RunEvent::Complete`], that snapshot
/// holds the final state; writing it is up to the caller
/// ([`Checkpoint::commit`]).
pub fn run<'a>(ctx: &'a Context, checkpoint: &'a Checkpoint) -> impl Stream<Item = RunEvent> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield RunEvent::Started;

        let Snapshot { mut catalog, mut processed } = (*checkpoint.latest()).clone();
        let installed = discover(ctx.prober.search());
        let mut summary = Summary { installed: installed.len(), ..Summary::default() };
        let mut matched: Vec<(usize, InstalledLibrary)> = Vec::new();
        for library in installed {
            match catalog.position(&library.name, &library.version) {
                Some(index) => matched.push((index, library)),
                None => {
                    tracing::debug!(library = %library.name, version = %library.version, "Not in catalog");
                    summary.uncatalogued += 1;
                },
            }
        }
        tracing::info!(installed = summary.installed, catalogued = matched.len(), "Discovery complete");
        yield RunEvent::DiscoveryComplete { installed: summary.installed, catalogued: matched.len() };

        let mut seen = HashSet::new();
        let mut memo: BTreeMap<String, DependencyClassification> = BTreeMap::new();
        for (index, library) in matched {
            let reason = match (seen.insert(index), processed.is_processed(&library.name)) {
                (false, _) => Some(SkipReason::Duplicate),
                (true, true) if !ctx.options.force => Some(SkipReason::AlreadyProcessed),
                _ => None,
            };
            if let Some(reason) = reason {
                tracing::debug!(library = %library.name, %reason, "Skipping library");
                summary.skipped += 1;
                yield RunEvent::Skipped(Skipped {
                    name: library.name.clone(),
                    version: library.version.clone(),
                    folder: library.folder.clone(),
                    reason,
                });
                continue;
            }

            let report = process(ctx, &library, &memo).await;
            if ctx.options.accumulation == AccumulationMode::Session {
                memo.insert(report.name.clone(), report.dependencies.clone());
            }
            let bundled = ctx.options.record_bundled.then(|| report.dependencies.bundled());
            catalog.set_requires(index, report.requires.clone(), bundled);
            processed.mark(library.name.as_str());
            checkpoint.publish(Snapshot { catalog: catalog.clone(), processed: processed.clone() });

            summary.processed += 1;
            summary.failed += usize::from(!report.compiled());
            summary.failed_examples += report.examples.as_ref().map_or(0, ExampleReport::failed);
            yield RunEvent::Finalized(Box::new(report));
        }

        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Run complete"
        );
        yield RunEvent::Complete(summary);
    })
}

#[instrument(skip_all, fields(library = %library.name, version = %library.version))]
async fn process(
    ctx: &Context,
    library: &InstalledLibrary,
    memo: &BTreeMap<String, DependencyClassification>,
) -> LibraryReport {
    let selection = ctx.profiles.select(&library.name, &library.architectures);
    tracing::info!(profile = %selection.profile, rule = selection.rule, "Probing library");
    // Scoped to this library: its own probe and its examples.
    let search = alias::resolve(ctx.prober.search(), library);

    let (status, mut dependencies) = match ctx.prober.probe_library(library, &selection.profile, &search).await {
        Ok(outcome) => {
            let status = match outcome.status {
                ProbeStatus::Compiled => LibraryStatus::Compiled,
                ProbeStatus::Failed(ref failure) => LibraryStatus::Failed(failure.clone()),
            };
            (status, ctx.classifier.classify(&library.name, &outcome.imported))
        },
        Err(e) => {
            tracing::warn!(error = ?e, "Could not prepare probe");
            (LibraryStatus::Unprepared(e.to_string()), DependencyClassification::default())
        },
    };
    if let LibraryStatus::Failed(failure) = &status {
        tracing::warn!(%failure, "Library probe failed");
    }

    let examples = match ctx.options.examples {
        true => Some(
            probe_examples(&ctx.prober, &ctx.classifier, library, &selection.profile, &search, &mut dependencies).await,
        ),
        false => None,
    };

    if ctx.options.accumulation == AccumulationMode::Session {
        let direct: Vec<String> = dependencies.external.iter().chain(dependencies.local.iter()).cloned().collect();
        for name in direct {
            if let Some(known) = memo.get(&name) {
                dependencies.merge(known);
            }
        }
    }
    dependencies.remove(&library.name);

    LibraryReport {
        name: library.name.clone(),
        version: library.version.clone(),
        folder: library.folder.clone(),
        origin: library.origin,
        selection,
        status,
        requires: dependencies.requires(),
        dependencies,
        examples,
    }
}
