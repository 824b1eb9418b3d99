use crate::classify::{Classifier, DependencyClassification};
use libprobe_probe::{EXAMPLE_EXTENSIONS, LibraryDir, Prober, SearchContext, TargetProfile, find_files};
use tracing::instrument;

pub const EXAMPLES_FOLDER: &str = "examples";

/// Result of probing a library's bundled examples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleReport {
    pub probed: usize,
    /// One message per example that didn't compile.
    pub errors: Vec<String>,
}
impl ExampleReport {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Probes every example program of `library` with the library's own target
/// profile and search context, adding whatever they import to
/// `classification`. A failing example is noted in the report; it never
/// removes anything already discovered.
#[instrument(skip_all, fields(library = %library.name, target = %target))]
pub async fn probe_examples(
    prober: &Prober,
    classifier: &Classifier,
    library: &LibraryDir,
    target: &TargetProfile,
    search: &SearchContext,
    classification: &mut DependencyClassification,
) -> ExampleReport {
    let folder = library.folder.join(EXAMPLES_FOLDER);
    let examples = match find_files(&folder, EXAMPLE_EXTENSIONS, true) {
        Ok(examples) => examples,
        Err(e) => {
            tracing::warn!(folder = %folder.display(), error = ?e, "Could not list examples");
            return ExampleReport { probed: 0, errors: vec![format!("{}: {}", folder.display(), *e)] };
        },
    };
    let mut report = ExampleReport::default();
    for example in examples {
        let outcome = prober.probe_unit(&example, target, search).await;
        report.probed += 1;
        classification.merge(&classifier.classify(&library.name, &outcome.imported));
        if let Some(failure) = outcome.failure() {
            let name = example.strip_prefix(&folder).unwrap_or(&example);
            tracing::debug!(example = %name.display(), %failure, "Example failed");
            report.errors.push(format!("{}: {failure}", name.display()));
        }
    }
    tracing::debug!(probed = report.probed, failed = report.failed(), "Examples probed");
    report
}
