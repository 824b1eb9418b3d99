//! Probe compilation: find out what a library *really* depends on by
//! compiling a minimal program that includes it and watching what the build
//! pipeline pulls in.

pub mod alias;
mod consts;
pub mod error;
mod library;
pub mod pipeline;
mod probe;
pub mod unit;
mod walk;

pub use crate::library::{LibraryDir, PROPERTIES_FILE, list_libraries, parse_properties};
pub use crate::pipeline::{BuildPipeline, BuildReport, BuildRequest, BuildStatus, ImportedLibrary, SearchContext};
pub use crate::probe::{ProbeFailure, ProbeOutcome, ProbeStatus, Prober, TargetProfile};
pub use crate::walk::{EXAMPLE_EXTENSIONS, HEADER_EXTENSIONS, find_files};
use std::sync::Arc;

pub type PipelineHandle = Arc<dyn BuildPipeline + Send + Sync>;
