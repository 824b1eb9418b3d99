pub mod checkpoint;
pub mod classify;
pub mod error;
pub mod examples;
mod installed;
pub mod run;
pub mod select;

pub use crate::checkpoint::{Checkpoint, FlushReason, Snapshot, drain};
pub use crate::classify::{Classifier, DependencyClassification};
pub use crate::examples::ExampleReport;
pub use crate::installed::{InstalledLibrary, Origin, discover};
pub use crate::run::{Context, LibraryReport, LibraryStatus, RunEvent, RunOptions, SkipReason, Skipped, Summary, run};
pub use crate::select::{ProfileTable, Selection};
