use clap::{ArgAction, Parser, ValueEnum};
use libprobe_config::{AccumulationMode, FolderOverrides, Overrides, Pipeline, ProbeOverrides};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "libprobe", version, about = "Discover library dependencies by compiling probe programs")]
pub struct Args {
    /// Catalog to update (`library_index.json`)
    #[arg(long = "json", value_name = "FILE")]
    pub catalog: Option<PathBuf>,
    /// Record of libraries already processed [default: cached_results.json]
    #[arg(long, value_name = "FILE")]
    pub processed_cache: Option<PathBuf>,
    /// Reprocess libraries even if already processed
    #[arg(long)]
    pub force: bool,
    /// Also compile every example bundled with each library
    #[arg(long)]
    pub examples: bool,
    /// Hardware folders (comma or path-list separated, repeatable)
    #[arg(long, value_name = "FOLDERS")]
    pub hardware: Vec<String>,
    /// Toolchain folders (comma or path-list separated, repeatable)
    #[arg(long, value_name = "FOLDERS")]
    pub tools: Vec<String>,
    /// Libraries bundled with the IDE or cores (comma or path-list separated, repeatable)
    #[arg(long, value_name = "FOLDERS")]
    pub built_in_libraries: Vec<String>,
    /// Third-party library folders (comma or path-list separated, repeatable)
    #[arg(long, value_name = "FOLDERS")]
    pub libraries: Vec<String>,
    /// Give up on a single probe after this long [default: 300]
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
    /// Build pipeline implementation
    #[arg(long, value_enum, requires_if("command", "pipeline_program"))]
    pub pipeline: Option<PipelineKind>,
    /// Program to run for the `command` pipeline
    #[arg(long, value_name = "PROGRAM")]
    pub pipeline_program: Option<String>,
    /// Argument passed to the pipeline program (repeatable)
    #[arg(long = "pipeline-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub pipeline_args: Vec<String>,
    /// Whether dependencies of earlier libraries carry over to later ones
    #[arg(long, value_enum)]
    pub accumulation: Option<Accumulation>,
    /// Also write locally-provided dependencies to `bundledRequires`
    #[arg(long)]
    pub record_bundled: bool,
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// More logging (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Log format
    #[arg(long, value_enum, default_value_t = Logger::Human)]
    pub logger: Logger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PipelineKind {
    Scan,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Accumulation {
    Isolated,
    Session,
}
impl From<Accumulation> for AccumulationMode {
    fn from(value: Accumulation) -> Self {
        match value {
            Accumulation::Isolated => Self::Isolated,
            Accumulation::Session => Self::Session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Logger {
    /// Human-readable
    Human,
    /// JSON lines
    Machine,
}

impl Args {
    /// Everything given on the command-line, as a configuration layer. Flags
    /// that weren't given leave lower layers alone.
    pub fn overrides(&self) -> Overrides {
        let pipeline = match (self.pipeline, &self.pipeline_program) {
            (Some(PipelineKind::Scan), _) => Some(Pipeline::Scan),
            // A program on its own implies the command pipeline.
            (Some(PipelineKind::Command) | None, Some(program)) => {
                Some(Pipeline::Command { program: program.clone(), args: self.pipeline_args.clone() })
            },
            (Some(PipelineKind::Command) | None, None) => None,
        };
        Overrides {
            catalog: self.catalog.clone(),
            processed_cache: self.processed_cache.clone(),
            force: self.force.then_some(true),
            examples: self.examples.then_some(true),
            record_bundled: self.record_bundled.then_some(true),
            accumulation: self.accumulation.map(AccumulationMode::from),
            folders: FolderOverrides {
                hardware: split_folders(&self.hardware),
                tools: split_folders(&self.tools),
                built_in: split_folders(&self.built_in_libraries),
                libraries: split_folders(&self.libraries),
            },
            probe: ProbeOverrides { timeout_secs: self.timeout, pipeline },
        }
    }
}

/// Splits folder arguments on commas and on the platform's path-list
/// separator. Empty entries are dropped.
pub fn split_folders(values: &[String]) -> Vec<PathBuf> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .flat_map(|part| env::split_paths(part).collect::<Vec<_>>())
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}
