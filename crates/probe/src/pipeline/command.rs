use super::{BuildPipeline, BuildReport, BuildRequest, BuildStatus};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Delegates builds to an external program.
///
/// The program receives the [`BuildRequest`] as JSON on stdin and must print a
/// [`BuildReport`] as JSON on stdout. Anything it writes to stderr is logged.
/// If it exits unsuccessfully without printing a report, the build is
/// considered failed rather than the pipeline broken.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: PathBuf,
    args: Vec<String>,
}
impl CommandPipeline {
    /// Locates `program` on the `PATH` (or uses it directly if it's a path).
    pub fn new(program: &str, args: Vec<String>) -> Result<Self> {
        let Ok(program) = which::which(program) else {
            exn::bail!(ErrorKind::ProgramNotFound(program.to_string()));
        };
        tracing::debug!(program = %program.display(), "Found build pipeline program");
        Ok(Self { program, args })
    }
}

#[async_trait]
impl BuildPipeline for CommandPipeline {
    fn name(&self) -> &str {
        "command"
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let input = serde_json::to_vec(request).or_raise(|| ErrorKind::Pipeline)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropped on timeout; don't leave a compiler running behind us.
            .kill_on_drop(true)
            .spawn()
            .or_raise(|| ErrorKind::Pipeline)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.or_raise(|| ErrorKind::Pipeline)?;
            stdin.shutdown().await.or_raise(|| ErrorKind::Pipeline)?;
        }
        let output = child.wait_with_output().await.or_raise(|| ErrorKind::Pipeline)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim(), "Build pipeline diagnostics");
        }
        match serde_json::from_slice::<BuildReport>(&output.stdout) {
            Ok(report) => Ok(report),
            Err(_) if !output.status.success() => {
                let message = match stderr.trim() {
                    "" => format!("{} exited with {}", self.program.display(), output.status),
                    diagnostics => diagnostics.to_string(),
                };
                Ok(BuildReport {
                    imported: Vec::new(),
                    include_folders: Vec::new(),
                    status: BuildStatus::Failed(message),
                })
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::InvalidReport),
        }
    }
}
