//! Execution of `sbatch` invocations.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;
use tracing::info;

use crate::sbatch::SBATCH_PROGRAM;
use crate::sbatch::SbatchCommand;

/// Matches the job identifier `sbatch` reports on success.
static SUBMITTED_JOB_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Submitted batch job (\d+)").expect("job id pattern should compile")
});

/// An error from submitting a job.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The submission program could not be started.
    #[error("failed to run `{program}`")]
    Spawn {
        /// The program that failed to start.
        program: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The submission program exited unsuccessfully.
    #[error(
        "couldn't submit the workflow supervisor, non-zero exit code ({exit}){detail}",
        exit = exit_code_text(.code),
        detail = stderr_detail(.stderr)
    )]
    NonZeroExit {
        /// The exit code, if the program was not terminated by a signal.
        code: Option<i32>,
        /// The captured stderr of the program.
        stderr: String,
    },
}

/// Formats an exit code for error messages.
fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Formats captured stderr as an error message suffix.
fn stderr_detail(stderr: &str) -> String {
    match stderr.trim() {
        "" => String::new(),
        trimmed => format!(": {trimmed}"),
    }
}

/// The result of a successful submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionOutput {
    /// The exit code of the submission program.
    pub exit_code: i32,
    /// The captured stdout, empty when output was not captured.
    pub stdout: String,
    /// The captured stderr, empty when output was not captured.
    pub stderr: String,
    /// The Slurm job identifier reported on stdout.
    pub job_id: Option<u64>,
}

/// Submits `sbatch` invocations.
#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    /// Submits the given invocation.
    ///
    /// When `capture_output` is set, the program's stdout and stderr are
    /// captured into the returned output rather than inherited.
    async fn submit(
        &self,
        command: &SbatchCommand,
        capture_output: bool,
    ) -> Result<SubmissionOutput, SubmitError>;
}

/// Submits invocations by running a local `sbatch`.
#[derive(Debug, Clone)]
pub struct SbatchSubmitter {
    /// The submission program to run in place of `sbatch`.
    program: PathBuf,
}

impl SbatchSubmitter {
    /// Creates a submitter running `sbatch` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(SBATCH_PROGRAM),
        }
    }

    /// Runs the given program in place of `sbatch`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Gets the program run in place of `sbatch`.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait::async_trait]
impl Submitter for SbatchSubmitter {
    async fn submit(
        &self,
        command: &SbatchCommand,
        capture_output: bool,
    ) -> Result<SubmissionOutput, SubmitError> {
        info!(%command, "starting command");

        let mut child = Command::new(&self.program);
        child.args(command.args()).stdin(Stdio::null());
        if capture_output {
            child.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            child.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let output = child.output().await.map_err(|source| SubmitError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(%stdout, %stderr, status = %output.status, "submission finished");

        if !output.status.success() {
            return Err(SubmitError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        let job_id = SUBMITTED_JOB_REGEX
            .captures(&stdout)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        if let Some(job_id) = job_id {
            info!(job_id, "submitted workflow supervisor");
        }

        Ok(SubmissionOutput {
            exit_code: output.status.code().unwrap_or_default(),
            stdout,
            stderr,
            job_id,
        })
    }
}
