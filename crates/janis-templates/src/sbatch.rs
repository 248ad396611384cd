//! Construction of `sbatch` invocations for detached workflow supervisors.
//!
//! The command line built here is the entire contract with Slurm: the
//! supervisor command is embedded as a `--wrap` payload so that no batch
//! script needs to be written to disk.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context as _;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

/// The name of the Slurm submission program.
pub const SBATCH_PROGRAM: &str = "sbatch";

/// The prefix of every supervisor job name.
const JOB_NAME_PREFIX: &str = "janis-";

/// The name of the file Slurm writes the supervisor's stdout to.
const SLURM_STDOUT_FILE_NAME: &str = "slurm.stdout";

/// The name of the file Slurm writes the supervisor's stderr to.
const SLURM_STDERR_FILE_NAME: &str = "slurm.stderr";

/// A wall time limit as understood by `sbatch --time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallTime {
    /// A number of minutes, rendered as a bare integer.
    Minutes(u64),
    /// A `days-hours:minutes:seconds` duration.
    Days {
        /// The number of days.
        days: u64,
        /// The number of hours.
        hours: u8,
        /// The number of minutes.
        minutes: u8,
        /// The number of seconds.
        seconds: u8,
    },
}

impl WallTime {
    /// Creates a wall time of whole days.
    pub const fn days(days: u64) -> Self {
        Self::Days {
            days,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(minutes) => write!(f, "{minutes}"),
            Self::Days {
                days,
                hours,
                minutes,
                seconds,
            } => write!(f, "{days}-{hours:02}:{minutes:02}:{seconds:02}"),
        }
    }
}

/// The Slurm event that triggers a notification email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailType {
    /// Notify when the job ends.
    End,
}

impl fmt::Display for MailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, "END"),
        }
    }
}

/// A Slurm notification email request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailNotification {
    /// The address to notify.
    pub user: String,
    /// The event to notify on.
    pub mail_type: MailType,
}

/// How a tokenized command is flattened into a `--wrap` payload.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WrapStyle {
    /// Join the tokens with single spaces.
    ///
    /// This is lossy: a token containing whitespace or shell metacharacters
    /// is re-split (or interpreted) by the shell Slurm runs the payload
    /// with.
    #[default]
    Joined,
    /// Shell-quote each token before joining.
    Quoted,
}

/// The workflow supervisor command to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCommand {
    /// A command line that is already a shell string.
    Line(String),
    /// A tokenized command.
    Tokens(Vec<String>),
}

impl ResumeCommand {
    /// Flattens the command into a single shell string.
    pub fn flatten(&self, style: WrapStyle) -> Result<String> {
        match (self, style) {
            (Self::Line(line), _) => Ok(line.clone()),
            (Self::Tokens(tokens), WrapStyle::Joined) => Ok(tokens.join(" ")),
            (Self::Tokens(tokens), WrapStyle::Quoted) => {
                shlex::try_join(tokens.iter().map(String::as_str))
                    .context("failed to shell-quote the resume command")
            }
        }
    }
}

impl From<&str> for ResumeCommand {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for ResumeCommand {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for ResumeCommand {
    fn from(tokens: Vec<String>) -> Self {
        Self::Tokens(tokens)
    }
}

impl<S: Into<String>> FromIterator<S> for ResumeCommand {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::Tokens(iter.into_iter().map(Into::into).collect())
    }
}

/// An `sbatch` invocation that runs a workflow supervisor as a batch job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbatchCommand {
    /// The partition (`-p`) to submit to.
    pub partition: String,
    /// The job name (`-J`).
    pub job_name: String,
    /// The wall time limit (`--time`).
    pub time: WallTime,
    /// The path Slurm writes the job's stdout to (`-o`).
    pub stdout: PathBuf,
    /// The path Slurm writes the job's stderr to (`-e`).
    pub stderr: PathBuf,
    /// The notification email request (`--mail-user`, `--mail-type`).
    pub mail: Option<MailNotification>,
    /// The memory request in MB (`--mem`).
    pub memory_mb: Option<u64>,
    /// The shell command the job runs (`--wrap`).
    pub wrap: String,
}

impl SbatchCommand {
    /// Creates the invocation resuming workflow `wid`, logging into
    /// `logs_dir`.
    pub fn detached_resume(
        wid: &str,
        partition: impl Into<String>,
        time: WallTime,
        logs_dir: &Path,
        wrap: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            job_name: format!("{JOB_NAME_PREFIX}{wid}"),
            time,
            stdout: logs_dir.join(SLURM_STDOUT_FILE_NAME),
            stderr: logs_dir.join(SLURM_STDERR_FILE_NAME),
            mail: None,
            memory_mb: None,
            wrap: wrap.into(),
        }
    }

    /// Requests an email to `user` when the job ends.
    pub fn with_mail(mut self, user: impl Into<String>) -> Self {
        self.mail = Some(MailNotification {
            user: user.into(),
            mail_type: MailType::End,
        });
        self
    }

    /// Requests `memory_mb` of memory for the job.
    pub fn with_memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Gets the arguments passed to `sbatch`, excluding the program itself.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.partition.clone(),
            "-J".to_string(),
            self.job_name.clone(),
            "--time".to_string(),
            self.time.to_string(),
            "-o".to_string(),
            self.stdout.display().to_string(),
            "-e".to_string(),
            self.stderr.display().to_string(),
        ];

        if let Some(mail) = &self.mail {
            args.extend([
                "--mail-user".to_string(),
                mail.user.clone(),
                "--mail-type".to_string(),
                mail.mail_type.to_string(),
            ]);
        }

        if let Some(memory_mb) = self.memory_mb {
            args.extend(["--mem".to_string(), memory_mb.to_string()]);
        }

        args.extend(["--wrap".to_string(), self.wrap.clone()]);
        args
    }

    /// Gets the full argument vector, starting with `sbatch`.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(SBATCH_PROGRAM.to_string())
            .chain(self.args())
            .collect()
    }
}

impl fmt::Display for SbatchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.argv().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }

            match shlex::try_quote(arg) {
                Ok(quoted) => write!(f, "{quoted}")?,
                // Only reachable for arguments containing NUL
                Err(_) => write!(f, "{arg:?}")?,
            }
        }

        Ok(())
    }
}
