//! Templates for the Pawsey Supercomputing Centre.
//!
//! Workflow supervisors cannot run for longer than four days on Pawsey's
//! queues; a supervisor that hits this limit must be resubmitted.

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::config::Queues;
use crate::config::TemplateConfig;
use crate::sbatch::WallTime;
use crate::template::DetachedResubmission;
use crate::template::QueueResolution;
use crate::template::SlurmSingularityTemplate;
use crate::template::WallTimePolicy;

/// The wall time of a workflow supervisor submitted on Pawsey.
pub const SUBMISSION_LENGTH: WallTime = WallTime::days(4);

/// The options of the Pawsey templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PawseyOptions {
    /// The directory where Singularity containers are saved and run from.
    pub container_dir: PathBuf,
    /// The directory where execution takes place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_dir: Option<PathBuf>,
    /// The queues task jobs are submitted to.
    #[serde(default = "default_queues")]
    pub queues: Queues,
    /// The version of Singularity to load.
    #[serde(default = "default_singularity_version")]
    pub singularity_version: Option<String>,
    /// Whether Slurm errors (e.g. out of memory, wall time) fail the task.
    #[serde(default = "default_true")]
    pub catch_slurm_errors: bool,
    /// Whether Slurm sends job notification emails.
    #[serde(default = "default_true")]
    pub send_slurm_emails: bool,
    /// The shell command used to build a container image.
    #[serde(default = "default_build_instructions")]
    pub singularity_build_instructions: String,
    /// The maximum number of cores a task can request.
    #[serde(rename = "max_cores", default = "default_max_cores")]
    pub max_cores: u32,
    /// The maximum amount of memory (in GB) a task can request.
    #[serde(rename = "max_ram", default = "default_max_ram")]
    pub max_ram: u32,
}

/// Gets the default Pawsey task queues.
fn default_queues() -> Queues {
    Queues::from("workq")
}

/// Gets the default Pawsey supervisor queue.
fn default_submission_queue() -> String {
    "longq".to_string()
}

/// Gets the default Pawsey Singularity version.
fn default_singularity_version() -> Option<String> {
    Some("3.3.0".to_string())
}

/// Helper for serde boolean defaults.
fn default_true() -> bool {
    true
}

/// Gets the default Pawsey build instructions.
fn default_build_instructions() -> String {
    "singularity pull $image docker://${docker}".to_string()
}

/// Gets the default Pawsey core ceiling.
fn default_max_cores() -> u32 {
    28
}

/// Gets the default Pawsey memory ceiling.
fn default_max_ram() -> u32 {
    128
}

impl PawseyOptions {
    /// Creates the options with the given container directory and defaults
    /// for everything else.
    pub fn new(container_dir: impl Into<PathBuf>) -> Self {
        Self {
            container_dir: container_dir.into(),
            execution_dir: None,
            queues: default_queues(),
            singularity_version: default_singularity_version(),
            catch_slurm_errors: true,
            send_slurm_emails: true,
            singularity_build_instructions: default_build_instructions(),
            max_cores: default_max_cores(),
            max_ram: default_max_ram(),
        }
    }

    /// Translates the options into a template configuration.
    fn into_config(self) -> TemplateConfig {
        let mut config = TemplateConfig::new(
            self.container_dir,
            self.queues,
            self.singularity_build_instructions,
        );
        config.execution_dir = self.execution_dir;
        config.singularity_version = self.singularity_version;
        config.catch_slurm_errors = self.catch_slurm_errors;
        config.send_job_emails = self.send_slurm_emails;
        config.max_cores = self.max_cores;
        config.max_ram = self.max_ram;
        config
    }
}

/// Creates the Pawsey template.
///
/// Workflow supervisors are submitted to the configured queues.
pub fn pawsey(options: PawseyOptions) -> Result<SlurmSingularityTemplate> {
    SlurmSingularityTemplate::new(
        options.into_config(),
        DetachedResubmission::new(
            QueueResolution::Configured,
            WallTimePolicy::Fixed(SUBMISSION_LENGTH),
        ),
    )
}

/// The options of the disconnected Pawsey template.
///
/// These are the [`PawseyOptions`] plus the queue the workflow supervisor is
/// submitted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PawseyDisconnectedOptions {
    /// The directory where Singularity containers are saved and run from.
    pub container_dir: PathBuf,
    /// The directory where execution takes place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_dir: Option<PathBuf>,
    /// The queues task jobs are submitted to.
    #[serde(default = "default_queues")]
    pub queues: Queues,
    /// The queue the workflow supervisor is submitted to.
    ///
    /// An empty queue falls back to the configured queues.
    #[serde(default = "default_submission_queue")]
    pub submission_queue: String,
    /// The version of Singularity to load.
    #[serde(default = "default_singularity_version")]
    pub singularity_version: Option<String>,
    /// Whether Slurm errors (e.g. out of memory, wall time) fail the task.
    #[serde(default = "default_true")]
    pub catch_slurm_errors: bool,
    /// Whether Slurm sends job notification emails.
    #[serde(default = "default_true")]
    pub send_slurm_emails: bool,
    /// The shell command used to build a container image.
    #[serde(default = "default_build_instructions")]
    pub singularity_build_instructions: String,
    /// The maximum number of cores a task can request.
    #[serde(rename = "max_cores", default = "default_max_cores")]
    pub max_cores: u32,
    /// The maximum amount of memory (in GB) a task can request.
    #[serde(rename = "max_ram", default = "default_max_ram")]
    pub max_ram: u32,
}

impl PawseyDisconnectedOptions {
    /// Creates the options with the given container directory and defaults
    /// for everything else.
    pub fn new(container_dir: impl Into<PathBuf>) -> Self {
        Self::from_options(PawseyOptions::new(container_dir), default_submission_queue())
    }

    /// Creates the options from the cluster template options and a
    /// submission queue.
    pub fn from_options(options: PawseyOptions, submission_queue: impl Into<String>) -> Self {
        Self {
            container_dir: options.container_dir,
            execution_dir: options.execution_dir,
            queues: options.queues,
            submission_queue: submission_queue.into(),
            singularity_version: options.singularity_version,
            catch_slurm_errors: options.catch_slurm_errors,
            send_slurm_emails: options.send_slurm_emails,
            singularity_build_instructions: options.singularity_build_instructions,
            max_cores: options.max_cores,
            max_ram: options.max_ram,
        }
    }

    /// Splits the options into the cluster template options and the
    /// submission queue.
    fn into_parts(self) -> (PawseyOptions, String) {
        let options = PawseyOptions {
            container_dir: self.container_dir,
            execution_dir: self.execution_dir,
            queues: self.queues,
            singularity_version: self.singularity_version,
            catch_slurm_errors: self.catch_slurm_errors,
            send_slurm_emails: self.send_slurm_emails,
            singularity_build_instructions: self.singularity_build_instructions,
            max_cores: self.max_cores,
            max_ram: self.max_ram,
        };
        (options, self.submission_queue)
    }
}

/// Creates the Pawsey template for supervisors that resubmit themselves
/// when disconnected.
///
/// Workflow supervisors are submitted to the submission queue.
pub fn pawsey_disconnected(
    options: PawseyDisconnectedOptions,
) -> Result<SlurmSingularityTemplate> {
    let (options, submission_queue) = options.into_parts();
    let queue = match submission_queue.trim() {
        "" => QueueResolution::Configured,
        queue => QueueResolution::Override(queue.to_string()),
    };

    SlurmSingularityTemplate::new(
        options.into_config(),
        DetachedResubmission::new(queue, WallTimePolicy::Fixed(SUBMISSION_LENGTH)),
    )
}
