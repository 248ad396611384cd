//! Templates for the Peter MacCallum Cancer Centre.
//!
//! Workflow supervisors are submitted to the dedicated `janis` queue and
//! container images are built by a Slurm job of their own.

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::config::EmailFormat;
use crate::config::Queues;
use crate::config::TemplateConfig;
use crate::template::DetachedResubmission;
use crate::template::QueueResolution;
use crate::template::SlurmSingularityTemplate;
use crate::template::WallTimePolicy;

/// The queue workflow supervisors are submitted to.
pub const SUPERVISOR_QUEUE: &str = "janis";

/// The program used to deliver notification emails.
pub const MAIL_PROGRAM: &str = "sendmail -t";

/// The call caching method Cromwell uses on the shared file system.
pub const CALL_CACHING_METHOD: &str = "fingerprint";

/// The option keys left out of generated configuration skeletons.
pub const PETER_MAC_IGNORE_INIT_KEYS: &[&str] = &[
    "intermediate_execution_dir",
    "build_instructions",
    "container_dir",
    "singularity_version",
    "singularity_build_instructions",
    "max_cores",
    "max_ram",
    "can_run_in_foreground",
    "run_in_background",
    "janis_memory_mb",
];

/// The supervisor wall time (in minutes) of the login node template when
/// none is configured.
const WORKFLOW_TIME_FALLBACK: u64 = 14400;

/// The supervisor wall time (in minutes) of the disconnected template when
/// none is configured.
const DISCONNECTED_WORKFLOW_TIME_FALLBACK: u64 = 1440;

/// The default supervisor wall time (in minutes) of the disconnected
/// template.
const DISCONNECTED_MAX_WORKFLOW_TIME: u64 = 14400;

/// Gets the default container directory.
fn default_container_dir() -> PathBuf {
    PathBuf::from("/config/binaries/singularity/containers_devel/janis/")
}

/// Gets the default task queues.
fn default_queues() -> Queues {
    Queues::from("prod_med,prod")
}

/// Gets the default Singularity version.
fn default_singularity_version() -> Option<String> {
    Some("3.4.0".to_string())
}

/// Helper for serde boolean defaults.
fn default_true() -> bool {
    true
}

/// Gets the default core ceiling.
fn default_max_cores() -> u32 {
    40
}

/// Gets the default memory ceiling.
fn default_max_ram() -> u32 {
    256
}

/// Gets the default supervisor wall time of the login node template.
fn default_max_workflow_time() -> Option<u64> {
    Some(20100)
}

/// Gets the default supervisor wall time of the disconnected template.
fn default_disconnected_max_workflow_time() -> Option<u64> {
    Some(DISCONNECTED_MAX_WORKFLOW_TIME)
}

/// Gets the command pulling `${docker}` into the container directory.
fn pull_instructions(container_dir: &str) -> String {
    format!(
        "unset SINGULARITY_TMPDIR && docker_subbed=$(sed -e 's/[^A-Za-z0-9._-]/_/g' <<< \
         ${{docker}}) && image={container_dir}/$docker_subbed.sif && singularity pull $image \
         docker://${{docker}}"
    )
}

/// The options of the Peter Mac (login node) template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PeterMacOptions {
    /// The directory where computation takes place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_execution_dir: Option<PathBuf>,
    /// The directory Singularity containers are stored in.
    #[serde(default = "default_container_dir")]
    pub container_dir: PathBuf,
    /// The queues task jobs are submitted to.
    ///
    /// A list is joined with commas into a single Slurm partition list.
    #[serde(default = "default_queues")]
    pub queues: Queues,
    /// The version of Singularity to use on the cluster.
    #[serde(default = "default_singularity_version")]
    pub singularity_version: Option<String>,
    /// Whether Slurm sends job notifications to the configured email.
    #[serde(default)]
    pub send_job_emails: bool,
    /// Whether the task fails when Slurm kills its job.
    #[serde(default = "default_true")]
    pub catch_slurm_errors: bool,
    /// The shell command used to build a container image.
    ///
    /// When unset, images are pulled by a Slurm job on the task queues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singularity_build_instructions: Option<String>,
    /// The maximum number of cores a task can request.
    #[serde(default = "default_max_cores")]
    pub max_cores: u32,
    /// The maximum amount of memory (in GB) a task can request.
    #[serde(default = "default_max_ram")]
    pub max_ram: u32,
    /// The wall time (in minutes) of the submitted workflow supervisor.
    #[serde(default = "default_max_workflow_time")]
    pub max_workflow_time: Option<u64>,
    /// The memory (in MB) requested for the workflow supervisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub janis_memory_mb: Option<u64>,
    /// The format of status update emails (`molpath` or unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_format: Option<String>,
}

impl Default for PeterMacOptions {
    fn default() -> Self {
        Self {
            intermediate_execution_dir: None,
            container_dir: default_container_dir(),
            queues: default_queues(),
            singularity_version: default_singularity_version(),
            send_job_emails: false,
            catch_slurm_errors: true,
            singularity_build_instructions: None,
            max_cores: default_max_cores(),
            max_ram: default_max_ram(),
            max_workflow_time: default_max_workflow_time(),
            janis_memory_mb: None,
            email_format: None,
        }
    }
}

impl PeterMacOptions {
    /// Translates the options into a template configuration.
    fn into_config(self) -> Result<TemplateConfig> {
        let email_format = EmailFormat::parse_optional(self.email_format.as_deref())?;
        let queues = self.queues.joined(",");
        let build_instructions = match self.singularity_build_instructions {
            Some(instructions) if !instructions.is_empty() => instructions,
            _ => format!(
                "sbatch -p {queues} --wait --wrap '{pull}'",
                pull = pull_instructions(&self.container_dir.display().to_string())
            ),
        };

        let mut config = TemplateConfig::new(self.container_dir, queues, build_instructions);
        config.execution_dir = self.intermediate_execution_dir;
        config.singularity_version = self.singularity_version;
        config.send_job_emails = self.send_job_emails;
        config.catch_slurm_errors = self.catch_slurm_errors;
        config.max_cores = self.max_cores;
        config.max_ram = self.max_ram;
        config.max_workflow_time = self.max_workflow_time;
        config.janis_memory_mb = self.janis_memory_mb;
        config.email_format = email_format;
        config.mail_program = Some(MAIL_PROGRAM.to_string());
        config.can_run_in_foreground = false;
        config.run_in_background = Some(true);
        Ok(config)
    }
}

/// Creates the Peter Mac (login node) template.
///
/// Fails when the email format is not a supported format.
pub fn peter_mac(options: PeterMacOptions) -> Result<SlurmSingularityTemplate> {
    let resubmission = DetachedResubmission {
        include_mail: true,
        include_memory: true,
        ..DetachedResubmission::new(
            QueueResolution::Fixed(SUPERVISOR_QUEUE.to_string()),
            WallTimePolicy::Configured {
                fallback: WORKFLOW_TIME_FALLBACK,
            },
        )
    };

    Ok(
        SlurmSingularityTemplate::new(options.into_config()?, resubmission)?
            .with_call_caching_method(CALL_CACHING_METHOD),
    )
}

/// The options of the Peter Mac template for supervisors that resubmit
/// themselves when disconnected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PeterMacDisconnectedOptions {
    /// The directory where computation takes place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_dir: Option<PathBuf>,
    /// The queues task jobs are submitted to.
    #[serde(default = "default_queues")]
    pub queues: Queues,
    /// The directory Singularity containers are stored in.
    #[serde(default = "default_container_dir")]
    pub container_dir: PathBuf,
    /// The version of Singularity to use on the cluster.
    #[serde(default = "default_singularity_version")]
    pub singularity_version: Option<String>,
    /// Whether the task fails when Slurm kills its job.
    #[serde(default = "default_true")]
    pub catch_slurm_errors: bool,
    /// Whether Slurm sends job notifications to the configured email.
    #[serde(default)]
    pub send_slurm_emails: bool,
    /// The wall time (in minutes) of the submitted workflow supervisor.
    #[serde(rename = "max_workflow_time", default = "default_disconnected_max_workflow_time")]
    pub max_workflow_time: Option<u64>,
}

impl Default for PeterMacDisconnectedOptions {
    fn default() -> Self {
        Self {
            execution_dir: None,
            queues: default_queues(),
            container_dir: default_container_dir(),
            singularity_version: default_singularity_version(),
            catch_slurm_errors: true,
            send_slurm_emails: false,
            max_workflow_time: default_disconnected_max_workflow_time(),
        }
    }
}

/// Creates the Peter Mac template for supervisors that resubmit themselves
/// when disconnected.
///
/// Images are pulled directly rather than through a Slurm job, and the
/// supervisor job requests neither notification emails nor extra memory.
pub fn peter_mac_disconnected(
    options: PeterMacDisconnectedOptions,
) -> Result<SlurmSingularityTemplate> {
    let build_instructions = pull_instructions(&options.container_dir.display().to_string());
    let config = PeterMacOptions {
        intermediate_execution_dir: options.execution_dir,
        container_dir: options.container_dir,
        queues: options.queues,
        singularity_version: options.singularity_version,
        send_job_emails: options.send_slurm_emails,
        catch_slurm_errors: options.catch_slurm_errors,
        singularity_build_instructions: Some(build_instructions),
        max_workflow_time: options.max_workflow_time,
        ..Default::default()
    }
    .into_config()?;

    let resubmission = DetachedResubmission::new(
        QueueResolution::Fixed(SUPERVISOR_QUEUE.to_string()),
        WallTimePolicy::Configured {
            fallback: DISCONNECTED_WORKFLOW_TIME_FALLBACK,
        },
    );

    Ok(SlurmSingularityTemplate::new(config, resubmission)?
        .with_call_caching_method(CALL_CACHING_METHOD))
}
