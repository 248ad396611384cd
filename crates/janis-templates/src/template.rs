//! The generic Slurm + Singularity template.
//!
//! Site templates do not subclass this type; they construct it with a
//! [`TemplateConfig`] and the strategies that differ between sites
//! ([`QueueResolution`], [`WallTimePolicy`] and the email format).

use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Context as _;
use anyhow::Result;
use anyhow::anyhow;
use regex::Regex;
use tracing::debug;
use tracing::warn;

use crate::config::EmailFormat;
use crate::config::JanisConfiguration;
use crate::config::NotificationConfig;
use crate::config::Queues;
use crate::config::TemplateConfig;
use crate::email;
use crate::sbatch::ResumeCommand;
use crate::sbatch::SbatchCommand;
use crate::sbatch::WallTime;
use crate::sbatch::WrapStyle;
use crate::status::SubmissionModel;
use crate::status::TaskStatus;
use crate::submit::SubmissionOutput;
use crate::submit::Submitter;

/// Matches characters that cannot appear in a container image file name.
static IMAGE_NAME_INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9._-]").expect("image name pattern should compile")
});

/// The separator used when a queue list is passed to `sbatch -p` for the
/// workflow supervisor.
const SUBMISSION_QUEUE_SEPARATOR: &str = ", ";

/// How the queue of the workflow supervisor job is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueResolution {
    /// Use the template's configured queues.
    Configured,
    /// Use an explicit submission queue instead of the configured queues.
    Override(String),
    /// Use a queue dedicated to workflow supervisors.
    Fixed(String),
}

impl QueueResolution {
    /// Resolves the supervisor queue given the configured queues.
    pub fn resolve(&self, queues: &Queues) -> String {
        match self {
            Self::Configured => queues.joined(SUBMISSION_QUEUE_SEPARATOR),
            Self::Override(queue) | Self::Fixed(queue) => queue.clone(),
        }
    }
}

/// How the wall time of the workflow supervisor job is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallTimePolicy {
    /// Always use the given wall time.
    Fixed(WallTime),
    /// Use the configured maximum workflow time, in minutes.
    Configured {
        /// The minutes used when no (or a zero) maximum is configured.
        fallback: u64,
    },
}

impl WallTimePolicy {
    /// Resolves the supervisor wall time given the configured maximum.
    pub fn resolve(&self, max_workflow_time: Option<u64>) -> WallTime {
        match self {
            Self::Fixed(time) => *time,
            Self::Configured { fallback } => WallTime::Minutes(
                max_workflow_time
                    .filter(|minutes| *minutes > 0)
                    .unwrap_or(*fallback),
            ),
        }
    }
}

/// How a template resubmits its workflow supervisor as a detached job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedResubmission {
    /// The queue strategy.
    pub queue: QueueResolution,
    /// The wall time strategy.
    pub wall_time: WallTimePolicy,
    /// Whether the job may request a notification email.
    pub include_mail: bool,
    /// Whether the job may request the configured memory override.
    pub include_memory: bool,
    /// How a tokenized command is flattened into the `--wrap` payload.
    pub wrap_style: WrapStyle,
}

impl DetachedResubmission {
    /// Creates a strategy with no mail or memory blocks.
    pub fn new(queue: QueueResolution, wall_time: WallTimePolicy) -> Self {
        Self {
            queue,
            wall_time,
            include_mail: false,
            include_memory: false,
            wrap_style: WrapStyle::default(),
        }
    }
}

/// A Slurm + Singularity submission template.
#[derive(Debug, Clone)]
pub struct SlurmSingularityTemplate {
    /// The normalized template configuration.
    config: TemplateConfig,
    /// The detached resubmission strategy.
    resubmission: DetachedResubmission,
    /// The Cromwell call caching method applied when none is configured.
    call_caching_method: Option<String>,
}

impl SlurmSingularityTemplate {
    /// Creates a new template, validating its configuration.
    pub fn new(config: TemplateConfig, resubmission: DetachedResubmission) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            resubmission,
            call_caching_method: None,
        })
    }

    /// Sets the call caching method applied by
    /// [`post_configuration_hook`][Self::post_configuration_hook].
    pub fn with_call_caching_method(mut self, method: impl Into<String>) -> Self {
        self.call_caching_method = Some(method.into());
        self
    }

    /// Sets how tokenized resume commands are flattened.
    pub fn with_wrap_style(mut self, wrap_style: WrapStyle) -> Self {
        self.resubmission.wrap_style = wrap_style;
        self
    }

    /// Gets the template configuration.
    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Gets the detached resubmission strategy.
    pub fn resubmission(&self) -> &DetachedResubmission {
        &self.resubmission
    }

    /// Gets the shell instruction that loads Singularity.
    pub fn singularity_load_instructions(&self) -> String {
        self.config.singularity_load_instructions()
    }

    /// Gets the queue the workflow supervisor is submitted to.
    pub fn submission_queue(&self) -> String {
        self.resubmission.queue.resolve(&self.config.queues)
    }

    /// Builds the `sbatch` invocation that resumes workflow `wid` as a
    /// detached job.
    ///
    /// The mail block is added only when the template sends job emails and
    /// `notifications` carries a non-empty address; the memory block only
    /// when a memory override is configured.
    pub fn detached_resume_command(
        &self,
        wid: &str,
        command: &ResumeCommand,
        logs_dir: &Path,
        notifications: Option<&NotificationConfig>,
    ) -> Result<SbatchCommand> {
        let wrap = command.flatten(self.resubmission.wrap_style)?;
        let mut sbatch = SbatchCommand::detached_resume(
            wid,
            self.submission_queue(),
            self.resubmission
                .wall_time
                .resolve(self.config.max_workflow_time),
            logs_dir,
            wrap,
        );

        if self.resubmission.include_mail
            && self.config.send_job_emails
            && let Some(email) = notifications.and_then(NotificationConfig::email)
        {
            sbatch = sbatch.with_mail(email);
        }

        if self.resubmission.include_memory
            && let Some(memory_mb) = self.config.janis_memory_mb.filter(|mb| *mb > 0)
        {
            sbatch = sbatch.with_memory_mb(memory_mb);
        }

        debug!(%sbatch, "built detached resume command");
        Ok(sbatch)
    }

    /// Resubmits workflow `wid` as a detached job.
    ///
    /// The output of `sbatch` is captured; submission errors are returned
    /// as-is.
    pub async fn submit_detached_resume(
        &self,
        wid: &str,
        command: &ResumeCommand,
        logs_dir: &Path,
        notifications: Option<&NotificationConfig>,
        submitter: &dyn Submitter,
    ) -> Result<SubmissionOutput> {
        let sbatch = self.detached_resume_command(wid, command, logs_dir, notifications)?;
        Ok(submitter.submit(&sbatch, true).await?)
    }

    /// Prepares the status update email for the template's email format.
    pub fn prepare_status_update_email(
        &self,
        status: TaskStatus,
        metadata: &SubmissionModel,
    ) -> String {
        match self.config.email_format {
            Some(EmailFormat::Molpath) => {
                email::prepare_molpath_status_update_email(status, metadata)
            }
            None => email::prepare_default_status_update_email(status, metadata),
        }
    }

    /// Applies the template's settings to the assistant configuration.
    ///
    /// Values already present in the configuration are kept, except for
    /// `run_in_background` which the template forces when it sets one.
    pub fn post_configuration_hook(&self, configuration: &mut JanisConfiguration) {
        if configuration.notifications.mail_program.is_none() {
            configuration.notifications.mail_program = self.config.mail_program.clone();
        }

        if let Some(run_in_background) = self.config.run_in_background {
            configuration.run_in_background = Some(run_in_background);
        }

        if configuration.cromwell.call_caching_method.is_none() {
            configuration.cromwell.call_caching_method = self.call_caching_method.clone();
        }
    }

    /// Gets the path of the `.sif` image built for a Docker container.
    pub fn container_image_path(&self, docker: &str) -> PathBuf {
        let name = IMAGE_NAME_INVALID_CHARS.replace_all(docker, "_");
        self.config.container_dir.join(format!("{name}.sif"))
    }

    /// Generates a Bash script that builds the image for a Docker container
    /// with the template's build instructions.
    pub fn container_build_script(&self, docker: &str) -> Result<String> {
        let image = self.container_image_path(docker);
        let image = image
            .to_str()
            .ok_or_else(|| anyhow!("container image path `{}` is not UTF-8", image.display()))?;

        let quote = |value: &str| {
            shlex::try_quote(value)
                .map(|q| q.into_owned())
                .with_context(|| format!("failed to quote `{value}` for the build script"))
        };

        let mut script = String::new();
        writeln!(&mut script, "#!/usr/bin/env bash")?;
        writeln!(&mut script, "set -e")?;
        writeln!(&mut script, "{}", self.singularity_load_instructions())?;
        writeln!(&mut script, "docker={}", quote(docker)?)?;
        writeln!(&mut script, "image={}", quote(image)?)?;
        writeln!(&mut script, "{}", self.config.build_instructions)?;
        Ok(script)
    }

    /// Constrains a task's resource request to the template's ceilings.
    ///
    /// Returns the CPU count and memory (in GB) to request.
    pub fn constrain_resources(&self, cpu: u32, ram_gb: u32) -> (u32, u32) {
        let mut constrained = (cpu, ram_gb);

        if cpu > self.config.max_cores {
            warn!(
                "task requires at least {cpu} CPU{s}, but the template has a maximum of {max}",
                s = if cpu == 1 { "" } else { "s" },
                max = self.config.max_cores
            );
            constrained.0 = self.config.max_cores;
        }

        if ram_gb > self.config.max_ram {
            warn!(
                "task requires at least {ram_gb} GB of memory, but the template has a maximum of \
                 {max} GB",
                max = self.config.max_ram
            );
            constrained.1 = self.config.max_ram;
        }

        constrained
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn template(resubmission: DetachedResubmission) -> SlurmSingularityTemplate {
        let mut config = TemplateConfig::new(
            "/containers",
            Queues::Many(vec!["workq".into(), "debugq".into()]),
            "singularity pull $image docker://${docker}",
        );
        config.max_cores = 28;
        config.max_ram = 128;
        SlurmSingularityTemplate::new(config, resubmission).unwrap()
    }

    #[test]
    fn queue_resolution() {
        let queues = Queues::Many(vec!["workq".into(), "debugq".into()]);
        assert_eq!(QueueResolution::Configured.resolve(&queues), "workq, debugq");
        assert_eq!(
            QueueResolution::Override("longq".into()).resolve(&queues),
            "longq"
        );
        assert_eq!(QueueResolution::Fixed("janis".into()).resolve(&queues), "janis");
        assert_eq!(
            QueueResolution::Override("longq".into()).resolve(&Queues::from("workq")),
            "longq"
        );
    }

    #[test]
    fn wall_time_policy() {
        let fixed = WallTimePolicy::Fixed(WallTime::days(4));
        assert_eq!(fixed.resolve(Some(10)), WallTime::days(4));

        let configured = WallTimePolicy::Configured { fallback: 14400 };
        assert_eq!(configured.resolve(Some(20100)), WallTime::Minutes(20100));
        assert_eq!(configured.resolve(None), WallTime::Minutes(14400));
        assert_eq!(configured.resolve(Some(0)), WallTime::Minutes(14400));
    }

    #[test]
    fn invalid_config() {
        let mut config = TemplateConfig::new("/containers", "workq", "pull");
        config.max_cores = 0;
        let resubmission = DetachedResubmission::new(
            QueueResolution::Configured,
            WallTimePolicy::Fixed(WallTime::days(1)),
        );
        assert_eq!(
            SlurmSingularityTemplate::new(config, resubmission)
                .unwrap_err()
                .to_string(),
            "configuration value `max_cores` cannot be zero"
        );
    }

    #[test]
    fn resume_command_wrap_styles() {
        let template = template(DetachedResubmission::new(
            QueueResolution::Configured,
            WallTimePolicy::Fixed(WallTime::days(4)),
        ));
        let command: ResumeCommand = ["janis", "resume", "my dir"].into_iter().collect();

        let sbatch = template
            .detached_resume_command("abc123", &command, Path::new("/logs"), None)
            .unwrap();
        assert_eq!(sbatch.partition, "workq, debugq");
        assert_eq!(sbatch.wrap, "janis resume my dir");

        let template = template.with_wrap_style(WrapStyle::Quoted);
        let sbatch = template
            .detached_resume_command("abc123", &command, Path::new("/logs"), None)
            .unwrap();
        assert_eq!(
            shlex::split(&sbatch.wrap).unwrap(),
            ["janis", "resume", "my dir"]
        );
    }

    #[test]
    fn post_configuration_hook() {
        let mut config = TemplateConfig::new("/containers", "workq", "pull");
        config.mail_program = Some("sendmail -t".into());
        config.run_in_background = Some(true);
        let template = SlurmSingularityTemplate::new(
            config,
            DetachedResubmission::new(
                QueueResolution::Configured,
                WallTimePolicy::Fixed(WallTime::days(1)),
            ),
        )
        .unwrap()
        .with_call_caching_method("fingerprint");

        let mut configuration = JanisConfiguration::default();
        template.post_configuration_hook(&mut configuration);
        assert_eq!(
            configuration.notifications.mail_program.as_deref(),
            Some("sendmail -t")
        );
        assert_eq!(configuration.run_in_background, Some(true));
        assert_eq!(
            configuration.cromwell.call_caching_method.as_deref(),
            Some("fingerprint")
        );

        let mut configuration = JanisConfiguration::default();
        configuration.cromwell.call_caching_method = Some("file".into());
        configuration.notifications.mail_program = Some("mail".into());
        template.post_configuration_hook(&mut configuration);
        assert_eq!(configuration.cromwell.call_caching_method.as_deref(), Some("file"));
        assert_eq!(configuration.notifications.mail_program.as_deref(), Some("mail"));
    }

    #[test]
    fn container_build_script() {
        let template = template(DetachedResubmission::new(
            QueueResolution::Configured,
            WallTimePolicy::Fixed(WallTime::days(4)),
        ));
        assert_eq!(
            template.container_image_path("quay.io/biocontainers/bwa:0.7.17"),
            Path::new("/containers/quay.io_biocontainers_bwa_0.7.17.sif")
        );

        let script = template
            .container_build_script("quay.io/biocontainers/bwa:0.7.17")
            .unwrap();
        let lines = script.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "module load singularity");
        assert_eq!(
            shlex::split(lines[3].trim_start_matches("docker=")).unwrap(),
            ["quay.io/biocontainers/bwa:0.7.17"]
        );
        assert_eq!(
            lines[4],
            "image=/containers/quay.io_biocontainers_bwa_0.7.17.sif"
        );
        assert_eq!(lines[5], "singularity pull $image docker://${docker}");
    }

    #[test]
    fn constrain_resources() {
        let template = template(DetachedResubmission::new(
            QueueResolution::Configured,
            WallTimePolicy::Fixed(WallTime::days(4)),
        ));
        assert_eq!(template.constrain_resources(4, 16), (4, 16));
        assert_eq!(template.constrain_resources(64, 16), (28, 16));
        assert_eq!(template.constrain_resources(64, 512), (28, 128));
    }
}
