//! Implementation of template configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;

/// The base instruction used to load Singularity on a cluster node.
const SINGULARITY_MODULE: &str = "module load singularity";

/// One or more Slurm queues (partitions).
///
/// Deserializes from either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Queues {
    /// A single queue name.
    ///
    /// Note that a single name may itself be a comma-separated list that is
    /// passed through to Slurm unmodified.
    Single(String),
    /// An ordered list of queue names.
    Many(Vec<String>),
}

impl Queues {
    /// Joins the queues with the given separator.
    ///
    /// A single queue is returned as-is.
    pub fn joined(&self, separator: &str) -> String {
        match self {
            Self::Single(queue) => queue.clone(),
            Self::Many(queues) => queues.join(separator),
        }
    }

    /// Iterates over the queue names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Self::Single(queue) => std::slice::from_ref(queue),
            Self::Many(queues) => queues.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for Queues {
    fn from(queue: &str) -> Self {
        Self::Single(queue.to_string())
    }
}

impl From<String> for Queues {
    fn from(queue: String) -> Self {
        Self::Single(queue)
    }
}

impl From<Vec<String>> for Queues {
    fn from(queues: Vec<String>) -> Self {
        Self::Many(queues)
    }
}

/// An error for an email format outside of the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "argument email_format: invalid choice: '{value}' (choose from {choices})",
    choices = EmailFormat::choices()
)]
pub struct InvalidEmailFormat {
    /// The rejected value.
    pub value: String,
}

/// A site-specific format for status update emails.
///
/// The absence of a format (`None`) selects the default renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailFormat {
    /// The format used by the molecular pathology deployment.
    Molpath,
}

/// Every supported email format name, in the order they are reported.
const EMAIL_FORMAT_NAMES: &[&str] = &["molpath"];

impl EmailFormat {
    /// Parses an optional format name.
    ///
    /// `None` is always valid and means "use the default renderer".
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>, InvalidEmailFormat> {
        value.map(str::parse::<Self>).transpose()
    }

    /// Formats the valid choices for error messages.
    fn choices() -> String {
        std::iter::once("'None'".to_string())
            .chain(EMAIL_FORMAT_NAMES.iter().map(|n| format!("'{n}'")))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for EmailFormat {
    type Err = InvalidEmailFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "molpath" => Ok(Self::Molpath),
            _ => Err(InvalidEmailFormat {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EmailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Molpath => write!(f, "molpath"),
        }
    }
}

/// The normalized parameter set of a Slurm + Singularity template.
///
/// Site templates translate their own option surface into this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct TemplateConfig {
    /// The directory where execution takes place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_dir: Option<PathBuf>,
    /// The directory where Singularity containers are stored.
    pub container_dir: PathBuf,
    /// The queues task jobs are submitted to.
    pub queues: Queues,
    /// The version of Singularity to load on the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singularity_version: Option<String>,
    /// The shell command used to build a container image.
    ///
    /// The command is evaluated with `$docker` set to the container
    /// specification and `$image` set to the target `.sif` path.
    pub build_instructions: String,
    /// The maximum number of cores a task can request.
    pub max_cores: u32,
    /// The maximum amount of memory (in GB) a task can request.
    pub max_ram: u32,
    /// Whether Slurm errors (e.g. out of memory, wall time) fail the task.
    pub catch_slurm_errors: bool,
    /// Whether Slurm sends job notification emails.
    pub send_job_emails: bool,
    /// The wall time (in minutes) of the submitted workflow supervisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workflow_time: Option<u64>,
    /// The memory (in MB) requested for the workflow supervisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub janis_memory_mb: Option<u64>,
    /// The format of status update emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_format: Option<EmailFormat>,
    /// The program used to deliver notification emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_program: Option<String>,
    /// Whether the workflow supervisor may run in the foreground.
    #[serde(default = "default_can_run_in_foreground")]
    pub can_run_in_foreground: bool,
    /// Forces the workflow supervisor into (or out of) the background.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_in_background: Option<bool>,
}

/// Gets the default for [`TemplateConfig::can_run_in_foreground`].
fn default_can_run_in_foreground() -> bool {
    true
}

impl TemplateConfig {
    /// Creates a template configuration with the required values and
    /// defaults for everything else.
    pub fn new(
        container_dir: impl Into<PathBuf>,
        queues: impl Into<Queues>,
        build_instructions: impl Into<String>,
    ) -> Self {
        Self {
            execution_dir: None,
            container_dir: container_dir.into(),
            queues: queues.into(),
            singularity_version: None,
            build_instructions: build_instructions.into(),
            max_cores: 1,
            max_ram: 1,
            catch_slurm_errors: true,
            send_job_emails: false,
            max_workflow_time: None,
            janis_memory_mb: None,
            email_format: None,
            mail_program: None,
            can_run_in_foreground: default_can_run_in_foreground(),
            run_in_background: None,
        }
    }

    /// Gets the shell instruction that loads Singularity.
    pub fn singularity_load_instructions(&self) -> String {
        singularity_load_instructions(self.singularity_version.as_deref())
    }

    /// Validates the template configuration.
    pub fn validate(&self) -> Result<()> {
        if self.container_dir.as_os_str().is_empty() {
            bail!("configuration value `container_dir` cannot be empty");
        }

        if self.queues.iter().next().is_none() {
            bail!("configuration value `queues` must name at least one queue");
        }

        if self.queues.iter().any(|q| q.trim().is_empty()) {
            bail!("configuration value `queues` cannot contain an empty queue name");
        }

        if self.max_cores == 0 {
            bail!("configuration value `max_cores` cannot be zero");
        }

        if self.max_ram == 0 {
            bail!("configuration value `max_ram` cannot be zero");
        }

        Ok(())
    }
}

/// Derives the Singularity module load instruction for an optional version.
pub fn singularity_load_instructions(version: Option<&str>) -> String {
    match version {
        Some(version) if !version.is_empty() => format!("{SINGULARITY_MODULE}/{version}"),
        _ => SINGULARITY_MODULE.to_string(),
    }
}

/// Notification settings of the assistant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct NotificationConfig {
    /// The address notifications are sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The program used to send notification emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_program: Option<String>,
}

impl NotificationConfig {
    /// Gets the notification address if one is set and non-empty.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }
}

/// Cromwell settings of the assistant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct CromwellConfig {
    /// The call caching method Cromwell uses to hash files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_caching_method: Option<String>,
}

/// The subset of the assistant configuration templates can adjust.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct JanisConfiguration {
    /// Notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Cromwell settings.
    #[serde(default)]
    pub cromwell: CromwellConfig,
    /// Whether the workflow supervisor runs in the background.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_in_background: Option<bool>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn singularity_load() {
        assert_eq!(
            singularity_load_instructions(Some("3.4.0")),
            "module load singularity/3.4.0"
        );
        assert_eq!(
            singularity_load_instructions(None),
            "module load singularity"
        );
        assert_eq!(singularity_load_instructions(Some("")), "module load singularity");
    }

    #[test]
    fn email_format() {
        assert_eq!(EmailFormat::parse_optional(None), Ok(None));
        assert_eq!(
            EmailFormat::parse_optional(Some("molpath")),
            Ok(Some(EmailFormat::Molpath))
        );

        let e = EmailFormat::parse_optional(Some("fancy")).unwrap_err();
        assert_eq!(e.value, "fancy");
        assert_eq!(
            e.to_string(),
            "argument email_format: invalid choice: 'fancy' (choose from 'None', 'molpath')"
        );
    }

    #[test]
    fn queues() {
        let single: Queues = serde_json::from_str(r#""prod_med,prod""#).unwrap();
        assert_eq!(single, Queues::Single("prod_med,prod".into()));
        assert_eq!(single.joined(", "), "prod_med,prod");

        let many: Queues = serde_json::from_str(r#"["workq", "longq"]"#).unwrap();
        assert_eq!(many.joined(", "), "workq, longq");
        assert_eq!(many.joined(","), "workq,longq");
        assert_eq!(many.iter().collect::<Vec<_>>(), ["workq", "longq"]);
    }

    #[test]
    fn owned_queue_list() {
        let many = Queues::from(vec!["workq".to_string(), "longq".to_string()]);
        let queues = Queues::from(many.joined(","));
        assert_eq!(queues, Queues::Single("workq,longq".into()));

        let config = TemplateConfig::new("/containers", queues, "singularity pull");
        assert_eq!(config.queues.joined(", "), "workq,longq");
    }

    #[test]
    fn validate() {
        let config = TemplateConfig::new("/containers", "workq", "singularity pull");
        config.validate().expect("config should validate");

        let mut config = TemplateConfig::new("/containers", "workq", "singularity pull");
        config.max_cores = 0;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "configuration value `max_cores` cannot be zero"
        );

        let mut config = TemplateConfig::new("/containers", "workq", "singularity pull");
        config.max_ram = 0;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "configuration value `max_ram` cannot be zero"
        );

        let config = TemplateConfig::new("", "workq", "singularity pull");
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "configuration value `container_dir` cannot be empty"
        );

        let config = TemplateConfig::new("/containers", Queues::Many(vec![]), "pull");
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "configuration value `queues` must name at least one queue"
        );

        let config = TemplateConfig::new(
            "/containers",
            Queues::Many(vec!["workq".into(), " ".into()]),
            "pull",
        );
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "configuration value `queues` cannot contain an empty queue name"
        );
    }

    #[test]
    fn notification_email() {
        let mut notifications = NotificationConfig::default();
        assert_eq!(notifications.email(), None);
        notifications.email = Some(String::new());
        assert_eq!(notifications.email(), None);
        notifications.email = Some("someone@example.com".into());
        assert_eq!(notifications.email(), Some("someone@example.com"));
    }
}
