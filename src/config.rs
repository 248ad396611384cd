//! Implementation of the configuration module.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use janis_templates::JanisConfiguration;
use janis_templates::NotificationConfig;
use janis_templates::SiteConfig;
use janis_templates::WrapStyle;
use janis_templates::config::CromwellConfig;
use janis_templates::sbatch::SBATCH_PROGRAM;
use serde::Deserialize;
use serde::Serialize;

/// The name of the configuration file read from the working directory.
pub const CONFIG_FILE_NAME: &str = "janis-sites.toml";

/// The prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "JANIS_SITES";

/// Represents the configuration for the `janis-sites` CLI tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Config {
    /// The site template.
    #[serde(default)]
    pub template: SiteConfig,
    /// Notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Cromwell settings.
    #[serde(default)]
    pub cromwell: CromwellConfig,
    /// Submission settings.
    #[serde(default)]
    pub submit: SubmitConfig,
}

/// Represents the configuration of job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct SubmitConfig {
    /// The program run in place of `sbatch`.
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// How the resume command is flattened into the `--wrap` payload.
    #[serde(default)]
    pub wrap_style: WrapStyle,
}

/// Gets the default submission program.
fn default_program() -> PathBuf {
    PathBuf::from(SBATCH_PROGRAM)
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            wrap_style: WrapStyle::default(),
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// Values are read from the given file (or `janis-sites.toml` in the
    /// working directory, if present) and then overridden by
    /// `JANIS_SITES_*` environment variables, with `__` separating nested
    /// keys.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(Path::new(CONFIG_FILE_NAME)).required(false),
        };

        let config: Self = config::Config::builder()
            .add_source(file.format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.template
            .build()
            .context("invalid `template` configuration")?;
        Ok(())
    }

    /// Gets the assistant configuration the site template is applied to.
    pub fn janis_configuration(&self) -> JanisConfiguration {
        JanisConfiguration {
            notifications: self.notifications.clone(),
            cromwell: self.cromwell.clone(),
            run_in_background: None,
        }
    }

    /// Writes the configuration to the given path.
    pub fn write_config(&self, path: &Path) -> Result<()> {
        let data = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config file `{}`", path.display()))
    }
}
