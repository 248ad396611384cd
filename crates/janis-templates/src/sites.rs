//! Site templates.
//!
//! Each site is a constructor that configures the generic
//! [`SlurmSingularityTemplate`] with the site's defaults and resubmission
//! strategy.

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::template::SlurmSingularityTemplate;

pub mod pawsey;
pub mod petermac;

pub use pawsey::PawseyDisconnectedOptions;
pub use pawsey::PawseyOptions;
pub use pawsey::pawsey;
pub use pawsey::pawsey_disconnected;
pub use petermac::PETER_MAC_IGNORE_INIT_KEYS;
pub use petermac::PeterMacDisconnectedOptions;
pub use petermac::PeterMacOptions;
pub use petermac::peter_mac;
pub use petermac::peter_mac_disconnected;

/// The option keys of the Pawsey templates.
const PAWSEY_KEYS: &[&str] = &[
    "containerDir",
    "executionDir",
    "queues",
    "singularityVersion",
    "catchSlurmErrors",
    "sendSlurmEmails",
    "singularityBuildInstructions",
    "max_cores",
    "max_ram",
];

/// The option keys of the disconnected Pawsey template.
const PAWSEY_DISCONNECTED_KEYS: &[&str] = &[
    "containerDir",
    "executionDir",
    "queues",
    "submissionQueue",
    "singularityVersion",
    "catchSlurmErrors",
    "sendSlurmEmails",
    "singularityBuildInstructions",
    "max_cores",
    "max_ram",
];

/// The option keys of the Peter Mac (login node) template.
const PETER_MAC_KEYS: &[&str] = &[
    "intermediate_execution_dir",
    "container_dir",
    "queues",
    "singularity_version",
    "send_job_emails",
    "catch_slurm_errors",
    "singularity_build_instructions",
    "max_cores",
    "max_ram",
    "max_workflow_time",
    "janis_memory_mb",
    "email_format",
];

/// The option keys of the disconnected Peter Mac template.
const PETER_MAC_DISCONNECTED_KEYS: &[&str] = &[
    "executionDir",
    "queues",
    "containerDir",
    "singularityVersion",
    "catchSlurmErrors",
    "sendSlurmEmails",
    "max_workflow_time",
];

/// A kind of site template.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum SiteKind {
    /// The Pawsey template.
    Pawsey,
    /// The disconnected Pawsey template.
    PawseyDisconnected,
    /// The Peter Mac (login node) template.
    PeterMac,
    /// The disconnected Peter Mac template.
    PeterMacDisconnected,
}

impl SiteKind {
    /// Gets a one-line description of the template.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pawsey => "Pawsey Supercomputing Centre",
            Self::PawseyDisconnected => {
                "Pawsey Supercomputing Centre, resubmitting the supervisor to the submission queue"
            }
            Self::PeterMac => "Peter MacCallum Cancer Centre (login node)",
            Self::PeterMacDisconnected => {
                "Peter MacCallum Cancer Centre, resubmitting the supervisor when disconnected"
            }
        }
    }

    /// Gets every option key the template uses.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Pawsey => PAWSEY_KEYS,
            Self::PawseyDisconnected => PAWSEY_DISCONNECTED_KEYS,
            Self::PeterMac => PETER_MAC_KEYS,
            Self::PeterMacDisconnected => PETER_MAC_DISCONNECTED_KEYS,
        }
    }

    /// Gets the option keys shown in generated configuration skeletons.
    pub fn init_keys(&self) -> Vec<&'static str> {
        let ignored: &[&str] = match self {
            Self::PeterMac | Self::PeterMacDisconnected => PETER_MAC_IGNORE_INIT_KEYS,
            Self::Pawsey | Self::PawseyDisconnected => &[],
        };

        self.keys()
            .iter()
            .copied()
            .filter(|key| !ignored.contains(key))
            .collect()
    }
}

/// The configuration of a site template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SiteConfig {
    /// Use the Pawsey template.
    Pawsey(PawseyOptions),
    /// Use the disconnected Pawsey template.
    PawseyDisconnected(PawseyDisconnectedOptions),
    /// Use the Peter Mac (login node) template.
    PeterMac(PeterMacOptions),
    /// Use the disconnected Peter Mac template.
    PeterMacDisconnected(PeterMacDisconnectedOptions),
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::PeterMac(Default::default())
    }
}

impl SiteConfig {
    /// Gets the kind of template configured.
    pub fn kind(&self) -> SiteKind {
        match self {
            Self::Pawsey(_) => SiteKind::Pawsey,
            Self::PawseyDisconnected(_) => SiteKind::PawseyDisconnected,
            Self::PeterMac(_) => SiteKind::PeterMac,
            Self::PeterMacDisconnected(_) => SiteKind::PeterMacDisconnected,
        }
    }

    /// Builds the configured template.
    pub fn build(&self) -> Result<SlurmSingularityTemplate> {
        match self {
            Self::Pawsey(options) => pawsey(options.clone()),
            Self::PawseyDisconnected(options) => pawsey_disconnected(options.clone()),
            Self::PeterMac(options) => peter_mac(options.clone()),
            Self::PeterMacDisconnected(options) => peter_mac_disconnected(options.clone()),
        }
    }

    /// Gets the option keys shown in generated configuration skeletons.
    pub fn init_keys(&self) -> Vec<&'static str> {
        self.kind().init_keys()
    }
}
