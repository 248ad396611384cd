//! Site templates for running Janis workflows on Slurm clusters with
//! Singularity containers.
//!
//! A site template is a [`SlurmSingularityTemplate`] configured with a
//! site's defaults (queues, resource ceilings, container build commands) and
//! with the strategy used to resubmit the workflow supervisor as a detached
//! Slurm job.
//!
//! ```
//! use std::path::Path;
//!
//! use janis_templates::sites::PawseyDisconnectedOptions;
//! use janis_templates::sites::pawsey_disconnected;
//!
//! let options = PawseyDisconnectedOptions::new("/group/containers");
//! let template = pawsey_disconnected(options).unwrap();
//! let command = template
//!     .detached_resume_command(
//!         "abc123",
//!         &["run.sh", "--flag"].into_iter().collect(),
//!         Path::new("/logs"),
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(command.argv()[..3], ["sbatch", "-p", "longq"]);
//! ```

pub mod config;
pub mod email;
pub mod sbatch;
pub mod sites;
pub mod status;
pub mod submit;
pub mod template;

pub use config::EmailFormat;
pub use config::JanisConfiguration;
pub use config::NotificationConfig;
pub use config::Queues;
pub use config::TemplateConfig;
pub use sbatch::ResumeCommand;
pub use sbatch::SbatchCommand;
pub use sbatch::WrapStyle;
pub use sites::SiteConfig;
pub use status::SubmissionModel;
pub use status::TaskStatus;
pub use submit::SbatchSubmitter;
pub use submit::SubmitError;
pub use submit::Submitter;
pub use template::SlurmSingularityTemplate;
