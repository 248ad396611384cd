//! Implementation of the email command.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use janis_templates::SubmissionModel;
use janis_templates::TaskStatus;
use tracing::debug;

use crate::config::Config;

/// Arguments for the `email` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// The JSON status snapshot of the submission.
    #[arg(long, value_name = "PATH")]
    pub snapshot: PathBuf,

    /// The status the submission moved to.
    ///
    /// Defaults to the status recorded in the snapshot.
    #[arg(long)]
    pub status: Option<TaskStatus>,
}

/// Reads a submission snapshot from a JSON file.
fn read_snapshot(path: &Path) -> anyhow::Result<SubmissionModel> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot `{}`", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse snapshot `{}`", path.display()))
}

/// Runs the `email` command.
pub fn email(args: Args, config: Config) -> anyhow::Result<()> {
    let template = config.template.build()?;
    let metadata = read_snapshot(&args.snapshot)?;
    let status = args.status.unwrap_or(metadata.status);
    debug!(%status, submission = %metadata.id, "rendering status update email");

    println!("{}", template.prepare_status_update_email(status, &metadata));
    Ok(())
}
