//! Implementation of the resubmit command.

use std::path::PathBuf;

use clap::Parser;
use janis_templates::ResumeCommand;
use janis_templates::SbatchSubmitter;
use janis_templates::WrapStyle;
use tracing::info;

use crate::config::Config;

/// Arguments for the `resubmit` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// The identifier of the workflow to resume.
    #[arg(long)]
    pub wid: String,

    /// The directory Slurm writes the supervisor's logs to.
    #[arg(long, value_name = "DIR")]
    pub logs_dir: PathBuf,

    /// Prints the `sbatch` invocation instead of running it.
    #[arg(long)]
    pub dry_run: bool,

    /// How the command is flattened into the `--wrap` payload (`joined` or
    /// `quoted`).
    #[arg(long)]
    pub wrap_style: Option<WrapStyle>,

    /// The command that resumes the workflow supervisor.
    ///
    /// A single argument is used as a shell command line as-is.
    #[arg(required = true, last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Args {
    /// Applies the configuration to the arguments.
    pub fn apply(mut self, config: &Config) -> Self {
        self.wrap_style = self.wrap_style.or(Some(config.submit.wrap_style));
        self
    }

    /// Gets the command to resume.
    fn resume_command(&self) -> ResumeCommand {
        match self.command.as_slice() {
            [line] => ResumeCommand::Line(line.clone()),
            tokens => ResumeCommand::Tokens(tokens.to_vec()),
        }
    }
}

/// Runs the `resubmit` command.
pub async fn resubmit(args: Args, config: Config) -> anyhow::Result<()> {
    let args = args.apply(&config);
    let mut template = config.template.build()?;
    if let Some(wrap_style) = args.wrap_style {
        template = template.with_wrap_style(wrap_style);
    }

    let mut configuration = config.janis_configuration();
    template.post_configuration_hook(&mut configuration);

    let resume = args.resume_command();
    if args.dry_run {
        let command = template.detached_resume_command(
            &args.wid,
            &resume,
            &args.logs_dir,
            Some(&configuration.notifications),
        )?;
        println!("{command}");
        return Ok(());
    }

    let submitter = SbatchSubmitter::new().with_program(config.submit.program.clone());
    let output = template
        .submit_detached_resume(
            &args.wid,
            &resume,
            &args.logs_dir,
            Some(&configuration.notifications),
            &submitter,
        )
        .await?;

    match output.job_id {
        Some(job_id) => println!("{job_id}"),
        None => info!(stdout = %output.stdout.trim(), "no job id reported"),
    }

    Ok(())
}
