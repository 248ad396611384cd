//! Status snapshots of submitted workflows.
//!
//! These types are read-only views of the run-tracking database; templates
//! only consume them when rendering status reports.

use std::fmt;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use colored::Color;
use colored::Colorize as _;
use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;

/// The name of the run input listing sequencing runs.
pub const SEQRUN_INPUT: &str = "seqrun";

/// The status of a workflow, run or job.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    /// The submission is being prepared.
    Processing,
    /// The work is queued.
    Queued,
    /// The work is running.
    Running,
    /// The work completed successfully.
    Completed,
    /// The work failed.
    Failed,
    /// The work was aborted.
    Aborted,
    /// The work is suspended.
    Suspended,
    /// The work is held by the scheduler.
    OnHold,
    /// The submission was a dry run.
    DryRun,
}

impl TaskStatus {
    /// Determines whether no further transitions can happen from this status.
    pub fn is_in_final_state(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Aborted | Self::DryRun
        )
    }

    /// Gets the color used to display this status in HTML reports.
    pub fn to_hexcolor(&self) -> &'static str {
        match self {
            Self::Processing => "#6c757d",
            Self::Queued => "#d4a017",
            Self::Running => "#1f77b4",
            Self::Completed => "#2e8b57",
            Self::Failed => "#c0392b",
            Self::Aborted => "#8e44ad",
            Self::Suspended => "#e67e22",
            Self::OnHold => "#e67e22",
            Self::DryRun => "#6c757d",
        }
    }

    /// Gets the glyph used for this status in textual progress reports.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Processing | Self::Queued => "...",
            Self::Running => "~",
            Self::Completed | Self::DryRun => "✓",
            Self::Failed => "!",
            Self::Aborted => "x",
            Self::Suspended | Self::OnHold => "-",
        }
    }

    /// Gets the terminal color of this status.
    fn terminal_color(&self) -> Color {
        match self {
            Self::Processing | Self::DryRun => Color::White,
            Self::Queued | Self::Suspended | Self::OnHold => Color::Yellow,
            Self::Running => Color::Blue,
            Self::Completed => Color::Green,
            Self::Failed => Color::Red,
            Self::Aborted => Color::Magenta,
        }
    }
}

/// An input a run was submitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    /// The input's tag.
    pub tag: String,
    /// The input's value.
    pub value: serde_json::Value,
}

/// A job (workflow step) of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    /// The name of the job.
    pub name: String,
    /// The status of the job.
    pub status: TaskStatus,
    /// When the job started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    /// When the job finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<DateTime<Utc>>,
}

impl RunJob {
    /// Creates a job with no timing information.
    pub fn new(name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            name: name.into(),
            status,
            start: None,
            finish: None,
        }
    }

    /// Gets how long the job ran for, if it has both started and finished.
    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.finish? - self.start?)
    }
}

/// A single run of a workflow within a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunModel {
    /// The identifier of the run.
    pub id: String,
    /// The name of the workflow that was run.
    pub name: String,
    /// The status of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// The inputs the run was submitted with.
    #[serde(default)]
    pub inputs: Vec<RunInput>,
    /// The jobs of the run.
    #[serde(default)]
    pub jobs: Vec<RunJob>,
}

impl RunModel {
    /// Gets the value of the input with the given tag.
    ///
    /// The last input with the tag wins.
    pub fn input(&self, tag: &str) -> Option<&serde_json::Value> {
        self.inputs
            .iter()
            .rev()
            .find(|i| i.tag == tag)
            .map(|i| &i.value)
    }
}

/// A submission of one or more workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionModel {
    /// The identifier of the submission.
    pub id: String,
    /// The directory execution takes place in.
    pub execution_dir: PathBuf,
    /// The directory outputs are copied to.
    pub output_dir: PathBuf,
    /// The overall status of the submission.
    pub status: TaskStatus,
    /// When the submission was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<DateTime<Utc>>,
    /// When the submission finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
    /// The runs of the submission.
    #[serde(default)]
    pub runs: Vec<RunModel>,
}

impl SubmissionModel {
    /// Gets the distinct names of the submission's runs.
    pub fn run_names(&self) -> IndexSet<&str> {
        self.runs.iter().map(|r| r.name.as_str()).collect()
    }

    /// Formats a textual progress report of the submission.
    ///
    /// A `brief` report omits timestamps, durations and inputs. A
    /// `monochrome` report contains no terminal escape sequences.
    pub fn format(&self, monochrome: bool, brief: bool) -> String {
        self.report(monochrome, brief).to_string()
    }

    /// Gets a displayable progress report of the submission.
    pub fn report(&self, monochrome: bool, brief: bool) -> Report<'_> {
        Report {
            submission: self,
            monochrome,
            brief,
        }
    }
}

/// A textual progress report of a submission.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    /// The reported submission.
    submission: &'a SubmissionModel,
    /// Whether terminal colors are omitted.
    monochrome: bool,
    /// Whether timestamps, durations and inputs are omitted.
    brief: bool,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let submission = self.submission;
        let status = submission.status.to_string();
        let status = if self.monochrome {
            status
        } else {
            status
                .color(submission.status.terminal_color())
                .bold()
                .to_string()
        };

        writeln!(f, "SID:        {}", submission.id)?;
        writeln!(f, "Status:     {status}")?;
        writeln!(f, "Task Dir:   {}", submission.output_dir.display())?;
        writeln!(f, "Exec Dir:   {}", submission.execution_dir.display())?;
        if !self.brief {
            if let Some(submitted) = submission.submitted {
                writeln!(f, "Submitted:  {}", submitted.to_rfc3339())?;
            }
            if let Some(finished) = submission.finished {
                writeln!(f, "Finished:   {}", finished.to_rfc3339())?;
            }
        }

        for run in &submission.runs {
            writeln!(f)?;
            writeln!(f, "Run:        {} ({})", run.name, run.id)?;

            if !self.brief && !run.inputs.is_empty() {
                writeln!(f, "Inputs:")?;
                for input in &run.inputs {
                    writeln!(f, "    {}: {}", input.tag, display_value(&input.value))?;
                }
            }

            if run.jobs.is_empty() {
                continue;
            }

            writeln!(f, "Jobs:")?;
            for job in &run.jobs {
                let symbol = if self.monochrome {
                    job.status.symbol().to_string()
                } else {
                    job.status
                        .symbol()
                        .color(job.status.terminal_color())
                        .to_string()
                };

                write!(f, "    [{symbol}] {}", job.name)?;
                if !self.brief && let Some(duration) = job.duration() {
                    write!(f, " ({})", format_duration(duration))?;
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

/// Displays an input value, without quotes for strings.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Formats a duration as hours, minutes and seconds.
fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds}s"),
        _ => format!("{hours}h {minutes}m {seconds}s"),
    }
}
