//! Rendering of status update emails.
//!
//! Every function here is pure: it returns an HTML body for the caller to
//! deliver. Interpolated values are HTML-escaped.

use maud::Markup;
use maud::PreEscaped;
use maud::html;

use crate::status::RunModel;
use crate::status::SEQRUN_INPUT;
use crate::status::SubmissionModel;
use crate::status::TaskStatus;
use crate::status::display_value;

/// The style of every status table.
const TABLE_STYLE: &str = "border-collapse: collapse; border: 1px solid black";

/// Gets the `style` attribute value of a status table cell.
///
/// The border and padding declarations always follow the optional color.
pub fn table_style(color: Option<&str>) -> String {
    let mut style = String::new();
    if let Some(color) = color {
        style.push_str(&format!("color: {color}; "));
    }
    style.push_str("border: 1px solid black; padding: 8px;");
    style
}

/// Renders a two-column status table.
fn status_table<'a>(
    heading: &str,
    rows: impl Iterator<Item = (String, String, Option<&'a str>)>,
) -> Markup {
    let header_style = table_style(None);
    html! {
        table style=(TABLE_STYLE) {
            thead {
                tr {
                    th style=(header_style) { (heading) }
                    th style=(header_style) { "Janis" }
                }
            }
            tbody {
                @for (name, status, color) in rows {
                    @let style = table_style(color);
                    tr {
                        td style=(style) { (name) }
                        td style=(style) { (status) }
                    }
                }
            }
        }
    }
}

/// Prepares the run status tables of a run.
///
/// The job table is only rendered once `status` is final; the sequencing
/// run table is only rendered when the run has a `seqrun` input. Returns an
/// empty string when neither applies.
pub fn prepare_run_status_table(status: TaskStatus, run: &RunModel) -> String {
    let mut components = Vec::new();

    if status.is_in_final_state() {
        let rows = run.jobs.iter().map(|job| {
            (
                job.name.clone(),
                job.status.to_string(),
                Some(job.status.to_hexcolor()),
            )
        });
        components.push(status_table("#Sample", rows).into_string());
    }

    if let Some(seqrun) = run.input(SEQRUN_INPUT) {
        let seqruns: Vec<&serde_json::Value> = match seqrun {
            serde_json::Value::Array(values) => values.iter().collect(),
            value => vec![value],
        };
        let rows = seqruns
            .into_iter()
            .map(|s| (display_value(s), status.to_string(), None));
        components.push(status_table("#Run", rows).into_string());
    }

    if !components.is_empty() {
        components.insert(0, html! { h3 { "Run status" } }.into_string());
    }

    components.join("\n")
}

/// Renders the parts shared by every status update email.
fn status_change_header(status: TaskStatus, metadata: &SubmissionModel) -> Markup {
    let status = status.to_string();
    let wfname = metadata
        .run_names()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ");

    html! {
        h1 { "Status change: " (status) }
        p {
            "The workflow '" (wfname) "' (" (metadata.id) ") moved to the '" (status) "' status."
        }
        ul {
            li { "Task directory: " code { (metadata.output_dir.display().to_string()) } }
            li { "Execution directory: " code { (metadata.execution_dir.display().to_string()) } }
        }
    }
}

/// Renders the closing of every status update email.
fn sign_off() -> Markup {
    html! {
        br;
        br;
        "Kind regards,"
        br;
        "- Janis"
    }
}

/// Prepares a status update email in the molecular pathology format.
///
/// Progress is only included once `status` is final.
pub fn prepare_molpath_status_update_email(
    status: TaskStatus,
    metadata: &SubmissionModel,
) -> String {
    let run_status = metadata
        .runs
        .iter()
        .map(|run| prepare_run_status_table(status, run))
        .filter(|table| !table.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    html! {
        (status_change_header(status, metadata))
        (PreEscaped(run_status))
        @if status.is_in_final_state() {
            h2 { "Progress" }
            pre { (metadata.format(true, true)) }
        }
        (sign_off())
    }
    .into_string()
}

/// Prepares a status update email in the default format.
pub fn prepare_default_status_update_email(
    status: TaskStatus,
    metadata: &SubmissionModel,
) -> String {
    html! {
        (status_change_header(status, metadata))
        h2 { "Progress" }
        pre { (metadata.format(true, false)) }
        (sign_off())
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::status::RunInput;
    use crate::status::RunJob;

    fn run(jobs: Vec<RunJob>, inputs: Vec<RunInput>) -> RunModel {
        RunModel {
            id: "run1".into(),
            name: "WGSGermline".into(),
            status: None,
            inputs,
            jobs,
        }
    }

    fn submission(runs: Vec<RunModel>) -> SubmissionModel {
        SubmissionModel {
            id: "abc123".into(),
            execution_dir: "/scratch/abc123".into(),
            output_dir: "/data/abc123".into(),
            status: TaskStatus::Running,
            submitted: None,
            finished: None,
            runs,
        }
    }

    /// Counts the rows of every table body in the given HTML.
    fn body_rows(html: &str) -> usize {
        html.split("<tbody>")
            .skip(1)
            .map(|body| {
                body.split("</tbody>")
                    .next()
                    .unwrap_or_default()
                    .matches("<tr>")
                    .count()
            })
            .sum()
    }

    #[test]
    fn style() {
        assert_eq!(table_style(None), "border: 1px solid black; padding: 8px;");
        assert_eq!(
            table_style(Some("#2e8b57")),
            "color: #2e8b57; border: 1px solid black; padding: 8px;"
        );
    }

    #[test]
    fn empty_run_status_table() {
        let run = run(vec![RunJob::new("align", TaskStatus::Running)], vec![]);
        assert_eq!(prepare_run_status_table(TaskStatus::Running, &run), "");
    }

    #[test]
    fn job_table_for_final_status() {
        let run = run(vec![RunJob::new("align", TaskStatus::Completed)], vec![]);
        let table = prepare_run_status_table(TaskStatus::Completed, &run);
        assert!(table.starts_with("<h3>Run status</h3>\n<table"));
        assert_eq!(body_rows(&table), 1);
        assert!(table.contains(">align</td>"));
        assert!(table.contains(">completed</td>"));
        assert!(table.contains("color: #2e8b57;"));
        assert!(table.contains("#Sample"));
        assert!(!table.contains("#Run"));
    }

    #[test]
    fn seqrun_table() {
        let single = run(
            vec![],
            vec![RunInput {
                tag: "seqrun".into(),
                value: "240301_A00123".into(),
            }],
        );
        let table = prepare_run_status_table(TaskStatus::Running, &single);
        assert!(table.contains("#Run"));
        assert!(!table.contains("#Sample"));
        assert_eq!(body_rows(&table), 1);
        assert!(table.contains(">240301_A00123</td>"));
        assert!(table.contains(">running</td>"));

        let many = run(
            vec![RunJob::new("align", TaskStatus::Failed)],
            vec![RunInput {
                tag: "seqrun".into(),
                value: serde_json::json!(["240301_A00123", "240302_A00456"]),
            }],
        );
        let table = prepare_run_status_table(TaskStatus::Failed, &many);
        assert_eq!(table.matches("<table").count(), 2);
        assert_eq!(body_rows(&table), 3);
        assert!(table.contains(">240302_A00456</td>"));
    }

    #[test]
    fn names_are_escaped() {
        let run = run(
            vec![RunJob::new("<script>", TaskStatus::Completed)],
            vec![],
        );
        let table = prepare_run_status_table(TaskStatus::Completed, &run);
        assert!(table.contains("&lt;script&gt;"));
        assert!(!table.contains("<script>"));
    }

    #[test]
    fn molpath_email() {
        let metadata = submission(vec![
            run(vec![RunJob::new("align", TaskStatus::Running)], vec![]),
            run(vec![], vec![]),
        ]);
        let email = prepare_molpath_status_update_email(TaskStatus::Running, &metadata);
        assert!(email.starts_with("<h1>Status change: running</h1>"));
        assert!(email.contains(
            "<p>The workflow 'WGSGermline' (abc123) moved to the 'running' status.</p>"
        ));
        assert!(email.contains("<li>Task directory: <code>/data/abc123</code></li>"));
        assert!(email.contains("<li>Execution directory: <code>/scratch/abc123</code></li>"));
        assert!(!email.contains("Progress"));
        assert!(!email.contains("<table"));
        assert!(email.ends_with("Kind regards,<br>- Janis"));

        let email = prepare_molpath_status_update_email(TaskStatus::Completed, &metadata);
        assert!(email.contains("<h2>Progress</h2><pre>SID:        abc123\n"));
        assert!(email.contains("<h3>Run status</h3>"));
    }

    #[test]
    fn default_email() {
        let metadata = submission(vec![run(
            vec![RunJob::new("align", TaskStatus::Running)],
            vec![],
        )]);
        let email = prepare_default_status_update_email(TaskStatus::Running, &metadata);
        assert!(email.starts_with("<h1>Status change: running</h1>"));
        assert!(email.contains("<h2>Progress</h2>"));
        assert!(email.contains("[~] align"));
        assert!(!email.contains("<table"));
    }
}
