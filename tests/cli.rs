//! Tests for the `janis-sites` command line tool.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::process::Output;
use std::process::Stdio;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

/// Runs `janis-sites` in the given directory.
fn janis_sites(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_janis-sites"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("RUST_BACKTRACE")
        .spawn()
        .expect("failed to spawn command")
        .wait_with_output()
        .expect("failed while waiting for command to finish")
}

/// Asserts the command succeeded and returns its stdout.
fn success(output: &Output) -> &str {
    assert!(
        output.status.success(),
        "command failed {status}: {stderr}",
        status = output.status,
        stderr = str::from_utf8(&output.stderr).unwrap_or("<not UTF-8>")
    );
    str::from_utf8(&output.stdout).unwrap()
}

#[test]
fn templates() {
    let dir = tempdir().unwrap();
    let output = janis_sites(dir.path(), &["templates"]);
    let stdout = success(&output);
    for name in [
        "pawsey",
        "pawsey_disconnected",
        "peter_mac",
        "peter_mac_disconnected",
    ] {
        assert!(stdout.contains(name), "`{stdout}` lists `{name}`");
    }
    assert!(!stdout.contains("janis_memory_mb"));
}

#[test]
fn config_init_and_resolve() {
    let dir = tempdir().unwrap();
    let init = janis_sites(dir.path(), &["config", "init"]);
    let init = success(&init).to_string();
    assert!(init.contains("type = \"peter_mac\""));

    fs::write(dir.path().join("janis-sites.toml"), &init).unwrap();
    let resolve = janis_sites(dir.path(), &["config", "resolve"]);
    assert_eq!(success(&resolve), init);
}

#[test]
fn resubmit_dry_run() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("site.toml"),
        r#"
[template]
type = "peter_mac"
send_job_emails = true
janis_memory_mb = 8000

[notifications]
email = "someone@example.com"
"#,
    )
    .unwrap();

    let output = janis_sites(
        dir.path(),
        &[
            "--config",
            "site.toml",
            "resubmit",
            "--wid",
            "abc123",
            "--logs-dir",
            "/logs",
            "--dry-run",
            "--",
            "run.sh",
            "--flag",
        ],
    );
    let stdout = success(&output);
    assert_eq!(
        shlex::split(stdout.trim()).unwrap(),
        [
            "sbatch",
            "-p",
            "janis",
            "-J",
            "janis-abc123",
            "--time",
            "20100",
            "-o",
            "/logs/slurm.stdout",
            "-e",
            "/logs/slurm.stderr",
            "--mail-user",
            "someone@example.com",
            "--mail-type",
            "END",
            "--mem",
            "8000",
            "--wrap",
            "run.sh --flag",
        ]
    );
}

#[cfg(unix)]
#[test]
fn resubmit_runs_program() {
    use std::os::unix::fs::PermissionsExt as _;

    let dir = tempdir().unwrap();
    let program = dir.path().join("fake-sbatch");
    fs::write(
        &program,
        "#!/bin/sh\necho \"$@\" > args.txt\necho 'Submitted batch job 99'\n",
    )
    .unwrap();
    fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

    fs::write(
        dir.path().join("janis-sites.toml"),
        format!(
            r#"
[template]
type = "peter_mac_disconnected"

[submit]
program = "{program}"
"#,
            program = program.display()
        ),
    )
    .unwrap();

    let output = janis_sites(
        dir.path(),
        &[
            "resubmit",
            "--wid",
            "abc123",
            "--logs-dir",
            "/logs",
            "--",
            "janis resume abc123",
        ],
    );
    assert_eq!(success(&output), "99\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("args.txt")).unwrap(),
        "-p janis -J janis-abc123 --time 14400 -o /logs/slurm.stdout -e /logs/slurm.stderr \
         --wrap janis resume abc123\n"
    );
}

#[test]
fn invalid_email_format() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("janis-sites.toml"),
        "[template]\ntype = \"peter_mac\"\nemail_format = \"fancy\"\n",
    )
    .unwrap();

    let output = janis_sites(dir.path(), &["config", "resolve"]);
    assert!(!output.status.success());
    assert!(
        str::from_utf8(&output.stderr)
            .unwrap()
            .contains("invalid choice: 'fancy'")
    );
}

#[test]
fn email() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("janis-sites.toml"),
        "[template]\ntype = \"peter_mac\"\nemail_format = \"molpath\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("snapshot.json"),
        r#"{
  "id": "abc123",
  "execution_dir": "/scratch/abc123",
  "output_dir": "/data/abc123",
  "status": "completed",
  "runs": [
    {
      "id": "run1",
      "name": "WGSGermline",
      "inputs": [{ "tag": "seqrun", "value": "240301_A00123" }],
      "jobs": [{ "name": "align", "status": "completed" }]
    }
  ]
}"#,
    )
    .unwrap();

    let output = janis_sites(dir.path(), &["email", "--snapshot", "snapshot.json"]);
    let stdout = success(&output);
    assert!(stdout.starts_with("<h1>Status change: completed</h1>"));
    assert!(stdout.contains("<h3>Run status</h3>"));
    assert!(stdout.contains(">240301_A00123</td>"));

    let output = janis_sites(
        dir.path(),
        &["email", "--snapshot", "snapshot.json", "--status", "running"],
    );
    let stdout = success(&output);
    assert!(stdout.starts_with("<h1>Status change: running</h1>"));
    assert!(!stdout.contains("#Sample"));
    assert!(!stdout.contains("Progress"));
}
