mod common;

use common::TestProject;
use predicates::prelude::*;

fn project() -> TestProject {
    let project = TestProject::new();
    project.write_fixtures();
    project.write_file("other/x.rs", "fn x() {}\n// FIXME: elsewhere\n");
    project
}

#[test]
fn dir_defaults_to_project_root() {
    let project = project();

    project
        .cmd()
        .arg("dir")
        .assert()
        .success()
        .stdout(predicate::str::contains("fix this"))
        .stdout(predicate::str::contains("hard-coded bounds"))
        .stdout(predicate::str::contains("elsewhere"))
        // .org files are not plausible source files
        .stdout(predicate::str::contains("write the docs").not());
}

#[test]
fn dir_json_output_structure() {
    let project = project();

    let output = project
        .cmd()
        .args(["--json", "dir", "src"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let src = project.canonical_path().join("src");
    assert_eq!(json["scope"], "directory");
    assert_eq!(json["directory"], src.display().to_string());
    // directory searches do not look at comment syntax
    assert_eq!(json["count"], 4);

    let first = &json["results"][0];
    assert_eq!(first["source"], "lib.rs");
    assert_eq!(first["path"], src.join("lib.rs").display().to_string());
    assert_eq!(first["line"], 4);
    assert_eq!(first["column"], 8);
    assert_eq!(first["narrow"], "t");
    assert_eq!(json["results"][3]["keyword"], "HACK");
    assert_eq!(json["results"][3]["narrow"], "h");
}

#[test]
fn dir_prompt_reads_directory() {
    let project = project();

    project
        .cmd()
        .args(["dir", "--prompt"])
        .write_stdin("other\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"))
        .stdout(predicate::str::contains("fix this").not());
}

#[test]
fn dir_pick_prints_file_location() {
    let project = project();

    project
        .cmd()
        .args(["dir", "src", "--pick"])
        .write_stdin("1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("lib.rs:4:8"));
}

#[test]
fn dir_slow_search_is_served_from_cache() {
    let project = project();
    project.write_config("[search]\nbackend = \"walk\"\nslow_threshold_secs = 0.0\n");

    project
        .cmd()
        .args(["--verbose", "dir", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"));
}

#[test]
fn dir_missing_directory_fails() {
    let project = project();

    project
        .cmd()
        .args(["dir", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}

#[test]
fn project_resolves_root_from_file() {
    let project = project();

    project
        .cmd()
        .args(["project", "src/lib.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"))
        .stdout(predicate::str::contains("hard-coded bounds"));
}

#[test]
fn dir_without_keywords_reports_no_results() {
    let project = TestProject::new();
    project.write_file("src/clean.rs", "fn main() {}\n");

    project
        .cmd()
        .arg("dir")
        .assert()
        .success()
        .stdout(predicate::str::contains("No keyword matches found"));
}

#[cfg(unix)]
#[test]
fn dir_failed_search_process_is_silent() {
    use std::os::unix::fs::PermissionsExt;

    let project = project();
    let script = project.canonical_path().join("broken-rg");
    std::fs::write(&script, "#!/bin/sh\necho 'rg: regex parse error' >&2\nexit 2\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    project.write_config(&format!(
        "[search]\nbackend = \"ripgrep\"\nrg_path = '{}'\n",
        script.display()
    ));

    project
        .cmd()
        .args(["dir", "src"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}
