//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test.
fn taskstage() -> Command {
    Command::cargo_bin("taskstage").unwrap()
}

const CONFIG: &str = r#"
[workflow]
auto_remove_last_stage_marker = true

[[workflow.definitions]]
id = "dev"
name = "Development"

[[workflow.definitions.stages]]
id = "planning"
name = "Planning"
type = "linear"
next = "build"

[[workflow.definitions.stages]]
id = "build"
name = "Build"
type = "cycle"
canProceedTo = ["done"]

[[workflow.definitions.stages.subStages]]
id = "coding"
name = "Coding"
next = "testing"

[[workflow.definitions.stages.subStages]]
id = "testing"
name = "Testing"

[[workflow.definitions.stages]]
id = "done"
name = "Done"
type = "terminal"
"#;

const NOTES: &str = "- [ ] Feature #workflow/dev\n\t- [ ] Planning [stage::planning]\n";

/// A temp dir holding `taskstage.toml` and `notes.md`.
fn fixture(notes: &str) -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("taskstage.toml").write_str(CONFIG).unwrap();
    temp.child("notes.md").write_str(notes).unwrap();
    temp
}

/// Run a command inside a fixture dir with its config.
fn in_fixture(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = taskstage();
    cmd.current_dir(temp.path()).args(["--config", "taskstage.toml"]);
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    taskstage()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stage-aware task workflows"));
}

#[test]
fn test_version_flag() {
    taskstage()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_subcommand() {
    taskstage().arg("frobnicate").assert().failure();
}

// ============================================================================
// Complete Command Tests
// ============================================================================

#[test]
fn test_complete_dry_run_prints_next_stage() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "2", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "- [ ] Feature #workflow/dev\n\t- [x] Planning\n\t- [ ] Build [stage::build]\n\t\t- [ ] Build (Coding) [stage::build.coding]\n",
        ));

    temp.child("notes.md").assert(NOTES);
}

#[test]
fn test_complete_writes_file() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed task on line 1"));

    temp.child("notes.md").assert(predicate::str::starts_with(
        "- [x] Feature #workflow/dev\n\t- [ ] Planning [stage::planning]\n\t- [ ] Planning [stage::planning]",
    ));
}

#[test]
fn test_complete_terminal_stage_completes_root() {
    let temp = fixture("- [ ] Feature #workflow/dev\n\t- [ ] Done [stage::done]\n");

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "2", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::eq("- [x] Feature #workflow/dev\n\t- [x] Done\n"));
}

#[test]
fn test_complete_plain_task() {
    let temp = fixture("- [ ] groceries\n");

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "1", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::eq("- [x] groceries\n"));
}

#[test]
fn test_complete_rejects_non_task_line() {
    let temp = fixture("# Heading\n");

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a task"));
}

#[test]
fn test_complete_rejects_completed_task() {
    let temp = fixture("- [x] done already\n");

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already complete"));
}

#[test]
fn test_complete_line_out_of_range() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["complete", "notes.md", "--line", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_complete_missing_file() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["complete", "missing.md", "--line", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

// ============================================================================
// Info & Options Tests
// ============================================================================

#[test]
fn test_info_text() {
    let temp = fixture("#workflow/dev\n- [ ] Build (Testing) [stage::build.testing]\n");

    in_fixture(&temp)
        .args(["info", "notes.md", "--line", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow: Development (dev)"))
        .stdout(predicate::str::contains("Stage: Build (build, cycle)"))
        .stdout(predicate::str::contains("Sub-stage: Testing (testing)"));
}

#[test]
fn test_info_json() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["info", "notes.md", "--line", "1", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""is_root_task": true"#));
}

#[test]
fn test_info_non_workflow_line() {
    let temp = fixture("- [ ] groceries\n");

    in_fixture(&temp)
        .args(["info", "notes.md", "--line", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a workflow task"));
}

#[test]
fn test_options_lists_transitions() {
    let temp = fixture("#workflow/dev\n- [ ] Build (Testing) [stage::build.testing]\n");

    in_fixture(&temp)
        .args(["options", "notes.md", "--line", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Move to Done"))
        .stdout(predicate::str::contains("Complete substage and move to Done"))
        .stdout(predicate::str::contains("Add child task with same stage"));
}

#[test]
fn test_options_json() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["options", "notes.md", "--line", "1", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""action": "start_workflow""#));
}

// ============================================================================
// Move Command Tests
// ============================================================================

#[test]
fn test_move_to_sub_stage() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["move", "notes.md", "--line", "2", "--to", "build.testing", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "- [ ] Feature #workflow/dev\n\t- [x] Planning\n\t- [ ] Build (Testing) [stage::build.testing]\n",
        ));
}

#[test]
fn test_move_to_unknown_stage() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["move", "notes.md", "--line", "2", "--to", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot move line 2"));
}

// ============================================================================
// Finish & Add-Child Command Tests
// ============================================================================

#[test]
fn test_finish_completes_root() {
    let temp = fixture("- [ ] Feature #workflow/dev\n\t- [x] Planning\n\t- [ ] Done [stage::done]\n");

    in_fixture(&temp)
        .args(["finish", "notes.md", "--line", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed workflow from line 3"));

    temp.child("notes.md")
        .assert("- [x] Feature #workflow/dev\n\t- [x] Planning\n\t- [x] Done\n");
}

#[test]
fn test_finish_rejects_open_stage() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["finish", "notes.md", "--line", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not on a terminal workflow stage"));
}

#[test]
fn test_add_child_same_stage() {
    let temp = fixture("#workflow/dev\n- [ ] Build (Testing) [stage::build.testing]\n");

    in_fixture(&temp)
        .args(["add-child", "notes.md", "--line", "2", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "#workflow/dev\n- [ ] Build (Testing) [stage::build.testing]\n\t- [ ] Build (Testing) [stage::build.testing]\n",
        ));
}

#[test]
fn test_add_child_rejects_root_task() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["add-child", "notes.md", "--line", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot add a child task below line 1"));
}

// ============================================================================
// Workflows Command Tests
// ============================================================================

#[test]
fn test_workflows_check_valid() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .args(["workflows", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev - Development (3 stages)"))
        .stdout(predicate::str::contains("All 1 workflows are valid"));
}

#[test]
fn test_workflows_check_reports_problems() {
    let temp = fixture(NOTES);
    temp.child(".taskstage/workflows/broken.yaml")
        .write_str("id: broken\nname: Broken\nstages:\n  - id: a\n    name: A\n    next: missing\n")
        .unwrap();

    in_fixture(&temp)
        .args(["workflows", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage 'missing'"));
}

#[test]
fn test_workflows_discovers_yaml_files() {
    let temp = fixture(NOTES);
    temp.child("workflows/release.yml")
        .write_str("id: release\nname: Release\nstages:\n  - id: tag\n    name: Tag\n    type: terminal\n")
        .unwrap();

    in_fixture(&temp)
        .arg("workflows")
        .assert()
        .success()
        .stdout(predicate::str::contains("release - Release (1 stages)"));
}

// ============================================================================
// Config & Completions Tests
// ============================================================================

#[test]
fn test_config_display() {
    let temp = fixture(NOTES);

    in_fixture(&temp)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[workflow]"))
        .stdout(predicate::str::contains("auto_remove_last_stage_marker = true"));
}

#[test]
fn test_config_env_var() {
    let temp = fixture(NOTES);

    taskstage()
        .current_dir(temp.path())
        .env("TASKSTAGE_CONFIG", temp.child("taskstage.toml").path())
        .args(["workflows"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev - Development"));
}

#[test]
fn test_invalid_config_file() {
    let temp = fixture(NOTES);
    temp.child("taskstage.toml").write_str("[workflow\n").unwrap();

    in_fixture(&temp)
        .arg("workflows")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}

#[test]
fn test_completions_bash() {
    taskstage()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("taskstage"));
}
