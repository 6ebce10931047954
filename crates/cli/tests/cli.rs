use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn story_file(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    path
}

#[test]
fn compile_lists_passages_with_tags() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(&dir, "story.wf", ":: Start\nhi [[Next]]\n:: Next [silent]\nbye\n");

    Command::cargo_bin("weft")
        .unwrap()
        .args(["compile"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("/Start"))
        .stdout(predicate::str::contains("/Next [silent]"))
        .stdout(predicate::str::contains("2 passage(s)"));
}

#[test]
fn compile_json_emits_the_compiled_book() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(&dir, "story.wf", ":: Start\n<%= name %>\n");

    Command::cargo_bin("weft")
        .unwrap()
        .args(["compile", "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"/Start\""))
        .stdout(predicate::str::contains("EmitEscaped"));
}

#[test]
fn compile_listing_prints_generated_units() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(&dir, "story.wf", ":: Start\nhello\n");

    Command::cargo_bin("weft")
        .unwrap()
        .args(["compile", "--listing"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(":: /Start"))
        .stdout(predicate::str::contains("_w_.out(\"hello\");"));
}

#[test]
fn compile_rejects_missing_files() {
    Command::cargo_bin("weft")
        .unwrap()
        .args(["compile", "no-such-file.wf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-file.wf"));
}

#[test]
fn run_plays_a_story_from_stdin_choices() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(
        &dir,
        "story.wf",
        ":: Start\nYou wake up. [[Go->Door]]\n:: Door\nThe door is locked.\n",
    );

    Command::cargo_bin("weft")
        .unwrap()
        .args(["run"])
        .arg(&path)
        .write_stdin("1\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("You wake up. Go [1]"))
        .stdout(predicate::str::contains("The door is locked."));
}

#[test]
fn run_undo_returns_to_the_previous_screen() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(
        &dir,
        "story.wf",
        ":: Start\nYou wake up. [[Go->Door]]\n:: Door\nThe door is locked.\n",
    );

    Command::cargo_bin("weft")
        .unwrap()
        .args(["run"])
        .arg(&path)
        .write_stdin("1\nundo\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("You wake up.").count(2));
}

#[test]
fn run_with_custom_start_passage() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(&dir, "story.wf", ":: Start\nfront\n:: Alt\nback\n");

    Command::cargo_bin("weft")
        .unwrap()
        .args(["run", "--start", "Alt"])
        .arg(&path)
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("back"));
}

#[test]
fn run_fails_when_start_passage_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = story_file(&dir, "story.wf", ":: NotStart\nx\n");

    Command::cargo_bin("weft")
        .unwrap()
        .args(["run"])
        .arg(&path)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot find start passage"));
}
