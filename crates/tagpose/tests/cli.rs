use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("tagpose")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("calibrate")
                .and(predicate::str::contains("track"))
                .and(predicate::str::contains("print")),
        );
}

#[test]
fn init_config_writes_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");

    Command::cargo_bin("tagpose")
        .expect("binary")
        .args(["init-config", "--out"])
        .arg(&path)
        .assert()
        .success();

    let text = std::fs::read_to_string(&path).expect("config written");
    assert!(text.contains("ARUCO_5X5_50"));
    assert!(text.contains("\"min_samples\": 15"));
}

#[test]
fn print_renders_marker_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("markers");

    Command::cargo_bin("tagpose")
        .expect("binary")
        .args(["print", "--count", "2", "--cell-px", "8", "--out"])
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("aruco_5x5_50_0000.png").exists());
    assert!(out.join("aruco_5x5_50_0001.png").exists());
}

#[test]
fn track_fails_cleanly_without_images() {
    let dir = tempfile::tempdir().expect("tempdir");
    Command::cargo_bin("tagpose")
        .expect("binary")
        .args(["track", "--base", "0", "--target", "1", "--calibration"])
        .arg(dir.path().join("calib.txt"))
        .arg("--images")
        .arg(dir.path().join("missing"))
        .assert()
        .failure();
}
