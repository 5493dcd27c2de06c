use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn typdex(catalog: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_typdex"));
    cmd.env("TYPDEX_CATALOG", catalog);
    cmd
}

#[test]
fn add_then_find_round_trips_through_the_catalog_file() {
    let tmp = tempdir().expect("tempdir");
    let catalog = tmp.path().join("catalog.json");
    let fonts = tmp.path().join("fonts");
    fs::create_dir_all(&fonts).expect("mkdir");

    let output = typdex(&catalog)
        .args(["add"])
        .arg(&fonts)
        .output()
        .expect("run typdex add");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(catalog.is_file(), "snapshot must be written");

    let output = typdex(&catalog)
        .args(["find", "--json"])
        .output()
        .expect("run typdex find");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(parsed["total"], 0);
    assert!(parsed["items"].as_array().expect("items array").is_empty());
}

#[test]
fn roots_lists_the_registered_category() {
    let tmp = tempdir().expect("tempdir");
    let catalog = tmp.path().join("catalog.json");
    let fonts = tmp.path().join("fonts");
    fs::create_dir_all(&fonts).expect("mkdir");

    let status = typdex(&catalog)
        .args(["add", "--name", "Library"])
        .arg(&fonts)
        .status()
        .expect("run typdex add");
    assert!(status.success());

    let output = typdex(&catalog)
        .args(["roots"])
        .output()
        .expect("run typdex roots");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Library"), "stdout:\n{stdout}");
    assert!(stdout.contains("ok"), "stdout:\n{stdout}");
}

#[test]
fn unknown_family_exits_nonzero() {
    let tmp = tempdir().expect("tempdir");
    let catalog = tmp.path().join("catalog.json");

    let output = typdex(&catalog)
        .args(["family", "No Such Family"])
        .output()
        .expect("run typdex family");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("family not found"), "stderr:\n{stderr}");
}

#[test]
fn unknown_url_key_exits_nonzero() {
    let tmp = tempdir().expect("tempdir");
    let catalog = tmp.path().join("catalog.json");

    let output = typdex(&catalog)
        .args(["resolve", "missing-key"])
        .output()
        .expect("run typdex resolve");
    assert!(!output.status.success());
}

#[test]
fn fav_toggles_between_runs() {
    let tmp = tempdir().expect("tempdir");
    let catalog = tmp.path().join("catalog.json");

    let output = typdex(&catalog)
        .args(["fav", "Inter"])
        .output()
        .expect("run typdex fav");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("favorited") && !stdout.contains("unfavorited"));

    let output = typdex(&catalog)
        .args(["fav", "Inter"])
        .output()
        .expect("run typdex fav again");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("unfavorited"));
}
