use std::fs;
use std::process::{Command, Output};

use camino::{Utf8Path, Utf8PathBuf};

fn project() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

    // nothing here needs esbuild
    fs::create_dir_all(root.join("src/styles")).unwrap();
    fs::create_dir_all(root.join("src/fonts")).unwrap();
    fs::write(root.join("src/styles/main.scss"), "body { a { color: red; } }\n").unwrap();
    fs::write(root.join("src/fonts/inter.woff2"), [0x77u8, 0x4f, 0x46, 0x32]).unwrap();

    (dir, root)
}

fn frontkit(root: &Utf8Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_frontkit"))
        .args(args)
        .current_dir(root)
        .env("FRONTKIT_LOG", "info")
        .output()
        .unwrap()
}

#[test]
fn build_succeeds() {
    let (_dir, root) = project();

    let output = frontkit(&root, &["build"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(root.join("build/styles/main.min.css").is_file());
    assert!(root.join("build/fonts/inter.woff2").is_file());
}

#[test]
fn invalid_config_exits_with_failure() {
    let (_dir, root) = project();
    fs::write(root.join("frontkit.toml"), "colour = \"blue\"\n").unwrap();

    let output = frontkit(&root, &["build"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!root.join("build").exists());
}

#[test]
fn overlapping_output_root_exits_without_cleaning() {
    let (_dir, root) = project();
    fs::write(root.join("frontkit.toml"), "build = \".\"\n").unwrap();

    let output = frontkit(&root, &["build"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(root.join("src/styles/main.scss").is_file());
    assert!(root.join("frontkit.toml").is_file());
}

#[test]
fn failing_pipeline_exits_with_failure() {
    let (_dir, root) = project();
    fs::write(root.join("src/styles/broken.scss"), "body { color: ").unwrap();

    let output = frontkit(&root, &["build"]);

    assert_eq!(output.status.code(), Some(1));
    // styles run before fonts in the build pipeline
    assert!(!root.join("build/fonts").exists());
}

#[test]
fn unknown_pipeline_is_a_usage_error() {
    let (_dir, root) = project();

    let output = frontkit(&root, &["deploy"]);

    assert_eq!(output.status.code(), Some(2));
}
