//! Binary-level tests for `avp generate`

use assert_cmd::Command;
use avp_core::CONFIG_KEYS;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: app
  annotations:
    avp.kubernetes.io/path: app
data:
  password: <password>
"#;

/// `avp` with a clean configuration environment, using the file backend
fn avp(secret_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("avp").unwrap();
    for key in CONFIG_KEYS {
        cmd.env_remove(key);
    }
    cmd.env_remove("RUST_LOG")
        .env("AVP_TYPE", "file")
        .env("AVP_SECRET_DIR", secret_dir);
    cmd
}

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("secrets")).unwrap();
    fs::write(dir.path().join("secrets/app.yaml"), "password: s3cr3t\n").unwrap();
    fs::write(dir.path().join("app.yaml"), MANIFEST).unwrap();
    dir
}

#[test]
fn test_generate_from_file() {
    let dir = setup();
    avp(&dir.path().join("secrets"))
        .arg("generate")
        .arg(dir.path().join("app.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("password: s3cr3t"))
        .stdout(predicate::str::ends_with("---\n"));
}

#[test]
fn test_generate_from_stdin() {
    let dir = setup();
    avp(&dir.path().join("secrets"))
        .args(["generate", "-"])
        .write_stdin(MANIFEST)
        .assert()
        .success()
        .stdout(predicate::str::contains("password: s3cr3t"));
}

#[test]
fn test_failure_prints_nothing_and_exits_non_zero() {
    let dir = setup();
    fs::write(dir.path().join("secrets/app.yaml"), "other: value\n").unwrap();

    avp(&dir.path().join("secrets"))
        .arg("generate")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "could not find secret key 'password' at path app",
        ));
}

#[test]
fn test_missing_path_argument() {
    let dir = setup();
    avp(dir.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<PATH>"));
}

#[test]
fn test_config_file_flag() {
    let dir = setup();
    let config = dir.path().join("avp.env");
    fs::write(&config, "AVP_PATH_VALIDATION=^vault/\n").unwrap();

    avp(&dir.path().join("secrets"))
        .arg("generate")
        .arg(dir.path().join("app.yaml"))
        .arg("--config-path")
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("disallowed by AVP_PATH_VALIDATION"));
}

#[test]
fn test_verbose_logs_skipped_manifests() {
    let dir = setup();
    fs::write(
        dir.path().join("app.yaml"),
        MANIFEST.replace(
            "  annotations:\n",
            "  annotations:\n    avp.kubernetes.io/ignore: \"true\"\n",
        ),
    )
    .unwrap();

    avp(&dir.path().join("secrets"))
        .arg("generate")
        .arg(dir.path().join("app.yaml"))
        .arg("--verbose-sensitive-output")
        .assert()
        .success()
        .stdout(predicate::str::contains("password: <password>"))
        .stderr(predicate::str::contains("skipping manifest"));
}
