//! Unit tests for configuration loading

use crate::{AuthMethod, BackendSettings, ConfigLoader, KvVersion};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn vault_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("VAULT_ADDR", "http://127.0.0.1:8200/"),
        ("VAULT_TOKEN", "s.root"),
    ]
}

#[test]
fn test_defaults_to_vault_token_auth() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::new()
        .working_dir(dir.path())
        .environment(vault_env())
        .load()
        .unwrap();

    assert_eq!(config.secret_dir, dir.path());
    assert!(config.path_validation.is_none());
    assert!(!config.verbose);

    match config.backend {
        BackendSettings::Vault(vault) => {
            assert_eq!(vault.address, "http://127.0.0.1:8200");
            assert_eq!(vault.kv_version, KvVersion::V2);
            assert_eq!(vault.timeout, Duration::from_secs(15));
            assert_eq!(
                vault.auth,
                AuthMethod::Token {
                    token: "s.root".to_string()
                }
            );
        }
        other => panic!("expected vault backend, got {other:?}"),
    }
}

#[test]
fn test_missing_vault_address_is_an_error() {
    let err = ConfigLoader::new()
        .working_dir("/")
        .environment(vec![("VAULT_TOKEN", "s.root")])
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("VAULT_ADDR is required"));
}

#[test]
fn test_approle_requires_credentials() {
    let err = ConfigLoader::new()
        .working_dir("/")
        .environment(vec![
            ("VAULT_ADDR", "http://vault:8200"),
            ("AVP_AUTH_TYPE", "approle"),
            ("AVP_ROLE_ID", "role"),
        ])
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("AVP_SECRET_ID is required"));
}

#[test]
fn test_unknown_backend_type() {
    let err = ConfigLoader::new()
        .working_dir("/")
        .environment(vec![("AVP_TYPE", "ibmsecretsmanager")])
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("unsupported backend type"));
}

#[test]
fn test_invalid_kv_version() {
    let mut env = vault_env();
    env.push(("AVP_KV_VERSION", "3"));
    let err = ConfigLoader::new()
        .working_dir("/")
        .environment(env)
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("unsupported KV version"));
}

#[test]
fn test_config_file_overrides_environment() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("avp.yaml"),
        "AVP_TYPE: file\nAVP_PATH_VALIDATION: ^secret/\n",
    )
    .unwrap();

    let config = ConfigLoader::new()
        .working_dir(dir.path())
        .environment(vault_env())
        .config_path("avp.yaml")
        .secret_dir("secrets")
        .verbose(true)
        .load()
        .unwrap();

    assert!(config.verbose);
    assert_eq!(config.path_validation.as_deref(), Some("^secret/"));
    assert_eq!(
        config.backend,
        BackendSettings::File {
            root: dir.path().join("secrets")
        }
    );
}

#[test]
fn test_secret_dir_setting_overrides_flag() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::new()
        .working_dir(dir.path())
        .environment(vec![("AVP_TYPE", "file"), ("AVP_SECRET_DIR", "/srv/secrets")])
        .secret_dir("ignored")
        .load()
        .unwrap();

    assert_eq!(config.secret_dir, PathBuf::from("/srv/secrets"));
}

#[test]
fn test_secret_dir_relative_to_git_root() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    let app = repo.join("apps").join("web");
    fs::create_dir_all(&app).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();

    let config = ConfigLoader::new()
        .working_dir(&app)
        .environment(vec![("AVP_TYPE", "file")])
        .secret_dir("GIT_ROOT/secrets")
        .load()
        .unwrap();

    assert_eq!(config.secret_dir, repo.join("secrets"));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new()
        .working_dir(dir.path())
        .environment(vault_env())
        .config_path("missing.json")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("missing.json"));
}

#[test]
#[serial]
fn test_reads_process_environment() {
    std::env::set_var("AVP_TYPE", "file");
    std::env::set_var("AVP_PATH_VALIDATION", "^kv/");

    let dir = TempDir::new().unwrap();
    let result = ConfigLoader::new().working_dir(dir.path()).load();

    std::env::remove_var("AVP_TYPE");
    std::env::remove_var("AVP_PATH_VALIDATION");

    let config = result.unwrap();
    assert_eq!(config.backend.name(), "file");
    assert_eq!(config.path_validation.as_deref(), Some("^kv/"));
}
