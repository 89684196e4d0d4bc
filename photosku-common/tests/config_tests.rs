//! Unit tests for configuration and graceful degradation
//!
//! Tests cover:
//! - Missing TOML files fall back to compiled defaults
//! - Priority order for root folder resolution
//! - Automatic directory creation
//! - Token resolution from CLI, TOML and secret files
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PHOTOSKU_* variables are marked with #[serial].

use photosku_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TelegramConfig, TomlConfig,
    UpdateMode, CONFIG_ENV, ROOT_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn clear_root_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(ROOT_ENV);
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("photosku"));
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.telegram_api_base, "https://api.telegram.org");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_root_env();

    let root_folder = RootFolderResolver::new().resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    clear_root_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/photosku-env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/photosku-toml")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/photosku-cli")))
        .with_config(&config)
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/photosku-cli"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    clear_root_env();
    env::set_var(ROOT_ENV, "/tmp/photosku-env-root");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/photosku-toml")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new().with_config(&config).resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/photosku-env-root"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_root_folder_env_takes_precedence() {
    clear_root_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/photosku-priority-1");
    env::set_var(ROOT_ENV, "/tmp/photosku-priority-2");

    let root_folder = RootFolderResolver::new().resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/photosku-priority-1"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_uses_toml_value_without_env() {
    clear_root_env();

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/photosku")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new().with_config(&config).resolve();

    assert_eq!(root_folder, PathBuf::from("/srv/photosku"));
}

#[test]
fn test_initializer_resolves_relative_paths_under_root() {
    let root = PathBuf::from("/tmp/photosku-test-root");
    let initializer = RootFolderInitializer::new(root.clone());
    let config = TomlConfig::default();

    assert_eq!(initializer.database_path(&config), root.join("photosku.db"));
    assert_eq!(initializer.objects_path(&config), root.join("objects"));

    let absolute = TomlConfig {
        database_path: PathBuf::from("/data/bot.db"),
        ..Default::default()
    };
    assert_eq!(initializer.database_path(&absolute), PathBuf::from("/data/bot.db"));
}

#[test]
fn test_initializer_creates_nested_directory_idempotently() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("level1").join("level2");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir());
}

#[test]
fn test_toml_defaults_for_missing_sections() {
    let toml_str = r#"
        root_folder = "/srv/photosku"
        [telegram]
        token = "123:abc"
    "#;

    let config: TomlConfig = toml::from_str(toml_str).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/photosku")));
    assert_eq!(config.database_path, PathBuf::from("photosku.db"));
    assert_eq!(config.telegram.mode, UpdateMode::Polling);
    assert_eq!(config.telegram.poll_timeout_secs, 30);
    assert_eq!(config.dispatcher.queue_capacity, 32);
    assert_eq!(config.dispatcher.worker_idle_secs, 300);
    assert_eq!(config.http.bind, "127.0.0.1:5780");
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json);
}

#[test]
fn test_toml_webhook_mode() {
    let toml_str = r#"
        [telegram]
        mode = "webhook"
        webhook_url = "https://bot.example.com/telegram/webhook"
        webhook_secret = "s3cret"
    "#;

    let config: TomlConfig = toml::from_str(toml_str).unwrap();

    assert_eq!(config.telegram.mode, UpdateMode::Webhook);
    assert_eq!(config.telegram.webhook_secret.as_deref(), Some("s3cret"));
}

#[test]
fn test_token_resolution_priority() {
    let temp_dir = TempDir::new().unwrap();
    let secret = temp_dir.path().join("token");
    std::fs::write(&secret, "  file-token\n").unwrap();

    let config = TelegramConfig {
        token: Some("toml-token".to_string()),
        token_file: Some(secret.clone()),
        ..Default::default()
    };
    assert_eq!(config.resolve_token(Some("cli-token")).unwrap(), "cli-token");
    assert_eq!(config.resolve_token(None).unwrap(), "toml-token");

    let file_only = TelegramConfig {
        token_file: Some(secret),
        ..Default::default()
    };
    assert_eq!(file_only.resolve_token(Some("  ")).unwrap(), "file-token");

    let missing = TelegramConfig::default();
    assert!(missing.resolve_token(None).is_err());
}

#[test]
#[serial]
fn test_load_explicit_missing_file_is_an_error() {
    env::remove_var(CONFIG_ENV);
    let result = TomlConfig::load(Some(Path::new("/nonexistent/photosku.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_load_from_config_env() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "objects_path = \"/data/objects\"\n").unwrap();

    env::set_var(CONFIG_ENV, &path);
    let config = TomlConfig::load(None).unwrap();
    env::remove_var(CONFIG_ENV);

    assert_eq!(config.objects_path, PathBuf::from("/data/objects"));
}

#[test]
fn test_invalid_toml_reports_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "database_path = [").unwrap();

    let err = TomlConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
