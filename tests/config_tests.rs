//! Integration tests for tiered configuration loading.

use std::path::PathBuf;
use taskdeck::config::{ConfigLoader, ConfigPaths, DEFAULT_PORT, apply_overrides};
use taskdeck::view::{Filter, SortKey};
use tempfile::TempDir;

/// Helper to write a `config.yaml` into a fresh temp dir.
fn tier_dir(yaml: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yaml"), yaml).unwrap();
    dir
}

#[test]
fn defaults_without_any_files() {
    let empty = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::with_dirs(
        Some(empty.path().join("project")),
        Some(empty.path().join("user")),
    );
    let loader = ConfigLoader::load_with_paths(paths).unwrap();
    let config = loader.config();

    assert!(loader.config_path().is_none());
    assert_eq!(config.server.port, DEFAULT_PORT);
    assert_eq!(config.undo.window_ms, 7_000);
    assert_eq!(config.scheduler.horizon_days, 7);
    assert_eq!(config.cache.name, "tasks-app-cache-v2");
    assert_eq!(config.cache.manifest.len(), 6);
    assert_eq!(config.storage.tasks_key, "tasks_v2");
}

#[test]
fn user_tier_overrides_project_field_by_field() {
    let project = tier_dir(
        "server:\n  port: 9000\n  host: 0.0.0.0\nview:\n  sort: priority\n",
    );
    let user = tier_dir("server:\n  port: 9100\nundo:\n  window_ms: 10000\n");

    let paths = ConfigPaths::with_dirs(
        Some(project.path().to_path_buf()),
        Some(user.path().to_path_buf()),
    );
    let loader = ConfigLoader::load_with_paths(paths).unwrap();
    let config = loader.config();

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.view.sort, SortKey::Priority);
    assert_eq!(config.view.filter, Filter::All);
    assert_eq!(config.undo.window().num_seconds(), 10);
    assert_eq!(
        loader.config_path(),
        Some(user.path().join("config.yaml").as_path())
    );
}

#[test]
fn malformed_tier_is_skipped() {
    let project = tier_dir("server: [unterminated\n");
    let paths = ConfigPaths::with_dirs(Some(project.path().to_path_buf()), None);
    let loader = ConfigLoader::load_with_paths(paths).unwrap();
    assert_eq!(loader.config().server.port, DEFAULT_PORT);
}

#[test]
fn explicit_file_replaces_file_tiers() {
    let project = tier_dir("server:\n  port: 9000\n");
    let explicit = tier_dir("cache:\n  name: tasks-app-cache-v3\n  upstream: http://localhost:5173\n");

    let paths = ConfigPaths::with_dirs(Some(project.path().to_path_buf()), None);
    let loader =
        ConfigLoader::load_file(paths, explicit.path().join("config.yaml")).unwrap();
    let config = loader.config();

    assert_eq!(config.server.port, DEFAULT_PORT);
    assert_eq!(config.cache.name, "tasks-app-cache-v3");
    assert_eq!(config.cache.upstream.as_deref(), Some("http://localhost:5173"));
    assert_eq!(config.cache.fallback_path, "/offline.html");
}

#[test]
fn explicit_file_must_exist() {
    let paths = ConfigPaths::with_dirs(None, None);
    assert!(ConfigLoader::load_file(paths, PathBuf::from("/nonexistent/taskdeck.yaml")).is_err());
}

#[test]
fn environment_overrides_win() {
    let project = tier_dir("server:\n  port: 9000\n");
    let paths = ConfigPaths::with_dirs(Some(project.path().to_path_buf()), None);
    let mut config = ConfigLoader::load_with_paths(paths).unwrap().into_config();

    apply_overrides(&mut config, |key| match key {
        "TASKDECK_PORT" => Some("9200".to_string()),
        "TASKDECK_DB_PATH" => Some("/tmp/elsewhere.db".to_string()),
        _ => None,
    });
    assert_eq!(config.server.port, 9200);
    assert_eq!(config.storage.db_path, PathBuf::from("/tmp/elsewhere.db"));

    apply_overrides(&mut config, |key| {
        (key == "TASKDECK_PORT").then(|| "not-a-port".to_string())
    });
    assert_eq!(config.server.port, 9200);
}
