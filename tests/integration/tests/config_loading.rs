//! Integration tests for configuration loading
//!
//! Environment variables are process-wide, so tests touching them run
//! serially.

use anyhow::Result;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;
use watchroom::utils::Config;

#[test]
fn test_partial_file_keeps_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[server]
base_url = "https://rooms.example.com"

[sync]
reconcile_threshold = 4.0
"#,
    )?;

    let config = Config::from_file(&path)?;
    assert_eq!(config.server.base_url, "https://rooms.example.com");
    assert_eq!(config.sync.reconcile_threshold, 4.0);
    assert_eq!(config.sync.tick_interval_ms, 250);
    assert_eq!(config.sync.seek_tolerance, 0.3);
    assert_eq!(config.player.mpv_path, "mpv");

    Ok(())
}

#[test]
fn test_invalid_file_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[sync]\ntick_interval_ms = 0\n")?;

    assert!(Config::from_file(&path).is_err());
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_env_overrides_user_file() -> Result<()> {
    let dir = TempDir::new()?;
    let user_dir = dir.path().join("watchroom");
    fs::create_dir_all(&user_dir)?;
    fs::write(
        user_dir.join("config.toml"),
        "[server]\nbase_url = \"http://file.example:9000\"\n[general]\nlog_level = \"warn\"\n",
    )?;

    std::env::set_var("XDG_CONFIG_HOME", dir.path());
    std::env::set_var("WATCHROOM_API_BASE_URL", "http://env.example:8080");
    std::env::set_var("WATCHROOM_TICK_INTERVAL_MS", "100");

    let loaded = Config::load();

    std::env::remove_var("WATCHROOM_API_BASE_URL");
    std::env::remove_var("WATCHROOM_TICK_INTERVAL_MS");
    std::env::remove_var("XDG_CONFIG_HOME");

    let config = loaded?;
    assert_eq!(config.server.base_url, "http://env.example:8080");
    assert_eq!(config.sync.tick_interval_ms, 100);
    assert_eq!(config.general.log_level, "warn");

    Ok(())
}

#[test]
#[serial]
fn test_bad_env_value_fails_load() {
    std::env::set_var("WATCHROOM_TICK_INTERVAL_MS", "fast");
    let loaded = Config::load();
    std::env::remove_var("WATCHROOM_TICK_INTERVAL_MS");

    assert!(loaded.is_err());
}
