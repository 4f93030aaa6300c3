//! Config load validation tests for assetlog-config.
// crates/assetlog-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

#![allow(clippy::use_debug, reason = "Test-only diagnostics are permitted.")]

use std::io::Write;
use std::path::Path;

use assetlog_config::AssetlogConfig;
use assetlog_config::ConfigError;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<AssetlogConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(AssetlogConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(AssetlogConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(AssetlogConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(AssetlogConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_missing_explicit_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    assert_invalid(AssetlogConfig::load(Some(&missing)), "config io error")?;
    assert_invalid(AssetlogConfig::load_or_default(Some(&missing)), "config io error")?;
    Ok(())
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[store\npath = ").map_err(|err| err.to_string())?;
    assert_invalid(AssetlogConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn load_reads_full_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let content = r#"
[store]
path = "/tmp/assetlog/assets.db"
busy_timeout_ms = 2500
journal_mode = "delete"
sync_mode = "normal"

[gateway]
io_timeout_ms = 750

[storage]
force_local = true

[logging]
filter = "assetlog=debug"
"#;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    let config = AssetlogConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let sqlite = config.store.sqlite_config();
    if sqlite.path != Path::new("/tmp/assetlog/assets.db") || sqlite.busy_timeout_ms != 2500 {
        return Err(format!("unexpected store config: {sqlite:?}"));
    }
    if config.gateway.io_timeout().as_millis() != 750 {
        return Err("io timeout not applied".to_string());
    }
    if !config.storage.local_override_enabled() {
        return Err("force_local not applied".to_string());
    }
    if config.logging.filter != "assetlog=debug" {
        return Err("log filter not applied".to_string());
    }
    Ok(())
}
