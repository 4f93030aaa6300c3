// crates/assetlog-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests driving the assetlog binary end to end.
// Purpose: Ensure settings survive across processes and secrets never print.
// Dependencies: assetlog-cli binary
// ============================================================================
//! ## Overview
//! Runs the `assetlog` binary against a temporary config and database:
//! reconcile writes, show and tenants read back, health gates on storage
//! readiness, and tenant resolution rejects mismatched sources.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn assetlog_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_assetlog"))
}

/// Temporary workspace holding a config file pointing at a fresh database.
struct Workspace {
    dir: TempDir,
    config_path: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("data").join("assetlog.db");
        let config_path = dir.path().join("assetlog.toml");
        let config = format!(
            "[store]\npath = {path:?}\n\n[gateway]\nio_timeout_ms = 5000\n\n[logging]\nfilter = \"warn\"\n",
            path = db_path.to_string_lossy()
        );
        fs::write(&config_path, config).expect("write config");
        Self {
            dir,
            config_path,
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(assetlog_bin())
            .args(args)
            .arg("--config")
            .arg(&self.config_path)
            .env_remove("ASSETLOG_CONFIG")
            .env_remove("ASSETLOG_FORCE_LOCAL_STORAGE")
            .env_remove("RUST_LOG")
            .output()
            .expect("run assetlog")
    }
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not json ({err}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn reconcile_configured(workspace: &Workspace, tenant: &str) -> Output {
    let json_path = workspace.path().join(format!("settings-{tenant}.json"));
    fs::write(&json_path, r#"{"bucketName":"assets","objectPrefix":"org","maxUploadSizeMb":10}"#)
        .expect("write settings json");
    workspace.run(&[
        "settings",
        "reconcile",
        "--tenant",
        tenant,
        "--json",
        json_path.to_string_lossy().as_ref(),
        "--secret",
        "gcsServiceAccount=very-secret-credential",
        "--updated-at",
        "2024-05-01T12:00:00Z",
    ])
}

// ============================================================================
// SECTION: Settings Commands
// ============================================================================

/// Verifies a reconcile persists and reports secret names only.
#[test]
fn reconcile_persists_and_hides_secret_values() {
    let workspace = Workspace::new();
    let output = reconcile_configured(&workspace, "7");
    assert!(output.status.success(), "stderr: {}", stderr_text(&output));
    assert!(!stdout_text(&output).contains("very-secret-credential"));

    let report = stdout_json(&output);
    assert_eq!(report["tenant"], 7);
    assert_eq!(report["persisted"], true);
    assert_eq!(report["config"]["bucket"], "assets");
    assert_eq!(report["config"]["max_upload_size_bytes"], 10 * 1024 * 1024);
    assert_eq!(report["config"]["service_account_configured"], true);
    assert_eq!(report["secret_keys"], serde_json::json!(["gcsServiceAccount"]));
    assert_eq!(report["health"]["status"], "ok");
}

/// Verifies stored settings are visible from a later process.
#[test]
fn show_and_tenants_read_back_across_processes() {
    let workspace = Workspace::new();
    assert!(reconcile_configured(&workspace, "7").status.success());
    assert!(reconcile_configured(&workspace, "9").status.success());

    let show = workspace.run(&["settings", "show", "--tenant", "7"]);
    assert!(show.status.success(), "stderr: {}", stderr_text(&show));
    assert!(!stdout_text(&show).contains("very-secret-credential"));
    let view = stdout_json(&show);
    assert_eq!(view["json"]["bucketName"], "assets");
    assert_eq!(view["secret_keys"], serde_json::json!(["gcsServiceAccount"]));
    assert_eq!(view["dropped"], serde_json::json!([]));
    assert_eq!(view["provisioned"]["json"]["bucketName"], "assets");

    let tenants = workspace.run(&["settings", "tenants"]);
    assert!(tenants.status.success());
    let listed: Vec<String> = stdout_text(&tenants).lines().map(str::to_string).collect();
    assert_eq!(listed, vec!["7".to_string(), "9".to_string()]);
}

/// Verifies an empty reconcile after a write returns the stored settings.
#[test]
fn empty_reconcile_returns_persisted_settings() {
    let workspace = Workspace::new();
    assert!(reconcile_configured(&workspace, "7").status.success());

    let output = workspace.run(&["settings", "reconcile", "--tenant", "7"]);
    assert!(output.status.success(), "stderr: {}", stderr_text(&output));
    let report = stdout_json(&output);
    assert_eq!(report["outcome"], "empty_incoming");
    assert_eq!(report["persisted"], false);
    assert_eq!(report["config"]["bucket"], "assets");
}

/// Verifies show fails for a tenant with nothing stored.
#[test]
fn show_missing_tenant_fails() {
    let workspace = Workspace::new();
    let output = workspace.run(&["settings", "show", "--tenant", "3"]);
    assert!(!output.status.success());
    assert!(stderr_text(&output).contains("no settings stored for tenant 3"));
}

/// Verifies rebaseline records the live settings as the baseline.
#[test]
fn rebaseline_replaces_baseline_with_live_record() {
    let workspace = Workspace::new();
    assert!(reconcile_configured(&workspace, "7").status.success());

    let output = workspace.run(&["settings", "rebaseline", "--tenant", "7"]);
    assert!(output.status.success(), "stderr: {}", stderr_text(&output));
    assert!(stdout_text(&output).contains("provisioned baseline replaced"));

    let view = stdout_json(&workspace.run(&["settings", "show", "--tenant", "7"]));
    assert_eq!(view["provisioned"]["json"], view["json"]);
    assert_eq!(view["provisioned"]["secret_keys"], view["secret_keys"]);
}

// ============================================================================
// SECTION: Health, Tenant, and Config Commands
// ============================================================================

/// Verifies health exits non-zero until storage is configured.
#[test]
fn health_gates_on_storage_readiness() {
    let workspace = Workspace::new();
    let missing = workspace.run(&["health", "--tenant", "5"]);
    assert!(!missing.status.success());
    assert_eq!(stdout_json(&missing)["status"], "not_configured");

    assert!(reconcile_configured(&workspace, "5").status.success());
    let ready = workspace.run(&["health", "--tenant", "5"]);
    assert!(ready.status.success(), "stderr: {}", stderr_text(&ready));
    assert_eq!(stdout_json(&ready)["status"], "ok");
}

/// Verifies the trusted id resolves and a mismatched query id is rejected.
#[test]
fn tenant_resolve_prefers_trusted_and_rejects_mismatch() {
    let workspace = Workspace::new();
    let ok = workspace.run(&["tenant", "resolve", "--trusted", "42", "--query-tenant", "42"]);
    assert!(ok.status.success(), "stderr: {}", stderr_text(&ok));
    assert_eq!(stdout_text(&ok).trim(), "42");

    let mismatch = workspace.run(&["tenant", "resolve", "--trusted", "42", "--query-tenant", "43"]);
    assert!(!mismatch.status.success());
    assert!(stderr_text(&mismatch).contains("tenant mismatch"));

    let unresolved = workspace.run(&["tenant", "resolve", "--query-tenant", "43"]);
    assert!(!unresolved.status.success());
    assert!(stderr_text(&unresolved).contains("tenant unresolved"));
}

/// Verifies config check lists the configured store path.
#[test]
fn config_check_lists_store_candidate() {
    let workspace = Workspace::new();
    let output = workspace.run(&["config", "check"]);
    assert!(output.status.success(), "stderr: {}", stderr_text(&output));
    let text = stdout_text(&output);
    assert!(text.starts_with("config ok"));
    assert!(text.contains("assetlog.db"));
    assert!(text.contains("local storage override: false"));
}

/// Verifies an invalid config file fails before any command runs.
#[test]
fn invalid_config_fails_closed() {
    let workspace = Workspace::new();
    let bad_config = workspace.path().join("bad.toml");
    fs::write(&bad_config, "[gateway]\nio_timeout_ms = 1\n").expect("write config");
    let output = Command::new(assetlog_bin())
        .args(["config", "check", "--config"])
        .arg(&bad_config)
        .env_remove("ASSETLOG_CONFIG")
        .env_remove("ASSETLOG_FORCE_LOCAL_STORAGE")
        .output()
        .expect("run assetlog");
    assert!(!output.status.success());
    assert!(stderr_text(&output).contains("config load failed"));
}
