// crates/assetlog-cli/src/main.rs
// ============================================================================
// Module: Assetlog CLI Entry Point
// Description: Command dispatcher for tenant settings operations.
// Purpose: Drive the settings gateway and store from the command line.
// Dependencies: clap, assetlog-config, assetlog-gateway, assetlog-store-sqlite, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `assetlog` CLI runs the same reconciliation an instantiation runs,
//! and gives operators read access to stored settings, tenant resolution,
//! storage health, and configuration checks. Secret values are never
//! printed; only secret key names and presence flags.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use assetlog_config::AssetlogConfig;
use assetlog_core::PersistedSettingsRecord;
use assetlog_core::ProvisionedBaseline;
use assetlog_core::SaveRequest;
use assetlog_core::SecretMap;
use assetlog_core::SettingsPayload;
use assetlog_core::SettingsStore;
use assetlog_core::TenantConfig;
use assetlog_core::TenantId;
use assetlog_core::Timestamp;
use assetlog_gateway::HealthReport;
use assetlog_gateway::LoadedSettings;
use assetlog_gateway::RequestContext;
use assetlog_gateway::SettingsGateway;
use assetlog_gateway::resolve_tenant;
use assetlog_store_sqlite::SqliteSettingsStore;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a settings JSON input in bytes.
const MAX_SETTINGS_JSON_BYTES: usize = 1024 * 1024;
/// Argument value selecting stdin.
const STDIN_MARKER: &str = "-";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "assetlog", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `ASSETLOG_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Tenant settings operations.
    Settings {
        /// Selected settings subcommand.
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Tenant resolution utilities.
    Tenant {
        /// Selected tenant subcommand.
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Report storage readiness for a tenant.
    Health(TenantArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Settings subcommands.
#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Reconcile host-supplied settings as an instantiation would.
    Reconcile(ReconcileCommand),
    /// Show stored settings (secret names only).
    Show(TenantArgs),
    /// Replace the provisioned baseline with the live record.
    Rebaseline(TenantArgs),
    /// List tenants with stored settings.
    Tenants,
}

/// Tenant subcommands.
#[derive(Subcommand, Debug)]
enum TenantCommand {
    /// Resolve the tenant for a request.
    Resolve(ResolveCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the config file and list store path candidates.
    Check,
}

/// Arguments naming a tenant.
#[derive(Args, Debug)]
struct TenantArgs {
    /// Tenant (organization) id.
    #[arg(long, value_name = "ID")]
    tenant: TenantId,
}

/// Arguments for `settings reconcile`.
#[derive(Args, Debug)]
struct ReconcileCommand {
    /// Tenant (organization) id.
    #[arg(long, value_name = "ID")]
    tenant: TenantId,
    /// Non-secret settings JSON file, or `-` for stdin.
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,
    /// Secret setting as KEY=VALUE (repeatable).
    #[arg(long = "secret", value_name = "KEY=VALUE", value_parser = parse_secret_arg)]
    secrets: Vec<(String, String)>,
    /// Host-supplied update timestamp (RFC 3339).
    #[arg(long = "updated-at", value_name = "RFC3339", value_parser = parse_timestamp_arg)]
    updated_at: Option<Timestamp>,
}

/// Arguments for `tenant resolve`.
#[derive(Args, Debug)]
struct ResolveCommand {
    /// Host-injected organization id.
    #[arg(long, value_name = "ORG_ID", allow_negative_numbers = true)]
    trusted: Option<i64>,
    /// Caller identity token (JWT).
    #[arg(long, value_name = "JWT")]
    token: Option<String>,
    /// Tenant id supplied in the request query string.
    #[arg(long = "query-tenant", value_name = "VALUE")]
    query_tenant: Option<String>,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Result of `settings reconcile`.
#[derive(Debug, Serialize)]
struct ReconcileReport {
    /// Tenant id.
    tenant: TenantId,
    /// How the effective settings were obtained.
    outcome: &'static str,
    /// True when a write-back reached the store.
    persisted: bool,
    /// Derived configuration without secret values.
    config: ConfigView,
    /// Names of the effective secrets.
    secret_keys: Vec<String>,
    /// Storage readiness plus gateway warnings.
    health: HealthReport,
}

/// Secret-free view of a [`TenantConfig`].
#[derive(Debug, Serialize)]
struct ConfigView {
    /// External API URL.
    api_url: String,
    /// True when an API key is present.
    api_key_configured: bool,
    /// Bucket name.
    bucket: String,
    /// Object-key prefix.
    prefix: String,
    /// Upload limit in megabytes.
    max_upload_size_mb: u64,
    /// Upload limit in bytes.
    max_upload_size_bytes: u64,
    /// True when a service-account credential is present.
    service_account_configured: bool,
}

impl ConfigView {
    /// Builds the view from a derived config.
    fn from_config(config: &TenantConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            api_key_configured: !config.api_key.is_blank(),
            bucket: config.storage.bucket.clone(),
            prefix: config.storage.prefix.clone(),
            max_upload_size_mb: config.storage.max_upload_size_mb,
            max_upload_size_bytes: config.storage.max_upload_size_bytes,
            service_account_configured: config.storage.has_credentials(),
        }
    }
}

/// Result of `settings show`.
#[derive(Debug, Serialize)]
struct StoredSettingsView {
    /// Tenant id.
    tenant: TenantId,
    /// Timestamp of the last accepted write.
    updated_at: Option<Timestamp>,
    /// Non-secret settings.
    json: Value,
    /// Names of stored secrets.
    secret_keys: Vec<String>,
    /// Recorded provisioned baseline.
    provisioned: Option<BaselineView>,
    /// Fields dropped because they could not be decoded.
    dropped: Vec<String>,
}

/// Secret-free view of a provisioned baseline.
#[derive(Debug, Serialize)]
struct BaselineView {
    /// Timestamp the baseline was supplied with.
    updated_at: Option<Timestamp>,
    /// Baseline non-secret settings.
    json: Value,
    /// Names of baseline secrets.
    secret_keys: Vec<String>,
}

impl StoredSettingsView {
    /// Builds the view from a stored record.
    fn from_record(tenant: TenantId, record: &PersistedSettingsRecord, dropped: Vec<String>) -> Self {
        Self {
            tenant,
            updated_at: record.updated_at,
            json: json_view(&record.json_data),
            secret_keys: secret_keys(&record.secure_data),
            provisioned: record.provisioned.as_ref().map(|baseline| BaselineView {
                updated_at: baseline.updated_at,
                json: json_view(&baseline.json_data),
                secret_keys: secret_keys(&baseline.secure_data),
            }),
            dropped,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let loaded = match &cli.command {
        Commands::Config {
            ..
        } => AssetlogConfig::load(cli.config.as_deref()),
        _ => AssetlogConfig::load_or_default(cli.config.as_deref()),
    };
    let config = loaded.map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    init_logging(&config.logging.filter)?;

    match cli.command {
        Commands::Settings {
            command,
        } => command_settings(command, &config).await,
        Commands::Tenant {
            command,
        } => command_tenant(command),
        Commands::Health(args) => command_health(&args, &config).await,
        Commands::Config {
            command,
        } => command_config(&command, &config),
    }
}

/// Installs the stderr `tracing` subscriber; `RUST_LOG` overrides the config.
fn init_logging(filter: &str) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|err| CliError::new(format!("invalid log filter: {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| CliError::new(format!("logging init failed: {err}")))
}

// ============================================================================
// SECTION: Settings Commands
// ============================================================================

/// Dispatches settings subcommands.
async fn command_settings(command: SettingsCommand, config: &AssetlogConfig) -> CliResult<ExitCode> {
    match command {
        SettingsCommand::Reconcile(command) => command_settings_reconcile(command, config).await,
        SettingsCommand::Show(args) => {
            let store = open_store(config).await?;
            command_settings_show(&store, args.tenant)
        }
        SettingsCommand::Rebaseline(args) => {
            let store = open_store(config).await?;
            command_settings_rebaseline(&store, args.tenant)
        }
        SettingsCommand::Tenants => {
            let store = open_store(config).await?;
            command_settings_tenants(&store)
        }
    }
}

/// Executes `settings reconcile`.
async fn command_settings_reconcile(
    command: ReconcileCommand,
    config: &AssetlogConfig,
) -> CliResult<ExitCode> {
    let json = read_settings_json(command.json.as_deref())?;
    let secrets: SecretMap = command.secrets.into_iter().collect();
    let incoming = SettingsPayload::new(json, secrets, command.updated_at);
    let gateway = build_gateway(config).await;
    let loaded = gateway.reconcile_and_load_until(command.tenant, incoming, shutdown_signal()).await;
    let report = reconcile_report(command.tenant, &loaded, config.storage.local_override_enabled());
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `settings show`.
fn command_settings_show(store: &SqliteSettingsStore, tenant: TenantId) -> CliResult<ExitCode> {
    let salvaged = store
        .load_salvaged(tenant)
        .map_err(|err| CliError::new(format!("settings load failed: {err}")))?
        .ok_or_else(|| no_settings(tenant))?;
    write_json(&StoredSettingsView::from_record(tenant, &salvaged.record, salvaged.dropped))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `settings rebaseline`.
fn command_settings_rebaseline(store: &SqliteSettingsStore, tenant: TenantId) -> CliResult<ExitCode> {
    let record = store
        .load(tenant)
        .map_err(|err| CliError::new(format!("settings load failed: {err}")))?
        .ok_or_else(|| no_settings(tenant))?;
    let baseline = ProvisionedBaseline {
        json_data: record.json_data.clone(),
        secure_data: record.secure_data.clone(),
        updated_at: record.updated_at,
    };
    let request =
        SaveRequest::new(record.to_payload(), Some(record), system_now()?).with_provisioned(baseline);
    store
        .save(tenant, &request)
        .map_err(|err| CliError::new(format!("settings save failed: {err}")))?;
    tracing::info!(tenant = %tenant, "provisioned baseline replaced");
    write_stdout_line(&format!("tenant {tenant}: provisioned baseline replaced with live settings"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `settings tenants`.
fn command_settings_tenants(store: &SqliteSettingsStore) -> CliResult<ExitCode> {
    let tenants =
        store.tenants().map_err(|err| CliError::new(format!("tenant listing failed: {err}")))?;
    for tenant in tenants {
        write_stdout_line(&tenant.to_string())
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Tenant, Health, and Config Commands
// ============================================================================

/// Dispatches tenant subcommands.
fn command_tenant(command: TenantCommand) -> CliResult<ExitCode> {
    match command {
        TenantCommand::Resolve(command) => {
            let context = RequestContext {
                trusted_org_id: command.trusted,
                identity_token: command.token,
                query_tenant: command.query_tenant,
            };
            let tenant = resolve_tenant(&context).map_err(|err| CliError::new(err.to_string()))?;
            write_stdout_line(&tenant.to_string())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes `health`; exits non-zero unless storage is fully configured.
async fn command_health(args: &TenantArgs, config: &AssetlogConfig) -> CliResult<ExitCode> {
    let gateway = build_gateway(config).await;
    let loaded = gateway
        .reconcile_and_load_until(args.tenant, SettingsPayload::default(), shutdown_signal())
        .await;
    let report = HealthReport::from_loaded(&loaded, config.storage.local_override_enabled());
    write_json(&report)?;
    if report.is_fully_configured() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

/// Executes config subcommands.
fn command_config(command: &ConfigCommand, config: &AssetlogConfig) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check => {
            let mut lines = vec!["config ok".to_string()];
            for candidate in config.store.path_candidates() {
                lines.push(format!("store candidate: {}", candidate.display()));
            }
            lines.push(format!(
                "local storage override: {}",
                config.storage.local_override_enabled()
            ));
            for line in lines {
                write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the first usable `SQLite` store candidate off the async runtime.
async fn open_store(config: &AssetlogConfig) -> CliResult<SqliteSettingsStore> {
    let candidates = config.store.path_candidates();
    let base = config.store.sqlite_config();
    tokio::task::spawn_blocking(move || SqliteSettingsStore::open_first(&candidates, &base))
        .await
        .map_err(|err| CliError::new(format!("store open join failed: {err}")))?
        .map_err(|err| CliError::new(format!("settings store unavailable: {err}")))
}

/// Builds a gateway, degrading to a store-less gateway when opening fails.
async fn build_gateway(config: &AssetlogConfig) -> SettingsGateway {
    let io_timeout = config.gateway.io_timeout();
    match open_store(config).await {
        Ok(store) => SettingsGateway::new(Arc::new(store), io_timeout),
        Err(err) => {
            tracing::warn!(error = %err, "continuing without a settings store");
            SettingsGateway::unavailable(io_timeout)
        }
    }
}

/// Completes on Ctrl-C; never completes when the handler cannot be installed.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Builds the `settings reconcile` report.
fn reconcile_report(tenant: TenantId, loaded: &LoadedSettings, local_override: bool) -> ReconcileReport {
    ReconcileReport {
        tenant,
        outcome: loaded.outcome.as_str(),
        persisted: loaded.persisted,
        config: ConfigView::from_config(&loaded.config),
        secret_keys: secret_keys(&loaded.effective.secrets),
        health: HealthReport::from_loaded(loaded, local_override),
    }
}

/// Reads settings JSON from a file or stdin, bounded in size.
fn read_settings_json(source: Option<&Path>) -> CliResult<Vec<u8>> {
    let Some(source) = source else {
        return Ok(Vec::new());
    };
    let limit = u64::try_from(MAX_SETTINGS_JSON_BYTES).unwrap_or(u64::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    let read = if source == Path::new(STDIN_MARKER) {
        std::io::stdin().lock().take(limit).read_to_end(&mut bytes)
    } else {
        File::open(source).and_then(|file| file.take(limit).read_to_end(&mut bytes))
    };
    read.map_err(|err| {
        CliError::new(format!("failed to read settings json {}: {err}", source.display()))
    })?;
    if bytes.len() > MAX_SETTINGS_JSON_BYTES {
        return Err(CliError::new(format!(
            "settings json exceeds size limit of {MAX_SETTINGS_JSON_BYTES} bytes"
        )));
    }
    Ok(bytes)
}

/// Parses a `KEY=VALUE` secret argument.
fn parse_secret_arg(value: &str) -> Result<(String, String), String> {
    let (key, secret) =
        value.split_once('=').ok_or_else(|| "secret must be KEY=VALUE".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("secret key must be non-empty".to_string());
    }
    Ok((key.to_string(), secret.to_string()))
}

/// Parses an RFC 3339 timestamp argument.
fn parse_timestamp_arg(value: &str) -> Result<Timestamp, String> {
    Timestamp::parse(value).map_err(|err| err.to_string())
}

/// Renders stored JSON bytes for display; unparsable bytes become a string.
fn json_view(bytes: &[u8]) -> Value {
    if bytes.trim_ascii().is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Returns secret key names.
fn secret_keys(secrets: &SecretMap) -> Vec<String> {
    secrets.keys().map(str::to_string).collect()
}

/// Returns the current time as a [`Timestamp`].
fn system_now() -> CliResult<Timestamp> {
    Timestamp::from_offset_date_time(OffsetDateTime::now_utc())
        .map_err(|err| CliError::new(format!("system clock unusable: {err}")))
}

/// Builds the missing-record error.
fn no_settings(tenant: TenantId) -> CliError {
    CliError::new(format!("no settings stored for tenant {tenant}"))
}

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("json output failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
