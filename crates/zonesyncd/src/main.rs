// # zonesyncd - Zone Sync Daemon
//
// Thin integration layer: all sync logic lives in zonesync-core.
//
// The zonesyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Cloudflare source, the ClouDNS target and the engine
// 4. Running a cycle whenever one is due, until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Cloudflare (primary)
// - `CLOUDFLARE_API_TOKEN`: API token with Zone:DNS:Read
// - `CLOUDFLARE_ZONE_ID`: Zone identifier
//
// ### ClouDNS (secondary)
// - `CLOUDNS_AUTH_ID` or `CLOUDNS_SUB_AUTH_ID`: Main or delegated user id
// - `CLOUDNS_AUTH_PASSWORD`: API password
// - `CLOUDNS_DOMAIN_NAME`: Zone apex, e.g. `example.com`
//
// ### Sync
// - `SYNC_INTERVAL`: Seconds between successful cycles (default 3600)
// - `SYNC_MODE`: `full`, `incremental` or `bidirectional` (default incremental)
// - `CONFLICT_STRATEGY`: `source_wins` (default), `target_wins`, `newest_wins`
// - `ENABLE_NOTIFICATIONS`: `true` to POST results to `NOTIFICATION_WEBHOOK`
//
// ### Engine
// - `ZONESYNC_MAX_ATTEMPTS`: Attempts per mutation (default 3)
// - `ZONESYNC_RETRY_DELAY_MS`: Base backoff delay (default 5000, at most 30000)
// - `ZONESYNC_APPLY_BATCH`: Apply up to N same-kind actions concurrently
// - `ZONESYNC_CACHE`: `true` to read the ClouDNS listing through a cache
// - `ZONESYNC_CHECK_INTERVAL_SECS`: How often to check whether a sync is due (default 60)
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token
// export CLOUDFLARE_ZONE_ID=023e105f4ecef8ad9ca31a8372d0c353
// export CLOUDNS_AUTH_ID=1234
// export CLOUDNS_AUTH_PASSWORD=your_password
// export CLOUDNS_DOMAIN_NAME=example.com
//
// zonesyncd
// ```

mod notify;

use anyhow::{Context, Result};
use chrono::Utc;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::config::{ApplyMode, ClouDnsAuth, SourceConfig, SyncConfig, TargetConfig};
use zonesync_core::engine::{CycleOutcome, SyncEngine};
use zonesync_core::plan::{ConflictStrategy, SyncMode, SyncModeConfig};
use zonesync_provider_cloudflare::CloudflareSource;
use zonesync_provider_cloudns::ClouDnsTarget;

use notify::{TracingMetrics, WebhookNotifier};

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ZonesyncExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<ZonesyncExitCode> for ExitCode {
    fn from(code: ZonesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Default seconds between checks for a due sync
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Application configuration
struct Config {
    sync: SyncConfig,
    check_interval_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{key} is required"));

        let auth = match (get("CLOUDNS_AUTH_ID"), get("CLOUDNS_SUB_AUTH_ID")) {
            (Some(_), Some(_)) => anyhow::bail!("Set only one of CLOUDNS_AUTH_ID and CLOUDNS_SUB_AUTH_ID"),
            (Some(id), None) => ClouDnsAuth::AuthId(id),
            (None, Some(id)) => ClouDnsAuth::SubAuthId(id),
            (None, None) => anyhow::bail!("CLOUDNS_AUTH_ID or CLOUDNS_SUB_AUTH_ID is required"),
        };

        let mut sync = SyncConfig::new(
            SourceConfig::Cloudflare {
                api_token: required("CLOUDFLARE_API_TOKEN")?,
                zone_id: required("CLOUDFLARE_ZONE_ID")?,
            },
            TargetConfig::Cloudns {
                auth,
                auth_password: required("CLOUDNS_AUTH_PASSWORD")?,
                domain_name: required("CLOUDNS_DOMAIN_NAME")?,
            },
        );

        let mode: SyncMode = parse(&get, "SYNC_MODE")?.unwrap_or_default();
        let strategy: ConflictStrategy = parse(&get, "CONFLICT_STRATEGY")?.unwrap_or_default();
        sync.sync = SyncModeConfig::new(mode).with_conflict_strategy(strategy);

        if let Some(secs) = parse(&get, "SYNC_INTERVAL")? {
            sync.engine.sync_interval_secs = secs;
        }
        if let Some(attempts) = parse(&get, "ZONESYNC_MAX_ATTEMPTS")? {
            sync.engine.max_attempts = attempts;
        }
        if let Some(delay) = parse(&get, "ZONESYNC_RETRY_DELAY_MS")? {
            sync.engine.retry_base_delay_ms = delay;
        }
        if let Some(width) = parse(&get, "ZONESYNC_APPLY_BATCH")? {
            sync.engine.apply = ApplyMode::Batched { width };
        }
        sync.engine.cache_enabled = flag(&get, "ZONESYNC_CACHE");

        sync.notifications.enabled = flag(&get, "ENABLE_NOTIFICATIONS");
        sync.notifications.webhook_url = get("NOTIFICATION_WEBHOOK");

        Ok(Self {
            sync,
            check_interval_secs: parse(&get, "ZONESYNC_CHECK_INTERVAL_SECS")?.unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            log_level: get("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        if self.check_interval_secs == 0 {
            anyhow::bail!("ZONESYNC_CHECK_INTERVAL_SECS must be > 0");
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}"))
        })
        .transpose()
}

fn flag(get: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    get(key).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    info!("Starting zonesyncd daemon");
    info!(
        "Syncing {} from {} to {} in {} mode",
        config.sync.target.zone_name(),
        config.sync.source.type_name(),
        config.sync.target.type_name(),
        config.sync.sync.mode
    );

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonesyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let engine = match build_engine(&config) {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return ZonesyncExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(engine, &config).await {
            error!("Daemon error: {:#}", e);
            ZonesyncExitCode::RuntimeError
        } else {
            ZonesyncExitCode::CleanShutdown
        }
    })
    .into()
}

fn build_engine(config: &Config) -> Result<SyncEngine> {
    let source = CloudflareSource::from_config(&config.sync.source)?;
    let target = ClouDnsTarget::from_config(&config.sync.target)?;

    let mut engine = SyncEngine::new(Box::new(source), Box::new(target), &config.sync)?
        .with_metrics(Arc::new(TracingMetrics));

    if config.sync.notifications.enabled
        && let Some(url) = &config.sync.notifications.webhook_url
    {
        info!("Sync notifications enabled");
        engine = engine.with_notifier(Arc::new(WebhookNotifier::new(url.clone())?));
    }
    Ok(engine)
}

/// Check for a due cycle on every tick until a shutdown signal arrives.
///
/// A running cycle is never interrupted; the signal is handled once it ends.
async fn run_daemon(engine: SyncEngine, config: &Config) -> Result<()> {
    let mut shutdown = Shutdown::install()?;
    let interval = engine.sync_interval();

    let mut ticker = tokio::time::interval(Duration::from_secs(config.check_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Ready: syncing every {}s, checking every {}s",
        interval.as_secs(),
        config.check_interval_secs
    );

    loop {
        tokio::select! {
            signal = shutdown.recv() => {
                info!("Received shutdown signal: {}", signal);
                break;
            }
            _ = ticker.tick() => run_if_due(&engine, interval).await,
        }
    }

    info!("Shutting down daemon");
    Ok(())
}

async fn run_if_due(engine: &SyncEngine, interval: Duration) {
    match engine.run_if_due(interval).await {
        Ok(CycleOutcome::Completed(report)) => {
            if report.failed() > 0 {
                warn!(
                    "Sync finished with {} failed action(s) out of {}",
                    report.failed(),
                    report.records_processed()
                );
            }
            match serde_json::to_string(&engine.status()) {
                Ok(status) => debug!("Status: {}", status),
                Err(e) => debug!("Failed to serialize status: {}", e),
            }
        }
        Ok(CycleOutcome::NotDue { next_due }) => {
            debug!("Next sync in {}s", (next_due - Utc::now()).num_seconds().max(0));
        }
        Ok(CycleOutcome::AlreadyRunning) => debug!("Previous sync still running"),
        Err(e) => error!("Sync cycle failed [{}]: {}", e.classification_code(), e),
    }
}

/// Shutdown signal listener, installed before the first cycle starts
#[cfg(unix)]
struct Shutdown {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl Shutdown {
    fn install() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?,
            sigint: signal(SignalKind::interrupt())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Fallback for non-Unix platforms: CTRL-C only
#[cfg(not(unix))]
struct Shutdown;

#[cfg(not(unix))]
impl Shutdown {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
