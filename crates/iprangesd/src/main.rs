// # iprangesd - Cloud Provider IP Ranges Daemon
//
// The iprangesd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the provider adapters and the HTTP fetcher
// 4. Building the IpRangeManager and keeping it fresh until shutdown
//
// All fetching, parsing and caching logic lives in ipranges-core and the
// adapter crates.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Manager
// - `IPRANGES_DISABLE_ALL`: Disable every provider (true/false, default false)
// - `IPRANGES_PULL_INTERVAL_SECS`: Seconds between refresh cycles (default 86400)
// - `IPRANGES_FETCH_TIMEOUT_SECS`: Upper bound of one document fetch (default 30)
//
// ### Providers
// - `IPRANGES_{AWS,GCP,DATADOG}_ENABLED`: Enable a provider (default true)
// - `IPRANGES_{AWS,GCP,DATADOG}_URL`: Override a provider's document URL
//
// ### Logging
// - `IPRANGES_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export IPRANGES_PULL_INTERVAL_SECS=3600
// export IPRANGES_DATADOG_ENABLED=false
//
// iprangesd
// ```

use anyhow::Result;
use ipranges_core::{CloudProviderName, CloudProvidersConfig, IpRangeManager, ProviderRegistry};
use ipranges_http::HttpFetcher;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for the refresh loop to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum IprangesExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IprangesExitCode> for ExitCode {
    fn from(code: IprangesExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    providers: CloudProvidersConfig,
    log_level: Level,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults; set but malformed ones are errors.
    fn from_env() -> Result<Self> {
        let mut providers = CloudProvidersConfig::default();

        if let Some(disable_all) = env_parse_with("IPRANGES_DISABLE_ALL", parse_bool)? {
            providers.disable_all = disable_all;
        }
        if let Some(secs) = env_parse::<u64>("IPRANGES_PULL_INTERVAL_SECS")? {
            providers.pull_interval_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("IPRANGES_FETCH_TIMEOUT_SECS")? {
            providers.fetch_timeout_secs = secs;
        }

        for name in CloudProviderName::ALL {
            let prefix = format!("IPRANGES_{}", name.as_str().to_uppercase());
            let provider = providers.provider_mut(name);

            if let Some(enabled) = env_parse_with(&format!("{prefix}_ENABLED"), parse_bool)? {
                provider.enabled = enabled;
            }
            if let Ok(url) = env::var(format!("{prefix}_URL")) {
                provider.ip_ranges_url = url.trim().to_string();
            }
        }

        let log_level = match env::var("IPRANGES_LOG_LEVEL") {
            Ok(level) => parse_log_level(&level)?,
            Err(_) => Level::INFO,
        };

        Ok(Self {
            providers,
            log_level,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.providers.validate()?;

        if self.providers.pull_interval_secs == 0 {
            anyhow::bail!("IPRANGES_PULL_INTERVAL_SECS must be greater than 0");
        }
        if std::time::Instant::now()
            .checked_add(self.providers.pull_interval())
            .is_none()
        {
            anyhow::bail!(
                "IPRANGES_PULL_INTERVAL_SECS ({}) is too large",
                self.providers.pull_interval_secs
            );
        }

        if self.providers.fetch_timeout_secs >= self.providers.pull_interval_secs {
            eprintln!(
                "WARNING: IPRANGES_FETCH_TIMEOUT_SECS ({}) is not shorter than \
                 IPRANGES_PULL_INTERVAL_SECS ({}).",
                self.providers.fetch_timeout_secs, self.providers.pull_interval_secs
            );
        }

        Ok(())
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_parse_with(name, |value| {
        value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
    })
}

fn env_parse_with<T>(name: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => parse(value.trim())
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, value, e)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("{} cannot be read: {}", name, e)),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

fn parse_log_level(value: &str) -> Result<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "IPRANGES_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return IprangesExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return IprangesExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IprangesExitCode::ConfigError.into();
    }

    info!("Starting iprangesd daemon");
    info!(
        "Configuration loaded: providers={:?}, pull_interval={:?}, fetch_timeout={:?}",
        config.providers.enabled_providers(),
        config.providers.pull_interval(),
        config.providers.fetch_timeout()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IprangesExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            IprangesExitCode::RuntimeError
        } else {
            IprangesExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "aws")]
    {
        info!("Registering AWS adapter");
        ipranges_provider_aws::register(&registry);
    }

    #[cfg(feature = "gcp")]
    {
        info!("Registering GCP adapter");
        ipranges_provider_gcp::register(&registry);
    }

    #[cfg(feature = "datadog")]
    {
        info!("Registering Datadog adapter");
        ipranges_provider_datadog::register(&registry);
    }

    for name in config.providers.enabled_providers() {
        if !registry.has_provider(name) {
            warn!("{} is enabled but this build has no adapter for it", name);
        }
    }

    let fetcher = Arc::new(HttpFetcher::with_timeout(config.providers.fetch_timeout()));
    let manager = Arc::new(IpRangeManager::new(config.providers, &registry, fetcher).await?);

    for name in CloudProviderName::ALL {
        match manager.provider_status(name) {
            Some(status) => info!(
                "{}: version {}, {} services: {:?}",
                name,
                status.version,
                status.service_count,
                manager.get_service_list(name)
            ),
            None => info!("{}: no ip ranges", name),
        }
    }

    let periodic = manager.start_periodic_pull()?;
    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, periodic.shutdown()).await {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("Periodic pull did not stop within {:?}", SHUTDOWN_TIMEOUT),
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
