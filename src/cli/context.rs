use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use time::{UtcOffset, macros::format_description};
use tracing::info;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use swapflow::api::{BuildClient, FeeEstimator, QuoteClient, ServiceClient};
use swapflow::config::{ConfigError, LoggingConfig, LoggingProfile, SwapflowConfig, load_config};
use swapflow::engine::{
    AssetRegistry, LogSink, OrchestratorSettings, ServiceContext, TradeOrchestrator,
};
use swapflow::ledger::RpcLedger;
use swapflow::network::{ApiMeter, build_http_client};
use swapflow::wallet::KeyStore;

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if matches!(config.profile, LoggingProfile::Lean) {
        const QUIET_TARGETS: &[(&str, &str)] = &[
            ("hyper", "warn"),
            ("hyper_util::client::legacy", "warn"),
            ("reqwest", "info"),
            ("solana_rpc_client", "info"),
        ];
        for (module, level) in QUIET_TARGETS {
            if !config.level.contains(module) {
                if let Ok(directive) = format!("{module}={level}").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
    }

    if matches!(config.profile, LoggingProfile::Verbose) {
        const VERBOSE_TARGETS: &[(&str, &str)] = &[
            ("api::quote", "debug"),
            ("api::build", "debug"),
            ("engine::poller", "debug"),
            ("engine::orchestrator", "debug"),
            ("latency", "info"),
        ];
        for (module, level) in VERBOSE_TARGETS {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `swapflow --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<SwapflowConfig, ConfigError> {
    load_config(path)
}

/// 由配置显式构造的全部外部依赖；所有交易共享同一份。
pub struct Services {
    pub quotes: Arc<QuoteClient>,
    pub fees: Arc<FeeEstimator>,
    pub ledger: Arc<RpcLedger>,
    pub assets: Arc<AssetRegistry>,
    pub meter: Arc<ApiMeter>,
    pub orchestrator: TradeOrchestrator,
}

pub fn build_services(config: &SwapflowConfig) -> Result<Services> {
    let services = &config.services;
    let logging = &config.global.logging;

    let http = build_http_client(
        config.global.proxy.as_deref(),
        Duration::from_millis(services.connect_timeout_ms),
    )?;
    let meter = Arc::new(ApiMeter::new(
        config.metering.max_calls_per_window,
        Duration::from_secs(config.metering.window_secs),
    ));
    let service = ServiceClient::new(
        http,
        Arc::clone(&meter),
        services.api_key.as_deref(),
        logging.profile,
    );

    let quotes = Arc::new(QuoteClient::new(
        service.clone(),
        services.quote_url.clone(),
        Duration::from_millis(services.quote_timeout_ms),
        logging.slow_quote_warn_ms,
    ));
    let fees = Arc::new(FeeEstimator::new(
        service.clone(),
        services.fee_url.clone(),
        Duration::from_millis(services.fee_timeout_ms),
    ));
    let builder = Arc::new(BuildClient::new(
        service,
        services.build_url.clone(),
        Duration::from_millis(services.build_timeout_ms),
        logging.slow_build_warn_ms,
    ));

    let rpc_url = config.global.rpc_url().to_string();
    info!(target: "ledger::rpc", rpc_url = %rpc_url, "使用 RPC 节点");
    let ledger = Arc::new(RpcLedger::new(
        rpc_url,
        Duration::from_millis(config.execution.rpc_timeout_ms),
        config.execution.skip_preflight,
    ));
    let assets = Arc::new(
        AssetRegistry::from_config(&config.assets, ledger.clone()).map_err(|err| anyhow!(err))?,
    );
    let keys = KeyStore::from_env(config.global.wallet.wallet_keys.clone());

    let context = ServiceContext {
        quotes: quotes.clone(),
        fees: fees.clone(),
        builder,
        ledger: ledger.clone(),
        keys: Arc::new(keys),
        assets: assets.clone(),
        meter: Arc::clone(&meter),
        sink: Arc::new(LogSink),
    };
    let orchestrator = TradeOrchestrator::new(context, OrchestratorSettings::from_config(config));

    Ok(Services {
        quotes,
        fees,
        ledger,
        assets,
        meter,
        orchestrator,
    })
}
