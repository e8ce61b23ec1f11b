use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::FeeLevel;
use crate::ledger::Commitment;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwapflowConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// `[assets.<SYMBOL>]`：符号到 mint/精度的映射。
    #[serde(default)]
    pub assets: BTreeMap<String, AssetConfig>,
    #[serde(default)]
    pub metering: MeteringConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl SwapflowConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.execution.poll_interval_ms == 0 {
            return Err("execution.poll_interval_ms 必须大于 0".to_string());
        }
        if self.execution.max_polls == 0 {
            return Err("execution.max_polls 必须大于 0".to_string());
        }
        if self.execution.trade_timeout_ms == 0 {
            return Err("execution.trade_timeout_ms 必须大于 0".to_string());
        }
        for (symbol, asset) in &self.assets {
            if asset.mint.trim().is_empty() {
                return Err(format!("assets.{symbol}.mint 不能为空"));
            }
            if asset.decimals.is_some_and(|decimals| decimals > 18) {
                return Err(format!("assets.{symbol}.decimals 超出范围 (0..=18)"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, deserialize_with = "super::deserialize_rpc_urls")]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GlobalConfig {
    pub fn primary_rpc_url(&self) -> Option<&str> {
        self.rpc_urls.first().map(|s| s.as_str())
    }

    /// 未配置 `rpc_urls` 时回退到主网公共节点。
    pub fn rpc_url(&self) -> &str {
        self.primary_rpc_url().unwrap_or(super::default_rpc_url())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub wallet_keys: Vec<WalletKeyEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WalletKeyEntry {
    pub remark: String,
    pub encrypted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingProfile {
    Lean,
    Verbose,
}

impl Default for LoggingProfile {
    fn default() -> Self {
        Self::Lean
    }
}

impl LoggingProfile {
    pub fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_logging_profile")]
    pub profile: LoggingProfile,
    #[serde(default = "super::default_slow_quote_warn_ms")]
    pub slow_quote_warn_ms: u64,
    #[serde(default = "super::default_slow_build_warn_ms")]
    pub slow_build_warn_ms: u64,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "super::default_quote_url")]
    pub quote_url: String,
    #[serde(default = "super::default_fee_url")]
    pub fee_url: String,
    #[serde(default = "super::default_build_url")]
    pub build_url: String,
    /// 以 `x-api-key` 头发送给三个服务。
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "super::default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
    #[serde(default = "super::default_fee_timeout_ms")]
    pub fee_timeout_ms: u64,
    #[serde(default = "super::default_build_timeout_ms")]
    pub build_timeout_ms: u64,
    #[serde(default = "super::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "super::default_quote_max_age_ms")]
    pub quote_max_age_ms: u64,
}

impl ServicesConfig {
    pub fn quote_max_age(&self) -> Duration {
        Duration::from_millis(self.quote_max_age_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "super::default_fee_level")]
    pub fee_level: FeeLevel,
    #[serde(default = "super::default_commitment")]
    pub commitment: Commitment,
    /// 模糊广播错误后对同一笔签名交易的额外重发次数。
    #[serde(default = "super::default_broadcast_max_retries")]
    pub broadcast_max_retries: u32,
    #[serde(default = "super::default_broadcast_retry_delay_ms")]
    pub broadcast_retry_delay_ms: u64,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "super::default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "super::default_trade_timeout_ms")]
    pub trade_timeout_ms: u64,
    #[serde(default = "super::default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    #[serde(default)]
    pub skip_preflight: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub mint: String,
    #[serde(default)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeteringConfig {
    #[serde(default)]
    pub max_calls_per_window: Option<u64>,
    #[serde(default = "super::default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}
