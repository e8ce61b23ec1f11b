use std::collections::HashSet;

use serde::Deserialize;
use serde::de::Deserializer;

use crate::engine::FeeLevel;
use crate::ledger::Commitment;

pub mod loader;
pub mod types;
pub mod wallet;

pub use loader::*;
pub use types::*;

use self::types as cfg;

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_logging_profile() -> cfg::LoggingProfile {
    cfg::LoggingProfile::Lean
}

pub(crate) fn default_slow_quote_warn_ms() -> u64 {
    500
}

pub(crate) fn default_slow_build_warn_ms() -> u64 {
    1_000
}

pub(crate) fn default_timezone_offset_hours() -> i8 {
    0
}

pub(crate) fn default_quote_url() -> String {
    "http://127.0.0.1:8080/v1/quote".to_string()
}

pub(crate) fn default_fee_url() -> String {
    "http://127.0.0.1:8080/v1/priority-fees".to_string()
}

pub(crate) fn default_build_url() -> String {
    "http://127.0.0.1:8080/v1/swap".to_string()
}

pub(crate) fn default_quote_timeout_ms() -> u64 {
    2_000
}

pub(crate) fn default_fee_timeout_ms() -> u64 {
    2_000
}

pub(crate) fn default_build_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_connect_timeout_ms() -> u64 {
    3_000
}

pub(crate) fn default_quote_max_age_ms() -> u64 {
    20_000
}

pub(crate) fn default_fee_level() -> FeeLevel {
    FeeLevel::High
}

pub(crate) fn default_commitment() -> Commitment {
    Commitment::Confirmed
}

pub(crate) fn default_broadcast_max_retries() -> u32 {
    2
}

pub(crate) fn default_broadcast_retry_delay_ms() -> u64 {
    500
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    1_000
}

pub(crate) fn default_max_polls() -> u32 {
    60
}

pub(crate) fn default_trade_timeout_ms() -> u64 {
    90_000
}

pub(crate) fn default_rpc_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_window_secs() -> u64 {
    60
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

pub(crate) fn default_rpc_url() -> &'static str {
    "https://api.mainnet-beta.solana.com"
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RpcUrlField {
    Single(String),
    Multiple(Vec<String>),
}

pub(crate) fn deserialize_rpc_urls<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper = Option::<RpcUrlField>::deserialize(deserializer)?;
    let values = match helper {
        Some(RpcUrlField::Single(url)) => vec![url],
        Some(RpcUrlField::Multiple(list)) => list,
        None => Vec::new(),
    };

    let mut seen = HashSet::new();
    Ok(values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && seen.insert(value.clone()))
        .collect())
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            profile: default_logging_profile(),
            slow_quote_warn_ms: default_slow_quote_warn_ms(),
            slow_build_warn_ms: default_slow_build_warn_ms(),
            timezone_offset_hours: default_timezone_offset_hours(),
        }
    }
}

impl Default for cfg::ServicesConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            fee_url: default_fee_url(),
            build_url: default_build_url(),
            api_key: None,
            quote_timeout_ms: default_quote_timeout_ms(),
            fee_timeout_ms: default_fee_timeout_ms(),
            build_timeout_ms: default_build_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            quote_max_age_ms: default_quote_max_age_ms(),
        }
    }
}

impl Default for cfg::ExecutionConfig {
    fn default() -> Self {
        Self {
            fee_level: default_fee_level(),
            commitment: default_commitment(),
            broadcast_max_retries: default_broadcast_max_retries(),
            broadcast_retry_delay_ms: default_broadcast_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            trade_timeout_ms: default_trade_timeout_ms(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            skip_preflight: false,
        }
    }
}

impl Default for cfg::MeteringConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: None,
            window_secs: default_window_secs(),
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}
