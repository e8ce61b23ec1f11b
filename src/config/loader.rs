use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::SwapflowConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["swapflow.toml", "config/swapflow.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// 按 `--config` 或默认路径加载配置；找不到文件时返回全默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<SwapflowConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            debug!(target: "config", path = %candidate.display(), "已加载配置文件");
            return Ok(config);
        }
    }

    debug!(target: "config", "未找到配置文件，使用默认配置");
    Ok(SwapflowConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<SwapflowConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&contents).map_err(|err| match err {
        ParseFailure::Toml(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Invalid(message) => ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        },
    })?;

    Ok(Some(config))
}

#[derive(Debug)]
enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(String),
}

fn parse_config(contents: &str) -> Result<SwapflowConfig, ParseFailure> {
    let config: SwapflowConfig = toml::from_str(contents).map_err(ParseFailure::Toml)?;
    config.validate().map_err(ParseFailure::Invalid)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FeeLevel;
    use crate::ledger::Commitment;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").expect("parse");
        assert_eq!(config.execution.fee_level, FeeLevel::High);
        assert_eq!(config.execution.commitment, Commitment::Confirmed);
        assert_eq!(config.execution.broadcast_max_retries, 2);
        assert_eq!(config.services.quote_max_age_ms, 20_000);
        assert!(config.global.rpc_urls.is_empty());
        assert_eq!(config.global.rpc_url(), "https://api.mainnet-beta.solana.com");
        assert!(!config.prometheus.enable);
    }

    #[test]
    fn parses_full_document() {
        let raw = r#"
            [global]
            rpc_urls = ["http://a:8899", "http://b:8899", "http://a:8899"]

            [global.logging]
            level = "debug"
            json = true
            profile = "verbose"

            [[global.wallet.wallet_keys]]
            remark = "main"
            encrypted = "AAAA"

            [services]
            quote_url = "http://localhost:9000/quote"
            quote_max_age_ms = 5000

            [execution]
            fee_level = "medium"
            commitment = "finalized"
            broadcast_max_retries = 3
            max_polls = 10

            [assets.BONK]
            mint = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263"
            decimals = 5

            [metering]
            max_calls_per_window = 30
            window_secs = 60
        "#;
        let config = parse_config(raw).expect("parse");
        assert_eq!(config.global.rpc_urls, vec!["http://a:8899", "http://b:8899"]);
        assert!(config.global.logging.json);
        assert!(config.global.logging.profile.is_verbose());
        assert_eq!(config.global.wallet.wallet_keys[0].remark, "main");
        assert_eq!(config.services.quote_max_age_ms, 5_000);
        assert_eq!(config.execution.fee_level, FeeLevel::Medium);
        assert_eq!(config.execution.commitment, Commitment::Finalized);
        assert_eq!(config.execution.broadcast_max_retries, 3);
        assert_eq!(config.assets["BONK"].decimals, Some(5));
        assert_eq!(config.metering.max_calls_per_window, Some(30));
    }

    #[test]
    fn single_rpc_url_string_is_accepted() {
        let config = parse_config("[global]\nrpc_urls = \" http://localhost:8899 \"\n")
            .expect("parse");
        assert_eq!(config.global.primary_rpc_url(), Some("http://localhost:8899"));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let result = parse_config("[execution]\npoll_interval_ms = 0\n");
        assert!(matches!(result, Err(ParseFailure::Invalid(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some(PathBuf::from("/nonexistent/swapflow.toml"))).expect("load");
        assert_eq!(config.execution.max_polls, 60);
    }
}
