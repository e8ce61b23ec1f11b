use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::serde_helpers::u64_from_string_or_number;
use super::{ServiceClient, ServiceError};

const SERVICE: &str = "fees";

/// 单笔交易选用的优先费档位，默认 `high`。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FeeLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl FeeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for FeeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 每 CU 的优先费（micro-lamports），三档必须单调不减。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFeeTiers {
    #[serde(with = "u64_from_string_or_number")]
    pub low: u64,
    #[serde(with = "u64_from_string_or_number")]
    pub medium: u64,
    #[serde(with = "u64_from_string_or_number")]
    pub high: u64,
}

impl PriorityFeeTiers {
    pub fn is_ordered(&self) -> bool {
        self.low <= self.medium && self.medium <= self.high
    }

    pub fn select(&self, level: FeeLevel) -> u64 {
        match level {
            FeeLevel::Low => self.low,
            FeeLevel::Medium => self.medium,
            FeeLevel::High => self.high,
        }
    }
}

#[async_trait]
pub trait FeeSource: Send + Sync {
    async fn priority_fees(&self) -> Result<PriorityFeeTiers, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct FeeEstimator {
    service: ServiceClient,
    url: String,
    timeout: Duration,
}

impl FeeEstimator {
    pub fn new(service: ServiceClient, url: String, timeout: Duration) -> Self {
        Self {
            service,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl FeeSource for FeeEstimator {
    async fn priority_fees(&self) -> Result<PriorityFeeTiers, ServiceError> {
        let no_query: &[(&str, &str)] = &[];
        let response = self
            .service
            .get(SERVICE, &self.url, no_query, self.timeout)
            .await?;
        let tiers: PriorityFeeTiers = serde_json::from_value(response.data)
            .map_err(|err| ServiceError::schema(SERVICE, format!("解析优先费档位失败: {err}")))?;
        if !tiers.is_ordered() {
            return Err(ServiceError::schema(
                SERVICE,
                format!(
                    "优先费档位未按 low <= medium <= high 排列: {}/{}/{}",
                    tiers.low, tiers.medium, tiers.high
                ),
            ));
        }
        info!(
            target: "api::fees",
            low = tiers.low,
            medium = tiers.medium,
            high = tiers.high,
            "已获取优先费档位"
        );
        Ok(tiers)
    }
}
