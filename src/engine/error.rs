use thiserror::Error;

use super::types::TradeStatus;

/// 交易失败分类；每个阶段的组件错误都会映射到其中恰好一种。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("报价不可用: {0}")]
    QuoteUnavailable(String),
    #[error("优先费估算不可用: {0}")]
    FeeUnavailable(String),
    #[error("交易构建失败: {0}")]
    BuildFailed(String),
    #[error("签名密钥不匹配: {0}")]
    SigningKeyMismatch(String),
    #[error("广播被拒绝: {0}")]
    BroadcastRejected(String),
    #[error("广播结果不确定 (共 {attempts} 次尝试): {message}")]
    BroadcastAmbiguous { attempts: u32, message: String },
    #[error("链上执行失败: {0}")]
    OnChainExecutionFailed(String),
    #[error("确认超时，链上状态未知: {0}")]
    ConfirmationTimedOut(String),
}

impl TradeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuoteUnavailable(_) => "QuoteUnavailable",
            Self::FeeUnavailable(_) => "FeeUnavailable",
            Self::BuildFailed(_) => "BuildFailed",
            Self::SigningKeyMismatch(_) => "SigningKeyMismatch",
            Self::BroadcastRejected(_) => "BroadcastRejected",
            Self::BroadcastAmbiguous { .. } => "BroadcastAmbiguous",
            Self::OnChainExecutionFailed(_) => "OnChainExecutionFailed",
            Self::ConfirmationTimedOut(_) => "ConfirmationTimedOut",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::QuoteUnavailable(message)
            | Self::FeeUnavailable(message)
            | Self::BuildFailed(message)
            | Self::SigningKeyMismatch(message)
            | Self::BroadcastRejected(message)
            | Self::OnChainExecutionFailed(message)
            | Self::ConfirmationTimedOut(message) => message,
            Self::BroadcastAmbiguous { message, .. } => message,
        }
    }

    /// 只有广播的模糊错误会在同一笔交易上自动重试。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BroadcastAmbiguous { .. })
    }

    pub fn terminal_status(&self) -> TradeStatus {
        match self {
            Self::ConfirmationTimedOut(_) => TradeStatus::TimedOut,
            _ => TradeStatus::Failed,
        }
    }
}
