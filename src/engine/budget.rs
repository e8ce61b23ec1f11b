use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

const MAX_BUDGET: Duration = Duration::from_secs(7 * 24 * 3_600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BudgetExhausted {
    #[error("交易时间预算已用尽")]
    Expired,
    #[error("交易已被调用方取消")]
    Cancelled,
}

/// 单笔交易的时间预算：截止时间加取消令牌，沿整个流水线传递。
#[derive(Debug, Clone)]
pub struct TradeBudget {
    deadline: Instant,
    cancel: CancellationToken,
}

impl TradeBudget {
    pub fn new(timeout: Duration) -> Self {
        Self::with_token(timeout, CancellationToken::new())
    }

    pub fn with_token(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout.min(MAX_BUDGET),
            cancel,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn check(&self) -> Result<(), BudgetExhausted> {
        if self.cancel.is_cancelled() {
            Err(BudgetExhausted::Cancelled)
        } else if Instant::now() >= self.deadline {
            Err(BudgetExhausted::Expired)
        } else {
            Ok(())
        }
    }

    /// 在预算内运行 `fut`；取消或到期时直接丢弃该 future。
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, BudgetExhausted>
    where
        F: Future,
    {
        self.run_until(self.deadline, fut).await
    }

    /// 与 `run` 相同，但截止时间取 `deadline` 与预算中较早者。
    pub async fn run_until<F>(&self, deadline: Instant, fut: F) -> Result<F::Output, BudgetExhausted>
    where
        F: Future,
    {
        self.check()?;
        let deadline = deadline.min(self.deadline);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BudgetExhausted::Cancelled),
            result = timeout_at(deadline, fut) => result.map_err(|_| BudgetExhausted::Expired),
        }
    }
}
