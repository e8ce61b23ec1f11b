use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

use crate::monitoring::prometheus_enabled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("API 调用配额已用尽: 窗口 {window_secs}s 内最多 {max_calls} 次")]
pub struct QuotaExceeded {
    pub max_calls: u64,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterSnapshot {
    pub total: u64,
    pub rejected: u64,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    calls: u64,
}

/// 外部服务调用计数器，所有并发交易共享同一个实例。
#[derive(Debug)]
pub struct ApiMeter {
    total: AtomicU64,
    rejected: AtomicU64,
    quota: Option<(u64, Duration)>,
    window: Mutex<Window>,
}

impl ApiMeter {
    pub fn unlimited() -> Self {
        Self::with_quota(None)
    }

    pub fn new(max_calls_per_window: Option<u64>, window: Duration) -> Self {
        let window = if window.is_zero() {
            Duration::from_secs(1)
        } else {
            window
        };
        Self::with_quota(max_calls_per_window.filter(|max| *max > 0).map(|max| (max, window)))
    }

    fn with_quota(quota: Option<(u64, Duration)>) -> Self {
        Self {
            total: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            quota,
            window: Mutex::new(Window {
                started: Instant::now(),
                calls: 0,
            }),
        }
    }

    /// 记录一次即将发出的调用；超出窗口配额时立即失败，不排队。
    pub fn acquire(&self, service: &'static str) -> Result<u64, QuotaExceeded> {
        if let Some((max_calls, window)) = self.quota {
            let mut state = self.window.lock();
            let now = Instant::now();
            if now.duration_since(state.started) >= window {
                state.started = now;
                state.calls = 0;
            }
            if state.calls >= max_calls {
                drop(state);
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "network::meter",
                    service,
                    max_calls,
                    window_secs = window.as_secs(),
                    "API 调用超出配额"
                );
                return Err(QuotaExceeded {
                    max_calls,
                    window_secs: window.as_secs(),
                });
            }
            state.calls += 1;
        }

        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        if prometheus_enabled() {
            counter!("swapflow_api_calls_metered_total", "service" => service).increment(1);
        }
        Ok(total)
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            total: self.total.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for ApiMeter {
    fn default() -> Self {
        Self::unlimited()
    }
}
