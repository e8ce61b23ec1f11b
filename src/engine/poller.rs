use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::budget::{BudgetExhausted, TradeBudget};
use crate::ledger::{Commitment, LedgerRpc, SignatureObservation};
use crate::monitoring::format::short_signature;

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    /// 轮询总时长上限：`max_polls × interval`。
    pub fn window(&self) -> Duration {
        self.interval.saturating_mul(self.max_polls)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Confirmed { slot: u64 },
    Failed { slot: u64, error: String },
    /// 链上状态未知，调用方需要自行复查，不能视为资金损失。
    TimedOut { reason: String },
}

pub struct ConfirmationPoller {
    ledger: Arc<dyn LedgerRpc>,
    policy: PollPolicy,
}

impl ConfirmationPoller {
    pub fn new(ledger: Arc<dyn LedgerRpc>, policy: PollPolicy) -> Self {
        Self { ledger, policy }
    }

    pub async fn wait(
        &self,
        signature: &Signature,
        commitment: Commitment,
        budget: &TradeBudget,
    ) -> ConfirmationStatus {
        let poll_deadline = Instant::now() + self.policy.window();
        let sig_label = signature.to_string();
        let sig_label = short_signature(&sig_label);
        let mut observed_pending = false;

        for poll in 1..=self.policy.max_polls {
            let observation = match budget
                .run_until(
                    poll_deadline,
                    self.ledger.signature_status(signature, commitment),
                )
                .await
            {
                Ok(observation) => observation,
                Err(exhausted) => return timed_out(exhausted, poll, observed_pending),
            };

            match observation {
                Ok(SignatureObservation::Landed { slot }) => {
                    info!(
                        target: "engine::poller",
                        signature = %sig_label,
                        slot,
                        polls = poll,
                        commitment = %commitment,
                        "交易已确认"
                    );
                    return ConfirmationStatus::Confirmed { slot };
                }
                Ok(SignatureObservation::Failed { slot, error }) => {
                    warn!(
                        target: "engine::poller",
                        signature = %sig_label,
                        slot,
                        error = %error,
                        "交易链上执行失败"
                    );
                    return ConfirmationStatus::Failed { slot, error };
                }
                Ok(SignatureObservation::Pending { slot }) => {
                    observed_pending = true;
                    debug!(target: "engine::poller", signature = %sig_label, slot, poll, "等待确认深度");
                }
                Ok(SignatureObservation::NotFound) => {
                    debug!(target: "engine::poller", signature = %sig_label, poll, "尚未观察到交易");
                }
                Err(err) => {
                    warn!(
                        target: "engine::poller",
                        signature = %sig_label,
                        poll,
                        error = %err,
                        "签名状态查询失败，继续轮询"
                    );
                }
            }

            if poll < self.policy.max_polls {
                if let Err(exhausted) = budget
                    .run_until(poll_deadline, tokio::time::sleep(self.policy.interval))
                    .await
                {
                    return timed_out(exhausted, poll, observed_pending);
                }
            }
        }

        ConfirmationStatus::TimedOut {
            reason: format!(
                "no {commitment} status after {} polls{}",
                self.policy.max_polls,
                pending_suffix(observed_pending)
            ),
        }
    }
}

fn timed_out(exhausted: BudgetExhausted, polls: u32, observed_pending: bool) -> ConfirmationStatus {
    ConfirmationStatus::TimedOut {
        reason: format!(
            "{exhausted} after {polls} polls{}",
            pending_suffix(observed_pending)
        ),
    }
}

fn pending_suffix(observed_pending: bool) -> &'static str {
    if observed_pending {
        " (seen by node, below target commitment)"
    } else {
        ""
    }
}
