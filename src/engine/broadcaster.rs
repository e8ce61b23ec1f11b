use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tracing::{info, warn};

use super::budget::TradeBudget;
use super::error::TradeError;
use super::signer::SignedTransaction;
use crate::ledger::LedgerRpc;
use crate::monitoring::events;

#[derive(Debug, Clone, Copy)]
pub struct BroadcastPolicy {
    /// 首次提交之外，对同一笔交易的最大重发次数。
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl BroadcastPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub signature: Signature,
    pub attempts: u32,
    /// `false` 表示节点从未明确接收，需要交给轮询器判断是否已上链。
    pub acknowledged: bool,
    pub last_error: Option<TradeError>,
}

pub struct Broadcaster {
    ledger: Arc<dyn LedgerRpc>,
    policy: BroadcastPolicy,
}

impl Broadcaster {
    pub fn new(ledger: Arc<dyn LedgerRpc>, policy: BroadcastPolicy) -> Self {
        Self { ledger, policy }
    }

    /// 只重发完全相同的已签名交易；节点按签名去重，因此重复提交是安全的。
    pub async fn broadcast(
        &self,
        trade_id: &str,
        signed: &SignedTransaction,
        budget: &TradeBudget,
    ) -> Result<BroadcastReceipt, TradeError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempts = 0u32;
        let mut last_error: Option<TradeError> = None;

        while attempts < max_attempts {
            if let Err(exhausted) = budget.check() {
                if attempts == 0 {
                    return Err(TradeError::BroadcastRejected(format!(
                        "{exhausted} before submission"
                    )));
                }
                break;
            }

            attempts += 1;
            let outcome = budget.run(self.ledger.send_transaction(&signed.transaction)).await;
            match outcome {
                Ok(Ok(signature)) => {
                    events::broadcast_attempt(trade_id, attempts, None);
                    if signature != signed.signature {
                        warn!(
                            target: "engine::broadcaster",
                            trade_id,
                            expected = %signed.signature,
                            returned = %signature,
                            "节点返回的签名与本地签名不一致"
                        );
                    }
                    info!(
                        target: "engine::broadcaster",
                        trade_id,
                        leg = signed.leg,
                        signature = %signed.signature,
                        attempts,
                        "交易已提交"
                    );
                    return Ok(BroadcastReceipt {
                        signature: signed.signature,
                        attempts,
                        acknowledged: true,
                        last_error,
                    });
                }
                Ok(Err(err)) if err.is_ambiguous() => {
                    let message = err.to_string();
                    events::broadcast_attempt(trade_id, attempts, Some(&message));
                    last_error = Some(TradeError::BroadcastAmbiguous { attempts, message });
                }
                Ok(Err(err)) => {
                    if last_error.is_none() {
                        return Err(TradeError::BroadcastRejected(err.to_string()));
                    }
                    // 之前的模糊提交可能已经落地，重复提交被拒绝并不代表失败。
                    warn!(
                        target: "engine::broadcaster",
                        trade_id,
                        attempts,
                        error = %err,
                        "重发被拒绝，转交确认轮询"
                    );
                    break;
                }
                Err(exhausted) => {
                    let message = format!("{exhausted} while awaiting node response");
                    events::broadcast_attempt(trade_id, attempts, Some(&message));
                    last_error = Some(TradeError::BroadcastAmbiguous { attempts, message });
                    break;
                }
            }

            if attempts < max_attempts
                && budget
                    .run(tokio::time::sleep(self.policy.retry_delay))
                    .await
                    .is_err()
            {
                break;
            }
        }

        warn!(
            target: "engine::broadcaster",
            trade_id,
            leg = signed.leg,
            signature = %signed.signature,
            attempts,
            "广播未获确认，按本地签名进入轮询"
        );
        Ok(BroadcastReceipt {
            signature: signed.signature,
            attempts,
            acknowledged: false,
            last_error,
        })
    }
}
