//! 交易流水线：报价 → 优先费 → 构建 → 签名 → 广播 → 确认。
//!
//! 每笔交易由 `TradeOrchestrator` 顺序驱动，状态只会向前迁移；
//! 任一阶段失败都会被分类为 `TradeError` 并带上阶段名写入 `TradeRecord`。

pub mod amount;
pub mod assembler;
pub mod assets;
pub mod broadcaster;
pub mod budget;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod signer;
pub mod sink;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::api::FeeLevel;
pub use amount::{AmountError, SlippageBps, from_base_units, to_base_units};
pub use assembler::{AssembledLeg, AssembledTransaction, AssemblyParams, TransactionAssembler};
pub use assets::{AssetError, AssetRegistry, AssetResolver, ResolvedAsset, TradeAssets, WSOL_MINT};
pub use broadcaster::{BroadcastPolicy, BroadcastReceipt, Broadcaster};
pub use budget::{BudgetExhausted, TradeBudget};
pub use error::TradeError;
pub use orchestrator::{OrchestratorSettings, ServiceContext, TradeOrchestrator};
pub use poller::{ConfirmationPoller, ConfirmationStatus, PollPolicy};
pub use signer::{SignedTransaction, TradeSigner};
pub use sink::{LogSink, MemorySink, NoopSink, TradeSink};
pub use types::{
    InvalidRequest, Stage, TradeErrorDetail, TradeRecord, TradeRequest, TradeStatus,
    TransitionError,
};
