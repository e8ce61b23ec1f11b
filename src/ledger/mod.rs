//! 账本 RPC 接缝：广播、签名状态查询、账户读取与结算回读。

mod commitment;
mod decoder;
mod error;
mod rpc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

pub use commitment::Commitment;
pub use decoder::{DecodeTxError, EncodeTxError, decode_transaction_blob, encode_transaction_blob};
pub use error::LedgerError;
pub use rpc::RpcLedger;

/// 单次签名状态查询的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureObservation {
    NotFound,
    /// 已被节点看到，但尚未达到目标确认深度。
    Pending { slot: u64 },
    Landed { slot: u64 },
    Failed { slot: u64, error: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settlement {
    pub fee_lamports: Option<u64>,
    /// 钱包在输出资产上的余额增量（基础单位）。
    pub output_delta: Option<u64>,
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError>;

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<SignatureObservation, LedgerError>;

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    async fn settlement(
        &self,
        _signature: &Signature,
        _owner: &Pubkey,
        _output_mint: &Pubkey,
        _native_output: bool,
    ) -> Result<Settlement, LedgerError> {
        Err(LedgerError::Unavailable(
            "settlement lookup not supported".to_string(),
        ))
    }
}
