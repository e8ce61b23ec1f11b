use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use thiserror::Error;

use super::decoder::DecodeTxError;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// 传输层失败：节点可能已经收到请求，也可能没有。
    #[error("RPC 请求结果不确定: {0}")]
    Ambiguous(String),
    #[error("RPC 拒绝请求: {0}")]
    Rejected(String),
    #[error("交易解码失败: {0}")]
    Decode(#[from] DecodeTxError),
    #[error("{0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) | ClientErrorKind::Middleware(_) => {
                Self::Ambiguous(message)
            }
            ClientErrorKind::RpcError(RpcError::RpcRequestError(_)) => Self::Ambiguous(message),
            _ => Self::Rejected(message),
        }
    }
}
