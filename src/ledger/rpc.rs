use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status_client_types::{
    UiTransactionEncoding, UiTransactionStatusMeta, UiTransactionTokenBalance,
};
use tracing::{debug, info};

use super::{Commitment, LedgerError, LedgerRpc, Settlement, SignatureObservation};

#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    send_config: RpcSendTransactionConfig,
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .field("skip_preflight", &self.send_config.skip_preflight)
            .finish()
    }
}

impl RpcLedger {
    pub fn new(url: String, timeout: Duration, skip_preflight: bool) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(
            url,
            timeout,
            CommitmentConfig::confirmed(),
        );
        Self::with_client(Arc::new(client), skip_preflight)
    }

    pub fn with_client(client: Arc<RpcClient>, skip_preflight: bool) -> Self {
        // 节点侧不再自动重发，重发策略由广播器统一控制。
        let send_config = RpcSendTransactionConfig {
            skip_preflight,
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        Self {
            client,
            send_config,
        }
    }
}

#[async_trait]
impl LedgerRpc for RpcLedger {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError> {
        let signature = self
            .client
            .send_transaction_with_config(tx, self.send_config.clone())
            .await?;
        info!(
            target: "ledger::rpc",
            signature = %signature,
            endpoint = %self.client.url(),
            skip_preflight = self.send_config.skip_preflight,
            "transaction submitted via rpc client"
        );
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<SignatureObservation, LedgerError> {
        let response = self.client.get_signature_statuses(&[*signature]).await?;
        let Some(status) = response.value.into_iter().next().flatten() else {
            return Ok(SignatureObservation::NotFound);
        };
        debug!(
            target: "ledger::rpc",
            signature = %signature,
            slot = status.slot,
            confirmation = ?status.confirmation_status,
            "signature status"
        );
        if let Some(err) = status.err.as_ref() {
            return Ok(SignatureObservation::Failed {
                slot: status.slot,
                error: err.to_string(),
            });
        }
        if status.satisfies_commitment(commitment.into()) {
            Ok(SignatureObservation::Landed { slot: status.slot })
        } else {
            Ok(SignatureObservation::Pending { slot: status.slot })
        }
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn settlement(
        &self,
        signature: &Signature,
        owner: &Pubkey,
        output_mint: &Pubkey,
        native_output: bool,
    ) -> Result<Settlement, LedgerError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .client
            .get_transaction_with_config(signature, config)
            .await?;
        let meta = confirmed
            .transaction
            .meta
            .ok_or_else(|| LedgerError::Unavailable("transaction meta missing".to_string()))?;
        Ok(settlement_from_meta(&meta, owner, output_mint, native_output))
    }
}

/// 原生输出按手续费支付者（索引 0）的 lamports 变化计算，并加回手续费。
fn settlement_from_meta(
    meta: &UiTransactionStatusMeta,
    owner: &Pubkey,
    output_mint: &Pubkey,
    native_output: bool,
) -> Settlement {
    let output_delta = if native_output {
        match (meta.pre_balances.first(), meta.post_balances.first()) {
            (Some(pre), Some(post)) => (post + meta.fee).checked_sub(*pre),
            _ => None,
        }
    } else {
        let pre: Option<Vec<UiTransactionTokenBalance>> = meta.pre_token_balances.clone().into();
        let post: Option<Vec<UiTransactionTokenBalance>> = meta.post_token_balances.clone().into();
        let before = token_amount(pre.as_deref().unwrap_or_default(), owner, output_mint);
        post.as_deref()
            .and_then(|post| token_amount(post, owner, output_mint))
            .and_then(|after| after.checked_sub(before.unwrap_or(0)))
    };
    Settlement {
        fee_lamports: Some(meta.fee),
        output_delta,
    }
}

fn token_amount(
    balances: &[UiTransactionTokenBalance],
    owner: &Pubkey,
    mint: &Pubkey,
) -> Option<u64> {
    let owner = owner.to_string();
    let mint = mint.to_string();
    let mut matched = balances.iter().filter(|balance| {
        balance.mint == mint && Option::<&String>::from(balance.owner.as_ref()) == Some(&owner)
    });
    matched.try_fold(None::<u64>, |acc, balance| {
        let amount = balance.ui_token_amount.amount.parse::<u64>().ok()?;
        Some(Some(acc.unwrap_or(0) + amount))
    })?
}
