use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use super::amount::SlippageBps;
use super::error::TradeError;
use crate::api::{BuildRequest, SwapBuilder, SwapQuote};
use crate::ledger::decode_transaction_blob;

/// 一笔待签名的交易；`index` 从 1 开始，对应执行顺序。
#[derive(Debug, Clone)]
pub struct AssembledLeg {
    pub index: usize,
    pub transaction: VersionedTransaction,
}

impl AssembledLeg {
    pub fn required_signers(&self) -> &[Pubkey] {
        let keys = self.transaction.message.static_account_keys();
        let required = usize::from(self.transaction.message.header().num_required_signatures);
        &keys[..required.min(keys.len())]
    }
}

/// 按顺序排列的交易序列，后一笔依赖前一笔确认。
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub legs: Vec<AssembledLeg>,
}

impl AssembledTransaction {
    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyParams {
    pub priority_fee: u64,
    pub wallet: Pubkey,
    pub wrap_and_unwrap_sol: bool,
    pub slippage: SlippageBps,
}

pub struct TransactionAssembler {
    builder: Arc<dyn SwapBuilder>,
    quote_max_age: Duration,
}

impl TransactionAssembler {
    pub fn new(builder: Arc<dyn SwapBuilder>, quote_max_age: Duration) -> Self {
        Self {
            builder,
            quote_max_age,
        }
    }

    pub async fn assemble(
        &self,
        quote: &SwapQuote,
        params: AssemblyParams,
    ) -> Result<AssembledTransaction, TradeError> {
        if quote.is_stale(self.quote_max_age) {
            return Err(TradeError::BuildFailed(format!(
                "quote expired: age {}ms exceeds {}ms",
                quote.age().as_millis(),
                self.quote_max_age.as_millis()
            )));
        }

        let request = BuildRequest {
            quote_response: quote.raw.clone(),
            user_public_key: params.wallet,
            wrap_and_unwrap_sol: params.wrap_and_unwrap_sol,
            compute_unit_price_micro_lamports: params.priority_fee,
            slippage_bps: params.slippage.as_u16(),
        };
        let blobs = self
            .builder
            .build(&request)
            .await
            .map_err(|err| TradeError::BuildFailed(err.describe()))?;
        if blobs.is_empty() {
            return Err(TradeError::BuildFailed("builder returned no transactions".to_string()));
        }

        let legs = blobs
            .iter()
            .enumerate()
            .map(|(offset, blob)| decode_leg(offset + 1, blob))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            target: "engine::assembler",
            legs = legs.len(),
            wallet = %params.wallet,
            "交易序列已组装"
        );
        Ok(AssembledTransaction { legs })
    }
}

/// 解码并补齐签名槽位：构建服务可能省略未签名的占位签名。
fn decode_leg(index: usize, blob: &str) -> Result<AssembledLeg, TradeError> {
    let mut transaction = decode_transaction_blob(blob)
        .map_err(|err| TradeError::BuildFailed(format!("leg {index}: {err}")))?;
    let required = usize::from(transaction.message.header().num_required_signatures);
    if required == 0 || required > transaction.message.static_account_keys().len() {
        return Err(TradeError::BuildFailed(format!(
            "leg {index}: invalid signer header ({required} required)"
        )));
    }
    if transaction.signatures.len() > required {
        return Err(TradeError::BuildFailed(format!(
            "leg {index}: {} signatures for {required} signer slots",
            transaction.signatures.len()
        )));
    }
    transaction.signatures.resize(required, Signature::default());
    Ok(AssembledLeg { index, transaction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeBuilder, sample_quote, unsigned_blob};
    use tokio::time::Instant;

    fn params(wallet: Pubkey) -> AssemblyParams {
        AssemblyParams {
            priority_fee: 20_000,
            wallet,
            wrap_and_unwrap_sol: true,
            slippage: SlippageBps::new(100).expect("bps"),
        }
    }

    #[tokio::test]
    async fn passes_slippage_and_fee_through_unchanged() {
        let wallet = Pubkey::new_unique();
        let builder = Arc::new(FakeBuilder::with_blobs(vec![unsigned_blob(&wallet, &[])]));
        let assembler = TransactionAssembler::new(builder.clone(), Duration::from_secs(20));

        let assembled = assembler
            .assemble(&sample_quote(), params(wallet))
            .await
            .expect("assemble");
        assert_eq!(assembled.len(), 1);
        assert_eq!(assembled.legs[0].index, 1);
        assert_eq!(assembled.legs[0].required_signers(), &[wallet]);

        let requests = builder.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].slippage_bps, 100);
        assert_eq!(requests[0].compute_unit_price_micro_lamports, 20_000);
        assert_eq!(requests[0].user_public_key, wallet);
        assert!(requests[0].wrap_and_unwrap_sol);
    }

    #[tokio::test]
    async fn multiple_blobs_keep_their_order() {
        let wallet = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let builder = Arc::new(FakeBuilder::with_blobs(vec![
            unsigned_blob(&wallet, &[]),
            unsigned_blob(&wallet, &[other]),
            unsigned_blob(&wallet, &[]),
        ]));
        let assembler = TransactionAssembler::new(builder, Duration::from_secs(20));
        let assembled = assembler
            .assemble(&sample_quote(), params(wallet))
            .await
            .expect("assemble");
        let indexes: Vec<_> = assembled.legs.iter().map(|leg| leg.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert_eq!(assembled.legs[1].required_signers(), &[wallet, other]);
        assert_eq!(assembled.legs[1].transaction.signatures.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_quote_is_refused_without_calling_builder() {
        let wallet = Pubkey::new_unique();
        let builder = Arc::new(FakeBuilder::with_blobs(vec![unsigned_blob(&wallet, &[])]));
        let assembler = TransactionAssembler::new(builder.clone(), Duration::from_secs(20));
        let mut quote = sample_quote();
        quote.fetched_at = Instant::now();
        tokio::time::advance(Duration::from_secs(21)).await;

        let err = assembler
            .assemble(&quote, params(wallet))
            .await
            .expect_err("expired");
        assert!(matches!(err, TradeError::BuildFailed(ref message) if message.contains("expired")));
        assert!(builder.requests().is_empty());
    }

    #[tokio::test]
    async fn undecodable_blob_is_build_failure() {
        let builder = Arc::new(FakeBuilder::with_blobs(vec!["bm90IGEgdHg=".to_string()]));
        let assembler = TransactionAssembler::new(builder, Duration::from_secs(20));
        let err = assembler
            .assemble(&sample_quote(), params(Pubkey::new_unique()))
            .await
            .expect_err("decode");
        assert!(matches!(err, TradeError::BuildFailed(ref message) if message.starts_with("leg 1")));
    }
}
