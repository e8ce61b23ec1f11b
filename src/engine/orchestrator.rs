use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::amount::{from_base_units, to_base_units};
use super::assembler::{AssembledLeg, AssemblyParams, TransactionAssembler};
use super::assets::{AssetResolver, ResolvedAsset, TradeAssets};
use super::broadcaster::{BroadcastPolicy, Broadcaster};
use super::budget::TradeBudget;
use super::error::TradeError;
use super::poller::{ConfirmationPoller, ConfirmationStatus, PollPolicy};
use super::signer::TradeSigner;
use super::sink::TradeSink;
use super::types::{Stage, TradeRecord, TradeRequest, TradeStatus};
use crate::api::{FeeLevel, FeeSource, QuoteRequest, QuoteSource, SwapBuilder, SwapQuote};
use crate::config::SwapflowConfig;
use crate::ledger::{Commitment, LedgerRpc};
use crate::monitoring::events;
use crate::monitoring::format::short_mint_str;
use crate::network::ApiMeter;
use crate::wallet::KeyProvider;

/// 显式构造、在所有交易间共享的外部依赖；计量器是其中唯一的可变共享状态。
#[derive(Clone)]
pub struct ServiceContext {
    pub quotes: Arc<dyn QuoteSource>,
    pub fees: Arc<dyn FeeSource>,
    pub builder: Arc<dyn SwapBuilder>,
    pub ledger: Arc<dyn LedgerRpc>,
    pub keys: Arc<dyn KeyProvider>,
    pub assets: Arc<dyn AssetResolver>,
    pub meter: Arc<ApiMeter>,
    pub sink: Arc<dyn TradeSink>,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub fee_level: FeeLevel,
    pub commitment: Commitment,
    pub broadcast: BroadcastPolicy,
    pub poll: PollPolicy,
    pub quote_max_age: Duration,
    pub trade_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &SwapflowConfig) -> Self {
        let execution = &config.execution;
        Self {
            fee_level: execution.fee_level,
            commitment: execution.commitment,
            broadcast: BroadcastPolicy {
                max_retries: execution.broadcast_max_retries,
                retry_delay: Duration::from_millis(execution.broadcast_retry_delay_ms),
            },
            poll: PollPolicy {
                interval: Duration::from_millis(execution.poll_interval_ms),
                max_polls: execution.max_polls,
            },
            quote_max_age: config.services.quote_max_age(),
            trade_timeout: Duration::from_millis(execution.trade_timeout_ms),
        }
    }
}

/// 阶段失败：归属阶段加分类后的错误。
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: TradeError,
}

impl StageFailure {
    fn new(stage: Stage, error: TradeError) -> Self {
        Self { stage, error }
    }
}

pub struct TradeOrchestrator {
    context: ServiceContext,
    settings: OrchestratorSettings,
    assembler: TransactionAssembler,
    broadcaster: Broadcaster,
    poller: ConfirmationPoller,
}

impl TradeOrchestrator {
    pub fn new(context: ServiceContext, settings: OrchestratorSettings) -> Self {
        let assembler = TransactionAssembler::new(context.builder.clone(), settings.quote_max_age);
        let broadcaster = Broadcaster::new(context.ledger.clone(), settings.broadcast);
        let poller = ConfirmationPoller::new(context.ledger.clone(), settings.poll);
        Self {
            context,
            settings,
            assembler,
            broadcaster,
            poller,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn meter(&self) -> &Arc<ApiMeter> {
        &self.context.meter
    }

    pub async fn execute(&self, request: TradeRequest) -> TradeRecord {
        let budget = TradeBudget::new(self.settings.trade_timeout);
        self.execute_with_budget(request, &budget).await
    }

    /// 驱动一笔交易直到终态；任何阶段的失败都记录在返回的 `TradeRecord` 中。
    pub async fn execute_with_budget(
        &self,
        request: TradeRequest,
        budget: &TradeBudget,
    ) -> TradeRecord {
        let started = Instant::now();
        let fee_level = request.fee_level.unwrap_or(self.settings.fee_level);
        let mut record = TradeRecord::new(&request, fee_level);
        events::trade_started(&record);
        self.context.sink.record(&record);

        if let Err(failure) = self.drive(&request, budget, &mut record).await {
            match record.fail(failure.stage, &failure.error) {
                Ok(()) => {
                    events::trade_transition(&record);
                    self.context.sink.record(&record);
                }
                Err(err) => warn!(
                    target: "engine::orchestrator",
                    trade_id = %record.id,
                    error = %err,
                    "终态交易不再接受失败记录"
                ),
            }
        }

        events::trade_finished(&record, started.elapsed());
        record
    }

    async fn drive(
        &self,
        request: &TradeRequest,
        budget: &TradeBudget,
        record: &mut TradeRecord,
    ) -> Result<(), StageFailure> {
        let quote_failure =
            |message: String| StageFailure::new(Stage::Quote, TradeError::QuoteUnavailable(message));

        request
            .validate()
            .map_err(|err| quote_failure(err.to_string()))?;
        let assets = self.resolve_assets(request, budget).await?;
        let amount = to_base_units(request.amount, assets.input.decimals)
            .map_err(|err| quote_failure(err.to_string()))?;
        record.amount_base_units = Some(amount);

        let quote_request = QuoteRequest {
            input_mint: assets.input.mint,
            output_mint: assets.output.mint,
            amount,
            slippage_bps: request.slippage.as_u16(),
        };
        let quote = budget
            .run(self.context.quotes.quote(&quote_request))
            .await
            .map_err(|exhausted| quote_failure(exhausted.to_string()))?
            .map_err(|err| quote_failure(err.describe()))?;
        record.expected_output = Some(from_base_units(quote.out_amount, assets.output.decimals));
        record.price_impact_pct = quote.price_impact_pct;
        self.transition(record, TradeStatus::QuoteFetched);

        let priority_fee = self.fetch_priority_fee(record.fee_level, budget).await?;
        record.priority_fee = Some(priority_fee);
        self.transition(record, TradeStatus::FeeFetched);

        let first_signer = TradeSigner::acquire(self.context.keys.as_ref(), &request.key)
            .map_err(|err| StageFailure::new(Stage::Sign, err))?;
        let wallet = first_signer.pubkey();
        let legs = self
            .assemble(&quote, &assets, wallet, request, priority_fee, budget)
            .await?;
        record.legs_total = legs.len();
        self.transition(record, TradeStatus::Built);

        let commitment = request.commitment.unwrap_or(self.settings.commitment);
        let multi_leg = legs.len() > 1;
        let mut first_signer = Some(first_signer);
        let mut last_signature = None;
        for leg in &legs {
            let signature = self
                .execute_leg(
                    request,
                    leg,
                    first_signer.take(),
                    multi_leg,
                    commitment,
                    budget,
                    record,
                )
                .await?;
            last_signature = Some(signature);
        }

        if let Some(signature) = last_signature {
            self.read_settlement(&signature, &wallet, &assets, budget, record)
                .await;
        }
        self.transition(record, TradeStatus::Confirmed);
        Ok(())
    }

    async fn resolve_assets(
        &self,
        request: &TradeRequest,
        budget: &TradeBudget,
    ) -> Result<TradeAssets, StageFailure> {
        let input = self.resolve_one(&request.input_asset, budget).await;
        let output = self.resolve_one(&request.output_asset, budget).await;
        match (input, output) {
            (Ok(input), Ok(output)) if input.mint == output.mint => Err(StageFailure::new(
                Stage::Quote,
                TradeError::QuoteUnavailable(format!(
                    "{} and {} resolve to the same mint {}",
                    input.id, output.id, input.mint
                )),
            )),
            (Ok(input), Ok(output)) => {
                debug!(
                    target: "engine::orchestrator",
                    input = %short_mint_str(&input.mint.to_string()),
                    input_decimals = input.decimals,
                    output = %short_mint_str(&output.mint.to_string()),
                    output_decimals = output.decimals,
                    "资产已解析"
                );
                Ok(TradeAssets { input, output })
            }
            (Err(message), _) | (_, Err(message)) => Err(StageFailure::new(
                Stage::Quote,
                TradeError::QuoteUnavailable(message),
            )),
        }
    }

    async fn resolve_one(
        &self,
        id: &str,
        budget: &TradeBudget,
    ) -> Result<ResolvedAsset, String> {
        match budget.run(self.context.assets.resolve(id)).await {
            Ok(Ok(asset)) => Ok(asset),
            Ok(Err(err)) => Err(err.to_string()),
            Err(exhausted) => Err(exhausted.to_string()),
        }
    }

    async fn fetch_priority_fee(
        &self,
        level: FeeLevel,
        budget: &TradeBudget,
    ) -> Result<u64, StageFailure> {
        let fee_failure =
            |message: String| StageFailure::new(Stage::Fee, TradeError::FeeUnavailable(message));
        let tiers = budget
            .run(self.context.fees.priority_fees())
            .await
            .map_err(|exhausted| fee_failure(exhausted.to_string()))?
            .map_err(|err| fee_failure(err.describe()))?;
        if !tiers.is_ordered() {
            return Err(fee_failure(format!(
                "fee tiers not ordered: low={} medium={} high={}",
                tiers.low, tiers.medium, tiers.high
            )));
        }
        let selected = tiers.select(level);
        debug!(
            target: "engine::orchestrator",
            level = %level,
            micro_lamports = selected,
            "已选择优先费档位"
        );
        Ok(selected)
    }

    async fn assemble(
        &self,
        quote: &SwapQuote,
        assets: &TradeAssets,
        wallet: Pubkey,
        request: &TradeRequest,
        priority_fee: u64,
        budget: &TradeBudget,
    ) -> Result<Vec<AssembledLeg>, StageFailure> {
        let params = AssemblyParams {
            priority_fee,
            wallet,
            wrap_and_unwrap_sol: assets.wrap_and_unwrap_sol(),
            slippage: request.slippage,
        };
        let assembled = budget
            .run(self.assembler.assemble(quote, params))
            .await
            .map_err(|exhausted| TradeError::BuildFailed(exhausted.to_string()))
            .and_then(|result| result)
            .map_err(|err| StageFailure::new(Stage::Build, err))?;
        Ok(assembled.legs)
    }

    /// 签名、广播并等待单腿确认；下一腿只在本腿确认后开始。
    /// `signer` 为第一腿预先取得的密钥，其余腿在签名前重新加载。
    async fn execute_leg(
        &self,
        request: &TradeRequest,
        leg: &AssembledLeg,
        signer: Option<TradeSigner>,
        multi_leg: bool,
        commitment: Commitment,
        budget: &TradeBudget,
        record: &mut TradeRecord,
    ) -> Result<Signature, StageFailure> {
        let stage_for = |single: Stage| {
            if multi_leg {
                Stage::Leg(leg.index)
            } else {
                single
            }
        };

        let signed = {
            let signer = match signer {
                Some(signer) => signer,
                None => TradeSigner::acquire(self.context.keys.as_ref(), &request.key)
                    .map_err(|err| StageFailure::new(stage_for(Stage::Sign), err))?,
            };
            signer
                .sign(leg)
                .map_err(|err| StageFailure::new(stage_for(Stage::Sign), err))?
        };
        if record.status == TradeStatus::Built {
            self.transition(record, TradeStatus::Signed);
        }

        let trade_id = record.id.to_string();
        let receipt = self
            .broadcaster
            .broadcast(&trade_id, &signed, budget)
            .await
            .map_err(|err| StageFailure::new(stage_for(Stage::Broadcast), err))?;
        let signature = receipt.signature;
        record.broadcast_attempts = record.broadcast_attempts.saturating_add(receipt.attempts);
        record.signature = Some(signature.to_string());
        record.leg_signatures.push(signature.to_string());
        self.transition(record, TradeStatus::Submitted);

        match self.poller.wait(&signature, commitment, budget).await {
            ConfirmationStatus::Confirmed { slot } => {
                record.legs_confirmed += 1;
                info!(
                    target: "engine::orchestrator",
                    trade_id = %record.id,
                    leg = leg.index,
                    legs_total = record.legs_total,
                    slot,
                    "交易腿已确认"
                );
                Ok(signature)
            }
            ConfirmationStatus::Failed { error, .. } => Err(StageFailure::new(
                stage_for(Stage::Confirm),
                TradeError::OnChainExecutionFailed(error),
            )),
            ConfirmationStatus::TimedOut { reason } => Err(StageFailure::new(
                stage_for(Stage::Confirm),
                TradeError::ConfirmationTimedOut(reason),
            )),
        }
    }

    /// 尽力读取手续费与实际到账数量；失败只记日志，不影响终态。
    async fn read_settlement(
        &self,
        signature: &Signature,
        wallet: &Pubkey,
        assets: &TradeAssets,
        budget: &TradeBudget,
        record: &mut TradeRecord,
    ) {
        let lookup = self.context.ledger.settlement(
            signature,
            wallet,
            &assets.output.mint,
            assets.output.native,
        );
        match budget.run(lookup).await {
            Ok(Ok(settlement)) => {
                record.fee_lamports = settlement.fee_lamports;
                record.realized_output = settlement
                    .output_delta
                    .map(|delta| from_base_units(delta, assets.output.decimals));
            }
            Ok(Err(err)) => warn!(
                target: "engine::orchestrator",
                trade_id = %record.id,
                signature = %signature,
                error = %err,
                "结算信息读取失败"
            ),
            Err(exhausted) => warn!(
                target: "engine::orchestrator",
                trade_id = %record.id,
                signature = %signature,
                error = %exhausted,
                "结算信息读取被中止"
            ),
        }
    }

    fn transition(&self, record: &mut TradeRecord, next: TradeStatus) {
        match record.advance(next) {
            Ok(()) => {
                events::trade_transition(record);
                self.context.sink.record(record);
            }
            Err(err) => warn!(
                target: "engine::orchestrator",
                trade_id = %record.id,
                error = %err,
                "忽略非法状态迁移"
            ),
        }
    }
}
