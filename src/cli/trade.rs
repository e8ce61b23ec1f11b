use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::json;
use solana_sdk::signature::Signature;
use tracing::{info, warn};

use swapflow::api::{FeeSource, QuoteRequest, QuoteSource};
use swapflow::engine::{
    AssetResolver, ConfirmationPoller, ConfirmationStatus, TradeBudget, TradeRecord, TradeRequest,
    TradeStatus, from_base_units, to_base_units,
};

use crate::cli::args::{QuoteCmd, StatusCmd, TradeCmd};
use crate::cli::context::Services;

pub async fn run_quote(services: &Services, cmd: QuoteCmd) -> Result<()> {
    let slippage = cmd.slippage.resolve()?;
    let input = services.assets.resolve(&cmd.input).await?;
    let output = services.assets.resolve(&cmd.output).await?;
    let amount = to_base_units(cmd.amount, input.decimals)?;

    let request = QuoteRequest {
        input_mint: input.mint,
        output_mint: output.mint,
        amount,
        slippage_bps: slippage.as_u16(),
    };
    let quote = services.quotes.quote(&request).await?;
    let summary = json!({
        "inputMint": input.mint.to_string(),
        "outputMint": output.mint.to_string(),
        "inAmount": quote.in_amount,
        "outAmount": quote.out_amount,
        "expectedOutput": from_base_units(quote.out_amount, output.decimals),
        "priceImpactPct": quote.price_impact_pct,
        "slippageBps": slippage.as_u16(),
        "hops": quote.hops(),
        "quote": quote.raw,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub async fn run_fees(services: &Services) -> Result<()> {
    let tiers = services.fees.priority_fees().await?;
    println!("{}", serde_json::to_string_pretty(&tiers)?);
    Ok(())
}

pub async fn run_trade(services: &Services, cmd: TradeCmd) -> Result<()> {
    let request = TradeRequest {
        input_asset: cmd.input,
        output_asset: cmd.output,
        amount: cmd.amount,
        slippage: cmd.slippage.resolve()?,
        key: cmd.key,
        fee_level: cmd.fee_level,
        commitment: cmd.commitment,
    };
    let timeout = cmd
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(services.orchestrator.settings().trade_timeout);
    let budget = TradeBudget::new(timeout);

    // Ctrl-C 只停止等待，已广播的交易不会被撤回。
    let cancel = budget.cancel_token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "engine::orchestrator", "收到中断信号，停止等待交易结果");
            cancel.cancel();
        }
    });

    let record = services
        .orchestrator
        .execute_with_budget(request, &budget)
        .await;
    interrupt.abort();

    println!("{}", serde_json::to_string_pretty(&record)?);
    info!(
        target: "engine::orchestrator",
        metered_calls = services.meter.snapshot().total,
        "本次运行的外部 API 调用次数"
    );
    finish_status(&record)
}

fn finish_status(record: &TradeRecord) -> Result<()> {
    match record.status {
        TradeStatus::Confirmed => Ok(()),
        TradeStatus::TimedOut => Err(anyhow!(
            "交易 {} 确认超时，链上状态未知，请使用 `swapflow status --signature` 复查",
            record.id
        )),
        _ => {
            let reason = record
                .error
                .as_ref()
                .map(|err| format!("[{}] {}: {}", err.stage, err.code, err.message))
                .unwrap_or_else(|| record.status.to_string());
            Err(anyhow!("交易 {} 失败 {reason}", record.id))
        }
    }
}

pub async fn run_status(services: &Services, cmd: StatusCmd) -> Result<()> {
    let signature = Signature::from_str(cmd.signature.trim())
        .map_err(|err| anyhow!("交易签名无效 {}: {err}", cmd.signature))?;
    let settings = services.orchestrator.settings();
    let commitment = cmd.commitment.unwrap_or(settings.commitment);
    let poller = ConfirmationPoller::new(services.ledger.clone(), settings.poll);
    let budget = TradeBudget::new(settings.poll.window());

    let status = poller.wait(&signature, commitment, &budget).await;
    let output = match &status {
        ConfirmationStatus::Confirmed { slot } => {
            json!({"signature": signature.to_string(), "status": "confirmed", "slot": slot})
        }
        ConfirmationStatus::Failed { slot, error } => json!({
            "signature": signature.to_string(),
            "status": "failed",
            "slot": slot,
            "error": error,
        }),
        ConfirmationStatus::TimedOut { reason } => json!({
            "signature": signature.to_string(),
            "status": "timedOut",
            "reason": reason,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
