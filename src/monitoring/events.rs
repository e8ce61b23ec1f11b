use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{info, warn};

use super::format::short_signature;
use super::metrics::prometheus_enabled;
use crate::engine::{TradeRecord, TradeStatus};

pub fn trade_started(record: &TradeRecord) {
    info!(
        target: "monitoring::trade",
        event = "start",
        trade_id = %record.id,
        input = %record.input_asset,
        output = %record.output_asset,
        amount = %record.amount,
        slippage_bps = record.slippage_bps.as_u16(),
        fee_level = %record.fee_level,
        "trade started"
    );
}

pub fn trade_transition(record: &TradeRecord) {
    info!(
        target: "monitoring::trade",
        event = "transition",
        trade_id = %record.id,
        status = %record.status,
        "trade status changed"
    );
}

pub fn broadcast_attempt(trade_id: &str, attempt: u32, ambiguous: Option<&str>) {
    match ambiguous {
        None => info!(
            target: "monitoring::broadcast",
            trade_id,
            attempt,
            "broadcast accepted"
        ),
        Some(reason) => warn!(
            target: "monitoring::broadcast",
            trade_id,
            attempt,
            reason,
            "broadcast outcome ambiguous"
        ),
    }

    if prometheus_enabled() {
        let result = if ambiguous.is_some() {
            "ambiguous"
        } else {
            "accepted"
        };
        counter!(
            "swapflow_broadcast_attempts_total",
            "result" => result.to_string()
        )
        .increment(1);
    }
}

pub fn trade_finished(record: &TradeRecord, elapsed: Duration) {
    let signature = record
        .signature
        .as_deref()
        .map(short_signature)
        .unwrap_or_default();
    let stage = record
        .error
        .as_ref()
        .map(|err| err.stage.to_string())
        .unwrap_or_else(|| "-".to_string());
    match record.status {
        TradeStatus::Confirmed => info!(
            target: "monitoring::trade",
            event = "finish",
            trade_id = %record.id,
            status = %record.status,
            signature = %signature,
            attempts = record.broadcast_attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "trade confirmed"
        ),
        _ => warn!(
            target: "monitoring::trade",
            event = "finish",
            trade_id = %record.id,
            status = %record.status,
            signature = %signature,
            stage = %stage,
            code = record.error.as_ref().map(|err| err.code).unwrap_or("-"),
            elapsed_ms = elapsed.as_millis() as u64,
            "trade did not confirm"
        ),
    }

    if prometheus_enabled() {
        let status = record.status.to_string();
        counter!(
            "swapflow_trades_total",
            "status" => status.clone(),
            "stage" => stage
        )
        .increment(1);
        histogram!("swapflow_trade_duration_ms", "status" => status)
            .record(elapsed.as_secs_f64() * 1_000.0);
    }
}
