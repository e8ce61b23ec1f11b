use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_with::SerializeDisplay;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::amount::SlippageBps;
use super::error::TradeError;
use crate::api::FeeLevel;
use crate::ledger::Commitment;
use crate::wallet::KeyRef;

/// 外部 API 层提交的交易请求，接受后不再修改。
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub input_asset: String,
    pub output_asset: String,
    /// 用户单位的小数金额。
    pub amount: Decimal,
    pub slippage: SlippageBps,
    pub key: KeyRef,
    pub fee_level: Option<FeeLevel>,
    pub commitment: Option<Commitment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("资产标识不能为空")]
    EmptyAsset,
    #[error("输入与输出资产相同: {0}")]
    SameAsset(String),
    #[error("金额必须大于 0: {0}")]
    NonPositiveAmount(Decimal),
}

impl TradeRequest {
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        let input = self.input_asset.trim();
        let output = self.output_asset.trim();
        if input.is_empty() || output.is_empty() {
            return Err(InvalidRequest::EmptyAsset);
        }
        if input.eq_ignore_ascii_case(output) {
            return Err(InvalidRequest::SameAsset(input.to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(InvalidRequest::NonPositiveAmount(self.amount));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeStatus {
    Created,
    QuoteFetched,
    FeeFetched,
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed,
    TimedOut,
}

impl TradeStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::QuoteFetched => 1,
            Self::FeeFetched => 2,
            Self::Built => 3,
            Self::Signed => 4,
            Self::Submitted => 5,
            Self::Confirmed | Self::Failed | Self::TimedOut => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::QuoteFetched => "quoteFetched",
            Self::FeeFetched => "feeFetched",
            Self::Built => "built",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::TimedOut => "timedOut",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 失败归属的流水线阶段；多腿交易的签名、广播与确认归到 `leg-N`（从 1 开始）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDisplay)]
pub enum Stage {
    Quote,
    Fee,
    Build,
    Sign,
    Broadcast,
    Confirm,
    Leg(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quote => f.write_str("quote"),
            Self::Fee => f.write_str("fee"),
            Self::Build => f.write_str("build"),
            Self::Sign => f.write_str("sign"),
            Self::Broadcast => f.write_str("broadcast"),
            Self::Confirm => f.write_str("confirm"),
            Self::Leg(index) => write!(f, "leg-{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeErrorDetail {
    pub stage: Stage,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("非法的状态迁移 {from} -> {to}")]
pub struct TransitionError {
    pub from: TradeStatus,
    pub to: TradeStatus,
}

/// 交易的唯一事实记录，只由编排器修改，进入终态后不可变。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: Uuid,
    pub status: TradeStatus,
    pub input_asset: String,
    pub output_asset: String,
    pub amount: Decimal,
    pub amount_base_units: Option<u64>,
    pub slippage_bps: SlippageBps,
    pub fee_level: FeeLevel,
    #[serde(rename = "priorityFeeMicroLamports")]
    pub priority_fee: Option<u64>,
    pub expected_output: Option<Decimal>,
    pub price_impact_pct: Option<Decimal>,
    pub realized_output: Option<Decimal>,
    pub fee_lamports: Option<u64>,
    pub signature: Option<String>,
    pub leg_signatures: Vec<String>,
    pub legs_total: usize,
    pub legs_confirmed: usize,
    pub broadcast_attempts: u32,
    pub error: Option<TradeErrorDetail>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl TradeRecord {
    pub fn new(request: &TradeRequest, fee_level: FeeLevel) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            status: TradeStatus::Created,
            input_asset: request.input_asset.trim().to_string(),
            output_asset: request.output_asset.trim().to_string(),
            amount: request.amount,
            amount_base_units: None,
            slippage_bps: request.slippage,
            fee_level,
            priority_fee: None,
            expected_output: None,
            price_impact_pct: None,
            realized_output: None,
            fee_lamports: None,
            signature: None,
            leg_signatures: Vec::new(),
            legs_total: 0,
            legs_confirmed: 0,
            broadcast_attempts: 0,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// 只允许向前迁移；`Submitted -> Submitted` 用于多腿交易的后续腿。
    pub fn advance(&mut self, next: TradeStatus) -> Result<(), TransitionError> {
        let current = self.status;
        let allowed = !current.is_terminal()
            && (next.rank() > current.rank()
                || (current == TradeStatus::Submitted && next == TradeStatus::Submitted));
        if !allowed {
            return Err(TransitionError {
                from: current,
                to: next,
            });
        }
        let now = OffsetDateTime::now_utc();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// 记录失败原因并进入对应终态（超时为 `TimedOut`，其余为 `Failed`）。
    pub fn fail(&mut self, stage: Stage, error: &TradeError) -> Result<(), TransitionError> {
        self.advance(error.terminal_status())?;
        self.error = Some(TradeErrorDetail {
            stage,
            code: error.code(),
            message: error.detail().to_string(),
        });
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_request() -> TradeRequest {
        TradeRequest {
            input_asset: "SOL".to_string(),
            output_asset: "USDC".to_string(),
            amount: dec!(1.5),
            slippage: SlippageBps::new(100).expect("bps"),
            key: KeyRef::Env("TRADER_KEY".to_string()),
            fee_level: None,
            commitment: None,
        }
    }

    #[test]
    fn validates_requests() {
        assert_eq!(sample_request().validate(), Ok(()));
        let mut same = sample_request();
        same.output_asset = "sol".to_string();
        assert!(matches!(same.validate(), Err(InvalidRequest::SameAsset(_))));
        let mut zero = sample_request();
        zero.amount = Decimal::ZERO;
        assert!(matches!(
            zero.validate(),
            Err(InvalidRequest::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn transitions_only_move_forward() {
        let mut record = TradeRecord::new(&sample_request(), FeeLevel::High);
        record.advance(TradeStatus::QuoteFetched).expect("quote");
        record.advance(TradeStatus::FeeFetched).expect("fee");
        assert!(record.advance(TradeStatus::QuoteFetched).is_err());
        record.advance(TradeStatus::Built).expect("built");
        record.advance(TradeStatus::Signed).expect("signed");
        record.advance(TradeStatus::Submitted).expect("submitted");
        record.advance(TradeStatus::Submitted).expect("next leg");
        assert!(record.advance(TradeStatus::Signed).is_err());
    }

    #[test]
    fn confirmed_is_final() {
        let mut record = TradeRecord::new(&sample_request(), FeeLevel::High);
        for status in [
            TradeStatus::QuoteFetched,
            TradeStatus::FeeFetched,
            TradeStatus::Built,
            TradeStatus::Signed,
            TradeStatus::Submitted,
            TradeStatus::Confirmed,
        ] {
            record.advance(status).expect("advance");
        }
        let completed = record.completed_at;
        assert!(completed.is_some());

        assert!(record.advance(TradeStatus::Failed).is_err());
        assert!(record.advance(TradeStatus::TimedOut).is_err());
        assert!(
            record
                .fail(
                    Stage::Confirm,
                    &TradeError::OnChainExecutionFailed("late".to_string())
                )
                .is_err()
        );
        assert_eq!(record.status, TradeStatus::Confirmed);
        assert!(record.error.is_none());
        assert_eq!(record.completed_at, completed);
    }

    #[test]
    fn timeout_is_distinct_from_failure() {
        let mut record = TradeRecord::new(&sample_request(), FeeLevel::High);
        record
            .fail(
                Stage::Confirm,
                &TradeError::ConfirmationTimedOut("no observation".to_string()),
            )
            .expect("fail");
        assert_eq!(record.status, TradeStatus::TimedOut);
        let detail = record.error.as_ref().expect("detail");
        assert_eq!(detail.code, "ConfirmationTimedOut");
        assert_eq!(detail.stage.to_string(), "confirm");
    }

    #[test]
    fn serializes_camel_case_wire_form() {
        let mut record = TradeRecord::new(&sample_request(), FeeLevel::High);
        record
            .fail(Stage::Leg(2), &TradeError::OnChainExecutionFailed("slippage".to_string()))
            .expect("fail");
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["inputAsset"], "SOL");
        assert_eq!(value["slippageBps"], 100);
        assert_eq!(value["feeLevel"], "high");
        assert_eq!(value["error"]["stage"], "leg-2");
        assert_eq!(value["error"]["code"], "OnChainExecutionFailed");
        assert!(value["priorityFeeMicroLamports"].is_null());
        assert!(value["completedAt"].is_string());
    }
}
