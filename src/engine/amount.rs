//! 用户小数金额与链上基础单位之间的唯一换算点。

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_DECIMALS: u8 = 18;
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("金额必须大于 0: {0}")]
    NonPositive(Decimal),
    #[error("精度 {0} 超出支持范围 (0..=18)")]
    UnsupportedDecimals(u8),
    #[error("金额 {amount} 按精度 {decimals} 换算后溢出 u64")]
    Overflow { amount: Decimal, decimals: u8 },
    #[error("金额 {amount} 不足一个基础单位 (精度 {decimals})")]
    BelowOneUnit { amount: Decimal, decimals: u8 },
    #[error("滑点 {0} bps 超出范围 (0..=10000)")]
    SlippageOutOfRange(Decimal),
    #[error("滑点 {0}% 无法精确表示为整数 bps")]
    SlippageFraction(Decimal),
}

/// `floor(amount × 10^decimals)`，向下取整，保证不超过用户授权的数量。
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NonPositive(amount));
    }
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    let overflow = || AmountError::Overflow { amount, decimals };
    let scale = Decimal::from(10u64.pow(u32::from(decimals)));
    let units = amount
        .checked_mul(scale)
        .ok_or_else(overflow)?
        .floor()
        .to_u64()
        .ok_or_else(overflow)?;
    if units == 0 {
        return Err(AmountError::BelowOneUnit { amount, decimals });
    }
    Ok(units)
}

pub fn from_base_units(units: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(units), u32::from(decimals.min(MAX_DECIMALS)))
        .normalize()
}

/// 滑点容忍度，以基点为唯一规范单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct SlippageBps(u16);

impl SlippageBps {
    pub fn new(bps: u16) -> Result<Self, AmountError> {
        if bps > MAX_SLIPPAGE_BPS {
            return Err(AmountError::SlippageOutOfRange(Decimal::from(bps)));
        }
        Ok(Self(bps))
    }

    /// 百分比入口只在 CLI 边界使用：`0.5` → 50 bps。
    pub fn from_percent(percent: Decimal) -> Result<Self, AmountError> {
        let bps = percent
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(AmountError::SlippageOutOfRange(percent))?;
        if bps < Decimal::ZERO || bps > Decimal::from(MAX_SLIPPAGE_BPS) {
            return Err(AmountError::SlippageOutOfRange(bps));
        }
        if bps.fract() != Decimal::ZERO {
            return Err(AmountError::SlippageFraction(percent));
        }
        bps.to_u16()
            .map(Self)
            .ok_or(AmountError::SlippageOutOfRange(bps))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for SlippageBps {
    type Error = AmountError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlippageBps> for u16 {
    fn from(value: SlippageBps) -> Self {
        value.0
    }
}

impl fmt::Display for SlippageBps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.0)
    }
}
