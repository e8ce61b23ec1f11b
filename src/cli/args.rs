use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use swapflow::api::FeeLevel;
use swapflow::engine::SlippageBps;
use swapflow::ledger::Commitment;
use swapflow::wallet::KeyRef;

#[derive(Parser, Debug)]
#[command(name = "swapflow", version, about = "Solana 代币兑换执行工具")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 swapflow.toml 或 config/swapflow.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 请求报价（不构建、不广播）
    Quote(QuoteCmd),
    /// 查看当前优先费档位
    Fees,
    /// 执行一笔兑换并输出最终交易记录
    Trade(TradeCmd),
    /// 轮询已提交交易的确认状态
    Status(StatusCmd),
    /// 钱包相关命令
    #[command(subcommand)]
    Wallet(WalletCmd),
}

#[derive(Args, Debug, Clone)]
pub struct SlippageArgs {
    #[arg(
        long,
        value_name = "BPS",
        conflicts_with = "slippage_pct",
        help = "滑点容忍度（基点，100 = 1%）"
    )]
    pub slippage_bps: Option<u16>,
    #[arg(long, value_name = "PERCENT", help = "滑点容忍度（百分比，1 = 1%）")]
    pub slippage_pct: Option<Decimal>,
}

impl SlippageArgs {
    const DEFAULT_BPS: u16 = 50;

    /// 百分比只在这里换算为基点，其余路径一律使用基点。
    pub fn resolve(&self) -> Result<SlippageBps> {
        let slippage = match (self.slippage_bps, self.slippage_pct) {
            (Some(bps), _) => SlippageBps::new(bps),
            (None, Some(pct)) => SlippageBps::from_percent(pct),
            (None, None) => SlippageBps::new(Self::DEFAULT_BPS),
        };
        slippage.map_err(|err| anyhow!(err))
    }
}

#[derive(Args, Debug)]
pub struct QuoteCmd {
    #[arg(long, help = "输入资产（符号或 Mint 地址）")]
    pub input: String,
    #[arg(long, help = "输出资产（符号或 Mint 地址）")]
    pub output: String,
    #[arg(long, help = "输入数量（用户单位的小数）")]
    pub amount: Decimal,
    #[command(flatten)]
    pub slippage: SlippageArgs,
}

#[derive(Args, Debug)]
pub struct TradeCmd {
    #[arg(long, help = "输入资产（符号或 Mint 地址）")]
    pub input: String,
    #[arg(long, help = "输出资产（符号或 Mint 地址）")]
    pub output: String,
    #[arg(long, help = "输入数量（用户单位的小数）")]
    pub amount: Decimal,
    #[arg(
        long,
        value_name = "KEYREF",
        help = "签名密钥引用：env:NAME、file:PATH 或 vault:REMARK"
    )]
    pub key: KeyRef,
    #[command(flatten)]
    pub slippage: SlippageArgs,
    #[arg(long, value_enum, help = "优先费档位，缺省使用配置")]
    pub fee_level: Option<FeeLevel>,
    #[arg(long, value_enum, help = "确认深度，缺省使用配置")]
    pub commitment: Option<Commitment>,
    #[arg(long, value_name = "SECS", help = "整笔交易的时间预算（秒），缺省使用配置")]
    pub timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct StatusCmd {
    #[arg(long, help = "交易签名")]
    pub signature: String,
    #[arg(long, value_enum, help = "确认深度，缺省使用配置")]
    pub commitment: Option<Commitment>,
}

#[derive(Subcommand, Debug)]
pub enum WalletCmd {
    /// 加密私钥并输出可写入配置的 wallet_keys 条目（私钥读取自 SWAPFLOW_PRIVATE_KEY）
    Encrypt {
        #[arg(long, help = "钱包备注，用于 vault:REMARK 引用")]
        remark: String,
    },
}
