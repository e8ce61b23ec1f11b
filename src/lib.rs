//! swapflow：Solana 代币兑换执行流水线。

pub mod api;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod monitoring;
pub mod network;
pub mod wallet;
