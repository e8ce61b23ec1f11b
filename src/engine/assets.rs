use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::debug;

use super::amount::MAX_DECIMALS;
use crate::config::AssetConfig;
use crate::ledger::{LedgerError, LedgerRpc};

pub const WSOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");
const NATIVE_SYMBOL: &str = "SOL";
const NATIVE_DECIMALS: u8 = 9;

// SPL mint 账户布局：总长 82，decimals 位于 44，is_initialized 位于 45。
const MINT_ACCOUNT_LEN: usize = 82;
const MINT_DECIMALS_OFFSET: usize = 44;
const MINT_INITIALIZED_OFFSET: usize = 45;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub id: String,
    pub mint: Pubkey,
    pub decimals: u8,
    /// 原生 SOL：以 wSOL mint 报价，由构建服务负责包装与解包。
    pub native: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeAssets {
    pub input: ResolvedAsset,
    pub output: ResolvedAsset,
}

impl TradeAssets {
    pub fn wrap_and_unwrap_sol(&self) -> bool {
        self.input.native || self.output.native
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("未知资产 `{0}`：既不是已配置的符号也不是合法的 mint 地址")]
    Unknown(String),
    #[error("配置中的资产 {symbol} mint 无效: {mint}")]
    InvalidConfiguredMint { symbol: String, mint: String },
    #[error("mint 账户不存在: {0}")]
    MintNotFound(Pubkey),
    #[error("账户 {0} 不是已初始化的 SPL mint")]
    NotAMint(Pubkey),
    #[error("mint {mint} 的精度 {decimals} 超出支持范围")]
    UnsupportedDecimals { mint: Pubkey, decimals: u8 },
    #[error("读取 mint 账户失败: {0}")]
    Ledger(#[from] LedgerError),
}

#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<ResolvedAsset, AssetError>;
}

/// 配置表优先，未配置精度时读取链上 mint 账户。
pub struct AssetRegistry {
    symbols: HashMap<String, (Pubkey, Option<u8>)>,
    ledger: Arc<dyn LedgerRpc>,
}

impl AssetRegistry {
    pub fn from_config(
        assets: &BTreeMap<String, AssetConfig>,
        ledger: Arc<dyn LedgerRpc>,
    ) -> Result<Self, AssetError> {
        let mut symbols = HashMap::with_capacity(assets.len());
        for (symbol, asset) in assets {
            let mint = asset.mint.trim().parse::<Pubkey>().map_err(|_| {
                AssetError::InvalidConfiguredMint {
                    symbol: symbol.clone(),
                    mint: asset.mint.clone(),
                }
            })?;
            symbols.insert(symbol.trim().to_ascii_uppercase(), (mint, asset.decimals));
        }
        Ok(Self { symbols, ledger })
    }

    fn configured_decimals(&self, mint: &Pubkey) -> Option<u8> {
        self.symbols
            .values()
            .find(|(configured, _)| configured == mint)
            .and_then(|(_, decimals)| *decimals)
    }

    async fn onchain_decimals(&self, mint: &Pubkey) -> Result<u8, AssetError> {
        let data = self
            .ledger
            .account_data(mint)
            .await?
            .ok_or(AssetError::MintNotFound(*mint))?;
        decimals_from_mint_data(mint, &data)
    }
}

fn decimals_from_mint_data(mint: &Pubkey, data: &[u8]) -> Result<u8, AssetError> {
    if data.len() < MINT_ACCOUNT_LEN || data[MINT_INITIALIZED_OFFSET] != 1 {
        return Err(AssetError::NotAMint(*mint));
    }
    let decimals = data[MINT_DECIMALS_OFFSET];
    if decimals > MAX_DECIMALS {
        return Err(AssetError::UnsupportedDecimals {
            mint: *mint,
            decimals,
        });
    }
    Ok(decimals)
}

#[async_trait]
impl AssetResolver for AssetRegistry {
    async fn resolve(&self, id: &str) -> Result<ResolvedAsset, AssetError> {
        let trimmed = id.trim();
        if trimmed.eq_ignore_ascii_case(NATIVE_SYMBOL) {
            return Ok(ResolvedAsset {
                id: NATIVE_SYMBOL.to_string(),
                mint: WSOL_MINT,
                decimals: NATIVE_DECIMALS,
                native: true,
            });
        }

        let (mint, configured) = match self.symbols.get(&trimmed.to_ascii_uppercase()) {
            Some((mint, decimals)) => (*mint, *decimals),
            None => {
                let mint = trimmed
                    .parse::<Pubkey>()
                    .map_err(|_| AssetError::Unknown(trimmed.to_string()))?;
                (mint, self.configured_decimals(&mint))
            }
        };

        let decimals = match configured {
            Some(decimals) => decimals,
            None if mint == WSOL_MINT => NATIVE_DECIMALS,
            None => {
                let decimals = self.onchain_decimals(&mint).await?;
                debug!(
                    target: "engine::assets",
                    mint = %mint,
                    decimals,
                    "已从链上读取 mint 精度"
                );
                decimals
            }
        };

        Ok(ResolvedAsset {
            id: trimmed.to_string(),
            mint,
            decimals,
            native: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeLedger;

    const USDC: Pubkey = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

    fn mint_data(decimals: u8) -> Vec<u8> {
        let mut data = vec![0u8; MINT_ACCOUNT_LEN];
        data[MINT_DECIMALS_OFFSET] = decimals;
        data[MINT_INITIALIZED_OFFSET] = 1;
        data
    }

    fn registry(ledger: Arc<FakeLedger>) -> AssetRegistry {
        let mut assets = BTreeMap::new();
        assets.insert(
            "usdc".to_string(),
            AssetConfig {
                mint: USDC.to_string(),
                decimals: Some(6),
            },
        );
        AssetRegistry::from_config(&assets, ledger).expect("registry")
    }

    #[tokio::test]
    async fn sol_is_native_wrapped_mint() {
        let assets = registry(Arc::new(FakeLedger::default()));
        let sol = assets.resolve("sol").await.expect("sol");
        assert_eq!(sol.mint, WSOL_MINT);
        assert_eq!(sol.decimals, 9);
        assert!(sol.native);
    }

    #[tokio::test]
    async fn configured_symbols_and_mints_skip_the_ledger() {
        let ledger = Arc::new(FakeLedger::default());
        let assets = registry(Arc::clone(&ledger));
        let by_symbol = assets.resolve("USDC").await.expect("symbol");
        let by_mint = assets.resolve(&USDC.to_string()).await.expect("mint");
        assert_eq!(by_symbol.mint, USDC);
        assert_eq!(by_mint.decimals, 6);
        assert_eq!(ledger.account_reads(), 0);
    }

    #[tokio::test]
    async fn unknown_mint_reads_decimals_onchain() {
        let ledger = Arc::new(FakeLedger::default());
        let mint = Pubkey::new_unique();
        ledger.put_account(mint, mint_data(5));
        let assets = registry(Arc::clone(&ledger));
        let resolved = assets.resolve(&mint.to_string()).await.expect("resolve");
        assert_eq!(resolved.decimals, 5);
        assert!(!resolved.native);
    }

    #[tokio::test]
    async fn rejects_unknown_and_non_mint_accounts() {
        let ledger = Arc::new(FakeLedger::default());
        let not_mint = Pubkey::new_unique();
        ledger.put_account(not_mint, vec![0u8; 10]);
        let assets = registry(ledger);
        assert!(matches!(
            assets.resolve("DOGE").await,
            Err(AssetError::Unknown(_))
        ));
        assert!(matches!(
            assets.resolve(&not_mint.to_string()).await,
            Err(AssetError::NotAMint(_))
        ));
        assert!(matches!(
            assets.resolve(&Pubkey::new_unique().to_string()).await,
            Err(AssetError::MintNotFound(_))
        ));
    }
}
