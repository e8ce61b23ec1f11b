//! 签名密钥引用与加载。
//!
//! `KeyRef` 只是一个句柄（`env:NAME`、`file:PATH`、`vault:REMARK`），日志与交易记录中
//! 只会出现句柄本身。真正的私钥字节只在 `KeyProvider::load` 返回的 `Keypair` 中存在，
//! 由调用方限定作用域并在用完后丢弃。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use solana_sdk::signature::Keypair;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::WalletKeyEntry;
use crate::config::wallet::{WALLET_PASSWORD_ENV, WalletCryptoError, decrypt_entry};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("无效的密钥引用 `{0}`，应为 env:NAME、file:PATH 或 vault:REMARK")]
    InvalidRef(String),
    #[error("环境变量 {0} 未设置")]
    MissingEnv(String),
    #[error("读取密钥文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解锁 wallet_keys 需要设置 {WALLET_PASSWORD_ENV}")]
    MissingPassword,
    #[error(transparent)]
    Vault(#[from] WalletCryptoError),
    #[error("私钥格式无法识别: {0}")]
    Parse(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum KeyRef {
    Env(String),
    File(PathBuf),
    Vault(String),
}

impl FromStr for KeyRef {
    type Err = KeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (scheme, value) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| KeyError::InvalidRef(raw.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(KeyError::InvalidRef(raw.to_string()));
        }
        match scheme.to_ascii_lowercase().as_str() {
            "env" => Ok(Self::Env(value.to_string())),
            "file" => Ok(Self::File(PathBuf::from(value))),
            "vault" => Ok(Self::Vault(value.to_string())),
            _ => Err(KeyError::InvalidRef(raw.to_string())),
        }
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(name) => write!(f, "env:{name}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Vault(remark) => write!(f, "vault:{remark}"),
        }
    }
}

impl fmt::Debug for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyRef({self})")
    }
}

pub trait KeyProvider: Send + Sync {
    /// 每次调用都重新加载，调用方负责尽快丢弃返回的 `Keypair`。
    fn load(&self, key: &KeyRef) -> Result<Keypair, KeyError>;
}

/// 默认的密钥来源：环境变量、本地文件与配置中的加密条目。
pub struct KeyStore {
    wallet_keys: Vec<WalletKeyEntry>,
    password: Option<Zeroizing<String>>,
}

impl KeyStore {
    pub fn new(wallet_keys: Vec<WalletKeyEntry>, password: Option<Zeroizing<String>>) -> Self {
        Self {
            wallet_keys,
            password,
        }
    }

    pub fn from_env(wallet_keys: Vec<WalletKeyEntry>) -> Self {
        let password = std::env::var(WALLET_PASSWORD_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Zeroizing::new);
        Self::new(wallet_keys, password)
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field(
                "remarks",
                &self
                    .wallet_keys
                    .iter()
                    .map(|entry| entry.remark.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("password_set", &self.password.is_some())
            .finish()
    }
}

impl KeyProvider for KeyStore {
    fn load(&self, key: &KeyRef) -> Result<Keypair, KeyError> {
        let raw = match key {
            KeyRef::Env(name) => Zeroizing::new(
                std::env::var(name).map_err(|_| KeyError::MissingEnv(name.clone()))?,
            ),
            KeyRef::File(path) => {
                Zeroizing::new(std::fs::read_to_string(path).map_err(|source| KeyError::Io {
                    path: path.clone(),
                    source,
                })?)
            }
            KeyRef::Vault(remark) => {
                let password = self.password.as_ref().ok_or(KeyError::MissingPassword)?;
                decrypt_entry(&self.wallet_keys, remark, password)?
            }
        };
        parse_keypair_string(&raw)
    }
}

/// 支持 JSON 字节数组、逗号分隔字节与 base58 三种写法。
pub fn parse_keypair_string(raw: &str) -> Result<Keypair, KeyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(KeyError::Parse("keypair string empty".to_string()));
    }

    let bytes: Zeroizing<Vec<u8>> = if trimmed.starts_with('[') {
        Zeroizing::new(
            serde_json::from_str(trimmed)
                .map_err(|err| KeyError::Parse(format!("JSON 字节数组解析失败: {err}")))?,
        )
    } else if trimmed.contains(',') {
        Zeroizing::new(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::parse::<u8>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| KeyError::Parse(format!("字节列表解析失败: {err}")))?,
        )
    } else {
        Zeroizing::new(
            bs58::decode(trimmed)
                .into_vec()
                .map_err(|err| KeyError::Parse(format!("base58 解码失败: {err}")))?,
        )
    };

    Keypair::try_from(bytes.as_slice()).map_err(|err| KeyError::Parse(err.to_string()))
}
