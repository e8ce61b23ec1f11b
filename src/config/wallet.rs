//! `[[global.wallet.wallet_keys]]` 条目的加解密。
//!
//! 密文格式：`MAGIC | version | salt(16) | nonce(12) | AES-256-GCM ciphertext`，
//! 整体 Base64 编码后写入配置。密钥由 Argon2id 从口令派生，用后立即清零。

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use super::WalletKeyEntry;

pub const WALLET_PASSWORD_ENV: &str = "SWAPFLOW_WALLET_PASSWORD";

const MAGIC: &[u8; 8] = b"SFWALLET";
const FORMAT_VERSION: u8 = 1;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum WalletCryptoError {
    #[error("wallet_keys 中不存在备注名 \"{0}\"")]
    UnknownRemark(String),
    #[error("wallet_keys 条目 Base64 解码失败: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("wallet 密文格式错误: {0}")]
    Format(String),
    #[error("派生加密密钥失败: {0}")]
    KeyDerivation(String),
    #[error("钱包密码错误或数据已损坏")]
    Decrypt,
    #[error("加密钱包私钥失败")]
    Encrypt,
}

pub fn encrypt_entry(
    remark: &str,
    secret: &str,
    password: &str,
) -> Result<WalletKeyEntry, WalletCryptoError> {
    let data = encrypt_wallet_key(secret.as_bytes(), password)?;
    Ok(WalletKeyEntry {
        remark: remark.trim().to_string(),
        encrypted: general_purpose::STANDARD.encode(data),
    })
}

/// 按备注名（忽略大小写）找到条目并解密出私钥字符串。
pub fn decrypt_entry(
    entries: &[WalletKeyEntry],
    remark: &str,
    password: &str,
) -> Result<Zeroizing<String>, WalletCryptoError> {
    let entry = entries
        .iter()
        .find(|entry| entry.remark.eq_ignore_ascii_case(remark.trim()))
        .ok_or_else(|| WalletCryptoError::UnknownRemark(remark.to_string()))?;
    let cipher = Zeroizing::new(general_purpose::STANDARD.decode(entry.encrypted.trim())?);
    decrypt_wallet_bytes(&cipher, password)
}

fn encrypt_wallet_key(plaintext: &[u8], password: &str) -> Result<Vec<u8>, WalletCryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let encryption_key = derive_encryption_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&encryption_key[..])
        .map_err(|err| WalletCryptoError::KeyDerivation(err.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| WalletCryptoError::Encrypt)?;

    let mut data = Vec::with_capacity(MAGIC.len() + 1 + SALT_SIZE + NONCE_SIZE + ciphertext.len());
    data.extend_from_slice(MAGIC);
    data.push(FORMAT_VERSION);
    data.extend_from_slice(&salt);
    data.extend_from_slice(&nonce);
    data.extend_from_slice(&ciphertext);
    Ok(data)
}

fn decrypt_wallet_bytes(data: &[u8], password: &str) -> Result<Zeroizing<String>, WalletCryptoError> {
    let header_len = MAGIC.len() + 1;
    if data.len() < header_len + SALT_SIZE + NONCE_SIZE {
        return Err(WalletCryptoError::Format("数据长度不足".to_string()));
    }

    let (magic, rest) = data.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(WalletCryptoError::Format("未知的密文头".to_string()));
    }
    let version = rest[0];
    if version != FORMAT_VERSION {
        return Err(WalletCryptoError::Format(format!("不支持的版本 {version}")));
    }

    let rest = &rest[1..];
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&rest[..SALT_SIZE]);
    let nonce = &rest[SALT_SIZE..SALT_SIZE + NONCE_SIZE];
    let ciphertext = &rest[SALT_SIZE + NONCE_SIZE..];

    let encryption_key = derive_encryption_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&encryption_key[..])
        .map_err(|err| WalletCryptoError::KeyDerivation(err.to_string()))?;
    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| WalletCryptoError::Decrypt)?;

    let decoded = String::from_utf8(plaintext.clone())
        .map_err(|_| WalletCryptoError::Format("私钥不是合法的 UTF-8".to_string()));
    plaintext.zeroize();
    decoded.map(Zeroizing::new)
}

fn derive_encryption_key(
    password: &str,
    salt: &[u8; SALT_SIZE],
) -> Result<Zeroizing<[u8; 32]>, WalletCryptoError> {
    let params = Params::new(128 * 1024, 3, 4, Some(32))
        .map_err(|err| WalletCryptoError::KeyDerivation(err.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|err| WalletCryptoError::KeyDerivation(err.to_string()))?;
    Ok(key)
}
