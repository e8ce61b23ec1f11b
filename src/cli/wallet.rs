use std::env;

use anyhow::{Result, anyhow};
use solana_sdk::signer::Signer;
use zeroize::Zeroizing;

use swapflow::config::wallet::{WALLET_PASSWORD_ENV, encrypt_entry};
use swapflow::wallet::parse_keypair_string;

use crate::cli::args::WalletCmd;

pub const PRIVATE_KEY_ENV: &str = "SWAPFLOW_PRIVATE_KEY";

pub fn handle_wallet_command(cmd: &WalletCmd) -> Result<()> {
    match cmd {
        WalletCmd::Encrypt { remark } => handle_wallet_encrypt(remark),
    }
}

fn handle_wallet_encrypt(remark: &str) -> Result<()> {
    if remark.trim().is_empty() {
        return Err(anyhow!("钱包备注不能为空"));
    }
    let secret = Zeroizing::new(
        env::var(PRIVATE_KEY_ENV).map_err(|_| anyhow!("请通过 {PRIVATE_KEY_ENV} 提供私钥"))?,
    );
    let password = Zeroizing::new(
        env::var(WALLET_PASSWORD_ENV)
            .map_err(|_| anyhow!("请通过 {WALLET_PASSWORD_ENV} 提供钱包密码"))?,
    );
    if password.trim().is_empty() {
        return Err(anyhow!("{WALLET_PASSWORD_ENV} 不能为空"));
    }

    let keypair = parse_keypair_string(secret.trim()).map_err(|err| anyhow!(err))?;
    let entry =
        encrypt_entry(remark, secret.trim(), password.as_str()).map_err(|err| anyhow!(err))?;

    println!("# 🔐 钱包 [{}]，公钥 {}", entry.remark, keypair.pubkey());
    println!("[[global.wallet.wallet_keys]]");
    print!("{}", toml::to_string(&entry)?);
    println!("# 交易时使用 --key vault:{}", entry.remark);
    Ok(())
}
