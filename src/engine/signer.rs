use std::fmt;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use super::assembler::AssembledLeg;
use super::error::TradeError;
use crate::wallet::{KeyProvider, KeyRef};

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub leg: usize,
    pub transaction: VersionedTransaction,
    /// 第一个签名即交易 ID，广播前即可在本地得知。
    pub signature: Signature,
}

/// 单腿签名期间独占私钥；不可克隆，离开作用域即释放密钥。
pub struct TradeSigner {
    keypair: Keypair,
}

impl fmt::Debug for TradeSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradeSigner")
            .field("pubkey", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}

impl TradeSigner {
    pub fn acquire(provider: &dyn KeyProvider, key: &KeyRef) -> Result<Self, TradeError> {
        provider
            .load(key)
            .map(|keypair| Self { keypair })
            .map_err(|err| TradeError::SigningKeyMismatch(format!("key {key} unavailable: {err}")))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// 要么所有必需签名槽位都被填满，要么一个签名都不附加。
    pub fn sign(&self, leg: &AssembledLeg) -> Result<SignedTransaction, TradeError> {
        let pubkey = self.pubkey();
        let required = leg.required_signers();
        let slot = required
            .iter()
            .position(|signer| *signer == pubkey)
            .ok_or_else(|| {
                TradeError::SigningKeyMismatch(format!(
                    "leg {}: {pubkey} is not a required signer",
                    leg.index
                ))
            })?;

        let mut transaction = leg.transaction.clone();
        transaction
            .signatures
            .resize(required.len(), Signature::default());
        transaction.signatures[slot] = self.keypair.sign_message(&transaction.message.serialize());

        if let Some(missing) = transaction
            .signatures
            .iter()
            .position(|signature| *signature == Signature::default())
        {
            return Err(TradeError::SigningKeyMismatch(format!(
                "leg {}: required signer {} has no signature",
                leg.index, required[missing]
            )));
        }

        Ok(SignedTransaction {
            leg: leg.index,
            signature: transaction.signatures[0],
            transaction,
        })
    }
}
