use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bincode::error::{DecodeError, EncodeError};
use bincode::serde::{decode_from_slice, encode_to_vec};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeTxError {
    #[error("base64 解码失败: {0}")]
    Base64(base64::DecodeError),
    #[error("bincode 解码失败: {0}")]
    Bincode(DecodeError),
    #[error("交易末尾存在 {0} 个多余字节")]
    TrailingBytes(usize),
}

#[derive(Debug, Error)]
pub enum EncodeTxError {
    #[error("bincode 编码失败: {0}")]
    Bincode(EncodeError),
}

/// 构建服务返回的 base64 交易块 → `VersionedTransaction`。
pub fn decode_transaction_blob(encoded: &str) -> Result<VersionedTransaction, DecodeTxError> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(DecodeTxError::Base64)?;
    let (tx, consumed) = decode_from_slice::<VersionedTransaction, _>(&bytes, bincode_config())
        .map_err(DecodeTxError::Bincode)?;
    if consumed != bytes.len() {
        return Err(DecodeTxError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(tx)
}

pub fn encode_transaction_blob(tx: &VersionedTransaction) -> Result<String, EncodeTxError> {
    let bytes = encode_to_vec(tx, bincode_config()).map_err(EncodeTxError::Bincode)?;
    Ok(BASE64_STANDARD.encode(bytes))
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Signature;

    #[test]
    fn unsigned_blob_keeps_signer_slots() {
        let payer = Pubkey::new_unique();
        let instruction = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[7],
            vec![AccountMeta::new(payer, true)],
        );
        let message = Message::new_with_blockhash(&[instruction], Some(&payer), &Hash::new_unique());
        let tx = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        };

        let blob = encode_transaction_blob(&tx).expect("encode");
        let decoded = decode_transaction_blob(&blob).expect("decode");
        assert_eq!(decoded.message.header().num_required_signatures, 1);
        assert_eq!(decoded.message.static_account_keys()[0], payer);
        assert_eq!(decoded.signatures, vec![Signature::default()]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_transaction_blob("not base64!"),
            Err(DecodeTxError::Base64(_))
        ));
        assert!(decode_transaction_blob("AAAA").is_err());
    }
}
