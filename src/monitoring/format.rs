use std::borrow::Cow;

const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// 日志里使用的短 mint 表示。
pub fn short_mint_str(mint: &str) -> Cow<'_, str> {
    match mint {
        WSOL_MINT => Cow::Borrowed("WSOL"),
        USDC_MINT => Cow::Borrowed("USDC"),
        _ if mint.len() <= 8 => Cow::Borrowed(mint),
        _ => Cow::Owned(format!("{}..{}", &mint[..4], &mint[mint.len() - 4..])),
    }
}

/// 交易签名只保留首尾，便于在日志中检索又不至于刷屏。
pub fn short_signature(signature: &str) -> Cow<'_, str> {
    if signature.len() <= 16 {
        Cow::Borrowed(signature)
    } else {
        Cow::Owned(format!(
            "{}..{}",
            &signature[..8],
            &signature[signature.len() - 8..]
        ))
    }
}
