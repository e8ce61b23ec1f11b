use std::fmt;

use serde::{Deserialize, Serialize};
use solana_commitment_config::CommitmentConfig;

/// 目标确认深度，配置与 CLI 中以小写字符串出现。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl From<Commitment> for CommitmentConfig {
    fn from(value: Commitment) -> Self {
        match value {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_commitment_config::CommitmentLevel;

    #[test]
    fn maps_to_native_levels() {
        assert_eq!(
            CommitmentConfig::from(Commitment::Processed).commitment,
            CommitmentLevel::Processed
        );
        assert_eq!(
            CommitmentConfig::from(Commitment::Finalized).commitment,
            CommitmentLevel::Finalized
        );
    }

    #[test]
    fn serde_uses_lowercase() {
        let parsed: Commitment = serde_json::from_str("\"finalized\"").expect("parse");
        assert_eq!(parsed, Commitment::Finalized);
        assert_eq!(
            serde_json::to_string(&Commitment::Processed).expect("serialize"),
            "\"processed\""
        );
        assert!(serde_json::from_str::<Commitment>("\"max\"").is_err());
    }
}
