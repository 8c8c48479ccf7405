//! Ledger configuration

use crate::core::blockchain::LedgerError;
use crate::crypto::HASH_HEX_LEN;
use serde::{Deserialize, Serialize};

/// Default mining difficulty (number of leading zero hex characters)
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Default reward paid for each mined block
pub const DEFAULT_MINING_REWARD: u64 = 100;

/// Highest difficulty a SHA-256 hex digest can satisfy
pub const MAX_DIFFICULTY: usize = HASH_HEX_LEN;

/// Parameters a ledger is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Required leading zero hex characters per block
    pub difficulty: usize,
    /// Payout for each mined block
    pub mining_reward: u64,
    /// Fixed genesis timestamp (Unix ms). Replicas that want to reach
    /// consensus with each other must share the same value.
    #[serde(default)]
    pub genesis_timestamp: Option<i64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            genesis_timestamp: None,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: usize) -> Self {
        Self {
            difficulty,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.mining_reward, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(LedgerConfig::with_difficulty(0).validate().is_err());
        assert!(LedgerConfig::with_difficulty(MAX_DIFFICULTY).validate().is_ok());
        assert!(LedgerConfig::with_difficulty(MAX_DIFFICULTY + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_missing_genesis_timestamp_deserializes() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"difficulty":2,"mining_reward":50}"#).unwrap();
        assert_eq!(config.genesis_timestamp, None);
        assert_eq!(config.difficulty, 2);
    }
}
