//! Construction-time configuration for a ledger instance.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Address, MeterpayError, Result, constants};

/// Configuration consumed once when a ledger instance is created.
///
/// Role addresses set here are only the *initial* values; afterwards they
/// change exclusively through timelocked governance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// This instance's own address. Every signed commit digest binds it.
    pub contract_address: Address,
    /// Governance owner.
    pub platform: Address,
    /// Fee payout destination.
    pub wallet: Address,
    /// Platform co-signer of every session charge.
    pub signer: Address,
    /// Accounts allowed to submit session commits.
    pub relayers: Vec<Address>,
    /// Fee percentage taken from each incremental charge.
    #[serde(default = "default_platform_rate")]
    pub platform_rate: u8,
    /// Delay between `init_withdraw` and a withdrawal taking effect, seconds.
    #[serde(default = "default_withdraw_time_limit")]
    pub withdraw_time_limit: u64,
    /// Fixed delay between a governance `init` and its `commit`, seconds.
    #[serde(default = "default_platform_action_time_limit")]
    pub platform_action_time_limit: u64,
}

fn default_platform_rate() -> u8 {
    constants::DEFAULT_PLATFORM_RATE
}

fn default_withdraw_time_limit() -> u64 {
    constants::DEFAULT_WITHDRAW_TIME_LIMIT
}

fn default_platform_action_time_limit() -> u64 {
    constants::DEFAULT_PLATFORM_ACTION_TIME_LIMIT
}

impl LedgerConfig {
    /// Config with default rate and delays.
    #[must_use]
    pub fn new(
        contract_address: Address,
        platform: Address,
        wallet: Address,
        signer: Address,
        relayers: Vec<Address>,
    ) -> Self {
        Self {
            contract_address,
            platform,
            wallet,
            signer,
            relayers,
            platform_rate: constants::DEFAULT_PLATFORM_RATE,
            withdraw_time_limit: constants::DEFAULT_WITHDRAW_TIME_LIMIT,
            platform_action_time_limit: constants::DEFAULT_PLATFORM_ACTION_TIME_LIMIT,
        }
    }

    /// Check every field against the bounds governance would enforce.
    ///
    /// # Errors
    /// Returns [`MeterpayError::Configuration`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let roles = [
            ("contract_address", self.contract_address),
            ("platform", self.platform),
            ("wallet", self.wallet),
            ("signer", self.signer),
        ];
        for (name, addr) in roles {
            if addr.is_zero() {
                return Err(MeterpayError::Configuration(format!(
                    "{name} must not be the zero address"
                )));
            }
        }
        if self.relayers.is_empty() {
            return Err(MeterpayError::Configuration(
                "at least one relayer is required".into(),
            ));
        }
        if self.relayers.iter().any(Address::is_zero) {
            return Err(MeterpayError::Configuration(
                "relayer must not be the zero address".into(),
            ));
        }
        if self.platform_rate > constants::MAX_PLATFORM_RATE {
            return Err(MeterpayError::Configuration(format!(
                "platform_rate {} exceeds {}",
                self.platform_rate,
                constants::MAX_PLATFORM_RATE
            )));
        }
        if !(constants::MIN_WITHDRAW_TIME_LIMIT..=constants::MAX_WITHDRAW_TIME_LIMIT)
            .contains(&self.withdraw_time_limit)
        {
            return Err(MeterpayError::Configuration(format!(
                "withdraw_time_limit {} outside [{}, {}]",
                self.withdraw_time_limit,
                constants::MIN_WITHDRAW_TIME_LIMIT,
                constants::MAX_WITHDRAW_TIME_LIMIT
            )));
        }
        if self.platform_action_time_limit == 0 {
            return Err(MeterpayError::Configuration(
                "platform_action_time_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
