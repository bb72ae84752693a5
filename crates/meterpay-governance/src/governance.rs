//! The five governed parameters and their role rules.

use std::collections::BTreeSet;

use meterpay_types::{
    Address, LedgerConfig, LedgerEvent, MeterpayError, Result, Timestamp, constants,
};

use crate::roles::RoleRegistry;
use crate::timelock::{ParameterSpec, TimelockedParameter};

// ---------------------------------------------------------------------------
// Validation predicates
// ---------------------------------------------------------------------------

fn validate_rate(rate: &u8) -> Result<()> {
    if *rate > constants::MAX_PLATFORM_RATE {
        return Err(MeterpayError::OutOfRange {
            parameter: PLATFORM_RATE.name,
            value: u64::from(*rate),
            min: 0,
            max: u64::from(constants::MAX_PLATFORM_RATE),
        });
    }
    Ok(())
}

fn validate_withdraw_limit(limit: &u64) -> Result<()> {
    if !(constants::MIN_WITHDRAW_TIME_LIMIT..=constants::MAX_WITHDRAW_TIME_LIMIT).contains(limit) {
        return Err(MeterpayError::OutOfRange {
            parameter: WITHDRAW_TIME_LIMIT.name,
            value: *limit,
            min: constants::MIN_WITHDRAW_TIME_LIMIT,
            max: constants::MAX_WITHDRAW_TIME_LIMIT,
        });
    }
    Ok(())
}

fn validate_address(name: &'static str, addr: &Address) -> Result<()> {
    if addr.is_zero() {
        return Err(MeterpayError::NoOpValue {
            parameter: name,
            reason: "zero address",
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parameter specs
// ---------------------------------------------------------------------------

pub static PLATFORM_RATE: ParameterSpec<u8> = ParameterSpec {
    name: "platform rate",
    validate: validate_rate,
    on_init: |v, at| LedgerEvent::PlatformRateChangeInit {
        value: *v,
        requested_at: at,
    },
    on_commit: |v| LedgerEvent::PlatformRateChangeCommit { value: *v },
};

pub static WITHDRAW_TIME_LIMIT: ParameterSpec<u64> = ParameterSpec {
    name: "withdraw time limit",
    validate: validate_withdraw_limit,
    on_init: |v, at| LedgerEvent::WithdrawTimeLimitChangeInit {
        value: *v,
        requested_at: at,
    },
    on_commit: |v| LedgerEvent::WithdrawTimeLimitChangeCommit { value: *v },
};

pub static SIGNER: ParameterSpec<Address> = ParameterSpec {
    name: "signer",
    validate: |a| validate_address("signer", a),
    on_init: |v, at| LedgerEvent::SignerChangeInit {
        value: *v,
        requested_at: at,
    },
    on_commit: |v| LedgerEvent::SignerChangeCommit { value: *v },
};

pub static WALLET: ParameterSpec<Address> = ParameterSpec {
    name: "wallet",
    validate: |a| validate_address("wallet", a),
    on_init: |v, at| LedgerEvent::WalletChangeInit {
        value: *v,
        requested_at: at,
    },
    on_commit: |v| LedgerEvent::WalletChangeCommit { value: *v },
};

pub static PLATFORM: ParameterSpec<Address> = ParameterSpec {
    name: "platform",
    validate: |a| validate_address("platform", a),
    on_init: |v, at| LedgerEvent::PlatformChangeInit {
        value: *v,
        requested_at: at,
    },
    on_commit: |v| LedgerEvent::PlatformChangeCommit { value: *v },
};

// ---------------------------------------------------------------------------
// Governance
// ---------------------------------------------------------------------------

/// Platform-controlled parameters, each behind its own timelock.
pub struct Governance {
    platform_rate: TimelockedParameter<u8>,
    withdraw_time_limit: TimelockedParameter<u64>,
    signer: TimelockedParameter<Address>,
    wallet: TimelockedParameter<Address>,
    platform: TimelockedParameter<Address>,
    relayers: BTreeSet<Address>,
    platform_action_time_limit: u64,
}

impl Governance {
    /// Build from a validated config.
    ///
    /// # Errors
    /// Returns `Configuration` if the config fails validation.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            platform_rate: TimelockedParameter::new(&PLATFORM_RATE, config.platform_rate),
            withdraw_time_limit: TimelockedParameter::new(
                &WITHDRAW_TIME_LIMIT,
                config.withdraw_time_limit,
            ),
            signer: TimelockedParameter::new(&SIGNER, config.signer),
            wallet: TimelockedParameter::new(&WALLET, config.wallet),
            platform: TimelockedParameter::new(&PLATFORM, config.platform),
            relayers: config.relayers.iter().copied().collect(),
            platform_action_time_limit: config.platform_action_time_limit,
        })
    }

    /// Snapshot of the current role holders.
    #[must_use]
    pub fn roles(&self) -> RoleRegistry {
        RoleRegistry {
            platform: *self.platform.current(),
            wallet: *self.wallet.current(),
            signer: *self.signer.current(),
            relayers: self.relayers.clone(),
        }
    }

    // --- platform rate ---------------------------------------------------

    pub fn init_platform_rate(
        &mut self,
        caller: Address,
        rate: u8,
        now: Timestamp,
    ) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self.platform_rate.init(rate, now)?;
        tracing::info!(rate, now, "platform rate change initiated");
        Ok(event)
    }

    pub fn commit_platform_rate(&mut self, caller: Address, now: Timestamp) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self
            .platform_rate
            .commit(now, self.platform_action_time_limit, |_| Ok(()))?;
        tracing::info!(rate = self.platform_rate.current(), "platform rate changed");
        Ok(event)
    }

    // --- withdraw time limit ---------------------------------------------

    pub fn init_withdraw_time_limit(
        &mut self,
        caller: Address,
        limit: u64,
        now: Timestamp,
    ) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self.withdraw_time_limit.init(limit, now)?;
        tracing::info!(limit, now, "withdraw time limit change initiated");
        Ok(event)
    }

    pub fn commit_withdraw_time_limit(
        &mut self,
        caller: Address,
        now: Timestamp,
    ) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event =
            self.withdraw_time_limit
                .commit(now, self.platform_action_time_limit, |_| Ok(()))?;
        tracing::info!(
            limit = self.withdraw_time_limit.current(),
            "withdraw time limit changed"
        );
        Ok(event)
    }

    // --- signer ----------------------------------------------------------

    pub fn init_signer(
        &mut self,
        caller: Address,
        signer: Address,
        now: Timestamp,
    ) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self.signer.init(signer, now)?;
        tracing::info!(%signer, now, "signer change initiated");
        Ok(event)
    }

    pub fn commit_signer(&mut self, caller: Address, now: Timestamp) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self
            .signer
            .commit(now, self.platform_action_time_limit, |_| Ok(()))?;
        tracing::info!(signer = %self.signer.current(), "signer changed");
        Ok(event)
    }

    // --- wallet ----------------------------------------------------------

    pub fn init_wallet(
        &mut self,
        caller: Address,
        wallet: Address,
        now: Timestamp,
    ) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self.wallet.init(wallet, now)?;
        tracing::info!(%wallet, now, "wallet change initiated");
        Ok(event)
    }

    pub fn commit_wallet(&mut self, caller: Address, now: Timestamp) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self
            .wallet
            .commit(now, self.platform_action_time_limit, |_| Ok(()))?;
        tracing::info!(wallet = %self.wallet.current(), "wallet changed");
        Ok(event)
    }

    // --- platform account ------------------------------------------------

    pub fn init_platform(
        &mut self,
        caller: Address,
        platform: Address,
        now: Timestamp,
    ) -> Result<LedgerEvent> {
        self.roles().require_platform(caller)?;
        let event = self.platform.init(platform, now)?;
        tracing::info!(%platform, now, "platform change initiated");
        Ok(event)
    }

    /// Completed by the pending platform itself, never by the outgoing one.
    pub fn commit_platform(&mut self, caller: Address, now: Timestamp) -> Result<LedgerEvent> {
        let event = self
            .platform
            .commit(now, self.platform_action_time_limit, |pending| {
                if caller == *pending {
                    Ok(())
                } else {
                    Err(MeterpayError::AccessDenied {
                        caller,
                        role: "pending platform",
                    })
                }
            })?;
        tracing::info!(platform = %self.platform.current(), "platform changed");
        Ok(event)
    }

    // --- views -----------------------------------------------------------

    #[must_use]
    pub fn platform_rate(&self) -> &TimelockedParameter<u8> {
        &self.platform_rate
    }

    #[must_use]
    pub fn withdraw_time_limit(&self) -> &TimelockedParameter<u64> {
        &self.withdraw_time_limit
    }

    #[must_use]
    pub fn signer(&self) -> &TimelockedParameter<Address> {
        &self.signer
    }

    #[must_use]
    pub fn wallet(&self) -> &TimelockedParameter<Address> {
        &self.wallet
    }

    #[must_use]
    pub fn platform(&self) -> &TimelockedParameter<Address> {
        &self.platform
    }

    /// The fixed delay shared by every governed parameter.
    #[must_use]
    pub fn platform_action_time_limit(&self) -> u64 {
        self.platform_action_time_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: u64 = 86_400;

    fn platform() -> Address {
        Address([1; 20])
    }
    fn wallet() -> Address {
        Address([2; 20])
    }
    fn signer() -> Address {
        Address([3; 20])
    }
    fn relayer() -> Address {
        Address([4; 20])
    }
    fn outsider() -> Address {
        Address([9; 20])
    }

    fn governance() -> Governance {
        let config = LedgerConfig::new(Address([0xC0; 20]), platform(), wallet(), signer(), vec![
            relayer(),
        ]);
        Governance::from_config(&config).unwrap()
    }

    #[test]
    fn from_config_sets_initial_values() {
        let gov = governance();
        assert_eq!(*gov.platform_rate().current(), 1);
        assert_eq!(*gov.withdraw_time_limit().current(), 3_600);
        assert_eq!(*gov.signer().current(), signer());
        assert_eq!(*gov.wallet().current(), wallet());
        assert_eq!(*gov.platform().current(), platform());
        assert_eq!(gov.platform_action_time_limit(), DELAY);
        assert_eq!(gov.platform_rate().requested_at(), None);
        assert!(gov.roles().is_relayer(relayer()));
    }

    #[test]
    fn non_platform_cannot_init_or_commit() {
        let mut gov = governance();
        let denied = |r: Result<LedgerEvent>| {
            matches!(r, Err(MeterpayError::AccessDenied { .. }))
        };
        assert!(denied(gov.init_platform_rate(outsider(), 3, 0)));
        assert!(denied(gov.commit_platform_rate(outsider(), 0)));
        assert!(denied(gov.init_withdraw_time_limit(outsider(), 1_000, 0)));
        assert!(denied(gov.commit_withdraw_time_limit(outsider(), 0)));
        assert!(denied(gov.init_signer(outsider(), outsider(), 0)));
        assert!(denied(gov.commit_signer(outsider(), 0)));
        assert!(denied(gov.init_wallet(outsider(), outsider(), 0)));
        assert!(denied(gov.commit_wallet(outsider(), 0)));
        assert!(denied(gov.init_platform(outsider(), outsider(), 0)));
    }

    #[test]
    fn rate_above_hundred_rejected_without_side_effects() {
        let mut gov = governance();
        for rate in [101u8, 102] {
            let err = gov.init_platform_rate(platform(), rate, 10).unwrap_err();
            assert!(matches!(err, MeterpayError::OutOfRange { value, .. } if value == u64::from(rate)));
            assert_eq!(gov.platform_rate().pending(), None);
            assert_eq!(gov.platform_rate().requested_at(), None);
            assert_eq!(*gov.platform_rate().current(), 1);
        }
    }

    #[test]
    fn rate_equal_to_current_rejected() {
        let mut gov = governance();
        let err = gov.init_platform_rate(platform(), 1, 10).unwrap_err();
        assert!(matches!(err, MeterpayError::NoOpValue { .. }));
    }

    #[test]
    fn rate_round_trip() {
        let mut gov = governance();
        let ev = gov.init_platform_rate(platform(), 7, 1_000).unwrap();
        assert_eq!(
            ev,
            LedgerEvent::PlatformRateChangeInit {
                value: 7,
                requested_at: 1_000
            }
        );
        assert_eq!(*gov.platform_rate().current(), 1);

        let err = gov
            .commit_platform_rate(platform(), 1_000 + DELAY - 1)
            .unwrap_err();
        assert!(matches!(err, MeterpayError::TimelockNotElapsed { .. }));

        let ev = gov.commit_platform_rate(platform(), 1_000 + DELAY).unwrap();
        assert_eq!(ev, LedgerEvent::PlatformRateChangeCommit { value: 7 });
        assert_eq!(*gov.platform_rate().current(), 7);
        assert_eq!(gov.platform_rate().pending(), None);
        assert_eq!(gov.platform_rate().requested_at(), None);
    }

    #[test]
    fn zero_rate_is_committable() {
        let mut gov = governance();
        gov.init_platform_rate(platform(), 0, 0).unwrap();
        gov.commit_platform_rate(platform(), DELAY).unwrap();
        assert_eq!(*gov.platform_rate().current(), 0);
    }

    #[test]
    fn withdraw_limit_bounds() {
        let mut gov = governance();
        for bad in [0u64, 599, 86_401] {
            let err = gov.init_withdraw_time_limit(platform(), bad, 0).unwrap_err();
            assert!(matches!(err, MeterpayError::OutOfRange { .. }));
        }
        let err = gov
            .init_withdraw_time_limit(platform(), 3_600, 0)
            .unwrap_err();
        assert!(matches!(err, MeterpayError::NoOpValue { .. }));

        gov.init_withdraw_time_limit(platform(), 600, 0).unwrap();
        gov.init_withdraw_time_limit(platform(), 86_400, 0).unwrap();
        gov.commit_withdraw_time_limit(platform(), DELAY).unwrap();
        assert_eq!(*gov.withdraw_time_limit().current(), 86_400);
    }

    #[test]
    fn commit_without_pending_fails() {
        let mut gov = governance();
        assert!(matches!(
            gov.commit_withdraw_time_limit(platform(), DELAY),
            Err(MeterpayError::NoOpValue { .. })
        ));
        assert!(matches!(
            gov.commit_signer(platform(), DELAY),
            Err(MeterpayError::NoOpValue { .. })
        ));
        assert!(matches!(
            gov.commit_wallet(platform(), DELAY),
            Err(MeterpayError::NoOpValue { .. })
        ));
        assert!(matches!(
            gov.commit_platform(platform(), DELAY),
            Err(MeterpayError::NoOpValue { .. })
        ));
    }

    #[test]
    fn address_params_reject_zero_and_current() {
        let mut gov = governance();
        for result in [
            gov.init_signer(platform(), Address::ZERO, 0),
            gov.init_signer(platform(), signer(), 0),
            gov.init_wallet(platform(), Address::ZERO, 0),
            gov.init_wallet(platform(), wallet(), 0),
            gov.init_platform(platform(), Address::ZERO, 0),
            gov.init_platform(platform(), platform(), 0),
        ] {
            assert!(matches!(result, Err(MeterpayError::NoOpValue { .. })));
        }
    }

    #[test]
    fn signer_and_wallet_round_trip() {
        let mut gov = governance();
        let new_signer = Address([0x51; 20]);
        let new_wallet = Address([0x52; 20]);
        gov.init_signer(platform(), new_signer, 0).unwrap();
        gov.init_wallet(platform(), new_wallet, 0).unwrap();

        assert!(gov.commit_signer(platform(), DELAY - 1).is_err());
        assert!(gov.commit_wallet(platform(), DELAY - 1).is_err());

        gov.commit_signer(platform(), DELAY).unwrap();
        gov.commit_wallet(platform(), DELAY).unwrap();
        let roles = gov.roles();
        assert_eq!(roles.signer, new_signer);
        assert_eq!(roles.wallet, new_wallet);
        assert_eq!(gov.signer().pending(), None);
        assert_eq!(gov.wallet().requested_at(), None);
    }

    #[test]
    fn platform_commit_requires_pending_holder() {
        let mut gov = governance();
        let successor = Address([0x61; 20]);
        gov.init_platform(platform(), successor, 0).unwrap();

        // Neither the current platform nor an outsider can complete it.
        for caller in [platform(), outsider()] {
            let err = gov.commit_platform(caller, DELAY).unwrap_err();
            assert!(matches!(
                err,
                MeterpayError::AccessDenied {
                    role: "pending platform",
                    ..
                }
            ));
        }

        let err = gov.commit_platform(successor, DELAY - 1).unwrap_err();
        assert!(matches!(err, MeterpayError::TimelockNotElapsed { .. }));

        let ev = gov.commit_platform(successor, DELAY).unwrap();
        assert_eq!(ev, LedgerEvent::PlatformChangeCommit { value: successor });
        assert_eq!(gov.roles().platform, successor);
        assert_eq!(gov.platform().pending(), None);

        // The old platform lost its powers.
        assert!(gov.init_platform_rate(platform(), 5, DELAY).is_err());
        assert!(gov.init_platform_rate(successor, 5, DELAY).is_ok());
    }

    #[test]
    fn parameters_are_independent() {
        let mut gov = governance();
        gov.init_platform_rate(platform(), 5, 0).unwrap();
        gov.init_wallet(platform(), Address([0x70; 20]), DELAY / 2).unwrap();

        gov.commit_platform_rate(platform(), DELAY).unwrap();
        assert!(matches!(
            gov.commit_wallet(platform(), DELAY),
            Err(MeterpayError::TimelockNotElapsed { .. })
        ));
        assert_eq!(gov.wallet().pending(), Some(&Address([0x70; 20])));
    }
}
