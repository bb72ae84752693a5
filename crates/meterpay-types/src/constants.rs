//! System-wide constants for the MeterPay ledger.

/// Highest accepted platform fee rate, in percent.
pub const MAX_PLATFORM_RATE: u8 = 100;

/// Divisor turning a percentage rate into a fraction.
pub const RATE_DENOMINATOR: u128 = 100;

/// Shortest accepted withdrawal delay (10 minutes).
pub const MIN_WITHDRAW_TIME_LIMIT: u64 = 600;

/// Longest accepted withdrawal delay (24 hours).
pub const MAX_WITHDRAW_TIME_LIMIT: u64 = 86_400;

/// Default platform fee rate, in percent.
pub const DEFAULT_PLATFORM_RATE: u8 = 1;

/// Default withdrawal delay in seconds.
pub const DEFAULT_WITHDRAW_TIME_LIMIT: u64 = 3_600;

/// Default delay between a governance `init` and its `commit`, in seconds.
pub const DEFAULT_PLATFORM_ACTION_TIME_LIMIT: u64 = 86_400;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ledger name.
pub const LEDGER_NAME: &str = "MeterPay";
