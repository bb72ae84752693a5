//! # meterpay-governance
//!
//! **Governance Plane**: the platform-controlled parameters and the roles
//! allowed to touch them.
//!
//! ## Two-Phase Timelock
//!
//! Every governed parameter changes in two steps separated by a fixed delay:
//!
//! ```text
//! Stable ──init(value)──▶ Pending ──commit (delay elapsed)──▶ Stable
//! ```
//!
//! Five independent instances exist: platform rate, withdrawal delay,
//! signer, wallet, and platform account. All are initiated by the platform.
//! All but the platform account are committed by the platform; the platform
//! account is committed by the *pending* holder, so ownership only moves to
//! an address that can act.

pub mod governance;
pub mod roles;
pub mod timelock;

pub use governance::Governance;
pub use roles::RoleRegistry;
pub use timelock::{ParameterSpec, ParameterView, TimelockedParameter};
