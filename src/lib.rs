//! # Clearn Protocol
//!
//! A collateral-backed credit token with treasury issuance and
//! time-weighted staking yield.
//!
//! ## Architecture
//!
//! The protocol consists of three tightly coupled accounting components:
//!
//! - **CreditToken**: the CLEARN ledger, minted and burned only by a single minter
//! - **Treasury**: values whitelisted collateral through a price oracle, mints
//!   CLEARN for deposits and forwards the collateral to a yield source
//! - **StakingPool**: locks CLEARN and streams funded rewards to stakers in
//!   proportion to their stake
//!
//! The [`protocol`] state machine owns all of them and runs every operation
//! atomically against an injected [`oracle::PriceOracle`].
//!
//! ## Example
//!
//! ```rust
//! use clearn::prelude::*;
//!
//! let report = Scenario::reference().run().unwrap();
//! assert!(report.passed());
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod oracle;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::ProtocolParams,
        ledger::{Amount, Ledger, UNLIMITED_ALLOWANCE},
        staking::{EmissionState, StakingPool, StakingPosition},
        token::CreditToken,
        treasury::{AssetInfo, Treasury},
    };
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{PriceData, PriceOracle, StaticPriceOracle};
    pub use crate::protocol::{
        events::{EventLog, ProtocolEvent},
        operations::{OperationResult, ProtocolOperation, Transaction},
        scenario::{Scenario, ScenarioReport},
        state_machine::{ClearnProtocol, Deployment},
    };
    pub use crate::utils::crypto::{Address, Hash};
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "Clearn";
