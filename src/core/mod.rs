//! Core modules for the Clearn protocol.
//!
//! This module contains the accounting components:
//! - Fungible asset ledger shared by collateral and CLEARN
//! - CLEARN credit token with a single minting authority
//! - Collateral Treasury (valuation, mint/burn)
//! - Staking pool with time-weighted reward accrual
//! - Configuration and protocol parameters

pub mod config;
pub mod ledger;
pub mod staking;
pub mod token;
pub mod treasury;

pub use config::*;
pub use ledger::*;
pub use staking::*;
pub use token::*;
pub use treasury::*;
