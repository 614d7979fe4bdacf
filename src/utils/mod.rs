//! Utility modules for the Clearn protocol.
//!
//! This module contains shared utilities used across the protocol:
//! - Addresses and hashes
//! - Checked integer arithmetic
//! - Validation helpers
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;
pub mod validation;

pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use validation::*;
