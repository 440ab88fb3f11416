//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies (clock, ledger) are abstracted behind traits;
//! this crate provides implementations that return deterministic values,
//! can be controlled programmatically, and never touch the network.
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::NullLedger;
