//! Core business logic - credit ledger and session settlement.

/// Caller identity consumed from the identity provider
pub mod identity;
/// Session price lookup
pub mod pricing;
/// Session lifecycle state machine
pub mod session;
/// Wallets, transfers and ledger history
pub mod wallet;

pub use identity::Actor;
pub use pricing::PriceTable;
