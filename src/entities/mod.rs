//! Entity module - SeaORM definitions for wallets, ledger entries and sessions.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod credit_transaction;
pub mod session;
pub mod wallet;

// Re-export specific types to avoid conflicts with sea-orm's own `Transaction`
pub use credit_transaction::{
    Column as CreditTransactionColumn, Entity as CreditTransaction,
    Model as CreditTransactionModel,
};
pub use session::{
    Column as SessionColumn, Entity as Session, Model as SessionModel, SessionDuration,
    SessionLevel, SessionStatus,
};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
