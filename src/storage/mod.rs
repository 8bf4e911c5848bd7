// src/storage/mod.rs
pub mod blacklist;
pub mod journal;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use blacklist::Blacklist;
pub use journal::{AuditJournal, JournalError};
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::{AuditLog, IdentityDirectory, LoanHistory, RuleStore, Storage};
