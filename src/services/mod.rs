pub mod ledger;
pub mod scanner;
pub mod signals;
pub mod sqlite_store;
pub mod store;

pub use ledger::{Ledger, Reconciled, Reconciliation};
pub use scanner::Scanner;
pub use sqlite_store::SqliteStore;
pub use store::{MemoryStore, OpportunityStore};
