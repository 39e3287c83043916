// Trust store implementations.

pub mod in_memory;
pub mod sqlite_trust_store;

pub use in_memory::InMemoryTrustStore;
pub use sqlite_trust_store::SqliteTrustStore;
