pub mod base;
pub mod memory_store;
pub mod mongodb_store;

// Re-export the primary store items so code outside can do
// "use crate::store::{ConfigStore, create_store};"
pub use base::{create_store, ConfigStore, StoreError};
pub use memory_store::MemoryStore;
pub use mongodb_store::{MongoDBConfig, MongoDBStore};
