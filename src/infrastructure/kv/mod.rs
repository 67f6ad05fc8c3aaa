//! Expiring key-value store implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{create_expiring_store, StoreType};
pub use in_memory::InMemoryExpiringStore;
pub use self::redis::{connect as connect_redis, RedisExpiringStore, RedisStoreConfig};
