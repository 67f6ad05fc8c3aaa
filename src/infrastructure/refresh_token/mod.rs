//! Refresh token store implementations

mod in_memory;
mod store;

use std::sync::Arc;

use crate::domain::kv::ExpiringStore;
use crate::domain::token::RefreshTokenStore;
use crate::infrastructure::kv::StoreType;

pub use in_memory::InMemoryRefreshTokenStore;
pub use store::StoreRefreshTokenStore;

/// Picks the refresh token backend from configuration
pub fn create_refresh_token_store(
    backend: StoreType,
    store: Arc<dyn ExpiringStore>,
) -> Arc<dyn RefreshTokenStore> {
    match backend {
        StoreType::Redis => Arc::new(StoreRefreshTokenStore::new(store)),
        StoreType::InMemory => Arc::new(InMemoryRefreshTokenStore::new()),
    }
}
