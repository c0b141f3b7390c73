//! Persistence backends for Stashflow.
//!
//! Both backends implement every store trait from `stashflow-core` and
//! therefore `FinanceStore`:
//! - `SqliteStore`: sqlx over a WAL-mode SQLite file
//! - `InMemoryStore`: tokio `RwLock` over plain vectors, for tests and dry runs

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use stashflow_core::error::StoreError;
use stashflow_core::store::FinanceStore;
use std::sync::Arc;

/// Open the backend named by a database URL.
///
/// `memory://` selects the in-process store; anything else is handed to
/// SQLite (`sqlite://path.db`, `sqlite::memory:`).
pub async fn open(url: &str, max_connections: u32) -> Result<Arc<dyn FinanceStore>, StoreError> {
    if url == "memory://" {
        return Ok(Arc::new(InMemoryStore::new()));
    }

    #[cfg(feature = "sqlite")]
    {
        let store = SqliteStore::with_max_connections(url, max_connections).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = max_connections;
        Err(StoreError::Storage(format!(
            "No backend available for '{url}' (built without sqlite)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_memory_backend() {
        let store = open("memory://", 1).await.unwrap();
        assert_eq!(store.backend_name(), "in_memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn open_sqlite_backend() {
        let store = open("sqlite::memory:", 4).await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
    }
}
