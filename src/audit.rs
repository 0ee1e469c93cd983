use std::sync::Arc;

use tracing::{debug, error};

use crate::model::{AuditAction, AuditEntry};
use crate::store::AuditStore;

/// Writes audit entries after the primary mutation has been stored.
///
/// The two writes are not transactional. A failed append is logged and
/// dropped; the business change it describes stays committed.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        actor: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        details: impl Into<String>,
    ) {
        let entry = AuditEntry::new(actor, action, entity_type, entity_id, details);
        match self.store.append(&entry).await {
            Ok(()) => debug!(
                "Audit: {} {} {}/{}",
                entry.actor,
                entry.action.as_str(),
                entry.entity_type,
                entry.entity_id
            ),
            Err(e) => error!(
                "Failed to write audit entry ({} {} {}/{}): {}",
                entry.actor,
                entry.action.as_str(),
                entry.entity_type,
                entry.entity_id,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::model::AuditFilter;
    use crate::store::{MemoryAuditStore, Page, Pagination, StoreError, StoreResult};

    struct BrokenAuditStore;

    #[async_trait]
    impl AuditStore for BrokenAuditStore {
        async fn append(&self, _entry: &AuditEntry) -> StoreResult<()> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn list(
            &self,
            _filter: &AuditFilter,
            _page: Pagination,
        ) -> StoreResult<Page<AuditEntry>> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn test_record_appends_with_server_timestamp() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone());

        logger
            .record("admin@example.com", AuditAction::Create, "hotels", "42", "Created hotel H1")
            .await;

        let page = store.list(&AuditFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        let entry = &page.items[0];
        assert_eq!(entry.entity_type, "hotels");
        assert_eq!(entry.entity_id, "42");
        assert!(entry.timestamp <= time::OffsetDateTime::now_utc());
    }

    #[tokio::test]
    async fn test_failed_append_is_swallowed() {
        let logger = AuditLogger::new(Arc::new(BrokenAuditStore));
        // Must return normally
        logger
            .record("admin@example.com", AuditAction::Delete, "flights", "7", "Deleted flight")
            .await;
    }
}
