use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditStore, Page, Pagination, Record, Repository, StoreError, StoreResult};
use crate::model::{AuditEntry, AuditFilter};

/// Process-local repository used by tests and `database.backend = "memory"`.
pub struct MemoryRepository<T> {
    records: RwLock<HashMap<Uuid, T>>,
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn key_taken<T: Record>(records: &HashMap<Uuid, T>, record: &T) -> Option<String> {
    let key = record.unique_key()?;
    records
        .values()
        .any(|other| {
            other.id() != record.id() && other.unique_key().as_deref() == Some(key.as_str())
        })
        .then_some(key)
}

fn paginate<T>(mut items: Vec<T>, page: Pagination) -> Page<T> {
    let page = page.clamped();
    let total = items.len() as i64;
    let items = items
        .drain(..)
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect();
    Page {
        items,
        total,
        offset: page.offset,
        limit: page.limit,
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn insert(&self, record: &T) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if let Some(key) = key_taken(&records, record) {
            return Err(StoreError::Conflict { entity: T::ENTITY, key });
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<T>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &str) -> StoreResult<Option<T>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| record.unique_key().as_deref() == Some(key))
            .cloned())
    }

    async fn update(&self, record: &T) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.id()) {
            return Ok(false);
        }
        if let Some(key) = key_taken(&records, record) {
            return Err(StoreError::Conflict { entity: T::ENTITY, key });
        }
        records.insert(record.id(), record.clone());
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn list(&self, filter: &T::Filter, page: Pagination) -> StoreResult<Page<T>> {
        let records = self.records.read().await;
        let mut items: Vec<T> = records
            .values()
            .filter(|record| record.matches(filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| a.id().cmp(&b.id())));
        Ok(paginate(items, page))
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.records.read().await.len() as i64)
    }
}

/// Append-only log held in memory.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter, page: Pagination) -> StoreResult<Page<AuditEntry>> {
        let entries = self.entries.read().await;
        // Appended in time order, so reversing gives newest first
        let items: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        Ok(paginate(items, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditAction, Hotel, HotelFilter, NewHotel};

    fn hotel(code: &str) -> Hotel {
        Hotel::new(NewHotel {
            code: code.to_string(),
            name: format!("Hotel {code}"),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_enforces_unique_key() {
        let repo = MemoryRepository::<Hotel>::new();
        repo.insert(&hotel("H1")).await.unwrap();

        let err = repo.insert(&hotel("H1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "hotel", .. }));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_and_renamed_into_conflict() {
        let repo = MemoryRepository::<Hotel>::new();
        let first = hotel("H1");
        let mut second = hotel("H2");
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        assert!(!repo.update(&hotel("H9")).await.unwrap());

        second.code = "H1".to_string();
        assert!(repo.update(&second).await.is_err());

        second.name = "Renamed".to_string();
        second.code = "H2".to_string();
        assert!(repo.update(&second).await.unwrap());
        assert_eq!(repo.find_by_key("H2").await.unwrap().unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn test_list_paginates_with_total() {
        let repo = MemoryRepository::<Hotel>::new();
        for n in 0..7 {
            repo.insert(&hotel(&format!("H{n}"))).await.unwrap();
        }

        let page = repo.list(&HotelFilter::default(), Pagination::new(5, 5)).await.unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_audit_list_newest_first() {
        let store = MemoryAuditStore::new();
        store
            .append(&AuditEntry::new("a@x.io", AuditAction::Create, "hotels", "1", "first"))
            .await
            .unwrap();
        store
            .append(&AuditEntry::new("b@x.io", AuditAction::Delete, "flights", "2", "second"))
            .await
            .unwrap();

        let page = store.list(&AuditFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(page.items[0].details, "second");

        let filter = AuditFilter {
            entity_type: Some("hotels".to_string()),
            ..Default::default()
        };
        let page = store.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].actor, "a@x.io");
    }
}
