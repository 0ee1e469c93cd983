//! Persistence seam. Business entities go through [`Repository`], audit
//! entries through [`AuditStore`]; each has a Postgres and an in-memory
//! implementation.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{AuditEntry, AuditFilter, Flight, Hotel, Operation, Package, Reservation, User};

pub use memory::{MemoryAuditStore, MemoryRepository};
pub use postgres::{PgAuditStore, PgStore};

const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with key '{key}' already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A business entity as seen by the persistence layer.
pub trait Record: Clone + Send + Sync + 'static {
    type Filter: Default + Send + Sync;

    /// Singular name used in error messages
    const ENTITY: &'static str;
    /// Collection name, also the audit entity type
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    fn created_at(&self) -> OffsetDateTime;

    /// Business key that must be unique within the collection, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }

    /// In-memory evaluation of a list filter
    fn matches(&self, filter: &Self::Filter) -> bool;
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub offset: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

impl Pagination {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// One page of a list query plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the business key is taken.
    async fn insert(&self, record: &T) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<T>>;

    async fn find_by_key(&self, key: &str) -> StoreResult<Option<T>>;

    /// Returns `false` when no record has the id.
    async fn update(&self, record: &T) -> StoreResult<bool>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Newest first.
    async fn list(&self, filter: &T::Filter, page: Pagination) -> StoreResult<Page<T>>;

    async fn count(&self) -> StoreResult<i64>;
}

/// Walk every page of a list query. Used where a complete collection is
/// needed (backup, flight comparison).
pub async fn list_all<T: Record>(
    repo: &dyn Repository<T>,
    filter: &T::Filter,
) -> StoreResult<Vec<T>> {
    let mut items = Vec::new();
    let mut page = Pagination::new(0, MAX_PAGE_SIZE);
    loop {
        let batch = repo.list(filter, page).await?;
        let fetched = batch.items.len();
        items.extend(batch.items);
        if fetched < page.limit as usize || items.len() as i64 >= batch.total {
            return Ok(items);
        }
        page.offset += page.limit;
    }
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()>;

    /// Newest first.
    async fn list(&self, filter: &AuditFilter, page: Pagination) -> StoreResult<Page<AuditEntry>>;
}

/// Every repository the service layer talks to.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn Repository<User>>,
    pub flights: Arc<dyn Repository<Flight>>,
    pub reservations: Arc<dyn Repository<Reservation>>,
    pub operations: Arc<dyn Repository<Operation>>,
    pub hotels: Arc<dyn Repository<Hotel>>,
    pub packages: Arc<dyn Repository<Package>>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryRepository::<User>::new()),
            flights: Arc::new(MemoryRepository::<Flight>::new()),
            reservations: Arc::new(MemoryRepository::<Reservation>::new()),
            operations: Arc::new(MemoryRepository::<Operation>::new()),
            hotels: Arc::new(MemoryRepository::<Hotel>::new()),
            packages: Arc::new(MemoryRepository::<Package>::new()),
            audit: Arc::new(MemoryAuditStore::new()),
        }
    }

    /// Business entities in one database, audit entries in another.
    pub fn postgres(business: PgPool, audit: PgPool) -> Self {
        let store = Arc::new(PgStore::new(business));
        Self {
            users: store.clone(),
            flights: store.clone(),
            reservations: store.clone(),
            operations: store.clone(),
            hotels: store.clone(),
            packages: store,
            audit: Arc::new(PgAuditStore::new(audit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_limits() {
        assert_eq!(Pagination::default().limit, 50);
        assert_eq!(Pagination::new(0, 0).limit, 1);
        assert_eq!(Pagination::new(10, 10_000).limit, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(10, 20).offset, 10);
    }
}
