use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::model::{AuditEntry, AuditFilter};
use crate::store::{AuditStore, Page, Pagination, StoreResult};

/// Audit log on its own pool, usually a separate database.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    if let Some(entity_type) = &filter.entity_type {
        query.push(" AND entity_type = ").push_bind(entity_type.clone());
    }
    if let Some(actor) = &filter.actor {
        query.push(" AND actor = ").push_bind(actor.clone());
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO system_logs (id, actor, action, entity_type, entity_id, details, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id)
        .bind(&entry.actor)
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter, page: Pagination) -> StoreResult<Page<AuditEntry>> {
        let page = page.clamped();

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM system_logs WHERE TRUE");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new("SELECT * FROM system_logs WHERE TRUE");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY timestamp DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));
        let items = query.build_query_as::<AuditEntry>().fetch_all(&self.pool).await?;

        Ok(Page {
            items,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuditAction;
    use crate::store::postgres::test_support::setup_test_db;

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_append_then_filter_by_actor() {
        let store = PgAuditStore::new(setup_test_db().await);
        let actor = format!("audit_{}@example.com", uuid::Uuid::new_v4().simple());
        let entry =
            AuditEntry::new(&actor, AuditAction::LoginFailed, "users", &actor, "bad password");
        store.append(&entry).await.unwrap();

        let filter = AuditFilter {
            actor: Some(actor.clone()),
            ..Default::default()
        };
        let page = store.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].action, AuditAction::LoginFailed);
    }
}
