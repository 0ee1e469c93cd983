//! Postgres adapters. Business tables live behind [`PgStore`]; the audit
//! log has its own pool behind [`PgAuditStore`].

mod audit;
mod flights;
mod hotels;
mod operations;
mod packages;
mod reservations;
mod users;

use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgRow};

use super::{Page, Pagination, StoreError, StoreResult};

pub use audit::PgAuditStore;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turn a unique-constraint violation into a conflict on the business key.
fn conflict_or_db(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict {
            entity,
            key: key.to_string(),
        },
        _ => StoreError::Database(err),
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

/// Push `AND (a ILIKE $n OR b ILIKE $m ...)` for a free-text search.
fn push_search(query: &mut QueryBuilder<'_, Postgres>, columns: &[&str], term: &str) {
    let pattern = like_pattern(term);
    query.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query.push(*column).push(" ILIKE ").push_bind(pattern.clone());
    }
    query.push(")");
}

/// Count and fetch one page of `table`, newest first. `push_filters`
/// appends `AND ...` clauses after a leading `WHERE TRUE`.
async fn fetch_page<T>(
    pool: &PgPool,
    table: &str,
    page: Pagination,
    push_filters: impl Fn(&mut QueryBuilder<'_, Postgres>),
) -> StoreResult<Page<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let page = page.clamped();

    let mut count = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table} WHERE TRUE"));
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::new(format!("SELECT * FROM {table} WHERE TRUE"));
    push_filters(&mut query);
    query
        .push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(i64::from(page.offset));
    let items = query.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Page {
        items,
        total,
        offset: page.offset,
        limit: page.limit,
    })
}

async fn count_rows(pool: &PgPool, table: &str) -> StoreResult<i64> {
    let total = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(total)
}

async fn delete_row(pool: &PgPool, table: &str, id: uuid::Uuid) -> StoreResult<bool> {
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::env;

    use dotenv::dotenv;
    use sqlx::{PgPool, postgres::PgPoolOptions};

    /// Pool against `DATABASE_URL` with both migration sets applied.
    pub async fn setup_test_db() -> PgPool {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to create database connection pool");

        crate::db::run_migrations(&pool, &pool)
            .await
            .expect("Failed to run migrations");

        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
    }
}
