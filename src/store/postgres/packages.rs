use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PgStore, conflict_or_db, count_rows, delete_row, fetch_page, push_search};
use crate::model::{Package, PackageFilter, PackageLeg};
use crate::store::{Page, Pagination, Record, Repository, StoreResult};

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &PackageFilter) {
    if filter.active_only {
        query.push(" AND is_active");
    }
    if let Some(term) = &filter.search {
        push_search(query, &["package_code", "name"], term);
    }
}

async fn insert_legs(conn: &mut PgConnection, legs: &[PackageLeg]) -> Result<(), sqlx::Error> {
    if legs.is_empty() {
        return Ok(());
    }
    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO package_legs
            (id, package_id, step_number, leg_type, location, hotel_name, hotel_stars,
             duration_nights, room_type, board_type, notes) ",
    );
    query.push_values(legs, |mut row, leg| {
        row.push_bind(leg.id)
            .push_bind(leg.package_id)
            .push_bind(leg.step_number)
            .push_bind(leg.leg_type.as_str())
            .push_bind(leg.location.clone())
            .push_bind(leg.hotel_name.clone())
            .push_bind(leg.hotel_stars)
            .push_bind(leg.duration_nights)
            .push_bind(leg.room_type.clone())
            .push_bind(leg.board_type.clone())
            .push_bind(leg.notes.clone());
    });
    query.build().execute(conn).await?;
    Ok(())
}

impl PgStore {
    /// Attach legs, ordered by step, to already loaded package rows.
    async fn load_legs(&self, packages: &mut [Package]) -> StoreResult<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = packages.iter().map(|p| p.id).collect();
        let legs = sqlx::query_as::<_, PackageLeg>(
            "SELECT * FROM package_legs WHERE package_id = ANY($1) ORDER BY step_number",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut by_package: HashMap<Uuid, Vec<PackageLeg>> = HashMap::new();
        for leg in legs {
            by_package.entry(leg.package_id).or_default().push(leg);
        }
        for package in packages.iter_mut() {
            package.legs = by_package.remove(&package.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn with_legs(&self, package: Option<Package>) -> StoreResult<Option<Package>> {
        let Some(package) = package else {
            return Ok(None);
        };
        let mut found = [package];
        self.load_legs(&mut found).await?;
        let [package] = found;
        Ok(Some(package))
    }
}

#[async_trait]
impl Repository<Package> for PgStore {
    async fn insert(&self, p: &Package) -> StoreResult<()> {
        let conflict = |err| conflict_or_db(err, Package::ENTITY, &p.package_code);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO packages
                (id, package_code, name, description, is_active, total_nights, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(p.id)
        .bind(&p.package_code)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.is_active)
        .bind(p.total_nights)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(conflict)?;

        insert_legs(&mut tx, &p.legs).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Package>> {
        let package = sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.with_legs(package).await
    }

    async fn find_by_key(&self, code: &str) -> StoreResult<Option<Package>> {
        let package = sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE package_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        self.with_legs(package).await
    }

    /// Rewrites the package row and replaces its legs in one transaction.
    async fn update(&self, p: &Package) -> StoreResult<bool> {
        let conflict = |err| conflict_or_db(err, Package::ENTITY, &p.package_code);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE packages
             SET package_code = $2, name = $3, description = $4, is_active = $5,
                 total_nights = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(p.id)
        .bind(&p.package_code)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.is_active)
        .bind(p.total_nights)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(conflict)?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM package_legs WHERE package_id = $1")
            .bind(p.id)
            .execute(&mut *tx)
            .await?;
        insert_legs(&mut tx, &p.legs).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        delete_row(&self.pool, "packages", id).await
    }

    async fn list(&self, filter: &PackageFilter, page: Pagination) -> StoreResult<Page<Package>> {
        let mut page: Page<Package> =
            fetch_page(&self.pool, "packages", page, |query| push_filters(query, filter)).await?;
        self.load_legs(&mut page.items).await?;
        Ok(page)
    }

    async fn count(&self) -> StoreResult<i64> {
        count_rows(&self.pool, "packages").await
    }
}
