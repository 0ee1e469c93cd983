use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PgStore, conflict_or_db, count_rows, delete_row, fetch_page, push_search};
use crate::model::{Hotel, HotelFilter};
use crate::store::{Page, Pagination, Record, Repository, StoreResult};

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &HotelFilter) {
    if filter.active_only {
        query.push(" AND active");
    }
    if let Some(region) = &filter.region {
        query.push(" AND region = ").push_bind(region.clone());
    }
    if let Some(category) = &filter.category {
        query.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(term) = &filter.search {
        push_search(query, &["code", "name", "city"], term);
    }
}

#[async_trait]
impl Repository<Hotel> for PgStore {
    async fn insert(&self, h: &Hotel) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO hotels
                (id, code, name, category, region, region_code, transfer_region, phone, email,
                 website, address, city, postal_code, country, service_type, manager, notes,
                 active, latitude, longitude, stars, giata, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                     $18, $19, $20, $21, $22, $23, $24)",
        )
        .bind(h.id)
        .bind(&h.code)
        .bind(&h.name)
        .bind(&h.category)
        .bind(&h.region)
        .bind(&h.region_code)
        .bind(&h.transfer_region)
        .bind(&h.phone)
        .bind(&h.email)
        .bind(&h.website)
        .bind(&h.address)
        .bind(&h.city)
        .bind(&h.postal_code)
        .bind(&h.country)
        .bind(&h.service_type)
        .bind(&h.manager)
        .bind(&h.notes)
        .bind(h.active)
        .bind(h.latitude)
        .bind(h.longitude)
        .bind(h.stars)
        .bind(&h.giata)
        .bind(h.created_at)
        .bind(h.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_db(err, Hotel::ENTITY, &h.code))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Hotel>> {
        let hotel = sqlx::query_as::<_, Hotel>("SELECT * FROM hotels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hotel)
    }

    async fn find_by_key(&self, code: &str) -> StoreResult<Option<Hotel>> {
        let hotel = sqlx::query_as::<_, Hotel>("SELECT * FROM hotels WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hotel)
    }

    async fn update(&self, h: &Hotel) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE hotels
             SET code = $2, name = $3, category = $4, region = $5, region_code = $6,
                 transfer_region = $7, phone = $8, email = $9, website = $10, address = $11,
                 city = $12, postal_code = $13, country = $14, service_type = $15, manager = $16,
                 notes = $17, active = $18, latitude = $19, longitude = $20, stars = $21,
                 giata = $22, updated_at = $23
             WHERE id = $1",
        )
        .bind(h.id)
        .bind(&h.code)
        .bind(&h.name)
        .bind(&h.category)
        .bind(&h.region)
        .bind(&h.region_code)
        .bind(&h.transfer_region)
        .bind(&h.phone)
        .bind(&h.email)
        .bind(&h.website)
        .bind(&h.address)
        .bind(&h.city)
        .bind(&h.postal_code)
        .bind(&h.country)
        .bind(&h.service_type)
        .bind(&h.manager)
        .bind(&h.notes)
        .bind(h.active)
        .bind(h.latitude)
        .bind(h.longitude)
        .bind(h.stars)
        .bind(&h.giata)
        .bind(h.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_db(err, Hotel::ENTITY, &h.code))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        delete_row(&self.pool, "hotels", id).await
    }

    async fn list(&self, filter: &HotelFilter, page: Pagination) -> StoreResult<Page<Hotel>> {
        fetch_page(&self.pool, "hotels", page, |query| push_filters(query, filter)).await
    }

    async fn count(&self) -> StoreResult<i64> {
        count_rows(&self.pool, "hotels").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewHotel;
    use crate::store::StoreError;
    use crate::store::postgres::test_support::setup_test_db;

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_hotel_code_is_unique() {
        let store = PgStore::new(setup_test_db().await);
        let code = format!("PG-{}", Uuid::new_v4().simple());
        let hotel = Hotel::new(NewHotel {
            code: code.clone(),
            name: "Pg Hotel".to_string(),
            stars: 4,
            ..Default::default()
        })
        .unwrap();
        Repository::<Hotel>::insert(&store, &hotel).await.unwrap();

        let dup = Hotel::new(NewHotel {
            code: code.clone(),
            name: "Other".to_string(),
            ..Default::default()
        })
        .unwrap();
        let err = Repository::<Hotel>::insert(&store, &dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "hotel", .. }));

        let found = Repository::<Hotel>::find_by_key(&store, &code).await.unwrap().unwrap();
        assert_eq!(found.stars, 4);
        Repository::<Hotel>::delete(&store, hotel.id).await.unwrap();
    }
}
