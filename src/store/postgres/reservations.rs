use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PgStore, conflict_or_db, count_rows, delete_row, fetch_page, push_search};
use crate::model::{Reservation, ReservationFilter};
use crate::store::{Page, Pagination, Record, Repository, StoreResult};

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ReservationFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(term) = &filter.search {
        push_search(query, &["voucher_no", "leader_name", "hotel"], term);
    }
}

#[async_trait]
impl Repository<Reservation> for PgStore {
    async fn insert(&self, r: &Reservation) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO reservations
                (id, voucher_no, leader_name, leader_passport, product_code, product_name, hotel,
                 arrival_date, departure_date, pax, pax_adults, pax_children, pax_infants, status,
                 source_agency, package_id, current_leg, room_type, board_type, destination, notes,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                     $18, $19, $20, $21, $22, $23)",
        )
        .bind(r.id)
        .bind(&r.voucher_no)
        .bind(&r.leader_name)
        .bind(&r.leader_passport)
        .bind(&r.product_code)
        .bind(&r.product_name)
        .bind(&r.hotel)
        .bind(&r.arrival_date)
        .bind(&r.departure_date)
        .bind(r.pax)
        .bind(r.pax_adults)
        .bind(r.pax_children)
        .bind(r.pax_infants)
        .bind(r.status.as_str())
        .bind(&r.source_agency)
        .bind(r.package_id)
        .bind(r.current_leg)
        .bind(&r.room_type)
        .bind(&r.board_type)
        .bind(&r.destination)
        .bind(&r.notes)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_db(err, Reservation::ENTITY, &r.voucher_no))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        let reservation =
            sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(reservation)
    }

    async fn find_by_key(&self, voucher_no: &str) -> StoreResult<Option<Reservation>> {
        let reservation =
            sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE voucher_no = $1")
                .bind(voucher_no)
                .fetch_optional(&self.pool)
                .await?;
        Ok(reservation)
    }

    async fn update(&self, r: &Reservation) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE reservations
             SET voucher_no = $2, leader_name = $3, leader_passport = $4, product_code = $5,
                 product_name = $6, hotel = $7, arrival_date = $8, departure_date = $9, pax = $10,
                 pax_adults = $11, pax_children = $12, pax_infants = $13, status = $14,
                 source_agency = $15, package_id = $16, current_leg = $17, room_type = $18,
                 board_type = $19, destination = $20, notes = $21, updated_at = $22
             WHERE id = $1",
        )
        .bind(r.id)
        .bind(&r.voucher_no)
        .bind(&r.leader_name)
        .bind(&r.leader_passport)
        .bind(&r.product_code)
        .bind(&r.product_name)
        .bind(&r.hotel)
        .bind(&r.arrival_date)
        .bind(&r.departure_date)
        .bind(r.pax)
        .bind(r.pax_adults)
        .bind(r.pax_children)
        .bind(r.pax_infants)
        .bind(r.status.as_str())
        .bind(&r.source_agency)
        .bind(r.package_id)
        .bind(r.current_leg)
        .bind(&r.room_type)
        .bind(&r.board_type)
        .bind(&r.destination)
        .bind(&r.notes)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_db(err, Reservation::ENTITY, &r.voucher_no))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        delete_row(&self.pool, "reservations", id).await
    }

    async fn list(
        &self,
        filter: &ReservationFilter,
        page: Pagination,
    ) -> StoreResult<Page<Reservation>> {
        fetch_page(&self.pool, "reservations", page, |query| push_filters(query, filter)).await
    }

    async fn count(&self) -> StoreResult<i64> {
        count_rows(&self.pool, "reservations").await
    }
}
