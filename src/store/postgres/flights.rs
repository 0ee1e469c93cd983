use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PgStore, count_rows, delete_row, fetch_page, push_search};
use crate::model::{Flight, FlightFilter};
use crate::store::{Page, Pagination, Repository, StoreResult};

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &FlightFilter) {
    if let Some(direction) = filter.direction {
        query.push(" AND direction = ").push_bind(direction.as_str());
    }
    if let Some(date) = &filter.date {
        query.push(" AND date = ").push_bind(date.clone());
    }
    if let Some(term) = &filter.search {
        push_search(query, &["flight_code", "airline", "origin", "destination"], term);
    }
}

#[async_trait]
impl Repository<Flight> for PgStore {
    async fn insert(&self, flight: &Flight) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO flights
                (id, flight_code, airline, origin, destination, date, time, direction,
                 passengers, has_pnr, pnr, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(flight.id)
        .bind(&flight.flight_code)
        .bind(&flight.airline)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(&flight.date)
        .bind(&flight.time)
        .bind(flight.direction.as_str())
        .bind(flight.passengers)
        .bind(flight.has_pnr)
        .bind(&flight.pnr)
        .bind(flight.created_at)
        .bind(flight.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Flight>> {
        let flight = sqlx::query_as::<_, Flight>("SELECT * FROM flights WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(flight)
    }

    /// Flight codes repeat across dates, so there is no business key lookup.
    async fn find_by_key(&self, _key: &str) -> StoreResult<Option<Flight>> {
        Ok(None)
    }

    async fn update(&self, flight: &Flight) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE flights
             SET flight_code = $2, airline = $3, origin = $4, destination = $5, date = $6,
                 time = $7, direction = $8, passengers = $9, has_pnr = $10, pnr = $11,
                 updated_at = $12
             WHERE id = $1",
        )
        .bind(flight.id)
        .bind(&flight.flight_code)
        .bind(&flight.airline)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(&flight.date)
        .bind(&flight.time)
        .bind(flight.direction.as_str())
        .bind(flight.passengers)
        .bind(flight.has_pnr)
        .bind(&flight.pnr)
        .bind(flight.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        delete_row(&self.pool, "flights", id).await
    }

    async fn list(&self, filter: &FlightFilter, page: Pagination) -> StoreResult<Page<Flight>> {
        fetch_page(&self.pool, "flights", page, |query| push_filters(query, filter)).await
    }

    async fn count(&self) -> StoreResult<i64> {
        count_rows(&self.pool, "flights").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlightDirection, FlightPatch, NewFlight};
    use crate::store::postgres::test_support::setup_test_db;

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_flight_update_and_filter() {
        let store = PgStore::new(setup_test_db().await);
        let code = format!("ZZ{}", &Uuid::new_v4().simple().to_string()[..4]);
        let mut flight = Flight::new(NewFlight {
            flight_code: code.clone(),
            airline: "Test Air".to_string(),
            origin: "IST".to_string(),
            destination: "AYT".to_string(),
            date: "2031-03-01".to_string(),
            time: "08:15".to_string(),
            direction: FlightDirection::Arrival,
            passengers: 10,
            has_pnr: false,
            pnr: String::new(),
        })
        .unwrap();
        Repository::<Flight>::insert(&store, &flight).await.unwrap();

        flight
            .apply(FlightPatch {
                passengers: Some(12),
                ..Default::default()
            })
            .unwrap();
        assert!(Repository::<Flight>::update(&store, &flight).await.unwrap());

        let filter = FlightFilter {
            search: Some(code.to_lowercase()),
            ..Default::default()
        };
        let page = Repository::<Flight>::list(&store, &filter, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].passengers, 12);

        Repository::<Flight>::delete(&store, flight.id).await.unwrap();
    }
}
