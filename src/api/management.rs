use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::error;

use super::{AppState, query_params};
use crate::auth::{Action, Actor, Resource};
use crate::backup::create_backup;
use crate::error::{AppError, AppResult};
use crate::model::{
    AuditEntry, AuditFilter, DATE_FORMAT, Flight, FlightDirection, FlightFilter, Hotel, HotelFilter,
    Operation, OperationFilter, Package, PackageFilter, Reservation, ReservationFilter,
    ReservationStatus,
};
use crate::store::{Page, Pagination, StoreResult, Stores};

const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Serialize)]
pub(super) struct Totals {
    users: i64,
    flights: i64,
    reservations: i64,
    operations: i64,
    hotels: i64,
    packages: i64,
}

async fn totals(stores: &Stores) -> StoreResult<Totals> {
    Ok(Totals {
        users: stores.users.count().await?,
        flights: stores.flights.count().await?,
        reservations: stores.reservations.count().await?,
        operations: stores.operations.count().await?,
        hotels: stores.hotels.count().await?,
        packages: stores.packages.count().await?,
    })
}

pub(super) async fn health(State(state): State<AppState>) -> Response {
    match totals(state.stores()).await {
        Ok(totals) => Json(json!({
            "status": "healthy",
            "database": "connected",
            "totals": totals,
        }))
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "database": "disconnected"})),
            )
                .into_response()
        }
    }
}

fn today() -> String {
    OffsetDateTime::now_utc().date().format(DATE_FORMAT).unwrap_or_default()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Dashboard {
    date: String,
    totals: Totals,
    arrivals_today: i64,
    departures_today: i64,
    operations_today: Page<Operation>,
    pending_reservations: i64,
}

pub(super) async fn dashboard(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Dashboard>> {
    state.entities.require(&actor, Resource::Management, Action::Read)?;
    let stores = state.stores();
    let date = today();

    let arrivals = FlightFilter {
        direction: Some(FlightDirection::Arrival),
        date: Some(date.clone()),
        search: None,
    };
    let departures = FlightFilter {
        direction: Some(FlightDirection::Departure),
        date: Some(date.clone()),
        search: None,
    };
    let operations = OperationFilter {
        date: Some(date.clone()),
        ..Default::default()
    };
    let pending = ReservationFilter {
        status: Some(ReservationStatus::Pending),
        search: None,
    };
    let one = Pagination::new(0, 1);

    Ok(Json(Dashboard {
        totals: totals(stores).await?,
        arrivals_today: stores.flights.list(&arrivals, one).await?.total,
        departures_today: stores.flights.list(&departures, one).await?.total,
        operations_today: stores.operations.list(&operations, Pagination::default()).await?,
        pending_reservations: stores.reservations.list(&pending, one).await?.total,
        date,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    #[serde(default)]
    query: String,
}

/// Matches per collection. Collections the caller may not read are left out.
#[derive(Debug, Default, Serialize)]
pub(super) struct SearchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    flights: Option<Vec<Flight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reservations: Option<Vec<Reservation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hotels: Option<Vec<Hotel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    packages: Option<Vec<Package>>,
}

pub(super) async fn search(
    State(state): State<AppState>,
    actor: Actor,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> AppResult<Json<SearchResults>> {
    state.entities.require(&actor, Resource::Management, Action::Read)?;
    let query = query_params(query)?;
    let term = query.query.trim().to_string();
    if term.chars().count() < 2 {
        return Err(AppError::validation("search query must be at least 2 characters"));
    }

    let matrix = state.entities.permissions();
    let role = actor.user().role.as_str();
    let can_read = |resource| matrix.is_allowed(role, resource, Action::Read);
    let stores = state.stores();
    let page = Pagination::new(0, SEARCH_LIMIT);
    let mut results = SearchResults::default();

    if can_read(Resource::Flights) {
        let filter = FlightFilter {
            search: Some(term.clone()),
            ..Default::default()
        };
        results.flights = Some(stores.flights.list(&filter, page).await?.items);
    }
    if can_read(Resource::Reservations) {
        let filter = ReservationFilter {
            search: Some(term.clone()),
            ..Default::default()
        };
        results.reservations = Some(stores.reservations.list(&filter, page).await?.items);
        let filter = PackageFilter {
            search: Some(term.clone()),
            ..Default::default()
        };
        results.packages = Some(stores.packages.list(&filter, page).await?.items);
    }
    if can_read(Resource::Hotels) {
        let filter = HotelFilter {
            search: Some(term.clone()),
            ..Default::default()
        };
        results.hotels = Some(stores.hotels.list(&filter, page).await?.items);
    }
    Ok(Json(results))
}

pub(super) async fn logs(
    State(state): State<AppState>,
    actor: Actor,
    filter: Result<Query<AuditFilter>, QueryRejection>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> AppResult<Json<Page<AuditEntry>>> {
    state.entities.require(&actor, Resource::Logs, Action::Read)?;
    let filter = query_params(filter)?;
    let page = query_params(page)?;
    Ok(Json(state.stores().audit.list(&filter, page.clamped()).await?))
}

pub(super) async fn backup(State(state): State<AppState>, actor: Actor) -> AppResult<Response> {
    state.entities.require(&actor, Resource::Logs, Action::Read)?;
    let backup = create_backup(state.stores()).await?;
    let disposition = format!("attachment; filename=\"{}\"", backup.file_name());
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(backup)).into_response())
}
