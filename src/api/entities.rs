use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use super::{AppState, json_body, multipart_body, parse_id, query_params};
use crate::auth::{Action, Actor, Resource};
use crate::error::{AppError, AppResult};
use crate::flight_status::FlightLookup;
use crate::import::{FlightComparison, ImportSummary};
use crate::journey::{Journey, build_journey};
use crate::model::Reservation;
use crate::service::{Entity, Importable};
use crate::store::{Page, Pagination};

/// List, create, read, update and delete routes for one collection.
pub(super) fn crud<T: Entity>(router: Router<AppState>, base: &str) -> Router<AppState> {
    router
        .route(base, get(list::<T>).post(create::<T>))
        .route(
            &format!("{base}/:id"),
            get(read::<T>).put(update::<T>).delete(remove::<T>),
        )
}

async fn list<T: Entity>(
    State(state): State<AppState>,
    actor: Actor,
    filter: Result<Query<T::Filter>, QueryRejection>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> AppResult<Json<Page<T>>> {
    let filter = query_params(filter)?;
    let page = query_params(page)?;
    Ok(Json(state.entities.list::<T>(&actor, &filter, page).await?))
}

async fn create<T: Entity>(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<T::Create>, JsonRejection>,
) -> AppResult<(StatusCode, Json<T>)> {
    let input = json_body(payload)?;
    let record = state.entities.create::<T>(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn read<T: Entity>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<T>> {
    let id = parse_id(&id)?;
    Ok(Json(state.entities.get::<T>(&actor, id).await?))
}

async fn update<T: Entity>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<T::Patch>, JsonRejection>,
) -> AppResult<Json<T>> {
    let id = parse_id(&id)?;
    let patch = json_body(payload)?;
    Ok(Json(state.entities.update::<T>(&actor, id, patch).await?))
}

async fn remove<T: Entity>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    state.entities.delete::<T>(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pull the `file` field out of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> AppResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("uploaded file has no name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("could not read uploaded file: {e}")))?;
        return Ok((file_name, bytes));
    }
    Err(AppError::validation("multipart field 'file' is missing"))
}

pub(super) async fn upload<T: Importable>(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ImportSummary>> {
    state.entities.require(&actor, T::RESOURCE, Action::Upload)?;
    let (file_name, bytes) = read_upload(multipart_body(multipart)?).await?;
    Ok(Json(state.entities.import::<T>(&actor, &file_name, &bytes).await?))
}

pub(super) async fn compare_flights(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<FlightComparison>> {
    state.entities.require(&actor, Resource::Flights, Action::Upload)?;
    let (file_name, bytes) = read_upload(multipart_body(multipart)?).await?;
    Ok(Json(state.entities.compare_flights(&actor, &file_name, &bytes).await?))
}

pub(super) async fn journey(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Journey>> {
    let id = parse_id(&id)?;
    let reservation: Reservation = state.entities.get(&actor, id).await?;

    let package = match reservation.package_id {
        Some(package_id) => {
            let package = state.stores().packages.get(package_id).await?;
            if package.is_none() {
                warn!(
                    "Reservation {} references missing package {}",
                    reservation.voucher_no, package_id
                );
            }
            package
        }
        None => None,
    };
    Ok(Json(build_journey(reservation, package)?))
}

#[derive(Debug, Deserialize)]
pub(super) struct AirportQuery {
    airport_code: Option<String>,
}

pub(super) async fn flight_details(
    State(state): State<AppState>,
    actor: Actor,
    Path(code): Path<String>,
    query: Result<Query<AirportQuery>, QueryRejection>,
) -> AppResult<Json<FlightLookup>> {
    // Live lookups are limited to staff who edit operations
    state.entities.require(&actor, Resource::Operations, Action::Update)?;
    let query = query_params(query)?;
    let airport = query.airport_code.unwrap_or_else(|| "IST".to_string());
    Ok(Json(state.flight_status.lookup(&code, &airport).await?))
}
