//! HTTP surface. Every route lives under `/api`; all but `/health` and
//! `/login` need a bearer token.

mod entities;
mod management;
mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, FromRef, Multipart, Query,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::auth::{AuthService, JwtConfig, PermissionMatrix};
use crate::config::ServerSettings;
use crate::error::{AppError, AppResult};
use crate::flight_status::FlightStatusService;
use crate::model::{Flight, Hotel, Operation, Package, Reservation};
use crate::service::EntityService;
use crate::store::Stores;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub entities: EntityService,
    pub flight_status: Arc<FlightStatusService>,
}

impl AppState {
    pub fn new(
        stores: Stores,
        permissions: Arc<PermissionMatrix>,
        jwt_config: JwtConfig,
        flight_status: FlightStatusService,
    ) -> anyhow::Result<Self> {
        let audit = AuditLogger::new(stores.audit.clone());
        let auth = AuthService::new(
            stores.users.clone(),
            audit.clone(),
            permissions.clone(),
            jwt_config,
        )?;
        Ok(Self {
            auth: Arc::new(auth),
            entities: EntityService::new(stores, audit, permissions),
            flight_status: Arc::new(flight_status),
        })
    }

    pub fn stores(&self) -> &Stores {
        self.entities.stores()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Unwrap a JSON body, reporting malformed input in the usual error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// Same for query strings.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

pub(crate) fn multipart_body(
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Multipart> {
    multipart.map_err(|rejection| AppError::validation(rejection.body_text()))
}

pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::validation(format!("'{raw}' is not a valid id")))
}

fn cors_layer(server: &ServerSettings) -> CorsLayer {
    let origins = server.allowed_origins();
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn router(state: AppState, server: &ServerSettings) -> Router {
    let api = Router::new()
        .route("/health", get(management::health))
        .route("/login", post(users::login))
        .route("/me", get(users::me))
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::read).put(users::update).delete(users::remove))
        .route("/dashboard", get(management::dashboard))
        .route("/search", get(management::search))
        .route("/logs", get(management::logs))
        .route("/backup", get(management::backup));

    let api = entities::crud::<Flight>(api, "/flights");
    let api = entities::crud::<Reservation>(api, "/reservations");
    let api = entities::crud::<Operation>(api, "/operations");
    let api = entities::crud::<Hotel>(api, "/hotels");
    let api = entities::crud::<Package>(api, "/packages");

    let api = api
        .route("/flights/upload", post(entities::upload::<Flight>))
        .route("/flights/compare", post(entities::compare_flights))
        .route("/reservations/upload", post(entities::upload::<Reservation>))
        .route("/reservations/:id/journey", get(entities::journey))
        .route("/operations/upload", post(entities::upload::<Operation>))
        .route("/operations/flight-details/:code", get(entities::flight_details))
        .route("/hotels/upload", post(entities::upload::<Hotel>));

    Router::new()
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(server))
                .layer(DefaultBodyLimit::max(server.max_upload_bytes)),
        )
        .with_state(state)
}
