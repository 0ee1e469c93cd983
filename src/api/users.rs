use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;

use super::{AppState, json_body, parse_id, query_params};
use crate::auth::{Action, Actor, LoginResponse, Resource};
use crate::error::{AppError, AppResult};
use crate::model::{NewUser, User, UserFilter, UserPatch};
use crate::store::{Page, Pagination};

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    email: String,
    password: String,
}

pub(super) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let request = json_body(payload)?;
    Ok(Json(state.auth.login(&request.email, &request.password).await?))
}

pub(super) async fn me(actor: Actor) -> Json<User> {
    Json(actor.0)
}

pub(super) async fn list(
    State(state): State<AppState>,
    actor: Actor,
    filter: Result<Query<UserFilter>, QueryRejection>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> AppResult<Json<Page<User>>> {
    state.entities.require(&actor, Resource::Users, Action::Read)?;
    let filter = query_params(filter)?;
    let page = query_params(page)?;
    Ok(Json(state.stores().users.list(&filter, page.clamped()).await?))
}

pub(super) async fn create(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    state.entities.require(&actor, Resource::Users, Action::Create)?;
    let input = json_body(payload)?;
    let user = state.auth.register_user(actor.name(), input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn read(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    state.entities.require(&actor, Resource::Users, Action::Read)?;
    let id = parse_id(&id)?;
    let user = state
        .stores()
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    Ok(Json(user))
}

pub(super) async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> AppResult<Json<User>> {
    state.entities.require(&actor, Resource::Users, Action::Update)?;
    let id = parse_id(&id)?;
    let patch = json_body(payload)?;
    Ok(Json(state.auth.update_user(actor.name(), id, patch).await?))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.entities.require(&actor, Resource::Users, Action::Delete)?;
    let id = parse_id(&id)?;
    state.auth.delete_user(actor.user(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
