use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use super::{
    dto::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse, SearchParams},
    repo_types::PublicUser,
    services::AccountService,
    validation::{validate_login, validate_registration},
};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/search", get(search))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/update", put(update))
        .route("/delete", delete(delete_user))
}

const MALFORMED_BODY: AppError = AppError::Validation {
    field: "body",
    message: "Malformed request body",
};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected request body");
        MALFORMED_BODY
    })
}

/// An update body may be absent altogether; that is an empty field map.
/// Anything present must be a JSON object.
fn update_fields(raw: &[u8]) -> Result<Map<String, Value>, AppError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    serde_json::from_slice(raw).map_err(|e| {
        warn!(error = %e, "rejected update body");
        MALFORMED_BODY
    })
}

#[instrument(skip(accounts, payload))]
pub async fn register(
    State(accounts): State<AccountService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let registration = validate_registration(body(payload)?).inspect_err(|e| {
        warn!(error = %e, "registration rejected");
    })?;
    let user_id = accounts.register(registration).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user_id,
        }),
    ))
}

#[instrument(skip(accounts, payload))]
pub async fn login(
    State(accounts): State<AccountService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let creds = validate_login(body(payload)?)?;
    let token = accounts.login(creds).await?;
    Ok(Json(LoginResponse { token }))
}

#[instrument(skip(accounts))]
pub async fn search(
    State(accounts): State<AccountService>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let Query(params) = params.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected search query");
        AppError::Validation {
            field: "query",
            message: "Invalid search query",
        }
    })?;
    Ok(Json(accounts.search(params.query.as_deref()).await?))
}

#[instrument(skip(accounts, who), fields(user_id = %who.user_id))]
pub async fn profile(
    State(accounts): State<AccountService>,
    AuthUser(who): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(accounts.profile(&who).await?))
}

#[instrument(skip(accounts, who, payload), fields(user_id = %who.user_id))]
pub async fn update(
    State(accounts): State<AccountService>,
    AuthUser(who): AuthUser,
    payload: Bytes,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(accounts.update(&who, update_fields(&payload)?).await?))
}

#[instrument(skip(accounts, who), fields(user_id = %who.user_id))]
pub async fn delete_user(
    State(accounts): State<AccountService>,
    AuthUser(who): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    accounts.delete(&who).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
