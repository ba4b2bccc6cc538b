//! User management endpoints

use super::AppState;
use super::error::{ApiError, ValidatedJson};
use crate::models::{CreateUserRequest, UpdateUserRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::num::IntErrorKind;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Raw `page` and `limit` query values; anything unparsable falls back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |value: Option<&str>| value.and_then(parse_saturating);

        let page = match parse(page) {
            Some(page) if page >= 1 => page as u64,
            _ => DEFAULT_PAGE,
        };
        let limit = match parse(limit) {
            Some(limit) if limit > MAX_LIMIT as i64 => MAX_LIMIT,
            Some(limit) if limit >= 1 => limit as u64,
            _ => DEFAULT_LIMIT,
        };

        Self { page, limit }
    }

    /// Rows to skip, capped at `i64::MAX` so every store can bind it
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }
}

/// Integers out of range saturate instead of counting as unparsable
fn parse_saturating(value: &str) -> Option<i64> {
    match value.trim().parse::<i64>() {
        Ok(number) => Some(number),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    let pagination = Pagination::from_params(params.page.as_deref(), params.limit.as_deref());
    let users = state
        .users
        .list_users(pagination.limit, pagination.offset())
        .await?;

    Ok(Json(json!({
        "pagination": {
            "page": pagination.page,
            "limit": pagination.limit,
            "total": users.len(),
        },
        "data": users,
    })))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = state.users.create_user(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "data": user,
        })),
    ))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.users.get_user(&id).await?;
    Ok(Json(json!({ "data": user })))
}

/// PUT /api/v1/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state.users.update_user(&id, request).await?;
    Ok(Json(json!({
        "message": "User updated successfully",
        "data": user,
    })))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.users.delete_user(&id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
