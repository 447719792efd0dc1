//! CRUD, stats, and health handlers. Thin plumbing over the library-level
//! entry points: `normalize`, `check_target`, `generate_unique_code`, and
//! the stats engine.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::stats::{self, StatsDimension, StatsPage};
use crate::config::ShortenerConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{LinkSortField, ShortLink, SortDirection};
use crate::shortener::{check_target, generate_unique_code, normalize, validate_custom_code};
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub shortener: ShortenerConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    /// Allowed values: 1, 7, 15, 30. Absent = never expires.
    pub expires_in_days: Option<i64>,
    /// Maximum distinct devices. Absent = unlimited.
    pub access_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkRequest {
    /// Full short URL identifying the link to update.
    pub short_url: String,
    pub new_url: String,
    /// Optional custom code replacing the generated one.
    pub new_code: Option<String>,
    pub expires_in_days: Option<i64>,
    pub access_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteLinkRequest {
    pub short_url: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: i64,
    pub short_code: String,
    pub short_url: String,
    pub target_url: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub access_limit: Option<i64>,
    pub clicks: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
    #[serde(default)]
    pub sort_by: LinkSortField,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_dimension")]
    pub dimension: StatsDimension,
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

fn default_page_size() -> i64 {
    10
}

fn default_dimension() -> StatsDimension {
    StatsDimension::Country
}

fn link_response(link: ShortLink, clicks: i64, shortener: &ShortenerConfig) -> LinkResponse {
    LinkResponse {
        short_url: shortener.short_url(&link.short_code),
        id: link.id,
        short_code: link.short_code,
        target_url: link.target_url,
        created_at: link.created_at,
        updated_at: link.updated_at,
        expires_at: link.expires_at,
        access_limit: link.access_limit,
        clicks,
    }
}

/// Expiry presets mirror the public API contract: absent = never expires.
fn resolve_expiry(expires_in_days: Option<i64>) -> ServiceResult<Option<i64>> {
    match expires_in_days {
        None => Ok(None),
        Some(days @ (1 | 7 | 15 | 30)) => Ok(Some(Utc::now().timestamp() + days * 86_400)),
        Some(_) => Err(ServiceError::Validation(
            "Invalid expires_in_days value. Allowed values: 1, 7, 15, 30.".to_string(),
        )),
    }
}

fn validate_access_limit(access_limit: Option<i64>) -> ServiceResult<()> {
    match access_limit {
        Some(limit) if limit < 1 => Err(ServiceError::Validation(
            "Access limit must be positive.".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Extract the short code from a full short URL of this deployment.
fn code_from_short_url(short_url: &str, shortener: &ShortenerConfig) -> ServiceResult<String> {
    let normalized = normalize(short_url)?;
    let base = shortener.public_base_url.trim_end_matches('/').to_lowercase();

    normalized
        .to_lowercase()
        .starts_with(&base)
        .then(|| normalized[base.len()..].trim_matches('/').to_string())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            ServiceError::Validation("URL is not a short URL of this service.".to_string())
        })
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLinkRequest>,
) -> ServiceResult<(StatusCode, Json<LinkResponse>)> {
    let target = normalize(&payload.url)?;
    check_target(&target, &state.shortener.public_base_url)?;
    validate_access_limit(payload.access_limit)?;
    let expires_at = resolve_expiry(payload.expires_in_days)?;

    if state.storage.target_exists(&target).await? {
        return Err(ServiceError::Conflict("Url already exists.".to_string()));
    }

    let code =
        generate_unique_code(state.storage.as_ref(), state.shortener.code_length).await?;
    let link = state
        .storage
        .create_link(&code, &target, expires_at, payload.access_limit)
        .await?;
    let clicks = state.storage.count_accesses(link.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(link_response(link, clicks, &state.shortener)),
    ))
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateLinkRequest>,
) -> ServiceResult<Json<LinkResponse>> {
    let code = code_from_short_url(&payload.short_url, &state.shortener)?;
    let link = state
        .storage
        .get_link(&code)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Short url does not exist.".to_string()))?;

    let new_target = normalize(&payload.new_url)?;
    check_target(&new_target, &state.shortener.public_base_url)?;
    validate_access_limit(payload.access_limit)?;
    let expires_at = resolve_expiry(payload.expires_in_days)?;

    if state
        .storage
        .target_in_use_by_other(&new_target, link.id)
        .await?
    {
        return Err(ServiceError::Conflict("Url already exists.".to_string()));
    }

    let new_code = match payload.new_code {
        Some(custom) => {
            validate_custom_code(&custom)?;
            if state
                .storage
                .code_in_use_by_other(&custom, link.id)
                .await?
            {
                return Err(ServiceError::Conflict(
                    "Short code is already in use.".to_string(),
                ));
            }
            custom
        }
        None => link.short_code.clone(),
    };

    let updated = state
        .storage
        .update_link(
            link.id,
            &new_code,
            &new_target,
            expires_at,
            payload.access_limit,
        )
        .await?;
    let clicks = state.storage.count_accesses(updated.id).await?;

    Ok(Json(link_response(updated, clicks, &state.shortener)))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeleteLinkRequest>,
) -> ServiceResult<StatusCode> {
    let code = code_from_short_url(&payload.short_url, &state.shortener)?;
    let link = state
        .storage
        .get_link(&code)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Short url does not exist.".to_string()))?;

    state.storage.delete_link(link.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ServiceResult<Json<PageResponse<LinkResponse>>> {
    let page = query.page.max(0);
    let size = query.size.clamp(1, 100);

    let links = state
        .storage
        .list_links(size, page * size, query.sort_by, query.direction)
        .await?;
    let total = state.storage.count_links().await?;

    let mut items = Vec::with_capacity(links.len());
    for link in links {
        let clicks = state.storage.count_accesses(link.id).await?;
        items.push(link_response(link, clicks, &state.shortener));
    }

    Ok(Json(PageResponse {
        items,
        page,
        size,
        total,
    }))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ServiceResult<Json<StatsPage>> {
    let page = stats::top_stats(
        state.storage.as_ref(),
        &state.shortener,
        query.dimension,
        query.page,
        query.size,
        query.direction,
    )
    .await?;

    Ok(Json(page))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
