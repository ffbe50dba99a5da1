//! Site API endpoints (sites, schedule, booking)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::site::{
        BookTimeSlot, CreateSite, SiteDetails, SiteQuery, SitesPage, TimeSlotResponse,
        UpdateSchedule, UpdateSite,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List sites, optionally paged
#[utoipa::path(
    get,
    path = "/sites",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(SiteQuery),
    responses(
        (status = 200, description = "Sites ordered by name", body = SitesPage),
        (status = 400, description = "Invalid paging parameters", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_sites(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SiteQuery>,
) -> AppResult<Json<SitesPage>> {
    let page = state.services.sites.list_sites(&query).await?;
    Ok(Json(page))
}

/// Get a site with courts, schedule and booked slots
#[utoipa::path(
    get,
    path = "/sites/{id}",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site details", body = SiteDetails),
        (status = 404, description = "Site not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_site(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SiteDetails>> {
    let site = state.services.sites.get_site(id).await?;
    Ok(Json(site))
}

/// Create a site
#[utoipa::path(
    post,
    path = "/sites",
    tag = "sites",
    security(("bearer_auth" = [])),
    request_body = CreateSite,
    responses(
        (status = 201, description = "Site created", body = SiteDetails),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_site(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateSite>,
) -> AppResult<(StatusCode, Json<SiteDetails>)> {
    claims.require_admin()?;
    let site = state.services.sites.create_site(&data).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

/// Update a site (name, closed days, courts and schedule)
#[utoipa::path(
    put,
    path = "/sites/{id}",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Site ID")),
    request_body = CreateSite,
    responses(
        (status = 200, description = "Site updated", body = SiteDetails),
        (status = 404, description = "Site not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Update conflicts with existing bookings", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_site(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateSite>,
) -> AppResult<Json<SiteDetails>> {
    claims.require_admin()?;
    let site = state.services.sites.update_site(id, &data).await?;
    Ok(Json(site))
}

/// Replace the weekly schedule of a site
#[utoipa::path(
    put,
    path = "/sites/{id}/schedule",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Site ID")),
    request_body = UpdateSchedule,
    responses(
        (status = 200, description = "Schedule updated", body = SiteDetails),
        (status = 404, description = "Site not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Update conflicts with existing bookings", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_schedule(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateSchedule>,
) -> AppResult<Json<SiteDetails>> {
    claims.require_admin()?;
    let site = state.services.sites.update_schedule(id, &data.planned_days).await?;
    Ok(Json(site))
}

/// Delete a site and everything under it
#[utoipa::path(
    delete,
    path = "/sites/{id}",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Site ID")),
    responses(
        (status = 204, description = "Site deleted"),
        (status = 404, description = "Site not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_site(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.sites.delete_site(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Book (or re-book) a time slot
#[utoipa::path(
    post,
    path = "/sites/{id}/timeslots/book",
    tag = "booking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Site ID")),
    request_body = BookTimeSlot,
    responses(
        (status = 200, description = "Slot booked", body = TimeSlotResponse),
        (status = 404, description = "Site, planned day or court not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Slot outside the bookable grid", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_time_slot(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<BookTimeSlot>,
) -> AppResult<Json<TimeSlotResponse>> {
    let slot = state
        .services
        .booking
        .book_time_slot(id, &data, claims.user_id)
        .await?;
    Ok(Json(slot))
}
