//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, sites};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courtbook API",
        version = "0.3.0",
        description = "Sports site scheduling and court booking REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Sites
        sites::list_sites,
        sites::get_site,
        sites::create_site,
        sites::update_site,
        sites::update_schedule,
        sites::delete_site,
        // Booking
        sites::book_time_slot,
    ),
    components(
        schemas(
            // Sites
            crate::models::site::CreateSite,
            crate::models::site::CourtRequest,
            crate::models::site::PlannedDayRequest,
            crate::models::site::UpdateSchedule,
            crate::models::site::SiteDetails,
            crate::models::site::SiteSummary,
            crate::models::site::SitesPage,
            crate::models::site::CourtResponse,
            crate::models::site::PlannedDayResponse,
            crate::models::site::TimeSlotResponse,
            crate::models::enums::DayOfWeek,
            // Booking
            crate::models::site::BookTimeSlot,
            crate::models::enums::BookState,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sites", description = "Site, court and schedule management"),
        (name = "booking", description = "Time slot booking")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
