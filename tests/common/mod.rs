//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use courtbook_server::{
    api,
    config::{AppConfig, BookingConfig, ScheduleConfig},
    models::{
        enums::{BookState, DayOfWeek},
        site::{
            BookTimeSlot, CourtRequest, CreateSite, PlannedDayRequest, PlannedDayResponse,
            SiteDetails,
        },
        user::{Role, UserClaims},
    },
    repository::{MemoryStore, SiteStore},
    services::{schedule::ShrinkPolicy, Services},
    AppState,
};

/// Services over a fresh in-process store
pub struct TestServices {
    pub services: Services,
    pub store: MemoryStore,
}

impl TestServices {
    pub fn new() -> Self {
        Self::with_policy(ShrinkPolicy::PreserveBookings)
    }

    pub fn with_policy(shrink_policy: ShrinkPolicy) -> Self {
        let store = MemoryStore::new();
        let services = Services::new(
            Arc::new(store.clone()),
            &ScheduleConfig { shrink_policy },
            &BookingConfig::default(),
        );
        Self { services, store }
    }
}

/// Monday: 4 slots from 08:00, Tuesday: 6 slots from 09:00, other days closed
pub fn weekly_schedule() -> Vec<PlannedDayRequest> {
    DayOfWeek::ALL
        .iter()
        .map(|&day_of_week| match day_of_week {
            DayOfWeek::Monday => day(day_of_week, 4, Some("08:00")),
            DayOfWeek::Tuesday => day(day_of_week, 6, Some("09:00")),
            _ => day(day_of_week, 0, None),
        })
        .collect()
}

pub fn day(day_of_week: DayOfWeek, slots: i32, start: Option<&str>) -> PlannedDayRequest {
    PlannedDayRequest {
        day_of_week,
        number_of_time_slots: slots,
        start_time: start.map(str::to_string),
    }
}

pub fn site_request(name: &str, courts: &[i32]) -> CreateSite {
    CreateSite {
        name: name.to_string(),
        closed_days: None,
        courts: Some(courts.iter().map(|&number| CourtRequest { number }).collect()),
        schedule: weekly_schedule(),
    }
}

pub fn planned_day(site: &SiteDetails, day_of_week: DayOfWeek) -> &PlannedDayResponse {
    site.schedule
        .iter()
        .find(|pd| pd.day_of_week == day_of_week)
        .expect("planned day present")
}

pub fn court_id(site: &SiteDetails, number: i32) -> Uuid {
    site.courts
        .iter()
        .find(|c| c.number == number)
        .map(|c| c.id)
        .expect("court present")
}

pub fn booking(
    site: &SiteDetails,
    day_of_week: DayOfWeek,
    court: i32,
    slot: i32,
    week: i32,
    state: BookState,
) -> BookTimeSlot {
    BookTimeSlot {
        planned_day_id: planned_day(site, day_of_week).id,
        court_id: court_id(site, court),
        time_slot_number: slot,
        week_number: week,
        book_state: state,
    }
}

/// Router over a fresh in-process store
pub struct TestApp {
    pub router: Router,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::default();
        let store: Arc<dyn SiteStore> = Arc::new(MemoryStore::new());
        let router = api::create_router(AppState::new(config.clone(), store));
        Self { router, config }
    }

    pub fn token(&self, role: Role) -> String {
        UserClaims::new(Uuid::new_v4(), format!("{}@courtbook.test", role), role, 1)
            .create_token(&self.config.auth.jwt_secret)
            .expect("token")
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (axum::http::StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
