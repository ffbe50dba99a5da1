//! Site aggregate: sites, courts, planned days and time slots

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::{BookState, DayOfWeek};
use crate::services::calendar;

// ---------------------------------------------------------------------------
// Persisted entities
// ---------------------------------------------------------------------------

/// A bookable sports site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: Uuid,
    pub name: String,
    /// Accumulated revenue
    pub revenue: Decimal,
    /// Dates on which no booking is ever valid
    pub closed_days: Vec<NaiveDate>,
}

/// A numbered court, unique per site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Court {
    pub id: Uuid,
    pub site_id: Uuid,
    pub number: i32,
}

/// Weekly template entry for one day of week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlannedDay {
    pub id: Uuid,
    pub site_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub number_of_time_slots: i32,
    /// None means the day has no slot grid and cannot be booked
    pub start_time: Option<NaiveTime>,
}

/// A materialized (booked at least once) slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TimeSlot {
    pub id: Uuid,
    pub planned_day_id: Uuid,
    pub court_id: Uuid,
    pub time_slot_number: i32,
    pub week_number: i32,
    pub book_state: BookState,
}

/// Occupancy key of a time slot; unique across the whole store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub planned_day_id: Uuid,
    pub court_id: Uuid,
    pub time_slot_number: i32,
    pub week_number: i32,
}

impl TimeSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            planned_day_id: self.planned_day_id,
            court_id: self.court_id,
            time_slot_number: self.time_slot_number,
            week_number: self.week_number,
        }
    }
}

/// A site with its full subtree, as loaded for one unit of work
#[derive(Debug, Clone)]
pub struct SiteAggregate {
    pub site: Site,
    pub courts: Vec<Court>,
    pub planned_days: Vec<PlannedDay>,
    pub time_slots: Vec<TimeSlot>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Court entry in a create/update request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CourtRequest {
    /// Court number (1-100), unique within the site
    #[validate(range(min = 1, max = 100, message = "Court number must be between 1 and 100"))]
    pub number: i32,
}

/// One day of the weekly schedule
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PlannedDayRequest {
    pub day_of_week: DayOfWeek,
    /// Number of slots (0-8)
    #[validate(range(min = 0, max = 8, message = "Number of time slots must be between 0 and 8"))]
    pub number_of_time_slots: i32,
    /// First slot start (HH:MM), absent when the day is closed
    pub start_time: Option<String>,
}

/// Create site request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSite {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub closed_days: Option<Vec<NaiveDate>>,
    pub courts: Option<Vec<CourtRequest>>,
    /// Exactly 7 entries, one per day of week
    pub schedule: Vec<PlannedDayRequest>,
}

/// Update site request (full replacement of name, closed days, courts and schedule)
pub type UpdateSite = CreateSite;

/// Update schedule request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSchedule {
    pub planned_days: Vec<PlannedDayRequest>,
}

/// Book time slot request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookTimeSlot {
    pub planned_day_id: Uuid,
    pub court_id: Uuid,
    /// 1-based slot ordinal within the planned day
    pub time_slot_number: i32,
    /// ISO week (1-53)
    pub week_number: i32,
    pub book_state: BookState,
}

/// Query parameters for site listing
#[derive(Debug, Default, Deserialize, Validate, IntoParams, ToSchema)]
pub struct SiteQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, message = "Page number must be at least 1"))]
    pub page: Option<i64>,
    /// Sites per page (default: 10)
    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    pub per_page: Option<i64>,
    /// Case-insensitive fragment of the site name
    #[validate(length(max = 200, message = "Name filter must be at most 200 characters"))]
    pub name: Option<String>,
}

impl SiteQuery {
    /// True when the caller asked for a page rather than the whole collection
    pub fn is_paged(&self) -> bool {
        self.page.is_some() || self.per_page.is_some()
    }

    /// Name filter, ignoring a blank value
    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourtResponse {
    pub id: Uuid,
    pub number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeSlotResponse {
    pub id: Uuid,
    pub time_slot_number: i32,
    pub court_id: Uuid,
    pub week_number: i32,
    pub book_state: BookState,
    /// Absolute start, derived from the week and the planned day
    #[schema(value_type = Option<String>)]
    pub date_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlannedDayResponse {
    pub id: Uuid,
    pub day_of_week: DayOfWeek,
    pub number_of_time_slots: i32,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    pub time_slots: Vec<TimeSlotResponse>,
}

/// Full site projection with courts and schedule
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SiteDetails {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub revenue: Decimal,
    pub closed_days: Vec<NaiveDate>,
    pub courts: Vec<CourtResponse>,
    pub schedule: Vec<PlannedDayResponse>,
}

/// Light site projection for list views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SiteSummary {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub revenue: Decimal,
    pub closed_days: Vec<NaiveDate>,
    pub court_count: i64,
}

/// Site listing response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SitesPage {
    pub sites: Vec<SiteSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl TimeSlotResponse {
    pub fn from_slot(slot: TimeSlot, date_time: Option<NaiveDateTime>) -> Self {
        Self {
            id: slot.id,
            time_slot_number: slot.time_slot_number,
            court_id: slot.court_id,
            week_number: slot.week_number,
            book_state: slot.book_state,
            date_time,
        }
    }
}

impl SiteAggregate {
    /// Project the aggregate for a reader, resolving slot timestamps in `year`
    pub fn into_details(self, year: i32) -> SiteDetails {
        let SiteAggregate { site, mut courts, mut planned_days, time_slots } = self;

        courts.sort_by_key(|c| c.number);
        planned_days.sort_by_key(|pd| pd.day_of_week);

        let schedule = planned_days
            .into_iter()
            .map(|pd| {
                let mut slots: Vec<&TimeSlot> = time_slots
                    .iter()
                    .filter(|ts| ts.planned_day_id == pd.id)
                    .collect();
                slots.sort_by_key(|ts| (ts.time_slot_number, ts.week_number));

                let time_slots = slots
                    .into_iter()
                    .map(|ts| {
                        let date_time = calendar::project_date_time(
                            year,
                            ts.week_number,
                            ts.time_slot_number,
                            pd.start_time,
                            pd.day_of_week,
                        );
                        TimeSlotResponse::from_slot(ts.clone(), date_time)
                    })
                    .collect();

                PlannedDayResponse {
                    id: pd.id,
                    day_of_week: pd.day_of_week,
                    number_of_time_slots: pd.number_of_time_slots,
                    start_time: pd.start_time,
                    time_slots,
                }
            })
            .collect();

        let mut closed_days = site.closed_days;
        closed_days.sort();

        SiteDetails {
            id: site.id,
            name: site.name,
            revenue: site.revenue,
            closed_days,
            courts: courts
                .into_iter()
                .map(|c| CourtResponse { id: c.id, number: c.number })
                .collect(),
            schedule,
        }
    }
}
