//! Slot materialization and booking
//!
//! A time slot row exists only once somebody books it. Booking validates the
//! request against the site's current weekly template, then upserts the row
//! keyed on (planned day, court, slot number, week number).

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::calendar;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::BookState,
        site::{BookTimeSlot, SlotKey, TimeSlotResponse},
    },
    repository::SiteStore,
};

/// Decides the state stored on a slot given its current state (None when
/// the slot is not materialized yet) and the requested one.
pub trait BookStatePolicy: Send + Sync {
    fn assign(&self, current: Option<BookState>, requested: BookState) -> AppResult<BookState>;
}

/// Any state may follow any other, including re-booking a cancelled slot
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeTransitions;

impl BookStatePolicy for FreeTransitions {
    fn assign(&self, _current: Option<BookState>, requested: BookState) -> AppResult<BookState> {
        Ok(requested)
    }
}

/// Explicit allow-list of state transitions
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    allowed: HashSet<(Option<BookState>, BookState)>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, from: Option<BookState>, to: BookState) -> Self {
        self.allowed.insert((from, to));
        self
    }

    /// in progress -> booked -> paid, with cancellation from any live state
    pub fn standard() -> Self {
        use BookState::*;
        Self::new()
            .allow(None, BookInProgress)
            .allow(None, Booked)
            .allow(Some(BookInProgress), Booked)
            .allow(Some(BookInProgress), Cancelled)
            .allow(Some(Booked), Paid)
            .allow(Some(Booked), Cancelled)
            .allow(Some(Paid), Cancelled)
            .allow(Some(Cancelled), BookInProgress)
            .allow(Some(Cancelled), Booked)
    }
}

impl BookStatePolicy for TransitionTable {
    fn assign(&self, current: Option<BookState>, requested: BookState) -> AppResult<BookState> {
        if current == Some(requested) || self.allowed.contains(&(current, requested)) {
            return Ok(requested);
        }
        let from = current.map_or("unbooked", |s| s.as_str());
        Err(AppError::BadRequest(format!(
            "Transition from {} to {} is not allowed",
            from, requested
        )))
    }
}

/// Book state policy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// [`FreeTransitions`]
    #[default]
    Free,
    /// [`TransitionTable::standard`]
    Standard,
}

impl TransitionPolicy {
    pub fn build(self) -> Arc<dyn BookStatePolicy> {
        match self {
            TransitionPolicy::Free => Arc::new(FreeTransitions),
            TransitionPolicy::Standard => Arc::new(TransitionTable::standard()),
        }
    }
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn SiteStore>,
    state_policy: Arc<dyn BookStatePolicy>,
}

impl BookingService {
    pub fn new(store: Arc<dyn SiteStore>, state_policy: Arc<dyn BookStatePolicy>) -> Self {
        Self { store, state_policy }
    }

    /// Book (or re-book) one slot. A unit of work that loses a uniqueness
    /// race is replayed once, where it finds the winner's row and updates it.
    pub async fn book_time_slot(
        &self,
        site_id: Uuid,
        request: &BookTimeSlot,
        booked_by: Uuid,
    ) -> AppResult<TimeSlotResponse> {
        match self.try_book(site_id, request, booked_by).await {
            Err(AppError::Conflict(reason)) => {
                tracing::warn!(%site_id, %reason, "Time slot insert lost a race, retrying as update");
                self.try_book(site_id, request, booked_by).await
            }
            other => other,
        }
    }

    async fn try_book(
        &self,
        site_id: Uuid,
        request: &BookTimeSlot,
        booked_by: Uuid,
    ) -> AppResult<TimeSlotResponse> {
        let mut tx = self.store.begin().await?;

        let Some(site) = tx.find_site(site_id).await? else {
            tracing::warn!(%site_id, "Site not found");
            return Err(AppError::NotFound(format!("Site {} not found", site_id)));
        };

        let planned_day = match tx.find_planned_day(request.planned_day_id).await? {
            Some(day) if day.site_id == site_id => day,
            _ => {
                tracing::warn!(
                    planned_day_id = %request.planned_day_id,
                    %site_id,
                    "Planned day not found or does not belong to site"
                );
                return Err(AppError::NotFound(format!(
                    "Planned day {} not found on site {}",
                    request.planned_day_id, site_id
                )));
            }
        };

        let Some(start_time) = planned_day.start_time else {
            tracing::warn!(planned_day_id = %planned_day.id, "Planned day has no start time");
            return Err(AppError::OutOfRange(format!(
                "{} has no start time and cannot be booked",
                planned_day.day_of_week
            )));
        };

        match tx.find_court(request.court_id).await? {
            Some(court) if court.site_id == site_id => {}
            _ => {
                tracing::warn!(
                    court_id = %request.court_id,
                    %site_id,
                    "Court not found or does not belong to site"
                );
                return Err(AppError::NotFound(format!(
                    "Court {} not found on site {}",
                    request.court_id, site_id
                )));
            }
        }

        if request.time_slot_number < 1 || request.time_slot_number > planned_day.number_of_time_slots {
            tracing::warn!(
                time_slot_number = request.time_slot_number,
                planned_day_id = %planned_day.id,
                max = planned_day.number_of_time_slots,
                "Time slot number out of range"
            );
            return Err(AppError::OutOfRange(format!(
                "Time slot number {} must be between 1 and {}",
                request.time_slot_number, planned_day.number_of_time_slots
            )));
        }

        if !(1..=calendar::MAX_WEEK_NUMBER).contains(&request.week_number) {
            tracing::warn!(week_number = request.week_number, "Week number out of range");
            return Err(AppError::OutOfRange(format!(
                "Week number {} must be between 1 and {}",
                request.week_number,
                calendar::MAX_WEEK_NUMBER
            )));
        }

        let year = calendar::current_year();
        let date_time = calendar::project_date_time(
            year,
            request.week_number,
            request.time_slot_number,
            Some(start_time),
            planned_day.day_of_week,
        )
        .ok_or_else(|| AppError::Internal("Slot start could not be projected".to_string()))?;

        let key = SlotKey {
            planned_day_id: planned_day.id,
            court_id: request.court_id,
            time_slot_number: request.time_slot_number,
            week_number: request.week_number,
        };

        let current = tx.find_time_slot(&key).await?.map(|slot| slot.book_state);

        // Closed days only block new slots; existing ones can still change state
        if current.is_none() {
            let day = calendar::project_date(
                year,
                request.week_number,
                planned_day.day_of_week,
            )
            .ok_or_else(|| AppError::Internal("Slot date could not be projected".to_string()))?;

            if site.closed_days.contains(&day) {
                tracing::warn!(%site_id, date = %day, "Site is closed on requested date");
                return Err(AppError::OutOfRange(format!("Site is closed on {}", day)));
            }
        }

        let state = self.state_policy.assign(current, request.book_state)?;

        let upserted = tx.upsert_time_slot(&key, state).await?;
        tx.commit().await?;

        if upserted.created {
            tracing::info!(
                time_slot_id = %upserted.slot.id,
                planned_day_id = %key.planned_day_id,
                court_id = %key.court_id,
                slot = key.time_slot_number,
                week = key.week_number,
                %state,
                %booked_by,
                "Created time slot"
            );
        } else {
            tracing::info!(
                time_slot_id = %upserted.slot.id,
                %state,
                %booked_by,
                "Updated time slot"
            );
        }

        Ok(TimeSlotResponse::from_slot(upserted.slot, Some(date_time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookState::*;

    #[test]
    fn test_free_transitions_accept_anything() {
        let policy = FreeTransitions;
        assert_eq!(policy.assign(None, Paid).unwrap(), Paid);
        assert_eq!(policy.assign(Some(Paid), BookInProgress).unwrap(), BookInProgress);
        assert_eq!(policy.assign(Some(Cancelled), Booked).unwrap(), Booked);
    }

    #[test]
    fn test_transition_table_enforces_allow_list() {
        let policy = TransitionTable::standard();
        assert_eq!(policy.assign(None, Booked).unwrap(), Booked);
        assert_eq!(policy.assign(Some(Booked), Paid).unwrap(), Paid);
        assert_eq!(policy.assign(Some(Paid), Paid).unwrap(), Paid);

        assert!(matches!(policy.assign(None, Paid), Err(AppError::BadRequest(_))));
        assert!(matches!(
            policy.assign(Some(Paid), BookInProgress),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_configured_policy() {
        let free = TransitionPolicy::default().build();
        assert_eq!(free.assign(Some(Paid), BookInProgress).unwrap(), BookInProgress);

        let standard = TransitionPolicy::Standard.build();
        assert!(standard.assign(Some(Paid), BookInProgress).is_err());
    }

    mod retry {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use async_trait::async_trait;
        use chrono::NaiveTime;
        use rust_decimal::Decimal;

        use super::*;
        use crate::{
            models::{
                enums::DayOfWeek,
                site::{Court, PlannedDay, Site, SiteAggregate, SiteSummary, TimeSlot},
            },
            repository::{
                MemoryStore, PageWindow, SiteFilter, SiteTransaction, UpsertedSlot,
            },
        };

        /// Memory store whose first `conflicts` upserts report a lost uniqueness race
        struct RacingStore {
            inner: MemoryStore,
            conflicts: Arc<AtomicUsize>,
        }

        struct RacingTransaction {
            inner: Box<dyn SiteTransaction>,
            conflicts: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl SiteStore for RacingStore {
            async fn begin(&self) -> AppResult<Box<dyn SiteTransaction>> {
                Ok(Box::new(RacingTransaction {
                    inner: self.inner.begin().await?,
                    conflicts: self.conflicts.clone(),
                }))
            }

            async fn list_sites(
                &self,
                filter: &SiteFilter,
                window: PageWindow,
            ) -> AppResult<(Vec<SiteSummary>, i64)> {
                self.inner.list_sites(filter, window).await
            }

            async fn ping(&self) -> AppResult<()> {
                Ok(())
            }
        }

        #[async_trait]
        impl SiteTransaction for RacingTransaction {
            async fn load_site(&mut self, id: Uuid) -> AppResult<Option<SiteAggregate>> {
                self.inner.load_site(id).await
            }
            async fn find_site(&mut self, id: Uuid) -> AppResult<Option<Site>> {
                self.inner.find_site(id).await
            }
            async fn find_planned_day(&mut self, id: Uuid) -> AppResult<Option<PlannedDay>> {
                self.inner.find_planned_day(id).await
            }
            async fn find_court(&mut self, id: Uuid) -> AppResult<Option<Court>> {
                self.inner.find_court(id).await
            }
            async fn find_time_slot(&mut self, key: &SlotKey) -> AppResult<Option<TimeSlot>> {
                self.inner.find_time_slot(key).await
            }
            async fn insert_site(&mut self, site: &Site) -> AppResult<()> {
                self.inner.insert_site(site).await
            }
            async fn update_site(&mut self, site: &Site) -> AppResult<()> {
                self.inner.update_site(site).await
            }
            async fn delete_site(&mut self, id: Uuid) -> AppResult<bool> {
                self.inner.delete_site(id).await
            }
            async fn insert_court(&mut self, court: &Court) -> AppResult<()> {
                self.inner.insert_court(court).await
            }
            async fn delete_court(&mut self, id: Uuid) -> AppResult<u64> {
                self.inner.delete_court(id).await
            }
            async fn insert_planned_day(&mut self, day: &PlannedDay) -> AppResult<()> {
                self.inner.insert_planned_day(day).await
            }
            async fn update_planned_day(&mut self, day: &PlannedDay) -> AppResult<()> {
                self.inner.update_planned_day(day).await
            }
            async fn upsert_time_slot(
                &mut self,
                key: &SlotKey,
                state: BookState,
            ) -> AppResult<UpsertedSlot> {
                let remaining = self.conflicts.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.conflicts.store(remaining - 1, Ordering::SeqCst);
                    return Err(AppError::Conflict("Violates uq_time_slots_occupancy".to_string()));
                }
                self.inner.upsert_time_slot(key, state).await
            }
            async fn commit(self: Box<Self>) -> AppResult<()> {
                self.inner.commit().await
            }
        }

        async fn seeded(conflicts: usize) -> (BookingService, MemoryStore, Uuid, BookTimeSlot) {
            let inner = MemoryStore::new();
            let site = Site {
                id: Uuid::new_v4(),
                name: "Retry Club".to_string(),
                revenue: Decimal::ZERO,
                closed_days: Vec::new(),
            };
            let court = Court { id: Uuid::new_v4(), site_id: site.id, number: 1 };
            let day = PlannedDay {
                id: Uuid::new_v4(),
                site_id: site.id,
                day_of_week: DayOfWeek::Monday,
                number_of_time_slots: 4,
                start_time: NaiveTime::from_hms_opt(8, 0, 0),
            };

            let mut tx = inner.begin().await.unwrap();
            tx.insert_site(&site).await.unwrap();
            tx.insert_court(&court).await.unwrap();
            tx.insert_planned_day(&day).await.unwrap();
            tx.commit().await.unwrap();

            let store = RacingStore {
                inner: inner.clone(),
                conflicts: Arc::new(AtomicUsize::new(conflicts)),
            };
            let service = BookingService::new(Arc::new(store), Arc::new(FreeTransitions));
            let request = BookTimeSlot {
                planned_day_id: day.id,
                court_id: court.id,
                time_slot_number: 1,
                week_number: 10,
                book_state: Booked,
            };
            (service, inner, site.id, request)
        }

        #[tokio::test]
        async fn test_lost_race_is_retried_once() {
            let (service, inner, site_id, request) = seeded(1).await;

            let slot = service.book_time_slot(site_id, &request, Uuid::new_v4()).await.unwrap();
            assert_eq!(slot.book_state, Booked);
            assert_eq!(inner.time_slot_count().await, 1);
        }

        #[tokio::test]
        async fn test_second_conflict_is_returned() {
            let (service, inner, site_id, request) = seeded(2).await;

            let err = service
                .book_time_slot(site_id, &request, Uuid::new_v4())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
            assert_eq!(inner.time_slot_count().await, 0);
        }
    }
}
