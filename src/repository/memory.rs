//! In-process site store
//!
//! Transactions hold the store lock for their whole lifetime and work on a
//! private copy of the state, which replaces the shared state on commit.
//! Uniqueness rules mirror the PostgreSQL schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{PageWindow, SiteFilter, SiteStore, SiteTransaction, UpsertedSlot};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::BookState,
        site::{Court, PlannedDay, Site, SiteAggregate, SiteSummary, SlotKey, TimeSlot},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sites: HashMap<Uuid, Site>,
    courts: HashMap<Uuid, Court>,
    planned_days: HashMap<Uuid, PlannedDay>,
    time_slots: HashMap<Uuid, TimeSlot>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of materialized time slots across all sites
    pub async fn time_slot_count(&self) -> usize {
        self.state.lock().await.time_slots.len()
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn SiteTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, work }))
    }

    async fn list_sites(
        &self,
        filter: &SiteFilter,
        window: PageWindow,
    ) -> AppResult<(Vec<SiteSummary>, i64)> {
        let state = self.state.lock().await;

        let needle = filter.name.as_deref().map(str::to_lowercase);
        let mut sites: Vec<&Site> = state
            .sites
            .values()
            .filter(|site| match &needle {
                Some(needle) => site.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        let total = sites.len() as i64;

        let limit = window.limit.unwrap_or(total).max(0) as usize;
        let summaries = sites
            .into_iter()
            .skip(window.offset.max(0) as usize)
            .take(limit)
            .map(|site| {
                let mut closed_days = site.closed_days.clone();
                closed_days.sort();
                SiteSummary {
                    id: site.id,
                    name: site.name.clone(),
                    revenue: site.revenue,
                    closed_days,
                    court_count: state.courts.values().filter(|c| c.site_id == site.id).count() as i64,
                }
            })
            .collect();

        Ok((summaries, total))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl MemoryTransaction {
    fn remove_slots_where(&mut self, predicate: impl Fn(&TimeSlot) -> bool) -> u64 {
        let before = self.work.time_slots.len();
        self.work.time_slots.retain(|_, ts| !predicate(ts));
        (before - self.work.time_slots.len()) as u64
    }
}

#[async_trait]
impl SiteTransaction for MemoryTransaction {
    async fn load_site(&mut self, id: Uuid) -> AppResult<Option<SiteAggregate>> {
        let Some(site) = self.work.sites.get(&id).cloned() else {
            return Ok(None);
        };

        let mut courts: Vec<Court> = self
            .work
            .courts
            .values()
            .filter(|c| c.site_id == id)
            .cloned()
            .collect();
        courts.sort_by_key(|c| c.number);

        let planned_days: Vec<PlannedDay> = self
            .work
            .planned_days
            .values()
            .filter(|pd| pd.site_id == id)
            .cloned()
            .collect();

        let time_slots = self
            .work
            .time_slots
            .values()
            .filter(|ts| planned_days.iter().any(|pd| pd.id == ts.planned_day_id))
            .cloned()
            .collect();

        Ok(Some(SiteAggregate {
            site,
            courts,
            planned_days,
            time_slots,
        }))
    }

    async fn find_site(&mut self, id: Uuid) -> AppResult<Option<Site>> {
        Ok(self.work.sites.get(&id).cloned())
    }

    async fn find_planned_day(&mut self, id: Uuid) -> AppResult<Option<PlannedDay>> {
        Ok(self.work.planned_days.get(&id).cloned())
    }

    async fn find_court(&mut self, id: Uuid) -> AppResult<Option<Court>> {
        Ok(self.work.courts.get(&id).cloned())
    }

    async fn find_time_slot(&mut self, key: &SlotKey) -> AppResult<Option<TimeSlot>> {
        Ok(self
            .work
            .time_slots
            .values()
            .find(|ts| ts.key() == *key)
            .cloned())
    }

    async fn insert_site(&mut self, site: &Site) -> AppResult<()> {
        if self.work.sites.contains_key(&site.id) {
            return Err(AppError::Conflict("Violates sites_pkey".to_string()));
        }
        self.work.sites.insert(site.id, site.clone());
        Ok(())
    }

    async fn update_site(&mut self, site: &Site) -> AppResult<()> {
        if let Some(existing) = self.work.sites.get_mut(&site.id) {
            existing.name = site.name.clone();
            existing.closed_days = site.closed_days.clone();
        }
        Ok(())
    }

    async fn delete_site(&mut self, id: Uuid) -> AppResult<bool> {
        if self.work.sites.remove(&id).is_none() {
            return Ok(false);
        }

        let court_ids: Vec<Uuid> = self
            .work
            .courts
            .values()
            .filter(|c| c.site_id == id)
            .map(|c| c.id)
            .collect();
        let day_ids: Vec<Uuid> = self
            .work
            .planned_days
            .values()
            .filter(|pd| pd.site_id == id)
            .map(|pd| pd.id)
            .collect();

        self.remove_slots_where(|ts| {
            court_ids.contains(&ts.court_id) || day_ids.contains(&ts.planned_day_id)
        });
        self.work.courts.retain(|_, c| c.site_id != id);
        self.work.planned_days.retain(|_, pd| pd.site_id != id);

        Ok(true)
    }

    async fn insert_court(&mut self, court: &Court) -> AppResult<()> {
        let duplicate = self
            .work
            .courts
            .values()
            .any(|c| c.site_id == court.site_id && c.number == court.number);
        if duplicate {
            return Err(AppError::Conflict("Violates uq_courts_site_number".to_string()));
        }
        self.work.courts.insert(court.id, court.clone());
        Ok(())
    }

    async fn delete_court(&mut self, id: Uuid) -> AppResult<u64> {
        let removed = self.remove_slots_where(|ts| ts.court_id == id);
        self.work.courts.remove(&id);
        Ok(removed)
    }

    async fn insert_planned_day(&mut self, day: &PlannedDay) -> AppResult<()> {
        let duplicate = self
            .work
            .planned_days
            .values()
            .any(|pd| pd.site_id == day.site_id && pd.day_of_week == day.day_of_week);
        if duplicate {
            return Err(AppError::Conflict("Violates uq_planned_days_site_day".to_string()));
        }
        self.work.planned_days.insert(day.id, day.clone());
        Ok(())
    }

    async fn update_planned_day(&mut self, day: &PlannedDay) -> AppResult<()> {
        if let Some(existing) = self.work.planned_days.get_mut(&day.id) {
            existing.number_of_time_slots = day.number_of_time_slots;
            existing.start_time = day.start_time;
        }
        Ok(())
    }

    async fn upsert_time_slot(&mut self, key: &SlotKey, state: BookState) -> AppResult<UpsertedSlot> {
        if let Some(existing) = self.work.time_slots.values_mut().find(|ts| ts.key() == *key) {
            existing.book_state = state;
            return Ok(UpsertedSlot {
                slot: existing.clone(),
                created: false,
            });
        }

        let slot = TimeSlot {
            id: Uuid::new_v4(),
            planned_day_id: key.planned_day_id,
            court_id: key.court_id,
            time_slot_number: key.time_slot_number,
            week_number: key.week_number,
            book_state: state,
        };
        self.work.time_slots.insert(slot.id, slot.clone());

        Ok(UpsertedSlot { slot, created: true })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::DayOfWeek;
    use rust_decimal::Decimal;

    fn site(name: &str) -> Site {
        Site {
            id: Uuid::new_v4(),
            name: name.to_string(),
            revenue: Decimal::ZERO,
            closed_days: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = MemoryStore::new();
        let s = site("Rollback Arena");

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_site(&s).await.unwrap();
        }

        let (sites, total) = store.list_sites(&SiteFilter::default(), PageWindow::default()).await.unwrap();
        assert!(sites.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_duplicate_court_number_conflicts() {
        let store = MemoryStore::new();
        let s = site("Dup Courts");
        let mut tx = store.begin().await.unwrap();
        tx.insert_site(&s).await.unwrap();
        tx.insert_court(&Court { id: Uuid::new_v4(), site_id: s.id, number: 1 }).await.unwrap();

        let err = tx
            .insert_court(&Court { id: Uuid::new_v4(), site_id: s.id, number: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_upsert_reuses_existing_row() {
        let store = MemoryStore::new();
        let s = site("Upsert Club");
        let day = PlannedDay {
            id: Uuid::new_v4(),
            site_id: s.id,
            day_of_week: DayOfWeek::Monday,
            number_of_time_slots: 4,
            start_time: None,
        };
        let court = Court { id: Uuid::new_v4(), site_id: s.id, number: 1 };
        let key = SlotKey {
            planned_day_id: day.id,
            court_id: court.id,
            time_slot_number: 1,
            week_number: 3,
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_site(&s).await.unwrap();
        tx.insert_planned_day(&day).await.unwrap();
        tx.insert_court(&court).await.unwrap();
        let first = tx.upsert_time_slot(&key, BookState::Booked).await.unwrap();
        let second = tx.upsert_time_slot(&key, BookState::Paid).await.unwrap();
        tx.commit().await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.slot.id, second.slot.id);
        assert_eq!(second.slot.book_state, BookState::Paid);
        assert_eq!(store.time_slot_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_sites_pages_by_name() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for name in ["Charlie", "Alpha", "Bravo"] {
            tx.insert_site(&site(name)).await.unwrap();
        }
        tx.commit().await.unwrap();

        let (page, total) = store
            .list_sites(&SiteFilter::default(), PageWindow { offset: 1, limit: Some(1) })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Bravo");
    }

    #[tokio::test]
    async fn test_name_filter_applies_to_total() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for name in ["North Arena", "South ARENA", "Tennis Hall"] {
            tx.insert_site(&site(name)).await.unwrap();
        }
        tx.commit().await.unwrap();

        let filter = SiteFilter { name: Some("arena".to_string()) };
        let (page, total) = store
            .list_sites(&filter, PageWindow { offset: 0, limit: Some(1) })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "North Arena");
    }
}
