//! Repository layer: the site store and its units of work
//!
//! Every service operation opens one [`SiteTransaction`], reads the site
//! subtree it needs, mutates it and commits. Dropping a transaction without
//! committing rolls it back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::BookState,
        site::{Court, PlannedDay, Site, SiteAggregate, SiteSummary, SlotKey, TimeSlot},
    },
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Window over the site collection; `limit = None` returns everything
#[derive(Debug, Clone, Copy, Default)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: Option<i64>,
}

/// Restriction applied before paging and counting
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    /// Case-insensitive substring of the site name
    pub name: Option<String>,
}

/// Result of a time-slot upsert
#[derive(Debug, Clone)]
pub struct UpsertedSlot {
    pub slot: TimeSlot,
    /// True when the row did not exist before this call
    pub created: bool,
}

/// Entry point to site persistence
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> AppResult<Box<dyn SiteTransaction>>;

    /// Light projection of matching sites, ordered by name, with the number of matches
    async fn list_sites(
        &self,
        filter: &SiteFilter,
        window: PageWindow,
    ) -> AppResult<(Vec<SiteSummary>, i64)>;

    /// Check that the backend is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic unit of work against the site store
#[async_trait]
pub trait SiteTransaction: Send {
    /// Site with courts, planned days and every materialized time slot
    async fn load_site(&mut self, id: Uuid) -> AppResult<Option<SiteAggregate>>;

    async fn find_site(&mut self, id: Uuid) -> AppResult<Option<Site>>;

    async fn find_planned_day(&mut self, id: Uuid) -> AppResult<Option<PlannedDay>>;

    async fn find_court(&mut self, id: Uuid) -> AppResult<Option<Court>>;

    async fn find_time_slot(&mut self, key: &SlotKey) -> AppResult<Option<TimeSlot>>;

    async fn insert_site(&mut self, site: &Site) -> AppResult<()>;

    /// Persist name and closed days
    async fn update_site(&mut self, site: &Site) -> AppResult<()>;

    /// Delete a site and its whole subtree; false when it did not exist
    async fn delete_site(&mut self, id: Uuid) -> AppResult<bool>;

    async fn insert_court(&mut self, court: &Court) -> AppResult<()>;

    /// Delete a court and every time slot referencing it; returns the number of slots removed
    async fn delete_court(&mut self, id: Uuid) -> AppResult<u64>;

    async fn insert_planned_day(&mut self, day: &PlannedDay) -> AppResult<()>;

    /// Persist slot count and start time
    async fn update_planned_day(&mut self, day: &PlannedDay) -> AppResult<()>;

    /// Insert the slot for `key`, or overwrite its state if it already exists
    async fn upsert_time_slot(&mut self, key: &SlotKey, state: BookState) -> AppResult<UpsertedSlot>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
