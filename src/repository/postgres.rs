//! PostgreSQL site store

use async_trait::async_trait;
use sqlx::{FromRow, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{PageWindow, SiteFilter, SiteStore, SiteTransaction, UpsertedSlot};
use crate::{
    error::AppResult,
    models::{
        enums::BookState,
        site::{Court, PlannedDay, Site, SiteAggregate, SiteSummary, SlotKey, TimeSlot},
    },
};

const TIME_SLOT_COLUMNS: &str =
    "id, planned_day_id, court_id, time_slot_number, week_number, book_state";

/// `%fragment%` with LIKE wildcards in the fragment escaped
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteStore for PostgresStore {
    async fn begin(&self) -> AppResult<Box<dyn SiteTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSiteTransaction { tx }))
    }

    async fn list_sites(
        &self,
        filter: &SiteFilter,
        window: PageWindow,
    ) -> AppResult<(Vec<SiteSummary>, i64)> {
        let pattern = filter.name.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sites WHERE ($1::text IS NULL OR name ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        // LIMIT NULL means no limit
        let sites = sqlx::query_as::<_, SiteSummary>(
            r#"
            SELECT s.id, s.name, s.revenue, s.closed_days,
                   (SELECT COUNT(*) FROM courts c WHERE c.site_id = s.id) AS court_count
            FROM sites s
            WHERE ($1::text IS NULL OR s.name ILIKE $1)
            ORDER BY s.name, s.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((sites, total))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgSiteTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SiteTransaction for PgSiteTransaction {
    async fn load_site(&mut self, id: Uuid) -> AppResult<Option<SiteAggregate>> {
        let Some(site) = self.find_site(id).await? else {
            return Ok(None);
        };

        let courts = sqlx::query_as::<_, Court>(
            "SELECT id, site_id, number FROM courts WHERE site_id = $1 ORDER BY number",
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        let planned_days = sqlx::query_as::<_, PlannedDay>(
            r#"
            SELECT id, site_id, day_of_week, number_of_time_slots, start_time
            FROM planned_days WHERE site_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        let time_slots = sqlx::query_as::<_, TimeSlot>(
            r#"
            SELECT ts.id, ts.planned_day_id, ts.court_id, ts.time_slot_number,
                   ts.week_number, ts.book_state
            FROM time_slots ts
            JOIN planned_days pd ON pd.id = ts.planned_day_id
            WHERE pd.site_id = $1
            ORDER BY ts.time_slot_number, ts.week_number
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(SiteAggregate {
            site,
            courts,
            planned_days,
            time_slots,
        }))
    }

    async fn find_site(&mut self, id: Uuid) -> AppResult<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            "SELECT id, name, revenue, closed_days FROM sites WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(site)
    }

    async fn find_planned_day(&mut self, id: Uuid) -> AppResult<Option<PlannedDay>> {
        let day = sqlx::query_as::<_, PlannedDay>(
            r#"
            SELECT id, site_id, day_of_week, number_of_time_slots, start_time
            FROM planned_days WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(day)
    }

    async fn find_court(&mut self, id: Uuid) -> AppResult<Option<Court>> {
        let court = sqlx::query_as::<_, Court>("SELECT id, site_id, number FROM courts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(court)
    }

    async fn find_time_slot(&mut self, key: &SlotKey) -> AppResult<Option<TimeSlot>> {
        let query = format!(
            r#"
            SELECT {} FROM time_slots
            WHERE planned_day_id = $1 AND court_id = $2
              AND time_slot_number = $3 AND week_number = $4
            "#,
            TIME_SLOT_COLUMNS
        );
        let slot = sqlx::query_as::<_, TimeSlot>(&query)
            .bind(key.planned_day_id)
            .bind(key.court_id)
            .bind(key.time_slot_number)
            .bind(key.week_number)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(slot)
    }

    async fn insert_site(&mut self, site: &Site) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO sites (id, name, revenue, closed_days) VALUES ($1, $2, $3, $4)",
        )
        .bind(site.id)
        .bind(&site.name)
        .bind(site.revenue)
        .bind(&site.closed_days)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_site(&mut self, site: &Site) -> AppResult<()> {
        sqlx::query(
            "UPDATE sites SET name = $2, closed_days = $3, modif_date = NOW() WHERE id = $1",
        )
        .bind(site.id)
        .bind(&site.name)
        .bind(&site.closed_days)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_site(&mut self, id: Uuid) -> AppResult<bool> {
        // Courts and planned days cascade, time slots cascade from both
        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_court(&mut self, court: &Court) -> AppResult<()> {
        sqlx::query("INSERT INTO courts (id, site_id, number) VALUES ($1, $2, $3)")
            .bind(court.id)
            .bind(court.site_id)
            .bind(court.number)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_court(&mut self, id: Uuid) -> AppResult<u64> {
        let removed_slots = sqlx::query("DELETE FROM time_slots WHERE court_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM courts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(removed_slots)
    }

    async fn insert_planned_day(&mut self, day: &PlannedDay) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO planned_days (id, site_id, day_of_week, number_of_time_slots, start_time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(day.id)
        .bind(day.site_id)
        .bind(day.day_of_week)
        .bind(day.number_of_time_slots)
        .bind(day.start_time)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_planned_day(&mut self, day: &PlannedDay) -> AppResult<()> {
        sqlx::query(
            "UPDATE planned_days SET number_of_time_slots = $2, start_time = $3 WHERE id = $1",
        )
        .bind(day.id)
        .bind(day.number_of_time_slots)
        .bind(day.start_time)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_time_slot(&mut self, key: &SlotKey, state: BookState) -> AppResult<UpsertedSlot> {
        // xmax is zero only for rows inserted by this statement
        let query = format!(
            r#"
            INSERT INTO time_slots (id, planned_day_id, court_id, time_slot_number, week_number, book_state)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT uq_time_slots_occupancy
            DO UPDATE SET book_state = EXCLUDED.book_state, modif_date = NOW()
            RETURNING {}, (xmax = 0) AS inserted
            "#,
            TIME_SLOT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(key.planned_day_id)
            .bind(key.court_id)
            .bind(key.time_slot_number)
            .bind(key.week_number)
            .bind(state)
            .fetch_one(&mut *self.tx)
            .await?;

        let slot = TimeSlot::from_row(&row)?;
        let created: bool = row.try_get("inserted")?;

        Ok(UpsertedSlot { slot, created })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgSiteTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("arena"), "%arena%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
