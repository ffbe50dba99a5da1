//! Site lifecycle service

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use super::{
    calendar,
    schedule::{self, ShrinkPolicy},
};
use crate::{
    error::{AppError, AppResult},
    models::site::{
        Court, CreateSite, PlannedDayRequest, Site, SiteDetails, SiteQuery, SitesPage, UpdateSite,
    },
    repository::{PageWindow, SiteFilter, SiteStore},
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_NAME_LENGTH: usize = 200;

/// Trimmed site name, 1-200 characters
fn parse_site_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    let length = name.chars().count();
    if length == 0 || length > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Name must be 1-{} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct SitesService {
    store: Arc<dyn SiteStore>,
    shrink_policy: ShrinkPolicy,
}

impl SitesService {
    pub fn new(store: Arc<dyn SiteStore>, shrink_policy: ShrinkPolicy) -> Self {
        Self { store, shrink_policy }
    }

    /// Create a site with its courts and seven planned days, in one unit of work
    pub async fn create_site(&self, request: &CreateSite) -> AppResult<SiteDetails> {
        request.validate()?;
        let name = parse_site_name(&request.name)?;
        let templates = schedule::parse_schedule(&request.schedule)?;
        let court_numbers = schedule::parse_court_numbers(request.courts.as_deref())?;
        let closed_days = schedule::parse_closed_days(request.closed_days.as_deref())?;

        let site = Site {
            id: Uuid::new_v4(),
            name,
            revenue: Decimal::ZERO,
            closed_days,
        };
        let courts: Vec<Court> = court_numbers
            .iter()
            .map(|&number| Court {
                id: Uuid::new_v4(),
                site_id: site.id,
                number,
            })
            .collect();
        let planned_days = schedule::initial_planned_days(site.id, &templates);

        let mut tx = self.store.begin().await?;
        tx.insert_site(&site).await?;
        for court in &courts {
            tx.insert_court(court).await?;
        }
        for day in &planned_days {
            tx.insert_planned_day(day).await?;
        }
        let aggregate = tx
            .load_site(site.id)
            .await?
            .ok_or_else(|| AppError::Internal("Created site vanished".to_string()))?;
        tx.commit().await?;

        tracing::info!(
            site_id = %site.id,
            name = %site.name,
            courts = courts.len(),
            "Site created"
        );

        Ok(aggregate.into_details(calendar::current_year()))
    }

    /// Full site projection with every materialized slot
    pub async fn get_site(&self, id: Uuid) -> AppResult<SiteDetails> {
        let mut tx = self.store.begin().await?;
        let aggregate = tx
            .load_site(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))?;

        Ok(aggregate.into_details(calendar::current_year()))
    }

    /// List sites by name, optionally filtered on a name fragment. Without
    /// paging parameters every matching site is returned.
    pub async fn list_sites(&self, query: &SiteQuery) -> AppResult<SitesPage> {
        query.validate()?;
        let filter = SiteFilter {
            name: query.name_filter().map(str::to_string),
        };

        if !query.is_paged() {
            let (sites, total) = self.store.list_sites(&filter, PageWindow::default()).await?;
            return Ok(SitesPage {
                per_page: total,
                sites,
                total,
                page: 1,
            });
        }

        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::Validation(format!("Page number {} is too large", page)))?;
        let window = PageWindow {
            offset,
            limit: Some(per_page),
        };
        let (sites, total) = self.store.list_sites(&filter, window).await?;

        Ok(SitesPage {
            sites,
            total,
            page,
            per_page,
        })
    }

    /// Replace name, closed days, courts and weekly schedule of a site.
    /// Removed courts lose their slots; other slots survive untouched.
    pub async fn update_site(&self, id: Uuid, request: &UpdateSite) -> AppResult<SiteDetails> {
        request.validate()?;
        let name = parse_site_name(&request.name)?;
        let templates = schedule::parse_schedule(&request.schedule)?;
        let desired_courts = schedule::parse_court_numbers(request.courts.as_deref())?;
        let closed_days = schedule::parse_closed_days(request.closed_days.as_deref())?;

        let mut tx = self.store.begin().await?;
        let mut aggregate = tx
            .load_site(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))?;

        aggregate.site.name = name;
        aggregate.site.closed_days = closed_days;
        tx.update_site(&aggregate.site).await?;

        let existing_courts: BTreeSet<i32> = aggregate.courts.iter().map(|c| c.number).collect();
        let plan = schedule::plan_court_changes(&existing_courts, &desired_courts);
        schedule::reconcile_courts(&mut *tx, &mut aggregate, &plan).await?;
        schedule::apply_schedule(&mut *tx, &mut aggregate, &templates, self.shrink_policy).await?;

        tx.commit().await?;

        tracing::info!(site_id = %id, name = %aggregate.site.name, "Site updated");

        Ok(aggregate.into_details(calendar::current_year()))
    }

    /// Replace the weekly schedule only
    pub async fn update_schedule(
        &self,
        id: Uuid,
        planned_days: &[PlannedDayRequest],
    ) -> AppResult<SiteDetails> {
        let templates = schedule::parse_schedule(planned_days)?;

        let mut tx = self.store.begin().await?;
        let mut aggregate = tx
            .load_site(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))?;

        schedule::apply_schedule(&mut *tx, &mut aggregate, &templates, self.shrink_policy).await?;
        tx.commit().await?;

        tracing::info!(site_id = %id, "Schedule updated");

        Ok(aggregate.into_details(calendar::current_year()))
    }

    /// Delete a site with its courts, planned days and time slots
    pub async fn delete_site(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_site(id).await? {
            return Err(AppError::NotFound(format!("Site {} not found", id)));
        }
        tx.commit().await?;

        tracing::info!(site_id = %id, "Site deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_name_is_trimmed_and_bounded() {
        assert_eq!(parse_site_name("  Center Court ").unwrap(), "Center Court");
        assert!(matches!(parse_site_name("   "), Err(AppError::Validation(_))));
        assert!(matches!(parse_site_name(""), Err(AppError::Validation(_))));
        assert!(parse_site_name(&"é".repeat(200)).is_ok());
        assert!(matches!(
            parse_site_name(&"x".repeat(201)),
            Err(AppError::Validation(_))
        ));
    }
}
