//! Weekly schedule template and court registry reconciliation
//!
//! Both run inside the caller's transaction and keep the in-memory
//! [`SiteAggregate`] in step with what was written.

use std::collections::{BTreeSet, HashSet};

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::DayOfWeek,
        site::{Court, CourtRequest, PlannedDay, PlannedDayRequest, SiteAggregate},
    },
    repository::SiteTransaction,
};

/// What happens to existing bookings when a schedule update shrinks a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkPolicy {
    /// Keep slots beyond the new bound readable; they can no longer be booked again
    #[default]
    PreserveBookings,
    /// Refuse the update while any slot would fall outside the new grid
    RejectWhenBooked,
}

/// Validated template for one day of week
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTemplate {
    pub day_of_week: DayOfWeek,
    pub number_of_time_slots: i32,
    pub start_time: Option<NaiveTime>,
}

/// Court numbers to drop and to add on a site update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourtPlan {
    pub to_remove: BTreeSet<i32>,
    pub to_add: BTreeSet<i32>,
}

/// Parse `HH:MM`; blank means no start time
fn parse_start_time(raw: Option<&str>) -> AppResult<Option<NaiveTime>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M")
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Invalid start_time '{}' (use HH:MM)", s))),
    }
}

/// Validate a full weekly schedule: exactly seven distinct days, 0-8 slots each
pub fn parse_schedule(entries: &[PlannedDayRequest]) -> AppResult<Vec<DayTemplate>> {
    let distinct: HashSet<DayOfWeek> = entries.iter().map(|e| e.day_of_week).collect();
    if entries.len() != DayOfWeek::ALL.len() || distinct.len() != DayOfWeek::ALL.len() {
        return Err(AppError::Validation(
            "Schedule must contain exactly 7 days (one for each day of the week) with no duplicates"
                .to_string(),
        ));
    }

    let mut templates = entries
        .iter()
        .map(|entry| -> AppResult<DayTemplate> {
            entry.validate()?;
            Ok(DayTemplate {
                day_of_week: entry.day_of_week,
                number_of_time_slots: entry.number_of_time_slots,
                start_time: parse_start_time(entry.start_time.as_deref())?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;
    templates.sort_by_key(|t| t.day_of_week);

    Ok(templates)
}

/// Validate requested courts and return their numbers
pub fn parse_court_numbers(courts: Option<&[CourtRequest]>) -> AppResult<BTreeSet<i32>> {
    let courts = courts.unwrap_or_default();
    let mut numbers = BTreeSet::new();
    for court in courts {
        court.validate()?;
        if !numbers.insert(court.number) {
            return Err(AppError::Validation(format!(
                "Court number {} appears more than once",
                court.number
            )));
        }
    }
    Ok(numbers)
}

/// Validate closed days: no duplicates, returned sorted
pub fn parse_closed_days(days: Option<&[NaiveDate]>) -> AppResult<Vec<NaiveDate>> {
    let days = days.unwrap_or_default();
    let unique: BTreeSet<NaiveDate> = days.iter().copied().collect();
    if unique.len() != days.len() {
        return Err(AppError::Validation(
            "Closed days must not contain duplicate dates".to_string(),
        ));
    }
    Ok(unique.into_iter().collect())
}

/// One planned day per template, for a new site
pub fn initial_planned_days(site_id: Uuid, templates: &[DayTemplate]) -> Vec<PlannedDay> {
    templates
        .iter()
        .map(|t| PlannedDay {
            id: Uuid::new_v4(),
            site_id,
            day_of_week: t.day_of_week,
            number_of_time_slots: t.number_of_time_slots,
            start_time: t.start_time,
        })
        .collect()
}

/// Split the difference between existing and desired court numbers
pub fn plan_court_changes(existing: &BTreeSet<i32>, desired: &BTreeSet<i32>) -> CourtPlan {
    CourtPlan {
        to_remove: existing.difference(desired).copied().collect(),
        to_add: desired.difference(existing).copied().collect(),
    }
}

/// Apply a court plan. Removed courts take their time slots with them;
/// untouched courts keep theirs. Returns the number of slots removed.
pub async fn reconcile_courts(
    tx: &mut dyn SiteTransaction,
    aggregate: &mut SiteAggregate,
    plan: &CourtPlan,
) -> AppResult<u64> {
    let mut removed_slots = 0;

    let removed: Vec<Court> = aggregate
        .courts
        .iter()
        .filter(|c| plan.to_remove.contains(&c.number))
        .cloned()
        .collect();
    for court in &removed {
        removed_slots += tx.delete_court(court.id).await?;
        aggregate.courts.retain(|c| c.id != court.id);
        aggregate.time_slots.retain(|ts| ts.court_id != court.id);
    }

    for &number in &plan.to_add {
        let court = Court {
            id: Uuid::new_v4(),
            site_id: aggregate.site.id,
            number,
        };
        tx.insert_court(&court).await?;
        aggregate.courts.push(court);
    }
    aggregate.courts.sort_by_key(|c| c.number);

    if !removed.is_empty() || !plan.to_add.is_empty() {
        tracing::info!(
            site_id = %aggregate.site.id,
            removed_courts = removed.len(),
            removed_slots,
            added_courts = plan.to_add.len(),
            total_courts = aggregate.courts.len(),
            "Courts synchronized"
        );
    }

    Ok(removed_slots)
}

/// Slots that a template would leave outside the bookable grid
fn slots_outside(aggregate: &SiteAggregate, day: &PlannedDay, template: &DayTemplate) -> usize {
    aggregate
        .time_slots
        .iter()
        .filter(|ts| ts.planned_day_id == day.id)
        .filter(|ts| template.start_time.is_none() || ts.time_slot_number > template.number_of_time_slots)
        .count()
}

/// Update planned days in place from the templates. Existing time slots are
/// never touched; under [`ShrinkPolicy::RejectWhenBooked`] the whole update is
/// refused if any slot would end up outside the new grid.
pub async fn apply_schedule(
    tx: &mut dyn SiteTransaction,
    aggregate: &mut SiteAggregate,
    templates: &[DayTemplate],
    policy: ShrinkPolicy,
) -> AppResult<()> {
    if policy == ShrinkPolicy::RejectWhenBooked {
        for template in templates {
            let Some(day) = aggregate
                .planned_days
                .iter()
                .find(|pd| pd.day_of_week == template.day_of_week)
            else {
                continue;
            };
            let stranded = slots_outside(aggregate, day, template);
            if stranded > 0 {
                return Err(AppError::Conflict(format!(
                    "{} booked time slot(s) on {} fall outside the new schedule",
                    stranded, template.day_of_week
                )));
            }
        }
    }

    let site_id = aggregate.site.id;
    for template in templates {
        match aggregate
            .planned_days
            .iter_mut()
            .find(|pd| pd.day_of_week == template.day_of_week)
        {
            Some(day) => {
                day.number_of_time_slots = template.number_of_time_slots;
                day.start_time = template.start_time;
                tx.update_planned_day(day).await?;

                tracing::debug!(
                    %site_id,
                    day_of_week = %template.day_of_week,
                    number_of_time_slots = template.number_of_time_slots,
                    "Updated planned day"
                );
            }
            None => {
                let day = PlannedDay {
                    id: Uuid::new_v4(),
                    site_id,
                    day_of_week: template.day_of_week,
                    number_of_time_slots: template.number_of_time_slots,
                    start_time: template.start_time,
                };
                tx.insert_planned_day(&day).await?;
                aggregate.planned_days.push(day);

                tracing::warn!(
                    %site_id,
                    day_of_week = %template.day_of_week,
                    "Created missing planned day"
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(slots: i32, start: Option<&str>) -> Vec<PlannedDayRequest> {
        DayOfWeek::ALL
            .iter()
            .map(|&day_of_week| PlannedDayRequest {
                day_of_week,
                number_of_time_slots: slots,
                start_time: start.map(str::to_string),
            })
            .collect()
    }

    fn set(numbers: &[i32]) -> BTreeSet<i32> {
        numbers.iter().copied().collect()
    }

    #[test]
    fn test_parse_full_week() {
        let templates = parse_schedule(&week(4, Some("08:00"))).unwrap();
        assert_eq!(templates.len(), 7);
        assert_eq!(templates[0].day_of_week, DayOfWeek::Monday);
        assert_eq!(templates[0].start_time, NaiveTime::from_hms_opt(8, 0, 0));
    }

    #[test]
    fn test_schedule_needs_seven_distinct_days() {
        let mut short = week(4, None);
        short.pop();
        assert!(matches!(parse_schedule(&short), Err(AppError::Validation(_))));

        let mut duplicated = week(4, None);
        duplicated[6].day_of_week = DayOfWeek::Monday;
        assert!(matches!(parse_schedule(&duplicated), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_slot_count_bounds() {
        assert!(parse_schedule(&week(0, None)).is_ok());
        assert!(parse_schedule(&week(8, Some("07:00"))).is_ok());
        assert!(matches!(parse_schedule(&week(9, None)), Err(AppError::Validation(_))));
        assert!(matches!(parse_schedule(&week(-1, None)), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_start_time_format() {
        let blank = parse_schedule(&week(2, Some(" "))).unwrap();
        assert_eq!(blank[0].start_time, None);
        assert!(matches!(
            parse_schedule(&week(2, Some("8h00"))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_court_numbers_unique_and_bounded() {
        let ok = [CourtRequest { number: 2 }, CourtRequest { number: 1 }];
        assert_eq!(parse_court_numbers(Some(&ok[..])).unwrap(), set(&[1, 2]));
        assert!(parse_court_numbers(None).unwrap().is_empty());

        let dup = [CourtRequest { number: 3 }, CourtRequest { number: 3 }];
        assert!(matches!(parse_court_numbers(Some(&dup[..])), Err(AppError::Validation(_))));

        let zero = [CourtRequest { number: 0 }];
        assert!(matches!(parse_court_numbers(Some(&zero[..])), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_closed_days_reject_duplicates() {
        let d = NaiveDate::from_ymd_opt(2026, 12, 25).unwrap();
        let e = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(parse_closed_days(Some(&[d, e][..])).unwrap(), vec![e, d]);
        assert!(parse_closed_days(Some(&[d, d][..])).is_err());
    }

    #[test]
    fn test_court_plan() {
        let plan = plan_court_changes(&set(&[1, 2, 3]), &set(&[2, 3, 4, 5]));
        assert_eq!(plan.to_remove, set(&[1]));
        assert_eq!(plan.to_add, set(&[4, 5]));

        let unchanged = plan_court_changes(&set(&[1, 2]), &set(&[1, 2]));
        assert_eq!(unchanged, CourtPlan::default());
    }
}
