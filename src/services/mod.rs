//! Business logic services

pub mod booking;
pub mod calendar;
pub mod schedule;
pub mod sites;

use std::sync::Arc;

use crate::{
    config::{BookingConfig, ScheduleConfig},
    repository::SiteStore,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub sites: sites::SitesService,
    pub booking: booking::BookingService,
}

impl Services {
    /// Create all services on top of the given store
    pub fn new(
        store: Arc<dyn SiteStore>,
        schedule_config: &ScheduleConfig,
        booking_config: &BookingConfig,
    ) -> Self {
        Self {
            sites: sites::SitesService::new(store.clone(), schedule_config.shrink_policy),
            booking: booking::BookingService::new(
                store,
                booking_config.transition_policy.build(),
            ),
        }
    }
}
