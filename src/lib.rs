//! Courtbook
//!
//! Sports site scheduling server: sites with numbered courts, a weekly
//! template of planned days, and time slots materialized on first booking.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::SiteStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub store: Arc<dyn SiteStore>,
}

impl AppState {
    /// Wire services on top of `store`
    pub fn new(config: AppConfig, store: Arc<dyn SiteStore>) -> Self {
        let services = services::Services::new(store.clone(), &config.schedule, &config.booking);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            store,
        }
    }
}
