//! Data models for Courtbook

pub mod enums;
pub mod site;
pub mod user;

// Re-export commonly used types
pub use enums::{BookState, DayOfWeek};
pub use site::{Court, PlannedDay, Site, SiteAggregate, TimeSlot};
pub use user::{Role, UserClaims};
