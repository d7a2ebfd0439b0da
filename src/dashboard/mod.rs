//! Screen-level data: cached reads, analytics buckets, claim ordering and
//! the notification feed.

pub mod analytics;
pub mod claims;
pub mod client;
pub mod notifications;

pub use analytics::{load_analytics, AnalyticsSnapshot};
pub use claims::{sorted_claims, ClaimFilter};
pub use client::{DashboardClient, DashboardSettings, DataSource};
pub use notifications::{open_bus, NotificationFeed, NOTIFICATION_SCOPE};
