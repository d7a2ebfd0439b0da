mod analytics;
mod claims;
mod notifications;

pub use analytics::AnalyticsView;
pub use claims::ClaimsView;
pub use notifications::NotificationsView;
