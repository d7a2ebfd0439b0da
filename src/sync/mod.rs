//! Realtime synchronisation: subscription ownership, message reconciliation
//! and claim recency.

pub mod debounce;
pub mod last_message;
pub mod reconcile;
pub mod registry;
pub mod session;

pub use debounce::Debouncer;
pub use last_message::{compute_last_messages, relative_time, LastMessageInfo, MESSAGE_TABLE};
pub use reconcile::{apply, MessageEvent};
pub use registry::{ChannelEvent, ChannelKey, ChannelRegistry, SubscriptionHandle};
pub use session::{chat_topic, ChatSession, CHAT_SCOPE};
