//! Adapters for the hosted backend: the row API and the realtime feed.

pub mod client;
pub mod error;
pub mod filter;
pub mod paged;
pub mod realtime;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::{RestClient, RowApi};
pub use error::{FetchError, SubscriptionError};
pub use filter::{Direction, RowQuery};
pub use paged::{PagedFetcher, DEFAULT_PAGE_SIZE};
pub use realtime::{
  ChangeEvent, ChangeFilter, ChangeKind, ChannelSignal, ChannelStatus, RealtimeClient,
  RealtimeTransport, SignalCallback,
};
