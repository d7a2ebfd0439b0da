//! Time-windowed caching for backend row fetches.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Holds one contiguous window of timestamped rows per data source
//! - Answers a date-range lookup from the window only when the rows actually
//!   observed span the requested range
//! - Replaces the window wholesale on every miss (no merging of windows)
//! - Expires entries after a fixed TTL

pub mod clock;
mod layer;
pub mod range;
mod storage;
mod traits;

pub use layer::{ListCache, RangeCache, DEFAULT_TTL_SECS};
pub use range::{DateRange, RangeError};
pub use storage::{CacheEntry, EntryStorage, MemoryStorage, NoopStorage};
pub use traits::{CacheResult, CacheSource, StatsSnapshot, Timestamped};
