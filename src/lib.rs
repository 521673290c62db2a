//! Client-side usage quota tracking for TrimToolsHub.
//!
//! TrimToolsHub nudges heavy free-tier users toward the paid plan by
//! counting tool operations against a rolling quota. This crate is that
//! counter: per-key usage records (one `overall`, one per tool) persisted
//! in a host-provided key-value store, a dual quota gate, lazy window
//! resets, and the derived views (remaining, percentage, reset countdown)
//! the banner UI renders.
//!
//! The store and the clock are injected, so hosts pick their durability
//! (`FileStore` on desktop, `MemoryStore` otherwise) and tests drive time
//! with `ManualClock`:
//!
//! ```
//! use trimtools_usage::{ManualClock, MemoryStore, UsageTracker};
//!
//! let tracker = UsageTracker::new(MemoryStore::new(), ManualClock::new(0));
//! assert!(tracker.record("qr-code-generator", "scan"));
//!
//! let summary = tracker.query(Some("qr-code-generator"));
//! assert_eq!(summary.count, 1);
//! assert_eq!(summary.remaining, 9);
//! ```

pub mod clock;
pub mod record;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{OperationEntry, UsageRecord};
pub use store::{FileStore, MemoryStore, UsageStore};
pub use tracker::{format_reset, TrackerConfig, UsageKey, UsageSummary, UsageTracker};
