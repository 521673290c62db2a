//! Freemium usage quota tracking.
//!
//! Maintains one rolling usage counter per key: the `overall` counter plus
//! one per tool. An operation is accepted only while both the overall and
//! the tool-specific counter are under the quota. Windows are reset lazily,
//! at the next read or write after expiry; there is no background timer.
//!
//! Every failure of the underlying store degrades to "quota not yet used"
//! on reads and to a silently lost increment on writes. A soft nudge quota
//! must never block a legitimate user over a storage glitch, so nothing in
//! this module returns an error or panics.
//!
//! Hosts running several processes against the same store race on
//! read-modify-write updates; the last writer wins on each key
//! independently. Accepted for a nudge-grade counter.

use crate::clock::Clock;
use crate::record::{OperationEntry, UsageRecord};
use crate::store::UsageStore;
use std::time::Duration;

/// Namespace prefix for storage keys, kept clear of other application state.
const KEY_PREFIX: &str = "trimtools_usage_";

/// Sentinel key tracking total operations across all tools.
const OVERALL_KEY: &str = "overall";

const DEFAULT_QUOTA_LIMIT: u32 = 10;
const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Quota parameters. Defaults: 10 operations per rolling 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Maximum operations per key within one window.
    pub quota_limit: u32,
    /// Length of the rolling window.
    pub window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            quota_limit: DEFAULT_QUOTA_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Identifies one tracked counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UsageKey {
    /// Total operations across all tools.
    Overall,
    /// Operations for a single tool.
    Tool(String),
}

impl UsageKey {
    pub fn tool(id: impl Into<String>) -> Self {
        Self::Tool(id.into())
    }

    /// Key under which this counter is persisted.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Overall => format!("{KEY_PREFIX}{OVERALL_KEY}"),
            Self::Tool(id) => format!("{KEY_PREFIX}{id}"),
        }
    }
}

/// Derived view consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSummary {
    pub count: u32,
    pub remaining: u32,
    pub percentage: f64,
    pub time_until_reset_text: String,
}

/// Per-key rolling usage counters over an injected store and clock.
pub struct UsageTracker<S: UsageStore, C: Clock> {
    store: S,
    clock: C,
    config: TrackerConfig,
}

impl<S: UsageStore, C: Clock> UsageTracker<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self::with_config(store, clock, TrackerConfig::default())
    }

    pub fn with_config(store: S, clock: C, config: TrackerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns the current record for `key`, repairing expired or malformed
    /// state on the way.
    ///
    /// A missing, expired, or undecodable stored record is replaced by a
    /// fresh one (`count` 0, window ending a full window from now) which is
    /// persisted immediately. An unreadable store yields the same fresh
    /// shape without persisting it.
    pub fn usage(&self, key: &UsageKey) -> UsageRecord {
        let now = self.clock.now_millis();
        let storage_key = key.storage_key();

        let stored = match self.store.get(&storage_key) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Usage store read failed for {}: {:#}", storage_key, e);
                return UsageRecord::fresh(now, self.window_millis());
            }
        };

        if let Some(raw) = stored {
            match UsageRecord::decode(&raw) {
                Some(record) if !record.is_expired(now) => return record,
                Some(_) => {}
                None => {
                    tracing::debug!("Discarding malformed usage record under {}", storage_key);
                }
            }
        }

        let fresh = UsageRecord::fresh(now, self.window_millis());
        self.persist(&storage_key, &fresh);
        fresh
    }

    /// True while both the overall and the tool-specific counter are under
    /// the quota. Pure read.
    pub fn can_record(&self, tool_id: &str) -> bool {
        self.usage(&UsageKey::Overall).count < self.config.quota_limit
            && self.usage(&UsageKey::tool(tool_id)).count < self.config.quota_limit
    }

    /// Records one operation against both the overall and the tool counter.
    ///
    /// Returns `false` without mutating anything when either counter is at
    /// the quota. On acceptance both counters are incremented, the
    /// operation is appended to both histories (truncated to the quota
    /// limit, oldest first), and both records are persisted with the window
    /// end carried over unchanged from the read.
    ///
    /// The two writes are not atomic: if the tool write fails after the
    /// overall write succeeded, the counters diverge until the window
    /// resets. The store has no transactional semantics to offer more.
    pub fn record(&self, tool_id: &str, operation: &str) -> bool {
        let overall_key = UsageKey::Overall;
        let tool_key = UsageKey::tool(tool_id);

        let mut overall = self.usage(&overall_key);
        let mut tool = self.usage(&tool_key);

        let limit = self.config.quota_limit;
        if overall.count >= limit || tool.count >= limit {
            return false;
        }

        let entry = OperationEntry {
            tool: tool_id.to_string(),
            operation: operation.to_string(),
            timestamp: self.clock.now_millis(),
        };

        overall.count += 1;
        overall.log_operation(entry.clone(), limit as usize);
        tool.count += 1;
        tool.log_operation(entry, limit as usize);

        self.persist(&overall_key.storage_key(), &overall);
        self.persist(&tool_key.storage_key(), &tool);
        true
    }

    /// Operations left in the current window for `key`.
    pub fn remaining(&self, key: &UsageKey) -> u32 {
        self.config.quota_limit.saturating_sub(self.usage(key).count)
    }

    /// Percentage of the quota used, not clamped at 100.
    pub fn percentage(&self, key: &UsageKey) -> f64 {
        if self.config.quota_limit == 0 {
            return 100.0;
        }
        f64::from(self.usage(key).count) * 100.0 / f64::from(self.config.quota_limit)
    }

    /// Time until the current window for `key` resets.
    pub fn time_until_reset(&self, key: &UsageKey) -> Duration {
        let record = self.usage(key);
        let now = self.clock.now_millis();
        let diff = record.reset_time.saturating_sub(now);
        Duration::from_millis(u64::try_from(diff).unwrap_or(0))
    }

    /// Presentation-layer view for one key (`None` = the overall counter),
    /// derived from a single consistent read of the record.
    pub fn query(&self, tool_id: Option<&str>) -> UsageSummary {
        let key = match tool_id {
            Some(id) => UsageKey::tool(id),
            None => UsageKey::Overall,
        };
        let record = self.usage(&key);
        let now = self.clock.now_millis();

        let limit = self.config.quota_limit;
        let percentage = if limit == 0 {
            100.0
        } else {
            f64::from(record.count) * 100.0 / f64::from(limit)
        };
        let diff = record.reset_time.saturating_sub(now);
        let until_reset = Duration::from_millis(u64::try_from(diff).unwrap_or(0));

        UsageSummary {
            count: record.count,
            remaining: limit.saturating_sub(record.count),
            percentage,
            time_until_reset_text: format_reset(until_reset),
        }
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX)
    }

    fn persist(&self, storage_key: &str, record: &UsageRecord) {
        if let Err(e) = self.store.set(storage_key, &record.encode()) {
            tracing::warn!("Usage store write failed for {}: {:#}", storage_key, e);
        }
    }
}

/// Formats a reset countdown as "Xh Ym" (minutes-only under an hour), or
/// "Reset now" for a zero duration. Minutes round up so the text never
/// promises a reset that has not happened yet.
pub fn format_reset(until_reset: Duration) -> String {
    let total_secs = until_reset.as_secs();
    if total_secs == 0 && until_reset.subsec_nanos() == 0 {
        return "Reset now".to_string();
    }

    let total_minutes = total_secs.div_ceil(60).max(1);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
#[path = "tests/tracker_tests.rs"]
mod tests;
