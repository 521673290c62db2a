//! Stored usage record types and their JSON wire shape.
//!
//! Each tracked key persists one `UsageRecord` as a JSON string:
//! `{"count": 3, "resetTime": 1756200000000, "operations": [...]}`.
//! Timestamps are Unix epoch milliseconds, which keeps storage
//! timezone-independent and makes countdown math a plain subtraction.

use serde::{Deserialize, Serialize};

/// One recorded operation, kept in a record's bounded history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEntry {
    /// Tool identifier the operation was recorded against (e.g. "qr-code-generator").
    pub tool: String,
    /// Operation name within the tool (e.g. "scan", "generate").
    pub operation: String,
    /// When the operation was recorded, epoch milliseconds.
    pub timestamp: i64,
}

/// Usage counter for a single key within one rolling window.
///
/// `count` and `operations` are capped independently: `count` is bounded by
/// the quota gate in the tracker, while `operations` is truncated to the
/// quota limit on every append, so a record inherited from older stored
/// state can hold fewer history entries than its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Operations recorded in the current window.
    pub count: u32,
    /// Absolute instant the window expires, epoch milliseconds.
    pub reset_time: i64,
    /// Most recent operations, oldest first.
    pub operations: Vec<OperationEntry>,
}

impl UsageRecord {
    /// Creates an empty record for a window starting now.
    pub fn fresh(now_millis: i64, window_millis: i64) -> Self {
        Self {
            count: 0,
            reset_time: now_millis.saturating_add(window_millis),
            operations: Vec::new(),
        }
    }

    /// Returns true once the window has expired.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.reset_time
    }

    /// Appends an operation and truncates the history to the most recent
    /// `cap` entries, dropping the oldest first.
    pub fn log_operation(&mut self, entry: OperationEntry, cap: usize) {
        self.operations.push(entry);
        let excess = self.operations.len().saturating_sub(cap);
        if excess > 0 {
            self.operations.drain(..excess);
        }
    }

    /// Decodes a stored record, returning `None` for anything that does not
    /// match the expected shape (invalid JSON, missing fields, negative or
    /// non-integer counts). Malformed state is discarded by the caller, it
    /// never surfaces as an error.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Encodes the record for storage.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tool: &str, operation: &str, timestamp: i64) -> OperationEntry {
        OperationEntry {
            tool: tool.to_string(),
            operation: operation.to_string(),
            timestamp,
        }
    }

    #[test]
    fn test_fresh_record_shape() {
        let record = UsageRecord::fresh(1_000, 86_400_000);
        assert_eq!(record.count, 0);
        assert_eq!(record.reset_time, 86_401_000);
        assert!(record.operations.is_empty());
    }

    #[test]
    fn test_expiry_boundary() {
        let record = UsageRecord::fresh(1_000, 500);
        assert!(!record.is_expired(1_499));
        assert!(record.is_expired(1_500));
        assert!(record.is_expired(2_000));
    }

    #[test]
    fn test_log_operation_caps_history_oldest_first() {
        let mut record = UsageRecord::fresh(0, 1_000);
        for i in 0..5 {
            record.log_operation(entry("word-counter", "count", i), 3);
        }
        assert_eq!(record.operations.len(), 3);
        let timestamps: Vec<i64> = record.operations.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
    }

    #[test]
    fn test_decode_wire_shape() {
        let raw = r#"{
            "count": 2,
            "resetTime": 1756200000000,
            "operations": [
                {"tool": "qr-code-generator", "operation": "scan", "timestamp": 1756113600000}
            ]
        }"#;
        let record = UsageRecord::decode(raw).unwrap();
        assert_eq!(record.count, 2);
        assert_eq!(record.reset_time, 1_756_200_000_000);
        assert_eq!(record.operations.len(), 1);
        assert_eq!(record.operations[0].tool, "qr-code-generator");
        assert_eq!(record.operations[0].operation, "scan");
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(UsageRecord::decode("").is_none());
        assert!(UsageRecord::decode("not json").is_none());
        assert!(UsageRecord::decode("[]").is_none());
        // Missing fields
        assert!(UsageRecord::decode(r#"{"count": 1}"#).is_none());
        // Negative count violates the non-negative invariant
        assert!(
            UsageRecord::decode(r#"{"count": -1, "resetTime": 0, "operations": []}"#).is_none()
        );
        // Wrong types
        assert!(
            UsageRecord::decode(r#"{"count": "3", "resetTime": 0, "operations": []}"#).is_none()
        );
    }

    #[test]
    fn test_encode_uses_camel_case_reset_time() {
        let record = UsageRecord::fresh(1_000, 500);
        let value: serde_json::Value = serde_json::from_str(&record.encode()).unwrap();
        assert!(value.get("resetTime").is_some());
        assert!(value.get("count").is_some());
        assert!(value.get("operations").is_some());
        assert!(value.get("reset_time").is_none());
    }

    #[test]
    fn test_encode_decode_preserves_operations() {
        let mut record = UsageRecord::fresh(0, 1_000);
        record.count = 1;
        record.log_operation(entry("json-converter", "convert", 42), 10);
        let decoded = UsageRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
    }
}
