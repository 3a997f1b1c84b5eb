//! Explicit per-order processing record, persisted in `.followup/ledger.json`.
//!
//! The ledger is the source of truth for "already handled". Comment markers
//! written into the CRM are a projection of it for the operators.

use crate::error::Result;
use crate::io;
use crate::paths;
use crate::types::OrderId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Clean,
    /// A "fill in the comment" task was issued.
    CommentRequested,
    /// A generic "schedule the next touch" task was issued.
    FollowUpRequested,
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderState::Clean => "clean",
            OrderState::CommentRequested => "comment_requested",
            OrderState::FollowUpRequested => "follow_up_requested",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub state: OrderState,
    /// Hashes of comment lines already turned into a task.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub handled: BTreeSet<String>,
    /// The state marker for `state` made it into the CRM comment.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub marker_written: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_flagged_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessingLedger {
    orders: BTreeMap<OrderId, OrderRecord>,
}

impl ProcessingLedger {
    pub fn load(root: &Path) -> Result<Self> {
        io::read_json_or_default(&paths::ledger_path(root))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_json(&paths::ledger_path(root), self)
    }

    pub fn get(&self, id: OrderId) -> Option<&OrderRecord> {
        self.orders.get(&id)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    pub fn state(&self, id: OrderId) -> OrderState {
        self.orders.get(&id).map(|r| r.state).unwrap_or_default()
    }

    pub fn is_handled(&self, id: OrderId, hash: &str) -> bool {
        self.orders
            .get(&id)
            .is_some_and(|r| r.handled.contains(hash))
    }

    /// Move to `state`. The marker flag is cleared; see [`Self::note_marker_written`].
    pub fn set_state(&mut self, id: OrderId, state: OrderState, today: NaiveDate) {
        let record = self.entry(id, today);
        record.state = state;
        record.marker_written = false;
    }

    pub fn note_marker_written(&mut self, id: OrderId) {
        if let Some(record) = self.orders.get_mut(&id) {
            record.marker_written = true;
        }
    }

    pub fn marker_written(&self, id: OrderId) -> bool {
        self.orders.get(&id).is_some_and(|r| r.marker_written)
    }

    pub fn record_handled(&mut self, id: OrderId, hash: String, today: NaiveDate) {
        let record = self.entry(id, today);
        record.handled.insert(hash);
    }

    pub fn delivery_flagged_on(&self, id: OrderId, day: NaiveDate) -> bool {
        self.orders
            .get(&id)
            .and_then(|r| r.delivery_flagged_on)
            .is_some_and(|d| d >= day)
    }

    pub fn flag_delivery(&mut self, id: OrderId, today: NaiveDate) {
        let record = self.entry(id, today);
        record.delivery_flagged_on = Some(today);
    }

    /// Drop records not updated within `retention_days` of `today`.
    /// Returns how many were dropped.
    pub fn prune(&mut self, today: NaiveDate, retention_days: i64) -> usize {
        let before = self.orders.len();
        self.orders.retain(|_, r| {
            r.updated_on
                .is_some_and(|d| (today - d).num_days() <= retention_days)
        });
        before - self.orders.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderId, &OrderRecord)> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn entry(&mut self, id: OrderId, today: NaiveDate) -> &mut OrderRecord {
        let record = self.orders.entry(id).or_default();
        record.updated_on = Some(today);
        record
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    #[test]
    fn unknown_order_is_clean() {
        let ledger = ProcessingLedger::default();
        assert_eq!(ledger.state(42), OrderState::Clean);
        assert!(!ledger.is_handled(42, "abc"));
        assert!(!ledger.contains(42));
    }

    #[test]
    fn state_and_hashes_persist() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ProcessingLedger::default();
        ledger.set_state(7, OrderState::FollowUpRequested, day(5));
        ledger.record_handled(7, "deadbeef".into(), day(5));
        ledger.flag_delivery(9, day(5));
        ledger.save(dir.path()).unwrap();

        let loaded = ProcessingLedger::load(dir.path()).unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(loaded.state(7), OrderState::FollowUpRequested);
        assert!(loaded.is_handled(7, "deadbeef"));
        assert!(loaded.delivery_flagged_on(9, day(5)));
        assert!(!loaded.delivery_flagged_on(9, day(6)));
    }

    #[test]
    fn file_uses_order_ids_as_keys() {
        let mut ledger = ProcessingLedger::default();
        ledger.set_state(24420, OrderState::CommentRequested, day(5));
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["24420"]["state"], "comment_requested");
        assert_eq!(json["24420"]["updatedOn"], "2025-09-05");
    }

    #[test]
    fn prune_drops_stale_records_only() {
        let mut ledger = ProcessingLedger::default();
        ledger.set_state(1, OrderState::FollowUpRequested, day(1));
        ledger.record_handled(2, "cafe".into(), day(10));
        ledger.flag_delivery(3, day(11));

        assert_eq!(ledger.prune(day(11), 9), 1);
        assert!(!ledger.contains(1));
        assert!(ledger.is_handled(2, "cafe"));
        assert!(ledger.contains(3));
        assert_eq!(ledger.prune(day(11), 9), 0);
    }

    #[test]
    fn marker_flag_follows_state_changes() {
        let mut ledger = ProcessingLedger::default();
        ledger.note_marker_written(5);
        assert!(!ledger.contains(5));

        ledger.set_state(5, OrderState::CommentRequested, day(5));
        assert!(!ledger.marker_written(5));
        ledger.note_marker_written(5);
        assert!(ledger.marker_written(5));
        ledger.set_state(5, OrderState::Clean, day(6));
        assert!(!ledger.marker_written(5));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ProcessingLedger::load(dir.path()).unwrap().is_empty());
    }
}
