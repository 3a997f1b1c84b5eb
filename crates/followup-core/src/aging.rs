//! Status aging: how long an order has continuously held a tracked status.
//!
//! The CRM exposes no per-status entry timestamp, so the first-seen date
//! recorded here is the only clock. An entry lives while the order's live
//! status equals the tracked code and is evicted the run it changes status
//! or crosses its day limit.

use crate::config::AgingConfig;
use crate::error::Result;
use crate::gateway::CrmGateway;
use crate::io;
use crate::paths;
use crate::run::RegulationReport;
use crate::time_rules::TimeRules;
use crate::types::{CreatedTask, Order, OrderId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgingTracker {
    statuses: BTreeMap<String, BTreeMap<OrderId, NaiveDate>>,
}

/// An order that stayed in `status` longer than the rule allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub status: String,
    pub order_id: OrderId,
    pub first_seen: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub expired: Vec<Expired>,
    pub left_status: usize,
    pub started: usize,
    /// Tracked orders absent from a truncated snapshot, kept as they were.
    pub unlisted: usize,
}

impl AgingTracker {
    pub fn load(root: &Path) -> Result<Self> {
        io::read_json_or_default(&paths::aging_path(root))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_json(&paths::aging_path(root), self)
    }

    pub fn first_seen(&self, status: &str, id: OrderId) -> Option<NaiveDate> {
        self.statuses.get(status)?.get(&id).copied()
    }

    pub fn insert(&mut self, status: &str, id: OrderId, first_seen: NaiveDate) {
        self.statuses
            .entry(status.to_string())
            .or_default()
            .insert(id, first_seen);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<OrderId, NaiveDate>)> {
        self.statuses.iter()
    }

    pub fn len(&self) -> usize {
        self.statuses.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bring the tracker in line with `snapshot`, the live orders currently
    /// in any tracked status.
    ///
    /// Expired orders are evicted here, before any task is attempted. When
    /// `truncated`, an order missing from the snapshot proves nothing and
    /// keeps its first-seen date.
    pub fn reconcile(
        &mut self,
        cfg: &AgingConfig,
        snapshot: &[Order],
        truncated: bool,
        today: NaiveDate,
    ) -> Reconciliation {
        let live: HashMap<OrderId, &str> = snapshot
            .iter()
            .map(|o| (o.id, o.status.as_str()))
            .collect();
        let mut out = Reconciliation::default();

        for rule in &cfg.rules {
            let tracked = self.statuses.entry(rule.status.clone()).or_default();

            tracked.retain(|id, first_seen| {
                let status = live.get(id).copied();
                if status.is_none() && truncated {
                    out.unlisted += 1;
                    return true;
                }
                if status != Some(rule.status.as_str()) {
                    out.left_status += 1;
                    return false;
                }
                let days = (today - *first_seen).num_days();
                if days > rule.max_days {
                    out.expired.push(Expired {
                        status: rule.status.clone(),
                        order_id: *id,
                        first_seen: *first_seen,
                        days,
                    });
                    return false;
                }
                true
            });

            let expired_now: Vec<OrderId> = out
                .expired
                .iter()
                .filter(|e| e.status == rule.status)
                .map(|e| e.order_id)
                .collect();
            for order in snapshot.iter().filter(|o| o.status == rule.status) {
                if expired_now.contains(&order.id) || tracked.contains_key(&order.id) {
                    continue;
                }
                tracked.insert(order.id, today);
                out.started += 1;
            }
        }

        // Statuses dropped from the config no longer age anything.
        self.statuses
            .retain(|status, _| cfg.rules.iter().any(|r| &r.status == status));
        out
    }
}

/// One aging pass: fetch, reconcile, issue a task per expired order.
///
/// A failed fetch leaves the tracker untouched.
pub fn run_aging(
    tracker: &mut AgingTracker,
    cfg: &AgingConfig,
    crm: &dyn CrmGateway,
    rules: &TimeRules,
    now: NaiveDateTime,
) -> RegulationReport {
    let mut report = RegulationReport::default();
    let statuses = cfg.tracked_statuses();
    if statuses.is_empty() {
        return report;
    }

    let listing = match crm.list_orders_by_statuses(&statuses) {
        Ok(listing) => listing,
        Err(e) => {
            warn!(error = %e, "aging: could not fetch orders, tracker left unchanged");
            report.failures += 1;
            return report;
        }
    };

    if listing.truncated {
        warn!(
            fetched = listing.orders.len(),
            "aging: status listing truncated, unlisted orders keep their clock"
        );
    }
    let snapshot = listing.orders;
    let rec = tracker.reconcile(cfg, &snapshot, listing.truncated, now.date());
    report.evicted = rec.left_status + rec.expired.len();
    debug!(
        started = rec.started,
        left_status = rec.left_status,
        unlisted = rec.unlisted,
        expired = rec.expired.len(),
        "aging: reconciled"
    );

    let due = rules.next_opening(now);
    for exp in &rec.expired {
        let Some(rule) = cfg.rules.iter().find(|r| r.status == exp.status) else {
            continue;
        };
        let Some(order) = snapshot.iter().find(|o| o.id == exp.order_id) else {
            continue;
        };
        let days = exp.days.to_string();
        let order_id = order.id.to_string();
        let (text, note) = rule.task.render(&[
            ("status", &exp.status),
            ("days", &days),
            ("order", &order_id),
        ]);

        let Some(task) = CreatedTask::for_order(order, text, note, due) else {
            info!(order_id = order.id, status = %exp.status, "aging: no manager, task skipped");
            report.skipped += 1;
            continue;
        };
        match crm.create_task(&task) {
            Ok(task_id) => {
                info!(
                    order_id = order.id,
                    status = %exp.status,
                    days = exp.days,
                    task_id,
                    "aging: task created"
                );
                report.tasks_created += 1;
            }
            Err(e) => {
                warn!(
                    order_id = order.id,
                    status = %exp.status,
                    first_seen = %exp.first_seen,
                    error = %e,
                    "aging: task failed, entry evicted anyway"
                );
                report.failures += 1;
            }
        }
    }

    report.tracked = tracker.len();
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
