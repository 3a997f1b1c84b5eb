//! Missed-call cadence: a fixed N-day retry sequence per order, one task per
//! calendar day at most.

use crate::config::CadenceConfig;
use crate::error::{FollowupError, Result};
use crate::gateway::CrmGateway;
use crate::io;
use crate::paths;
use crate::run::RegulationReport;
use crate::time_rules::TimeRules;
use crate::types::{CreatedTask, Order, OrderId};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadenceEntry {
    /// Number of cadence tasks issued so far.
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CadenceTracker {
    entries: BTreeMap<OrderId, CadenceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceStep {
    /// Status left the eligible set.
    EvictIneligible,
    /// All tasks were issued. The entry stays while discovery can still
    /// return the order, so the sequence never restarts.
    Complete,
    /// A task was already issued today.
    Pause,
    Issue { day: u32 },
}

/// Next step for one order. Pure.
pub fn decide(
    entry: Option<&CadenceEntry>,
    status_eligible: bool,
    length: u32,
    today: NaiveDate,
) -> CadenceStep {
    if !status_eligible {
        return CadenceStep::EvictIneligible;
    }
    let entry = entry.copied().unwrap_or_default();
    if entry.day >= length {
        return CadenceStep::Complete;
    }
    if entry.last_action_date.is_some_and(|d| d >= today) {
        return CadenceStep::Pause;
    }
    CadenceStep::Issue { day: entry.day + 1 }
}

impl CadenceTracker {
    pub fn load(root: &Path) -> Result<Self> {
        io::read_json_or_default(&paths::cadence_path(root))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_json(&paths::cadence_path(root), self)
    }

    pub fn get(&self, id: OrderId) -> Option<&CadenceEntry> {
        self.entries.get(&id)
    }

    pub fn insert(&mut self, id: OrderId, entry: CadenceEntry) {
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: OrderId) -> Option<CadenceEntry> {
        self.entries.remove(&id)
    }

    pub fn ids(&self) -> Vec<OrderId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderId, &CadenceEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Candidates {
    orders: BTreeMap<OrderId, Order>,
    /// Ids returned by discovery; `None` when discovery failed.
    discovered: Option<BTreeSet<OrderId>>,
}

impl Candidates {
    /// `true` once discovery ran and no longer returns the order.
    fn out_of_window(&self, id: OrderId) -> bool {
        self.discovered.as_ref().is_some_and(|d| !d.contains(&id))
    }
}

/// Gather candidates: orders discovered by method within the lookback
/// window, plus every order already tracked. Tracked orders the CRM no
/// longer knows are evicted here.
fn candidates(
    tracker: &mut CadenceTracker,
    cfg: &CadenceConfig,
    crm: &dyn CrmGateway,
    now: NaiveDateTime,
    report: &mut RegulationReport,
) -> Candidates {
    let from = (now.date() - Duration::days(cfg.lookback_days)).and_time(NaiveTime::MIN);
    let mut orders: BTreeMap<OrderId, Order> = BTreeMap::new();
    let discovered = match crm.list_orders_by_method_and_date_range(&cfg.method, from, now) {
        Ok(found) => {
            let ids: BTreeSet<OrderId> = found.iter().map(|o| o.id).collect();
            orders.extend(found.into_iter().map(|o| (o.id, o)));
            Some(ids)
        }
        Err(e) => {
            warn!(method = %cfg.method, error = %e, "cadence: discovery failed, continuing with tracked orders");
            report.failures += 1;
            None
        }
    };
    debug!(discovered = orders.len(), tracked = tracker.len(), "cadence: candidates");

    for id in tracker.ids() {
        if orders.contains_key(&id) {
            continue;
        }
        match crm.get_order(id) {
            Ok(order) => {
                orders.insert(id, order);
            }
            Err(FollowupError::OrderNotFound(_)) => {
                info!(order_id = id, "cadence: order no longer exists, evicted");
                tracker.remove(id);
                report.evicted += 1;
            }
            Err(e) => {
                warn!(order_id = id, error = %e, "cadence: could not refresh tracked order");
                report.failures += 1;
            }
        }
    }
    Candidates { orders, discovered }
}

pub fn run_cadence(
    tracker: &mut CadenceTracker,
    cfg: &CadenceConfig,
    crm: &dyn CrmGateway,
    rules: &TimeRules,
    now: NaiveDateTime,
) -> RegulationReport {
    let mut report = RegulationReport::default();
    let today = now.date();
    let due = rules.next_opening(now);
    let length = cfg.length.to_string();

    let found = candidates(tracker, cfg, crm, now, &mut report);
    for (&id, order) in &found.orders {
        let eligible = cfg.eligible_statuses.contains(&order.status);
        match decide(tracker.get(id), eligible, cfg.length, today) {
            CadenceStep::EvictIneligible => {
                if tracker.remove(id).is_some() {
                    debug!(order_id = id, status = %order.status, "cadence: evicted");
                    report.evicted += 1;
                }
            }
            CadenceStep::Complete => {
                if found.out_of_window(id) && tracker.remove(id).is_some() {
                    debug!(order_id = id, "cadence: complete and out of the lookback window, evicted");
                    report.evicted += 1;
                }
            }
            CadenceStep::Pause => {
                debug!(order_id = id, "cadence: already acted today");
                report.skipped += 1;
            }
            CadenceStep::Issue { day } => {
                let day_s = day.to_string();
                let (text, note) = cfg.task.render(&[("day", &day_s), ("length", &length)]);
                let Some(task) = CreatedTask::for_order(order, text, note, due) else {
                    info!(order_id = id, "cadence: no manager, task skipped");
                    report.skipped += 1;
                    continue;
                };
                match crm.create_task(&task) {
                    Ok(task_id) => {
                        info!(order_id = id, day, task_id, "cadence: task created");
                        tracker.insert(
                            id,
                            CadenceEntry {
                                day,
                                last_action_date: Some(today),
                            },
                        );
                        report.tasks_created += 1;
                    }
                    Err(e) => {
                        warn!(order_id = id, day, error = %e, "cadence: task failed");
                        report.failures += 1;
                    }
                }
            }
        }
    }

    report.tracked = tracker.len();
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
