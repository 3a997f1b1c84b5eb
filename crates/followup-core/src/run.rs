//! One scheduled run: decide which regulations are due, run them in order,
//! persist the trackers.

use crate::aging::{run_aging, AgingTracker};
use crate::cadence::{run_cadence, CadenceTracker};
use crate::config::Config;
use crate::delivery::run_delivery;
use crate::error::Result;
use crate::gateway::{CrmGateway, TaskExtractor};
use crate::ledger::ProcessingLedger;
use crate::scheduler::{OrderOutcome, TaskScheduler};
use crate::types::{OrderId, DUE_FORMAT};
use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::path::Path;
use tracing::{info, info_span, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegulationReport {
    pub tasks_created: usize,
    pub skipped: usize,
    pub evicted: usize,
    pub failures: usize,
    /// Entries left in the tracker after the pass.
    pub tracked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderResult {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub outcome: OrderOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MainReport {
    pub fetched: usize,
    pub tasks_created: usize,
    pub failures: usize,
    pub orders: Vec<OrderResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub now: String,
    pub plan: RunPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aging: Option<RegulationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence: Option<RegulationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<RegulationReport>,
    pub main: MainReport,
}

impl RunSummary {
    pub fn tasks_created(&self) -> usize {
        [&self.aging, &self.cadence, &self.delivery]
            .into_iter()
            .flatten()
            .map(|r| r.tasks_created)
            .sum::<usize>()
            + self.main.tasks_created
    }
}

// ---------------------------------------------------------------------------
// RunPlan
// ---------------------------------------------------------------------------

/// Which regulations are due at a given wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub aging: bool,
    pub cadence: bool,
    pub delivery: bool,
    pub main: bool,
}

impl RunPlan {
    pub fn for_time(cfg: &Config, now: NaiveDateTime) -> Self {
        let hour = now.hour();
        Self {
            aging: !cfg.aging.rules.is_empty(),
            cadence: cfg.cadence.enabled && cfg.cadence.run_hours.contains(&hour),
            delivery: cfg.delivery.enabled && cfg.delivery.run_hours.contains(&hour),
            main: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Trackers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Trackers {
    pub aging: AgingTracker,
    pub cadence: CadenceTracker,
    pub ledger: ProcessingLedger,
}

impl Trackers {
    pub fn load(root: &Path) -> Result<Self> {
        Ok(Self {
            aging: AgingTracker::load(root)?,
            cadence: CadenceTracker::load(root)?,
            ledger: ProcessingLedger::load(root)?,
        })
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        self.aging.save(root)?;
        self.cadence.save(root)?;
        self.ledger.save(root)
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run every due regulation against in-memory trackers.
///
/// Fails only when the recent-orders batch of the main pass cannot be
/// fetched; the trackers still carry whatever the earlier regulations did.
pub fn execute(
    cfg: &Config,
    crm: &dyn CrmGateway,
    extractor: &dyn TaskExtractor,
    trackers: &mut Trackers,
    now: NaiveDateTime,
    run_id: &str,
) -> Result<RunSummary> {
    let plan = RunPlan::for_time(cfg, now);
    let scheduler = TaskScheduler::new(cfg, crm, extractor)?;
    let rules = scheduler.rules();
    info!(now = %now.format(DUE_FORMAT), ?plan, "run started");

    let mut summary = RunSummary {
        run_id: run_id.to_string(),
        now: now.format(DUE_FORMAT).to_string(),
        plan,
        aging: None,
        cadence: None,
        delivery: None,
        main: MainReport::default(),
    };

    if plan.aging {
        summary.aging = Some(run_aging(&mut trackers.aging, &cfg.aging, crm, rules, now));
    }
    if plan.cadence {
        summary.cadence = Some(run_cadence(
            &mut trackers.cadence,
            &cfg.cadence,
            crm,
            rules,
            now,
        ));
    }
    if plan.delivery {
        summary.delivery = Some(run_delivery(
            &mut trackers.ledger,
            &cfg.delivery,
            crm,
            rules,
            now,
        ));
    }

    let orders = crm.list_recent_orders(cfg.recent_orders)?;
    summary.main.fetched = orders.len();
    for order in &orders {
        let outcome = scheduler.process(order, &mut trackers.ledger, now);
        summary.main.tasks_created += outcome.tasks_created();
        summary.main.failures += outcome.failures();
        summary.main.orders.push(OrderResult {
            order_id: order.id,
            outcome,
        });
    }

    info!(
        fetched = summary.main.fetched,
        tasks_created = summary.tasks_created(),
        "run finished"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Leave tracker files untouched.
    pub dry_run: bool,
}

/// Load trackers from `root`, execute, save trackers, in that order.
///
/// Trackers are saved even when the main pass failed to fetch its batch.
/// Ledger records older than `ledger_retention_days` are pruned first.
pub fn run_once(
    root: &Path,
    cfg: &Config,
    crm: &dyn CrmGateway,
    extractor: &dyn TaskExtractor,
    now: NaiveDateTime,
    opts: RunOptions,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("run", run_id = %run_id);
    let _enter = span.enter();

    let mut trackers = Trackers::load(root)?;
    let result = execute(cfg, crm, extractor, &mut trackers, now, &run_id);

    if opts.dry_run {
        info!("dry run: tracker files not written");
    } else {
        let pruned = trackers.ledger.prune(now.date(), cfg.ledger_retention_days);
        if pruned > 0 {
            info!(
                pruned,
                retention_days = cfg.ledger_retention_days,
                "stale ledger records dropped"
            );
        }
        trackers.save(root)?;
    }
    if let Err(e) = &result {
        warn!(error = %e, "run aborted: recent orders unavailable");
    }
    result
}

/// The main per-order flow for a single order, outside the schedule.
pub fn process_single_order(
    root: &Path,
    cfg: &Config,
    crm: &dyn CrmGateway,
    extractor: &dyn TaskExtractor,
    id: OrderId,
    now: NaiveDateTime,
    opts: RunOptions,
) -> Result<OrderOutcome> {
    let mut ledger = ProcessingLedger::load(root)?;
    let order = crm.get_order(id)?;
    let scheduler = TaskScheduler::new(cfg, crm, extractor)?;
    let outcome = scheduler.process(&order, &mut ledger, now);
    if !opts.dry_run {
        ledger.save(root)?;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::DryRun;
    use crate::paths;
    use crate::testing::{FakeCrm, FakeExtractor};
    use crate::types::{Order, TaskProposal};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn plan_follows_run_hours() {
        let cfg = Config::default();
        let noon = RunPlan::for_time(&cfg, at(5, 12));
        assert!(noon.aging && noon.cadence && !noon.delivery && noon.main);
        let evening = RunPlan::for_time(&cfg, at(5, 21));
        assert!(evening.delivery && !evening.cadence);
        let morning = RunPlan::for_time(&cfg, at(5, 9));
        assert!(!morning.delivery && !morning.cadence);
    }

    #[test]
    fn full_run_persists_all_trackers() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let crm = FakeCrm::with_orders(vec![
            Order::new(1, "ozhidaet-oplaty").with_manager(2).with_comment("call 6 sept"),
            Order::new(2, "new").with_manager(2),
        ]);
        let extractor = FakeExtractor::returning(vec![TaskProposal::new(
            "Call",
            "2025-09-06 12:00",
        )
        .with_source_line("call 6 sept")]);

        let summary = run_once(
            dir.path(),
            &cfg,
            &crm,
            &extractor,
            at(5, 12),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.main.fetched, 2);
        assert_eq!(summary.main.tasks_created, 2);
        assert!(paths::aging_path(dir.path()).exists());
        assert!(paths::cadence_path(dir.path()).exists());
        assert!(paths::ledger_path(dir.path()).exists());

        let trackers = Trackers::load(dir.path()).unwrap();
        assert_eq!(
            trackers.aging.first_seen("ozhidaet-oplaty", 1),
            Some(at(5, 0).date())
        );
    }

    #[test]
    fn failed_primary_fetch_errors_after_saving() {
        let dir = TempDir::new().unwrap();
        let crm = FakeCrm::default();
        crm.fail_lists.set(true);

        let result = run_once(
            dir.path(),
            &Config::default(),
            &crm,
            &FakeExtractor::default(),
            at(5, 12),
            RunOptions::default(),
        );

        assert!(result.is_err());
        assert!(paths::aging_path(dir.path()).exists());
    }

    #[test]
    fn stale_ledger_records_are_pruned_on_save() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ProcessingLedger::default();
        let long_ago = at(1, 0).date() - chrono::Duration::days(120);
        ledger.record_handled(900, "0011223344556677".into(), long_ago);
        ledger.record_handled(901, "8899aabbccddeeff".into(), at(1, 0).date());
        ledger.save(dir.path()).unwrap();

        run_once(
            dir.path(),
            &Config::default(),
            &FakeCrm::default(),
            &FakeExtractor::default(),
            at(5, 12),
            RunOptions::default(),
        )
        .unwrap();

        let ledger = ProcessingLedger::load(dir.path()).unwrap();
        assert!(!ledger.contains(900));
        assert!(ledger.is_handled(901, "8899aabbccddeeff"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let crm = FakeCrm::with_orders(vec![Order::new(1, "new").with_manager(2)]);
        let dry = DryRun::new(&crm);

        let summary = run_once(
            dir.path(),
            &Config::default(),
            &dry,
            &FakeExtractor::default(),
            at(5, 21),
            RunOptions { dry_run: true },
        )
        .unwrap();

        assert_eq!(summary.main.tasks_created, 1);
        assert!(crm.tasks().is_empty());
        assert!(crm.comment(1).is_empty());
        assert!(!paths::ledger_path(dir.path()).exists());
    }

    #[test]
    fn single_order_shares_the_main_flow() {
        let dir = TempDir::new().unwrap();
        let crm = FakeCrm::with_orders(vec![Order::new(77, "new").with_manager(2)]);

        let outcome = process_single_order(
            dir.path(),
            &Config::default(),
            &crm,
            &FakeExtractor::default(),
            77,
            at(5, 21),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome, OrderOutcome::CommentRequested { created: true });
        let ledger = ProcessingLedger::load(dir.path()).unwrap();
        assert!(ledger.contains(77));
    }

    #[test]
    fn unknown_single_order_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = process_single_order(
            dir.path(),
            &Config::default(),
            &FakeCrm::default(),
            &FakeExtractor::default(),
            5,
            at(5, 12),
            RunOptions::default(),
        );
        assert!(result.is_err());
    }
}
