//! Evening check for orders due for delivery today that never left.

use crate::config::DeliveryConfig;
use crate::gateway::CrmGateway;
use crate::ledger::ProcessingLedger;
use crate::run::RegulationReport;
use crate::time_rules::TimeRules;
use crate::types::{CreatedTask, Order};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

/// `true` when the order ships with a tracked delivery code but its status
/// shows it was never handed over.
pub fn is_undelivered(order: &Order, cfg: &DeliveryConfig) -> bool {
    let Some(code) = order.delivery_code.as_deref() else {
        return false;
    };
    cfg.undelivered_codes.iter().any(|c| c == code)
        && !cfg.delivered_statuses.iter().any(|s| s == &order.status)
}

pub fn run_delivery(
    ledger: &mut ProcessingLedger,
    cfg: &DeliveryConfig,
    crm: &dyn CrmGateway,
    rules: &TimeRules,
    now: NaiveDateTime,
) -> RegulationReport {
    let mut report = RegulationReport::default();
    let today = now.date();

    let orders = match crm.list_orders_by_delivery_date(today) {
        Ok(orders) => orders,
        Err(e) => {
            warn!(date = %today, error = %e, "delivery: could not fetch orders");
            report.failures += 1;
            return report;
        }
    };
    debug!(count = orders.len(), date = %today, "delivery: orders due today");

    let due = rules.next_opening(now);
    for order in orders.iter().filter(|o| is_undelivered(o, cfg)) {
        if ledger.delivery_flagged_on(order.id, today) {
            report.skipped += 1;
            continue;
        }
        let code = order.delivery_code.clone().unwrap_or_default();
        let (text, note) = cfg
            .task
            .render(&[("code", &code), ("status", &order.status)]);
        let Some(task) = CreatedTask::for_order(order, text, note, due) else {
            info!(order_id = order.id, "delivery: no manager, task skipped");
            report.skipped += 1;
            continue;
        };
        match crm.create_task(&task) {
            Ok(task_id) => {
                info!(order_id = order.id, code = %code, status = %order.status, task_id, "delivery: task created");
                ledger.flag_delivery(order.id, today);
                report.tasks_created += 1;
            }
            Err(e) => {
                warn!(order_id = order.id, error = %e, "delivery: task failed");
                report.failures += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusinessHours;
    use crate::testing::FakeCrm;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 5).unwrap()
    }

    fn evening() -> NaiveDateTime {
        today().and_hms_opt(21, 0, 0).unwrap()
    }

    fn rules() -> TimeRules {
        TimeRules::new(&BusinessHours::default()).unwrap()
    }

    #[test]
    fn undelivered_needs_tracked_code_and_open_status() {
        let cfg = DeliveryConfig::default();
        let stuck = Order::new(1, "oplacheno").with_delivery("self-delivery", today());
        let shipped = Order::new(2, "dostavlen").with_delivery("self-delivery", today());
        let courier = Order::new(3, "oplacheno").with_delivery("courier", today());
        assert!(is_undelivered(&stuck, &cfg));
        assert!(!is_undelivered(&shipped, &cfg));
        assert!(!is_undelivered(&courier, &cfg));
        assert!(!is_undelivered(&Order::new(4, "oplacheno"), &cfg));
    }

    #[test]
    fn stuck_order_gets_one_task_per_day() {
        let crm = FakeCrm::with_orders(vec![Order::new(1, "oplacheno")
            .with_manager(2)
            .with_delivery("storonniaia-dostavka", today())]);
        let mut ledger = ProcessingLedger::default();
        let cfg = DeliveryConfig::default();

        let first = run_delivery(&mut ledger, &cfg, &crm, &rules(), evening());
        let second = run_delivery(&mut ledger, &cfg, &crm, &rules(), evening());

        assert_eq!(first.tasks_created, 1);
        assert_eq!(second.tasks_created, 0);
        let tasks = crm.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].action_text, "Актуализировать дату доставки");
        assert!(tasks[0].note.contains("storonniaia-dostavka"));
        assert!(tasks[0].note.contains("oplacheno"));
        assert_eq!(
            tasks[0].due,
            NaiveDate::from_ymd_opt(2025, 9, 6).unwrap().and_hms_opt(10, 0, 0).unwrap()
        );
    }

    #[test]
    fn other_days_are_ignored() {
        let tomorrow = today().succ_opt().unwrap();
        let crm = FakeCrm::with_orders(vec![Order::new(1, "oplacheno")
            .with_manager(2)
            .with_delivery("self-delivery", tomorrow)]);
        let mut ledger = ProcessingLedger::default();

        run_delivery(&mut ledger, &DeliveryConfig::default(), &crm, &rules(), evening());
        assert!(crm.tasks().is_empty());
    }
}
