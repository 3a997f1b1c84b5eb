//! Collaborator boundaries: the CRM and the task extractor.
//!
//! Both are synchronous. The engine never retries a call within a run; a
//! failed call is logged and the next unit of work proceeds.

use crate::error::Result;
use crate::types::{CreatedTask, Order, OrderId, OrderListing, TaskProposal};
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::Cell;
use tracing::info;

pub trait CrmGateway {
    /// The `limit` most recently created orders, newest first.
    fn list_recent_orders(&self, limit: u32) -> Result<Vec<Order>>;

    fn get_order(&self, id: OrderId) -> Result<Order>;

    /// Every order in any of `statuses`; may be truncated at a page cap.
    fn list_orders_by_statuses(&self, statuses: &[String]) -> Result<OrderListing>;

    /// Orders whose planned delivery date is `date`.
    fn list_orders_by_delivery_date(&self, date: NaiveDate) -> Result<Vec<Order>>;

    /// Orders with `method` created within `[from, to]`.
    fn list_orders_by_method_and_date_range(
        &self,
        method: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Order>>;

    /// Create a task and return the CRM-assigned id.
    fn create_task(&self, task: &CreatedTask) -> Result<u64>;

    /// Replace the manager comment of an order.
    fn update_order_comment(&self, id: OrderId, comment: &str) -> Result<()>;
}

/// Opaque text → proposals function.
///
/// Implementations swallow their own network and parse failures and return
/// an empty list instead.
pub trait TaskExtractor {
    fn extract(&self, text: &str, today: NaiveDate) -> Vec<TaskProposal>;
}

// ---------------------------------------------------------------------------
// DryRun
// ---------------------------------------------------------------------------

/// Passes reads through to the wrapped gateway and logs writes instead of
/// sending them. Created tasks get sequential fake ids.
pub struct DryRun<'a, G: CrmGateway + ?Sized> {
    inner: &'a G,
    next_id: Cell<u64>,
}

impl<'a, G: CrmGateway + ?Sized> DryRun<'a, G> {
    pub fn new(inner: &'a G) -> Self {
        Self {
            inner,
            next_id: Cell::new(1),
        }
    }
}

impl<G: CrmGateway + ?Sized> CrmGateway for DryRun<'_, G> {
    fn list_recent_orders(&self, limit: u32) -> Result<Vec<Order>> {
        self.inner.list_recent_orders(limit)
    }

    fn get_order(&self, id: OrderId) -> Result<Order> {
        self.inner.get_order(id)
    }

    fn list_orders_by_statuses(&self, statuses: &[String]) -> Result<OrderListing> {
        self.inner.list_orders_by_statuses(statuses)
    }

    fn list_orders_by_delivery_date(&self, date: NaiveDate) -> Result<Vec<Order>> {
        self.inner.list_orders_by_delivery_date(date)
    }

    fn list_orders_by_method_and_date_range(
        &self,
        method: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Order>> {
        self.inner.list_orders_by_method_and_date_range(method, from, to)
    }

    fn create_task(&self, task: &CreatedTask) -> Result<u64> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        info!(
            order_id = task.order_id,
            performer_id = task.performer_id,
            due = %task.due_string(),
            text = %task.action_text,
            "dry run: task not sent"
        );
        Ok(id)
    }

    fn update_order_comment(&self, id: OrderId, comment: &str) -> Result<()> {
        info!(order_id = id, comment = %comment, "dry run: comment not updated");
        Ok(())
    }
}
