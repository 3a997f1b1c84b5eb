//! In-memory collaborators for engine tests.

use crate::error::{FollowupError, Result};
use crate::gateway::{CrmGateway, TaskExtractor};
use crate::types::{CreatedTask, Order, OrderId, OrderListing, TaskProposal};
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Default)]
pub struct FakeCrm {
    orders: RefCell<BTreeMap<OrderId, Order>>,
    tasks: RefCell<Vec<CreatedTask>>,
    pub fail_lists: Cell<bool>,
    pub fail_tasks: Cell<bool>,
    pub fail_updates: Cell<bool>,
    /// Cut status listings to this many orders and flag them truncated.
    pub status_page_cap: Cell<Option<usize>>,
}

impl FakeCrm {
    pub fn with_orders(orders: Vec<Order>) -> Self {
        let crm = Self::default();
        for o in orders {
            crm.put(o);
        }
        crm
    }

    pub fn put(&self, order: Order) {
        self.orders.borrow_mut().insert(order.id, order);
    }

    pub fn set_status(&self, id: OrderId, status: &str) {
        if let Some(o) = self.orders.borrow_mut().get_mut(&id) {
            o.status = status.to_string();
        }
    }

    pub fn tasks(&self) -> Vec<CreatedTask> {
        self.tasks.borrow().clone()
    }

    pub fn comment(&self, id: OrderId) -> String {
        self.orders
            .borrow()
            .get(&id)
            .map(|o| o.manager_comment.clone())
            .unwrap_or_default()
    }

    fn listing(&self, pred: impl Fn(&Order) -> bool) -> Result<Vec<Order>> {
        if self.fail_lists.get() {
            return Err(FollowupError::Gateway("listing unavailable".into()));
        }
        Ok(self
            .orders
            .borrow()
            .values()
            .filter(|o| pred(o))
            .cloned()
            .collect())
    }
}

impl CrmGateway for FakeCrm {
    fn list_recent_orders(&self, limit: u32) -> Result<Vec<Order>> {
        let mut orders = self.listing(|_| true)?;
        orders.reverse();
        orders.truncate(limit as usize);
        Ok(orders)
    }

    fn get_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(FollowupError::OrderNotFound(id))
    }

    fn list_orders_by_statuses(&self, statuses: &[String]) -> Result<OrderListing> {
        let mut orders = self.listing(|o| statuses.contains(&o.status))?;
        let truncated = match self.status_page_cap.get() {
            Some(cap) if orders.len() > cap => {
                orders.truncate(cap);
                true
            }
            _ => false,
        };
        Ok(OrderListing { orders, truncated })
    }

    fn list_orders_by_delivery_date(&self, date: NaiveDate) -> Result<Vec<Order>> {
        self.listing(|o| o.delivery_date == Some(date))
    }

    fn list_orders_by_method_and_date_range(
        &self,
        method: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Order>> {
        self.listing(|o| {
            o.fulfillment_method == method
                && o.created_at.is_some_and(|at| at >= from && at <= to)
        })
    }

    fn create_task(&self, task: &CreatedTask) -> Result<u64> {
        if self.fail_tasks.get() {
            return Err(FollowupError::Gateway("tasks/create failed".into()));
        }
        let mut tasks = self.tasks.borrow_mut();
        tasks.push(task.clone());
        Ok(1000 + tasks.len() as u64)
    }

    fn update_order_comment(&self, id: OrderId, comment: &str) -> Result<()> {
        if self.fail_updates.get() {
            return Err(FollowupError::Gateway("orders/edit failed".into()));
        }
        match self.orders.borrow_mut().get_mut(&id) {
            Some(o) => {
                o.manager_comment = comment.to_string();
                Ok(())
            }
            None => Err(FollowupError::OrderNotFound(id)),
        }
    }
}

/// Returns the same canned proposals for every call and records the inputs.
#[derive(Default)]
pub struct FakeExtractor {
    proposals: Vec<TaskProposal>,
    calls: RefCell<Vec<String>>,
}

impl FakeExtractor {
    pub fn returning(proposals: Vec<TaskProposal>) -> Self {
        Self {
            proposals,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl TaskExtractor for FakeExtractor {
    fn extract(&self, text: &str, _today: NaiveDate) -> Vec<TaskProposal> {
        self.calls.borrow_mut().push(text.to_string());
        self.proposals.clone()
    }
}
