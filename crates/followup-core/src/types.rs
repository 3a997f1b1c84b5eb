use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Wire format for due date-times, in the configured civil timezone.
pub const DUE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub type OrderId = u64;
pub type ManagerId = u64;

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A CRM sales order, as far as this engine cares about it.
///
/// Owned by the CRM. The engine only ever rewrites `manager_comment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub fulfillment_method: String,
    #[serde(default)]
    pub manager_id: Option<ManagerId>,
    #[serde(default)]
    pub manager_comment: String,
    #[serde(default)]
    pub delivery_code: Option<String>,
    #[serde(default)]
    pub delivery_status: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Order {
    pub fn new(id: OrderId, status: impl Into<String>) -> Self {
        Self {
            id,
            status: status.into(),
            fulfillment_method: String::new(),
            manager_id: None,
            manager_comment: String::new(),
            delivery_code: None,
            delivery_status: None,
            delivery_date: None,
            created_at: None,
        }
    }

    pub fn with_manager(mut self, manager_id: ManagerId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.fulfillment_method = method.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.manager_comment = comment.into();
        self
    }

    pub fn with_delivery(mut self, code: impl Into<String>, date: NaiveDate) -> Self {
        self.delivery_code = Some(code.into());
        self.delivery_date = Some(date);
        self
    }

    pub fn created(mut self, at: NaiveDateTime) -> Self {
        self.created_at = Some(at);
        self
    }
}

// ---------------------------------------------------------------------------
// TaskProposal
// ---------------------------------------------------------------------------

/// A follow-up suggested by the extractor. Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProposal {
    pub action_text: String,
    #[serde(default)]
    pub note: String,
    /// Raw `YYYY-MM-DD HH:MM`, not yet corrected.
    pub due: String,
    /// The comment line the proposal was derived from.
    #[serde(default)]
    pub source_line: Option<String>,
}

impl TaskProposal {
    pub fn new(action_text: impl Into<String>, due: impl Into<String>) -> Self {
        Self {
            action_text: action_text.into(),
            note: String::new(),
            due: due.into(),
            source_line: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_source_line(mut self, line: impl Into<String>) -> Self {
        self.source_line = Some(line.into());
        self
    }

    /// Both the action text and the due date must be non-blank.
    pub fn is_well_formed(&self) -> bool {
        !self.action_text.trim().is_empty() && !self.due.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// OrderListing
// ---------------------------------------------------------------------------

/// A multi-page listing. `truncated` is set when paging stopped at the
/// client's page cap, so absent orders may still exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderListing {
    pub orders: Vec<Order>,
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// CreatedTask
// ---------------------------------------------------------------------------

/// A task sent to the CRM. Never retried within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub action_text: String,
    pub note: String,
    pub due: NaiveDateTime,
    pub performer_id: ManagerId,
    pub order_id: OrderId,
}

impl CreatedTask {
    /// A task owned by the order's manager; `None` when the order has none.
    pub fn for_order(
        order: &Order,
        action_text: impl Into<String>,
        note: impl Into<String>,
        due: NaiveDateTime,
    ) -> Option<Self> {
        Some(Self {
            action_text: action_text.into(),
            note: note.into(),
            due,
            performer_id: order.manager_id?,
            order_id: order.id,
        })
    }

    pub fn due_string(&self) -> String {
        self.due.format(DUE_FORMAT).to_string()
    }
}
