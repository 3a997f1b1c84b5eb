//! RetailCRM v5 wire shapes. Only the fields the engine reads are modelled.

use chrono::{NaiveDate, NaiveDateTime};
use followup_core::types::{CreatedTask, Order, DUE_FORMAT};
use serde::{Deserialize, Serialize};

/// Envelope shared by every response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl ApiStatus {
    pub fn message(&self) -> String {
        let mut msg = self
            .error_msg
            .clone()
            .unwrap_or_else(|| "success is false".to_string());
        match &self.errors {
            Some(serde_json::Value::Object(map)) => {
                for (k, v) in map {
                    msg.push_str(&format!("; {k}: {}", v.as_str().unwrap_or(&v.to_string())));
                }
            }
            Some(serde_json::Value::Array(items)) => {
                for v in items {
                    msg.push_str(&format!("; {}", v.as_str().unwrap_or(&v.to_string())));
                }
            }
            _ => {}
        }
        msg
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_page_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrdersResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub orders: Vec<WireOrder>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrder {
    pub id: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub order_method: Option<String>,
    #[serde(default)]
    pub manager_id: Option<u64>,
    #[serde(default)]
    pub manager_comment: Option<String>,
    #[serde(default)]
    pub delivery: Option<WireDelivery>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDelivery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub data: Option<WireDeliveryData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDeliveryData {
    #[serde(default)]
    pub status: Option<String>,
}

impl WireOrder {
    pub fn into_order(self) -> Order {
        let delivery = self.delivery.unwrap_or_default();
        Order {
            id: self.id,
            status: self.status,
            fulfillment_method: self.order_method.unwrap_or_default(),
            manager_id: self.manager_id,
            manager_comment: self.manager_comment.unwrap_or_default(),
            delivery_code: delivery.code,
            delivery_status: delivery.data.and_then(|d| d.status),
            delivery_date: delivery
                .date
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            created_at: self
                .created_at
                .and_then(|t| NaiveDateTime::parse_from_str(&t, "%Y-%m-%d %H:%M:%S").ok()),
        }
    }
}

/// Body of the `task` form field of `tasks/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub text: String,
    pub commentary: String,
    pub datetime: String,
    pub performer_id: u64,
    pub order: OrderRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRef {
    pub id: u64,
}

impl From<&CreatedTask> for TaskPayload {
    fn from(task: &CreatedTask) -> Self {
        Self {
            text: task.action_text.clone(),
            commentary: task.note.clone(),
            datetime: task.due.format(DUE_FORMAT).to_string(),
            performer_id: task.performer_id,
            order: OrderRef { id: task.order_id },
        }
    }
}

/// Body of the `order` form field of `orders/{id}/edit`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch<'a> {
    pub id: u64,
    pub manager_comment: &'a str,
}
