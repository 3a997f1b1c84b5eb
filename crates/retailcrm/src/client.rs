use crate::error::CrmError;
use crate::types::{ApiStatus, CommentPatch, CreateResponse, OrdersResponse, TaskPayload, WireOrder};
use chrono::{NaiveDate, NaiveDateTime};
use followup_core::gateway::CrmGateway;
use followup_core::types::{CreatedTask, Order, OrderId, OrderListing};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, CrmError>;

/// Page sizes the orders endpoint accepts.
const PAGE_SIZES: [u32; 3] = [20, 50, 100];

#[derive(Debug, Clone)]
pub struct CrmSettings {
    pub base_url: String,
    pub api_key: String,
    pub site: Option<String>,
    pub timeout: Duration,
    /// Upper bound on pages followed by a single listing.
    pub max_pages: u32,
}

impl CrmSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            site: None,
            timeout: Duration::from_secs(120),
            max_pages: 20,
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }
}

pub struct RetailCrmClient {
    settings: CrmSettings,
    http: Client,
}

impl RetailCrmClient {
    pub fn new(settings: CrmSettings) -> Result<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(CrmError::Settings("base URL is empty".into()));
        }
        if settings.api_key.trim().is_empty() {
            return Err(CrmError::Settings("API key is empty".into()));
        }
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| CrmError::Http {
                endpoint: "client".into(),
                source,
            })?;
        Ok(Self { settings, http })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/v5/{endpoint}",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn auth_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("apiKey".to_string(), self.settings.api_key.clone())];
        if let Some(site) = &self.settings.site {
            params.push(("site".to_string(), site.clone()));
        }
        params
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(String, String)]) -> Result<T> {
        debug!(endpoint, "GET");
        let resp = self
            .http
            .get(self.url(endpoint))
            .query(&self.auth_params())
            .query(query)
            .send()
            .map_err(|source| CrmError::Http {
                endpoint: endpoint.to_string(),
                source,
            })?;
        decode(endpoint, resp)
    }

    fn post_form<T: DeserializeOwned>(&self, endpoint: &str, form: &[(&str, String)]) -> Result<T> {
        debug!(endpoint, "POST");
        let resp = self
            .http
            .post(self.url(endpoint))
            .query(&self.auth_params())
            .form(form)
            .send()
            .map_err(|source| CrmError::Http {
                endpoint: endpoint.to_string(),
                source,
            })?;
        decode(endpoint, resp)
    }

    fn orders_page(&self, filters: &[(String, String)], limit: u32, page: u32) -> Result<OrdersResponse> {
        let mut query = filters.to_vec();
        query.push(("limit".into(), limit.to_string()));
        query.push(("page".into(), page.to_string()));
        let resp: OrdersResponse = self.get("orders", &query)?;
        ensure_success("orders", &resp.status)?;
        Ok(resp)
    }

    /// Follow `pagination.totalPageCount` up to the configured page cap.
    fn orders_all_pages(&self, filters: &[(String, String)]) -> Result<OrderListing> {
        let mut listing = OrderListing::default();
        let mut page = 1;
        loop {
            let resp = self.orders_page(filters, 100, page)?;
            let total = resp.pagination.map(|p| p.total_page_count).unwrap_or(1);
            listing
                .orders
                .extend(resp.orders.into_iter().map(WireOrder::into_order));
            if page >= total {
                break;
            }
            if page >= self.settings.max_pages {
                warn!(pages = total, cap = self.settings.max_pages, "orders listing truncated");
                listing.truncated = true;
                break;
            }
            page += 1;
        }
        Ok(listing)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().map_err(|source| CrmError::Http {
        endpoint: endpoint.to_string(),
        source,
    })?;
    if !status.is_success() {
        // RetailCRM explains most rejections in a JSON envelope.
        if let Ok(api) = serde_json::from_str::<ApiStatus>(&body) {
            if api.error_msg.is_some() {
                return Err(CrmError::Rejected {
                    endpoint: endpoint.to_string(),
                    message: format!("HTTP {}: {}", status.as_u16(), api.message()),
                });
            }
        }
        return Err(CrmError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| CrmError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn ensure_success(endpoint: &str, status: &ApiStatus) -> Result<()> {
    if status.success {
        Ok(())
    } else {
        Err(CrmError::Rejected {
            endpoint: endpoint.to_string(),
            message: status.message(),
        })
    }
}

fn page_size_for(limit: u32) -> u32 {
    PAGE_SIZES
        .into_iter()
        .find(|s| *s >= limit)
        .unwrap_or(PAGE_SIZES[PAGE_SIZES.len() - 1])
}

fn filter(key: &str, value: impl ToString) -> (String, String) {
    (format!("filter[{key}]"), value.to_string())
}

// ---------------------------------------------------------------------------
// CrmGateway
// ---------------------------------------------------------------------------

impl CrmGateway for RetailCrmClient {
    fn list_recent_orders(&self, limit: u32) -> followup_core::Result<Vec<Order>> {
        let resp = self.orders_page(&[], page_size_for(limit), 1)?;
        Ok(resp
            .orders
            .into_iter()
            .take(limit as usize)
            .map(WireOrder::into_order)
            .collect())
    }

    fn get_order(&self, id: OrderId) -> followup_core::Result<Order> {
        let resp = self.orders_page(&[filter("ids][", id)], 20, 1)?;
        let order = resp
            .orders
            .into_iter()
            .next()
            .ok_or(CrmError::OrderNotFound(id))?;
        Ok(order.into_order())
    }

    fn list_orders_by_statuses(&self, statuses: &[String]) -> followup_core::Result<OrderListing> {
        if statuses.is_empty() {
            return Ok(OrderListing::default());
        }
        let filters: Vec<_> = statuses
            .iter()
            .map(|s| filter("extendedStatus][", s))
            .collect();
        Ok(self.orders_all_pages(&filters)?)
    }

    fn list_orders_by_delivery_date(&self, date: NaiveDate) -> followup_core::Result<Vec<Order>> {
        let day = date.format("%Y-%m-%d");
        let filters = [filter("deliveryDateFrom", &day), filter("deliveryDateTo", &day)];
        Ok(self.orders_all_pages(&filters)?.orders)
    }

    fn list_orders_by_method_and_date_range(
        &self,
        method: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> followup_core::Result<Vec<Order>> {
        let filters = [
            filter("orderMethods][", method),
            filter("createdAtFrom", from.format("%Y-%m-%d")),
            filter("createdAtTo", to.format("%Y-%m-%d")),
        ];
        let listing = self.orders_all_pages(&filters)?;
        Ok(listing
            .orders
            .into_iter()
            .filter(|o| o.created_at.map_or(true, |at| at >= from && at <= to))
            .collect())
    }

    fn create_task(&self, task: &CreatedTask) -> followup_core::Result<u64> {
        let payload = serde_json::to_string(&TaskPayload::from(task))?;
        let resp: CreateResponse = self.post_form("tasks/create", &[("task", payload)])?;
        ensure_success("tasks/create", &resp.status)?;
        Ok(resp.id.unwrap_or_default())
    }

    fn update_order_comment(&self, id: OrderId, comment: &str) -> followup_core::Result<()> {
        let endpoint = format!("orders/{id}/edit");
        let patch = serde_json::to_string(&CommentPatch {
            id,
            manager_comment: comment,
        })?;
        let resp: ApiStatus =
            self.post_form(&endpoint, &[("order", patch), ("by", "id".to_string())])?;
        ensure_success(&endpoint, &resp)?;
        Ok(())
    }
}
