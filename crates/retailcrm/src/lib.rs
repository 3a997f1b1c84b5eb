//! `retailcrm`: blocking RetailCRM v5 client for the follow-up engine.
//!
//! Implements [`followup_core::gateway::CrmGateway`] over the REST API:
//!
//! ```text
//! GET  /api/v5/orders               listings, filter[...] query params, paginated
//! POST /api/v5/tasks/create         form field task=<json>
//! POST /api/v5/orders/{id}/edit     form fields order=<json>, by=id
//! ```
//!
//! `apiKey` and `site` ride on every request as query parameters. A
//! transport error, a non-2xx status or `"success": false` becomes a
//! [`CrmError`], which crosses the gateway boundary as
//! [`followup_core::FollowupError::Gateway`].

pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{CrmSettings, RetailCrmClient};
pub use error::CrmError;
