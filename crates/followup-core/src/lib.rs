//! Follow-up engine for CRM orders.
//!
//! Each scheduled run polls the CRM, turns fresh manager-comment lines into
//! dated tasks through a [`gateway::TaskExtractor`], and applies the standing
//! regulations: status aging, the missed-call cadence and the evening
//! delivery check. Idempotency across runs comes from the
//! [`ledger::ProcessingLedger`] and the tracker files under `.followup/`;
//! comment markers mirror the ledger for the people reading the CRM.
//!
//! All times are naive local date-times in the configured timezone.

pub mod aging;
pub mod cadence;
pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod io;
pub mod ledger;
pub mod marker;
pub mod paths;
pub mod run;
pub mod scheduler;
pub mod time_rules;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{FollowupError, Result};
