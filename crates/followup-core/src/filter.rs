use crate::config::FilterConfig;
use crate::types::Order;
use std::collections::HashSet;
use std::fmt;

/// Why an order was or was not selected for automated processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    ExcludedMethod(String),
    StatusNotAllowed(String),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eligibility::Eligible => write!(f, "eligible"),
            Eligibility::ExcludedMethod(m) => write!(f, "method '{m}' is excluded"),
            Eligibility::StatusNotAllowed(s) => write!(f, "status '{s}' is not allowed"),
        }
    }
}

/// Static allow/deny lists applied to every order of the main pass.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    allowed_statuses: HashSet<String>,
    excluded_methods: HashSet<String>,
}

impl OrderFilter {
    pub fn new(cfg: &FilterConfig) -> Self {
        Self {
            allowed_statuses: cfg.allowed_statuses.iter().cloned().collect(),
            excluded_methods: cfg.excluded_methods.iter().cloned().collect(),
        }
    }

    /// The method exclusion is checked first.
    pub fn check(&self, order: &Order) -> Eligibility {
        if self.excluded_methods.contains(&order.fulfillment_method) {
            return Eligibility::ExcludedMethod(order.fulfillment_method.clone());
        }
        if !self.allowed_statuses.contains(&order.status) {
            return Eligibility::StatusNotAllowed(order.status.clone());
        }
        Eligibility::Eligible
    }

    pub fn is_eligible(&self, order: &Order) -> bool {
        self.check(order).is_eligible()
    }
}
