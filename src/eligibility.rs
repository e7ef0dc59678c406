//! Simulated benefits-scheme eligibility.
//!
//! The rule is local and income-based only; there is no registry lookup.

use serde::{Deserialize, Serialize};

pub const DEFAULT_INCOME_THRESHOLD: f64 = 500_000.0;
pub const DEFAULT_COVERAGE_AMOUNT: f64 = 500_000.0;

/// Tunable policy values, loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    /// Highest annual income that still qualifies (inclusive).
    pub income_threshold: f64,
    /// Coverage granted to a newly issued card.
    pub default_coverage: f64,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            income_threshold: DEFAULT_INCOME_THRESHOLD,
            default_coverage: DEFAULT_COVERAGE_AMOUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: String,
}

impl EligibilityPolicy {
    pub fn evaluate(&self, annual_income: f64) -> Eligibility {
        if annual_income <= self.income_threshold {
            Eligibility {
                eligible: true,
                reason: "Eligible for benefits".to_string(),
            }
        } else {
            Eligibility {
                eligible: false,
                reason: format!(
                    "Annual income exceeds the eligibility threshold of {}",
                    self.income_threshold
                ),
            }
        }
    }
}
