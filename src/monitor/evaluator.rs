//! Threshold evaluation of balance snapshots against the limits table.

use crate::exchange::BalanceSnapshot;
use crate::limits::LimitTable;
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, warn};

/// Which side of the range a balance fell out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Below,
    Above,
}

impl ViolationKind {
    /// Label shown in the alert's "Limit Type" field.
    pub fn limit_label(&self) -> &'static str {
        match self {
            ViolationKind::Below => "Lower",
            ViolationKind::Above => "Upper",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Below => write!(f, "below"),
            ViolationKind::Above => write!(f, "above"),
        }
    }
}

/// A balance outside its configured range.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Lowercased platform identifier
    pub platform: String,
    /// Lowercased currency code
    pub currency: String,
    pub balance: Decimal,
    pub lower: Option<Decimal>,
    pub upper: Option<Decimal>,
    pub kind: ViolationKind,
}

impl Violation {
    /// The bound that was crossed.
    pub fn limit(&self) -> Option<Decimal> {
        match self.kind {
            ViolationKind::Below => self.lower,
            ViolationKind::Above => self.upper,
        }
    }
}

/// Compares each balance against its configured bounds.
///
/// The lower and upper checks are independent: an entry with inverted
/// limits (lower > upper) can yield both a `Below` and an `Above`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdEvaluator;

impl ThresholdEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a snapshot. A failed fetch yields no violations.
    pub fn evaluate(&self, snapshot: &BalanceSnapshot, limits: &LimitTable) -> Vec<Violation> {
        if !snapshot.is_success() {
            warn!(
                status = snapshot.status,
                "Skipping evaluation: balance fetch did not succeed"
            );
            return Vec::new();
        }

        let mut violations = Vec::new();

        for entry in &snapshot.entries {
            let platform = entry.platform.to_lowercase();
            let currency = entry.currency.to_lowercase();
            let bounds = limits.lookup(&platform, &currency);

            let violation = |kind| Violation {
                platform: platform.clone(),
                currency: currency.clone(),
                balance: entry.balance,
                lower: bounds.lower,
                upper: bounds.upper,
                kind,
            };

            if let Some(lower) = bounds.lower {
                if entry.balance < lower {
                    warn!(
                        "Warning: Balance is below for '{}' on {} [Limit: {} {}, Balance: {}]",
                        currency,
                        platform,
                        lower,
                        currency.to_uppercase(),
                        entry.balance
                    );
                    violations.push(violation(ViolationKind::Below));
                }
            }

            if let Some(upper) = bounds.upper {
                if entry.balance > upper {
                    warn!(
                        "Warning: Balance exceeds for '{}' on {} [Limit: {} {}, Balance: {}]",
                        currency,
                        platform,
                        upper,
                        currency.to_uppercase(),
                        entry.balance
                    );
                    violations.push(violation(ViolationKind::Above));
                }
            }
        }

        debug!(
            checked = snapshot.entries.len(),
            violations = violations.len(),
            "Evaluation complete"
        );

        violations
    }
}
