//! Alert message construction.
//!
//! Builds Block Kit blocks for rich clients and one plain-text line per
//! violation for clients that cannot render blocks. Pure: no I/O.

use super::evaluator::{Violation, ViolationKind};
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Header text shown once per alert.
pub const ALERT_HEADER: &str = "❗Balance Outside Acceptable Range";

/// A formatted alert ready for the notifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertPayload {
    pub blocks: Vec<Value>,
    pub fallback_lines: Vec<String>,
}

impl AlertPayload {
    /// Nothing to send.
    pub fn is_empty(&self) -> bool {
        self.fallback_lines.is_empty()
    }

    /// Fallback lines joined for the channel's plain-text field.
    pub fn fallback_text(&self) -> String {
        self.fallback_lines.join("\n")
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlertFormatter;

impl AlertFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Format violations into a header followed by, per violation, a field
    /// section, a divider, a sentence section and another divider.
    pub fn format(&self, violations: &[Violation]) -> AlertPayload {
        let mut blocks = Vec::with_capacity(1 + violations.len() * 4);
        blocks.push(json!({
            "type": "header",
            "text": { "type": "plain_text", "text": ALERT_HEADER }
        }));

        let mut fallback_lines = Vec::with_capacity(violations.len());

        for violation in violations {
            let sentence = Self::sentence(violation);
            let platform = capitalize(&violation.platform);
            let currency = violation.currency.to_uppercase();

            blocks.push(json!({
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Platform:*\n {}", platform) },
                    { "type": "mrkdwn", "text": format!("*Currency:*\n {}", currency) },
                    { "type": "mrkdwn", "text": format!("*Limit Type:*\n {}", violation.kind.limit_label()) },
                    { "type": "mrkdwn", "text": format!("*Balance:*\n {} {}", amount(violation.balance), currency) },
                ]
            }));
            blocks.push(divider());
            blocks.push(json!({
                "type": "section",
                "text": { "type": "plain_text", "text": sentence }
            }));
            blocks.push(divider());

            fallback_lines.push(sentence);
        }

        AlertPayload {
            blocks,
            fallback_lines,
        }
    }

    /// Human-readable warning for one violation.
    pub fn sentence(violation: &Violation) -> String {
        let platform = capitalize(&violation.platform);
        let currency = violation.currency.to_uppercase();
        let limit = violation
            .limit()
            .map(amount)
            .unwrap_or_else(|| "-".to_string());

        let verb = match violation.kind {
            ViolationKind::Below => "is below",
            ViolationKind::Above => "exceeds",
        };

        format!(
            "Warning: Balance {} for '{}' on {} [Limit: {} {}, Balance: {}]",
            verb,
            currency,
            platform,
            limit,
            currency,
            amount(violation.balance)
        )
    }
}

/// Amount without the wire's trailing zeros (`1200.50000000` -> `1200.5`).
fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

fn divider() -> Value {
    json!({ "type": "divider" })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
