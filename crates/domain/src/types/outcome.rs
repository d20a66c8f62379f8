//! Partner call outcome types
//!
//! These model what the partner client reports back for a completed exchange.
//! Transport-level failures never appear here; they surface as errors on the
//! client port instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which batch operation a data push performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPushMode {
    Create,
    Update,
    Delete,
}

impl DataPushMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for DataPushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partner-level result envelope for a single completed call.
///
/// `accepted == false` means the partner processed and rejected the request.
/// That is a retryable failure class, distinct from transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerOutcome {
    pub accepted: bool,
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PartnerOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            code: None,
            message: None,
            warnings: Vec::new(),
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            code: Some(code.into()),
            message: Some(message.into()),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Human-readable rejection description for logs and failure reports.
    pub fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "rejected without detail".to_owned(),
        }
    }
}

/// Verdict for one item inside a batch exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ItemVerdict {
    /// The partner acknowledged the item.
    Accepted,
    /// The partner processed and refused the item. Retryable.
    Rejected { message: String },
    /// Delivery of the item failed before the partner could judge it
    /// (transport error on its call). Retryable.
    Failed { message: String },
    /// The item could not be converted to wire form. Terminal.
    Invalid { message: String },
    /// The operation family is administratively disabled.
    AdminDown,
}

impl ItemVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Terminal failures must never be re-enqueued.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

/// Outcome of one item inside a batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Display form of the item identifier (EVSE id or session id).
    pub item: String,
    pub verdict: ItemVerdict,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ItemOutcome {
    pub fn accepted(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            verdict: ItemVerdict::Accepted,
            warnings: Vec::new(),
        }
    }

    pub fn rejected(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            verdict: ItemVerdict::Rejected {
                message: message.into(),
            },
            warnings: Vec::new(),
        }
    }

    pub fn failed(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            verdict: ItemVerdict::Failed {
                message: message.into(),
            },
            warnings: Vec::new(),
        }
    }

    pub fn invalid(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            verdict: ItemVerdict::Invalid {
                message: message.into(),
            },
            warnings: Vec::new(),
        }
    }

    pub fn admin_down(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            verdict: ItemVerdict::AdminDown,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Per-item outcomes of one batch exchange.
///
/// Contract: one outcome per input item, in input order, regardless of how
/// the client chunked or short-circuited the transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub items: Vec<ItemOutcome>,
}

impl BatchOutcome {
    pub fn new(items: Vec<ItemOutcome>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn all_accepted(&self) -> bool {
        self.items.iter().all(|item| item.verdict.is_accepted())
    }

    /// Identifiers of items the partner acknowledged.
    pub fn accepted_items(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| item.verdict.is_accepted())
            .map(|item| item.item.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_outcome_describes_code_and_message() {
        let outcome = PartnerOutcome::rejected("EVSE_UNKNOWN", "entity not registered");
        assert!(!outcome.accepted);
        assert_eq!(outcome.describe(), "EVSE_UNKNOWN: entity not registered");
    }

    #[test]
    fn invalid_verdict_is_terminal() {
        assert!(ItemVerdict::Invalid {
            message: "bad id".into()
        }
        .is_terminal());
        assert!(!ItemVerdict::Rejected {
            message: "no".into()
        }
        .is_terminal());
        assert!(!ItemVerdict::Accepted.is_terminal());
    }

    #[test]
    fn batch_outcome_filters_accepted_items() {
        let outcome = BatchOutcome::new(vec![
            ItemOutcome::accepted("E1"),
            ItemOutcome::rejected("E2", "duplicate"),
            ItemOutcome::accepted("E3"),
        ]);
        assert!(!outcome.all_accepted());
        assert_eq!(outcome.accepted_items(), vec!["E1", "E3"]);
    }
}
