//! Public output types for batch build and push runs.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Terminal state of one function in a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Skipped,
    Shrinkwrapped,
    Built,
    Pushed,
    Failed,
    /// Never handed to a worker because the run halted first.
    NotDispatched,
}

/// What a worker reports for a function it handled without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub status: ItemStatus,
    pub detail: Option<String>,
}

impl ItemOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Skipped,
            detail: Some(reason.into()),
        }
    }

    pub fn shrinkwrapped(context: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Shrinkwrapped,
            detail: Some(context.into()),
        }
    }

    pub fn built(image: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Built,
            detail: Some(image.into()),
        }
    }

    pub fn pushed(image: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Pushed,
            detail: Some(image.into()),
        }
    }
}

/// Individual function result within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub id: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_dispatched: usize,
}

/// Result of a build or push run.
///
/// Per-function items are listed in manifest order. `error` holds the first
/// failure observed by any worker; it is what the run as a whole reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub action: String,
    pub items: Vec<BatchItem>,
    pub summary: BatchSummary,
    #[serde(skip)]
    pub error: Option<Error>,
}

impl BatchReport {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            items: Vec::new(),
            summary: BatchSummary::default(),
            error: None,
        }
    }

    pub fn record(&mut self, id: impl Into<String>, worker: Option<usize>, outcome: ItemOutcome) {
        self.summary.total += 1;
        match outcome.status {
            ItemStatus::Skipped => self.summary.skipped += 1,
            ItemStatus::Failed => self.summary.failed += 1,
            ItemStatus::NotDispatched => self.summary.not_dispatched += 1,
            _ => self.summary.succeeded += 1,
        }
        self.items.push(BatchItem {
            id: id.into(),
            status: outcome.status,
            worker,
            detail: outcome.detail,
            error: None,
        });
    }

    pub fn record_error(&mut self, id: impl Into<String>, worker: Option<usize>, err: &Error) {
        self.summary.total += 1;
        self.summary.failed += 1;
        self.items.push(BatchItem {
            id: id.into(),
            status: ItemStatus::Failed,
            worker,
            detail: None,
            error: Some(err.message.clone()),
        });
    }

    pub fn record_not_dispatched(&mut self, id: impl Into<String>) {
        self.record(
            id,
            None,
            ItemOutcome {
                status: ItemStatus::NotDispatched,
                detail: None,
            },
        );
    }

    pub fn status_of(&self, id: &str) -> Option<ItemStatus> {
        self.items.iter().find(|i| i.id == id).map(|i| i.status)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The first recorded error, or the report itself when the run succeeded.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_updates_summary_counts() {
        let mut report = BatchReport::new("build");
        report.record("a", Some(0), ItemOutcome::built("img/a"));
        report.record("b", None, ItemOutcome::skipped("skip_build"));
        report.record_error("c", Some(1), &Error::other("boom"));
        report.record_not_dispatched("d");

        assert_eq!(
            report.summary,
            BatchSummary {
                total: 4,
                succeeded: 1,
                skipped: 1,
                failed: 1,
                not_dispatched: 1,
            }
        );
        assert_eq!(report.status_of("c"), Some(ItemStatus::Failed));
    }

    #[test]
    fn into_result_surfaces_recorded_error() {
        let mut report = BatchReport::new("push");
        assert!(report.clone().into_result().is_ok());

        report.error = Some(Error::other("first"));
        assert!(!report.is_success());
        let err = report.into_result().unwrap_err();
        assert_eq!(err.code.as_str(), "internal.unexpected");
    }

    #[test]
    fn serializes_statuses_in_snake_case() {
        let mut report = BatchReport::new("build");
        report.record_not_dispatched("fn");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["items"][0]["status"], "not_dispatched");
        assert_eq!(json["summary"]["notDispatched"], 1);
        assert!(json.get("error").is_none());
    }
}
