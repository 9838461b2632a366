use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Success,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Success => "success",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => ProcessingStatus::Success,
            "failed" => ProcessingStatus::Failed,
            _ => ProcessingStatus::Pending,
        }
    }
}

/// Keyed by `order_id`. Created on first reception of `order.created` for
/// an unknown order; `attempt_count` increments on every processing
/// attempt, including retries after redelivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingState {
    pub order_id: String,
    pub version: i64,
    pub status: ProcessingStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

impl ProcessingState {
    pub fn new(order_id: String) -> Self {
        Self {
            order_id,
            version: 0,
            status: ProcessingStatus::Pending,
            attempt_count: 0,
            last_error: None,
        }
    }

    /// Records one processing attempt and its outcome.
    pub fn record_attempt(&mut self, version: i64, status: ProcessingStatus, error: Option<String>) {
        self.attempt_count += 1;
        self.version = version;
        self.status = status;
        self.last_error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_pending_at_attempt_zero() {
        let state = ProcessingState::new("ord-1".into());
        assert_eq!(state.status, ProcessingStatus::Pending);
        assert_eq!(state.attempt_count, 0);
    }

    #[test]
    fn record_attempt_increments_attempt_count_every_call() {
        let mut state = ProcessingState::new("ord-1".into());
        state.record_attempt(1, ProcessingStatus::Success, None);
        assert_eq!(state.attempt_count, 1);
        state.record_attempt(2, ProcessingStatus::Failed, Some("processing_error".into()));
        assert_eq!(state.attempt_count, 2);
        assert_eq!(state.status, ProcessingStatus::Failed);
    }
}
