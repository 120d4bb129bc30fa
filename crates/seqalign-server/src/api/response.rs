//! Response envelopes shared by all routes

use serde::Serialize;

/// Error envelope: `{success: false, error: {code, message}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Returned by every submission endpoint
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct JobAccepted {
    pub job_id: uuid::Uuid,
    pub state: seqalign_common::types::JobState,
}

impl JobAccepted {
    pub fn pending(job_id: uuid::Uuid) -> Self {
        Self {
            job_id,
            state: seqalign_common::types::JobState::Pending,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response_shape() {
        let value = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "Database 'x.fa' not found")).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": {"code": "NOT_FOUND", "message": "Database 'x.fa' not found"}})
        );
    }

    #[test]
    fn test_job_accepted_is_pending() {
        let id = uuid::Uuid::new_v4();
        let value = serde_json::to_value(JobAccepted::pending(id)).unwrap();
        assert_eq!(value["state"], "PENDING");
        assert_eq!(value["job_id"], id.to_string());
    }
}
