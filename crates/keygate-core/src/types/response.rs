//! The JSON envelope every endpoint answers with.

use serde::{Deserialize, Serialize};

/// `{success, message, data?, total?}`.
///
/// Most failures are reported with HTTP 200 and `success = false`; only
/// authentication, rate limiting and internal failures change the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> Envelope<T> {
    /// A successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
            total: None,
        }
    }

    /// A successful page of `data` with the total matching count.
    pub fn page(data: T, total: u64) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
            total: Some(total),
        }
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Envelope<()> {
    /// A successful envelope without payload.
    pub fn done() -> Self {
        Self {
            success: true,
            message: String::new(),
            data: None,
            total: None,
        }
    }

    /// A failed envelope.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            total: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_omits_data_and_total() {
        let json = serde_json::to_value(Envelope::failure("user disabled")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "user disabled" })
        );
    }

    #[test]
    fn page_carries_total() {
        let json = serde_json::to_value(Envelope::page(vec![1, 2], 7)).unwrap();
        assert_eq!(json["total"], 7);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
