mod client;
pub mod config;
pub mod error;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::collections::HashMap;

pub use client::MessageClient;

pub const ERROR_TYPE: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// One message crossing the boundary between a wallet client and its host.
///
/// Requests carry only `type`; terminal responses set `success`. Any number of
/// progress envelopes without `success` may precede the terminal one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tracing: HashMap<String, String>,
}

impl Envelope {
    pub fn request(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self::new(new_id(), kind.into(), payload)
    }

    pub fn success(request: &Envelope, payload: Option<Value>) -> Self {
        Self {
            success: Some(true),
            ..Self::new(
                request.id.clone(),
                format!("{}_SUCCESS", request.kind),
                payload,
            )
        }
    }

    pub fn failure(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            error: Some(ErrorBody {
                message: message.into(),
            }),
            ..Self::new(id.into(), ERROR_TYPE.to_string(), None)
        }
    }

    pub fn progress(id: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self::new(id.into(), kind.into(), Some(payload))
    }

    /// An unsolicited push; nobody waits on its id.
    pub fn broadcast(kind: impl Into<String>, payload: Value) -> Self {
        Self::new(new_id(), kind.into(), Some(payload))
    }

    pub fn is_terminal(&self) -> bool {
        self.success.is_some()
    }

    fn new(id: String, kind: String, payload: Option<Value>) -> Self {
        Self {
            id,
            kind,
            payload,
            success: None,
            error: None,
            tracing: HashMap::new(),
        }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let request = Envelope::request("GET_BALANCE", None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "GET_BALANCE");
        assert!(json.get("success").is_none());
        assert!(json.get("tracing").is_none());

        let response = Envelope::success(&request, Some(serde_json::json!({"total": 1})));
        assert_eq!(response.id, request.id);
        assert_eq!(response.kind, "GET_BALANCE_SUCCESS");
        assert!(response.is_terminal());

        let failure: Envelope = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "type": "ERROR",
            "success": false,
            "error": {"message": "wallet not initialized"}
        }))
        .unwrap();
        assert_eq!(failure, Envelope::failure("abc", "wallet not initialized"));
    }
}
