//! JSON-RPC 2.0 protocol types.
//!
//! SoHal speaks plain JSON-RPC 2.0. Errors carry the composite hippo code in
//! the `data` member, formatted as `<origin>:<HIGH32>:<LOW32>` in hex.

use hippo_types::{ErrorKind, Facility, HippoError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// JSON-RPC 2.0 Request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 Request. Without an id it is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

impl Response {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Convert into the call outcome seen by a device.
    ///
    /// A missing `result` is read as `null`, which void methods return.
    ///
    /// # Errors
    ///
    /// Returns the server error, or `MessageError` when the error object
    /// does not carry a usable code.
    pub fn into_result(self, facility: Facility) -> Result<Value, HippoError> {
        match self.error {
            Some(error) => Err(error.into_hippo(facility)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Recover the composite code from `data`.
    ///
    /// Errors without a parsable `data` string become `MessageError` in
    /// `facility`, keeping the server's message.
    #[must_use]
    pub fn into_hippo(self, facility: Facility) -> HippoError {
        self.data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(HippoError::from_wire_data)
            .unwrap_or_else(|| HippoError::new(facility, ErrorKind::MessageError))
            .with_message(self.message)
    }
}

impl From<&HippoError> for RpcError {
    fn from(err: &HippoError) -> Self {
        Self {
            code: i64::from(err.kind_code()),
            message: err.message().to_string(),
            data: Some(Value::String(err.to_wire_data())),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Incoming message that could be a request, response, or notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

/// JSON-RPC 2.0 Notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl Message {
    /// Parse a JSON string into a `Message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or doesn't match any message type.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize this message to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("touchmat@0.state", Some(json!([true])), 1.into());
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"touchmat@0.state\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"params\":[true]"));
    }

    #[test]
    fn test_request_without_params() {
        let req = Request::new("sohal@0.version", None, 1.into());
        let json = serde_json::to_string(&req).unwrap();
        assert!(
            !json.contains("\"params\""),
            "params should be omitted when None"
        );
    }

    #[test]
    fn test_notification_no_id() {
        let notif = Message::Notification(Notification::new("adder.on_progress", None));
        let json = notif.to_json().unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_response_success() {
        let resp = Response::success(1.into(), json!({"touch": true}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_response_null_result_is_void() {
        let resp: Response = serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        assert_eq!(resp.into_result(Facility::TouchMat).unwrap(), Value::Null);
    }

    #[test]
    fn test_response_error_with_composite_data() {
        let json = r#"{"jsonrpc":"2.0","id":"a","error":{"code":516,"data":"touchmat.py:0000004f:213e0204","message":"palm_rejection_timeout must be in [150, 2000]"}}"#;
        let resp: Response = serde_json::from_str(json).unwrap();
        let err = resp.into_result(Facility::TouchMat).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ParamOutOfRange));
        assert_eq!(err.raw(), 0x0000_004f_213e_0204);
        assert!(err.message().contains("[150, 2000]"));
    }

    #[test]
    fn test_response_error_without_data() {
        let json = r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: Response = serde_json::from_str(json).unwrap();
        let err = resp.into_result(Facility::SoHal).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MessageError));
        assert_eq!(err.facility(), Some(Facility::SoHal));
        assert_eq!(err.message(), "Method not found");
    }

    #[test]
    fn test_rpc_error_from_hippo() {
        let err = HippoError::new(Facility::SwDevice, ErrorKind::FuncNotAvailable);
        let rpc: RpcError = (&err).into();
        assert_eq!(rpc.code, 0x202);
        assert_eq!(rpc.message, "Functionality not available");
        assert_eq!(rpc.data, Some(json!("unknown:00000000:21630202")));

        let back = rpc.into_hippo(Facility::Device);
        assert_eq!(back.raw(), err.raw());
    }

    #[test]
    fn test_request_id_types() {
        let id_num: RequestId = 42.into();
        let id_str: RequestId = "0x7ff:0001:3".into();

        assert_eq!(id_num, RequestId::Number(42));
        assert_eq!(id_str, RequestId::String("0x7ff:0001:3".to_string()));
    }

    #[test]
    fn test_request_id_serialization() {
        let json = serde_json::to_string(&RequestId::Number(123)).unwrap();
        assert_eq!(json, "123");

        let id: RequestId = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(id, RequestId::String("xyz".to_string()));
    }

    #[test]
    fn test_message_parse_invocation() {
        let json = r#"{"jsonrpc":"2.0","method":"adder.add_point","params":[{"x":1,"y":2},{"x":3,"y":4}],"id":7}"#;
        let msg = Message::parse(json).unwrap();
        assert!(matches!(msg, Message::Request(Request { id: Some(RequestId::Number(7)), .. })));
    }

    #[test]
    fn test_message_parse_notification() {
        let json = r#"{"jsonrpc":"2.0","method":"touchmat.on_state","params":[{"touch":true,"active_pen":false}]}"#;
        let msg = Message::parse(json).unwrap();
        assert!(matches!(
            &msg,
            Message::Notification(n) if n.method == "touchmat.on_state"
        ) || matches!(&msg, Message::Request(Request { id: None, .. })));
    }

    #[test]
    fn test_message_parse_response() {
        let json = r#"{"jsonrpc":"2.0","result":"five_mm","id":1}"#;
        let msg = Message::parse(json).unwrap();
        assert!(matches!(msg, Message::Response(_)));
    }

    #[test]
    fn test_message_without_jsonrpc_member() {
        let msg = Message::parse(r#"{"result":1,"id":9}"#).unwrap();
        assert!(matches!(msg, Message::Response(Response { id: RequestId::Number(9), .. })));
    }

    #[test]
    fn test_message_parse_garbage() {
        assert!(Message::parse("[1,2,3]").is_err());
        assert!(Message::parse("{\"id\":null}").is_err());
    }
}
