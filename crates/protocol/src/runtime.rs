use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP method used for every command.
pub const RUNTIME_EVALUATE: &str = "Runtime.evaluate";

/// Request id used for every evaluate call.
///
/// Only one request is ever in flight and replies are not correlated, so the
/// id stays constant.
pub const EVALUATE_REQUEST_ID: u64 = 1;

/// Outbound `Runtime.evaluate` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateRequest {
	pub id: u64,
	pub method: String,
	pub params: EvaluateParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateParams {
	pub expression: String,
}

impl EvaluateRequest {
	pub fn new(expression: impl Into<String>) -> Self {
		Self {
			id: EVALUATE_REQUEST_ID,
			method: RUNTIME_EVALUATE.to_string(),
			params: EvaluateParams {
				expression: expression.into(),
			},
		}
	}
}

/// Inbound CDP frame.
///
/// Replies carry an `id`; events carry a `method`. Anything else is kept raw.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
	Reply(CdpReply),
	Event(CdpEvent),
	Unknown(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdpReply {
	pub id: u64,
	#[serde(default)]
	pub result: Option<EvaluateResult>,
	#[serde(default)]
	pub error: Option<CdpError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdpEvent {
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdpError {
	pub code: i64,
	pub message: String,
}

/// `result` payload of a `Runtime.evaluate` reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	#[serde(default)]
	pub result: Option<RemoteObject>,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub value: Option<Value>,
	#[serde(default)]
	pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub line_number: i64,
	#[serde(default)]
	pub column_number: i64,
	#[serde(default)]
	pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
	/// Best human-readable description of the thrown value.
	pub fn message(&self) -> &str {
		self.exception
			.as_ref()
			.and_then(|e| e.description.as_deref())
			.unwrap_or(&self.text)
	}
}
