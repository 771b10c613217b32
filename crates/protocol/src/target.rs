use serde::{Deserialize, Serialize};

/// One entry of the `/json` (alias `/json/list`) target listing.
///
/// Chromium omits `webSocketDebuggerUrl` for targets that already have a
/// DevTools frontend attached, so it is optional here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	#[serde(default)]
	pub id: String,
	#[serde(default, rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
	/// Returns `true` for ordinary page targets (not workers or extensions).
	pub fn is_page(&self) -> bool {
		self.kind.is_empty() || self.kind == "page"
	}
}
