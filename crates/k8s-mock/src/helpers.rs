//! JSON and path helpers shared by the request handlers.

use serde_json::Value;

/// Recursively merge `patch` into `base`. Objects merge key by key; any other
/// value in `patch` replaces what is in `base`.
pub fn merge_json(base: Value, patch: Value) -> Value {
	match (base, patch) {
		(Value::Object(mut merged), Value::Object(patch)) => {
			for (key, value) in patch {
				let current = merged.remove(&key).unwrap_or(Value::Null);
				merged.insert(key, merge_json(current, value));
			}
			Value::Object(merged)
		}
		(_, patch) => patch,
	}
}

/// Split a request path into its collection path and the trailing object name.
///
/// `/api/v1/namespaces/default/secrets/pull` becomes
/// (`/api/v1/namespaces/default/secrets`, `pull`).
pub fn parse_resource_path(path: &str) -> (String, String) {
	let path = path.trim_end_matches('/');
	match path.rsplit_once('/') {
		Some((collection, name)) => (collection.to_string(), name.to_string()),
		None => (path.to_string(), String::new()),
	}
}

/// A Kubernetes `Status` failure body.
pub fn status_body(code: u16, reason: &str, message: &str) -> Value {
	serde_json::json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}
