//! Kubernetes client plumbing.
//!
//! Connection setup, API discovery and server-side apply, built on kube-rs.

pub mod apply;
pub mod client;
pub mod discovery;

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Secret, HostedCluster).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace).
	ClusterWide,
}

/// Convert a typed object into the untyped form the apply path works on.
pub fn to_dynamic_object<K: serde::Serialize>(
	object: &K,
) -> Result<kube::api::DynamicObject, serde_json::Error> {
	serde_json::from_value(serde_json::to_value(object)?)
}
