//! `NodePool`: a scalable set of worker machines attached to a hosted cluster.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::types::{NodePoolPlatform, Release};

#[derive(CustomResource, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[kube(
	group = "hypershift.openshift.io",
	version = "v1alpha1",
	kind = "NodePool",
	namespaced,
	schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolSpec {
	/// Name of the `HostedCluster` in the same namespace.
	pub cluster_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_count: Option<i32>,
	pub release: Release,
	pub platform: NodePoolPlatform,
}
